//! Call-site resolution: descent through wrapping expressions to
//! whitelisted database calls.

use syn::spanned::Spanned;
use syn::visit::{self, Visit};
use syn::Expr;
use tracing::debug;

use crate::diagnostics::{Call, FilePos, Warning};
use crate::host::{SourceFile, TypeInfo};

use super::TaggedConstant;

/// A database-access function the linter recognizes by leaf name.
#[derive(Debug, Clone, Copy)]
pub struct SqlFunction {
    pub name: &'static str,
    pub has_context: bool,
}

/// The fixed set of whitelisted call names. Only the leaf callee name is
/// matched; the receiver is ignored.
pub const FUNCTION_WHITELIST: &[SqlFunction] = &[
    SqlFunction { name: "Exec", has_context: false },
    SqlFunction { name: "ExecContext", has_context: true },
    SqlFunction { name: "Query", has_context: false },
    SqlFunction { name: "QueryContext", has_context: true },
    SqlFunction { name: "QueryRow", has_context: false },
    SqlFunction { name: "QueryRowContext", has_context: true },
    SqlFunction { name: "SQL", has_context: false },
];

fn sql_function(name: &str) -> Option<&'static SqlFunction> {
    FUNCTION_WHITELIST.iter().find(|f| f.name == name)
}

/// Drill down from a tagged expression to a whitelisted call.
///
/// `Ok(None)` means nothing call-shaped was found. `Err` means the user
/// clearly meant a call but it cannot be used, and carries the warning.
pub(crate) fn tag_call(
    file: &SourceFile,
    info: &TypeInfo,
    expr: &Expr,
) -> Result<Option<Call>, Warning> {
    let mut current = expr;
    loop {
        current = match current {
            Expr::If(e) => &*e.cond,
            Expr::Let(e) => &*e.expr,
            Expr::Assign(e) => &*e.right,
            Expr::Match(e) => &*e.expr,
            Expr::Try(e) => &*e.expr,
            Expr::Paren(e) => &*e.expr,
            Expr::Group(e) => &*e.expr,
            Expr::Reference(e) => &*e.expr,
            Expr::Call(_) | Expr::MethodCall(_) => {
                return resolve_call(file, info, current)
            }
            _ => return Ok(None),
        };
    }
}

fn resolve_call(
    file: &SourceFile,
    info: &TypeInfo,
    expr: &Expr,
) -> Result<Option<Call>, Warning> {
    let (leaf, args): (Option<String>, Vec<&Expr>) = match expr {
        Expr::MethodCall(m) => (Some(m.method.to_string()), m.args.iter().collect()),
        Expr::Call(c) => (callee_leaf(&c.func), c.args.iter().collect()),
        _ => return Ok(None),
    };

    let Some(function) = leaf.as_deref().and_then(sql_function) else {
        // A chained call like `db.QueryRow(..).Scan(..)`: the receiver is
        // itself the call of interest.
        if let Expr::MethodCall(m) = expr {
            if matches!(&*m.receiver, Expr::Call(_) | Expr::MethodCall(_)) {
                return tag_call(file, info, &m.receiver);
            }
        }
        // Otherwise look through wrapping calls for the first inner hit.
        // Problems inside arguments that yield no call stay silent here.
        for arg in args {
            if let Ok(Some(call)) = tag_call(file, info, arg) {
                return Ok(Some(call));
            }
        }
        return Ok(None);
    };

    let off = usize::from(function.has_context);
    if args.len() <= off {
        return Ok(None);
    }

    let sql_arg = args[off];
    let use_pos = sql_arg.span().byte_range().start;
    let sql = if let Some(name) = bare_ident(sql_arg) {
        match info.const_at(&name, use_pos) {
            Some(decl) => match &decl.value {
                Some(value) => value.clone(),
                None => {
                    return Err(Warning::new(
                        "could not find string value for sql statement",
                        FilePos::new(
                            file.path.display().to_string(),
                            decl.line,
                            decl.column,
                        ),
                    ))
                }
            },
            None => {
                return Err(Warning::new(
                    format!("argument {name:?} to sql function is not a constant"),
                    file.pos(sql_arg.span()),
                ))
            }
        }
    } else {
        match info.const_string_value(sql_arg, use_pos) {
            Some(value) => value,
            None => {
                return Err(Warning::new(
                    "sql argument to function is not an identifier or a constant string",
                    file.pos(sql_arg.span()),
                ))
            }
        }
    };

    let mut arg_types = Vec::with_capacity(args.len() - off - 1);
    for (i, arg) in args.iter().enumerate().skip(off + 1) {
        let arg_pos = arg.span().byte_range().start;
        match info.expr_type(arg, arg_pos) {
            Some(ty) => arg_types.push(ty),
            None => {
                return Err(Warning::new(
                    format!("argument {} type unknown", i - off),
                    file.pos(arg.span()),
                ))
            }
        }
    }

    debug!(name = function.name, args = arg_types.len(), "resolved call");
    Ok(Some(Call {
        sql,
        arg_types,
        package: String::new(),
        pos: file.pos(expr.span()),
    }))
}

fn bare_ident(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Path(p) => p.path.get_ident().map(|i| i.to_string()),
        _ => None,
    }
}

fn callee_leaf(func: &Expr) -> Option<String> {
    match func {
        Expr::Path(p) => p.path.segments.last().map(|s| s.ident.to_string()),
        Expr::Paren(p) => callee_leaf(&p.expr),
        _ => None,
    }
}

/// Re-walk the whole file for calls that consume one of the file's
/// tagged constants, whether or not the call itself is tagged.
pub(crate) fn calls_by_constant(
    file: &SourceFile,
    info: &TypeInfo,
    consts: &[TaggedConstant],
    calls: &mut Vec<Call>,
    warns: &mut Vec<Warning>,
) {
    if consts.is_empty() {
        return;
    }
    let mut scan = Rescan {
        file,
        info,
        consts,
        calls,
        warns,
    };
    scan.visit_file(&file.ast);
}

struct Rescan<'a> {
    file: &'a SourceFile,
    info: &'a TypeInfo,
    consts: &'a [TaggedConstant],
    calls: &'a mut Vec<Call>,
    warns: &'a mut Vec<Warning>,
}

impl Rescan<'_> {
    /// Returns true when a call was recorded; descent stops there.
    fn scan_call(
        &mut self,
        span: proc_macro2::Span,
        leaf: Option<String>,
        args: &[&Expr],
    ) -> bool {
        let hit = args.iter().enumerate().find_map(|(k, arg)| {
            let name = bare_ident(arg)?;
            let use_pos = arg.span().byte_range().start;
            self.consts
                .iter()
                .find(|c| c.name == name && c.visible_at(use_pos))
                .map(|c| (k, c))
        });
        let Some((k, constant)) = hit else {
            return false;
        };

        if leaf.as_deref().and_then(sql_function).is_none() {
            self.warns.push(Warning::new(
                "tagged constant used in non-sql function",
                self.file.pos(args[k].span()),
            ));
            return false;
        }

        let mut arg_types = Vec::new();
        for (i, arg) in args.iter().enumerate().skip(k + 1) {
            let arg_pos = arg.span().byte_range().start;
            match self.info.expr_type(arg, arg_pos) {
                Some(ty) => arg_types.push(ty),
                None => {
                    self.warns.push(Warning::new(
                        format!("argument {} type unknown", i - k),
                        self.file.pos(arg.span()),
                    ));
                    return false;
                }
            }
        }

        self.calls.push(Call {
            sql: constant.value.clone(),
            arg_types,
            package: String::new(),
            pos: self.file.pos(span),
        });
        true
    }
}

impl<'ast> Visit<'ast> for Rescan<'_> {
    fn visit_expr_call(&mut self, node: &'ast syn::ExprCall) {
        let args: Vec<&Expr> = node.args.iter().collect();
        if !self.scan_call(node.span(), callee_leaf(&node.func), &args) {
            visit::visit_expr_call(self, node);
        }
    }

    fn visit_expr_method_call(&mut self, node: &'ast syn::ExprMethodCall) {
        let args: Vec<&Expr> = node.args.iter().collect();
        if !self.scan_call(node.span(), Some(node.method.to_string()), &args) {
            visit::visit_expr_method_call(self, node);
        }
    }
}
