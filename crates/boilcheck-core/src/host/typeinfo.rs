//! Best-effort static types and compile-time constant values for host
//! expressions.
//!
//! This is the per-file stand-in for a full type checker: it evaluates
//! `&str` constants (literals, references to other constants, and
//! `concat!` of literals) and assigns type strings to the expression
//! shapes that occur at database call sites. Anything it cannot name is
//! reported as unknown and the caller warns.

use proc_macro2::Span;
use quote::ToTokens;
use std::ops::Range;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::visit::{self, Visit};
use syn::{Expr, Lit, Pat, Token};

/// A named string constant discovered in a file.
#[derive(Debug, Clone)]
pub struct ConstDecl {
    pub name: String,
    /// Fully evaluated compile-time string, when the initializer has one.
    pub value: Option<String>,
    /// Byte range of the declaring item.
    pub decl_span: Range<usize>,
    /// Byte range of the enclosing function body for local constants;
    /// None for top-level constants.
    pub scope: Option<Range<usize>>,
    pub line: usize,
    pub column: usize,
}

impl ConstDecl {
    /// Whether a use at the given byte offset can see this constant.
    pub fn visible_at(&self, use_pos: usize) -> bool {
        match &self.scope {
            None => true,
            Some(scope) => scope.contains(&use_pos),
        }
    }
}

#[derive(Debug, Clone)]
struct LocalBinding {
    name: String,
    ty: String,
    scope: Range<usize>,
    decl_start: usize,
}

/// Static types and constant values for one file.
#[derive(Debug, Default)]
pub struct TypeInfo {
    consts: Vec<ConstDecl>,
    locals: Vec<LocalBinding>,
}

impl TypeInfo {
    pub fn build(file: &syn::File) -> Self {
        let mut collector = Collector::default();
        collector.visit_file(file);

        let raw = collector.consts;
        let mut done: Vec<Option<Option<String>>> = vec![None; raw.len()];
        let mut visiting = vec![false; raw.len()];
        for idx in 0..raw.len() {
            let _ = eval_idx(idx, &raw, &mut done, &mut visiting);
        }

        let consts = raw
            .into_iter()
            .zip(done)
            .map(|(c, value)| ConstDecl {
                name: c.name,
                value: value.flatten(),
                decl_span: c.decl_span,
                scope: c.scope,
                line: c.line,
                column: c.column,
            })
            .collect();

        Self {
            consts,
            locals: collector.locals,
        }
    }

    /// The constant a bare identifier resolves to at the given byte
    /// offset. Function-local constants win over top-level ones.
    pub fn const_at(&self, name: &str, use_pos: usize) -> Option<&ConstDecl> {
        let mut top_level = None;
        for c in &self.consts {
            if c.name != name || !c.visible_at(use_pos) {
                continue;
            }
            if c.scope.is_some() {
                return Some(c);
            }
            top_level.get_or_insert(c);
        }
        top_level
    }

    /// The constant declared by the item starting at the given byte offset.
    pub fn const_by_decl(&self, decl_start: usize) -> Option<&ConstDecl> {
        self.consts.iter().find(|c| c.decl_span.start == decl_start)
    }

    fn local(&self, name: &str, use_pos: usize) -> Option<&str> {
        self.locals
            .iter()
            .filter(|b| b.name == name && b.scope.contains(&use_pos))
            .filter(|b| b.decl_start <= use_pos)
            .max_by_key(|b| b.decl_start)
            .map(|b| b.ty.as_str())
    }

    /// Best-effort static type of an expression, rendered as a Rust type
    /// string. None means the type is unknown.
    pub fn expr_type(&self, expr: &Expr, use_pos: usize) -> Option<String> {
        match expr {
            Expr::Path(p) => {
                let ident = p.path.get_ident()?.to_string();
                if let Some(ty) = self.local(&ident, use_pos) {
                    return Some(ty.to_string());
                }
                if self.const_at(&ident, use_pos).is_some() {
                    return Some("&str".to_string());
                }
                None
            }
            Expr::Reference(r) => self.expr_type(&r.expr, use_pos),
            Expr::Paren(p) => self.expr_type(&p.expr, use_pos),
            Expr::Group(g) => self.expr_type(&g.expr, use_pos),
            other => shallow_type(other),
        }
    }

    /// The compile-time string value of an expression, when it has one.
    pub fn const_string_value(&self, expr: &Expr, use_pos: usize) -> Option<String> {
        match expr {
            Expr::Lit(l) => match &l.lit {
                Lit::Str(s) => Some(s.value()),
                _ => None,
            },
            Expr::Paren(p) => self.const_string_value(&p.expr, use_pos),
            Expr::Group(g) => self.const_string_value(&g.expr, use_pos),
            Expr::Reference(r) => self.const_string_value(&r.expr, use_pos),
            Expr::Path(p) => {
                let ident = p.path.get_ident()?.to_string();
                self.const_at(&ident, use_pos)?.value.clone()
            }
            Expr::Macro(m) if m.mac.path.is_ident("concat") => {
                let args = m
                    .mac
                    .parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated)
                    .ok()?;
                let mut out = String::new();
                for arg in &args {
                    out.push_str(&self.concat_piece(arg, use_pos)?);
                }
                Some(out)
            }
            _ => None,
        }
    }

    fn concat_piece(&self, expr: &Expr, use_pos: usize) -> Option<String> {
        if let Expr::Lit(l) = expr {
            return match &l.lit {
                Lit::Str(s) => Some(s.value()),
                Lit::Int(i) => Some(i.base10_digits().to_string()),
                Lit::Bool(b) => Some(b.value.to_string()),
                Lit::Char(c) => Some(c.value().to_string()),
                _ => None,
            };
        }
        self.const_string_value(expr, use_pos)
    }
}

#[derive(Debug)]
struct RawConst<'ast> {
    name: String,
    expr: &'ast Expr,
    decl_span: Range<usize>,
    scope: Option<Range<usize>>,
    line: usize,
    column: usize,
}

#[derive(Default)]
struct Collector<'ast> {
    consts: Vec<RawConst<'ast>>,
    locals: Vec<LocalBinding>,
    fn_stack: Vec<Range<usize>>,
}

impl<'ast> Collector<'ast> {
    fn enter_fn(&mut self, sig: &'ast syn::Signature, block: &'ast syn::Block) {
        let scope = byte_range(block.span());
        for input in &sig.inputs {
            if let syn::FnArg::Typed(pt) = input {
                if let Pat::Ident(pi) = &*pt.pat {
                    self.locals.push(LocalBinding {
                        name: pi.ident.to_string(),
                        ty: render_type(&pt.ty),
                        scope: scope.clone(),
                        decl_start: scope.start,
                    });
                }
            }
        }
        self.fn_stack.push(scope);
    }
}

impl<'ast> Visit<'ast> for Collector<'ast> {
    fn visit_item_const(&mut self, node: &'ast syn::ItemConst) {
        let span = node.span();
        let start = span.start();
        self.consts.push(RawConst {
            name: node.ident.to_string(),
            expr: &node.expr,
            decl_span: byte_range(span),
            scope: self.fn_stack.last().cloned(),
            line: start.line,
            column: start.column + 1,
        });
        visit::visit_item_const(self, node);
    }

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        self.enter_fn(&node.sig, &node.block);
        visit::visit_item_fn(self, node);
        self.fn_stack.pop();
    }

    fn visit_impl_item_fn(&mut self, node: &'ast syn::ImplItemFn) {
        self.enter_fn(&node.sig, &node.block);
        visit::visit_impl_item_fn(self, node);
        self.fn_stack.pop();
    }

    fn visit_local(&mut self, node: &'ast syn::Local) {
        if let Some(scope) = self.fn_stack.last().cloned() {
            let (name, annotated) = match &node.pat {
                Pat::Ident(pi) => (Some(pi.ident.to_string()), None),
                Pat::Type(pt) => match &*pt.pat {
                    Pat::Ident(pi) => {
                        (Some(pi.ident.to_string()), Some(render_type(&pt.ty)))
                    }
                    _ => (None, None),
                },
                _ => (None, None),
            };
            if let Some(name) = name {
                let inferred = annotated.or_else(|| {
                    node.init.as_ref().and_then(|init| shallow_type(&init.expr))
                });
                if let Some(ty) = inferred {
                    self.locals.push(LocalBinding {
                        name,
                        ty,
                        scope,
                        decl_start: byte_range(node.span()).start,
                    });
                }
            }
        }
        visit::visit_local(self, node);
    }
}

fn eval_idx(
    idx: usize,
    raw: &[RawConst<'_>],
    done: &mut Vec<Option<Option<String>>>,
    visiting: &mut Vec<bool>,
) -> Option<String> {
    if let Some(v) = &done[idx] {
        return v.clone();
    }
    if visiting[idx] {
        return None;
    }
    visiting[idx] = true;
    let value = eval_expr(raw[idx].expr, raw[idx].decl_span.start, raw, done, visiting);
    visiting[idx] = false;
    done[idx] = Some(value.clone());
    value
}

fn eval_expr(
    expr: &Expr,
    use_pos: usize,
    raw: &[RawConst<'_>],
    done: &mut Vec<Option<Option<String>>>,
    visiting: &mut Vec<bool>,
) -> Option<String> {
    match expr {
        Expr::Lit(l) => match &l.lit {
            Lit::Str(s) => Some(s.value()),
            _ => None,
        },
        Expr::Paren(p) => eval_expr(&p.expr, use_pos, raw, done, visiting),
        Expr::Group(g) => eval_expr(&g.expr, use_pos, raw, done, visiting),
        Expr::Reference(r) => eval_expr(&r.expr, use_pos, raw, done, visiting),
        Expr::Path(p) => {
            let name = p.path.get_ident()?.to_string();
            let idx = find_visible(raw, &name, use_pos)?;
            eval_idx(idx, raw, done, visiting)
        }
        Expr::Macro(m) if m.mac.path.is_ident("concat") => {
            let args = m
                .mac
                .parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated)
                .ok()?;
            let mut out = String::new();
            for arg in &args {
                let piece = match arg {
                    Expr::Lit(l) => match &l.lit {
                        Lit::Str(s) => Some(s.value()),
                        Lit::Int(i) => Some(i.base10_digits().to_string()),
                        Lit::Bool(b) => Some(b.value.to_string()),
                        Lit::Char(c) => Some(c.value().to_string()),
                        _ => None,
                    },
                    other => eval_expr(other, use_pos, raw, done, visiting),
                }?;
                out.push_str(&piece);
            }
            Some(out)
        }
        _ => None,
    }
}

fn find_visible(raw: &[RawConst<'_>], name: &str, use_pos: usize) -> Option<usize> {
    let mut top_level = None;
    for (idx, c) in raw.iter().enumerate() {
        if c.name != name {
            continue;
        }
        let visible = match &c.scope {
            None => true,
            Some(scope) => scope.contains(&use_pos),
        };
        if !visible {
            continue;
        }
        if c.scope.is_some() {
            return Some(idx);
        }
        top_level.get_or_insert(idx);
    }
    top_level
}

/// Type of an expression derivable from its own shape, without binding
/// context.
fn shallow_type(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Lit(l) => literal_type(&l.lit),
        Expr::Struct(s) => Some(render_path(&s.path)),
        Expr::Cast(c) => Some(render_type(&c.ty)),
        Expr::Reference(r) => shallow_type(&r.expr),
        Expr::Paren(p) => shallow_type(&p.expr),
        Expr::Group(g) => shallow_type(&g.expr),
        Expr::Unary(u) => shallow_type(&u.expr),
        Expr::MethodCall(m) if m.method == "to_string" || m.method == "to_owned" => {
            Some("String".to_string())
        }
        Expr::Call(c) => constructor_type(c),
        Expr::Macro(m) if m.mac.path.is_ident("concat") => Some("&str".to_string()),
        Expr::Macro(m) if m.mac.path.is_ident("format") => Some("String".to_string()),
        _ => None,
    }
}

/// `String::from(..)`-shaped calls name their own type.
fn constructor_type(call: &syn::ExprCall) -> Option<String> {
    let Expr::Path(p) = &*call.func else {
        return None;
    };
    let segments: Vec<&syn::PathSegment> = p.path.segments.iter().collect();
    if segments.len() < 2 {
        return None;
    }
    let last = segments[segments.len() - 1].ident.to_string();
    let first = segments[0].ident.to_string();
    if !last.chars().next().is_some_and(char::is_lowercase)
        || !first.chars().next().is_some_and(char::is_uppercase)
    {
        return None;
    }
    Some(
        segments[..segments.len() - 1]
            .iter()
            .map(|seg| render_segment(seg))
            .collect::<Vec<_>>()
            .join("::"),
    )
}

fn literal_type(lit: &Lit) -> Option<String> {
    let ty = match lit {
        Lit::Str(_) => "&str".to_string(),
        Lit::ByteStr(_) => "&[u8]".to_string(),
        Lit::Byte(_) => "u8".to_string(),
        Lit::Char(_) => "char".to_string(),
        Lit::Bool(_) => "bool".to_string(),
        Lit::Int(i) => {
            if i.suffix().is_empty() {
                "i32".to_string()
            } else {
                i.suffix().to_string()
            }
        }
        Lit::Float(f) => {
            if f.suffix().is_empty() {
                "f64".to_string()
            } else {
                f.suffix().to_string()
            }
        }
        _ => return None,
    };
    Some(ty)
}

/// Render a type the way Rust source writes it (`Option<String>`,
/// `&str`, `chrono::NaiveDateTime`).
pub fn render_type(ty: &syn::Type) -> String {
    match ty {
        syn::Type::Path(p) => render_path(&p.path),
        syn::Type::Reference(r) => format!("&{}", render_type(&r.elem)),
        syn::Type::Slice(s) => format!("[{}]", render_type(&s.elem)),
        syn::Type::Paren(p) => render_type(&p.elem),
        syn::Type::Group(g) => render_type(&g.elem),
        syn::Type::Tuple(t) => {
            let elems: Vec<String> = t.elems.iter().map(render_type).collect();
            format!("({})", elems.join(", "))
        }
        other => compact_tokens(other.to_token_stream()),
    }
}

pub fn render_path(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(render_segment)
        .collect::<Vec<_>>()
        .join("::")
}

fn render_segment(segment: &syn::PathSegment) -> String {
    let ident = segment.ident.to_string();
    match &segment.arguments {
        syn::PathArguments::None => ident,
        syn::PathArguments::AngleBracketed(ab) => {
            let args: Vec<String> = ab
                .args
                .iter()
                .filter_map(|arg| match arg {
                    syn::GenericArgument::Type(t) => Some(render_type(t)),
                    syn::GenericArgument::Lifetime(_) => None,
                    other => Some(compact_tokens(other.to_token_stream())),
                })
                .collect();
            if args.is_empty() {
                ident
            } else {
                format!("{}<{}>", ident, args.join(", "))
            }
        }
        syn::PathArguments::Parenthesized(p) => {
            format!("{}{}", ident, compact_tokens(p.to_token_stream()))
        }
    }
}

/// Stringify a token stream without the spaces token printing inserts
/// around punctuation.
fn compact_tokens(tokens: proc_macro2::TokenStream) -> String {
    let raw = tokens.to_string();
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    for (i, &c) in chars.iter().enumerate() {
        if c != ' ' {
            out.push(c);
            continue;
        }
        let prev = chars[..i].iter().rev().find(|&&p| p != ' ');
        let next = chars[i + 1..].iter().find(|&&n| n != ' ');
        if let (Some(&p), Some(&n)) = (prev, next) {
            if is_word_char(p) && is_word_char(n) {
                out.push(' ');
            }
        }
    }
    out
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn byte_range(span: Span) -> Range<usize> {
    span.byte_range()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_for(src: &str) -> TypeInfo {
        TypeInfo::build(&syn::parse_file(src).expect("fixture parses"))
    }

    #[test]
    fn test_const_literal_value() {
        let info = info_for("const Q: &str = \"select 1\";\n");
        let decl = info.const_at("Q", 0).expect("const found");
        assert_eq!(decl.value.as_deref(), Some("select 1"));
    }

    #[test]
    fn test_const_reference_collapses() {
        let info = info_for(
            "const A: &str = \"select \";\nconst B: &str = A;\n",
        );
        assert_eq!(
            info.const_at("B", 0).unwrap().value.as_deref(),
            Some("select ")
        );
    }

    #[test]
    fn test_concat_collapses() {
        let info = info_for("const Q: &str = concat!(\"select * from users;\", \"/\");\n");
        assert_eq!(
            info.const_at("Q", 0).unwrap().value.as_deref(),
            Some("select * from users;/")
        );
    }

    #[test]
    fn test_non_string_const_has_no_value() {
        let info = info_for("const N: i32 = 5;\n");
        assert_eq!(info.const_at("N", 0).unwrap().value, None);
    }

    #[test]
    fn test_scoped_const_is_invisible_outside_its_function() {
        let src = "\
fn inner() {
    const Q: &str = \"select 1\";
    let _ = Q;
}
fn outer() {}
";
        let info = info_for(src);
        // Visible inside inner()'s body.
        let body_pos = src.find("let _").unwrap();
        assert!(info.const_at("Q", body_pos).is_some());
        // Invisible at the top of the file.
        assert!(info.const_at("Q", 0).is_none());
    }

    #[test]
    fn test_local_binding_types() {
        let src = "\
fn main() {
    let id = 5;
    let name: String = make();
    use_it(id, name);
}
";
        let info = info_for(src);
        let file = syn::parse_file(src).unwrap();
        let use_pos = src.find("use_it").unwrap();

        // Pull the argument expressions out of the call.
        let syn::Item::Fn(f) = &file.items[0] else {
            panic!("expected fn")
        };
        let syn::Stmt::Expr(Expr::Call(call), _) = &f.block.stmts[2] else {
            panic!("expected call stmt")
        };
        let types: Vec<Option<String>> = call
            .args
            .iter()
            .map(|arg| info.expr_type(arg, use_pos))
            .collect();
        assert_eq!(
            types,
            vec![Some("i32".to_string()), Some("String".to_string())]
        );
    }

    #[test]
    fn test_struct_expression_type() {
        let info = info_for("fn main() { take(sql::NullBool { value: false, valid: true }); }");
        let expr: Expr = syn::parse_str("sql::NullBool { value: false, valid: true }").unwrap();
        assert_eq!(info.expr_type(&expr, 0).as_deref(), Some("sql::NullBool"));
    }

    #[test]
    fn test_render_type_shapes() {
        let option: syn::Type = syn::parse_str("Option<String>").unwrap();
        assert_eq!(render_type(&option), "Option<String>");

        let vec_bytes: syn::Type = syn::parse_str("Vec<u8>").unwrap();
        assert_eq!(render_type(&vec_bytes), "Vec<u8>");

        let s: syn::Type = syn::parse_str("&'a str").unwrap();
        assert_eq!(render_type(&s), "&str");

        let qualified: syn::Type = syn::parse_str("chrono::NaiveDateTime").unwrap();
        assert_eq!(render_type(&qualified), "chrono::NaiveDateTime");
    }
}
