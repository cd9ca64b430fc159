//! Constant extraction: tagged constants, tagged calls, and the
//! warnings both can produce.

mod resolver;

pub use resolver::{SqlFunction, FUNCTION_WHITELIST};

use std::ops::Range;

use syn::spanned::Spanned;
use syn::visit::{self, Visit};
use tracing::debug;

use crate::diagnostics::{Call, FilePos, Warning};
use crate::host::{Package, SourceFile, TypeInfo};

/// A string constant whose declaration carries the marker comment.
#[derive(Debug, Clone)]
pub struct TaggedConstant {
    pub name: String,
    /// The fully evaluated compile-time string.
    pub value: String,
    pub decl_span: Range<usize>,
    /// Byte range of the enclosing function body for local constants.
    pub scope: Option<Range<usize>>,
    pub pos: FilePos,
}

impl TaggedConstant {
    fn visible_at(&self, use_pos: usize) -> bool {
        match &self.scope {
            None => true,
            Some(scope) => scope.contains(&use_pos),
        }
    }
}

/// Walk every package and produce the calls to check plus extraction
/// warnings. Calls sort by (package, filename, line, column), warnings
/// by (filename, line, column).
pub fn find_tagged_calls(packages: &[Package]) -> (Vec<Call>, Vec<Warning>) {
    let mut calls = Vec::new();
    let mut warns = Vec::new();

    for package in packages {
        for file in &package.files {
            let info = TypeInfo::build(&file.ast);
            let mut extractor = Extractor {
                file,
                info: &info,
                consumed: vec![false; file.comments.len()],
                consts: Vec::new(),
                calls: Vec::new(),
                warns: Vec::new(),
            };
            extractor.visit_file(&file.ast);
            extractor.finish_markers();
            debug!(
                file = %file.path.display(),
                constants = extractor.consts.len(),
                calls = extractor.calls.len(),
                "extracted"
            );

            let Extractor {
                consts,
                calls: mut file_calls,
                warns: mut file_warns,
                ..
            } = extractor;
            resolver::calls_by_constant(file, &info, &consts, &mut file_calls, &mut file_warns);

            for call in &mut file_calls {
                call.package = package.path.clone();
            }
            calls.append(&mut file_calls);
            warns.append(&mut file_warns);
        }
    }

    calls.sort_by(|a, b| (&a.package, &a.pos).cmp(&(&b.package, &b.pos)));
    warns.sort_by(|a, b| a.pos.cmp(&b.pos));

    (calls, warns)
}

struct Extractor<'a> {
    file: &'a SourceFile,
    info: &'a TypeInfo,
    /// Which marker blocks attached to a node; leftovers warn.
    consumed: Vec<bool>,
    consts: Vec<TaggedConstant>,
    calls: Vec<Call>,
    warns: Vec<Warning>,
}

const NO_TARGET: &str = "failed to find either function or constant after sqlboiler:check tag";
const NOT_A_CONSTANT: &str = "tagged declaration was not a constant";

impl Extractor<'_> {
    fn marker_for(&self, span: proc_macro2::Span) -> Option<usize> {
        self.file.comments.marker_for_line(span.start().line)
    }

    fn warn(&mut self, message: impl Into<String>, pos: FilePos) {
        self.warns.push(Warning::new(message, pos));
    }

    fn tag_constant(&mut self, item: &syn::ItemConst) {
        let name = item.ident.to_string();
        if name == "_" {
            let pos = self.file.pos(item.ident.span());
            self.warn("tagged declaration assigned to blank identifier", pos);
            return;
        }
        let decl_start = item.span().byte_range().start;
        match self.info.const_by_decl(decl_start) {
            Some(decl) if decl.value.is_some() => {
                let constant = TaggedConstant {
                    name,
                    value: decl.value.clone().unwrap_or_default(),
                    decl_span: decl.decl_span.clone(),
                    scope: decl.scope.clone(),
                    pos: self.file.pos(item.span()),
                };
                debug!(name = %constant.name, "tagged constant");
                self.consts.push(constant);
            }
            _ => {
                let pos = self.file.pos(item.ident.span());
                self.warn("could not determine type for tagged declaration", pos);
            }
        }
    }

    fn tag_expr_stmt(&mut self, expr: &syn::Expr, stmt_pos: FilePos) {
        match resolver::tag_call(self.file, self.info, expr) {
            Ok(Some(call)) => self.calls.push(call),
            Err(warning) => self.warns.push(warning),
            Ok(None) => self.warn(NO_TARGET, stmt_pos),
        }
    }

    /// A `let` is either an assignment feeding a database call or a
    /// plain declaration: descend first, and only call it a non-constant
    /// declaration when no call comes back.
    fn tag_local(&mut self, local: &syn::Local) {
        let Some(init) = &local.init else {
            let pos = self.file.pos(local.span());
            self.warn(NOT_A_CONSTANT, pos);
            return;
        };
        match resolver::tag_call(self.file, self.info, &init.expr) {
            Ok(Some(call)) => self.calls.push(call),
            Err(warning) => self.warns.push(warning),
            Ok(None) => {
                let pos = self.file.pos(local.span());
                self.warn(NOT_A_CONSTANT, pos);
            }
        }
    }

    fn finish_markers(&mut self) {
        let leftover: Vec<usize> = self
            .consumed
            .iter()
            .enumerate()
            .filter(|(_, consumed)| !**consumed)
            .map(|(block, _)| block)
            .collect();
        for block in leftover {
            let line = self.file.comments.marker_line(block);
            let pos = self.file.pos_at_line(line);
            self.warn(NO_TARGET, pos);
        }
    }
}

impl<'ast> Visit<'ast> for Extractor<'_> {
    fn visit_item(&mut self, item: &'ast syn::Item) {
        if let Some(block) = self.marker_for(item.span()) {
            self.consumed[block] = true;
            match item {
                syn::Item::Const(c) => self.tag_constant(c),
                syn::Item::Static(_) => {
                    let pos = self.file.pos(item.span());
                    self.warn(NOT_A_CONSTANT, pos);
                }
                _ => {
                    let pos = self.file.pos(item.span());
                    self.warn(NO_TARGET, pos);
                }
            }
        }
        visit::visit_item(self, item);
    }

    fn visit_stmt(&mut self, stmt: &'ast syn::Stmt) {
        // Items inside statements are tagged through visit_item.
        if !matches!(stmt, syn::Stmt::Item(_)) {
            if let Some(block) = self.marker_for(stmt.span()) {
                self.consumed[block] = true;
                match stmt {
                    syn::Stmt::Local(local) => self.tag_local(local),
                    syn::Stmt::Expr(expr, _) => {
                        let pos = self.file.pos(stmt.span());
                        self.tag_expr_stmt(expr, pos);
                    }
                    _ => {
                        let pos = self.file.pos(stmt.span());
                        self.warn(NO_TARGET, pos);
                    }
                }
            }
        }
        visit::visit_stmt(self, stmt);
    }
}
