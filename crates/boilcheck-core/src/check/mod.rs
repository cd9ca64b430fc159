//! SQL semantic checker.
//!
//! Each call's SQL is parsed with pg_query; every top-level statement is
//! then walked against a fresh [`Scope`] bound to the catalog. The walk
//! is a single dispatch over the parse-node kind, except the FROM clause,
//! which uses an explicit LIFO worklist so table pushes (which mutate the
//! scope) stay apart from expression recursion (which reads it).

mod scope;
mod typecheck;

pub use scope::{OutputCol, Resolution, Scope};

use pg_query::protobuf::{
    ColumnRef, DeleteStmt, InsertStmt, Node, RangeVar, SelectStmt, UpdateStmt,
};
use pg_query::NodeEnum;
use tracing::debug;

use crate::catalog::{Catalog, ImportCollection, Table};
use crate::diagnostics::{Call, Diagnostic, IdentKind, ParseFailure, UnknownIdent};

/// Validates calls against a schema catalog.
pub struct Checker<'a> {
    catalog: &'a Catalog,
    imports: &'a ImportCollection,
}

impl<'a> Checker<'a> {
    pub fn new(catalog: &'a Catalog, imports: &'a ImportCollection) -> Self {
        Self { catalog, imports }
    }

    /// Check every call, fully independently: one call's problems never
    /// poison the next.
    pub fn check_calls(&self, calls: &[Call]) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for call in calls {
            debug!(sql = %call.sql, "checking call");
            match pg_query::parse(&call.sql) {
                Err(e) => diags.push(Diagnostic::Parse(ParseFailure {
                    cause: e.to_string(),
                    call: call.clone(),
                })),
                Ok(parsed) => {
                    for raw in &parsed.protobuf.stmts {
                        let Some(node) = raw.stmt.as_ref().and_then(|s| s.node.as_ref())
                        else {
                            continue;
                        };
                        let mut scope = Scope::new(self.catalog);
                        self.check_node(call, &mut scope, node, &mut diags);
                    }
                }
            }
        }
        diags
    }

    fn check_opt(
        &self,
        call: &Call,
        scope: &mut Scope<'a>,
        node: Option<&Node>,
        diags: &mut Vec<Diagnostic>,
    ) {
        if let Some(inner) = node.and_then(|n| n.node.as_ref()) {
            self.check_node(call, scope, inner, diags);
        }
    }

    fn check_list(
        &self,
        call: &Call,
        scope: &mut Scope<'a>,
        nodes: &[Node],
        diags: &mut Vec<Diagnostic>,
    ) {
        for node in nodes {
            if let Some(inner) = node.node.as_ref() {
                self.check_node(call, scope, inner, diags);
            }
        }
    }

    fn check_node(
        &self,
        call: &Call,
        scope: &mut Scope<'a>,
        node: &NodeEnum,
        diags: &mut Vec<Diagnostic>,
    ) {
        match node {
            NodeEnum::SelectStmt(sel) => {
                self.check_select(call, scope, sel, diags);
            }
            NodeEnum::UpdateStmt(update) => self.check_update(call, scope, update, diags),
            NodeEnum::InsertStmt(insert) => self.check_insert(call, scope, insert, diags),
            NodeEnum::DeleteStmt(delete) => self.check_delete(call, scope, delete, diags),
            NodeEnum::SortBy(sort) => {
                self.check_opt(call, scope, sort.node.as_deref(), diags)
            }
            NodeEnum::FuncCall(func) => self.check_list(call, scope, &func.args, diags),
            NodeEnum::AExpr(expr) => {
                self.check_opt(call, scope, expr.lexpr.as_deref(), diags);
                self.check_opt(call, scope, expr.rexpr.as_deref(), diags);
                if let Some(diag) = typecheck::type_check(
                    self.imports,
                    call,
                    scope,
                    expr.lexpr.as_deref(),
                    expr.rexpr.as_deref(),
                ) {
                    diags.push(diag);
                }
            }
            NodeEnum::BoolExpr(expr) => self.check_list(call, scope, &expr.args, diags),
            NodeEnum::ColumnRef(column_ref) => {
                self.check_column_ref(call, scope, column_ref, diags)
            }
            NodeEnum::SubLink(link) => {
                self.check_opt(call, scope, link.subselect.as_deref(), diags)
            }
            NodeEnum::ResTarget(target) => {
                // Select lists never reach this arm; this is the update
                // assignment form, where only one table is in scope and
                // ambiguity is impossible.
                if !target.name.is_empty()
                    && scope.has("", "", &target.name) == Resolution::Unknown
                {
                    diags.push(Diagnostic::UnknownIdent(UnknownIdent {
                        kind: IdentKind::Unknown,
                        schema: String::new(),
                        table: String::new(),
                        column: target.name.clone(),
                        location: target.location,
                        call: call.clone(),
                    }));
                }
                self.check_opt(call, scope, target.val.as_deref(), diags);
            }
            _ => {}
        }
    }

    fn check_column_ref(
        &self,
        call: &Call,
        scope: &mut Scope<'a>,
        column_ref: &ColumnRef,
        diags: &mut Vec<Diagnostic>,
    ) {
        match split_column_ref(column_ref) {
            ColumnParts::Star => {}
            ColumnParts::Name {
                schema,
                table,
                column,
            } => {
                let ret = scope.has(&schema, &table, &column);
                if ret != Resolution::Ok {
                    diags.push(Diagnostic::UnknownIdent(UnknownIdent {
                        kind: ident_kind(ret),
                        schema,
                        table,
                        column,
                        location: column_ref.location,
                        call: call.clone(),
                    }));
                }
            }
        }
    }

    /// Walk a select statement; the returned output-column references are
    /// consumed by an enclosing sub-select.
    fn check_select(
        &self,
        call: &Call,
        scope: &mut Scope<'a>,
        sel: &SelectStmt,
        diags: &mut Vec<Diagnostic>,
    ) -> Vec<OutputCol> {
        // Set operations: check both sides as separate entities.
        if let (Some(larg), Some(rarg)) = (sel.larg.as_deref(), sel.rarg.as_deref()) {
            self.check_select(call, scope, larg, diags);
            self.check_select(call, scope, rarg, diags);
            return Vec::new();
        }

        let mut pushed = 0usize;

        let mut stack: Vec<&NodeEnum> = sel
            .from_clause
            .iter()
            .filter_map(|n| n.node.as_ref())
            .collect();
        while let Some(item) = stack.pop() {
            match item {
                NodeEnum::RangeVar(rv) => {
                    if self.push_range_var(call, scope, rv, diags) {
                        pushed += 1;
                    }
                }
                NodeEnum::JoinExpr(join) => {
                    if let Some(quals) = join.quals.as_deref().and_then(|n| n.node.as_ref()) {
                        stack.push(quals);
                    }
                    if let Some(rarg) = join.rarg.as_deref().and_then(|n| n.node.as_ref()) {
                        stack.push(rarg);
                    }
                    if let Some(larg) = join.larg.as_deref().and_then(|n| n.node.as_ref()) {
                        stack.push(larg);
                    }
                }
                NodeEnum::AExpr(_) | NodeEnum::BoolExpr(_) => {
                    self.check_node(call, scope, item, diags)
                }
                NodeEnum::RangeSubselect(sub) => {
                    let alias = sub
                        .alias
                        .as_ref()
                        .expect("sub-select in FROM must carry an alias");
                    let Some(NodeEnum::SelectStmt(sub_sel)) =
                        sub.subquery.as_deref().and_then(|n| n.node.as_ref())
                    else {
                        panic!("sub-select in FROM is not a select statement");
                    };

                    // Lateral sub-selects see the enclosing tables but
                    // must not pollute the enclosing scope.
                    let outputs = if sub.lateral {
                        let mut child = scope.clone();
                        self.check_select(call, &mut child, sub_sel, diags)
                    } else {
                        let mut child = Scope::new(self.catalog);
                        self.check_select(call, &mut child, sub_sel, diags)
                    };

                    scope.push_pseudo_table(
                        &alias.aliasname,
                        pseudo_table(&alias.aliasname, &outputs),
                    );
                    pushed += 1;
                }
                other => panic!("unsupported from-clause item: {other:?}"),
            }
        }

        self.check_opt(call, scope, sel.where_clause.as_deref(), diags);
        self.check_opt(call, scope, sel.having_clause.as_deref(), diags);

        // The select list runs after WHERE/HAVING but before GROUP BY and
        // ORDER BY, so those two can reference output names.
        let mut outputs: Vec<OutputCol> = Vec::new();
        for item in &sel.target_list {
            let Some(NodeEnum::ResTarget(target)) = item.node.as_ref() else {
                panic!("select-list item is not a result target");
            };
            let mut name = target.name.clone();
            let mut column = None;
            match target.val.as_deref().and_then(|n| n.node.as_ref()) {
                Some(NodeEnum::ColumnRef(column_ref)) => {
                    match split_column_ref(column_ref) {
                        // `*` expands to nothing checkable; the base
                        // tables were already verified.
                        ColumnParts::Star => continue,
                        ColumnParts::Name {
                            schema,
                            table,
                            column: col_name,
                        } => {
                            let (col, ret) = scope.get(&schema, &table, &col_name);
                            if ret != Resolution::Ok {
                                diags.push(Diagnostic::UnknownIdent(UnknownIdent {
                                    kind: ident_kind(ret),
                                    schema,
                                    table,
                                    column: col_name,
                                    location: column_ref.location,
                                    call: call.clone(),
                                }));
                                continue;
                            }
                            column = col.cloned();
                            if name.is_empty() {
                                name = col_name;
                            }
                        }
                    }
                }
                // Other targets (function calls, sub-selects) are checked
                // against the current scope, which is what lets a
                // correlated sub-select see the enclosing aliases.
                Some(other) => self.check_node(call, scope, other, diags),
                None => {}
            }
            outputs.push(OutputCol { name, column });
        }

        for output in &outputs {
            scope.push_output_name(output.clone());
        }

        self.check_list(call, scope, &sel.group_clause, diags);
        self.check_list(call, scope, &sel.sort_clause, diags);

        for _ in &outputs {
            scope.pop_output_name();
        }
        for _ in 0..pushed {
            scope.pop_table();
        }

        outputs
    }

    fn check_update(
        &self,
        call: &Call,
        scope: &mut Scope<'a>,
        update: &UpdateStmt,
        diags: &mut Vec<Diagnostic>,
    ) {
        let relation = update
            .relation
            .as_ref()
            .expect("update statement has no target relation");
        let pushed = usize::from(self.push_range_var(call, scope, relation, diags));

        self.check_list(call, scope, &update.target_list, diags);
        self.check_opt(call, scope, update.where_clause.as_deref(), diags);

        for _ in 0..pushed {
            scope.pop_table();
        }
    }

    fn check_insert(
        &self,
        call: &Call,
        scope: &mut Scope<'a>,
        insert: &InsertStmt,
        diags: &mut Vec<Diagnostic>,
    ) {
        let relation = insert
            .relation
            .as_ref()
            .expect("insert statement has no target relation");
        let pushed = usize::from(self.push_range_var(call, scope, relation, diags));

        self.check_list(call, scope, &insert.cols, diags);

        for _ in 0..pushed {
            scope.pop_table();
        }
    }

    fn check_delete(
        &self,
        call: &Call,
        scope: &mut Scope<'a>,
        delete: &DeleteStmt,
        diags: &mut Vec<Diagnostic>,
    ) {
        let relation = delete
            .relation
            .as_ref()
            .expect("delete statement has no target relation");
        let pushed = usize::from(self.push_range_var(call, scope, relation, diags));

        self.check_opt(call, scope, delete.where_clause.as_deref(), diags);

        for _ in 0..pushed {
            scope.pop_table();
        }
    }

    fn push_range_var(
        &self,
        call: &Call,
        scope: &mut Scope<'a>,
        rv: &RangeVar,
        diags: &mut Vec<Diagnostic>,
    ) -> bool {
        let alias = rv
            .alias
            .as_ref()
            .map(|a| a.aliasname.as_str())
            .unwrap_or("");
        if scope.push_table(&rv.schemaname, &rv.relname, alias) {
            return true;
        }
        diags.push(Diagnostic::UnknownIdent(UnknownIdent {
            kind: IdentKind::Unknown,
            schema: rv.schemaname.clone(),
            table: rv.relname.clone(),
            column: String::new(),
            location: rv.location,
            call: call.clone(),
        }));
        false
    }
}

fn ident_kind(ret: Resolution) -> IdentKind {
    match ret {
        Resolution::Ambiguous => IdentKind::Ambiguous,
        _ => IdentKind::Unknown,
    }
}

fn pseudo_table(name: &str, outputs: &[OutputCol]) -> Table {
    let columns = outputs
        .iter()
        .map(|output| {
            let mut col = output.column.clone().unwrap_or_default();
            col.name = output.name.clone();
            col
        })
        .collect();
    Table {
        schema: String::new(),
        name: name.to_string(),
        columns,
    }
}

/// The `(schema?, table?, column)` parts of a column reference, or a
/// star. Field counts of 1, 2, and 3 set the qualifiers; anything else
/// in the terminal position is a parser invariant violation.
pub(crate) enum ColumnParts {
    Star,
    Name {
        schema: String,
        table: String,
        column: String,
    },
}

pub(crate) fn split_column_ref(column_ref: &ColumnRef) -> ColumnParts {
    let fields: Vec<&NodeEnum> = column_ref
        .fields
        .iter()
        .filter_map(|n| n.node.as_ref())
        .collect();

    let mut schema = String::new();
    let mut table = String::new();
    let offset = match fields.len() {
        3 => {
            schema = string_field(fields[0]);
            table = string_field(fields[1]);
            2
        }
        2 => {
            table = string_field(fields[0]);
            1
        }
        _ => 0,
    };

    match fields.get(offset) {
        Some(NodeEnum::String(s)) => ColumnParts::Name {
            schema,
            table,
            column: s.sval.clone(),
        },
        Some(NodeEnum::AStar(_)) => ColumnParts::Star,
        other => panic!("unsupported column reference field: {other:?}"),
    }
}

fn string_field(node: &NodeEnum) -> String {
    match node {
        NodeEnum::String(s) => s.sval.clone(),
        other => panic!("unsupported column reference field: {other:?}"),
    }
}
