//! Statement-scoped symbol table for the SQL checker.

use std::borrow::Cow;

use tracing::debug;

use crate::catalog::{Catalog, Column, Table};

/// Result of a scope lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Ok,
    Ambiguous,
    Unknown,
}

/// An output column introduced by a select list, referencable from the
/// same statement's GROUP BY, ORDER BY, and HAVING.
#[derive(Debug, Clone, Default)]
pub struct OutputCol {
    pub name: String,
    /// None when the output is an expression rather than a plain column.
    pub column: Option<Column>,
}

/// Tables, aliases, and output names in scope while checking one
/// statement. Catalog tables are borrowed; pseudo-tables built from
/// subquery output lists are owned.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    catalog: &'a Catalog,
    tables: Vec<Cow<'a, Table>>,
    aliases: Vec<String>,
    output_names: Vec<OutputCol>,
}

impl<'a> Scope<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            tables: Vec::new(),
            aliases: Vec::new(),
            output_names: Vec::new(),
        }
    }

    /// Bring a catalog table into scope. False means the catalog has no
    /// such table; the caller reports the unknown identifier.
    pub fn push_table(&mut self, schema: &str, table: &str, alias: &str) -> bool {
        debug!(schema, table, alias, "scope push");
        for t in &self.catalog.tables {
            if !schema.is_empty() && t.schema != schema {
                continue;
            }
            if t.name == table {
                self.aliases.push(alias.to_string());
                self.tables.push(Cow::Borrowed(t));
                return true;
            }
        }
        false
    }

    /// Bring a synthesized table (a subquery's output list) into scope.
    pub fn push_pseudo_table(&mut self, alias: &str, table: Table) {
        debug!(alias, "scope push pseudo");
        self.aliases.push(alias.to_string());
        self.tables.push(Cow::Owned(table));
    }

    pub fn pop_table(&mut self) {
        debug!(
            table = self.tables.last().map(|t| t.name.as_str()).unwrap_or(""),
            "scope pop"
        );
        self.aliases.pop();
        self.tables.pop();
    }

    pub fn push_output_name(&mut self, output: OutputCol) {
        self.output_names.push(output);
    }

    pub fn pop_output_name(&mut self) {
        self.output_names.pop();
    }

    /// Resolve a column reference.
    ///
    /// With a table qualifier, aliases take precedence over direct table
    /// names and the answer is never ambiguous. Without one, every
    /// in-scope table is searched (two hits are ambiguous) and output
    /// names are consulted last. An `Ok` resolution can still carry no
    /// column when it names an aliased expression.
    pub fn get(&self, schema: &str, table: &str, column: &str) -> (Option<&Column>, Resolution) {
        if !table.is_empty() {
            let mut in_scope = self
                .aliases
                .iter()
                .position(|alias| alias.as_str() == table)
                .map(|idx| &self.tables[idx]);
            if in_scope.is_none() {
                in_scope = self.tables.iter().find(|t| {
                    (schema.is_empty() || t.schema == schema) && t.name == table
                });
            }
            debug!(
                schema,
                table,
                column,
                hit = in_scope.map(|t| t.name.as_str()).unwrap_or(""),
                "scope get"
            );

            let Some(t) = in_scope else {
                return (None, Resolution::Unknown);
            };
            return match t.get_column(column) {
                Some(col) => (Some(col), Resolution::Ok),
                None => (None, Resolution::Unknown),
            };
        }

        let mut found: Option<&Column> = None;
        for t in &self.tables {
            if let Some(col) = t.get_column(column) {
                if found.is_some() {
                    return (None, Resolution::Ambiguous);
                }
                found = Some(col);
            }
        }
        if found.is_some() {
            return (found, Resolution::Ok);
        }

        for output in &self.output_names {
            if output.name == column {
                return (output.column.as_ref(), Resolution::Ok);
            }
        }

        (None, Resolution::Unknown)
    }

    pub fn has(&self, schema: &str, table: &str, column: &str) -> Resolution {
        self.get(schema, table, column).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(schema: &str, name: &str, columns: &[&str]) -> Table {
        Table {
            schema: schema.to_string(),
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|c| Column {
                    name: c.to_string(),
                    ..Column::default()
                })
                .collect(),
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            table("public", "users", &["id", "name"]),
            table("public", "videos", &["id", "user_id"]),
            table("audit", "users", &["id", "actor"]),
        ])
    }

    #[test]
    fn test_push_table_schema_filter() {
        let catalog = catalog();
        let mut scope = Scope::new(&catalog);

        assert!(scope.push_table("", "users", ""));
        assert!(scope.push_table("audit", "users", ""));
        assert!(!scope.push_table("public", "missing", ""));
        assert!(!scope.push_table("audit", "videos", ""));
    }

    #[test]
    fn test_qualified_lookup_never_ambiguous() {
        let catalog = catalog();
        let mut scope = Scope::new(&catalog);
        scope.push_table("", "users", "");
        scope.push_table("", "videos", "");

        assert_eq!(scope.has("", "users", "id"), Resolution::Ok);
        assert_eq!(scope.has("", "videos", "id"), Resolution::Ok);
        assert_eq!(scope.has("", "users", "user_id"), Resolution::Unknown);
        assert_eq!(scope.has("", "missing", "id"), Resolution::Unknown);
    }

    #[test]
    fn test_unqualified_ambiguity() {
        let catalog = catalog();
        let mut scope = Scope::new(&catalog);
        scope.push_table("", "users", "");
        scope.push_table("", "videos", "");

        assert_eq!(scope.has("", "", "id"), Resolution::Ambiguous);
        assert_eq!(scope.has("", "", "name"), Resolution::Ok);
        assert_eq!(scope.has("", "", "missing"), Resolution::Unknown);
    }

    #[test]
    fn test_alias_wins_over_direct_name() {
        let catalog = catalog();
        let mut scope = Scope::new(&catalog);
        // `videos` aliased as `users` shadows the real users table.
        scope.push_table("", "users", "");
        scope.push_table("", "videos", "users");

        let (col, ret) = scope.get("", "users", "user_id");
        assert_eq!(ret, Resolution::Ok);
        assert_eq!(col.unwrap().name, "user_id");
    }

    #[test]
    fn test_output_names_consulted_after_tables() {
        let catalog = catalog();
        let mut scope = Scope::new(&catalog);
        scope.push_table("", "users", "");
        scope.push_output_name(OutputCol {
            name: "total".to_string(),
            column: None,
        });

        // A plain column still resolves through the table.
        assert_eq!(scope.has("", "", "name"), Resolution::Ok);
        // The expression alias resolves with no underlying column.
        let (col, ret) = scope.get("", "", "total");
        assert_eq!(ret, Resolution::Ok);
        assert!(col.is_none());
    }

    #[test]
    fn test_clone_is_independent() {
        let catalog = catalog();
        let mut scope = Scope::new(&catalog);
        scope.push_table("", "users", "");

        let mut child = scope.clone();
        child.push_table("", "videos", "");
        child.pop_table();
        child.pop_table();

        // The parent still sees its table.
        assert_eq!(scope.has("", "users", "id"), Resolution::Ok);
    }
}
