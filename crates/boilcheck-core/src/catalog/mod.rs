//! Schema catalog - the immutable snapshot of database schema

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Snapshot of the database schema, assembled once per run by the driver
/// and read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub tables: Vec<Table>,
}

impl Catalog {
    pub fn new(tables: Vec<Table>) -> Self {
        Self { tables }
    }

    /// Look up a table by name. An empty `schema` matches any schema.
    pub fn find_table(&self, schema: &str, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| (schema.is_empty() || t.schema == schema) && t.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// A table (or view) and its columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub schema: String,
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A single column as reported by the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// The host-language type the driver maps this column to (e.g. `i32`,
    /// `Option<String>`, `chrono::NaiveDateTime`).
    pub driver_type: String,
    /// The database type name (e.g. `integer`, `text`).
    pub db_type: String,
    /// The underlying type name from pg_type (e.g. `int4`).
    pub udt_name: String,
    /// The database type including modifiers (e.g. `character varying(100)`).
    pub full_db_type: String,
    pub nullable: bool,
    pub unique: bool,
}

/// Import paths the driver declares for its qualified types, keyed by
/// driver type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportCollection {
    pub based_on_type: HashMap<String, ImportSet>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSet {
    pub standard: Vec<String>,
    pub third_party: Vec<String>,
}

impl ImportCollection {
    /// All import paths declared for a driver type, standard ones first.
    pub fn paths_for(&self, driver_type: &str) -> impl Iterator<Item = &str> {
        self.based_on_type
            .get(driver_type)
            .into_iter()
            .flat_map(|set| {
                set.standard
                    .iter()
                    .chain(set.third_party.iter())
                    .map(String::as_str)
            })
    }
}
