//! Configuration file handling

use miette::{IntoDiagnostic, Result};
use std::path::Path;

/// The TOML configuration document. Each driver owns the top-level table
/// named after it; boilcheck itself reads nothing else.
pub struct Config {
    doc: toml::Table,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).into_diagnostic()?;
        let doc: toml::Table = toml::from_str(&contents).into_diagnostic()?;
        Ok(Self { doc })
    }

    /// The driver's own section, passed to it verbatim.
    pub fn driver_table(&self, driver: &str) -> Result<&toml::Table> {
        match self.doc.get(driver) {
            Some(toml::Value::Table(table)) => Ok(table),
            Some(other) => miette::bail!(
                "{driver} in config file was wrong type: {}",
                other.type_str()
            ),
            None => miette::bail!("no {driver} key in config file"),
        }
    }
}
