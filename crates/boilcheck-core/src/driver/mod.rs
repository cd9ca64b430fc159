//! Schema-discovery drivers.

mod psql;

pub use psql::PsqlDriver;

use crate::catalog::{Catalog, ImportCollection};
use crate::error::{Error, Result};

/// A driver assembles the catalog from a database and declares the
/// import paths of its qualified column types. The configuration table
/// is the driver's own section of the config file, passed verbatim.
pub trait Driver {
    fn assemble(&self, config: &toml::Table) -> Result<Catalog>;
    fn imports(&self) -> Result<ImportCollection>;
}

/// Resolve a `--driver` value to a driver name. A path form names the
/// binary, with the `sqlboiler-` prefix and `.exe` suffix stripped.
pub fn driver_name(value: &str) -> String {
    if !value.contains(std::path::MAIN_SEPARATOR) && !value.contains('/') {
        return value.to_string();
    }
    let base = std::path::Path::new(value)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| value.to_string());
    let base = base.strip_prefix("sqlboiler-").unwrap_or(&base);
    let base = base.strip_suffix(".exe").unwrap_or(base);
    base.to_string()
}

pub fn get_driver(name: &str) -> Result<Box<dyn Driver>> {
    match name {
        "psql" => Ok(Box::new(PsqlDriver)),
        other => Err(Error::UnknownDriver(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_name_plain() {
        assert_eq!(driver_name("psql"), "psql");
    }

    #[test]
    fn test_driver_name_path() {
        assert_eq!(driver_name("/usr/local/bin/sqlboiler-psql"), "psql");
        assert_eq!(driver_name("./bin/sqlboiler-psql.exe"), "psql");
        assert_eq!(driver_name("./bin/custom"), "custom");
    }

    #[test]
    fn test_unknown_driver_is_an_error() {
        assert!(get_driver("mysql").is_err());
    }
}
