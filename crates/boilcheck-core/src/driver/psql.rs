//! PostgreSQL schema introspection.

use indexmap::IndexMap;
use postgres::config::SslMode;
use postgres::{Client, NoTls};
use tracing::debug;

use crate::catalog::{Catalog, Column, ImportCollection, ImportSet, Table};
use crate::error::{Error, Result};

use super::Driver;

/// The built-in driver: introspects a live PostgreSQL database over
/// pg_catalog.
pub struct PsqlDriver;

const COLUMN_QUERY: &str = r#"
SELECT
  n.nspname        AS schema_name,
  c.relname        AS table_name,
  a.attname        AS column_name,
  t.typname        AS udt_name,
  pg_catalog.format_type(a.atttypid, NULL)         AS db_type,
  pg_catalog.format_type(a.atttypid, a.atttypmod)  AS full_db_type,
  NOT a.attnotnull AS nullable,
  EXISTS (
    SELECT 1
    FROM pg_catalog.pg_index i
    WHERE i.indrelid = c.oid
      AND i.indisunique
      AND i.indnkeyatts = 1
      AND i.indkey[0] = a.attnum
  ) AS is_unique
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
JOIN pg_catalog.pg_attribute a ON a.attrelid = c.oid
JOIN pg_catalog.pg_type t ON t.oid = a.atttypid
WHERE c.relkind IN ('r', 'p', 'v', 'm')
  AND a.attnum > 0
  AND NOT a.attisdropped
  AND n.nspname = $1
ORDER BY n.nspname, c.relname, a.attnum
"#;

impl Driver for PsqlDriver {
    fn assemble(&self, config: &toml::Table) -> Result<Catalog> {
        let cfg = PsqlConfig::from_table(config)?;
        let mut client = cfg.connect()?;

        let rows = client.query(COLUMN_QUERY, &[&cfg.schema])?;
        let mut tables: IndexMap<(String, String), Table> = IndexMap::new();
        for row in rows {
            let schema: String = row.try_get("schema_name")?;
            let table: String = row.try_get("table_name")?;
            let udt_name: String = row.try_get("udt_name")?;
            let nullable: bool = row.try_get("nullable")?;

            let column = Column {
                name: row.try_get("column_name")?,
                driver_type: driver_type(&udt_name, nullable),
                db_type: row.try_get("db_type")?,
                udt_name,
                full_db_type: row.try_get("full_db_type")?,
                nullable,
                unique: row.try_get("is_unique")?,
            };

            tables
                .entry((schema.clone(), table.clone()))
                .or_insert_with(|| Table {
                    schema,
                    name: table,
                    columns: Vec::new(),
                })
                .columns
                .push(column);
        }

        debug!(tables = tables.len(), schema = %cfg.schema, "assembled catalog");
        Ok(Catalog::new(tables.into_values().collect()))
    }

    fn imports(&self) -> Result<ImportCollection> {
        let mut based_on_type = std::collections::HashMap::new();
        for (driver_type, path) in [
            ("chrono::NaiveDate", "chrono"),
            ("chrono::NaiveTime", "chrono"),
            ("chrono::NaiveDateTime", "chrono"),
            ("chrono::DateTime<chrono::Utc>", "chrono"),
            ("rust_decimal::Decimal", "rust_decimal"),
            ("serde_json::Value", "serde_json"),
            ("uuid::Uuid", "uuid"),
        ] {
            based_on_type.insert(
                driver_type.to_string(),
                ImportSet {
                    standard: Vec::new(),
                    third_party: vec![path.to_string()],
                },
            );
        }
        Ok(ImportCollection { based_on_type })
    }
}

struct PsqlConfig {
    host: String,
    port: u16,
    user: String,
    pass: Option<String>,
    dbname: String,
    sslmode: Option<String>,
    schema: String,
}

impl PsqlConfig {
    fn from_table(table: &toml::Table) -> Result<Self> {
        Ok(Self {
            host: str_key(table, "host")?.unwrap_or_else(|| "localhost".to_string()),
            port: match int_key(table, "port")? {
                Some(port) => u16::try_from(port)
                    .map_err(|_| Error::Config(format!("invalid port: {port}")))?,
                None => 5432,
            },
            user: str_key(table, "user")?
                .ok_or_else(|| Error::Config("missing user in driver config".to_string()))?,
            pass: str_key(table, "pass")?,
            dbname: str_key(table, "dbname")?
                .ok_or_else(|| Error::Config("missing dbname in driver config".to_string()))?,
            sslmode: str_key(table, "sslmode")?,
            schema: str_key(table, "schema")?.unwrap_or_else(|| "public".to_string()),
        })
    }

    fn connect(&self) -> Result<Client> {
        let mut config = postgres::config::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.user)
            .dbname(&self.dbname);
        if let Some(pass) = &self.pass {
            config.password(pass);
        }
        if let Some(sslmode) = &self.sslmode {
            config.ssl_mode(match sslmode.as_str() {
                "disable" => SslMode::Disable,
                "prefer" => SslMode::Prefer,
                "require" => SslMode::Require,
                other => {
                    return Err(Error::Config(format!("unsupported sslmode: {other}")))
                }
            });
        }
        debug!(host = %self.host, port = self.port, dbname = %self.dbname, "connecting");
        Ok(config.connect(NoTls)?)
    }
}

fn str_key(table: &toml::Table, key: &str) -> Result<Option<String>> {
    match table.get(key) {
        None => Ok(None),
        Some(toml::Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Error::Config(format!(
            "{key} in driver config was wrong type: {}",
            other.type_str()
        ))),
    }
}

fn int_key(table: &toml::Table, key: &str) -> Result<Option<i64>> {
    match table.get(key) {
        None => Ok(None),
        Some(toml::Value::Integer(i)) => Ok(Some(*i)),
        Some(other) => Err(Error::Config(format!(
            "{key} in driver config was wrong type: {}",
            other.type_str()
        ))),
    }
}

/// Map a pg_type name to the Rust type the data layer reads it as.
fn driver_type(udt_name: &str, nullable: bool) -> String {
    let base = match udt_name {
        "int2" => "i16",
        "int4" => "i32",
        "int8" => "i64",
        "float4" => "f32",
        "float8" => "f64",
        "numeric" => "rust_decimal::Decimal",
        "bool" => "bool",
        "text" | "varchar" | "bpchar" | "citext" | "name" => "String",
        "bytea" => "Vec<u8>",
        "json" | "jsonb" => "serde_json::Value",
        "uuid" => "uuid::Uuid",
        "date" => "chrono::NaiveDate",
        "time" => "chrono::NaiveTime",
        "timestamp" => "chrono::NaiveDateTime",
        "timestamptz" => "chrono::DateTime<chrono::Utc>",
        _ => "String",
    };
    if nullable {
        format!("Option<{base}>")
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_type_mapping() {
        assert_eq!(driver_type("int4", false), "i32");
        assert_eq!(driver_type("text", false), "String");
        assert_eq!(driver_type("text", true), "Option<String>");
        assert_eq!(driver_type("timestamptz", false), "chrono::DateTime<chrono::Utc>");
        assert_eq!(driver_type("tsvector", false), "String");
    }

    #[test]
    fn test_config_defaults() {
        let mut table = toml::Table::new();
        table.insert("user".to_string(), toml::Value::String("app".into()));
        table.insert("dbname".to_string(), toml::Value::String("appdb".into()));

        let cfg = PsqlConfig::from_table(&table).unwrap();
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.port, 5432);
        assert_eq!(cfg.schema, "public");
        assert!(cfg.pass.is_none());
    }

    #[test]
    fn test_config_missing_dbname() {
        let mut table = toml::Table::new();
        table.insert("user".to_string(), toml::Value::String("app".into()));
        assert!(PsqlConfig::from_table(&table).is_err());
    }

    #[test]
    fn test_psql_imports_cover_qualified_types() {
        let imports = PsqlDriver.imports().unwrap();
        assert!(imports
            .paths_for("chrono::NaiveDateTime")
            .any(|p| p == "chrono"));
        assert_eq!(imports.paths_for("i32").count(), 0);
    }
}
