//! Parameter/column type comparison for binary expressions.

use pg_query::protobuf::{ColumnRef, Node, ParamRef};
use pg_query::NodeEnum;
use tracing::debug;

use crate::catalog::ImportCollection;
use crate::diagnostics::{Call, Diagnostic, TypeMismatch};

use super::scope::{Resolution, Scope};
use super::{split_column_ref, ColumnParts};

/// Check a binary expression's operands: when exactly one side is a
/// column reference and the other a `$n` parameter, compare the call
/// argument's type to the column's driver type.
pub(crate) fn type_check(
    imports: &ImportCollection,
    call: &Call,
    scope: &Scope<'_>,
    lexpr: Option<&Node>,
    rexpr: Option<&Node>,
) -> Option<Diagnostic> {
    let lhs = lexpr?.node.as_ref()?;
    let rhs = rexpr?.node.as_ref()?;

    let mut column_ref: Option<&ColumnRef> = None;
    let mut param_ref: Option<&ParamRef> = None;
    for side in [lhs, rhs] {
        match side {
            NodeEnum::ColumnRef(c) => column_ref = Some(c),
            NodeEnum::ParamRef(p) => param_ref = Some(p),
            _ => {}
        }
    }
    let (column_ref, param) = (column_ref?, param_ref?);

    let ColumnParts::Name {
        schema,
        table,
        column,
    } = split_column_ref(column_ref)
    else {
        panic!("type check against a star column reference");
    };

    let (col, ret) = scope.get(&schema, &table, &column);
    if ret != Resolution::Ok {
        // Unknown and ambiguous identifiers are reported by the
        // identifier check; repeating them here would double up.
        return None;
    }
    // An Ok resolution with no column is an aliased expression
    // (`select 't' as hello`) used against a parameter; nothing to
    // compare.
    let col = col?;

    let index = (param.number - 1).max(0) as usize;
    if index >= call.arg_types.len() {
        return Some(Diagnostic::TypeMismatch(TypeMismatch {
            schema,
            table,
            column,
            call_type: "<none>".to_string(),
            driver_type: col.driver_type.clone(),
            db_type: col.db_type.clone(),
            parameter: param.number,
            location: param.location,
            call: call.clone(),
        }));
    }
    let arg_type = &call.arg_types[index];

    if let Some(pkg) = qualified_prefix(&col.driver_type) {
        let resolved = imports
            .paths_for(&col.driver_type)
            .any(|path| last_segment(path) == pkg);
        if !resolved {
            return Some(Diagnostic::Other {
                message: format!(
                    "failed to lookup package for driver type: {}",
                    col.driver_type
                ),
                call: call.clone(),
            });
        }
        debug!(driver_type = %col.driver_type, pkg, "resolved driver type import");
    }

    if arg_type != &col.driver_type {
        return Some(Diagnostic::TypeMismatch(TypeMismatch {
            schema,
            table,
            column,
            call_type: arg_type.clone(),
            driver_type: col.driver_type.clone(),
            db_type: col.db_type.clone(),
            parameter: param.number,
            location: param.location,
            call: call.clone(),
        }));
    }

    None
}

/// The package prefix of a qualified driver type (`chrono` for
/// `chrono::NaiveDateTime`). Generic wrappers like `Option<...>` are not
/// qualified and compare directly.
fn qualified_prefix(driver_type: &str) -> Option<&str> {
    let (pkg, rest) = driver_type.split_once("::")?;
    if pkg.is_empty() || rest.is_empty() {
        return None;
    }
    pkg.chars()
        .all(|c| c.is_alphanumeric() || c == '_')
        .then_some(pkg)
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_prefix() {
        assert_eq!(qualified_prefix("chrono::NaiveDateTime"), Some("chrono"));
        assert_eq!(qualified_prefix("i32"), None);
        assert_eq!(qualified_prefix("Option<String>"), None);
        assert_eq!(qualified_prefix("Option<chrono::NaiveDateTime>"), None);
        assert_eq!(
            qualified_prefix("chrono::DateTime<chrono::Utc>"),
            Some("chrono")
        );
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("chrono"), "chrono");
        assert_eq!(last_segment("jiff::civil"), "civil");
    }
}
