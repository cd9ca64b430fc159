// Integration tests for tagged-constant and call extraction
use std::path::{Path, PathBuf};

use boilcheck_core::diagnostics::{Call, Warning};
use boilcheck_core::extract;
use boilcheck_core::host::{self, CommentMap, Package, SourceFile};

fn load_fixture() -> (Vec<Call>, Vec<Warning>) {
    let packages =
        host::load_packages(Path::new("tests/fixtures"), &["testpkg".to_string()])
            .expect("fixture loads");
    assert_eq!(packages.len(), 1, "expected one package");
    assert!(
        packages[0].errors.is_empty(),
        "fixture parse errors: {:?}",
        packages[0].errors
    );
    extract::find_tagged_calls(&packages)
}

/// Build an in-memory single-file package for focused cases.
fn package_from_source(source: &str) -> Package {
    let ast = syn::parse_file(source).expect("source parses");
    let comments = CommentMap::new(source);
    Package {
        name: "inline".to_string(),
        path: "./inline".to_string(),
        files: vec![SourceFile {
            path: PathBuf::from("inline/t.rs"),
            source: source.to_string(),
            ast,
            comments,
        }],
        errors: Vec::new(),
    }
}

fn extract_source(source: &str) -> (Vec<Call>, Vec<Warning>) {
    extract::find_tagged_calls(&[package_from_source(source)])
}

#[track_caller]
fn check_call(calls: &[Call], idx: usize, line: usize, sql: &str, args: &[&str]) {
    let call = &calls[idx];
    assert!(
        call.sql.contains(sql),
        "call {idx} sql should contain {sql:?}: {:?}",
        call.sql
    );
    assert_eq!(call.pos.line, line, "call {idx} line: {:?}", call.pos);
    let want: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    assert_eq!(call.arg_types, want, "call {idx} argument types");
    assert_eq!(call.package, "./testpkg", "call {idx} package");
}

#[test]
fn test_fixture_calls() {
    let (calls, _) = load_fixture();

    assert_eq!(calls.len(), 10, "calls: {calls:#?}");
    check_call(&calls, 0, 36, "select * from users;/", &["i32"]);
    check_call(&calls, 1, 41, "select * from users;/", &["sql::NullBool"]);
    check_call(&calls, 2, 45, "select * from videos;", &["i32"]);
    check_call(&calls, 3, 50, "select * from logs;", &["sql::NullBool"]);
    check_call(&calls, 4, 54, "select * from logs where id = $1;", &["i32"]);
    check_call(&calls, 5, 57, "select * from users;/", &["i32"]);
    check_call(&calls, 6, 61, "select * from users;", &["i32"]);
    check_call(&calls, 7, 64, "select * from tags;", &["i32"]);
    check_call(&calls, 8, 72, "select * from comments;", &["i32"]);
    check_call(&calls, 9, 76, "select * from logins;", &["i32"]);
}

#[test]
fn test_fixture_warnings() {
    let (_, warns) = load_fixture();

    assert_eq!(warns.len(), 2, "warnings: {warns:#?}");
    assert_eq!(warns[0].pos.line, 5, "warning: {:?}", warns[0]);
    assert!(
        warns[0].message.contains("not a constant"),
        "warning: {:?}",
        warns[0]
    );
    assert_eq!(warns[1].pos.line, 31, "warning: {:?}", warns[1]);
    assert!(
        warns[1]
            .message
            .contains("argument \"one\" to sql function is not a constant"),
        "warning: {:?}",
        warns[1]
    );
}

#[test]
fn test_tagged_constant_in_non_sql_function() {
    let source = "\
//sqlboiler:check
const Q: &str = \"select * from users;\";

fn main() {
    log(Q);
}
";
    let (calls, warns) = extract_source(source);
    assert!(calls.is_empty(), "calls: {calls:#?}");
    assert_eq!(warns.len(), 1, "warnings: {warns:#?}");
    assert!(
        warns[0].message.contains("tagged constant used in non-sql function"),
        "warning: {:?}",
        warns[0]
    );
    assert_eq!(warns[0].pos.line, 5);
}

#[test]
fn test_tagged_blank_constant() {
    let source = "\
//sqlboiler:check
const _: &str = \"select * from users;\";
";
    let (calls, warns) = extract_source(source);
    assert!(calls.is_empty());
    assert_eq!(warns.len(), 1, "warnings: {warns:#?}");
    assert!(
        warns[0].message.contains("blank identifier"),
        "warning: {:?}",
        warns[0]
    );
}

#[test]
fn test_tagged_non_string_constant() {
    let source = "\
//sqlboiler:check
const N: i32 = 5;
";
    let (calls, warns) = extract_source(source);
    assert!(calls.is_empty());
    assert_eq!(warns.len(), 1, "warnings: {warns:#?}");
    assert!(
        warns[0]
            .message
            .contains("could not determine type for tagged declaration"),
        "warning: {:?}",
        warns[0]
    );
}

#[test]
fn test_orphan_marker_warns() {
    let source = "\
fn main() {
    //sqlboiler:check
    // nothing taggable follows
}
";
    let (calls, warns) = extract_source(source);
    assert!(calls.is_empty());
    assert_eq!(warns.len(), 1, "warnings: {warns:#?}");
    assert!(
        warns[0]
            .message
            .contains("failed to find either function or constant"),
        "warning: {:?}",
        warns[0]
    );
    assert_eq!(warns[0].pos.line, 2);
}

#[test]
fn test_scoped_constant_is_invisible_in_other_functions() {
    let source = "\
fn first() {
    //sqlboiler:check
    const Q: &str = \"select * from users;\";
    db.Exec(Q, 5);
}

fn second() {
    //sqlboiler:check
    db.Exec(Q, 5);
}
";
    let (calls, warns) = extract_source(source);
    // Only first()'s call resolves; second() warns.
    assert_eq!(calls.len(), 1, "calls: {calls:#?}");
    assert_eq!(calls[0].pos.line, 4);
    assert_eq!(warns.len(), 1, "warnings: {warns:#?}");
    assert!(
        warns[0]
            .message
            .contains("argument \"Q\" to sql function is not a constant"),
        "warning: {:?}",
        warns[0]
    );
}

#[test]
fn test_context_call_offsets_sql_argument() {
    let source = "\
fn main() {
    //sqlboiler:check
    db.ExecContext(ctx(), \"select * from users where id = $1;\", 5);
}
";
    let (calls, warns) = extract_source(source);
    assert!(warns.is_empty(), "warnings: {warns:#?}");
    assert_eq!(calls.len(), 1, "calls: {calls:#?}");
    assert_eq!(calls[0].sql, "select * from users where id = $1;");
    assert_eq!(calls[0].arg_types, vec!["i32".to_string()]);
}

#[test]
fn test_unknown_argument_type_abandons_the_call() {
    let source = "\
fn main() {
    //sqlboiler:check
    db.Exec(\"select * from users where id = $1;\", mystery());
}
";
    let (calls, warns) = extract_source(source);
    assert!(calls.is_empty(), "calls: {calls:#?}");
    assert_eq!(warns.len(), 1, "warnings: {warns:#?}");
    assert!(
        warns[0].message.contains("argument 1 type unknown"),
        "warning: {:?}",
        warns[0]
    );
}

#[test]
fn test_rerun_is_identical() {
    let (first_calls, first_warns) = load_fixture();
    let (second_calls, second_warns) = load_fixture();

    assert_eq!(first_calls, second_calls);
    let render = |warns: &[Warning]| {
        warns.iter().map(ToString::to_string).collect::<Vec<_>>()
    };
    assert_eq!(render(&first_warns), render(&second_warns));
}
