//! Diagnostic output: warnings and parse errors to stderr, identifier
//! and type diagnostics to stdout grouped by package.

use std::path::Path;

use boilcheck_core::diagnostics::{Call, Diagnostic, FilePos, Warning};
use boilcheck_core::host::Package;

/// Rewrite a position's filename relative to the root directory, `./`
/// prefixed, where a relative path exists.
pub fn relativize(dir: &Path, pos: &mut FilePos) {
    if let Ok(rel) = Path::new(&pos.filename).strip_prefix(dir) {
        pos.filename = format!("./{}", rel.display());
    }
}

pub fn print_warnings(warns: &[Warning]) {
    for warn in warns {
        eprintln!("warning: {warn}");
    }
}

/// Print diagnostics grouped under `# <package-path>` headers, each
/// exactly once and in the order the checker produced them. Diagnostics
/// whose call belongs to no loaded package land in a trailing synthesized
/// group. Parse errors go to stderr instead.
pub fn print_diagnostics(
    packages: &[Package],
    calls: &[Call],
    diags: &[Diagnostic],
    verbose: bool,
) {
    let mut printed = vec![false; diags.len()];

    for (idx, diag) in diags.iter().enumerate() {
        if matches!(diag, Diagnostic::Parse(_)) {
            printed[idx] = true;
            eprintln!("{diag}");
        }
    }

    for package in packages {
        let mut group = Group::new(&package.path);

        if verbose {
            for call in calls.iter().filter(|c| c.package == package.path) {
                group.header();
                println!("{} check", call.pos);
            }
        }

        for (idx, diag) in diags.iter().enumerate() {
            if printed[idx] || diag.call().package != package.path {
                continue;
            }
            printed[idx] = true;
            group.header();
            println!("{diag}");
        }
    }

    let mut other = Group::new("other");
    for (idx, diag) in diags.iter().enumerate() {
        if printed[idx] {
            continue;
        }
        other.header();
        println!("{diag}");
    }
}

struct Group<'a> {
    path: &'a str,
    printed: bool,
}

impl<'a> Group<'a> {
    fn new(path: &'a str) -> Self {
        Self {
            path,
            printed: false,
        }
    }

    fn header(&mut self) {
        if !self.printed {
            println!("# {}", self.path);
            self.printed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relativize() {
        let mut pos = FilePos::new("proj/src/main.rs", 1, 1);
        relativize(Path::new("proj"), &mut pos);
        assert_eq!(pos.filename, "./src/main.rs");
    }

    #[test]
    fn test_relativize_outside_root_is_untouched() {
        let mut pos = FilePos::new("/elsewhere/main.rs", 1, 1);
        relativize(Path::new("proj"), &mut pos);
        assert_eq!(pos.filename, "/elsewhere/main.rs");
    }
}
