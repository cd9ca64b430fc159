//! Host-language (Rust) package loading.
//!
//! A package is a directory of `.rs` files. Patterns are globs relative
//! to the root directory; everything is loaded and sorted up front so
//! repeated runs produce identical output.

mod comments;
mod typeinfo;

pub use comments::{CommentMap, MARKER};
pub use typeinfo::{render_path, render_type, ConstDecl, TypeInfo};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::diagnostics::FilePos;
use crate::error::{Error, Result};

/// A parsed Rust source file.
#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub source: String,
    pub ast: syn::File,
    pub comments: CommentMap,
}

impl SourceFile {
    /// Host-file position of a span, 1-based line and column.
    pub fn pos(&self, span: proc_macro2::Span) -> FilePos {
        let start = span.start();
        FilePos::new(
            self.path.display().to_string(),
            start.line,
            start.column + 1,
        )
    }

    pub fn pos_at_line(&self, line: usize) -> FilePos {
        FilePos::new(self.path.display().to_string(), line, 1)
    }
}

/// A directory of source files.
#[derive(Debug)]
pub struct Package {
    /// Last path component, e.g. `testpkg`.
    pub name: String,
    /// Package path relative to the root directory, e.g. `./src/db`.
    pub path: String,
    pub files: Vec<SourceFile>,
    /// Parse failures, surfaced verbatim by the caller.
    pub errors: Vec<String>,
}

/// Load packages matching the given patterns under `dir`. An empty
/// pattern list loads every `.rs` file below the directory.
pub fn load_packages(dir: &Path, patterns: &[String]) -> Result<Vec<Package>> {
    let default_patterns = vec!["**/*.rs".to_string()];
    let patterns = if patterns.is_empty() {
        &default_patterns
    } else {
        patterns
    };

    let mut paths: Vec<PathBuf> = Vec::new();
    for pattern in patterns {
        let full = dir.join(pattern);
        let full = full.to_string_lossy().into_owned();
        let entries = glob::glob(&full).map_err(|source| Error::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        for entry in entries {
            let path = entry.map_err(|e| {
                let path = e.path().to_path_buf();
                Error::Io {
                    path,
                    source: e.into_error(),
                }
            })?;
            if path.is_dir() {
                collect_dir(&path, &mut paths)?;
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                paths.push(path);
            }
        }
    }

    paths.retain(|p| !p.components().any(|c| c.as_os_str() == "target"));
    paths.sort();
    paths.dedup();

    let mut by_dir: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for path in paths {
        let parent = path.parent().unwrap_or(Path::new("")).to_path_buf();
        by_dir.entry(parent).or_default().push(path);
    }

    let mut packages = Vec::new();
    for (parent, files) in by_dir {
        let pkg_path = package_path(dir, &parent);
        let name = parent
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| pkg_path.clone());
        debug!(package = %pkg_path, files = files.len(), "loading package");

        let mut package = Package {
            name,
            path: pkg_path,
            files: Vec::new(),
            errors: Vec::new(),
        };
        for path in files {
            let source = std::fs::read_to_string(&path).map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;
            match syn::parse_file(&source) {
                Ok(ast) => {
                    let comments = CommentMap::new(&source);
                    package.files.push(SourceFile {
                        path,
                        source,
                        ast,
                        comments,
                    });
                }
                Err(e) => {
                    package
                        .errors
                        .push(format!("{}: {}", path.display(), e));
                }
            }
        }
        packages.push(package);
    }

    Ok(packages)
}

fn collect_dir(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| Error::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "rs") {
            out.push(path);
        }
    }
    Ok(())
}

fn package_path(root: &Path, dir: &Path) -> String {
    match dir.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => format!("./{}", rel.display()),
        Err(_) => dir.display().to_string(),
    }
}
