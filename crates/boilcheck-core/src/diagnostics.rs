//! Diagnostic data types shared by extraction and checking.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a node in a host source file. Orders by filename, then
/// line, then column.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct FilePos {
    pub filename: String,
    pub line: usize,
    pub column: usize,
}

impl FilePos {
    pub fn new(filename: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            filename: filename.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for FilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}

/// A whitelisted database call found in a host source file, with the SQL
/// it executes and the static types of its positional arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub sql: String,
    pub arg_types: Vec<String>,
    pub package: String,
    pub pos: FilePos,
}

/// A non-fatal problem found during extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub message: String,
    pub pos: FilePos,
}

impl Warning {
    pub fn new(message: impl Into<String>, pos: FilePos) -> Self {
        Self {
            message: message.into(),
            pos,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.pos, self.message)
    }
}

/// Whether an identifier failed to resolve at all or resolved to more
/// than one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentKind {
    Unknown,
    Ambiguous,
}

/// An identifier the database does not know about, or one that several
/// in-scope tables could satisfy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnknownIdent {
    pub kind: IdentKind,
    pub schema: String,
    pub table: String,
    pub column: String,
    /// Byte offset into the SQL string.
    pub location: i32,
    pub call: Call,
}

impl UnknownIdent {
    fn ident(&self) -> String {
        let mut ident = match (self.table.is_empty(), self.column.is_empty()) {
            (false, false) => format!("{}.{}", self.table, self.column),
            (_, false) => self.column.clone(),
            _ => self.table.clone(),
        };
        if !self.schema.is_empty() && self.schema != "public" {
            ident = format!("{}.{}", self.schema, ident);
        }
        ident
    }
}

impl fmt::Display for UnknownIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self.kind {
            IdentKind::Ambiguous => "ambiguous identifier in sql statement",
            IdentKind::Unknown => "unknown identifier in sql statement",
        };
        write!(
            f,
            "{} {}: {} at pos {}",
            self.call.pos,
            msg,
            self.ident(),
            self.location
        )
    }
}

/// A call argument whose static type does not match the driver type of
/// the column its parameter is compared against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeMismatch {
    pub schema: String,
    pub table: String,
    pub column: String,
    pub call_type: String,
    pub driver_type: String,
    pub db_type: String,
    /// 1-based positional parameter index (`$n`).
    pub parameter: i32,
    /// Byte offset of the parameter reference in the SQL string.
    pub location: i32,
    pub call: Call,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ident = self.column.clone();
        if !self.table.is_empty() {
            ident = format!("{}.{}", self.table, ident);
        }
        if !self.schema.is_empty() && self.schema != "public" {
            ident = format!("{}.{}", self.schema, ident);
        }
        write!(
            f,
            "{} type mismatch, {:?} has type {:?} (db: {}) but parameter ${} (pos {}) is {:?}",
            self.call.pos,
            ident,
            self.driver_type,
            self.db_type,
            self.parameter,
            self.location,
            self.call_type
        )
    }
}

/// A SQL string that failed to parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseFailure {
    pub cause: String,
    pub call: Call,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} parse error: {}", self.call.pos, self.cause)
    }
}

/// A per-call diagnostic produced by the SQL checker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Diagnostic {
    UnknownIdent(UnknownIdent),
    TypeMismatch(TypeMismatch),
    Parse(ParseFailure),
    /// Generic per-call failure, e.g. a driver type whose package could
    /// not be resolved from the driver's imports.
    Other { message: String, call: Call },
}

impl Diagnostic {
    /// The call this diagnostic was produced for.
    pub fn call(&self) -> &Call {
        match self {
            Diagnostic::UnknownIdent(d) => &d.call,
            Diagnostic::TypeMismatch(d) => &d.call,
            Diagnostic::Parse(d) => &d.call,
            Diagnostic::Other { call, .. } => call,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownIdent(d) => d.fmt(f),
            Diagnostic::TypeMismatch(d) => d.fmt(f),
            Diagnostic::Parse(d) => d.fmt(f),
            Diagnostic::Other { message, call } => {
                write!(f, "{} {}", call.pos, message)
            }
        }
    }
}
