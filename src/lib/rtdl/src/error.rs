//! Definitions for errors for the runtime linker.
//!
//! The `Display` text of every [DlErrorKind] is part of the caller-facing contract: callers
//! pattern-match on these strings, so they must not change.

use miette::Diagnostic;
use thiserror::Error;

use crate::{module::Handle, soname::Soname};

#[derive(Debug, Error, Diagnostic)]
#[error("{kind}")]
pub struct DlError {
    pub kind: DlErrorKind,
    #[related]
    pub related: Vec<DlError>,
}

impl DlError {
    pub fn new_collect(kind: DlErrorKind, related: Vec<DlError>) -> Self {
        Self { kind, related }
    }

    pub fn new(kind: DlErrorKind) -> Self {
        Self {
            kind,
            related: vec![],
        }
    }

    /// Wrap this error as the cause of a new, outer error.
    pub fn context(self, kind: DlErrorKind) -> Self {
        Self::new_collect(kind, vec![self])
    }
}

impl From<DlErrorKind> for DlError {
    fn from(value: DlErrorKind) -> Self {
        Self {
            kind: value,
            related: vec![],
        }
    }
}

impl From<std::collections::TryReserveError> for DlError {
    fn from(_value: std::collections::TryReserveError) -> Self {
        DlErrorKind::AllocationFailure {
            what: "module list entry".into(),
        }
        .into()
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum DlErrorKind {
    #[error("{name} not found")]
    NotFound { name: Soname },
    #[error("invalid mode parameter")]
    InvalidMode { mode: i32 },
    #[error("cannot open dependency: {name}")]
    MissingDependency { name: Soname, needed_by: Soname },
    #[error("{module}: undefined symbol: {symbol}")]
    MissingSymbol { module: Soname, symbol: String },
    #[error("{root}: undefined symbol: {symbol}")]
    UndefinedSymbol { root: Soname, symbol: String },
    #[error("{module}: thread-local symbol '{symbol}' is not supported")]
    UnsupportedTls { module: Soname, symbol: String },
    #[error("invalid handle {handle}")]
    InvalidHandle { handle: Handle },
    #[error("cannot allocate {what}")]
    AllocationFailure { what: String },
    #[error("cannot open {name}: {reason}")]
    RetrieveFailed { name: Soname, reason: String },
    #[error("{module}: {reason}")]
    DecodeFailed { module: Soname, reason: String },
    #[error("{module}: {reason}")]
    RelocationFailed { module: Soname, reason: String },
    #[error("name already exists: {name}")]
    NameAlreadyExists { name: Soname },
}
