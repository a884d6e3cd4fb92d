//! Error types for Mountfs
//!
//! Every filesystem operation fails with one of six POSIX-style kinds, no
//! matter which backing store served the call:
//!
//! | Code      | Variant                     | Meaning                                      |
//! |-----------|-----------------------------|----------------------------------------------|
//! | `EACCES`  | [`Error::AccessDenied`]     | address outside the store's base / no mount  |
//! | `ENOENT`  | [`Error::NotFound`]         | missing entry                                |
//! | `EEXIST`  | [`Error::AlreadyExists`]    | entry already present where one was created  |
//! | `EISDIR`  | [`Error::IsADirectory`]     | file operation on a directory                |
//! | `ENOTDIR` | [`Error::NotADirectory`]    | directory-only step on a file                |
//! | `EPERM`   | [`Error::PermissionDenied`] | unsupported by a read-only or limited store  |
//!
//! Construction of stores (loading snapshots, opening persisted state) reports
//! through [`SetupError`] instead, since those failures happen before any
//! address is involved.

use std::fmt;
use thiserror::Error;

/// Result type alias using Mountfs's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// POSIX-style symbolic error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// `EACCES`
    AccessDenied,
    /// `ENOENT`
    NotFound,
    /// `EEXIST`
    AlreadyExists,
    /// `EISDIR`
    IsADirectory,
    /// `ENOTDIR`
    NotADirectory,
    /// `EPERM`
    PermissionDenied,
}

impl ErrorCode {
    /// The symbolic code, e.g. `"ENOENT"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AccessDenied => "EACCES",
            ErrorCode::NotFound => "ENOENT",
            ErrorCode::AlreadyExists => "EEXIST",
            ErrorCode::IsADirectory => "EISDIR",
            ErrorCode::NotADirectory => "ENOTDIR",
            ErrorCode::PermissionDenied => "EPERM",
        }
    }

    /// Parse a symbolic code back into an [`ErrorCode`].
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "EACCES" => Some(ErrorCode::AccessDenied),
            "ENOENT" => Some(ErrorCode::NotFound),
            "EEXIST" => Some(ErrorCode::AlreadyExists),
            "EISDIR" => Some(ErrorCode::IsADirectory),
            "ENOTDIR" => Some(ErrorCode::NotADirectory),
            "EPERM" => Some(ErrorCode::PermissionDenied),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mountfs filesystem error.
///
/// Each variant carries an address-bearing message. The rendered form is
/// `"<CODE>: <message>"`, which is what language tooling consumers match on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Address is outside any store's base, or no mount matched.
    #[error("EACCES: {0}")]
    AccessDenied(String),

    /// Entry does not exist.
    #[error("ENOENT: {0}")]
    NotFound(String),

    /// Entry already exists.
    #[error("EEXIST: {0}")]
    AlreadyExists(String),

    /// File operation attempted on a directory.
    #[error("EISDIR: {0}")]
    IsADirectory(String),

    /// Directory-only step attempted on a file.
    #[error("ENOTDIR: {0}")]
    NotADirectory(String),

    /// Operation not supported by a read-only or capability-limited store,
    /// or the backing medium failed.
    #[error("EPERM: {0}")]
    PermissionDenied(String),
}

impl Error {
    /// Build an error of the given kind.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            ErrorCode::AccessDenied => Error::AccessDenied(message),
            ErrorCode::NotFound => Error::NotFound(message),
            ErrorCode::AlreadyExists => Error::AlreadyExists(message),
            ErrorCode::IsADirectory => Error::IsADirectory(message),
            ErrorCode::NotADirectory => Error::NotADirectory(message),
            ErrorCode::PermissionDenied => Error::PermissionDenied(message),
        }
    }

    /// Medium failure at `address`, reported as `EPERM` with the cause appended.
    pub fn medium(address: impl fmt::Display, cause: impl fmt::Display) -> Self {
        Error::PermissionDenied(format!("{address}: {cause}"))
    }

    /// The symbolic kind of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::AccessDenied(_) => ErrorCode::AccessDenied,
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::AlreadyExists(_) => ErrorCode::AlreadyExists,
            Error::IsADirectory(_) => ErrorCode::IsADirectory,
            Error::NotADirectory(_) => ErrorCode::NotADirectory,
            Error::PermissionDenied(_) => ErrorCode::PermissionDenied,
        }
    }

    /// Check whether this error is of the given kind.
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code() == code
    }

    /// The message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Error::AccessDenied(m)
            | Error::NotFound(m)
            | Error::AlreadyExists(m)
            | Error::IsADirectory(m)
            | Error::NotADirectory(m)
            | Error::PermissionDenied(m) => m,
        }
    }
}

/// Errors raised while constructing a store.
#[derive(Error, Debug)]
pub enum SetupError {
    /// Snapshot object graph is not a tree of base64 strings and mappings.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Persisted flat-store state could not be decoded.
    #[error("corrupt persisted state under key {key}: {reason}")]
    CorruptState { key: String, reason: String },

    /// The persistence medium failed.
    #[error("storage error: {0}")]
    Storage(#[from] crate::fs::StorageError),

    /// Mount table configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The handle API refused to hand out the store directory.
    #[error("handle error: {0}")]
    Handle(#[from] crate::fs::HandleError),

    /// I/O error while reading configuration or snapshot files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A filesystem operation failed during setup.
    #[error(transparent)]
    Fs(#[from] Error),
}
