//! Error types and Result alias for rstags.

use std::fmt;
use std::io;

/// Broad error categories surfaced by the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Read/write/stat/open failure on a database or source file
    Io,
    /// Wrong header, impossible fid, dangling forward/reverse entry
    Corrupt,
    /// Database written by an incompatible version
    VersionMismatch,
    /// Key (or key+value) exceeds the index size limit
    KeyTooLarge,
    /// insert-unique on a key that already exists
    Duplicate,
    /// Fid space or nesting-depth exhaustion
    Overflow,
    /// Unrecoverable parse failure for one file
    Parse,
    /// Bad flag combination; surfaced by the driver only
    Usage,
}

impl ErrorCode {
    fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Io => "I/O error",
            ErrorCode::Corrupt => "corrupt database",
            ErrorCode::VersionMismatch => "version mismatch",
            ErrorCode::KeyTooLarge => "key too large",
            ErrorCode::Duplicate => "duplicate key",
            ErrorCode::Overflow => "overflow",
            ErrorCode::Parse => "parse error",
            ErrorCode::Usage => "usage error",
        }
    }
}

/// Library error: a code plus an optional detail message.
#[derive(Debug)]
pub struct Error {
    code: ErrorCode,
    message: Option<String>,
}

impl Error {
    pub fn new(code: ErrorCode) -> Self {
        Error {
            code,
            message: None,
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Error {
            code,
            message: Some(message.into()),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {}", self.code.as_str(), msg),
            None => f.write_str(self.code.as_str()),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::with_message(ErrorCode::Io, err.to_string())
    }
}

/// Result type alias for rstags operations.
pub type Result<T> = std::result::Result<T, Error>;
