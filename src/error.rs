//! Error types for archive operations.
//!
//! Every hard failure surfaces as a [`ZipError`]. The outcome of a password
//! check is deliberately not an error: it is reported through
//! [`DecryptStatus`](crate::DecryptStatus) because the 16-bit header check
//! can accept a wrong password.

use std::io;
use thiserror::Error;

/// The error type for archive operations.
#[derive(Debug, Error)]
pub enum ZipError {
    /// I/O error from the underlying stream, passed through untouched.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The caller supplied something the archive cannot work with, such as a
    /// stream lacking the capabilities the open mode requires.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The archive bytes violate the format.
    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    /// The archive uses a feature this engine recognizes but does not implement.
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// The operation is not allowed in the current mode or state.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// The entry is encrypted and no password was set before opening it.
    #[error("Entry {name:?} is encrypted and no password was set")]
    EntryEncrypted {
        /// Name of the encrypted entry.
        name: String,
    },
}

/// Fieldless discriminant of [`ZipError`], handy for matching in callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`ZipError::Io`].
    Io,
    /// See [`ZipError::InvalidArgument`].
    InvalidArgument,
    /// See [`ZipError::MalformedArchive`].
    MalformedArchive,
    /// See [`ZipError::UnsupportedFeature`].
    UnsupportedFeature,
    /// See [`ZipError::IllegalState`].
    IllegalState,
    /// See [`ZipError::EntryEncrypted`].
    EntryEncrypted,
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, ZipError>;

impl ZipError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a malformed archive error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedArchive(message.into())
    }

    /// Create an unsupported feature error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedFeature(message.into())
    }

    /// Create an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }

    /// Create an encrypted entry error.
    pub fn entry_encrypted(name: impl Into<String>) -> Self {
        Self::EntryEncrypted { name: name.into() }
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::MalformedArchive(_) => ErrorKind::MalformedArchive,
            Self::UnsupportedFeature(_) => ErrorKind::UnsupportedFeature,
            Self::IllegalState(_) => ErrorKind::IllegalState,
            Self::EntryEncrypted { .. } => ErrorKind::EntryEncrypted,
        }
    }

    /// Convert into an [`io::Error`] for use inside `Read`/`Write` impls.
    ///
    /// I/O errors are unwrapped rather than nested.
    pub(crate) fn into_io(self) -> io::Error {
        match self {
            Self::Io(e) => e,
            other => io::Error::other(other),
        }
    }
}
