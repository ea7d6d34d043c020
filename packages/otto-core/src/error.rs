//! # Error Handling
//!
//! Error types for the Otto binding.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                      │
//! │  │                                                                      │
//! │  ├── Native Errors                                                      │
//! │  │   └── Native               - non-OK status (code + optional text)    │
//! │  │                                                                      │
//! │  ├── Misuse Errors (raised before any native call)                      │
//! │  │   ├── HandleReleased       - handle was already closed               │
//! │  │   ├── InvalidArgument      - NUL byte, bad path, empty id, ...       │
//! │  │   ├── AlreadyFinished      - finish()/sign() called twice            │
//! │  │   └── BufferTooLarge       - native buffer exceeds address space     │
//! │  │                                                                      │
//! │  ├── Library Errors                                                     │
//! │  │   ├── LibraryNotFound      - no libotto in the given directory       │
//! │  │   ├── LibraryLoad          - dlopen / LoadLibrary failed             │
//! │  │   └── MissingSymbol        - library lacks an expected function      │
//! │  │                                                                      │
//! │  └── Conversion Errors                                                  │
//! │      ├── Io                   - std::io failure                         │
//! │      └── InvalidUtf8          - native text is not UTF-8                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Streams
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       ERROR FLOW IN STREAMS                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  status 7 ──► check() ──► Error::Native { code: 7, "checksum mismatch" }│
//! │                               │                                         │
//! │                               ▼                                         │
//! │               io::Error (kind Other, wraps Error)                       │
//! │                               │                                         │
//! │                               ▼                                         │
//! │               Error::from_io() recovers the structured error            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::ffi::{OttoApi, StatusCode};

/// Result type alias for Otto operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Otto binding
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Native Errors
    // ========================================================================

    /// The native library returned a non-OK status
    #[error("Otto error {code}: {}", message.as_deref().unwrap_or("no error text"))]
    Native {
        /// Status code returned by the library
        code: StatusCode,
        /// Text resolved via the library's error-text lookup, if any
        message: Option<String>,
    },

    // ========================================================================
    // Misuse Errors (900-949)
    // ========================================================================

    /// A handle of the named kind was used after it was released
    #[error("{0} handle has already been released")]
    HandleReleased(&'static str),

    /// An argument was rejected before reaching the library
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A send session or checksum was used after it was finalized
    #[error("Operation has already been finalized")]
    AlreadyFinished,

    /// A native buffer reported a size that does not fit in memory
    #[error("Native buffer of {0} bytes is too large")]
    BufferTooLarge(u64),

    // ========================================================================
    // Library Errors (950-979)
    // ========================================================================

    /// The shared library file was not found
    #[error("Otto library not found at {}", .0.display())]
    LibraryNotFound(PathBuf),

    /// The shared library could not be loaded
    #[error("Failed to load Otto library: {0}")]
    LibraryLoad(String),

    /// The shared library lacks an expected function
    #[error("Otto library is missing symbol {0}")]
    MissingSymbol(String),

    // ========================================================================
    // Conversion Errors (980-999)
    // ========================================================================

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Text returned by the library was not valid UTF-8
    #[error("Native text is not valid UTF-8")]
    InvalidUtf8,
}

impl Error {
    /// Build a native error, looking up its text through the library.
    ///
    /// A failed or empty lookup leaves `message` as `None`; the code is
    /// always preserved.
    pub fn native(api: &dyn OttoApi, code: StatusCode) -> Self {
        let message = api.error_text(code).filter(|text| !text.is_empty());
        Error::Native { code, message }
    }

    /// Get a numeric error code
    ///
    /// Native errors report the library's own status code. Errors raised
    /// by the binding use a local range:
    /// - 900-949: Misuse
    /// - 950-979: Library loading
    /// - 980-999: Conversion
    pub fn code(&self) -> i32 {
        match self {
            Error::Native { code, .. } => code.value(),

            Error::HandleReleased(_) => 900,
            Error::InvalidArgument(_) => 901,
            Error::AlreadyFinished => 902,
            Error::BufferTooLarge(_) => 903,

            Error::LibraryNotFound(_) => 950,
            Error::LibraryLoad(_) => 951,
            Error::MissingSymbol(_) => 952,

            Error::Io(_) => 980,
            Error::InvalidUtf8 => 981,
        }
    }

    /// The native status code, for errors reported by the library
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Native { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The native error text, if the library provided one
    pub fn message(&self) -> Option<&str> {
        match self {
            Error::Native { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Whether this is a precondition violation by the caller
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            Error::HandleReleased(_)
                | Error::InvalidArgument(_)
                | Error::AlreadyFinished
                | Error::BufferTooLarge(_)
        )
    }

    /// Wrap this error for a `Read`/`Write` caller.
    pub fn into_io(self) -> io::Error {
        match self {
            Error::Io(e) => e,
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }

    /// Recover the structured error from an I/O error produced by a stream.
    pub fn from_io(err: io::Error) -> Self {
        if !err.get_ref().map_or(false, |inner| inner.is::<Error>()) {
            return Error::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => Error::Io(io::Error::new(kind, other)),
            None => Error::Io(kind.into()),
        }
    }
}

/// Translate a native status: OK passes, anything else becomes [`Error::Native`].
pub fn check(api: &dyn OttoApi, status: StatusCode) -> Result<()> {
    if status.is_ok() {
        Ok(())
    } else {
        Err(Error::native(api, status))
    }
}
