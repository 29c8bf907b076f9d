//! Crate error types
//!
//! Structural damage inside a container is never reported through these
//! errors: the parser degrades to a partial or empty model and records
//! [`Defect`](crate::ebml::Defect) values instead. `Error` covers the two
//! remaining categories: I/O failures on the underlying byte source, and
//! caller misuse.

use std::fmt;
use std::io;

/// Result type for tag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while opening, editing, or saving a file
#[derive(Debug)]
pub enum Error {
    /// I/O error reading or writing the underlying byte source
    Io(io::Error),

    /// No Matroska segment was recognized in the source, so there is no
    /// container to carry a tag region
    NoSegment,

    /// The file was constructed from bytes and has no backing path; use
    /// `save_to` or `render` instead of `save`
    NoPath,

    /// A simple tag name must be non-empty
    EmptyTagName,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::NoSegment => {
                write!(f, "no Matroska segment found, nothing to write tags into")
            }
            Error::NoPath => {
                write!(f, "file has no backing path; use save_to() or render()")
            }
            Error::EmptyTagName => write!(f, "simple tag name must be non-empty"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_distinguishes_categories() {
        let io_err = Error::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("I/O"));
        assert!(Error::NoSegment.to_string().contains("segment"));
        assert!(Error::EmptyTagName.to_string().contains("non-empty"));
    }

    #[test]
    fn test_io_source_preserved() {
        use std::error::Error as _;
        let err = Error::from(io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        assert!(err.source().is_some());
        assert!(Error::NoPath.source().is_none());
    }
}
