//! Error types for payload content sources.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while opening or reading a [`Payload`](super::Payload).
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload was released and its content source closed.
    #[error("payload has already been released")]
    Released,

    /// The content source is single-use and has already been opened.
    #[error("payload content source cannot be reopened")]
    NotReplayable,

    /// Opening a file-backed payload failed.
    #[error("IO error opening payload file {path}: {source}")]
    Io {
        /// The file backing the payload.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Reading from the content stream failed.
    #[error("IO error streaming payload: {source}")]
    Stream {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl PayloadError {
    /// Creates a file IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a stream read error.
    pub fn stream(source: std::io::Error) -> Self {
        Self::Stream { source }
    }
}
