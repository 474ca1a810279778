//! Request and response bodies.
//!
//! A [`Payload`] owns a content source plus [`ContentMetadata`]. Sources are
//! opened lazily: every call to [`Payload::open`] produces a fresh
//! [`ByteStream`] positioned at the start of the content, which is what lets
//! the executor re-send a body on retry or redirect.
//!
//! | Source | Repeatable |
//! |--------|------------|
//! | bytes / string | yes |
//! | file | yes (reopened from disk) |
//! | stream factory | yes (factory invoked per open) |
//! | one-shot stream | no |
//!
//! A payload is released exactly once. After [`Payload::release`] every
//! `open` fails with [`PayloadError::Released`].

mod error;
mod metadata;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, Stream, StreamExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, trace};

pub use error::PayloadError;
pub use metadata::ContentMetadata;

/// A boxed stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

type StreamFactory = Arc<dyn Fn() -> io::Result<ByteStream> + Send + Sync>;

enum Source {
    Bytes(Bytes),
    File(PathBuf),
    Factory(StreamFactory),
    OneShot(Mutex<Option<ByteStream>>),
}

impl Source {
    fn kind(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes",
            Self::File(_) => "file",
            Self::Factory(_) => "factory",
            Self::OneShot(_) => "one-shot",
        }
    }
}

/// An opaque, lazily-openable byte source with content metadata.
pub struct Payload {
    source: Source,
    metadata: ContentMetadata,
    released: AtomicBool,
}

impl Payload {
    fn with_source(source: Source, length: Option<u64>) -> Self {
        Self {
            source,
            metadata: ContentMetadata {
                length,
                ..ContentMetadata::default()
            },
            released: AtomicBool::new(false),
        }
    }

    /// Creates an in-memory payload.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let length = bytes.len() as u64;
        Self::with_source(Source::Bytes(bytes), Some(length))
    }

    /// Creates an in-memory UTF-8 payload with a `text/plain` type.
    #[must_use]
    pub fn from_string(text: impl Into<String>) -> Self {
        let mut payload = Self::from_bytes(Bytes::from(text.into()));
        payload.metadata.content_type = Some("text/plain; charset=utf-8".to_string());
        payload
    }

    /// Creates a payload backed by a file that is reopened on every send.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Io`] if the file metadata cannot be read.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, PayloadError> {
        let path = path.into();
        let length = std::fs::metadata(&path)
            .map_err(|e| PayloadError::io(path.clone(), e))?
            .len();
        Ok(Self::with_source(Source::File(path), Some(length)))
    }

    /// Creates a repeatable payload from a factory producing fresh streams.
    #[must_use]
    pub fn from_stream_factory<F>(factory: F) -> Self
    where
        F: Fn() -> io::Result<ByteStream> + Send + Sync + 'static,
    {
        Self::with_source(Source::Factory(Arc::new(factory)), None)
    }

    /// Creates a single-use payload from an already-open stream.
    ///
    /// The payload can be opened once; retries and redirects that need to
    /// re-read it fail with [`PayloadError::NotReplayable`].
    #[must_use]
    pub fn from_stream(stream: ByteStream) -> Self {
        Self::with_source(Source::OneShot(Mutex::new(Some(stream))), None)
    }

    /// Replaces the content metadata.
    ///
    /// A length already known from the source is kept when the new metadata
    /// does not declare one.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ContentMetadata) -> Self {
        let length = metadata.length.or(self.metadata.length);
        self.metadata = ContentMetadata { length, ..metadata };
        self
    }

    /// Sets the MIME type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.metadata.content_type = Some(content_type.into());
        self
    }

    /// Returns the content metadata.
    #[must_use]
    pub fn metadata(&self) -> &ContentMetadata {
        &self.metadata
    }

    /// Returns whether the content can be opened more than once.
    #[must_use]
    pub fn is_repeatable(&self) -> bool {
        !matches!(self.source, Source::OneShot(_))
    }

    /// Returns the content when it is held in memory.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match &self.source {
            Source::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns the backing file, if any.
    #[must_use]
    pub fn file_path(&self) -> Option<&Path> {
        match &self.source {
            Source::File(path) => Some(path),
            _ => None,
        }
    }

    /// Returns whether [`release`](Self::release) has been called.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Opens the content source from the start.
    ///
    /// # Errors
    ///
    /// - [`PayloadError::Released`] after the payload was released
    /// - [`PayloadError::NotReplayable`] on a second open of a one-shot stream
    /// - [`PayloadError::Io`] / [`PayloadError::Stream`] if the source fails to open
    pub async fn open(&self) -> Result<ByteStream, PayloadError> {
        if self.is_released() {
            return Err(PayloadError::Released);
        }
        trace!(source = self.source.kind(), "opening payload");
        match &self.source {
            Source::Bytes(bytes) => {
                let bytes = bytes.clone();
                Ok(Box::pin(stream::iter(std::iter::once(Ok(bytes)))))
            }
            Source::File(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| PayloadError::io(path.clone(), e))?;
                Ok(Box::pin(ReaderStream::new(file)))
            }
            Source::Factory(factory) => factory().map_err(PayloadError::stream),
            Source::OneShot(slot) => slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
                .ok_or(PayloadError::NotReplayable),
        }
    }

    /// Reads the content into memory, stopping after `limit` bytes.
    ///
    /// Bytes past the limit are left unread; the result is truncated.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`open`](Self::open), or [`PayloadError::Stream`]
    /// if a chunk fails to read.
    pub async fn read_to_bytes(&self, limit: usize) -> Result<Bytes, PayloadError> {
        if let Source::Bytes(bytes) = &self.source {
            if self.is_released() {
                return Err(PayloadError::Released);
            }
            return Ok(bytes.slice(..bytes.len().min(limit)));
        }

        let mut stream = self.open().await?;
        let mut buffer = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(PayloadError::stream)?;
            let remaining = limit - buffer.len();
            if chunk.len() >= remaining {
                buffer.extend_from_slice(&chunk[..remaining]);
                break;
            }
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }

    /// Releases the content source.
    ///
    /// Returns `true` only for the call that performed the release; later
    /// calls are no-ops returning `false`.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Source::OneShot(slot) = &self.source {
            slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        }
        debug!(source = self.source.kind(), "payload released");
        true
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("source", &self.source.kind())
            .field("metadata", &self.metadata)
            .field("released", &self.is_released())
            .finish()
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<&'static str> for Payload {
    fn from(text: &'static str) -> Self {
        Self::from_string(text)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::from_string(text)
    }
}
