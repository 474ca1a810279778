//! Content digests over streamed bodies.
//!
//! Digests are computed incrementally as bytes flow past, so neither the
//! upload path nor the download path buffers an entire body:
//!
//! - Upload: the executor wraps the opened request stream with [`tap_stream`]
//!   and records the digest of the bytes the transport actually consumed on
//!   the response ([`HttpResponse::request_digest`](crate::http::HttpResponse::request_digest)).
//!   Mismatches against a declared `Content-MD5` are for the caller to judge.
//! - Download: [`verify_payload`] / [`verify_stream`] consume a body chunk by
//!   chunk and compare the final digest with an expected one.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use sha2::Digest as _;
use thiserror::Error;
use tracing::debug;

use crate::payload::{ByteStream, Payload, PayloadError};

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// MD5, as used by `Content-MD5`.
    Md5,
    /// SHA-256.
    Sha256,
}

impl DigestAlgorithm {
    /// Digest length in bytes.
    #[must_use]
    pub fn digest_length(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha256 => 32,
        }
    }

    /// Lowercase algorithm label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
        }
    }
}

/// Errors decoding a textual digest.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DigestParseError {
    /// Not valid hexadecimal.
    #[error("invalid hex digest")]
    InvalidHex,
    /// Not valid base64.
    #[error("invalid base64 digest")]
    InvalidBase64,
    /// Decoded length does not match the algorithm.
    #[error("invalid {algorithm} digest length: expected {expected} bytes, got {actual}")]
    WrongLength {
        /// Algorithm label.
        algorithm: &'static str,
        /// Expected byte length.
        expected: usize,
        /// Decoded byte length.
        actual: usize,
    },
}

/// A computed or declared digest value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentDigest {
    algorithm: DigestAlgorithm,
    bytes: Vec<u8>,
}

impl ContentDigest {
    fn checked(algorithm: DigestAlgorithm, bytes: Vec<u8>) -> Result<Self, DigestParseError> {
        if bytes.len() != algorithm.digest_length() {
            return Err(DigestParseError::WrongLength {
                algorithm: algorithm.as_str(),
                expected: algorithm.digest_length(),
                actual: bytes.len(),
            });
        }
        Ok(Self { algorithm, bytes })
    }

    /// Computes the digest of an in-memory buffer.
    #[must_use]
    pub fn compute(algorithm: DigestAlgorithm, data: &[u8]) -> Self {
        let mut digester = Digester::new(algorithm);
        digester.update(data);
        digester.finalize()
    }

    /// Parses a hex-encoded digest (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`DigestParseError`] on bad encoding or length.
    pub fn from_hex(algorithm: DigestAlgorithm, hex_digest: &str) -> Result<Self, DigestParseError> {
        let bytes = hex::decode(hex_digest.trim()).map_err(|_| DigestParseError::InvalidHex)?;
        Self::checked(algorithm, bytes)
    }

    /// Parses a base64-encoded digest, the `Content-MD5` header form.
    ///
    /// # Errors
    ///
    /// Returns [`DigestParseError`] on bad encoding or length.
    pub fn from_base64(
        algorithm: DigestAlgorithm,
        encoded: &str,
    ) -> Result<Self, DigestParseError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| DigestParseError::InvalidBase64)?;
        Self::checked(algorithm, bytes)
    }

    /// The algorithm that produced this digest.
    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex encoding.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Standard base64 encoding.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.as_str(), self.to_hex())
    }
}

/// Incremental digest computation.
#[derive(Clone)]
pub enum Digester {
    /// MD5 state.
    Md5(md5::Md5),
    /// SHA-256 state.
    Sha256(sha2::Sha256),
}

impl Digester {
    /// Creates a fresh digester.
    #[must_use]
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Md5 => Self::Md5(md5::Md5::new()),
            DigestAlgorithm::Sha256 => Self::Sha256(sha2::Sha256::new()),
        }
    }

    /// Feeds bytes into the digest.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(state) => state.update(data),
            Self::Sha256(state) => state.update(data),
        }
    }

    /// Finishes the computation.
    #[must_use]
    pub fn finalize(self) -> ContentDigest {
        match self {
            Self::Md5(state) => ContentDigest {
                algorithm: DigestAlgorithm::Md5,
                bytes: state.finalize().to_vec(),
            },
            Self::Sha256(state) => ContentDigest {
                algorithm: DigestAlgorithm::Sha256,
                bytes: state.finalize().to_vec(),
            },
        }
    }
}

impl fmt::Debug for Digester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let algorithm = match self {
            Self::Md5(_) => DigestAlgorithm::Md5,
            Self::Sha256(_) => DigestAlgorithm::Sha256,
        };
        f.debug_tuple("Digester").field(&algorithm).finish()
    }
}

#[derive(Debug)]
struct TapState {
    digester: Option<Digester>,
    bytes_seen: u64,
}

/// Shared view of a digest being computed by a [`tap_stream`] wrapper.
#[derive(Debug, Clone)]
pub struct DigestHandle {
    state: Arc<Mutex<TapState>>,
}

impl DigestHandle {
    fn record(&self, chunk: &[u8]) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.bytes_seen += chunk.len() as u64;
        if let Some(digester) = state.digester.as_mut() {
            digester.update(chunk);
        }
    }

    /// Number of bytes that have passed through the tapped stream so far.
    #[must_use]
    pub fn bytes_seen(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .bytes_seen
    }

    /// Finalizes the digest over the bytes seen so far.
    ///
    /// Returns `None` if the digest was already finalized.
    #[must_use]
    pub fn finish(&self) -> Option<ContentDigest> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .digester
            .take()
            .map(Digester::finalize)
    }
}

/// Wraps a stream so every chunk read through it feeds a digest.
///
/// The returned stream yields the same items as `stream`.
#[must_use]
pub fn tap_stream(stream: ByteStream, algorithm: DigestAlgorithm) -> (ByteStream, DigestHandle) {
    let handle = DigestHandle {
        state: Arc::new(Mutex::new(TapState {
            digester: Some(Digester::new(algorithm)),
            bytes_seen: 0,
        })),
    };
    let recorder = handle.clone();
    let tapped: ByteStream = Box::pin(stream.inspect(move |item| {
        if let Ok(chunk) = item {
            recorder.record(chunk);
        }
    }));
    (tapped, handle)
}

/// Outcome of comparing a body against an expected digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The computed digest equals the expected one.
    Match,
    /// The computed digest differs.
    Mismatch {
        /// Digest the caller expected.
        expected: ContentDigest,
        /// Digest computed from the body.
        actual: ContentDigest,
    },
}

impl Verification {
    /// Returns `true` for [`Verification::Match`].
    #[must_use]
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Computes the digest of a stream, consuming it chunk by chunk.
///
/// # Errors
///
/// Returns [`PayloadError::Stream`] if a chunk fails to read.
pub async fn digest_stream(
    mut stream: ByteStream,
    algorithm: DigestAlgorithm,
) -> Result<ContentDigest, PayloadError> {
    let mut digester = Digester::new(algorithm);
    while let Some(chunk) = stream.next().await {
        digester.update(&chunk.map_err(PayloadError::stream)?);
    }
    Ok(digester.finalize())
}

/// Computes the digest of a payload's content.
///
/// # Errors
///
/// Returns the errors of [`Payload::open`] and [`digest_stream`].
pub async fn digest_payload(
    payload: &Payload,
    algorithm: DigestAlgorithm,
) -> Result<ContentDigest, PayloadError> {
    digest_stream(payload.open().await?, algorithm).await
}

/// Compares a stream against an expected digest without buffering it.
///
/// # Errors
///
/// Returns [`PayloadError::Stream`] if a chunk fails to read.
pub async fn verify_stream(
    stream: ByteStream,
    expected: &ContentDigest,
) -> Result<Verification, PayloadError> {
    let actual = digest_stream(stream, expected.algorithm()).await?;
    if actual == *expected {
        Ok(Verification::Match)
    } else {
        debug!(expected = %expected, actual = %actual, "digest mismatch");
        Ok(Verification::Mismatch {
            expected: expected.clone(),
            actual,
        })
    }
}

/// Compares a payload's content against an expected digest.
///
/// # Errors
///
/// Returns the errors of [`Payload::open`] and [`verify_stream`].
pub async fn verify_payload(
    payload: &Payload,
    expected: &ContentDigest,
) -> Result<Verification, PayloadError> {
    verify_stream(payload.open().await?, expected).await
}
