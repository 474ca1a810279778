//! Content metadata carried alongside a payload.

use crate::http::headers::find_header;
use crate::integrity::{ContentDigest, DigestAlgorithm};

pub(crate) const CONTENT_LENGTH: &str = "Content-Length";
pub(crate) const CONTENT_TYPE: &str = "Content-Type";
pub(crate) const CONTENT_ENCODING: &str = "Content-Encoding";
pub(crate) const CONTENT_DISPOSITION: &str = "Content-Disposition";
pub(crate) const CONTENT_LANGUAGE: &str = "Content-Language";
pub(crate) const CONTENT_MD5: &str = "Content-MD5";

/// Descriptive metadata for a payload body.
///
/// On requests the transport writes these values as `Content-*` headers
/// unless the request already carries an explicit header of the same name.
/// On responses they are populated from the received headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentMetadata {
    /// Body length in bytes, when known up front.
    pub length: Option<u64>,
    /// MIME type (`Content-Type`).
    pub content_type: Option<String>,
    /// Transfer encoding applied to the body (`Content-Encoding`).
    pub content_encoding: Option<String>,
    /// Presentation hint (`Content-Disposition`).
    pub content_disposition: Option<String>,
    /// Natural language of the body (`Content-Language`).
    pub content_language: Option<String>,
    /// Declared digest of the body. Only MD5 digests map to a header.
    pub digest: Option<ContentDigest>,
}

impl ContentMetadata {
    /// Creates empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the body length.
    #[must_use]
    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    /// Sets the MIME type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the content encoding.
    #[must_use]
    pub fn with_content_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.content_encoding = Some(encoding.into());
        self
    }

    /// Sets the content disposition.
    #[must_use]
    pub fn with_content_disposition(mut self, disposition: impl Into<String>) -> Self {
        self.content_disposition = Some(disposition.into());
        self
    }

    /// Sets the content language.
    #[must_use]
    pub fn with_content_language(mut self, language: impl Into<String>) -> Self {
        self.content_language = Some(language.into());
        self
    }

    /// Sets the declared digest.
    #[must_use]
    pub fn with_digest(mut self, digest: ContentDigest) -> Self {
        self.digest = Some(digest);
        self
    }

    /// Renders the metadata as HTTP headers, in a stable order.
    #[must_use]
    pub fn to_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if let Some(content_type) = &self.content_type {
            headers.push((CONTENT_TYPE.to_string(), content_type.clone()));
        }
        if let Some(length) = self.length {
            headers.push((CONTENT_LENGTH.to_string(), length.to_string()));
        }
        if let Some(encoding) = &self.content_encoding {
            headers.push((CONTENT_ENCODING.to_string(), encoding.clone()));
        }
        if let Some(disposition) = &self.content_disposition {
            headers.push((CONTENT_DISPOSITION.to_string(), disposition.clone()));
        }
        if let Some(language) = &self.content_language {
            headers.push((CONTENT_LANGUAGE.to_string(), language.clone()));
        }
        if let Some(digest) = &self.digest
            && digest.algorithm() == DigestAlgorithm::Md5
        {
            headers.push((CONTENT_MD5.to_string(), digest.to_base64()));
        }
        headers
    }

    /// Reads metadata from response headers.
    ///
    /// Unparseable `Content-Length` or `Content-MD5` values are ignored.
    #[must_use]
    pub fn from_headers(headers: &[(String, String)]) -> Self {
        let owned = |name: &str| find_header(headers, name).map(str::to_string);
        Self {
            length: find_header(headers, CONTENT_LENGTH).and_then(|v| v.trim().parse().ok()),
            content_type: owned(CONTENT_TYPE),
            content_encoding: owned(CONTENT_ENCODING),
            content_disposition: owned(CONTENT_DISPOSITION),
            content_language: owned(CONTENT_LANGUAGE),
            digest: find_header(headers, CONTENT_MD5)
                .and_then(|v| ContentDigest::from_base64(DigestAlgorithm::Md5, v.trim()).ok()),
        }
    }
}
