//! Transport-independent HTTP request and response values.
//!
//! The provider binding layer builds [`HttpRequest`] values with
//! [`HttpRequestBuilder`]; the executor hands them to a
//! [`Transport`](crate::transport::Transport) and returns [`HttpResponse`]
//! values.
//!
//! # Example
//!
//! ```
//! use cloudcmd_core::http::{HttpMethod, HttpRequest};
//!
//! let request = HttpRequest::builder(HttpMethod::Put, "https://api.example.com/v1/volumes/9")
//!     .header("Content-Type", "application/json")
//!     .payload(r#"{"size":20}"#)
//!     .build()
//!     .unwrap();
//! assert_eq!(request.method(), HttpMethod::Put);
//! ```

pub mod headers;
mod method;
mod request;
mod response;

pub use headers::{RedactedHeaders, is_sensitive_header};
pub use method::{HttpMethod, UnsupportedMethod};
pub use request::{HttpRequest, HttpRequestBuilder, InvalidEndpoint};
pub use response::HttpResponse;
