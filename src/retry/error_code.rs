//! Extraction of machine-readable provider error codes from error bodies.
//!
//! Providers report throttling and maintenance conditions inside the body of
//! a `503` response, either as XML (`<Error><Code>RequestLimitExceeded</Code>
//! ...`) or as JSON (`{"error": {"code": "ServerBusy"}}`). A parser returns
//! `None` both when the body is malformed and when it carries no code; the
//! retry policy treats either as "do not retry".

use std::fmt::Debug;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde_json::Value;
use tracing::trace;

/// Extracts a provider error code from a buffered response body.
pub trait ErrorCodeParser: Send + Sync + Debug {
    /// Returns the error code, or `None` if the body is malformed or has no
    /// code.
    fn parse(&self, body: &[u8]) -> Option<String>;
}

/// Reads the text of the first element with a given local name.
#[derive(Debug, Clone)]
pub struct XmlErrorCodeParser {
    element: String,
}

impl Default for XmlErrorCodeParser {
    fn default() -> Self {
        Self::new("Code")
    }
}

impl XmlErrorCodeParser {
    /// Creates a parser reading `<element>`.
    #[must_use]
    pub fn new(element: impl Into<String>) -> Self {
        Self {
            element: element.into(),
        }
    }
}

impl ErrorCodeParser for XmlErrorCodeParser {
    fn parse(&self, body: &[u8]) -> Option<String> {
        let mut reader = Reader::from_reader(body);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        let mut in_code = false;
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(start)) => {
                    in_code = start.local_name().as_ref() == self.element.as_bytes();
                }
                Ok(Event::Text(text)) if in_code => {
                    let value = text.unescape().ok()?;
                    let value = value.trim();
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
                Ok(Event::End(_)) => in_code = false,
                Ok(Event::Eof) => return None,
                Err(e) => {
                    trace!(error = %e, "malformed XML error body");
                    return None;
                }
                Ok(_) => {}
            }
            buf.clear();
        }
    }
}

/// Reads `code`, `Code` or `error.code` from a JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonErrorCodeParser;

impl ErrorCodeParser for JsonErrorCodeParser {
    fn parse(&self, body: &[u8]) -> Option<String> {
        let value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                trace!(error = %e, "malformed JSON error body");
                return None;
            }
        };
        ["code", "Code"]
            .iter()
            .find_map(|key| value.get(key))
            .or_else(|| value.get("error").and_then(|error| error.get("code")))
            .and_then(code_text)
    }
}

fn code_text(value: &Value) -> Option<String> {
    match value {
        Value::String(code) if !code.is_empty() => Some(code.clone()),
        Value::Number(code) => Some(code.to_string()),
        _ => None,
    }
}

/// Chooses the JSON or XML parser from the first non-whitespace byte.
#[derive(Debug, Clone, Default)]
pub struct DetectingErrorCodeParser {
    xml: XmlErrorCodeParser,
    json: JsonErrorCodeParser,
}

impl ErrorCodeParser for DetectingErrorCodeParser {
    fn parse(&self, body: &[u8]) -> Option<String> {
        match body.iter().find(|byte| !byte.is_ascii_whitespace())? {
            b'{' => self.json.parse(body),
            b'<' => self.xml.parse(body),
            _ => None,
        }
    }
}
