//! In-memory transport that replays a script of outcomes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{StreamExt, stream};

use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::payload::{ByteStream, Payload};
use crate::transport::{Transport, TransportError};

#[derive(Debug)]
enum Step {
    Respond {
        status: u16,
        headers: Vec<(String, String)>,
        body: Option<Bytes>,
    },
    StalledBody {
        status: u16,
    },
    Timeout,
    ConnectionReset,
    Hang,
}

/// One request as the transport saw it.
#[derive(Debug, Clone)]
pub struct RecordedSend {
    pub method: HttpMethod,
    pub endpoint: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Replays scripted outcomes in order; once the script runs out every send
/// gets `200` with an empty body.
///
/// Request bodies are drained completely before the outcome is produced.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    sends: Mutex<Vec<RecordedSend>>,
    started: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, step: Step) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(step);
        self
    }

    pub fn then_status(self, status: u16) -> Self {
        self.push(Step::Respond {
            status,
            headers: Vec::new(),
            body: None,
        })
    }

    pub fn then_body(self, status: u16, body: &'static str) -> Self {
        self.push(Step::Respond {
            status,
            headers: Vec::new(),
            body: Some(Bytes::from_static(body.as_bytes())),
        })
    }

    pub fn then_redirect(self, status: u16, location: &str) -> Self {
        self.push(Step::Respond {
            status,
            headers: vec![("Location".to_string(), location.to_string())],
            body: None,
        })
    }

    /// Responds with `status` and a body that never yields a chunk.
    pub fn then_stalled_body(self, status: u16) -> Self {
        self.push(Step::StalledBody { status })
    }

    pub fn then_timeout(self) -> Self {
        self.push(Step::Timeout)
    }

    pub fn then_connection_reset(self) -> Self {
        self.push(Step::ConnectionReset)
    }

    pub fn then_hang(self) -> Self {
        self.push(Step::Hang)
    }

    /// Sends that reached the transport, including ones still in flight.
    pub fn send_count(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Sends whose request body was fully read.
    pub fn sends(&self) -> Vec<RecordedSend> {
        self.sends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &HttpRequest,
        body: Option<ByteStream>,
    ) -> Result<HttpResponse, TransportError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let endpoint = request.endpoint().to_string();

        let mut received = BytesMut::new();
        if let Some(mut body) = body {
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| TransportError::connection(endpoint.clone(), e))?;
                received.extend_from_slice(&chunk);
            }
        }
        self.sends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedSend {
                method: request.method(),
                endpoint: endpoint.clone(),
                headers: request.headers().to_vec(),
                body: received.freeze(),
            });

        let step = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match step {
            None => Ok(HttpResponse::new(200)),
            Some(Step::Respond {
                status,
                headers,
                body,
            }) => {
                let response = HttpResponse::new(status).with_headers(headers);
                Ok(match body {
                    Some(body) => response.with_payload(body),
                    None => response,
                })
            }
            Some(Step::StalledBody { status }) => {
                let body: ByteStream = Box::pin(stream::pending());
                Ok(HttpResponse::new(status).with_payload(Payload::from_stream(body)))
            }
            Some(Step::Timeout) => Err(TransportError::timeout(endpoint)),
            Some(Step::ConnectionReset) => Err(TransportError::connection(
                endpoint,
                std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset by peer"),
            )),
            Some(Step::Hang) => std::future::pending().await,
        }
    }
}
