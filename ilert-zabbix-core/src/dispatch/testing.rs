//! Scripted transport for unit tests.

use std::sync::Mutex;

use super::transport::{Transport, TransportError, TransportResponse};

type Reply = Result<TransportResponse, TransportError>;

/// A request seen by [`ScriptedTransport`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedCall {
    pub url: String,
    pub body: serde_json::Value,
}

/// Answers every request with the result of a closure and records it.
pub(crate) struct ScriptedTransport {
    reply: Box<dyn Fn(&str, &serde_json::Value) -> Reply + Send + Sync>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new(reply: impl Fn(&str, &serde_json::Value) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            reply: Box::new(reply),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every request gets the same status and body
    pub fn always(status: u16, body: &'static str) -> Self {
        Self::new(move |_, _| Ok(TransportResponse::new(status, body)))
    }

    /// Every request fails without a response
    pub fn unreachable(reason: &'static str) -> Self {
        Self::new(move |_, _| Err(TransportError::Network(reason.to_string())))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn post(&self, url: &str, body: Vec<u8>) -> Reply {
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        self.calls.lock().unwrap().push(RecordedCall {
            url: url.to_string(),
            body: body.clone(),
        });
        (self.reply)(url, &body)
    }
}
