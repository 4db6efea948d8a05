//! HTTP transport for the iLert events API
//!
//! The dispatcher talks to iLert through the [`Transport`] trait so the
//! retry/discard policy can be exercised without a network.

use std::error::Error as StdError;
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use thiserror::Error;

use crate::config::ApiConfig;
use crate::error::Result;

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Canonical reason phrase for the status, empty if unknown
    pub reason: String,
    /// Response body as text
    pub body: String,
}

impl TransportResponse {
    /// Response with the canonical reason phrase filled in
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            reason,
            body: body.into(),
        }
    }
}

/// A request that produced no HTTP response
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection, timeout or other network-level failure
    #[error("{0}")]
    Network(String),

    /// Anything else that went wrong while sending
    #[error("{kind}: {message}")]
    Unexpected { kind: String, message: String },
}

/// Sends one serialized event to iLert
pub trait Transport {
    /// POST `body` to `url` and wait for the response
    fn post(
        &self,
        url: &str,
        body: Vec<u8>,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

/// reqwest-backed [`Transport`] with a blocking interface
///
/// The HTTP client and its runtime are built on the first request, so a
/// setup failure surfaces as a failed send rather than before an event has
/// been queued.
pub struct HttpTransport {
    timeout: Duration,
    connection: OnceLock<std::result::Result<Connection, String>>,
}

/// HTTP client plus the runtime that drives it
struct Connection {
    http_client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl Connection {
    fn build(timeout: Duration) -> std::result::Result<Self, String> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .user_agent(concat!("ilert-zabbix/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| format!("failed to create HTTP client: {}", error_chain(&e)))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("failed to create runtime: {}", e))?;

        Ok(Self {
            http_client,
            runtime,
        })
    }

    async fn send(
        &self,
        url: &str,
        body: Vec<u8>,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let response = self
            .http_client
            .post(url)
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());

        Ok(TransportResponse::new(status.as_u16(), body))
    }
}

impl HttpTransport {
    /// Create a transport from the API configuration
    ///
    /// Returns an error if the configuration is invalid. No network
    /// resources are allocated until the first request.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            timeout: config.timeout(),
            connection: OnceLock::new(),
        })
    }

    fn connection(&self) -> std::result::Result<&Connection, TransportError> {
        self.connection
            .get_or_init(|| Connection::build(self.timeout))
            .as_ref()
            .map_err(|message| TransportError::Unexpected {
                kind: "setup".to_string(),
                message: message.clone(),
            })
    }

    /// Whether the client has been built
    pub fn is_connected(&self) -> bool {
        matches!(self.connection.get(), Some(Ok(_)))
    }
}

impl Transport for HttpTransport {
    fn post(
        &self,
        url: &str,
        body: Vec<u8>,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let connection = self.connection()?;
        connection.runtime.block_on(connection.send(url, body))
    }
}

#[cfg(test)]
impl HttpTransport {
    /// Transport whose client setup already failed with `message`
    pub(crate) fn with_failed_setup(message: &str) -> Self {
        let transport = Self {
            timeout: Duration::from_secs(1),
            connection: OnceLock::new(),
        };
        let _ = transport.connection.set(Err(message.to_string()));
        transport
    }
}

/// Network-level failures are worth retrying; the rest is reported as unexpected.
fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    let message = error_chain(&error);

    if error.is_timeout() || error.is_connect() || error.is_request() {
        TransportError::Network(message)
    } else {
        let kind = if error.is_builder() {
            "builder"
        } else if error.is_redirect() {
            "redirect"
        } else if error.is_body() {
            "body"
        } else if error.is_decode() {
            "decode"
        } else {
            "unknown"
        };
        TransportError::Unexpected {
            kind: kind.to_string(),
            message,
        }
    }
}

/// Render an error with its sources, e.g. `error sending request: connection refused`
fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_requires_valid_config() {
        let config = ApiConfig {
            endpoint: String::new(),
            ..Default::default()
        };
        assert!(HttpTransport::new(&config).is_err());
    }

    #[test]
    fn test_transport_with_default_config() {
        let transport = HttpTransport::new(&ApiConfig::default()).unwrap();
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_setup_failure_is_reported_per_request() {
        let transport =
            HttpTransport::with_failed_setup("failed to create runtime: out of threads");

        let err = transport
            .post("http://127.0.0.1:1/api/v1/events/zabbix/key", b"{}".to_vec())
            .unwrap_err();
        assert_eq!(
            err,
            TransportError::Unexpected {
                kind: "setup".to_string(),
                message: "failed to create runtime: out of threads".to_string(),
            }
        );
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_response_reason_phrase() {
        assert_eq!(TransportResponse::new(429, "").reason, "Too Many Requests");
        assert_eq!(TransportResponse::new(503, "").reason, "Service Unavailable");
        assert_eq!(TransportResponse::new(599, "").reason, "");
    }

    #[test]
    fn test_connection_refused_is_network_error() {
        // Bind then drop a listener to get a port nobody is listening on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let transport = HttpTransport::new(&ApiConfig {
            endpoint: "http://127.0.0.1".to_string(),
            port,
            timeout_secs: 5,
        })
        .unwrap();

        let url = format!("http://127.0.0.1:{port}/api/v1/events/zabbix/key");
        let err = transport.post(&url, b"{}".to_vec()).unwrap_err();
        assert!(matches!(err, TransportError::Network(_)), "got {err:?}");
        assert!(transport.is_connected());
    }

    #[test]
    fn test_error_chain_includes_sources() {
        #[derive(Debug, Error)]
        #[error("request failed")]
        struct Wrapper(#[source] std::io::Error);
        let wrapped = Wrapper(std::io::Error::new(std::io::ErrorKind::Other, "refused"));
        assert_eq!(error_chain(&wrapped), "request failed: refused");
    }
}
