//! Delivery of queued events to the iLert events API
//!
//! ## Retry policy
//!
//! | Outcome | Event file |
//! |---|---|
//! | 2xx | deleted |
//! | 429 | kept |
//! | other 4xx | deleted |
//! | 5xx, other statuses | kept |
//! | network or unexpected failure | kept |
//!
//! Kept events are retried on every later drain. There is no backoff and no
//! retry limit; how often drains run is up to the caller (Zabbix).

mod dispatcher;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{classify_status, Delivery, Dispatcher, DrainReport};
pub use transport::{HttpTransport, Transport, TransportError, TransportResponse};
