//! Draining the queue to iLert
//!
//! Events are sent one at a time, oldest first. Each response is classified
//! into a [`Delivery`], which alone decides whether the event file is
//! deleted. A failing event never stops the rest of the drain.

use crate::config::ApiConfig;
use crate::error::Result;
use crate::event::Event;
use crate::queue::{QueueStore, QueuedEvent};

use super::transport::{Transport, TransportError, TransportResponse};

/// What happens to a queued event after one send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// iLert accepted the event; delete it
    Accepted,
    /// Transient failure; keep it for the next drain
    Retain,
    /// Permanently rejected; delete it, retrying cannot succeed
    Discard,
}

impl Delivery {
    /// Whether the event file should be deleted
    pub fn removes_event(self) -> bool {
        matches!(self, Delivery::Accepted | Delivery::Discard)
    }
}

/// Classify an HTTP status.
///
/// 429 is rate limiting and is retried. Every other 4xx is discarded,
/// including 401/403, so a wrong API key drops its events.
pub fn classify_status(status: u16) -> Delivery {
    match status {
        200..=299 => Delivery::Accepted,
        429 => Delivery::Retain,
        400..=499 => Delivery::Discard,
        _ => Delivery::Retain,
    }
}

/// Outcome counts of one drain
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    /// Accepted by iLert and removed
    pub delivered: usize,
    /// Rejected by iLert and removed
    pub discarded: usize,
    /// Kept for a later drain
    pub retained: usize,
    /// Unreadable event files
    pub skipped: usize,
}

impl DrainReport {
    /// Number of events a send was attempted for
    pub fn attempted(&self) -> usize {
        self.delivered + self.discarded + self.retained
    }
}

/// Sends queued events through a [`Transport`]
pub struct Dispatcher<T> {
    transport: T,
    base_url: String,
}

impl<T: Transport> Dispatcher<T> {
    /// Create a dispatcher targeting the configured endpoint and port
    pub fn new(transport: T, config: &ApiConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url(),
        }
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `<endpoint>:<port>/api/v1/events/zabbix/<api_key>`
    pub fn event_url(&self, api_key: &str) -> String {
        format!(
            "{}/api/v1/events/zabbix/{}",
            self.base_url,
            urlencoding::encode(api_key)
        )
    }

    /// Attempt delivery of every queued event once.
    ///
    /// Must run under the queue lock. Only a failure to list the queue is
    /// returned as an error; per-event failures are logged and counted.
    pub fn drain(&self, store: &QueueStore) -> Result<DrainReport> {
        let queued = store.list_committed()?;
        let mut report = DrainReport::default();

        for entry in &queued {
            let event = match store.read_event(entry) {
                Ok(event) => event,
                Err(e) => {
                    tracing::debug!(
                        path = %entry.path.display(),
                        error = %e,
                        "Skipping unreadable event"
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            let delivery = self.deliver(entry, &event);
            match delivery {
                Delivery::Accepted => report.delivered += 1,
                Delivery::Discard => report.discarded += 1,
                Delivery::Retain => report.retained += 1,
            }

            if delivery.removes_event() {
                match store.remove_event(entry) {
                    Ok(()) if delivery == Delivery::Accepted => tracing::info!(
                        path = %entry.path.display(),
                        "Event has been sent to iLert and removed from event directory"
                    ),
                    Ok(()) => tracing::info!(
                        path = %entry.path.display(),
                        "Rejected event removed from event directory"
                    ),
                    Err(e) => tracing::warn!(
                        path = %entry.path.display(),
                        error = %e,
                        "Could not remove event file, it will be sent again"
                    ),
                }
            }
        }

        if !queued.is_empty() {
            tracing::info!(
                delivered = report.delivered,
                discarded = report.discarded,
                retained = report.retained,
                skipped = report.skipped,
                "Drain complete"
            );
        }

        Ok(report)
    }

    /// Send one event and log the outcome
    fn deliver(&self, entry: &QueuedEvent, event: &Event) -> Delivery {
        let body = match event.to_json() {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(
                    path = %entry.path.display(),
                    kind = "serialize",
                    error = %e,
                    "An unexpected error occurred, please report a bug"
                );
                return Delivery::Retain;
            }
        };

        tracing::info!(path = %entry.path.display(), "Sending event to iLert");

        match self.transport.post(&self.event_url(&event.api_key), body) {
            Ok(response) => log_response(entry, &response),
            Err(TransportError::Network(reason)) => {
                tracing::error!(
                    path = %entry.path.display(),
                    reason = %reason,
                    "Could not send event to iLert"
                );
                Delivery::Retain
            }
            Err(TransportError::Unexpected { kind, message }) => {
                tracing::error!(
                    path = %entry.path.display(),
                    kind = %kind,
                    error = %message,
                    "An unexpected error occurred, please report a bug"
                );
                Delivery::Retain
            }
        }
    }
}

fn log_response(entry: &QueuedEvent, response: &TransportResponse) -> Delivery {
    let delivery = classify_status(response.status);

    match delivery {
        Delivery::Accepted => {}
        Delivery::Retain if response.status == 429 => tracing::warn!(
            path = %entry.path.display(),
            response = %response.body,
            "Too many requests, will try later"
        ),
        Delivery::Discard => tracing::warn!(
            path = %entry.path.display(),
            status = response.status,
            response = %response.body,
            "Event not accepted by iLert"
        ),
        Delivery::Retain => tracing::error!(
            path = %entry.path.display(),
            status = response.status,
            reason = %response.reason,
            response = %response.body,
            "Could not send event to iLert"
        ),
    }

    delivery
}
