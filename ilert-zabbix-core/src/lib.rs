//! # ilert-zabbix-core
//!
//! Core library for ilert-zabbix - relays Zabbix alerts to iLert.
//!
//! This library provides:
//! - The event document sent to the iLert Zabbix events API
//! - A durable on-disk queue with atomic writes and a drain lock
//! - A dispatcher applying the retry/discard policy per response
//! - Configuration and logging infrastructure
//!
//! ## Delivery
//!
//! Every event is written to the queue before any network activity, then the
//! whole queue is drained. Events are deleted only once iLert accepts them
//! or rejects them for good, which gives at-least-once delivery across
//! crashes and outages.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ilert_zabbix_core::{Config, Event, EventType, Relay};
//!
//! let config = Config::load().expect("failed to load config");
//! let relay = Relay::from_config(&config).expect("failed to open queue");
//!
//! let mut payload = serde_json::Map::new();
//! payload.insert("hostname".into(), "web1".into());
//! relay
//!     .enqueue(&Event::new("abc123", EventType::Alert, payload))
//!     .expect("failed to save event");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use dispatch::{Delivery, Dispatcher, DrainReport};
pub use error::{Error, Result};
pub use event::{Event, EventType, Payload, PLUGIN_VERSION};
pub use queue::{QueueLock, QueueStore};
pub use relay::Relay;

// Public modules
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod logging;
pub mod queue;
pub mod relay;
