//! Durable local event queue
//!
//! Events are stored one per file in a flat directory:
//!
//! - `<uuid>.ilert`: committed event, JSON
//! - `<uuid>.tmp`: event still being written, never read
//! - `lockfile`: flock target serializing drains
//!
//! Writers never take the lock; each write uses a fresh id and an atomic
//! rename. Drains run under [`with_exclusive_lock`].

mod fsync;
mod lock;
mod store;

pub use lock::{with_exclusive_lock, FileLock, FileLockGuard, QueueLock, LOCK_FILE};
pub use store::{QueueStore, QueuedEvent, EVENT_EXTENSION, TEMP_EXTENSION};
