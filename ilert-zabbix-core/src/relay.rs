//! Enqueue and flush, the two operations behind the CLI modes.

use crate::config::Config;
use crate::dispatch::{Dispatcher, DrainReport, HttpTransport, Transport};
use crate::error::Result;
use crate::event::Event;
use crate::queue::{with_exclusive_lock, FileLock, QueueLock, QueueStore};

/// Queue store, drain lock and dispatcher for one queue directory
pub struct Relay<L = FileLock, T = HttpTransport> {
    store: QueueStore,
    lock: L,
    dispatcher: Dispatcher<T>,
}

impl Relay {
    /// Build the production relay: queue at `queue.dir`, flock on its
    /// `lockfile`, HTTP transport to `api`.
    ///
    /// Creates the queue directory if it is missing. The HTTP client is only
    /// built when the first event is sent, so it cannot keep an event from
    /// being saved.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = QueueStore::open(&config.queue.dir)?;
        let lock = FileLock::new(store.dir());
        let transport = HttpTransport::new(&config.api)?;
        let dispatcher = Dispatcher::new(transport, &config.api);

        Ok(Self::new(store, lock, dispatcher))
    }
}

impl<L: QueueLock, T: Transport> Relay<L, T> {
    pub fn new(store: QueueStore, lock: L, dispatcher: Dispatcher<T>) -> Self {
        Self {
            store,
            lock,
            dispatcher,
        }
    }

    pub fn store(&self) -> &QueueStore {
        &self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    /// Persist `event`, then flush the queue.
    ///
    /// A write failure is returned before anything is sent.
    pub fn enqueue(&self, event: &Event) -> Result<DrainReport> {
        self.store.write_event(event)?;
        self.flush()
    }

    /// Drain the queue while holding the lock.
    ///
    /// Blocks while another process is draining the same directory.
    pub fn flush(&self) -> Result<DrainReport> {
        with_exclusive_lock(&self.lock, || self.dispatcher.drain(&self.store))
    }
}
