//! Directory-backed event queue.
//!
//! Each pending event is one `<uuid>.ilert` file. Files are written as
//! `<uuid>.tmp`, synced, and renamed into place, so a `.ilert` file is always
//! a complete event document. The rename is the commit point.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use uuid::Uuid;

use crate::error::Result;
use crate::event::Event;

use super::fsync::{fsync_dir, fsync_file};

/// Extension of committed event files
pub const EVENT_EXTENSION: &str = "ilert";

/// Extension of event files still being written
pub const TEMP_EXTENSION: &str = "tmp";

/// A committed event file found in the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedEvent {
    /// Path to the `.ilert` file
    pub path: PathBuf,
    /// Modification time, used as creation time
    pub modified: SystemTime,
}

impl QueuedEvent {
    /// Queue id (the file stem)
    pub fn id(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }
}

/// Pending events stored as files in one directory
#[derive(Debug, Clone)]
pub struct QueueStore {
    dir: PathBuf,
}

impl QueueStore {
    /// Open the queue at `dir`, creating the directory and its parents if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Queue directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist an event and return the path of the committed file.
    ///
    /// On error no `.ilert` file has been created and the temp file is
    /// removed best-effort.
    pub fn write_event(&self, event: &Event) -> Result<PathBuf> {
        tracing::debug!("Writing event to disk");

        let bytes = event.to_json()?;
        let id = Uuid::new_v4();
        let path = self.dir.join(format!("{id}.{EVENT_EXTENSION}"));
        let temp_path = self.dir.join(format!("{id}.{TEMP_EXTENSION}"));

        if let Err(e) = self.commit(&temp_path, &path, &bytes) {
            tracing::error!(
                path = %path.display(),
                error = %e,
                "Could not write event"
            );
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        tracing::info!(path = %path.display(), "Created event file");
        Ok(path)
    }

    fn commit(&self, temp_path: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(temp_path)?;
            file.write_all(bytes)?;
            fsync_file(&file)?;
        }

        fs::rename(temp_path, path)?;

        // Committed from here on; a failed directory sync only weakens durability
        if let Err(e) = fsync_dir(&self.dir) {
            tracing::warn!(
                dir = %self.dir.display(),
                error = %e,
                "Could not sync queue directory"
            );
        }
        Ok(())
    }

    /// List committed events, oldest first.
    ///
    /// Ties on modification time are broken by file name. Files that
    /// disappear while listing are skipped.
    pub fn list_committed(&self) -> Result<Vec<QueuedEvent>> {
        let mut events = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();

            if !path.extension().is_some_and(|e| e == EVENT_EXTENSION) {
                continue;
            }

            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            events.push(QueuedEvent { path, modified });
        }

        events.sort_by(|a, b| {
            a.modified
                .cmp(&b.modified)
                .then_with(|| a.path.cmp(&b.path))
        });

        Ok(events)
    }

    /// Read and parse a queued event
    pub fn read_event(&self, queued: &QueuedEvent) -> Result<Event> {
        let bytes = fs::read(&queued.path)?;
        Ok(Event::from_json(&bytes)?)
    }

    /// Delete a queued event
    pub fn remove_event(&self, queued: &QueuedEvent) -> Result<()> {
        fs::remove_file(&queued.path)?;
        Ok(())
    }

    /// Number of committed events
    pub fn pending_count(&self) -> Result<usize> {
        Ok(self.list_committed()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use std::time::Duration;
    use tempfile::tempdir;

    fn sample_event(host: &str) -> Event {
        let mut payload = serde_json::Map::new();
        payload.insert("hostname".to_string(), host.into());
        Event::new("abc123", EventType::Alert, payload)
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        OpenOptions::new()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn open_creates_missing_directories() {
        let dir = tempdir().unwrap();
        let queue_dir = dir.path().join("nested/queue");

        let store = QueueStore::open(&queue_dir).unwrap();
        assert!(queue_dir.is_dir());
        assert_eq!(store.dir(), queue_dir.as_path());
    }

    #[test]
    fn write_event_commits_ilert_file() {
        let dir = tempdir().unwrap();
        let store = QueueStore::open(dir.path()).unwrap();

        let path = store.write_event(&sample_event("web1")).unwrap();

        assert_eq!(path.extension().unwrap(), EVENT_EXTENSION);
        assert!(Uuid::parse_str(path.file_stem().unwrap().to_str().unwrap()).is_ok());

        // No temp file is left behind
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);

        let written: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["api_key"], "abc123");
        assert_eq!(written["event_type"], "alert");
        assert_eq!(written["payload"]["hostname"], "web1");
        assert_eq!(written["payload"]["PLUGIN_VERSION"], "1.0");
    }

    #[test]
    fn write_event_uses_fresh_ids() {
        let dir = tempdir().unwrap();
        let store = QueueStore::open(dir.path()).unwrap();

        let first = store.write_event(&sample_event("web1")).unwrap();
        let second = store.write_event(&sample_event("web1")).unwrap();

        assert_ne!(first, second);
        assert_eq!(store.pending_count().unwrap(), 2);
    }

    #[test]
    fn failed_write_leaves_no_committed_file() {
        let dir = tempdir().unwrap();
        let queue_dir = dir.path().join("queue");
        let store = QueueStore::open(&queue_dir).unwrap();
        fs::remove_dir(&queue_dir).unwrap();

        let result = store.write_event(&sample_event("web1"));

        assert!(matches!(result, Err(crate::Error::Io(_))));
        assert!(!queue_dir.exists());
    }

    #[test]
    fn list_ignores_temp_files_and_lockfile() {
        let dir = tempdir().unwrap();
        let store = QueueStore::open(dir.path()).unwrap();

        fs::write(dir.path().join("lockfile"), b"").unwrap();
        fs::write(dir.path().join("partial.tmp"), b"{\"api_key\":").unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        let committed = store.write_event(&sample_event("web1")).unwrap();

        let listed = store.list_committed().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, committed);
    }

    #[test]
    fn list_orders_by_modification_time() {
        let dir = tempdir().unwrap();
        let store = QueueStore::open(dir.path()).unwrap();
        let now = SystemTime::now();

        let newest = store.write_event(&sample_event("c")).unwrap();
        let oldest = store.write_event(&sample_event("a")).unwrap();
        let middle = store.write_event(&sample_event("b")).unwrap();
        set_mtime(&oldest, now - Duration::from_secs(30));
        set_mtime(&middle, now - Duration::from_secs(20));
        set_mtime(&newest, now - Duration::from_secs(10));

        let listed: Vec<_> = store
            .list_committed()
            .unwrap()
            .into_iter()
            .map(|q| q.path)
            .collect();
        assert_eq!(listed, vec![oldest, middle, newest]);
    }

    #[test]
    fn list_breaks_ties_by_name() {
        let dir = tempdir().unwrap();
        let store = QueueStore::open(dir.path()).unwrap();
        let stamp = SystemTime::now() - Duration::from_secs(60);

        let a = store.write_event(&sample_event("a")).unwrap();
        let b = store.write_event(&sample_event("b")).unwrap();
        set_mtime(&a, stamp);
        set_mtime(&b, stamp);

        let mut expected = vec![a, b];
        expected.sort();
        let listed: Vec<_> = store
            .list_committed()
            .unwrap()
            .into_iter()
            .map(|q| q.path)
            .collect();
        assert_eq!(listed, expected);
    }

    #[test]
    fn read_and_remove_event() {
        let dir = tempdir().unwrap();
        let store = QueueStore::open(dir.path()).unwrap();
        let event = sample_event("web1");
        store.write_event(&event).unwrap();

        let queued = store.list_committed().unwrap().remove(0);
        assert_eq!(store.read_event(&queued).unwrap(), event);
        assert!(!queued.id().is_empty());

        store.remove_event(&queued).unwrap();
        assert!(store.list_committed().unwrap().is_empty());

        // Second removal reports the missing file
        assert!(store.remove_event(&queued).is_err());
    }

    #[test]
    fn read_event_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        let store = QueueStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("broken.ilert"), b"not json").unwrap();

        let queued = store.list_committed().unwrap().remove(0);
        assert!(matches!(
            store.read_event(&queued),
            Err(crate::Error::Json(_))
        ));
    }
}
