//! Durable copy of the result store

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, Result};
use crate::models::EndpointResult;
use crate::store::ResultStore;

/// Writes the whole store to a JSON file when it is dirty and reads it back
/// at startup. Without a path every operation is a no-op.
#[derive(Debug, Clone)]
pub struct CachePersister {
    path: Option<PathBuf>,
    interval: Duration,
}

impl CachePersister {
    pub fn new(path: Option<PathBuf>, interval: Duration) -> Self {
        Self { path, interval }
    }

    pub fn disabled() -> Self {
        Self::new(None, Duration::from_secs(2))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Restores the store from disk. Never fails: an unusable cache file is
    /// logged and the store is left empty.
    pub fn load_into(&self, store: &ResultStore) -> usize {
        let Some(path) = self.path.as_deref() else {
            debug!("No cache file configured, starting with an empty store");
            return 0;
        };

        let results = match read_cache(path) {
            Ok(Some(results)) => results,
            Ok(None) => return 0,
            Err(e) => {
                error!(path = %path.display(), "Ignoring cache file: {}", e);
                return 0;
            }
        };

        match store.restore(results) {
            Ok(count) => {
                info!(path = %path.display(), "Restored {} results from cache", count);
                count
            }
            Err(e) => {
                warn!(path = %path.display(), "{}", e);
                0
            }
        }
    }

    /// Writes the store if it has unpersisted changes. Returns whether a
    /// write happened. The store is only marked clean up to the revision
    /// that was actually written.
    pub fn flush(&self, store: &ResultStore) -> Result<bool> {
        let Some(path) = self.path.as_deref() else {
            return Ok(false);
        };
        if !store.is_dirty() {
            return Ok(false);
        }

        let snapshot = store.snapshot();
        write_cache(path, &snapshot.results)?;
        store.mark_persisted(snapshot.revision);

        debug!(
            path = %path.display(),
            revision = snapshot.revision,
            results = snapshot.results.len(),
            "Cache flushed"
        );
        Ok(true)
    }

    /// Flushes on every tick until `shutdown` flips, then flushes once more.
    pub async fn run(self, store: ResultStore, mut shutdown: watch::Receiver<bool>) {
        if self.path.is_none() {
            return;
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
            self.flush_in_background(&store).await;
        }

        self.flush_in_background(&store).await;
        info!("Cache persister stopped");
    }

    async fn flush_in_background(&self, store: &ResultStore) {
        let persister = self.clone();
        let store = store.clone();

        match tokio::task::spawn_blocking(move || persister.flush(&store)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Failed to write cache: {}", e),
            Err(e) => error!("Cache flush task failed: {}", e),
        }
    }
}

fn read_cache(path: &Path) -> Result<Option<HashMap<String, EndpointResult>>> {
    let contents = match std::fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "Cache file does not exist yet");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    if contents.iter().all(u8::is_ascii_whitespace) {
        info!(path = %path.display(), "Cache file is empty");
        return Ok(None);
    }

    Ok(Some(serde_json::from_slice(&contents)?))
}

/// Temp file in the target directory, then rename over the old cache.
fn write_cache(path: &Path, results: &BTreeMap<String, EndpointResult>) -> Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let persistence = |e: std::io::Error| {
        AppError::Persistence(format!("{}: {}", path.display(), e))
    };

    let mut file = NamedTempFile::new_in(directory).map_err(persistence)?;
    serde_json::to_writer(&mut file, results)?;
    file.flush().map_err(persistence)?;
    file.as_file().sync_all().map_err(persistence)?;
    file.persist(path).map_err(|e| persistence(e.error))?;

    Ok(())
}
