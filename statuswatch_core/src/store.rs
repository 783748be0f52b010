//! Latest probe result per resolved endpoint URL

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{AppError, Result};
use crate::models::EndpointResult;

/// Point-in-time copy of the store, tagged with the revision it reflects.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub results: BTreeMap<String, EndpointResult>,
    pub revision: u64,
}

#[derive(Debug, Default)]
struct StoreState {
    results: HashMap<String, EndpointResult>,
    /// Bumped by every tracked write.
    revision: u64,
    /// Highest revision known to be on disk.
    persisted_revision: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    state: Arc<RwLock<StoreState>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` means the endpoint has not been probed yet.
    pub fn get(&self, url: &str) -> Option<EndpointResult> {
        self.state.read().results.get(url).cloned()
    }

    /// Replaces the result for `url` and marks the store dirty.
    pub fn put(&self, url: impl Into<String>, result: EndpointResult) -> u64 {
        let mut state = self.state.write();
        state.results.insert(url.into(), result);
        state.revision += 1;
        state.revision
    }

    /// Replaces the result without marking the store dirty.
    pub fn put_untracked(&self, url: impl Into<String>, result: EndpointResult) {
        self.state.write().results.insert(url.into(), result);
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read();
        StoreSnapshot {
            results: state
                .results
                .iter()
                .map(|(url, result)| (url.clone(), result.clone()))
                .collect(),
            revision: state.revision,
        }
    }

    /// Loads persisted results. Refused once the store holds anything.
    pub fn restore(&self, results: HashMap<String, EndpointResult>) -> Result<usize> {
        let mut state = self.state.write();
        if state.revision > 0 || !state.results.is_empty() {
            return Err(AppError::Persistence(
                "Cannot restore results after probing has started".to_string(),
            ));
        }

        state.results = results;
        Ok(state.results.len())
    }

    pub fn is_dirty(&self) -> bool {
        let state = self.state.read();
        state.revision > state.persisted_revision
    }

    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    /// Records that everything up to `revision` is on disk. Writes made
    /// after that snapshot keep the store dirty.
    pub fn mark_persisted(&self, revision: u64) {
        let mut state = self.state.write();
        if revision > state.persisted_revision {
            state.persisted_revision = revision.min(state.revision);
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResultStatus;
    use chrono::Utc;

    fn result(status: ResultStatus, code: u16) -> EndpointResult {
        EndpointResult {
            status,
            code,
            content_type: "text/plain".to_string(),
            body: b"ok".to_vec(),
            request_duration_seconds: 0.1,
            updated: Utc::now(),
        }
    }

    #[test]
    fn test_missing_key_is_not_an_error() {
        let store = ResultStore::new();
        assert!(store.get("http://a.test/health").is_none());
        assert!(store.is_empty());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_put_replaces_and_marks_dirty() {
        let store = ResultStore::new();
        store.put("http://a.test/health", result(ResultStatus::Healthy, 200));
        store.put("http://a.test/health", result(ResultStatus::Down, 500));

        let stored = store.get("http://a.test/health").unwrap();
        assert_eq!(stored.status, ResultStatus::Down);
        assert_eq!(stored.code, 500);
        assert_eq!(store.len(), 1);
        assert_eq!(store.revision(), 2);
        assert!(store.is_dirty());
    }

    #[test]
    fn test_put_untracked_leaves_store_clean() {
        let store = ResultStore::new();
        store.put_untracked("http://a.test/health", result(ResultStatus::Inactive, 0));
        assert_eq!(store.len(), 1);
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_write_during_flush_keeps_store_dirty() {
        let store = ResultStore::new();
        store.put("http://a.test/one", result(ResultStatus::Healthy, 200));

        let snapshot = store.snapshot();
        store.put("http://a.test/two", result(ResultStatus::Healthy, 200));
        store.mark_persisted(snapshot.revision);

        assert!(store.is_dirty());

        let snapshot = store.snapshot();
        store.mark_persisted(snapshot.revision);
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_mark_persisted_never_moves_backwards() {
        let store = ResultStore::new();
        store.put("http://a.test/one", result(ResultStatus::Healthy, 200));
        store.put("http://a.test/one", result(ResultStatus::Healthy, 200));

        store.mark_persisted(2);
        store.mark_persisted(1);
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_restore_only_before_first_write() {
        let store = ResultStore::new();
        let mut results = HashMap::new();
        results.insert("http://a.test/one".to_string(), result(ResultStatus::Healthy, 200));

        assert_eq!(store.restore(results.clone()).unwrap(), 1);
        assert!(!store.is_dirty());

        store.put("http://a.test/two", result(ResultStatus::Down, 999));
        assert!(matches!(store.restore(results), Err(AppError::Persistence(_))));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_restore_refused_over_untracked_entries() {
        let store = ResultStore::new();
        store.put_untracked("http://a.test/idle", result(ResultStatus::Inactive, 0));
        assert_eq!(store.revision(), 0);

        let mut results = HashMap::new();
        results.insert("http://a.test/one".to_string(), result(ResultStatus::Healthy, 200));

        assert!(matches!(store.restore(results), Err(AppError::Persistence(_))));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("http://a.test/idle").unwrap().status, ResultStatus::Inactive);
    }

    #[test]
    fn test_snapshot_is_detached_from_store() {
        let store = ResultStore::new();
        store.put("http://a.test/one", result(ResultStatus::Healthy, 200));

        let snapshot = store.snapshot();
        store.put("http://a.test/one", result(ResultStatus::Down, 500));

        assert_eq!(snapshot.results["http://a.test/one"].code, 200);
        assert_eq!(snapshot.revision, 1);
    }
}
