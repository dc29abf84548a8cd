//! `dummy` store — in-memory stand-in for the remote repository.
//!
//! Records every accepted write and rejects a second write to the same path,
//! matching the create-only contract of the real backend. Clones share state.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::{StoreError, UploadRecord};

#[derive(Debug, Clone, Default)]
pub struct DummyStore {
    inner: Arc<Mutex<DummyState>>,
}

#[derive(Debug, Default)]
struct DummyState {
    /// destination → record, for accepted writes.
    files: BTreeMap<String, UploadRecord>,
    /// Accepted destinations in write order.
    order: Vec<String>,
    /// Remaining writes to fail with HTTP 500.
    fail_next: usize,
}

impl DummyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` writes fail with a generic server error.
    pub fn fail_next(&self, n: usize) {
        if let Ok(mut state) = self.inner.lock() {
            state.fail_next = n;
        }
    }

    /// Destinations of accepted writes, in write order.
    pub fn written_paths(&self) -> Vec<String> {
        self.inner.lock().map(|s| s.order.clone()).unwrap_or_default()
    }

    pub fn get(&self, destination: &str) -> Option<UploadRecord> {
        self.inner.lock().ok().and_then(|s| s.files.get(destination).cloned())
    }

    pub async fn create_file(&self, record: &UploadRecord) -> Result<(), StoreError> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| StoreError::Transport("dummy store lock poisoned".into()))?;
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(StoreError::Status { status: 500, body: "injected failure".into() });
        }
        if state.files.contains_key(&record.destination) {
            return Err(StoreError::AlreadyExists { path: record.destination.clone() });
        }
        state.order.push(record.destination.clone());
        state.files.insert(record.destination.clone(), record.clone());
        Ok(())
    }
}
