use std::sync::{Arc, Mutex, MutexGuard};

use sweepr_common::device::{ErrorEvent, WarrantyRecord};

use super::{RecordStore, Result, StoreError};

#[derive(Default)]
struct MemoryState {
    initialized: bool,
    warranties: Vec<WarrantyRecord>,
    errors: Vec<ErrorEvent>,
}

/// In-memory [`RecordStore`].
///
/// Clones share the same rows, so a test can keep one clone for inspection
/// while the pipeline owns the other.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `records`, as if written by an earlier run.
    pub fn with_warranties(records: Vec<WarrantyRecord>) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.inner.lock() {
            state.warranties = records;
        }
        store
    }

    pub fn warranties(&self) -> Vec<WarrantyRecord> {
        self.lock().map(|s| s.warranties.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<ErrorEvent> {
        self.lock().map(|s| s.errors.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn initialized(&self) -> Result<MutexGuard<'_, MemoryState>> {
        let state = self.lock()?;
        if !state.initialized {
            return Err(StoreError::NotInitialized);
        }
        Ok(state)
    }
}

impl RecordStore for MemoryRecordStore {
    fn initialize(&mut self) -> Result<()> {
        self.lock()?.initialized = true;
        Ok(())
    }

    fn has_warranty_record(&self, device_name: &str) -> Result<bool> {
        let state = self.initialized()?;
        Ok(state.warranties.iter().any(|r| r.device_name == device_name))
    }

    fn record_error(&mut self, event: &ErrorEvent) -> Result<bool> {
        let mut state = self.initialized()?;
        if state.errors.contains(event) {
            return Ok(false);
        }
        state.errors.push(event.clone());
        Ok(true)
    }

    fn record_warranty(&mut self, record: &WarrantyRecord) -> Result<()> {
        self.initialized()?.warranties.push(record.clone());
        Ok(())
    }
}
