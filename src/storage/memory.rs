//! In-process object store used for local runs and tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use super::ObjectStore;
use crate::error::SyncError;

/// Object store backed by a map, counting every call it receives.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    get_calls: AtomicUsize,
    put_calls: AtomicUsize,
    copy_calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail, as if the endpoint were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects().keys().cloned().collect()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn copy_calls(&self) -> usize {
        self.copy_calls.load(Ordering::SeqCst)
    }

    /// Calls that write to the store.
    pub fn write_calls(&self) -> usize {
        self.put_calls() + self.copy_calls()
    }

    pub fn total_calls(&self) -> usize {
        self.get_calls() + self.write_calls()
    }

    fn objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.objects
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn check_available(&self, operation: &str, key: &str) -> Result<(), SyncError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SyncError::ObjectStoreFailure(format!(
                "{operation} {key}: store unavailable"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, SyncError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available("get", key)?;
        Ok(self.object(key))
    }

    async fn put_object(&self, key: &str, content: Vec<u8>) -> Result<(), SyncError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available("put", key)?;
        self.objects().insert(key.to_string(), content);
        Ok(())
    }

    async fn copy_object(&self, dst: &str, src: &str) -> Result<(), SyncError> {
        self.copy_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available("copy", src)?;

        let mut objects = self.objects();
        let content = objects
            .get(src)
            .cloned()
            .ok_or_else(|| SyncError::ObjectStoreFailure(format!("copy source {src} not found")))?;
        objects.insert(dst.to_string(), content);
        Ok(())
    }
}
