use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use strata_core::prelude::*;

#[derive(Clone)]
struct StoredVersion {
    version_id: String,
    data: Bytes,
    last_modified: DateTime<Utc>,
}

#[derive(Default)]
struct StoreState {
    objects: HashMap<String, Vec<StoredVersion>>,
    next_version: u64,
    puts: usize,
}

/// Versioned in-memory object store. Every `put` mints a new version id.
#[derive(Clone)]
pub struct MemoryStateStore {
    bucket: String,
    region: String,
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStateStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: DEFAULT_REGION.to_string(),
            state: Arc::new(Mutex::new(StoreState::default())),
        }
    }

    /// Stores a version directly, bypassing the put counter.
    pub fn seed(&self, key: &str, data: impl Into<Bytes>) -> String {
        let mut state = self.lock();
        Self::push_version(&mut state, key, data.into())
    }

    pub fn put_count(&self) -> usize {
        self.lock().puts
    }

    pub fn current(&self, key: &str) -> Option<Bytes> {
        self.lock()
            .objects
            .get(key)
            .and_then(|versions| versions.last())
            .map(|v| v.data.clone())
    }

    fn push_version(state: &mut StoreState, key: &str, data: Bytes) -> String {
        state.next_version += 1;
        let version_id = format!("v{:04}", state.next_version);
        state
            .objects
            .entry(key.to_string())
            .or_default()
            .push(StoredVersion {
                version_id: version_id.clone(),
                data,
                last_modified: Utc::now(),
            });
        version_id
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn etag_of(data: &Bytes) -> String {
    format!("\"{:x}-{}\"", data.iter().map(|b| *b as u64).sum::<u64>(), data.len())
}

impl StateStore for MemoryStateStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn head(&self, key: &str) -> Result<ObjectVersion, StateStoreError> {
        let state = self.lock();
        let latest = state
            .objects
            .get(key)
            .and_then(|versions| versions.last())
            .ok_or_else(|| StateStoreError::NotFound(key.to_string()))?;

        Ok(ObjectVersion {
            version_id: Some(latest.version_id.clone()),
            etag: Some(etag_of(&latest.data)),
            last_modified: Some(latest.last_modified),
            size: Some(latest.data.len() as u64),
        })
    }

    async fn get_version(&self, key: &str, version_id: Option<&str>) -> Result<Bytes, StateStoreError> {
        let state = self.lock();
        let versions = state
            .objects
            .get(key)
            .ok_or_else(|| StateStoreError::NotFound(key.to_string()))?;

        let found = match version_id {
            Some(id) => versions.iter().find(|v| v.version_id == id),
            None => versions.last(),
        };

        found
            .map(|v| v.data.clone())
            .ok_or_else(|| StateStoreError::VersionNotFound(version_id.unwrap_or_default().to_string()))
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<Option<String>, StateStoreError> {
        let mut state = self.lock();
        state.puts += 1;
        Ok(Some(Self::push_version(&mut state, key, data)))
    }

    async fn list_versions(&self, key: &str, limit: usize) -> Result<Vec<VersionEntry>, StateStoreError> {
        let state = self.lock();
        let Some(versions) = state.objects.get(key) else {
            return Ok(Vec::new());
        };
        let latest = versions.last().map(|v| v.version_id.clone());

        Ok(versions
            .iter()
            .rev()
            .take(limit)
            .map(|v| VersionEntry {
                version_id: v.version_id.clone(),
                last_modified: Some(v.last_modified),
                size: Some(v.data.len() as u64),
                is_latest: Some(&v.version_id) == latest.as_ref(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_put_creates_a_new_version() {
        let store = MemoryStateStore::new("bucket");
        let first = store.seed("k", "one");
        let second = store.put("k", Bytes::from("two")).await.unwrap().unwrap();

        assert_ne!(first, second);
        assert_eq!(store.get_version("k", Some(&first)).await.unwrap(), "one");
        assert_eq!(store.head("k").await.unwrap().version_id, Some(second));

        let listed = store.list_versions("k", 10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].is_latest);
        assert!(!listed[1].is_latest);
    }

    #[tokio::test]
    async fn unknown_version_is_reported() {
        let store = MemoryStateStore::new("bucket");
        store.seed("k", "one");
        assert!(matches!(
            store.get_version("k", Some("nope")).await,
            Err(StateStoreError::VersionNotFound(_))
        ));
        assert!(matches!(store.head("other").await, Err(StateStoreError::NotFound(_))));
    }
}
