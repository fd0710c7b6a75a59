//! In-memory [`RecordStore`] for tests and embedding.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`, in insertion order.
//! A commit stages a copy, applies the batch to it and swaps it in only when
//! every mutation succeeded.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::models::Connection;

use super::{stage_batch, BatchReceipt, Mutation, RecordFilter, RecordStore};

/// In-memory contact store.
pub struct InMemoryStore {
    records: RwLock<Vec<Connection>>,
    fail_at: Mutex<Option<usize>>,
    commits: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<Connection>) -> Self {
        Self {
            records: RwLock::new(records),
            fail_at: Mutex::new(None),
            commits: AtomicUsize::new(0),
        }
    }

    /// Make the next commit fail at mutation `index` (zero-based).
    pub fn fail_at(&self, index: usize) {
        if let Ok(mut slot) = self.fail_at.lock() {
            *slot = Some(index);
        }
    }

    /// Number of commit calls that reached the store, successful or not.
    pub fn commit_attempts(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Vec<Connection> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn fetch(&self, filter: Option<&RecordFilter>) -> StoreResult<Vec<Connection>> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records
            .iter()
            .filter(|c| filter.map_or(true, |f| f.matches(c)))
            .cloned()
            .collect())
    }

    async fn commit(&self, batch: Vec<Mutation>) -> StoreResult<BatchReceipt> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        let fail_at = self
            .fail_at
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .take();

        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        let (staged, receipt) = stage_batch(&records, batch, fail_at)?;
        *records = staged;
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalRecord, Tag};
    use crate::store::RecordFilter;
    use chrono::Utc;

    fn record(name: &str) -> CanonicalRecord {
        CanonicalRecord {
            name: name.to_string(),
            email: None,
            phone_number: None,
            company: None,
            title: None,
            notes: None,
            linkedin_url: None,
            associated_group: "Mohan Coaching".to_string(),
            tags: vec![Tag::Connection],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_fetch() {
        let store = InMemoryStore::new();
        let receipt = store
            .commit(vec![Mutation::Insert(record("Ada")), Mutation::Insert(record("Grace"))])
            .await
            .unwrap();

        assert_eq!(receipt.applied, 2);
        assert_eq!(receipt.inserted_ids.len(), 2);
        let all = store.fetch(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Ada");
        assert_eq!(all[0].id, receipt.inserted_ids[0]);
    }

    #[tokio::test]
    async fn test_fetch_filtered() {
        let store = InMemoryStore::with_records(vec![
            Connection::named("c1", "Ada").with_group("Mohan Coaching"),
            Connection::named("c2", "Grace").with_group("Mohan Financial"),
        ]);

        let coaching = store
            .fetch(Some(&RecordFilter::group("Mohan Coaching")))
            .await
            .unwrap();
        assert_eq!(coaching.len(), 1);
        assert_eq!(coaching[0].id, "c1");
    }

    #[tokio::test]
    async fn test_injected_failure_is_atomic() {
        let store = InMemoryStore::with_records(vec![
            Connection::named("c1", "Ada"),
            Connection::named("c2", "Grace"),
            Connection::named("c3", "Edsger"),
        ]);
        store.fail_at(2);

        let batch = ["c1", "c2", "c3"]
            .iter()
            .map(|id| Mutation::Delete { id: id.to_string() })
            .collect();
        let result = store.commit(batch).await;

        assert!(matches!(result, Err(StoreError::WriteFailed(_))));
        assert_eq!(store.snapshot().len(), 3);
        assert_eq!(store.commit_attempts(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection_is_one_shot() {
        let store = InMemoryStore::with_records(vec![Connection::named("c1", "Ada")]);
        store.fail_at(0);

        let delete = || vec![Mutation::Delete { id: "c1".into() }];
        assert!(store.commit(delete()).await.is_err());
        assert!(store.commit(delete()).await.is_ok());
        assert!(store.snapshot().is_empty());
    }
}
