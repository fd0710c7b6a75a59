//! Record store abstraction.
//!
//! The engine needs exactly two capabilities from the document store that
//! holds contacts:
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`fetch`](RecordStore::fetch) | Snapshot of all contacts, optionally filtered by one equality predicate |
//! | [`commit`](RecordStore::commit) | Apply a batch of mutations all-or-nothing |
//!
//! Backends:
//! - [`memory::InMemoryStore`] - tests and embedding, with failure injection
//! - [`json_file::JsonFileStore`] - single JSON file, used by the CLI and server
//!
//! There is no locking across a reconciliation run. A contact matched from a
//! snapshot may be gone by the time the batch commits; backends reject such a
//! batch with [`StoreError::NotFound`] instead of silently skipping the id.

pub mod json_file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{CanonicalRecord, Connection};

pub use json_file::JsonFileStore;
pub use memory::InMemoryStore;

// =============================================================================
// Queries
// =============================================================================

/// Field a snapshot can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterField {
    AssociatedGroup,
}

/// Single equality predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub field: FilterField,
    pub value: String,
}

impl RecordFilter {
    pub fn group(value: impl Into<String>) -> Self {
        Self {
            field: FilterField::AssociatedGroup,
            value: value.into(),
        }
    }

    pub fn matches(&self, connection: &Connection) -> bool {
        match self.field {
            FilterField::AssociatedGroup => connection.associated_group == self.value,
        }
    }
}

// =============================================================================
// Mutations
// =============================================================================

/// A single field change.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Set or clear the follow-up reminder.
    ReminderDate(Option<DateTime<Utc>>),
}

/// One entry of an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Insert a new contact under a fresh id.
    Insert(CanonicalRecord),
    /// Change fields of an existing contact.
    Update { id: String, updates: Vec<FieldUpdate> },
    /// Remove an existing contact.
    Delete { id: String },
}

/// Outcome of a committed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReceipt {
    /// Mutations applied.
    pub applied: usize,
    /// Ids assigned to inserted contacts, in batch order.
    pub inserted_ids: Vec<String>,
}

// =============================================================================
// Store trait
// =============================================================================

/// Contact storage used by the reconciliation engine.
///
/// Implementations must be `Send + Sync` so one store can back the HTTP
/// server. `commit` must be atomic: on error, no mutation of the batch is
/// observable.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All contacts, or those matching `filter`, in a stable order.
    async fn fetch(&self, filter: Option<&RecordFilter>) -> StoreResult<Vec<Connection>>;

    /// Apply `batch` all-or-nothing.
    async fn commit(&self, batch: Vec<Mutation>) -> StoreResult<BatchReceipt>;
}

/// Apply `batch` to a staged copy of `records`.
///
/// Returns the new record list and the receipt; `records` itself is left
/// untouched so callers can swap the result in only on success.
/// `fail_at` makes the mutation with that index fail (failure injection).
pub(crate) fn stage_batch(
    records: &[Connection],
    batch: Vec<Mutation>,
    fail_at: Option<usize>,
) -> StoreResult<(Vec<Connection>, BatchReceipt)> {
    let mut staged = records.to_vec();
    let mut receipt = BatchReceipt::default();
    let now = Utc::now();

    for (idx, mutation) in batch.into_iter().enumerate() {
        if fail_at == Some(idx) {
            return Err(StoreError::WriteFailed(format!(
                "injected failure at mutation {}",
                idx
            )));
        }

        match mutation {
            Mutation::Insert(record) => {
                let id = Uuid::new_v4().to_string();
                staged.push(Connection::from_record(id.clone(), record));
                receipt.inserted_ids.push(id);
            }
            Mutation::Update { id, updates } => {
                let target = staged
                    .iter_mut()
                    .find(|c| c.id == id)
                    .ok_or_else(|| StoreError::NotFound(id.clone()))?;
                for update in updates {
                    match update {
                        FieldUpdate::ReminderDate(date) => target.reminder_date = date,
                    }
                }
                target.updated_at = Some(now);
            }
            Mutation::Delete { id } => {
                let pos = staged
                    .iter()
                    .position(|c| c.id == id)
                    .ok_or_else(|| StoreError::NotFound(id.clone()))?;
                staged.remove(pos);
            }
        }

        receipt.applied += 1;
    }

    Ok((staged, receipt))
}
