//! Bulk mutation of reviewed contacts.
//!
//! The reviewer's selection arrives as a list of contact ids plus one action.
//! Ids equal to the `"ignore"` sentinel and blank ids are dropped, duplicates
//! collapse, and whatever is left is committed as a single atomic batch.

use std::collections::HashSet;

use crate::error::BulkActionError;
use crate::models::{BulkAction, BulkActionRequest, CanonicalRecord};
use crate::store::{BatchReceipt, FieldUpdate, Mutation, RecordStore};

/// Selection value meaning "do not touch this row".
pub const IGNORE_SENTINEL: &str = "ignore";

/// Result of a committed bulk action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
    pub applied_count: usize,
}

/// Real targets of a selection: sentinels and blanks removed, first
/// occurrence kept.
pub fn effective_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && *id != IGNORE_SENTINEL)
        .filter(|id| seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}

/// One mutation per target id.
pub fn build_batch(ids: &[String], action: &BulkAction) -> Vec<Mutation> {
    ids.iter()
        .map(|id| match action {
            BulkAction::Delete => Mutation::Delete { id: id.clone() },
            BulkAction::SetReminder { reminder_date } => Mutation::Update {
                id: id.clone(),
                updates: vec![FieldUpdate::ReminderDate(*reminder_date)],
            },
        })
        .collect()
}

/// Apply `request` to `store` in one atomic commit.
///
/// An empty effective selection fails with [`BulkActionError::NoSelection`]
/// before the store is called.
pub async fn apply_bulk_action(
    store: &dyn RecordStore,
    request: &BulkActionRequest,
) -> Result<BulkOutcome, BulkActionError> {
    let ids = effective_ids(&request.connection_ids);
    if ids.is_empty() {
        return Err(BulkActionError::NoSelection);
    }

    let receipt = store.commit(build_batch(&ids, &request.action)).await?;
    Ok(BulkOutcome {
        applied_count: receipt.applied,
    })
}

/// Insert `records` in one atomic commit.
pub async fn insert_records(
    store: &dyn RecordStore,
    records: Vec<CanonicalRecord>,
) -> Result<BatchReceipt, BulkActionError> {
    let batch: Vec<Mutation> = records.into_iter().map(Mutation::Insert).collect();
    Ok(store.commit(batch).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::Connection;
    use crate::store::InMemoryStore;
    use chrono::{TimeZone, Utc};

    fn seeded() -> InMemoryStore {
        InMemoryStore::with_records(vec![
            Connection::named("c1", "Ada"),
            Connection::named("c2", "Grace"),
            Connection::named("c3", "Edsger"),
        ])
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_effective_ids_filters_and_dedupes() {
        let raw = ids(&["c2", "ignore", "", "  ", "c1", "c2"]);
        assert_eq!(effective_ids(&raw), vec!["c2", "c1"]);
    }

    #[tokio::test]
    async fn test_delete_selected() {
        let store = seeded();
        let outcome = apply_bulk_action(&store, &BulkActionRequest::delete(["c1", "ignore", "c3"]))
            .await
            .unwrap();

        assert_eq!(outcome.applied_count, 2);
        let left: Vec<String> = store.snapshot().into_iter().map(|c| c.id).collect();
        assert_eq!(left, vec!["c2"]);
    }

    #[tokio::test]
    async fn test_only_sentinels_is_no_selection() {
        let store = seeded();
        let err = apply_bulk_action(&store, &BulkActionRequest::delete(["ignore", "ignore"]))
            .await
            .unwrap_err();

        assert!(matches!(err, BulkActionError::NoSelection));
        assert_eq!(store.commit_attempts(), 0);
    }

    #[tokio::test]
    async fn test_set_and_clear_reminder() {
        let store = seeded();
        let when = Utc.with_ymd_and_hms(2026, 11, 1, 9, 0, 0).unwrap();
        let set = BulkActionRequest {
            connection_ids: ids(&["c2"]),
            action: BulkAction::SetReminder {
                reminder_date: Some(when),
            },
        };
        apply_bulk_action(&store, &set).await.unwrap();
        assert_eq!(store.snapshot()[1].reminder_date, Some(when));

        let clear = BulkActionRequest {
            connection_ids: ids(&["c2"]),
            action: BulkAction::SetReminder { reminder_date: None },
        };
        apply_bulk_action(&store, &clear).await.unwrap();
        assert_eq!(store.snapshot()[1].reminder_date, None);
    }

    #[tokio::test]
    async fn test_mid_batch_failure_changes_nothing() {
        let store = seeded();
        store.fail_at(1);

        let err = apply_bulk_action(&store, &BulkActionRequest::delete(["c1", "c2", "c3"]))
            .await
            .unwrap_err();

        assert!(matches!(err, BulkActionError::Store(StoreError::WriteFailed(_))));
        assert_eq!(store.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn test_stale_id_rejects_batch() {
        let store = seeded();
        let err = apply_bulk_action(&store, &BulkActionRequest::delete(["c1", "deleted-meanwhile"]))
            .await
            .unwrap_err();

        assert!(matches!(err, BulkActionError::Store(StoreError::NotFound(_))));
        assert_eq!(store.snapshot().len(), 3);
    }
}
