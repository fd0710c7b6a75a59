//! [`RecordStore`] persisted as a single JSON file.
//!
//! The file holds an array of contacts. Commits stage the whole array, write
//! it to a sibling temp file and rename it over the original, so a failed
//! commit leaves the previous file as it was.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task;

use crate::error::StoreResult;
use crate::models::Connection;

use super::{stage_batch, BatchReceipt, Mutation, RecordFilter, RecordStore};

/// Default location of the contact file (relative to current dir)
pub const DEFAULT_STORE_PATH: &str = ".reconcile/records.json";

/// File-backed contact store.
///
/// File access runs on the blocking pool; commits are serialized.
pub struct JsonFileStore {
    path: Arc<PathBuf>,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Arc::new(path.as_ref().to_path_buf()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read every contact; a missing file is an empty store.
fn load(path: &Path) -> StoreResult<Vec<Connection>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&content)?)
}

fn persist(path: &Path, records: &[Connection]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(records)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn fetch(&self, filter: Option<&RecordFilter>) -> StoreResult<Vec<Connection>> {
        let path = Arc::clone(&self.path);
        let records = task::spawn_blocking(move || load(&path)).await??;
        Ok(records
            .into_iter()
            .filter(|c| filter.map_or(true, |f| f.matches(c)))
            .collect())
    }

    async fn commit(&self, batch: Vec<Mutation>) -> StoreResult<BatchReceipt> {
        let _guard = self.write_lock.lock().await;
        let path = Arc::clone(&self.path);
        task::spawn_blocking(move || -> StoreResult<BatchReceipt> {
            let records = load(&path)?;
            let (staged, receipt) = stage_batch(&records, batch, None)?;
            persist(&path, &staged)?;
            Ok(receipt)
        })
        .await?
    }
}
