//! JSON file store for the analysis history.
//!
//! The whole history lives in one document, `{ "history": [...] }`. Writes
//! go to a sibling `.tmp` file which is then renamed over the canonical
//! path, so readers only ever see a complete snapshot. Every mutation runs
//! under one fair async mutex, which makes [`HistoryStore::update`] a FIFO
//! queue of read-modify-write cycles.

use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::StoreError;
use crate::history::record::{AnalysisRecord, HistoryState};
use crate::history::seed::seed_history;

/// Durable, size-bounded analysis history.
pub struct HistoryStore {
    path: PathBuf,
    history_max: usize,
    /// Held for the full duration of every write. `tokio::sync::Mutex`
    /// grants the lock in request order.
    write_lock: Mutex<()>,
}

impl HistoryStore {
    /// Create a store backed by `path`, keeping at most `history_max` records.
    pub fn new(path: impl Into<PathBuf>, history_max: usize) -> Self {
        Self {
            path: path.into(),
            history_max: history_max.max(1),
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.history_path(), config.history_max)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn history_max(&self) -> usize {
        self.history_max
    }

    /// Load the current history.
    ///
    /// The first access on an empty data directory writes the seed history
    /// and returns it. Unparseable content yields an empty history.
    pub async fn read(&self) -> Result<HistoryState, StoreError> {
        if let Some(state) = self.load().await? {
            return Ok(state);
        }

        // Seeding is a write; take the lock so it cannot clobber an update
        // that created the file in the meantime.
        let _guard = self.write_lock.lock().await;
        self.load_or_seed().await
    }

    /// Replace the persisted history with `state`.
    ///
    /// Prefer [`update`](Self::update) for anything derived from the
    /// previous state.
    pub async fn write(&self, state: &HistoryState) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.persist(state).await
    }

    /// Apply `mutator` to the current history and persist the result.
    ///
    /// Calls are served one at a time in the order they first wait on the
    /// store; each mutator sees the result of the one before it. The bound
    /// is enforced after the mutator runs. A failing mutator writes nothing
    /// and its error goes back to this caller only.
    pub async fn update<F, Fut>(&self, mutator: F) -> Result<HistoryState, StoreError>
    where
        F: FnOnce(HistoryState) -> Fut,
        Fut: Future<Output = Result<HistoryState, StoreError>>,
    {
        let _guard = self.write_lock.lock().await;

        let current = self.load_or_seed().await?;
        let mut next = mutator(current).await?;
        next.enforce_bound(self.history_max);

        self.persist(&next).await?;

        tracing::debug!(history_len = next.len(), "History updated");
        Ok(next)
    }

    /// Prepend a record as the newest entry.
    pub async fn append(&self, record: AnalysisRecord) -> Result<HistoryState, StoreError> {
        let record_id = record.id.clone();
        let state = self
            .update(|mut state| async move {
                state.prepend(record);
                Ok(state)
            })
            .await?;

        tracing::info!(record_id = %record_id, history_len = state.len(), "Analysis recorded");
        Ok(state)
    }

    /// Read the file, returning `None` when it does not exist yet.
    async fn load(&self) -> Result<Option<HistoryState>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => Ok(Some(decode(&raw, &self.path))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    /// Caller must hold `write_lock`.
    async fn load_or_seed(&self) -> Result<HistoryState, StoreError> {
        if let Some(state) = self.load().await? {
            return Ok(state);
        }

        let seeded = HistoryState::new(seed_history());
        self.persist(&seeded).await?;

        tracing::info!(
            path = %self.path.display(),
            records = seeded.len(),
            "Seeded analysis history"
        );
        Ok(seeded)
    }

    /// Write-then-rename. Caller must hold `write_lock`.
    async fn persist(&self, state: &HistoryState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.temp_path();

        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        file.sync_all().await.map_err(|e| StoreError::io(&tmp, e))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;

        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

/// Decode a persisted document, recovering from corruption.
///
/// Bytes that are not a JSON object with a `history` array (including
/// invalid UTF-8) yield an empty history. Entries that do not decode as
/// records are kept verbatim rather than dropped.
fn decode(raw: &[u8], path: &Path) -> HistoryState {
    let value: Value = match serde_json::from_slice(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "History file is not valid JSON, starting from an empty history"
            );
            return HistoryState::default();
        }
    };

    let Some(items) = value.get("history").and_then(Value::as_array) else {
        tracing::warn!(
            path = %path.display(),
            "History file has no history array, starting from an empty history"
        );
        return HistoryState::default();
    };

    let mut state = HistoryState::default();
    for item in items {
        match decode_record(item) {
            Ok(record) => state.history.push(record),
            Err(e) => {
                tracing::debug!(error = %e, "Keeping undecodable history entry as-is");
                state.unparsed.push(item.clone());
            }
        }
    }

    if !state.unparsed.is_empty() {
        tracing::warn!(
            path = %path.display(),
            kept = state.unparsed.len(),
            "History has entries that are not valid records; keeping them unchanged"
        );
    }

    state
}

/// Decode one entry. Records written without an `id` get a stable one
/// derived from their content, which is persisted on the next write.
fn decode_record(item: &Value) -> Result<AnalysisRecord, serde_json::Error> {
    let has_id = item.get("id").is_some_and(|id| !id.is_null());
    if has_id || !item.is_object() {
        return serde_json::from_value(item.clone());
    }

    let mut with_id = item.clone();
    if let Some(obj) = with_id.as_object_mut() {
        obj.insert("id".to_string(), Value::String(legacy_id(item)));
    }
    serde_json::from_value(with_id)
}

fn legacy_id(item: &Value) -> String {
    let digest = Sha256::digest(item.to_string().as_bytes());
    let hex: String = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();
    format!("legacy-{}", hex)
}
