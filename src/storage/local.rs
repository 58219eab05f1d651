//! Local JSON-file store used when the database is unreachable.
//!
//! Each collection is one file, `<dir>/<collection>.json`, holding a JSON
//! array. Writes replace the file through a temporary sibling so a crash
//! never leaves a half-written array behind.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::StoreError;

#[derive(Clone)]
pub struct LocalStore {
    dir: PathBuf,
    lock: Arc<Mutex<()>>,
    last_id: Arc<AtomicI64>,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Arc::new(Mutex::new(())),
            last_id: Arc::new(AtomicI64::new(0)),
        }
    }

    fn path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    /// Millisecond timestamp id, strictly increasing within this process.
    pub fn next_id(&self) -> String {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or_else(|last| last);
        now.max(previous + 1).to_string()
    }

    /// All records of `collection` that deserialize as `T`. Entries of
    /// another shape are skipped.
    pub async fn load<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, StoreError> {
        let _guard = self.lock.lock().await;
        let records = self.read(collection).await?;
        Ok(records
            .into_iter()
            .filter_map(|record| serde_json::from_value(record).ok())
            .collect())
    }

    pub async fn append<T: Serialize>(&self, collection: &str, record: &T) -> Result<(), StoreError> {
        let record = serde_json::to_value(record)?;
        let _guard = self.lock.lock().await;
        let mut records = self.read(collection).await?;
        records.push(record);
        self.write(collection, &records).await
    }

    /// Replace every record whose `key` field equals the new record's, or
    /// append if there is none.
    pub async fn upsert<T: Serialize>(&self, collection: &str, key: &str, record: &T) -> Result<(), StoreError> {
        let record = serde_json::to_value(record)?;
        let id = record.get(key).cloned().unwrap_or(Value::Null);

        let _guard = self.lock.lock().await;
        let mut records = self.read(collection).await?;
        records.retain(|existing| existing.get(key) != Some(&id));
        records.push(record);
        self.write(collection, &records).await
    }

    async fn read(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let path = self.path(collection);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn write(&self, collection: &str, records: &[Value]) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path(collection);
        let tmp = self.dir.join(format!("{collection}.json.tmp"));
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(records)?).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(collection, records = records.len(), "Wrote local store");
        Ok(())
    }
}
