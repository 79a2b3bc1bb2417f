//! On-disk transaction cache with a time-to-live
//!
//! One JSON file per fetch key under `<data_dir>/cache/`. File names are the
//! SHA-256 of the key so budget ids never leak into paths. Writes go through a
//! temp file in the same directory followed by a rename.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::models::Transaction;

/// Serialized cache file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Epoch milliseconds when the entry was written
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
}

pub struct TransactionCache {
    dir: PathBuf,
    ttl: Duration,
}

impl TransactionCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache key for a fetch of `months` months of a budget starting at `since`
    pub fn key(budget_id: &str, since: NaiveDate, months: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(budget_id.as_bytes());
        hasher.update(b"|");
        hasher.update(since.format("%Y-%m-%d").to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(months.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Fresh cached transactions for a key
    ///
    /// Missing, stale and unreadable entries are all misses.
    pub fn get(&self, key: &str) -> Result<Option<Vec<Transaction>>> {
        self.get_at(key, Utc::now().timestamp_millis())
    }

    fn get_at(&self, key: &str, now_millis: i64) -> Result<Option<Vec<Transaction>>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring corrupt cache entry");
                return Ok(None);
            }
        };

        let short_key = &key[..key.len().min(12)];
        let age_millis = now_millis.saturating_sub(entry.timestamp).max(0) as u128;
        if age_millis >= self.ttl.as_millis() {
            tracing::debug!(key = short_key, age_millis = age_millis as u64, "Cache entry stale");
            return Ok(None);
        }

        tracing::debug!(
            key = short_key,
            count = entry.transactions.len(),
            "Cache hit"
        );
        Ok(Some(entry.transactions))
    }

    /// Store transactions under a key, replacing any previous entry
    pub fn put(&self, key: &str, transactions: &[Transaction]) -> Result<()> {
        self.put_entry(
            key,
            &CacheEntry {
                timestamp: Utc::now().timestamp_millis(),
                transactions: transactions.to_vec(),
            },
        )
    }

    fn put_entry(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&mut tmp, entry)?;
        tmp.flush()?;
        tmp.persist(self.path_for(key))
            .map_err(|e| Error::Cache(format!("Failed to persist cache entry: {}", e)))?;

        tracing::debug!(count = entry.transactions.len(), "Cache entry written");
        Ok(())
    }

    /// Remove every cache entry, returning how many were removed
    pub fn clear(&self) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }

        tracing::info!(removed, "Cache cleared");
        Ok(removed)
    }
}
