use crate::domain::model::DeleteManyOutcome;
use crate::domain::ports::{OverrideStore, Storage};
use crate::utils::error::{MealError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

pub const DEFAULT_OVERRIDE_FILE: &str = "meal_counts.json";

/// Manual counts kept as one JSON object: `{"2025-03-04": 12, ...}`.
///
/// Every operation reads the whole file; writes replace it. A missing or
/// corrupt file behaves like an empty store. Reads fall back to empty when
/// the file cannot be read at all, but writes then fail instead of replacing it.
pub struct JsonOverrideStore<S: Storage> {
    storage: S,
    file_name: String,
    write_lock: Mutex<()>,
}

impl<S: Storage> JsonOverrideStore<S> {
    pub fn new(storage: S, file_name: impl Into<String>) -> Self {
        Self {
            storage,
            file_name: file_name.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> BTreeMap<NaiveDate, u32> {
        match self.read_counts().await {
            Ok(counts) => counts,
            Err(e) => {
                tracing::warn!("⚠️ Could not read {}, using no manual counts: {}", self.file_name, e);
                BTreeMap::new()
            }
        }
    }

    /// Like `load`, but an I/O failure is returned so a write never clobbers
    /// a file it could not read.
    async fn read_counts(&self) -> Result<BTreeMap<NaiveDate, u32>> {
        let Some(bytes) = self.storage.read_file(&self.file_name).await? else {
            return Ok(BTreeMap::new());
        };

        let value: Value = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("⚠️ {} is not valid JSON, using no manual counts: {}", self.file_name, e);
                return Ok(BTreeMap::new());
            }
        };

        let Value::Object(entries) = value else {
            tracing::warn!("⚠️ {} is not a JSON object, using no manual counts", self.file_name);
            return Ok(BTreeMap::new());
        };

        let mut counts = BTreeMap::new();
        for (key, value) in entries {
            let date = NaiveDate::parse_from_str(&key, "%Y-%m-%d");
            let count = value.as_u64().and_then(|n| u32::try_from(n).ok());
            match (date, count) {
                (Ok(date), Some(count)) => {
                    counts.insert(date, count);
                }
                _ => tracing::warn!("⚠️ Skipping invalid manual count entry {}: {}", key, value),
            }
        }
        Ok(counts)
    }

    async fn save(&self, counts: &BTreeMap<NaiveDate, u32>) -> Result<()> {
        let serializable: BTreeMap<String, u32> = counts
            .iter()
            .map(|(date, count)| (date.format("%Y-%m-%d").to_string(), *count))
            .collect();
        let data = serde_json::to_vec_pretty(&serializable)?;
        self.storage.write_file(&self.file_name, &data).await
    }

    fn not_found(date: NaiveDate) -> MealError {
        MealError::NotFound {
            date: date.format("%Y-%m-%d").to_string(),
        }
    }
}

#[async_trait]
impl<S: Storage> OverrideStore for JsonOverrideStore<S> {
    async fn get(&self, date: NaiveDate) -> Result<Option<u32>> {
        Ok(self.load().await.get(&date).copied())
    }

    async fn put(&self, date: NaiveDate, count: u32) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut counts = self.read_counts().await?;
        counts.insert(date, count);
        self.save(&counts).await?;
        tracing::info!("💾 Saved manual meal count {} for {}", count, date);
        Ok(())
    }

    async fn update(&self, date: NaiveDate, count: u32) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut counts = self.read_counts().await?;
        let Some(slot) = counts.get_mut(&date) else {
            return Err(Self::not_found(date));
        };
        *slot = count;
        self.save(&counts).await?;
        tracing::info!("💾 Updated manual meal count for {} to {}", date, count);
        Ok(())
    }

    async fn delete(&self, date: NaiveDate) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut counts = self.read_counts().await?;
        if counts.remove(&date).is_none() {
            return Err(Self::not_found(date));
        }
        self.save(&counts).await?;
        tracing::info!("🗑️ Deleted manual meal count for {}", date);
        Ok(())
    }

    async fn delete_many(&self, dates: &[NaiveDate]) -> Result<DeleteManyOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut counts = self.read_counts().await?;

        let mut outcome = DeleteManyOutcome::default();
        for date in dates {
            if counts.remove(date).is_some() {
                outcome.deleted += 1;
            } else if !outcome.not_found.contains(date) {
                outcome.not_found.push(*date);
            }
        }

        if outcome.deleted > 0 {
            self.save(&counts).await?;
        }
        tracing::info!(
            "🗑️ Deleted {} manual meal counts ({} not found)",
            outcome.deleted,
            outcome.not_found.len()
        );
        Ok(outcome)
    }

    async fn list_all(&self) -> Result<BTreeMap<NaiveDate, u32>> {
        Ok(self.load().await)
    }
}
