use crate::domain::model::{DateWindow, DeleteManyOutcome, Event, HolidayRecord};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Raw byte storage behind the override file.
pub trait Storage: Send + Sync {
    /// `Ok(None)` when the file does not exist yet.
    fn read_file(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Calendar feed. Events come back in start-time order.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn list_events(&self, calendar_id: &str, window: &DateWindow) -> Result<Vec<Event>>;
}

#[async_trait]
pub trait HolidayLookup: Send + Sync {
    async fn holidays(&self, year: i32, month: u32) -> Result<Vec<HolidayRecord>>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_count(&self, date: NaiveDate, count: u32) -> Result<()>;
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

#[async_trait]
pub trait OverrideStore: Send + Sync {
    async fn get(&self, date: NaiveDate) -> Result<Option<u32>>;
    async fn put(&self, date: NaiveDate, count: u32) -> Result<()>;
    /// Fails with `NotFound` when nothing is stored for `date`.
    async fn update(&self, date: NaiveDate, count: u32) -> Result<()>;
    /// Fails with `NotFound` when nothing is stored for `date`.
    async fn delete(&self, date: NaiveDate) -> Result<()>;
    async fn delete_many(&self, dates: &[NaiveDate]) -> Result<DeleteManyOutcome>;
    async fn list_all(&self) -> Result<BTreeMap<NaiveDate, u32>>;
}
