// Adapters layer: concrete implementations of the domain ports (Google APIs, holiday API, local files)

pub mod credentials;
pub mod gmail;
pub mod google_calendar;
pub mod holiday_api;
pub mod override_store;
pub mod storage;

pub use credentials::{RefreshTokenProvider, StaticTokenProvider};
pub use gmail::{EmailSettings, GmailNotifier};
pub use google_calendar::GoogleCalendarSource;
pub use holiday_api::PublicHolidayApi;
pub use override_store::JsonOverrideStore;
pub use storage::LocalStorage;
