pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{GmailNotifier, GoogleCalendarSource, JsonOverrideStore, LocalStorage, PublicHolidayApi};
pub use config::AppConfig;
pub use core::{HeadcountResolver, JobOutcome, MealCountJob};
pub use utils::error::{MealError, Result};
