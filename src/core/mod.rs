pub mod classifier;
pub mod job;
pub mod name_parser;
pub mod resolver;
pub mod scheduler;
pub mod weekly;

pub use crate::domain::model::{DayClassification, MealCountResult, Roster};
pub use crate::domain::ports::{EventSource, HolidayLookup, Notifier, OverrideStore, Storage};
pub use crate::utils::error::Result;
pub use job::{JobOutcome, MealCountJob};
pub use resolver::{FetchFailurePolicy, HeadcountResolver, ResolverOptions};
