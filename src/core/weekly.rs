use crate::core::resolver::{HeadcountResolver, Resolution};
use crate::domain::ports::{EventSource, HolidayLookup, OverrideStore};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::Serialize;

const DAY_NAMES: [&str; 5] = ["월요일", "화요일", "수요일", "목요일", "금요일"];

/// Monday to Friday of the week containing `today`.
pub fn current_week_dates(today: NaiveDate) -> Vec<NaiveDate> {
    let monday = today.week(Weekday::Mon).first_day();
    (0..5)
        .filter_map(|offset| monday.checked_add_days(Days::new(offset)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DayStatus {
    Calculated {
        count: u32,
        included_people: Vec<String>,
        excluded_people: Vec<String>,
        default_count: u32,
    },
    Skipped {
        reason: String,
    },
    Error {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayReport {
    pub date: NaiveDate,
    pub day_name: String,
    #[serde(flatten)]
    pub status: DayStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyReport {
    pub days: Vec<DayReport>,
    pub calculated: usize,
    pub skipped: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekSummary {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub daily_counts: Vec<DailyCount>,
}

/// Re-runs resolution for every weekday of a week. Sends nothing.
pub struct WeeklyReplay<'a, E: EventSource, H: HolidayLookup, O: OverrideStore> {
    resolver: &'a HeadcountResolver<E, H, O>,
}

impl<'a, E: EventSource, H: HolidayLookup, O: OverrideStore> WeeklyReplay<'a, E, H, O> {
    pub fn new(resolver: &'a HeadcountResolver<E, H, O>) -> Self {
        Self { resolver }
    }

    pub async fn run(&self, today: NaiveDate) -> WeeklyReport {
        tracing::info!("==================== Weekly meal count replay ====================");

        let mut days = Vec::new();
        for (date, day_name) in current_week_dates(today).into_iter().zip(DAY_NAMES) {
            let status = self.replay_day(date).await;
            match &status {
                DayStatus::Calculated { count, .. } => {
                    tracing::info!("{} ({}): {}명", day_name, date, count)
                }
                DayStatus::Skipped { reason } => {
                    tracing::info!("{} ({}): 제외 - {}", day_name, date, reason)
                }
                DayStatus::Error { error } => {
                    tracing::warn!("{} ({}): 오류 - {}", day_name, date, error)
                }
            }
            days.push(DayReport {
                date,
                day_name: day_name.to_string(),
                status,
            });
        }

        let calculated = days
            .iter()
            .filter(|d| matches!(d.status, DayStatus::Calculated { .. }))
            .count();
        let skipped = days
            .iter()
            .filter(|d| matches!(d.status, DayStatus::Skipped { .. }))
            .count();
        let errors = days.len() - calculated - skipped;

        tracing::info!(
            "📊 Replay summary - days: {}, calculated: {}, skipped: {}, errors: {}",
            days.len(),
            calculated,
            skipped,
            errors
        );

        WeeklyReport {
            days,
            calculated,
            skipped,
            errors,
        }
    }

    pub async fn summary(&self, today: NaiveDate) -> WeekSummary {
        let report = self.run(today).await;
        let daily_counts = report
            .days
            .iter()
            .map(|day| match &day.status {
                DayStatus::Calculated { count, .. } => DailyCount {
                    date: day.date,
                    count: *count,
                    note: None,
                },
                DayStatus::Skipped { .. } => DailyCount {
                    date: day.date,
                    count: 0,
                    note: Some("제외된 날".to_string()),
                },
                DayStatus::Error { error } => DailyCount {
                    date: day.date,
                    count: 0,
                    note: Some(error.clone()),
                },
            })
            .collect::<Vec<_>>();

        let week_start = daily_counts.first().map(|d| d.date).unwrap_or(today);
        let week_end = daily_counts.last().map(|d| d.date).unwrap_or(today);
        WeekSummary {
            week_start,
            week_end,
            daily_counts,
        }
    }

    async fn replay_day(&self, date: NaiveDate) -> DayStatus {
        match self.resolver.resolve_detailed(date).await {
            Ok(Resolution::Suppressed(classification)) => DayStatus::Skipped {
                reason: classification.label().to_string(),
            },
            Ok(Resolution::Manual(result)) | Ok(Resolution::Computed { result, .. }) => {
                DayStatus::Calculated {
                    count: result.count,
                    included_people: result.included_people,
                    excluded_people: result.excluded_people,
                    default_count: result.default_count,
                }
            }
            Err(e) => DayStatus::Error {
                error: e.to_string(),
            },
        }
    }
}
