use crate::core::classifier::{classify_business_day, is_weekend, DayClassifier};
use crate::core::name_parser::NameListParser;
use crate::domain::model::{DateWindow, DayClassification, Event, MealCountResult, Roster};
use crate::domain::ports::{EventSource, HolidayLookup, OverrideStore};
use crate::utils::error::Result;
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// What to do when one calendar cannot be fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchFailurePolicy {
    /// Give up on the whole date; no count is produced.
    #[default]
    Abort,
    /// Log and carry on with the remaining calendars.
    Skip,
}

#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub calendar_ids: Vec<String>,
    pub business_calendar_id: String,
    pub timezone: Tz,
    pub fetch_failure: FetchFailurePolicy,
    pub parser: NameListParser,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Manual(MealCountResult),
    Suppressed(DayClassification),
    Computed {
        classification: DayClassification,
        result: MealCountResult,
    },
}

impl Resolution {
    pub fn into_result(self) -> Option<MealCountResult> {
        match self {
            Resolution::Manual(result) | Resolution::Computed { result, .. } => Some(result),
            Resolution::Suppressed(_) => None,
        }
    }
}

pub struct HeadcountResolver<E: EventSource, H: HolidayLookup, O: OverrideStore> {
    roster: Roster,
    events: E,
    classifier: DayClassifier<H>,
    overrides: O,
    options: ResolverOptions,
}

impl<E: EventSource, H: HolidayLookup, O: OverrideStore> HeadcountResolver<E, H, O> {
    pub fn new(roster: Roster, events: E, holidays: H, overrides: O, options: ResolverOptions) -> Self {
        Self {
            roster,
            events,
            classifier: DayClassifier::new(holidays),
            overrides,
            options,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.options.timezone
    }

    pub fn overrides(&self) -> &O {
        &self.overrides
    }

    /// `None` when the day is suppressed (weekend, public holiday, workshop).
    pub async fn resolve(&self, date: NaiveDate) -> Result<Option<MealCountResult>> {
        Ok(self.resolve_detailed(date).await?.into_result())
    }

    pub async fn resolve_detailed(&self, date: NaiveDate) -> Result<Resolution> {
        if is_weekend(date) {
            tracing::debug!("{} is a weekend, skipping", date);
            return Ok(Resolution::Suppressed(DayClassification::Weekend));
        }

        if let Some(count) = self.override_count(date).await {
            tracing::info!("✍️ Manual meal count for {}: {}", date, count);
            return Ok(Resolution::Manual(MealCountResult::manual(date, count)));
        }

        // 公休日不需要業務行事曆，先判斷
        if let Some(info) = self.classifier.public_holiday(date).await {
            let classification = DayClassification::PublicHoliday(info);
            tracing::info!("⏭️ {} is a {} day, no meal count", date, classification.label());
            return Ok(Resolution::Suppressed(classification));
        }

        let business_events = self.business_events(date).await?;
        let classification = classify_business_day(date, &business_events);
        if classification.suppresses() {
            tracing::info!("⏭️ {} is a {} day, no meal count", date, classification.label());
            return Ok(Resolution::Suppressed(classification));
        }

        let result = self.compute(date, &classification).await?;
        tracing::info!(
            "🍚 Meal count for {} - included: {}{:?}, excluded: {}{:?}, default: {}",
            date,
            result.count,
            result.included_people,
            result.excluded_people.len(),
            result.excluded_people,
            result.default_count
        );

        Ok(Resolution::Computed {
            classification,
            result,
        })
    }

    async fn override_count(&self, date: NaiveDate) -> Option<u32> {
        match self.overrides.get(date).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("⚠️ Could not read manual counts, ignoring them: {}", e);
                None
            }
        }
    }

    async fn business_events(&self, date: NaiveDate) -> Result<Vec<Event>> {
        let window = DateWindow::local_days(date, 2, self.options.timezone);
        self.fetch(&self.options.business_calendar_id, &window).await
    }

    /// Applies the fetch failure policy; `Skip` turns an error into no events.
    async fn fetch(&self, calendar_id: &str, window: &DateWindow) -> Result<Vec<Event>> {
        match self.events.list_events(calendar_id, window).await {
            Ok(events) => Ok(events),
            Err(e) => match self.options.fetch_failure {
                FetchFailurePolicy::Abort => {
                    tracing::error!("❌ Fetching calendar {} failed: {}", calendar_id, e);
                    Err(e)
                }
                FetchFailurePolicy::Skip => {
                    tracing::warn!("⚠️ Fetching calendar {} failed, skipping it: {}", calendar_id, e);
                    Ok(Vec::new())
                }
            },
        }
    }

    async fn compute(
        &self,
        date: NaiveDate,
        classification: &DayClassification,
    ) -> Result<MealCountResult> {
        let mut attending: Vec<String> = self.roster.baseline().to_vec();
        let mut excluded: Vec<String> = Vec::new();

        if *classification == DayClassification::MonthlyMeeting {
            tracing::info!("📅 Monthly meeting around {}, standing exclusions eat too", date);
            for name in self.roster.standing_exclusions() {
                if !attending.contains(name) {
                    attending.push(name.clone());
                }
            }
        }
        let default_count = attending.len() as u32;
        let mut anonymous_absentees: u32 = 0;

        let window = DateWindow::local_days(date, 1, self.options.timezone);
        for calendar_id in &self.options.calendar_ids {
            let events = self.fetch(calendar_id, &window).await?;
            if events.is_empty() {
                tracing::debug!("No events on {} for {}", calendar_id, date);
            }

            for event in events {
                if !event.is_all_day() {
                    tracing::debug!("Skipping timed event {:?}", event.title);
                    continue;
                }
                let Some(title) = event.title.as_deref().filter(|t| !t.trim().is_empty()) else {
                    continue;
                };

                let parsed = self.options.parser.parse_with_extras(title);
                anonymous_absentees = anonymous_absentees.saturating_add(parsed.extra);

                for name in parsed.names {
                    if excluded.contains(&name) {
                        continue;
                    }
                    let Some(pos) = attending.iter().position(|n| *n == name) else {
                        tracing::debug!("'{}' is not on today's roster", name);
                        continue;
                    };
                    attending.remove(pos);
                    excluded.push(name);
                }
            }
        }

        // 舊版用減法計算曾出現負數，這裡保底為 0
        let count = (attending.len() as u32).saturating_sub(anonymous_absentees);

        Ok(MealCountResult {
            date,
            count,
            included_people: attending,
            excluded_people: excluded,
            default_count,
            anonymous_absentees,
        })
    }
}
