use crate::core::resolver::HeadcountResolver;
use crate::domain::model::MealCountResult;
use crate::domain::ports::{EventSource, HolidayLookup, Notifier, OverrideStore};
use chrono::{NaiveDate, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Sent(MealCountResult),
    DeliveryFailed(MealCountResult, String),
    /// Suppressed day, nothing to send.
    Skipped,
    /// Resolution itself failed (e.g. a calendar could not be read).
    Failed(String),
}

impl JobOutcome {
    pub fn result(&self) -> Option<&MealCountResult> {
        match self {
            JobOutcome::Sent(result) | JobOutcome::DeliveryFailed(result, _) => Some(result),
            JobOutcome::Skipped | JobOutcome::Failed(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Sent(_) | JobOutcome::Skipped)
    }
}

/// One daily run: resolve the date, then mail the count.
pub struct MealCountJob<E, H, O, N>
where
    E: EventSource,
    H: HolidayLookup,
    O: OverrideStore,
    N: Notifier,
{
    resolver: HeadcountResolver<E, H, O>,
    notifier: N,
}

impl<E, H, O, N> MealCountJob<E, H, O, N>
where
    E: EventSource,
    H: HolidayLookup,
    O: OverrideStore,
    N: Notifier,
{
    pub fn new(resolver: HeadcountResolver<E, H, O>, notifier: N) -> Self {
        Self { resolver, notifier }
    }

    pub fn resolver(&self) -> &HeadcountResolver<E, H, O> {
        &self.resolver
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.resolver.timezone()).date_naive()
    }

    pub async fn run_today(&self) -> JobOutcome {
        self.run_for(self.today()).await
    }

    /// Never returns an error: every failure ends up in the outcome and the log.
    pub async fn run_for(&self, date: NaiveDate) -> JobOutcome {
        tracing::info!("🚀 Starting meal count job for {}", date);

        let result = match self.resolver.resolve(date).await {
            Ok(Some(result)) => result,
            Ok(None) => {
                tracing::info!("⏭️ No meal count needed for {}", date);
                return JobOutcome::Skipped;
            }
            Err(e) => {
                tracing::error!(
                    "❌ Meal count for {} failed: {} (Category: {:?})",
                    date,
                    e,
                    e.category()
                );
                tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
                return JobOutcome::Failed(e.to_string());
            }
        };

        match self.notifier.send_count(date, result.count).await {
            Ok(()) => {
                tracing::info!("✅ Meal count {} sent for {}", result.count, date);
                JobOutcome::Sent(result)
            }
            Err(e) => {
                let message = e.user_friendly_message();
                tracing::error!("❌ {}", message);
                JobOutcome::DeliveryFailed(result, message)
            }
        }
    }
}
