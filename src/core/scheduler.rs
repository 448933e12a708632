use crate::core::job::MealCountJob;
use crate::domain::ports::{EventSource, HolidayLookup, Notifier, OverrideStore};
use chrono::{DateTime, Datelike, Days, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Monday to Friday at a fixed local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekdaySchedule {
    pub hour: u32,
    pub minute: u32,
    pub timezone: Tz,
}

impl WeekdaySchedule {
    pub fn new(hour: u32, minute: u32, timezone: Tz) -> Self {
        Self {
            hour,
            minute,
            timezone,
        }
    }

    /// First weekday fire time strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let fire_at = NaiveTime::from_hms_opt(self.hour, self.minute, 0)?;
        let local_today = now.with_timezone(&self.timezone).date_naive();

        // 最多找 8 天即可涵蓋週末
        for offset in 0..8 {
            let day = local_today.checked_add_days(Days::new(offset))?;
            if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                continue;
            }
            let Some(candidate) = self
                .timezone
                .from_local_datetime(&day.and_time(fire_at))
                .earliest()
            else {
                continue;
            };
            let candidate = candidate.with_timezone(&Utc);
            if candidate > now {
                return Some(candidate);
            }
        }
        None
    }
}

struct RunningTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Runs the daily job on a [`WeekdaySchedule`] until stopped.
pub struct Scheduler<E, H, O, N>
where
    E: EventSource + 'static,
    H: HolidayLookup + 'static,
    O: OverrideStore + 'static,
    N: Notifier + 'static,
{
    job: Arc<MealCountJob<E, H, O, N>>,
    schedule: WeekdaySchedule,
    task: Mutex<Option<RunningTask>>,
}

impl<E, H, O, N> Scheduler<E, H, O, N>
where
    E: EventSource + 'static,
    H: HolidayLookup + 'static,
    O: OverrideStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(job: Arc<MealCountJob<E, H, O, N>>, schedule: WeekdaySchedule) -> Self {
        Self {
            job,
            schedule,
            task: Mutex::new(None),
        }
    }

    /// Returns `false` when already running.
    pub async fn start(&self) -> bool {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return false;
        }

        let (stop, mut stopped) = watch::channel(false);
        let job = Arc::clone(&self.job);
        let schedule = self.schedule;

        let handle = tokio::spawn(async move {
            loop {
                let Some(next) = schedule.next_after(Utc::now()) else {
                    tracing::error!("❌ Could not compute the next run time, scheduler exiting");
                    break;
                };
                tracing::info!("⏰ Next meal count run at {}", next.with_timezone(&schedule.timezone));
                let wait = (next - Utc::now()).to_std().unwrap_or_default();

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        let outcome = job.run_today().await;
                        tracing::info!("Scheduled run finished: {:?}", outcome);
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        *task = Some(RunningTask { stop, handle });
        tracing::info!("meal count scheduler started");
        true
    }

    /// Returns `false` when it was not running.
    pub async fn stop(&self) -> bool {
        let Some(running) = self.task.lock().await.take() else {
            return false;
        };
        let _ = running.stop.send(true);
        if let Err(e) = running.handle.await {
            tracing::warn!("⚠️ Scheduler task ended abnormally: {}", e);
        }
        tracing::info!("meal count scheduler stopped");
        true
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }
}
