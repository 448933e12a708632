use crate::domain::model::{DayClassification, Event, HolidayInfo};
use crate::domain::ports::HolidayLookup;
use chrono::{Datelike, NaiveDate, Weekday};

pub const WORKSHOP_MARKER: &str = "워크샵";
pub const MONTHLY_MEETING_MARKER: &str = "월간회의";

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Workshop looks at the target day only.
pub fn is_workshop_day(date: NaiveDate, business_events: &[Event]) -> bool {
    business_events
        .iter()
        .any(|e| e.is_all_day() && e.covers(date) && e.title_contains(WORKSHOP_MARKER))
}

/// Monthly meeting looks at the target day and the day after, so the
/// day before the meeting also gets the expanded roster.
pub fn is_monthly_meeting_day(date: NaiveDate, business_events: &[Event]) -> bool {
    let next = date.succ_opt();
    business_events.iter().any(|e| {
        e.is_all_day()
            && e.title_contains(MONTHLY_MEETING_MARKER)
            && (e.covers(date) || next.is_some_and(|n| e.covers(n)))
    })
}

/// Workshop, monthly meeting or ordinary, from business-calendar events alone.
pub fn classify_business_day(date: NaiveDate, business_events: &[Event]) -> DayClassification {
    if is_workshop_day(date, business_events) {
        DayClassification::Workshop
    } else if is_monthly_meeting_day(date, business_events) {
        DayClassification::MonthlyMeeting
    } else {
        DayClassification::Ordinary
    }
}

pub struct DayClassifier<H: HolidayLookup> {
    holidays: H,
}

impl<H: HolidayLookup> DayClassifier<H> {
    pub fn new(holidays: H) -> Self {
        Self { holidays }
    }

    /// Precedence: weekend, public holiday, workshop, monthly meeting.
    pub async fn classify(&self, date: NaiveDate, business_events: &[Event]) -> DayClassification {
        if is_weekend(date) {
            return DayClassification::Weekend;
        }

        if let Some(info) = self.public_holiday(date).await {
            return DayClassification::PublicHoliday(info);
        }

        classify_business_day(date, business_events)
    }

    /// Lookup failures count as a working day so the daily run still goes out.
    pub async fn public_holiday(&self, date: NaiveDate) -> Option<HolidayInfo> {
        match self.holidays.holidays(date.year(), date.month()).await {
            Ok(records) => records
                .into_iter()
                .find(|r| r.locdate == date && r.is_holiday)
                .map(|r| HolidayInfo {
                    date: r.locdate,
                    name: r.name,
                }),
            Err(e) => {
                tracing::warn!(
                    "⚠️ Holiday lookup for {} failed, treating as a working day: {}",
                    date,
                    e
                );
                None
            }
        }
    }
}
