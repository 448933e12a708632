use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// 手動輸入的人數沒有名單，以此標記取代
pub const MANUAL_ENTRY_MARKER: &str = "수동 입력";

/// Trim and collapse inner whitespace runs so "김  철수 " and "김 철수" compare equal.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The configured people: who eats by default and who is excluded by policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    baseline: Vec<String>,
    standing_exclusions: Vec<String>,
}

impl Roster {
    /// Names are normalised and deduplicated. A name listed in both sets stays in `baseline`.
    pub fn new<I, J, S, T>(baseline: I, standing_exclusions: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let mut base: Vec<String> = Vec::new();
        for name in baseline {
            let name = normalize_name(name.as_ref());
            if !name.is_empty() && !base.contains(&name) {
                base.push(name);
            }
        }

        let mut exclusions: Vec<String> = Vec::new();
        for name in standing_exclusions {
            let name = normalize_name(name.as_ref());
            if !name.is_empty() && !base.contains(&name) && !exclusions.contains(&name) {
                exclusions.push(name);
            }
        }

        Self {
            baseline: base,
            standing_exclusions: exclusions,
        }
    }

    pub fn baseline(&self) -> &[String] {
        &self.baseline
    }

    pub fn standing_exclusions(&self) -> &[String] {
        &self.standing_exclusions
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTime {
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
}

impl EventTime {
    pub fn date(&self) -> NaiveDate {
        match self {
            EventTime::Date(d) => *d,
            EventTime::DateTime(dt) => dt.date_naive(),
        }
    }
}

/// One calendar entry as far as headcount is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub calendar_id: String,
    pub title: Option<String>,
    pub start: EventTime,
    pub end: Option<EventTime>,
}

impl Event {
    pub fn all_day(calendar_id: &str, title: &str, date: NaiveDate) -> Self {
        Self {
            calendar_id: calendar_id.to_string(),
            title: Some(title.to_string()),
            start: EventTime::Date(date),
            end: date.succ_opt().map(EventTime::Date),
        }
    }

    /// Events with a time of day are online meetings and never affect headcount.
    pub fn is_all_day(&self) -> bool {
        matches!(self.start, EventTime::Date(_))
    }

    /// All-day coverage, end exclusive. Timed events cover nothing.
    pub fn covers(&self, date: NaiveDate) -> bool {
        let EventTime::Date(start) = self.start else {
            return false;
        };
        match &self.end {
            Some(end) if end.date() > start => start <= date && date < end.date(),
            _ => start == date,
        }
    }

    pub fn title_contains(&self, marker: &str) -> bool {
        self.title.as_deref().is_some_and(|t| t.contains(marker))
    }
}

/// Half-open local-time window used when asking a calendar for events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl DateWindow {
    /// `days` whole days starting at local midnight of `date`.
    pub fn local_days(date: NaiveDate, days: u64, tz: Tz) -> Self {
        let end_date = date.checked_add_days(Days::new(days)).unwrap_or(date);
        Self {
            start: local_midnight(date, tz),
            end: local_midnight(end_date, tz),
        }
    }
}

fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<FixedOffset> {
    let naive = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.fixed_offset(),
        None => tz.from_utc_datetime(&naive).fixed_offset(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayRecord {
    pub locdate: NaiveDate,
    pub is_holiday: bool,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayInfo {
    pub date: NaiveDate,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayClassification {
    Weekend,
    PublicHoliday(HolidayInfo),
    Workshop,
    MonthlyMeeting,
    Ordinary,
}

impl DayClassification {
    /// Weekend, public holiday and workshop days produce no count at all.
    pub fn suppresses(&self) -> bool {
        matches!(
            self,
            DayClassification::Weekend
                | DayClassification::PublicHoliday(_)
                | DayClassification::Workshop
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            DayClassification::Weekend => "주말",
            DayClassification::PublicHoliday(_) => "공휴일",
            DayClassification::Workshop => "워크샵",
            DayClassification::MonthlyMeeting => "월간회의",
            DayClassification::Ordinary => "평일",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealCountResult {
    pub date: NaiveDate,
    pub count: u32,
    pub included_people: Vec<String>,
    pub excluded_people: Vec<String>,
    pub default_count: u32,
    #[serde(default)]
    pub anonymous_absentees: u32,
}

impl MealCountResult {
    pub fn manual(date: NaiveDate, count: u32) -> Self {
        Self {
            date,
            count,
            included_people: vec![MANUAL_ENTRY_MARKER.to_string()],
            excluded_people: vec![MANUAL_ENTRY_MARKER.to_string()],
            default_count: count,
            anonymous_absentees: 0,
        }
    }

    pub fn is_manual(&self) -> bool {
        self.included_people.len() == 1 && self.included_people[0] == MANUAL_ENTRY_MARKER
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteManyOutcome {
    pub deleted: usize,
    pub not_found: Vec<NaiveDate>,
}
