use crate::domain::model::{DateWindow, Event, EventTime};
use crate::domain::ports::{CredentialProvider, EventSource};
use crate::utils::error::{MealError, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

pub const DEFAULT_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

/// One or two days never need more than a handful of pages.
const MAX_PAGES: usize = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleEvent {
    summary: Option<String>,
    status: Option<String>,
    start: Option<GoogleEventTime>,
    end: Option<GoogleEventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventTime {
    date: Option<NaiveDate>,
    date_time: Option<DateTime<FixedOffset>>,
}

impl GoogleEventTime {
    fn into_event_time(self) -> Option<EventTime> {
        match (self.date_time, self.date) {
            (Some(dt), _) => Some(EventTime::DateTime(dt)),
            (None, Some(d)) => Some(EventTime::Date(d)),
            (None, None) => None,
        }
    }
}

/// Google Calendar v3 `events.list`, expanded to single instances.
pub struct GoogleCalendarSource {
    client: Client,
    api_base: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl GoogleCalendarSource {
    pub fn new(client: Client, api_base: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn events_url(&self, calendar_id: &str) -> Result<url::Url> {
        let mut url = url::Url::parse(&self.api_base).map_err(|e| MealError::ConfigError {
            message: format!("invalid calendar API base '{}': {}", self.api_base, e),
        })?;
        url.path_segments_mut()
            .map_err(|_| MealError::ConfigError {
                message: format!("calendar API base '{}' cannot have a path", self.api_base),
            })?
            .pop_if_empty()
            .extend(["calendars", calendar_id, "events"]);
        Ok(url)
    }

    async fn fetch_page(
        &self,
        calendar_id: &str,
        window: &DateWindow,
        page_token: Option<&str>,
    ) -> Result<EventsPage> {
        let token = self.credentials.access_token().await?;
        let time_min = window.start.to_rfc3339();
        let time_max = window.end.to_rfc3339();

        let mut query: Vec<(&str, &str)> = vec![
            ("timeMin", time_min.as_str()),
            ("timeMax", time_max.as_str()),
            ("singleEvents", "true"),
            ("orderBy", "startTime"),
        ];
        if let Some(page_token) = page_token {
            query.push(("pageToken", page_token));
        }

        let url = self.events_url(calendar_id)?;
        tracing::debug!("Fetching events from {} ({} ~ {})", calendar_id, time_min, time_max);
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MealError::upstream(
                "calendar",
                format!("{} returned {}: {}", calendar_id, status, body),
            ));
        }

        response
            .json::<EventsPage>()
            .await
            .map_err(|e| MealError::upstream("calendar", format!("malformed events page: {}", e)))
    }
}

#[async_trait]
impl EventSource for GoogleCalendarSource {
    async fn list_events(&self, calendar_id: &str, window: &DateWindow) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page = self
                .fetch_page(calendar_id, window, page_token.as_deref())
                .await?;

            for item in page.items {
                if item.status.as_deref() == Some("cancelled") {
                    continue;
                }
                let Some(start) = item.start.and_then(GoogleEventTime::into_event_time) else {
                    continue;
                };
                events.push(Event {
                    calendar_id: calendar_id.to_string(),
                    title: item.summary,
                    start,
                    end: item.end.and_then(GoogleEventTime::into_event_time),
                });
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => {
                    page_token = None;
                    break;
                }
            }
        }

        if page_token.is_some() {
            tracing::warn!("⚠️ {} returned more than {} pages, truncating", calendar_id, MAX_PAGES);
        }

        tracing::debug!("{} events on {}", events.len(), calendar_id);
        Ok(events)
    }
}
