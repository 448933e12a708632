use crate::domain::model::HolidayRecord;
use crate::domain::ports::HolidayLookup;
use crate::utils::error::{MealError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;

pub const DEFAULT_HOLIDAY_ENDPOINT: &str =
    "http://apis.data.go.kr/B090041/openapi/service/SpcdeInfoService/getRestDeInfo";

/// 공공데이터포털 특일 정보 (getRestDeInfo)
pub struct PublicHolidayApi {
    client: Client,
    endpoint: String,
    service_key: String,
}

impl PublicHolidayApi {
    pub fn new(client: Client, endpoint: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            service_key: service_key.into(),
        }
    }
}

#[async_trait]
impl HolidayLookup for PublicHolidayApi {
    async fn holidays(&self, year: i32, month: u32) -> Result<Vec<HolidayRecord>> {
        let year = year.to_string();
        let month = format!("{:02}", month);

        tracing::debug!("Looking up public holidays for {}-{}", year, month);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("serviceKey", self.service_key.as_str()),
                ("pageNo", "1"),
                ("numOfRows", "100"),
                ("solYear", year.as_str()),
                ("solMonth", month.as_str()),
                ("_type", "json"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MealError::upstream("holiday", format!("status {}", status)));
        }

        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text)
            .map_err(|e| MealError::upstream("holiday", format!("malformed response: {}", e)))?;
        parse_holidays(&body)
    }
}

/// `items.item` is an array, a bare object for a single holiday, or
/// missing entirely when `totalCount` is 0.
pub fn parse_holidays(response: &Value) -> Result<Vec<HolidayRecord>> {
    let body = response
        .pointer("/response/body")
        .ok_or_else(|| MealError::upstream("holiday", "response.body missing"))?;

    let total = body.get("totalCount").and_then(as_u64).unwrap_or(0);
    if total == 0 {
        return Ok(Vec::new());
    }

    let items: Vec<&Value> = match body.pointer("/items/item") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    };

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        let Some(locdate) = item.get("locdate").and_then(as_date) else {
            tracing::debug!("Skipping holiday entry without a usable locdate: {}", item);
            continue;
        };
        records.push(HolidayRecord {
            locdate,
            is_holiday: item.get("isHoliday").and_then(Value::as_str) == Some("Y"),
            name: item
                .get("dateName")
                .and_then(Value::as_str)
                .map(str::to_string),
        });
    }
    Ok(records)
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_date(value: &Value) -> Option<NaiveDate> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    NaiveDate::parse_from_str(&raw, "%Y%m%d").ok()
}
