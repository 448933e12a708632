use chrono::NaiveDate;
use httpmock::prelude::*;
use meal_count_bot::adapters::credentials::StaticTokenProvider;
use meal_count_bot::adapters::gmail::{EmailSettings, DEFAULT_SUBJECT_TEMPLATE};
use meal_count_bot::config::app_config::{http_client, AppConfig};
use meal_count_bot::core::resolver::{FetchFailurePolicy, ResolverOptions};
use meal_count_bot::core::weekly::{DayStatus, WeeklyReplay};
use meal_count_bot::core::name_parser::NameListParser;
use meal_count_bot::domain::model::Roster;
use meal_count_bot::domain::ports::{CredentialProvider, OverrideStore};
use meal_count_bot::utils::validation::Validate;
use meal_count_bot::{
    GmailNotifier, GoogleCalendarSource, HeadcountResolver, JobOutcome, JsonOverrideStore,
    LocalStorage, MealCountJob, PublicHolidayApi,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

type Resolver = HeadcountResolver<GoogleCalendarSource, PublicHolidayApi, JsonOverrideStore<LocalStorage>>;

fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()
}

fn credentials() -> Arc<dyn CredentialProvider> {
    Arc::new(StaticTokenProvider::new("test-token"))
}

fn build_resolver(server: &MockServer, dir: &TempDir, roster: Roster, policy: FetchFailurePolicy) -> Resolver {
    let events = GoogleCalendarSource::new(reqwest::Client::new(), server.base_url(), credentials());
    let holidays = PublicHolidayApi::new(reqwest::Client::new(), server.url("/holiday"), "holiday-key");
    let overrides = JsonOverrideStore::new(LocalStorage::new(dir.path()), "meal_counts.json");

    HeadcountResolver::new(
        roster,
        events,
        holidays,
        overrides,
        ResolverOptions {
            calendar_ids: vec!["team".to_string(), "leave".to_string()],
            business_calendar_id: "business".to_string(),
            timezone: chrono_tz::Asia::Seoul,
            fetch_failure: policy,
            parser: NameListParser::default(),
        },
    )
}

fn build_job(server: &MockServer, resolver: Resolver) -> MealCountJob<GoogleCalendarSource, PublicHolidayApi, JsonOverrideStore<LocalStorage>, GmailNotifier> {
    let notifier = GmailNotifier::new(
        reqwest::Client::new(),
        server.base_url(),
        credentials(),
        EmailSettings {
            sender: "bot@example.com".to_string(),
            to: vec!["orders@example.com".to_string()],
            subject_template: DEFAULT_SUBJECT_TEMPLATE.to_string(),
        },
    );
    MealCountJob::new(resolver, notifier)
}

fn no_holidays(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path("/holiday");
        then.status(200)
            .json_body(json!({"response": {"body": {"items": "", "totalCount": 0}}}));
    })
}

fn calendar<'a>(server: &'a MockServer, id: &str, items: serde_json::Value) -> httpmock::Mock<'a> {
    let path = format!("/calendars/{}/events", id);
    server.mock(move |when, then| {
        when.method(GET)
            .path(path)
            .header("authorization", "Bearer test-token");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({ "items": items }));
    })
}

#[tokio::test]
async fn test_end_to_end_count_is_mailed() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();

    let holiday_mock = no_holidays(&server);
    calendar(&server, "business", json!([]));
    calendar(
        &server,
        "team",
        json!([
            {"summary": "A - 연차", "start": {"date": "2025-03-04"}, "end": {"date": "2025-03-05"}},
            {"summary": "B - 외근", "start": {"dateTime": "2025-03-04T14:00:00+09:00"}}
        ]),
    );
    calendar(&server, "leave", json!([]));
    let gmail_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/users/me/messages/send")
            .header("authorization", "Bearer test-token");
        then.status(200).json_body(json!({"id": "msg-1"}));
    });

    let resolver = build_resolver(&server, &dir, Roster::new(["A", "B", "C"], ["D"]), FetchFailurePolicy::Abort);
    let job = build_job(&server, resolver);

    let outcome = job.run_for(tuesday()).await;

    holiday_mock.assert();
    gmail_mock.assert();
    let JobOutcome::Sent(result) = outcome else {
        panic!("expected Sent, got {:?}", outcome);
    };
    assert_eq!(result.count, 2);
    assert_eq!(result.included_people, vec!["B", "C"]);
    assert_eq!(result.excluded_people, vec!["A"]);
    assert_eq!(result.default_count, 3);
}

#[tokio::test]
async fn test_override_skips_every_upstream_call() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();

    let holiday_mock = no_holidays(&server);
    let business_mock = calendar(&server, "business", json!([]));
    let team_mock = calendar(&server, "team", json!([]));

    let resolver = build_resolver(&server, &dir, Roster::new(["A", "B", "C"], Vec::<String>::new()), FetchFailurePolicy::Abort);
    resolver.overrides().put(tuesday(), 7).await.unwrap();

    let result = resolver.resolve(tuesday()).await.unwrap().unwrap();

    assert_eq!(result.count, 7);
    assert!(result.is_manual());
    holiday_mock.assert_hits(0);
    business_mock.assert_hits(0);
    team_mock.assert_hits(0);

    // 檔案內容是 ISO 日期對應人數
    let raw = std::fs::read_to_string(dir.path().join("meal_counts.json")).unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored, json!({"2025-03-04": 7}));
}

#[tokio::test]
async fn test_weekend_ignores_override() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let business_mock = calendar(&server, "business", json!([]));

    let resolver = build_resolver(&server, &dir, Roster::new(["A"], Vec::<String>::new()), FetchFailurePolicy::Abort);
    let saturday = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
    resolver.overrides().put(saturday, 4).await.unwrap();

    assert_eq!(resolver.resolve(saturday).await.unwrap(), None);
    business_mock.assert_hits(0);
}

#[tokio::test]
async fn test_public_holiday_sends_nothing() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET)
            .path("/holiday")
            .query_param("solYear", "2025")
            .query_param("solMonth", "03");
        then.status(200).json_body(json!({"response": {"body": {
            "items": {"item": {"dateName": "임시공휴일", "isHoliday": "Y", "locdate": 20250304}},
            "totalCount": 1
        }}}));
    });
    calendar(&server, "business", json!([]));
    let team_mock = calendar(&server, "team", json!([]));
    let gmail_mock = server.mock(|when, then| {
        when.method(POST).path("/users/me/messages/send");
        then.status(200);
    });

    let resolver = build_resolver(&server, &dir, Roster::new(["A", "B"], Vec::<String>::new()), FetchFailurePolicy::Abort);
    let outcome = build_job(&server, resolver).run_for(tuesday()).await;

    assert_eq!(outcome, JobOutcome::Skipped);
    team_mock.assert_hits(0);
    gmail_mock.assert_hits(0);
}

#[tokio::test]
async fn test_public_holiday_skips_even_when_business_calendar_is_down() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/holiday");
        then.status(200).json_body(json!({"response": {"body": {
            "items": {"item": {"dateName": "임시공휴일", "isHoliday": "Y", "locdate": 20250304}},
            "totalCount": 1
        }}}));
    });
    let business_mock = server.mock(|when, then| {
        when.method(GET).path("/calendars/business/events");
        then.status(503);
    });
    let gmail_mock = server.mock(|when, then| {
        when.method(POST).path("/users/me/messages/send");
        then.status(200);
    });

    let resolver = build_resolver(&server, &dir, Roster::new(["A", "B"], Vec::<String>::new()), FetchFailurePolicy::Abort);
    let outcome = build_job(&server, resolver).run_for(tuesday()).await;

    assert_eq!(outcome, JobOutcome::Skipped);
    business_mock.assert_hits(0);
    gmail_mock.assert_hits(0);
}

#[tokio::test]
async fn test_holiday_api_failure_fails_open() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/holiday");
        then.status(500).body("internal error");
    });
    calendar(&server, "business", json!([]));
    calendar(&server, "team", json!([]));
    calendar(&server, "leave", json!([]));

    let resolver = build_resolver(&server, &dir, Roster::new(["A", "B"], Vec::<String>::new()), FetchFailurePolicy::Abort);
    let result = resolver.resolve(tuesday()).await.unwrap().unwrap();

    assert_eq!(result.count, 2);
}

#[tokio::test]
async fn test_calendar_failure_aborts_without_email() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();

    no_holidays(&server);
    calendar(&server, "business", json!([]));
    server.mock(|when, then| {
        when.method(GET).path("/calendars/team/events");
        then.status(503).body("backend error");
    });
    let gmail_mock = server.mock(|when, then| {
        when.method(POST).path("/users/me/messages/send");
        then.status(200);
    });

    let resolver = build_resolver(&server, &dir, Roster::new(["A", "B"], Vec::<String>::new()), FetchFailurePolicy::Abort);
    let outcome = build_job(&server, resolver).run_for(tuesday()).await;

    assert!(matches!(outcome, JobOutcome::Failed(_)));
    gmail_mock.assert_hits(0);
}

#[tokio::test]
async fn test_skip_policy_uses_remaining_calendars() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();

    no_holidays(&server);
    calendar(&server, "business", json!([]));
    server.mock(|when, then| {
        when.method(GET).path("/calendars/team/events");
        then.status(503);
    });
    calendar(
        &server,
        "leave",
        json!([{"summary": "B - 병가", "start": {"date": "2025-03-04"}}]),
    );

    let resolver = build_resolver(&server, &dir, Roster::new(["A", "B"], Vec::<String>::new()), FetchFailurePolicy::Skip);
    let result = resolver.resolve(tuesday()).await.unwrap().unwrap();

    assert_eq!(result.count, 1);
    assert_eq!(result.excluded_people, vec!["B"]);
}

#[tokio::test]
async fn test_monthly_meeting_tomorrow_expands_roster() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();

    no_holidays(&server);
    calendar(
        &server,
        "business",
        json!([{"summary": "3월 월간회의", "start": {"date": "2025-03-05"}, "end": {"date": "2025-03-06"}}]),
    );
    calendar(&server, "team", json!([]));
    calendar(
        &server,
        "leave",
        json!([{"summary": "C - 출장", "start": {"date": "2025-03-04"}}]),
    );

    let resolver = build_resolver(&server, &dir, Roster::new(["A", "B"], ["C", "D"]), FetchFailurePolicy::Abort);
    let result = resolver.resolve(tuesday()).await.unwrap().unwrap();

    assert_eq!(result.default_count, 4);
    assert_eq!(result.count, 3);
    assert_eq!(result.count as usize + result.excluded_people.len(), result.default_count as usize);
}

#[tokio::test]
async fn test_weekly_replay_never_mails() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();

    no_holidays(&server);
    calendar(&server, "business", json!([]));
    calendar(
        &server,
        "team",
        json!([{"summary": "A - 연차", "start": {"date": "2025-03-04"}}]),
    );
    calendar(&server, "leave", json!([]));
    let gmail_mock = server.mock(|when, then| {
        when.method(POST).path("/users/me/messages/send");
        then.status(200);
    });

    let resolver = build_resolver(&server, &dir, Roster::new(["A", "B", "C"], Vec::<String>::new()), FetchFailurePolicy::Abort);
    let wednesday = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
    resolver.overrides().put(wednesday, 9).await.unwrap();

    let report = WeeklyReplay::new(&resolver).run(tuesday()).await;

    assert_eq!(report.days.len(), 5);
    assert_eq!(report.calculated, 5);
    assert_eq!(report.errors, 0);
    assert_eq!(report.days[0].date, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
    match &report.days[2].status {
        DayStatus::Calculated { count, .. } => assert_eq!(*count, 9),
        other => panic!("unexpected status: {:?}", other),
    }
    gmail_mock.assert_hits(0);
}

#[tokio::test]
async fn test_resolver_wired_from_config_file() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();

    no_holidays(&server);
    calendar(&server, "business", json!([]));
    calendar(
        &server,
        "team",
        json!([{"summary": "장지훈, 김태준 - 워크샵 준비", "start": {"date": "2025-03-04"}}]),
    );

    let overrides_path = dir.path().join("data").join("meal_counts.json");
    let toml_content = format!(
        r#"
[roster]
people = ["장지훈", "김태준", "서대원"]

[calendar]
calendar_ids = ["team"]
business_calendar_id = "business"
api_base = "{base}"

[holiday]
endpoint = "{holiday}"
service_key = "holiday-key"

[email]
api_base = "{base}"
sender = "bot@example.com"
to = ["orders@example.com"]

[credentials]
type = "static"
access_token = "test-token"

[overrides]
path = "{overrides}"
"#,
        base = server.base_url(),
        holiday = server.url("/holiday"),
        overrides = overrides_path.display(),
    );

    let config = AppConfig::from_toml_str(&toml_content).unwrap();
    assert!(config.validate().is_ok());

    let client = http_client(config.calendar.timeout_seconds).unwrap();
    let (storage, file_name) = config.override_storage();
    let resolver = HeadcountResolver::new(
        config.roster(),
        GoogleCalendarSource::new(client.clone(), &config.calendar.api_base, config.credential_provider(client).unwrap()),
        PublicHolidayApi::new(
            http_client(config.holiday.timeout_seconds).unwrap(),
            &config.holiday.endpoint,
            &config.holiday.service_key,
        ),
        JsonOverrideStore::new(storage, file_name),
        config.resolver_options().unwrap(),
    );

    let result = resolver.resolve(tuesday()).await.unwrap().unwrap();
    assert_eq!(result.count, 1);
    assert_eq!(result.included_people, vec!["서대원"]);

    resolver.overrides().put(tuesday(), 2).await.unwrap();
    assert!(overrides_path.exists());
}
