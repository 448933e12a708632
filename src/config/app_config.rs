use crate::adapters::credentials::{
    RefreshTokenProvider, ServiceAccountKey, ServiceAccountProvider, StaticTokenProvider, DEFAULT_SCOPES,
};
use crate::adapters::gmail::{EmailSettings, DEFAULT_GMAIL_API, DEFAULT_SUBJECT_TEMPLATE};
use crate::adapters::google_calendar::DEFAULT_CALENDAR_API;
use crate::adapters::holiday_api::DEFAULT_HOLIDAY_ENDPOINT;
use crate::adapters::storage::LocalStorage;
use crate::core::name_parser::NameListParser;
use crate::core::resolver::{FetchFailurePolicy, ResolverOptions};
use crate::core::scheduler::WeekdaySchedule;
use crate::domain::model::Roster;
use crate::domain::ports::CredentialProvider;
use crate::utils::error::{MealError, Result};
use crate::utils::validation::{self, Validate};
use chrono_tz::Tz;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

pub const DEFAULT_TIMEZONE: &str = "Asia/Seoul";
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_OVERRIDES_PATH: &str = "data/meal_counts.json";
const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub roster: RosterConfig,
    pub calendar: CalendarConfig,
    pub holiday: HolidayConfig,
    pub email: EmailConfig,
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub overrides: OverridesConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub parser: ParserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    /// 平日預設用餐的人
    pub people: Vec<String>,
    /// 只有月會日才一起用餐的人
    #[serde(default)]
    pub standing_exclusions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub calendar_ids: Vec<String>,
    pub business_calendar_id: String,
    #[serde(default = "default_calendar_api")]
    pub api_base: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub on_fetch_error: FetchFailurePolicy,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayConfig {
    #[serde(default = "default_holiday_endpoint")]
    pub endpoint: String,
    pub service_key: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_gmail_api")]
    pub api_base: String,
    pub sender: String,
    pub to: Vec<String>,
    #[serde(default = "default_subject_template")]
    pub subject_template: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialsConfig {
    Static {
        access_token: String,
    },
    RefreshToken {
        #[serde(default = "default_token_endpoint")]
        token_endpoint: String,
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
    /// Google service-account key file, impersonating `subject` when set.
    ServiceAccount {
        key_file: String,
        #[serde(default)]
        subject: Option<String>,
        #[serde(default = "default_scopes")]
        scopes: Vec<String>,
        /// Defaults to the key's `token_uri`.
        #[serde(default)]
        token_endpoint: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverridesConfig {
    #[serde(default = "default_overrides_path")]
    pub path: String,
}

impl Default for OverridesConfig {
    fn default() -> Self {
        Self {
            path: default_overrides_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_hour")]
    pub hour: u32,
    #[serde(default = "default_minute")]
    pub minute: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            hour: default_hour(),
            minute: default_minute(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParserConfig {
    /// 解析「홍길동 외 2명」這類附加人數
    #[serde(default)]
    pub extra_headcount: bool,
}

fn default_calendar_api() -> String {
    DEFAULT_CALENDAR_API.to_string()
}

fn default_holiday_endpoint() -> String {
    DEFAULT_HOLIDAY_ENDPOINT.to_string()
}

fn default_gmail_api() -> String {
    DEFAULT_GMAIL_API.to_string()
}

fn default_subject_template() -> String {
    DEFAULT_SUBJECT_TEMPLATE.to_string()
}

fn default_token_endpoint() -> String {
    DEFAULT_TOKEN_ENDPOINT.to_string()
}

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|scope| scope.to_string()).collect()
}

fn default_overrides_path() -> String {
    DEFAULT_OVERRIDES_PATH.to_string()
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_hour() -> u32 {
    9
}

fn default_minute() -> u32 {
    10
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);

        toml::from_str(&processed).map_err(|e| MealError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${HOLIDAY_SERVICE_KEY})，找不到的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn timezone(&self) -> Result<Tz> {
        validation::validate_timezone("calendar.timezone", &self.calendar.timezone)
    }

    pub fn roster(&self) -> Roster {
        Roster::new(&self.roster.people, &self.roster.standing_exclusions)
    }

    pub fn resolver_options(&self) -> Result<ResolverOptions> {
        Ok(ResolverOptions {
            calendar_ids: self.calendar.calendar_ids.clone(),
            business_calendar_id: self.calendar.business_calendar_id.clone(),
            timezone: self.timezone()?,
            fetch_failure: self.calendar.on_fetch_error,
            parser: NameListParser::new(self.parser.extra_headcount),
        })
    }

    pub fn schedule(&self) -> Result<WeekdaySchedule> {
        Ok(WeekdaySchedule::new(
            self.schedule.hour,
            self.schedule.minute,
            self.timezone()?,
        ))
    }

    pub fn email_settings(&self) -> EmailSettings {
        EmailSettings {
            sender: self.email.sender.clone(),
            to: self.email.to.clone(),
            subject_template: self.email.subject_template.clone(),
        }
    }

    /// Splits `overrides.path` into a storage root and the file name inside it.
    pub fn override_storage(&self) -> (LocalStorage, String) {
        let path = Path::new(&self.overrides.path);
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.overrides.path.clone());
        let root = path.parent().unwrap_or_else(|| Path::new(""));
        (LocalStorage::new(root), file_name)
    }

    /// Builds the token source; a service account reads its key file here.
    pub fn credential_provider(&self, client: Client) -> Result<Arc<dyn CredentialProvider>> {
        let provider: Arc<dyn CredentialProvider> = match &self.credentials {
            CredentialsConfig::Static { access_token } => {
                Arc::new(StaticTokenProvider::new(access_token.clone()))
            }
            CredentialsConfig::RefreshToken {
                token_endpoint,
                client_id,
                client_secret,
                refresh_token,
            } => Arc::new(RefreshTokenProvider::new(
                client,
                token_endpoint.clone(),
                client_id.clone(),
                client_secret.clone(),
                refresh_token.clone(),
            )),
            CredentialsConfig::ServiceAccount {
                key_file,
                subject,
                scopes,
                token_endpoint,
            } => {
                let key = ServiceAccountKey::from_file(key_file)?;
                let endpoint = token_endpoint
                    .clone()
                    .or_else(|| key.token_uri.clone())
                    .unwrap_or_else(default_token_endpoint);
                tracing::info!("🔑 Using service account {} for Google APIs", key.client_email);
                Arc::new(ServiceAccountProvider::new(
                    client,
                    key,
                    subject.clone(),
                    scopes.clone(),
                    endpoint,
                )?)
            }
        };
        Ok(provider)
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        // 名單
        validation::validate_non_empty_list("roster.people", &self.roster.people)?;
        for name in &self.roster.standing_exclusions {
            validation::validate_non_empty_string("roster.standing_exclusions", name)?;
            if self.roster.people.contains(name) {
                tracing::warn!(
                    "⚠️ '{}' is in both roster.people and roster.standing_exclusions, keeping it in people",
                    name
                );
            }
        }

        // 行事曆
        validation::validate_non_empty_list("calendar.calendar_ids", &self.calendar.calendar_ids)?;
        for calendar_id in &self.calendar.calendar_ids {
            validate_secret("calendar.calendar_ids", calendar_id)?;
        }
        validation::validate_unique("calendar.calendar_ids", &self.calendar.calendar_ids)?;
        validate_secret("calendar.business_calendar_id", &self.calendar.business_calendar_id)?;
        validation::validate_url("calendar.api_base", &self.calendar.api_base)?;
        self.timezone()?;
        validation::validate_range("calendar.timeout_seconds", self.calendar.timeout_seconds, 1, 300)?;

        // 公休日 API
        validation::validate_url("holiday.endpoint", &self.holiday.endpoint)?;
        validate_secret("holiday.service_key", &self.holiday.service_key)?;
        validation::validate_range("holiday.timeout_seconds", self.holiday.timeout_seconds, 1, 300)?;

        // 郵件
        validation::validate_url("email.api_base", &self.email.api_base)?;
        validation::validate_email_address("email.sender", &self.email.sender)?;
        validation::validate_non_empty_list("email.to", &self.email.to)?;
        for address in &self.email.to {
            validation::validate_email_address("email.to", address)?;
        }
        validation::validate_non_empty_string("email.subject_template", &self.email.subject_template)?;
        validation::validate_range("email.timeout_seconds", self.email.timeout_seconds, 1, 300)?;

        // 憑證
        match &self.credentials {
            CredentialsConfig::Static { access_token } => {
                validate_secret("credentials.access_token", access_token)?;
            }
            CredentialsConfig::RefreshToken {
                token_endpoint,
                client_id,
                client_secret,
                refresh_token,
            } => {
                validation::validate_url("credentials.token_endpoint", token_endpoint)?;
                validate_secret("credentials.client_id", client_id)?;
                validate_secret("credentials.client_secret", client_secret)?;
                validate_secret("credentials.refresh_token", refresh_token)?;
            }
            CredentialsConfig::ServiceAccount {
                key_file,
                subject,
                scopes,
                token_endpoint,
            } => {
                validate_secret("credentials.key_file", key_file)?;
                validation::validate_path("credentials.key_file", key_file)?;
                if let Some(subject) = subject {
                    validate_secret("credentials.subject", subject)?;
                    validation::validate_email_address("credentials.subject", subject)?;
                }
                validation::validate_non_empty_list("credentials.scopes", scopes)?;
                if let Some(endpoint) = token_endpoint {
                    validation::validate_url("credentials.token_endpoint", endpoint)?;
                }
            }
        }

        validation::validate_path("overrides.path", &self.overrides.path)?;
        validation::validate_range("schedule.hour", self.schedule.hour, 0, 23)?;
        validation::validate_range("schedule.minute", self.schedule.minute, 0, 59)?;

        Ok(())
    }
}

/// A secret left as `${VAR}` means the environment variable was never set.
fn validate_secret(field_name: &str, value: &str) -> Result<()> {
    validation::validate_non_empty_string(field_name, value)?;
    if ENV_VAR.is_match(value) {
        return Err(MealError::MissingConfigError {
            field: format!("{} ({})", field_name, value),
        });
    }
    Ok(())
}

/// Client shared by the adapters of one upstream service.
pub fn http_client(timeout_seconds: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()?)
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[roster]
people = ["장지훈", "김태준", "서대원"]
standing_exclusions = ["김인경", "윤현석"]

[calendar]
calendar_ids = ["team@group.calendar.google.com", "leave@group.calendar.google.com"]
business_calendar_id = "business@group.calendar.google.com"

[holiday]
service_key = "holiday-key"

[email]
sender = "bot@example.com"
to = ["orders@example.com"]

[credentials]
type = "static"
access_token = "token-1"
"#;

    #[test]
    fn test_parse_basic_config_with_defaults() {
        let config = AppConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.roster.people.len(), 3);
        assert_eq!(config.calendar.api_base, DEFAULT_CALENDAR_API);
        assert_eq!(config.calendar.timezone, DEFAULT_TIMEZONE);
        assert_eq!(config.calendar.on_fetch_error, FetchFailurePolicy::Abort);
        assert_eq!(config.calendar.timeout_seconds, 10);
        assert_eq!(config.holiday.endpoint, DEFAULT_HOLIDAY_ENDPOINT);
        assert_eq!(config.email.subject_template, DEFAULT_SUBJECT_TEMPLATE);
        assert_eq!(config.overrides.path, DEFAULT_OVERRIDES_PATH);
        assert_eq!((config.schedule.hour, config.schedule.minute), (9, 10));
        assert!(!config.parser.extra_headcount);
        assert!(config.validate().is_ok());

        let options = config.resolver_options().unwrap();
        assert_eq!(options.timezone, chrono_tz::Asia::Seoul);
        assert_eq!(options.calendar_ids.len(), 2);
    }

    #[test]
    fn test_refresh_token_credentials_and_skip_policy() {
        let toml_content = BASIC
            .replace(
                "type = \"static\"\naccess_token = \"token-1\"",
                "type = \"refresh_token\"\nclient_id = \"cid\"\nclient_secret = \"secret\"\nrefresh_token = \"rt\"",
            )
            .replace(
                "[holiday]",
                "on_fetch_error = \"skip\"\n\n[holiday]",
            );

        let config = AppConfig::from_toml_str(&toml_content).unwrap();
        assert_eq!(config.calendar.on_fetch_error, FetchFailurePolicy::Skip);
        match &config.credentials {
            CredentialsConfig::RefreshToken { token_endpoint, .. } => {
                assert_eq!(token_endpoint, DEFAULT_TOKEN_ENDPOINT)
            }
            other => panic!("unexpected credentials: {:?}", other),
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("MEAL_TEST_HOLIDAY_KEY", "from-env");

        let toml_content = BASIC.replace("holiday-key", "${MEAL_TEST_HOLIDAY_KEY}");
        let config = AppConfig::from_toml_str(&toml_content).unwrap();
        assert_eq!(config.holiday.service_key, "from-env");

        std::env::remove_var("MEAL_TEST_HOLIDAY_KEY");
    }

    #[test]
    fn test_unset_env_var_fails_validation() {
        let toml_content = BASIC.replace("holiday-key", "${MEAL_TEST_NEVER_SET_KEY}");
        let config = AppConfig::from_toml_str(&toml_content).unwrap();

        assert!(matches!(
            config.validate(),
            Err(MealError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_config_validation_failures() {
        let bad_timezone = BASIC.replace(
            "business_calendar_id = \"business@group.calendar.google.com\"",
            "business_calendar_id = \"business@group.calendar.google.com\"\ntimezone = \"Mars/Olympus\"",
        );
        assert!(AppConfig::from_toml_str(&bad_timezone)
            .unwrap()
            .validate()
            .is_err());

        let no_people = BASIC.replace(
            "people = [\"장지훈\", \"김태준\", \"서대원\"]",
            "people = []",
        );
        assert!(AppConfig::from_toml_str(&no_people)
            .unwrap()
            .validate()
            .is_err());

        let bad_sender = BASIC.replace("bot@example.com", "not-an-address");
        assert!(AppConfig::from_toml_str(&bad_sender)
            .unwrap()
            .validate()
            .is_err());
    }

    #[test]
    fn test_unknown_fetch_policy_is_parse_error() {
        let toml_content = BASIC.replace("[holiday]", "on_fetch_error = \"retry\"\n\n[holiday]");
        assert!(matches!(
            AppConfig::from_toml_str(&toml_content),
            Err(MealError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_override_storage_split() {
        let config = AppConfig::from_toml_str(BASIC).unwrap();
        let (_, file_name) = config.override_storage();
        assert_eq!(file_name, "meal_counts.json");
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.roster.standing_exclusions, vec!["김인경", "윤현석"]);
        assert_eq!(config.roster().baseline().len(), 3);
    }

    #[test]
    fn test_unset_calendar_id_env_var_fails_validation() {
        let unset_team = BASIC.replace(
            "\"team@group.calendar.google.com\"",
            "\"${MEAL_TEST_NEVER_SET_TEAM_CAL}\"",
        );
        let err = AppConfig::from_toml_str(&unset_team)
            .unwrap()
            .validate()
            .unwrap_err();
        assert!(matches!(err, MealError::MissingConfigError { ref field } if field.contains("calendar.calendar_ids")));

        let unset_business = BASIC.replace(
            "business@group.calendar.google.com",
            "${MEAL_TEST_NEVER_SET_BUSINESS_CAL}",
        );
        let err = AppConfig::from_toml_str(&unset_business)
            .unwrap()
            .validate()
            .unwrap_err();
        assert!(matches!(err, MealError::MissingConfigError { ref field } if field.contains("calendar.business_calendar_id")));
    }

    fn service_account_config(key_file: &str, extra: &str) -> AppConfig {
        let toml_content = BASIC.replace(
            "type = \"static\"\naccess_token = \"token-1\"",
            &format!("type = \"service_account\"\nkey_file = '{}'\n{}", key_file, extra),
        );
        AppConfig::from_toml_str(&toml_content).unwrap()
    }

    #[test]
    fn test_service_account_credentials() {
        let key_file = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/service_account_key.json");
        let config = service_account_config(key_file, "subject = \"jhjang@example.com\"");

        match &config.credentials {
            CredentialsConfig::ServiceAccount {
                subject,
                scopes,
                token_endpoint,
                ..
            } => {
                assert_eq!(subject.as_deref(), Some("jhjang@example.com"));
                assert_eq!(scopes.len(), 2);
                assert!(token_endpoint.is_none());
            }
            other => panic!("unexpected credentials: {:?}", other),
        }
        assert!(config.validate().is_ok());
        assert!(config.credential_provider(Client::new()).is_ok());

        let bad_subject = service_account_config(key_file, "subject = \"nobody\"");
        assert!(bad_subject.validate().is_err());
    }

    #[test]
    fn test_missing_service_account_key_file_is_credential_error() {
        let config = service_account_config("/nonexistent/meal-bot-key.json", "");
        assert!(config.validate().is_ok());
        assert!(matches!(
            config.credential_provider(Client::new()),
            Err(MealError::CredentialError { .. })
        ));
    }
}
