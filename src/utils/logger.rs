use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Overrides the per-command log format: `json` or `compact`.
pub const LOG_FORMAT_ENV: &str = "MEAL_BOT_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    /// 排程常駐模式使用 JSON 格式，方便收集到日誌系統
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "compact" | "text" => Some(LogFormat::Compact),
            _ => None,
        }
    }

    /// `MEAL_BOT_LOG_FORMAT` when set and valid, otherwise `default`.
    pub fn from_env_or(default: LogFormat) -> Self {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(value) => Self::parse(&value).unwrap_or_else(|| {
                eprintln!("⚠️ Ignoring {}={:?}, expected json or compact", LOG_FORMAT_ENV, value);
                default
            }),
            Err(_) => default,
        }
    }
}

/// Filter used when `RUST_LOG` is not set. HTTP client internals stay quiet
/// even in verbose mode.
fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "info,meal_count_bot=debug,hyper=warn,hyper_util=warn,reqwest=info"
    } else {
        "warn,meal_count_bot=info"
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

/// Installs the global subscriber. Returns `false` when one is already set.
pub fn init_logger(format: LogFormat, verbose: bool) -> bool {
    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let result = match format {
        LogFormat::Compact => tracing_subscriber::registry()
            .with(env_filter(verbose))
            .with(layer.compact())
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter(verbose))
            .with(layer.json().flatten_event(true))
            .try_init(),
    };
    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_format() {
        assert_eq!(LogFormat::parse("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" JSON "), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("compact"), Some(LogFormat::Compact));
        assert_eq!(LogFormat::parse("text"), Some(LogFormat::Compact));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    #[test]
    fn test_default_directives_are_valid_filters() {
        for verbose in [true, false] {
            assert!(EnvFilter::try_new(default_directives(verbose)).is_ok());
        }
        assert!(default_directives(true).contains("meal_count_bot=debug"));
        assert!(default_directives(false).contains("meal_count_bot=info"));
    }

    #[test]
    fn test_second_init_does_not_panic() {
        init_logger(LogFormat::Compact, false);
        assert!(!init_logger(LogFormat::Json, true));
    }
}
