use chrono::Utc;
use clap::Parser;
use meal_count_bot::config::app_config::{http_client, AppConfig};
use meal_count_bot::config::cli::{Cli, Command, OverrideCommand};
use meal_count_bot::core::scheduler::Scheduler;
use meal_count_bot::core::weekly::WeeklyReplay;
use meal_count_bot::domain::ports::{CredentialProvider, OverrideStore};
use meal_count_bot::utils::error::{ErrorSeverity, MealError, Result};
use meal_count_bot::utils::logger::{self, LogFormat};
use meal_count_bot::utils::validation::Validate;
use meal_count_bot::{
    GmailNotifier, GoogleCalendarSource, HeadcountResolver, JobOutcome, JsonOverrideStore,
    LocalStorage, MealCountJob, PublicHolidayApi,
};
use std::sync::Arc;

type Overrides = JsonOverrideStore<LocalStorage>;
type Resolver = HeadcountResolver<GoogleCalendarSource, PublicHolidayApi, Overrides>;
type Job = MealCountJob<GoogleCalendarSource, PublicHolidayApi, Overrides, GmailNotifier>;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 常駐排程輸出 JSON 日誌，其餘指令用精簡格式
    let default_format = if matches!(cli.command, Command::Schedule) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    logger::init_logger(LogFormat::from_env_or(default_format), cli.verbose);

    tracing::info!("📁 Loading configuration from: {}", cli.config.display());
    let config = match AppConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config.display(), e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = execute(cli.command, &config).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn execute(command: Command, config: &AppConfig) -> Result<()> {
    match command {
        Command::Run { date, dry_run } => {
            let job = build_job(config)?;
            let date = date.unwrap_or_else(|| job.today());

            if dry_run {
                tracing::info!("🔍 DRY RUN MODE - no email will be sent");
                match job.resolver().resolve(date).await? {
                    Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                    None => println!("⏭️ {}: 식사 인원 집계 대상이 아닙니다", date),
                }
                return Ok(());
            }

            match job.run_for(date).await {
                JobOutcome::Sent(result) => {
                    println!("✅ [{}] 연구소 식사 인원: {} 명", date, result.count);
                    Ok(())
                }
                JobOutcome::Skipped => {
                    println!("⏭️ {}: 식사 인원 집계 대상이 아닙니다", date);
                    Ok(())
                }
                JobOutcome::DeliveryFailed(_, message) => Err(MealError::DeliveryError { message }),
                JobOutcome::Failed(message) => Err(MealError::upstream("meal count", message)),
            }
        }
        Command::Schedule => {
            let job = Arc::new(build_job(config)?);
            let scheduler = Scheduler::new(job, config.schedule()?);
            scheduler.start().await;

            tokio::signal::ctrl_c().await?;
            tracing::info!("🛑 Interrupt received, shutting down");
            scheduler.stop().await;
            Ok(())
        }
        Command::Week { date, summary } => {
            let credentials = build_credentials(config)?;
            let resolver = build_resolver(config, credentials)?;
            let today = date
                .unwrap_or_else(|| Utc::now().with_timezone(&resolver.timezone()).date_naive());
            let replay = WeeklyReplay::new(&resolver);

            if summary {
                println!("{}", serde_json::to_string_pretty(&replay.summary(today).await)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&replay.run(today).await)?);
            }
            Ok(())
        }
        Command::Override { action } => {
            let (storage, file_name) = config.override_storage();
            let store = JsonOverrideStore::new(storage, file_name);
            run_override(&store, action).await
        }
    }
}

async fn run_override<O: OverrideStore>(store: &O, action: OverrideCommand) -> Result<()> {
    match action {
        OverrideCommand::Set { date, count } => {
            store.put(date, count).await?;
            println!("✅ {} 식사 인원 {}명 저장", date, count);
        }
        OverrideCommand::Get { date } => match store.get(date).await? {
            Some(count) => println!("{}: {}", date, count),
            None => {
                return Err(MealError::NotFound {
                    date: date.to_string(),
                })
            }
        },
        OverrideCommand::Update { date, count } => {
            store.update(date, count).await?;
            println!("✅ {} 식사 인원 {}명으로 수정", date, count);
        }
        OverrideCommand::Delete { date } => {
            store.delete(date).await?;
            println!("🗑️ {} 식사 인원 삭제", date);
        }
        OverrideCommand::DeleteMany { dates } => {
            let outcome = store.delete_many(&dates).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        OverrideCommand::List => {
            let all = store.list_all().await?;
            if all.is_empty() {
                println!("(저장된 식사 인원 없음)");
            }
            for (date, count) in all {
                println!("{}: {}", date, count);
            }
        }
    }
    Ok(())
}

fn build_credentials(config: &AppConfig) -> Result<Arc<dyn CredentialProvider>> {
    config.credential_provider(http_client(config.calendar.timeout_seconds)?)
}

fn build_resolver(config: &AppConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Resolver> {
    let events = GoogleCalendarSource::new(
        http_client(config.calendar.timeout_seconds)?,
        &config.calendar.api_base,
        credentials,
    );
    let holidays = PublicHolidayApi::new(
        http_client(config.holiday.timeout_seconds)?,
        &config.holiday.endpoint,
        &config.holiday.service_key,
    );
    let (storage, file_name) = config.override_storage();

    Ok(HeadcountResolver::new(
        config.roster(),
        events,
        holidays,
        JsonOverrideStore::new(storage, file_name),
        config.resolver_options()?,
    ))
}

fn build_job(config: &AppConfig) -> Result<Job> {
    let credentials = build_credentials(config)?;
    let resolver = build_resolver(config, Arc::clone(&credentials))?;
    let notifier = GmailNotifier::new(
        http_client(config.email.timeout_seconds)?,
        &config.email.api_base,
        credentials,
        config.email_settings(),
    );
    Ok(MealCountJob::new(resolver, notifier))
}
