use super::progress::{is_interactive, Progress};
use crate::exit::{CliError, ExitStatus};
use crate::output::{Output, OutputFormat};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{ArgAction, Args};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use comfy_table::{Attribute, Cell, Color, Table};
use movie_sync_config::{Config, FileTokenStore, PathManager};
use movie_sync_core::report::format_watched_at;
use movie_sync_core::{format_unmatched, unmatched_rows, SyncOrchestrator, SyncSettings};
use movie_sync_models::SyncOutcome;
use movie_sync_sources::{
    Destination, DevicePrompt, HistorySource, HttpTransport, MubiClient, ReqwestTransport, RetryPolicy, SourceError,
    TraktClient,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// Only sync entries watched at or after this time (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub since: Option<String>,

    /// Work out what is missing on trakt.tv without submitting anything
    #[arg(long, action = ArgAction::SetTrue)]
    pub dry_run: bool,

    /// MUBI bearer token (overrides config.toml)
    #[arg(long, value_name = "TOKEN")]
    pub mubi_token: Option<String>,

    /// MUBI Client-Country header value (overrides config.toml)
    #[arg(long, value_name = "CODE")]
    pub mubi_country: Option<String>,

    /// trakt.tv API application client id (overrides config.toml)
    #[arg(long, value_name = "ID")]
    pub trakt_client_id: Option<String>,

    /// trakt.tv API application client secret (overrides config.toml)
    #[arg(long, value_name = "SECRET")]
    pub trakt_client_secret: Option<String>,

    /// Language sent to both services (overrides config.toml)
    #[arg(short = 'l', long, value_name = "LANG")]
    pub language: Option<String>,
}

impl SyncArgs {
    /// Layer the command line over `config`
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(token) = &self.mubi_token {
            config.mubi.token = Some(token.clone());
        }
        if let Some(country) = &self.mubi_country {
            config.mubi.country = Some(country.clone());
        }
        if let Some(client_id) = &self.trakt_client_id {
            config.trakt.client_id = Some(client_id.clone());
        }
        if let Some(client_secret) = &self.trakt_client_secret {
            config.trakt.client_secret = Some(client_secret.clone());
        }
        if let Some(language) = &self.language {
            config.language = language.clone();
        }
    }
}

/// Parse `--since`: a full RFC 3339 timestamp or a date taken as midnight UTC
pub fn parse_since(value: &str) -> Result<DateTime<Utc>, CliError> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| Utc.from_utc_datetime(&midnight))
        .ok_or_else(|| CliError::InvalidSince(value.to_string()))
}

/// Prints the device code through [`Output`], out of the spinner's way
struct TerminalPrompt {
    output: Output,
    progress: Progress,
}

impl DevicePrompt for TerminalPrompt {
    fn show_code(&self, verification_url: &str, user_code: &str, expires_in: Duration) {
        self.progress.suspend(|| {
            self.output.action_required(
                format!(
                    "Open {} and enter the code {} (valid for {} minutes)",
                    verification_url,
                    user_code,
                    expires_in.as_secs() / 60
                ),
                json!({
                    "verification_url": verification_url,
                    "user_code": user_code,
                    "expires_in": expires_in.as_secs(),
                }),
            );
        });
        self.progress.set_message("Waiting for trakt.tv authorization (Ctrl-C to cancel)");
    }

    fn authenticated(&self) {
        self.progress.suspend(|| self.output.success("Authorized on trakt.tv"));
    }
}

pub async fn run_sync(args: SyncArgs, output: &Output) -> Result<ExitStatus> {
    let paths = PathManager::default();
    let config_file = paths.config_file();

    let mut config = Config::load_or_default(&config_file).map_err(|e| CliError::file(&config_file, e))?;
    args.apply_to(&mut config);
    config.validate()?;

    let since = args.since.as_deref().map(parse_since).transpose()?;

    // Credentials are checked up front so nothing is fetched on a bad setup
    let mubi_settings = config.mubi_settings().map_err(SourceError::from)?;
    let trakt_settings = config.trakt_settings().map_err(SourceError::from)?;
    let sync_settings = SyncSettings::from_config(&config.sync).with_dry_run(args.dry_run);
    let retry = RetryPolicy {
        max_attempts: config.sync.max_rate_limit_retries,
        max_total_wait: Duration::from_secs(config.sync.max_rate_limit_wait_secs),
    };

    let credentials_file = paths.credentials_file();
    let store = FileTokenStore::open(credentials_file.clone()).map_err(|e| CliError::file(&credentials_file, e))?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Interrupt received");
            let _ = cancel_tx.send(true);
        }
    });

    let progress = Progress::new(output);
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new());
    let source: Arc<dyn HistorySource> =
        Arc::new(MubiClient::new(&mubi_settings, transport.clone()).with_retry_policy(retry));
    let prompt = TerminalPrompt {
        output: *output,
        progress: progress.clone(),
    };
    let trakt = Arc::new(
        TraktClient::new(&trakt_settings, transport, Arc::new(store), Arc::new(prompt))
            .with_retry_policy(retry)
            .with_cancellation(cancel_rx.clone()),
    );

    let work = async {
        progress.set_message("Fetching view log from MUBI");
        let view_log = source
            .fetch_since(since)
            .await
            .wrap_err_with(|| format!("Failed to fetch the view log from {}", source.source_name()))?;

        if view_log.is_empty() {
            return Ok::<_, color_eyre::Report>(SyncOutcome::default());
        }

        progress.set_message("Signing in to trakt.tv");
        trakt.authenticate().await.wrap_err("Failed to authenticate with trakt.tv")?;

        progress.set_message(format!("Syncing {} entries to trakt.tv", view_log.len()));
        let orchestrator = SyncOrchestrator::new(trakt.clone(), sync_settings);
        orchestrator
            .sync(&view_log)
            .await
            .wrap_err("Failed to sync the view log to trakt.tv")
    };

    let mut interrupted = cancel_rx;
    // The device-flow wait sees the same signal and ends with its own error, so it is polled first
    let result = tokio::select! {
        biased;
        result = work => result,
        Ok(_) = interrupted.wait_for(|cancelled| *cancelled) => {
            Err::<SyncOutcome, _>(SourceError::AuthCancelled).wrap_err("Interrupted")
        }
    };
    progress.finish();

    let outcome = result?;
    report_outcome(&outcome, args.dry_run, output);

    Ok(if outcome.is_complete() {
        ExitStatus::Ok
    } else {
        ExitStatus::SyncIncomplete
    })
}

fn report_outcome(outcome: &SyncOutcome, dry_run: bool, output: &Output) {
    match output.format() {
        OutputFormat::Human => {
            if dry_run {
                output.success(format!(
                    "Dry run: {} entries would be submitted to trakt.tv, {} already there",
                    outcome.missing, outcome.already_present
                ));
            } else if outcome.missing == 0 {
                output.success(format!(
                    "trakt.tv is up to date ({} entries already there)",
                    outcome.already_present
                ));
            } else {
                output.success(format!(
                    "Submitted {} entries to trakt.tv ({} after a title lookup), {} already there",
                    outcome.submitted, outcome.recovered, outcome.already_present
                ));
            }

            if outcome.unmatched.is_empty() {
                return;
            }

            output.error(format!(
                "Could not find {} movies on trakt.tv; add them manually:",
                outcome.unmatched.len()
            ));
            if is_interactive() {
                eprintln!("{}", unmatched_table(outcome));
            } else {
                eprint!("{}", format_unmatched(&outcome.unmatched));
            }
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            output.json(&json!({
                "type": "summary",
                "success": outcome.is_complete(),
                "dry_run": dry_run,
                "already_present": outcome.already_present,
                "missing": outcome.missing,
                "submitted": outcome.submitted,
                "recovered": outcome.recovered,
                "unmatched": unmatched_rows(&outcome.unmatched),
            }));
        }
    }
}

fn unmatched_table(outcome: &SyncOutcome) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Title").fg(Color::Cyan).add_attribute(Attribute::Bold),
        Cell::new("Year").fg(Color::Cyan).add_attribute(Attribute::Bold),
        Cell::new("Watched at").fg(Color::Cyan).add_attribute(Attribute::Bold),
        Cell::new("Links").fg(Color::Cyan).add_attribute(Attribute::Bold),
    ]);
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);

    for row in unmatched_rows(&outcome.unmatched) {
        table.add_row(vec![
            Cell::new(&row.title),
            Cell::new(row.year.map(|y| y.to_string()).unwrap_or_else(|| "?".to_string())),
            Cell::new(format_watched_at(&row.watched_at)),
            Cell::new(row.urls.join("\n")),
        ]);
    }
    table
}
