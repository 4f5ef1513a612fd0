use anyhow::Result;
use std::io;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, time::ChronoUtc, MakeWriter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Filter directives for a verbosity level.
///
/// 0 = info, 1 = debug (with hyper's connection chatter suppressed),
/// 2+ = trace (everything).
fn directives(verbose_level: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose_level {
        0 => "info",
        1 => "debug,hyper::proto::h1=warn,hyper::client::pool=warn",
        _ => "trace",
    }
}

fn build_filter(verbose_level: u8, quiet: bool) -> EnvFilter {
    // In quiet mode RUST_LOG is ignored so that only errors are shown
    if quiet {
        return EnvFilter::new(directives(0, true));
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(verbose_level, false)))
}

fn json_output() -> bool {
    std::env::var("RUST_LOG_JSON")
        .map(|v| v == "true")
        .unwrap_or_else(|_| !io::stdout().is_terminal())
}

fn install<W>(filter: EnvFilter, json: bool, ansi: bool, writer: W) -> Result<()>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let registry = Registry::default().with(filter);

    if json {
        let json_layer = fmt::layer()
            .json()
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(writer);
        registry.with(json_layer).try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(ansi)
            .with_writer(writer);
        registry.with(fmt_layer).try_init()?;
    }

    Ok(())
}

/// Install the global subscriber, writing to `log_file` when given and to stderr otherwise
pub fn init_logging_with_file(verbose_level: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let filter = build_filter(verbose_level, quiet);
    let json = json_output();

    let Some(log_path) = log_file else {
        return install(filter, json, true, io::stderr);
    };

    let log_dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&log_dir)?;

    let log_filename = log_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid log filename: {}", log_path.display()))?;

    // Rotated files are named sync-movies.2026-01-17 for sync-movies.log
    let log_prefix = log_filename.rsplitn(2, '.').nth(1).unwrap_or(log_filename);

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, log_prefix);
    install(filter, json, false, file_appender)
}
