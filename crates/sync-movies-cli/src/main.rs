use clap::{ArgAction, Parser, Subcommand};
use commands::{config, logout, sync};
use exit::ExitStatus;
use movie_sync_config::PathManager;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod exit;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "sync-movies")]
#[command(about = "Sync watch history from MUBI to trakt.tv")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    /// Write logs to a daily rotated file instead of stderr (defaults to the config directory's logs/)
    #[arg(long, global = true, value_name = "PATH", num_args = 0..=1, default_missing_value = "")]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy MUBI view log entries missing on trakt.tv
    #[command(long_about = "Fetch the MUBI view log and add every entry trakt.tv does not have yet to the trakt.tv watch history. Entries trakt.tv cannot identify by title and year are looked up by title and submitted again. Safe to re-run.")]
    Sync(sync::SyncArgs),

    /// Show or locate configuration
    #[command(long_about = "Manage the configuration file. Running without a subcommand starts the interactive configuration wizard.")]
    Config {
        #[command(subcommand)]
        cmd: Option<ConfigCommands>,
    },

    /// Forget the stored trakt.tv token
    Logout,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (masks sensitive data)
    Show {
        /// Show secrets unmasked
        #[arg(long, action = ArgAction::SetTrue)]
        full: bool,
    },

    /// Print the configuration file path
    Path,

    /// Interactive configuration wizard
    Init,
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = color_eyre::install() {
        eprintln!("Failed to install error reporter: {}", e);
    }

    let cli = Cli::parse();

    let log_file = cli.log_file.as_deref().map(|path| {
        if path.is_empty() {
            PathManager::default().log_file()
        } else {
            PathBuf::from(path)
        }
    });
    if let Err(e) = logging::init_logging_with_file(cli.verbose, cli.quiet, log_file) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitStatus::IoError.into();
    }

    let output = output::Output::new(cli.output, cli.quiet);

    let result = match cli.command {
        Commands::Sync(args) => sync::run_sync(args, &output).await,
        Commands::Config { cmd } => {
            let cmd = cmd.unwrap_or(ConfigCommands::Init);
            config::run_config(cmd, &output).await
        }
        Commands::Logout => logout::run_logout(&output).await,
    };

    match result {
        Ok(status) => status.into(),
        Err(report) => {
            let status = ExitStatus::of_error(&report);
            tracing::debug!(exit_code = status.code(), "Exiting after error");
            output.error(format!("{:?}", report));
            status.into()
        }
    }
}
