use super::prompts;
use crate::exit::{CliError, ExitStatus};
use crate::output::{Output, OutputFormat};
use crate::ConfigCommands;
use color_eyre::Result;
use comfy_table::{Attribute, Cell, Color, Table};
use movie_sync_config::{CandidateSelection, Config, CredentialStore, PathManager};
use owo_colors::OwoColorize;
use serde_json::json;

pub async fn run_config(cmd: ConfigCommands, output: &Output) -> Result<ExitStatus> {
    match cmd {
        ConfigCommands::Show { full } => show_config(full, output),
        ConfigCommands::Path => show_path(output),
        ConfigCommands::Init => run_interactive_config(output),
    }
}

fn show_path(output: &Output) -> Result<ExitStatus> {
    let paths = PathManager::default();

    match output.format() {
        OutputFormat::Human => println!("{}", paths.config_file().display()),
        OutputFormat::Json | OutputFormat::JsonPretty => output.json(&json!({
            "config_file": paths.config_file(),
            "credentials_file": paths.credentials_file(),
            "log_file": paths.log_file(),
        })),
    }

    Ok(ExitStatus::Ok)
}

fn show_config(full: bool, output: &Output) -> Result<ExitStatus> {
    let paths = PathManager::default();
    let config_file = paths.config_file();

    if !config_file.exists() {
        output.warn(format!("Configuration file not found at: {}", config_file.display()));
        output.info("Run 'sync-movies config init' to create it. Built-in defaults are shown below.");
    }

    let config = Config::load_or_default(&config_file).map_err(|e| CliError::file(&config_file, e))?;

    let credentials_file = paths.credentials_file();
    let mut credentials = CredentialStore::new(credentials_file.clone());
    credentials
        .load()
        .map_err(|e| CliError::file(&credentials_file, e))?;
    let token_expires = credentials.get_trakt_token_expires();
    let has_token = credentials.get_trakt_token().is_some();

    let secret = |value: &Option<String>| -> String {
        match value.as_deref() {
            Some(v) if full => v.to_string(),
            Some(v) => mask_string(v),
            None => "<not set>".to_string(),
        }
    };
    let plain = |value: &Option<String>| value.clone().unwrap_or_else(|| "<not set>".to_string());

    match output.format() {
        OutputFormat::Human => {
            if output.is_quiet() {
                return Ok(ExitStatus::Ok);
            }

            println!();
            println!("{}", "Configuration".bright_cyan().bold());
            println!("{}", "─".repeat("Configuration".len()).bright_cyan());

            let mut info_table = section_table("Files");
            info_table.add_row(vec![Cell::new("Config file"), Cell::new(config_file.display())]);
            info_table.add_row(vec![Cell::new("Credentials file"), Cell::new(credentials_file.display())]);
            info_table.add_row(vec![Cell::new("Language"), Cell::new(&config.language)]);
            println!("{}", info_table);

            let mut mubi_table = section_table("MUBI");
            mubi_table.add_row(vec![Cell::new("Token"), Cell::new(secret(&config.mubi.token))]);
            mubi_table.add_row(vec![Cell::new("Country"), Cell::new(plain(&config.mubi.country))]);
            println!("{}", mubi_table);

            let mut trakt_table = section_table("trakt.tv");
            trakt_table.add_row(vec![Cell::new("Client ID"), Cell::new(secret(&config.trakt.client_id))]);
            trakt_table.add_row(vec![Cell::new("Client secret"), Cell::new(secret(&config.trakt.client_secret))]);
            let token_state = match (has_token, token_expires) {
                (false, _) => "not logged in".to_string(),
                (true, Some(expires)) => format!("stored, expires {}", expires.format("%Y-%m-%d %H:%M:%S %Z")),
                (true, None) => "stored".to_string(),
            };
            trakt_table.add_row(vec![Cell::new("Access token"), Cell::new(token_state)]);
            println!("{}", trakt_table);

            let mut sync_table = section_table("Sync");
            sync_table.add_row(vec![
                Cell::new("Lookup concurrency"),
                Cell::new(config.sync.lookup_concurrency),
            ]);
            sync_table.add_row(vec![
                Cell::new("Candidate selection"),
                Cell::new(selection_name(config.sync.candidate_selection)),
            ]);
            sync_table.add_row(vec![
                Cell::new("Rate limit retries"),
                Cell::new(config.sync.max_rate_limit_retries),
            ]);
            sync_table.add_row(vec![
                Cell::new("Rate limit wait budget"),
                Cell::new(format!("{}s", config.sync.max_rate_limit_wait_secs)),
            ]);
            println!("{}", sync_table);
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            output.json(&json!({
                "config_file": config_file,
                "credentials_file": credentials_file,
                "language": config.language,
                "mubi": {
                    "token": secret(&config.mubi.token),
                    "country": config.mubi.country,
                    "configured": config.is_mubi_configured(),
                },
                "trakt": {
                    "client_id": secret(&config.trakt.client_id),
                    "client_secret": secret(&config.trakt.client_secret),
                    "configured": config.is_trakt_configured(),
                    "logged_in": has_token,
                    "token_expires_at": token_expires.map(|t| t.to_rfc3339()),
                },
                "sync": config.sync,
            }));
        }
    }

    Ok(ExitStatus::Ok)
}

fn run_interactive_config(output: &Output) -> Result<ExitStatus> {
    let paths = PathManager::default();
    let config_file = paths.config_file();

    let mut config = Config::load_or_default(&config_file).map_err(|e| CliError::file(&config_file, e))?;

    print_section_header("Interactive Configuration Wizard", output);
    output.println(format!("Settings are saved to {}", config_file.display()));

    print_section_header("Step 1: MUBI", output);
    print_instruction_list(
        &[
            "Sign in on https://mubi.com and open your browser's developer tools",
            "Find a request to api.mubi.com and copy its Authorization bearer token",
            "Copy the value of its Client-Country header as well",
        ],
        output,
    );
    let token = prompts::prompt_secret("MUBI token", config.mubi.token.as_deref())?;
    config.mubi.token = non_empty(token);
    let country = prompts::prompt_string("MUBI country code", config.mubi.country.as_deref())?;
    config.mubi.country = non_empty(country.to_uppercase());

    print_section_header("Step 2: trakt.tv", output);
    print_instruction_list(
        &[
            "Open https://trakt.tv/oauth/applications and create a new application",
            "Use 'urn:ietf:wg:oauth:2.0:oob' as the Redirect URI",
        ],
        output,
    );
    let client_id = prompts::prompt_string("trakt.tv Client ID", config.trakt.client_id.as_deref())?;
    config.trakt.client_id = non_empty(client_id);
    let client_secret = prompts::prompt_secret("trakt.tv Client Secret", config.trakt.client_secret.as_deref())?;
    config.trakt.client_secret = non_empty(client_secret);

    print_section_header("Step 3: Preferences", output);
    config.language = prompts::prompt_string("Language for both services", Some(&config.language))?;
    if prompts::prompt_yes_no("Change advanced sync settings?", false)? {
        config.sync.lookup_concurrency =
            prompts::prompt_positive("Title lookups in flight", config.sync.lookup_concurrency as u64)? as usize;
        let lowest = prompts::prompt_yes_no(
            "Prefer the lowest scoring search result over the highest?",
            config.sync.candidate_selection == CandidateSelection::LowestScore,
        )?;
        config.sync.candidate_selection = if lowest {
            CandidateSelection::LowestScore
        } else {
            CandidateSelection::HighestScore
        };
        config.sync.max_rate_limit_retries =
            prompts::prompt_positive("Attempts per rate-limited request", config.sync.max_rate_limit_retries as u64)?
                as u32;
        config.sync.max_rate_limit_wait_secs =
            prompts::prompt_positive("Seconds to wait on rate limits per request", config.sync.max_rate_limit_wait_secs)?;
    }

    config.validate()?;
    config
        .save_to_file(&config_file)
        .map_err(|e| CliError::file(&config_file, e))?;

    output.success(format!("Configuration saved to {}", config_file.display()));
    if !config.is_mubi_configured() || !config.is_trakt_configured() {
        output.warn("Some credentials are still missing; pass them to 'sync-movies sync' as flags or run this wizard again.");
    }

    Ok(ExitStatus::Ok)
}

fn section_table(title: &str) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new(title).fg(Color::Cyan).add_attribute(Attribute::Bold),
        Cell::new(""),
    ]);
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table
}

fn selection_name(selection: CandidateSelection) -> &'static str {
    match selection {
        CandidateSelection::HighestScore => "highest_score",
        CandidateSelection::LowestScore => "lowest_score",
    }
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn mask_string(s: &str) -> String {
    if s.is_empty() || s == "YOUR_CLIENT_ID" || s == "YOUR_CLIENT_SECRET" {
        return "<not set>".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}***{}", head, tail)
}

fn print_section_header(title: &str, output: &Output) {
    output.println("");
    output.println(format!("{}", title.bold().bright_cyan()));
    output.println(format!("{}", "─".repeat(title.chars().count()).bright_cyan()));
}

fn print_instruction_list(items: &[&str], output: &Output) {
    for (idx, item) in items.iter().enumerate() {
        output.println(format!("  {}. {}", idx + 1, item));
    }
}
