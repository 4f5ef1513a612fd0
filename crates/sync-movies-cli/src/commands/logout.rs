use crate::exit::{CliError, ExitStatus};
use crate::output::{Output, OutputFormat};
use color_eyre::Result;
use movie_sync_config::{CredentialStore, PathManager};
use serde_json::json;
use std::path::PathBuf;

pub async fn run_logout(output: &Output) -> Result<ExitStatus> {
    let credentials_file = PathManager::default().credentials_file();
    let removed = clear_trakt_token(credentials_file)?;

    match output.format() {
        OutputFormat::Human if removed => output.success("Removed the stored trakt.tv token"),
        OutputFormat::Human => output.info("No trakt.tv token was stored"),
        OutputFormat::Json | OutputFormat::JsonPretty => output.json(&json!({
            "type": "logout",
            "removed": removed,
        })),
    }

    Ok(ExitStatus::Ok)
}

/// Drop the stored trakt token, returning whether there was one
fn clear_trakt_token(credentials_file: PathBuf) -> Result<bool, CliError> {
    let mut store = CredentialStore::new(credentials_file.clone());
    store
        .load()
        .map_err(|e| CliError::file(&credentials_file, e))?;

    if store.get_trakt_token().is_none() {
        return Ok(false);
    }

    store.clear_trakt_token();
    store
        .save()
        .map_err(|e| CliError::file(&credentials_file, e))?;
    tracing::info!(path = %credentials_file.display(), "Cleared stored trakt token");
    Ok(true)
}
