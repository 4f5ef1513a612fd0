use color_eyre::Report;
use movie_sync_config::ConfigError;
use movie_sync_core::SyncError;
use movie_sync_sources::SourceError;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Process exit statuses, following sysexits(3) where one fits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Ok,
    /// A request to either service failed
    FetchFailed,
    /// Some entries could not be synced
    SyncIncomplete,
    Usage,
    /// A service contradicted itself
    Internal,
    IoError,
    /// Authorization was abandoned; running again may succeed
    TempFail,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Ok => 0,
            ExitStatus::FetchFailed => 2,
            ExitStatus::SyncIncomplete => 3,
            ExitStatus::Usage => 64,
            ExitStatus::Internal => 70,
            ExitStatus::IoError => 74,
            ExitStatus::TempFail => 75,
        }
    }

    /// Classify the first error in the chain we know about
    pub fn of_error(report: &Report) -> Self {
        for cause in report.chain() {
            if let Some(err) = cause.downcast_ref::<CliError>() {
                return match err {
                    CliError::File { .. } => ExitStatus::IoError,
                    CliError::InvalidSince(_) => ExitStatus::Usage,
                };
            }
            if let Some(err) = cause.downcast_ref::<SyncError>() {
                return match err {
                    SyncError::Source(err) => Self::of_source_error(err),
                    SyncError::Consistency(_) => ExitStatus::Internal,
                };
            }
            if let Some(err) = cause.downcast_ref::<SourceError>() {
                return Self::of_source_error(err);
            }
            if cause.downcast_ref::<ConfigError>().is_some() {
                return ExitStatus::Usage;
            }
            if cause.downcast_ref::<std::io::Error>().is_some() {
                return ExitStatus::IoError;
            }
        }
        ExitStatus::Internal
    }

    fn of_source_error(err: &SourceError) -> Self {
        if err.is_usage() {
            ExitStatus::Usage
        } else if err.is_auth_abandoned() {
            ExitStatus::TempFail
        } else if matches!(err, SourceError::Store(_)) {
            ExitStatus::IoError
        } else {
            ExitStatus::FetchFailed
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// Failures that originate in the CLI itself
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to access {}: {message}", path.display())]
    File { path: PathBuf, message: String },

    #[error("Invalid --since value '{0}': expected RFC 3339 or YYYY-MM-DD")]
    InvalidSince(String),
}

impl CliError {
    pub fn file(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        CliError::File {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::WrapErr;

    #[test]
    fn test_classifies_wrapped_errors() {
        let report = Report::new(SyncError::Consistency("x".to_string()));
        assert_eq!(ExitStatus::of_error(&report), ExitStatus::Internal);

        let report = Err::<(), _>(SourceError::AuthCancelled)
            .wrap_err("Sync failed")
            .unwrap_err();
        assert_eq!(ExitStatus::of_error(&report), ExitStatus::TempFail);

        let report = Report::new(SyncError::Source(SourceError::RateLimitExhausted {
            attempts: 5,
            waited_secs: 300,
        }));
        assert_eq!(ExitStatus::of_error(&report), ExitStatus::FetchFailed);

        let report = Report::new(SourceError::Config(ConfigError::Missing("mubi-token")));
        assert_eq!(ExitStatus::of_error(&report), ExitStatus::Usage);

        let report = Report::new(CliError::InvalidSince("yesterday".to_string()));
        assert_eq!(ExitStatus::of_error(&report), ExitStatus::Usage);

        let report = Report::new(CliError::file(std::path::Path::new("/x/config.toml"), "denied"));
        assert_eq!(ExitStatus::of_error(&report), ExitStatus::IoError);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitStatus::Ok.code(), 0);
        assert_eq!(ExitStatus::SyncIncomplete.code(), 3);
        assert_eq!(ExitStatus::TempFail.code(), 75);
    }
}
