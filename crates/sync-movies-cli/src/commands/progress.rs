use crate::output::Output;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

/// Spinner shown while waiting on either service.
///
/// Falls back to structured log lines when nobody is watching the terminal
/// or when output is machine-readable.
#[derive(Clone)]
pub struct Progress {
    spinner: Option<ProgressBar>,
}

impl Progress {
    pub fn new(output: &Output) -> Self {
        if !(is_interactive() && output.is_human() && !output.is_quiet()) {
            tracing::debug!(
                operation = "ui_init",
                mode = "non_interactive",
                "Progress spinner disabled"
            );
            return Self { spinner: None };
        }

        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ");
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(100));

        Self {
            spinner: Some(spinner),
        }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        let msg = msg.into();
        match &self.spinner {
            Some(spinner) => spinner.set_message(msg),
            None => tracing::debug!(operation = "progress", message = %msg, "Progress update"),
        }
    }

    /// Run `f` with the spinner hidden so it can write to the terminal
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        match &self.spinner {
            Some(spinner) => spinner.suspend(f),
            None => f(),
        }
    }

    pub fn finish(&self) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_and_clear();
        }
    }
}

pub fn is_interactive() -> bool {
    std::io::stdout().is_terminal() && std::io::stderr().is_terminal()
}
