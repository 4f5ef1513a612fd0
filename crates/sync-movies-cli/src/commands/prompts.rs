use color_eyre::eyre::eyre;
use color_eyre::Result;
use dialoguer::{Confirm, Input, Password};

/// Prompt for a string value, keeping `default` when the answer is empty
pub fn prompt_string(prompt: &str, default: Option<&str>) -> Result<String> {
    let mut input_builder = Input::<String>::new()
        .with_prompt(prompt)
        .allow_empty(true);

    if let Some(default_value) = default {
        input_builder = input_builder.default(default_value.to_string());
    }

    let answer = input_builder
        .interact_text()
        .map_err(|e| eyre!("Failed to read input: {}", e))?;
    Ok(answer.trim().to_string())
}

/// Prompt for a secret (masked input). An empty answer keeps `current`.
pub fn prompt_secret(prompt: &str, current: Option<&str>) -> Result<String> {
    let prompt = match current {
        Some(_) => format!("{} (leave empty to keep the current value)", prompt),
        None => prompt.to_string(),
    };

    let answer = Password::new()
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()
        .map_err(|e| eyre!("Failed to read secret: {}", e))?;

    let answer = answer.trim();
    match (answer.is_empty(), current) {
        (true, Some(current)) => Ok(current.to_string()),
        _ => Ok(answer.to_string()),
    }
}

pub fn prompt_yes_no(prompt: &str, default: bool) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
        .map_err(|e| eyre!("Failed to read confirmation: {}", e))
}

/// Prompt for a positive number, asking again until one is given
pub fn prompt_positive(prompt: &str, default: u64) -> Result<u64> {
    Input::<u64>::new()
        .with_prompt(prompt)
        .default(default)
        .validate_with(|value: &u64| -> Result<(), &str> {
            if *value == 0 {
                Err("Please enter a number greater than zero")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .map_err(|e| eyre!("Failed to read input: {}", e))
}
