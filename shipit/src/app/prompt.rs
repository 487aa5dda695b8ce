//! Interactive terminal prompts

use dialoguer::{Input, Password};
use secrecy::SecretString;

use crate::app::config::{Field, Prompter, ACCESS_TOKEN_ENV};
use crate::errors::DeployError;

/// Prompter reading answers from the operator's terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for TerminalPrompter {
    fn text(&self, field: Field, default: &str) -> Result<Option<String>, DeployError> {
        let answer: String = Input::new()
            .with_prompt(field.label())
            .default(default.to_string())
            .allow_empty(true)
            .interact_text()
            .map_err(|e| DeployError::ConfigError(e.to_string()))?;
        Ok(Some(answer))
    }

    fn secret(&self, field: Field) -> Result<Option<SecretString>, DeployError> {
        let prompt = format!("{} (leave empty to use ${})", field.label(), ACCESS_TOKEN_ENV);
        let answer = Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .map_err(|e| DeployError::ConfigError(e.to_string()))?;
        Ok(Some(SecretString::from(answer)))
    }
}
