//! Configuration error types

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    #[error("Failed to read env file {}: {message}", path.display())]
    EnvFile { path: PathBuf, message: String },
}

impl ConfigError {
    /// Names of the missing variables, if this is a `MissingVariables` error
    pub fn missing_variables(&self) -> &[String] {
        match self {
            ConfigError::MissingVariables(vars) => vars,
            _ => &[],
        }
    }
}
