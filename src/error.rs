//! Error types for injector configuration, resources and generation

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InjectorError {
    /// Missing or inconsistent registration, invalid parameters, lifecycle misuse
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Resource error at {}: {reason}", path.display())]
    Resource { path: PathBuf, reason: String },

    /// A single sampling attempt failed; the injector resamples the event
    #[error("Injection failure: {0}")]
    InjectionFailure(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Unknown particle type: {0}")]
    UnknownParticle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl InjectorError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn resource(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Resource {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn injection_failure(msg: impl Into<String>) -> Self {
        Self::InjectionFailure(msg.into())
    }

    /// True when the failure only invalidates the current sampling attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InjectionFailure(_))
    }
}

pub type InjectorResult<T> = Result<T, InjectorError>;
