//! Error types for the Carefree tag compiler.

use thiserror::Error;

pub use carefree_ast::{Location, ParseError};

/// All errors that can occur while compiling or rendering a template.
#[derive(Error, Debug)]
pub enum CarefreeError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] ParseError),

    #[error(
        "Grammar error in tag '{tag}' at line {}, column {}: {message}",
        location.line,
        location.column
    )]
    Grammar {
        tag: String,
        message: String,
        location: Location,
    },

    #[error("Provider '{provider}' failed for tag '{tag}': {source}")]
    Provider {
        tag: String,
        provider: String,
        source: ProviderError,
    },

    #[error("Type error: {message}")]
    Type { message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for CarefreeError {
    fn from(err: toml::de::Error) -> Self {
        CarefreeError::Config(err.to_string())
    }
}

impl CarefreeError {
    pub fn grammar(tag: impl Into<String>, message: impl Into<String>, location: Location) -> Self {
        CarefreeError::Grammar {
            tag: tag.into(),
            message: message.into(),
            location,
        }
    }

    pub fn is_grammar(&self) -> bool {
        matches!(self, CarefreeError::Grammar { .. } | CarefreeError::Syntax(_))
    }
}

/// Failure raised by a data provider, or by looking one up.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("no {kind} provider registered under '{name}'")]
    NotRegistered { kind: &'static str, name: String },

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type alias for Carefree operations
pub type Result<T> = std::result::Result<T, CarefreeError>;
