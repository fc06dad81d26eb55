use miette::Diagnostic;
use thiserror::Error;

use crate::restapi::errors::ApiError;
use crate::storage::RepositoryError;

/// Process-level errors: startup, configuration and bootstrap.
#[derive(Debug, Error, Diagnostic)]
pub enum WardenError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(warden::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(warden::config))]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(warden::serde))]
    Serde(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    #[diagnostic(code(warden::db))]
    Db(#[from] sea_orm::DbErr),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Invalid setting `{key}`: {message}")]
    #[diagnostic(
        code(warden::invalid_setting),
        help("Check the configuration file and WARDEN__* environment overrides")
    )]
    InvalidSetting { key: String, message: String },

    #[error("Seed entry '{name}' of '{resource}' rejected: {source}")]
    #[diagnostic(code(warden::seed))]
    Seed {
        resource: String,
        name: String,
        #[source]
        source: ApiError,
    },

    #[error("{0}")]
    #[diagnostic(code(warden::other))]
    Other(String),
}
