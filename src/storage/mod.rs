//! Versioned configuration repository.
//!
//! The repository owns one document per resource type. Writers commit against
//! the version they read; a commit whose expected version no longer matches
//! is rejected, so of two writers that read the same version exactly one wins.

use std::collections::BTreeMap;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::restapi::types::{ConfigDocument, ResourceType, Version, VersionedDocument};

pub mod memory;
pub mod sql;

pub use memory::MemoryRepository;
pub use sql::SqlRepository;

/// Version assigned to every document when the repository is initialized.
pub const INITIAL_VERSION: Version = 1;

#[derive(Debug, Error, Diagnostic)]
pub enum RepositoryError {
    #[error("configuration store is not initialized")]
    #[diagnostic(
        code(warden::storage::not_initialized),
        help("Set `bootstrap.seed_file` to initialize the store at startup")
    )]
    NotInitialized,

    #[error("version conflict on '{resource}': expected {expected}, found {actual}")]
    #[diagnostic(code(warden::storage::conflict))]
    Conflict {
        resource: ResourceType,
        expected: Version,
        actual: Version,
    },

    #[error("stored document for '{resource}' is corrupt: {source}")]
    #[diagnostic(code(warden::storage::corrupt))]
    Corrupt {
        resource: ResourceType,
        #[source]
        source: serde_json::Error,
    },

    #[error("database error: {0}")]
    #[diagnostic(code(warden::storage::database))]
    Db(#[from] sea_orm::DbErr),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Current document and version for a resource type.
    async fn load(&self, resource: ResourceType) -> RepositoryResult<VersionedDocument>;

    /// Replace the document if it is still at `expected`, returning the new version.
    async fn commit(
        &self,
        resource: ResourceType,
        expected: Version,
        document: ConfigDocument,
    ) -> RepositoryResult<Version>;

    /// Create every document at [`INITIAL_VERSION`]. Returns `false` and leaves
    /// the store untouched if it was already initialized.
    async fn initialize(
        &self,
        documents: BTreeMap<ResourceType, ConfigDocument>,
    ) -> RepositoryResult<bool>;

    async fn is_initialized(&self) -> RepositoryResult<bool>;

    fn backend_name(&self) -> &'static str;
}
