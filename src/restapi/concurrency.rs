use std::sync::Arc;

use crate::restapi::errors::ApiError;
use crate::restapi::types::{ConfigDocument, ResourceType, Version, VersionedDocument};
use crate::storage::{ConfigRepository, RepositoryError};

/// Read/commit front of the repository for the request path.
///
/// Nothing is cached; every request reads the current version and commits
/// conditionally on it. Conflicts are surfaced, never retried.
#[derive(Clone)]
pub struct DocumentController {
    repository: Arc<dyn ConfigRepository>,
}

impl DocumentController {
    pub fn new(repository: Arc<dyn ConfigRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn ConfigRepository> {
        &self.repository
    }

    pub async fn read(&self, resource: ResourceType) -> Result<VersionedDocument, ApiError> {
        self.repository
            .load(resource)
            .await
            .map_err(|e| into_api_error(resource, e))
    }

    pub async fn commit(
        &self,
        resource: ResourceType,
        expected: Version,
        document: ConfigDocument,
    ) -> Result<Version, ApiError> {
        let version = self
            .repository
            .commit(resource, expected, document)
            .await
            .map_err(|e| into_api_error(resource, e))?;
        tracing::info!(resource = %resource, version, "configuration committed");
        Ok(version)
    }
}

fn into_api_error(resource: ResourceType, err: RepositoryError) -> ApiError {
    match err {
        RepositoryError::NotInitialized => {
            tracing::error!(resource = %resource, "configuration store not initialized");
            ApiError::StoreNotInitialized
        }
        RepositoryError::Conflict {
            expected, actual, ..
        } => {
            tracing::warn!(resource = %resource, expected, actual, "concurrent modification detected");
            ApiError::VersionConflict { expected, actual }
        }
        other => {
            tracing::error!(resource = %resource, error = %other, "configuration store failure");
            ApiError::StoreUnavailable(other.to_string())
        }
    }
}
