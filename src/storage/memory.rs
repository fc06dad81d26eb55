//! In-memory repository. Not durable; used for tests and `database.backend = "memory"`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ConfigRepository, RepositoryError, RepositoryResult, INITIAL_VERSION};
use crate::restapi::types::{ConfigDocument, ResourceType, Version, VersionedDocument};

#[derive(Debug, Default)]
pub struct MemoryRepository {
    // None until initialized
    documents: RwLock<Option<BTreeMap<ResourceType, VersionedDocument>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigRepository for MemoryRepository {
    async fn load(&self, resource: ResourceType) -> RepositoryResult<VersionedDocument> {
        let guard = self.documents.read().await;
        let documents = guard.as_ref().ok_or(RepositoryError::NotInitialized)?;
        documents
            .get(&resource)
            .cloned()
            .ok_or(RepositoryError::NotInitialized)
    }

    async fn commit(
        &self,
        resource: ResourceType,
        expected: Version,
        document: ConfigDocument,
    ) -> RepositoryResult<Version> {
        let mut guard = self.documents.write().await;
        let documents = guard.as_mut().ok_or(RepositoryError::NotInitialized)?;
        let current = documents
            .get_mut(&resource)
            .ok_or(RepositoryError::NotInitialized)?;

        if current.version != expected {
            return Err(RepositoryError::Conflict {
                resource,
                expected,
                actual: current.version,
            });
        }

        current.version += 1;
        current.document = document;
        Ok(current.version)
    }

    async fn initialize(
        &self,
        mut documents: BTreeMap<ResourceType, ConfigDocument>,
    ) -> RepositoryResult<bool> {
        let mut guard = self.documents.write().await;
        if guard.is_some() {
            return Ok(false);
        }

        let initialized = ResourceType::ALL
            .iter()
            .map(|resource| {
                let document = documents.remove(resource).unwrap_or_default();
                (
                    *resource,
                    VersionedDocument {
                        version: INITIAL_VERSION,
                        document,
                    },
                )
            })
            .collect();
        *guard = Some(initialized);
        Ok(true)
    }

    async fn is_initialized(&self) -> RepositoryResult<bool> {
        Ok(self.documents.read().await.is_some())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
