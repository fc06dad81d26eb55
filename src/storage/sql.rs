use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use migration::MigratorTrait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Database, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set,
    TransactionTrait,
};

use super::{ConfigRepository, RepositoryError, RepositoryResult, INITIAL_VERSION};
use crate::entities::config_document::{ActiveModel, Column, Entity, Model};
use crate::restapi::types::{ConfigDocument, ResourceType, Version, VersionedDocument};

/// Repository backed by the `config_documents` table.
#[derive(Debug, Clone)]
pub struct SqlRepository {
    db: DatabaseConnection,
}

impl SqlRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Connect and bring the schema up to date.
    pub async fn connect(url: &str) -> RepositoryResult<Self> {
        let db = Database::connect(url).await?;
        migration::Migrator::up(&db, None).await?;
        Ok(Self::new(db))
    }

    fn encode(resource: ResourceType, document: &ConfigDocument) -> RepositoryResult<String> {
        serde_json::to_string(document).map_err(|source| RepositoryError::Corrupt { resource, source })
    }

    fn decode(resource: ResourceType, model: Model) -> RepositoryResult<VersionedDocument> {
        let document: ConfigDocument = serde_json::from_str(&model.body)
            .map_err(|source| RepositoryError::Corrupt { resource, source })?;
        Ok(VersionedDocument {
            version: model.version.max(0) as Version,
            document,
        })
    }
}

#[async_trait]
impl ConfigRepository for SqlRepository {
    async fn load(&self, resource: ResourceType) -> RepositoryResult<VersionedDocument> {
        let model = Entity::find_by_id(resource.as_str().to_string())
            .one(&self.db)
            .await?
            .ok_or(RepositoryError::NotInitialized)?;
        Self::decode(resource, model)
    }

    async fn commit(
        &self,
        resource: ResourceType,
        expected: Version,
        document: ConfigDocument,
    ) -> RepositoryResult<Version> {
        let body = Self::encode(resource, &document)?;
        let next = expected + 1;

        let result = Entity::update_many()
            .col_expr(Column::Version, Expr::value(next as i64))
            .col_expr(Column::Body, Expr::value(body))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().timestamp()))
            .filter(Column::ResourceType.eq(resource.as_str()))
            .filter(Column::Version.eq(expected as i64))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            // Either the row is missing or someone else committed first
            let current = self.load(resource).await?;
            return Err(RepositoryError::Conflict {
                resource,
                expected,
                actual: current.version,
            });
        }

        Ok(next)
    }

    async fn initialize(
        &self,
        mut documents: BTreeMap<ResourceType, ConfigDocument>,
    ) -> RepositoryResult<bool> {
        let txn = self.db.begin().await?;

        if Entity::find().count(&txn).await? > 0 {
            return Ok(false);
        }

        let now = Utc::now().timestamp();
        let mut rows = Vec::with_capacity(ResourceType::ALL.len());
        for resource in ResourceType::ALL {
            let document = documents.remove(&resource).unwrap_or_default();
            rows.push(ActiveModel {
                resource_type: Set(resource.as_str().to_string()),
                version: Set(INITIAL_VERSION as i64),
                body: Set(Self::encode(resource, &document)?),
                updated_at: Set(now),
            });
        }
        Entity::insert_many(rows).exec(&txn).await?;

        txn.commit().await?;
        Ok(true)
    }

    async fn is_initialized(&self) -> RepositoryResult<bool> {
        Ok(Entity::find().count(&self.db).await? > 0)
    }

    fn backend_name(&self) -> &'static str {
        "sql"
    }
}
