use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One row per resource type; the body holds the whole document as JSON
        manager
            .create_table(
                Table::create()
                    .table(ConfigDocuments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConfigDocuments::ResourceType)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ConfigDocuments::Version)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .col(text(ConfigDocuments::Body))
                    .col(big_integer(ConfigDocuments::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConfigDocuments::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum ConfigDocuments {
    Table,
    ResourceType,
    Version,
    Body,
    UpdatedAt,
}
