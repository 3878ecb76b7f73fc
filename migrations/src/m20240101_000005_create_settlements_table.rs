use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_users_table::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Settlements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Settlements::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Settlements::UserId).uuid().not_null())
                    .col(ColumnDef::new(Settlements::Email).string().not_null())
                    .col(ColumnDef::new(Settlements::Total).decimal().not_null())
                    .col(ColumnDef::new(Settlements::WalletBefore).decimal().not_null())
                    .col(ColumnDef::new(Settlements::WalletAfter).decimal().not_null())
                    .col(ColumnDef::new(Settlements::ItemCount).integer().not_null())
                    .col(
                        ColumnDef::new(Settlements::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_settlements_user_id")
                            .from(Settlements::Table, Settlements::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Settlements::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Settlements {
    Table,
    Id,
    UserId,
    Email,
    Total,
    WalletBefore,
    WalletAfter,
    ItemCount,
    CreatedAt,
}
