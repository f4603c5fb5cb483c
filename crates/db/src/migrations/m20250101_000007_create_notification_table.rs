//! Create notification table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Notification::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notification::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Notification::RecipientId).string_len(32).not_null())
                    .col(ColumnDef::new(Notification::ActorId).string_len(32).not_null())
                    .col(ColumnDef::new(Notification::Verb).string_len(16).not_null())
                    .col(ColumnDef::new(Notification::SubjectType).string_len(16).not_null())
                    .col(ColumnDef::new(Notification::SubjectId).string_len(32).not_null())
                    .col(ColumnDef::new(Notification::Detail).json_binary())
                    .col(ColumnDef::new(Notification::CollapseKey).string_len(128))
                    .col(
                        ColumnDef::new(Notification::IsRead)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Notification::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_recipient")
                            .from(Notification::Table, Notification::RecipientId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_actor")
                            .from(Notification::Table, Notification::ActorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (recipient_id, collapse_key). NULL keys never collide.
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_recipient_collapse_key")
                    .table(Notification::Table)
                    .col(Notification::RecipientId)
                    .col(Notification::CollapseKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: (recipient_id, id) for listing
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_recipient_id")
                    .table(Notification::Table)
                    .col(Notification::RecipientId)
                    .col(Notification::Id)
                    .to_owned(),
            )
            .await?;

        // Index: updated_at for pruning
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_updated_at")
                    .table(Notification::Table)
                    .col(Notification::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notification::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Notification {
    Table,
    Id,
    RecipientId,
    ActorId,
    Verb,
    SubjectType,
    SubjectId,
    Detail,
    CollapseKey,
    IsRead,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
