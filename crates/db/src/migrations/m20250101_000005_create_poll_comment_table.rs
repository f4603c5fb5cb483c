//! Create poll comment table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PollComment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PollComment::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PollComment::PollId).string_len(32).not_null())
                    .col(ColumnDef::new(PollComment::AuthorId).string_len(32).not_null())
                    .col(ColumnDef::new(PollComment::AuthorName).string_len(256).not_null())
                    .col(ColumnDef::new(PollComment::AuthorPicture).string_len(1024))
                    .col(ColumnDef::new(PollComment::Text).text().not_null())
                    .col(
                        ColumnDef::new(PollComment::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_comment_poll")
                            .from(PollComment::Table, PollComment::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (poll_id, id) for comment pages
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_comment_poll_id")
                    .table(PollComment::Table)
                    .col(PollComment::PollId)
                    .col(PollComment::Id)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PollComment::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PollComment {
    Table,
    Id,
    PollId,
    AuthorId,
    AuthorName,
    AuthorPicture,
    Text,
    CreatedAt,
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
}
