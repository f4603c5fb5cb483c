//! Create poll table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Poll::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Poll::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Poll::CreatorId).string_len(32).not_null())
                    .col(ColumnDef::new(Poll::CreatorName).string_len(256).not_null())
                    .col(ColumnDef::new(Poll::CreatorPicture).string_len(1024))
                    .col(ColumnDef::new(Poll::Question).text().not_null())
                    .col(ColumnDef::new(Poll::Answer1Text).string_len(512).not_null())
                    .col(ColumnDef::new(Poll::Answer1Picture).string_len(1024))
                    .col(
                        ColumnDef::new(Poll::Answer1NumVotes)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Poll::Answer1Voters)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(ColumnDef::new(Poll::Answer2Text).string_len(512).not_null())
                    .col(ColumnDef::new(Poll::Answer2Picture).string_len(1024))
                    .col(
                        ColumnDef::new(Poll::Answer2NumVotes)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Poll::Answer2Voters)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Poll::Subscribers)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Poll::NumComments)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Poll::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_creator")
                            .from(Poll::Table, Poll::CreatorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (creator_id, id) for a user's polls, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_creator_id")
                    .table(Poll::Table)
                    .col(Poll::CreatorId)
                    .col(Poll::Id)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Poll::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
    CreatorId,
    CreatorName,
    CreatorPicture,
    Question,
    #[iden = "answer1_text"]
    Answer1Text,
    #[iden = "answer1_picture"]
    Answer1Picture,
    #[iden = "answer1_num_votes"]
    Answer1NumVotes,
    #[iden = "answer1_voters"]
    Answer1Voters,
    #[iden = "answer2_text"]
    Answer2Text,
    #[iden = "answer2_picture"]
    Answer2Picture,
    #[iden = "answer2_num_votes"]
    Answer2NumVotes,
    #[iden = "answer2_voters"]
    Answer2Voters,
    Subscribers,
    NumComments,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
