//! Create follower table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Follower::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Follower::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Follower::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Follower::FollowerId).string_len(32).not_null())
                    .col(ColumnDef::new(Follower::FollowerName).string_len(256).not_null())
                    .col(ColumnDef::new(Follower::FollowerPicture).string_len(1024))
                    .col(
                        ColumnDef::new(Follower::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follower_user")
                            .from(Follower::Table, Follower::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follower_follower")
                            .from(Follower::Table, Follower::FollowerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (user_id, follower_id) - target of ON CONFLICT in follow
        manager
            .create_index(
                Index::create()
                    .name("idx_follower_user_follower")
                    .table(Follower::Table)
                    .col(Follower::UserId)
                    .col(Follower::FollowerId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: follower_id (for listing following)
        manager
            .create_index(
                Index::create()
                    .name("idx_follower_follower_id")
                    .table(Follower::Table)
                    .col(Follower::FollowerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Follower::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Follower {
    Table,
    Id,
    UserId,
    FollowerId,
    FollowerName,
    FollowerPicture,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
