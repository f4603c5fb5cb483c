//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_user_table;
mod m20250101_000002_create_follower_table;
mod m20250101_000003_create_device_token_table;
mod m20250101_000004_create_poll_table;
mod m20250101_000005_create_poll_comment_table;
mod m20250101_000006_create_vote_table;
mod m20250101_000007_create_notification_table;

/// Migrator for running database migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_user_table::Migration),
            Box::new(m20250101_000002_create_follower_table::Migration),
            Box::new(m20250101_000003_create_device_token_table::Migration),
            Box::new(m20250101_000004_create_poll_table::Migration),
            Box::new(m20250101_000005_create_poll_comment_table::Migration),
            Box::new(m20250101_000006_create_vote_table::Migration),
            Box::new(m20250101_000007_create_notification_table::Migration),
        ]
    }
}
