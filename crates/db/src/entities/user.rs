//! User entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Login email, always stored lowercased.
    #[sea_orm(unique)]
    pub email: String,

    /// Display name
    pub name: String,

    /// Profile picture URL
    #[sea_orm(nullable)]
    pub picture_url: Option<String>,

    /// Argon2 hash; absent for accounts created through an external identity
    #[serde(skip_serializing)]
    #[sea_orm(nullable)]
    pub password_hash: Option<String>,

    /// Bearer token
    #[serde(skip_serializing)]
    #[sea_orm(unique)]
    pub token: String,

    /// Linked identity provider (e.g. "facebook")
    #[sea_orm(nullable)]
    pub external_provider: Option<String>,

    /// Account id at the linked identity provider
    #[sea_orm(nullable)]
    pub external_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::device_token::Entity")]
    DeviceTokens,

    #[sea_orm(has_many = "super::vote::Entity")]
    Votes,
}

impl Related<super::device_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeviceTokens.def()
    }
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Votes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
