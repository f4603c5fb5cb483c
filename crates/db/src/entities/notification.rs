//! Notification entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What happened.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    #[sea_orm(string_value = "follow")]
    Follow,
    #[sea_orm(string_value = "comment")]
    Comment,
    #[sea_orm(string_value = "create")]
    Create,
    #[sea_orm(string_value = "vote")]
    Vote,
}

impl Verb {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Comment => "comment",
            Self::Create => "create",
            Self::Vote => "vote",
        }
    }
}

/// What the notification is about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    #[sea_orm(string_value = "poll")]
    Poll,
    #[sea_orm(string_value = "user")]
    User,
}

impl SubjectType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Poll => "poll",
            Self::User => "user",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The user receiving the notification
    pub recipient_id: String,

    /// The user who caused it
    pub actor_id: String,

    pub verb: Verb,

    pub subject_type: SubjectType,

    pub subject_id: String,

    /// Verb-specific data (e.g. the comment text)
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub detail: Option<Json>,

    /// Rows sharing (recipient, collapse key) are merged on upsert
    #[serde(skip_serializing)]
    #[sea_orm(nullable)]
    pub collapse_key: Option<String>,

    #[sea_orm(default_value = false)]
    pub is_read: bool,

    /// Refreshed on every upsert; drives the retention window
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::RecipientId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Recipient,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ActorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Actor,
}

impl ActiveModelBehavior for ActiveModel {}
