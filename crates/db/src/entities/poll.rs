//! Poll entity (two-answer polls).

use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A set of user ids stored as a JSONB array.
///
/// Membership is only ever changed by conditional `UPDATE`s in the poll
/// repository, which keep the array free of duplicates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct UserIds(pub Vec<String>);

impl UserIds {
    /// A set holding a single id.
    #[must_use]
    pub fn single(id: impl Into<String>) -> Self {
        Self(vec![id.into()])
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|v| v == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

/// One of the two answers of a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Answer {
    First,
    Second,
}

impl Answer {
    /// Parse a 1-based answer number.
    #[must_use]
    pub const fn from_number(number: i16) -> Option<Self> {
        match number {
            1 => Some(Self::First),
            2 => Some(Self::Second),
            _ => None,
        }
    }

    #[must_use]
    pub const fn number(self) -> i16 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }

    #[must_use]
    pub const fn num_votes_column(self) -> Column {
        match self {
            Self::First => Column::Answer1NumVotes,
            Self::Second => Column::Answer2NumVotes,
        }
    }

    #[must_use]
    pub const fn voters_column(self) -> Column {
        match self {
            Self::First => Column::Answer1Voters,
            Self::Second => Column::Answer2Voters,
        }
    }

    /// Raw column name, for JSONB expressions.
    #[must_use]
    pub const fn voters_column_name(self) -> &'static str {
        match self {
            Self::First => "answer1_voters",
            Self::Second => "answer2_voters",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Creator snapshot
    #[sea_orm(indexed)]
    pub creator_id: String,
    pub creator_name: String,
    #[sea_orm(nullable)]
    pub creator_picture: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub question: String,

    pub answer1_text: String,
    #[sea_orm(nullable)]
    pub answer1_picture: Option<String>,
    pub answer1_num_votes: i32,
    #[sea_orm(column_type = "JsonBinary")]
    pub answer1_voters: UserIds,

    pub answer2_text: String,
    #[sea_orm(nullable)]
    pub answer2_picture: Option<String>,
    pub answer2_num_votes: i32,
    #[sea_orm(column_type = "JsonBinary")]
    pub answer2_voters: UserIds,

    /// Users receiving comment notifications (creator plus every commenter)
    #[sea_orm(column_type = "JsonBinary")]
    pub subscribers: UserIds,

    pub num_comments: i32,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether the user appears in either voter set.
    #[must_use]
    pub fn has_voted(&self, user_id: &str) -> bool {
        self.answer1_voters.contains(user_id) || self.answer2_voters.contains(user_id)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::poll_comment::Entity")]
    Comments,

    #[sea_orm(has_many = "super::vote::Entity")]
    Votes,
}

impl Related<super::poll_comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Votes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
