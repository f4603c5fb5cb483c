//! Poll service: publishing, voting and commenting.

use chrono::Utc;
use pollen_common::{AppError, AppResult, IdGenerator};
use pollen_db::{
    entities::{
        poll::{self, Answer, UserIds},
        poll_comment,
    },
    repositories::{PollRepository, UserRepository},
};
use sea_orm::{Set, prelude::DateTimeWithTimeZone};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::{
    events::{DomainEvent, EventSender},
    user::UserSummary,
};

/// Upper bound for any page size.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    poll_repo: PollRepository,
    user_repo: UserRepository,
    events: EventSender,
    id_gen: IdGenerator,
}

/// Input for publishing a poll.
#[derive(Debug, Deserialize, Validate)]
pub struct PublishPollInput {
    #[validate(length(min = 1, max = 500))]
    pub question: String,

    #[validate(length(min = 1, max = 200))]
    pub answer1_text: String,

    #[validate(url, length(max = 1024))]
    pub answer1_picture: Option<String>,

    #[validate(length(min = 1, max = 200))]
    pub answer2_text: String,

    #[validate(url, length(max = 1024))]
    pub answer2_picture: Option<String>,
}

/// Input for commenting on a poll.
#[derive(Debug, Deserialize, Validate)]
pub struct CommentInput {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
}

/// One answer without its voter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerSummary {
    pub text: String,
    pub picture: Option<String>,
    pub num_votes: i32,
}

/// Trimmed poll: no voter sets, no subscribers, no comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    pub id: String,
    pub creator: UserSummary,
    pub question: String,
    pub answer1: AnswerSummary,
    pub answer2: AnswerSummary,
    pub num_comments: i32,
    pub created_at: DateTimeWithTimeZone,
}

impl From<&poll::Model> for PollSummary {
    fn from(poll: &poll::Model) -> Self {
        Self {
            id: poll.id.clone(),
            creator: UserSummary {
                id: poll.creator_id.clone(),
                name: poll.creator_name.clone(),
                picture_url: poll.creator_picture.clone(),
            },
            question: poll.question.clone(),
            answer1: AnswerSummary {
                text: poll.answer1_text.clone(),
                picture: poll.answer1_picture.clone(),
                num_votes: poll.answer1_num_votes,
            },
            answer2: AnswerSummary {
                text: poll.answer2_text.clone(),
                picture: poll.answer2_picture.clone(),
                num_votes: poll.answer2_num_votes,
            },
            num_comments: poll.num_comments,
            created_at: poll.created_at,
        }
    }
}

/// A poll in either shape.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PollView {
    Full(poll::Model),
    Trimmed(PollSummary),
}

impl PollView {
    fn new(poll: poll::Model, trimmed: bool) -> Self {
        if trimmed {
            Self::Trimmed(PollSummary::from(&poll))
        } else {
            Self::Full(poll)
        }
    }
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub const fn new(
        poll_repo: PollRepository,
        user_repo: UserRepository,
        events: EventSender,
    ) -> Self {
        Self {
            poll_repo,
            user_repo,
            events,
            id_gen: IdGenerator::new(),
        }
    }

    /// Publish a new poll. The creator is its first subscriber.
    pub async fn publish(&self, creator_id: &str, input: PublishPollInput) -> AppResult<poll::Model> {
        input.validate()?;

        let creator = self.user_repo.get_by_id(creator_id).await?;

        let model = poll::ActiveModel {
            id: Set(self.id_gen.generate()),
            creator_id: Set(creator.id.clone()),
            creator_name: Set(creator.name.clone()),
            creator_picture: Set(creator.picture_url.clone()),
            question: Set(input.question),
            answer1_text: Set(input.answer1_text),
            answer1_picture: Set(input.answer1_picture),
            answer1_num_votes: Set(0),
            answer1_voters: Set(UserIds::default()),
            answer2_text: Set(input.answer2_text),
            answer2_picture: Set(input.answer2_picture),
            answer2_num_votes: Set(0),
            answer2_voters: Set(UserIds::default()),
            subscribers: Set(UserIds::single(creator.id.clone())),
            num_comments: Set(0),
            created_at: Set(Utc::now().into()),
        };

        let poll = self.poll_repo.create(model).await?;
        tracing::info!(poll_id = %poll.id, creator_id = %creator.id, "Poll published");

        self.events.publish(DomainEvent::PollPublished {
            creator_id: creator.id,
            poll: poll.clone(),
        });

        Ok(poll)
    }

    /// Vote on a poll.
    ///
    /// Returns `None` when the poll does not exist or the user already voted
    /// on it; nothing is published in that case.
    pub async fn vote_answer(
        &self,
        poll_id: &str,
        voter_id: &str,
        answer_number: i16,
    ) -> AppResult<Option<poll::Model>> {
        let answer = Answer::from_number(answer_number).ok_or_else(|| {
            AppError::Validation(format!("answer must be 1 or 2, got {answer_number}"))
        })?;

        let Some(poll) = self.poll_repo.vote_answer(poll_id, voter_id, answer).await? else {
            tracing::debug!(poll_id = %poll_id, voter_id = %voter_id, "Vote not applied");
            return Ok(None);
        };

        self.events.publish(DomainEvent::PollVoted {
            voter_id: voter_id.to_string(),
            answer: answer.number(),
            poll: poll.clone(),
        });

        Ok(Some(poll))
    }

    /// Comment on a poll, subscribing the author to further comments.
    ///
    /// Returns the updated poll, or `None` when it does not exist.
    pub async fn comment(
        &self,
        poll_id: &str,
        author_id: &str,
        input: CommentInput,
    ) -> AppResult<Option<poll::Model>> {
        input.validate()?;

        let author = self.user_repo.get_by_id(author_id).await?;

        let comment = poll_comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            poll_id: Set(poll_id.to_string()),
            author_id: Set(author.id.clone()),
            author_name: Set(author.name.clone()),
            author_picture: Set(author.picture_url.clone()),
            text: Set(input.text),
            created_at: Set(Utc::now().into()),
        };

        let Some((poll, comment)) = self.poll_repo.comment(poll_id, comment).await? else {
            return Ok(None);
        };

        self.events.publish(DomainEvent::PollCommented {
            author_id: author.id,
            poll: poll.clone(),
            comment,
        });

        Ok(Some(poll))
    }

    /// Get a poll by ID, trimmed or with its voter and subscriber sets.
    pub async fn get_by_id(&self, poll_id: &str, trimmed: bool) -> AppResult<Option<PollView>> {
        let poll = self.poll_repo.find_by_id(poll_id).await?;
        Ok(poll.map(|p| PollView::new(p, trimmed)))
    }

    /// A creator's polls, newest first.
    pub async fn get_by_user_id(
        &self,
        user_id: &str,
        before_poll_id: Option<&str>,
        limit: u64,
        trimmed: bool,
    ) -> AppResult<Vec<PollView>> {
        let polls = self
            .poll_repo
            .find_by_creator(user_id, before_poll_id, limit.min(MAX_PAGE_SIZE))
            .await?;

        Ok(polls
            .into_iter()
            .map(|p| PollView::new(p, trimmed))
            .collect())
    }

    /// Comments on a poll in posting order. Empty for unknown polls.
    pub async fn get_comments(
        &self,
        poll_id: &str,
        skip: u64,
        limit: u64,
    ) -> AppResult<Vec<poll_comment::Model>> {
        self.poll_repo
            .find_comments(poll_id, skip, limit.min(MAX_PAGE_SIZE))
            .await
    }

    /// Up to 20 recent polls the user has not voted on, trimmed.
    pub async fn get_recent_unvoted(
        &self,
        user_id: &str,
        before_poll_id: Option<&str>,
        exclude_ids: &[String],
    ) -> AppResult<Vec<PollSummary>> {
        let polls = self
            .poll_repo
            .find_recent_unvoted(user_id, before_poll_id, exclude_ids)
            .await?;

        Ok(polls
            .iter()
            .filter(|p| !p.has_voted(user_id))
            .map(PollSummary::from)
            .collect())
    }
}
