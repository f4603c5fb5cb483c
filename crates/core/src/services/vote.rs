//! Vote service: the per-user vote ledger.

use std::collections::HashMap;

use chrono::Utc;
use pollen_common::{AppError, AppResult, IdGenerator};
use pollen_db::{
    entities::vote,
    repositories::{PollRepository, UserRepository, VoteRepository},
};
use sea_orm::{Set, prelude::DateTimeWithTimeZone};
use serde::Serialize;

use crate::services::{
    poll::{MAX_PAGE_SIZE, PollService, PollSummary},
    user::UserSummary,
};

/// Vote service for business logic.
#[derive(Clone)]
pub struct VoteService {
    vote_repo: VoteRepository,
    poll_repo: PollRepository,
    user_repo: UserRepository,
    poll_service: PollService,
    id_gen: IdGenerator,
}

/// A ledger entry with its poll resolved.
#[derive(Debug, Clone, Serialize)]
pub struct VoteView {
    pub id: String,
    pub answer: i16,
    pub created_at: DateTimeWithTimeZone,
    pub poll: PollSummary,
}

impl VoteService {
    /// Create a new vote service.
    #[must_use]
    pub const fn new(
        vote_repo: VoteRepository,
        poll_repo: PollRepository,
        user_repo: UserRepository,
        poll_service: PollService,
    ) -> Self {
        Self {
            vote_repo,
            poll_repo,
            user_repo,
            poll_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// Vote on a poll and record the vote in the ledger.
    ///
    /// The ledger row is written only after the poll itself accepted the
    /// vote, so a missing poll or a repeated vote leaves no entry behind.
    pub async fn create_new(
        &self,
        voter_id: &str,
        poll_id: &str,
        answer: i16,
    ) -> AppResult<Option<vote::Model>> {
        let Some(_poll) = self
            .poll_service
            .vote_answer(poll_id, voter_id, answer)
            .await?
        else {
            return Ok(None);
        };

        let model = vote::ActiveModel {
            id: Set(self.id_gen.generate()),
            voter_id: Set(voter_id.to_string()),
            poll_id: Set(poll_id.to_string()),
            answer: Set(answer),
            created_at: Set(Utc::now().into()),
        };

        match self.vote_repo.create(model).await {
            Ok(vote) => Ok(Some(vote)),
            Err(AppError::Conflict(_)) => {
                // The poll already counted this voter; the ledger row exists.
                tracing::warn!(poll_id = %poll_id, voter_id = %voter_id, "Duplicate ledger entry");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Users who chose an answer, newest vote first.
    pub async fn get_voters_for(
        &self,
        poll_id: &str,
        answer: i16,
        skip: u64,
        limit: u64,
    ) -> AppResult<Vec<UserSummary>> {
        let votes = self
            .vote_repo
            .find_by_poll_answer(poll_id, answer, skip, limit.min(MAX_PAGE_SIZE))
            .await?;

        let ids: Vec<String> = votes.iter().map(|v| v.voter_id.clone()).collect();
        let users: HashMap<String, UserSummary> = self
            .user_repo
            .find_by_ids(&ids)
            .await?
            .iter()
            .map(|u| (u.id.clone(), UserSummary::from(u)))
            .collect();

        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    /// A user's vote history, newest first.
    pub async fn get_by_user_id(
        &self,
        user_id: &str,
        before_vote_id: Option<&str>,
        limit: u64,
    ) -> AppResult<Vec<VoteView>> {
        let votes = self
            .vote_repo
            .find_by_voter(user_id, before_vote_id, limit.min(MAX_PAGE_SIZE))
            .await?;
        self.resolve(votes).await
    }

    /// A user's votes on the given polls.
    pub async fn get_by_user_id_and_poll_ids(
        &self,
        user_id: &str,
        poll_ids: &[String],
    ) -> AppResult<Vec<VoteView>> {
        let votes = self
            .vote_repo
            .find_by_voter_and_polls(user_id, poll_ids)
            .await?;
        self.resolve(votes).await
    }

    async fn resolve(&self, votes: Vec<vote::Model>) -> AppResult<Vec<VoteView>> {
        let poll_ids: Vec<String> = votes.iter().map(|v| v.poll_id.clone()).collect();
        let polls: HashMap<String, PollSummary> = self
            .poll_repo
            .find_by_ids(&poll_ids)
            .await?
            .iter()
            .map(|p| (p.id.clone(), PollSummary::from(p)))
            .collect();

        Ok(votes
            .into_iter()
            .filter_map(|v| {
                polls.get(&v.poll_id).map(|poll| VoteView {
                    id: v.id,
                    answer: v.answer,
                    created_at: v.created_at,
                    poll: poll.clone(),
                })
            })
            .collect())
    }
}
