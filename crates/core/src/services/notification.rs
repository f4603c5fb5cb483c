//! Notification service: writing, reading and expiring notifications.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use pollen_common::{AppResult, IdGenerator};
use pollen_db::{
    entities::notification::{self, SubjectType, Verb},
    repositories::{NotificationRepository, PollRepository, UserRepository},
};
use sea_orm::{Set, prelude::DateTimeWithTimeZone};
use serde::Serialize;

use crate::services::{
    poll::{MAX_PAGE_SIZE, PollSummary},
    push::PushMessage,
    user::UserSummary,
};

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    user_repo: UserRepository,
    poll_repo: PollRepository,
    id_gen: IdGenerator,
}

/// A notification to write.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: String,
    pub actor_id: String,
    pub verb: Verb,
    pub subject_type: SubjectType,
    pub subject_id: String,
    pub detail: Option<serde_json::Value>,
}

impl NewNotification {
    /// Rows with the same key for the same recipient are merged.
    ///
    /// Follows collapse per actor and votes per poll; comments and new polls
    /// are kept one row per event.
    #[must_use]
    pub fn collapse_key(&self) -> Option<String> {
        match self.verb {
            Verb::Follow => Some(format!("follow:{}", self.actor_id)),
            Verb::Vote => Some(format!("vote:{}", self.subject_id)),
            Verb::Comment | Verb::Create => None,
        }
    }
}

/// A notification with its actor and poll resolved.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    pub id: String,
    pub verb: Verb,
    pub subject_type: SubjectType,
    pub subject_id: String,
    pub actor: Option<UserSummary>,
    pub poll: Option<PollSummary>,
    pub detail: Option<serde_json::Value>,
    pub is_read: bool,
    pub updated_at: DateTimeWithTimeZone,
}

impl NotificationView {
    /// Text shown on the device for this notification.
    #[must_use]
    pub fn push_message(&self) -> PushMessage {
        let actor = self.actor.as_ref().map_or("Someone", |a| a.name.as_str());
        let question = self.poll.as_ref().map(|p| p.question.clone()).unwrap_or_default();
        let detail_text = self
            .detail
            .as_ref()
            .and_then(|d| d.get("text"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);

        let (title, body) = match self.verb {
            Verb::Follow => (
                "New follower".to_string(),
                format!("{actor} started following you"),
            ),
            Verb::Create => (format!("{actor} asked"), question),
            Verb::Vote => (format!("{actor} voted on your poll"), question),
            Verb::Comment => (
                format!("{actor} commented"),
                detail_text.unwrap_or(question),
            ),
        };

        PushMessage {
            title,
            body,
            verb: self.verb,
            object_type: self.subject_type,
            object_id: self.subject_id.clone(),
        }
    }
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(
        notification_repo: NotificationRepository,
        user_repo: UserRepository,
        poll_repo: PollRepository,
    ) -> Self {
        Self {
            notification_repo,
            user_repo,
            poll_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Write a notification, merging it into an existing row when its
    /// collapse key matches.
    pub async fn notify(&self, input: NewNotification) -> AppResult<notification::Model> {
        let model = notification::ActiveModel {
            id: Set(self.id_gen.generate()),
            collapse_key: Set(input.collapse_key()),
            recipient_id: Set(input.recipient_id),
            actor_id: Set(input.actor_id),
            verb: Set(input.verb),
            subject_type: Set(input.subject_type),
            subject_id: Set(input.subject_id),
            detail: Set(input.detail),
            is_read: Set(false),
            updated_at: Set(Utc::now().into()),
        };

        self.notification_repo.upsert(model).await
    }

    /// Resolve actor and poll for one notification.
    pub async fn resolve(&self, model: notification::Model) -> AppResult<NotificationView> {
        let actor = self
            .user_repo
            .find_by_id(&model.actor_id)
            .await?
            .as_ref()
            .map(UserSummary::from);
        let poll = match model.subject_type {
            SubjectType::Poll => self
                .poll_repo
                .find_by_id(&model.subject_id)
                .await?
                .as_ref()
                .map(PollSummary::from),
            SubjectType::User => None,
        };

        Ok(into_view(model, actor, poll))
    }

    /// A user's notifications, newest first.
    pub async fn get_notifications(
        &self,
        user_id: &str,
        until_id: Option<&str>,
        limit: u64,
    ) -> AppResult<Vec<NotificationView>> {
        let rows = self
            .notification_repo
            .find_by_recipient(user_id, until_id, limit.min(MAX_PAGE_SIZE))
            .await?;

        let actor_ids: Vec<String> = rows.iter().map(|n| n.actor_id.clone()).collect();
        let poll_ids: Vec<String> = rows
            .iter()
            .filter(|n| n.subject_type == SubjectType::Poll)
            .map(|n| n.subject_id.clone())
            .collect();

        let actors: HashMap<String, UserSummary> = self
            .user_repo
            .find_by_ids(&actor_ids)
            .await?
            .iter()
            .map(|u| (u.id.clone(), UserSummary::from(u)))
            .collect();
        let polls: HashMap<String, PollSummary> = self
            .poll_repo
            .find_by_ids(&poll_ids)
            .await?
            .iter()
            .map(|p| (p.id.clone(), PollSummary::from(p)))
            .collect();

        Ok(rows
            .into_iter()
            .map(|n| {
                let actor = actors.get(&n.actor_id).cloned();
                let poll = match n.subject_type {
                    SubjectType::Poll => polls.get(&n.subject_id).cloned(),
                    SubjectType::User => None,
                };
                into_view(n, actor, poll)
            })
            .collect())
    }

    /// Mark some notifications as read.
    pub async fn mark_as_read(&self, user_id: &str, ids: &[String]) -> AppResult<u64> {
        self.notification_repo.mark_as_read(user_id, ids).await
    }

    /// Mark all notifications as read.
    pub async fn mark_all_as_read(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.mark_all_as_read(user_id).await
    }

    /// Count unread notifications.
    pub async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.count_unread(user_id).await
    }

    /// Delete notifications not refreshed within `retention`.
    pub async fn prune_expired(&self, retention: Duration) -> AppResult<u64> {
        let cutoff = Utc::now() - retention;
        let deleted = self
            .notification_repo
            .delete_updated_before(cutoff.into())
            .await?;

        if deleted > 0 {
            tracing::info!(deleted, "Pruned expired notifications");
        }
        Ok(deleted)
    }
}

fn into_view(
    model: notification::Model,
    actor: Option<UserSummary>,
    poll: Option<PollSummary>,
) -> NotificationView {
    NotificationView {
        id: model.id,
        verb: model.verb,
        subject_type: model.subject_type,
        subject_id: model.subject_id,
        actor,
        poll,
        detail: model.detail,
        is_read: model.is_read,
        updated_at: model.updated_at,
    }
}
