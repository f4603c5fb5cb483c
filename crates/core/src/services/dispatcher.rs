//! Turns domain events into notifications and push messages.

use async_trait::async_trait;
use futures::{StreamExt, stream};
use pollen_db::{
    entities::notification::{SubjectType, Verb},
    repositories::FollowerRepository,
};
use serde_json::json;
use tracing::{debug, warn};

use crate::services::{
    events::{DomainEvent, EventHandler},
    notification::{NewNotification, NotificationService},
    push::PushService,
};

/// Followers loaded per page during a fan-out.
const FANOUT_PAGE_SIZE: u64 = 500;

/// Event handler writing notifications and pushing them to devices.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifications: NotificationService,
    push: PushService,
    follower_repo: FollowerRepository,
    fanout_concurrency: usize,
}

impl NotificationDispatcher {
    /// Create a new dispatcher.
    #[must_use]
    pub fn new(
        notifications: NotificationService,
        push: PushService,
        follower_repo: FollowerRepository,
        fanout_concurrency: usize,
    ) -> Self {
        Self {
            notifications,
            push,
            follower_repo,
            fanout_concurrency: fanout_concurrency.max(1),
        }
    }

    /// Write one notification and push it. Failures are logged, not returned.
    async fn deliver(&self, input: NewNotification) {
        let recipient_id = input.recipient_id.clone();
        let verb = input.verb;

        let stored = match self.notifications.notify(input).await {
            Ok(n) => n,
            Err(e) => {
                warn!(recipient_id = %recipient_id, verb = verb.as_str(), error = %e, "Failed to write notification");
                return;
            }
        };

        let view = match self.notifications.resolve(stored).await {
            Ok(v) => v,
            Err(e) => {
                warn!(recipient_id = %recipient_id, error = %e, "Failed to resolve notification");
                return;
            }
        };

        if let Err(e) = self
            .push
            .send_to_user(&recipient_id, &view.push_message())
            .await
        {
            warn!(recipient_id = %recipient_id, error = %e, "Failed to push notification");
        }
    }

    /// Notify every follower of `creator_id`, a page at a time.
    async fn fan_out_to_followers(&self, creator_id: &str, poll_id: &str) {
        let repo = self.follower_repo.clone();
        let creator = creator_id.to_string();

        // State: `None` once the last page has been read.
        let pages = stream::unfold(Some(None::<String>), move |cursor| {
            let repo = repo.clone();
            let creator = creator.clone();
            async move {
                let after = cursor?;
                match repo
                    .follower_page(&creator, after.as_deref(), FANOUT_PAGE_SIZE)
                    .await
                {
                    Ok(page) if page.is_empty() => None,
                    Ok(page) => {
                        let next = if (page.len() as u64) < FANOUT_PAGE_SIZE {
                            None
                        } else {
                            page.last().map(|f| Some(f.id.clone()))
                        };
                        Some((page, next))
                    }
                    Err(e) => {
                        warn!(creator_id = %creator, error = %e, "Failed to load followers");
                        None
                    }
                }
            }
        });

        pages
            .flat_map(|page| stream::iter(page.into_iter().map(|f| f.follower_id)))
            .for_each_concurrent(self.fanout_concurrency, |recipient_id| async move {
                self.deliver(NewNotification {
                    recipient_id,
                    actor_id: creator_id.to_string(),
                    verb: Verb::Create,
                    subject_type: SubjectType::Poll,
                    subject_id: poll_id.to_string(),
                    detail: None,
                })
                .await;
            })
            .await;
    }
}

#[async_trait]
impl EventHandler for NotificationDispatcher {
    async fn handle(&self, event: DomainEvent) {
        debug!(event = event.name(), "Dispatching event");

        match event {
            DomainEvent::PollPublished { creator_id, poll } => {
                self.fan_out_to_followers(&creator_id, &poll.id).await;
            }
            DomainEvent::PollVoted {
                voter_id,
                answer,
                poll,
            } => {
                if voter_id == poll.creator_id {
                    return;
                }
                self.deliver(NewNotification {
                    recipient_id: poll.creator_id,
                    actor_id: voter_id,
                    verb: Verb::Vote,
                    subject_type: SubjectType::Poll,
                    subject_id: poll.id,
                    detail: Some(json!({ "answer": answer })),
                })
                .await;
            }
            DomainEvent::PollCommented {
                author_id,
                poll,
                comment,
            } => {
                let detail = json!({ "comment_id": comment.id, "text": comment.text });
                let recipients = poll
                    .subscribers
                    .iter()
                    .filter(|id| **id != author_id)
                    .cloned()
                    .collect::<Vec<_>>();

                stream::iter(recipients)
                    .for_each_concurrent(self.fanout_concurrency, |recipient_id| {
                        let detail = detail.clone();
                        let author_id = author_id.clone();
                        let poll_id = poll.id.clone();
                        async move {
                            self.deliver(NewNotification {
                                recipient_id,
                                actor_id: author_id,
                                verb: Verb::Comment,
                                subject_type: SubjectType::Poll,
                                subject_id: poll_id,
                                detail: Some(detail),
                            })
                            .await;
                        }
                    })
                    .await;
            }
            DomainEvent::UserFollowed {
                follower,
                followee_id,
            } => {
                self.deliver(NewNotification {
                    recipient_id: followee_id,
                    actor_id: follower.id.clone(),
                    verb: Verb::Follow,
                    subject_type: SubjectType::User,
                    subject_id: follower.id,
                    detail: None,
                })
                .await;
            }
        }
    }
}
