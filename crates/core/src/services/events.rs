//! In-process domain event bus.
//!
//! Services publish a [`DomainEvent`] after a store mutation succeeds. The bus
//! hands each event to an [`EventHandler`] on a separate task, so publishing
//! never blocks the caller and handler failures never reach it.

use std::sync::Arc;

use async_trait::async_trait;
use pollen_db::entities::{poll, poll_comment, user};
use tokio::{
    sync::{Semaphore, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

/// Maximum number of events handled concurrently.
pub const MAX_WORKERS: usize = 4;

/// Something that happened to a poll or to the follow graph.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// A poll was published.
    PollPublished {
        creator_id: String,
        poll: poll::Model,
    },
    /// A vote was recorded. `poll` is the state right after the vote.
    PollVoted {
        voter_id: String,
        answer: i16,
        poll: poll::Model,
    },
    /// A comment was added. `poll` already lists the author as subscriber.
    PollCommented {
        author_id: String,
        poll: poll::Model,
        comment: poll_comment::Model,
    },
    /// `follower` started following `followee_id`.
    UserFollowed {
        follower: user::Model,
        followee_id: String,
    },
}

impl DomainEvent {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PollPublished { .. } => "poll_published",
            Self::PollVoted { .. } => "poll_voted",
            Self::PollCommented { .. } => "poll_commented",
            Self::UserFollowed { .. } => "user_followed",
        }
    }
}

/// Consumer of domain events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one event. Errors are the handler's to log.
    async fn handle(&self, event: DomainEvent);
}

/// Cloneable handle used by services to publish events.
#[derive(Clone)]
pub struct EventSender {
    sender: mpsc::UnboundedSender<DomainEvent>,
}

impl EventSender {
    /// Enqueue an event. Never blocks; a closed bus is logged and ignored.
    pub fn publish(&self, event: DomainEvent) {
        let name = event.name();
        if self.sender.send(event).is_err() {
            warn!(event = name, "Event bus closed, dropping event");
        } else {
            debug!(event = name, "Event published");
        }
    }
}

/// Event bus owning the channel.
pub struct EventBus {
    sender: mpsc::UnboundedSender<DomainEvent>,
    receiver: mpsc::UnboundedReceiver<DomainEvent>,
}

impl EventBus {
    /// Create a new event bus.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver }
    }

    /// Get a sender for publishing events.
    #[must_use]
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    /// Start consuming events with the given handler.
    ///
    /// The consumer stops once every [`EventSender`] has been dropped and the
    /// channel is drained.
    pub fn start(self, handler: Arc<dyn EventHandler>) -> JoinHandle<()> {
        let Self { sender, receiver } = self;
        // Only clones handed out by `sender()` keep the bus alive.
        drop(sender);

        tokio::spawn(async move {
            info!("Event bus starting with {} workers", MAX_WORKERS);
            run_consumer(receiver, handler).await;
            info!("Event bus stopped");
        })
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_consumer(
    mut receiver: mpsc::UnboundedReceiver<DomainEvent>,
    handler: Arc<dyn EventHandler>,
) {
    let semaphore = Arc::new(Semaphore::new(MAX_WORKERS));

    while let Some(event) = receiver.recv().await {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let handler = handler.clone();

        tokio::spawn(async move {
            let _permit = permit;
            handler.handle(event).await;
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Keeps every event it is handed.
    #[derive(Default)]
    pub struct RecordingHandler {
        pub events: Mutex<Vec<DomainEvent>>,
    }

    impl RecordingHandler {
        pub fn names(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().iter().map(DomainEvent::name).collect()
        }
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(&self, event: DomainEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    /// Yields until the handler has seen `count` events.
    pub async fn wait_for(handler: &RecordingHandler, count: usize) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while handler.events.lock().unwrap().len() < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    /// Waits for the consumer to stop, then lets spawned handlers run.
    ///
    /// Every sender must already be dropped.
    pub async fn drain(consumer: JoinHandle<()>) {
        tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }
}
