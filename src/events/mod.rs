//! In-process publish/subscribe hub.
//!
//! Listeners subscribe to a dotted [`Topic`] and receive every event emitted
//! on that topic or below it: a listener on `chat` sees `chat.global` and
//! `chat.help`, one on `chat.global` sees only that room.
//!
//! Emission never waits for listeners. Each matching listener runs as its
//! own tokio task, gated by a semaphore so a burst of events cannot run more
//! than `events.max_concurrent_listeners` handlers at once. A listener that
//! fails or panics is logged and dropped without affecting its siblings or
//! the emitter.

mod topic;

pub use topic::Topic;

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::models::{ChatMessage, MailMessage, UserSnapshot};
use crate::sinks::BotMessage;
use topic::TopicNode;

/// Payloads carried by the hub.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Emitted once before any periodic task starts.
    Startup,
    /// A new or changed live chat line.
    Chat(ChatMessage),
    /// A new or changed flags view row.
    Flags(ChatMessage),
    /// A mail received by the bot account.
    Dm(MailMessage),
    /// A freshly scraped profile.
    UserSnapshot(UserSnapshot),
    /// A profile whose state differs from the last one seen for that user.
    NewUserSnapshot {
        snapshot: UserSnapshot,
        previous: Option<UserSnapshot>,
    },
    /// A mail addressed to a bot command.
    BotDm(BotMessage),
}

impl Event {
    /// The chat record, for either chat view.
    pub fn chat_message(&self) -> Option<&ChatMessage> {
        match self {
            Self::Chat(msg) | Self::Flags(msg) => Some(msg),
            _ => None,
        }
    }
}

/// A subscriber. Failures are logged by the hub and go no further.
#[async_trait]
pub trait Listener: Send + Sync {
    async fn handle(&self, hub: EventHub, event: Arc<Event>) -> Result<()>;
}

/// Adapts an async closure into a [`Listener`].
struct FnListener<F>(F);

#[async_trait]
impl<F, Fut> Listener for FnListener<F>
where
    F: Fn(EventHub, Arc<Event>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, hub: EventHub, event: Arc<Event>) -> Result<()> {
        (self.0)(hub, event).await
    }
}

struct HubInner {
    root: RwLock<TopicNode>,
    permits: Arc<Semaphore>,
}

/// Shared handle to the hub. Cloning is cheap and every clone sees the same
/// subscriptions.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("listeners", &self.listener_count())
            .field("available_permits", &self.inner.permits.available_permits())
            .finish()
    }
}

impl EventHub {
    /// Create a hub running at most `max_concurrent` listeners at a time.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                root: RwLock::new(TopicNode::default()),
                permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            }),
        }
    }

    /// Register a listener on `pattern` and everything below it.
    pub fn subscribe(&self, pattern: &Topic, listener: Arc<dyn Listener>) {
        log::debug!("Subscribing listener to {pattern}");
        self.inner
            .root
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pattern, listener);
    }

    /// Register an async closure as a listener.
    pub fn on<F, Fut>(&self, pattern: &Topic, handler: F)
    where
        F: Fn(EventHub, Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.subscribe(pattern, Arc::new(FnListener(handler)));
    }

    /// Total registered listeners across all topics.
    pub fn listener_count(&self) -> usize {
        self.inner
            .root
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .listener_count()
    }

    /// Dispatch `event` to every listener on `topic` or a prefix of it.
    ///
    /// Returns whether any listener matched. Must be called from within a
    /// tokio runtime.
    pub fn emit(&self, topic: &Topic, event: Event) -> bool {
        let listeners = self
            .inner
            .root
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .collect(topic);
        if listeners.is_empty() {
            log::debug!("No listeners for {topic}");
            return false;
        }

        let event = Arc::new(event);
        for listener in listeners {
            self.dispatch(topic.clone(), listener, Arc::clone(&event));
        }
        true
    }

    fn dispatch(&self, topic: Topic, listener: Arc<dyn Listener>, event: Arc<Event>) {
        let hub = self.clone();
        let permits = Arc::clone(&self.inner.permits);
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            match AssertUnwindSafe(listener.handle(hub, event))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("Listener on {topic} failed: {e:?}"),
                Err(panic) => {
                    log::error!("Listener on {topic} panicked: {}", panic_message(&*panic))
                }
            }
        });
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
