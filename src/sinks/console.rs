// src/sinks/console.rs

//! Echo chat activity and profile changes to the log.

use chrono::{DateTime, Utc};

use crate::events::{Event, EventHub, Topic};
use crate::models::ChatMessage;

/// Logs chat lines posted after `start`, plus any deletion.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleEcho {
    start: DateTime<Utc>,
}

impl ConsoleEcho {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { start }
    }

    /// Backlog from before startup is skipped unless it was deleted since.
    pub fn should_echo(&self, message: &ChatMessage) -> bool {
        message.timestamp >= self.start || message.deleted_at.is_some()
    }

    pub fn register(&self, hub: &EventHub) {
        let echo = *self;
        hub.on(&Topic::chat_all(), move |_, event| async move {
            if let Some(message) = event.chat_message() {
                if echo.should_echo(message) {
                    log::info!(target: "chat", "{message}");
                }
            }
            Ok(())
        });

        hub.on(&Topic::new_user_snapshot(), |_, event| async move {
            if let Event::NewUserSnapshot { snapshot, .. } = &*event {
                log::info!(
                    "Updated snapshot for {} ({})",
                    snapshot.username,
                    snapshot.user_id
                );
            }
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_should_echo() {
        let start = Utc::now();
        let echo = ConsoleEcho::new(start);

        let mut message = ChatMessage::new("help", "1", start - Duration::minutes(5), "Ffff", "hi");
        assert!(!echo.should_echo(&message));

        message.deleted = true;
        message.deleted_at = Some(start + Duration::seconds(3));
        assert!(echo.should_echo(&message));

        let fresh = ChatMessage::new("help", "2", start + Duration::seconds(1), "Ffff", "hi");
        assert!(echo.should_echo(&fresh));
    }
}
