//! Dotted hierarchical topics and the listener trie they index.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::Listener;

/// A dotted topic such as `chat.global` or `bot_dm.ping`, kept pre-split.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    segments: Vec<String>,
}

impl Topic {
    /// Split a dotted string into a topic. Empty segments are dropped.
    pub fn new(topic: &str) -> Self {
        Self {
            segments: topic
                .split('.')
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    /// Extend this topic with one more segment.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn startup() -> Self {
        Self::new("startup")
    }

    /// All live chat rooms.
    pub fn chat_all() -> Self {
        Self::new("chat")
    }

    pub fn chat(room: &str) -> Self {
        Self::chat_all().child(room)
    }

    /// All flags views.
    pub fn flags_all() -> Self {
        Self::new("flags")
    }

    pub fn flags(room: &str) -> Self {
        Self::flags_all().child(room)
    }

    pub fn dm() -> Self {
        Self::new("dm")
    }

    pub fn user_snapshot() -> Self {
        Self::new("user_snapshot")
    }

    pub fn new_user_snapshot() -> Self {
        Self::new("new_user_snapshot")
    }

    pub fn bot_dm(command: &str) -> Self {
        Self::new("bot_dm").child(command)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl From<&str> for Topic {
    fn from(topic: &str) -> Self {
        Self::new(topic)
    }
}

/// One trie level: listeners registered at this exact prefix plus children.
#[derive(Default)]
pub(crate) struct TopicNode {
    listeners: Vec<Arc<dyn Listener>>,
    children: HashMap<String, TopicNode>,
}

impl TopicNode {
    pub(crate) fn insert(&mut self, pattern: &Topic, listener: Arc<dyn Listener>) {
        let node = pattern
            .segments()
            .iter()
            .fold(self, |node, segment| node.children.entry(segment.clone()).or_default());
        node.listeners.push(listener);
    }

    /// Listeners registered on `topic` or any dotted prefix of it, outermost first.
    pub(crate) fn collect(&self, topic: &Topic) -> Vec<Arc<dyn Listener>> {
        let mut found: Vec<Arc<dyn Listener>> = self.listeners.to_vec();
        let mut node = self;
        for segment in topic.segments() {
            match node.children.get(segment) {
                Some(child) => {
                    found.extend(child.listeners.iter().cloned());
                    node = child;
                }
                None => break,
            }
        }
        found
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.len()
            + self
                .children
                .values()
                .map(TopicNode::listener_count)
                .sum::<usize>()
    }
}
