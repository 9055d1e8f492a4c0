//! Events that trigger a pipeline run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::PropertyValue;

/// Closed set of event kinds a pipeline can be driven by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Free-text chat message.
    Message,
    /// Explicit command invocation.
    Command,
    /// Inbound webhook delivery.
    Webhook,
    /// Timer-driven trigger.
    Scheduled,
}

/// Immutable description of the trigger for one pipeline run.
///
/// Fields are private so plugins can read an event but never alter it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    kind: EventType,
    source: String,
    content: String,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    channel_id: String,
    #[serde(default)]
    metadata: BTreeMap<String, PropertyValue>,
}

impl Event {
    /// Creates an event of the given kind with empty actor, channel and
    /// metadata.
    #[must_use]
    pub fn new(kind: EventType, source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            content: content.into(),
            user_id: String::new(),
            channel_id: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Creates a message event from a chat source.
    #[must_use]
    pub fn message(
        source: impl Into<String>,
        content: impl Into<String>,
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self::new(EventType::Message, source, content)
            .with_user(user_id)
            .with_channel(channel_id)
    }

    /// Creates a command event; `command` becomes the event content.
    #[must_use]
    pub fn command(
        source: impl Into<String>,
        command: impl Into<String>,
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self::new(EventType::Command, source, command)
            .with_user(user_id)
            .with_channel(channel_id)
    }

    /// Sets the actor identifier.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Sets the channel identifier.
    #[must_use]
    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the event kind.
    #[must_use]
    pub const fn kind(&self) -> EventType {
        self.kind
    }

    /// Returns the source label, such as a chat platform.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the free-text content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the actor identifier.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the channel identifier.
    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Returns the metadata map.
    #[must_use]
    pub const fn metadata(&self) -> &BTreeMap<String, PropertyValue> {
        &self.metadata
    }
}
