//! The shared record threaded through a pipeline run.
//!
//! A [`Context`] carries the originating [`Event`], a [`Properties`] map that
//! plugins publish intermediate results into, and an append-only list of
//! [`Response`] values. Both collections only grow during a run: the API
//! offers insertion and appending but no removal, and
//! [`Context::check_extends`] lets the pipeline reject a context returned by
//! an out-of-process plugin that lost state on the way.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::value::PropertyValue;

/// Key/value results published by plugins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, PropertyValue>);

impl Properties {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts or overwrites a value, returning the previous one.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    /// Returns the text stored under `key`, if it is a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropertyValue::as_str)
    }

    /// Returns the flag stored under `key`, if it is a boolean.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(PropertyValue::as_bool)
    }

    /// Returns the integer stored under `key`, if it is one.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(PropertyValue::as_i64)
    }

    /// Reports whether `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Reports whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

/// Output a plugin wants delivered back to the event's originator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Name of the plugin that produced the response.
    pub plugin_name: String,
    /// Human-readable content.
    pub content: String,
    /// Free-form tag such as `status` or `upload`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Structured payload.
    #[serde(default)]
    pub data: BTreeMap<String, PropertyValue>,
}

impl Response {
    /// Creates a response with an empty payload.
    #[must_use]
    pub fn new(
        plugin_name: impl Into<String>,
        kind: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            content: content.into(),
            kind: kind.into(),
            data: BTreeMap::new(),
        }
    }

    /// Adds a payload entry.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// A plugin's verdict on whether it wants to act on a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionDecision {
    should_execute: bool,
    reason: String,
}

impl ExecutionDecision {
    /// The plugin wants to run.
    #[must_use]
    pub fn accept(reason: impl Into<String>) -> Self {
        Self {
            should_execute: true,
            reason: reason.into(),
        }
    }

    /// The plugin declines to run.
    #[must_use]
    pub fn decline(reason: impl Into<String>) -> Self {
        Self {
            should_execute: false,
            reason: reason.into(),
        }
    }

    /// Whether `process` should be invoked.
    #[must_use]
    pub const fn should_execute(&self) -> bool {
        self.should_execute
    }

    /// Human-readable explanation.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Unit of work threaded through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    event: Event,
    #[serde(default)]
    properties: Properties,
    #[serde(default)]
    responses: Vec<Response>,
}

impl Context {
    /// Creates a context for `event` with no properties or responses.
    #[must_use]
    pub const fn new(event: Event) -> Self {
        Self {
            event,
            properties: Properties::new(),
            responses: Vec::new(),
        }
    }

    /// Returns the originating event.
    #[must_use]
    pub const fn event(&self) -> &Event {
        &self.event
    }

    /// Returns the published properties.
    #[must_use]
    pub const fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Returns the properties for publishing new values.
    pub const fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    /// Publishes a property; shorthand for `properties_mut().insert(..)`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(key, value);
    }

    /// Returns the responses in the order they were appended.
    #[must_use]
    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    /// Appends a response.
    pub fn push_response(&mut self, response: Response) {
        self.responses.push(response);
    }

    /// Checks that `self` grew out of `previous` without losing anything.
    ///
    /// The event must be unchanged, every key of `previous` must still be
    /// present (values may be overwritten), and the previous responses must
    /// form a prefix of the current ones.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violation found.
    pub fn check_extends(&self, previous: &Self) -> Result<(), String> {
        if self.event != previous.event {
            return Err(String::from("event was modified"));
        }
        if let Some((key, _)) = previous
            .properties
            .iter()
            .find(|(key, _)| !self.properties.contains_key(key))
        {
            return Err(format!("property '{key}' was removed"));
        }
        if !self.responses.starts_with(&previous.responses) {
            return Err(format!(
                "responses were rewritten ({} before, {} after)",
                previous.responses.len(),
                self.responses.len()
            ));
        }
        Ok(())
    }
}
