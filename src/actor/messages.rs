//! Message types for actor communication.
//!
//! Every actor mailbox carries [`Event`]s. Payloads are JSON values so that
//! arbitrarily shaped application events can travel through the routing
//! protocol untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Request for the orchestrator to forward the payload to the `app` actor.
pub const APP_UPDATE_REQUESTED: &str = "APP_UPDATE_REQUESTED";

/// Request for the orchestrator to forward the payload to the `ui` actor.
pub const UI_UPDATE_REQUESTED: &str = "UI_UPDATE_REQUESTED";

/// Request for a (frame-scheduled) render.
pub const RENDER_REQUESTED: &str = "RENDER_REQUESTED";

/// The one synchronous render sent when the system starts.
pub const FIRST_RENDER_REQUESTED: &str = "FIRST_RENDER_REQUESTED";

/// A tagged message with an optional payload.
///
/// Decoding is strict: keys other than `type` and `payload` are rejected,
/// and an explicit `"payload": null` stays `Some(Value::Null)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Event {
    /// Discriminant.
    #[serde(rename = "type")]
    pub kind: String,
    /// Optional payload of arbitrary shape.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// A payload key that is present is `Some`, whatever its value.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Event {
    /// Create an event without payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
        }
    }

    /// Create an event with a payload.
    pub fn with_payload(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload: Some(payload),
        }
    }

    /// Check the discriminant.
    #[inline]
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kind)
    }
}

/// Name of the state a machine is currently in.
///
/// Nested states are written with dots (`"idle.editing"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateValue(String);

impl StateValue {
    /// Create a state value.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The full state name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the state itself and for any of its nested states.
    pub fn matches(&self, name: &str) -> bool {
        self.0
            .strip_prefix(name)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StateValue {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Read-only capture of one machine's state and context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    /// Current state.
    pub state: StateValue,
    /// Context at the moment of capture.
    pub context: Value,
}
