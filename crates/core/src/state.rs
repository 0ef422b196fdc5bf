//! Scoped state — the value type and scope rules for the context store.
//!
//! Every state entry is addressed by (scope, key). The scope decides the
//! entry's lifetime and who may write it; the value type is a closed set of
//! serializable scalars and simple structures so that state always survives
//! a process restart. Opaque objects are unrepresentable by construction.

use crate::error::StateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The lifetime/visibility class of a state entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Owned by exactly one session; only that session may write it.
    Session,
    /// Keyed by user id; outlives any one session of that user.
    User,
    /// Shared read-mostly configuration; writable only by a privileged actor.
    App,
    /// Never persisted beyond the current turn.
    Ephemeral,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Session => "session",
            Scope::User => "user",
            Scope::App => "app",
            Scope::Ephemeral => "ephemeral",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = StateError;

    /// Unknown scope strings are rejected at the boundary.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session" => Ok(Scope::Session),
            "user" => Ok(Scope::User),
            "app" => Ok(Scope::App),
            "ephemeral" | "temp" => Ok(Scope::Ephemeral),
            other => Err(StateError::UnknownScope(other.to_string())),
        }
    }
}

/// A state value restricted to serializable scalars and simple structures.
///
/// Deliberately a closed enum rather than `serde_json::Value` passthrough:
/// every variant round-trips through JSON, and there is no escape hatch for
/// handles, channels, or other in-process objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<StateValue>),
    Map(BTreeMap<String, StateValue>),
    Null,
}

impl StateValue {
    /// View as text, if this is a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StateValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// View as integer, if this is an `Int` value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            StateValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StateValue::Null)
    }

    /// Convert from an arbitrary JSON value. Total: JSON is already closed
    /// over the same shapes.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => StateValue::Null,
            serde_json::Value::Bool(b) => StateValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    StateValue::Int(i)
                } else {
                    StateValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => StateValue::Text(s),
            serde_json::Value::Array(items) => {
                StateValue::List(items.into_iter().map(StateValue::from_json).collect())
            }
            serde_json::Value::Object(map) => StateValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, StateValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert into a JSON value (lossless).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            StateValue::Null => serde_json::Value::Null,
            StateValue::Bool(b) => serde_json::Value::Bool(*b),
            StateValue::Int(i) => serde_json::Value::from(*i),
            StateValue::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            StateValue::Text(s) => serde_json::Value::String(s.clone()),
            StateValue::List(items) => {
                serde_json::Value::Array(items.iter().map(StateValue::to_json).collect())
            }
            StateValue::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        StateValue::Text(s.to_string())
    }
}

impl From<String> for StateValue {
    fn from(s: String) -> Self {
        StateValue::Text(s)
    }
}

impl From<bool> for StateValue {
    fn from(b: bool) -> Self {
        StateValue::Bool(b)
    }
}

impl From<i64> for StateValue {
    fn from(i: i64) -> Self {
        StateValue::Int(i)
    }
}
