use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::EntityId;
use crate::value::Value;

/// The type tag of an event. Extensible via `Custom(String)` for
/// user-defined kinds.
///
/// Handlers are registered per kind, so two events dispatch to the same
/// handler exactly when their kinds compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum EventKind {
    /// Something said out loud, audible to whoever shares the location.
    SayAloud,
    /// A statement made by an actor.
    Statement,
    /// A heartbeat emitted once per tick.
    Tick,
    /// A user-defined event kind.
    Custom(String),
}

impl EventKind {
    /// Parse a kind from its tag, falling back to `Custom` for unknown tags.
    pub fn parse(s: &str) -> Self {
        match s {
            "SAY_ALOUD" => Self::SayAloud,
            "STATEMENT" => Self::Statement,
            "tick" => Self::Tick,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Shorthand for a custom kind.
    pub fn custom(tag: impl Into<String>) -> Self {
        Self::Custom(tag.into())
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SayAloud => write!(f, "SAY_ALOUD"),
            Self::Statement => write!(f, "STATEMENT"),
            Self::Tick => write!(f, "tick"),
            Self::Custom(s) => write!(f, "{s}"),
        }
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.to_string()
    }
}

/// Something that happened in the simulation.
///
/// Events are immutable once handed to the engine: the context map is filled
/// with [`Event::with_context`] while building, and only read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    kind: EventKind,
    #[serde(default)]
    context: HashMap<String, Value>,
    created_at: DateTime<Utc>,
}

impl Event {
    /// Create an event stamped with the current wall-clock time.
    pub fn new(kind: EventKind) -> Self {
        Self::at(kind, Utc::now())
    }

    /// Create an event stamped with an explicit time, usually the simulated
    /// "now" of the tick that produced it.
    pub fn at(kind: EventKind, created_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            context: HashMap::new(),
            created_at,
        }
    }

    /// Attach a context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// The event's type tag.
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// The full context map.
    pub fn context(&self) -> &HashMap<String, Value> {
        &self.context
    }

    /// Look up one context entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    /// When the event was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// An event paired with the entity responsible for it.
///
/// The source is kept as the event climbs the tree, so it may differ from
/// the entity that last queued it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundEvent {
    /// The entity semantically responsible for the event.
    pub source: EntityId,
    /// The event itself.
    pub event: Event,
}

impl BoundEvent {
    /// Bind an event to its source.
    pub fn new(source: EntityId, event: Event) -> Self {
        Self { source, event }
    }

    /// Shorthand for the bound event's kind.
    pub fn kind(&self) -> &EventKind {
        self.event.kind()
    }
}
