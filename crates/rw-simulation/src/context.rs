use chrono::{DateTime, Utc};
use rw_core::{Event, EventKind};

use crate::config::{DEFAULT_MAX_BACKLOG, DrainPolicy};

/// Read-only context handed to every entity during a tick.
///
/// A world tick builds a frozen context so that every time-sensitive read in
/// the tree sees the same simulated "now". An entity ticked on its own uses a
/// live context carrying the wall-clock time instead.
#[derive(Debug, Clone)]
pub struct TickContext {
    now: DateTime<Utc>,
    tick: Option<u64>,
    drain_policy: DrainPolicy,
    max_backlog: usize,
}

impl TickContext {
    /// A context for a world tick, pinned to the simulated time of `tick`.
    pub fn frozen(now: DateTime<Utc>, tick: u64) -> Self {
        Self {
            now,
            tick: Some(tick),
            drain_policy: DrainPolicy::default(),
            max_backlog: DEFAULT_MAX_BACKLOG,
        }
    }

    /// A context for ticking an entity outside any world, using true
    /// current time.
    pub fn live() -> Self {
        Self {
            now: Utc::now(),
            tick: None,
            drain_policy: DrainPolicy::default(),
            max_backlog: DEFAULT_MAX_BACKLOG,
        }
    }

    /// Set how parents pull events from their children during this tick.
    pub fn with_drain_policy(mut self, policy: DrainPolicy) -> Self {
        self.drain_policy = policy;
        self
    }

    /// Bound the events each child holds back for later ticks.
    pub fn with_max_backlog(mut self, limit: usize) -> Self {
        self.max_backlog = limit;
        self
    }

    /// The time every entity observes during this tick.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// The world tick number, or `None` for a live context.
    pub fn tick(&self) -> Option<u64> {
        self.tick
    }

    /// How parents pull events from their children.
    pub fn drain_policy(&self) -> DrainPolicy {
        self.drain_policy
    }

    /// How many held-back events each child may keep.
    pub fn max_backlog(&self) -> usize {
        self.max_backlog
    }

    /// Create an event stamped with this tick's time.
    pub fn event(&self, kind: EventKind) -> Event {
        Event::at(kind, self.now)
    }
}
