use chrono::{DateTime, Duration, Utc};

/// Default bound on how many held-back events a child keeps between ticks.
pub const DEFAULT_MAX_BACKLOG: usize = 16;

/// How many events a parent pulls from each child per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrainPolicy {
    /// Take at most one event per child per tick. Anything else the child
    /// produced goes back to the front of the child's queue and is delivered
    /// on later ticks, one at a time, up to [`SimConfig::max_backlog`]
    /// events; the newest beyond that are dropped.
    #[default]
    OnePerChild,
    /// Take every event a child produced this tick.
    Exhaustive,
}

/// Configuration for a world.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Simulated time at tick 0. `None` means the wall-clock time at which
    /// the world is created.
    pub start_time: Option<DateTime<Utc>>,
    /// Simulated time per tick. May be zero or negative.
    pub time_step: Duration,
    /// How events are pulled from children each tick.
    pub drain_policy: DrainPolicy,
    /// Whether the world's root location is private.
    pub private: bool,
    /// How many held-back events each child keeps under
    /// [`DrainPolicy::OnePerChild`]. Zero drops everything but the first.
    pub max_backlog: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            start_time: None,
            time_step: Duration::minutes(15),
            drain_policy: DrainPolicy::default(),
            private: false,
            max_backlog: DEFAULT_MAX_BACKLOG,
        }
    }
}

impl SimConfig {
    /// Set the simulated time at tick 0.
    pub fn with_start_time(mut self, start: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self
    }

    /// Set the simulated time per tick.
    pub fn with_time_step(mut self, step: Duration) -> Self {
        self.time_step = step;
        self
    }

    /// Set how events are pulled from children each tick.
    pub fn with_drain_policy(mut self, policy: DrainPolicy) -> Self {
        self.drain_policy = policy;
        self
    }

    /// Bound the held-back events each child keeps between ticks.
    pub fn with_max_backlog(mut self, limit: usize) -> Self {
        self.max_backlog = limit;
        self
    }

    /// Make the world's root location private (or public).
    pub fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }
}
