use std::any::Any;
use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use rw_core::{Event, Value};
use tracing::{debug, warn};

use crate::context::TickContext;
use crate::error::HandlerError;

/// One timestamped step of a script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptKeyPoint {
    /// When the action becomes due.
    pub timestamp: DateTime<Utc>,
    /// The action name, resolved through [`ActionSet::get_action`].
    pub action: String,
    /// Positional arguments for the action.
    pub args: Vec<Value>,
    /// Keyword arguments for the action.
    pub kwargs: HashMap<String, Value>,
}

impl ScriptKeyPoint {
    /// Create a key point with no arguments.
    pub fn new(timestamp: DateTime<Utc>, action: impl Into<String>) -> Self {
        Self {
            timestamp,
            action: action.into(),
            args: Vec::new(),
            kwargs: HashMap::new(),
        }
    }

    /// Append a positional argument.
    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a keyword argument.
    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Positional argument `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Keyword argument `key`, if present.
    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }
}

/// What an action returns: the events it produced.
pub type ActionResult = Result<Vec<Event>, HandlerError>;

/// A named script action bound to the state type `S`.
pub type Action<S> = fn(&mut S, &ScriptKeyPoint, &TickContext) -> ActionResult;

/// Resolves script action names to callables.
///
/// Implement this on the state a scripted entity carries. Names that resolve
/// to `None` are skipped when they come due.
pub trait ActionSet: std::fmt::Debug + Any {
    /// Look up the action called `name`.
    fn get_action(&self, name: &str) -> Option<Action<Self>>;
}

/// An action set that resolves nothing; every due item is consumed and skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoActions;

impl ActionSet for NoActions {
    fn get_action(&self, _name: &str) -> Option<Action<Self>> {
        None
    }
}

/// Object-safe view of an [`ActionSet`], so scripted entities can hold any
/// action state behind one box.
pub trait Performer: std::fmt::Debug {
    /// Resolve and invoke the key point's action. `None` when unresolved.
    fn perform(&mut self, key_point: &ScriptKeyPoint, ctx: &TickContext)
    -> Option<ActionResult>;

    /// Support downcasting to the concrete action set.
    fn as_any(&self) -> &dyn Any;

    /// Support downcasting to the concrete action set.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: ActionSet> Performer for T {
    fn perform(
        &mut self,
        key_point: &ScriptKeyPoint,
        ctx: &TickContext,
    ) -> Option<ActionResult> {
        let action = self.get_action(&key_point.action)?;
        Some(action(self, key_point, ctx))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An entity driven by a queue of timestamped actions.
///
/// The queue is consumed strictly from the front. It is expected to be in
/// ascending timestamp order; [`ScriptedEntity::push`] and
/// [`ScriptedEntity::set_script`] keep whatever order they are given, while
/// [`ScriptedEntity::schedule`] inserts in order.
#[derive(Debug)]
pub struct ScriptedEntity {
    script: VecDeque<ScriptKeyPoint>,
    actions: Box<dyn Performer>,
}

impl ScriptedEntity {
    /// Create an entity with an empty script.
    pub fn new(actions: impl ActionSet) -> Self {
        Self {
            script: VecDeque::new(),
            actions: Box::new(actions),
        }
    }

    /// Replace the script, builder style.
    pub fn with_script(mut self, script: Vec<ScriptKeyPoint>) -> Self {
        self.set_script(script);
        self
    }

    /// The remaining script, front first.
    pub fn script(&self) -> &VecDeque<ScriptKeyPoint> {
        &self.script
    }

    /// Replace the script. The order is kept as given.
    pub fn set_script(&mut self, script: Vec<ScriptKeyPoint>) {
        self.script = script.into();
    }

    /// Append a key point at the back.
    pub fn push(&mut self, key_point: ScriptKeyPoint) {
        self.script.push_back(key_point);
    }

    /// Insert a key point after every item due at or before it.
    pub fn schedule(&mut self, key_point: ScriptKeyPoint) {
        let index = self
            .script
            .iter()
            .position(|kp| kp.timestamp > key_point.timestamp)
            .unwrap_or(self.script.len());
        self.script.insert(index, key_point);
    }

    /// Borrow the action set as its concrete type.
    pub fn actions<T: ActionSet>(&self) -> Option<&T> {
        self.actions.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow the action set as its concrete type.
    pub fn actions_mut<T: ActionSet>(&mut self) -> Option<&mut T> {
        self.actions.as_any_mut().downcast_mut::<T>()
    }

    /// Fire every key point due at `ctx.now()`, front to back, and collect
    /// the events the actions return.
    ///
    /// Due items are consumed whether or not their action resolves or
    /// succeeds, so each fires at most once.
    pub fn fire_due(&mut self, ctx: &TickContext) -> Vec<Event> {
        let now = ctx.now();
        let mut produced = Vec::new();
        while self.script.front().is_some_and(|kp| kp.timestamp <= now) {
            let Some(key_point) = self.script.pop_front() else {
                break;
            };
            match self.actions.perform(&key_point, ctx) {
                Some(Ok(events)) => produced.extend(events),
                Some(Err(err)) => {
                    warn!(action = %key_point.action, error = %err, "script action failed");
                }
                None => {
                    debug!(action = %key_point.action, "no such script action, skipping");
                }
            }
        }
        produced
    }
}
