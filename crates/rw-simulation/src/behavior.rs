use std::any::Any;

use rw_core::{BoundEvent, Event};

use crate::context::TickContext;

/// Behaviour plugged into an entity: what it does each tick and which
/// events it lets through to its parent.
///
/// Used directly by [`Role::Custom`](crate::Role::Custom) entities and as the
/// per-tick behaviour of an [`Actor`](crate::Actor).
pub trait Behavior: std::fmt::Debug {
    /// Decide whether an event pulled from a child continues upward.
    ///
    /// Must be pure: the engine may ask more than once for the same event.
    fn should_propagate_event(&self, _bound: &BoundEvent) -> bool {
        true
    }

    /// Produce this entity's own events for the current tick.
    fn act(&mut self, _ctx: &TickContext) -> Vec<Event> {
        Vec::new()
    }

    /// Support downcasting to the concrete behaviour type.
    fn as_any(&self) -> &dyn Any;

    /// Support downcasting to the concrete behaviour type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
