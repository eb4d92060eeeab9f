use rw_core::{BoundEvent, EntityId, Event};

use crate::behavior::Behavior;
use crate::context::TickContext;
use crate::world::World;

/// An autonomous entity that acts every tick.
///
/// An actor refers to its world and its current location by id. The tree
/// that owns the actor is the only owner; moving an actor between locations
/// goes through [`World::move_actor`], which keeps the id and the tree in
/// step.
#[derive(Debug, Default)]
pub struct Actor {
    world: Option<EntityId>,
    location_id: Option<EntityId>,
    behavior: Option<Box<dyn Behavior>>,
}

impl Actor {
    /// Create an actor associated with `world`, not yet at any location.
    pub fn new(world: &World) -> Self {
        Self {
            world: Some(world.id()),
            ..Self::default()
        }
    }

    /// Give the actor its per-tick behaviour.
    pub fn with_behavior(mut self, behavior: impl Behavior + 'static) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    /// The id of the associated world, if any.
    pub fn world(&self) -> Option<EntityId> {
        self.world
    }

    /// The id of the actor's current location, if any.
    pub fn location_id(&self) -> Option<EntityId> {
        self.location_id
    }

    /// Associate the actor with another world. The location resets to that
    /// world's root.
    pub fn set_world(&mut self, world: &World) {
        self.world = Some(world.id());
        self.location_id = Some(world.id());
    }

    pub(crate) fn place(&mut self, world: EntityId, location: EntityId) {
        self.world = Some(world);
        self.location_id = Some(location);
    }

    /// Borrow the behaviour as its concrete type.
    pub fn behavior<T: Behavior + 'static>(&self) -> Option<&T> {
        self.behavior.as_ref()?.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow the behaviour as its concrete type.
    pub fn behavior_mut<T: Behavior + 'static>(&mut self) -> Option<&mut T> {
        self.behavior.as_mut()?.as_any_mut().downcast_mut::<T>()
    }

    pub(crate) fn should_propagate_event(&self, bound: &BoundEvent) -> bool {
        self.behavior
            .as_ref()
            .is_none_or(|b| b.should_propagate_event(bound))
    }

    pub(crate) fn act(&mut self, ctx: &TickContext) -> Vec<Event> {
        match self.behavior.as_mut() {
            Some(behavior) => behavior.act(ctx),
            None => Vec::new(),
        }
    }
}
