use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rw_core::time::utcnow;
use rw_core::{BoundEvent, EntityId};
use tracing::{debug, debug_span};

use crate::clock::SimClock;
use crate::config::SimConfig;
use crate::context::TickContext;
use crate::entity::Entity;
use crate::error::{SimError, SimResult};

/// The root of a simulation.
///
/// The world owns the entity tree through its root location, the simulated
/// clock, and a registry of which entities are locations and how they are
/// connected. Connections are a symmetric adjacency relation kept beside the
/// tree; they never affect event propagation.
#[derive(Debug)]
pub struct World {
    root: Entity,
    clock: SimClock,
    config: SimConfig,
    locations: HashSet<EntityId>,
    connections: HashMap<EntityId, HashSet<EntityId>>,
}

impl Default for World {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl World {
    /// Create an empty world. The root is a location and is registered.
    pub fn new(config: SimConfig) -> Self {
        let start = config.start_time.unwrap_or_else(utcnow);
        let root = Entity::location(config.private);
        let mut locations = HashSet::new();
        locations.insert(root.id());
        Self {
            root,
            clock: SimClock::new(start, config.time_step),
            config,
            locations,
            connections: HashMap::new(),
        }
    }

    /// Name the root, builder style.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.root.set_name(Some(name.into()));
        self
    }

    /// The root's id, which is also the world's id.
    pub fn id(&self) -> EntityId {
        self.root.id()
    }

    /// The configuration the world was built with.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The simulated clock.
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// The simulated clock, mutably.
    pub fn clock_mut(&mut self) -> &mut SimClock {
        &mut self.clock
    }

    /// Number of completed ticks.
    pub fn elapsed_ticks(&self) -> u64 {
        self.clock.elapsed_ticks()
    }

    /// The simulated time the next tick will observe.
    pub fn current_time(&self) -> SimResult<DateTime<Utc>> {
        self.clock.current_time()
    }

    // -----------------------------------------------------------------------
    // Driving
    // -----------------------------------------------------------------------

    /// Advance the simulation by one tick and return the events that escaped
    /// the root.
    ///
    /// Every entity observes the same frozen simulated time during the tick.
    /// If that time cannot be represented the tick fails before anything is
    /// touched and the tick counter is unchanged.
    pub fn tick(&mut self) -> SimResult<Vec<BoundEvent>> {
        let now = self.clock.current_time()?;
        let tick = self.clock.elapsed_ticks();
        let span = debug_span!("tick", tick, %now);
        let _enter = span.enter();

        let ctx = TickContext::frozen(now, tick)
            .with_drain_policy(self.config.drain_policy)
            .with_max_backlog(self.config.max_backlog);
        let batch = self.root.update(&ctx);
        self.clock.advance();

        debug!(escaped = batch.len(), "tick complete");
        Ok(batch)
    }

    /// Run `ticks` ticks and collect every escaped event in order.
    pub fn run(&mut self, ticks: u64) -> SimResult<Vec<BoundEvent>> {
        let mut events = Vec::new();
        for _ in 0..ticks {
            events.extend(self.tick()?);
        }
        Ok(events)
    }

    // -----------------------------------------------------------------------
    // Tree access
    // -----------------------------------------------------------------------

    /// The root location.
    pub fn root(&self) -> &Entity {
        &self.root
    }

    /// The root location, mutably.
    ///
    /// Entities attached directly through the root bypass the location
    /// registry; prefer [`World::add_entity`] and friends.
    pub fn root_mut(&mut self) -> &mut Entity {
        &mut self.root
    }

    /// Find any entity in the tree.
    pub fn find_by_id(&self, id: EntityId) -> Option<&Entity> {
        self.root.find_by_id(id)
    }

    /// Find any entity in the tree, mutably.
    pub fn find_by_id_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.root.find_by_id_mut(id)
    }

    /// Attach an entity to the root. Returns `false` if an entity with the
    /// same id is already in the tree.
    pub fn add_entity(&mut self, entity: Entity) -> bool {
        let root = self.id();
        self.attach(root, entity).unwrap_or(false)
    }

    /// Attach an entity under `parent`, registering any locations in its
    /// subtree. Returns `false` if an entity with the same id is already in
    /// the tree.
    pub fn add_entity_to(&mut self, parent: EntityId, entity: Entity) -> SimResult<bool> {
        self.attach(parent, entity)
    }

    /// Detach an entity from anywhere in the tree, unregistering the
    /// locations it carried. Removing an absent entity is a no-op.
    pub fn remove_entity(&mut self, id: EntityId) -> SimResult<Option<Entity>> {
        if id == self.id() {
            return Err(SimError::RootRemoval);
        }
        let removed = self.root.detach(id);
        if let Some(entity) = &removed {
            self.unregister(entity);
        }
        Ok(removed)
    }

    fn attach(&mut self, parent: EntityId, entity: Entity) -> SimResult<bool> {
        if self.root.find_by_id(entity.id()).is_some() {
            return Ok(false);
        }
        let found: Vec<EntityId> = entity
            .descendants()
            .filter(|e| e.role().as_location().is_some())
            .map(Entity::id)
            .collect();
        let id = entity.id();
        let parent = self
            .root
            .find_by_id_mut(parent)
            .ok_or(SimError::EntityNotFound(parent))?;
        parent.add_entity(entity);
        self.locations.extend(found);
        self.place_actors(id);
        Ok(true)
    }

    /// Point every actor in the subtree at `id` to its nearest registered
    /// location ancestor.
    fn place_actors(&mut self, id: EntityId) {
        let world = self.id();
        let Some(mut path) = self.root.path_to(id) else {
            return;
        };
        path.pop();
        let outer = path
            .into_iter()
            .rev()
            .find(|ancestor| self.locations.contains(ancestor))
            .unwrap_or(world);
        let locations = &self.locations;
        if let Some(entity) = self.root.find_by_id_mut(id) {
            place_subtree(entity, world, outer, locations);
        }
    }

    fn unregister(&mut self, entity: &Entity) {
        for id in entity.descendants().map(Entity::id) {
            if !self.locations.remove(&id) {
                continue;
            }
            if let Some(peers) = self.connections.remove(&id) {
                for peer in peers {
                    if let Some(links) = self.connections.get_mut(&peer) {
                        links.remove(&id);
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Locations
    // -----------------------------------------------------------------------

    /// Attach a location to the root and register it.
    pub fn add_location(&mut self, entity: Entity) -> SimResult<EntityId> {
        let root = self.id();
        self.add_location_to(root, entity)
    }

    /// Attach a location under the registered location `parent`.
    pub fn add_location_to(&mut self, parent: EntityId, entity: Entity) -> SimResult<EntityId> {
        if entity.role().as_location().is_none() {
            return Err(SimError::NotALocation(entity.id()));
        }
        if !self.is_location(parent) {
            return Err(SimError::InvalidReference(parent));
        }
        let id = entity.id();
        self.attach(parent, entity)?;
        Ok(id)
    }

    /// Detach a registered location with its subtree, unregister every
    /// location inside it, and drop their connections.
    pub fn remove_location(&mut self, id: EntityId) -> SimResult<Entity> {
        if id == self.id() {
            return Err(SimError::RootRemoval);
        }
        if !self.is_location(id) {
            return Err(SimError::InvalidReference(id));
        }
        self.remove_entity(id)?.ok_or(SimError::InvalidReference(id))
    }

    /// Whether `id` is a registered location.
    pub fn is_location(&self, id: EntityId) -> bool {
        self.locations.contains(&id)
    }

    /// A registered location by id.
    pub fn get_location(&self, id: EntityId) -> Option<&Entity> {
        if !self.is_location(id) {
            return None;
        }
        self.root.find_by_id(id)
    }

    /// Every registered location, in tree order, starting with the root.
    pub fn iter_locations(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.root
            .descendants()
            .filter(|e| self.locations.contains(&e.id()))
    }

    /// Connect two registered locations. Symmetric and idempotent.
    pub fn connect_locations(&mut self, a: EntityId, b: EntityId) -> SimResult<()> {
        for id in [a, b] {
            if !self.is_location(id) {
                return Err(SimError::InvalidReference(id));
            }
        }
        self.connections.entry(a).or_default().insert(b);
        self.connections.entry(b).or_default().insert(a);
        Ok(())
    }

    /// Remove a connection. Returns whether one existed.
    pub fn disconnect_locations(&mut self, a: EntityId, b: EntityId) -> bool {
        let removed = self
            .connections
            .get_mut(&a)
            .is_some_and(|links| links.remove(&b));
        if let Some(links) = self.connections.get_mut(&b) {
            links.remove(&a);
        }
        removed
    }

    /// The locations connected to `id`, in tree order.
    pub fn get_connected_locations(&self, id: EntityId) -> SimResult<Vec<&Entity>> {
        if !self.is_location(id) {
            return Err(SimError::InvalidReference(id));
        }
        let Some(links) = self.connections.get(&id) else {
            return Ok(Vec::new());
        };
        Ok(self
            .iter_locations()
            .filter(|e| links.contains(&e.id()))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Actors
    // -----------------------------------------------------------------------

    /// Attach an actor under `location` (the root when `None`) and record
    /// where it is.
    pub fn add_actor(
        &mut self,
        entity: Entity,
        location: Option<EntityId>,
    ) -> SimResult<EntityId> {
        let location = location.unwrap_or_else(|| self.id());
        if !self.is_location(location) {
            return Err(SimError::InvalidReference(location));
        }
        let id = entity.id();
        if entity.role().as_actor().is_none() {
            return Err(SimError::NotAnActor(id));
        }
        self.attach(location, entity)?;
        Ok(id)
    }

    /// Move an actor, with its subtree, under another registered location.
    pub fn move_actor(&mut self, actor: EntityId, location: EntityId) -> SimResult<()> {
        if !self.is_location(location) {
            return Err(SimError::InvalidReference(location));
        }
        let entity = self
            .root
            .find_by_id(actor)
            .ok_or(SimError::EntityNotFound(actor))?;
        if entity.role().as_actor().is_none() {
            return Err(SimError::NotAnActor(actor));
        }
        if entity.find_by_id(location).is_some() {
            return Err(SimError::WouldCycle {
                entity: actor,
                target: location,
            });
        }

        let in_place = self
            .root
            .parent_of(actor)
            .is_some_and(|parent| parent.id() == location);
        if !in_place {
            let detached = self
                .root
                .detach(actor)
                .ok_or(SimError::EntityNotFound(actor))?;
            self.root
                .find_by_id_mut(location)
                .ok_or(SimError::InvalidReference(location))?
                .add_entity(detached);
            debug!(%actor, %location, "actor moved");
        }

        self.place_actors(actor);
        Ok(())
    }

    /// The registered location an actor currently stands in, if any.
    pub fn actor_location(&self, actor: EntityId) -> SimResult<Option<&Entity>> {
        let entity = self
            .root
            .find_by_id(actor)
            .ok_or(SimError::EntityNotFound(actor))?;
        let state = entity
            .role()
            .as_actor()
            .ok_or(SimError::NotAnActor(actor))?;
        Ok(state.location_id().and_then(|id| self.get_location(id)))
    }
}

fn place_subtree(
    entity: &mut Entity,
    world: EntityId,
    location: EntityId,
    locations: &HashSet<EntityId>,
) {
    if let Some(actor) = entity.role_mut().as_actor_mut() {
        actor.place(world, location);
    }
    let inner = if locations.contains(&entity.id()) {
        entity.id()
    } else {
        location
    };
    for child in entity.children_mut() {
        place_subtree(child, world, inner, locations);
    }
}
