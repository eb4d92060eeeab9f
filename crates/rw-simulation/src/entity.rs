use std::collections::{HashMap, VecDeque};
use std::fmt;

use rw_core::{BoundEvent, EntityId, Event, EventKind};
use tracing::{debug, trace, warn};

use crate::actor::Actor;
use crate::behavior::Behavior;
use crate::config::DrainPolicy;
use crate::context::TickContext;
use crate::error::HandlerResult;
use crate::location::Location;
use crate::scripted::ScriptedEntity;

/// A callback run when an event of a given kind is dispatched to an entity.
pub type EventHandler = Box<dyn FnMut(&BoundEvent) -> HandlerResult>;

/// What an entity is, beyond being a node in the tree.
#[derive(Debug, Default)]
pub enum Role {
    /// A bare node: propagates everything, produces nothing.
    #[default]
    Plain,
    /// A visibility boundary.
    Location(Location),
    /// An autonomous entity acting every tick.
    Actor(Actor),
    /// An entity firing timestamped actions.
    Scripted(ScriptedEntity),
    /// A node with user-supplied behaviour.
    Custom(Box<dyn Behavior>),
}

impl Role {
    /// Whether an event pulled from a child continues upward.
    pub fn should_propagate_event(&self, bound: &BoundEvent) -> bool {
        match self {
            Self::Plain | Self::Scripted(_) => true,
            Self::Location(location) => location.should_propagate_event(bound),
            Self::Actor(actor) => actor.should_propagate_event(bound),
            Self::Custom(behavior) => behavior.should_propagate_event(bound),
        }
    }

    fn act(&mut self, ctx: &TickContext) -> Vec<Event> {
        match self {
            Self::Plain | Self::Location(_) => Vec::new(),
            Self::Actor(actor) => actor.act(ctx),
            Self::Scripted(scripted) => scripted.fire_due(ctx),
            Self::Custom(behavior) => behavior.act(ctx),
        }
    }

    /// Actors and scripted entities report their own events before their
    /// subtree's.
    fn acts_first(&self) -> bool {
        matches!(self, Self::Actor(_) | Self::Scripted(_))
    }

    /// The location data, if this is a location.
    pub fn as_location(&self) -> Option<&Location> {
        match self {
            Self::Location(location) => Some(location),
            _ => None,
        }
    }

    /// The location data, mutably, if this is a location.
    pub fn as_location_mut(&mut self) -> Option<&mut Location> {
        match self {
            Self::Location(location) => Some(location),
            _ => None,
        }
    }

    /// The actor data, if this is an actor.
    pub fn as_actor(&self) -> Option<&Actor> {
        match self {
            Self::Actor(actor) => Some(actor),
            _ => None,
        }
    }

    /// The actor data, mutably, if this is an actor.
    pub fn as_actor_mut(&mut self) -> Option<&mut Actor> {
        match self {
            Self::Actor(actor) => Some(actor),
            _ => None,
        }
    }

    /// The script data, if this is a scripted entity.
    pub fn as_scripted(&self) -> Option<&ScriptedEntity> {
        match self {
            Self::Scripted(scripted) => Some(scripted),
            _ => None,
        }
    }

    /// The script data, mutably, if this is a scripted entity.
    pub fn as_scripted_mut(&mut self) -> Option<&mut ScriptedEntity> {
        match self {
            Self::Scripted(scripted) => Some(scripted),
            _ => None,
        }
    }

    /// Borrow a custom behaviour as its concrete type.
    pub fn behavior<T: Behavior + 'static>(&self) -> Option<&T> {
        match self {
            Self::Custom(behavior) => behavior.as_any().downcast_ref::<T>(),
            Self::Actor(actor) => actor.behavior::<T>(),
            _ => None,
        }
    }

    /// Mutably borrow a custom behaviour as its concrete type.
    pub fn behavior_mut<T: Behavior + 'static>(&mut self) -> Option<&mut T> {
        match self {
            Self::Custom(behavior) => behavior.as_any_mut().downcast_mut::<T>(),
            Self::Actor(actor) => actor.behavior_mut::<T>(),
            _ => None,
        }
    }
}

/// A node in the simulation tree.
///
/// An entity owns its children outright, in order; that order is the order
/// in which they are ticked and in which broadcasts reach them. Events move
/// through the private outgoing queue, which is drained every tick.
pub struct Entity {
    id: EntityId,
    name: Option<String>,
    role: Role,
    children: Vec<Entity>,
    outgoing: VecDeque<BoundEvent>,
    handlers: HashMap<EventKind, EventHandler>,
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("children", &self.children)
            .field("pending", &self.outgoing.len())
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::new(Role::Plain)
    }
}

impl Entity {
    /// Create an entity with a fresh id.
    pub fn new(role: Role) -> Self {
        Self {
            id: EntityId::new(),
            name: None,
            role,
            children: Vec::new(),
            outgoing: VecDeque::new(),
            handlers: HashMap::new(),
        }
    }

    /// A bare node.
    pub fn plain() -> Self {
        Self::new(Role::Plain)
    }

    /// A location node.
    pub fn location(private: bool) -> Self {
        Self::new(Role::Location(Location::new(private)))
    }

    /// An actor node.
    pub fn actor(actor: Actor) -> Self {
        Self::new(Role::Actor(actor))
    }

    /// A scripted node.
    pub fn scripted(scripted: ScriptedEntity) -> Self {
        Self::new(Role::Scripted(scripted))
    }

    /// A node with user-supplied behaviour.
    pub fn custom(behavior: impl Behavior + 'static) -> Self {
        Self::new(Role::Custom(Box::new(behavior)))
    }

    /// Set the display name, builder style.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append a child, builder style.
    pub fn with_child(mut self, child: Entity) -> Self {
        self.add_entity(child);
        self
    }

    /// This entity's id. Fixed for its lifetime.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The display name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set or clear the display name.
    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    /// The entity's role.
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// The entity's role, mutably.
    pub fn role_mut(&mut self) -> &mut Role {
        &mut self.role
    }

    /// Direct children, in tick order.
    pub fn children(&self) -> &[Entity] {
        &self.children
    }

    /// Number of events waiting in the outgoing queue.
    pub fn pending_events(&self) -> usize {
        self.outgoing.len()
    }

    // -----------------------------------------------------------------------
    // Tree structure
    // -----------------------------------------------------------------------

    /// Append a child. Adding an entity that is already a direct child is a
    /// no-op; returns whether the child was added.
    pub fn add_entity(&mut self, child: Entity) -> bool {
        if self.children.iter().any(|c| c.id == child.id) {
            return false;
        }
        self.children.push(child);
        true
    }

    /// Remove a direct child. Removing an absent child is a no-op.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let index = self.children.iter().position(|c| c.id == id)?;
        Some(self.children.remove(index))
    }

    /// Remove an entity from anywhere below this one.
    pub fn detach(&mut self, id: EntityId) -> Option<Entity> {
        if let Some(child) = self.remove_entity(id) {
            return Some(child);
        }
        self.children.iter_mut().find_map(|c| c.detach(id))
    }

    /// Depth-first search: this entity first, then each child subtree in order.
    pub fn find_by_id(&self, id: EntityId) -> Option<&Entity> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_by_id(id))
    }

    /// Mutable depth-first search.
    pub fn find_by_id_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_by_id_mut(id))
    }

    /// The entity whose direct child is `id`.
    pub fn parent_of(&self, id: EntityId) -> Option<&Entity> {
        if self.children.iter().any(|c| c.id == id) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.parent_of(id))
    }

    /// Walk this entity and every descendant, depth first, in tick order.
    pub fn descendants(&self) -> impl Iterator<Item = &Entity> + '_ {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    /// Register the handler for `kind`, returning the one it replaces.
    pub fn set_event_handler(
        &mut self,
        kind: EventKind,
        handler: impl FnMut(&BoundEvent) -> HandlerResult + 'static,
    ) -> Option<EventHandler> {
        self.handlers.insert(kind, Box::new(handler))
    }

    /// Remove the handler for `kind`. Clearing a kind with no handler is a
    /// no-op; returns whether a handler was removed.
    pub fn clear_event_handler(&mut self, kind: &EventKind) -> bool {
        self.handlers.remove(kind).is_some()
    }

    /// Whether a handler is registered for `kind`.
    pub fn has_handler(&self, kind: &EventKind) -> bool {
        self.handlers.contains_key(kind)
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Whether an event pulled from a child continues upward. Pure.
    pub fn should_propagate_event(&self, bound: &BoundEvent) -> bool {
        self.role.should_propagate_event(bound)
    }

    /// Queue an event sourced from this entity.
    pub fn emit_event(&mut self, event: Event) {
        self.emit_event_from(self.id, event);
    }

    /// Queue an event on behalf of `source`.
    pub fn emit_event_from(&mut self, source: EntityId, event: Event) {
        self.outgoing.push_back(BoundEvent::new(source, event));
    }

    /// Drain the outgoing queue in FIFO order.
    pub fn pop_event_batch(&mut self) -> Vec<BoundEvent> {
        self.outgoing.drain(..).collect()
    }

    /// This entity's own events for the tick, as decided by its role.
    pub fn act(&mut self, ctx: &TickContext) -> Vec<Event> {
        self.role.act(ctx)
    }

    /// Dispatch an event here and to the whole subtree.
    ///
    /// The handler registered for the event's kind runs first, then every
    /// child receives the event in order whether or not a handler existed
    /// here. Handler failures are logged and skipped; the return value is
    /// how many handlers failed in this subtree.
    pub fn handle_event(&mut self, bound: &BoundEvent) -> usize {
        let mut failures = 0;
        let outcome = self
            .handlers
            .get_mut(bound.kind())
            .map(|handler| handler(bound));
        if let Some(Err(err)) = outcome {
            warn!(
                entity = %self.id,
                kind = %bound.kind(),
                source = %bound.source,
                error = %err,
                "event handler failed"
            );
            failures += 1;
        }
        for child in &mut self.children {
            failures += child.handle_event(bound);
        }
        failures
    }

    /// Run one tick for this entity and its subtree, returning the events
    /// that leave this entity upward.
    ///
    /// Children are visited in the order they had when the tick began. Each
    /// event pulled from a child either joins this entity's queue (keeping
    /// its original source) or, if this entity does not propagate it, is
    /// dispatched down this entity's subtree and goes no further.
    ///
    /// Everything leaves through the queue, so events still waiting from
    /// earlier ticks go out ahead of this tick's.
    pub fn update(&mut self, ctx: &TickContext) -> Vec<BoundEvent> {
        let acts_first = self.role.acts_first();
        if acts_first {
            self.queue_own_output(ctx);
        }
        self.pull_from_children(ctx);
        if !acts_first {
            self.queue_own_output(ctx);
        }
        self.pop_event_batch()
    }

    /// Run one tick against the wall clock.
    pub fn update_now(&mut self) -> Vec<BoundEvent> {
        self.update(&TickContext::live())
    }

    fn queue_own_output(&mut self, ctx: &TickContext) {
        let produced = self.role.act(ctx);
        let gated = matches!(self.role, Role::Actor(_));
        for event in produced {
            let bound = BoundEvent::new(self.id, event);
            if !gated || self.should_propagate_event(&bound) {
                self.outgoing.push_back(bound);
            } else {
                self.handle_event(&bound);
            }
        }
    }

    fn pull_from_children(&mut self, ctx: &TickContext) {
        let order: Vec<EntityId> = self.children.iter().map(|c| c.id).collect();
        for child_id in order {
            let Some(child) = self.children.iter_mut().find(|c| c.id == child_id) else {
                continue;
            };
            for bound in child.pull(ctx) {
                if self.should_propagate_event(&bound) {
                    trace!(entity = %self.id, kind = %bound.kind(), "event propagates");
                    self.outgoing.push_back(bound);
                } else {
                    trace!(entity = %self.id, kind = %bound.kind(), "event stops here");
                    self.handle_event(&bound);
                }
            }
        }
    }

    /// Tick this entity on behalf of its parent and hand over what the
    /// drain policy allows. Held-back events return to the front of the
    /// queue, in order, for later ticks; past the backlog limit the newest
    /// are dropped.
    fn pull(&mut self, ctx: &TickContext) -> Vec<BoundEvent> {
        let mut produced = self.update(ctx);
        if ctx.drain_policy() == DrainPolicy::OnePerChild && produced.len() > 1 {
            let mut deferred = produced.split_off(1);
            let limit = ctx.max_backlog();
            if deferred.len() > limit {
                let dropped = deferred.len() - limit;
                deferred.truncate(limit);
                debug!(entity = %self.id, dropped, limit, "backlog full, dropping newest events");
            }
            for bound in deferred.into_iter().rev() {
                self.outgoing.push_front(bound);
            }
        }
        produced
    }

    /// Ids from this entity down to `id`, both ends included.
    pub(crate) fn path_to(&self, id: EntityId) -> Option<Vec<EntityId>> {
        if self.id == id {
            return Some(vec![self.id]);
        }
        self.children.iter().find_map(|c| {
            let mut path = c.path_to(id)?;
            path.insert(0, self.id);
            Some(path)
        })
    }

    pub(crate) fn children_mut(&mut self) -> &mut [Entity] {
        &mut self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::cell::RefCell;
    use std::rc::Rc;

    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    use crate::scripted::{Action, ActionResult, ActionSet, ScriptKeyPoint};

    #[derive(Debug)]
    struct Gate {
        open: bool,
    }

    impl Behavior for Gate {
        fn should_propagate_event(&self, _bound: &BoundEvent) -> bool {
            self.open
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[derive(Debug, Default)]
    struct SpeakOnce {
        ran_once: bool,
    }

    impl Behavior for SpeakOnce {
        fn act(&mut self, ctx: &TickContext) -> Vec<Event> {
            if self.ran_once {
                return Vec::new();
            }
            self.ran_once = true;
            vec![ctx.event(EventKind::SayAloud)]
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn ctx() -> TickContext {
        TickContext::live()
    }

    fn say_aloud(source: EntityId) -> BoundEvent {
        BoundEvent::new(source, Event::new(EventKind::SayAloud))
    }

    /// Records the source of every event of `kind` that reaches `entity`.
    fn record(entity: &mut Entity, kind: EventKind) -> Rc<RefCell<Vec<EntityId>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        entity.set_event_handler(kind, move |bound| {
            sink.borrow_mut().push(bound.source);
            Ok(())
        });
        seen
    }

    #[test]
    fn plain_entity_propagates_regardless_of_children() {
        let parent = Entity::plain()
            .with_child(Entity::custom(Gate { open: true }))
            .with_child(Entity::custom(Gate { open: false }));
        assert!(parent.should_propagate_event(&say_aloud(parent.id())));
    }

    #[test]
    fn childless_default_entity_yields_nothing() {
        let mut entity = Entity::plain();
        assert!(entity.update(&ctx()).is_empty());
    }

    #[test]
    fn quiet_children_yield_nothing() {
        let mut parent = Entity::plain().with_child(Entity::custom(Gate { open: true }));
        assert!(parent.update(&ctx()).is_empty());
    }

    #[test]
    fn child_event_is_sourced_from_child() {
        let child = Entity::custom(SpeakOnce::default());
        let child_id = child.id();
        let mut parent = Entity::plain().with_child(child);

        let events = parent.update(&ctx());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, child_id);
        assert_eq!(events[0].kind(), &EventKind::SayAloud);
        assert!(parent.update(&ctx()).is_empty());
    }

    #[test]
    fn own_act_yields_single_pair_and_drains_queue() {
        let mut entity = Entity::custom(SpeakOnce::default());
        let events = entity.update(&ctx());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, entity.id());
        assert_eq!(entity.pending_events(), 0);
    }

    #[test]
    fn emit_then_pop_batch() {
        let mut entity = Entity::plain();
        let event = Event::new(EventKind::SayAloud);
        entity.emit_event(event.clone());

        let batch = entity.pop_event_batch();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].event, event);
        assert_eq!(batch[0].source, entity.id());
        assert!(entity.pop_event_batch().is_empty());
    }

    #[test]
    fn own_queue_is_fifo() {
        let mut entity = Entity::plain();
        for tag in ["a", "b", "c"] {
            entity.emit_event(Event::new(EventKind::custom(tag)));
        }
        let kinds: Vec<String> = entity
            .update(&ctx())
            .iter()
            .map(|b| b.kind().to_string())
            .collect();
        assert_eq!(kinds, vec!["a", "b", "c"]);
    }

    #[test]
    fn handler_runs_for_matching_kind_only() {
        let mut entity = Entity::plain();
        let seen = record(&mut entity, EventKind::SayAloud);
        entity.handle_event(&say_aloud(entity.id()));
        entity.handle_event(&BoundEvent::new(entity.id(), Event::new(EventKind::Tick)));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn handle_event_broadcasts_to_children_in_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut parent = Entity::location(false);
        for name in ["first", "second"] {
            let mut child = Entity::plain().with_name(name);
            let sink = Rc::clone(&order);
            child.set_event_handler(EventKind::SayAloud, move |_| {
                sink.borrow_mut().push(name);
                Ok(())
            });
            parent.add_entity(child);
        }
        parent.handle_event(&say_aloud(parent.id()));
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn failing_handler_does_not_stop_broadcast() {
        let mut parent = Entity::plain();
        parent.set_event_handler(EventKind::SayAloud, |_| Err("bad handler".into()));
        let mut child = Entity::plain();
        let seen = record(&mut child, EventKind::SayAloud);
        parent.add_entity(child);

        let failures = parent.handle_event(&say_aloud(parent.id()));
        assert_eq!(failures, 1);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn set_handler_replaces_and_clear_is_idempotent() {
        let mut entity = Entity::plain();
        assert!(entity.set_event_handler(EventKind::Tick, |_| Ok(())).is_none());
        assert!(entity.set_event_handler(EventKind::Tick, |_| Ok(())).is_some());
        assert!(entity.has_handler(&EventKind::Tick));
        assert!(entity.clear_event_handler(&EventKind::Tick));
        assert!(!entity.has_handler(&EventKind::Tick));
        assert!(!entity.clear_event_handler(&EventKind::Tick));
    }

    #[test]
    fn add_and_remove_are_idempotent() {
        let mut parent = Entity::location(false);
        let child = Entity::plain();
        let id = child.id();
        assert!(parent.add_entity(child));
        assert_eq!(parent.children().len(), 1);

        let duplicate = parent.remove_entity(id).unwrap();
        assert!(parent.add_entity(duplicate));
        assert!(!parent.add_entity(Entity {
            id,
            ..Entity::plain()
        }));
        assert_eq!(parent.children().len(), 1);

        assert!(parent.remove_entity(id).is_some());
        assert!(parent.remove_entity(id).is_none());
        assert!(parent.children().is_empty());
    }

    #[test]
    fn find_by_id_searches_depth_first() {
        let grandchild = Entity::plain();
        let target = grandchild.id();
        let parent = Entity::plain().with_child(Entity::plain().with_child(grandchild));
        assert_eq!(parent.find_by_id(target).map(Entity::id), Some(target));
        assert_eq!(parent.find_by_id(parent.id()).map(Entity::id), Some(parent.id()));
        assert!(parent.find_by_id(EntityId::new()).is_none());
        assert!(parent.parent_of(target).is_some());
    }

    #[test]
    fn detach_reaches_nested_children() {
        let grandchild = Entity::plain();
        let target = grandchild.id();
        let mut parent = Entity::plain().with_child(Entity::plain().with_child(grandchild));
        assert_eq!(parent.detach(target).map(|e| e.id()), Some(target));
        assert!(parent.find_by_id(target).is_none());
    }

    #[test]
    fn descendants_are_depth_first_in_child_order() {
        let root = Entity::plain().with_name("root").with_child(
            Entity::plain()
                .with_name("a")
                .with_child(Entity::plain().with_name("a1")),
        );
        let root = root.with_child(Entity::plain().with_name("b"));
        let names: Vec<&str> = root.descendants().filter_map(Entity::name).collect();
        assert_eq!(names, vec!["root", "a", "a1", "b"]);
    }

    #[test]
    fn events_climb_through_propagating_parents() {
        let mut child = Entity::custom(Gate { open: false });
        let child_id = child.id();
        let event = Event::new(EventKind::SayAloud);
        child.emit_event(event.clone());
        let mut grandparent = Entity::plain().with_child(Entity::plain().with_child(child));

        let events = grandparent.update(&ctx());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, child_id);
        assert_eq!(events[0].event, event);
    }

    #[test]
    fn closed_parent_stops_event_and_broadcasts_down() {
        let mut child = Entity::plain();
        child.emit_event(Event::new(EventKind::SayAloud));
        let child_id = child.id();
        let mut sibling = Entity::plain();
        let seen = record(&mut sibling, EventKind::SayAloud);

        let parent = Entity::custom(Gate { open: false })
            .with_child(child)
            .with_child(sibling);
        let mut grandparent = Entity::plain().with_child(parent);

        assert!(grandparent.update(&ctx()).is_empty());
        assert_eq!(*seen.borrow(), vec![child_id]);
    }

    #[test]
    fn one_per_child_defers_the_rest() {
        let mut child = Entity::plain();
        for tag in ["a", "b", "c"] {
            child.emit_event(Event::new(EventKind::custom(tag)));
        }
        let mut parent = Entity::plain().with_child(child);

        let mut seen = Vec::new();
        for _ in 0..4 {
            let batch = parent.update(&ctx());
            assert!(batch.len() <= 1);
            seen.extend(batch.into_iter().map(|b| b.kind().to_string()));
        }
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[test]
    fn exhaustive_drain_takes_everything() {
        let mut child = Entity::plain();
        for tag in ["a", "b", "c"] {
            child.emit_event(Event::new(EventKind::custom(tag)));
        }
        let mut parent = Entity::plain().with_child(child);
        let ctx = ctx().with_drain_policy(DrainPolicy::Exhaustive);
        assert_eq!(parent.update(&ctx).len(), 3);
        assert_eq!(parent.children()[0].pending_events(), 0);
    }

    #[test]
    fn children_are_visited_in_insertion_order() {
        let mut parent = Entity::plain();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let child = Entity::custom(SpeakOnce::default());
            ids.push(child.id());
            parent.add_entity(child);
        }
        let sources: Vec<EntityId> = parent.update(&ctx()).iter().map(|b| b.source).collect();
        assert_eq!(sources, ids);
    }

    #[test]
    fn private_location_absorbs_child_events() {
        let mut location = Entity::location(true).with_child(Entity::custom(SpeakOnce::default()));
        let seen = record(&mut location, EventKind::SayAloud);
        assert!(location.update(&ctx()).is_empty());
        assert_eq!(seen.borrow().len(), 1);
    }

    #[derive(Debug)]
    struct Bell;

    fn ring(_bell: &mut Bell, _kp: &ScriptKeyPoint, ctx: &TickContext) -> ActionResult {
        Ok(vec![ctx.event(EventKind::custom("bell"))])
    }

    impl ActionSet for Bell {
        fn get_action(&self, _name: &str) -> Option<Action<Self>> {
            Some(ring)
        }
    }

    #[test]
    fn scripted_output_precedes_children() {
        let context = ctx();
        let scripted = ScriptedEntity::new(Bell)
            .with_script(vec![ScriptKeyPoint::new(context.now(), "ring")]);
        let mut entity = Entity::scripted(scripted).with_child(Entity::custom(SpeakOnce::default()));

        let kinds: Vec<String> = entity
            .update(&context)
            .iter()
            .map(|b| b.kind().to_string())
            .collect();
        assert_eq!(kinds, vec!["bell", "SAY_ALOUD"]);
    }

    #[test]
    fn queued_events_go_out_before_fresh_output() {
        let context = ctx();
        let scripted = ScriptedEntity::new(Bell)
            .with_script(vec![ScriptKeyPoint::new(context.now(), "ring")]);
        let mut entity = Entity::scripted(scripted);
        entity.emit_event(Event::new(EventKind::custom("queued")));

        let kinds: Vec<String> = entity
            .update(&context)
            .iter()
            .map(|b| b.kind().to_string())
            .collect();
        assert_eq!(kinds, vec!["queued", "bell"]);
    }

    #[test]
    fn update_now_fires_past_due_script_items() {
        let now = Utc::now();
        let scripted = ScriptedEntity::new(Bell).with_script(vec![
            ScriptKeyPoint::new(now - Duration::seconds(5), "ring"),
            ScriptKeyPoint::new(now + Duration::hours(1), "ring"),
        ]);
        let mut entity = Entity::scripted(scripted);

        let events = entity.update_now();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, entity.id());
        let remaining = entity.role().as_scripted().unwrap().script();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].timestamp > now);
    }

    /// Emits two events every tick, tagged with the round.
    #[derive(Debug, Default)]
    struct Pair {
        round: i64,
    }

    impl Behavior for Pair {
        fn act(&mut self, ctx: &TickContext) -> Vec<Event> {
            self.round += 1;
            vec![
                ctx.event(EventKind::custom("first")).with_context("round", self.round),
                ctx.event(EventKind::custom("second")).with_context("round", self.round),
            ]
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn tagged(bound: &BoundEvent) -> (String, i64) {
        let round = bound.event.get("round").and_then(|v| v.as_i64()).unwrap_or(-1);
        (bound.kind().to_string(), round)
    }

    #[test]
    fn held_back_actor_events_are_delivered_before_fresh_ones() {
        let actor = Entity::actor(Actor::default().with_behavior(Pair::default()));
        let mut parent = Entity::plain().with_child(actor);

        let delivered: Vec<(String, i64)> = (0..4)
            .flat_map(|_| parent.update(&ctx()))
            .map(|b| tagged(&b))
            .collect();
        assert_eq!(
            delivered,
            vec![
                ("first".to_string(), 1),
                ("second".to_string(), 1),
                ("first".to_string(), 2),
                ("second".to_string(), 2),
            ]
        );
    }

    #[test]
    fn backlog_stops_growing_at_the_limit() {
        let actor = Entity::actor(Actor::default().with_behavior(Pair::default()));
        let actor_id = actor.id();
        let mut parent = Entity::plain().with_child(actor);
        let ctx = ctx().with_max_backlog(3);

        for _ in 0..20 {
            assert_eq!(parent.update(&ctx).len(), 1);
        }
        assert_eq!(parent.find_by_id(actor_id).unwrap().pending_events(), 3);
    }

    #[test]
    fn zero_backlog_drops_the_excess() {
        let actor = Entity::actor(Actor::default().with_behavior(Pair::default()));
        let actor_id = actor.id();
        let mut parent = Entity::plain().with_child(actor);
        let ctx = ctx().with_max_backlog(0);

        let delivered: Vec<(String, i64)> = (0..3)
            .flat_map(|_| parent.update(&ctx))
            .map(|b| tagged(&b))
            .collect();
        assert_eq!(
            delivered,
            vec![
                ("first".to_string(), 1),
                ("first".to_string(), 2),
                ("first".to_string(), 3),
            ]
        );
        assert_eq!(parent.find_by_id(actor_id).unwrap().pending_events(), 0);
    }

    proptest! {
        #[test]
        fn should_propagate_is_pure(private in any::<bool>(), open in any::<bool>()) {
            let bound = say_aloud(EntityId::new());
            let location = Entity::location(private);
            let gate = Entity::custom(Gate { open });
            prop_assert_eq!(
                location.should_propagate_event(&bound),
                location.should_propagate_event(&bound)
            );
            prop_assert_eq!(location.should_propagate_event(&bound), !private);
            prop_assert_eq!(gate.should_propagate_event(&bound), open);
            prop_assert_eq!(
                gate.should_propagate_event(&bound),
                gate.should_propagate_event(&bound)
            );
        }
    }
}
