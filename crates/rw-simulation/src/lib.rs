//! Tick-based entity tree and event propagation engine for Relative World.
//!
//! A [`World`] owns a tree of [`Entity`] nodes. Each [`World::tick`] freezes
//! the simulated clock, lets every entity act, and moves the resulting events
//! up the tree until a boundary (such as a private [`Location`]) stops them,
//! at which point they are broadcast down that boundary's subtree.

/// Actors: entities with per-tick behaviour and a place in the world.
pub mod actor;
/// Pluggable per-entity behaviour.
pub mod behavior;
/// Simulation clock mapping ticks to simulated time.
pub mod clock;
/// Configuration types for a world.
pub mod config;
/// The context handed to entities during a tick.
pub mod context;
/// The entity tree and its propagation engine.
pub mod entity;
/// Error types for the simulation crate.
pub mod error;
/// Locations: visibility boundaries for events.
pub mod location;
/// Scripted entities: timestamp-triggered action queues.
pub mod scripted;
/// The root world: clock, location registry, and tick driver.
pub mod world;

/// Re-export of [`actor::Actor`].
pub use actor::Actor;
/// Re-export of [`behavior::Behavior`].
pub use behavior::Behavior;
/// Re-export of [`clock::SimClock`].
pub use clock::SimClock;
/// Re-exports of [`config::SimConfig`], [`config::DrainPolicy`], and the default backlog bound.
pub use config::{DEFAULT_MAX_BACKLOG, DrainPolicy, SimConfig};
/// Re-export of [`context::TickContext`].
pub use context::TickContext;
/// Re-exports of [`entity::Entity`], [`entity::EventHandler`], and [`entity::Role`].
pub use entity::{Entity, EventHandler, Role};
/// Re-exports of the error types.
pub use error::{HandlerError, HandlerResult, SimError, SimResult};
/// Re-export of [`location::Location`].
pub use location::Location;
/// Re-exports of the scripting types.
pub use scripted::{Action, ActionResult, ActionSet, NoActions, ScriptKeyPoint, ScriptedEntity};
/// Re-export of [`world::World`].
pub use world::World;

/// Re-exports of the core value types the engine traffics in.
pub use rw_core::{BoundEvent, EntityId, Event, EventKind, Value};
