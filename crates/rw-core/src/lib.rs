//! Core value types for Relative World: identifiers, events, and time helpers.
//!
//! This crate holds the plain data that flows through the simulation engine.
//! It knows nothing about entity trees or ticks; see `rw-simulation` for that.

/// Events and events bound to their source entity.
pub mod event;
/// Entity identifiers.
pub mod id;
/// Wall-clock and relative-time helpers.
pub mod time;
/// Payload values carried in event context maps.
pub mod value;

/// Re-export event types.
pub use event::{BoundEvent, Event, EventKind};
/// Re-export the entity identifier.
pub use id::EntityId;
/// Re-export payload values.
pub use value::Value;
