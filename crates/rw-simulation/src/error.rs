use rw_core::EntityId;

/// Alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;

/// Error returned by event handlers and script actions.
///
/// These failures are recovered inside the tick: they are logged and the
/// engine moves on to the next handler or script item.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Alias for the return type of an event handler.
pub type HandlerResult = Result<(), HandlerError>;

/// Errors reported to the caller of a world operation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A location id that is not in the world's registry.
    #[error("invalid reference: {0} is not a registered location")]
    InvalidReference(EntityId),

    /// The entity does not exist in the world's tree.
    #[error("entity not found in world: {0}")]
    EntityNotFound(EntityId),

    /// A location operation was given an entity without a location role.
    #[error("entity {0} is not a location")]
    NotALocation(EntityId),

    /// An actor operation was given an entity without an actor role.
    #[error("entity {0} is not an actor")]
    NotAnActor(EntityId),

    /// Attaching the entity would make it its own descendant.
    #[error("moving {entity} under {target} would create a cycle")]
    WouldCycle {
        /// The entity being moved.
        entity: EntityId,
        /// The requested new parent, which lives inside the moved subtree.
        target: EntityId,
    },

    /// The world's root cannot be removed from its own tree.
    #[error("the world root cannot be removed")]
    RootRemoval,

    /// The simulated time for this tick is outside the representable range.
    #[error("simulated clock overflow after {elapsed_ticks} ticks")]
    ClockOverflow {
        /// The tick counter at the time of the failure.
        elapsed_ticks: u64,
    },
}
