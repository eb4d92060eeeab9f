use rw_core::BoundEvent;

/// A place in the world and a visibility boundary for events.
///
/// A private location is an event horizon: events coming up from its subtree
/// are broadcast to its own children but never reach its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Whether events stop here instead of continuing upward.
    pub private: bool,
}

impl Default for Location {
    fn default() -> Self {
        Self { private: true }
    }
}

impl Location {
    /// Create a location with the given privacy.
    pub fn new(private: bool) -> Self {
        Self { private }
    }

    /// A location that lets events continue to its parent.
    pub fn public() -> Self {
        Self::new(false)
    }

    /// Private locations never propagate; public ones always do.
    pub fn should_propagate_event(&self, _bound: &BoundEvent) -> bool {
        !self.private
    }
}
