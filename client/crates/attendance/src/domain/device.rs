//! Device Location Capability
//!
//! The platform's callback-style location API is modelled as an awaitable
//! request returning a typed result. Bindings implement [`PositionSource`].

use std::time::Duration;

use crate::domain::value_objects::Position;
use crate::error::LocationError;

/// Parameters for a single location request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the device may return; zero forces a fresh fix
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
            maximum_age: Duration::ZERO,
        }
    }
}

/// Device location capability
#[trait_variant::make(PositionSource: Send)]
pub trait LocalPositionSource {
    /// Whether the device has a location capability at all
    fn is_available(&self) -> bool;

    /// Request one fix. Bindings may ignore `timeout`; the caller enforces it.
    async fn current_position(&self, options: PositionOptions) -> Result<Position, LocationError>;
}
