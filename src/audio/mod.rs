//! Audio capture: device discovery, native streams, and the loudness envelope.

pub mod backend;
pub mod cpal_backend;
pub mod device;
pub mod engine;
pub mod peak;
pub mod registry;
pub mod routing;
pub mod session;

#[cfg(test)]
pub mod mock;

pub use engine::AudioEngine;
