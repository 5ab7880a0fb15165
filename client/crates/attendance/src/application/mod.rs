//! Application Layer - Use Cases
//!
//! This layer orchestrates domain logic and infrastructure:
//! position acquisition, credential ceremonies, verification gates and the
//! attendance state machine.

pub mod attendance;
pub mod catalog;
pub mod config;
pub mod credential;
pub mod gate;
pub mod position;
pub mod session;
pub mod sign_in;
