//! Subcommand implementations

pub mod clock;
pub mod devices;
pub mod history;
pub mod locations;
pub mod status;
