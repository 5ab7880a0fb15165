//! Infrastructure Layer
//!
//! REST adapter for the attendance backend, its wire DTOs, and static
//! device bindings.

pub mod device;
pub mod dto;
pub mod rest;
