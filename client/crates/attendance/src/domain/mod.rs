//! Domain Layer
//!
//! Contains business logic, entities, value objects, repository traits and
//! the device capability ports.

pub mod ceremony;
pub mod device;
pub mod entities;
pub mod repository;
pub mod services;
pub mod value_objects;
