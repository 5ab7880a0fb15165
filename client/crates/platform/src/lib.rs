//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Binary/text codec for challenge-response payloads (Base64)
//! - SHA-256 digests for log correlation
//! - Bearer token and sign-in secret handling (zeroized)
//! - HTTP client construction for the attendance backend

pub mod crypto;
pub mod transport;
pub mod secret;
