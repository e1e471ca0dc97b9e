//! # hap-core
//!
//! Shared types for the HAP pairing engine: the error taxonomy used across
//! the codec, validator, and protocol crates, and the accessory error-code
//! enumeration surfaced to callers.

pub mod error;

pub use error::{Error, ErrorCode, Result};
