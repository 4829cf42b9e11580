//! # qmap Common Library
//!
//! Shared code for the qmap services:
//! - Error types
//! - Event types (QmapEvent enum) and the EventBus
//! - Configuration and data folder resolution

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
