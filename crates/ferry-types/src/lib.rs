//! Foundation types for ferry.
//!
//! Shared by the navigation engine and its hosts: the [`Location`]
//! identifier, per-frame configuration, and the error taxonomy.

pub mod config;
pub mod error;
pub mod location;

pub use config::FrameConfig;
pub use error::{FerryError, Result};
pub use location::Location;
