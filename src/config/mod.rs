//! Configuration Management
//!
//! Hierarchical resolution, lowest to highest priority:
//! 1. Built-in defaults
//! 2. Global config (~/.config/novelweave/config.toml)
//! 3. Project config (.novelweave/config.toml)
//! 4. Environment variables (NOVELWEAVE_*)
//! 5. CLI arguments

mod loader;
mod types;

pub use loader::{ConfigFormat, ConfigLoader};
pub use types::*;
