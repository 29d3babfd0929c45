//! Shared types for Discord application command handling

pub mod commands;
pub mod errors;
pub mod events;
pub mod types;

pub use commands::*;
pub use events::*;
pub use types::*;
