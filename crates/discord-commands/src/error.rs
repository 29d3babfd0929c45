//! Error types for discord-commands

use discord_types::CommandType;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for command sync and dispatch
#[derive(Debug, Error)]
pub enum Error {
    #[error("The client is not yet ready, connect to discord before fetching commands")]
    NotReady,

    #[error("Guild {0} unavailable")]
    GuildUnavailable(u64),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Guild resolution failed: {0}")]
    GuildResolution(anyhow::Error),

    #[error("Prefix resolution failed: {0}")]
    PrefixResolution(anyhow::Error),

    #[error("Handler error: {0}")]
    Handler(anyhow::Error),

    #[error("Guard error: {0}")]
    Guard(anyhow::Error),

    #[error("Plugin '{name}' failed to initialize: {error}")]
    Plugin { name: String, error: anyhow::Error },

    #[error("{kind} command '{name}' is declared more than once for {scope}")]
    AmbiguousDeclaration {
        name: String,
        kind: CommandType,
        scope: String,
    },

    #[error("Slash group '{0}' is used but never declared")]
    UnknownGroup(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
