//! Discord API error classification for command registration and dispatch.
//!
//! Only the JSON error codes a command sync or a handler side effect can
//! realistically hit are named; everything else is [`DiscordErrorCode::Unknown`].

use serde::{Deserialize, Serialize};

/// High-level category of a Discord API error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Rate limit hit; must wait before retrying.
    RateLimit,
    /// Guild, application, command or message not found.
    NotFound,
    /// The bot lacks the scope or permission for the call.
    PermissionDenied,
    /// The command payload was rejected.
    InvalidInput,
    /// Network or I/O error (transient).
    Network,
    /// Unknown or uncategorised error.
    Unknown,
}

/// Discord JSON error codes relevant to application command handling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscordErrorCode {
    /// 10002: Unknown application.
    UnknownApplication,
    /// 10004: Unknown guild.
    UnknownGuild,
    /// 10008: Unknown message.
    UnknownMessage,
    /// 10013: Unknown user.
    UnknownUser,
    /// 10014: Unknown emoji.
    UnknownEmoji,
    /// 10062: Unknown interaction.
    UnknownInteraction,
    /// 10063: Unknown application command.
    UnknownApplicationCommand,
    /// 30032: Maximum number of application commands reached.
    MaxApplicationCommands,
    /// 50001: Missing access (usually the `applications.commands` scope).
    MissingAccess,
    /// 50013: Missing permissions.
    MissingPermissions,
    /// 50035: Invalid form body.
    InvalidFormBody,
    /// 50014 / 40001: Invalid token.
    InvalidToken,
    /// HTTP 429.
    RateLimited,
    /// 130000: API resource overloaded.
    ApiOverloaded,
    /// Request never reached Discord.
    NetworkError,
    Unknown,
}

impl DiscordErrorCode {
    /// Derive the code from a raw Discord JSON error code integer.
    pub fn from_raw(code: u32) -> Self {
        match code {
            10002 => Self::UnknownApplication,
            10004 => Self::UnknownGuild,
            10008 => Self::UnknownMessage,
            10013 => Self::UnknownUser,
            10014 => Self::UnknownEmoji,
            10062 => Self::UnknownInteraction,
            10063 => Self::UnknownApplicationCommand,
            30032 => Self::MaxApplicationCommands,
            40001 | 50014 => Self::InvalidToken,
            50001 => Self::MissingAccess,
            50013 => Self::MissingPermissions,
            50035 => Self::InvalidFormBody,
            130000 => Self::ApiOverloaded,
            _ => Self::Unknown,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownApplication
            | Self::UnknownGuild
            | Self::UnknownMessage
            | Self::UnknownUser
            | Self::UnknownEmoji
            | Self::UnknownInteraction
            | Self::UnknownApplicationCommand => ErrorCategory::NotFound,

            Self::MissingAccess | Self::MissingPermissions | Self::InvalidToken => {
                ErrorCategory::PermissionDenied
            }

            Self::MaxApplicationCommands | Self::InvalidFormBody => ErrorCategory::InvalidInput,

            Self::RateLimited => ErrorCategory::RateLimit,
            Self::NetworkError => ErrorCategory::Network,
            Self::ApiOverloaded | Self::Unknown => ErrorCategory::Unknown,
        }
    }

    /// True if repeating the same call cannot succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::NotFound | ErrorCategory::PermissionDenied | ErrorCategory::InvalidInput
        )
    }

    /// True if retrying after a delay is worthwhile.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::NetworkError | Self::ApiOverloaded
        )
    }
}
