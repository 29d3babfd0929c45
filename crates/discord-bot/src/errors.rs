//! Discord-specific error handling for the bot.
//!
//! Converts serenity errors into structured `ErrorOutcome`s, logs them at
//! the level their outcome calls for, and turns them into the engine's
//! `Error::Platform`.

use std::time::Duration;

use discord_types::errors::{DiscordErrorCode, ErrorCategory};
use serenity::http::HttpError;
use tracing::{debug, error, warn};

/// A failed Discord API call, classified.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiFailure {
    /// What the bot was doing, e.g. `set guild commands 42`
    pub operation: String,
    pub code: DiscordErrorCode,
    pub category: ErrorCategory,
    pub message: String,
    pub raw_code: u32,
    pub http_status: u16,
    pub is_permanent: bool,
}

/// Result of handling a Discord API error.
#[derive(Debug)]
pub enum ErrorOutcome {
    /// Worth repeating after this duration (rate limit, overload).
    Retry(Duration, ApiFailure),
    /// Repeating the call cannot succeed.
    Permanent(ApiFailure),
    /// Non-permanent failure; log and continue.
    Transient(ApiFailure),
}

impl ErrorOutcome {
    pub fn failure(&self) -> &ApiFailure {
        match self {
            Self::Retry(_, failure) | Self::Permanent(failure) | Self::Transient(failure) => failure,
        }
    }
}

/// Classify a serenity `Error`.
pub fn classify(operation: &str, err: &serenity::Error) -> ErrorOutcome {
    match err {
        serenity::Error::Http(http_err) => classify_http(operation, http_err),
        _ => {
            debug!("Non-HTTP serenity error on '{}': {}", operation, err);
            ErrorOutcome::Transient(make_failure(
                operation,
                DiscordErrorCode::NetworkError,
                &err.to_string(),
                0,
                0,
            ))
        }
    }
}

/// Log a pre-classified `ErrorOutcome` at the appropriate level.
pub fn log_outcome(outcome: &ErrorOutcome) {
    match outcome {
        ErrorOutcome::Permanent(f) => {
            error!(
                status = f.http_status,
                code = f.raw_code,
                category = ?f.category,
                "{} [{:?}]: {}",
                f.operation,
                f.code,
                f.message
            );
        }
        ErrorOutcome::Transient(f) => {
            warn!(
                status = f.http_status,
                permanent = f.is_permanent,
                "{} [{:?}]: {}",
                f.operation,
                f.code,
                f.message
            );
        }
        ErrorOutcome::Retry(dur, f) => {
            warn!(status = f.http_status, "{}: {}, retry after {:?}", f.operation, f.message, dur);
        }
    }
}

/// Classify and log `err`, then wrap it for the engine.
pub fn platform_error(operation: &str, err: serenity::Error) -> discord_commands::Error {
    let outcome = classify(operation, &err);
    log_outcome(&outcome);
    let failure = outcome.failure();
    discord_commands::Error::Platform(format!("{}: {}", failure.operation, failure.message))
}

fn classify_http(operation: &str, http_err: &HttpError) -> ErrorOutcome {
    match http_err {
        HttpError::UnsuccessfulRequest(resp) => {
            let status = resp.status_code.as_u16();

            if status == 429 {
                let failure = make_failure(
                    operation,
                    DiscordErrorCode::RateLimited,
                    &resp.error.message,
                    0,
                    status,
                );
                return ErrorOutcome::Retry(Duration::from_secs(1), failure);
            }

            let raw_code = resp.error.code as u32;
            let code = DiscordErrorCode::from_raw(raw_code);
            let failure = make_failure(operation, code.clone(), &resp.error.message, raw_code, status);

            if code.is_permanent() {
                ErrorOutcome::Permanent(failure)
            } else if code.is_retryable() {
                ErrorOutcome::Retry(Duration::from_secs(5), failure)
            } else {
                ErrorOutcome::Transient(failure)
            }
        }

        // Request never got a Discord response
        _ => {
            debug!("Network-level HTTP error on '{}': {}", operation, http_err);
            ErrorOutcome::Transient(make_failure(
                operation,
                DiscordErrorCode::NetworkError,
                &http_err.to_string(),
                0,
                0,
            ))
        }
    }
}

fn make_failure(
    operation: &str,
    code: DiscordErrorCode,
    message: &str,
    raw_code: u32,
    http_status: u16,
) -> ApiFailure {
    ApiFailure {
        operation: operation.to_string(),
        is_permanent: code.is_permanent(),
        category: code.category(),
        code,
        message: message.to_string(),
        raw_code,
        http_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Serenity HTTP errors need a live response to construct; the wiremock
    // tests in platform_tests.rs cover that path end to end.

    #[test]
    fn test_make_failure_missing_access() {
        let f = make_failure(
            "set global commands",
            DiscordErrorCode::from_raw(50001),
            "Missing Access",
            50001,
            403,
        );
        assert_eq!(f.operation, "set global commands");
        assert_eq!(f.code, DiscordErrorCode::MissingAccess);
        assert_eq!(f.category, ErrorCategory::PermissionDenied);
        assert_eq!(f.raw_code, 50001);
        assert_eq!(f.http_status, 403);
        assert!(f.is_permanent);
    }

    #[test]
    fn test_make_failure_max_commands_is_permanent() {
        let f = make_failure(
            "set guild commands 5",
            DiscordErrorCode::from_raw(30032),
            "Maximum number of application commands reached",
            30032,
            400,
        );
        assert_eq!(f.category, ErrorCategory::InvalidInput);
        assert!(f.is_permanent);
    }

    #[test]
    fn test_make_failure_network_error() {
        let f = make_failure("fetch user 5", DiscordErrorCode::NetworkError, "connection reset", 0, 0);
        assert_eq!(f.category, ErrorCategory::Network);
        assert!(!f.is_permanent);
    }

    #[test]
    fn test_non_http_error_is_transient() {
        let err = serenity::Error::Other("shard manager gone");
        let outcome = classify("login", &err);
        assert!(matches!(outcome, ErrorOutcome::Transient(_)));
        assert_eq!(outcome.failure().code, DiscordErrorCode::NetworkError);
    }

    #[test]
    fn test_platform_error_message_names_operation() {
        let err = platform_error("login", serenity::Error::Other("boom"));
        assert!(matches!(err, discord_commands::Error::Platform(ref m) if m.starts_with("login: ")));
    }
}
