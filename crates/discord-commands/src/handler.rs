//! Handler, guard and plugin contracts, and the execute contract every
//! dispatcher funnels through.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use discord_types::{
    CommandInteraction, ComponentInteraction, ModalSubmit, Reaction, ReactionUser,
};
use futures::future::BoxFuture;
use tracing::debug;

use crate::error::{Error, Result};
use crate::text::TextCommandMessage;

/// Whatever a handler chooses to return. Dispatchers pass it through untouched.
pub type HandlerOutput = serde_json::Value;

pub type HandlerResult = anyhow::Result<HandlerOutput>;

pub type Handler = Arc<dyn Fn(Invocation) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

pub type AutocompleteHandler =
    Arc<dyn Fn(CommandInteraction) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wrap an async closure as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Invocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |invocation: Invocation| -> BoxFuture<'static, HandlerResult> {
        Box::pin(f(invocation))
    })
}

/// Wrap an async closure as an [`AutocompleteHandler`].
pub fn autocomplete<F, Fut>(f: F) -> AutocompleteHandler
where
    F: Fn(CommandInteraction) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |interaction: CommandInteraction| -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(f(interaction))
    })
}

/// What a handler is being invoked for.
#[derive(Debug, Clone)]
pub enum Invocation {
    /// Slash or context-menu command
    Command(CommandInteraction),
    /// Autocomplete on an option without its own autocomplete handler
    Autocomplete(CommandInteraction),
    Component(ComponentInteraction),
    Modal(ModalSubmit),
    Reaction {
        reaction: Reaction,
        user: ReactionUser,
    },
    Text(TextCommandMessage),
    Event {
        name: String,
        payload: serde_json::Value,
    },
}

impl Invocation {
    pub fn guild_id(&self) -> Option<u64> {
        match self {
            Self::Command(i) | Self::Autocomplete(i) => i.guild_id,
            Self::Component(i) => i.guild_id,
            Self::Modal(m) => m.guild_id,
            Self::Reaction { reaction, .. } => reaction.guild_id,
            Self::Text(t) => t.message.guild_id,
            Self::Event { .. } => None,
        }
    }

    /// Id of the user who triggered the invocation, when there is one.
    pub fn user_id(&self) -> Option<u64> {
        match self {
            Self::Command(i) | Self::Autocomplete(i) => Some(i.user.id),
            Self::Component(i) => Some(i.user.id),
            Self::Modal(m) => Some(m.user.id),
            Self::Reaction { user, .. } => Some(user.id),
            Self::Text(t) => Some(t.message.author.id),
            Self::Event { .. } => None,
        }
    }
}

/// Pre-execution check. Returning `false` stops the chain and the handler
/// is not called.
#[async_trait]
pub trait Guard: Send + Sync {
    async fn check(&self, invocation: &Invocation) -> anyhow::Result<bool>;
}

pub type GuardRef = Arc<dyn Guard>;

/// Extension loaded once before the registry is built.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    async fn init(&self) -> anyhow::Result<()>;
}

/// Run the client-wide guards, then the declaration's own guards, then the
/// handler. `Ok(None)` means a guard stopped the chain.
pub async fn execute(
    global: &[GuardRef],
    local: &[GuardRef],
    handler: &Handler,
    invocation: Invocation,
) -> Result<Option<HandlerOutput>> {
    for guard in global.iter().chain(local) {
        if !guard.check(&invocation).await.map_err(Error::Guard)? {
            debug!(guild_id = ?invocation.guild_id(), "Guard stopped handler execution");
            return Ok(None);
        }
    }

    handler(invocation).await.map(Some).map_err(Error::Handler)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Allow(bool, Arc<AtomicUsize>);

    #[async_trait]
    impl Guard for Allow {
        async fn check(&self, _invocation: &Invocation) -> anyhow::Result<bool> {
            self.1.fetch_add(1, Ordering::SeqCst);
            Ok(self.0)
        }
    }

    struct Failing;

    #[async_trait]
    impl Guard for Failing {
        async fn check(&self, _invocation: &Invocation) -> anyhow::Result<bool> {
            anyhow::bail!("permission lookup failed")
        }
    }

    fn event() -> Invocation {
        Invocation::Event {
            name: "ready".to_string(),
            payload: serde_json::Value::Null,
        }
    }

    fn echo() -> Handler {
        handler(|invocation| async move {
            match invocation {
                Invocation::Event { name, .. } => Ok(serde_json::json!(name)),
                _ => Ok(serde_json::Value::Null),
            }
        })
    }

    #[tokio::test]
    async fn test_execute_without_guards_returns_handler_output() {
        let out = execute(&[], &[], &echo(), event()).await.unwrap();
        assert_eq!(out, Some(serde_json::json!("ready")));
    }

    #[tokio::test]
    async fn test_rejecting_guard_stops_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let global: Vec<GuardRef> = vec![Arc::new(Allow(false, calls.clone()))];
        let local: Vec<GuardRef> = vec![Arc::new(Allow(true, calls.clone()))];

        let out = execute(&global, &local, &echo(), event()).await.unwrap();
        assert_eq!(out, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_guards_run_global_then_local() {
        let calls = Arc::new(AtomicUsize::new(0));
        let global: Vec<GuardRef> = vec![Arc::new(Allow(true, calls.clone()))];
        let local: Vec<GuardRef> = vec![Arc::new(Allow(true, calls.clone()))];

        let out = execute(&global, &local, &echo(), event()).await.unwrap();
        assert!(out.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_guard_error_is_wrapped() {
        let global: Vec<GuardRef> = vec![Arc::new(Failing)];
        let err = execute(&global, &[], &echo(), event()).await.unwrap_err();
        assert!(matches!(err, Error::Guard(_)));
    }

    #[tokio::test]
    async fn test_handler_error_is_wrapped() {
        let failing = handler(|_| async { anyhow::bail!("boom") });
        let err = execute(&[], &[], &failing, event()).await.unwrap_err();
        assert!(matches!(err, Error::Handler(_)));
        assert_eq!(err.to_string(), "Handler error: boom");
    }
}
