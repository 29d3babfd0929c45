//! Fixtures shared by the client-level tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use discord_types::{
    CommandInteraction, CommandType, DiscordMessage, DiscordUser, Emoji, InteractionOption, Reaction,
};

use crate::client::{ClientOptions, CommandClient};
use crate::handler::{handler, Guard, Handler, Invocation};
use crate::mock::MockPlatform;
use crate::registry::Registry;

pub fn user(id: u64) -> DiscordUser {
    DiscordUser {
        id,
        username: format!("user{}", id),
        global_name: None,
        bot: false,
    }
}

pub fn message(guild_id: Option<u64>, content: &str) -> DiscordMessage {
    DiscordMessage {
        id: 500,
        channel_id: 600,
        guild_id,
        author: user(5),
        content: content.to_string(),
    }
}

pub fn slash(name: &str, guild_id: Option<u64>, options: Vec<InteractionOption>) -> CommandInteraction {
    CommandInteraction {
        id: 1,
        token: "token".to_string(),
        command_id: 2,
        command_name: name.to_string(),
        command_type: CommandType::ChatInput,
        guild_id,
        channel_id: 600,
        user: user(5),
        options,
        target_id: None,
    }
}

pub fn reaction(emoji: Emoji, guild_id: Option<u64>, partial: bool) -> Reaction {
    Reaction {
        channel_id: 600,
        message_id: 700,
        guild_id,
        emoji,
        count: None,
        partial,
    }
}

/// Handler that counts its calls and returns `label`.
pub fn counted(label: &'static str, calls: Arc<AtomicUsize>) -> Handler {
    handler(move |_| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!(label))
        }
    })
}

/// Handler that returns `label`.
pub fn returns(label: &'static str) -> Handler {
    handler(move |_| async move { Ok(serde_json::json!(label)) })
}

/// Handler echoing back what it was invoked with.
pub fn describe() -> Handler {
    handler(|invocation| async move {
        Ok(match invocation {
            Invocation::Command(i) => serde_json::json!({"command": i.command_name}),
            Invocation::Autocomplete(i) => serde_json::json!({"autocomplete": i.command_name}),
            Invocation::Component(c) => serde_json::json!({"component": c.custom_id}),
            Invocation::Modal(m) => serde_json::json!({"modal": m.custom_id}),
            Invocation::Reaction { reaction, user } => serde_json::json!({
                "reaction": reaction.emoji.name,
                "partial": reaction.partial,
                "user_partial": user.is_partial(),
            }),
            Invocation::Text(t) => serde_json::json!({
                "text": t.name,
                "prefix": t.prefix,
                "args": t.args,
            }),
            Invocation::Event { name, .. } => serde_json::json!({"event": name}),
        })
    })
}

pub struct Deny;

#[async_trait]
impl Guard for Deny {
    async fn check(&self, _invocation: &Invocation) -> anyhow::Result<bool> {
        Ok(false)
    }
}

pub async fn built(platform: MockPlatform, registry: Registry, options: ClientOptions) -> CommandClient<MockPlatform> {
    let client = CommandClient::new(platform, registry, options);
    client.build().await.unwrap();
    client
}
