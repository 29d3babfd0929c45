//! Commands this bot declares, and the Discord responses they send.

use std::sync::Arc;

use anyhow::anyhow;
use discord_commands::{
    autocomplete, handler, DeclaredCommand, DeclaredComponent, DeclaredEvent, DeclaredOption,
    DeclaredReaction, DeclaredTextCommand, GroupDeclaration, Handler, HandlerOutput, Invocation, Registry,
    TextOptionDecl, TextOptionType,
};
use discord_types::OptionType;
use serenity::http::Http;
use serenity::model::id::{ChannelId, InteractionId};
use tracing::info;

const ECHO_SUGGESTIONS: &[&str] = &["hello", "hello world", "help", "ping", "pong"];

/// Sends handler responses through the REST API.
#[derive(Clone)]
pub struct Responder {
    http: Arc<Http>,
}

impl Responder {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    /// `CHANNEL_MESSAGE_WITH_SOURCE` response to an interaction.
    pub async fn respond(&self, id: u64, token: &str, content: &str) -> anyhow::Result<HandlerOutput> {
        let body = serde_json::json!({ "type": 4, "data": { "content": content } });
        self.http
            .create_interaction_response(InteractionId::new(id), token, &body, Vec::new())
            .await?;
        Ok(serde_json::json!({ "responded": content }))
    }

    /// `APPLICATION_COMMAND_AUTOCOMPLETE_RESULT` with name = value choices.
    pub async fn suggest(&self, id: u64, token: &str, choices: &[&str]) -> anyhow::Result<()> {
        let choices: Vec<_> = choices
            .iter()
            .map(|c| serde_json::json!({ "name": c, "value": c }))
            .collect();
        let body = serde_json::json!({ "type": 8, "data": { "choices": choices } });
        self.http
            .create_interaction_response(InteractionId::new(id), token, &body, Vec::new())
            .await?;
        Ok(())
    }

    pub async fn say(&self, channel_id: u64, content: &str) -> anyhow::Result<HandlerOutput> {
        ChannelId::new(channel_id).say(&*self.http, content).await?;
        Ok(serde_json::json!({ "said": content }))
    }
}

fn unexpected(invocation: &Invocation) -> anyhow::Result<HandlerOutput> {
    Err(anyhow!("unexpected invocation: {:?}", invocation))
}

fn ping(responder: &Responder) -> Handler {
    let responder = responder.clone();
    handler(move |invocation| {
        let responder = responder.clone();
        async move {
            match &invocation {
                Invocation::Command(i) => responder.respond(i.id, &i.token, "pong").await,
                Invocation::Text(t) => responder.say(t.message.channel_id, "pong").await,
                other => unexpected(other),
            }
        }
    })
}

fn echo(responder: &Responder) -> Handler {
    let responder = responder.clone();
    handler(move |invocation| {
        let responder = responder.clone();
        async move {
            match &invocation {
                Invocation::Command(i) => {
                    let text = i.option("text").and_then(|v| v.as_str()).unwrap_or_default();
                    responder.respond(i.id, &i.token, text).await
                }
                Invocation::Text(t) => responder.say(t.message.channel_id, &t.args).await,
                other => unexpected(other),
            }
        }
    })
}

fn inspect(responder: &Responder) -> Handler {
    let responder = responder.clone();
    handler(move |invocation| {
        let responder = responder.clone();
        async move {
            match &invocation {
                Invocation::Command(i) => {
                    let target = i.target_id.map_or_else(|| "nobody".to_string(), |id| format!("<@{}>", id));
                    responder.respond(i.id, &i.token, &format!("Looking at {}", target)).await
                }
                other => unexpected(other),
            }
        }
    })
}

fn acknowledge(responder: &Responder) -> Handler {
    let responder = responder.clone();
    handler(move |invocation| {
        let responder = responder.clone();
        async move {
            match &invocation {
                Invocation::Component(c) => responder.respond(c.id, &c.token, "Acknowledged").await,
                other => unexpected(other),
            }
        }
    })
}

fn pinned(responder: &Responder) -> Handler {
    let responder = responder.clone();
    handler(move |invocation| {
        let responder = responder.clone();
        async move {
            match &invocation {
                Invocation::Reaction { reaction, user } => {
                    responder
                        .say(reaction.channel_id, &format!("<@{}> pinned message {}", user.id, reaction.message_id))
                        .await
                }
                other => unexpected(other),
            }
        }
    })
}

fn echo_text_option(responder: &Responder) -> DeclaredOption {
    let responder = responder.clone();
    DeclaredOption::new(OptionType::String, "text", "What to repeat")
        .required()
        .with_autocomplete(autocomplete(move |interaction| {
            let responder = responder.clone();
            async move {
                let typed = interaction
                    .focused_option()
                    .and_then(|o| o.value.as_ref())
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_lowercase();
                let choices: Vec<&str> = ECHO_SUGGESTIONS
                    .iter()
                    .copied()
                    .filter(|s| s.starts_with(&typed))
                    .collect();
                responder.suggest(interaction.id, &interaction.token, &choices).await
            }
        }))
}

/// Every declaration the bot runs with.
pub fn registry(responder: Responder) -> Registry {
    Registry::new()
        .command(DeclaredCommand::slash("ping", "Check that the bot is alive").with_handler(ping(&responder)))
        .group(GroupDeclaration::new("admin", "Administration").default_member_permissions("8"))
        .command(
            DeclaredCommand::slash("echo", "Repeat text back")
                .in_group("admin")
                .with_option(echo_text_option(&responder))
                .with_handler(echo(&responder)),
        )
        .command(DeclaredCommand::user("Inspect").with_handler(inspect(&responder)))
        .button(DeclaredComponent::exact("demo-ack", acknowledge(&responder)))
        .reaction(DeclaredReaction::new("📌", pinned(&responder)).remove_after().guild_only())
        .text_command(
            DeclaredTextCommand::new("ping", ping(&responder))
                .with_description("Check that the bot is alive")
                .with_alias("p"),
        )
        .text_command(
            DeclaredTextCommand::new("echo", echo(&responder))
                .with_description("Repeat text back")
                .with_option(TextOptionDecl::new(TextOptionType::String, "text", "What to repeat")),
        )
        .event(
            DeclaredEvent::once(
                "ready",
                handler(|invocation| async move {
                    if let Invocation::Event { payload, .. } = &invocation {
                        info!(user = %payload["username"], "Declarations are live");
                    }
                    Ok(serde_json::Value::Null)
                }),
            )
            .with_label("announce-ready"),
        )
}
