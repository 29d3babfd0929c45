//! Serenity event handler: converts gateway events and forwards them to the
//! dispatcher over a channel.

use discord_types::{DiscordMessage, Interaction, Reaction, ReactionUser};
use serenity::async_trait;
use serenity::model::application::Interaction as SerenityInteraction;
use serenity::model::channel::{Message, Reaction as SerenityReaction};
use serenity::model::gateway::Ready;
use serenity::model::guild::Guild;
use serenity::model::id::GuildId;
use serenity::prelude::*;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::convert;

/// A gateway event, already converted to engine types.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Ready { username: String },
    /// Every guild from READY is in the cache
    CacheReady,
    Interaction(Interaction),
    Message(DiscordMessage),
    ReactionAdd { reaction: Reaction, user: ReactionUser },
    /// Fanned out to the declared event listeners under `name`
    Raw {
        name: &'static str,
        payload: serde_json::Value,
    },
}

pub struct Forwarder {
    events: mpsc::UnboundedSender<GatewayEvent>,
}

impl Forwarder {
    pub fn new(events: mpsc::UnboundedSender<GatewayEvent>) -> Self {
        Self { events }
    }

    fn forward(&self, event: GatewayEvent) {
        if self.events.send(event).is_err() {
            warn!("Dispatcher is gone, dropping gateway event");
        }
    }

    fn raw<T: serde::Serialize>(&self, name: &'static str, value: &T) {
        let payload = serde_json::to_value(value).unwrap_or_default();
        self.forward(GatewayEvent::Raw { name, payload });
    }
}

#[async_trait]
impl EventHandler for Forwarder {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            "Discord bot connected as {}#{:04}",
            ready.user.name,
            ready.user.discriminator.map_or(0, |d| d.get())
        );
        // Command sync needs the application id on the HTTP client.
        ctx.http.set_application_id(ready.application.id);

        self.forward(GatewayEvent::Ready {
            username: ready.user.name.clone(),
        });
        self.raw("ready", &convert::user(&ready.user));
    }

    async fn cache_ready(&self, _ctx: Context, guilds: Vec<GuildId>) {
        debug!(guilds = guilds.len(), "Guild cache ready");
        self.forward(GatewayEvent::CacheReady);
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let message = convert::message(&msg);
        self.raw("messageCreate", &message);
        self.forward(GatewayEvent::Message(message));
    }

    async fn interaction_create(&self, _ctx: Context, interaction: SerenityInteraction) {
        let Some(converted) = convert::interaction(&interaction) else {
            debug!(kind = ?interaction.kind(), "Ignoring interaction");
            return;
        };
        self.raw("interactionCreate", &converted);
        self.forward(GatewayEvent::Interaction(converted));
    }

    async fn reaction_add(&self, _ctx: Context, add_reaction: SerenityReaction) {
        let Some((reaction, user)) = convert::reaction(&add_reaction) else {
            debug!(message_id = %add_reaction.message_id, "Reaction without a user, skipping");
            return;
        };
        self.raw("messageReactionAdd", &reaction);
        self.forward(GatewayEvent::ReactionAdd { reaction, user });
    }

    async fn guild_create(&self, _ctx: Context, guild: Guild, _is_new: Option<bool>) {
        self.forward(GatewayEvent::Raw {
            name: "guildCreate",
            payload: serde_json::json!({ "id": guild.id.get(), "name": guild.name }),
        });
    }
}
