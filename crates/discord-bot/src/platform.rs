//! `Platform` over serenity's HTTP client and gateway cache

#[cfg(test)]
#[path = "platform_tests.rs"]
mod platform_tests;

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use discord_commands::{Error, Platform, Result};
use discord_types::{CommandDefinition, DiscordMessage, DiscordUser, Reaction, RemoteCommand};
use serenity::builder::CreateMessage;
use serenity::cache::Cache;
use serenity::http::Http;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use tracing::debug;

use crate::convert;
use crate::errors::platform_error;

pub struct SerenityPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
    username: RwLock<Option<String>>,
}

impl SerenityPlatform {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self {
            http,
            cache,
            username: RwLock::new(None),
        }
    }

    fn set_username(&self, username: String) {
        *self.username.write().unwrap_or_else(PoisonError::into_inner) = Some(username);
    }

    fn remote(commands: Vec<serenity::model::application::Command>) -> Result<Vec<RemoteCommand>> {
        commands
            .iter()
            .map(|c| convert::remote_command(c).map_err(Error::from))
            .collect()
    }
}

#[async_trait]
impl Platform for SerenityPlatform {
    fn application_ready(&self) -> bool {
        self.http.application_id().is_some()
    }

    fn bot_username(&self) -> Option<String> {
        self.username.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn cached_guild_ids(&self) -> Vec<u64> {
        self.cache.guilds().into_iter().map(|g| g.get()).collect()
    }

    /// The token is already bound to the HTTP client; this checks it by
    /// fetching the current user.
    async fn login(&self, _token: &str) -> Result<()> {
        let me = self
            .http
            .get_current_user()
            .await
            .map_err(|e| platform_error("login", e))?;
        debug!(username = %me.name, "Token accepted");
        self.set_username(me.name.clone());
        Ok(())
    }

    // Localized names and descriptions are only returned on request, and
    // the diff compares them.
    async fn fetch_global_commands(&self) -> Result<Vec<RemoteCommand>> {
        let commands = self
            .http
            .get_global_commands_with_localizations()
            .await
            .map_err(|e| platform_error("fetch global commands", e))?;
        Self::remote(commands)
    }

    async fn fetch_guild_commands(&self, guild_id: u64) -> Result<Vec<RemoteCommand>> {
        let commands = self
            .http
            .get_guild_commands_with_localizations(GuildId::new(guild_id))
            .await
            .map_err(|e| platform_error(&format!("fetch guild commands {}", guild_id), e))?;
        Self::remote(commands)
    }

    async fn set_global_commands(&self, commands: &[CommandDefinition]) -> Result<()> {
        self.http
            .create_global_commands(&commands)
            .await
            .map_err(|e| platform_error("set global commands", e))?;
        Ok(())
    }

    async fn set_guild_commands(&self, guild_id: u64, commands: &[CommandDefinition]) -> Result<()> {
        self.http
            .create_guild_commands(GuildId::new(guild_id), &commands)
            .await
            .map_err(|e| platform_error(&format!("set guild commands {}", guild_id), e))?;
        Ok(())
    }

    /// Completes a gateway reaction with its count from the message.
    async fn fetch_reaction(&self, reaction: &Reaction) -> Result<Reaction> {
        let message = self
            .http
            .get_message(ChannelId::new(reaction.channel_id), MessageId::new(reaction.message_id))
            .await
            .map_err(|e| platform_error(&format!("fetch message {}", reaction.message_id), e))?;

        let wanted = convert::reaction_type(&reaction.emoji);
        let count = message
            .reactions
            .iter()
            .find(|r| r.reaction_type == wanted)
            .map_or(0, |r| r.count);

        Ok(Reaction {
            guild_id: reaction.guild_id.or(message.guild_id.map(|g| g.get())),
            count: Some(count),
            partial: false,
            ..reaction.clone()
        })
    }

    async fn fetch_user(&self, user_id: u64) -> Result<DiscordUser> {
        let user = self
            .http
            .get_user(UserId::new(user_id))
            .await
            .map_err(|e| platform_error(&format!("fetch user {}", user_id), e))?;
        Ok(convert::user(&user))
    }

    async fn remove_reaction(&self, reaction: &Reaction, user_id: u64) -> Result<()> {
        self.http
            .delete_reaction(
                ChannelId::new(reaction.channel_id),
                MessageId::new(reaction.message_id),
                UserId::new(user_id),
                &convert::reaction_type(&reaction.emoji),
            )
            .await
            .map_err(|e| platform_error(&format!("remove reaction on {}", reaction.message_id), e))
    }

    async fn reply(&self, message: &DiscordMessage, content: &str) -> Result<()> {
        let channel = ChannelId::new(message.channel_id);
        let builder = CreateMessage::new()
            .content(content)
            .reference_message((channel, MessageId::new(message.id)));
        channel
            .send_message(&*self.http, builder)
            .await
            .map_err(|e| platform_error(&format!("reply to {}", message.id), e))?;
        Ok(())
    }
}
