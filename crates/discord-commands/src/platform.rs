//! Seam between the engine and the chat platform it drives.
//!
//! Everything the engine needs from Discord goes through [`Platform`]:
//! reading and bulk-overwriting registered commands, the few reaction and
//! message calls a handler pipeline makes, and the session itself. The
//! production implementation lives in the bot binary; [`crate::mock`]
//! provides an in-memory one for tests.

use async_trait::async_trait;
use discord_types::{CommandDefinition, DiscordMessage, DiscordUser, Reaction, RemoteCommand};

use crate::error::Result;

#[async_trait]
pub trait Platform: Send + Sync + 'static {
    /// True once an authenticated application context exists.
    fn application_ready(&self) -> bool;

    /// Name of the logged-in bot user, if the session is up.
    fn bot_username(&self) -> Option<String>;

    /// Guilds the bot is currently a member of.
    fn cached_guild_ids(&self) -> Vec<u64>;

    fn has_guild(&self, guild_id: u64) -> bool {
        self.cached_guild_ids().contains(&guild_id)
    }

    /// Open the gateway session. Implementations return once the session is
    /// established or failed to start.
    async fn login(&self, token: &str) -> Result<()>;

    async fn fetch_global_commands(&self) -> Result<Vec<RemoteCommand>>;

    async fn fetch_guild_commands(&self, guild_id: u64) -> Result<Vec<RemoteCommand>>;

    /// Replace every global command with `commands` in a single call.
    async fn set_global_commands(&self, commands: &[CommandDefinition]) -> Result<()>;

    /// Replace every command of `guild_id` with `commands` in a single call.
    async fn set_guild_commands(&self, guild_id: u64, commands: &[CommandDefinition]) -> Result<()>;

    /// Fetch the full state of a partially delivered reaction.
    async fn fetch_reaction(&self, reaction: &Reaction) -> Result<Reaction>;

    async fn fetch_user(&self, user_id: u64) -> Result<DiscordUser>;

    /// Remove `user_id`'s reaction from the message.
    async fn remove_reaction(&self, reaction: &Reaction, user_id: u64) -> Result<()>;

    /// Reply to a message in its channel.
    async fn reply(&self, message: &DiscordMessage, content: &str) -> Result<()>;
}
