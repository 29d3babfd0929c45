//! In-memory platform for unit testing without a Discord connection.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use discord_types::{CommandDefinition, DiscordMessage, DiscordUser, Reaction, RemoteCommand};

use crate::error::{Error, Result};
use crate::platform::Platform;

/// Side effect recorded by [`MockPlatform`], in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    SetGlobal(Vec<CommandDefinition>),
    SetGuild(u64, Vec<CommandDefinition>),
    FetchReaction { message_id: u64 },
    FetchUser(u64),
    RemoveReaction { message_id: u64, user_id: u64 },
    Reply { message_id: u64, content: String },
    Login,
}

#[derive(Default)]
struct State {
    ready: bool,
    username: Option<String>,
    guilds: Vec<u64>,
    global: Vec<RemoteCommand>,
    guild_commands: HashMap<u64, Vec<RemoteCommand>>,
    failing_guilds: HashSet<u64>,
    users: HashMap<u64, DiscordUser>,
    calls: Vec<PlatformCall>,
    next_id: u64,
}

/// Platform double that keeps registered commands in memory. A bulk
/// overwrite replaces the stored list, so a second sync pass sees the
/// result of the first.
///
/// # Example
/// ```rust,ignore
/// let platform = MockPlatform::ready("bot").with_guilds([1, 2]);
/// client.init_application_commands(SyncOptions::default()).await?;
/// assert_eq!(platform.set_calls().len(), 3);
/// ```
#[derive(Clone, Default)]
pub struct MockPlatform {
    state: Arc<Mutex<State>>,
}

impl MockPlatform {
    /// A platform that has no application context yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A platform with an application context and a logged-in user.
    pub fn ready(username: impl Into<String>) -> Self {
        let platform = Self::new();
        {
            let mut state = platform.state.lock().unwrap();
            state.ready = true;
            state.username = Some(username.into());
        }
        platform
    }

    pub fn with_guilds(self, guilds: impl IntoIterator<Item = u64>) -> Self {
        self.state.lock().unwrap().guilds = guilds.into_iter().collect();
        self
    }

    pub fn with_user(self, user: DiscordUser) -> Self {
        self.state.lock().unwrap().users.insert(user.id, user);
        self
    }

    /// Seed the registered global commands.
    pub fn register_global(&self, definition: CommandDefinition) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.global.push(RemoteCommand {
            id,
            guild_id: None,
            definition,
        });
        id
    }

    /// Seed a registered command for `guild_id`.
    pub fn register_guild(&self, guild_id: u64, definition: CommandDefinition) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.guild_commands.entry(guild_id).or_default().push(RemoteCommand {
            id,
            guild_id: Some(guild_id),
            definition,
        });
        id
    }

    /// Make every call touching `guild_id` fail.
    pub fn fail_guild(&self, guild_id: u64) {
        self.state.lock().unwrap().failing_guilds.insert(guild_id);
    }

    pub fn global_commands(&self) -> Vec<RemoteCommand> {
        self.state.lock().unwrap().global.clone()
    }

    pub fn guild_commands(&self, guild_id: u64) -> Vec<RemoteCommand> {
        self.state
            .lock()
            .unwrap()
            .guild_commands
            .get(&guild_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of every recorded call.
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Only the bulk overwrite calls.
    pub fn set_calls(&self) -> Vec<PlatformCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, PlatformCall::SetGlobal(_) | PlatformCall::SetGuild(..)))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn to_remote(state: &mut State, guild_id: Option<u64>, commands: &[CommandDefinition]) -> Vec<RemoteCommand> {
        commands
            .iter()
            .map(|definition| {
                state.next_id += 1;
                RemoteCommand {
                    id: state.next_id,
                    guild_id,
                    definition: definition.clone(),
                }
            })
            .collect()
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn application_ready(&self) -> bool {
        self.state.lock().unwrap().ready
    }

    fn bot_username(&self) -> Option<String> {
        self.state.lock().unwrap().username.clone()
    }

    fn cached_guild_ids(&self) -> Vec<u64> {
        self.state.lock().unwrap().guilds.clone()
    }

    async fn login(&self, _token: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.ready = true;
        state.calls.push(PlatformCall::Login);
        Ok(())
    }

    async fn fetch_global_commands(&self) -> Result<Vec<RemoteCommand>> {
        Ok(self.state.lock().unwrap().global.clone())
    }

    async fn fetch_guild_commands(&self, guild_id: u64) -> Result<Vec<RemoteCommand>> {
        let state = self.state.lock().unwrap();
        if state.failing_guilds.contains(&guild_id) {
            return Err(Error::Platform(format!("guild {} rejected the request", guild_id)));
        }
        Ok(state.guild_commands.get(&guild_id).cloned().unwrap_or_default())
    }

    async fn set_global_commands(&self, commands: &[CommandDefinition]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(PlatformCall::SetGlobal(commands.to_vec()));
        let remote = Self::to_remote(&mut state, None, commands);
        state.global = remote;
        Ok(())
    }

    async fn set_guild_commands(&self, guild_id: u64, commands: &[CommandDefinition]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_guilds.contains(&guild_id) {
            return Err(Error::Platform(format!("guild {} rejected the request", guild_id)));
        }
        state.calls.push(PlatformCall::SetGuild(guild_id, commands.to_vec()));
        let remote = Self::to_remote(&mut state, Some(guild_id), commands);
        state.guild_commands.insert(guild_id, remote);
        Ok(())
    }

    async fn fetch_reaction(&self, reaction: &Reaction) -> Result<Reaction> {
        self.state.lock().unwrap().calls.push(PlatformCall::FetchReaction {
            message_id: reaction.message_id,
        });
        Ok(Reaction {
            partial: false,
            count: Some(reaction.count.unwrap_or(1)),
            ..reaction.clone()
        })
    }

    async fn fetch_user(&self, user_id: u64) -> Result<DiscordUser> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(PlatformCall::FetchUser(user_id));
        state
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| Error::Platform(format!("unknown user {}", user_id)))
    }

    async fn remove_reaction(&self, reaction: &Reaction, user_id: u64) -> Result<()> {
        self.state.lock().unwrap().calls.push(PlatformCall::RemoveReaction {
            message_id: reaction.message_id,
            user_id,
        });
        Ok(())
    }

    async fn reply(&self, message: &DiscordMessage, content: &str) -> Result<()> {
        self.state.lock().unwrap().calls.push(PlatformCall::Reply {
            message_id: message.id,
            content: content.to_string(),
        });
        Ok(())
    }
}
