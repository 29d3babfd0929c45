//! Configuration management for discord-bot

#[path = "config_tests.rs"]
mod config_tests;

use anyhow::{Context, Result};
use discord_commands::{
    ArgSplitter, ClientOptions, GuildScope, NotFoundResponse, PrefixResolver, TextCommandConfig,
    DEFAULT_BOT_ID,
};
use discord_types::{DisableOptions, InitCommandOptions, SyncOptions};
use serde::{Deserialize, Serialize};
use std::fs;

/// Reads environment variables. Tests swap in an in-memory map.
pub trait ReadEnv {
    fn var(&self, key: &str) -> Option<String>;
}

/// Delegates to `std::env`.
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Complete bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub discord: DiscordBotConfig,
    #[serde(default)]
    pub text: TextConfig,
    #[serde(default)]
    pub sync: SyncOptions,
}

/// Identity and scoping of the bot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordBotConfig {
    /// Bot token from the Discord developer portal
    #[serde(default)]
    pub bot_token: String,
    /// Identity matched against declarations' bot id lists
    #[serde(default = "default_bot_id")]
    pub bot_id: String,
    #[serde(default = "default_silent")]
    pub silent: bool,
    /// Guilds every declaration is registered in
    #[serde(default)]
    pub bot_guilds: Vec<u64>,
    /// Register every declaration in every guild the bot is in
    #[serde(default)]
    pub all_bot_guilds: bool,
}

/// Prefix-based text command settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextConfig {
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_arg_splitter")]
    pub arg_splitter: String,
    /// Reply sent when a prefix matched but no command did
    #[serde(default)]
    pub not_found_reply: Option<String>,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            prefixes: default_prefixes(),
            case_sensitive: false,
            arg_splitter: default_arg_splitter(),
            not_found_reply: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        if config.discord.bot_token.is_empty() {
            config.discord.bot_token = SystemEnv.var("DISCORD_BOT_TOKEN").unwrap_or_default();
        }

        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_env_impl(&SystemEnv)
    }

    pub(crate) fn from_env_impl<E: ReadEnv>(env: &E) -> Result<Self> {
        let bot_token = env
            .var("DISCORD_BOT_TOKEN")
            .filter(|v| !v.is_empty())
            .context("DISCORD_BOT_TOKEN not set")?;

        let bot_id = env
            .var("DISCORD_BOT_ID")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_bot_id);

        let silent = env
            .var("DISCORD_SILENT")
            .map(|v| parse_flag(&v))
            .unwrap_or_else(default_silent);

        let bot_guilds = parse_id_list(&env.var("DISCORD_BOT_GUILDS").unwrap_or_default());

        let all_bot_guilds = env
            .var("DISCORD_ALL_BOT_GUILDS")
            .is_some_and(|v| parse_flag(&v));

        let prefixes = env
            .var("DISCORD_PREFIXES")
            .map(|v| parse_list(&v))
            .unwrap_or_else(default_prefixes);

        let case_sensitive = env
            .var("DISCORD_CASE_SENSITIVE")
            .is_some_and(|v| parse_flag(&v));

        let arg_splitter = env
            .var("DISCORD_ARG_SPLITTER")
            .unwrap_or_else(default_arg_splitter);

        let not_found_reply = env.var("DISCORD_NOT_FOUND_REPLY").filter(|v| !v.is_empty());

        let sync = SyncOptions {
            global: parse_disable(&env.var("DISCORD_SYNC_GLOBAL_DISABLE").unwrap_or_default()),
            guild: parse_disable(&env.var("DISCORD_SYNC_GUILD_DISABLE").unwrap_or_default()),
        };

        Ok(Config {
            discord: DiscordBotConfig {
                bot_token,
                bot_id,
                silent,
                bot_guilds,
                all_bot_guilds,
            },
            text: TextConfig {
                prefixes,
                case_sensitive,
                arg_splitter,
                not_found_reply,
            },
            sync,
        })
    }

    /// Engine options derived from this configuration.
    pub fn client_options(&self) -> ClientOptions {
        let mut bot_guilds: Vec<GuildScope> = self
            .discord
            .bot_guilds
            .iter()
            .copied()
            .map(GuildScope::Id)
            .collect();
        if self.discord.all_bot_guilds {
            bot_guilds.push(GuildScope::AllBotGuilds);
        }

        ClientOptions {
            bot_id: self.discord.bot_id.clone(),
            silent: self.discord.silent,
            bot_guilds,
            text: TextCommandConfig {
                prefix: PrefixResolver::Static(self.text.prefixes.clone()),
                arg_splitter: ArgSplitter::Separator(self.text.arg_splitter.clone()),
                not_found: self.text.not_found_reply.clone().map(NotFoundResponse::Reply),
                case_sensitive: self.text.case_sensitive,
            },
            ..ClientOptions::default()
        }
    }
}

fn default_bot_id() -> String {
    DEFAULT_BOT_ID.to_string()
}

fn default_silent() -> bool {
    true
}

fn default_prefixes() -> Vec<String> {
    vec!["!".to_string()]
}

fn default_arg_splitter() -> String {
    " ".to_string()
}

fn parse_flag(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim())
        .filter(|x| !x.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_id_list(s: &str) -> Vec<u64> {
    s.split(',')
        .map(|x| x.trim())
        .filter(|x| !x.is_empty())
        .filter_map(|x| x.parse::<u64>().ok())
        .collect()
}

/// `"add,delete"` disables adding and deleting.
fn parse_disable(s: &str) -> InitCommandOptions {
    let mut disable = DisableOptions::default();
    for item in parse_list(s) {
        match item.to_lowercase().as_str() {
            "add" => disable.add = true,
            "update" => disable.update = true,
            "delete" => disable.delete = true,
            _ => {}
        }
    }
    InitCommandOptions { disable }
}
