//! Application command definitions as they travel to and from Discord
//!
//! `CommandDefinition` is the JSON shape sent in a bulk overwrite and the
//! shape compared when deciding whether a registered command is up to date.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Application command kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CommandType {
    /// Slash command
    #[default]
    ChatInput,
    /// Right-click on a user
    User,
    /// Right-click on a message
    Message,
}

impl From<CommandType> for u8 {
    fn from(kind: CommandType) -> Self {
        match kind {
            CommandType::ChatInput => 1,
            CommandType::User => 2,
            CommandType::Message => 3,
        }
    }
}

impl TryFrom<u8> for CommandType {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(Self::ChatInput),
            2 => Ok(Self::User),
            3 => Ok(Self::Message),
            other => Err(format!("unknown application command type {}", other)),
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ChatInput => "chat_input",
            Self::User => "user",
            Self::Message => "message",
        };
        f.write_str(label)
    }
}

/// Application command option kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OptionType {
    SubCommand,
    SubCommandGroup,
    String,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Number,
    Attachment,
}

impl OptionType {
    /// Subcommands and subcommand groups nest further options; every other
    /// kind is a leaf value.
    pub fn is_branch(self) -> bool {
        matches!(self, Self::SubCommand | Self::SubCommandGroup)
    }
}

impl From<OptionType> for u8 {
    fn from(kind: OptionType) -> Self {
        match kind {
            OptionType::SubCommand => 1,
            OptionType::SubCommandGroup => 2,
            OptionType::String => 3,
            OptionType::Integer => 4,
            OptionType::Boolean => 5,
            OptionType::User => 6,
            OptionType::Channel => 7,
            OptionType::Role => 8,
            OptionType::Mentionable => 9,
            OptionType::Number => 10,
            OptionType::Attachment => 11,
        }
    }
}

impl TryFrom<u8> for OptionType {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Ok(match raw {
            1 => Self::SubCommand,
            2 => Self::SubCommandGroup,
            3 => Self::String,
            4 => Self::Integer,
            5 => Self::Boolean,
            6 => Self::User,
            7 => Self::Channel,
            8 => Self::Role,
            9 => Self::Mentionable,
            10 => Self::Number,
            11 => Self::Attachment,
            other => return Err(format!("unknown application command option type {}", other)),
        })
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SubCommand => "sub_command",
            Self::SubCommandGroup => "sub_command_group",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::User => "user",
            Self::Channel => "channel",
            Self::Role => "role",
            Self::Mentionable => "mentionable",
            Self::Number => "number",
            Self::Attachment => "attachment",
        };
        f.write_str(label)
    }
}

pub type Localizations = BTreeMap<String, String>;

/// Fixed choice offered for a string, integer or number option
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionChoice {
    pub name: String,
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_localizations: Option<Localizations>,
}

/// One node of a command's option tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionDefinition {
    #[serde(rename = "type")]
    pub kind: OptionType,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_localizations: Option<Localizations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_localizations: Option<Localizations>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<OptionChoice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channel_types: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u16>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub autocomplete: bool,
}

impl OptionDefinition {
    pub fn new(kind: OptionType, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: description.into(),
            name_localizations: None,
            description_localizations: None,
            required: false,
            choices: Vec::new(),
            options: Vec::new(),
            channel_types: Vec::new(),
            min_value: None,
            max_value: None,
            min_length: None,
            max_length: None,
            autocomplete: false,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn autocomplete(mut self, autocomplete: bool) -> Self {
        self.autocomplete = autocomplete;
        self
    }

    pub fn with_option(mut self, option: OptionDefinition) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_choice(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.choices.push(OptionChoice {
            name: name.into(),
            value: value.into(),
            name_localizations: None,
        });
        self
    }

    fn normalized(&self) -> Self {
        Self {
            name_localizations: non_empty(&self.name_localizations),
            description_localizations: non_empty(&self.description_localizations),
            choices: self
                .choices
                .iter()
                .map(|c| OptionChoice {
                    name_localizations: non_empty(&c.name_localizations),
                    ..c.clone()
                })
                .collect(),
            options: self.options.iter().map(Self::normalized).collect(),
            ..self.clone()
        }
    }
}

/// Full shape of an application command, without Discord-assigned ids
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandDefinition {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: CommandType,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_localizations: Option<Localizations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_localizations: Option<Localizations>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionDefinition>,
    /// Permission bitmask as a decimal string
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "permissions_as_string"
    )]
    pub default_member_permissions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dm_permission: Option<bool>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub nsfw: bool,
}

impl CommandDefinition {
    pub fn new(kind: CommandType, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            name_localizations: None,
            description_localizations: None,
            options: Vec::new(),
            default_member_permissions: None,
            dm_permission: None,
            nsfw: false,
        }
    }

    pub fn chat_input(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(CommandType::ChatInput, name, description)
    }

    pub fn with_option(mut self, option: OptionDefinition) -> Self {
        self.options.push(option);
        self
    }

    /// Deep comparison that ignores differences Discord introduces on its
    /// side: empty localization maps, and `dm_permission: true` which is the
    /// platform default.
    pub fn is_equivalent(&self, other: &CommandDefinition) -> bool {
        self.normalized() == other.normalized()
    }

    /// Like [`is_equivalent`](Self::is_equivalent), but ignores
    /// `dm_permission`, which has no meaning for guild commands.
    pub fn is_equivalent_in_guild(&self, other: &CommandDefinition) -> bool {
        let mut local = self.normalized();
        let mut remote = other.normalized();
        local.dm_permission = None;
        remote.dm_permission = None;
        local == remote
    }

    fn normalized(&self) -> Self {
        Self {
            name_localizations: non_empty(&self.name_localizations),
            description_localizations: non_empty(&self.description_localizations),
            options: self.options.iter().map(OptionDefinition::normalized).collect(),
            dm_permission: self.dm_permission.filter(|allowed| !allowed),
            ..self.clone()
        }
    }
}

/// An application command as currently registered on Discord
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteCommand {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<u64>,
    #[serde(flatten)]
    pub definition: CommandDefinition,
}

impl RemoteCommand {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn kind(&self) -> CommandType {
        self.definition.kind
    }
}

/// Per-category switches for a sync pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisableOptions {
    #[serde(default)]
    pub add: bool,
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub delete: bool,
}

/// Options accepted by the command sync entry points
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitCommandOptions {
    #[serde(default)]
    pub disable: DisableOptions,
}

/// Separate switches for the global pass and the per-guild passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    #[serde(default)]
    pub global: InitCommandOptions,
    #[serde(default)]
    pub guild: InitCommandOptions,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn non_empty(map: &Option<Localizations>) -> Option<Localizations> {
    map.as_ref().filter(|m| !m.is_empty()).cloned()
}

fn permissions_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) => Some(s),
        Some(Raw::Number(n)) => Some(n.to_string()),
        None => None,
    })
}
