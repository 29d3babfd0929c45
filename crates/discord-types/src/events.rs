//! Inbound interaction and reaction events, as the engine sees them

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::commands::{CommandType, OptionType};
use crate::types::{DiscordUser, Emoji};

/// One option as submitted with a command or autocomplete interaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: OptionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub focused: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<InteractionOption>,
}

impl InteractionOption {
    pub fn branch(kind: OptionType, name: impl Into<String>, options: Vec<InteractionOption>) -> Self {
        Self {
            name: name.into(),
            kind,
            value: None,
            focused: false,
            options,
        }
    }

    pub fn leaf(kind: OptionType, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            value: Some(value.into()),
            focused: false,
            options: Vec::new(),
        }
    }
}

/// Slash, context-menu or autocomplete interaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandInteraction {
    pub id: u64,
    pub token: String,
    pub command_id: u64,
    pub command_name: String,
    pub command_type: CommandType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<u64>,
    pub channel_id: u64,
    pub user: DiscordUser,
    #[serde(default)]
    pub options: Vec<InteractionOption>,
    /// Target user or message of a context-menu command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<u64>,
}

impl CommandInteraction {
    /// Leaf options of the invoked (sub)command, after descending through
    /// any subcommand group and subcommand.
    pub fn leaf_options(&self) -> &[InteractionOption] {
        let mut current = self.options.as_slice();
        while let Some(first) = current.first() {
            if !first.kind.is_branch() {
                break;
            }
            current = first.options.as_slice();
        }
        current
    }

    /// The option the user is currently typing into, for autocomplete.
    pub fn focused_option(&self) -> Option<&InteractionOption> {
        self.leaf_options().iter().find(|o| o.focused)
    }

    pub fn option(&self, name: &str) -> Option<&serde_json::Value> {
        self.leaf_options()
            .iter()
            .find(|o| o.name == name)
            .and_then(|o| o.value.as_ref())
    }
}

/// Message component kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Button,
    StringSelect,
    UserSelect,
    RoleSelect,
    MentionableSelect,
    ChannelSelect,
}

impl ComponentKind {
    pub fn is_select_menu(self) -> bool {
        !matches!(self, Self::Button)
    }
}

/// Button or select-menu interaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentInteraction {
    pub id: u64,
    pub token: String,
    pub custom_id: String,
    pub kind: ComponentKind,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<u64>,
    pub channel_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<u64>,
    pub user: DiscordUser,
}

/// Modal submission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModalSubmit {
    pub id: u64,
    pub token: String,
    pub custom_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<u64>,
    pub channel_id: u64,
    pub user: DiscordUser,
    /// Text input custom id → submitted value
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// Every interaction the router accepts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Interaction {
    /// Slash or context-menu invocation
    Command(CommandInteraction),
    Autocomplete(CommandInteraction),
    Component(ComponentInteraction),
    Modal(ModalSubmit),
}

impl Interaction {
    pub fn guild_id(&self) -> Option<u64> {
        match self {
            Self::Command(c) | Self::Autocomplete(c) => c.guild_id,
            Self::Component(c) => c.guild_id,
            Self::Modal(m) => m.guild_id,
        }
    }
}

/// Reaction added to a message. `partial` is set when the platform only
/// delivered ids and the rest must be fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reaction {
    pub channel_id: u64,
    pub message_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<u64>,
    pub emoji: Emoji,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default)]
    pub partial: bool,
}

/// User who reacted. Partial users carry only an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReactionUser {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<DiscordUser>,
}

impl ReactionUser {
    pub fn partial(id: u64) -> Self {
        Self { id, user: None }
    }

    pub fn is_partial(&self) -> bool {
        self.user.is_none()
    }
}

impl From<DiscordUser> for ReactionUser {
    fn from(user: DiscordUser) -> Self {
        Self {
            id: user.id,
            user: Some(user),
        }
    }
}
