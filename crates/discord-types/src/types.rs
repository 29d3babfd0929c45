//! Core Discord domain types

use serde::{Deserialize, Serialize};

/// Discord user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscordUser {
    pub id: u64,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    pub bot: bool,
}

/// Discord message, reduced to what text commands need
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscordMessage {
    pub id: u64,
    pub channel_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<u64>,
    pub author: DiscordUser,
    pub content: String,
}

impl DiscordMessage {
    /// True when the message was sent in a DM channel.
    pub fn is_direct(&self) -> bool {
        self.guild_id.is_none()
    }
}

/// Emoji as carried by a reaction. Unicode emoji have only a name; custom
/// emoji have an id and usually a name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Emoji {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub animated: bool,
}

impl Emoji {
    pub fn unicode(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            animated: false,
        }
    }

    pub fn custom(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: Some(name.into()),
            animated: false,
        }
    }

    /// Keys a reaction handler can be declared with: the custom id (as a
    /// string) and the name.
    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.id
            .map(|id| id.to_string())
            .into_iter()
            .chain(self.name.iter().cloned())
    }
}
