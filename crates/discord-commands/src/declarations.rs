//! Declarations a bot registers at start-up: application commands, their
//! options, component and reaction handlers, text commands and event
//! listeners.
//!
//! Every declaration is built with consuming setters and handed to the
//! [`Registry`](crate::registry::Registry). Declarations are immutable once
//! the registry is built.

use std::fmt;

use discord_types::{CommandDefinition, CommandType, OptionDefinition, OptionType};
use regex::Regex;

use crate::error::Result;
use crate::guild::GuildScope;
use crate::handler::{AutocompleteHandler, GuardRef, Handler};
use crate::text::TextOptionDecl;

/// Empty `bot_ids` allows every bot.
pub fn bot_allowed(bot_ids: &[String], bot_id: &str) -> bool {
    bot_ids.is_empty() || bot_ids.iter().any(|id| id == bot_id)
}

/// Option node of a declared command. Branch options (subcommands and
/// groups) carry children; leaf options may carry an autocomplete handler.
#[derive(Clone)]
pub struct DeclaredOption {
    pub definition: OptionDefinition,
    pub options: Vec<DeclaredOption>,
    pub autocomplete: Option<AutocompleteHandler>,
}

impl DeclaredOption {
    pub fn new(kind: OptionType, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::from_definition(OptionDefinition::new(kind, name, description))
    }

    /// Nested definitions become child declarations without handlers.
    pub fn from_definition(mut definition: OptionDefinition) -> Self {
        let options = std::mem::take(&mut definition.options)
            .into_iter()
            .map(Self::from_definition)
            .collect();
        Self {
            definition,
            options,
            autocomplete: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.definition.required = true;
        self
    }

    pub fn with_choice(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.definition = self.definition.with_choice(name, value);
        self
    }

    pub fn with_option(mut self, option: DeclaredOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_autocomplete(mut self, handler: AutocompleteHandler) -> Self {
        self.autocomplete = Some(handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn kind(&self) -> OptionType {
        self.definition.kind
    }

    pub fn to_definition(&self) -> OptionDefinition {
        OptionDefinition {
            options: self.options.iter().map(Self::to_definition).collect(),
            autocomplete: self.definition.autocomplete || self.autocomplete.is_some(),
            ..self.definition.clone()
        }
    }
}

impl fmt::Debug for DeclaredOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclaredOption")
            .field("name", &self.definition.name)
            .field("kind", &self.definition.kind)
            .field("options", &self.options)
            .field("autocomplete", &self.autocomplete.is_some())
            .finish()
    }
}

/// Slash or context-menu command.
///
/// A slash command with `group` set is a subcommand; with `subgroup` also
/// set it is nested one level deeper. The registry assembles those into
/// top-level commands when it is built.
#[derive(Clone)]
pub struct DeclaredCommand {
    /// Top-level attributes sent to Discord. Its `options` are ignored in
    /// favour of [`DeclaredCommand::options`].
    pub base: CommandDefinition,
    pub group: Option<String>,
    pub subgroup: Option<String>,
    pub options: Vec<DeclaredOption>,
    pub guilds: Vec<GuildScope>,
    pub bot_ids: Vec<String>,
    pub guards: Vec<GuardRef>,
    pub handler: Option<Handler>,
    /// Human-readable origin for debug output
    pub label: String,
}

impl DeclaredCommand {
    pub fn new(kind: CommandType, name: impl Into<String>, description: impl Into<String>) -> Self {
        let base = CommandDefinition::new(kind, name, description);
        Self {
            label: base.name.clone(),
            base,
            group: None,
            subgroup: None,
            options: Vec::new(),
            guilds: Vec::new(),
            bot_ids: Vec::new(),
            guards: Vec::new(),
            handler: None,
        }
    }

    pub fn slash(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(CommandType::ChatInput, name, description)
    }

    /// Context-menu command on users. Discord requires an empty description.
    pub fn user(name: impl Into<String>) -> Self {
        Self::new(CommandType::User, name, "")
    }

    /// Context-menu command on messages.
    pub fn message(name: impl Into<String>) -> Self {
        Self::new(CommandType::Message, name, "")
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn in_subgroup(mut self, group: impl Into<String>, subgroup: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self.subgroup = Some(subgroup.into());
        self
    }

    pub fn with_option(mut self, option: DeclaredOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_guild(mut self, guild: impl Into<GuildScope>) -> Self {
        self.guilds.push(guild.into());
        self
    }

    pub fn with_bot_id(mut self, bot_id: impl Into<String>) -> Self {
        self.bot_ids.push(bot_id.into());
        self
    }

    pub fn with_guard(mut self, guard: GuardRef) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn with_handler(mut self, handler: Handler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn default_member_permissions(mut self, permissions: impl Into<String>) -> Self {
        self.base.default_member_permissions = Some(permissions.into());
        self
    }

    pub fn dm_permission(mut self, allowed: bool) -> Self {
        self.base.dm_permission = Some(allowed);
        self
    }

    pub fn nsfw(mut self) -> Self {
        self.base.nsfw = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn kind(&self) -> CommandType {
        self.base.kind
    }

    pub fn is_bot_allowed(&self, bot_id: &str) -> bool {
        bot_allowed(&self.bot_ids, bot_id)
    }

    /// Full definition as sent in a bulk overwrite.
    pub fn to_definition(&self) -> CommandDefinition {
        CommandDefinition {
            options: self.options.iter().map(DeclaredOption::to_definition).collect(),
            ..self.base.clone()
        }
    }

    /// Declared option by name among the leaf options.
    pub fn option(&self, name: &str) -> Option<&DeclaredOption> {
        self.options.iter().find(|o| o.name() == name)
    }
}

impl fmt::Debug for DeclaredCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclaredCommand")
            .field("name", &self.base.name)
            .field("kind", &self.base.kind)
            .field("group", &self.group)
            .field("subgroup", &self.subgroup)
            .field("options", &self.options)
            .field("guilds", &self.guilds)
            .field("bot_ids", &self.bot_ids)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Slash group or subgroup. A group with a `parent` is a subgroup of that
/// parent. Guild and bot scoping on a top-level group applies to the whole
/// assembled command.
#[derive(Debug, Clone)]
pub struct GroupDeclaration {
    pub base: CommandDefinition,
    pub parent: Option<String>,
    pub guilds: Vec<GuildScope>,
    pub bot_ids: Vec<String>,
}

impl GroupDeclaration {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            base: CommandDefinition::chat_input(name, description),
            parent: None,
            guilds: Vec::new(),
            bot_ids: Vec::new(),
        }
    }

    pub fn subgroup_of(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_guild(mut self, guild: impl Into<GuildScope>) -> Self {
        self.guilds.push(guild.into());
        self
    }

    pub fn with_bot_id(mut self, bot_id: impl Into<String>) -> Self {
        self.bot_ids.push(bot_id.into());
        self
    }

    pub fn default_member_permissions(mut self, permissions: impl Into<String>) -> Self {
        self.base.default_member_permissions = Some(permissions.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }
}

/// How a component or modal handler matches a `custom_id`.
#[derive(Debug, Clone)]
pub enum ComponentMatcher {
    Exact(String),
    /// Unanchored unless the pattern anchors itself
    Pattern(Regex),
}

impl ComponentMatcher {
    pub fn pattern(pattern: &str) -> Result<Self> {
        Ok(Self::Pattern(Regex::new(pattern)?))
    }

    pub fn is_match(&self, custom_id: &str) -> bool {
        match self {
            Self::Exact(id) => id == custom_id,
            Self::Pattern(re) => re.is_match(custom_id),
        }
    }
}

impl fmt::Display for ComponentMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(id) => f.write_str(id),
            Self::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// Button, select-menu or modal handler
#[derive(Clone)]
pub struct DeclaredComponent {
    pub matcher: ComponentMatcher,
    pub guilds: Vec<GuildScope>,
    pub bot_ids: Vec<String>,
    pub guards: Vec<GuardRef>,
    pub handler: Handler,
    pub label: String,
}

impl DeclaredComponent {
    pub fn new(matcher: ComponentMatcher, handler: Handler) -> Self {
        Self {
            label: matcher.to_string(),
            matcher,
            guilds: Vec::new(),
            bot_ids: Vec::new(),
            guards: Vec::new(),
            handler,
        }
    }

    pub fn exact(custom_id: impl Into<String>, handler: Handler) -> Self {
        Self::new(ComponentMatcher::Exact(custom_id.into()), handler)
    }

    pub fn with_guild(mut self, guild: impl Into<GuildScope>) -> Self {
        self.guilds.push(guild.into());
        self
    }

    pub fn with_bot_id(mut self, bot_id: impl Into<String>) -> Self {
        self.bot_ids.push(bot_id.into());
        self
    }

    pub fn with_guard(mut self, guard: GuardRef) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn is_bot_allowed(&self, bot_id: &str) -> bool {
        bot_allowed(&self.bot_ids, bot_id)
    }
}

impl fmt::Debug for DeclaredComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclaredComponent")
            .field("matcher", &self.matcher)
            .field("guilds", &self.guilds)
            .field("bot_ids", &self.bot_ids)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Reaction handler, matched by emoji name, custom emoji id, or an alias.
#[derive(Clone)]
pub struct DeclaredReaction {
    pub emoji: String,
    pub aliases: Vec<String>,
    pub guilds: Vec<GuildScope>,
    pub bot_ids: Vec<String>,
    pub guards: Vec<GuardRef>,
    pub handler: Handler,
    /// Also run for reactions in DM channels
    pub direct_message: bool,
    /// Run with partial data instead of fetching the full reaction and user
    pub partial: bool,
    /// Remove the user's reaction before running the handler
    pub remove: bool,
    pub label: String,
}

impl DeclaredReaction {
    pub fn new(emoji: impl Into<String>, handler: Handler) -> Self {
        let emoji = emoji.into();
        Self {
            label: emoji.clone(),
            emoji,
            aliases: Vec::new(),
            guilds: Vec::new(),
            bot_ids: Vec::new(),
            guards: Vec::new(),
            handler,
            direct_message: true,
            partial: false,
            remove: false,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_guild(mut self, guild: impl Into<GuildScope>) -> Self {
        self.guilds.push(guild.into());
        self
    }

    pub fn with_bot_id(mut self, bot_id: impl Into<String>) -> Self {
        self.bot_ids.push(bot_id.into());
        self
    }

    pub fn with_guard(mut self, guard: GuardRef) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn guild_only(mut self) -> Self {
        self.direct_message = false;
        self
    }

    pub fn accept_partial(mut self) -> Self {
        self.partial = true;
        self
    }

    pub fn remove_after(mut self) -> Self {
        self.remove = true;
        self
    }

    pub fn is_bot_allowed(&self, bot_id: &str) -> bool {
        bot_allowed(&self.bot_ids, bot_id)
    }

    /// True when `key` (an emoji name or custom id) selects this handler.
    pub fn matches(&self, key: &str) -> bool {
        self.emoji == key || self.aliases.iter().any(|a| a == key)
    }
}

impl fmt::Debug for DeclaredReaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclaredReaction")
            .field("emoji", &self.emoji)
            .field("aliases", &self.aliases)
            .field("direct_message", &self.direct_message)
            .field("partial", &self.partial)
            .field("remove", &self.remove)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Prefix-triggered text command
#[derive(Clone)]
pub struct DeclaredTextCommand {
    pub name: String,
    pub description: String,
    pub aliases: Vec<String>,
    /// Prefixes accepted in addition to the client's resolved prefixes
    pub prefixes: Vec<String>,
    pub options: Vec<TextOptionDecl>,
    pub guilds: Vec<GuildScope>,
    pub bot_ids: Vec<String>,
    pub guards: Vec<GuardRef>,
    pub handler: Handler,
    pub direct_message: bool,
    pub label: String,
}

impl DeclaredTextCommand {
    pub fn new(name: impl Into<String>, handler: Handler) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            description: String::new(),
            aliases: Vec::new(),
            prefixes: Vec::new(),
            options: Vec::new(),
            guilds: Vec::new(),
            bot_ids: Vec::new(),
            guards: Vec::new(),
            handler,
            direct_message: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    pub fn with_option(mut self, option: TextOptionDecl) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_guild(mut self, guild: impl Into<GuildScope>) -> Self {
        self.guilds.push(guild.into());
        self
    }

    pub fn with_bot_id(mut self, bot_id: impl Into<String>) -> Self {
        self.bot_ids.push(bot_id.into());
        self
    }

    pub fn with_guard(mut self, guard: GuardRef) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn guild_only(mut self) -> Self {
        self.direct_message = false;
        self
    }

    pub fn is_bot_allowed(&self, bot_id: &str) -> bool {
        bot_allowed(&self.bot_ids, bot_id)
    }
}

impl fmt::Debug for DeclaredTextCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclaredTextCommand")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("prefixes", &self.prefixes)
            .field("options", &self.options)
            .field("direct_message", &self.direct_message)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Gateway or REST event listener
#[derive(Clone)]
pub struct DeclaredEvent {
    pub event: String,
    pub once: bool,
    /// Listen on the REST layer instead of the gateway
    pub rest: bool,
    pub guards: Vec<GuardRef>,
    pub handler: Handler,
    pub label: String,
}

impl DeclaredEvent {
    pub fn on(event: impl Into<String>, handler: Handler) -> Self {
        let event = event.into();
        Self {
            label: event.clone(),
            event,
            once: false,
            rest: false,
            guards: Vec::new(),
            handler,
        }
    }

    pub fn once(event: impl Into<String>, handler: Handler) -> Self {
        Self {
            once: true,
            ..Self::on(event, handler)
        }
    }

    pub fn on_rest(mut self) -> Self {
        self.rest = true;
        self
    }

    pub fn with_guard(mut self, guard: GuardRef) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl fmt::Debug for DeclaredEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclaredEvent")
            .field("event", &self.event)
            .field("once", &self.once)
            .field("rest", &self.rest)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
