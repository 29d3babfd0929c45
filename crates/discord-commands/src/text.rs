//! Prefix-based text commands: prefix matching, command lookup, argument
//! splitting and typed option resolution.
//!
//! Parsing is split into small pure functions so each step can be checked
//! in isolation; [`CommandClient::execute_command`] strings them together
//! with the filters and the execute contract.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use discord_types::DiscordMessage;
use futures::future::BoxFuture;
use regex::Regex;
use tracing::debug;

use crate::client::CommandClient;
use crate::declarations::DeclaredTextCommand;
use crate::dispatch::{Dispatch, Skip};
use crate::error::{Error, Result};
use crate::handler::{execute, Invocation};
use crate::platform::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOptionType {
    String,
    Number,
    Boolean,
    User,
    Role,
    Channel,
    /// User or role
    Mentionable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextOptionValue {
    String(String),
    Number(f64),
    Boolean(bool),
    User(u64),
    Role(u64),
    Channel(u64),
    Mentionable(u64),
}

/// Positional option of a text command
#[derive(Debug, Clone, PartialEq)]
pub struct TextOptionDecl {
    pub name: String,
    pub kind: TextOptionType,
    pub description: String,
}

impl TextOptionDecl {
    pub fn new(kind: TextOptionType, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
        }
    }

    /// Convert one raw argument. Anything that does not fit the declared
    /// type yields `None`.
    pub fn parse(&self, raw: &str) -> Option<TextOptionValue> {
        match self.kind {
            TextOptionType::String => Some(TextOptionValue::String(raw.to_string())),
            TextOptionType::Number => raw
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(TextOptionValue::Number),
            TextOptionType::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" => Some(TextOptionValue::Boolean(true)),
                "false" => Some(TextOptionValue::Boolean(false)),
                _ => None,
            },
            TextOptionType::User => match parse_mention(raw)? {
                (Mention::User | Mention::Bare, id) => Some(TextOptionValue::User(id)),
                _ => None,
            },
            TextOptionType::Role => match parse_mention(raw)? {
                (Mention::Role | Mention::Bare, id) => Some(TextOptionValue::Role(id)),
                _ => None,
            },
            TextOptionType::Channel => match parse_mention(raw)? {
                (Mention::Channel | Mention::Bare, id) => Some(TextOptionValue::Channel(id)),
                _ => None,
            },
            TextOptionType::Mentionable => match parse_mention(raw)? {
                (Mention::Channel, _) => None,
                (_, id) => Some(TextOptionValue::Mentionable(id)),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mention {
    User,
    Role,
    Channel,
    Bare,
}

fn parse_mention(raw: &str) -> Option<(Mention, u64)> {
    let (kind, digits) = match raw.strip_prefix('<').and_then(|r| r.strip_suffix('>')) {
        Some(inner) => {
            if let Some(id) = inner.strip_prefix("@&") {
                (Mention::Role, id)
            } else if let Some(id) = inner.strip_prefix("@!") {
                (Mention::User, id)
            } else if let Some(id) = inner.strip_prefix('@') {
                (Mention::User, id)
            } else if let Some(id) = inner.strip_prefix('#') {
                (Mention::Channel, id)
            } else {
                return None;
            }
        }
        None => (Mention::Bare, raw),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|id| (kind, id))
}

/// Resolved options, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextOptions {
    values: Vec<(String, Option<TextOptionValue>)>,
}

impl TextOptions {
    pub fn get(&self, name: &str) -> Option<&TextOptionValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn positional(&self, index: usize) -> Option<&TextOptionValue> {
        self.values.get(index).and_then(|(_, v)| v.as_ref())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A message that parsed as a known text command
#[derive(Debug, Clone)]
pub struct TextCommandMessage {
    /// Prefix that matched
    pub prefix: String,
    /// Declared command name
    pub name: String,
    /// Name or alias as typed
    pub invoked: String,
    /// Everything after the command name, trimmed
    pub args: String,
    pub options: TextOptions,
    pub message: DiscordMessage,
}

/// Computes prefixes per message, e.g. from a per-guild setting.
#[async_trait]
pub trait ResolvePrefix: Send + Sync {
    async fn prefixes(&self, message: &DiscordMessage) -> anyhow::Result<Vec<String>>;
}

#[derive(Clone)]
pub enum PrefixResolver {
    Static(Vec<String>),
    Dynamic(Arc<dyn ResolvePrefix>),
}

impl Default for PrefixResolver {
    fn default() -> Self {
        Self::Static(vec!["!".to_string()])
    }
}

impl fmt::Debug for PrefixResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(prefixes) => f.debug_tuple("Static").field(prefixes).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// How the raw argument string is split into positional values
#[derive(Clone)]
pub enum ArgSplitter {
    Separator(String),
    Pattern(Regex),
    Custom(Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>),
}

impl ArgSplitter {
    /// Empty pieces are dropped for the separator and pattern forms.
    pub fn split(&self, args: &str) -> Vec<String> {
        match self {
            Self::Separator(sep) if sep.is_empty() => args
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            Self::Separator(sep) => args
                .split(sep.as_str())
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .map(str::to_string)
                .collect(),
            Self::Pattern(re) => re
                .split(args)
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .map(str::to_string)
                .collect(),
            Self::Custom(split) => split(args),
        }
    }
}

impl Default for ArgSplitter {
    fn default() -> Self {
        Self::Separator(" ".to_string())
    }
}

impl fmt::Debug for ArgSplitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Separator(sep) => f.debug_tuple("Separator").field(sep).finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

pub type NotFoundHandler =
    Arc<dyn Fn(DiscordMessage) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// What to do when a prefix matched but no command did
#[derive(Clone)]
pub enum NotFoundResponse {
    Reply(String),
    Handler(NotFoundHandler),
}

impl fmt::Debug for NotFoundResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reply(text) => f.debug_tuple("Reply").field(text).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TextCommandConfig {
    pub prefix: PrefixResolver,
    pub arg_splitter: ArgSplitter,
    pub not_found: Option<NotFoundResponse>,
    pub case_sensitive: bool,
}

#[derive(Debug)]
pub enum ParsedText {
    NotACommand,
    NotFound,
    Command {
        message: TextCommandMessage,
        declaration: Arc<DeclaredTextCommand>,
    },
}

/// Compiled `^(p1|p2|...)` alternation with every prefix escaped. Empty
/// prefixes are dropped; with none left nothing matches.
#[derive(Debug, Clone)]
pub struct PrefixMatcher {
    pattern: Option<Regex>,
}

impl PrefixMatcher {
    pub fn new(prefixes: &[String]) -> Result<Self> {
        let alternatives: Vec<String> = prefixes
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| regex::escape(p))
            .collect();
        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }
        let pattern = Regex::new(&format!("^({})", alternatives.join("|")))?;
        Ok(Self { pattern: Some(pattern) })
    }

    /// The matched prefix and the remaining content.
    pub fn find(&self, content: &str) -> Option<(String, String)> {
        let m = self.pattern.as_ref()?.find(content)?;
        Some((m.as_str().to_string(), content[m.end()..].to_string()))
    }
}

/// One-off [`PrefixMatcher`] lookup.
pub fn match_prefix(prefixes: &[String], content: &str) -> Result<Option<(String, String)>> {
    Ok(PrefixMatcher::new(prefixes)?.find(content))
}

/// First entry whose name followed by a space starts the trimmed text.
pub fn find_command<'a>(
    names: &'a [(String, Arc<DeclaredTextCommand>)],
    rest: &str,
    case_sensitive: bool,
) -> Option<&'a (String, Arc<DeclaredTextCommand>)> {
    let haystack = format!("{} ", rest.trim());
    if case_sensitive {
        names
            .iter()
            .find(|(name, _)| haystack.starts_with(&format!("{} ", name)))
    } else {
        let haystack = haystack.to_lowercase();
        names
            .iter()
            .find(|(name, _)| haystack.starts_with(&format!("{} ", name.to_lowercase())))
    }
}

/// Remove the first case-insensitive occurrence of `name` and trim.
pub fn strip_command_name(rest: &str, name: &str) -> Result<String> {
    let pattern = Regex::new(&format!("(?i){}", regex::escape(name)))?;
    Ok(pattern.replacen(rest.trim(), 1, "").trim().to_string())
}

pub fn resolve_options(decls: &[TextOptionDecl], args: &str, splitter: &ArgSplitter) -> TextOptions {
    let pieces = splitter.split(args);
    TextOptions {
        values: decls
            .iter()
            .enumerate()
            .map(|(i, decl)| (decl.name.clone(), pieces.get(i).and_then(|raw| decl.parse(raw))))
            .collect(),
    }
}

/// Classify a message against the prefix matcher and command name index.
pub fn parse(
    prefixes: &PrefixMatcher,
    names: &[(String, Arc<DeclaredTextCommand>)],
    message: &DiscordMessage,
    case_sensitive: bool,
    splitter: &ArgSplitter,
) -> Result<ParsedText> {
    let Some((prefix, rest)) = prefixes.find(&message.content) else {
        return Ok(ParsedText::NotACommand);
    };

    let Some((invoked, declaration)) = find_command(names, &rest, case_sensitive) else {
        return Ok(ParsedText::NotFound);
    };

    let args = strip_command_name(&rest, invoked)?;
    let options = resolve_options(&declaration.options, &args, splitter);

    Ok(ParsedText::Command {
        message: TextCommandMessage {
            prefix,
            name: declaration.name.clone(),
            invoked: invoked.clone(),
            args,
            options,
            message: message.clone(),
        },
        declaration: declaration.clone(),
    })
}

impl<P: Platform> CommandClient<P> {
    /// Client-level prefixes for `message`.
    pub async fn message_prefixes(&self, message: &DiscordMessage) -> Result<Vec<String>> {
        match &self.options.text.prefix {
            PrefixResolver::Static(prefixes) => Ok(prefixes.clone()),
            PrefixResolver::Dynamic(resolver) => resolver
                .prefixes(message)
                .await
                .map_err(Error::PrefixResolution),
        }
    }

    /// Matcher for `message`. Static prefixes and the command prefixes are
    /// compiled once the registry is built; resolver prefixes can differ per
    /// message and are compiled on every call.
    pub async fn prefix_matcher(&self, message: &DiscordMessage) -> Result<Arc<PrefixMatcher>> {
        let PrefixResolver::Static(prefixes) = &self.options.text.prefix else {
            let prefixes = self.message_prefixes(message).await?;
            return Ok(Arc::new(self.compile_prefixes(&prefixes)?));
        };
        if let Some(cached) = self.prefix_matcher.get() {
            return Ok(Arc::clone(cached));
        }
        let matcher = Arc::new(self.compile_prefixes(prefixes)?);
        if self.registry.is_built() {
            return Ok(Arc::clone(self.prefix_matcher.get_or_init(|| matcher)));
        }
        Ok(matcher)
    }

    fn compile_prefixes(&self, prefixes: &[String]) -> Result<PrefixMatcher> {
        let all: Vec<String> = prefixes
            .iter()
            .chain(self.registry.index().mapped_prefixes.iter())
            .cloned()
            .collect();
        PrefixMatcher::new(&all)
    }

    /// Parse with `prefixes` plus every command-specific prefix.
    pub fn parse_command(
        &self,
        prefixes: &[String],
        message: &DiscordMessage,
        case_sensitive: bool,
    ) -> Result<ParsedText> {
        self.parse_with(&self.compile_prefixes(prefixes)?, message, case_sensitive)
    }

    fn parse_with(
        &self,
        matcher: &PrefixMatcher,
        message: &DiscordMessage,
        case_sensitive: bool,
    ) -> Result<ParsedText> {
        parse(
            matcher,
            &self.registry.index().text_by_name,
            message,
            case_sensitive,
            &self.options.text.arg_splitter,
        )
    }

    /// Parse `message` and run the matching text command. `case_sensitive`
    /// overrides the configured default for this call.
    pub async fn execute_command(
        &self,
        message: DiscordMessage,
        case_sensitive: Option<bool>,
    ) -> Result<Dispatch> {
        let matcher = self.prefix_matcher(&message).await?;
        let case_sensitive = case_sensitive.unwrap_or(self.options.text.case_sensitive);

        let (parsed, declaration) = match self.parse_with(&matcher, &message, case_sensitive)? {
            ParsedText::NotACommand => return Ok(Dispatch::Skipped(Skip::NotACommand)),
            ParsedText::NotFound => {
                self.respond_not_found(message).await?;
                return Ok(Dispatch::Skipped(Skip::CommandNotFound));
            }
            ParsedText::Command {
                message,
                declaration,
            } => (message, declaration),
        };

        if !declaration.is_bot_allowed(&self.options.bot_id) {
            return Ok(Dispatch::Skipped(Skip::BotNotAllowed));
        }

        if !self
            .guild_allowed(&declaration.guilds, parsed.message.guild_id)
            .await?
        {
            return Ok(Dispatch::Skipped(Skip::GuildNotAllowed));
        }

        if !declaration.direct_message && parsed.message.is_direct() {
            return Ok(Dispatch::Skipped(Skip::DirectMessageNotAllowed));
        }

        debug!(command = %declaration.name, prefix = %parsed.prefix, "Executing text command");
        let output = execute(
            &self.options.guards,
            &declaration.guards,
            &declaration.handler,
            Invocation::Text(parsed),
        )
        .await?;
        Ok(Dispatch::Handled(output))
    }

    async fn respond_not_found(&self, message: DiscordMessage) -> Result<()> {
        match &self.options.text.not_found {
            Some(NotFoundResponse::Reply(text)) => self.platform.reply(&message, text).await,
            Some(NotFoundResponse::Handler(handler)) => {
                handler(message).await.map_err(Error::Handler)
            }
            None => Ok(()),
        }
    }
}
