//! Declaration registry: collects declarations at start-up and builds the
//! read-only indexes the sync orchestrators and dispatchers consume.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use discord_types::{CommandType, OptionType};
use futures::future::{join_all, BoxFuture};

use crate::declarations::{
    DeclaredCommand, DeclaredComponent, DeclaredEvent, DeclaredOption, DeclaredReaction,
    DeclaredTextCommand, GroupDeclaration,
};
use crate::emitter::{Listener, ListenerResults};
use crate::error::{Error, Result};
use crate::handler::{execute, GuardRef, Invocation};

/// Identity of an event binding
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub event: String,
    pub once: bool,
    pub rest: bool,
}

/// Descriptor passed to [`Registry::trigger`]
#[derive(Clone)]
pub struct TriggerEventData {
    pub event: String,
    pub once: bool,
    pub rest: bool,
    pub guards: Vec<GuardRef>,
}

impl TriggerEventData {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            once: false,
            rest: false,
            guards: Vec::new(),
        }
    }
}

/// Indexes produced by [`Registry::build`]
#[derive(Debug, Default)]
pub struct Index {
    /// Top-level commands as registered with Discord: ungrouped slash
    /// commands, one assembled command per slash group, context menus.
    pub application_commands: Vec<Arc<DeclaredCommand>>,
    /// Every slash leaf, grouped ones carrying `group`/`subgroup`.
    pub slashes_flat: Vec<Arc<DeclaredCommand>>,
    pub user_commands: Vec<Arc<DeclaredCommand>>,
    pub message_commands: Vec<Arc<DeclaredCommand>>,
    pub buttons: Vec<Arc<DeclaredComponent>>,
    pub select_menus: Vec<Arc<DeclaredComponent>>,
    pub modals: Vec<Arc<DeclaredComponent>>,
    pub reactions: Vec<Arc<DeclaredReaction>>,
    pub text_commands: Vec<Arc<DeclaredTextCommand>>,
    /// Name or alias → command
    pub text_by_name: Vec<(String, Arc<DeclaredTextCommand>)>,
    /// Distinct command-specific prefixes
    pub mapped_prefixes: Vec<String>,
    pub events: Vec<Arc<DeclaredEvent>>,
    /// Distinct event bindings, in declaration order
    pub used_events: Vec<EventKey>,
}

/// Append-only set of declarations
#[derive(Default)]
pub struct Registry {
    commands: Vec<DeclaredCommand>,
    groups: Vec<GroupDeclaration>,
    buttons: Vec<DeclaredComponent>,
    select_menus: Vec<DeclaredComponent>,
    modals: Vec<DeclaredComponent>,
    reactions: Vec<DeclaredReaction>,
    text_commands: Vec<DeclaredTextCommand>,
    events: Vec<DeclaredEvent>,
    index: OnceLock<Index>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slash or context-menu command.
    pub fn command(mut self, command: DeclaredCommand) -> Self {
        self.commands.push(command);
        self
    }

    pub fn group(mut self, group: GroupDeclaration) -> Self {
        self.groups.push(group);
        self
    }

    pub fn button(mut self, button: DeclaredComponent) -> Self {
        self.buttons.push(button);
        self
    }

    pub fn select_menu(mut self, menu: DeclaredComponent) -> Self {
        self.select_menus.push(menu);
        self
    }

    pub fn modal(mut self, modal: DeclaredComponent) -> Self {
        self.modals.push(modal);
        self
    }

    pub fn reaction(mut self, reaction: DeclaredReaction) -> Self {
        self.reactions.push(reaction);
        self
    }

    pub fn text_command(mut self, command: DeclaredTextCommand) -> Self {
        self.text_commands.push(command);
        self
    }

    pub fn event(mut self, event: DeclaredEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn is_built(&self) -> bool {
        self.index.get().is_some()
    }

    /// Built indexes, or an empty index before [`build`](Self::build).
    pub fn index(&self) -> &Index {
        static EMPTY: OnceLock<Index> = OnceLock::new();
        self.index
            .get()
            .unwrap_or_else(|| EMPTY.get_or_init(Index::default))
    }

    /// Assemble and index every declaration. Repeat calls are no-ops.
    pub fn build(&self) -> Result<()> {
        if self.is_built() {
            return Ok(());
        }
        let index = self.assemble()?;
        let _ = self.index.set(index);
        Ok(())
    }

    fn assemble(&self) -> Result<Index> {
        let mut index = Index::default();

        let mut ungrouped = Vec::new();
        for command in &self.commands {
            match command.kind() {
                CommandType::User => index.user_commands.push(Arc::new(command.clone())),
                CommandType::Message => index.message_commands.push(Arc::new(command.clone())),
                CommandType::ChatInput => {
                    let leaf = Arc::new(self.inherit_group_scope(command)?);
                    if leaf.group.is_none() {
                        ungrouped.push(leaf.clone());
                    }
                    index.slashes_flat.push(leaf);
                }
            }
        }

        index.application_commands.extend(ungrouped);
        index.application_commands.extend(self.assemble_groups());
        index.application_commands.extend(index.user_commands.iter().cloned());
        index.application_commands.extend(index.message_commands.iter().cloned());
        check_ambiguous(&index.application_commands)?;

        index.buttons = self.buttons.iter().cloned().map(Arc::new).collect();
        index.select_menus = self.select_menus.iter().cloned().map(Arc::new).collect();
        index.modals = self.modals.iter().cloned().map(Arc::new).collect();
        index.reactions = self.reactions.iter().cloned().map(Arc::new).collect();

        index.text_commands = self.text_commands.iter().cloned().map(Arc::new).collect();
        for command in &index.text_commands {
            for name in std::iter::once(&command.name).chain(&command.aliases) {
                index.text_by_name.push((name.clone(), command.clone()));
            }
            for prefix in &command.prefixes {
                if !index.mapped_prefixes.contains(prefix) {
                    index.mapped_prefixes.push(prefix.clone());
                }
            }
        }

        index.events = self.events.iter().cloned().map(Arc::new).collect();
        for event in &index.events {
            let key = EventKey {
                event: event.event.clone(),
                once: event.once,
                rest: event.rest,
            };
            if !index.used_events.contains(&key) {
                index.used_events.push(key);
            }
        }

        Ok(index)
    }

    fn find_group(&self, name: &str, parent: Option<&str>) -> Option<&GroupDeclaration> {
        self.groups
            .iter()
            .find(|g| g.name() == name && g.parent.as_deref() == parent)
    }

    /// Grouped leaves take the top-level group's guilds and bot ids when
    /// they declare none of their own.
    fn inherit_group_scope(&self, command: &DeclaredCommand) -> Result<DeclaredCommand> {
        let Some(group_name) = command.group.as_deref() else {
            return Ok(command.clone());
        };
        let group = self
            .find_group(group_name, None)
            .ok_or_else(|| Error::UnknownGroup(group_name.to_string()))?;

        let mut leaf = command.clone();
        if leaf.guilds.is_empty() {
            leaf.guilds = group.guilds.clone();
        }
        if leaf.bot_ids.is_empty() {
            leaf.bot_ids = group.bot_ids.clone();
        }
        Ok(leaf)
    }

    fn assemble_groups(&self) -> Vec<Arc<DeclaredCommand>> {
        let mut group_names: Vec<&str> = Vec::new();
        for command in &self.commands {
            if let Some(group) = command.group.as_deref() {
                if !group_names.contains(&group) {
                    group_names.push(group);
                }
            }
        }

        group_names
            .into_iter()
            .filter_map(|name| self.find_group(name, None).map(|g| self.assemble_group(g)))
            .map(Arc::new)
            .collect()
    }

    fn assemble_group(&self, group: &GroupDeclaration) -> DeclaredCommand {
        let members: Vec<&DeclaredCommand> = self
            .commands
            .iter()
            .filter(|c| c.group.as_deref() == Some(group.name()))
            .collect();

        let mut options: Vec<DeclaredOption> = Vec::new();
        let mut subgroups: Vec<&str> = Vec::new();

        for member in &members {
            match member.subgroup.as_deref() {
                None => options.push(subcommand(member)),
                Some(sub) if !subgroups.contains(&sub) => subgroups.push(sub),
                Some(_) => {}
            }
        }

        for sub in subgroups {
            let description = self
                .find_group(sub, Some(group.name()))
                .map(|g| g.base.description.clone())
                .unwrap_or_else(|| sub.to_string());
            let mut branch = DeclaredOption::new(OptionType::SubCommandGroup, sub, description);
            branch.options = members
                .iter()
                .filter(|m| m.subgroup.as_deref() == Some(sub))
                .map(|m| subcommand(m))
                .collect();
            options.push(branch);
        }

        DeclaredCommand {
            base: group.base.clone(),
            group: None,
            subgroup: None,
            options,
            guilds: group.guilds.clone(),
            bot_ids: group.bot_ids.clone(),
            guards: Vec::new(),
            handler: None,
            label: group.name().to_string(),
        }
    }

    /// Listener running every event handler declared for `data`'s
    /// `(event, once, rest)` triple through the guard chain.
    pub fn trigger(&self, data: TriggerEventData) -> Listener {
        let handlers: Arc<Vec<Arc<DeclaredEvent>>> = Arc::new(
            self.index()
                .events
                .iter()
                .filter(|e| e.event == data.event && e.once == data.once && e.rest == data.rest)
                .cloned()
                .collect(),
        );
        let guards = Arc::new(data.guards);
        let name = data.event;

        Arc::new(move |payload: serde_json::Value| -> BoxFuture<'static, ListenerResults> {
            let handlers = handlers.clone();
            let guards = guards.clone();
            let name = name.clone();
            Box::pin(async move {
                let runs = handlers.iter().map(|declared| {
                    execute(
                        &guards,
                        &declared.guards,
                        &declared.handler,
                        Invocation::Event {
                            name: name.clone(),
                            payload: payload.clone(),
                        },
                    )
                });
                join_all(runs).await
            })
        })
    }
}

fn subcommand(leaf: &DeclaredCommand) -> DeclaredOption {
    let mut option = DeclaredOption::new(OptionType::SubCommand, leaf.name(), leaf.base.description.clone());
    option.definition.name_localizations = leaf.base.name_localizations.clone();
    option.definition.description_localizations = leaf.base.description_localizations.clone();
    option.options = leaf.options.clone();
    option
}

/// Two declarations with the same `(name, kind)` collide when they can run
/// as the same bot and can land in the same scope. A global declaration and
/// a guild-scoped one never share a scope; literal guild sets collide only
/// when they intersect; dynamic scopes are assumed to collide.
fn check_ambiguous(commands: &[Arc<DeclaredCommand>]) -> Result<()> {
    for (i, a) in commands.iter().enumerate() {
        for b in &commands[i + 1..] {
            if a.name() != b.name() || a.kind() != b.kind() {
                continue;
            }
            let bots_overlap = a.bot_ids.is_empty()
                || b.bot_ids.is_empty()
                || a.bot_ids.iter().any(|id| b.bot_ids.contains(id));
            if !bots_overlap {
                continue;
            }

            let scope = match (a.guilds.is_empty(), b.guilds.is_empty()) {
                (true, true) => "the global scope".to_string(),
                (true, false) | (false, true) => continue,
                (false, false) => match (literal_guilds(a), literal_guilds(b)) {
                    (Some(ga), Some(gb)) => {
                        let shared: Vec<u64> = ga.intersection(&gb).copied().collect();
                        if shared.is_empty() {
                            continue;
                        }
                        format!("guilds {:?}", shared)
                    }
                    _ => "a resolved guild scope".to_string(),
                },
            };

            return Err(Error::AmbiguousDeclaration {
                name: a.name().to_string(),
                kind: a.kind(),
                scope,
            });
        }
    }
    Ok(())
}

/// Guild ids when every scope is a literal id.
fn literal_guilds(command: &DeclaredCommand) -> Option<BTreeSet<u64>> {
    command.guilds.iter().map(|g| g.as_id()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declarations::ComponentMatcher;
    use crate::handler::handler;

    fn noop() -> crate::handler::Handler {
        handler(|_| async { Ok(serde_json::Value::Null) })
    }

    fn admin_registry() -> Registry {
        Registry::new()
            .group(GroupDeclaration::new("admin", "Admin tools").with_guild(1))
            .group(GroupDeclaration::new("user", "User moderation").subgroup_of("admin"))
            .command(DeclaredCommand::slash("ping", "Ping").with_handler(noop()))
            .command(
                DeclaredCommand::slash("ban", "Ban a user")
                    .in_subgroup("admin", "user")
                    .with_option(DeclaredOption::new(OptionType::User, "target", "Who").required())
                    .with_handler(noop()),
            )
            .command(
                DeclaredCommand::slash("status", "Server status")
                    .in_group("admin")
                    .with_handler(noop()),
            )
            .command(DeclaredCommand::user("Inspect").with_handler(noop()))
    }

    #[test]
    fn test_index_empty_before_build() {
        let registry = admin_registry();
        assert!(!registry.is_built());
        assert!(registry.index().application_commands.is_empty());
    }

    #[test]
    fn test_build_assembles_groups() {
        let registry = admin_registry();
        registry.build().unwrap();
        let index = registry.index();

        let names: Vec<&str> = index.application_commands.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["ping", "admin", "Inspect"]);

        let admin = index.application_commands[1].to_definition();
        assert_eq!(admin.description, "Admin tools");
        assert_eq!(admin.options.len(), 2);
        assert_eq!(admin.options[0].kind, OptionType::SubCommand);
        assert_eq!(admin.options[0].name, "status");
        assert_eq!(admin.options[1].kind, OptionType::SubCommandGroup);
        assert_eq!(admin.options[1].description, "User moderation");
        assert_eq!(admin.options[1].options[0].name, "ban");
        assert_eq!(admin.options[1].options[0].options[0].name, "target");
    }

    #[test]
    fn test_flat_index_inherits_group_scope() {
        let registry = admin_registry();
        registry.build().unwrap();
        let flat = &registry.index().slashes_flat;
        assert_eq!(flat.len(), 3);
        let ban = flat.iter().find(|c| c.name() == "ban").unwrap();
        assert_eq!(ban.group.as_deref(), Some("admin"));
        assert_eq!(ban.subgroup.as_deref(), Some("user"));
        assert_eq!(ban.guilds[0].as_id(), Some(1));
    }

    #[test]
    fn test_build_is_idempotent() {
        let registry = admin_registry();
        registry.build().unwrap();
        registry.build().unwrap();
        assert_eq!(registry.index().application_commands.len(), 3);
    }

    #[test]
    fn test_unknown_group_is_rejected() {
        let registry = Registry::new().command(
            DeclaredCommand::slash("kick", "Kick")
                .in_group("mod")
                .with_handler(noop()),
        );
        assert!(matches!(registry.build(), Err(Error::UnknownGroup(g)) if g == "mod"));
    }

    #[test]
    fn test_duplicate_global_commands_are_ambiguous() {
        let registry = Registry::new()
            .command(DeclaredCommand::slash("ping", "One").with_handler(noop()))
            .command(DeclaredCommand::slash("ping", "Two").with_handler(noop()));
        let err = registry.build().unwrap_err();
        assert!(matches!(err, Error::AmbiguousDeclaration { ref name, .. } if name == "ping"));
    }

    #[test]
    fn test_same_name_in_disjoint_guilds_or_types_is_allowed() {
        let registry = Registry::new()
            .command(DeclaredCommand::slash("ping", "One").with_guild(1).with_handler(noop()))
            .command(DeclaredCommand::slash("ping", "Two").with_guild(2).with_handler(noop()))
            .command(DeclaredCommand::user("ping").with_handler(noop()));
        assert!(registry.build().is_ok());
    }

    #[test]
    fn test_same_name_for_disjoint_bots_is_allowed() {
        let registry = Registry::new()
            .command(DeclaredCommand::slash("ping", "A").with_bot_id("a").with_handler(noop()))
            .command(DeclaredCommand::slash("ping", "B").with_bot_id("b").with_handler(noop()));
        assert!(registry.build().is_ok());

        let registry = Registry::new()
            .command(DeclaredCommand::slash("ping", "A").with_bot_id("a").with_handler(noop()))
            .command(DeclaredCommand::slash("ping", "Any bot").with_handler(noop()));
        assert!(registry.build().is_err());
    }

    #[test]
    fn test_global_and_guild_declarations_do_not_collide() {
        let registry = Registry::new()
            .command(DeclaredCommand::slash("ping", "Global").with_handler(noop()))
            .command(DeclaredCommand::slash("ping", "Guild").with_guild(1).with_handler(noop()));
        assert!(registry.build().is_ok());

        let registry = Registry::new()
            .command(DeclaredCommand::slash("ping", "A").with_guild(1).with_guild(2).with_handler(noop()))
            .command(DeclaredCommand::slash("ping", "B").with_guild(2).with_handler(noop()));
        let err = registry.build().unwrap_err();
        assert_eq!(
            err.to_string(),
            "chat_input command 'ping' is declared more than once for guilds [2]"
        );
    }

    #[test]
    fn test_text_index_and_mapped_prefixes() {
        let registry = Registry::new()
            .text_command(
                DeclaredTextCommand::new("ping", noop())
                    .with_alias("p")
                    .with_prefix("?"),
            )
            .text_command(DeclaredTextCommand::new("help", noop()).with_prefix("?"));
        registry.build().unwrap();
        let index = registry.index();
        let names: Vec<&str> = index.text_by_name.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["ping", "p", "help"]);
        assert_eq!(index.mapped_prefixes, vec!["?".to_string()]);
    }

    #[test]
    fn test_components_are_indexed_per_family() {
        let registry = Registry::new()
            .button(DeclaredComponent::exact("ok", noop()))
            .select_menu(DeclaredComponent::new(
                ComponentMatcher::pattern("^role-").unwrap(),
                noop(),
            ))
            .modal(DeclaredComponent::exact("feedback", noop()));
        registry.build().unwrap();
        let index = registry.index();
        assert_eq!(index.buttons.len(), 1);
        assert_eq!(index.select_menus.len(), 1);
        assert_eq!(index.modals.len(), 1);
    }

    #[tokio::test]
    async fn test_trigger_runs_matching_event_handlers() {
        let registry = Registry::new()
            .event(DeclaredEvent::on(
                "guildCreate",
                handler(|inv| async move {
                    match inv {
                        Invocation::Event { payload, .. } => Ok(payload),
                        _ => Ok(serde_json::Value::Null),
                    }
                }),
            ))
            .event(DeclaredEvent::once("guildCreate", noop()))
            .event(DeclaredEvent::on("guildCreate", noop()));
        registry.build().unwrap();
        assert_eq!(registry.index().used_events.len(), 2);

        let listener = registry.trigger(TriggerEventData::new("guildCreate"));
        let results = listener(serde_json::json!({"id": 5})).await;
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0].as_ref().unwrap(),
            &Some(serde_json::json!({"id": 5}))
        );
    }
}
