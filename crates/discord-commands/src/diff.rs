//! Command diff engine: compares one scope's registered commands with the
//! local declarations for that scope and produces the bulk payload.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use discord_types::{CommandDefinition, CommandType, InitCommandOptions, RemoteCommand};

use crate::declarations::DeclaredCommand;

/// Target of one sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SyncScope {
    Global,
    Guild(u64),
}

impl fmt::Display for SyncScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Guild(id) => write!(f, "guild: #{}", id),
        }
    }
}

/// A local declaration with its resolved guild set. `guild_scoped` is set
/// when the client or the declaration names any guild scope; such a
/// command is never global, even when its scopes resolve to no guild.
#[derive(Debug, Clone)]
pub struct LocalCommand {
    pub command: Arc<DeclaredCommand>,
    pub guild_scoped: bool,
    pub guilds: BTreeSet<u64>,
}

impl LocalCommand {
    fn in_scope(&self, scope: SyncScope) -> bool {
        match scope {
            SyncScope::Global => !self.guild_scoped,
            SyncScope::Guild(id) => self.guilds.contains(&id),
        }
    }
}

/// Partition of one scope's remote and local commands
#[derive(Debug)]
pub struct SyncPlan<'a> {
    pub scope: SyncScope,
    pub to_add: Vec<&'a DeclaredCommand>,
    pub to_update: Vec<(&'a RemoteCommand, &'a DeclaredCommand)>,
    pub to_skip: Vec<(&'a RemoteCommand, &'a DeclaredCommand)>,
    pub to_delete: Vec<&'a RemoteCommand>,
}

fn same_key(remote: &RemoteCommand, name: &str, kind: CommandType) -> bool {
    remote.name() == name && remote.kind() == kind
}

/// Structural comparison used to decide between skip and update. Guild
/// commands ignore `dm_permission`.
pub fn structurally_equal(scope: SyncScope, remote: &RemoteCommand, local: &DeclaredCommand) -> bool {
    let local = local.to_definition();
    match scope {
        SyncScope::Global => remote.definition.is_equivalent(&local),
        SyncScope::Guild(_) => remote.definition.is_equivalent_in_guild(&local),
    }
}

/// Match `remote` against the locals that belong to `scope` by
/// `(name, type)`. A local whose resolved guilds no longer include a guild
/// is out of that guild's scope, so the command registered there is
/// deleted even if the same declaration still targets other guilds.
pub fn plan<'a, F>(
    scope: SyncScope,
    remote: &'a [RemoteCommand],
    local: &'a [LocalCommand],
    equals: F,
) -> SyncPlan<'a>
where
    F: Fn(&RemoteCommand, &DeclaredCommand) -> bool,
{
    let in_scope: Vec<&'a DeclaredCommand> = local
        .iter()
        .filter(|l| l.in_scope(scope))
        .map(|l| l.command.as_ref())
        .collect();

    let mut plan = SyncPlan {
        scope,
        to_add: Vec::new(),
        to_update: Vec::new(),
        to_skip: Vec::new(),
        to_delete: Vec::new(),
    };

    for &command in &in_scope {
        match remote.iter().find(|r| same_key(r, command.name(), command.kind())) {
            Some(existing) if equals(existing, command) => plan.to_skip.push((existing, command)),
            Some(existing) => plan.to_update.push((existing, command)),
            None => plan.to_add.push(command),
        }
    }

    for existing in remote {
        let matched = in_scope
            .iter()
            .any(|c| same_key(existing, c.name(), c.kind()));
        if !matched {
            plan.to_delete.push(existing);
        }
    }

    plan
}

impl SyncPlan<'_> {
    /// True when the bulk replace would change something. Disabled
    /// categories still count, matching what the verbose log reports.
    pub fn has_changes(&self) -> bool {
        self.to_add.len() + self.to_update.len() + self.to_delete.len() > 0
    }

    /// Payload for the single bulk replace of this scope: skipped commands
    /// in their registered shape, then additions, then updates, then the
    /// registered shape of deletions when deletion is disabled.
    pub fn payload(&self, options: &InitCommandOptions) -> Vec<CommandDefinition> {
        let disable = options.disable;
        let mut payload: Vec<CommandDefinition> =
            self.to_skip.iter().map(|(r, _)| r.definition.clone()).collect();

        if !disable.add {
            payload.extend(self.to_add.iter().map(|c| c.to_definition()));
        }

        payload.extend(self.to_update.iter().map(|(remote, local)| {
            if disable.update {
                remote.definition.clone()
            } else {
                local.to_definition()
            }
        }));

        if disable.delete {
            payload.extend(self.to_delete.iter().map(|r| r.definition.clone()));
        }

        payload
    }

    /// Human-readable diff, one line per category.
    pub fn describe(&self, bot: &str, options: &InitCommandOptions) -> Vec<String> {
        let disable = options.disable;
        let names = |items: Vec<&str>| items.join(", ");
        let flag = |disabled: bool| if disabled { " [task disabled]" } else { "" };

        vec![
            format!(
                "{} >> commands >> {} >> adding {} [{}]{}",
                bot,
                self.scope,
                self.to_add.len(),
                names(self.to_add.iter().map(|c| c.name()).collect()),
                flag(disable.add)
            ),
            format!(
                "{} >> commands >> {} >> deleting {} [{}]{}",
                bot,
                self.scope,
                self.to_delete.len(),
                names(self.to_delete.iter().map(|r| r.name()).collect()),
                flag(disable.delete)
            ),
            format!(
                "{} >> commands >> {} >> skipping {} [{}]",
                bot,
                self.scope,
                self.to_skip.len(),
                names(self.to_skip.iter().map(|(_, c)| c.name()).collect())
            ),
            format!(
                "{} >> commands >> {} >> updating {} [{}]{}",
                bot,
                self.scope,
                self.to_update.len(),
                names(self.to_update.iter().map(|(_, c)| c.name()).collect()),
                flag(disable.update)
            ),
        ]
    }
}
