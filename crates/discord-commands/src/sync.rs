//! Guild and global sync orchestrators.

#[cfg(test)]
#[path = "sync_tests.rs"]
mod sync_tests;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use discord_types::{InitCommandOptions, SyncOptions};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::client::CommandClient;
use crate::declarations::DeclaredCommand;
use crate::diff::{plan, structurally_equal, LocalCommand, SyncPlan, SyncScope};
use crate::error::{Error, Result};
use crate::guild::resolve_guilds;
use crate::platform::Platform;

/// What one sync pass found and whether it issued the bulk replace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub scope: SyncScope,
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
    pub skipped: Vec<String>,
    pub applied: bool,
    /// Diff lines logged in verbose mode; empty when silent
    pub diff: Vec<String>,
}

impl SyncOutcome {
    fn from_plan(plan: &SyncPlan<'_>, applied: bool, diff: Vec<String>) -> Self {
        Self {
            scope: plan.scope,
            added: plan.to_add.iter().map(|c| c.name().to_string()).collect(),
            updated: plan.to_update.iter().map(|(_, c)| c.name().to_string()).collect(),
            deleted: plan.to_delete.iter().map(|r| r.name().to_string()).collect(),
            skipped: plan.to_skip.iter().map(|(_, c)| c.name().to_string()).collect(),
            applied,
            diff,
        }
    }
}

/// Outcome of every scope touched by [`CommandClient::init_application_commands`]
#[derive(Debug)]
pub struct SyncReport {
    pub global: Result<SyncOutcome>,
    pub guilds: BTreeMap<u64, Result<SyncOutcome>>,
}

/// Counts exposed on the health endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub scopes_synced: usize,
    pub scopes_failed: usize,
    pub guilds_unavailable: Vec<u64>,
}

impl SyncReport {
    pub fn unavailable_guilds(&self) -> Vec<u64> {
        self.guilds
            .iter()
            .filter(|(_, r)| matches!(r, Err(Error::GuildUnavailable(_))))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn summary(&self) -> SyncSummary {
        let results = std::iter::once(&self.global).chain(self.guilds.values());
        let unavailable = self.unavailable_guilds();
        let (ok, failed): (Vec<_>, Vec<_>) = results.partition(|r| r.is_ok());
        SyncSummary {
            scopes_synced: ok.len(),
            scopes_failed: failed.len() - unavailable.len(),
            guilds_unavailable: unavailable,
        }
    }
}

impl<P: Platform> CommandClient<P> {
    /// Guild ids from the client-level guild scopes.
    pub async fn bot_resolved_guilds(&self) -> Result<BTreeSet<u64>> {
        resolve_guilds(&self.options.bot_guilds, &self.platform.cached_guild_ids()).await
    }

    /// Resolve each command's guild set: client-level scopes plus its own.
    async fn scoped(&self, commands: &[Arc<DeclaredCommand>]) -> Result<Vec<LocalCommand>> {
        let cached = self.platform.cached_guild_ids();
        let cached = cached.as_slice();
        let resolved = join_all(commands.iter().map(|command| async move {
            let guilds = resolve_guilds(self.options.bot_guilds.iter().chain(&command.guilds), cached).await?;
            Ok::<_, Error>(LocalCommand {
                command: command.clone(),
                guild_scoped: !self.options.bot_guilds.is_empty() || !command.guilds.is_empty(),
                guilds,
            })
        }))
        .await;
        resolved.into_iter().collect()
    }

    fn allowed_application_commands(&self) -> Vec<Arc<DeclaredCommand>> {
        self.registry
            .index()
            .application_commands
            .iter()
            .filter(|c| c.is_bot_allowed(&self.options.bot_id))
            .cloned()
            .collect()
    }

    /// Every guild-scoped command, under each guild it resolves to.
    pub async fn commands_by_guild(&self) -> Result<BTreeMap<u64, Vec<Arc<DeclaredCommand>>>> {
        let mut by_guild: BTreeMap<u64, Vec<Arc<DeclaredCommand>>> = BTreeMap::new();
        for local in self.scoped(&self.allowed_application_commands()).await? {
            for guild_id in &local.guilds {
                by_guild.entry(*guild_id).or_default().push(local.command.clone());
            }
        }
        Ok(by_guild)
    }

    /// Sync every guild scope and the global scope concurrently. Only a
    /// failure to resolve guild scopes fails the call; per-scope failures
    /// are reported in the returned [`SyncReport`].
    pub async fn init_application_commands(&self, options: SyncOptions) -> Result<SyncReport> {
        let by_guild = self.commands_by_guild().await?;

        let guild_syncs = by_guild.iter().map(|(guild_id, commands)| async move {
            let result = self
                .init_guild_application_commands(*guild_id, commands, options.guild)
                .await;
            if let Err(e) = &result {
                if !matches!(e, Error::GuildUnavailable(_)) {
                    error!(guild_id = *guild_id, error = %e, "Guild command sync failed");
                }
            }
            (*guild_id, result)
        });

        let (guilds, global) = futures::join!(
            join_all(guild_syncs),
            self.init_global_application_commands(options.global)
        );

        if let Err(e) = &global {
            error!(error = %e, "Global command sync failed");
        }

        Ok(SyncReport {
            global,
            guilds: guilds.into_iter().collect(),
        })
    }

    /// Sync `commands` into one guild. Commands whose resolved guilds do
    /// not include `guild_id` are treated as absent there.
    pub async fn init_guild_application_commands(
        &self,
        guild_id: u64,
        commands: &[Arc<DeclaredCommand>],
        options: InitCommandOptions,
    ) -> Result<SyncOutcome> {
        if !self.platform.has_guild(guild_id) {
            warn!(
                "{} >> initGuildApplicationCommands: guild unavailable: {}",
                self.display_name(),
                guild_id
            );
            return Err(Error::GuildUnavailable(guild_id));
        }

        let allowed: Vec<Arc<DeclaredCommand>> = commands
            .iter()
            .filter(|c| c.is_bot_allowed(&self.options.bot_id))
            .cloned()
            .collect();
        let local = self.scoped(&allowed).await?;
        let remote = self.platform.fetch_guild_commands(guild_id).await?;

        let scope = SyncScope::Guild(guild_id);
        let plan = plan(scope, &remote, &local, |r, l| structurally_equal(scope, r, l));
        self.apply(&plan, &options).await
    }

    /// Sync every command declared without any guild scope into the
    /// global scope.
    pub async fn init_global_application_commands(&self, options: InitCommandOptions) -> Result<SyncOutcome> {
        if !self.platform.application_ready() {
            return Err(Error::NotReady);
        }

        let local = self.scoped(&self.allowed_application_commands()).await?;
        let remote: Vec<_> = self
            .platform
            .fetch_global_commands()
            .await?
            .into_iter()
            .filter(|r| r.guild_id.is_none())
            .collect();

        let scope = SyncScope::Global;
        let plan = plan(scope, &remote, &local, |r, l| structurally_equal(scope, r, l));
        self.apply(&plan, &options).await
    }

    async fn apply(&self, plan: &SyncPlan<'_>, options: &InitCommandOptions) -> Result<SyncOutcome> {
        // Verbose mode reports the diff even when nothing will be sent.
        let diff = if self.options.silent {
            Vec::new()
        } else {
            plan.describe(&self.display_name(), options)
        };
        for line in &diff {
            info!("{}", line);
        }

        if !plan.has_changes() {
            return Ok(SyncOutcome::from_plan(plan, false, diff));
        }

        let payload = plan.payload(options);
        match plan.scope {
            SyncScope::Global => self.platform.set_global_commands(&payload).await?,
            SyncScope::Guild(id) => self.platform.set_guild_commands(id, &payload).await?,
        }
        Ok(SyncOutcome::from_plan(plan, true, diff))
    }

    /// Remove every command from the listed guilds, or from the global
    /// scope when no guild is given. Guilds missing from the cache are
    /// skipped.
    pub async fn clear_application_commands(&self, guild_ids: &[u64]) -> Result<()> {
        if guild_ids.is_empty() {
            if !self.platform.application_ready() {
                return Err(Error::NotReady);
            }
            return self.platform.set_global_commands(&[]).await;
        }

        let clears = guild_ids.iter().map(|guild_id| async move {
            if !self.platform.has_guild(*guild_id) {
                warn!(guild_id = *guild_id, "Cannot clear commands of unavailable guild");
                return Ok(());
            }
            self.platform.set_guild_commands(*guild_id, &[]).await
        });

        join_all(clears).await.into_iter().collect()
    }
}
