//! Dispatch outcomes, and the component and reaction dispatcher.
//!
//! Components and reactions may match several handlers. Every match that
//! survives the guild filter runs concurrently, and one failing handler
//! does not affect its siblings.

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod dispatch_tests;

use std::sync::Arc;

use discord_types::{ComponentInteraction, ComponentKind, ModalSubmit, Reaction, ReactionUser};
use futures::future::join_all;
use tracing::{debug, error, warn};

use crate::client::CommandClient;
use crate::declarations::{DeclaredComponent, DeclaredReaction};
use crate::error::Result;
use crate::handler::{execute, HandlerOutput, Invocation};
use crate::platform::Platform;

/// Why an inbound event did not reach a handler. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    HandlerNotFound,
    BotNotAllowed,
    GuildNotAllowed,
    DirectMessageNotAllowed,
    NotACommand,
    CommandNotFound,
}

/// Result of routing one inbound event
#[derive(Debug)]
pub enum Dispatch {
    Skipped(Skip),
    /// An option's autocomplete handler answered the request
    Autocompleted,
    /// One handler ran. `None` when a guard stopped it.
    Handled(Option<HandlerOutput>),
    /// Results of every surviving match, in declaration order
    Batch(Vec<Result<Option<HandlerOutput>>>),
}

impl Dispatch {
    pub fn skip_reason(&self) -> Option<Skip> {
        match self {
            Self::Skipped(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Number of handlers that were invoked.
    pub fn executed(&self) -> usize {
        match self {
            Self::Skipped(_) => 0,
            Self::Autocompleted | Self::Handled(_) => 1,
            Self::Batch(results) => results.len(),
        }
    }
}

/// Which declared component table an interaction is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentFamily {
    Button,
    SelectMenu,
    Modal,
}

impl From<ComponentKind> for ComponentFamily {
    fn from(kind: ComponentKind) -> Self {
        if kind.is_select_menu() {
            Self::SelectMenu
        } else {
            Self::Button
        }
    }
}

impl<P: Platform> CommandClient<P> {
    pub async fn execute_component(&self, interaction: ComponentInteraction) -> Result<Dispatch> {
        let family = ComponentFamily::from(interaction.kind);
        let custom_id = interaction.custom_id.clone();
        let guild_id = interaction.guild_id;
        self.dispatch_component(family, &custom_id, guild_id, Invocation::Component(interaction))
            .await
    }

    pub async fn execute_modal(&self, submit: ModalSubmit) -> Result<Dispatch> {
        let custom_id = submit.custom_id.clone();
        let guild_id = submit.guild_id;
        self.dispatch_component(ComponentFamily::Modal, &custom_id, guild_id, Invocation::Modal(submit))
            .await
    }

    async fn dispatch_component(
        &self,
        family: ComponentFamily,
        custom_id: &str,
        guild_id: Option<u64>,
        invocation: Invocation,
    ) -> Result<Dispatch> {
        let index = self.registry.index();
        let table = match family {
            ComponentFamily::Button => &index.buttons,
            ComponentFamily::SelectMenu => &index.select_menus,
            ComponentFamily::Modal => &index.modals,
        };

        let matches: Vec<&Arc<DeclaredComponent>> = table
            .iter()
            .filter(|c| c.matcher.is_match(custom_id) && c.is_bot_allowed(&self.options.bot_id))
            .collect();

        if matches.is_empty() {
            if !self.options.silent {
                warn!(
                    "{} >> {:?} component handler not found, interactionId: {}",
                    self.display_name(),
                    family,
                    custom_id
                );
            }
            return Ok(Dispatch::Skipped(Skip::HandlerNotFound));
        }

        let runs = matches.into_iter().map(|component| {
            let invocation = invocation.clone();
            async move {
                match self.guild_allowed(&component.guilds, guild_id).await {
                    Ok(false) => None,
                    Ok(true) => Some(
                        execute(
                            &self.options.guards,
                            &component.guards,
                            &component.handler,
                            invocation,
                        )
                        .await,
                    ),
                    Err(e) => Some(Err(e)),
                }
            }
        });

        let results = self.isolate(join_all(runs).await, custom_id);
        Ok(Dispatch::Batch(results))
    }

    /// Run every reaction handler declared for the reaction's emoji.
    pub async fn execute_reaction(&self, reaction: Reaction, user: ReactionUser) -> Result<Dispatch> {
        let index = self.registry.index();
        let keys: Vec<String> = reaction.emoji.keys().collect();

        let matches: Vec<&Arc<DeclaredReaction>> = index
            .reactions
            .iter()
            .filter(|r| keys.iter().any(|k| r.matches(k)) && r.is_bot_allowed(&self.options.bot_id))
            .collect();

        if matches.is_empty() {
            if !self.options.silent {
                warn!(
                    "{} >> reaction handler not found, emoji: {}",
                    self.display_name(),
                    keys.join(", ")
                );
            }
            return Ok(Dispatch::Skipped(Skip::HandlerNotFound));
        }

        let runs = matches.into_iter().map(|declared| {
            let reaction = reaction.clone();
            let user = user.clone();
            async move { self.run_reaction(declared, reaction, user).await.transpose() }
        });

        let label = keys.first().cloned().unwrap_or_default();
        let results = self.isolate(join_all(runs).await, &label);
        Ok(Dispatch::Batch(results))
    }

    /// `Ok(None)` when the handler was filtered out.
    async fn run_reaction(
        &self,
        declared: &DeclaredReaction,
        mut reaction: Reaction,
        mut user: ReactionUser,
    ) -> Result<Option<Option<HandlerOutput>>> {
        if !self.guild_allowed(&declared.guilds, reaction.guild_id).await? {
            return Ok(None);
        }

        if !declared.direct_message && reaction.guild_id.is_none() {
            return Ok(None);
        }

        if !declared.partial {
            if reaction.partial {
                reaction = self.platform.fetch_reaction(&reaction).await?;
            }
            if user.is_partial() {
                user = self.platform.fetch_user(user.id).await?.into();
            }
        }

        if declared.remove {
            self.platform.remove_reaction(&reaction, user.id).await?;
        }

        debug!(emoji = %declared.emoji, user_id = user.id, "Executing reaction handler");
        let output = execute(
            &self.options.guards,
            &declared.guards,
            &declared.handler,
            Invocation::Reaction { reaction, user },
        )
        .await?;
        Ok(Some(output))
    }

    /// Drop filtered matches and log failures without failing the batch.
    fn isolate(
        &self,
        results: Vec<Option<Result<Option<HandlerOutput>>>>,
        target: &str,
    ) -> Vec<Result<Option<HandlerOutput>>> {
        results
            .into_iter()
            .flatten()
            .inspect(|result| {
                if let Err(e) = result {
                    error!(target_id = %target, error = %e, "Handler failed");
                }
            })
            .collect()
    }
}
