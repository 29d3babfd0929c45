//! Interaction routing: command path extraction, lookup in the flattened
//! command index, autocomplete short-circuit and context-menu dispatch.

#[cfg(test)]
#[path = "router_tests.rs"]
mod router_tests;

use std::sync::Arc;

use discord_types::{CommandInteraction, CommandType, Interaction};
use tracing::warn;

use crate::client::CommandClient;
use crate::declarations::DeclaredCommand;
use crate::dispatch::{Dispatch, Skip};
use crate::error::{Error, Result};
use crate::handler::{execute, Invocation};
use crate::platform::Platform;

/// Command path of an interaction: the command name, then each subcommand
/// group and subcommand found by descending through the first option.
pub fn path_of(interaction: &CommandInteraction) -> Vec<String> {
    let mut path = vec![interaction.command_name.clone()];
    let mut options = interaction.options.as_slice();
    while let Some(first) = options.first().filter(|o| o.kind.is_branch()) {
        path.push(first.name.clone());
        options = first.options.as_slice();
    }
    path
}

/// Look `path` up in the flattened index. The path length decides which
/// of `group` and `subgroup` must be set.
pub fn resolve<'a>(flat: &'a [Arc<DeclaredCommand>], path: &[String]) -> Option<&'a Arc<DeclaredCommand>> {
    flat.iter().find(|cmd| {
        if cmd.kind() != CommandType::ChatInput {
            return false;
        }
        match path {
            [name] => cmd.group.is_none() && cmd.subgroup.is_none() && cmd.name() == name,
            [group, name] => {
                cmd.group.as_deref() == Some(group.as_str())
                    && cmd.subgroup.is_none()
                    && cmd.name() == name
            }
            [group, subgroup, name] => {
                cmd.group.as_deref() == Some(group.as_str())
                    && cmd.subgroup.as_deref() == Some(subgroup.as_str())
                    && cmd.name() == name
            }
            _ => false,
        }
    })
}

impl<P: Platform> CommandClient<P> {
    /// Route any interaction to its handler.
    pub async fn execute_interaction(&self, interaction: Interaction) -> Result<Dispatch> {
        match interaction {
            Interaction::Component(component) => self.execute_component(component).await,
            Interaction::Modal(submit) => self.execute_modal(submit).await,
            Interaction::Command(command) if command.command_type != CommandType::ChatInput => {
                self.execute_context_menu(command).await
            }
            Interaction::Command(command) => self.execute_command_interaction(command, false).await,
            Interaction::Autocomplete(command) => self.execute_command_interaction(command, true).await,
        }
    }

    /// Slash command or autocomplete request.
    pub async fn execute_command_interaction(
        &self,
        interaction: CommandInteraction,
        autocomplete: bool,
    ) -> Result<Dispatch> {
        let index = self.registry.index();
        let path = path_of(&interaction);

        let command = match resolve(&index.slashes_flat, &path) {
            Some(command) if command.is_bot_allowed(&self.options.bot_id) => command,
            found => {
                if !self.options.silent {
                    warn!(
                        "{} >> interaction not found, commandName: {}",
                        self.display_name(),
                        path.join(" ")
                    );
                }
                return Ok(Dispatch::Skipped(if found.is_some() {
                    Skip::BotNotAllowed
                } else {
                    Skip::HandlerNotFound
                }));
            }
        };

        if autocomplete {
            let focused = interaction.focused_option().map(|o| o.name.clone());
            let handler = focused
                .as_deref()
                .and_then(|name| command.option(name))
                .and_then(|option| option.autocomplete.clone());
            if let Some(handler) = handler {
                handler(interaction).await.map_err(Error::Handler)?;
                return Ok(Dispatch::Autocompleted);
            }
        }

        let Some(handler) = &command.handler else {
            return Ok(Dispatch::Skipped(Skip::HandlerNotFound));
        };

        let invocation = if autocomplete {
            Invocation::Autocomplete(interaction)
        } else {
            Invocation::Command(interaction)
        };
        let output = execute(&self.options.guards, &command.guards, handler, invocation).await?;
        Ok(Dispatch::Handled(output))
    }

    /// User or message context-menu command, matched by exact name.
    pub async fn execute_context_menu(&self, interaction: CommandInteraction) -> Result<Dispatch> {
        let index = self.registry.index();
        let table = match interaction.command_type {
            CommandType::User => &index.user_commands,
            CommandType::Message => &index.message_commands,
            CommandType::ChatInput => return self.execute_command_interaction(interaction, false).await,
        };

        let command = table
            .iter()
            .find(|cmd| cmd.name() == interaction.command_name)
            .filter(|cmd| cmd.is_bot_allowed(&self.options.bot_id));

        let Some((command, handler)) = command.and_then(|c| c.handler.as_ref().map(|h| (c, h))) else {
            if !self.options.silent {
                warn!(
                    "{} >> context interaction not found, name: {}",
                    self.display_name(),
                    interaction.command_name
                );
            }
            return Ok(Dispatch::Skipped(Skip::HandlerNotFound));
        };

        let output = execute(
            &self.options.guards,
            &command.guards,
            handler,
            Invocation::Command(interaction),
        )
        .await?;
        Ok(Dispatch::Handled(output))
    }
}
