//! Serenity model → `discord-types` conversions

use discord_types::{
    CommandInteraction, CommandType, ComponentInteraction, ComponentKind, DiscordMessage, DiscordUser, Emoji,
    Interaction, InteractionOption, ModalSubmit, OptionType, Reaction, ReactionUser, RemoteCommand,
};
use serenity::model::application::{
    ActionRowComponent, Command, CommandDataOption, CommandDataOptionValue,
    CommandInteraction as SerenityCommand, ComponentInteraction as SerenityComponent,
    ComponentInteractionDataKind, Interaction as SerenityInteraction, ModalInteraction,
};
use serenity::model::channel::{Message, Reaction as SerenityReaction, ReactionType};
use serenity::model::id::EmojiId;
use serenity::model::user::User;

pub fn user(user: &User) -> DiscordUser {
    DiscordUser {
        id: user.id.get(),
        username: user.name.clone(),
        global_name: user.global_name.clone(),
        bot: user.bot,
    }
}

pub fn message(msg: &Message) -> DiscordMessage {
    DiscordMessage {
        id: msg.id.get(),
        channel_id: msg.channel_id.get(),
        guild_id: msg.guild_id.map(|g| g.get()),
        author: user(&msg.author),
        content: msg.content.clone(),
    }
}

/// Registered command snapshot. The definition goes through serde since
/// both sides share Discord's JSON shape.
pub fn remote_command(command: &Command) -> serde_json::Result<RemoteCommand> {
    let definition = serde_json::from_value(serde_json::to_value(command)?)?;
    Ok(RemoteCommand {
        id: command.id.get(),
        guild_id: command.guild_id.map(|g| g.get()),
        definition,
    })
}

pub fn emoji(reaction_type: &ReactionType) -> Emoji {
    match reaction_type {
        ReactionType::Custom { animated, id, name } => Emoji {
            id: Some(id.get()),
            name: name.clone(),
            animated: *animated,
        },
        ReactionType::Unicode(name) => Emoji::unicode(name.clone()),
        #[allow(unreachable_patterns)]
        _ => Emoji {
            id: None,
            name: None,
            animated: false,
        },
    }
}

pub fn reaction_type(emoji: &Emoji) -> ReactionType {
    match emoji.id {
        Some(id) => ReactionType::Custom {
            animated: emoji.animated,
            id: EmojiId::new(id),
            name: emoji.name.clone(),
        },
        None => ReactionType::Unicode(emoji.name.clone().unwrap_or_default()),
    }
}

/// Gateway reactions never carry a count, so they are always partial.
/// The user is full only when the guild member came along.
pub fn reaction(reaction: &SerenityReaction) -> Option<(Reaction, ReactionUser)> {
    let user_id = reaction.user_id?.get();
    let reacting = match &reaction.member {
        Some(member) => ReactionUser::from(user(&member.user)),
        None => ReactionUser::partial(user_id),
    };
    Some((
        Reaction {
            channel_id: reaction.channel_id.get(),
            message_id: reaction.message_id.get(),
            guild_id: reaction.guild_id.map(|g| g.get()),
            emoji: emoji(&reaction.emoji),
            count: None,
            partial: true,
        },
        reacting,
    ))
}

/// `None` for interaction kinds the router does not handle (pings).
pub fn interaction(interaction: &SerenityInteraction) -> Option<Interaction> {
    match interaction {
        SerenityInteraction::Command(cmd) => command(cmd).map(Interaction::Command),
        SerenityInteraction::Autocomplete(cmd) => command(cmd).map(Interaction::Autocomplete),
        SerenityInteraction::Component(comp) => component(comp).map(Interaction::Component),
        SerenityInteraction::Modal(modal) => Some(Interaction::Modal(modal_submit(modal))),
        _ => None,
    }
}

fn command(cmd: &SerenityCommand) -> Option<CommandInteraction> {
    let command_type = CommandType::try_from(u8::from(cmd.data.kind)).ok()?;
    Some(CommandInteraction {
        id: cmd.id.get(),
        token: cmd.token.clone(),
        command_id: cmd.data.id.get(),
        command_name: cmd.data.name.clone(),
        command_type,
        guild_id: cmd.guild_id.map(|g| g.get()),
        channel_id: cmd.channel_id.get(),
        user: user(&cmd.user),
        options: options(&cmd.data.options),
        target_id: cmd.data.target_id.map(|t| t.get()),
    })
}

fn options(options: &[CommandDataOption]) -> Vec<InteractionOption> {
    options.iter().filter_map(option).collect()
}

fn option(opt: &CommandDataOption) -> Option<InteractionOption> {
    let kind = OptionType::try_from(u8::from(opt.value.kind())).ok()?;
    Some(match &opt.value {
        CommandDataOptionValue::SubCommand(children) | CommandDataOptionValue::SubCommandGroup(children) => {
            InteractionOption::branch(kind, opt.name.clone(), self::options(children))
        }
        value => {
            let mut leaf = InteractionOption::leaf(kind, opt.name.clone(), option_value(value));
            leaf.focused = matches!(value, CommandDataOptionValue::Autocomplete { .. });
            leaf
        }
    })
}

/// Snowflakes travel as strings, the way Discord sends them.
fn option_value(value: &CommandDataOptionValue) -> serde_json::Value {
    match value {
        CommandDataOptionValue::Autocomplete { value, .. } => value.clone().into(),
        CommandDataOptionValue::Boolean(b) => (*b).into(),
        CommandDataOptionValue::Integer(i) => (*i).into(),
        CommandDataOptionValue::Number(n) => (*n).into(),
        CommandDataOptionValue::String(s) => s.clone().into(),
        CommandDataOptionValue::Attachment(id) => id.to_string().into(),
        CommandDataOptionValue::Channel(id) => id.to_string().into(),
        CommandDataOptionValue::Mentionable(id) => id.to_string().into(),
        CommandDataOptionValue::Role(id) => id.to_string().into(),
        CommandDataOptionValue::User(id) => id.to_string().into(),
        _ => serde_json::Value::Null,
    }
}

fn component(comp: &SerenityComponent) -> Option<ComponentInteraction> {
    let (kind, values) = match &comp.data.kind {
        ComponentInteractionDataKind::Button => (ComponentKind::Button, Vec::new()),
        ComponentInteractionDataKind::StringSelect { values } => (ComponentKind::StringSelect, values.clone()),
        ComponentInteractionDataKind::UserSelect { values } => (ComponentKind::UserSelect, ids(values)),
        ComponentInteractionDataKind::RoleSelect { values } => (ComponentKind::RoleSelect, ids(values)),
        ComponentInteractionDataKind::MentionableSelect { values } => {
            (ComponentKind::MentionableSelect, ids(values))
        }
        ComponentInteractionDataKind::ChannelSelect { values } => (ComponentKind::ChannelSelect, ids(values)),
        _ => return None,
    };
    Some(ComponentInteraction {
        id: comp.id.get(),
        token: comp.token.clone(),
        custom_id: comp.data.custom_id.clone(),
        kind,
        values,
        guild_id: comp.guild_id.map(|g| g.get()),
        channel_id: comp.channel_id.get(),
        message_id: Some(comp.message.id.get()),
        user: user(&comp.user),
    })
}

fn ids<T: ToString>(values: &[T]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

fn modal_submit(modal: &ModalInteraction) -> ModalSubmit {
    let fields = modal
        .data
        .components
        .iter()
        .flat_map(|row| row.components.iter())
        .filter_map(|component| match component {
            ActionRowComponent::InputText(input) => {
                Some((input.custom_id.clone(), input.value.clone().unwrap_or_default()))
            }
            _ => None,
        })
        .collect();
    ModalSubmit {
        id: modal.id.get(),
        token: modal.token.clone(),
        custom_id: modal.data.custom_id.clone(),
        guild_id: modal.guild_id.map(|g| g.get()),
        channel_id: modal.channel_id.get(),
        user: user(&modal.user),
        fields,
    }
}
