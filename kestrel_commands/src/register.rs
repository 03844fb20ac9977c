//! Utilities for registering application commands

use kestrel_data::commands::{CommandDefinition, CommandKind, CommandRegistry, OptionKind};
use serenity::all::{
    Command, CommandOptionType, CreateCommand, CreateCommandOption, Http, Permissions,
};

const NO_DESCRIPTION: &str = "No description provided.";

fn option_type(kind: OptionKind) -> CommandOptionType {
    match kind {
        OptionKind::String => CommandOptionType::String,
        OptionKind::Integer => CommandOptionType::Integer,
        OptionKind::Number => CommandOptionType::Number,
        OptionKind::Boolean => CommandOptionType::Boolean,
        OptionKind::User => CommandOptionType::User,
        OptionKind::Channel => CommandOptionType::Channel,
        OptionKind::Role => CommandOptionType::Role,
        OptionKind::Mentionable => CommandOptionType::Mentionable,
    }
}

fn non_empty(text: &str) -> &str {
    if text.trim().is_empty() {
        NO_DESCRIPTION
    } else {
        text
    }
}

fn create_command(command: &CommandDefinition) -> Option<CreateCommand> {
    let data = command.data.as_ref()?;

    let mut builder = CreateCommand::new(&command.name)
        .description(non_empty(&command.description))
        .nsfw(command.nsfw);

    for option in &data.options {
        builder = builder.add_option(
            CreateCommandOption::new(
                option_type(option.kind),
                &option.name,
                non_empty(&option.description),
            )
            .required(option.required),
        );
    }

    Some(builder)
}

/// Builds the slash commands in discovery order, split into public and
/// owner-category commands.
#[must_use]
pub fn create_application_commands(
    registry: &CommandRegistry,
) -> (Vec<CreateCommand>, Vec<CreateCommand>) {
    let mut commands_builder = Vec::new();
    let mut owner_commands = Vec::new();

    for command in registry.list(CommandKind::Slash) {
        let Some(slash_command) = create_command(&command) else {
            continue;
        };

        if command.is_owner_only() {
            owner_commands.push(slash_command);
        } else {
            commands_builder.push(slash_command);
        }
    }

    (commands_builder, owner_commands)
}

/// Replaces the global command set with the registry's slash commands.
///
/// Owner commands are registered too, but hidden from members without
/// administrator permissions; the dispatcher still checks ownership.
pub async fn deploy(
    http: impl AsRef<Http>,
    registry: &CommandRegistry,
) -> Result<usize, serenity::Error> {
    let (commands, owner_commands) = create_application_commands(registry);
    let num_commands = commands.len();
    let num_owner = owner_commands.len();

    let all = commands
        .into_iter()
        .chain(
            owner_commands
                .into_iter()
                .map(|command| command.default_member_permissions(Permissions::ADMINISTRATOR)),
        )
        .collect();

    Command::set_global_commands(http, all).await?;
    tracing::info!("Registered {num_commands} commands and {num_owner} owner commands globally");
    Ok(num_commands + num_owner)
}

pub async fn undeploy(http: impl AsRef<Http>) -> Result<(), serenity::Error> {
    Command::set_global_commands(http, Vec::new()).await?;
    tracing::info!("Unregistered all global commands");
    Ok(())
}
