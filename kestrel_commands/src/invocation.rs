//! [`Invocation`] backed by live gateway objects.

use std::sync::atomic::{AtomicBool, Ordering};

use kestrel_data::{
    invocation::{Invocation, OptionValue, SlashOption},
    Error,
};
use serenity::all::{
    ChannelId, CommandDataOption, CommandDataOptionValue, CommandInteraction, Context,
    CreateInteractionResponse, CreateInteractionResponseFollowup, CreateInteractionResponseMessage,
    GuildId, Message, UserId,
};
use serenity::async_trait;

async fn channel_is_nsfw(ctx: &Context, channel_id: ChannelId) -> bool {
    match channel_id.to_channel(ctx).await {
        Ok(channel) => channel.guild().is_some_and(|channel| channel.nsfw),
        Err(e) => {
            tracing::warn!("Unable to fetch channel {channel_id}: {e}");
            false
        }
    }
}

pub struct MessageInvocation {
    ctx: Context,
    message: Message,
    nsfw: bool,
}

impl MessageInvocation {
    pub async fn new(ctx: Context, message: Message) -> Self {
        let nsfw = if message.guild_id.is_some() {
            channel_is_nsfw(&ctx, message.channel_id).await
        } else {
            false
        };

        Self { ctx, message, nsfw }
    }
}

#[async_trait]
impl Invocation for MessageInvocation {
    fn author_id(&self) -> UserId {
        self.message.author.id
    }

    fn guild_id(&self) -> Option<GuildId> {
        self.message.guild_id
    }

    fn channel_id(&self) -> ChannelId {
        self.message.channel_id
    }

    fn is_nsfw(&self) -> bool {
        self.nsfw
    }

    fn describe(&self) -> String {
        format!(
            "message {} by {} in channel {}",
            self.message.id, self.message.author.id, self.message.channel_id
        )
    }

    fn serenity(&self) -> Option<&Context> {
        Some(&self.ctx)
    }

    async fn reply(&self, content: &str) -> Result<(), Error> {
        self.message.reply(&self.ctx, content).await?;
        Ok(())
    }

    async fn send(&self, content: &str) -> Result<(), Error> {
        self.message.channel_id.say(&self.ctx, content).await?;
        Ok(())
    }

    async fn leave_guild(&self) -> Result<(), Error> {
        if let Some(guild_id) = self.message.guild_id {
            guild_id.leave(&self.ctx).await?;
        }
        Ok(())
    }
}

/// An application command interaction. The first reply answers the
/// interaction, later ones are sent as followups.
pub struct InteractionInvocation {
    ctx: Context,
    interaction: CommandInteraction,
    nsfw: bool,
    responded: AtomicBool,
}

impl InteractionInvocation {
    pub async fn new(ctx: Context, interaction: CommandInteraction) -> Self {
        let nsfw = if interaction.guild_id.is_some() {
            channel_is_nsfw(&ctx, interaction.channel_id).await
        } else {
            false
        };

        Self {
            ctx,
            interaction,
            nsfw,
            responded: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn options(&self) -> Vec<SlashOption> {
        convert_options(&self.interaction.data.options)
    }
}

#[async_trait]
impl Invocation for InteractionInvocation {
    fn author_id(&self) -> UserId {
        self.interaction.user.id
    }

    fn guild_id(&self) -> Option<GuildId> {
        self.interaction.guild_id
    }

    fn channel_id(&self) -> ChannelId {
        self.interaction.channel_id
    }

    fn is_nsfw(&self) -> bool {
        self.nsfw
    }

    fn describe(&self) -> String {
        format!(
            "/{} by {} in channel {}",
            self.interaction.data.name, self.interaction.user.id, self.interaction.channel_id
        )
    }

    fn serenity(&self) -> Option<&Context> {
        Some(&self.ctx)
    }

    async fn reply(&self, content: &str) -> Result<(), Error> {
        if self.responded.swap(true, Ordering::SeqCst) {
            let followup = CreateInteractionResponseFollowup::new().content(content);
            self.interaction.create_followup(&self.ctx, followup).await?;
        } else {
            let message = CreateInteractionResponseMessage::new().content(content);
            self.interaction
                .create_response(&self.ctx, CreateInteractionResponse::Message(message))
                .await?;
        }
        Ok(())
    }

    async fn send(&self, content: &str) -> Result<(), Error> {
        self.interaction.channel_id.say(&self.ctx, content).await?;
        Ok(())
    }

    async fn leave_guild(&self) -> Result<(), Error> {
        if let Some(guild_id) = self.interaction.guild_id {
            guild_id.leave(&self.ctx).await?;
        }
        Ok(())
    }
}

#[must_use]
pub fn convert_options(options: &[CommandDataOption]) -> Vec<SlashOption> {
    options
        .iter()
        .map(|option| SlashOption {
            name: option.name.clone(),
            value: convert_value(&option.value),
        })
        .collect()
}

fn convert_value(value: &CommandDataOptionValue) -> OptionValue {
    match value {
        CommandDataOptionValue::String(s) => OptionValue::String(s.clone()),
        CommandDataOptionValue::Integer(i) => OptionValue::Integer(*i),
        CommandDataOptionValue::Number(n) => OptionValue::Number(*n),
        CommandDataOptionValue::Boolean(b) => OptionValue::Boolean(*b),
        CommandDataOptionValue::User(id) => OptionValue::User(*id),
        CommandDataOptionValue::Channel(id) => OptionValue::Channel(*id),
        CommandDataOptionValue::Role(id) => OptionValue::Role(*id),
        CommandDataOptionValue::Mentionable(id) => OptionValue::Mentionable(id.get()),
        CommandDataOptionValue::SubCommand(options)
        | CommandDataOptionValue::SubCommandGroup(options) => {
            OptionValue::SubCommand(convert_options(options))
        }
        _ => OptionValue::Unsupported,
    }
}
