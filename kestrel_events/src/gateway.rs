//! Bridges serenity's callbacks onto the event bus.

use std::sync::Arc;

use kestrel_data::{
    events::{BotClient, GatewayEvent},
    Data,
};
use serenity::all::{
    Context, EventHandler, Guild, GuildChannel, GuildId, Interaction, Member, Message, Ready,
    UnavailableGuild, User,
};
use serenity::async_trait;

/// Discord bot event handler
pub struct Gateway {
    data: Arc<Data>,
}

impl Gateway {
    #[must_use]
    pub fn new(data: Arc<Data>) -> Self {
        Self { data }
    }

    async fn emit(&self, ctx: Context, event: GatewayEvent) {
        let client = BotClient::new(Arc::clone(&self.data), Some(ctx));
        self.data.bus.emit(event, client).await;
    }
}

#[async_trait]
impl EventHandler for Gateway {
    async fn ready(&self, ctx: Context, ready: Ready) {
        self.emit(ctx, GatewayEvent::Ready(Box::new(ready))).await;
    }

    async fn message(&self, ctx: Context, new_message: Message) {
        self.emit(ctx, GatewayEvent::MessageCreate(Box::new(new_message)))
            .await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        self.emit(ctx, GatewayEvent::InteractionCreate(Box::new(interaction)))
            .await;
    }

    async fn guild_create(&self, ctx: Context, guild: Guild, is_new: Option<bool>) {
        let event = GatewayEvent::GuildCreate {
            guild: Box::new(guild),
            is_new,
        };
        self.emit(ctx, event).await;
    }

    async fn guild_delete(&self, ctx: Context, incomplete: UnavailableGuild, _full: Option<Guild>) {
        let event = GatewayEvent::GuildDelete {
            guild_id: incomplete.id,
            unavailable: incomplete.unavailable,
        };
        self.emit(ctx, event).await;
    }

    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        self.emit(ctx, GatewayEvent::GuildMemberAdd(Box::new(new_member)))
            .await;
    }

    async fn guild_member_removal(
        &self,
        ctx: Context,
        guild_id: GuildId,
        user: User,
        _member_data_if_available: Option<Member>,
    ) {
        let event = GatewayEvent::GuildMemberRemove {
            guild_id,
            user: user.id,
        };
        self.emit(ctx, event).await;
    }

    async fn channel_create(&self, ctx: Context, channel: GuildChannel) {
        self.emit(ctx, GatewayEvent::ChannelCreate(Box::new(channel)))
            .await;
    }

    async fn channel_delete(
        &self,
        ctx: Context,
        channel: GuildChannel,
        _messages: Option<Vec<Message>>,
    ) {
        self.emit(ctx, GatewayEvent::ChannelDelete(Box::new(channel)))
            .await;
    }
}
