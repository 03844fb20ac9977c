use std::sync::Arc;

use kestrel_data::{
    events::{BotClient, GatewayEvent},
    Error,
};

use super::guild_name;

pub async fn channel_create(event: Arc<GatewayEvent>, client: BotClient) -> Result<(), Error> {
    if let GatewayEvent::ChannelCreate(channel) = event.as_ref() {
        tracing::debug!(
            "[{}] #{} ({:?}) was created",
            guild_name(&client, channel.guild_id),
            channel.name,
            channel.kind
        );
    }
    Ok(())
}

pub async fn channel_delete(event: Arc<GatewayEvent>, client: BotClient) -> Result<(), Error> {
    if let GatewayEvent::ChannelDelete(channel) = event.as_ref() {
        tracing::debug!(
            "[{}] #{} ({:?}) was deleted",
            guild_name(&client, channel.guild_id),
            channel.name,
            channel.kind
        );
    }
    Ok(())
}
