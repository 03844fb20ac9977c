use std::sync::Arc;

use kestrel_data::{
    events::{BotClient, GatewayEvent},
    Data, Error,
};
use serenity::all::GuildId;

use super::guild_name;

fn marked_for_leaving(data: &Data, guild_id: GuildId) -> bool {
    data.store.blacklist().servers.leave.contains(&guild_id)
}

pub async fn guild_create(event: Arc<GatewayEvent>, client: BotClient) -> Result<(), Error> {
    let GatewayEvent::GuildCreate { guild, is_new } = event.as_ref() else {
        return Ok(());
    };

    if marked_for_leaving(&client.data, guild.id) {
        tracing::info!("Leaving blacklisted guild {} ({})", guild.name, guild.id);
        if let Some(ctx) = &client.serenity {
            guild.id.leave(&ctx.http).await?;
        }
        return Ok(());
    }

    if *is_new == Some(true) {
        tracing::info!("Joined {} (ID:{})", guild.name, guild.id);
    }
    Ok(())
}

pub async fn guild_delete(event: Arc<GatewayEvent>, client: BotClient) -> Result<(), Error> {
    if let GatewayEvent::GuildDelete {
        guild_id,
        unavailable,
    } = event.as_ref()
    {
        if *unavailable {
            tracing::warn!("Guild {guild_id} became unavailable");
        } else {
            tracing::info!("Left guild {}", guild_name(&client, *guild_id));
        }
    }
    Ok(())
}

pub async fn guild_member_add(event: Arc<GatewayEvent>, client: BotClient) -> Result<(), Error> {
    if let GatewayEvent::GuildMemberAdd(member) = event.as_ref() {
        tracing::debug!(
            "[{}] {} (ID:{}) has joined",
            guild_name(&client, member.guild_id),
            member.user.name,
            member.user.id
        );
    }
    Ok(())
}

pub async fn guild_member_remove(event: Arc<GatewayEvent>, client: BotClient) -> Result<(), Error> {
    if let GatewayEvent::GuildMemberRemove { guild_id, user } = event.as_ref() {
        tracing::debug!("[{}] {user} has left", guild_name(&client, *guild_id));
    }
    Ok(())
}
