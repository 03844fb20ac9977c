pub mod channels;
pub mod guilds;
pub mod messages;
pub mod misc;

use kestrel_data::events::BotClient;
use serenity::all::GuildId;

/// The cached guild name, or its ID when the guild isn't cached.
pub(crate) fn guild_name(client: &BotClient, guild_id: GuildId) -> String {
    client
        .serenity
        .as_ref()
        .and_then(|ctx| ctx.cache.guild(guild_id).map(|guild| guild.name.clone()))
        .unwrap_or_else(|| guild_id.to_string())
}
