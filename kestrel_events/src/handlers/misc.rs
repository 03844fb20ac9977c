use std::sync::{atomic::Ordering, Arc};

use kestrel_commands::register;
use kestrel_data::{
    events::{BotClient, GatewayEvent},
    Error,
};

pub async fn ready(event: Arc<GatewayEvent>, client: BotClient) -> Result<(), Error> {
    let GatewayEvent::Ready(ready) = event.as_ref() else {
        return Ok(());
    };

    if client.data.has_started.swap(true, Ordering::SeqCst) {
        tracing::info!("Resumed as {}", ready.user.tag());
        return Ok(());
    }

    tracing::info!(
        "Logged in as {} in {} guild(s)",
        ready.user.tag(),
        ready.guilds.len()
    );

    if !client.data.store.settings().deploy_on_start {
        return Ok(());
    }

    let Some(ctx) = &client.serenity else {
        return Ok(());
    };
    register::deploy(&ctx.http, &client.data.commands).await?;

    Ok(())
}
