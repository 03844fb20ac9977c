use std::sync::Arc;

use kestrel_commands::{
    dispatch::{dispatch_prefix, dispatch_slash, parse_prefix},
    invocation::{InteractionInvocation, MessageInvocation},
};
use kestrel_data::{
    events::{BotClient, GatewayEvent},
    Error,
};
use serenity::all::Interaction;

pub async fn message_create(event: Arc<GatewayEvent>, client: BotClient) -> Result<(), Error> {
    let GatewayEvent::MessageCreate(message) = event.as_ref() else {
        return Ok(());
    };
    let Some(ctx) = client.serenity else {
        return Ok(());
    };

    if message.author.bot {
        return Ok(());
    }

    // Most messages aren't commands; skip building an invocation for them.
    let bot_id = ctx.cache.current_user().id;
    let prefix = client.data.store.settings().prefix;
    if parse_prefix(&message.content, &prefix, Some(bot_id)).is_none() {
        return Ok(());
    }

    let invocation = MessageInvocation::new(ctx, (**message).clone()).await;
    let outcome =
        dispatch_prefix(&client.data, Arc::new(invocation), &message.content, Some(bot_id)).await;
    tracing::debug!("Prefix dispatch from message {}: {outcome:?}", message.id);

    Ok(())
}

pub async fn interaction_create(event: Arc<GatewayEvent>, client: BotClient) -> Result<(), Error> {
    let GatewayEvent::InteractionCreate(interaction) = event.as_ref() else {
        return Ok(());
    };
    let Some(ctx) = client.serenity else {
        return Ok(());
    };

    let Interaction::Command(command) = &**interaction else {
        return Ok(());
    };

    let name = command.data.name.clone();
    let invocation = InteractionInvocation::new(ctx, command.clone()).await;
    let options = invocation.options();

    let outcome = dispatch_slash(&client.data, Arc::new(invocation), &name, options).await;
    tracing::debug!("Slash dispatch of /{name}: {outcome:?}");

    Ok(())
}
