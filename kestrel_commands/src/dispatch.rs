//! Routes prefix messages and slash interactions to command handlers.
//!
//! Every invocation runs the same gates in order: blacklist, resolution,
//! enabled flag, permissions, cooldowns. The first gate that refuses ends
//! the dispatch.

use std::{sync::Arc, time::Duration};

use kestrel_data::{
    commands::{CommandCall, CommandDefinition, CommandKind},
    cooldowns::Tier,
    invocation::{Arguments, Disclaimed, Invocation, SlashOption, DISABLED_BANNER},
    reporting::ErrorRecord,
    Data,
};
use serenity::all::UserId;

pub const DISABLED_REPLY: &str = "This command is currently disabled.";
pub const NSFW_REPLY: &str = "This command can only be used in NSFW channels.";
pub const GUILD_ONLY_REPLY: &str = "This command can't be used in DMs.";
pub const FAILURE_REPLY: &str =
    "Sorry, something went wrong while running this command. The error has been reported.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlacklistHit {
    User,
    /// The guild is marked to be left; the bot left it.
    LeftGuild,
    IgnoredGuild,
}

/// How a dispatch ended.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The message wasn't addressed to the bot.
    Ignored,
    Blacklisted(BlacklistHit),
    NotFound,
    /// Disabled and the caller isn't an owner.
    Disabled,
    OwnerOnly,
    Nsfw,
    GuildOnly,
    OnCooldown {
        tier: Tier,
        remaining: Duration,
    },
    Completed {
        /// Ran through the disabled banner because the caller is an owner.
        disclaimed: bool,
    },
    Failed(ErrorRecord),
}

/// Splits `content` into a lowercased command name and its arguments when it
/// starts with `prefix` or with a mention of the bot followed by whitespace.
#[must_use]
pub fn parse_prefix(
    content: &str,
    prefix: &str,
    bot_id: Option<UserId>,
) -> Option<(String, Vec<String>)> {
    let rest = strip_invoker(content, prefix, bot_id)?;

    let mut tokens = rest.split_whitespace().map(str::to_owned);
    let name = tokens.next()?.to_lowercase();
    Some((name, tokens.collect()))
}

fn strip_invoker<'a>(content: &'a str, prefix: &str, bot_id: Option<UserId>) -> Option<&'a str> {
    if let Some(id) = bot_id {
        for mention in [format!("<@{id}>"), format!("<@!{id}>")] {
            if let Some(rest) = content.strip_prefix(mention.as_str()) {
                return rest.starts_with(char::is_whitespace).then_some(rest);
            }
        }
    }

    if prefix.is_empty() {
        return None;
    }
    content.strip_prefix(prefix)
}

/// Dispatches a message. `bot_id` enables mentions as a prefix.
pub async fn dispatch_prefix(
    data: &Arc<Data>,
    ctx: Arc<dyn Invocation>,
    content: &str,
    bot_id: Option<UserId>,
) -> DispatchOutcome {
    if let Some(hit) = check_blacklist(data, ctx.as_ref()).await {
        return hit;
    }

    let prefix = data.store.settings().prefix;
    let Some((name, tokens)) = parse_prefix(content, &prefix, bot_id) else {
        return DispatchOutcome::Ignored;
    };

    run_gates(data, ctx, CommandKind::Prefix, &name, Arguments::Prefix(tokens)).await
}

pub async fn dispatch_slash(
    data: &Arc<Data>,
    ctx: Arc<dyn Invocation>,
    name: &str,
    options: Vec<SlashOption>,
) -> DispatchOutcome {
    if let Some(hit) = check_blacklist(data, ctx.as_ref()).await {
        return hit;
    }

    run_gates(data, ctx, CommandKind::Slash, name, Arguments::Slash(options)).await
}

async fn check_blacklist(data: &Data, ctx: &dyn Invocation) -> Option<DispatchOutcome> {
    let blacklist = data.store.blacklist();

    if blacklist.users.contains(&ctx.author_id()) {
        tracing::debug!("Dropping invocation from blacklisted user {}", ctx.author_id());
        return Some(DispatchOutcome::Blacklisted(BlacklistHit::User));
    }

    let guild_id = ctx.guild_id()?;
    if blacklist.servers.leave.contains(&guild_id) {
        tracing::info!("Leaving blacklisted guild {guild_id}");
        if let Err(e) = ctx.leave_guild().await {
            tracing::warn!("Unable to leave guild {guild_id}: {e}");
        }
        return Some(DispatchOutcome::Blacklisted(BlacklistHit::LeftGuild));
    }

    if blacklist.servers.ignore.contains(&guild_id) {
        tracing::debug!("Dropping invocation from ignored guild {guild_id}");
        return Some(DispatchOutcome::Blacklisted(BlacklistHit::IgnoredGuild));
    }

    None
}

async fn run_gates(
    data: &Arc<Data>,
    ctx: Arc<dyn Invocation>,
    kind: CommandKind,
    name: &str,
    args: Arguments,
) -> DispatchOutcome {
    let Some(command) = data.commands.get(name, kind) else {
        tracing::debug!("No {kind} command named `{name}`");
        return DispatchOutcome::NotFound;
    };

    let is_owner = data.is_owner(ctx.author_id());

    let mut disclaimed = false;
    let ctx: Arc<dyn Invocation> = if data.commands.is_enabled(&command.name, kind) {
        ctx
    } else if is_owner {
        disclaimed = true;
        Arc::new(Disclaimed::new(ctx, DISABLED_BANNER))
    } else {
        return refuse(ctx.as_ref(), &command, DispatchOutcome::Disabled, Some(DISABLED_REPLY)).await;
    };

    if let Some((outcome, reply)) = check_permissions(&command, ctx.as_ref(), is_owner) {
        return refuse(ctx.as_ref(), &command, outcome, reply).await;
    }

    if let Err((tier, remaining)) = check_cooldowns(data, &command, ctx.as_ref()) {
        let reply = format!(
            "`{}` is on cooldown {}. Try again in {:.1}s.",
            command.name,
            tier.scope(),
            remaining.as_secs_f64()
        );
        let outcome = DispatchOutcome::OnCooldown { tier, remaining };
        return refuse(ctx.as_ref(), &command, outcome, Some(&reply)).await;
    }

    let call = CommandCall {
        ctx: Arc::clone(&ctx),
        args,
        data: Arc::clone(data),
        command: Arc::clone(&command),
    };

    match (command.handler)(call).await {
        Ok(()) => DispatchOutcome::Completed { disclaimed },
        Err(e) => {
            let record = ErrorRecord::new(&command.name, kind, ctx.describe(), &e);
            data.reporter.report(&record).await;

            if let Err(e) = ctx.reply(FAILURE_REPLY).await {
                tracing::warn!("Unable to tell the user `{}` failed: {e}", command.name);
            }
            DispatchOutcome::Failed(record)
        }
    }
}

fn check_permissions(
    command: &CommandDefinition,
    ctx: &dyn Invocation,
    is_owner: bool,
) -> Option<(DispatchOutcome, Option<&'static str>)> {
    if command.is_owner_only() && !is_owner {
        return Some((DispatchOutcome::OwnerOnly, None));
    }

    if command.nsfw && !ctx.is_nsfw() {
        return Some((DispatchOutcome::Nsfw, Some(NSFW_REPLY)));
    }

    if !command.allow_dm && ctx.guild_id().is_none() && !command.is_owner_only() {
        return Some((DispatchOutcome::GuildOnly, Some(GUILD_ONLY_REPLY)));
    }

    None
}

// Tiers are armed as they pass, so a later tier refusing still leaves the
// earlier windows open.
fn check_cooldowns(
    data: &Data,
    command: &CommandDefinition,
    ctx: &dyn Invocation,
) -> Result<(), (Tier, Duration)> {
    for tier in Tier::ORDER {
        let Some(duration) = command.cooldowns.duration(tier) else {
            continue;
        };

        let key = match tier {
            Tier::User => ctx.author_id().to_string(),
            Tier::Guild => match ctx.guild_id() {
                Some(guild_id) => guild_id.to_string(),
                None => continue,
            },
            Tier::Global => command.name.clone(),
        };

        data.cooldowns
            .check(tier, &key, &command.name, duration)
            .map_err(|remaining| (tier, remaining))?;
    }

    Ok(())
}

async fn refuse(
    ctx: &dyn Invocation,
    command: &CommandDefinition,
    outcome: DispatchOutcome,
    reply: Option<&str>,
) -> DispatchOutcome {
    tracing::debug!("Refused `{}` for {}: {outcome:?}", command.name, ctx.author_id());

    if let Some(reply) = reply {
        if let Err(e) = ctx.reply(reply).await {
            tracing::warn!("Unable to send refusal for `{}`: {e}", command.name);
        }
    }

    outcome
}
