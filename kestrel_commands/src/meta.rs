use std::{collections::BTreeMap, fmt::Write, time::Instant};

use kestrel_data::{
    commands::{CommandCall, CommandDefinition, CommandKind},
    cooldowns::Tier,
    Error,
};

fn uptime_str(seconds: u64) -> String {
    let calculation = |a, b| (a / b, a % b);
    let (minutes, seconds) = calculation(seconds, 60);
    let (hours, minutes) = calculation(minutes, 60);
    let (days, hours) = calculation(hours, 24);

    format!("`{days}d {hours}h {minutes}m {seconds}s`")
}

/// pong!
pub async fn ping(call: CommandCall) -> Result<(), Error> {
    let Some(ctx) = call.ctx.serenity() else {
        return call.ctx.reply("Pong!").await;
    };

    let now = Instant::now();
    ctx.http.get_gateway().await?;
    let latency = now.elapsed().as_millis();

    call.ctx
        .reply(&format!("Pong! Gateway latency: `{latency}ms`"))
        .await
}

/// See how long I've been online for!
pub async fn uptime(call: CommandCall) -> Result<(), Error> {
    let uptime = call.data.time_started.elapsed().as_secs();
    call.ctx
        .reply(&format!("Online for {}", uptime_str(uptime)))
        .await
}

fn describe_command(command: &CommandDefinition, prefix: &str) -> String {
    let mut out = format!("**{}**", command.name);
    if !command.description.is_empty() {
        write!(out, "\n{}", command.description).unwrap();
    }

    let usage = command.usage.as_deref().unwrap_or(&command.name);
    match command.kind {
        CommandKind::Prefix => write!(out, "\nUsage: `{prefix}{usage}`").unwrap(),
        CommandKind::Slash => write!(out, "\nUsage: `/{usage}`").unwrap(),
    }

    if !command.aliases.is_empty() {
        write!(out, "\nAliases: {}", command.aliases.join(", ")).unwrap();
    }
    write!(out, "\nCategory: {}", command.category).unwrap();

    for tier in Tier::ORDER {
        if let Some(duration) = command.cooldowns.duration(tier) {
            write!(out, "\nCooldown ({tier}): {:.1}s", duration.as_secs_f64()).unwrap();
        }
    }

    out
}

/// Show general help or help to a specific command!
pub async fn help(call: CommandCall) -> Result<(), Error> {
    let data = &call.data;
    let kind = call.command.kind;
    let prefix = data.store.settings().prefix;
    let is_owner = data.is_owner(call.ctx.author_id());

    if let Some(name) = call.args.positional(0, "command") {
        let reply = match data.commands.find_nearest(&name, kind) {
            Some(command) if !command.is_owner_only() || is_owner => {
                describe_command(&command, &prefix)
            }
            _ => format!("No command called `{name}`."),
        };
        return call.ctx.reply(&reply).await;
    }

    let mut categories: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for command in data.commands.list(kind) {
        if command.is_owner_only() && !is_owner {
            continue;
        }
        if !data.commands.is_enabled(&command.name, kind) {
            continue;
        }
        categories
            .entry(command.category.clone())
            .or_default()
            .push(format!("`{}`", command.name));
    }

    let mut reply = String::from("**Commands**");
    for (category, names) in categories {
        write!(reply, "\n{category}: {}", names.join(", ")).unwrap();
    }

    let hint = match kind {
        CommandKind::Prefix => format!("{prefix}help <command>"),
        CommandKind::Slash => "/help command:<command>".to_owned(),
    };
    write!(reply, "\n\nUse `{hint}` for details.").unwrap();

    call.ctx.reply(&reply).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dispatch::dispatch_prefix,
        fixtures::{fixture, OWNER},
    };
    use kestrel_data::{testing::FakeInvocation, HandlerCatalog};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn uptime_is_split_into_units() {
        assert_eq!(uptime_str(0), "`0d 0h 0m 0s`");
        assert_eq!(uptime_str(90_061), "`1d 1h 1m 1s`");
    }

    fn help_fixture() -> crate::fixtures::Fixture {
        fixture(
            HandlerCatalog::new()
                .command("help", help)
                .command("ping", ping)
                .command("reload", |_| async { Ok(()) }),
            &[
                ("prefix/meta/help.json", json!({ "name": "help", "allowDM": true })),
                (
                    "prefix/meta/ping.json",
                    json!({ "name": "ping", "aliases": ["p"], "description": "Pong!", "cooldowns": { "user": 2500 } }),
                ),
                ("prefix/owner/reload.json", json!({ "name": "reload" })),
            ],
        )
    }

    #[tokio::test]
    async fn help_lists_visible_commands() {
        let fx = help_fixture();

        let user = Arc::new(FakeInvocation::dm(7));
        dispatch_prefix(&fx.data, user.clone(), "!help", None).await;
        let listing = &user.sent()[0];
        assert!(listing.contains("meta: `help`, `ping`"));
        assert!(!listing.contains("reload"));

        let owner = Arc::new(FakeInvocation::dm(OWNER));
        dispatch_prefix(&fx.data, owner.clone(), "!help", None).await;
        assert!(owner.sent()[0].contains("owner: `reload`"));
    }

    #[tokio::test]
    async fn help_describes_the_nearest_command() {
        let fx = help_fixture();
        let user = Arc::new(FakeInvocation::dm(7));

        dispatch_prefix(&fx.data, user.clone(), "!help pi", None).await;
        dispatch_prefix(&fx.data, user.clone(), "!help reload", None).await;

        let sent = user.sent();
        assert_eq!(
            sent[0],
            "**ping**\nPong!\nUsage: `!ping`\nAliases: p\nCategory: meta\nCooldown (user): 2.5s"
        );
        assert_eq!(sent[1], "No command called `reload`.");
    }

    #[tokio::test]
    async fn ping_without_a_gateway() {
        let fx = help_fixture();
        let user = Arc::new(FakeInvocation::guild(7, 8));

        dispatch_prefix(&fx.data, user.clone(), "!p", None).await;
        assert_eq!(user.sent(), vec!["Pong!".to_owned()]);
    }
}
