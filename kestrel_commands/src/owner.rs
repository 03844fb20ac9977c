//! Owner tooling. Manifests for these belong in an `owner` category so the
//! dispatcher keeps everyone else out.

use std::fmt::Write;

use kestrel_data::{
    commands::{CommandCall, CommandKind},
    cooldowns::Tier,
    error::{LoadReport, ReloadError},
    Error,
};

const BUSY_REPLY: &str = "A reload is already running, try again in a moment.";

fn selected_kind(call: &CommandCall) -> CommandKind {
    if call.args.flag("slash") {
        CommandKind::Slash
    } else {
        CommandKind::Prefix
    }
}

fn summarize(what: &str, report: &LoadReport) -> String {
    let mut out = format!("Reloaded {} {what}.", report.loaded);
    if !report.failed.is_empty() {
        write!(out, " {} failed:", report.failed.len()).unwrap();
        for (path, reason) in &report.failed {
            write!(out, "\n- `{}`: {reason}", path.display()).unwrap();
        }
    }
    out
}

/// `reload <command|event|all> [name] [--slash]`
pub async fn reload(call: CommandCall) -> Result<(), Error> {
    let data = &call.data;
    let target = call.args.positional(0, "target").unwrap_or_default();
    let name = call.args.positional(1, "name").filter(|n| !n.starts_with("--"));
    let kind = selected_kind(&call);

    let reply = match (target.to_lowercase().as_str(), name) {
        ("command", Some(name)) => match data.commands.reload_one(&name, kind) {
            Ok(Some(command)) => format!("Reloaded {kind} command `{}`.", command.name),
            Ok(None) => format!("Couldn't reload {kind} command `{name}`, check the logs."),
            Err(ReloadError::Busy) => BUSY_REPLY.to_owned(),
        },
        ("command", None) => match data.commands.reload_all(kind) {
            Ok(report) => summarize(&format!("{kind} commands"), &report),
            Err(ReloadError::Busy) => BUSY_REPLY.to_owned(),
        },
        ("event", Some(name)) => match data.events.reload_one(&data.bus, &name) {
            Ok(true) => format!("Reloaded event `{name}`."),
            Ok(false) => format!("Couldn't reload event `{name}`, check the logs."),
            Err(ReloadError::Busy) => BUSY_REPLY.to_owned(),
        },
        ("event", None) => match data.events.reload_all(&data.bus) {
            Ok(report) => summarize("events", &report),
            Err(ReloadError::Busy) => BUSY_REPLY.to_owned(),
        },
        ("all", _) => match data.load_all() {
            Ok((commands, events)) => {
                format!("{}\n{}", summarize("commands", &commands), summarize("events", &events))
            }
            Err(ReloadError::Busy) => BUSY_REPLY.to_owned(),
        },
        _ => "Usage: `reload <command|event|all> [name] [--slash]`".to_owned(),
    };

    call.ctx.reply(&reply).await
}

/// `toggle <command|event> <name> [--slash]`
pub async fn toggle(call: CommandCall) -> Result<(), Error> {
    let data = &call.data;
    let target = call.args.positional(0, "target").unwrap_or_default();
    let Some(name) = call.args.positional(1, "name") else {
        return call
            .ctx
            .reply("Usage: `toggle <command|event> <name> [--slash]`")
            .await;
    };

    let reply = match target.to_lowercase().as_str() {
        "command" => {
            let kind = selected_kind(&call);
            match data.commands.toggle(&name, kind) {
                Some((name, true)) => format!("Enabled {kind} command `{name}`."),
                Some((name, false)) => format!("Disabled {kind} command `{name}`."),
                None => format!("No {kind} command matches `{name}`."),
            }
        }
        "event" => match data.events.get(&name) {
            Some(event) => {
                let state = if data.events.set_enabled(&event.name, None) {
                    "Enabled"
                } else {
                    "Disabled"
                };
                format!(
                    "{state} event `{}`. Run `reload event {}` to apply it.",
                    event.name, event.name
                )
            }
            None => format!("No event named `{name}`."),
        },
        _ => "Usage: `toggle <command|event> <name> [--slash]`".to_owned(),
    };

    call.ctx.reply(&reply).await
}

/// `cooldowns [clear]`
pub async fn cooldowns(call: CommandCall) -> Result<(), Error> {
    let tracker = &call.data.cooldowns;

    if call
        .args
        .positional(0, "action")
        .is_some_and(|action| action.eq_ignore_ascii_case("clear"))
    {
        tracker.clear();
        return call.ctx.reply("Cleared every cooldown.").await;
    }

    let mut keys = vec![(Tier::User, call.ctx.author_id().to_string())];
    if let Some(guild_id) = call.ctx.guild_id() {
        keys.push((Tier::Guild, guild_id.to_string()));
    }

    let mut reply = String::new();
    for (tier, key) in keys {
        for entry in tracker.get(tier, &key).unwrap_or_default() {
            if entry.is_active() {
                writeln!(
                    reply,
                    "`{}` ({tier}): {:.1}s left",
                    entry.command,
                    entry.remaining().as_secs_f64()
                )
                .unwrap();
            }
        }
    }

    if reply.is_empty() {
        reply.push_str("No active cooldowns.");
    }
    call.ctx.reply(reply.trim_end()).await
}

pub async fn shutdown(call: CommandCall) -> Result<(), Error> {
    call.ctx
        .reply("**Bailing out, you are on your own. Good luck.**")
        .await?;
    call.data.shutdown.notify_one();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dispatch::{dispatch_prefix, DispatchOutcome},
        fixtures::{fixture, Fixture, OWNER},
    };
    use kestrel_data::{testing::FakeInvocation, HandlerCatalog};
    use serde_json::json;
    use std::{sync::Arc, time::Duration};

    fn owner_fixture() -> Fixture {
        let fx = fixture(
            HandlerCatalog::new()
                .command("reload", reload)
                .command("toggle", toggle)
                .command("cooldowns", cooldowns)
                .command("shutdown", shutdown)
                .command("ping", |call: CommandCall| async move { call.ctx.reply("Pong!").await }),
            &[
                ("prefix/owner/reload.json", json!({ "name": "reload", "aliases": ["rl"] })),
                ("prefix/owner/toggle.json", json!({ "name": "toggle" })),
                ("prefix/owner/cooldowns.json", json!({ "name": "cooldowns" })),
                ("prefix/owner/shutdown.json", json!({ "name": "shutdown" })),
                (
                    "prefix/meta/ping.json",
                    json!({ "name": "ping", "cooldowns": { "user": 10000, "guild": 4000 } }),
                ),
                ("slash/meta/ping.json", json!({ "data": { "name": "ping" } })),
            ],
        );
        std::fs::write(
            fx.dir.path().join("events/messageCreate.json"),
            json!({ "handler": "missing" }).to_string(),
        )
        .unwrap();
        fx
    }

    async fn run(fx: &Fixture, fake: &Arc<FakeInvocation>, content: &str) -> DispatchOutcome {
        dispatch_prefix(&fx.data, fake.clone(), content, None).await
    }

    #[tokio::test]
    async fn toggle_flips_the_selected_kind() {
        let fx = owner_fixture();
        let owner = Arc::new(FakeInvocation::guild(OWNER, 1));

        run(&fx, &owner, "!toggle command pin").await;
        run(&fx, &owner, "!toggle command ping --slash").await;
        run(&fx, &owner, "!toggle command nope").await;

        assert!(!fx.data.commands.is_enabled("ping", CommandKind::Prefix));
        assert!(!fx.data.commands.is_enabled("ping", CommandKind::Slash));
        assert_eq!(
            owner.sent(),
            vec![
                "Disabled prefix command `ping`.".to_owned(),
                "Disabled slash command `ping`.".to_owned(),
                "No prefix command matches `nope`.".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn non_owners_cannot_reach_owner_tooling() {
        let fx = owner_fixture();
        let user = Arc::new(FakeInvocation::guild(9, 1));

        assert!(matches!(run(&fx, &user, "!toggle command ping").await, DispatchOutcome::OwnerOnly));
        assert!(fx.data.commands.is_enabled("ping", CommandKind::Prefix));
        assert!(user.sent().is_empty());
    }

    #[tokio::test]
    async fn reload_reports_per_target() {
        let fx = owner_fixture();
        let owner = Arc::new(FakeInvocation::dm(OWNER));

        run(&fx, &owner, "!rl command ping").await;
        run(&fx, &owner, "!reload command").await;
        run(&fx, &owner, "!reload event messageCreate").await;
        run(&fx, &owner, "!reload sideways").await;

        let sent = owner.sent();
        assert_eq!(sent[0], "Reloaded prefix command `ping`.");
        assert_eq!(sent[1], "Reloaded 5 prefix commands.");
        assert_eq!(sent[2], "Couldn't reload event `messageCreate`, check the logs.");
        assert_eq!(sent[3], "Usage: `reload <command|event|all> [name] [--slash]`");
    }

    #[tokio::test(start_paused = true)]
    async fn cooldowns_lists_and_clears() {
        let fx = owner_fixture();
        let owner = Arc::new(FakeInvocation::guild(OWNER, 1));

        run(&fx, &owner, "!ping").await;
        tokio::time::advance(Duration::from_millis(1000)).await;
        run(&fx, &owner, "!cooldowns").await;
        run(&fx, &owner, "!cooldowns clear").await;
        run(&fx, &owner, "!cooldowns").await;

        let sent = owner.sent();
        assert_eq!(sent[1], "`ping` (user): 9.0s left\n`ping` (guild): 3.0s left");
        assert_eq!(sent[2], "Cleared every cooldown.");
        assert_eq!(sent[3], "No active cooldowns.");
        assert!(matches!(run(&fx, &owner, "!ping").await, DispatchOutcome::Completed { .. }));
    }

    #[tokio::test]
    async fn shutdown_notifies_the_binary() {
        let fx = owner_fixture();
        let owner = Arc::new(FakeInvocation::dm(OWNER));

        run(&fx, &owner, "!shutdown").await;
        tokio::time::timeout(Duration::from_secs(1), fx.data.shutdown.notified())
            .await
            .unwrap();
    }
}
