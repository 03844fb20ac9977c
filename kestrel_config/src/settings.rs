use std::{collections::HashSet, path::PathBuf};

use serde::{Deserialize, Serialize};
use serenity::all::{ChannelId, GuildId, UserId};

/// The `config` document.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotSettings {
    pub prefix: String,
    pub owner_id: Vec<UserId>,
    pub deploy_on_start: bool,
    pub undeploy_on_exit: bool,
    pub commands_dir: PathBuf,
    pub events_dir: PathBuf,
}

impl BotSettings {
    #[must_use]
    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.owner_id.contains(&user_id)
    }
}

impl Default for BotSettings {
    fn default() -> Self {
        BotSettings {
            prefix: "!".to_owned(),
            owner_id: Vec::new(),
            deploy_on_start: false,
            undeploy_on_exit: false,
            commands_dir: PathBuf::from("commands"),
            events_dir: PathBuf::from("events"),
        }
    }
}

/// The `blacklist` document.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Blacklist {
    pub users: HashSet<UserId>,
    pub servers: BlacklistServers,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BlacklistServers {
    /// Guilds the bot leaves as soon as it sees activity from them.
    pub leave: HashSet<GuildId>,
    pub ignore: HashSet<GuildId>,
}

/// The `logging` document.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    pub error_channel: Option<ChannelId>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            level: "info".to_owned(),
            error_channel: None,
        }
    }
}
