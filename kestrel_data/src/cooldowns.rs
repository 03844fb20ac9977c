//! Per-user, per-guild and global command cooldowns.
//!
//! Every tier maps a key (user ID, guild ID or command name) to the windows
//! currently open under it. A key can hold windows for several commands at
//! once; each window is evicted by its own timer.

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    User,
    Guild,
    Global,
}

impl Tier {
    /// The order the dispatcher checks tiers in.
    pub const ORDER: [Tier; 3] = [Tier::User, Tier::Guild, Tier::Global];

    /// Completes "`cmd` is on cooldown ...".
    #[must_use]
    pub fn scope(self) -> &'static str {
        match self {
            Tier::User => "for you",
            Tier::Guild => "for the guild",
            Tier::Global => "globally",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Tier::User => "user",
            Tier::Guild => "guild",
            Tier::Global => "global",
        };
        f.write_str(s)
    }
}

/// Cooldown durations declared by a command, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Cooldowns {
    pub user: Option<u64>,
    pub guild: Option<u64>,
    pub global: Option<u64>,
}

impl Cooldowns {
    /// `None` unless a positive duration is declared for `tier`.
    #[must_use]
    pub fn duration(&self, tier: Tier) -> Option<Duration> {
        let ms = match tier {
            Tier::User => self.user,
            Tier::Guild => self.guild,
            Tier::Global => self.global,
        };

        ms.filter(|ms| *ms > 0).map(Duration::from_millis)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CooldownEntry {
    pub command: String,
    pub expires_at: Instant,
    arm: u64,
}

impl CooldownEntry {
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.expires_at > Instant::now()
    }
}

#[derive(Default)]
struct Tables {
    user: HashMap<String, Vec<CooldownEntry>>,
    guild: HashMap<String, Vec<CooldownEntry>>,
    global: HashMap<String, Vec<CooldownEntry>>,
    next_arm: u64,
}

impl Tables {
    fn tier(&self, tier: Tier) -> &HashMap<String, Vec<CooldownEntry>> {
        match tier {
            Tier::User => &self.user,
            Tier::Guild => &self.guild,
            Tier::Global => &self.global,
        }
    }

    fn tier_mut(&mut self, tier: Tier) -> &mut HashMap<String, Vec<CooldownEntry>> {
        match tier {
            Tier::User => &mut self.user,
            Tier::Guild => &mut self.guild,
            Tier::Global => &mut self.global,
        }
    }

    fn arm(&mut self, tier: Tier, key: &str, command: &str, duration: Duration) -> CooldownEntry {
        self.next_arm += 1;
        let entry = CooldownEntry {
            command: command.to_owned(),
            expires_at: Instant::now() + duration,
            arm: self.next_arm,
        };

        let windows = self.tier_mut(tier).entry(key.to_owned()).or_default();
        windows.retain(|e| e.command != command);
        windows.push(entry.clone());

        entry
    }

    // The window may already be gone after a clear or a re-arm.
    fn evict(&mut self, tier: Tier, key: &str, arm: u64) {
        let table = self.tier_mut(tier);
        if let Some(windows) = table.get_mut(key) {
            windows.retain(|e| e.arm != arm);
            if windows.is_empty() {
                table.remove(key);
            }
        }
    }
}

/// Shared handle to the cooldown tables; clones refer to the same tables.
#[derive(Clone, Default)]
pub struct CooldownTracker {
    tables: Arc<Mutex<Tables>>,
}

impl CooldownTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn enabled(&self, tier: Tier, cooldowns: &Cooldowns) -> bool {
        cooldowns.duration(tier).is_some()
    }

    /// Opens a window for `command` under `key`, replacing an older window for
    /// the same command and leaving other commands' windows alone.
    pub fn add(&self, tier: Tier, key: &str, command: &str, duration: Duration) -> CooldownEntry {
        let entry = self.tables.lock().arm(tier, key, command, duration);
        self.schedule_eviction(tier, key, &entry);
        entry
    }

    #[must_use]
    pub fn get(&self, tier: Tier, key: &str) -> Option<Vec<CooldownEntry>> {
        self.tables.lock().tier(tier).get(key).cloned()
    }

    #[must_use]
    pub fn find(&self, tier: Tier, key: &str, command: &str) -> Option<CooldownEntry> {
        self.tables
            .lock()
            .tier(tier)
            .get(key)
            .and_then(|windows| windows.iter().find(|e| e.command == command).cloned())
    }

    /// Rejects with the time left if `command` has an open window under `key`,
    /// otherwise arms a fresh window and lets the call through.
    ///
    /// A window that has expired but not been evicted yet counts as closed.
    pub fn check(
        &self,
        tier: Tier,
        key: &str,
        command: &str,
        duration: Duration,
    ) -> Result<(), Duration> {
        let entry = {
            let mut tables = self.tables.lock();
            let active = tables
                .tier(tier)
                .get(key)
                .and_then(|windows| windows.iter().find(|e| e.command == command))
                .filter(|e| e.is_active())
                .map(CooldownEntry::remaining);

            if let Some(remaining) = active {
                return Err(remaining);
            }

            tables.arm(tier, key, command, duration)
        };

        self.schedule_eviction(tier, key, &entry);
        Ok(())
    }

    /// Drops every window in every tier.
    pub fn clear(&self) {
        let mut tables = self.tables.lock();
        tables.user.clear();
        tables.guild.clear();
        tables.global.clear();
    }

    #[must_use]
    pub fn len(&self, tier: Tier) -> usize {
        self.tables.lock().tier(tier).values().map(Vec::len).sum()
    }

    fn schedule_eviction(&self, tier: Tier, key: &str, entry: &CooldownEntry) {
        // Without a runtime the windows still expire, they just linger until cleared.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let tables = Arc::clone(&self.tables);
        let key = key.to_owned();
        let (arm, expires_at) = (entry.arm, entry.expires_at);

        handle.spawn(async move {
            tokio::time::sleep_until(expires_at).await;
            tables.lock().evict(tier, &key, arm);
        });
    }
}
