//! Test doubles for the invocation and error reporting seams.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::Mutex;
use serenity::all::{ChannelId, GuildId, UserId};
use serenity::async_trait;

use kestrel_config::ConfigStore;

use crate::{
    catalog::{EventCatalog, HandlerCatalog},
    invocation::Invocation,
    reporting::{ErrorRecord, ErrorReporter, TracingReporter},
    structs::Data,
    Error,
};

/// Shared state over an in-memory store with nothing loaded.
#[must_use]
pub fn data(handlers: HandlerCatalog, listeners: EventCatalog) -> Arc<Data> {
    Data::new(
        Arc::new(ConfigStore::in_memory()),
        handlers,
        listeners,
        Arc::new(TracingReporter),
    )
}

/// Records everything sent through it instead of talking to Discord.
pub struct FakeInvocation {
    pub author: UserId,
    pub guild: Option<GuildId>,
    pub channel: ChannelId,
    pub nsfw: bool,
    sent: Mutex<Vec<String>>,
    left: AtomicBool,
}

impl FakeInvocation {
    #[must_use]
    pub fn guild(author: u64, guild: u64) -> Self {
        Self {
            author: UserId::new(author),
            guild: Some(GuildId::new(guild)),
            channel: ChannelId::new(1),
            nsfw: false,
            sent: Mutex::new(Vec::new()),
            left: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn dm(author: u64) -> Self {
        Self {
            guild: None,
            ..Self::guild(author, 1)
        }
    }

    #[must_use]
    pub fn with_nsfw(mut self, nsfw: bool) -> Self {
        self.nsfw = nsfw;
        self
    }

    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    #[must_use]
    pub fn left_guild(&self) -> bool {
        self.left.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Invocation for FakeInvocation {
    fn author_id(&self) -> UserId {
        self.author
    }

    fn guild_id(&self) -> Option<GuildId> {
        self.guild
    }

    fn channel_id(&self) -> ChannelId {
        self.channel
    }

    fn is_nsfw(&self) -> bool {
        self.nsfw
    }

    fn describe(&self) -> String {
        format!("fake invocation by {}", self.author)
    }

    async fn reply(&self, content: &str) -> Result<(), Error> {
        self.sent.lock().push(content.to_owned());
        Ok(())
    }

    async fn send(&self, content: &str) -> Result<(), Error> {
        self.sent.lock().push(content.to_owned());
        Ok(())
    }

    async fn leave_guild(&self) -> Result<(), Error> {
        self.left.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    records: Mutex<Vec<ErrorRecord>>,
}

impl RecordingReporter {
    #[must_use]
    pub fn records(&self) -> Vec<ErrorRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl ErrorReporter for RecordingReporter {
    async fn report(&self, record: &ErrorRecord) {
        self.records.lock().push(record.clone());
    }
}
