use std::sync::{atomic::AtomicBool, Arc};

use kestrel_config::ConfigStore;
use tokio::sync::Notify;

use crate::{
    catalog::{EventCatalog, HandlerCatalog},
    commands::CommandRegistry,
    cooldowns::CooldownTracker,
    error::{LoadReport, ReloadError},
    events::{EventBus, EventRegistry},
    reporting::ErrorReporter,
};

pub type Error = Box<dyn std::error::Error + Send + Sync>;

pub struct Data {
    pub has_started: AtomicBool,
    pub time_started: std::time::Instant,
    pub store: Arc<ConfigStore>,
    pub commands: CommandRegistry,
    pub events: EventRegistry,
    pub cooldowns: CooldownTracker,
    pub bus: EventBus,
    pub reporter: Arc<dyn ErrorReporter>,
    /// Notified by the `shutdown` command; the binary waits on it.
    pub shutdown: Notify,
}

impl Data {
    /// Builds the shared state. Command and event roots come from the
    /// `config` domain; nothing is loaded until [`Data::load_all`].
    #[must_use]
    pub fn new(
        store: Arc<ConfigStore>,
        handlers: HandlerCatalog,
        listeners: EventCatalog,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Arc<Self> {
        let settings = store.settings();

        Arc::new(Data {
            has_started: AtomicBool::new(false),
            time_started: std::time::Instant::now(),
            commands: CommandRegistry::new(settings.commands_dir, handlers, Arc::clone(&store)),
            events: EventRegistry::new(settings.events_dir, listeners, Arc::clone(&store)),
            store,
            cooldowns: CooldownTracker::new(),
            bus: EventBus::new(),
            reporter,
            shutdown: Notify::new(),
        })
    }

    /// Loads every command and attaches every enabled event.
    pub fn load_all(&self) -> Result<(LoadReport, LoadReport), ReloadError> {
        let commands = self.commands.load_all()?;
        let events = self.events.load_all(&self.bus)?;
        Ok((commands, events))
    }

    #[must_use]
    pub fn is_owner(&self, user: serenity::all::UserId) -> bool {
        self.store.settings().is_owner(user)
    }
}
