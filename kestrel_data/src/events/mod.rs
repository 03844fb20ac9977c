use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serenity::all::{Guild, GuildChannel, GuildId, Interaction, Member, Message, Ready, UserId};

use crate::{structs::Data, Error};

mod registry;
pub use registry::{EventDefinition, EventRegistry};

/// The gateway events the bot listens to, as handed to listeners.
#[derive(Clone, Debug)]
pub enum GatewayEvent {
    Ready(Box<Ready>),
    MessageCreate(Box<Message>),
    InteractionCreate(Box<Interaction>),
    GuildCreate {
        guild: Box<Guild>,
        is_new: Option<bool>,
    },
    GuildDelete {
        guild_id: GuildId,
        unavailable: bool,
    },
    GuildMemberAdd(Box<Member>),
    GuildMemberRemove {
        guild_id: GuildId,
        user: UserId,
    },
    ChannelCreate(Box<GuildChannel>),
    ChannelDelete(Box<GuildChannel>),
}

impl GatewayEvent {
    /// Every name a manifest may subscribe to.
    pub const NAMES: [&'static str; 9] = [
        "ready",
        "messageCreate",
        "interactionCreate",
        "guildCreate",
        "guildDelete",
        "guildMemberAdd",
        "guildMemberRemove",
        "channelCreate",
        "channelDelete",
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            GatewayEvent::Ready(_) => "ready",
            GatewayEvent::MessageCreate(_) => "messageCreate",
            GatewayEvent::InteractionCreate(_) => "interactionCreate",
            GatewayEvent::GuildCreate { .. } => "guildCreate",
            GatewayEvent::GuildDelete { .. } => "guildDelete",
            GatewayEvent::GuildMemberAdd(_) => "guildMemberAdd",
            GatewayEvent::GuildMemberRemove { .. } => "guildMemberRemove",
            GatewayEvent::ChannelCreate(_) => "channelCreate",
            GatewayEvent::ChannelDelete(_) => "channelDelete",
        }
    }

    /// The canonical spelling of `name` if it is an event we know about.
    #[must_use]
    pub fn canonical(name: &str) -> Option<&'static str> {
        Self::NAMES
            .into_iter()
            .find(|known| known.eq_ignore_ascii_case(name))
    }
}

/// Handed to every listener after the event itself.
#[derive(Clone)]
pub struct BotClient {
    pub data: Arc<Data>,
    /// Absent when events are emitted without a gateway connection.
    pub serenity: Option<serenity::all::Context>,
}

impl BotClient {
    #[must_use]
    pub fn new(data: Arc<Data>, serenity: Option<serenity::all::Context>) -> Self {
        Self { data, serenity }
    }
}

pub type Listener =
    Arc<dyn Fn(Arc<GatewayEvent>, BotClient) -> BoxFuture<'static, Result<(), Error>> + Send + Sync>;

struct Subscription {
    id: u64,
    once: bool,
    listener: Listener,
}

/// Listeners keyed by gateway event name.
#[derive(Default)]
pub struct EventBus {
    listeners: DashMap<String, Vec<Subscription>>,
    next_id: AtomicU64,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, event: &str, listener: Listener) -> u64 {
        self.subscribe(event, listener, false)
    }

    /// Subscribes for the next occurrence only.
    pub fn once(&self, event: &str, listener: Listener) -> u64 {
        self.subscribe(event, listener, true)
    }

    /// Detaches every listener for `event`, returning how many there were.
    pub fn remove_all(&self, event: &str) -> usize {
        self.listeners
            .remove(event)
            .map_or(0, |(_, subscriptions)| subscriptions.len())
    }

    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, |subs| subs.len())
    }

    /// Runs every listener for the event in subscription order. Errors are
    /// logged and don't stop the remaining listeners.
    pub async fn emit(&self, event: GatewayEvent, client: BotClient) {
        let name = event.name();
        let listeners = self.take_listeners(name);
        if listeners.is_empty() {
            return;
        }

        let event = Arc::new(event);
        for listener in listeners {
            if let Err(e) = listener(Arc::clone(&event), client.clone()).await {
                tracing::error!("Error in {name} listener: {e}");
            }
        }
    }

    fn subscribe(&self, event: &str, listener: Listener, once: bool) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .entry(event.to_owned())
            .or_default()
            .push(Subscription { id, once, listener });
        id
    }

    // One-shot subscriptions are dropped here, before they run, so a
    // concurrent emit can't fire them twice.
    fn take_listeners(&self, event: &str) -> Vec<Listener> {
        let Some(mut subscriptions) = self.listeners.get_mut(event) else {
            return Vec::new();
        };

        let listeners = subscriptions
            .iter()
            .map(|sub| Arc::clone(&sub.listener))
            .collect();
        subscriptions.retain(|sub| !sub.once);

        let now_empty = subscriptions.is_empty();
        drop(subscriptions);
        if now_empty {
            self.listeners.remove_if(event, |_, subs| subs.is_empty());
        }

        listeners
    }

    #[cfg(test)]
    fn ids(&self, event: &str) -> Vec<u64> {
        self.listeners
            .get(event)
            .map(|subs| subs.iter().map(|sub| sub.id).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{testing, EventCatalog, HandlerCatalog};
    use std::sync::atomic::AtomicUsize;

    fn counting(counter: &Arc<AtomicUsize>) -> Listener {
        let counter = Arc::clone(counter);
        Arc::new(move |_: Arc<GatewayEvent>, _: BotClient| -> BoxFuture<'static, Result<(), Error>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        })
    }

    fn guild_delete() -> GatewayEvent {
        GatewayEvent::GuildDelete {
            guild_id: GuildId::new(1),
            unavailable: false,
        }
    }

    #[tokio::test]
    async fn once_listeners_fire_a_single_time() {
        let data = testing::data(HandlerCatalog::new(), EventCatalog::new());
        let client = BotClient::new(Arc::clone(&data), None);
        let bus = EventBus::new();
        let (once, always) = (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)));

        bus.once("guildDelete", counting(&once));
        bus.on("guildDelete", counting(&always));
        assert_eq!(bus.listener_count("guildDelete"), 2);

        bus.emit(guild_delete(), client.clone()).await;
        bus.emit(guild_delete(), client).await;

        assert_eq!(once.load(Ordering::SeqCst), 1);
        assert_eq!(always.load(Ordering::SeqCst), 2);
        assert_eq!(bus.listener_count("guildDelete"), 1);
    }

    #[tokio::test]
    async fn failing_listeners_do_not_stop_the_rest() {
        let data = testing::data(HandlerCatalog::new(), EventCatalog::new());
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        bus.on(
            "guildDelete",
            Arc::new(|_: Arc<GatewayEvent>, _: BotClient| -> BoxFuture<'static, Result<(), Error>> {
                Box::pin(async { Err("boom".into()) })
            }),
        );
        bus.on("guildDelete", counting(&counter));

        bus.emit(guild_delete(), BotClient::new(data, None)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_all_detaches_one_event_only() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let first = bus.on("guildDelete", counting(&counter));
        let second = bus.once("guildDelete", counting(&counter));
        bus.on("ready", counting(&counter));
        assert_eq!(bus.ids("guildDelete"), vec![first, second]);

        assert_eq!(bus.remove_all("guildDelete"), 2);
        assert_eq!(bus.listener_count("guildDelete"), 0);
        assert_eq!(bus.listener_count("ready"), 1);
        assert_eq!(bus.remove_all("guildDelete"), 0);
    }

    #[test]
    fn names_are_canonicalized() {
        assert_eq!(GatewayEvent::canonical("MESSAGECREATE"), Some("messageCreate"));
        assert_eq!(GatewayEvent::canonical("typingStart"), None);
        assert_eq!(guild_delete().name(), "guildDelete");
    }
}
