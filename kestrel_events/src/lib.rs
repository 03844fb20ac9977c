#![warn(clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

use kestrel_data::EventCatalog;

pub mod gateway;
pub mod handlers;
use handlers::{channels, guilds, messages, misc};

pub use gateway::Gateway;

/// Every built-in listener, keyed by the name event manifests refer to.
#[must_use]
pub fn catalog() -> EventCatalog {
    EventCatalog::new()
        .listener("ready", misc::ready)
        .listener("message_create", messages::message_create)
        .listener("interaction_create", messages::interaction_create)
        .listener("guild_create", guilds::guild_create)
        .listener("guild_delete", guilds::guild_delete)
        .listener("guild_member_add", guilds::guild_member_add)
        .listener("guild_member_remove", guilds::guild_member_remove)
        .listener("channel_create", channels::channel_create)
        .listener("channel_delete", channels::channel_delete)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kestrel_config::{ConfigStore, Domain};
    use kestrel_data::{
        events::GatewayEvent, reporting::TracingReporter, Data, HandlerCatalog,
    };

    #[test]
    fn every_gateway_event_has_a_default_listener() {
        let dir = tempfile::tempdir().unwrap();
        for name in GatewayEvent::NAMES {
            std::fs::write(dir.path().join(format!("{name}.json")), "{}").unwrap();
        }

        let store = Arc::new(ConfigStore::in_memory());
        store.set(Domain::Config, "eventsDir", dir.path().to_string_lossy().into_owned());
        let data = Data::new(store, HandlerCatalog::new(), super::catalog(), Arc::new(TracingReporter));

        let report = data.events.load_all(&data.bus).unwrap();
        assert_eq!(report.loaded, GatewayEvent::NAMES.len());
        assert!(report.failed.is_empty());
        for name in GatewayEvent::NAMES {
            assert_eq!(data.bus.listener_count(name), 1, "{name} is not attached");
        }
    }
}
