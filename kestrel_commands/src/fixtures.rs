use std::sync::Arc;

use kestrel_config::{ConfigStore, Domain};
use kestrel_data::{testing::RecordingReporter, Data, EventCatalog, HandlerCatalog};
use serde_json::json;
use tempfile::TempDir;

pub const OWNER: u64 = 101;

pub struct Fixture {
    pub data: Arc<Data>,
    pub reporter: Arc<RecordingReporter>,
    pub dir: TempDir,
}

/// Shared state with `manifests` written under a temporary command root and
/// loaded. Paths are relative to that root, e.g. `prefix/meta/ping.json`.
pub fn fixture(handlers: HandlerCatalog, manifests: &[(&str, serde_json::Value)]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let commands = dir.path().join("commands");
    let events = dir.path().join("events");
    std::fs::create_dir_all(&events).unwrap();

    for (relative, manifest) in manifests {
        let path = commands.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, manifest.to_string()).unwrap();
    }

    let store = Arc::new(ConfigStore::in_memory());
    store.set(Domain::Config, "commandsDir", commands.to_string_lossy().into_owned());
    store.set(Domain::Config, "eventsDir", events.to_string_lossy().into_owned());
    store.set(Domain::Config, "ownerId", json!([OWNER.to_string()]));

    let reporter = Arc::new(RecordingReporter::default());
    let data = Data::new(store, handlers, EventCatalog::new(), reporter.clone());
    data.load_all().unwrap();

    Fixture { data, reporter, dir }
}
