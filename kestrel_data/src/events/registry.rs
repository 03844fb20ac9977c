use std::{
    collections::{HashMap, HashSet},
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use kestrel_config::{ConfigStore, Domain};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;

use super::{EventBus, GatewayEvent, Listener};
use crate::{
    catalog::EventCatalog,
    commands::manifest_paths,
    error::{LoadError, LoadReport, ReloadError},
};

pub struct EventDefinition {
    /// Logical name, taken from the manifest's file stem.
    pub name: String,
    /// Gateway event the handler subscribes to.
    pub event: &'static str,
    pub once: bool,
    pub handler_name: String,
    pub source: PathBuf,
    pub listener: Listener,
}

impl fmt::Debug for EventDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDefinition")
            .field("name", &self.name)
            .field("event", &self.event)
            .field("once", &self.once)
            .field("handler_name", &self.handler_name)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Manifest {
    event: Option<String>,
    once: bool,
    handler: Option<String>,
}

/// `messageCreate` -> `message_create`.
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_owned)
}

/// Owner-supplied names must name a file directly inside the event root.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

fn load_definition(path: &Path, catalog: &EventCatalog) -> Result<EventDefinition, LoadError> {
    let name = stem(path).ok_or_else(|| LoadError::MissingName {
        path: path.to_owned(),
    })?;

    let contents = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_owned(),
        source,
    })?;

    // An empty file subscribes by file name alone.
    let manifest: Manifest = if contents.trim().is_empty() {
        Manifest::default()
    } else {
        serde_json::from_str(&contents).map_err(|source| LoadError::Parse {
            path: path.to_owned(),
            source,
        })?
    };

    let requested = manifest.event.unwrap_or_else(|| name.clone());
    let event = GatewayEvent::canonical(&requested).ok_or_else(|| LoadError::UnknownEvent {
        path: path.to_owned(),
        event: requested.clone(),
    })?;

    let handler_name = manifest.handler.unwrap_or_else(|| snake_case(event));
    let listener = catalog
        .get(&handler_name)
        .ok_or_else(|| LoadError::UnknownHandler {
            path: path.to_owned(),
            handler: handler_name.clone(),
        })?;

    Ok(EventDefinition {
        name,
        event,
        once: manifest.once,
        handler_name,
        source: path.to_owned(),
        listener,
    })
}

#[derive(Default)]
struct Tables {
    definitions: HashMap<String, Arc<EventDefinition>>,
    order: Vec<String>,
    /// Gateway events this registry currently has listeners on.
    attached: HashSet<&'static str>,
}

/// Keeps bus subscriptions in line with the event manifests and their
/// persisted flags in the `events` config domain.
pub struct EventRegistry {
    root: PathBuf,
    catalog: EventCatalog,
    store: Arc<ConfigStore>,
    tables: RwLock<Tables>,
    reload_guard: Mutex<()>,
}

impl EventRegistry {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, catalog: EventCatalog, store: Arc<ConfigStore>) -> Self {
        Self {
            root: root.into(),
            catalog,
            store,
            tables: RwLock::new(Tables::default()),
            reload_guard: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Discovers every manifest, prunes flags for events that no longer have
    /// a file and re-attaches all enabled events.
    pub fn load_all(&self, bus: &EventBus) -> Result<LoadReport, ReloadError> {
        let _guard = self.reload_guard.try_lock().ok_or(ReloadError::Busy)?;

        let paths = if self.root.is_dir() {
            manifest_paths(&self.root)
        } else {
            tracing::warn!("{} does not exist, no events", self.root.display());
            Vec::new()
        };

        let mut report = LoadReport::default();
        let mut backed = HashSet::new();
        let mut loaded: Vec<Arc<EventDefinition>> = Vec::new();

        for path in paths {
            if let Some(name) = stem(&path) {
                backed.insert(name);
            }

            let result = load_definition(&path, &self.catalog).and_then(|def| {
                if loaded.iter().any(|other| other.name == def.name) {
                    tracing::warn!("Event `{}` is declared twice, skipping {}", def.name, path.display());
                    return Ok(());
                }
                if let Some(other) = loaded.iter().find(|other| other.event == def.event) {
                    tracing::warn!(
                        "`{}` already handles {}, skipping `{}`",
                        other.name,
                        def.event,
                        def.name
                    );
                    return Ok(());
                }
                loaded.push(Arc::new(def));
                Ok(())
            });
            report.record(result, path);
        }
        report.loaded = loaded.len();

        self.sync_toggles(&loaded, &backed);

        let mut tables = self.tables.write();
        for event in tables.attached.drain() {
            bus.remove_all(event);
        }

        tables.definitions.clear();
        tables.order.clear();
        for def in loaded {
            if self.is_enabled(&def.name) {
                attach(bus, &def);
                tables.attached.insert(def.event);
            } else {
                tracing::debug!("Event `{}` is disabled, not attaching", def.name);
            }
            tables.order.push(def.name.clone());
            tables.definitions.insert(def.name.clone(), def);
        }

        tracing::info!(
            "Loaded {} events, {} attached ({} failed)",
            report.loaded,
            tables.attached.len(),
            report.failed.len()
        );
        Ok(report)
    }

    pub fn reload_all(&self, bus: &EventBus) -> Result<LoadReport, ReloadError> {
        self.load_all(bus)
    }

    /// Re-reads the event's manifest, swaps its listeners and attaches it
    /// again if it is enabled. Returns whether the manifest loaded.
    ///
    /// A manifest that now clashes with another event leaves the current
    /// definition and its listeners untouched.
    pub fn reload_one(&self, bus: &EventBus, name: &str) -> Result<bool, ReloadError> {
        let _guard = self.reload_guard.try_lock().ok_or(ReloadError::Busy)?;

        let existing = self.get(name);
        let path = match &existing {
            Some(def) => def.source.clone(),
            None if is_plain_name(name) => self.root.join(format!("{name}.json")),
            None => {
                tracing::warn!("Refusing to reload event `{name}`, not a plain file name");
                return Ok(false);
            }
        };

        let loaded = if path.is_file() {
            load_definition(&path, &self.catalog).map_err(|e| e.to_string())
        } else {
            Err(format!("no manifest at {}", path.display()))
        };

        let mut tables = self.tables.write();
        let def = match loaded {
            Ok(def) => Arc::new(def),
            Err(e) => {
                tracing::error!("Failed to reload event `{name}`: {e}");
                if let Some(old) = existing {
                    if tables.attached.remove(old.event) {
                        bus.remove_all(old.event);
                    }
                    tables.definitions.remove(&old.name);
                    tables.order.retain(|n| *n != old.name);
                }
                return Ok(false);
            }
        };

        if let Some(other) = tables
            .definitions
            .values()
            .find(|other| other.name != def.name && other.event == def.event)
        {
            tracing::warn!(
                "`{}` already handles {}, not reloading `{}`",
                other.name,
                def.event,
                def.name
            );
            return Ok(false);
        }

        if let Some(old) = &existing {
            if tables.attached.remove(old.event) {
                bus.remove_all(old.event);
            }
        }
        if tables.attached.remove(def.event) {
            bus.remove_all(def.event);
        }

        self.ensure_toggle(&def.name);
        if self.is_enabled(&def.name) {
            attach(bus, &def);
            tables.attached.insert(def.event);
        }

        if !tables.order.contains(&def.name) {
            tables.order.push(def.name.clone());
        }
        tracing::info!("Reloaded event `{}` ({})", def.name, def.event);
        tables.definitions.insert(def.name.clone(), def);
        Ok(true)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<EventDefinition>> {
        let tables = self.tables.read();
        tables.definitions.get(name).cloned().or_else(|| {
            tables
                .definitions
                .values()
                .find(|def| def.name.eq_ignore_ascii_case(name))
                .cloned()
        })
    }

    /// Definitions in discovery order.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<EventDefinition>> {
        let tables = self.tables.read();
        tables
            .order
            .iter()
            .filter_map(|name| tables.definitions.get(name).cloned())
            .collect()
    }

    #[must_use]
    pub fn is_attached(&self, name: &str) -> bool {
        self.get(name)
            .is_some_and(|def| self.tables.read().attached.contains(def.event))
    }

    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.store
            .get_as::<bool>(Domain::Events, name)
            .unwrap_or(true)
    }

    /// Sets the flag, or flips it when `enabled` is `None`. Listeners only
    /// change on the next reload.
    pub fn set_enabled(&self, name: &str, enabled: Option<bool>) -> bool {
        let enabled = enabled.unwrap_or_else(|| !self.is_enabled(name));
        self.store.set(Domain::Events, name, enabled);
        self.persist();

        tracing::info!("Event `{name}`: enabled = {enabled}");
        enabled
    }

    fn ensure_toggle(&self, name: &str) {
        if self.store.get(Domain::Events, name).is_none() {
            self.store.set(Domain::Events, name, true);
            self.persist();
        }
    }

    fn sync_toggles(&self, loaded: &[Arc<EventDefinition>], backed: &HashSet<String>) {
        let mut changed = false;

        for def in loaded {
            if self.store.get(Domain::Events, &def.name).is_none() {
                self.store.set(Domain::Events, &def.name, true);
                changed = true;
            }
        }

        for key in self.store.keys(Domain::Events, "") {
            if !backed.contains(&key) {
                tracing::info!("Removing flag for missing event `{key}`");
                self.store.remove(Domain::Events, &key);
                changed = true;
            }
        }

        if changed {
            self.persist();
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(Domain::Events) {
            tracing::error!("Unable to save event toggles: {e}");
        }
    }
}

fn attach(bus: &EventBus, def: &EventDefinition) {
    let listener = Arc::clone(&def.listener);
    if def.once {
        bus.once(def.event, listener);
    } else {
        bus.on(def.event, listener);
    }
    tracing::debug!("Attached `{}` to {}", def.name, def.event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> EventCatalog {
        ["message_create", "ready", "guild_delete", "goodbye"]
            .into_iter()
            .fold(EventCatalog::new(), |catalog, name| {
                catalog.listener(name, |_, _| async { Ok(()) })
            })
    }

    fn write(root: &Path, file: &str, manifest: &serde_json::Value) {
        std::fs::write(root.join(file), manifest.to_string()).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "messageCreate.json", &json!({}));
        write(dir.path(), "ready.json", &json!({ "once": true }));
        write(dir.path(), "leaving.json", &json!({ "event": "guildDelete", "handler": "goodbye" }));
        dir
    }

    #[test]
    fn load_all_attaches_every_enabled_event() {
        let dir = fixture();
        let store = Arc::new(ConfigStore::in_memory());
        let registry = EventRegistry::new(dir.path(), catalog(), Arc::clone(&store));
        let bus = EventBus::new();

        let report = registry.load_all(&bus).unwrap();
        assert_eq!(report.loaded, 3);
        assert_eq!(bus.listener_count("messageCreate"), 1);
        assert_eq!(bus.listener_count("ready"), 1);
        assert_eq!(bus.listener_count("guildDelete"), 1);

        let leaving = registry.get("leaving").unwrap();
        assert_eq!(leaving.handler_name, "goodbye");
        assert!(registry.get("ready").unwrap().once);
        assert_eq!(store.get_as::<bool>(Domain::Events, "leaving"), Some(true));
        assert_eq!(registry.get("messagecreate").unwrap().handler_name, "message_create");
    }

    #[test]
    fn disabled_events_are_detached_on_reload_all() {
        let dir = fixture();
        let store = Arc::new(ConfigStore::in_memory());
        let registry = EventRegistry::new(dir.path(), catalog(), store);
        let bus = EventBus::new();
        registry.load_all(&bus).unwrap();

        assert!(!registry.set_enabled("messageCreate", Some(false)));
        assert_eq!(bus.listener_count("messageCreate"), 1);

        registry.reload_all(&bus).unwrap();
        assert_eq!(bus.listener_count("messageCreate"), 0);
        assert_eq!(bus.listener_count("ready"), 1);
        assert!(!registry.is_attached("messageCreate"));
    }

    #[test]
    fn reloading_never_stacks_listeners() {
        let dir = fixture();
        let registry = EventRegistry::new(dir.path(), catalog(), Arc::new(ConfigStore::in_memory()));
        let bus = EventBus::new();

        registry.load_all(&bus).unwrap();
        registry.load_all(&bus).unwrap();
        assert!(registry.reload_one(&bus, "messageCreate").unwrap());
        assert!(registry.reload_one(&bus, "messageCreate").unwrap());

        assert_eq!(bus.listener_count("messageCreate"), 1);
    }

    #[test]
    fn orphaned_flags_are_removed() {
        let dir = fixture();
        let store = Arc::new(ConfigStore::in_memory());
        store.set(Domain::Events, "typingStart", false);
        let registry = EventRegistry::new(dir.path(), catalog(), Arc::clone(&store));

        registry.load_all(&EventBus::new()).unwrap();
        assert!(store.get(Domain::Events, "typingStart").is_none());
        assert_eq!(store.get_as::<bool>(Domain::Events, "ready"), Some(true));
    }

    #[test]
    fn set_enabled_flips_when_no_value_is_given() {
        let registry = EventRegistry::new("missing", catalog(), Arc::new(ConfigStore::in_memory()));

        assert!(registry.is_enabled("ready"));
        assert!(!registry.set_enabled("ready", None));
        assert!(registry.set_enabled("ready", None));
        assert!(!registry.set_enabled("ready", Some(false)));
        assert!(!registry.is_enabled("ready"));
    }

    #[test]
    fn reload_one_respects_the_flag() {
        let dir = fixture();
        let registry = EventRegistry::new(dir.path(), catalog(), Arc::new(ConfigStore::in_memory()));
        let bus = EventBus::new();
        registry.load_all(&bus).unwrap();

        registry.set_enabled("leaving", Some(false));
        assert!(registry.reload_one(&bus, "leaving").unwrap());
        assert_eq!(bus.listener_count("guildDelete"), 0);

        registry.set_enabled("leaving", Some(true));
        assert!(registry.reload_one(&bus, "leaving").unwrap());
        assert_eq!(bus.listener_count("guildDelete"), 1);

        assert!(!registry.reload_one(&bus, "nothing").unwrap());
    }

    #[test]
    fn broken_manifests_are_skipped() {
        let dir = fixture();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        write(dir.path(), "typingStart.json", &json!({}));
        write(dir.path(), "second.json", &json!({ "event": "messageCreate" }));
        let registry = EventRegistry::new(dir.path(), catalog(), Arc::new(ConfigStore::in_memory()));
        let bus = EventBus::new();

        let report = registry.load_all(&bus).unwrap();
        assert_eq!(report.loaded, 3);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(bus.listener_count("messageCreate"), 1);
        assert!(registry.get("second").is_none());
    }

    #[test]
    fn clashing_reload_keeps_the_current_listener() {
        let dir = fixture();
        let registry = EventRegistry::new(dir.path(), catalog(), Arc::new(ConfigStore::in_memory()));
        let bus = EventBus::new();
        registry.load_all(&bus).unwrap();

        write(dir.path(), "leaving.json", &json!({ "event": "messageCreate" }));
        assert!(!registry.reload_one(&bus, "leaving").unwrap());

        assert_eq!(registry.get("leaving").unwrap().event, "guildDelete");
        assert!(registry.is_attached("leaving"));
        assert_eq!(bus.listener_count("guildDelete"), 1);
        assert_eq!(bus.listener_count("messageCreate"), 1);
    }

    #[test]
    fn reload_one_only_reads_inside_the_root() {
        let dir = fixture();
        let events = dir.path().join("events");
        std::fs::create_dir(&events).unwrap();
        write(&events, "ready.json", &json!({}));
        let registry = EventRegistry::new(&events, catalog(), Arc::new(ConfigStore::in_memory()));
        let bus = EventBus::new();
        registry.load_all(&bus).unwrap();

        assert!(!registry.reload_one(&bus, "../leaving").unwrap());
        assert!(!registry.reload_one(&bus, "..").unwrap());
        assert!(registry.get("../leaving").is_none());
        assert_eq!(bus.listener_count("guildDelete"), 0);

        assert!(is_plain_name("messageCreate"));
        assert!(!is_plain_name("sub/ready"));
        assert!(!is_plain_name("sub\\ready"));
        assert!(!is_plain_name(""));
    }

    #[test]
    fn snake_case_splits_on_capitals() {
        assert_eq!(snake_case("messageCreate"), "message_create");
        assert_eq!(snake_case("guildMemberRemove"), "guild_member_remove");
        assert_eq!(snake_case("ready"), "ready");
    }
}
