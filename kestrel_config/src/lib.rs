use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

mod path;
mod settings;

pub use settings::{Blacklist, BlacklistServers, BotSettings, LoggingSettings};

/// Logical configuration domains, each persisted as `<dir>/<domain>.json`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    Config,
    Commands,
    Events,
    Blacklist,
    Logging,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::Config,
        Domain::Commands,
        Domain::Events,
        Domain::Blacklist,
        Domain::Logging,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Config => "config",
            Domain::Commands => "commands",
            Domain::Events => "events",
            Domain::Blacklist => "blacklist",
            Domain::Logging => "logging",
        }
    }

    fn default_document(self) -> Value {
        match self {
            Domain::Config => json!({
                "prefix": "!",
                "ownerId": [],
                "deployOnStart": false,
                "undeployOnExit": false,
            }),
            Domain::Commands => json!({ "slash": {}, "prefix": {} }),
            Domain::Events => json!({}),
            Domain::Blacklist => json!({
                "users": [],
                "servers": { "leave": [], "ignore": [] },
            }),
            Domain::Logging => json!({ "level": "info" }),
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unable to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize the {0} document: {1}")]
    Serialize(Domain, #[source] serde_json::Error),
}

/// Key/value configuration split into JSON documents by [`Domain`].
///
/// Keys are dotted paths (`servers.leave`), and an empty path addresses the
/// whole document. Mutations only touch memory until [`ConfigStore::save`] is
/// called for the domain.
pub struct ConfigStore {
    dir: Option<PathBuf>,
    documents: RwLock<HashMap<Domain, Value>>,
}

impl ConfigStore {
    /// Opens every domain under `dir`, falling back to the domain defaults
    /// for files that don't exist yet.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        let mut documents = HashMap::new();

        for domain in Domain::ALL {
            documents.insert(domain, read_document(&dir, domain)?);
        }

        Ok(Self {
            dir: Some(dir),
            documents: RwLock::new(documents),
        })
    }

    /// A store that never touches the filesystem.
    #[must_use]
    pub fn in_memory() -> Self {
        let documents = Domain::ALL
            .into_iter()
            .map(|domain| (domain, domain.default_document()))
            .collect();

        Self {
            dir: None,
            documents: RwLock::new(documents),
        }
    }

    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    #[must_use]
    pub fn get(&self, domain: Domain, key: &str) -> Option<Value> {
        let documents = self.documents.read();
        documents
            .get(&domain)
            .and_then(|doc| path::lookup(doc, key))
            .cloned()
    }

    /// Returns `None` when the key is missing or holds a value of another shape.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, domain: Domain, key: &str) -> Option<T> {
        let value = self.get(domain, key)?;
        serde_json::from_value(value).ok()
    }

    pub fn set(&self, domain: Domain, key: &str, value: impl Into<Value>) {
        let mut documents = self.documents.write();
        let doc = documents
            .entry(domain)
            .or_insert_with(|| domain.default_document());
        path::insert(doc, key, value.into());
    }

    pub fn remove(&self, domain: Domain, key: &str) -> Option<Value> {
        let mut documents = self.documents.write();
        documents
            .get_mut(&domain)
            .and_then(|doc| path::remove(doc, key))
    }

    /// Keys of the object stored at `key`, empty if it isn't an object.
    #[must_use]
    pub fn keys(&self, domain: Domain, key: &str) -> Vec<String> {
        let documents = self.documents.read();
        documents
            .get(&domain)
            .and_then(|doc| path::lookup(doc, key))
            .and_then(Value::as_object)
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Re-reads one domain from disk, replacing the in-memory document.
    pub fn load(&self, domain: Domain) -> Result<(), StoreError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };

        let doc = read_document(dir, domain)?;
        self.documents.write().insert(domain, doc);
        Ok(())
    }

    pub fn save(&self, domain: Domain) -> Result<(), StoreError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };

        let contents = {
            let documents = self.documents.read();
            let doc = documents.get(&domain).cloned().unwrap_or(Value::Null);
            serde_json::to_string_pretty(&doc).map_err(|e| StoreError::Serialize(domain, e))?
        };

        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let path = document_path(dir, domain);
        fs::write(&path, contents).map_err(|source| StoreError::Io { path, source })?;

        tracing::debug!("Saved the {domain} document");
        Ok(())
    }

    #[must_use]
    pub fn settings(&self) -> BotSettings {
        self.view(Domain::Config)
    }

    #[must_use]
    pub fn blacklist(&self) -> Blacklist {
        self.view(Domain::Blacklist)
    }

    #[must_use]
    pub fn logging(&self) -> LoggingSettings {
        self.view(Domain::Logging)
    }

    fn view<T: DeserializeOwned + Default>(&self, domain: Domain) -> T {
        let Some(doc) = self.get(domain, "") else {
            return T::default();
        };

        match serde_json::from_value(doc) {
            Ok(view) => view,
            Err(e) => {
                tracing::warn!("The {domain} document is malformed, using defaults: {e}");
                T::default()
            }
        }
    }
}

fn document_path(dir: &Path, domain: Domain) -> PathBuf {
    dir.join(format!("{}.json", domain.as_str()))
}

fn read_document(dir: &Path, domain: Domain) -> Result<Value, StoreError> {
    let path = document_path(dir, domain);

    match fs::read_to_string(&path) {
        Ok(contents) => {
            serde_json::from_str(&contents).map_err(|source| StoreError::Parse { path, source })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(domain.default_document()),
        Err(source) => Err(StoreError::Io { path, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serenity::all::{GuildId, UserId};

    #[test]
    fn nested_set_creates_intermediate_objects() {
        let store = ConfigStore::in_memory();
        store.set(Domain::Commands, "prefix.ping", false);

        assert_eq!(
            store.get(Domain::Commands, "prefix.ping"),
            Some(Value::Bool(false))
        );
        assert_eq!(store.keys(Domain::Commands, "prefix"), vec!["ping"]);
        assert!(store.get(Domain::Commands, "slash.ping").is_none());
    }

    #[test]
    fn remove_returns_the_old_value() {
        let store = ConfigStore::in_memory();
        store.set(Domain::Events, "ready", true);

        assert_eq!(store.remove(Domain::Events, "ready"), Some(Value::Bool(true)));
        assert_eq!(store.remove(Domain::Events, "ready"), None);
    }

    #[test]
    fn typed_views_fall_back_to_defaults() {
        let store = ConfigStore::in_memory();
        let settings = store.settings();

        assert_eq!(settings.prefix, "!");
        assert!(settings.owner_id.is_empty());
        assert!(store.blacklist().users.is_empty());
        assert_eq!(store.logging().level, "info");
    }

    #[test]
    fn ids_are_read_from_strings() {
        let store = ConfigStore::in_memory();
        store.set(Domain::Config, "ownerId", json!(["101", "202"]));
        store.set(Domain::Blacklist, "servers.leave", json!(["303"]));

        let settings = store.settings();
        assert!(settings.is_owner(UserId::new(202)));
        assert!(!settings.is_owner(UserId::new(404)));
        assert!(store
            .blacklist()
            .servers
            .leave
            .contains(&GuildId::new(303)));
    }

    #[test]
    fn documents_survive_a_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let store = ConfigStore::open(dir.path()).unwrap();
        store.set(Domain::Config, "prefix", "?");
        store.set(Domain::Events, "messageCreate", false);
        store.save(Domain::Config).unwrap();
        store.save(Domain::Events).unwrap();

        let reopened = ConfigStore::open(dir.path()).unwrap();
        assert_eq!(reopened.settings().prefix, "?");
        assert_eq!(
            reopened.get_as::<bool>(Domain::Events, "messageCreate"),
            Some(false)
        );
    }

    #[test]
    fn load_discards_unsaved_changes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path()).unwrap();
        store.set(Domain::Logging, "level", "debug");
        store.save(Domain::Logging).unwrap();

        store.set(Domain::Logging, "level", "trace");
        store.load(Domain::Logging).unwrap();

        assert_eq!(store.logging().level, "debug");
    }

    #[test]
    fn malformed_documents_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blacklist.json"), "{ not json").unwrap();

        let result = ConfigStore::open(dir.path());
        assert!(matches!(result, Err(StoreError::Parse { .. })));
    }
}
