use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use kestrel_config::{ConfigStore, Domain};
use parking_lot::{Mutex, RwLock};
use walkdir::WalkDir;

use super::{load_definition, CommandDefinition, CommandKind};
use crate::{
    catalog::HandlerCatalog,
    error::{LoadReport, ReloadError},
};

#[derive(Default)]
struct KindTable {
    by_name: HashMap<String, Arc<CommandDefinition>>,
    /// Names in discovery order, used to break ties in fuzzy lookups.
    order: Vec<String>,
}

#[derive(Default)]
struct Tables {
    slash: KindTable,
    prefix: KindTable,
    /// Prefix alias -> command name.
    aliases: HashMap<String, String>,
    alias_order: Vec<String>,
}

impl Tables {
    fn kind(&self, kind: CommandKind) -> &KindTable {
        match kind {
            CommandKind::Slash => &self.slash,
            CommandKind::Prefix => &self.prefix,
        }
    }

    fn kind_mut(&mut self, kind: CommandKind) -> &mut KindTable {
        match kind {
            CommandKind::Slash => &mut self.slash,
            CommandKind::Prefix => &mut self.prefix,
        }
    }

    fn clear(&mut self, kind: CommandKind) {
        *self.kind_mut(kind) = KindTable::default();
        if kind == CommandKind::Prefix {
            self.aliases.clear();
            self.alias_order.clear();
        }
    }

    fn is_taken(&self, key: &str) -> bool {
        self.prefix.by_name.contains_key(key) || self.aliases.contains_key(key)
    }

    /// Returns false if the name is already registered for this kind.
    fn insert_name(&mut self, def: &Arc<CommandDefinition>) -> bool {
        if def.kind == CommandKind::Prefix && self.aliases.contains_key(&def.name) {
            tracing::warn!(
                "`{}` from {} is already an alias, skipping",
                def.name,
                def.source.display()
            );
            return false;
        }

        let table = self.kind_mut(def.kind);
        if table.by_name.contains_key(&def.name) {
            tracing::warn!(
                "Duplicate {} command `{}` in {}, skipping",
                def.kind,
                def.name,
                def.source.display()
            );
            return false;
        }

        table.by_name.insert(def.name.clone(), Arc::clone(def));
        table.order.push(def.name.clone());
        true
    }

    fn insert_aliases(&mut self, def: &CommandDefinition) {
        for alias in &def.aliases {
            if self.is_taken(alias) {
                tracing::warn!(
                    "Alias `{alias}` of `{}` collides with another command, skipping",
                    def.name
                );
                continue;
            }

            self.aliases.insert(alias.clone(), def.name.clone());
            self.alias_order.push(alias.clone());
        }
    }

    /// What a reloaded `def` would collide with, ignoring the entries of the
    /// command it replaces.
    fn rename_clash(&self, def: &CommandDefinition, old_name: &str) -> Option<String> {
        if def.name == old_name {
            return None;
        }
        if self.kind(def.kind).by_name.contains_key(&def.name) {
            return Some(format!("the {} command `{}`", def.kind, def.name));
        }
        match self.aliases.get(&def.name) {
            Some(owner) if def.kind == CommandKind::Prefix && owner != old_name => {
                Some(format!("an alias of `{owner}`"))
            }
            _ => None,
        }
    }

    fn remove_aliases_of(&mut self, name: &str) {
        self.aliases.retain(|_, target| target != name);
        let aliases = &self.aliases;
        self.alias_order.retain(|alias| aliases.contains_key(alias));
    }
}

/// The entry in `candidates` starting with `input` with the fewest extra
/// characters; the first one wins a tie.
fn nearest<'a>(candidates: &'a [String], input: &str) -> Option<&'a String> {
    candidates
        .iter()
        .filter(|candidate| candidate.starts_with(input))
        .min_by_key(|candidate| candidate.len() - input.len())
}

/// Slash and prefix commands loaded from their manifest trees.
///
/// Enabled flags live in the `commands` config domain under
/// `<kind>.<name>` and default to enabled.
pub struct CommandRegistry {
    root: PathBuf,
    catalog: HandlerCatalog,
    store: Arc<ConfigStore>,
    tables: RwLock<Tables>,
    reload_guard: Mutex<()>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, catalog: HandlerCatalog, store: Arc<ConfigStore>) -> Self {
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

    /// Clears every table and loads both manifest trees again.
    pub fn load_all(&self) -> Result<LoadReport, ReloadError> {
        let _guard = self.reload_guard.try_lock().ok_or(ReloadError::Busy)?;

        let mut report = LoadReport::default();
        for kind in CommandKind::ALL {
            report.merge(self.load_kind(kind));
        }
        self.ensure_toggles();

        tracing::info!(
            "Loaded {} commands ({} failed)",
            report.loaded,
            report.failed.len()
        );
        Ok(report)
    }

    /// Clears one kind and loads its tree again, leaving the other kind alone.
    pub fn reload_all(&self, kind: CommandKind) -> Result<LoadReport, ReloadError> {
        let _guard = self.reload_guard.try_lock().ok_or(ReloadError::Busy)?;

        let report = self.load_kind(kind);
        self.ensure_toggles();

        tracing::info!(
            "Reloaded {} {kind} commands ({} failed)",
            report.loaded,
            report.failed.len()
        );
        Ok(report)
    }

    /// Re-reads the manifest of the command nearest to `name` and swaps the
    /// new definition in at the same key. Logs and returns `None` when the
    /// command can't be found or its manifest no longer loads.
    pub fn reload_one(
        &self,
        name: &str,
        kind: CommandKind,
    ) -> Result<Option<Arc<CommandDefinition>>, ReloadError> {
        let _guard = self.reload_guard.try_lock().ok_or(ReloadError::Busy)?;

        let Some(old) = self.find_nearest(name, kind) else {
            tracing::warn!("No {kind} command matches `{name}`, nothing to reload");
            return Ok(None);
        };

        let root = self.kind_root(kind);
        let new = match load_definition(&old.source, &root, kind, &self.catalog) {
            Ok(def) => Arc::new(def),
            Err(e) => {
                tracing::error!("Failed to reload {kind} command `{}`: {e}", old.name);
                return Ok(None);
            }
        };

        {
            let mut tables = self.tables.write();
            if let Some(clash) = tables.rename_clash(&new, &old.name) {
                tracing::warn!(
                    "Reloaded `{}` would be renamed to `{}`, which is already {clash}; keeping the old definition",
                    old.name,
                    new.name
                );
                return Ok(None);
            }

            if kind == CommandKind::Prefix {
                tables.remove_aliases_of(&old.name);
            }

            let table = tables.kind_mut(kind);
            let position = table.order.iter().position(|n| *n == old.name);
            table.by_name.remove(&old.name);
            table.by_name.insert(new.name.clone(), Arc::clone(&new));
            match position {
                Some(i) => table.order[i].clone_from(&new.name),
                None => table.order.push(new.name.clone()),
            }

            if kind == CommandKind::Prefix {
                tables.insert_aliases(&new);
            }
        }

        self.ensure_toggles();
        tracing::info!("Reloaded {kind} command `{}`", new.name);
        Ok(Some(new))
    }

    /// Exact name, or for prefix commands exact alias.
    #[must_use]
    pub fn get(&self, name: &str, kind: CommandKind) -> Option<Arc<CommandDefinition>> {
        let tables = self.tables.read();
        let table = tables.kind(kind);

        if let Some(def) = table.by_name.get(name) {
            return Some(Arc::clone(def));
        }

        match kind {
            CommandKind::Prefix => tables
                .aliases
                .get(name)
                .and_then(|target| table.by_name.get(target))
                .cloned(),
            CommandKind::Slash => None,
        }
    }

    /// Resolves a possibly partial name: exact alias first, then the name
    /// starting with `input` that is closest in length, then (prefix only)
    /// the closest alias. An exact name always wins.
    #[must_use]
    pub fn find_nearest(&self, input: &str, kind: CommandKind) -> Option<Arc<CommandDefinition>> {
        let input = input.trim().to_lowercase();
        if input.is_empty() {
            return None;
        }

        let tables = self.tables.read();
        let table = tables.kind(kind);

        if kind == CommandKind::Prefix {
            if let Some(target) = tables.aliases.get(&input) {
                return table.by_name.get(target).cloned();
            }
        }

        if let Some(name) = nearest(&table.order, &input) {
            return table.by_name.get(name).cloned();
        }

        if kind == CommandKind::Prefix {
            return nearest(&tables.alias_order, &input)
                .and_then(|alias| tables.aliases.get(alias))
                .and_then(|target| table.by_name.get(target))
                .cloned();
        }

        None
    }

    /// Definitions of one kind in discovery order.
    #[must_use]
    pub fn list(&self, kind: CommandKind) -> Vec<Arc<CommandDefinition>> {
        let tables = self.tables.read();
        let table = tables.kind(kind);
        table
            .order
            .iter()
            .filter_map(|name| table.by_name.get(name).cloned())
            .collect()
    }

    #[must_use]
    pub fn len(&self, kind: CommandKind) -> usize {
        self.tables.read().kind(kind).by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        CommandKind::ALL.into_iter().all(|kind| self.len(kind) == 0)
    }

    /// The persisted flag; a missing flag is stored as enabled.
    #[must_use]
    pub fn is_enabled(&self, name: &str, kind: CommandKind) -> bool {
        let key = toggle_key(kind, name);
        if let Some(enabled) = self.store.get_as::<bool>(Domain::Commands, &key) {
            return enabled;
        }

        self.store.set(Domain::Commands, &key, true);
        self.persist();
        true
    }

    /// Flips the flag of the command nearest to `name`, returning its
    /// canonical name and new state.
    pub fn toggle(&self, name: &str, kind: CommandKind) -> Option<(String, bool)> {
        let def = self.find_nearest(name, kind)?;
        let enabled = !self.is_enabled(&def.name, kind);

        self.store
            .set(Domain::Commands, &toggle_key(kind, &def.name), enabled);
        self.persist();

        tracing::info!("Toggled {kind} command `{}`: enabled = {enabled}", def.name);
        Some((def.name.clone(), enabled))
    }

    pub fn set_enabled(&self, name: &str, kind: CommandKind, enabled: bool) -> Option<String> {
        let def = self.find_nearest(name, kind)?;

        self.store
            .set(Domain::Commands, &toggle_key(kind, &def.name), enabled);
        self.persist();
        Some(def.name.clone())
    }

    fn kind_root(&self, kind: CommandKind) -> PathBuf {
        self.root.join(kind.as_str())
    }

    fn load_kind(&self, kind: CommandKind) -> LoadReport {
        let root = self.kind_root(kind);
        let mut report = LoadReport::default();

        if !root.is_dir() {
            tracing::warn!("{} does not exist, no {kind} commands", root.display());
            self.tables.write().clear(kind);
            return report;
        }

        let mut loaded = Vec::new();
        for path in manifest_paths(&root) {
            let result = load_definition(&path, &root, kind, &self.catalog).map(|def| {
                loaded.push(Arc::new(def));
            });
            report.record(result, path);
        }

        let mut tables = self.tables.write();
        tables.clear(kind);

        // Names first so an alias can never shadow a later command's name.
        let mut registered = Vec::with_capacity(loaded.len());
        for def in loaded {
            if tables.insert_name(&def) {
                registered.push(def);
            } else {
                report.loaded -= 1;
                report
                    .failed
                    .push((def.source.clone(), format!("`{}` is already taken", def.name)));
            }
        }

        if kind == CommandKind::Prefix {
            for def in &registered {
                tables.insert_aliases(def);
            }
        }

        report
    }

    /// Adds an enabled flag for every known command that doesn't have one.
    fn ensure_toggles(&self) {
        let mut added = false;

        for kind in CommandKind::ALL {
            for def in self.list(kind) {
                let key = toggle_key(kind, &def.name);
                if self.store.get(Domain::Commands, &key).is_none() {
                    self.store.set(Domain::Commands, &key, true);
                    added = true;
                }
            }
        }

        if added {
            self.persist();
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(Domain::Commands) {
            tracing::error!("Unable to save command toggles: {e}");
        }
    }
}

fn toggle_key(kind: CommandKind, name: &str) -> String {
    format!("{}.{name}", kind.as_str())
}

pub(crate) fn manifest_paths(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {e}", root.display());
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect()
}
