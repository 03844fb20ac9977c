use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::{
    catalog::HandlerCatalog,
    cooldowns::Cooldowns,
    error::LoadError,
    invocation::{Arguments, Invocation},
    structs::Data,
    Error,
};

mod registry;
pub(crate) use registry::manifest_paths;
pub use registry::CommandRegistry;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Slash,
    Prefix,
}

impl CommandKind {
    pub const ALL: [CommandKind; 2] = [CommandKind::Slash, CommandKind::Prefix];

    /// Name of the manifest tree and of the toggle table.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Slash => "slash",
            CommandKind::Prefix => "prefix",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a command handler gets handed.
pub struct CommandCall {
    pub ctx: Arc<dyn Invocation>,
    pub args: Arguments,
    pub data: Arc<Data>,
    pub command: Arc<CommandDefinition>,
}

impl CommandCall {
    #[must_use]
    pub fn category(&self) -> &str {
        &self.command.category
    }
}

pub type CommandHandler = Arc<dyn Fn(CommandCall) -> BoxFuture<'static, Result<(), Error>> + Send + Sync>;

/// The structured descriptor Discord needs to register a slash command.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SlashData {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options: Vec<SlashOptionSpec>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SlashOptionSpec {
    #[serde(rename = "type")]
    pub kind: OptionKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    String,
    Integer,
    Number,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
}

pub struct CommandDefinition {
    pub name: String,
    pub kind: CommandKind,
    pub category: String,
    pub aliases: Vec<String>,
    pub allow_dm: bool,
    pub nsfw: bool,
    pub cooldowns: Cooldowns,
    pub description: String,
    pub usage: Option<String>,
    /// Only set for slash commands.
    pub data: Option<SlashData>,
    pub handler_name: String,
    /// The manifest this definition was loaded from; reloads read it again.
    pub source: PathBuf,
    pub handler: CommandHandler,
}

impl CommandDefinition {
    #[must_use]
    pub fn is_owner_only(&self) -> bool {
        self.category.eq_ignore_ascii_case("owner")
    }
}

impl fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("category", &self.category)
            .field("aliases", &self.aliases)
            .field("allow_dm", &self.allow_dm)
            .field("nsfw", &self.nsfw)
            .field("cooldowns", &self.cooldowns)
            .field("handler_name", &self.handler_name)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    name: Option<String>,
    data: Option<SlashData>,
    #[serde(default)]
    aliases: Vec<String>,
    category: Option<String>,
    #[serde(default, rename = "allowDM")]
    allow_dm: bool,
    #[serde(default)]
    nsfw: bool,
    #[serde(default)]
    cooldowns: Cooldowns,
    handler: Option<String>,
    description: Option<String>,
    usage: Option<String>,
}

/// Reads and validates one command manifest. `root` is the kind's tree root,
/// used to derive a category from the directory layout.
pub(crate) fn load_definition(
    path: &Path,
    root: &Path,
    kind: CommandKind,
    catalog: &HandlerCatalog,
) -> Result<CommandDefinition, LoadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_owned(),
        source,
    })?;

    let manifest: Manifest = serde_json::from_str(&contents).map_err(|source| LoadError::Parse {
        path: path.to_owned(),
        source,
    })?;

    let name = match kind {
        CommandKind::Slash => manifest.data.as_ref().map(|d| d.name.clone()),
        CommandKind::Prefix => manifest.name.clone(),
    }
    .map(|n| n.trim().to_lowercase())
    .filter(|n| !n.is_empty())
    .ok_or_else(|| LoadError::MissingName {
        path: path.to_owned(),
    })?;

    let handler_name = manifest.handler.clone().unwrap_or_else(|| name.clone());
    let handler = catalog
        .get(&handler_name)
        .ok_or_else(|| LoadError::UnknownHandler {
            path: path.to_owned(),
            handler: handler_name.clone(),
        })?;

    let aliases = match kind {
        CommandKind::Prefix => manifest
            .aliases
            .iter()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty() && *a != name)
            .collect(),
        CommandKind::Slash => {
            if !manifest.aliases.is_empty() {
                tracing::warn!("{}: slash commands can't have aliases", path.display());
            }
            Vec::new()
        }
    };

    let category = manifest
        .category
        .clone()
        .unwrap_or_else(|| category_from_path(path, root));

    let description = manifest
        .description
        .clone()
        .or_else(|| manifest.data.as_ref().map(|d| d.description.clone()))
        .unwrap_or_default();

    Ok(CommandDefinition {
        name,
        kind,
        category,
        aliases,
        allow_dm: manifest.allow_dm,
        nsfw: manifest.nsfw,
        cooldowns: manifest.cooldowns,
        description,
        usage: manifest.usage,
        data: match kind {
            CommandKind::Slash => manifest.data,
            CommandKind::Prefix => None,
        },
        handler_name,
        source: path.to_owned(),
        handler,
    })
}

// `prefix/owner/reload.json` -> "owner", `prefix/ping.json` -> "misc".
fn category_from_path(path: &Path, root: &Path) -> String {
    let Ok(relative) = path.strip_prefix(root) else {
        return "misc".to_owned();
    };

    let mut components = relative.components();
    components.next_back();
    components
        .next()
        .and_then(|c| c.as_os_str().to_str())
        .map_or_else(|| "misc".to_owned(), str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> HandlerCatalog {
        HandlerCatalog::new().command("ping", |_| async { Ok(()) })
    }

    fn write(dir: &Path, relative: &str, contents: &str) -> PathBuf {
        let path = dir.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn prefix_manifest_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "meta/ping.json",
            r#"{ "name": "Ping", "aliases": ["P", "ping"], "cooldowns": { "user": 5000 } }"#,
        );

        let def = load_definition(&path, dir.path(), CommandKind::Prefix, &catalog()).unwrap();
        assert_eq!(def.name, "ping");
        assert_eq!(def.aliases, vec!["p"]);
        assert_eq!(def.category, "meta");
        assert_eq!(def.handler_name, "ping");
        assert!(!def.allow_dm);
        assert_eq!(def.cooldowns.user, Some(5000));
    }

    #[test]
    fn slash_manifest_takes_its_name_from_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "pong.json",
            r#"{
                "data": {
                    "name": "pong",
                    "description": "Replies",
                    "options": [{ "type": "string", "name": "text", "required": true }]
                },
                "handler": "ping",
                "allowDM": true
            }"#,
        );

        let def = load_definition(&path, dir.path(), CommandKind::Slash, &catalog()).unwrap();
        assert_eq!(def.name, "pong");
        assert_eq!(def.category, "misc");
        assert_eq!(def.description, "Replies");
        assert!(def.allow_dm);
        let data = def.data.unwrap();
        assert_eq!(data.options[0].kind, OptionKind::String);
        assert!(data.options[0].required);
    }

    #[test]
    fn manifests_without_a_name_or_handler_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let nameless = write(dir.path(), "a.json", r#"{ "name": "ping" }"#);
        let unknown = write(dir.path(), "b.json", r#"{ "name": "stats" }"#);

        assert!(matches!(
            load_definition(&nameless, dir.path(), CommandKind::Slash, &catalog()),
            Err(LoadError::MissingName { .. })
        ));
        assert!(matches!(
            load_definition(&unknown, dir.path(), CommandKind::Prefix, &catalog()),
            Err(LoadError::UnknownHandler { .. })
        ));
    }
}
