use std::sync::Arc;

use serenity::all::{ChannelId, GuildId, RoleId, UserId};
use serenity::async_trait;

use crate::Error;

/// Whatever a command was invoked from: a prefix message or a slash interaction.
///
/// The dispatcher only needs identities and a way to answer, so tests and
/// decorators implement this without a gateway connection.
#[async_trait]
pub trait Invocation: Send + Sync {
    fn author_id(&self) -> UserId;

    fn guild_id(&self) -> Option<GuildId>;

    fn channel_id(&self) -> ChannelId;

    fn is_nsfw(&self) -> bool;

    /// Where the invocation came from, for error reports.
    fn describe(&self) -> String;

    /// The gateway context, when there is one.
    fn serenity(&self) -> Option<&serenity::all::Context> {
        None
    }

    /// Answers the invocation directly (message reply / interaction response).
    async fn reply(&self, content: &str) -> Result<(), Error>;

    /// Posts to the invoking channel without referencing the invocation.
    async fn send(&self, content: &str) -> Result<(), Error>;

    async fn leave_guild(&self) -> Result<(), Error>;
}

/// Shown to owners running a command that is switched off.
pub const DISABLED_BANNER: &str =
    "⚠️ **This command is disabled.** You can only run it because you're an owner.\n";

/// Wraps an invocation so everything it sends starts with a banner.
pub struct Disclaimed {
    inner: Arc<dyn Invocation>,
    banner: &'static str,
}

impl Disclaimed {
    #[must_use]
    pub fn new(inner: Arc<dyn Invocation>, banner: &'static str) -> Self {
        Self { inner, banner }
    }

    fn decorate(&self, content: &str) -> String {
        format!("{}{content}", self.banner)
    }
}

#[async_trait]
impl Invocation for Disclaimed {
    fn author_id(&self) -> UserId {
        self.inner.author_id()
    }

    fn guild_id(&self) -> Option<GuildId> {
        self.inner.guild_id()
    }

    fn channel_id(&self) -> ChannelId {
        self.inner.channel_id()
    }

    fn is_nsfw(&self) -> bool {
        self.inner.is_nsfw()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn serenity(&self) -> Option<&serenity::all::Context> {
        self.inner.serenity()
    }

    async fn reply(&self, content: &str) -> Result<(), Error> {
        self.inner.reply(&self.decorate(content)).await
    }

    async fn send(&self, content: &str) -> Result<(), Error> {
        self.inner.send(&self.decorate(content)).await
    }

    async fn leave_guild(&self) -> Result<(), Error> {
        self.inner.leave_guild().await
    }
}

/// Normalized command arguments.
#[derive(Clone, Debug, PartialEq)]
pub enum Arguments {
    /// Whitespace-separated tokens after the command name.
    Prefix(Vec<String>),
    Slash(Vec<SlashOption>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SlashOption {
    pub name: String,
    pub value: OptionValue,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    User(UserId),
    Channel(ChannelId),
    Role(RoleId),
    Mentionable(u64),
    SubCommand(Vec<SlashOption>),
    Unsupported,
}

impl OptionValue {
    /// Renders scalar values the way a prefix user would have typed them.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            OptionValue::String(s) => Some(s.clone()),
            OptionValue::Integer(i) => Some(i.to_string()),
            OptionValue::Number(n) => Some(n.to_string()),
            OptionValue::Boolean(b) => Some(b.to_string()),
            OptionValue::User(id) => Some(id.to_string()),
            OptionValue::Channel(id) => Some(id.to_string()),
            OptionValue::Role(id) => Some(id.to_string()),
            OptionValue::Mentionable(id) => Some(id.to_string()),
            OptionValue::SubCommand(_) | OptionValue::Unsupported => None,
        }
    }
}

impl Arguments {
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        match self {
            Arguments::Prefix(tokens) => tokens,
            Arguments::Slash(_) => &[],
        }
    }

    #[must_use]
    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        match self {
            Arguments::Prefix(_) => None,
            Arguments::Slash(options) => options.iter().find(|o| o.name == name).map(|o| &o.value),
        }
    }

    /// Token `index` for prefix invocations, option `name` for slash ones.
    #[must_use]
    pub fn positional(&self, index: usize, name: &str) -> Option<String> {
        match self {
            Arguments::Prefix(tokens) => tokens.get(index).cloned(),
            Arguments::Slash(_) => self.option(name).and_then(OptionValue::as_text),
        }
    }

    /// Whether a prefix invocation carries `flag` anywhere, or a slash
    /// invocation sets the boolean option of the same name.
    #[must_use]
    pub fn flag(&self, flag: &str) -> bool {
        match self {
            Arguments::Prefix(tokens) => tokens.iter().any(|t| t == &format!("--{flag}")),
            Arguments::Slash(_) => matches!(self.option(flag), Some(OptionValue::Boolean(true))),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Arguments::Prefix(tokens) => tokens.is_empty(),
            Arguments::Slash(options) => options.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeInvocation;

    #[tokio::test]
    async fn banner_is_prepended_to_every_outgoing_message() {
        let fake = Arc::new(FakeInvocation::guild(1, 2));
        let wrapped = Disclaimed::new(fake.clone(), DISABLED_BANNER);

        wrapped.reply("pong").await.unwrap();
        wrapped.send("again").await.unwrap();

        let sent = fake.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], format!("{DISABLED_BANNER}pong"));
        assert_eq!(sent[1], format!("{DISABLED_BANNER}again"));
        assert_eq!(wrapped.author_id(), UserId::new(1));
        assert_eq!(wrapped.guild_id(), Some(GuildId::new(2)));
    }

    #[test]
    fn positional_reads_tokens_or_options() {
        let prefix = Arguments::Prefix(vec!["command".into(), "ping".into(), "--slash".into()]);
        assert_eq!(prefix.positional(1, "name").as_deref(), Some("ping"));
        assert!(prefix.flag("slash"));

        let slash = Arguments::Slash(vec![
            SlashOption {
                name: "name".into(),
                value: OptionValue::String("ping".into()),
            },
            SlashOption {
                name: "slash".into(),
                value: OptionValue::Boolean(true),
            },
        ]);
        assert_eq!(slash.positional(1, "name").as_deref(), Some("ping"));
        assert!(slash.flag("slash"));
        assert!(slash.tokens().is_empty());
    }
}
