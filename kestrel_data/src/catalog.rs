use std::{collections::HashMap, future::Future, sync::Arc};

use futures::future::BoxFuture;

use crate::{
    commands::{CommandCall, CommandHandler},
    events::{BotClient, GatewayEvent, Listener},
    Error,
};

/// Compiled-in handlers, looked up by the name a manifest refers to.
pub struct Catalog<H> {
    handlers: HashMap<String, H>,
}

pub type HandlerCatalog = Catalog<CommandHandler>;
pub type EventCatalog = Catalog<Listener>;

impl<H: Clone> Catalog<H> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, handler: H) {
        self.handlers.insert(name.into(), handler);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<H> {
        self.handlers.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<H: Clone> Default for Catalog<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerCatalog {
    #[must_use]
    pub fn command<F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(CommandCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let handler: CommandHandler =
            Arc::new(move |call: CommandCall| -> BoxFuture<'static, Result<(), Error>> {
                Box::pin(handler(call))
            });
        self.insert(name, handler);
        self
    }
}

impl EventCatalog {
    #[must_use]
    pub fn listener<F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(Arc<GatewayEvent>, BotClient) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let listener: Listener = Arc::new(
            move |event: Arc<GatewayEvent>, client: BotClient| -> BoxFuture<'static, Result<(), Error>> {
                Box::pin(handler(event, client))
            },
        );
        self.insert(name, listener);
        self
    }
}
