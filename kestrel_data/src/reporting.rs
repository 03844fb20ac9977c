use serenity::async_trait;

use crate::{commands::CommandKind, Error};

/// A handler failure, normalized for whoever collects errors.
#[derive(Clone, Debug)]
pub struct ErrorRecord {
    pub command: String,
    pub kind: CommandKind,
    /// Where the command was invoked from.
    pub context: String,
    pub error: String,
    /// `source()` chain below `error`, outermost first.
    pub chain: Vec<String>,
}

impl ErrorRecord {
    #[must_use]
    pub fn new(command: &str, kind: CommandKind, context: String, error: &Error) -> Self {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(inner) = source {
            chain.push(inner.to_string());
            source = inner.source();
        }

        Self {
            command: command.to_owned(),
            kind,
            context,
            error: error.to_string(),
            chain,
        }
    }
}

#[async_trait]
pub trait ErrorReporter: Send + Sync {
    async fn report(&self, record: &ErrorRecord);
}

/// Reports through `tracing` only.
pub struct TracingReporter;

#[async_trait]
impl ErrorReporter for TracingReporter {
    async fn report(&self, record: &ErrorRecord) {
        tracing::error!(
            command = %record.command,
            kind = %record.kind,
            context = %record.context,
            chain = ?record.chain,
            "Error in command: {}",
            record.error
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("request failed")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn record_walks_the_source_chain() {
        let error: Error = Box::new(Outer(std::io::Error::other("connection reset")));
        let record = ErrorRecord::new("ping", CommandKind::Prefix, "test".into(), &error);

        assert_eq!(record.error, "request failed");
        assert_eq!(record.chain, vec!["connection reset".to_owned()]);
    }
}
