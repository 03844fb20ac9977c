use std::sync::Arc;

use kestrel_data::reporting::{ErrorRecord, ErrorReporter, TracingReporter};
use serenity::all::{ChannelId, Http};
use serenity::async_trait;

/// Logs every failure and posts a summary to the configured error channel.
pub struct ChannelReporter {
    http: Arc<Http>,
    channel: ChannelId,
}

impl ChannelReporter {
    pub fn new(http: Arc<Http>, channel: ChannelId) -> Self {
        Self { http, channel }
    }
}

fn render(record: &ErrorRecord) -> String {
    let mut out = format!(
        "**Error in {} command `{}`**\n{}\n```\n{}",
        record.kind, record.command, record.context, record.error
    );
    for cause in &record.chain {
        out.push_str("\ncaused by: ");
        out.push_str(cause);
    }
    out.push_str("\n```");
    out
}

#[async_trait]
impl ErrorReporter for ChannelReporter {
    async fn report(&self, record: &ErrorRecord) {
        TracingReporter.report(record).await;

        if let Err(e) = self.channel.say(&self.http, render(record)).await {
            tracing::warn!("Unable to post error report to {}: {e}", self.channel);
        }
    }
}
