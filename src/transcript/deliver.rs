//! Transcript delivery as an ordered chain of strategies.
//!
//! Each strategy either delivers and reports how, or fails with a reason. The
//! chain stops at the first success; failures are collected so the closer can
//! be told what did not work.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::Document;
use crate::errors::TicketError;
use crate::platform::{OutgoingMessage, TicketPlatform};

/// Where a transcript should end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    /// Ticket owner, the preferred recipient.
    pub owner_id: String,
    /// Ticket channel, still alive during delivery.
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryMethod {
    DirectMessage,
    ChannelLink(String),
    ChannelAttachment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub strategy: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered {
        method: DeliveryMethod,
        failures: Vec<DeliveryFailure>,
    },
    Exhausted {
        failures: Vec<DeliveryFailure>,
    },
}

impl DeliveryOutcome {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    #[must_use]
    pub fn method(&self) -> Option<&DeliveryMethod> {
        match self {
            DeliveryOutcome::Delivered { method, .. } => Some(method),
            DeliveryOutcome::Exhausted { .. } => None,
        }
    }

    #[must_use]
    pub fn failures(&self) -> &[DeliveryFailure] {
        match self {
            DeliveryOutcome::Delivered { failures, .. } | DeliveryOutcome::Exhausted { failures } => {
                failures
            }
        }
    }

    /// True when the owner could not be reached privately.
    #[must_use]
    pub fn direct_message_failed(&self) -> bool {
        self.failures()
            .iter()
            .any(|f| f.strategy == DirectMessage::NAME)
    }
}

#[async_trait]
pub trait DeliveryStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(
        &self,
        platform: &dyn TicketPlatform,
        document: &Document,
        target: &DeliveryTarget,
    ) -> Result<DeliveryMethod, TicketError>;
}

/// Somewhere a document can be stored behind a retrievable URL.
#[async_trait]
pub trait LinkHost: Send + Sync {
    /// Store the document and return its public URL.
    async fn publish(&self, document: &Document) -> Result<String, TicketError>;

    /// Drop documents past their retention window. Returns how many were removed.
    async fn purge_expired(&self) -> usize;
}

/// DM the owner with the transcript attached.
#[derive(Debug, Default)]
pub struct DirectMessage;

impl DirectMessage {
    pub const NAME: &'static str = "direct_message";
}

#[async_trait]
impl DeliveryStrategy for DirectMessage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn deliver(
        &self,
        platform: &dyn TicketPlatform,
        document: &Document,
        target: &DeliveryTarget,
    ) -> Result<DeliveryMethod, TicketError> {
        let message = OutgoingMessage::text(format!(
            "📄 Here is the transcript of your ticket **#{}**.",
            document.channel_name
        ))
        .with_file(document.attachment());
        platform.send_direct(&target.owner_id, message).await?;
        Ok(DeliveryMethod::DirectMessage)
    }
}

/// Publish to a link host and post the URL in the ticket channel.
pub struct ChannelLink {
    host: Arc<dyn LinkHost>,
}

impl ChannelLink {
    pub const NAME: &'static str = "channel_link";

    #[must_use]
    pub fn new(host: Arc<dyn LinkHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl DeliveryStrategy for ChannelLink {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn deliver(
        &self,
        platform: &dyn TicketPlatform,
        document: &Document,
        target: &DeliveryTarget,
    ) -> Result<DeliveryMethod, TicketError> {
        let url = self.host.publish(document).await?;
        platform
            .send_message(
                &target.channel_id,
                OutgoingMessage::text(format!(
                    "📄 <@{}> your transcript is available here for a limited time:\n{url}",
                    target.owner_id
                )),
            )
            .await?;
        Ok(DeliveryMethod::ChannelLink(url))
    }
}

/// Post the raw document into the ticket channel.
#[derive(Debug, Default)]
pub struct ChannelAttachment;

impl ChannelAttachment {
    pub const NAME: &'static str = "channel_attachment";
}

#[async_trait]
impl DeliveryStrategy for ChannelAttachment {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn deliver(
        &self,
        platform: &dyn TicketPlatform,
        document: &Document,
        target: &DeliveryTarget,
    ) -> Result<DeliveryMethod, TicketError> {
        platform
            .send_message(
                &target.channel_id,
                OutgoingMessage::text(format!(
                    "📄 <@{}> I couldn't DM you, so here is the transcript:",
                    target.owner_id
                ))
                .with_file(document.attachment()),
            )
            .await?;
        Ok(DeliveryMethod::ChannelAttachment)
    }
}

/// Strategies tried in order until one succeeds.
pub struct DeliveryChain {
    strategies: Vec<Box<dyn DeliveryStrategy>>,
}

impl DeliveryChain {
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn DeliveryStrategy>>) -> Self {
        Self { strategies }
    }

    /// DM first, then a hosted link when a host is configured, then the raw file.
    #[must_use]
    pub fn standard(link_host: Option<Arc<dyn LinkHost>>) -> Self {
        let mut strategies: Vec<Box<dyn DeliveryStrategy>> = vec![Box::new(DirectMessage)];
        if let Some(host) = link_host {
            strategies.push(Box::new(ChannelLink::new(host)));
        }
        strategies.push(Box::new(ChannelAttachment));
        Self::new(strategies)
    }

    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn deliver(
        &self,
        platform: &dyn TicketPlatform,
        document: &Document,
        target: &DeliveryTarget,
    ) -> DeliveryOutcome {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            match strategy.deliver(platform, document, target).await {
                Ok(method) => {
                    info!(
                        strategy = strategy.name(),
                        channel_id = %target.channel_id,
                        "Transcript delivered"
                    );
                    return DeliveryOutcome::Delivered { method, failures };
                }
                Err(e) => {
                    warn!(
                        strategy = strategy.name(),
                        channel_id = %target.channel_id,
                        "Transcript delivery failed, trying next strategy: {}",
                        e
                    );
                    failures.push(DeliveryFailure {
                        strategy: strategy.name(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        error!(
            channel_id = %target.channel_id,
            attempts = failures.len(),
            "All transcript delivery strategies failed"
        );
        DeliveryOutcome::Exhausted { failures }
    }
}

impl Default for DeliveryChain {
    fn default() -> Self {
        Self::standard(None)
    }
}
