//! The ticket desk: lifecycle operations plus the event dispatcher that turns
//! every inbound event into exactly one reply.

pub mod lifecycle;
pub mod replies;

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::core::config::DeskSettings;
use crate::core::models::{EventKind, InboundEvent, Reply};
use crate::errors::TicketError;
use crate::guard::ConcurrencyGuard;
use crate::platform::TicketPlatform;
use crate::transcript::{DeliveryChain, LinkHost};

pub use lifecycle::{CloseReport, OpenedTicket};

pub struct TicketDesk {
    platform: Arc<dyn TicketPlatform>,
    guard: ConcurrencyGuard,
    settings: DeskSettings,
    delivery: DeliveryChain,
}

impl TicketDesk {
    #[must_use]
    pub fn new(platform: Arc<dyn TicketPlatform>, settings: DeskSettings) -> Self {
        Self {
            platform,
            guard: ConcurrencyGuard::new(),
            settings,
            delivery: DeliveryChain::default(),
        }
    }

    /// Insert a hosted-link step between the DM and the raw attachment.
    #[must_use]
    pub fn with_link_host(mut self, host: Arc<dyn LinkHost>) -> Self {
        self.delivery = DeliveryChain::standard(Some(host));
        self
    }

    #[must_use]
    pub fn platform(&self) -> &Arc<dyn TicketPlatform> {
        &self.platform
    }

    #[must_use]
    pub fn guard(&self) -> &ConcurrencyGuard {
        &self.guard
    }

    #[must_use]
    pub fn settings(&self) -> &DeskSettings {
        &self.settings
    }

    /// Route one inbound event and produce the acknowledgment for its sender.
    ///
    /// Never fails: rejections and errors become reply text. A second delivery
    /// of an event id still being handled is answered without side effects.
    #[tracing::instrument(level = "info", skip(self, event), fields(event_id = %event.id, kind = event.kind.name(), user_id = %event.actor.id))]
    pub async fn handle(&self, event: InboundEvent) -> Reply {
        let Some(_event_lease) = self.guard.lock_event(&event.id) else {
            info!("Duplicate delivery of in-flight event ignored");
            return Reply::ephemeral(replies::DUPLICATE_EVENT);
        };

        let InboundEvent {
            guild_id,
            actor,
            kind,
            ..
        } = event;

        let result = match kind {
            EventKind::PanelSetup {
                channel_id,
                request,
            } => self
                .setup_panel(&channel_id, &actor, request)
                .await
                .map(|panel| Reply::ephemeral(replies::panel_ack(panel.created))),
            EventKind::OpenTicket { panel_footer } => self
                .open_ticket(&guild_id, &actor, panel_footer.as_deref())
                .await
                .map(|opened| Reply::ephemeral(replies::ticket_opened(&opened.channel_id))),
            EventKind::ClaimTicket { channel_id } => self
                .claim_ticket(&channel_id, &actor)
                .await
                .map(|_| Reply::ephemeral(replies::claimed_ack())),
            EventKind::AddMember {
                channel_id,
                target_user_id,
            } => self
                .add_member(&channel_id, &actor, &target_user_id)
                .await
                .map(|()| Reply::ephemeral(replies::member_added_ack(&target_user_id))),
            EventKind::CloseTicket { channel_id } => self
                .close_ticket(&guild_id, &channel_id, &actor)
                .await
                .map(|report| Reply::ephemeral(replies::close_ack(&report.outcome))),
        };

        result.unwrap_or_else(|e| Self::failure_reply(&e))
    }

    fn failure_reply(e: &TicketError) -> Reply {
        if e.is_rejection() {
            warn!("Request rejected: {}", e);
        } else {
            error!("Request failed: {}", e);
        }
        Reply::ephemeral(e.user_message())
    }
}
