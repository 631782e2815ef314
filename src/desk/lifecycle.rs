//! Open, claim, add-member, close, and panel setup.
//!
//! Ticket state always comes from a fresh read of the channel topic, never
//! from a cache, so tickets edited or deleted out of band are seen as they
//! are now.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{TicketDesk, replies};
use crate::codec::{
    TicketMeta, TicketState, decode_panel, decode_ticket, encode_ticket, is_panel, is_ticket,
    ticket_owner,
};
use crate::core::models::PanelRequest;
use crate::errors::TicketError;
use crate::panel::{self, PanelConfig, PanelMessage};
use crate::platform::{
    Actor, Button, ButtonStyle, ChannelInfo, Embed, NewChannel, OutgoingMessage, OverwriteTarget,
    Permission, PermissionOverwrite, TicketPlatform,
};
use crate::transcript::{self, DeliveryOutcome, DeliveryTarget, TranscriptHeader};

const MEMBER_PERMISSIONS: &[Permission] = &[
    Permission::ViewChannel,
    Permission::SendMessages,
    Permission::ReadMessageHistory,
    Permission::AttachFiles,
];

const BOT_PERMISSIONS: &[Permission] = &[
    Permission::ViewChannel,
    Permission::SendMessages,
    Permission::ReadMessageHistory,
    Permission::AttachFiles,
    Permission::EmbedLinks,
    Permission::ManageChannels,
    Permission::ManageMessages,
    Permission::ManageRoles,
];

/// Longest channel name the platform accepts, minus headroom.
const MAX_CHANNEL_NAME: usize = 90;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedTicket {
    pub channel_id: String,
    pub channel_name: String,
}

#[derive(Debug)]
pub struct CloseReport {
    pub outcome: DeliveryOutcome,
    /// Completes once the channel has been deleted (or deletion failed).
    pub deletion: JoinHandle<()>,
}

/// `ticket-<name>` lowercased with anything but ascii alphanumerics, `-` and
/// `_` collapsed to `-`.
#[must_use]
pub fn ticket_channel_name(user_name: &str, user_id: &str) -> String {
    let mut slug = String::new();
    for c in user_name.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '_' {
            c.to_ascii_lowercase()
        } else {
            '-'
        };
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }
    let slug = slug.trim_matches('-');
    let base = if slug.is_empty() { user_id } else { slug };
    let mut name = format!("ticket-{base}");
    name.truncate(MAX_CHANNEL_NAME);
    name
}

fn support_roles(channel: &ChannelInfo, default_role: Option<&str>) -> Vec<String> {
    let mut roles: Vec<String> = channel.granted_roles().map(str::to_string).collect();
    if let Some(role) = default_role
        && !roles.iter().any(|r| r == role)
    {
        roles.push(role.to_string());
    }
    roles
}

/// Manage-messages, a support role, or administrator.
fn can_claim(actor: &Actor, roles: &[String]) -> bool {
    actor.administrator
        || actor.manage_messages
        || actor.has_any_role(roles.iter().map(String::as_str))
}

/// The owner, a support role, or administrator.
fn can_manage(actor: &Actor, owner_id: &str, roles: &[String]) -> bool {
    actor.id == owner_id
        || actor.administrator
        || actor.has_any_role(roles.iter().map(String::as_str))
}

impl TicketDesk {
    fn default_role(&self) -> Option<&str> {
        self.settings.default_support_role_id.as_deref()
    }

    /// Read a channel and require that it hosts a ticket.
    async fn load_ticket(&self, channel_id: &str) -> Result<(ChannelInfo, TicketMeta, String), TicketError> {
        let channel = self.platform.get_channel(channel_id).await?;
        let topic = channel.topic.as_deref();
        if !is_ticket(topic) {
            return Err(TicketError::NotATicket);
        }
        let meta = topic.map(decode_ticket).unwrap_or_default();
        let owner_id = meta.owner_id.clone().unwrap_or_default();
        Ok((channel, meta, owner_id))
    }

    /// Current lifecycle state of a channel, `None` for non-tickets.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be read.
    pub async fn ticket_state(&self, channel_id: &str) -> Result<TicketState, TicketError> {
        if self.guard.is_closing(channel_id) {
            return Ok(TicketState::Closing);
        }
        let channel = self.platform.get_channel(channel_id).await?;
        let topic = channel.topic.as_deref();
        if !is_ticket(topic) {
            return Ok(TicketState::None);
        }
        Ok(topic.map(decode_ticket).unwrap_or_default().state())
    }

    /// # Errors
    ///
    /// `NotAPanel` if the clicked message does not carry a panel footer,
    /// `InProgress` while the same user's previous open is still running,
    /// `AlreadyOpen` if a channel already decodes to this user, or a platform
    /// error if enumeration or creation fails.
    #[tracing::instrument(level = "info", skip(self, user, panel_footer), fields(user_id = %user.id))]
    pub async fn open_ticket(
        &self,
        guild_id: &str,
        user: &Actor,
        panel_footer: Option<&str>,
    ) -> Result<OpenedTicket, TicketError> {
        let _user_lease = self
            .guard
            .lock_user(guild_id, &user.id)
            .ok_or(TicketError::InProgress)?;

        if panel_footer.is_some() && !is_panel(panel_footer) {
            return Err(TicketError::NotAPanel);
        }
        let panel = panel_footer.map(decode_panel).unwrap_or_default();
        let support_role = panel
            .support_role_id
            .or_else(|| self.settings.default_support_role_id.clone());
        let category = panel
            .category_id
            .or_else(|| self.settings.default_category_id.clone());

        let channels = self.platform.list_channels(guild_id).await?;
        if let Some(existing) = channels
            .iter()
            .find(|c| ticket_owner(c.topic.as_deref()).as_deref() == Some(user.id.as_str()))
        {
            info!(channel_id = %existing.id, "User already has an open ticket");
            return Err(TicketError::AlreadyOpen(existing.id.clone()));
        }

        let mut overwrites = vec![
            PermissionOverwrite::deny(OverwriteTarget::Everyone, &[Permission::ViewChannel]),
            PermissionOverwrite::allow(OverwriteTarget::Member(user.id.clone()), MEMBER_PERMISSIONS),
        ];
        if let Some(role) = &support_role {
            overwrites.push(PermissionOverwrite::allow(
                OverwriteTarget::Role(role.clone()),
                MEMBER_PERMISSIONS,
            ));
        }
        overwrites.push(PermissionOverwrite::allow(
            OverwriteTarget::Member(self.platform.bot_user_id().to_string()),
            BOT_PERMISSIONS,
        ));

        let channel = self
            .platform
            .create_channel(
                guild_id,
                NewChannel {
                    name: ticket_channel_name(&user.name, &user.id),
                    category_id: category,
                    topic: encode_ticket(&user.id, None),
                    overwrites,
                },
            )
            .await?;
        info!(channel_id = %channel.id, "Ticket channel created");

        let welcome = OutgoingMessage::text(replies::welcome_mentions(&user.id, support_role.as_deref()))
            .with_embed(Embed {
                title: Some("🎟️ Ticket opened".to_string()),
                description: Some(replies::welcome_description(&user.id, support_role.as_deref())),
                footer: None,
                color: Some(replies::TICKET_COLOR),
            })
            .with_buttons(vec![
                Button::new(replies::CLAIM_BUTTON, "Claim Ticket", ButtonStyle::Secondary),
                Button::new(replies::CLOSE_BUTTON, "Close Ticket", ButtonStyle::Danger),
            ]);

        if let Err(e) = self.platform.send_message(&channel.id, welcome).await {
            warn!(channel_id = %channel.id, "Welcome message failed, removing channel: {}", e);
            if let Err(cleanup) = self.platform.delete_channel(&channel.id).await {
                warn!(channel_id = %channel.id, "Failed to remove half-open ticket: {}", cleanup);
            }
            return Err(e);
        }

        Ok(OpenedTicket {
            channel_id: channel.id,
            channel_name: channel.name,
        })
    }

    /// Record `actor` as the claimant. Last writer wins.
    ///
    /// # Errors
    ///
    /// `NotATicket`, `Closing`, `MissingPermission`, or a platform error.
    #[tracing::instrument(level = "info", skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn claim_ticket(&self, channel_id: &str, actor: &Actor) -> Result<TicketMeta, TicketError> {
        let (channel, meta, owner_id) = self.load_ticket(channel_id).await?;
        if self.guard.is_closing(channel_id) {
            return Err(TicketError::Closing);
        }

        let roles = support_roles(&channel, self.default_role());
        if !can_claim(actor, &roles) {
            return Err(TicketError::MissingPermission("claim tickets".to_string()));
        }

        if let Some(previous) = meta.claimant_id.as_deref().filter(|p| *p != actor.id) {
            info!(previous, "Overwriting previous claimant");
        }

        let topic = encode_ticket(&owner_id, Some(actor.id.as_str()));
        self.platform.set_topic(channel_id, &topic).await?;

        if let Err(e) = self
            .platform
            .send_message(
                channel_id,
                OutgoingMessage::text(replies::claimed_notice(&owner_id, &actor.id)),
            )
            .await
        {
            warn!("Claim recorded but notification failed: {}", e);
        }

        Ok(TicketMeta {
            owner_id: Some(owner_id),
            claimant_id: Some(actor.id.clone()),
        })
    }

    /// Give `target_user_id` access to an open ticket.
    ///
    /// # Errors
    ///
    /// `NotATicket`, `Closing`, `MissingPermission`, or a platform error.
    #[tracing::instrument(level = "info", skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn add_member(
        &self,
        channel_id: &str,
        actor: &Actor,
        target_user_id: &str,
    ) -> Result<(), TicketError> {
        let (channel, _, owner_id) = self.load_ticket(channel_id).await?;
        if self.guard.is_closing(channel_id) {
            return Err(TicketError::Closing);
        }

        let roles = support_roles(&channel, self.default_role());
        if !can_manage(actor, &owner_id, &roles) {
            return Err(TicketError::MissingPermission(
                "add members to this ticket".to_string(),
            ));
        }

        self.platform
            .set_overwrite(
                channel_id,
                PermissionOverwrite::allow(
                    OverwriteTarget::Member(target_user_id.to_string()),
                    &[
                        Permission::ViewChannel,
                        Permission::SendMessages,
                        Permission::ReadMessageHistory,
                    ],
                ),
            )
            .await?;

        if let Err(e) = self
            .platform
            .send_message(
                channel_id,
                OutgoingMessage::text(replies::member_added_notice(target_user_id, &actor.id)),
            )
            .await
        {
            warn!("Member added but notification failed: {}", e);
        }
        Ok(())
    }

    /// Capture and deliver the transcript, then delete the channel after the
    /// grace delay.
    ///
    /// Nothing destructive happens before the transcript has been captured.
    /// Delivery failure does not stop the close; deletion failure is logged.
    ///
    /// # Errors
    ///
    /// `NotATicket`, `MissingPermission`, `InProgress` if a close of this
    /// channel is already running, or a platform error while capturing.
    #[tracing::instrument(level = "info", skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn close_ticket(
        &self,
        guild_id: &str,
        channel_id: &str,
        actor: &Actor,
    ) -> Result<CloseReport, TicketError> {
        let (channel, _, owner_id) = self.load_ticket(channel_id).await?;

        let roles = support_roles(&channel, self.default_role());
        if !can_manage(actor, &owner_id, &roles) {
            return Err(TicketError::MissingPermission("close this ticket".to_string()));
        }

        let closing_lease = self
            .guard
            .lock_channel(channel_id)
            .ok_or(TicketError::InProgress)?;

        let guild_name = match self.platform.guild_name(guild_id).await {
            Ok(name) => name,
            Err(e) => {
                warn!("Guild name lookup failed, using id: {}", e);
                guild_id.to_string()
            }
        };
        let owner_name = match self.platform.user_name(&owner_id).await {
            Ok(Some(name)) => name,
            Ok(None) => owner_id.clone(),
            Err(e) => {
                warn!("Owner name lookup failed, using id: {}", e);
                owner_id.clone()
            }
        };
        let closer = if actor.name.is_empty() {
            actor.id.clone()
        } else {
            actor.name.clone()
        };

        let captured = transcript::capture(
            self.platform.as_ref(),
            guild_id,
            channel_id,
            self.settings.transcript_max_messages,
            TranscriptHeader {
                guild_name,
                channel_name: channel.name.clone(),
                owner: owner_name,
                closer,
            },
            Utc::now(),
        )
        .await?;
        info!(messages = captured.messages.len(), "Transcript captured");

        let document = transcript::render(&captured, self.settings.timezone);
        let outcome = self
            .delivery
            .deliver(
                self.platform.as_ref(),
                &document,
                &DeliveryTarget {
                    owner_id,
                    channel_id: channel_id.to_string(),
                },
            )
            .await;

        if let Err(e) = self
            .platform
            .send_message(
                channel_id,
                OutgoingMessage::text(replies::closing_notice(
                    &actor.id,
                    self.settings.close_grace.as_secs(),
                )),
            )
            .await
        {
            warn!("Closing notice failed: {}", e);
        }

        let platform: Arc<dyn TicketPlatform> = Arc::clone(&self.platform);
        let grace = self.settings.close_grace;
        let channel_id = channel_id.to_string();
        let deletion = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            match platform.delete_channel(&channel_id).await {
                Ok(()) => info!(channel_id = %channel_id, "Ticket channel deleted"),
                Err(e) => warn!(channel_id = %channel_id, "Ticket channel deletion failed: {}", e),
            }
            drop(closing_lease);
        });

        Ok(CloseReport { outcome, deletion })
    }

    /// Post or refresh the ticket panel in `channel_id`.
    ///
    /// # Errors
    ///
    /// `MissingPermission` unless the actor is an administrator or can manage
    /// messages, or a platform error.
    #[tracing::instrument(level = "info", skip(self, actor, request), fields(actor_id = %actor.id))]
    pub async fn setup_panel(
        &self,
        channel_id: &str,
        actor: &Actor,
        request: PanelRequest,
    ) -> Result<PanelMessage, TicketError> {
        if !(actor.administrator || actor.manage_messages) {
            return Err(TicketError::MissingPermission(
                "set up ticket panels".to_string(),
            ));
        }

        let config = PanelConfig {
            support_role_id: request
                .support_role_id
                .or_else(|| self.settings.default_support_role_id.clone()),
            category_id: request
                .category_id
                .or_else(|| self.settings.default_category_id.clone()),
            title: request
                .title
                .unwrap_or_else(|| self.settings.panel_title.clone()),
            description: request
                .description
                .unwrap_or_else(|| self.settings.panel_description.clone()),
        };

        panel::find_or_create(
            self.platform.as_ref(),
            channel_id,
            &config,
            self.settings.panel_scan_limit,
        )
        .await
    }
}
