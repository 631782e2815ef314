//! Ticket panels: the message carrying the "open ticket" button.
//!
//! The panel's embed footer holds its encoded configuration. Setup looks for
//! a recent bot message with an identical footer and edits it instead of
//! posting a second panel.

use tracing::info;

use crate::codec::encode_panel;
use crate::errors::TicketError;
use crate::platform::{Button, ButtonStyle, Embed, OutgoingMessage, TicketPlatform};

pub const OPEN_TICKET_BUTTON: &str = "open_ticket";
pub const PANEL_COLOR: u32 = 0x0080_00ff;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelConfig {
    pub support_role_id: Option<String>,
    pub category_id: Option<String>,
    pub title: String,
    pub description: String,
}

impl PanelConfig {
    /// Comparable key stored in the panel footer.
    #[must_use]
    pub fn footer(&self) -> String {
        encode_panel(self.support_role_id.as_deref(), self.category_id.as_deref())
    }

    #[must_use]
    pub fn message(&self) -> OutgoingMessage {
        OutgoingMessage::default()
            .with_embed(Embed {
                title: Some(self.title.clone()),
                description: Some(self.description.clone()),
                footer: Some(self.footer()),
                color: Some(PANEL_COLOR),
            })
            .with_buttons(vec![Button::new(
                OPEN_TICKET_BUTTON,
                "🎫 Open Ticket",
                ButtonStyle::Primary,
            )])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelMessage {
    pub channel_id: String,
    pub message_id: String,
    /// `false` when an existing panel was updated in place.
    pub created: bool,
}

/// Find the panel for `config` among the last `scan_limit` messages of
/// `channel_id` and update it, or post a new one.
///
/// # Errors
///
/// Returns an error if the history fetch, edit, or post fails.
#[tracing::instrument(level = "info", skip(platform, config))]
pub async fn find_or_create(
    platform: &dyn TicketPlatform,
    channel_id: &str,
    config: &PanelConfig,
    scan_limit: u8,
) -> Result<PanelMessage, TicketError> {
    let footer = config.footer();
    let bot_id = platform.bot_user_id();

    let recent = platform.fetch_messages(channel_id, None, scan_limit).await?;
    let existing = recent
        .iter()
        .filter(|m| m.author.as_ref().is_some_and(|a| a.id == bot_id))
        .filter(|m| {
            m.embeds
                .first()
                .and_then(|e| e.footer.as_deref())
                .is_some_and(|f| f == footer)
        })
        .max_by_key(|m| m.created_at);

    if let Some(existing) = existing {
        platform
            .edit_message(channel_id, &existing.id, config.message())
            .await?;
        info!(channel_id, message_id = %existing.id, "Updated existing ticket panel");
        return Ok(PanelMessage {
            channel_id: channel_id.to_string(),
            message_id: existing.id.clone(),
            created: false,
        });
    }

    let message_id = platform.send_message(channel_id, config.message()).await?;
    info!(channel_id, message_id = %message_id, "Posted new ticket panel");
    Ok(PanelMessage {
        channel_id: channel_id.to_string(),
        message_id,
        created: true,
    })
}
