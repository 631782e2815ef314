use crate::platform::Actor;

/// One button click or command delivered by the platform.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Platform id of the interaction, used for duplicate suppression.
    pub id: String,
    pub guild_id: String,
    pub actor: Actor,
    pub kind: EventKind,
}

#[derive(Debug, Clone)]
pub enum EventKind {
    PanelSetup {
        channel_id: String,
        request: PanelRequest,
    },
    OpenTicket {
        /// Footer of the panel whose button was clicked.
        panel_footer: Option<String>,
    },
    ClaimTicket {
        channel_id: String,
    },
    AddMember {
        channel_id: String,
        target_user_id: String,
    },
    CloseTicket {
        channel_id: String,
    },
}

impl EventKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::PanelSetup { .. } => "panel_setup",
            EventKind::OpenTicket { .. } => "open_ticket",
            EventKind::ClaimTicket { .. } => "claim_ticket",
            EventKind::AddMember { .. } => "add_member",
            EventKind::CloseTicket { .. } => "close_ticket",
        }
    }
}

/// Optional overrides for `/panel`; unset fields fall back to desk defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelRequest {
    pub support_role_id: Option<String>,
    pub category_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Acknowledgment sent back to the user who triggered an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    pub ephemeral: bool,
}

impl Reply {
    #[must_use]
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}
