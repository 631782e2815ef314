use thiserror::Error;

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("Channel is not a ticket")]
    NotATicket,

    #[error("Message is not a ticket panel")]
    NotAPanel,

    #[error("Missing permission: {0}")]
    MissingPermission(String),

    #[error("Operation already in progress")]
    InProgress,

    #[error("Ticket is being closed")]
    Closing,

    #[error("User already has an open ticket: {0}")]
    AlreadyOpen(String),

    #[error("Failed to access chat platform: {0}")]
    PlatformError(String),

    #[error("Failed to deliver transcript: {0}")]
    DeliveryError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("{0}")]
    GeneralError(String),
}

impl TicketError {
    /// Text shown to the user who triggered the failing operation.
    ///
    /// Validation errors are specific; platform and internal errors collapse
    /// into a generic failure so API details never leak into chat.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            TicketError::NotATicket => "❌ This channel is not a ticket.".to_string(),
            TicketError::NotAPanel => "❌ That message is not a ticket panel.".to_string(),
            TicketError::MissingPermission(action) => {
                format!("❌ You don't have permission to {action}.")
            }
            TicketError::InProgress => {
                "⏳ That request is already being processed, please wait.".to_string()
            }
            TicketError::Closing => "⏳ This ticket is already being closed.".to_string(),
            TicketError::AlreadyOpen(channel_id) => {
                format!("❌ You already have an open ticket: <#{channel_id}>")
            }
            TicketError::PlatformError(_)
            | TicketError::DeliveryError(_)
            | TicketError::ConfigError(_)
            | TicketError::GeneralError(_) => {
                "⚠️ Something went wrong, please try again later.".to_string()
            }
        }
    }

    /// Validation and duplicate rejections are expected outcomes, not faults.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TicketError::NotATicket
                | TicketError::NotAPanel
                | TicketError::MissingPermission(_)
                | TicketError::InProgress
                | TicketError::Closing
                | TicketError::AlreadyOpen(_)
        )
    }
}

impl From<reqwest::Error> for TicketError {
    fn from(error: reqwest::Error) -> Self {
        TicketError::DeliveryError(error.to_string())
    }
}

impl From<serde_json::Error> for TicketError {
    fn from(error: serde_json::Error) -> Self {
        TicketError::GeneralError(format!("JSON error: {error}"))
    }
}

impl From<anyhow::Error> for TicketError {
    fn from(error: anyhow::Error) -> Self {
        TicketError::PlatformError(error.to_string())
    }
}

#[cfg(feature = "discord")]
impl From<serenity::Error> for TicketError {
    fn from(error: serenity::Error) -> Self {
        TicketError::PlatformError(error.to_string())
    }
}
