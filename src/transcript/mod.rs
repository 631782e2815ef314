//! Transcript pipeline: capture channel history, render it, deliver it.

pub mod capture;
pub mod deliver;
pub mod github;
pub mod render;
#[cfg(feature = "discord")]
pub mod server;
pub mod store;

use chrono::{DateTime, Utc};

use crate::platform::{AttachmentRef, Embed, FileAttachment};

pub use capture::capture;
pub use deliver::{
    ChannelAttachment, ChannelLink, DeliveryChain, DeliveryFailure, DeliveryMethod,
    DeliveryOutcome, DeliveryStrategy, DeliveryTarget, DirectMessage, LinkHost,
};
pub use render::render;
pub use store::TranscriptStore;

/// Who and where, shown at the top of the rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptHeader {
    pub guild_name: String,
    pub channel_name: String,
    pub owner: String,
    pub closer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptMessage {
    pub id: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    /// Content with mentions already resolved.
    pub text: String,
    pub attachments: Vec<AttachmentRef>,
    /// First embed of the message only.
    pub embed: Option<Embed>,
}

/// Ordered history of a ticket, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub header: TranscriptHeader,
    pub closed_at: DateTime<Utc>,
    pub messages: Vec<TranscriptMessage>,
}

/// A rendered transcript ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub filename: String,
    pub channel_name: String,
    pub html: String,
}

impl Document {
    #[must_use]
    pub fn attachment(&self) -> FileAttachment {
        FileAttachment {
            filename: self.filename.clone(),
            data: self.html.as_bytes().to_vec(),
        }
    }
}
