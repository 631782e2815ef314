//! Capability surface of the chat platform.
//!
//! The desk never talks to a platform SDK directly. Everything it needs
//! (channels, overwrites, messages, DMs, name lookups) goes through
//! [`TicketPlatform`], so lifecycle logic can be driven by the Discord
//! adapter in production and an in-memory fake in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::TicketError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewChannel,
    SendMessages,
    ReadMessageHistory,
    AttachFiles,
    EmbedLinks,
    ManageChannels,
    ManageMessages,
    ManageRoles,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OverwriteTarget {
    /// The guild's default role.
    Everyone,
    Role(String),
    Member(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionOverwrite {
    pub target: OverwriteTarget,
    pub allow: Vec<Permission>,
    pub deny: Vec<Permission>,
}

impl PermissionOverwrite {
    #[must_use]
    pub fn allow(target: OverwriteTarget, allow: &[Permission]) -> Self {
        Self {
            target,
            allow: allow.to_vec(),
            deny: Vec::new(),
        }
    }

    #[must_use]
    pub fn deny(target: OverwriteTarget, deny: &[Permission]) -> Self {
        Self {
            target,
            allow: Vec::new(),
            deny: deny.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    pub topic: Option<String>,
    pub overwrites: Vec<PermissionOverwrite>,
}

impl ChannelInfo {
    /// Roles explicitly allowed to view this channel.
    pub fn granted_roles(&self) -> impl Iterator<Item = &str> {
        self.overwrites.iter().filter_map(|o| match &o.target {
            OverwriteTarget::Role(id) if o.allow.contains(&Permission::ViewChannel) => {
                Some(id.as_str())
            }
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewChannel {
    pub name: String,
    pub category_id: Option<String>,
    pub topic: String,
    pub overwrites: Vec<PermissionOverwrite>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
}

impl Button {
    #[must_use]
    pub fn new(custom_id: &str, label: &str, style: ButtonStyle) -> Self {
        Self {
            custom_id: custom_id.to_string(),
            label: label.to_string(),
            style,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub footer: Option<String>,
    pub color: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub filename: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub content: Option<String>,
    pub embed: Option<Embed>,
    pub buttons: Vec<Button>,
    pub file: Option<FileAttachment>,
}

impl OutgoingMessage {
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_embed(mut self, embed: Embed) -> Self {
        self.embed = Some(embed);
        self
    }

    #[must_use]
    pub fn with_buttons(mut self, buttons: Vec<Button>) -> Self {
        self.buttons = buttons;
        self
    }

    #[must_use]
    pub fn with_file(mut self, file: FileAttachment) -> Self {
        self.file = Some(file);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub url: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    pub id: String,
    pub author: Option<Author>,
    pub created_at: DateTime<Utc>,
    pub content: String,
    pub attachments: Vec<AttachmentRef>,
    pub embeds: Vec<Embed>,
}

/// The member who triggered an event, with the privileges the platform
/// resolved for them at that moment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role_ids: Vec<String>,
    pub administrator: bool,
    pub manage_messages: bool,
}

impl Actor {
    #[must_use]
    pub fn has_any_role<'a>(&self, mut roles: impl Iterator<Item = &'a str>) -> bool {
        roles.any(|r| self.role_ids.iter().any(|own| own == r))
    }
}

/// Largest page a single history fetch may request.
pub const MAX_PAGE_SIZE: u8 = 100;

#[async_trait]
pub trait TicketPlatform: Send + Sync {
    /// User id of the bot account itself.
    fn bot_user_id(&self) -> &str;

    async fn guild_name(&self, guild_id: &str) -> Result<String, TicketError>;

    /// Fresh enumeration of every channel in the guild.
    async fn list_channels(&self, guild_id: &str) -> Result<Vec<ChannelInfo>, TicketError>;

    async fn get_channel(&self, channel_id: &str) -> Result<ChannelInfo, TicketError>;

    async fn create_channel(
        &self,
        guild_id: &str,
        channel: NewChannel,
    ) -> Result<ChannelInfo, TicketError>;

    async fn delete_channel(&self, channel_id: &str) -> Result<(), TicketError>;

    async fn set_topic(&self, channel_id: &str, topic: &str) -> Result<(), TicketError>;

    async fn set_overwrite(
        &self,
        channel_id: &str,
        overwrite: PermissionOverwrite,
    ) -> Result<(), TicketError>;

    /// Returns the id of the posted message.
    async fn send_message(
        &self,
        channel_id: &str,
        message: OutgoingMessage,
    ) -> Result<String, TicketError>;

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        message: OutgoingMessage,
    ) -> Result<(), TicketError>;

    /// One page of history strictly older than `before` (newest page when
    /// `None`). Order within the page is unspecified.
    async fn fetch_messages(
        &self,
        channel_id: &str,
        before: Option<&str>,
        limit: u8,
    ) -> Result<Vec<FetchedMessage>, TicketError>;

    async fn send_direct(&self, user_id: &str, message: OutgoingMessage)
    -> Result<(), TicketError>;

    async fn user_name(&self, user_id: &str) -> Result<Option<String>, TicketError>;

    async fn role_name(&self, guild_id: &str, role_id: &str)
    -> Result<Option<String>, TicketError>;

    async fn channel_name(&self, channel_id: &str) -> Result<Option<String>, TicketError>;
}
