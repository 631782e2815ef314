//! [`TicketPlatform`] over the Discord REST API.
//!
//! Read-only calls are retried with exponential backoff. Writes are not, so a
//! timeout after a successful create never produces a second channel.

use std::num::NonZeroU64;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::builder::{
    CreateActionRow, CreateAttachment, CreateButton, CreateChannel, CreateEmbed,
    CreateEmbedFooter, CreateMessage, EditChannel, EditMessage, GetMessages,
};
use serenity::http::{Http, HttpError};
use serenity::model::application::ButtonStyle as DiscordButtonStyle;
use serenity::model::channel::{
    ChannelType, GuildChannel, Message, PermissionOverwrite as DiscordOverwrite,
    PermissionOverwriteType,
};
use serenity::model::id::{ChannelId, GuildId, MessageId, RoleId, UserId};
use serenity::model::permissions::Permissions;
use tokio_retry::strategy::jitter;
use tokio_retry::{Retry, strategy::ExponentialBackoff};

use crate::errors::TicketError;
use crate::platform::{
    AttachmentRef, Author, ButtonStyle, ChannelInfo, Embed, FetchedMessage, NewChannel,
    OutgoingMessage, OverwriteTarget, Permission, PermissionOverwrite, TicketPlatform,
};

const ALL_PERMISSIONS: [Permission; 8] = [
    Permission::ViewChannel,
    Permission::SendMessages,
    Permission::ReadMessageHistory,
    Permission::AttachFiles,
    Permission::EmbedLinks,
    Permission::ManageChannels,
    Permission::ManageMessages,
    Permission::ManageRoles,
];

fn snowflake(raw: &str) -> Result<NonZeroU64, TicketError> {
    raw.trim()
        .parse::<NonZeroU64>()
        .map_err(|_| TicketError::PlatformError(format!("invalid Discord id: {raw:?}")))
}

fn is_not_found(error: &serenity::Error) -> bool {
    matches!(
        error,
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response))
            if response.status_code.as_u16() == 404
    )
}

fn permission_bits(permission: Permission) -> Permissions {
    match permission {
        Permission::ViewChannel => Permissions::VIEW_CHANNEL,
        Permission::SendMessages => Permissions::SEND_MESSAGES,
        Permission::ReadMessageHistory => Permissions::READ_MESSAGE_HISTORY,
        Permission::AttachFiles => Permissions::ATTACH_FILES,
        Permission::EmbedLinks => Permissions::EMBED_LINKS,
        Permission::ManageChannels => Permissions::MANAGE_CHANNELS,
        Permission::ManageMessages => Permissions::MANAGE_MESSAGES,
        Permission::ManageRoles => Permissions::MANAGE_ROLES,
    }
}

fn to_bits(permissions: &[Permission]) -> Permissions {
    permissions
        .iter()
        .fold(Permissions::empty(), |acc, p| acc | permission_bits(*p))
}

fn from_bits(bits: Permissions) -> Vec<Permission> {
    ALL_PERMISSIONS
        .into_iter()
        .filter(|p| bits.contains(permission_bits(*p)))
        .collect()
}

/// The guild's `@everyone` role shares the guild's id.
fn to_discord_overwrite(
    guild_id: GuildId,
    overwrite: &PermissionOverwrite,
) -> Result<DiscordOverwrite, TicketError> {
    let kind = match &overwrite.target {
        OverwriteTarget::Everyone => PermissionOverwriteType::Role(RoleId::new(guild_id.get())),
        OverwriteTarget::Role(id) => PermissionOverwriteType::Role(RoleId::from(snowflake(id)?)),
        OverwriteTarget::Member(id) => {
            PermissionOverwriteType::Member(UserId::from(snowflake(id)?))
        }
    };
    Ok(DiscordOverwrite {
        allow: to_bits(&overwrite.allow),
        deny: to_bits(&overwrite.deny),
        kind,
    })
}

fn from_discord_overwrite(guild_id: GuildId, overwrite: &DiscordOverwrite) -> Option<PermissionOverwrite> {
    let target = match overwrite.kind {
        PermissionOverwriteType::Role(role) if role.get() == guild_id.get() => OverwriteTarget::Everyone,
        PermissionOverwriteType::Role(role) => OverwriteTarget::Role(role.to_string()),
        PermissionOverwriteType::Member(user) => OverwriteTarget::Member(user.to_string()),
        _ => return None,
    };
    Some(PermissionOverwrite {
        target,
        allow: from_bits(overwrite.allow),
        deny: from_bits(overwrite.deny),
    })
}

fn channel_info(channel: &GuildChannel) -> ChannelInfo {
    ChannelInfo {
        id: channel.id.to_string(),
        name: channel.name.clone(),
        topic: channel.topic.clone(),
        overwrites: channel
            .permission_overwrites
            .iter()
            .filter_map(|o| from_discord_overwrite(channel.guild_id, o))
            .collect(),
    }
}

fn create_embed(embed: &Embed) -> CreateEmbed {
    let mut builder = CreateEmbed::new();
    if let Some(title) = &embed.title {
        builder = builder.title(title);
    }
    if let Some(description) = &embed.description {
        builder = builder.description(description);
    }
    if let Some(footer) = &embed.footer {
        builder = builder.footer(CreateEmbedFooter::new(footer));
    }
    if let Some(color) = embed.color {
        builder = builder.colour(color);
    }
    builder
}

fn action_rows(message: &OutgoingMessage) -> Vec<CreateActionRow> {
    if message.buttons.is_empty() {
        return Vec::new();
    }
    let buttons = message
        .buttons
        .iter()
        .map(|b| {
            let style = match b.style {
                ButtonStyle::Primary => DiscordButtonStyle::Primary,
                ButtonStyle::Secondary => DiscordButtonStyle::Secondary,
                ButtonStyle::Success => DiscordButtonStyle::Success,
                ButtonStyle::Danger => DiscordButtonStyle::Danger,
            };
            CreateButton::new(b.custom_id.clone())
                .label(b.label.clone())
                .style(style)
        })
        .collect();
    vec![CreateActionRow::Buttons(buttons)]
}

fn create_message(message: OutgoingMessage) -> CreateMessage {
    let mut builder = CreateMessage::new().components(action_rows(&message));
    if let Some(content) = message.content {
        builder = builder.content(content);
    }
    if let Some(embed) = &message.embed {
        builder = builder.embed(create_embed(embed));
    }
    if let Some(file) = message.file {
        builder = builder.add_file(CreateAttachment::bytes(file.data, file.filename));
    }
    builder
}

fn edit_message(message: OutgoingMessage) -> EditMessage {
    let mut builder = EditMessage::new().components(action_rows(&message));
    if let Some(content) = message.content {
        builder = builder.content(content);
    }
    if let Some(embed) = &message.embed {
        builder = builder.embed(create_embed(embed));
    }
    builder
}

fn fetched_message(message: &Message) -> FetchedMessage {
    let timestamp = message.timestamp;
    let created_at = DateTime::parse_from_rfc3339(&timestamp.to_string())
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| DateTime::from_timestamp(timestamp.unix_timestamp(), 0))
        .unwrap_or_default();

    FetchedMessage {
        id: message.id.to_string(),
        author: Some(Author {
            id: message.author.id.to_string(),
            name: message
                .author
                .global_name
                .clone()
                .unwrap_or_else(|| message.author.name.clone()),
        }),
        created_at,
        content: message.content.clone(),
        attachments: message
            .attachments
            .iter()
            .map(|a| AttachmentRef {
                url: a.url.clone(),
                filename: a.filename.clone(),
            })
            .collect(),
        embeds: message
            .embeds
            .iter()
            .map(|e| Embed {
                title: e.title.clone(),
                description: e.description.clone(),
                footer: e.footer.as_ref().map(|f| f.text.clone()),
                color: e.colour.map(|c| c.0),
            })
            .collect(),
    }
}

pub struct DiscordPlatform {
    http: Arc<Http>,
    bot_user_id: String,
}

impl DiscordPlatform {
    #[must_use]
    pub fn new(http: Arc<Http>, bot_user_id: UserId) -> Self {
        Self {
            http,
            bot_user_id: bot_user_id.to_string(),
        }
    }

    /// Resolve the bot account behind `http` and wrap it.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is rejected.
    pub async fn connect(http: Arc<Http>) -> Result<Self, TicketError> {
        let me = http.get_current_user().await?;
        Ok(Self::new(http, me.id))
    }

    fn http(&self) -> &Http {
        &self.http
    }

    async fn with_retry<F, Fut, T>(&self, operation: F) -> Result<T, TicketError>
    where
        F: FnMut() -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, TicketError>> + Send,
        T: Send,
    {
        let strategy = ExponentialBackoff::from_millis(100).map(jitter).take(3);

        Retry::spawn(strategy, operation).await
    }

    async fn guild_channel(&self, channel_id: ChannelId) -> Result<GuildChannel, TicketError> {
        self.with_retry(|| async {
            channel_id
                .to_channel(self.http())
                .await?
                .guild()
                .ok_or_else(|| TicketError::PlatformError(format!("{channel_id} is not a guild channel")))
        })
        .await
    }
}

#[async_trait]
impl TicketPlatform for DiscordPlatform {
    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    async fn guild_name(&self, guild_id: &str) -> Result<String, TicketError> {
        let guild_id = GuildId::from(snowflake(guild_id)?);
        self.with_retry(|| async { Ok(guild_id.to_partial_guild(self.http()).await?.name) })
            .await
    }

    async fn list_channels(&self, guild_id: &str) -> Result<Vec<ChannelInfo>, TicketError> {
        let guild_id = GuildId::from(snowflake(guild_id)?);
        let channels = self
            .with_retry(|| async { Ok(guild_id.channels(self.http()).await?) })
            .await?;
        Ok(channels.values().map(channel_info).collect())
    }

    async fn get_channel(&self, channel_id: &str) -> Result<ChannelInfo, TicketError> {
        let channel = self
            .guild_channel(ChannelId::from(snowflake(channel_id)?))
            .await?;
        Ok(channel_info(&channel))
    }

    async fn create_channel(
        &self,
        guild_id: &str,
        channel: NewChannel,
    ) -> Result<ChannelInfo, TicketError> {
        let guild_id = GuildId::from(snowflake(guild_id)?);
        let overwrites = channel
            .overwrites
            .iter()
            .map(|o| to_discord_overwrite(guild_id, o))
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = CreateChannel::new(channel.name)
            .kind(ChannelType::Text)
            .topic(channel.topic)
            .permissions(overwrites);
        if let Some(category) = &channel.category_id {
            builder = builder.category(ChannelId::from(snowflake(category)?));
        }

        let created = guild_id.create_channel(self.http(), builder).await?;
        Ok(channel_info(&created))
    }

    async fn delete_channel(&self, channel_id: &str) -> Result<(), TicketError> {
        ChannelId::from(snowflake(channel_id)?)
            .delete(self.http())
            .await?;
        Ok(())
    }

    async fn set_topic(&self, channel_id: &str, topic: &str) -> Result<(), TicketError> {
        ChannelId::from(snowflake(channel_id)?)
            .edit(self.http(), EditChannel::new().topic(topic))
            .await?;
        Ok(())
    }

    async fn set_overwrite(
        &self,
        channel_id: &str,
        overwrite: PermissionOverwrite,
    ) -> Result<(), TicketError> {
        let channel_id = ChannelId::from(snowflake(channel_id)?);
        let guild_id = self.guild_channel(channel_id).await?.guild_id;
        channel_id
            .create_permission(self.http(), to_discord_overwrite(guild_id, &overwrite)?)
            .await?;
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: &str,
        message: OutgoingMessage,
    ) -> Result<String, TicketError> {
        let sent = ChannelId::from(snowflake(channel_id)?)
            .send_message(self.http(), create_message(message))
            .await?;
        Ok(sent.id.to_string())
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        message: OutgoingMessage,
    ) -> Result<(), TicketError> {
        ChannelId::from(snowflake(channel_id)?)
            .edit_message(
                self.http(),
                MessageId::from(snowflake(message_id)?),
                edit_message(message),
            )
            .await?;
        Ok(())
    }

    async fn fetch_messages(
        &self,
        channel_id: &str,
        before: Option<&str>,
        limit: u8,
    ) -> Result<Vec<FetchedMessage>, TicketError> {
        let channel_id = ChannelId::from(snowflake(channel_id)?);
        let mut query = GetMessages::new().limit(limit.clamp(1, crate::platform::MAX_PAGE_SIZE));
        if let Some(before) = before {
            query = query.before(MessageId::from(snowflake(before)?));
        }

        let messages = self
            .with_retry(|| async { Ok(channel_id.messages(self.http(), query.clone()).await?) })
            .await?;
        Ok(messages.iter().map(fetched_message).collect())
    }

    async fn send_direct(&self, user_id: &str, message: OutgoingMessage) -> Result<(), TicketError> {
        UserId::from(snowflake(user_id)?)
            .direct_message(self.http(), create_message(message))
            .await?;
        Ok(())
    }

    async fn user_name(&self, user_id: &str) -> Result<Option<String>, TicketError> {
        let user_id = UserId::from(snowflake(user_id)?);
        self.with_retry(|| async {
            match user_id.to_user(self.http()).await {
                Ok(user) => Ok(Some(user.global_name.unwrap_or(user.name))),
                Err(e) if is_not_found(&e) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn role_name(&self, guild_id: &str, role_id: &str) -> Result<Option<String>, TicketError> {
        let guild_id = GuildId::from(snowflake(guild_id)?);
        let role_id = RoleId::from(snowflake(role_id)?);
        let roles = self
            .with_retry(|| async { Ok(guild_id.roles(self.http()).await?) })
            .await?;
        Ok(roles.get(&role_id).map(|r| r.name.clone()))
    }

    async fn channel_name(&self, channel_id: &str) -> Result<Option<String>, TicketError> {
        let channel_id = ChannelId::from(snowflake(channel_id)?);
        self.with_retry(|| async {
            match channel_id.to_channel(self.http()).await {
                Ok(channel) => Ok(channel.guild().map(|c| c.name)),
                Err(e) if is_not_found(&e) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }
}
