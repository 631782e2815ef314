#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use ticketdesk::errors::TicketError;
use ticketdesk::platform::{
    Actor, Author, ChannelInfo, Embed, FetchedMessage, NewChannel, OutgoingMessage,
    PermissionOverwrite, TicketPlatform,
};

pub const GUILD: &str = "900";
pub const BOT: &str = "1";

#[derive(Default)]
struct State {
    channels: BTreeMap<String, ChannelInfo>,
    history: HashMap<String, Vec<FetchedMessage>>,
    sent: Vec<(String, OutgoingMessage)>,
    edits: Vec<(String, String, OutgoingMessage)>,
    dms: Vec<(String, OutgoingMessage)>,
    deleted: Vec<String>,
    users: HashMap<String, String>,
    roles: HashMap<String, String>,
    fetch_calls: usize,
    create_calls: usize,
    failing_channels: HashSet<String>,
}

/// In-memory guild that records every call the desk makes.
pub struct FakePlatform {
    state: Mutex<State>,
    next_id: AtomicU64,
    pub dm_disabled: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_fetch: AtomicBool,
    pub fail_welcome: AtomicBool,
    pub reverse_pages: AtomicBool,
    list_delay: Mutex<Duration>,
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn member(id: &str, name: &str) -> Actor {
    Actor {
        id: id.to_string(),
        name: name.to_string(),
        ..Actor::default()
    }
}

pub fn staff(id: &str, name: &str, role: &str) -> Actor {
    Actor {
        role_ids: vec![role.to_string()],
        ..member(id, name)
    }
}

pub fn admin(id: &str, name: &str) -> Actor {
    Actor {
        administrator: true,
        ..member(id, name)
    }
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_id: AtomicU64::new(1000),
            dm_disabled: AtomicBool::new(false),
            fail_create: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
            fail_welcome: AtomicBool::new(false),
            reverse_pages: AtomicBool::new(false),
            list_delay: Mutex::new(Duration::ZERO),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn set(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }

    pub fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = delay;
    }

    pub fn add_user(&self, id: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(id.to_string(), name.to_string());
    }

    pub fn add_role(&self, id: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .roles
            .insert(id.to_string(), name.to_string());
    }

    pub fn add_channel(&self, id: &str, name: &str, topic: Option<&str>) {
        self.state.lock().unwrap().channels.insert(
            id.to_string(),
            ChannelInfo {
                id: id.to_string(),
                name: name.to_string(),
                topic: topic.map(str::to_string),
                overwrites: Vec::new(),
            },
        );
    }

    pub fn fail_sends_to(&self, channel_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_channels
            .insert(channel_id.to_string());
    }

    /// Append a message to a channel's history; ids and timestamps increase.
    pub fn post(&self, channel_id: &str, author: Option<(&str, &str)>, content: &str) -> String {
        self.post_with_embed(channel_id, author, content, None)
    }

    pub fn post_with_embed(
        &self,
        channel_id: &str,
        author: Option<(&str, &str)>,
        content: &str,
        embed: Option<Embed>,
    ) -> String {
        let n = self.next_id();
        let message = FetchedMessage {
            id: n.to_string(),
            author: author.map(|(id, name)| Author {
                id: id.to_string(),
                name: name.to_string(),
            }),
            created_at: epoch() + chrono::Duration::seconds(i64::try_from(n).unwrap()),
            content: content.to_string(),
            attachments: Vec::new(),
            embeds: embed.into_iter().collect(),
        };
        self.state
            .lock()
            .unwrap()
            .history
            .entry(channel_id.to_string())
            .or_default()
            .push(message);
        n.to_string()
    }

    pub fn channel(&self, id: &str) -> Option<ChannelInfo> {
        self.state.lock().unwrap().channels.get(id).cloned()
    }

    pub fn channels(&self) -> Vec<ChannelInfo> {
        self.state.lock().unwrap().channels.values().cloned().collect()
    }

    pub fn sent(&self) -> Vec<(String, OutgoingMessage)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_to(&self, channel_id: &str) -> Vec<OutgoingMessage> {
        self.sent()
            .into_iter()
            .filter(|(c, _)| c == channel_id)
            .map(|(_, m)| m)
            .collect()
    }

    pub fn edits(&self) -> Vec<(String, String, OutgoingMessage)> {
        self.state.lock().unwrap().edits.clone()
    }

    pub fn dms(&self) -> Vec<(String, OutgoingMessage)> {
        self.state.lock().unwrap().dms.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.lock().unwrap().fetch_calls
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    fn unavailable(what: &str) -> TicketError {
        TicketError::PlatformError(format!("{what} unavailable"))
    }
}

#[async_trait]
impl TicketPlatform for FakePlatform {
    fn bot_user_id(&self) -> &str {
        BOT
    }

    async fn guild_name(&self, _guild_id: &str) -> Result<String, TicketError> {
        Ok("Test Guild".to_string())
    }

    async fn list_channels(&self, _guild_id: &str) -> Result<Vec<ChannelInfo>, TicketError> {
        let delay = *self.list_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.channels())
    }

    async fn get_channel(&self, channel_id: &str) -> Result<ChannelInfo, TicketError> {
        self.channel(channel_id)
            .ok_or_else(|| Self::unavailable("channel"))
    }

    async fn create_channel(
        &self,
        _guild_id: &str,
        channel: NewChannel,
    ) -> Result<ChannelInfo, TicketError> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Self::unavailable("create"));
        }
        let id = self.next_id().to_string();
        let info = ChannelInfo {
            id: id.clone(),
            name: channel.name,
            topic: Some(channel.topic),
            overwrites: channel.overwrites,
        };
        state.channels.insert(id.clone(), info.clone());
        if self.fail_welcome.load(Ordering::SeqCst) {
            state.failing_channels.insert(id);
        }
        Ok(info)
    }

    async fn delete_channel(&self, channel_id: &str) -> Result<(), TicketError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::unavailable("delete"));
        }
        let mut state = self.state.lock().unwrap();
        state.channels.remove(channel_id);
        state.deleted.push(channel_id.to_string());
        Ok(())
    }

    async fn set_topic(&self, channel_id: &str, topic: &str) -> Result<(), TicketError> {
        let mut state = self.state.lock().unwrap();
        let channel = state
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| Self::unavailable("channel"))?;
        channel.topic = Some(topic.to_string());
        Ok(())
    }

    async fn set_overwrite(
        &self,
        channel_id: &str,
        overwrite: PermissionOverwrite,
    ) -> Result<(), TicketError> {
        let mut state = self.state.lock().unwrap();
        let channel = state
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| Self::unavailable("channel"))?;
        channel.overwrites.retain(|o| o.target != overwrite.target);
        channel.overwrites.push(overwrite);
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: &str,
        message: OutgoingMessage,
    ) -> Result<String, TicketError> {
        if self
            .state
            .lock()
            .unwrap()
            .failing_channels
            .contains(channel_id)
        {
            return Err(Self::unavailable("send"));
        }
        let id = self.post_with_embed(
            channel_id,
            Some((BOT, "TicketBot")),
            message.content.as_deref().unwrap_or(""),
            message.embed.clone(),
        );
        self.state
            .lock()
            .unwrap()
            .sent
            .push((channel_id.to_string(), message));
        Ok(id)
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        message: OutgoingMessage,
    ) -> Result<(), TicketError> {
        self.state.lock().unwrap().edits.push((
            channel_id.to_string(),
            message_id.to_string(),
            message,
        ));
        Ok(())
    }

    async fn fetch_messages(
        &self,
        channel_id: &str,
        before: Option<&str>,
        limit: u8,
    ) -> Result<Vec<FetchedMessage>, TicketError> {
        let mut state = self.state.lock().unwrap();
        state.fetch_calls += 1;
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Self::unavailable("history"));
        }
        let history = state.history.get(channel_id).cloned().unwrap_or_default();
        let cutoff = before.and_then(|b| history.iter().find(|m| m.id == b).map(|m| m.created_at));

        let mut page: Vec<FetchedMessage> = history
            .into_iter()
            .filter(|m| cutoff.is_none_or(|c| m.created_at < c))
            .collect();
        page.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        page.truncate(usize::from(limit));
        if self.reverse_pages.load(Ordering::SeqCst) {
            page.reverse();
        }
        Ok(page)
    }

    async fn send_direct(
        &self,
        user_id: &str,
        message: OutgoingMessage,
    ) -> Result<(), TicketError> {
        if self.dm_disabled.load(Ordering::SeqCst) {
            return Err(TicketError::PlatformError(
                "Cannot send messages to this user".to_string(),
            ));
        }
        self.state
            .lock()
            .unwrap()
            .dms
            .push((user_id.to_string(), message));
        Ok(())
    }

    async fn user_name(&self, user_id: &str) -> Result<Option<String>, TicketError> {
        Ok(self.state.lock().unwrap().users.get(user_id).cloned())
    }

    async fn role_name(
        &self,
        _guild_id: &str,
        role_id: &str,
    ) -> Result<Option<String>, TicketError> {
        Ok(self.state.lock().unwrap().roles.get(role_id).cloned())
    }

    async fn channel_name(&self, channel_id: &str) -> Result<Option<String>, TicketError> {
        Ok(self.channel(channel_id).map(|c| c.name))
    }
}
