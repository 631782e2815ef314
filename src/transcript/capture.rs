//! Channel history retrieval and normalization.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use regex::{Captures, Regex};
use tracing::{debug, warn};

use super::{Transcript, TranscriptHeader, TranscriptMessage};
use crate::errors::TicketError;
use crate::platform::{FetchedMessage, MAX_PAGE_SIZE, TicketPlatform};

static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(@!?|@&|#)(\d+)>").unwrap_or_else(|_| {
        // Unreachable in practice; keeps construction panic-free.
        Regex::new(r"$^").expect("fallback regex compiles")
    })
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MentionKind {
    User,
    Role,
    Channel,
}

impl MentionKind {
    fn from_sigil(sigil: &str) -> Self {
        match sigil {
            "@&" => MentionKind::Role,
            "#" => MentionKind::Channel,
            _ => MentionKind::User,
        }
    }

    fn display(self, name: &str) -> String {
        match self {
            MentionKind::User | MentionKind::Role => format!("@{name}"),
            MentionKind::Channel => format!("#{name}"),
        }
    }

    fn placeholder(self, id: &str) -> String {
        match self {
            MentionKind::User => format!("@user:{id}"),
            MentionKind::Role => format!("@role:{id}"),
            MentionKind::Channel => format!("#channel:{id}"),
        }
    }
}

/// Names resolved for the mentions found in one transcript.
#[derive(Debug, Default)]
pub struct MentionDirectory {
    names: HashMap<(MentionKind, String), String>,
}

impl MentionDirectory {
    /// Look up every distinct mention in `texts` concurrently.
    ///
    /// Lookups that fail or return nothing are left unresolved and render
    /// as typed placeholders.
    pub async fn resolve<'a>(
        platform: &dyn TicketPlatform,
        guild_id: &str,
        texts: impl Iterator<Item = &'a str>,
    ) -> Self {
        let wanted: HashSet<(MentionKind, String)> = texts
            .flat_map(|text| {
                MENTION_RE
                    .captures_iter(text)
                    .map(|c| (MentionKind::from_sigil(&c[1]), c[2].to_string()))
                    .collect::<Vec<_>>()
            })
            .collect();

        let lookups = wanted.into_iter().map(|(kind, id)| async move {
            let result = match kind {
                MentionKind::User => platform.user_name(&id).await,
                MentionKind::Role => platform.role_name(guild_id, &id).await,
                MentionKind::Channel => platform.channel_name(&id).await,
            };
            (kind, id, result)
        });

        let mut names = HashMap::new();
        for (kind, id, result) in join_all(lookups).await {
            match result {
                Ok(Some(name)) => {
                    names.insert((kind, id), name);
                }
                Ok(None) => debug!(?kind, id = %id, "Mention referent unknown"),
                Err(e) => warn!(?kind, id = %id, "Failed to resolve mention: {}", e),
            }
        }

        Self { names }
    }

    /// Replace raw mention tokens with display names or typed placeholders.
    #[must_use]
    pub fn apply(&self, text: &str) -> String {
        MENTION_RE
            .replace_all(text, |caps: &Captures| {
                let kind = MentionKind::from_sigil(&caps[1]);
                let id = &caps[2];
                match self.names.get(&(kind, id.to_string())) {
                    Some(name) => kind.display(name),
                    None => kind.placeholder(id),
                }
            })
            .into_owned()
    }
}

/// Walk history backwards page by page until `max_messages` are collected or
/// the channel start is reached. Returns messages oldest first.
///
/// # Errors
///
/// Returns an error if any page fetch fails.
pub async fn fetch_history(
    platform: &dyn TicketPlatform,
    channel_id: &str,
    max_messages: usize,
) -> Result<Vec<FetchedMessage>, TicketError> {
    let mut collected: Vec<FetchedMessage> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut before: Option<String> = None;

    while collected.len() < max_messages {
        let remaining = max_messages - collected.len();
        let limit = u8::try_from(remaining.min(usize::from(MAX_PAGE_SIZE))).unwrap_or(MAX_PAGE_SIZE);
        let page = platform
            .fetch_messages(channel_id, before.as_deref(), limit)
            .await?;
        let page_len = page.len();

        // Pages arrive in no guaranteed order; the cursor is the oldest entry.
        let Some(oldest) = page.iter().min_by_key(|m| m.created_at) else {
            break;
        };
        before = Some(oldest.id.clone());

        let mut fresh = 0usize;
        for message in page {
            if seen.insert(message.id.clone()) {
                collected.push(message);
                fresh += 1;
            }
        }
        debug!(channel_id, page_len, fresh, "Fetched history page");

        if fresh == 0 || page_len < usize::from(limit) {
            break;
        }
    }

    // Keep the newest messages when a page overshot the bound.
    if collected.len() > max_messages {
        collected.sort_by_key(|m| std::cmp::Reverse(m.created_at));
        collected.truncate(max_messages);
    }
    collected.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| snowflake_order(&a.id, &b.id))
    });
    Ok(collected)
}

/// Numeric order for decimal ids of any length.
fn snowflake_order(a: &str, b: &str) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Normalize fetched messages into transcript entries.
#[must_use]
pub fn normalize(messages: Vec<FetchedMessage>, mentions: &MentionDirectory) -> Vec<TranscriptMessage> {
    messages
        .into_iter()
        .map(|m| TranscriptMessage {
            id: m.id,
            author: m
                .author
                .map(|a| a.name)
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            timestamp: m.created_at,
            text: mentions.apply(&m.content),
            attachments: m.attachments,
            embed: m.embeds.into_iter().next().map(|mut e| {
                e.title = e.title.map(|t| mentions.apply(&t));
                e.description = e.description.map(|d| mentions.apply(&d));
                e
            }),
        })
        .collect()
}

/// Fetch, order, and normalize the history of a ticket channel.
///
/// # Errors
///
/// Returns an error if history retrieval fails. Name lookups never fail the
/// capture.
#[tracing::instrument(level = "info", skip(platform, header), fields(channel = %header.channel_name))]
pub async fn capture(
    platform: &dyn TicketPlatform,
    guild_id: &str,
    channel_id: &str,
    max_messages: usize,
    header: TranscriptHeader,
    closed_at: DateTime<Utc>,
) -> Result<Transcript, TicketError> {
    let history = fetch_history(platform, channel_id, max_messages).await?;

    let texts: Vec<&str> = history
        .iter()
        .flat_map(|m| {
            let first_embed = m.embeds.first();
            std::iter::once(m.content.as_str())
                .chain(first_embed.and_then(|e| e.title.as_deref()))
                .chain(first_embed.and_then(|e| e.description.as_deref()))
        })
        .collect();
    let mentions = MentionDirectory::resolve(platform, guild_id, texts.into_iter()).await;

    Ok(Transcript {
        header,
        closed_at,
        messages: normalize(history, &mentions),
    })
}
