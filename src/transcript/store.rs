//! In-process transcript hosting with bounded retention.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::info;
use url::Url;
use uuid::Uuid;

use super::Document;
use super::deliver::LinkHost;
use crate::errors::TicketError;

#[derive(Debug, Clone)]
struct StoredTranscript {
    html: String,
    expires_at: DateTime<Utc>,
}

/// Keeps rendered transcripts in memory and hands out
/// `<base_url>/transcripts/<id>` links. Entries past their retention read as
/// missing even before a purge runs.
#[derive(Debug)]
pub struct TranscriptStore {
    base_url: Url,
    retention: Duration,
    entries: RwLock<HashMap<Uuid, StoredTranscript>>,
}

impl TranscriptStore {
    #[must_use]
    pub fn new(mut base_url: Url, retention: Duration) -> Self {
        // `Url::join` replaces the last segment unless the base ends in a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            retention,
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// # Errors
    ///
    /// Returns an error if the link cannot be built from the base URL.
    pub fn insert_at(&self, document: &Document, now: DateTime<Utc>) -> Result<String, TicketError> {
        let id = Uuid::new_v4();
        let link = self
            .base_url
            .join(&format!("transcripts/{id}"))
            .map_err(|e| TicketError::ConfigError(format!("transcript base url: {e}")))?;

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id,
                StoredTranscript {
                    html: document.html.clone(),
                    expires_at: now + self.retention,
                },
            );
        Ok(link.to_string())
    }

    #[must_use]
    pub fn get_at(&self, id: &Uuid, now: DateTime<Utc>) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.html.clone())
    }

    #[must_use]
    pub fn get(&self, id: &Uuid) -> Option<String> {
        self.get_at(id, Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LinkHost for TranscriptStore {
    async fn publish(&self, document: &Document) -> Result<String, TicketError> {
        self.insert_at(document, Utc::now())
    }

    async fn purge_expired(&self) -> usize {
        let purged = self.purge_expired_at(Utc::now());
        if purged > 0 {
            info!(purged, "Purged expired transcripts");
        }
        purged
    }
}
