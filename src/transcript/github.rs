//! Publish transcripts to a GitHub Pages branch.
//!
//! Uploads go through the repository contents API. Each upload's blob sha is
//! remembered so the file can be deleted again once its retention passes.

use std::sync::Mutex;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use super::Document;
use super::deliver::LinkHost;
use crate::core::config::GithubConfig;
use crate::errors::TicketError;

const GITHUB_API: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: Option<ContentInfo>,
}

#[derive(Debug, Deserialize)]
struct ContentInfo {
    sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Upload {
    path: String,
    sha: String,
    expires_at: DateTime<Utc>,
}

pub struct GithubPagesPublisher {
    http: Client,
    config: GithubConfig,
    retention: Duration,
    api_base: String,
    uploads: Mutex<Vec<Upload>>,
}

impl GithubPagesPublisher {
    #[must_use]
    pub fn new(config: GithubConfig, retention: Duration) -> Self {
        let http = Client::builder()
            .timeout(StdDuration::from_secs(30))
            .user_agent("ticketdesk")
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            config,
            retention,
            api_base: GITHUB_API.to_string(),
            uploads: Mutex::new(Vec::new()),
        }
    }

    /// Point the publisher at a different API root (GitHub Enterprise).
    #[must_use]
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Repository path of a transcript uploaded at `now`.
    #[must_use]
    pub fn upload_path(document: &Document, now: DateTime<Utc>) -> String {
        let stem = document
            .filename
            .trim_end_matches(".html")
            .trim_start_matches("transcript-");
        format!("transcripts/{stem}-{}.html", now.timestamp_millis())
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{path}",
            self.api_base, self.config.user, self.config.repo
        )
    }

    /// Public Pages URL of an uploaded path.
    #[must_use]
    pub fn pages_url(&self, path: &str) -> String {
        format!(
            "https://{}.github.io/{}/{path}",
            self.config.user, self.config.repo
        )
    }

    async fn check<T: DeserializeOwned>(
        resp: reqwest::Response,
        what: &str,
    ) -> Result<T, TicketError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(TicketError::DeliveryError(format!(
                "{what} HTTP {status}: {body}"
            )));
        }
        resp.json::<T>()
            .await
            .map_err(|e| TicketError::DeliveryError(format!("{what} JSON parse error: {e}")))
    }

    async fn delete(&self, upload: &Upload) -> Result<(), TicketError> {
        let resp = self
            .http
            .delete(self.contents_url(&upload.path))
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github+json")
            .json(&json!({
                "message": format!("Expire {}", upload.path),
                "sha": upload.sha,
                "branch": self.config.branch,
            }))
            .send()
            .await?;
        Self::check::<Value>(resp, "contents delete").await.map(|_| ())
    }
}

#[async_trait]
impl LinkHost for GithubPagesPublisher {
    async fn publish(&self, document: &Document) -> Result<String, TicketError> {
        let now = Utc::now();
        let path = Self::upload_path(document, now);

        let resp = self
            .http
            .put(self.contents_url(&path))
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github+json")
            .json(&json!({
                "message": format!("Add transcript {}", document.channel_name),
                "content": general_purpose::STANDARD.encode(document.html.as_bytes()),
                "branch": self.config.branch,
            }))
            .send()
            .await?;
        let body: ContentsResponse = Self::check(resp, "contents upload").await?;

        match body.content {
            Some(ContentInfo { sha }) => {
                if let Ok(mut uploads) = self.uploads.lock() {
                    uploads.push(Upload {
                        path: path.clone(),
                        sha,
                        expires_at: now + self.retention,
                    });
                }
            }
            None => warn!(path = %path, "Upload response carried no sha; file will not expire"),
        }

        info!(path = %path, "Transcript published to GitHub Pages");
        Ok(self.pages_url(&path))
    }

    async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<Upload> = match self.uploads.lock() {
            Ok(mut uploads) => {
                let (expired, kept): (Vec<Upload>, Vec<Upload>) =
                    uploads.drain(..).partition(|u| u.expires_at <= now);
                *uploads = kept;
                expired
            }
            Err(_) => return 0,
        };

        let mut purged = 0;
        for upload in expired {
            match self.delete(&upload).await {
                Ok(()) => purged += 1,
                Err(e) => {
                    error!(path = %upload.path, "Failed to delete expired transcript: {}", e);
                    // Retry on the next sweep.
                    if let Ok(mut uploads) = self.uploads.lock() {
                        uploads.push(upload);
                    }
                }
            }
        }
        purged
    }
}
