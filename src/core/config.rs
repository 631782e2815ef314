use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use chrono_tz::Tz;
use url::Url;

/// Process configuration read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub discord_token: String,
    pub guild_id: Option<String>,
    pub support_role_id: Option<String>,
    pub category_id: Option<String>,
    pub transcript_max_messages: usize,
    pub close_grace_secs: u64,
    pub transcript_timezone: Tz,
    pub transcript_base_url: Option<Url>,
    pub transcript_bind_addr: SocketAddr,
    pub transcript_retention_hours: i64,
    pub github: Option<GithubConfig>,
    pub panel_title: Option<String>,
    pub panel_description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub token: String,
    pub user: String,
    pub repo: String,
    pub branch: String,
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw.trim().parse().map_err(|e| format!("{name}: {e}")),
        None => Ok(default),
    }
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns a message naming the variable that is missing or malformed.
    pub fn from_env() -> Result<Self, String> {
        let transcript_timezone = match optional("TRANSCRIPT_TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| format!("TRANSCRIPT_TIMEZONE: {e}"))?,
            None => Tz::UTC,
        };

        let transcript_base_url = optional("TRANSCRIPT_BASE_URL")
            .map(|raw| Url::parse(&raw).map_err(|e| format!("TRANSCRIPT_BASE_URL: {e}")))
            .transpose()?;

        let github = match (
            optional("GITHUB_TOKEN"),
            optional("GITHUB_USER"),
            optional("GITHUB_REPO"),
        ) {
            (Some(token), Some(user), Some(repo)) => Some(GithubConfig {
                token,
                user,
                repo,
                branch: optional("GITHUB_BRANCH").unwrap_or_else(|| "gh-pages".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            discord_token: env::var("DISCORD_TOKEN").map_err(|e| format!("DISCORD_TOKEN: {e}"))?,
            guild_id: optional("GUILD_ID"),
            support_role_id: optional("SUPPORT_ROLE_ID"),
            category_id: optional("CATEGORY_ID"),
            transcript_max_messages: parsed("TRANSCRIPT_MAX_MESSAGES", 500)?,
            close_grace_secs: parsed("CLOSE_GRACE_SECS", 5)?,
            transcript_timezone,
            transcript_base_url,
            transcript_bind_addr: parsed(
                "TRANSCRIPT_BIND_ADDR",
                SocketAddr::from(([0, 0, 0, 0], 8080)),
            )?,
            transcript_retention_hours: parsed("TRANSCRIPT_RETENTION_HOURS", 72)?,
            github,
            panel_title: optional("PANEL_TITLE"),
            panel_description: optional("PANEL_DESCRIPTION"),
        })
    }

    /// The platform-independent subset the desk runs on.
    #[must_use]
    pub fn desk_settings(&self) -> DeskSettings {
        let defaults = DeskSettings::default();
        DeskSettings {
            default_support_role_id: self.support_role_id.clone(),
            default_category_id: self.category_id.clone(),
            transcript_max_messages: self.transcript_max_messages,
            close_grace: Duration::from_secs(self.close_grace_secs),
            timezone: self.transcript_timezone,
            panel_title: self
                .panel_title
                .clone()
                .unwrap_or_else(|| defaults.panel_title.clone()),
            panel_description: self
                .panel_description
                .clone()
                .unwrap_or_else(|| defaults.panel_description.clone()),
            ..defaults
        }
    }
}

/// Runtime knobs of a [`crate::desk::TicketDesk`].
#[derive(Debug, Clone)]
pub struct DeskSettings {
    /// Used when a panel does not name a support role.
    pub default_support_role_id: Option<String>,
    /// Used when a panel does not name a category.
    pub default_category_id: Option<String>,
    pub transcript_max_messages: usize,
    pub close_grace: Duration,
    pub timezone: Tz,
    pub panel_title: String,
    pub panel_description: String,
    /// How many recent messages the panel registry inspects.
    pub panel_scan_limit: u8,
}

impl Default for DeskSettings {
    fn default() -> Self {
        Self {
            default_support_role_id: None,
            default_category_id: None,
            transcript_max_messages: 500,
            close_grace: Duration::from_secs(5),
            timezone: Tz::UTC,
            panel_title: "🎟️ Open a ticket".to_string(),
            panel_description:
                "Click the button below to open a ticket.\nOur support team will help you as soon as possible."
                    .to_string(),
            panel_scan_limit: 50,
        }
    }
}
