use std::sync::Arc;
use std::time::Duration;

use serenity::all::{GatewayIntents, GuildId};
use serenity::http::Http;
use serenity::Client;
use tracing::{info, warn};

use ticketdesk::core::config::AppConfig;
use ticketdesk::desk::TicketDesk;
use ticketdesk::discord::{DiscordPlatform, Handler};
use ticketdesk::transcript::github::GithubPagesPublisher;
use ticketdesk::transcript::server::start_transcript_server;
use ticketdesk::transcript::{LinkHost, TranscriptStore};

const PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Hosted transcript links: GitHub Pages when configured, else the built-in
/// HTTP server when a public base URL is set, else none.
async fn link_host(config: &AppConfig) -> anyhow::Result<Option<Arc<dyn LinkHost>>> {
    let retention = chrono::Duration::hours(config.transcript_retention_hours);

    if let Some(github) = &config.github {
        info!(repo = %github.repo, branch = %github.branch, "Publishing transcripts to GitHub Pages");
        let publisher: Arc<dyn LinkHost> =
            Arc::new(GithubPagesPublisher::new(github.clone(), retention));
        return Ok(Some(publisher));
    }

    if let Some(base_url) = &config.transcript_base_url {
        let store = Arc::new(TranscriptStore::new(base_url.clone(), retention));
        start_transcript_server(config.transcript_bind_addr, Arc::clone(&store)).await?;
        let host: Arc<dyn LinkHost> = store;
        return Ok(Some(host));
    }

    Ok(None)
}

fn spawn_purge_loop(host: Arc<dyn LinkHost>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            host.purge_expired().await;
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ticketdesk::setup_logging();

    let config = AppConfig::from_env().map_err(anyhow::Error::msg)?;

    let http = Arc::new(Http::new(&config.discord_token));
    let platform = DiscordPlatform::connect(Arc::clone(&http)).await?;
    info!(bot_user_id = %ticketdesk::platform::TicketPlatform::bot_user_id(&platform), "Authenticated with Discord");

    let mut desk = TicketDesk::new(Arc::new(platform), config.desk_settings());
    match link_host(&config).await? {
        Some(host) => {
            spawn_purge_loop(Arc::clone(&host));
            desk = desk.with_link_host(host);
        }
        None => warn!("No transcript link host configured, falling back to channel attachments"),
    }

    let command_guild = match config.guild_id.as_deref().map(str::parse::<u64>) {
        Some(Ok(id)) if id != 0 => Some(GuildId::new(id)),
        Some(_) => anyhow::bail!("GUILD_ID must be a Discord id"),
        None => None,
    };

    let handler = Handler::new(Arc::new(desk), command_guild);
    let mut client = Client::builder(&config.discord_token, GatewayIntents::GUILDS)
        .event_handler(handler)
        .await?;

    info!("Starting Discord gateway");
    client.start().await?;
    Ok(())
}
