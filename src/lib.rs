/// Ticketdesk - support tickets as private chat channels.
///
/// Members open a ticket from a panel message, support staff claim it, either
/// side can bring more people in, and closing it archives the conversation as
/// an HTML transcript before the channel is deleted.
///
/// # Architecture
///
/// - `codec` stores ticket and panel state in channel topics and embed footers
/// - `guard` rejects concurrent or repeated operations instead of queueing them
/// - `desk` runs the lifecycle against a [`platform::TicketPlatform`]
/// - `transcript` captures, renders, and delivers the channel history
/// - `discord` (feature `discord`) binds the platform trait to serenity
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use ticketdesk::core::config::AppConfig;
/// use ticketdesk::core::models::{EventKind, InboundEvent};
/// use ticketdesk::desk::TicketDesk;
/// use ticketdesk::platform::{Actor, TicketPlatform};
///
/// async fn open(platform: Arc<dyn TicketPlatform>) -> Result<(), Box<dyn std::error::Error>> {
///     ticketdesk::setup_logging();
///
///     let config = AppConfig::from_env()?;
///     let desk = TicketDesk::new(platform, config.desk_settings());
///
///     let reply = desk
///         .handle(InboundEvent {
///             id: "interaction-1".into(),
///             guild_id: "guild-1".into(),
///             actor: Actor {
///                 id: "user-1".into(),
///                 name: "alice".into(),
///                 ..Actor::default()
///             },
///             kind: EventKind::OpenTicket { panel_footer: None },
///         })
///         .await;
///     println!("{}", reply.content);
///     Ok(())
/// }
/// ```
pub mod codec;
pub mod core;
pub mod desk;
#[cfg(feature = "discord")]
pub mod discord;
pub mod errors;
pub mod guard;
pub mod panel;
pub mod platform;
pub mod transcript;

/// Configure structured JSON logging.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Calling this more
/// than once is harmless; later calls leave the first subscriber in place.
///
/// # Example
///
/// ```
/// ticketdesk::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
