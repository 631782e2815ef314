//! Discord binding of the desk, built on serenity.

pub mod client;
pub mod handler;

pub use client::DiscordPlatform;
pub use handler::Handler;
