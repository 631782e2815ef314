//! User-facing texts for lifecycle acknowledgments and in-channel notices.

use crate::transcript::{DeliveryMethod, DeliveryOutcome};

pub const DUPLICATE_EVENT: &str = "⏳ This request is already being handled.";
pub const CLAIM_BUTTON: &str = "claim_ticket";
pub const CLOSE_BUTTON: &str = "close_ticket";
pub const TICKET_COLOR: u32 = 0x0080_00ff;

#[must_use]
pub fn ticket_opened(channel_id: &str) -> String {
    format!("✅ Ticket opened: <#{channel_id}>")
}

#[must_use]
pub fn welcome_mentions(owner_id: &str, support_role_id: Option<&str>) -> String {
    match support_role_id {
        Some(role) => format!("<@{owner_id}> <@&{role}>"),
        None => format!("<@{owner_id}>"),
    }
}

#[must_use]
pub fn welcome_description(owner_id: &str, support_role_id: Option<&str>) -> String {
    let team = support_role_id.map_or_else(|| "Our support team".to_string(), |r| format!("<@&{r}>"));
    format!(
        "Thanks for opening a ticket, <@{owner_id}>.\n{team} will help you as soon as possible. Please describe your issue below."
    )
}

#[must_use]
pub fn claimed_notice(owner_id: &str, claimant_id: &str) -> String {
    format!(
        "💜 Hello <@{owner_id}>, I'm <@{claimant_id}> from the support team and I'll be handling your ticket."
    )
}

#[must_use]
pub fn claimed_ack() -> String {
    "✅ You claimed this ticket.".to_string()
}

#[must_use]
pub fn member_added_notice(target_id: &str, actor_id: &str) -> String {
    format!("➕ <@{target_id}> was added to this ticket by <@{actor_id}>.")
}

#[must_use]
pub fn member_added_ack(target_id: &str) -> String {
    format!("✅ <@{target_id}> can now see this ticket.")
}

#[must_use]
pub fn panel_ack(created: bool) -> String {
    if created {
        "✅ Ticket panel posted.".to_string()
    } else {
        "✅ Existing ticket panel updated.".to_string()
    }
}

#[must_use]
pub fn closing_notice(closer_id: &str, grace_secs: u64) -> String {
    format!("🔒 Ticket closed by <@{closer_id}>. This channel will be deleted in {grace_secs} seconds.")
}

/// Acknowledgment for the closer, describing where the transcript went.
#[must_use]
pub fn close_ack(outcome: &DeliveryOutcome) -> String {
    let dm_note = if outcome.direct_message_failed() {
        " The owner could not be reached by DM."
    } else {
        ""
    };
    match outcome.method() {
        Some(DeliveryMethod::DirectMessage) => {
            "✅ Ticket closed. The transcript was sent to the owner by DM.".to_string()
        }
        Some(DeliveryMethod::ChannelLink(url)) => {
            format!("✅ Ticket closed.{dm_note} Transcript: {url}")
        }
        Some(DeliveryMethod::ChannelAttachment) => {
            format!("✅ Ticket closed.{dm_note} The transcript was posted in the ticket channel.")
        }
        None => format!(
            "⚠️ Ticket closed, but the transcript could not be delivered.{dm_note}"
        ),
    }
}
