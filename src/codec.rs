//! Ticket and panel metadata stored in platform text fields.
//!
//! There is no database: a ticket channel's topic and a panel's embed footer
//! are the only durable state. Both use semicolon separated `key:value` pairs:
//!
//! - ticket topic: `ticket_user:<id>;claimed_by:<id-or-empty>`
//! - panel footer: `support_role:<id-or-empty>;category:<id-or-empty>`
//!
//! Decoding never fails. Missing or malformed pairs produce empty fields, so a
//! topic edited by hand simply stops being a ticket.

const TICKET_USER_KEY: &str = "ticket_user";
const CLAIMED_BY_KEY: &str = "claimed_by";
const SUPPORT_ROLE_KEY: &str = "support_role";
const CATEGORY_KEY: &str = "category";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketMeta {
    pub owner_id: Option<String>,
    pub claimant_id: Option<String>,
}

impl TicketMeta {
    #[must_use]
    pub fn state(&self) -> TicketState {
        match (&self.owner_id, &self.claimant_id) {
            (None, _) => TicketState::None,
            (Some(_), None) => TicketState::Open,
            (Some(_), Some(_)) => TicketState::Claimed,
        }
    }
}

/// Lifecycle state as far as the channel topic can tell. `Closing` is not
/// persisted; the desk tracks it in its channel guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketState {
    None,
    Open,
    Claimed,
    Closing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelMeta {
    pub support_role_id: Option<String>,
    pub category_id: Option<String>,
}

/// Iterate `key:value` pairs, skipping segments without a colon.
fn pairs(raw: &str) -> impl Iterator<Item = (&str, &str)> {
    raw.split(';')
        .filter_map(|segment| segment.split_once(':'))
        .map(|(k, v)| (k.trim(), v.trim()))
}

/// First non-empty value for `key`.
fn field(raw: &str, key: &str) -> Option<String> {
    pairs(raw)
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn has_key(raw: &str, key: &str) -> bool {
    pairs(raw).any(|(k, _)| k == key)
}

#[must_use]
pub fn encode_ticket(owner_id: &str, claimant_id: Option<&str>) -> String {
    format!(
        "{TICKET_USER_KEY}:{owner_id};{CLAIMED_BY_KEY}:{}",
        claimant_id.unwrap_or("")
    )
}

#[must_use]
pub fn decode_ticket(raw: &str) -> TicketMeta {
    TicketMeta {
        owner_id: field(raw, TICKET_USER_KEY),
        claimant_id: field(raw, CLAIMED_BY_KEY),
    }
}

#[must_use]
pub fn encode_panel(support_role_id: Option<&str>, category_id: Option<&str>) -> String {
    format!(
        "{SUPPORT_ROLE_KEY}:{};{CATEGORY_KEY}:{}",
        support_role_id.unwrap_or(""),
        category_id.unwrap_or("")
    )
}

#[must_use]
pub fn decode_panel(raw: &str) -> PanelMeta {
    PanelMeta {
        support_role_id: field(raw, SUPPORT_ROLE_KEY),
        category_id: field(raw, CATEGORY_KEY),
    }
}

/// Owner of the ticket hosted by a channel with this topic, if any.
#[must_use]
pub fn ticket_owner(topic: Option<&str>) -> Option<String> {
    topic.and_then(|t| decode_ticket(t).owner_id)
}

/// The single "is this channel a ticket" check every lifecycle operation uses.
#[must_use]
pub fn is_ticket(topic: Option<&str>) -> bool {
    ticket_owner(topic).is_some()
}

/// A panel footer carries both keys even when their values are empty.
#[must_use]
pub fn is_panel(footer: Option<&str>) -> bool {
    footer.is_some_and(|f| has_key(f, SUPPORT_ROLE_KEY) && has_key(f, CATEGORY_KEY))
}
