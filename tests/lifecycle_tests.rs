mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use url::Url;

use common::{FakePlatform, GUILD, admin, member, staff};
use ticketdesk::codec::{TicketState, decode_ticket, encode_panel, encode_ticket};
use ticketdesk::core::config::DeskSettings;
use ticketdesk::core::models::{EventKind, InboundEvent};
use ticketdesk::desk::TicketDesk;
use ticketdesk::desk::replies::{CLAIM_BUTTON, CLOSE_BUTTON, DUPLICATE_EVENT, close_ack};
use ticketdesk::errors::TicketError;
use ticketdesk::platform::{Actor, OverwriteTarget, Permission, PermissionOverwrite};
use ticketdesk::transcript::{DeliveryMethod, TranscriptStore};

const SUPPORT: &str = "500";

fn settings() -> DeskSettings {
    DeskSettings {
        default_support_role_id: Some(SUPPORT.to_string()),
        default_category_id: Some("600".to_string()),
        close_grace: Duration::from_secs(5),
        ..DeskSettings::default()
    }
}

fn desk() -> (Arc<FakePlatform>, TicketDesk) {
    let platform = Arc::new(FakePlatform::new());
    platform.add_user("10", "alice");
    let desk = TicketDesk::new(platform.clone(), settings());
    (platform, desk)
}

fn alice() -> Actor {
    member("10", "alice")
}

fn helper() -> Actor {
    staff("20", "bob", SUPPORT)
}

fn event(id: &str, actor: Actor, kind: EventKind) -> InboundEvent {
    InboundEvent {
        id: id.to_string(),
        guild_id: GUILD.to_string(),
        actor,
        kind,
    }
}

async fn open_for_alice(desk: &TicketDesk) -> String {
    desk.open_ticket(GUILD, &alice(), None).await.unwrap().channel_id
}

#[tokio::test]
async fn test_open_creates_private_ticket_channel() {
    let (platform, desk) = desk();

    let opened = desk.open_ticket(GUILD, &alice(), None).await.unwrap();
    assert_eq!(opened.channel_name, "ticket-alice");

    let channel = platform.channel(&opened.channel_id).unwrap();
    assert_eq!(channel.topic.as_deref(), Some("ticket_user:10;claimed_by:"));

    let everyone = channel
        .overwrites
        .iter()
        .find(|o| o.target == OverwriteTarget::Everyone)
        .unwrap();
    assert!(everyone.deny.contains(&Permission::ViewChannel));

    let owner = channel
        .overwrites
        .iter()
        .find(|o| o.target == OverwriteTarget::Member("10".to_string()))
        .unwrap();
    assert!(owner.allow.contains(&Permission::SendMessages));
    assert!(owner.allow.contains(&Permission::AttachFiles));
    assert_eq!(channel.granted_roles().collect::<Vec<_>>(), vec![SUPPORT]);

    let welcome = platform.sent_to(&opened.channel_id);
    assert_eq!(welcome.len(), 1);
    let buttons: Vec<&str> = welcome[0]
        .buttons
        .iter()
        .map(|b| b.custom_id.as_str())
        .collect();
    assert_eq!(buttons, vec![CLAIM_BUTTON, CLOSE_BUTTON]);
    assert!(welcome[0].content.as_deref().unwrap().contains("<@10>"));
    assert!(welcome[0].content.as_deref().unwrap().contains("<@&500>"));
}

#[tokio::test]
async fn test_second_open_points_at_existing_ticket() {
    let (platform, desk) = desk();
    let first = open_for_alice(&desk).await;

    let err = desk.open_ticket(GUILD, &alice(), None).await.unwrap_err();
    assert!(matches!(err, TicketError::AlreadyOpen(ref id) if *id == first));
    assert_eq!(platform.create_calls(), 1);
}

#[tokio::test]
async fn test_existing_ticket_found_from_topic_alone() {
    let (platform, desk) = desk();
    platform.add_channel("77", "renamed-by-staff", Some(&encode_ticket("10", Some("20"))));

    let err = desk.open_ticket(GUILD, &alice(), None).await.unwrap_err();
    assert!(matches!(err, TicketError::AlreadyOpen(ref id) if id == "77"));
}

#[tokio::test(start_paused = true)]
async fn test_double_click_creates_one_channel() {
    let (platform, desk) = desk();
    platform.set_list_delay(Duration::from_millis(200));

    let (a1, a2) = (alice(), alice());
    let (first, second) = tokio::join!(
        desk.open_ticket(GUILD, &a1, None),
        desk.open_ticket(GUILD, &a2, None),
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(TicketError::InProgress)));
    assert_eq!(platform.create_calls(), 1);
    assert!(desk.guard().lock_user(GUILD, "10").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_same_user_opens_in_two_guilds_at_once() {
    let (platform, desk) = desk();
    platform.set_list_delay(Duration::from_millis(200));

    let (a1, a2) = (alice(), alice());
    let (first, second) = tokio::join!(
        desk.open_ticket(GUILD, &a1, None),
        desk.open_ticket("901", &a2, None),
    );

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(platform.create_calls(), 2);
}

#[tokio::test]
async fn test_open_uses_panel_footer_configuration() {
    let (platform, desk) = desk();
    let footer = encode_panel(Some("501"), None);

    let opened = desk.open_ticket(GUILD, &alice(), Some(&footer)).await.unwrap();
    let channel = platform.channel(&opened.channel_id).unwrap();
    assert_eq!(channel.granted_roles().collect::<Vec<_>>(), vec!["501"]);
}

#[tokio::test]
async fn test_open_from_foreign_message_is_rejected() {
    let (platform, desk) = desk();

    let err = desk
        .open_ticket(GUILD, &alice(), Some("Powered by tickets"))
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::NotAPanel));
    assert_eq!(platform.create_calls(), 0);
}

#[tokio::test]
async fn test_failed_welcome_removes_channel() {
    let (platform, desk) = desk();
    FakePlatform::set(&platform.fail_welcome);

    let err = desk.open_ticket(GUILD, &alice(), None).await.unwrap_err();
    assert!(matches!(err, TicketError::PlatformError(_)));
    assert!(platform.channels().is_empty());
    assert_eq!(platform.deleted().len(), 1);
}

#[tokio::test]
async fn test_failed_create_releases_user_guard() {
    let (platform, desk) = desk();
    FakePlatform::set(&platform.fail_create);

    assert!(desk.open_ticket(GUILD, &alice(), None).await.is_err());
    assert!(desk.guard().lock_user(GUILD, "10").is_some());
}

#[tokio::test]
async fn test_support_member_claims_ticket() {
    let (platform, desk) = desk();
    let channel = open_for_alice(&desk).await;

    let meta = desk.claim_ticket(&channel, &helper()).await.unwrap();
    assert_eq!(meta.claimant_id.as_deref(), Some("20"));

    let topic = platform.channel(&channel).unwrap().topic.unwrap();
    assert_eq!(topic, "ticket_user:10;claimed_by:20");
    assert_eq!(decode_ticket(&topic).state(), TicketState::Claimed);

    let notice = platform.sent_to(&channel).pop().unwrap();
    assert!(notice.content.unwrap().contains("<@20>"));
}

#[tokio::test]
async fn test_reclaim_overwrites_claimant() {
    let (platform, desk) = desk();
    let channel = open_for_alice(&desk).await;

    desk.claim_ticket(&channel, &helper()).await.unwrap();
    desk.claim_ticket(&channel, &admin("30", "carol"))
        .await
        .unwrap();

    let topic = platform.channel(&channel).unwrap().topic.unwrap();
    assert_eq!(topic, "ticket_user:10;claimed_by:30");
}

#[tokio::test]
async fn test_owner_without_privilege_cannot_claim() {
    let (platform, desk) = desk();
    let channel = open_for_alice(&desk).await;

    let err = desk.claim_ticket(&channel, &alice()).await.unwrap_err();
    assert!(matches!(err, TicketError::MissingPermission(_)));
    assert_eq!(
        platform.channel(&channel).unwrap().topic.as_deref(),
        Some("ticket_user:10;claimed_by:")
    );
}

#[tokio::test]
async fn test_lifecycle_operations_reject_plain_channels() {
    let (platform, desk) = desk();
    platform.add_channel("55", "general", Some("Chat about anything"));

    assert!(matches!(
        desk.claim_ticket("55", &helper()).await,
        Err(TicketError::NotATicket)
    ));
    assert!(matches!(
        desk.add_member("55", &helper(), "40").await,
        Err(TicketError::NotATicket)
    ));
    assert!(matches!(
        desk.close_ticket(GUILD, "55", &admin("30", "carol")).await,
        Err(TicketError::NotATicket)
    ));
    assert!(platform.sent().is_empty());
}

#[tokio::test]
async fn test_claimant_without_owner_is_not_a_ticket() {
    let (platform, desk) = desk();
    platform.add_channel("56", "orphan", Some("ticket_user:;claimed_by:20"));

    assert_eq!(desk.ticket_state("56").await.unwrap(), TicketState::None);
    assert!(matches!(
        desk.claim_ticket("56", &helper()).await,
        Err(TicketError::NotATicket)
    ));
    assert_eq!(
        platform.channel("56").unwrap().topic.as_deref(),
        Some("ticket_user:;claimed_by:20")
    );
}

#[tokio::test]
async fn test_owner_adds_member() {
    let (platform, desk) = desk();
    let channel = open_for_alice(&desk).await;

    desk.add_member(&channel, &alice(), "40").await.unwrap();

    let info = platform.channel(&channel).unwrap();
    let added: &PermissionOverwrite = info
        .overwrites
        .iter()
        .find(|o| o.target == OverwriteTarget::Member("40".to_string()))
        .unwrap();
    assert!(added.allow.contains(&Permission::ViewChannel));
    assert!(added.allow.contains(&Permission::ReadMessageHistory));
    assert!(
        platform
            .sent_to(&channel)
            .pop()
            .unwrap()
            .content
            .unwrap()
            .contains("<@40>")
    );
}

#[tokio::test]
async fn test_stranger_cannot_add_member() {
    let (platform, desk) = desk();
    let channel = open_for_alice(&desk).await;

    let err = desk
        .add_member(&channel, &member("99", "mallory"), "40")
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::MissingPermission(_)));
    assert!(
        !platform
            .channel(&channel)
            .unwrap()
            .overwrites
            .iter()
            .any(|o| o.target == OverwriteTarget::Member("40".to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_close_delivers_transcript_by_dm_then_deletes() {
    let (platform, desk) = desk();
    let channel = open_for_alice(&desk).await;
    platform.post(&channel, Some(("10", "alice")), "my printer is on fire");

    let report = desk.close_ticket(GUILD, &channel, &helper()).await.unwrap();
    assert_eq!(report.outcome.method(), Some(&DeliveryMethod::DirectMessage));

    let dms = platform.dms();
    assert_eq!(dms.len(), 1);
    assert_eq!(dms[0].0, "10");
    let file = dms[0].1.file.as_ref().unwrap();
    assert_eq!(file.filename, "transcript-ticket-alice.html");
    let html = String::from_utf8(file.data.clone()).unwrap();
    assert!(html.contains("my printer is on fire"));
    assert!(html.contains("Test Guild"));

    let notice = platform.sent_to(&channel).pop().unwrap();
    assert!(notice.content.unwrap().contains("5 seconds"));
    assert!(platform.deleted().is_empty());

    report.deletion.await.unwrap();
    assert_eq!(platform.deleted(), vec![channel.clone()]);
    assert!(!desk.guard().is_closing(&channel));
}

#[tokio::test(start_paused = true)]
async fn test_close_falls_back_to_channel_attachment_when_dm_blocked() {
    let (platform, desk) = desk();
    FakePlatform::set(&platform.dm_disabled);
    let channel = open_for_alice(&desk).await;

    let reply = desk
        .handle(event(
            "evt-close",
            helper(),
            EventKind::CloseTicket {
                channel_id: channel.clone(),
            },
        ))
        .await;
    assert!(reply.ephemeral);
    assert!(reply.content.contains("could not be reached by DM"));

    let posted = platform
        .sent_to(&channel)
        .into_iter()
        .find(|m| m.file.is_some())
        .unwrap();
    assert_eq!(
        posted.file.unwrap().filename,
        "transcript-ticket-alice.html"
    );

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(platform.deleted(), vec![channel.clone()]);
    assert!(!desk.guard().is_closing(&channel));
}

#[tokio::test(start_paused = true)]
async fn test_close_deletes_channel_when_every_delivery_fails() {
    let (platform, desk) = desk();
    FakePlatform::set(&platform.dm_disabled);
    let channel = open_for_alice(&desk).await;
    platform.fail_sends_to(&channel);

    let report = desk.close_ticket(GUILD, &channel, &helper()).await.unwrap();
    assert!(!report.outcome.is_delivered());
    assert_eq!(report.outcome.failures().len(), 2);

    let ack = close_ack(&report.outcome);
    assert!(ack.contains("could not be delivered"));
    assert!(ack.contains("could not be reached by DM"));

    report.deletion.await.unwrap();
    assert_eq!(platform.deleted(), vec![channel.clone()]);
    assert!(platform.channel(&channel).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_close_posts_hosted_link_when_dm_blocked() {
    let (platform, desk) = desk();
    FakePlatform::set(&platform.dm_disabled);
    let store = Arc::new(TranscriptStore::new(
        Url::parse("https://tickets.example.com").unwrap(),
        ChronoDuration::hours(1),
    ));
    let desk = desk.with_link_host(store.clone());
    let channel = open_for_alice(&desk).await;

    let report = desk.close_ticket(GUILD, &channel, &helper()).await.unwrap();
    let Some(DeliveryMethod::ChannelLink(url)) = report.outcome.method() else {
        panic!("expected a hosted link, got {:?}", report.outcome);
    };
    assert!(url.starts_with("https://tickets.example.com/transcripts/"));
    assert_eq!(store.len(), 1);
    assert!(
        platform
            .sent_to(&channel)
            .iter()
            .any(|m| m.content.as_deref().is_some_and(|c| c.contains(url.as_str())))
    );
}

#[tokio::test(start_paused = true)]
async fn test_closing_ticket_rejects_claim_and_second_close() {
    let (platform, desk) = desk();
    let channel = open_for_alice(&desk).await;

    let report = desk.close_ticket(GUILD, &channel, &alice()).await.unwrap();
    assert!(desk.guard().is_closing(&channel));
    assert_eq!(desk.ticket_state(&channel).await.unwrap(), TicketState::Closing);

    assert!(matches!(
        desk.close_ticket(GUILD, &channel, &alice()).await,
        Err(TicketError::InProgress)
    ));
    assert!(matches!(
        desk.claim_ticket(&channel, &helper()).await,
        Err(TicketError::Closing)
    ));
    assert!(matches!(
        desk.add_member(&channel, &alice(), "40").await,
        Err(TicketError::Closing)
    ));
    assert_eq!(platform.dms().len(), 1);

    report.deletion.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_deletion_failure_is_swallowed() {
    let (platform, desk) = desk();
    FakePlatform::set(&platform.fail_delete);
    let channel = open_for_alice(&desk).await;

    let report = desk.close_ticket(GUILD, &channel, &helper()).await.unwrap();
    report.deletion.await.unwrap();

    assert!(platform.channel(&channel).is_some());
    assert!(!desk.guard().is_closing(&channel));
}

#[tokio::test]
async fn test_capture_failure_aborts_close() {
    let (platform, desk) = desk();
    let channel = open_for_alice(&desk).await;
    FakePlatform::set(&platform.fail_fetch);

    let err = desk.close_ticket(GUILD, &channel, &helper()).await.unwrap_err();
    assert!(matches!(err, TicketError::PlatformError(_)));
    assert!(platform.dms().is_empty());
    assert!(platform.channel(&channel).is_some());
    assert!(!desk.guard().is_closing(&channel));
}

#[tokio::test]
async fn test_stranger_cannot_close() {
    let (platform, desk) = desk();
    let channel = open_for_alice(&desk).await;

    let reply = desk
        .handle(event(
            "evt-1",
            member("99", "mallory"),
            EventKind::CloseTicket {
                channel_id: channel.clone(),
            },
        ))
        .await;
    assert!(reply.content.contains("permission"));
    assert_eq!(platform.fetch_calls(), 0);
}

#[tokio::test]
async fn test_in_flight_event_is_not_handled_twice() {
    let (platform, desk) = desk();
    let _held = desk.guard().lock_event("evt-dup").unwrap();

    let reply = desk
        .handle(event(
            "evt-dup",
            alice(),
            EventKind::OpenTicket { panel_footer: None },
        ))
        .await;
    assert_eq!(reply.content, DUPLICATE_EVENT);
    assert_eq!(platform.create_calls(), 0);
}

#[tokio::test]
async fn test_handle_reports_open_and_rejection() {
    let (_platform, desk) = desk();

    let opened = desk
        .handle(event(
            "evt-a",
            alice(),
            EventKind::OpenTicket { panel_footer: None },
        ))
        .await;
    assert!(opened.content.starts_with("✅ Ticket opened: <#"));

    let again = desk
        .handle(event(
            "evt-b",
            alice(),
            EventKind::OpenTicket { panel_footer: None },
        ))
        .await;
    assert!(again.content.contains("already have an open ticket"));
    assert!(!desk.guard().events().is_held("evt-a"));
}

#[tokio::test]
async fn test_platform_errors_become_generic_reply() {
    let (platform, desk) = desk();
    FakePlatform::set(&platform.fail_create);

    let reply = desk
        .handle(event(
            "evt-x",
            alice(),
            EventKind::OpenTicket { panel_footer: None },
        ))
        .await;
    assert_eq!(
        reply.content,
        "⚠️ Something went wrong, please try again later."
    );
}
