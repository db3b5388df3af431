//! Publisher → store → observers, end to end on the in-memory providers.

use std::time::Duration;

use associate_core::config::PresenceConfig;
use associate_core::types::SubjectId;
use associate_entity::{PresenceRecord, ProfileSummary, SubjectKind};
use associate_realtime::{
    AppLifecycle, PresenceEngine, PresenceIdentity, PresenceIndicator, PublisherState,
};
use chrono::Utc;

fn engine() -> PresenceEngine {
    PresenceEngine::in_memory(PresenceConfig::default())
}

#[tokio::test]
async fn test_publisher_drives_subject_observer() {
    let engine = engine();
    let subject = SubjectId::new();
    let (lifecycle, rx) = AppLifecycle::channel(AppLifecycle::Foreground);

    let mut watch = engine.subject_observer().observe(Some(subject));
    let loading = watch.current();
    assert_eq!(PresenceIndicator::from_subject(&loading), PresenceIndicator::Hidden);

    let mut publisher = engine.publisher(rx);
    publisher
        .set_subject(Some(PresenceIdentity::user(subject)))
        .await;
    let online = watch.wait_for(|p| !p.loading && p.online).await.unwrap();
    assert_eq!(PresenceIndicator::from_subject(&online), PresenceIndicator::Online);

    lifecycle.send_replace(AppLifecycle::Background);
    let offline = watch.wait_for(|p| !p.online).await.unwrap();
    assert_eq!(PresenceIndicator::from_subject(&offline), PresenceIndicator::Offline);
    assert_eq!(publisher.state(), PublisherState::Backgrounded);

    lifecycle.send_replace(AppLifecycle::Foreground);
    assert!(watch.wait_for(|p| p.online).await.is_some());

    publisher.stop().await;
    assert!(watch.wait_for(|p| !p.online).await.is_some());
    assert!(!engine.subject_observer().check(subject).await.unwrap());

    let metrics = engine.metrics().snapshot();
    assert_eq!(metrics.writes_failed, 0);
    assert_eq!(metrics.writes_succeeded, 4);
}

#[tokio::test]
async fn test_cohort_lists_only_online_advisors_of_category() {
    let engine = engine();
    let memory = engine.memory_store().unwrap();
    let (a, b, c) = (SubjectId::new(), SubjectId::new(), SubjectId::new());
    memory.put_profile(ProfileSummary {
        subject_id: a,
        display_name: "Amara Okafor".into(),
        image_url: None,
        experience: Some("8 years".into()),
        gender: None,
    });

    let (_lifecycle, rx) = AppLifecycle::channel(AppLifecycle::Foreground);
    let mut publisher_a = engine.publisher(rx.clone());
    let mut publisher_b = engine.publisher(rx.clone());
    let mut publisher_c = engine.publisher(rx);

    publisher_a
        .set_subject(Some(PresenceIdentity::advisor(a, "finance")))
        .await;
    publisher_b
        .set_subject(Some(PresenceIdentity::advisor(b, "finance")))
        .await;
    publisher_c
        .set_subject(Some(PresenceIdentity::advisor(c, "tax")))
        .await;
    publisher_b.stop().await;

    let mut finance = engine.cohort_observer().observe("finance");
    let snapshot = finance.wait_for(|s| !s.loading).await.unwrap();
    let members: Vec<_> = snapshot.advisors.iter().map(|a| a.subject_id()).collect();
    assert_eq!(members, vec![a]);
    assert_eq!(snapshot.advisors[0].display_name(), "Amara Okafor");

    publisher_b
        .set_subject(Some(PresenceIdentity::advisor(b, "finance")))
        .await;
    let grown = finance.wait_for(|s| s.advisors.len() == 2).await.unwrap();
    let members: Vec<_> = grown.advisors.iter().map(|a| a.subject_id()).collect();
    assert_eq!(members, vec![a, b]);
}

#[tokio::test]
async fn test_crashed_client_ages_out_for_readers() {
    let engine = engine();
    let subject = SubjectId::new();
    let stale = Utc::now() - chrono::Duration::minutes(3);
    engine
        .store()
        .upsert(&PresenceRecord::new(
            subject,
            SubjectKind::Advisor,
            true,
            stale,
            Some("finance".into()),
        ))
        .await
        .unwrap();

    assert!(!engine.subject_observer().check(subject).await.unwrap());
    assert!(engine.cohort_observer().fetch("finance").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_events_after_teardown_are_ignored() {
    let engine = engine();
    let subject = SubjectId::new();
    let mut subject_watch = engine.subject_observer().observe(Some(subject));
    let mut cohort_watch = engine.cohort_observer().observe("finance");
    subject_watch.wait_for(|p| !p.loading).await.unwrap();
    cohort_watch.wait_for(|s| !s.loading).await.unwrap();

    subject_watch.cancel();
    cohort_watch.cancel();
    assert_eq!(engine.feed().subscriber_count(), 0);

    let (_lifecycle, rx) = AppLifecycle::channel(AppLifecycle::Foreground);
    let mut publisher = engine.publisher(rx);
    publisher
        .set_subject(Some(PresenceIdentity::advisor(subject, "finance")))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!subject_watch.current().online);
    assert!(cohort_watch.current().advisors.is_empty());
}
