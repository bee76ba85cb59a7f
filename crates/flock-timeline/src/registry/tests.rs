use std::sync::Arc;

use flock_core::{Post, PostId, TimelineEvent, Timestamp, UserId};

use super::*;

fn user(n: u8) -> UserId {
    UserId::from_bytes([n; 16])
}

fn post_event(author: UserId, text: &str) -> Arc<TimelineEvent> {
    Arc::new(TimelineEvent::post_created(Post {
        id: PostId::from_bytes([text.len() as u8; 16]),
        user_id: author,
        text: text.into(),
        created_at: Timestamp::now(),
    }))
}

fn text_of(event: &TimelineEvent) -> &str {
    &event.posts()[0].text
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn acquire_then_deliver() {
    let registry = SubscriberRegistry::new();
    let mut sub = registry.acquire(user(1));

    assert_eq!(registry.subscriber_count(user(1)), 1);

    let report = registry.try_deliver(user(1), &post_event(user(1), "hello"));
    assert_eq!(
        report,
        DeliveryReport {
            delivered: 1,
            full: 0
        }
    );

    let event = sub.recv().await.unwrap();
    assert_eq!(text_of(&event), "hello");
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn deliver_without_subscribers_is_a_noop() {
    let registry = SubscriberRegistry::new();
    let _sub = registry.acquire(user(1));

    let report = registry.try_deliver(user(2), &post_event(user(2), "hello"));

    assert_eq!(report, DeliveryReport::default());
    assert_eq!(registry.user_count(), 1);
    assert_eq!(registry.subscriber_count(user(2)), 0);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn release_is_idempotent() {
    let registry = SubscriberRegistry::new();
    let sub = registry.acquire(user(1));
    let id = sub.id();

    assert!(registry.release(user(1), id));
    assert!(!registry.release(user(1), id));
    // Never acquired
    assert!(!registry.release(user(7), id));
    assert_eq!(registry.user_count(), 0);

    // Dropping after an explicit release is fine too
    drop(sub);
    assert_eq!(registry.user_count(), 0);

    let _sub = registry.acquire(user(1));
    assert_eq!(registry.subscriber_count(user(1)), 1);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn full_mailbox_keeps_pending_event() {
    let registry = SubscriberRegistry::new();
    let mut sub = registry.acquire(user(1));

    registry.try_deliver(user(1), &post_event(user(1), "first"));
    let report = registry.try_deliver(user(1), &post_event(user(1), "second"));
    assert_eq!(
        report,
        DeliveryReport {
            delivered: 0,
            full: 1
        }
    );

    assert_eq!(text_of(&sub.recv().await.unwrap()), "first");
    assert!(sub.try_recv().is_none());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn primed_subscription_yields_snapshot_first() {
    let registry = SubscriberRegistry::new();
    let mut sub = registry.acquire_primed(user(1), Arc::new(TimelineEvent::snapshot(vec![])));

    // Live event racing the snapshot can't displace it
    let report = registry.try_deliver(user(1), &post_event(user(1), "live"));
    assert_eq!(report.full, 1);

    let first = sub.recv().await.unwrap();
    assert_eq!(first.kind(), flock_core::TimelineEventKind::SnapshotDelivered);

    registry.try_deliver(user(1), &post_event(user(1), "live"));
    assert_eq!(text_of(&sub.recv().await.unwrap()), "live");
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn concurrent_subscriptions_of_one_user_are_independent() {
    let registry = SubscriberRegistry::new();
    let mut sub_a = registry.acquire(user(1));
    let mut sub_b = registry.acquire(user(1));
    assert_ne!(sub_a.id(), sub_b.id());
    assert_eq!(registry.subscriber_count(user(1)), 2);

    let report = registry.try_deliver(user(1), &post_event(user(1), "both"));
    assert_eq!(report.delivered, 2);
    assert_eq!(text_of(&sub_a.recv().await.unwrap()), "both");
    assert_eq!(text_of(&sub_b.recv().await.unwrap()), "both");

    drop(sub_a);
    assert_eq!(registry.subscriber_count(user(1)), 1);

    registry.try_deliver(user(1), &post_event(user(1), "only b"));
    assert_eq!(text_of(&sub_b.recv().await.unwrap()), "only b");
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn dropping_subscription_releases_it() {
    let registry = SubscriberRegistry::new();
    let sub = registry.acquire(user(1));
    registry.try_deliver(user(1), &post_event(user(1), "stale"));

    drop(sub);
    assert_eq!(registry.user_count(), 0);

    // A fresh subscription starts empty
    let mut sub = registry.acquire(user(1));
    assert!(sub.try_recv().is_none());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn release_user_ends_all_their_subscriptions() {
    let registry = SubscriberRegistry::new();
    let mut sub_a = registry.acquire(user(1));
    let mut sub_b = registry.acquire(user(1));
    let _other = registry.acquire(user(2));

    registry.try_deliver(user(1), &post_event(user(1), "last"));

    assert_eq!(registry.release_user(user(1)), 2);
    assert_eq!(registry.release_user(user(1)), 0);
    assert_eq!(registry.subscriber_count(user(2)), 1);

    // Pending events are still drained before the end
    assert_eq!(text_of(&sub_a.recv().await.unwrap()), "last");
    assert!(sub_a.recv().await.is_none());
    assert_eq!(text_of(&sub_b.recv().await.unwrap()), "last");
    assert!(sub_b.recv().await.is_none());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn concurrent_acquire_release_keeps_registry_consistent() {
    let registry = SubscriberRegistry::new();

    let mut handles = vec![];
    for i in 0..16u8 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..100 {
                let sub = registry.acquire(user(i % 4));
                registry.try_deliver(user(i % 4), &post_event(user(i % 4), "x"));
                drop(sub);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(registry.user_count(), 0);
}
