mod common;

use std::sync::Arc;
use std::time::Duration;

use flock_core::{RepostParent, TimelineEventKind};
use flock_db::TIMELINE_LIMIT;
use flock_timeline::{FanOutConfig, SessionState};
use flock_util_error::BoxedErrorResult;

use self::common::{
    FollowersUnavailable, Gate, GatedParentAuthor, TestTimeline, assert_quiet, next_event,
};

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn snapshot_matches_current_timeline() -> BoxedErrorResult<()> {
    let t = TestTimeline::new().await?;
    let alice = t.user("alice").await?;
    let bob = t.user("bob").await?;
    let carol = t.user("carol").await?;
    t.db.follow(bob, alice).await?;

    t.timeline.create_post(alice, "from alice").await?;
    t.timeline.create_post(bob, "from bob").await?;
    t.timeline.create_post(carol, "from carol").await?;
    t.settle().await;

    let mut session = t.timeline.subscribe(bob).await?;
    let snapshot = next_event(&mut session).await;

    assert_eq!(snapshot.kind(), TimelineEventKind::SnapshotDelivered);
    assert_eq!(
        snapshot.posts(),
        t.db.current_timeline(bob, TIMELINE_LIMIT).await?.as_slice()
    );
    let texts: Vec<_> = snapshot.posts().iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, ["from bob", "from alice"]);
    assert_quiet(&mut session).await;

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn own_post_reaches_own_stream() -> BoxedErrorResult<()> {
    let t = TestTimeline::new().await?;
    let alice = t.user("alice").await?;

    let mut session = t.timeline.subscribe(alice).await?;
    let snapshot = next_event(&mut session).await;
    assert_eq!(snapshot.kind(), TimelineEventKind::SnapshotDelivered);
    assert!(snapshot.posts().is_empty());

    let post = t.timeline.create_post(alice, "hello").await?;

    let event = next_event(&mut session).await;
    assert_eq!(event.kind(), TimelineEventKind::PostCreated);
    assert_eq!(event.posts(), [post]);

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn followers_see_post_and_its_deletion() -> BoxedErrorResult<()> {
    let t = TestTimeline::new().await?;
    let alice = t.user("alice").await?;
    let bob = t.user("bob").await?;
    let carol = t.user("carol").await?;
    t.db.follow(bob, alice).await?;

    let mut bob_session = t.timeline.subscribe(bob).await?;
    let mut carol_session = t.timeline.subscribe(carol).await?;
    next_event(&mut bob_session).await;
    next_event(&mut carol_session).await;

    let post = t.timeline.create_post(alice, "x").await?;
    let event = next_event(&mut bob_session).await;
    assert_eq!(event.kind(), TimelineEventKind::PostCreated);
    assert_eq!(event.posts()[0].text, "x");

    t.timeline.delete_post(post.id).await?;
    let event = next_event(&mut bob_session).await;
    assert_eq!(event.kind(), TimelineEventKind::PostDeleted);
    assert_eq!(event.posts()[0].id, post.id);

    t.settle().await;
    assert_quiet(&mut carol_session).await;

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn repost_reaches_reposter_followers_and_original_author() -> BoxedErrorResult<()> {
    let t = TestTimeline::new().await?;
    let alice = t.user("alice").await?;
    let carol = t.user("carol").await?;
    let dave = t.user("dave").await?;
    let eve = t.user("eve").await?;
    t.db.follow(dave, carol).await?;

    let post = t.timeline.create_post(alice, "original").await?;
    t.settle().await;

    let mut alice_session = t.timeline.subscribe(alice).await?;
    let mut dave_session = t.timeline.subscribe(dave).await?;
    let mut eve_session = t.timeline.subscribe(eve).await?;
    for session in [&mut alice_session, &mut dave_session, &mut eve_session] {
        next_event(session).await;
    }

    let repost = t
        .timeline
        .create_repost(carol, RepostParent::Post(post.id), None)
        .await?;

    for session in [&mut alice_session, &mut dave_session] {
        let event = next_event(session).await;
        assert_eq!(event.kind(), TimelineEventKind::RepostCreated);
        assert_eq!(event.reposts(), [repost.clone()]);
    }

    t.timeline.delete_repost(repost.id).await?;
    let event = next_event(&mut dave_session).await;
    assert_eq!(event.kind(), TimelineEventKind::RepostDeleted);
    assert_eq!(event.reposts()[0].id, repost.id);

    t.settle().await;
    assert_quiet(&mut eve_session).await;

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn write_succeeds_when_audience_cannot_be_resolved() -> BoxedErrorResult<()> {
    let t = TestTimeline::with_resolver(|db| Arc::new(FollowersUnavailable(db))).await?;
    let alice = t.user("alice").await?;

    let mut session = t.timeline.subscribe(alice).await?;
    next_event(&mut session).await;

    let post = t.timeline.create_post(alice, "still saved").await?;
    assert_eq!(t.db.get_post(post.id).await?, Some(post));

    t.settle().await;
    let stats = t.timeline.fanout_stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 0);
    assert_quiet(&mut session).await;

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn repost_returns_before_parent_author_is_looked_up() -> BoxedErrorResult<()> {
    let gate = Gate::closed();
    let t = TestTimeline::with_resolver({
        let gate = gate.clone();
        move |db| Arc::new(GatedParentAuthor { db, gate })
    })
    .await?;
    let alice = t.user("alice").await?;
    let carol = t.user("carol").await?;

    let post = t.timeline.create_post(alice, "original").await?;
    t.settle().await;
    let mut alice_session = t.timeline.subscribe(alice).await?;
    next_event(&mut alice_session).await;

    let repost = tokio::time::timeout(
        Duration::from_secs(5),
        t.timeline
            .create_repost(carol, RepostParent::Post(post.id), None),
    )
    .await??;
    assert_eq!(t.db.get_repost(repost.id).await?, Some(repost.clone()));

    tokio::time::timeout(Duration::from_secs(5), gate.entered.notified()).await?;
    assert_quiet(&mut alice_session).await;

    gate.permits.add_permits(1);
    let event = next_event(&mut alice_session).await;
    assert_eq!(event.kind(), TimelineEventKind::RepostCreated);
    assert_eq!(event.reposts(), [repost]);

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn deleted_user_content_is_retracted_from_followers() -> BoxedErrorResult<()> {
    let t = TestTimeline::new().await?;
    let alice = t.user("alice").await?;
    let bob = t.user("bob").await?;
    let carol = t.user("carol").await?;
    t.db.follow(bob, alice).await?;

    let post = t.timeline.create_post(alice, "soon gone").await?;
    let own = t.timeline.create_post(carol, "carol's").await?;
    let repost = t
        .timeline
        .create_repost(alice, RepostParent::Post(own.id), None)
        .await?;
    t.settle().await;

    let mut alice_session = t.timeline.subscribe(alice).await?;
    let mut bob_session = t.timeline.subscribe(bob).await?;
    let mut carol_session = t.timeline.subscribe(carol).await?;
    for session in [&mut alice_session, &mut bob_session, &mut carol_session] {
        next_event(session).await;
    }

    let deleted = t.timeline.delete_user(alice).await?;
    assert_eq!(deleted.posts, vec![post.clone()]);

    let next = tokio::time::timeout(Duration::from_secs(5), alice_session.next_event()).await?;
    assert!(next.is_none());

    // Same actor, so the post goes out before the repost
    let event = next_event(&mut bob_session).await;
    assert_eq!(event.kind(), TimelineEventKind::PostDeleted);
    assert_eq!(event.posts()[0].id, post.id);

    let event = next_event(&mut carol_session).await;
    assert_eq!(event.kind(), TimelineEventKind::RepostDeleted);
    assert_eq!(event.reposts()[0].id, repost.id);
    t.settle().await;
    assert_quiet(&mut carol_session).await;
    assert!(t.db.current_timeline(bob, TIMELINE_LIMIT).await?.is_empty());

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn failed_write_is_not_fanned_out() -> BoxedErrorResult<()> {
    let t = TestTimeline::new().await?;
    let alice = t.user("alice").await?;

    let mut session = t.timeline.subscribe(alice).await?;
    next_event(&mut session).await;

    let err = t.timeline.create_post(alice, "   ").await.unwrap_err();
    assert!(err.is_invalid());

    assert_eq!(t.timeline.fanout_stats().enqueued, 0);
    assert_quiet(&mut session).await;

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn writes_without_subscribers_leave_registry_empty() -> BoxedErrorResult<()> {
    let t = TestTimeline::new().await?;
    let alice = t.user("alice").await?;
    let bob = t.user("bob").await?;
    t.db.follow(bob, alice).await?;

    t.timeline.create_post(alice, "nobody listens").await?;
    t.settle().await;

    let stats = t.timeline.fanout_stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.delivered, 0);
    assert_eq!(t.timeline.registry().user_count(), 0);

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn undrained_event_is_kept_over_newer_one() -> BoxedErrorResult<()> {
    let t = TestTimeline::new().await?;
    let alice = t.user("alice").await?;

    let mut session = t.timeline.subscribe(alice).await?;
    next_event(&mut session).await;

    t.timeline.create_post(alice, "first").await?;
    t.timeline.create_post(alice, "second").await?;
    t.settle().await;

    let event = next_event(&mut session).await;
    assert_eq!(event.posts()[0].text, "first");
    assert_quiet(&mut session).await;
    assert_eq!(t.timeline.fanout_stats().mailbox_full, 1);

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn dropped_session_is_released_and_resubscribe_starts_clean() -> BoxedErrorResult<()> {
    let t = TestTimeline::new().await?;
    let alice = t.user("alice").await?;
    let registry = t.timeline.registry().clone();

    let mut session = t.timeline.subscribe(alice).await?;
    next_event(&mut session).await;
    t.timeline.create_post(alice, "never read").await?;
    t.settle().await;

    // Dropping the session stands in for a disconnected client
    drop(session);
    assert_eq!(registry.subscriber_count(alice), 0);

    let mut fresh = registry.acquire(alice);
    assert!(fresh.try_recv().is_none());

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn concurrent_sessions_of_one_user_each_get_events() -> BoxedErrorResult<()> {
    let t = TestTimeline::new().await?;
    let alice = t.user("alice").await?;

    let mut phone = t.timeline.subscribe(alice).await?;
    let mut laptop = t.timeline.subscribe(alice).await?;
    next_event(&mut phone).await;
    next_event(&mut laptop).await;

    t.timeline.create_post(alice, "everywhere").await?;
    assert_eq!(next_event(&mut phone).await.posts()[0].text, "everywhere");
    assert_eq!(next_event(&mut laptop).await.posts()[0].text, "everywhere");

    phone.close();
    assert_eq!(t.timeline.registry().subscriber_count(alice), 1);

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn shutdown_ends_sessions_and_drains_fanout() -> BoxedErrorResult<()> {
    let t = TestTimeline::with_config(FanOutConfig {
        workers: 2,
        queue_capacity: 16,
    })
    .await?;
    let alice = t.user("alice").await?;

    let mut session = t.timeline.subscribe(alice).await?;
    next_event(&mut session).await;

    t.timeline.create_post(alice, "last words").await?;
    t.timeline.shutdown().await;

    let stats = t.timeline.fanout_stats();
    assert_eq!(stats.enqueued, stats.completed);
    assert!(t.timeline.is_shutting_down());

    let next = tokio::time::timeout(Duration::from_secs(5), session.next_event()).await?;
    assert!(next.is_none());
    assert_eq!(session.state(), SessionState::Closed);

    assert!(t.timeline.subscribe(alice).await?.next_event().await.is_none());

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn subscribing_unknown_user_fails() -> BoxedErrorResult<()> {
    let t = TestTimeline::new().await?;

    let err = t
        .timeline
        .subscribe(flock_core::UserId::ZERO)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(t.timeline.registry().user_count(), 0);

    Ok(())
}
