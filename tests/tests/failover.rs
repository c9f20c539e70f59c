//! Failover tests.
//!
//! An isolated node swallows bus requests, so callers hit the bus timeout
//! and fall back to the durable store. The tokio clock is paused, which
//! makes timeouts and GC expiry instant.

use std::time::Duration;

use integration_tests::setup::{fresh_request, request_with_session};
use integration_tests::{settle, TestCluster};
use session_core::SessionRecord;

async fn sign_in(cluster: &TestCluster, node_id: u32, user: &str) -> String {
    let node = cluster.node(node_id);
    let mut record = node.manager.start_session(&mut fresh_request());
    record.set("user", user);
    assert!(node.manager.save_session_data(Some(&mut record)).await);
    settle().await;
    record.id
}

#[tokio::test(start_paused = true)]
async fn test_get_timeout_rehomes_session_to_requesting_node() {
    let cluster = TestCluster::new(2);
    let old_id = sign_in(&cluster, 1, "alice").await;
    cluster.isolate(1);

    let b = cluster.node(2);
    let mut ctx = request_with_session(&old_id);
    let record = b.manager.get_session(&mut ctx).await.unwrap();

    let new_id = record.id.clone();
    assert_ne!(new_id, old_id);
    assert_eq!(b.manager.codec().owner_of(&new_id).unwrap(), 2);
    assert_eq!(record.get_as::<String>("user").as_deref(), Some("alice"));

    // The browser is handed the new id.
    assert_eq!(ctx.session_id(), Some(new_id.as_str()));

    // Old id gone from the durable store, new id present locally and durably.
    assert!(!cluster.store().contains(&old_id));
    let stored = cluster.store().value(&new_id).unwrap();
    assert!(stored.contains(&new_id));
    assert!(!stored.contains(&old_id));
    let probe = b.server.probe(&new_id).await;
    assert!(probe.stored && probe.gc_armed);

    // Later requests with the new cookie stay on node 2.
    let again = b.manager.get_session(&mut request_with_session(&new_id)).await;
    assert_eq!(again.unwrap().id, new_id);
}

#[tokio::test(start_paused = true)]
async fn test_get_timeout_without_durable_copy_starts_fresh() {
    let cluster = TestCluster::new(2);
    cluster.store().set_should_fail(true);
    let old_id = sign_in(&cluster, 1, "alice").await;
    cluster.store().set_should_fail(false);
    assert!(!cluster.store().contains(&old_id));
    cluster.isolate(1);

    let b = cluster.node(2);
    let mut ctx = request_with_session(&old_id);
    assert!(b.manager.get_session(&mut ctx).await.is_none());
    assert_eq!(ctx.session_id(), Some(old_id.as_str()));

    // The caller starts a brand new session owned by node 2.
    let fresh = b.manager.start_session(&mut ctx);
    assert_eq!(b.manager.codec().owner_of(&fresh.id).unwrap(), 2);
    assert_eq!(ctx.session_id(), Some(fresh.id.as_str()));
    assert!(fresh.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_get_timeout_without_durable_store_loses_session() {
    let cluster = TestCluster::without_durable(2);
    let old_id = sign_in(&cluster, 1, "alice").await;
    cluster.isolate(1);

    let b = cluster.node(2);
    assert!(b.manager.get_session(&mut request_with_session(&old_id)).await.is_none());

    cluster.heal(1);
    let record = b.manager.get_session(&mut request_with_session(&old_id)).await;
    assert_eq!(record.unwrap().id, old_id);
}

#[tokio::test(start_paused = true)]
async fn test_durable_outage_during_failover_is_not_found() {
    let cluster = TestCluster::new(2);
    let old_id = sign_in(&cluster, 1, "alice").await;
    cluster.isolate(1);
    cluster.store().set_should_fail(true);

    let b = cluster.node(2);
    assert!(b.manager.get_session(&mut request_with_session(&old_id)).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_save_timeout_writes_locally_and_durably() {
    let cluster = TestCluster::new(2);
    let id = sign_in(&cluster, 1, "alice").await;
    cluster.isolate(1);

    let b = cluster.node(2);
    let mut record = SessionRecord::new(id.as_str());
    record.set("user", "alice");
    record.set("step", 2);
    assert!(b.manager.save_session_data(Some(&mut record)).await);
    assert!(!record.is_modified());

    assert!(b.server.probe(&id).await.stored);
    let stored = cluster.store().value(&id).unwrap();
    assert!(stored.contains("\"step\":2"));
}

#[tokio::test(start_paused = true)]
async fn test_save_timeout_without_durable_store_fails() {
    let cluster = TestCluster::without_durable(2);
    let id = sign_in(&cluster, 1, "alice").await;
    cluster.isolate(1);

    let mut record = SessionRecord::new(id.as_str());
    record.set("user", "mallory");
    assert!(!cluster.node(2).manager.save_session_data(Some(&mut record)).await);
    assert!(record.is_modified());
}

#[tokio::test(start_paused = true)]
async fn test_save_timeout_with_durable_outage_fails() {
    let cluster = TestCluster::new(2);
    let id = sign_in(&cluster, 1, "alice").await;
    cluster.isolate(1);
    cluster.store().set_should_fail(true);

    let mut record = SessionRecord::new(id.as_str());
    record.set("user", "alice");
    record.set("step", 3);
    assert!(!cluster.node(2).manager.save_session_data(Some(&mut record)).await);
    assert!(record.is_modified());

    let stored = cluster.store().value(&id).unwrap();
    assert!(!stored.contains("\"step\":3"));
}

#[tokio::test(start_paused = true)]
async fn test_destroy_timeout_deletes_durable_copy() {
    let cluster = TestCluster::new(2);
    let id = sign_in(&cluster, 1, "alice").await;
    assert!(cluster.store().contains(&id));
    cluster.isolate(1);

    let b = cluster.node(2);
    let mut ctx = request_with_session(&id);
    let record = SessionRecord::new(id.as_str());
    b.manager.destroy_session(&mut ctx, &record).unwrap().await.unwrap();
    settle().await;

    assert_eq!(ctx.session_id(), None);
    assert!(!cluster.store().contains(&id));
}

#[tokio::test(start_paused = true)]
async fn test_expired_local_copy_is_rehydrated_from_durable_store() {
    let cluster = TestCluster::new(1);
    let id = sign_in(&cluster, 1, "alice").await;
    let node = cluster.node(1);

    tokio::time::sleep(Duration::from_secs(61)).await;
    settle().await;
    assert!(!node.server.probe(&id).await.stored);
    assert_eq!(node.server.stats().await.timers, 0);

    // The mock store never expires, so the owner reads it back.
    let record = node.manager.get_session(&mut request_with_session(&id)).await;
    assert_eq!(record.unwrap().get_as::<String>("user").as_deref(), Some("alice"));
    assert!(node.server.probe(&id).await.gc_armed);
}

#[tokio::test(start_paused = true)]
async fn test_session_touched_every_half_ttl_never_expires() {
    let cluster = TestCluster::without_durable(1);
    let id = sign_in(&cluster, 1, "alice").await;
    let node = cluster.node(1);

    for _ in 0..8 {
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(node.manager.get_session(&mut request_with_session(&id)).await.is_some());
    }

    tokio::time::sleep(Duration::from_secs(61)).await;
    settle().await;
    assert!(node.manager.get_session(&mut request_with_session(&id)).await.is_none());
}
