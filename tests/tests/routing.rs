//! Cross-node routing tests.
//!
//! Every node reaches every other through the in-process bus; nothing here
//! times out, so no failover is involved.

use integration_tests::fixtures::CLIENT_HOST;
use integration_tests::setup::{base_config, fresh_request, request_with_session};
use integration_tests::{settle, DurableCall, TestCluster};
use session_core::{IdCodec, SessionConfig};

/// Creates a session on `node_id` holding `user` and returns its id.
async fn sign_in(cluster: &TestCluster, node_id: u32, user: &str) -> String {
    let node = cluster.node(node_id);
    let mut ctx = fresh_request();
    let mut record = node.manager.start_session(&mut ctx);
    record.set("user", user);
    assert!(node.manager.save_session_data(Some(&mut record)).await);
    record.id
}

#[tokio::test]
async fn test_new_session_is_owned_by_creating_node() {
    let cluster = TestCluster::new(3);
    let node = cluster.node(2);

    let record = node.manager.start_session(&mut fresh_request());
    let detail = node.manager.session_detail(&record.id).unwrap();
    assert_eq!(detail.node_id, 2);
    assert_eq!(detail.client_host, CLIENT_HOST);

    // Routing is a pure function of the id.
    let codec = IdCodec::from_secret(integration_tests::setup::TEST_SECRET);
    assert_eq!(codec.owner_of(&record.id).unwrap(), 2);
    assert_eq!(codec.owner_of(&record.id).unwrap(), 2);
    assert_eq!(
        cluster.node(1).manager.address_for(&record.id).as_deref(),
        Some("Tests.Cluster.session.server2")
    );
}

#[tokio::test]
async fn test_session_created_on_a_is_readable_from_b() {
    let cluster = TestCluster::new(2);
    let id = sign_in(&cluster, 1, "alice").await;

    let mut ctx = request_with_session(&id);
    let record = cluster.node(2).manager.get_session(&mut ctx).await.unwrap();

    assert_eq!(record.id, id);
    assert_eq!(record.get_as::<String>("user").as_deref(), Some("alice"));
    // Served by the owner, so nothing moved and no cookie was rewritten.
    assert!(ctx.jar.outgoing().is_empty());
    assert!(!cluster.node(2).server.probe(&id).await.stored);
    assert!(cluster.node(1).server.probe(&id).await.stored);
}

#[tokio::test]
async fn test_save_from_other_node_lands_on_owner() {
    let cluster = TestCluster::new(2);
    let id = sign_in(&cluster, 1, "alice").await;

    let b = cluster.node(2);
    let mut record = b.manager.get_session(&mut request_with_session(&id)).await.unwrap();
    record.set("theme", "dark");
    assert!(b.manager.save_session_data(Some(&mut record)).await);

    let a = cluster.node(1);
    let record = a.manager.get_session(&mut request_with_session(&id)).await.unwrap();
    assert_eq!(record.get_as::<String>("theme").as_deref(), Some("dark"));
    assert_eq!(record.get_as::<String>("user").as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_destroy_from_other_node_removes_session_everywhere() {
    let cluster = TestCluster::new(3);
    let id = sign_in(&cluster, 1, "alice").await;
    settle().await;
    assert!(cluster.store().contains(&id));

    let b = cluster.node(2);
    let mut ctx = request_with_session(&id);
    let record = b.manager.get_session(&mut ctx).await.unwrap();
    b.manager.destroy_session(&mut ctx, &record).unwrap().await.unwrap();
    settle().await;

    assert!(!cluster.node(1).server.probe(&id).await.stored);
    assert!(!cluster.store().contains(&id));
    for node_id in 1..=3 {
        let node = cluster.node(node_id);
        assert!(node.manager.get_session(&mut request_with_session(&id)).await.is_none());
    }
}

#[tokio::test]
async fn test_save_is_mirrored_to_durable_store() {
    let cluster = TestCluster::new(1);
    let id = sign_in(&cluster, 1, "alice").await;
    settle().await;

    let stored = cluster.store().value(&id).unwrap();
    assert!(stored.contains("alice"));
    assert!(cluster.store().calls().contains(&DurableCall::Setex(id)));
}

#[tokio::test]
async fn test_local_hit_refreshes_durable_expiry() {
    let cluster = TestCluster::new(1);
    let id = sign_in(&cluster, 1, "alice").await;
    settle().await;
    cluster.store().clear_calls();

    let node = cluster.node(1);
    assert!(node.manager.get_session(&mut request_with_session(&id)).await.is_some());
    settle().await;

    assert_eq!(cluster.store().calls(), vec![DurableCall::Expire(id)]);
}

#[tokio::test]
async fn test_durable_mirror_failure_does_not_fail_save() {
    let cluster = TestCluster::new(1);
    cluster.store().set_should_fail(true);

    let id = sign_in(&cluster, 1, "alice").await;
    settle().await;

    assert!(!cluster.store().contains(&id));
    let record = cluster.node(1).manager.get_session(&mut request_with_session(&id)).await;
    assert_eq!(record.unwrap().get_as::<String>("user").as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_cookie_from_other_cluster_is_ignored() {
    let cluster = TestCluster::new(1);
    let foreign = IdCodec::from_secret("some-other-secret").generate(1, CLIENT_HOST);

    let node = cluster.node(1);
    let mut ctx = request_with_session(foreign.as_str());
    assert!(node.manager.has_session_cookie(&ctx));
    assert!(node.manager.get_session(&mut ctx).await.is_none());
    assert!(node.manager.address_for(foreign.as_str()).is_none());
}

#[tokio::test]
async fn test_destroy_all_clears_one_node() {
    let cluster = TestCluster::new(2);
    sign_in(&cluster, 1, "alice").await;
    sign_in(&cluster, 1, "bob").await;
    let carol = sign_in(&cluster, 2, "carol").await;

    assert_eq!(cluster.node(1).server.destroy_all().await, 2);
    assert_eq!(cluster.node(1).server.stats().await.timers, 0);
    assert!(cluster.node(2).server.probe(&carol).await.stored);
}

#[tokio::test]
async fn test_address_override_pins_sessions_to_one_server() {
    let config = SessionConfig {
        address: Some("sessions.pinned".into()),
        ..base_config()
    };
    let cluster = TestCluster::with_config(1, config);
    let node = cluster.node(1);
    assert_eq!(node.address(), "sessions.pinned");

    let id = sign_in(&cluster, 1, "alice").await;
    assert_eq!(node.manager.address_for(&id).as_deref(), Some("sessions.pinned"));
    assert!(node.manager.get_session(&mut request_with_session(&id)).await.is_some());
}
