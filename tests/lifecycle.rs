//! Lifecycle controller against an in-memory control plane

mod common;

use common::FakeControlPlane;
use kvconsole::client::NodeRecord;
use kvconsole::{Error, LifecycleController, NodeRole, NodeStatus, Registry};
use std::sync::Arc;
use std::time::Duration;

fn controller() -> (LifecycleController, Arc<FakeControlPlane>) {
    let control = Arc::new(FakeControlPlane::new());
    let lifecycle = LifecycleController::new(Registry::shared(), control.clone());
    (lifecycle, control)
}

#[tokio::test]
async fn first_node_is_leader_and_later_nodes_peer_with_it() {
    let (lifecycle, control) = controller();

    let first = lifecycle.add_node(8000).await.unwrap();
    assert_eq!(first.role, NodeRole::Leader);
    assert_eq!(first.status, NodeStatus::Starting);
    assert_eq!(first.pid, Some(1000));

    let second = lifecycle.add_node(8001).await.unwrap();
    assert_eq!(second.role, NodeRole::Follower);

    let started = control.started.lock().unwrap().clone();
    assert!(started[0].peers.is_empty());
    assert_eq!(started[1].peers, vec![8000]);
    assert_eq!(started[1].role, NodeRole::Follower);

    let registry = lifecycle.registry().read().unwrap();
    assert_eq!(registry.ports(), vec![8000, 8001]);
}

#[tokio::test]
async fn duplicate_port_is_rejected_without_network_calls() {
    let (lifecycle, control) = controller();
    lifecycle.add_node(8001).await.unwrap();
    let calls_before = control.calls();

    let err = lifecycle.add_node(8001).await.unwrap_err();
    assert!(matches!(err, Error::DuplicatePort(8001)));
    assert_eq!(control.calls(), calls_before);
    assert_eq!(lifecycle.registry().read().unwrap().len(), 1);
}

#[tokio::test]
async fn out_of_range_port_is_rejected_without_network_calls() {
    let (lifecycle, control) = controller();

    for port in [7999, 8080, 80] {
        let err = lifecycle.add_node(port).await.unwrap_err();
        assert!(matches!(err, Error::PortOutOfRange { .. }), "{port}: {err}");
    }
    assert_eq!(control.calls(), 0);

    assert!(lifecycle.add_node(8079).await.is_ok());
}

#[tokio::test]
async fn failed_start_leaves_registry_unchanged() {
    let (lifecycle, control) = controller();
    lifecycle.add_node(8000).await.unwrap();
    control.set_down(true);

    let err = lifecycle.add_node(8001).await.unwrap_err();
    assert!(matches!(err, Error::LifecycleUnavailable(_)));
    assert_eq!(lifecycle.registry().read().unwrap().ports(), vec![8000]);
}

#[tokio::test]
async fn remove_node_only_after_acknowledgement() {
    let (lifecycle, control) = controller();
    lifecycle.add_node(8000).await.unwrap();
    lifecycle.add_node(8001).await.unwrap();

    control.set_down(true);
    let err = lifecycle.remove_node(8001).await.unwrap_err();
    assert!(matches!(err, Error::LifecycleUnavailable(_)));
    let kept = lifecycle.registry().read().unwrap().get(8001).unwrap();
    assert_eq!(kept.role, NodeRole::Follower);
    assert_eq!(kept.pid, Some(1001));

    control.set_down(false);
    let removed = lifecycle.remove_node(8001).await.unwrap();
    assert_eq!(removed.port, 8001);
    assert_eq!(*control.killed.lock().unwrap(), vec![8001]);
    assert_eq!(lifecycle.registry().read().unwrap().ports(), vec![8000]);
}

#[tokio::test]
async fn refused_stop_is_a_failure() {
    let (lifecycle, control) = controller();
    lifecycle.add_node(8000).await.unwrap();
    // the process vanished behind the console's back
    control.listed.lock().unwrap().clear();

    let err = lifecycle.remove_node(8000).await.unwrap_err();
    match err {
        Error::LifecycleUnavailable(reason) => assert!(reason.contains("does not exist")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(lifecycle.registry().read().unwrap().contains(8000));
}

#[tokio::test]
async fn sync_reconciles_with_control_plane() {
    let (lifecycle, control) = controller();
    lifecycle.add_node(8000).await.unwrap();
    lifecycle.add_node(8001).await.unwrap();

    *control.listed.lock().unwrap() = vec![
        NodeRecord {
            port: 8000,
            pid: Some(1000),
            status: None,
        },
        NodeRecord {
            port: 8005,
            pid: Some(77),
            status: None,
        },
    ];

    let nodes = lifecycle.sync().await.unwrap();
    let ports: Vec<u16> = nodes.iter().map(|n| n.port).collect();
    assert_eq!(ports, vec![8000, 8005]);

    let registry = lifecycle.registry().read().unwrap();
    assert_eq!(registry.get(8000).unwrap().role, NodeRole::Leader);
    assert_eq!(registry.get(8000).unwrap().status, NodeStatus::Running);
    assert_eq!(registry.get(8005).unwrap().role, NodeRole::Follower);
    assert_eq!(registry.get(8005).unwrap().pid, Some(77));
}

#[tokio::test]
async fn sync_into_empty_registry_marks_first_listed_as_leader() {
    let (lifecycle, control) = controller();
    *control.listed.lock().unwrap() = vec![
        NodeRecord {
            port: 8002,
            pid: Some(3),
            status: None,
        },
        NodeRecord {
            port: 8000,
            pid: Some(1),
            status: None,
        },
    ];

    lifecycle.sync().await.unwrap();
    let registry = lifecycle.registry().read().unwrap();
    assert_eq!(registry.get(8002).unwrap().role, NodeRole::Leader);
    assert_eq!(registry.get(8000).unwrap().role, NodeRole::Follower);
}

#[tokio::test]
async fn failed_sync_keeps_registry() {
    let (lifecycle, control) = controller();
    lifecycle.add_node(8000).await.unwrap();
    control.set_down(true);

    assert!(matches!(
        lifecycle.sync().await,
        Err(Error::LifecycleUnavailable(_))
    ));
    assert_eq!(lifecycle.registry().read().unwrap().ports(), vec![8000]);
}

#[tokio::test]
async fn overlapping_adds_of_one_port_start_it_once() {
    let (lifecycle, control) = controller();
    *control.start_delay.lock().unwrap() = Some(Duration::from_millis(20));

    let (a, b) = tokio::join!(lifecycle.add_node(8001), lifecycle.add_node(8001));
    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    let rejected = if a.is_err() { a } else { b };
    assert!(matches!(rejected, Err(Error::DuplicatePort(8001))));
    assert_eq!(control.started.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn overlapping_adds_into_empty_cluster_pick_one_leader() {
    let (lifecycle, control) = controller();
    *control.start_delay.lock().unwrap() = Some(Duration::from_millis(20));

    let (a, b) = tokio::join!(lifecycle.add_node(8000), lifecycle.add_node(8001));
    let mut roles = vec![a.unwrap().role, b.unwrap().role];
    roles.sort_by_key(|r| *r == NodeRole::Follower);
    assert_eq!(roles, vec![NodeRole::Leader, NodeRole::Follower]);

    let started = control.started.lock().unwrap().clone();
    assert!(started[0].peers.is_empty());
    assert_eq!(started[1].peers, vec![started[0].port]);
}

#[tokio::test]
async fn sync_keeps_observed_unreachable_status() {
    let (lifecycle, _control) = controller();
    lifecycle.add_node(8000).await.unwrap();
    lifecycle.add_node(8001).await.unwrap();
    lifecycle
        .registry()
        .write()
        .unwrap()
        .observe(8001, NodeStatus::Unreachable);

    lifecycle.sync().await.unwrap();
    let registry = lifecycle.registry().read().unwrap();
    assert_eq!(registry.get(8000).unwrap().status, NodeStatus::Running);
    assert_eq!(registry.get(8001).unwrap().status, NodeStatus::Unreachable);
    assert_eq!(registry.get(8001).unwrap().pid, Some(1001));
}
