//! End-to-end scenarios S1-S6, driven over real loopback QUIC via
//! [`crate::harness::TestMesh`].

use std::time::Duration;

use tangram_protocol::NO_PLAYER;

use crate::harness::{sample_config, wait_until, TestMesh};

#[tokio::test]
async fn s1_solo_obtain() {
    let mesh = TestMesh::spawn(1, sample_config(false)).await.unwrap();
    let node = &mesh.nodes[0];

    let ok = node.replication.obtain(1, false).await.unwrap();
    assert!(ok);
    {
        let state = node.snapshot().await;
        let tile = state.get_tan(1).unwrap();
        assert_eq!(tile.owner, node.self_id);
        assert_eq!(tile.clock.time(), 1);
    }

    let ok = node.replication.obtain(1, true).await.unwrap();
    assert!(ok);
    let state = node.snapshot().await;
    let tile = state.get_tan(1).unwrap();
    assert_eq!(tile.owner, NO_PLAYER);
    assert_eq!(tile.clock.time(), 2);

    mesh.shutdown().await;
}

#[tokio::test]
async fn s2_uncontested_join() {
    let mesh = TestMesh::spawn(2, sample_config(false)).await.unwrap();

    let converged = wait_until(Duration::from_secs(3), || async {
        mesh.nodes[1].snapshot().await.peers.len() == 2
    })
    .await;
    assert!(converged, "joining peer never saw both peers");

    let a_state = mesh.nodes[0].snapshot().await;
    let b_state = mesh.nodes[1].snapshot().await;
    assert_eq!(a_state.tiles.len(), b_state.tiles.len());
    for a_tile in &a_state.tiles {
        let b_tile = b_state.get_tan(a_tile.id).unwrap();
        assert_eq!(a_tile.location, b_tile.location);
        assert_eq!(a_tile.rotation, b_tile.rotation);
    }

    mesh.shutdown().await;
}

#[tokio::test]
async fn s3_contested_lock_converges_on_same_winner() {
    let mesh = TestMesh::spawn(2, sample_config(false)).await.unwrap();

    let settled = wait_until(Duration::from_secs(3), || async {
        mesh.nodes[1].snapshot().await.peers.len() == 2
    })
    .await;
    assert!(settled, "peers never saw each other before the contested call");

    let (r0, r1) = tokio::join!(
        mesh.nodes[0].replication.obtain(1, false),
        mesh.nodes[1].replication.obtain(1, false),
    );
    r0.unwrap();
    r1.unwrap();

    let converged = wait_until(Duration::from_secs(3), || async {
        let a = mesh.nodes[0].snapshot().await;
        let b = mesh.nodes[1].snapshot().await;
        let a_owner = a.get_tan(1).unwrap().owner;
        let b_owner = b.get_tan(1).unwrap().owner;
        a_owner != NO_PLAYER && a_owner == b_owner
    })
    .await;
    assert!(converged, "both peers did not converge on the same tile owner");

    mesh.shutdown().await;
}

async fn all_peers_joined(mesh: &TestMesh, n: usize) -> bool {
    for node in &mesh.nodes {
        if node.snapshot().await.peers.len() != n {
            return false;
        }
    }
    true
}

#[tokio::test]
async fn s4_move_propagates_to_all_peers() {
    let mesh = TestMesh::spawn(3, sample_config(false)).await.unwrap();

    let joined = wait_until(Duration::from_secs(4), || all_peers_joined(&mesh, 3)).await;
    assert!(joined, "mesh never fully joined");

    mesh.nodes[0].replication.obtain(1, false).await.unwrap();
    mesh.nodes[0]
        .replication
        .move_tan(1, tangram_state::Point::new(100, 100), 45)
        .await
        .unwrap();

    let target = tangram_state::Point::new(100, 100);
    let converged = wait_until(Duration::from_secs(4), || async {
        mesh.nodes[1].snapshot().await.get_tan(1).unwrap().location == target
            && mesh.nodes[2].snapshot().await.get_tan(1).unwrap().location == target
    })
    .await;
    assert!(converged, "move did not propagate to all peers");

    for node in &mesh.nodes {
        let state = node.snapshot().await;
        let tile = state.get_tan(1).unwrap();
        assert_eq!(tile.location, target);
        assert_eq!(tile.rotation, 45);
    }

    mesh.shutdown().await;
}

#[tokio::test]
async fn s5_host_loss_triggers_election_and_peers_converge() {
    let mesh = TestMesh::spawn(3, sample_config(true)).await.unwrap();

    let joined = wait_until(Duration::from_secs(4), || async {
        mesh.nodes[1].snapshot().await.peers.len() == 3
            && mesh.nodes[2].snapshot().await.peers.len() == 3
    })
    .await;
    assert!(joined, "mesh never fully joined before the host was killed");

    let original_host = mesh.nodes[0].self_id;
    let mut nodes = mesh.nodes;
    let dead = nodes.remove(0);
    dead.shutdown().await;

    let converged = wait_until(Duration::from_secs(12), || async {
        let b_host = nodes[0].snapshot().await.host;
        let c_host = nodes[1].snapshot().await.host;
        b_host != original_host && b_host != NO_PLAYER && b_host == c_host
    })
    .await;
    assert!(converged, "surviving peers never converged on a new host");

    for node in nodes {
        node.shutdown().await;
    }
}

#[tokio::test]
async fn s6_stale_move_is_dropped() {
    let mesh = TestMesh::spawn(1, sample_config(false)).await.unwrap();
    let node = &mesh.nodes[0];

    node.replication
        .move_tan_remote(1, tangram_state::Point::new(50, 50), 10, 5)
        .await
        .unwrap();
    {
        let state = node.snapshot().await;
        let tile = state.get_tan(1).unwrap();
        assert_eq!(tile.location, tangram_state::Point::new(50, 50));
        assert_eq!(tile.clock.time(), 5);
    }

    // A stale move at an earlier logical time must be a no-op.
    node.replication
        .move_tan_remote(1, tangram_state::Point::new(0, 0), 99, 3)
        .await
        .unwrap();
    let state = node.snapshot().await;
    let tile = state.get_tan(1).unwrap();
    assert_eq!(tile.location, tangram_state::Point::new(50, 50));
    assert_eq!(tile.rotation, 10);
    assert_eq!(tile.clock.time(), 5);

    mesh.shutdown().await;
}
