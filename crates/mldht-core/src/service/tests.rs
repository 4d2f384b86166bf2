use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use super::*;
use crate::adapters::time::FixedClock;
use crate::config::DhtConfig;
use crate::domain::{Address, DhtError, Node, NodeId};
use crate::ports::DhtApi;
use crate::test_utils::{InMemoryNetwork, InMemorySocket};

type TestNode = DhtNode<InMemorySocket, FixedClock>;

fn addr(port: u16) -> Address {
    Address::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
}

/// Build two nodes on the same in-memory network and spawn their receive
/// loops — every test needs both running, since a node's own outbound
/// queries only complete once *its* loop reads the reply off the wire.
fn running_pair(net: &InMemoryNetwork, a_port: u16, b_port: u16) -> (Arc<TestNode>, Arc<TestNode>) {
    let a = Arc::new(DhtNode::new(
        NodeId::new([1u8; 20]),
        DhtConfig::for_testing(),
        net.bind(addr(a_port)),
        FixedClock::new(0),
    ));
    let b = Arc::new(DhtNode::new(
        NodeId::new([2u8; 20]),
        DhtConfig::for_testing(),
        net.bind(addr(b_port)),
        FixedClock::new(0),
    ));
    let a_loop = Arc::clone(&a);
    tokio::spawn(async move { a_loop.run().await });
    let b_loop = Arc::clone(&b);
    tokio::spawn(async move { b_loop.run().await });
    (a, b)
}

#[tokio::test]
async fn ping_round_trip_admits_responder() {
    let net = InMemoryNetwork::new();
    let (a, b) = running_pair(&net, 10, 11);

    let responder = a.ping(addr(11)).await.expect("ping succeeds");
    assert_eq!(responder.id, b.local_id());
    assert_eq!(a.stats().total_nodes, 1);
}

#[tokio::test]
async fn find_node_against_a_single_seed_returns_it() {
    let net = InMemoryNetwork::new();
    let (a, b) = running_pair(&net, 20, 21);

    // Seed `a`'s table directly so the lookup has somewhere to start.
    a.ping(addr(21)).await.expect("seed ping succeeds");

    let result = a
        .find_node(NodeId::new([9u8; 20]))
        .await
        .expect("lookup completes");
    assert!(result.nodes.iter().any(|n| n.id == b.local_id()));
}

#[tokio::test]
async fn get_peers_without_announced_peers_returns_nodes_and_no_peers() {
    let net = InMemoryNetwork::new();
    let (a, _b) = running_pair(&net, 30, 31);

    a.ping(addr(31)).await.expect("seed ping succeeds");

    let info_hash = NodeId::new([5u8; 20]);
    let result = a.get_peers(info_hash).await.expect("lookup completes");
    assert!(result.peers.is_empty());
    assert!(!result.tokens.is_empty());
}

#[tokio::test]
async fn get_peers_then_announce_finds_stored_peer_on_next_lookup() {
    let net = InMemoryNetwork::new();
    let (a, _b) = running_pair(&net, 40, 41);

    a.ping(addr(41)).await.expect("seed ping succeeds");

    let info_hash = NodeId::new([6u8; 20]);
    a.get_peers(info_hash).await.expect("collects a token from b");
    a.announce(info_hash, Some(6881)).await.expect("announce succeeds");

    let result = a.get_peers(info_hash).await.expect("second lookup completes");
    assert_eq!(result.peers.len(), 1);
    assert_eq!(result.peers[0].port, 6881);
}

#[tokio::test]
async fn announce_with_no_cached_token_fails_fast() {
    let net = InMemoryNetwork::new();
    let (a, _b) = running_pair(&net, 45, 46);

    a.ping(addr(46)).await.expect("seed ping succeeds");
    let result = a.announce(NodeId::new([8u8; 20]), Some(6881)).await;
    assert!(matches!(result, Err(DhtError::NoSeeds)));
}

#[tokio::test]
async fn unknown_querier_is_admitted_once_the_probation_ping_succeeds() {
    let net = InMemoryNetwork::new();
    let (a, b) = running_pair(&net, 50, 51);

    // `b` pings `a` first: from `a`'s perspective `b` is unknown, so `a`
    // both answers the ping and probes `b` back before admitting it.
    b.ping(addr(50)).await.expect("ping succeeds");

    // `b.ping` resolving only guarantees `b` got `a`'s pong; `a`'s own
    // probe ping back to `b` is a separate, still in-flight round trip
    // driven by its receive loop, so poll briefly rather than assume it
    // has landed yet.
    let admitted = async {
        loop {
            if a.stats().total_nodes == 1 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(std::time::Duration::from_secs(1), admitted)
        .await
        .expect("a admits b once its probation ping succeeds");
}

#[tokio::test]
async fn lookup_terminates_on_its_overall_deadline_even_with_no_maintenance_sweep_running() {
    let net = InMemoryNetwork::new();
    let mut config = DhtConfig::for_testing();
    config.lookup_deadline_secs = 1;
    let a = Arc::new(DhtNode::new(
        NodeId::new([1u8; 20]),
        config,
        net.bind(addr(55)),
        FixedClock::new(0),
    ));
    let a_loop = Arc::clone(&a);
    tokio::spawn(async move { a_loop.run().await });

    // Seed the table with an address nobody is listening on. With no
    // maintenance sweep running to expire the resulting transaction's own
    // deadline, only `run_lookup`'s overall deadline can make this return.
    {
        let mut engine = a.engine.lock().expect("engine mutex poisoned");
        let now = engine.now();
        engine.routing_table.offer(Node::new(NodeId::new([9u8; 20]), addr(56), now), now);
    }

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(3),
        a.find_node(NodeId::new([5u8; 20])),
    )
    .await
    .expect("lookup returns promptly once its own deadline elapses");
    assert!(result.is_ok());
}

#[tokio::test]
async fn successful_announce_emits_a_peer_announced_event() {
    let net = InMemoryNetwork::new();
    let (a, b) = running_pair(&net, 60, 61);

    a.ping(addr(61)).await.expect("seed ping succeeds");

    let mut events = b.subscribe();
    let info_hash = NodeId::new([4u8; 20]);
    a.get_peers(info_hash).await.expect("collects a token from b");
    a.announce(info_hash, Some(6882)).await.expect("announce succeeds");

    let event = tokio::time::timeout(std::time::Duration::from_secs(1), events.recv())
        .await
        .expect("b emits an event in time")
        .expect("channel stays open");
    match event {
        DhtEvent::PeerAnnounced { infohash, peer } => {
            assert_eq!(infohash, info_hash);
            assert_eq!(peer.port, 6882);
        }
        other => panic!("expected PeerAnnounced, got {other:?}"),
    }
}
