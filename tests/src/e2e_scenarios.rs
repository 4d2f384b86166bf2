//! The seven end-to-end scenarios.

use std::net::{IpAddr, Ipv4Addr};

use mldht_core::adapters::time::FixedClock;
use mldht_core::config::DhtConfig;
use mldht_core::domain::{Address, Node, NodeId, RateLimiter, Timestamp};
use mldht_core::engine::KrpcEngine;
use mldht_core::ports::DhtApi;
use mldht_core::service::DhtNode;
use mldht_core::test_utils::InMemoryNetwork;
use mldht_core::wire::{self, Message, MessageBody, QueryArgs, ResponseValues};

/// Node ids in this module are small integers per the literal scenarios;
/// the value occupies the low 8 bytes of the 160-bit id, the rest zero.
fn id(n: u64) -> NodeId {
    let mut bytes = [0u8; 20];
    bytes[12..20].copy_from_slice(&n.to_be_bytes());
    NodeId::new(bytes)
}

fn addr(octet: u8, port: u16) -> Address {
    Address::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, octet)), port)
}

fn engine_at(local: NodeId) -> KrpcEngine<FixedClock> {
    KrpcEngine::new(local, DhtConfig::for_testing(), FixedClock::new(0))
}

fn decode_response(bytes: &[u8]) -> ResponseValues {
    match Message::decode(bytes).unwrap().body {
        MessageBody::Response(values) => values,
        other => panic!("expected a response, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_1_ping_round_trip_admits_the_responder() {
    let net = InMemoryNetwork::new();
    let local = DhtNode::new(
        id(1 << 50),
        DhtConfig::for_testing(),
        net.bind(addr(1, 9001)),
        FixedClock::new(0),
    );
    let stub = DhtNode::new(
        id(42),
        DhtConfig::for_testing(),
        net.bind(addr(1, 9000)),
        FixedClock::new(0),
    );
    tokio::spawn(async move { stub.run().await });

    let responder = local.ping(addr(1, 9000)).await.expect("ping succeeds");
    assert_eq!(responder.id, id(42));
    assert_eq!(responder.stats.successful, 1, "a valid response records a success");

    let stats = local.stats();
    assert_eq!(stats.total_nodes, 1);
}

#[test]
fn scenario_2_find_node_returns_the_closest_seed_first() {
    let mut engine = engine_at(id(75));
    let now = engine.now();
    // Seeding id(77) first guarantees it claims a bucket slot before any
    // of the other 99 ids can contend for the same one; `offer` never
    // evicts a resident to admit a newcomer, only the other way around.
    engine.routing_table.offer(Node::new(id(77), addr(1, 10_077), now), now);
    for n in 0..100u64 {
        engine.routing_table.offer(Node::new(id(n), addr(1, 10_000 + n as u16), now), now);
    }

    let args = QueryArgs {
        id: wire::encode_id(&id(200)),
        target: Some(wire::encode_id(&id(77))),
        ..Default::default()
    };
    let query = Message::query(vec![b'a', b'a'], "find_node", args);
    let bytes = query.encode().unwrap();

    let inbound = engine.on_datagram(&bytes, addr(2, 9999));
    let (_, reply_bytes) = inbound.reply.expect("reply sent");
    let values = decode_response(&reply_bytes);
    let nodes = wire::compact::decode_nodes(values.nodes.as_ref().unwrap()).unwrap();
    assert_eq!(nodes.first(), Some(&(id(77), addr(1, 10_077))));
}

#[test]
fn scenario_3_get_peers_with_stored_peers_returns_values_and_a_token() {
    let mut engine = engine_at(id(75));
    let now = engine.now();
    let info_hash = id(77);
    for p in 0..10u8 {
        engine.peer_store.put(info_hash, addr(p, 6881), now);
    }

    let querier = addr(250, 9999);
    let args = QueryArgs {
        id: wire::encode_id(&id(200)),
        info_hash: Some(wire::encode_id(&info_hash)),
        ..Default::default()
    };
    let query = Message::query(vec![b'b', b'b'], "get_peers", args);
    let bytes = query.encode().unwrap();

    let inbound = engine.on_datagram(&bytes, querier);
    let (_, reply_bytes) = inbound.reply.expect("reply sent");
    let values = decode_response(&reply_bytes);

    assert!(values.token.is_some());
    assert!(values.nodes.is_none());
    let peer_values: Vec<Vec<u8>> = values.values.unwrap().into_iter().map(|b| b.to_vec()).collect();
    assert_eq!(wire::compact::decode_peers(&peer_values).unwrap().len(), 10);
}

#[test]
fn scenario_4_get_peers_without_stored_peers_returns_nodes_and_a_token() {
    let mut engine = engine_at(id(75));
    let now = engine.now();
    engine.routing_table.offer(Node::new(id(5), addr(5, 6881), now), now);

    let args = QueryArgs {
        id: wire::encode_id(&id(200)),
        info_hash: Some(wire::encode_id(&id(77))),
        ..Default::default()
    };
    let query = Message::query(vec![b'c', b'c'], "get_peers", args);
    let bytes = query.encode().unwrap();

    let inbound = engine.on_datagram(&bytes, addr(250, 9999));
    let (_, reply_bytes) = inbound.reply.expect("reply sent");
    let values = decode_response(&reply_bytes);

    assert!(values.token.is_some());
    assert!(values.values.is_none());
    assert!(values.nodes.is_some());
}

#[test]
fn scenario_5_announce_with_the_token_from_get_peers_is_then_visible() {
    let mut engine = engine_at(id(75));
    let info_hash = id(77);
    let announcer = addr(1, 8888);

    let get_peers_args = QueryArgs {
        id: wire::encode_id(&id(200)),
        info_hash: Some(wire::encode_id(&info_hash)),
        ..Default::default()
    };
    let get_peers_bytes = Message::query(vec![b'd', b'd'], "get_peers", get_peers_args)
        .encode()
        .unwrap();
    let inbound = engine.on_datagram(&get_peers_bytes, announcer);
    let values = decode_response(&inbound.reply.unwrap().1);
    let token = values.token.unwrap();

    let announce_args = QueryArgs {
        id: wire::encode_id(&id(200)),
        info_hash: Some(wire::encode_id(&info_hash)),
        port: Some(55),
        token: Some(token),
        ..Default::default()
    };
    let announce_bytes = Message::query(vec![b'e', b'e'], "announce_peer", announce_args)
        .encode()
        .unwrap();
    let inbound = engine.on_datagram(&announce_bytes, announcer);
    assert!(inbound.reply.is_some(), "a valid token is acknowledged");

    let second_get_peers = Message::query(
        vec![b'f', b'f'],
        "get_peers",
        QueryArgs {
            id: wire::encode_id(&id(9)),
            info_hash: Some(wire::encode_id(&info_hash)),
            ..Default::default()
        },
    )
    .encode()
    .unwrap();
    let inbound = engine.on_datagram(&second_get_peers, addr(2, 7000));
    let values = decode_response(&inbound.reply.unwrap().1);
    let peer_values: Vec<Vec<u8>> = values.values.unwrap().into_iter().map(|b| b.to_vec()).collect();
    assert_eq!(wire::compact::decode_peers(&peer_values).unwrap(), vec![addr(1, 55)]);
}

#[test]
fn scenario_6_announce_with_an_invalid_token_is_dropped_and_leaves_no_peer() {
    let mut engine = engine_at(id(75));
    let info_hash = id(77);
    let announcer = addr(1, 8888);

    let announce_args = QueryArgs {
        id: wire::encode_id(&id(200)),
        info_hash: Some(wire::encode_id(&info_hash)),
        port: Some(55),
        token: Some(serde_bytes::ByteBuf::from(vec![0xffu8; 8])),
        ..Default::default()
    };
    let announce_bytes = Message::query(vec![b'g', b'g'], "announce_peer", announce_args)
        .encode()
        .unwrap();
    let inbound = engine.on_datagram(&announce_bytes, announcer);
    assert!(inbound.reply.is_none(), "an invalid token gets no reply, not an error oracle");

    let get_peers_bytes = Message::query(
        vec![b'h', b'h'],
        "get_peers",
        QueryArgs {
            id: wire::encode_id(&id(9)),
            info_hash: Some(wire::encode_id(&info_hash)),
            ..Default::default()
        },
    )
    .encode()
    .unwrap();
    let inbound = engine.on_datagram(&get_peers_bytes, addr(2, 7000));
    let values = decode_response(&inbound.reply.unwrap().1);
    assert!(values.values.is_none());
}

#[test]
fn scenario_7_rate_limiter_drops_the_fourth_distinct_host_until_refill() {
    // host_bandwidth_rate = 1 packet, global = 3 packets, matching the
    // `DhtConfig` fields `KrpcEngine::start_query` consults.
    let mut limiter = RateLimiter::new(3, 3, 1, 1, Timestamp::new(0));
    for n in 1..=3u8 {
        assert!(limiter.consume(addr(n, 6881), 1, Timestamp::new(0)));
    }
    assert!(!limiter.consume(addr(4, 6881), 1, Timestamp::new(0)));
    assert!(limiter.consume(addr(4, 6881), 1, Timestamp::new(1)));
}
