//! Compact node/peer encoding per BEP-5: 20-byte id + 4-byte IPv4 + 2-byte
//! port for nodes; 4-byte IPv4 + 2-byte port for peer values.

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::domain::{Address, NodeId};

use super::CodecError;

/// Encode `(id, address)` pairs as a single concatenated compact-node-info
/// byte string. Non-IPv4 addresses are skipped (compact node info has no
/// IPv6 variant in the base protocol).
pub fn encode_nodes(nodes: &[(NodeId, Address)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(nodes.len() * 26);
    for (id, addr) in nodes {
        if let std::net::IpAddr::V4(ip) = addr.ip {
            out.extend_from_slice(id.as_bytes());
            out.extend_from_slice(&ip.octets());
            out.extend_from_slice(&addr.port.to_be_bytes());
        }
    }
    out
}

pub fn decode_nodes(bytes: &[u8]) -> Result<Vec<(NodeId, Address)>, CodecError> {
    if bytes.len() % 26 != 0 {
        return Err(CodecError::Malformed("compact node info length not a multiple of 26"));
    }
    let mut out = Vec::with_capacity(bytes.len() / 26);
    for chunk in bytes.chunks_exact(26) {
        let mut id_bytes = [0u8; 20];
        id_bytes.copy_from_slice(&chunk[0..20]);
        let ip = Ipv4Addr::new(chunk[20], chunk[21], chunk[22], chunk[23]);
        let port = u16::from_be_bytes([chunk[24], chunk[25]]);
        out.push((
            NodeId::new(id_bytes),
            Address::new(std::net::IpAddr::V4(ip), port),
        ));
    }
    Ok(out)
}

pub fn encode_peers(peers: &[Address]) -> Vec<Vec<u8>> {
    peers
        .iter()
        .filter_map(|addr| match addr.ip {
            std::net::IpAddr::V4(ip) => Some(encode_peer(SocketAddrV4::new(ip, addr.port))),
            std::net::IpAddr::V6(_) => None,
        })
        .collect()
}

fn encode_peer(addr: SocketAddrV4) -> Vec<u8> {
    let mut out = Vec::with_capacity(6);
    out.extend_from_slice(&addr.ip().octets());
    out.extend_from_slice(&addr.port().to_be_bytes());
    out
}

pub fn decode_peers(values: &[Vec<u8>]) -> Result<Vec<Address>, CodecError> {
    values
        .iter()
        .map(|raw| {
            if raw.len() != 6 {
                return Err(CodecError::Malformed("compact peer value must be 6 bytes"));
            }
            let ip = Ipv4Addr::new(raw[0], raw[1], raw[2], raw[3]);
            let port = u16::from_be_bytes([raw[4], raw[5]]);
            Ok(Address::new(std::net::IpAddr::V4(ip), port))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_round_trip() {
        let node = (
            NodeId::new([9u8; 20]),
            Address::new(std::net::IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)), 6881),
        );
        let encoded = encode_nodes(&[node]);
        assert_eq!(encoded.len(), 26);
        let decoded = decode_nodes(&encoded).unwrap();
        assert_eq!(decoded, vec![node]);
    }

    #[test]
    fn peer_round_trip() {
        let addr = Address::new(std::net::IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 55);
        let encoded = encode_peers(&[addr]);
        assert_eq!(encoded[0].len(), 6);
        let decoded = decode_peers(&encoded).unwrap();
        assert_eq!(decoded, vec![addr]);
    }

    #[test]
    fn malformed_node_length_rejected() {
        assert!(decode_nodes(&[0u8; 25]).is_err());
    }
}
