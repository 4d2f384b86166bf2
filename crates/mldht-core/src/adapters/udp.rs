//! Production UDP transport, feature-gated behind `network`.
//!
//! Grounded in the teacher's `UdpNetworkSocket` shape (a thin wrapper
//! around a bound socket implementing the outbound transport port).

use tokio::net::UdpSocket;

use crate::domain::Address;
use crate::ports::{DatagramSocket, TransportError};

pub struct TokioUdpSocket {
    socket: UdpSocket,
}

impl TokioUdpSocket {
    pub async fn bind(port: u16) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.socket.local_addr()
    }
}

impl DatagramSocket for TokioUdpSocket {
    async fn send_to(&self, bytes: &[u8], dest: Address) -> Result<(), TransportError> {
        let target = std::net::SocketAddr::new(dest.ip, dest.port);
        self.socket
            .send_to(bytes, target)
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv_from(&self) -> Result<(Vec<u8>, Address), TransportError> {
        // KRPC messages are small bencoded dicts; 2 KiB comfortably covers
        // the largest get_peers response with a full bucket of nodes.
        let mut buf = vec![0u8; 2048];
        let (len, from) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(|e| TransportError::Recv(e.to_string()))?;
        buf.truncate(len);
        Ok((buf, Address::new(from.ip(), from.port())))
    }
}
