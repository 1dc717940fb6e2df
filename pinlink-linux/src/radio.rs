//! LAN link: one UDP datagram per frame, broadcast to a shared port. No delivery reports.

use std::net::{Ipv4Addr, SocketAddr, UdpSocket as StdUdpSocket};

use pinlink_core::{LinkHandle, Transport};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

pub struct UdpRadio {
    socket: StdUdpSocket,
    broadcast: SocketAddr,
}

impl UdpRadio {
    /// Bind the shared port. Returns the sending half and a socket for `recv_loop`.
    pub fn bind(port: u16, broadcast: Ipv4Addr) -> std::io::Result<(Self, UdpSocket)> {
        let socket = StdUdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))?;
        socket.set_broadcast(true)?;
        let recv = socket.try_clone()?;
        // The clone shares the flag: a full send buffer shows up as a refused send.
        recv.set_nonblocking(true)?;
        let radio = Self {
            socket,
            broadcast: SocketAddr::from((broadcast, port)),
        };
        Ok((radio, UdpSocket::from_std(recv)?))
    }

    fn send_to(&self, to: SocketAddr, bytes: &[u8]) -> bool {
        match self.socket.send_to(bytes, to) {
            Ok(_) => true,
            Err(e) => {
                debug!(%to, error = %e, "udp send failed");
                false
            }
        }
    }
}

impl Transport for UdpRadio {
    type Address = SocketAddr;

    fn send(&mut self, to: &SocketAddr, bytes: &[u8]) -> bool {
        self.send_to(*to, bytes)
    }

    fn broadcast(&mut self, bytes: &[u8]) -> bool {
        self.send_to(self.broadcast, bytes)
    }
}

/// Feed every datagram into the engine's inbox. Our own broadcasts come back too; the engine
/// drops frames carrying its own board id.
pub async fn recv_loop(socket: UdpSocket, handle: LinkHandle<SocketAddr>) -> std::io::Result<()> {
    let mut buf = vec![0u8; 2048];
    loop {
        let (n, from) = socket.recv_from(&mut buf).await?;
        if !handle.on_receive(from, &buf[..n]) {
            warn!(%from, len = n, dropped = handle.dropped(), "datagram dropped before the engine saw it");
        }
    }
}
