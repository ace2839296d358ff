//! UDP socket construction with kernel buffer sizing

use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use xrlink_core::XrlinkResult;

/// Requested kernel buffer sizes; `None` keeps the OS default
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BufferSizes {
    pub send: Option<usize>,
    pub recv: Option<usize>,
}

/// Bind a non-blocking UDP socket and hand it to tokio.
///
/// Must be called from within a runtime. A buffer size the OS refuses is
/// logged and ignored.
pub(crate) fn bind_udp(addr: SocketAddr, sizes: BufferSizes) -> XrlinkResult<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;

    if let Some(size) = sizes.send {
        match socket.set_send_buffer_size(size) {
            Ok(()) => debug!(requested = size, actual = ?socket.send_buffer_size().ok(), "send buffer sized"),
            Err(e) => warn!(requested = size, error = %e, "could not enlarge send buffer"),
        }
    }
    if let Some(size) = sizes.recv {
        match socket.set_recv_buffer_size(size) {
            Ok(()) => debug!(requested = size, actual = ?socket.recv_buffer_size().ok(), "receive buffer sized"),
            Err(e) => warn!(requested = size, error = %e, "could not enlarge receive buffer"),
        }
    }

    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}
