use std::fmt;
use std::sync::Arc;

use tokio::net::TcpStream;

use crate::raw_packet::PacketKind;

/// Opaque identity of a destination socket.
///
/// Derived from the shared socket allocation, so every clone of the same
/// `TcpAddress` yields the same id. The transport identifies peers by this
/// handle equality and nothing else; the session layer matches replies to
/// origins the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketId(usize);

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "socket:{:#x}", self.0)
    }
}

/// A pre-established TCP connection handed to the transmitter, together
/// with the packet kind carried on it.
///
/// The connection is borrowed: the transmitter reads and writes it and may
/// drop it from the destination set on a fatal stream error, but closing
/// the socket stays the caller's responsibility. A session layer that
/// wants RTP/RTCP demultiplexed opens one connection per kind and tags
/// each address accordingly; untagged connections deliver `Unknown`
/// packets for the session layer to re-classify.
#[derive(Debug, Clone)]
pub struct TcpAddress {
    stream: Arc<TcpStream>,
    kind: PacketKind,
}

impl TcpAddress {
    pub fn new(stream: Arc<TcpStream>) -> Self {
        TcpAddress {
            stream,
            kind: PacketKind::Unknown,
        }
    }

    pub fn with_kind(stream: Arc<TcpStream>, kind: PacketKind) -> Self {
        TcpAddress { stream, kind }
    }

    pub fn socket_id(&self) -> SocketId {
        SocketId(Arc::as_ptr(&self.stream) as usize)
    }

    pub fn stream(&self) -> &Arc<TcpStream> {
        &self.stream
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }
}

/// Transport address seam of the transmitter contract. Operations handed
/// a variant their transmitter does not implement report
/// `ErrInvalidAddressType`.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum RtpAddress {
    Tcp(TcpAddress),
}
