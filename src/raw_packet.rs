use bytes::Bytes;

use crate::address::RtpAddress;
use crate::time::RtpTime;

/// Classification of a delivered payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Rtp,
    Rtcp,
    Unknown,
}

impl PacketKind {
    /// Best-effort classification by payload inspection, for session
    /// layers that receive `Unknown` packets from an untagged connection.
    ///
    /// The first byte must fall in the RTP/RTCP range of RFC 7983
    /// (128..=191); within that range the RTCP packet-type octet
    /// (192..=223) separates the two.
    pub fn infer(payload: &[u8]) -> PacketKind {
        if payload.len() < 2 || !(128..=191).contains(&payload[0]) {
            return PacketKind::Unknown;
        }
        if payload.len() >= 4 && (192..=223).contains(&payload[1]) {
            PacketKind::Rtcp
        } else {
            PacketKind::Rtp
        }
    }
}

/// A fully framed packet delivered by a transmitter.
///
/// Immutable once queued; ownership transfers to the caller on dequeue.
/// The source address carries the socket the payload arrived on.
#[derive(Debug)]
pub struct RawPacket {
    payload: Bytes,
    source: RtpAddress,
    receive_time: RtpTime,
    kind: PacketKind,
}

impl RawPacket {
    pub fn new(payload: Bytes, source: RtpAddress, receive_time: RtpTime, kind: PacketKind) -> Self {
        RawPacket {
            payload,
            source,
            receive_time,
            kind,
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn source(&self) -> &RtpAddress {
        &self.source
    }

    pub fn receive_time(&self) -> RtpTime {
        self.receive_time
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }
}
