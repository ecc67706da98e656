pub mod tcp;

use async_trait::async_trait;

use crate::address::{RtpAddress, SocketId};
use crate::error::Result;
use crate::raw_packet::RawPacket;
use crate::time::RtpTime;

/// How a transmitter filters incoming packets by origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveMode {
    AcceptAll,
    AcceptSome,
    IgnoreSome,
}

/// Per-transport creation parameters, handed to [`RtpTransmitter::create`].
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum TransmissionParams {
    Tcp(tcp::TcpTransmissionParams),
}

/// Per-transport runtime information.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum TransmissionInfo {
    Tcp(tcp::TcpTransmissionInfo),
}

/// Hook invoked with the id of a socket that failed to send or receive.
pub type OnSocketErrorHdlrFn = Box<dyn (Fn(SocketId)) + Send + Sync>;

/// The transmission component contract consumed by the session layer.
///
/// A transmitter multiplexes RTP and RTCP traffic over a transport-specific
/// destination set, queues fully-formed inbound packets, and lets any
/// thread break a pending wait. Implementations go through `init` then
/// `create` before use; `destroy` returns them to the initialized state.
#[async_trait]
pub trait RtpTransmitter {
    async fn init(&self) -> Result<()>;
    async fn create(&self, max_pack_size: usize, params: Option<&TransmissionParams>)
        -> Result<()>;
    async fn destroy(&self);
    async fn transmission_info(&self) -> Result<TransmissionInfo>;

    async fn local_host_name(&self) -> Result<String>;
    async fn comes_from_this_transmitter(&self, addr: &RtpAddress) -> bool;
    fn header_overhead(&self) -> usize;

    /// Drains every destination socket that has buffered data without
    /// blocking, queueing any completed packets.
    async fn poll(&self) -> Result<()>;
    /// Blocks up to `delay` for incoming data, then drains ready sockets.
    /// Returns whether the inbound queue holds packets afterwards.
    async fn wait_for_incoming_data(&self, delay: RtpTime) -> Result<bool>;
    /// Makes a pending `poll`/`wait_for_incoming_data` return promptly.
    /// Callable from any thread; a no-op when no wait is in progress.
    async fn abort_wait(&self) -> Result<()>;

    async fn send_rtp_data(&self, data: &[u8]) -> Result<()>;
    async fn send_rtcp_data(&self, data: &[u8]) -> Result<()>;

    async fn add_destination(&self, addr: RtpAddress) -> Result<()>;
    async fn delete_destination(&self, addr: &RtpAddress) -> Result<()>;
    async fn clear_destinations(&self);

    fn supports_multicasting(&self) -> bool;
    async fn join_multicast_group(&self, addr: RtpAddress) -> Result<()>;
    async fn leave_multicast_group(&self, addr: &RtpAddress) -> Result<()>;
    async fn leave_all_multicast_groups(&self);

    async fn set_receive_mode(&self, mode: ReceiveMode) -> Result<()>;
    async fn add_to_ignore_list(&self, addr: RtpAddress) -> Result<()>;
    async fn delete_from_ignore_list(&self, addr: &RtpAddress) -> Result<()>;
    async fn clear_ignore_list(&self);
    async fn add_to_accept_list(&self, addr: RtpAddress) -> Result<()>;
    async fn delete_from_accept_list(&self, addr: &RtpAddress) -> Result<()>;
    async fn clear_accept_list(&self);

    async fn set_maximum_packet_size(&self, size: usize) -> Result<()>;

    async fn new_data_available(&self) -> bool;
    /// Dequeues the oldest inbound packet; ownership transfers to the
    /// caller.
    async fn get_next_packet(&self) -> Option<RawPacket>;
}
