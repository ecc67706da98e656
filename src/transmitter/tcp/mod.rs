
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use portable_atomic::AtomicBool;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use super::{
    OnSocketErrorHdlrFn, ReceiveMode, RtpTransmitter, TransmissionInfo, TransmissionParams,
};
use crate::abort::AbortChannel;
use crate::address::{RtpAddress, SocketId, TcpAddress};
use crate::error::{Error, Result};
use crate::ordered_map::OrderedMap;
use crate::raw_packet::RawPacket;
use crate::reassembler::FrameReassembler;
use crate::time::RtpTime;
use crate::wait::wait_readable;

/// Header overhead for a packet on an IPv4 TCP connection: 20 bytes IP,
/// 20 bytes TCP and the 2-byte framing length.
pub const TCP_HEADER_OVERHEAD: usize = 20 + 20 + 2;

/// Largest payload the 16-bit framing length can express.
const MAX_FRAME_PAYLOAD: usize = 65535;

/// Parameters for the TCP transmitter.
#[derive(Debug, Default, Clone)]
pub struct TcpTransmissionParams {
    /// When set, this channel is used to cancel a pending wait instead of
    /// a transmitter-owned one, which lets a single poll thread drive
    /// several sessions. A shared channel is left untouched on `destroy`.
    pub abort_channel: Option<Arc<AbortChannel>>,
}

/// Runtime information about the TCP transmitter.
#[derive(Debug, Clone)]
pub struct TcpTransmissionInfo {
    pub destination_count: usize,
    pub max_packet_size: usize,
}

struct Destination {
    addr: TcpAddress,
    reassembler: FrameReassembler,
}

#[derive(Default)]
struct TransmitterState {
    init: bool,
    created: bool,
    max_pack_size: usize,
    dest_sockets: OrderedMap<SocketId, Destination>,
    raw_packets: VecDeque<RawPacket>,
    owned_abort: Option<Arc<AbortChannel>>,
    external_abort: Option<Arc<AbortChannel>>,
    local_hostname: Option<String>,
    on_send_error: Option<OnSocketErrorHdlrFn>,
    on_receive_error: Option<OnSocketErrorHdlrFn>,
}

impl TransmitterState {
    fn abort_channel(&self) -> Option<Arc<AbortChannel>> {
        self.external_abort
            .clone()
            .or_else(|| self.owned_abort.clone())
    }
}

/// A TCP transmission component.
///
/// Multiplexes RTP and RTCP data over a set of pre-established TCP
/// connections, framing every packet per RFC 4571. Connections are added
/// with [`add_destination`](RtpTransmitter::add_destination) as
/// [`TcpAddress`] values and double as the receive side: whenever one of
/// them has buffered data, `poll`/`wait_for_incoming_data` drain it
/// through a per-connection [`FrameReassembler`] and queue the completed
/// packets. The address attached to a received packet names the socket it
/// arrived on.
///
/// A connection that fails to send or receive is reported through the
/// corresponding error hook; on receive errors the destination is removed
/// as well. The underlying socket is never closed here; that stays with
/// whoever established the connection.
pub struct TcpTransmitter {
    state: Mutex<TransmitterState>,
    // Serializes the wait itself so exactly one task at a time can block
    // in wait_readable; the state mutex is released for the duration.
    wait_lock: Mutex<()>,
    waiting: AtomicBool,
}

impl Default for TcpTransmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpTransmitter {
    pub fn new() -> Self {
        TcpTransmitter {
            state: Mutex::new(TransmitterState::default()),
            wait_lock: Mutex::new(()),
            waiting: AtomicBool::new(false),
        }
    }

    /// Installs the hook invoked when sending to a destination fails.
    /// The hook must not call back into the transmitter.
    pub async fn set_send_error_hook(&self, hook: Option<OnSocketErrorHdlrFn>) {
        self.state.lock().await.on_send_error = hook;
    }

    /// Installs the hook invoked when receiving from a destination fails,
    /// just before the destination is removed. The hook must not call
    /// back into the transmitter.
    pub async fn set_receive_error_hook(&self, hook: Option<OnSocketErrorHdlrFn>) {
        self.state.lock().await.on_receive_error = hook;
    }

    fn validate_socket(stream: &TcpStream) -> Result<()> {
        // A connected socket can always report its peer.
        stream.peer_addr().map(|_| ()).map_err(|_| Error::ErrBadSocket)
    }

    async fn send_rtp_rtcp_data(&self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.init {
            return Err(Error::ErrNotInit);
        }
        if !state.created {
            return Err(Error::ErrNotCreated);
        }
        if data.len() > MAX_FRAME_PAYLOAD {
            return Err(Error::ErrDataTooLong);
        }
        if data.len() > state.max_pack_size {
            return Err(Error::ErrDataOversized);
        }

        let mut frame = BytesMut::with_capacity(2 + data.len());
        frame.put_u16(data.len() as u16);
        frame.put_slice(data);

        let targets: Vec<(SocketId, Arc<TcpStream>)> = state
            .dest_sockets
            .iter()
            .map(|(id, d)| (id, d.addr.stream().clone()))
            .collect();

        let mut delivered = 0usize;
        let mut failed = Vec::new();
        for (id, stream) in &targets {
            match send_frame(stream, &frame).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    log::warn!("send to {id} failed: {e}");
                    failed.push(*id);
                }
            }
        }

        if let Some(hook) = &state.on_send_error {
            for id in &failed {
                hook(*id);
            }
        }

        if delivered == 0 && !failed.is_empty() {
            return Err(Error::ErrSendFailed);
        }
        Ok(())
    }

    /// Shared body of `poll` and `wait_for_incoming_data`.
    async fn poll_sockets(&self, delay: Duration) -> Result<bool> {
        let _wait_guard = self.wait_lock.lock().await;

        let (snapshot, abort) = {
            let state = self.state.lock().await;
            if !state.init {
                return Err(Error::ErrNotInit);
            }
            if !state.created {
                return Err(Error::ErrNotCreated);
            }
            let snapshot: Vec<(SocketId, Arc<TcpStream>)> = state
                .dest_sockets
                .iter()
                .map(|(id, d)| (id, d.addr.stream().clone()))
                .collect();
            // Set while the state lock is still held: abort_wait and
            // destroy take that lock before reading the flag, so neither
            // can observe it stale once the wait is pending.
            self.waiting.store(true, Ordering::SeqCst);
            (snapshot, state.abort_channel())
        };

        let mut socks: Vec<&TcpStream> = snapshot.iter().map(|(_, s)| s.as_ref()).collect();
        if let Some(ab) = &abort {
            socks.push(ab.reader());
        }

        // The state mutex is not held across the wait; destinations may be
        // added or removed and abort_wait may fire in the meantime.
        let ready = wait_readable(&socks, delay).await;
        self.waiting.store(false, Ordering::SeqCst);

        let mut state_guard = self.state.lock().await;
        let state = &mut *state_guard;
        if !state.created {
            // Destroyed while the wait was pending.
            return Ok(false);
        }
        let max_pack_size = state.max_pack_size;

        for (i, (id, stream)) in snapshot.iter().enumerate() {
            if !ready[i] {
                continue;
            }

            // Skip entries removed while the wait was in progress.
            let (completed, failure, addr) = match state.dest_sockets.get_mut(id) {
                Some(dest) => {
                    let mut completed: Vec<Bytes> = Vec::new();
                    let mut failure = None;
                    loop {
                        match dest.reassembler.process_readable(stream, max_pack_size) {
                            Ok(true) => completed.push(dest.reassembler.take_frame()),
                            Ok(false) => break,
                            Err(e) => {
                                failure = Some(e);
                                break;
                            }
                        }
                    }
                    (completed, failure, dest.addr.clone())
                }
                None => continue,
            };

            let kind = addr.kind();
            for payload in completed {
                state.raw_packets.push_back(RawPacket::new(
                    payload,
                    RtpAddress::Tcp(addr.clone()),
                    RtpTime::now(),
                    kind,
                ));
            }

            if let Some(e) = failure {
                log::warn!("receive on {id} failed: {e}; removing destination");
                if let Some(hook) = &state.on_receive_error {
                    hook(*id);
                }
                state.dest_sockets.remove(id);
            }
        }

        if let Some(ab) = &abort {
            if ready[snapshot.len()] {
                ab.drain();
            }
        }

        Ok(!state.raw_packets.is_empty())
    }
}

#[async_trait]
impl RtpTransmitter for TcpTransmitter {
    async fn init(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.init {
            return Err(Error::ErrAlreadyInit);
        }
        state.init = true;
        Ok(())
    }

    async fn create(&self, max_pack_size: usize, params: Option<&TransmissionParams>)
        -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.init {
            return Err(Error::ErrNotInit);
        }
        if state.created {
            return Err(Error::ErrAlreadyCreated);
        }

        let external = match params {
            Some(TransmissionParams::Tcp(p)) => p.abort_channel.clone(),
            None => None,
        };
        // Failure to build the owned channel leaves the transmitter in the
        // pre-create state.
        let owned = match &external {
            Some(_) => None,
            None => Some(Arc::new(AbortChannel::new().await?)),
        };

        state.max_pack_size = max_pack_size;
        state.external_abort = external;
        state.owned_abort = owned;
        state.created = true;
        Ok(())
    }

    async fn destroy(&self) {
        let mut state = self.state.lock().await;
        if !state.init || !state.created {
            return;
        }

        if self.waiting.load(Ordering::SeqCst) {
            if let Some(ab) = state.abort_channel() {
                ab.signal();
            }
        }

        state.raw_packets.clear();
        state.dest_sockets.clear();
        state.owned_abort = None;
        state.external_abort = None;
        state.local_hostname = None;
        state.created = false;
    }

    async fn transmission_info(&self) -> Result<TransmissionInfo> {
        let state = self.state.lock().await;
        if !state.init {
            return Err(Error::ErrNotInit);
        }
        if !state.created {
            return Err(Error::ErrNotCreated);
        }
        Ok(TransmissionInfo::Tcp(TcpTransmissionInfo {
            destination_count: state.dest_sockets.len(),
            max_packet_size: state.max_pack_size,
        }))
    }

    async fn local_host_name(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        if !state.init {
            return Err(Error::ErrNotInit);
        }
        if !state.created {
            return Err(Error::ErrNotCreated);
        }

        if let Some(name) = &state.local_hostname {
            return Ok(name.clone());
        }

        let mut name = String::from("localhost");
        for (_, dest) in state.dest_sockets.iter() {
            if let Ok(addr) = dest.addr.stream().local_addr() {
                name = addr.ip().to_string();
                break;
            }
        }
        state.local_hostname = Some(name.clone());
        Ok(name)
    }

    async fn comes_from_this_transmitter(&self, addr: &RtpAddress) -> bool {
        let RtpAddress::Tcp(tcp) = addr;
        let state = self.state.lock().await;
        state.created && state.dest_sockets.contains(&tcp.socket_id())
    }

    fn header_overhead(&self) -> usize {
        TCP_HEADER_OVERHEAD
    }

    async fn poll(&self) -> Result<()> {
        self.poll_sockets(Duration::ZERO).await.map(|_| ())
    }

    async fn wait_for_incoming_data(&self, delay: RtpTime) -> Result<bool> {
        self.poll_sockets(delay.as_duration()).await
    }

    async fn abort_wait(&self) -> Result<()> {
        let state = self.state.lock().await;
        if !state.init {
            return Err(Error::ErrNotInit);
        }
        if !state.created {
            return Err(Error::ErrNotCreated);
        }
        if self.waiting.load(Ordering::SeqCst) {
            if let Some(ab) = state.abort_channel() {
                ab.signal();
            }
        }
        Ok(())
    }

    async fn send_rtp_data(&self, data: &[u8]) -> Result<()> {
        self.send_rtp_rtcp_data(data).await
    }

    async fn send_rtcp_data(&self, data: &[u8]) -> Result<()> {
        self.send_rtp_rtcp_data(data).await
    }

    async fn add_destination(&self, addr: RtpAddress) -> Result<()> {
        let RtpAddress::Tcp(tcp) = addr;
        let mut state = self.state.lock().await;
        if !state.init {
            return Err(Error::ErrNotInit);
        }
        if !state.created {
            return Err(Error::ErrNotCreated);
        }

        Self::validate_socket(tcp.stream())?;

        let id = tcp.socket_id();
        let dest = Destination {
            addr: tcp,
            reassembler: FrameReassembler::new(),
        };
        if state.dest_sockets.insert(id, dest).is_err() {
            return Err(Error::ErrAlreadyPresent);
        }
        log::debug!("added destination {id}");
        Ok(())
    }

    async fn delete_destination(&self, addr: &RtpAddress) -> Result<()> {
        let RtpAddress::Tcp(tcp) = addr;
        let mut state = self.state.lock().await;
        if !state.init {
            return Err(Error::ErrNotInit);
        }
        if !state.created {
            return Err(Error::ErrNotCreated);
        }

        let id = tcp.socket_id();
        // Any partially assembled frame goes with the entry.
        match state.dest_sockets.remove(&id) {
            Some(_) => {
                log::debug!("removed destination {id}");
                Ok(())
            }
            None => Err(Error::ErrNotFound),
        }
    }

    async fn clear_destinations(&self) {
        let mut state = self.state.lock().await;
        if state.init && state.created {
            state.dest_sockets.clear();
        }
    }

    fn supports_multicasting(&self) -> bool {
        false
    }

    async fn join_multicast_group(&self, _addr: RtpAddress) -> Result<()> {
        Err(Error::ErrNotSupported)
    }

    async fn leave_multicast_group(&self, _addr: &RtpAddress) -> Result<()> {
        Err(Error::ErrNotSupported)
    }

    async fn leave_all_multicast_groups(&self) {}

    async fn set_receive_mode(&self, mode: ReceiveMode) -> Result<()> {
        let state = self.state.lock().await;
        if !state.init {
            return Err(Error::ErrNotInit);
        }
        if !state.created {
            return Err(Error::ErrNotCreated);
        }
        // Peers are identified by socket handle; filtering by origin is the
        // session layer's job.
        if mode == ReceiveMode::AcceptAll {
            Ok(())
        } else {
            Err(Error::ErrNotSupported)
        }
    }

    async fn add_to_ignore_list(&self, _addr: RtpAddress) -> Result<()> {
        Err(Error::ErrNotSupported)
    }

    async fn delete_from_ignore_list(&self, _addr: &RtpAddress) -> Result<()> {
        Err(Error::ErrNotSupported)
    }

    async fn clear_ignore_list(&self) {}

    async fn add_to_accept_list(&self, _addr: RtpAddress) -> Result<()> {
        Err(Error::ErrNotSupported)
    }

    async fn delete_from_accept_list(&self, _addr: &RtpAddress) -> Result<()> {
        Err(Error::ErrNotSupported)
    }

    async fn clear_accept_list(&self) {}

    async fn set_maximum_packet_size(&self, size: usize) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.init {
            return Err(Error::ErrNotInit);
        }
        if !state.created {
            return Err(Error::ErrNotCreated);
        }
        if size > MAX_FRAME_PAYLOAD {
            return Err(Error::ErrDataTooLong);
        }
        state.max_pack_size = size;
        Ok(())
    }

    async fn new_data_available(&self) -> bool {
        let state = self.state.lock().await;
        !state.raw_packets.is_empty()
    }

    async fn get_next_packet(&self) -> Option<RawPacket> {
        let mut state = self.state.lock().await;
        state.raw_packets.pop_front()
    }
}

async fn send_frame(stream: &TcpStream, mut frame: &[u8]) -> std::io::Result<()> {
    while !frame.is_empty() {
        stream.writable().await?;
        match stream.try_write(frame) {
            Ok(0) => {
                return Err(std::io::Error::new(
                    ErrorKind::WriteZero,
                    "socket accepted no bytes",
                ))
            }
            Ok(n) => frame = &frame[n..],
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => continue,
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
