
use std::io::ErrorKind;

use bytes::{Bytes, BytesMut};
use tokio::net::TcpStream;

use crate::error::{Error, Result};

/// Per-connection reassembly state for an RFC 4571 framed stream.
///
/// Each packet on the wire is a 2-byte big-endian length followed by that
/// many payload bytes. The reassembler consumes whatever a socket has
/// buffered, one frame at a time, across arbitrary TCP segmentation: a
/// frame may arrive in a single read or byte by byte over many wakes.
#[derive(Debug, Default)]
pub struct FrameReassembler {
    length_buf: [u8; 2],
    length_off: usize,
    data_len: usize,
    data_off: usize,
    data_buf: BytesMut,
}

impl FrameReassembler {
    pub fn new() -> Self {
        FrameReassembler::default()
    }

    /// Reads from `sock` until a frame completes or the socket runs dry.
    ///
    /// Returns `Ok(true)` when a full frame is assembled: harvest it with
    /// [`take_frame`](Self::take_frame) before processing the socket again,
    /// since only one frame is held at a time. `Ok(false)` means the socket
    /// would block mid-frame; the remaining bytes complete the frame on a
    /// later wake. A read of zero bytes reports `ErrConnectionClosed`, and
    /// a decoded length above `max_pack_size` reports `ErrOversizedFrame`
    /// (a zero length is legal and yields an empty payload).
    pub fn process_readable(&mut self, sock: &TcpStream, max_pack_size: usize) -> Result<bool> {
        loop {
            if self.length_off == 2 && self.data_off == self.data_len {
                return Ok(true);
            }

            if self.length_off < 2 {
                match sock.try_read(&mut self.length_buf[self.length_off..]) {
                    Ok(0) => return Err(Error::ErrConnectionClosed),
                    Ok(n) => {
                        self.length_off += n;
                        if self.length_off == 2 {
                            let len = u16::from_be_bytes(self.length_buf) as usize;
                            if len > max_pack_size {
                                return Err(Error::ErrOversizedFrame);
                            }
                            self.data_len = len;
                            self.data_off = 0;
                            self.data_buf = BytesMut::zeroed(len);
                        }
                    }
                    Err(ref e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
                    Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            } else {
                match sock.try_read(&mut self.data_buf[self.data_off..self.data_len]) {
                    Ok(0) => return Err(Error::ErrConnectionClosed),
                    Ok(n) => self.data_off += n,
                    Err(ref e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
                    Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    /// Hands out the assembled payload and resets for the next frame.
    /// Only meaningful after `process_readable` reported a complete frame.
    pub fn take_frame(&mut self) -> Bytes {
        let buf = std::mem::take(&mut self.data_buf);
        self.reset();
        buf.freeze()
    }

    /// Discards any partially assembled frame.
    pub fn reset(&mut self) {
        self.length_off = 0;
        self.data_len = 0;
        self.data_off = 0;
        self.data_buf = BytesMut::new();
    }
}
