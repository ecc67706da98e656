#![warn(rust_2018_idioms)]
#![allow(dead_code)]

#[macro_use]
extern crate lazy_static;

pub mod abort;
pub mod address;
pub mod error;
pub mod ordered_map;
pub mod raw_packet;
pub mod reassembler;
pub mod time;
pub mod transmitter;
pub mod wait;

pub use crate::abort::AbortChannel;
pub use crate::address::{RtpAddress, SocketId, TcpAddress};
pub use crate::error::{Error, Result};
pub use crate::raw_packet::{PacketKind, RawPacket};
pub use crate::reassembler::FrameReassembler;
pub use crate::time::{NtpTime, RtpTime};
pub use crate::transmitter::tcp::{TcpTransmissionInfo, TcpTransmissionParams, TcpTransmitter};
pub use crate::transmitter::{
    OnSocketErrorHdlrFn, ReceiveMode, RtpTransmitter, TransmissionInfo, TransmissionParams,
};
