use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("transmitter: already initialized")]
    ErrAlreadyInit,
    #[error("transmitter: not initialized")]
    ErrNotInit,
    #[error("transmitter: already created")]
    ErrAlreadyCreated,
    #[error("transmitter: not created")]
    ErrNotCreated,
    #[error("can't create abort channel")]
    ErrCantCreateAbortChannel,
    #[error("destination: bad socket")]
    ErrBadSocket,
    #[error("destination: already present")]
    ErrAlreadyPresent,
    #[error("destination: not found")]
    ErrNotFound,
    #[error("address type not handled by this transmitter")]
    ErrInvalidAddressType,
    #[error("frame exceeds maximum packet size")]
    ErrOversizedFrame,
    #[error("connection closed by peer")]
    ErrConnectionClosed,
    #[error("data too long for 16-bit framing")]
    ErrDataTooLong,
    #[error("data exceeds maximum packet size")]
    ErrDataOversized,
    #[error("no destination accepted the packet")]
    ErrSendFailed,
    #[error("not supported by the TCP transmitter")]
    ErrNotSupported,
    #[error("{0}")]
    Io(#[source] IoError),
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}
