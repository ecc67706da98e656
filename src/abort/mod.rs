#[cfg(test)]
mod abort_test;

use std::io::ErrorKind;

use tokio::net::{TcpListener, TcpStream};

use crate::error::{Error, Result};

/// A selectable channel used to break a blocking multi-socket wait.
///
/// The channel is a connected loopback TCP pair: writing a byte to one end
/// makes the other end readable, so the read half can sit in the same wait
/// set as the data sockets. Wrap it in an `Arc` and hand it to several
/// transmitters to let a single poll thread wake many sessions at once.
#[derive(Debug)]
pub struct AbortChannel {
    reader: TcpStream,
    writer: TcpStream,
}

impl AbortChannel {
    /// Builds the loopback pair: listen on an ephemeral 127.0.0.1 port,
    /// connect, accept, drop the listener. Any failure along the way
    /// reports `ErrCantCreateAbortChannel`; sockets opened up to that
    /// point are closed on drop.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|_| Error::ErrCantCreateAbortChannel)?;
        let addr = listener
            .local_addr()
            .map_err(|_| Error::ErrCantCreateAbortChannel)?;

        let writer = TcpStream::connect(addr)
            .await
            .map_err(|_| Error::ErrCantCreateAbortChannel)?;
        let (reader, _) = listener
            .accept()
            .await
            .map_err(|_| Error::ErrCantCreateAbortChannel)?;

        // A single signalling byte must not sit in the Nagle buffer.
        let _ = writer.set_nodelay(true);

        Ok(AbortChannel { reader, writer })
    }

    /// Writes one byte to the channel. Errors are ignored: if the write
    /// would block, enough bytes are already in flight to wake the reader.
    pub fn signal(&self) {
        let _ = self.writer.try_write(b"*");
    }

    /// Reads one byte at a time until the read half is no longer ready.
    /// Idempotent and non-blocking.
    pub fn drain(&self) {
        let mut buf = [0u8; 1];
        loop {
            match self.reader.try_read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("abort channel drain failed: {e}");
                    break;
                }
            }
        }
    }

    /// The read half, for inclusion in a wait set.
    pub fn reader(&self) -> &TcpStream {
        &self.reader
    }
}
