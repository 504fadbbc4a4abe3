//! Daemon transport.
//!
//! The daemon hands the greeter a pair of pipe file descriptors through
//! the environment. This module wraps them in an async framed channel:
//! outbound requests are encoded whole, inbound bytes are accumulated
//! until a complete frame can be decoded.

use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::unix::pipe;
use tracing::{debug, trace, warn};

use dmgreet_core::codec::FrameAssembler;
use dmgreet_core::constants::{FROM_SERVER_FD_VAR, TO_SERVER_FD_VAR};
use dmgreet_core::{Error, GreeterMessage, Result, ServerMessage};

const READ_CHUNK: usize = 4096;

/// Framed async channel to the daemon.
pub struct Connection {
    reader: Box<dyn AsyncRead + Unpin + Send>,
    writer: Box<dyn AsyncWrite + Unpin + Send>,
    assembler: FrameAssembler,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("buffered", &self.assembler.buffered())
            .finish()
    }
}

impl Connection {
    /// Channel over arbitrary async halves (tests use an in-memory duplex).
    pub fn new(
        reader: impl AsyncRead + Unpin + Send + 'static,
        writer: impl AsyncWrite + Unpin + Send + 'static,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            assembler: FrameAssembler::new(),
        }
    }

    /// Channel over the daemon-provided pipe descriptors.
    ///
    /// Reads `LIGHTDM_TO_SERVER_FD` and `LIGHTDM_FROM_SERVER_FD`; either
    /// being absent or non-numeric means this process was not spawned by
    /// the daemon.
    pub fn from_env() -> Result<Self> {
        let to_fd = fd_from_env(TO_SERVER_FD_VAR)?;
        let from_fd = fd_from_env(FROM_SERVER_FD_VAR)?;
        debug!(to_fd, from_fd, "using daemon pipe descriptors");

        // SAFETY: the daemon opened these descriptors for us before exec
        // and nothing else in this process owns them.
        let (to_owned, from_owned) = unsafe {
            (OwnedFd::from_raw_fd(to_fd), OwnedFd::from_raw_fd(from_fd))
        };

        let writer = pipe::Sender::from_owned_fd(to_owned).map_err(Error::Io)?;
        let reader = pipe::Receiver::from_owned_fd(from_owned).map_err(Error::Io)?;
        Ok(Self::new(reader, writer))
    }

    /// Encode and send one request.
    pub async fn send(&mut self, message: &GreeterMessage) -> Result<()> {
        let bytes = message.encode();
        trace!(id = message.id(), len = bytes.len(), "sending frame");
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Receive the next daemon message, reading until a full frame is
    /// buffered. Returns [`Error::ConnectionClosed`] once the daemon
    /// hangs up with no complete frame pending.
    ///
    /// Frames that do not decode to a known message (a newer daemon may
    /// send ids this library predates) are logged and skipped; only
    /// transport failures surface as errors.
    pub async fn next_message(&mut self) -> Result<ServerMessage> {
        loop {
            if let Some(frame) = self.assembler.next_frame()? {
                trace!(id = frame.id, len = frame.payload.len(), "received frame");
                match ServerMessage::decode(&frame) {
                    Ok(message) => return Ok(message),
                    Err(err) => {
                        warn!(id = frame.id, %err, "skipping unrecognized frame");
                        continue;
                    }
                }
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            self.assembler.extend(&chunk[..n]);
        }
    }
}

fn fd_from_env(variable: &'static str) -> Result<RawFd> {
    let value = std::env::var(variable).map_err(|_| Error::Env { variable })?;
    value.parse().map_err(|_| Error::Env { variable })
}
