//! UDP/OSC command intake
//!
//! Decodes each datagram as an OSC message, maps it to a [`Command`] and
//! queues it for the supervisor. Malformed or unknown messages are logged and
//! dropped; the listener only stops when the supervisor goes away.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use super::{Command, CommandHandle, SubmitError};
use crate::osc::OscMessage;

/// Largest datagram accepted
const MAX_DATAGRAM: usize = 1536;

const RECV_BACKOFF_FIRST: Duration = Duration::from_millis(100);
const RECV_BACKOFF_MAX: Duration = Duration::from_secs(5);

/// Pause after the `attempt`th consecutive receive error (0-indexed),
/// doubling from [`RECV_BACKOFF_FIRST`] up to [`RECV_BACKOFF_MAX`]
fn recv_backoff(attempt: u32) -> Duration {
    RECV_BACKOFF_FIRST
        .saturating_mul(1u32 << attempt.min(16))
        .min(RECV_BACKOFF_MAX)
}

pub struct CommandListener {
    socket: UdpSocket,
}

impl CommandListener {
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!("📡 Serving commands on {}", socket.local_addr()?);
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive until the command queue closes
    pub async fn run(self, handle: CommandHandle) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut failures = 0u32;

        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => {
                    failures = 0;
                    received
                }
                Err(e) => {
                    let delay = recv_backoff(failures);
                    failures = failures.saturating_add(1);
                    warn!(error = %e, failures, retry_ms = delay.as_millis() as u64, "command socket receive failed");
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            let message = match OscMessage::decode(&buf[..len]) {
                Ok(message) => message,
                Err(e) => {
                    warn!(peer = %peer, error = %e, "dropping malformed OSC packet");
                    continue;
                }
            };

            let command = match Command::from_message(&message) {
                Ok(command) => command,
                Err(e) => {
                    warn!(peer = %peer, message = %message, error = %e, "dropping command");
                    continue;
                }
            };

            debug!(peer = %peer, command = %command, "command received");
            match handle.try_submit(command) {
                Ok(()) => {}
                Err(SubmitError::Full) => warn!(peer = %peer, "command queue full; dropping command"),
                Err(SubmitError::Closed) => {
                    debug!("command queue closed; listener stopping");
                    return;
                }
            }
        }
    }
}
