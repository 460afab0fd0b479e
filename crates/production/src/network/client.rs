//! Outbound peer clients.

use crate::network::codec::{read_frame, write_frame, CodecError};
use sortis_types::{Request, Response, UserId};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Errors from an outbound RPC.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connect to {addr} failed after {attempts} attempts: {source}")]
    Connect {
        addr: String,
        attempts: u32,
        source: std::io::Error,
    },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Dial attempts per call before giving up. Retrying the whole RPC is the
/// caller's business (the proposal retry path re-enters through the loop).
const CONNECT_ATTEMPTS: u32 = 4;

/// Backoff cap between dial attempts.
const MAX_BACKOFF: Duration = Duration::from_millis(500);

/// A handle to one peer, created once at startup.
///
/// Cloneable and safe for concurrent use from spawned send tasks: every
/// call opens its own connection, so calls never contend on a stream.
#[derive(Debug, Clone)]
pub struct PeerClient {
    user_id: UserId,
    addr: String,
}

impl PeerClient {
    /// Create a client for the peer at `addr` (`host:port`).
    pub fn new(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        Self {
            user_id: UserId::from_address(&addr),
            addr,
        }
    }

    /// The peer's identity (its port substring).
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// The peer's address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Perform one request/response round-trip.
    pub async fn call(&self, request: &Request) -> Result<Response, TransportError> {
        let mut stream = self.connect().await?;
        trace!(peer = %self.user_id, request = request.type_name(), "Sending request");

        write_frame(&mut stream, request).await?;
        let response: Response = read_frame(&mut stream).await?;

        trace!(peer = %self.user_id, request = request.type_name(), "Received response");
        Ok(response)
    }

    /// Dial with a short aggressive backoff, capped at [`MAX_BACKOFF`].
    async fn connect(&self) -> Result<TcpStream, TransportError> {
        let mut backoff = Duration::from_millis(50);
        let mut last_err = None;

        for attempt in 1..=CONNECT_ATTEMPTS {
            match TcpStream::connect(&self.addr).await {
                Ok(stream) => return Ok(stream),
                Err(err) => {
                    debug!(peer = %self.user_id, attempt, error = %err, "Dial failed");
                    last_err = Some(err);
                }
            }
            if attempt < CONNECT_ATTEMPTS {
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }

        Err(TransportError::Connect {
            addr: self.addr.clone(),
            attempts: CONNECT_ATTEMPTS,
            source: last_err.unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "no dial attempted")
            }),
        })
    }
}
