//! Network transport: framing, outbound clients, inbound server.

pub mod codec;

mod client;
mod server;

pub use client::{PeerClient, TransportError};
pub use codec::{CodecError, MAX_FRAME_SIZE, WIRE_VERSION};
pub use server::{InboundRpc, RpcServer};
