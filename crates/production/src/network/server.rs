//! Inbound RPC server.
//!
//! Connection handlers never touch node state: each decoded request is
//! paired with a oneshot reply channel and posted to the runner, and the
//! handler blocks until the loop responds. That keeps the event loop the
//! sole mutator while inbound RPCs arrive concurrently.

use crate::network::codec::{read_frame, write_frame, CodecError};
use sortis_types::{Request, Response};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// An inbound request paired with its reply channel.
#[derive(Debug)]
pub struct InboundRpc {
    pub request: Request,
    pub reply: oneshot::Sender<Response>,
}

/// TCP server feeding inbound requests to the runner.
pub struct RpcServer {
    listener: TcpListener,
    inbound_tx: mpsc::Sender<InboundRpc>,
}

impl RpcServer {
    /// Bind the listening socket.
    pub async fn bind(
        addr: &str,
        inbound_tx: mpsc::Sender<InboundRpc>,
    ) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "RPC server listening");
        Ok(Self {
            listener,
            inbound_tx,
        })
    }

    /// The bound address.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Run the accept loop. Each connection gets its own handler task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.listener.accept().await {
                    Ok((stream, remote)) => {
                        debug!(%remote, "Accepted connection");
                        let inbound_tx = self.inbound_tx.clone();
                        tokio::spawn(handle_connection(stream, inbound_tx));
                    }
                    Err(err) => {
                        warn!(error = %err, "Accept failed");
                    }
                }
            }
        })
    }
}

/// Serve one connection: read a request frame, post it to the loop, write
/// the response frame back. Repeats until the peer hangs up.
async fn handle_connection(mut stream: TcpStream, inbound_tx: mpsc::Sender<InboundRpc>) {
    loop {
        let request: Request = match read_frame(&mut stream).await {
            Ok(request) => request,
            Err(CodecError::Io(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                // Clean hang-up between frames.
                return;
            }
            Err(err) => {
                debug!(error = %err, "Dropping connection on malformed frame");
                return;
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if inbound_tx
            .send(InboundRpc {
                request,
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            // Runner is gone; nothing sensible to reply.
            return;
        }

        let response = match reply_rx.await {
            Ok(response) => response,
            Err(_) => {
                warn!("Runner dropped a reply channel");
                return;
            }
        };

        if let Err(err) = write_frame(&mut stream, &response).await {
            debug!(error = %err, "Failed to write response");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::client::PeerClient;
    use sortis_types::{RequestChainArgs, UserId};

    /// End-to-end transport check: a client call reaches the inbound queue
    /// and the posted reply makes it back to the caller.
    #[tokio::test]
    async fn request_travels_to_loop_and_response_returns() {
        let (inbound_tx, mut inbound_rx) = mpsc::channel(8);
        let server = RpcServer::bind("127.0.0.1:0", inbound_tx).await.unwrap();
        let addr = server.local_addr().unwrap();
        server.spawn();

        // A stand-in for the runner loop: answer every request with success.
        tokio::spawn(async move {
            while let Some(InboundRpc { request, reply }) = inbound_rx.recv().await {
                assert_eq!(request.type_name(), "RequestChain");
                let _ = reply.send(Response::Chain {
                    peer: UserId("3001".into()),
                    chain: vec![],
                });
            }
        });

        let client = PeerClient::new(addr.to_string());
        let response = client
            .call(&Request::RequestChain(RequestChainArgs {
                peer: UserId("3002".into()),
            }))
            .await
            .unwrap();

        assert!(matches!(response, Response::Chain { peer, .. } if peer.as_str() == "3001"));
    }
}
