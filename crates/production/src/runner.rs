//! Production runner implementation.
//!
//! The runner owns the node state machine and is its sole caller: it
//! multiplexes timer fires, inbound RPCs and outbound completions into a
//! single event stream, and executes the actions the machine returns.
//! Outbound RPCs are fire-and-forget tasks whose results come back through
//! the same event channel.

use crate::network::{InboundRpc, PeerClient};
use crate::timers::TimerManager;
use sortis_core::{Action, Event, OutboundMessage, RequestId, StateMachine};
use sortis_node::NodeStateMachine;
use sortis_types::{Request, Response, UserId};
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Handle for shutting down a running [`Runner`].
///
/// When dropped, signals the runner to exit gracefully.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: Option<oneshot::Sender<()>>,
}

impl ShutdownHandle {
    /// Trigger shutdown (consumes the handle).
    pub fn shutdown(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ShutdownHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// The tokio event loop driving one node.
pub struct Runner {
    node: NodeStateMachine,

    /// Outbound clients, one per peer, created at startup.
    peers: Vec<PeerClient>,

    timers: TimerManager,

    /// Timer fires and outbound completions.
    event_tx: mpsc::Sender<Event>,
    event_rx: mpsc::Receiver<Event>,

    /// Inbound RPCs posted by connection handlers.
    inbound_rx: mpsc::Receiver<InboundRpc>,

    /// Reply channels for inbound RPCs awaiting their response.
    pending_replies: HashMap<RequestId, oneshot::Sender<Response>>,
    next_request_id: u64,

    started: Instant,
}

impl Runner {
    /// Create a runner over a composed node.
    ///
    /// `inbound_rx` is the receiving end of the RPC server's queue.
    pub fn new(
        node: NodeStateMachine,
        peers: Vec<PeerClient>,
        inbound_rx: mpsc::Receiver<InboundRpc>,
        channel_capacity: usize,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(channel_capacity);
        let timers = TimerManager::new(event_tx.clone());
        Self {
            node,
            peers,
            timers,
            event_tx,
            event_rx,
            inbound_rx,
            pending_replies: HashMap::new(),
            next_request_id: 0,
            started: Instant::now(),
        }
    }

    /// A sender for injecting events from outside the loop (client
    /// submissions, tests).
    pub fn event_sender(&self) -> mpsc::Sender<Event> {
        self.event_tx.clone()
    }

    /// Spawn the loop, returning its task handle and a shutdown handle.
    pub fn spawn(self) -> (JoinHandle<()>, ShutdownHandle) {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(self.run(shutdown_rx));
        (
            handle,
            ShutdownHandle {
                tx: Some(shutdown_tx),
            },
        )
    }

    async fn run(mut self, mut shutdown_rx: oneshot::Receiver<()>) {
        info!(user = %self.node.user_id(), peers = self.peers.len(), "Runner starting");

        // Arm the initial timers.
        let bootstrap = self.node.bootstrap();
        self.execute_all(bootstrap);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Shutdown requested");
                    break;
                }

                Some(rpc) = self.inbound_rx.recv() => {
                    self.handle_inbound(rpc);
                }

                Some(event) = self.event_rx.recv() => {
                    self.process(event);
                }
            }
        }

        self.timers.cancel_all();
        info!("Runner stopped");
    }

    /// Admit an inbound RPC: assign a request id, park the reply channel
    /// and feed the request through the state machine.
    fn handle_inbound(&mut self, rpc: InboundRpc) {
        self.next_request_id += 1;
        let request_id = RequestId(self.next_request_id);
        trace!(?request_id, request = rpc.request.type_name(), "Inbound RPC admitted");

        self.pending_replies.insert(request_id, rpc.reply);
        let event = inbound_event(rpc.request, request_id);
        self.process(event);
    }

    fn process(&mut self, event: Event) {
        trace!(event = event.type_name(), "Processing event");
        self.node.set_time(self.started.elapsed());
        let actions = self.node.handle(event);
        self.execute_all(actions);
    }

    fn execute_all(&mut self, actions: Vec<Action>) {
        for action in actions {
            self.execute(action);
        }
    }

    fn execute(&mut self, action: Action) {
        trace!(action = action.type_name(), "Executing action");
        match action {
            Action::Broadcast { message } => {
                for client in self.peers.clone() {
                    self.spawn_send(client, message.clone());
                }
            }

            Action::SendTo { peer, message } => {
                match self.peers.iter().find(|client| client.user_id() == &peer) {
                    Some(client) => self.spawn_send(client.clone(), message),
                    None => warn!(peer = %peer, "SendTo target is not a known peer"),
                }
            }

            Action::Respond {
                request_id,
                response,
            } => match self.pending_replies.remove(&request_id) {
                Some(reply) => {
                    // A dropped receiver just means the peer hung up early.
                    let _ = reply.send(response);
                }
                None => warn!(?request_id, "Response for unknown request"),
            },

            Action::SetTimer { id, duration } => {
                self.timers.set_timer(id, duration);
            }

            Action::EnqueueInternal { event } => {
                // Internal events are causal follow-ups; they run before the
                // loop returns to its selector.
                self.process(event);
            }
        }
    }

    /// Fire-and-forget outbound RPC. The result is delivered back to the
    /// loop as a completion event.
    fn spawn_send(&self, client: PeerClient, message: OutboundMessage) {
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let peer = client.user_id().clone();
            let message_type = message.type_name();
            let request = message.into_request();

            debug!(peer = %peer, message = message_type, "Sending");
            let result = client.call(&request).await;

            let event = match result {
                Ok(response) => completion_event(&request, peer, response),
                Err(err) => {
                    debug!(message = message_type, error = %err, "Outbound RPC failed");
                    failure_event(&request, peer)
                }
            };

            if let Some(event) = event {
                let _ = event_tx.send(event).await;
            }
        });
    }
}

/// Map an inbound request to its state-machine event.
fn inbound_event(request: Request, request_id: RequestId) -> Event {
    match request {
        Request::AppendBlock(args) => Event::AppendBlockRequest { args, request_id },
        Request::AppendTransaction(args) => Event::AppendTransactionRequest { args, request_id },
        Request::ProposeBlock(args) => Event::ProposeBlockRequest { args, request_id },
        Request::Vote(args) => Event::VoteRequest { args, request_id },
        Request::RequestChain(args) => Event::RequestChainRequest { args, request_id },
    }
}

/// Map a completed outbound RPC to its completion event.
fn completion_event(request: &Request, peer: UserId, response: Response) -> Option<Event> {
    match (request, response) {
        (Request::ProposeBlock(_), response) => Some(Event::ProposeBlockCompleted {
            peer,
            success: response.is_success(),
        }),
        (Request::Vote(_), response) => Some(Event::VoteCompleted {
            peer,
            success: response.is_success(),
        }),
        (Request::AppendTransaction(_), response) => Some(Event::AppendTransactionCompleted {
            peer,
            success: response.is_success(),
        }),
        (Request::RequestChain(_), Response::Chain { peer, chain }) => {
            Some(Event::ChainReceived { peer, chain })
        }
        (Request::RequestChain(_), Response::Ack { .. }) => {
            warn!(peer = %peer, "Peer answered RequestChain with a bare ack");
            None
        }
        // We never originate AppendBlock pushes in steady state.
        (Request::AppendBlock(_), _) => None,
    }
}

/// Map a failed outbound RPC to its completion event, if the flavor cares.
fn failure_event(request: &Request, peer: UserId) -> Option<Event> {
    match request {
        Request::ProposeBlock(_) => Some(Event::ProposeBlockCompleted {
            peer,
            success: false,
        }),
        Request::Vote(_) => Some(Event::VoteCompleted {
            peer,
            success: false,
        }),
        Request::AppendTransaction(_) => Some(Event::AppendTransactionCompleted {
            peer,
            success: false,
        }),
        // A failed pull is just logged; the other peers' chains suffice.
        Request::RequestChain(_) | Request::AppendBlock(_) => None,
    }
}
