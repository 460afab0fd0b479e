//! Deterministic simulation runner.
//!
//! Drives a set of node state machines over a simulated network with a
//! single global event queue. Events are ordered by (time, priority,
//! sequence), so a given seed always produces the same run.

use crate::network::{NetworkConfig, SimulatedNetwork};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sortis_agreement::AgreementConfig;
use sortis_core::{Action, Event, EventPriority, OutboundMessage, RequestId, StateMachine, TimerId};
use sortis_node::{LinkVerifier, NodeStateMachine};
use sortis_types::{Block, Request, Response, Transaction, UserId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Index type for simulation-only node routing.
pub type NodeIndex = u32;

/// Deterministic ordering key for queued events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EventKey {
    time: Duration,
    priority: EventPriority,
    sequence: u64,
}

#[derive(Debug)]
struct QueuedEvent {
    node: NodeIndex,
    event: Event,
}

/// Where an in-flight request came from.
#[derive(Debug, Clone, Copy)]
enum Origin {
    Node(NodeIndex),
    /// A simulated client; replies are consumed silently.
    Client,
}

/// Which RPC flavor an in-flight request is, for completion synthesis.
#[derive(Debug, Clone, Copy)]
enum RequestKind {
    AppendBlock,
    AppendTransaction,
    ProposeBlock,
    Vote,
    RequestChain,
}

#[derive(Debug)]
struct PendingRequest {
    origin: Origin,
    kind: RequestKind,
}

/// Statistics collected during simulation.
#[derive(Debug, Default, Clone)]
pub struct SimulationStats {
    /// Total events processed.
    pub events_processed: u64,
    /// Messages scheduled for delivery.
    pub messages_sent: u64,
    /// Messages dropped by network policy.
    pub messages_dropped: u64,
    /// Timers set.
    pub timers_set: u64,
}

/// Deterministic simulation runner.
///
/// Processes events in deterministic order and executes actions. Given the
/// same seed, produces identical results every run.
pub struct SimulationRunner {
    /// All nodes in the simulation, indexed by NodeIndex.
    nodes: Vec<NodeStateMachine>,

    /// Node identities, aligned with `nodes`.
    user_ids: Vec<UserId>,

    /// Global event queue, ordered deterministically.
    event_queue: BTreeMap<EventKey, QueuedEvent>,

    /// Sequence counter for deterministic ordering.
    sequence: u64,

    /// Current simulation time.
    now: Duration,

    /// Network simulator.
    network: SimulatedNetwork,

    /// RNG for network conditions (seeded for determinism).
    rng: ChaCha8Rng,

    /// Timer registry for restart support.
    /// Maps (node, timer_id) -> event_key for removal.
    timers: HashMap<(NodeIndex, TimerId), EventKey>,

    /// In-flight requests awaiting their response.
    pending_requests: HashMap<(NodeIndex, RequestId), PendingRequest>,
    next_request_id: u64,

    stats: SimulationStats,
}

impl SimulationRunner {
    /// Create a runner with `config.num_nodes` fresh nodes.
    ///
    /// Identities are the port substrings 3001, 3002, ... so the sorted
    /// registry matches what production bootstrap would derive.
    pub fn new(config: NetworkConfig, seed: u64) -> Self {
        let user_ids: Vec<UserId> = (0..config.num_nodes)
            .map(|i| UserId(format!("{}", 3001 + i)))
            .collect();

        let nodes: Vec<NodeStateMachine> = user_ids
            .iter()
            .map(|user_id| {
                NodeStateMachine::new(
                    user_id.clone(),
                    &user_ids,
                    AgreementConfig::default(),
                    Arc::new(LinkVerifier),
                )
            })
            .collect();

        info!(num_nodes = nodes.len(), seed, "Created simulation runner");

        Self {
            nodes,
            user_ids,
            event_queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            network: SimulatedNetwork::new(config),
            rng: ChaCha8Rng::seed_from_u64(seed),
            timers: HashMap::new(),
            pending_requests: HashMap::new(),
            next_request_id: 0,
            stats: SimulationStats::default(),
        }
    }

    /// Arm every node's initial timers.
    pub fn bootstrap(&mut self) {
        for index in 0..self.nodes.len() {
            let actions = self.nodes[index].bootstrap();
            self.execute(index as NodeIndex, actions);
        }
    }

    /// Get a reference to a node by index.
    pub fn node(&self, index: NodeIndex) -> Option<&NodeStateMachine> {
        self.nodes.get(index as usize)
    }

    /// Get a node's identity.
    pub fn user_id(&self, index: NodeIndex) -> &UserId {
        &self.user_ids[index as usize]
    }

    /// A node's committed chain.
    pub fn chain(&self, index: NodeIndex) -> &[Block] {
        self.nodes[index as usize].ledger().chain()
    }

    /// Get current simulation time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Get simulation statistics.
    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Get a mutable reference to the network for drop configuration.
    pub fn network_mut(&mut self) -> &mut SimulatedNetwork {
        &mut self.network
    }

    /// Submit a client transaction to one node at the current time.
    pub fn submit_transaction(&mut self, node: NodeIndex, tx: Transaction) {
        let request_id = self.fresh_request_id();
        self.pending_requests.insert(
            (node, request_id),
            PendingRequest {
                origin: Origin::Client,
                kind: RequestKind::AppendTransaction,
            },
        );
        self.schedule(node, self.now, Event::SubmitTransaction { tx, request_id });
    }

    /// Schedule an arbitrary event (tests drive edge cases through this).
    pub fn schedule_event(&mut self, node: NodeIndex, delay: Duration, event: Event) {
        self.schedule(node, self.now + delay, event);
    }

    /// Run the simulation until the given simulated time.
    pub fn run_until(&mut self, deadline: Duration) {
        while let Some((&key, _)) = self.event_queue.iter().next() {
            if key.time > deadline {
                break;
            }
            let queued = self
                .event_queue
                .remove(&key)
                .expect("peeked key is present");

            self.now = key.time.max(self.now);
            self.clear_fired_timer(queued.node, &queued.event, key);
            self.process(queued.node, queued.event);
        }
        self.now = deadline.max(self.now);
    }

    /// Run the simulation for a span of simulated time.
    pub fn run_for(&mut self, span: Duration) {
        self.run_until(self.now + span);
    }

    // ───────────────────────────────────────────────────────────────────────
    // Internals
    // ───────────────────────────────────────────────────────────────────────

    fn process(&mut self, node: NodeIndex, event: Event) {
        trace!(node, event = event.type_name(), now = ?self.now, "Processing event");
        self.stats.events_processed += 1;

        let machine = &mut self.nodes[node as usize];
        machine.set_time(self.now);
        let actions = machine.handle(event);
        self.execute(node, actions);
    }

    fn execute(&mut self, node: NodeIndex, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Broadcast { message } => {
                    for target in 0..self.nodes.len() as NodeIndex {
                        if target == node {
                            continue;
                        }
                        if self.network.should_drop(&message) {
                            self.stats.messages_dropped += 1;
                            debug!(from = node, to = target, message = message.type_name(), "Dropped by network policy");
                            continue;
                        }
                        self.deliver(node, target, message.clone());
                    }
                }

                Action::SendTo { peer, message } => {
                    if self.network.should_drop(&message) {
                        self.stats.messages_dropped += 1;
                        continue;
                    }
                    match self.user_ids.iter().position(|id| *id == peer) {
                        Some(target) => self.deliver(node, target as NodeIndex, message),
                        None => warn!(peer = %peer, "SendTo target is not a simulated node"),
                    }
                }

                Action::Respond {
                    request_id,
                    response,
                } => self.handle_respond(node, request_id, response),

                Action::SetTimer { id, duration } => {
                    self.stats.timers_set += 1;
                    let key = self.make_key(self.now + duration, EventPriority::Timer);
                    if let Some(old) = self.timers.insert((node, id), key) {
                        self.event_queue.remove(&old);
                    }
                    let event = match id {
                        TimerId::Round => Event::RoundTimer,
                        TimerId::Agreement => Event::AgreementTimer,
                    };
                    self.event_queue.insert(key, QueuedEvent { node, event });
                }

                Action::EnqueueInternal { event } => {
                    // Causal follow-up: processed before anything else that
                    // is queued at this timestamp.
                    self.process(node, event);
                }
            }
        }
    }

    /// Deliver a request to `target`, booking the in-flight entry that its
    /// response will resolve.
    fn deliver(&mut self, from: NodeIndex, target: NodeIndex, message: OutboundMessage) {
        self.stats.messages_sent += 1;
        let request_id = self.fresh_request_id();

        let kind = match &message {
            OutboundMessage::ProposeBlock(_) => RequestKind::ProposeBlock,
            OutboundMessage::Vote(_) => RequestKind::Vote,
            OutboundMessage::AppendTransaction(_) => RequestKind::AppendTransaction,
            OutboundMessage::RequestChain(_) => RequestKind::RequestChain,
        };
        self.pending_requests.insert(
            (target, request_id),
            PendingRequest {
                origin: Origin::Node(from),
                kind,
            },
        );

        let event = match message.into_request() {
            Request::AppendBlock(args) => Event::AppendBlockRequest { args, request_id },
            Request::AppendTransaction(args) => {
                Event::AppendTransactionRequest { args, request_id }
            }
            Request::ProposeBlock(args) => Event::ProposeBlockRequest { args, request_id },
            Request::Vote(args) => Event::VoteRequest { args, request_id },
            Request::RequestChain(args) => Event::RequestChainRequest { args, request_id },
        };

        let arrival = self.now + self.network.delay(&mut self.rng);
        self.schedule(target, arrival, event);
    }

    /// Resolve a response: synthesize the completion event back at the
    /// request's origin.
    fn handle_respond(&mut self, responder: NodeIndex, request_id: RequestId, response: Response) {
        let Some(pending) = self.pending_requests.remove(&(responder, request_id)) else {
            warn!(responder, ?request_id, "Response for unknown request");
            return;
        };

        let origin = match pending.origin {
            Origin::Client => return,
            Origin::Node(origin) => origin,
        };

        let peer = self.user_ids[responder as usize].clone();
        let completion = match (pending.kind, response) {
            (RequestKind::ProposeBlock, response) => Some(Event::ProposeBlockCompleted {
                peer,
                success: response.is_success(),
            }),
            (RequestKind::Vote, response) => Some(Event::VoteCompleted {
                peer,
                success: response.is_success(),
            }),
            (RequestKind::AppendTransaction, response) => {
                Some(Event::AppendTransactionCompleted {
                    peer,
                    success: response.is_success(),
                })
            }
            (RequestKind::RequestChain, Response::Chain { peer, chain }) => {
                Some(Event::ChainReceived { peer, chain })
            }
            (RequestKind::RequestChain, Response::Ack { .. }) => None,
            (RequestKind::AppendBlock, _) => None,
        };

        if let Some(event) = completion {
            let arrival = self.now + self.network.delay(&mut self.rng);
            self.schedule(origin, arrival, event);
        }
    }

    fn schedule(&mut self, node: NodeIndex, time: Duration, event: Event) {
        let key = self.make_key(time, event.priority());
        self.event_queue.insert(key, QueuedEvent { node, event });
    }

    fn make_key(&mut self, time: Duration, priority: EventPriority) -> EventKey {
        self.sequence += 1;
        EventKey {
            time,
            priority,
            sequence: self.sequence,
        }
    }

    fn fresh_request_id(&mut self) -> RequestId {
        self.next_request_id += 1;
        RequestId(self.next_request_id)
    }

    /// Drop the timer registry entry for a timer event that just fired.
    fn clear_fired_timer(&mut self, node: NodeIndex, event: &Event, key: EventKey) {
        let id = match event {
            Event::RoundTimer => TimerId::Round,
            Event::AgreementTimer => TimerId::Agreement,
            _ => return,
        };
        if self.timers.get(&(node, id)) == Some(&key) {
            self.timers.remove(&(node, id));
        }
    }
}
