//! Node state machine.

use crate::ledger::{ChainVerifier, LedgerState};
use sortis_agreement::{AgreementConfig, AgreementState};
use sortis_core::{Action, Event, RequestId, StateMachine};
use sortis_mempool::MempoolState;
use sortis_types::{Blockchain, Response, UserId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Combined node state machine.
///
/// Composes agreement, the staging buffer and the ledger into a single
/// state machine. The event loop is its sole caller, so every mutation of
/// node state is serialized here.
pub struct NodeStateMachine {
    /// This node's identity.
    user_id: UserId,

    /// BA★ agreement state.
    agreement: AgreementState,

    /// Transaction staging buffer.
    mempool: MempoolState,

    /// The replicated chain.
    ledger: LedgerState,

    /// Current time.
    now: Duration,
}

impl std::fmt::Debug for NodeStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStateMachine")
            .field("user_id", &self.user_id)
            .field("agreement", &self.agreement)
            .field("chain_len", &self.ledger.len())
            .field("now", &self.now)
            .finish()
    }
}

impl NodeStateMachine {
    /// Create a new node state machine.
    ///
    /// # Arguments
    ///
    /// * `user_id` - This node's identity
    /// * `participants` - The full participant registry, this node included
    /// * `config` - Agreement configuration
    /// * `verifier` - Predicate candidate chains must pass before adoption
    pub fn new(
        user_id: UserId,
        participants: &[UserId],
        config: AgreementConfig,
        verifier: Arc<dyn ChainVerifier>,
    ) -> Self {
        Self {
            agreement: AgreementState::new(user_id.clone(), participants, config),
            mempool: MempoolState::new(user_id.clone()),
            ledger: LedgerState::new(verifier),
            user_id,
            now: Duration::ZERO,
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn agreement(&self) -> &AgreementState {
        &self.agreement
    }

    pub fn mempool(&self) -> &MempoolState {
        &self.mempool
    }

    pub fn ledger(&self) -> &LedgerState {
        &self.ledger
    }

    /// Initial timer arming at startup.
    pub fn bootstrap(&self) -> Vec<Action> {
        self.agreement.bootstrap()
    }

    /// Adopt a candidate chain if it is strictly longer and verifies, and
    /// re-enter agreement at the adopted height.
    fn adopt_chain(&mut self, chain: Blockchain) -> bool {
        if !self.ledger.try_adopt(chain) {
            return false;
        }
        for block in self.ledger.chain().to_vec() {
            self.mempool.prune_committed(&block);
        }
        self.agreement.on_chain_adopted(self.ledger.len());
        true
    }

    fn respond(request_id: RequestId, response: Response) -> Vec<Action> {
        vec![Action::Respond {
            request_id,
            response,
        }]
    }
}

impl StateMachine for NodeStateMachine {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            // ═══════════════════════════════════════════════════════════════
            // Timers
            // ═══════════════════════════════════════════════════════════════
            Event::RoundTimer => {
                let tip = self.ledger.tip_hash();
                self.agreement.on_round_timer(self.mempool.staged(), tip)
            }

            Event::AgreementTimer => self.agreement.on_agreement_timer(),

            // ═══════════════════════════════════════════════════════════════
            // Inbound RPCs
            // ═══════════════════════════════════════════════════════════════
            Event::ProposeBlockRequest { args, request_id } => {
                self.agreement.on_propose_block(args, request_id)
            }

            Event::VoteRequest { args, request_id } => self.agreement.on_vote(args, request_id),

            Event::AppendTransactionRequest { args, request_id } => {
                self.mempool.on_append_transaction(args, request_id)
            }

            Event::AppendBlockRequest { args, request_id } => {
                debug!(peer = %args.peer, len = args.chain.len(), "AppendBlock received");
                let adopted = self.adopt_chain(args.chain);
                Self::respond(request_id, Response::ack(adopted))
            }

            Event::RequestChainRequest { args, request_id } => {
                debug!(peer = %args.peer, "RequestBlockChain received");
                Self::respond(
                    request_id,
                    Response::Chain {
                        peer: self.user_id.clone(),
                        chain: self.ledger.chain().to_vec(),
                    },
                )
            }

            // ═══════════════════════════════════════════════════════════════
            // Client requests
            // ═══════════════════════════════════════════════════════════════
            Event::SubmitTransaction { tx, request_id } => {
                self.mempool.on_submit_transaction(tx, request_id)
            }

            // ═══════════════════════════════════════════════════════════════
            // Outbound completions
            // ═══════════════════════════════════════════════════════════════
            Event::ProposeBlockCompleted { peer, success } => {
                if success {
                    debug!(peer = %peer, "Proposal delivered");
                    Vec::new()
                } else {
                    // Either a transport failure or a Success=false reply
                    // (the peer is ahead); re-send the same proposal.
                    warn!(peer = %peer, "Proposal delivery failed; retrying");
                    self.agreement.retry_proposal(&peer)
                }
            }

            Event::VoteCompleted { peer, success } => {
                debug!(peer = %peer, success, "Vote delivery completed");
                Vec::new()
            }

            Event::AppendTransactionCompleted { peer, success } => {
                debug!(peer = %peer, success, "Transaction relay completed");
                Vec::new()
            }

            Event::ChainReceived { peer, chain } => {
                info!(peer = %peer, len = chain.len(), "Received chain from peer");
                self.adopt_chain(chain);
                Vec::new()
            }

            // ═══════════════════════════════════════════════════════════════
            // Internal
            // ═══════════════════════════════════════════════════════════════
            Event::RoundCommitted { value, block } => {
                self.ledger.append(block.clone());
                self.mempool.prune_committed(&block);
                self.agreement.on_round_committed(&value);
                Vec::new()
            }
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
        self.agreement.set_time(now);
    }

    fn now(&self) -> Duration {
        self.now
    }
}
