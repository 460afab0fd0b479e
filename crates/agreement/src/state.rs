//! BA★ agreement state machine.
//!
//! This module implements the per-round agreement state machine as a
//! synchronous, event-driven model: timers and classified RPCs come in,
//! broadcasts, responses and internal commits come out.

use crate::config::AgreementConfig;
use crate::period::PeriodState;
use crate::stake::{StakeRegistry, ROLE_PROPOSER};
use sortis_core::{Action, Event, OutboundMessage, RequestId, TimerId};
use sortis_types::{
    Block, Credential, Hash, Period, ProposeBlockArgs, RequestChainArgs, Response, Round,
    SignedVote, Step, Transaction, UserId, Value, VoteArgs, VoteKind,
};
use std::mem;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// The value to soft-vote in step 2, if any.
///
/// A next-vote quorum for a non-`⊥` value in the previous period wins
/// (committing to the carry-over); otherwise the value proposed under the
/// lowest credential hash this period.
pub fn soft_vote_choice(
    current: &PeriodState,
    last: Option<&PeriodState>,
    required_votes: u64,
) -> Option<Value> {
    if let Some(last) = last {
        if let Some(value) = last.quorum_value(VoteKind::Next, required_votes, true) {
            return Some(value);
        }
    }
    current.lowest_proposal()
}

/// The value to cert-vote in step 3, if any: a non-`⊥` soft-vote quorum
/// whose block is locally known.
pub fn cert_vote_choice(current: &PeriodState, required_votes: u64) -> Option<Value> {
    current
        .quorum_value(VoteKind::Soft, required_votes, true)
        .filter(|value| current.block_for(value).is_some())
}

/// The value to next-vote in step 4 (always votes): the own cert-vote if
/// one was cast, else the starting value if the previous period next-voted
/// it to quorum, else `⊥`.
pub fn next_vote_choice(
    current: &PeriodState,
    last: Option<&PeriodState>,
    required_votes: u64,
) -> Value {
    if let Some(value) = current.my_cert_vote() {
        return value;
    }
    let starting = current.starting_value();
    if !starting.is_bottom() {
        if let Some(last) = last {
            if last.tally(VoteKind::Next, &starting) >= required_votes {
                return starting;
            }
        }
    }
    Value::Bottom
}

/// The value to next-vote in step 5, if the fallback condition holds: a
/// `⊥` next-vote quorum this period (unless this node cert-voted), or a
/// non-`⊥` next-vote quorum in this or the previous period.
pub fn fallback_vote_choice(
    current: &PeriodState,
    last: Option<&PeriodState>,
    required_votes: u64,
) -> Option<Value> {
    if current.tally(VoteKind::Next, &Value::Bottom) >= required_votes
        && current.my_cert_vote().is_none()
    {
        return Some(Value::Bottom);
    }
    if let Some(value) = current.quorum_value(VoteKind::Next, required_votes, true) {
        return Some(value);
    }
    if let Some(last) = last {
        if let Some(value) = last.quorum_value(VoteKind::Next, required_votes, true) {
            return Some(value);
        }
    }
    None
}

/// The halting predicate: a non-`⊥` value with a cert-vote quorum whose
/// block is locally known. Only ever evaluated on the period that owns the
/// live tallies; cert quorums in the previous period do not halt.
pub fn halting_value(current: &PeriodState, required_votes: u64) -> Option<Value> {
    current
        .quorum_value(VoteKind::Cert, required_votes, true)
        .filter(|value| current.block_for(value).is_some())
}

/// Per-round agreement state machine.
///
/// Drives the committee through periods of five steps until a cert-vote
/// quorum halts the round. Owns the live period tallies; the composing node
/// owns the ledger and staging buffer and feeds them in where a step needs
/// them.
///
/// # State Machine Flow
///
/// 1. **Round timer** → If ready, freeze the proposal block and run step 1
/// 2. **Agreement timer** → Advance the step cursor and run steps 2-5
/// 3. **ProposeBlock received** → Verify sortition, register value/block
/// 4. **Vote received** → Classify into the owning period, re-check halting
/// 5. **Halting** → Emit the committed block; the node appends and resets
pub struct AgreementState {
    // ═══════════════════════════════════════════════════════════════════════
    // Identity & configuration
    // ═══════════════════════════════════════════════════════════════════════
    /// This node's identity.
    user_id: UserId,

    config: AgreementConfig,

    /// Stake weights and the sortition candidate pool, identical on every
    /// node.
    registry: StakeRegistry,

    /// Byzantine quorum `2⌊N/3⌋ + 1` over the peer count.
    required_votes: u64,

    // ═══════════════════════════════════════════════════════════════════════
    // Round position
    // ═══════════════════════════════════════════════════════════════════════
    round: Round,
    period: Period,
    step: Step,

    /// Whether the next round-timer tick may start step 1.
    ready_for_next_round: bool,

    /// The block this node proposes for the current round, frozen at round
    /// start and discarded on round advance.
    proposed_block: Option<Block>,

    // ═══════════════════════════════════════════════════════════════════════
    // Period tallies
    // ═══════════════════════════════════════════════════════════════════════
    period_state: PeriodState,

    /// Tallies for period `p - 1`; `None` in period 1. Step 2 and step 5
    /// both read its next-vote quorums, and late votes still land here.
    last_period_state: Option<PeriodState>,

    /// Current time (set by the runner before each handle call).
    now: Duration,
}

impl std::fmt::Debug for AgreementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgreementState")
            .field("user_id", &self.user_id)
            .field("round", &self.round)
            .field("period", &self.period)
            .field("step", &self.step)
            .field("ready_for_next_round", &self.ready_for_next_round)
            .finish()
    }
}

impl AgreementState {
    /// Create the agreement state for one participant.
    ///
    /// `participants` is the full sorted registry including this node;
    /// `required_votes` is derived from the peer count exactly as the
    /// bootstrap quorum check expects it.
    pub fn new(user_id: UserId, participants: &[UserId], config: AgreementConfig) -> Self {
        let mut sorted = participants.to_vec();
        sorted.sort();

        let peer_count = sorted.len().saturating_sub(1) as u64;
        let fault_tolerance = peer_count / 3;
        let required_votes = 2 * fault_tolerance + 1;

        let registry = StakeRegistry::new(&sorted, config.min_stake, config.max_stake);

        info!(
            user = %user_id,
            participants = sorted.len(),
            required_votes,
            "Initialised agreement state"
        );

        Self {
            user_id,
            config,
            registry,
            required_votes,
            round: Round(1),
            period: Period(1),
            step: Step::Propose,
            ready_for_next_round: true,
            proposed_block: None,
            period_state: PeriodState::new(Period(1)),
            last_period_state: None,
            now: Duration::ZERO,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn round(&self) -> Round {
        self.round
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn ready_for_next_round(&self) -> bool {
        self.ready_for_next_round
    }

    pub fn required_votes(&self) -> u64 {
        self.required_votes
    }

    pub fn proposed_block(&self) -> Option<&Block> {
        self.proposed_block.as_ref()
    }

    pub fn period_state(&self) -> &PeriodState {
        &self.period_state
    }

    pub fn last_period_state(&self) -> Option<&PeriodState> {
        self.last_period_state.as_ref()
    }

    pub fn registry(&self) -> &StakeRegistry {
        &self.registry
    }

    pub fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Initial timer arming at startup.
    pub fn bootstrap(&self) -> Vec<Action> {
        vec![
            Action::SetTimer {
                id: TimerId::Round,
                duration: self.config.round_interval,
            },
            Action::SetTimer {
                id: TimerId::Agreement,
                duration: self.config.step_interval,
            },
        ]
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Step 1: value proposal
    // ═══════════════════════════════════════════════════════════════════════

    /// Round-timer tick. Runs step 1 when the node is ready for a round:
    /// freezes the proposal block over the staged transactions, computes the
    /// sortition seats and broadcasts one proposal per seat.
    pub fn on_round_timer(&mut self, staged: &[Transaction], tip: Hash) -> Vec<Action> {
        let mut actions = Vec::new();

        if self.ready_for_next_round {
            info!(round = %self.round, period = %self.period, "Starting round");
            self.ready_for_next_round = false;

            // Step 2 must not run before peers can deliver their proposals.
            actions.push(Action::SetTimer {
                id: TimerId::Agreement,
                duration: self.config.step_interval,
            });

            // The proposal block is frozen at round start; later periods of
            // the same round re-propose the same block.
            let block = match &self.proposed_block {
                Some(block) => block.clone(),
                None => {
                    let block = Block::new(tip, staged.to_vec());
                    self.proposed_block = Some(block.clone());
                    block
                }
            };
            let value = Value::Block(block.hash());

            let seats = self.registry.seats(
                self.round,
                ROLE_PROPOSER,
                &self.user_id,
                self.config.committee_size,
            );

            if seats > 0 {
                let credential = Credential::proposal(&self.user_id, self.round, self.period);
                self.period_state
                    .record_proposal(credential.proposer_hash(), value, block.clone());

                debug!(seats, value = %value, "On the proposal committee; broadcasting");
                for _ in 0..seats {
                    actions.push(Action::Broadcast {
                        message: OutboundMessage::ProposeBlock(ProposeBlockArgs {
                            block: block.clone(),
                            credential: credential.clone(),
                            value,
                            round: self.round,
                            peer: self.user_id.clone(),
                        }),
                    });
                }
            } else {
                debug!(round = %self.round, "Not on the proposal committee");
            }
        }

        actions.push(Action::SetTimer {
            id: TimerId::Round,
            duration: self.config.round_interval,
        });
        actions
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Steps 2-5
    // ═══════════════════════════════════════════════════════════════════════

    /// Agreement-timer tick: advance the step cursor and run the step body.
    pub fn on_agreement_timer(&mut self) -> Vec<Action> {
        if !self.ready_for_next_round && self.step != Step::NextFallback {
            self.step = self.step.advanced();
        }

        let mut actions = match self.step {
            // Step 1 is driven by the round timer.
            Step::Propose => Vec::new(),
            Step::Soft => self.run_soft_step(),
            Step::Cert => self.run_cert_step(),
            Step::NextCommit => self.run_next_step(),
            Step::NextFallback => self.run_fallback_step(),
        };

        // Step 5 may need several evaluations as next-votes arrive, so it
        // polls on the short cadence.
        let interval = if self.step == Step::NextFallback {
            self.config.step5_poll_interval
        } else {
            self.config.step_interval
        };
        actions.push(Action::SetTimer {
            id: TimerId::Agreement,
            duration: interval,
        });
        actions
    }

    fn run_soft_step(&mut self) -> Vec<Action> {
        let choice = soft_vote_choice(
            &self.period_state,
            self.last_period_state.as_ref(),
            self.required_votes,
        );
        debug!(step = %self.step, choice = ?choice, "Soft-vote step");

        let Some(value) = choice else {
            return Vec::new();
        };
        self.period_state
            .count_own_vote(VoteKind::Soft, &self.user_id, value);
        vec![self.broadcast_vote(value, VoteKind::Soft)]
    }

    fn run_cert_step(&mut self) -> Vec<Action> {
        let choice = cert_vote_choice(&self.period_state, self.required_votes);
        debug!(step = %self.step, choice = ?choice, "Cert-vote step");

        let Some(value) = choice else {
            return Vec::new();
        };
        self.period_state.set_my_cert_vote(value);
        self.period_state
            .count_own_vote(VoteKind::Cert, &self.user_id, value);

        let mut actions = vec![self.broadcast_vote(value, VoteKind::Cert)];
        // The own vote may complete the quorum.
        actions.extend(self.check_halting());
        actions
    }

    fn run_next_step(&mut self) -> Vec<Action> {
        let value = next_vote_choice(
            &self.period_state,
            self.last_period_state.as_ref(),
            self.required_votes,
        );
        debug!(step = %self.step, value = %value, "Next-vote step");

        self.period_state
            .count_own_vote(VoteKind::Next, &self.user_id, value);
        vec![self.broadcast_vote(value, VoteKind::Next)]
    }

    fn run_fallback_step(&mut self) -> Vec<Action> {
        let choice = fallback_vote_choice(
            &self.period_state,
            self.last_period_state.as_ref(),
            self.required_votes,
        );

        let Some(value) = choice else {
            trace!(period = %self.period, "No fallback quorum yet; polling");
            return Vec::new();
        };
        debug!(step = %self.step, value = %value, "Fallback next-vote step");

        self.period_state
            .count_own_vote(VoteKind::Next, &self.user_id, value);
        let broadcast = self.broadcast_vote(value, VoteKind::Next);

        // Finish the period: the live record becomes the last-period record
        // (moved, not copied) and the fresh period starts from the own
        // proposed value.
        let starting = self
            .proposed_block
            .as_ref()
            .map(|block| Value::Block(block.hash()))
            .unwrap_or(Value::Bottom);

        self.period = Period(self.period.0 + 1);
        self.step = Step::Propose;
        let retired = mem::replace(&mut self.period_state, PeriodState::new(self.period));
        self.last_period_state = Some(retired);
        self.period_state.set_starting_value(starting);
        self.ready_for_next_round = true;

        info!(round = %self.round, period = %self.period, "Advanced period");
        vec![broadcast]
    }

    fn broadcast_vote(&self, value: Value, kind: VoteKind) -> Action {
        let vote = SignedVote::sign(&self.user_id, value, kind, self.period);
        Action::Broadcast {
            message: OutboundMessage::Vote(VoteArgs {
                vote,
                round: self.round,
                peer: self.user_id.clone(),
            }),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Halting
    // ═══════════════════════════════════════════════════════════════════════

    fn check_halting(&self) -> Vec<Action> {
        let Some(value) = halting_value(&self.period_state, self.required_votes) else {
            return Vec::new();
        };
        // halting_value only returns values with a known block
        let Some(block) = self.period_state.block_for(&value) else {
            return Vec::new();
        };
        info!(round = %self.round, value = %value, "Cert-vote quorum reached");
        vec![Action::EnqueueInternal {
            event: Event::RoundCommitted {
                value,
                block: block.clone(),
            },
        }]
    }

    /// Reset for the next round after the committed block was appended.
    pub fn on_round_committed(&mut self, value: &Value) {
        info!(round = %self.round, value = %value, "Agreement reached; advancing round");
        self.ready_for_next_round = true;
        self.round = Round(self.round.0 + 1);
        self.reset_periods();
    }

    /// Re-enter agreement after adopting a longer chain.
    pub fn on_chain_adopted(&mut self, chain_len: usize) {
        self.ready_for_next_round = true;
        self.round = Round(chain_len as u64);
        self.reset_periods();
        info!(round = %self.round, "Re-entering agreement after chain adoption");
    }

    fn reset_periods(&mut self) {
        self.period = Period(1);
        self.step = Step::Propose;
        self.last_period_state = None;
        self.period_state = PeriodState::new(self.period);
        self.proposed_block = None;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Inbound classification
    // ═══════════════════════════════════════════════════════════════════════

    /// Classify an inbound proposal.
    ///
    /// A proposal from ahead of our round means we are behind: reply
    /// `false` and pull chains from every peer. A proposer that fails
    /// sortition verification is accepted but not registered.
    pub fn on_propose_block(&mut self, args: ProposeBlockArgs, request_id: RequestId) -> Vec<Action> {
        if args.round > self.round {
            warn!(
                ours = %self.round,
                theirs = %args.round,
                "Round is behind peers; requesting chains"
            );
            return vec![
                Action::Broadcast {
                    message: OutboundMessage::RequestChain(RequestChainArgs {
                        peer: self.user_id.clone(),
                    }),
                },
                Action::Respond {
                    request_id,
                    response: Response::ack(false),
                },
            ];
        }

        let proposer = args.credential.user_id.clone();
        debug!(proposer = %proposer, round = %args.round, "ProposeBlock received");

        if self.registry.verify_sort(
            self.round,
            ROLE_PROPOSER,
            &proposer,
            self.config.committee_size,
        ) {
            info!(proposer = %proposer, round = %self.round, "Verified committee membership");
            self.period_state.record_proposal(
                args.credential.proposer_hash(),
                args.value,
                args.block,
            );
        } else {
            warn!(proposer = %proposer, round = %self.round, "Denied committee membership");
        }

        vec![Action::Respond {
            request_id,
            response: Response::ack(true),
        }]
    }

    /// Classify an inbound vote into the period that owns it.
    pub fn on_vote(&mut self, args: VoteArgs, request_id: RequestId) -> Vec<Action> {
        if args.round > self.round {
            warn!(
                ours = %self.round,
                theirs = %args.round,
                "Round is behind peers; requesting chains"
            );
            return vec![
                Action::Broadcast {
                    message: OutboundMessage::RequestChain(RequestChainArgs {
                        peer: self.user_id.clone(),
                    }),
                },
                Action::Respond {
                    request_id,
                    response: Response::ack(false),
                },
            ];
        }

        let vote = args.vote;
        if !vote.verify() {
            warn!(voter = %vote.voter, "Vote signature does not bind voter to payload");
            return vec![Action::Respond {
                request_id,
                response: Response::ack(false),
            }];
        }

        debug!(kind = %vote.kind, voter = %vote.voter, period = %vote.period, "Vote received");

        if self.period_state.has_voted(vote.kind, &vote.voter) {
            info!(
                kind = %vote.kind,
                voter = %vote.voter,
                "Ignoring vote: voter already counted for this kind this period"
            );
            return vec![Action::Respond {
                request_id,
                response: Response::ack(false),
            }];
        }

        if vote.period == self.period_state.period() {
            self.period_state
                .record_vote(vote.kind, &vote.voter, vote.value);
        } else if let Some(last) = self
            .last_period_state
            .as_mut()
            .filter(|last| last.period() == vote.period)
        {
            // Late vote for the previous period: the tally lands there, the
            // live record keeps owning deduplication.
            self.period_state
                .record_vote_into(vote.kind, &vote.voter, vote.value, last);
        } else {
            warn!(period = %vote.period, "Vote for a period we do not track");
            return vec![Action::Respond {
                request_id,
                response: Response::ack(false),
            }];
        }

        let mut actions = vec![Action::Respond {
            request_id,
            response: Response::ack(true),
        }];

        // Every counted cert vote may complete the quorum.
        if vote.kind == VoteKind::Cert {
            actions.extend(self.check_halting());
        }
        actions
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Outbound retry
    // ═══════════════════════════════════════════════════════════════════════

    /// Re-send the own proposal to a peer whose delivery failed, if this
    /// node actually proposed this round and period.
    pub fn retry_proposal(&self, peer: &UserId) -> Vec<Action> {
        let credential = Credential::proposal(&self.user_id, self.round, self.period);
        let Some((value, block)) = self.period_state.proposal_for(&credential.proposer_hash())
        else {
            return Vec::new();
        };

        debug!(peer = %peer, value = %value, "Retrying proposal delivery");
        vec![Action::SendTo {
            peer: peer.clone(),
            message: OutboundMessage::ProposeBlock(ProposeBlockArgs {
                block: block.clone(),
                credential,
                value,
                round: self.round,
                peer: self.user_id.clone(),
            }),
        }]
    }
}
