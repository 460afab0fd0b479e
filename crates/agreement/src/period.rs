//! Per-period tallies.

use sortis_types::{Block, Hash, Period, UserId, Value, VoteKind};
use std::collections::{BTreeMap, HashSet};

/// Live tallies for one period.
///
/// Created fresh at round start and on every period advance, mutated only by
/// the event loop, retained one generation (as the last-period record) and
/// then discarded.
///
/// Vote counting goes through [`record_vote`](Self::record_vote) /
/// [`count_own_vote`](Self::count_own_vote) only, so a voter set insert and
/// its tally increment are never separated.
#[derive(Debug, Clone, Default)]
pub struct PeriodState {
    period: Period,

    /// Proposer-credential-hash → proposed value. Ordered by credential
    /// hash bytes, which is exactly step 2's deterministic tie-break.
    proposed_values: BTreeMap<Hash, Value>,

    /// Value → block, populated as blocks are received or proposed.
    value_to_block: BTreeMap<Value, Block>,

    soft_votes: BTreeMap<Value, u64>,
    cert_votes: BTreeMap<Value, u64>,
    next_votes: BTreeMap<Value, u64>,

    have_soft_voted: HashSet<UserId>,
    have_cert_voted: HashSet<UserId>,
    have_next_voted: HashSet<UserId>,

    /// The value this node itself cert-voted this period, if any.
    my_cert_vote: Option<Value>,

    /// The value the node enters the period believing in. `⊥` in period 1,
    /// the own proposed block's hash thereafter.
    starting_value: Value,
}

impl PeriodState {
    /// A fresh period record with empty tallies and `startingValue = ⊥`.
    pub fn new(period: Period) -> Self {
        PeriodState {
            period,
            starting_value: Value::Bottom,
            ..Default::default()
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn starting_value(&self) -> Value {
        self.starting_value
    }

    pub fn set_starting_value(&mut self, value: Value) {
        self.starting_value = value;
    }

    pub fn my_cert_vote(&self) -> Option<Value> {
        self.my_cert_vote
    }

    pub fn set_my_cert_vote(&mut self, value: Value) {
        self.my_cert_vote = Some(value);
    }

    // ───────────────────────────────────────────────────────────────────────
    // Proposals
    // ───────────────────────────────────────────────────────────────────────

    /// Register a proposer's value (one entry per proposer credential) and
    /// its block.
    pub fn record_proposal(&mut self, proposer_hash: Hash, value: Value, block: Block) {
        self.proposed_values.insert(proposer_hash, value);
        self.value_to_block.insert(value, block);
    }

    /// The value proposed under the lowest credential hash, if any.
    pub fn lowest_proposal(&self) -> Option<Value> {
        self.proposed_values.values().next().copied()
    }

    /// Look a proposal up by its proposer credential hash (the retry path).
    pub fn proposal_for(&self, proposer_hash: &Hash) -> Option<(Value, &Block)> {
        let value = *self.proposed_values.get(proposer_hash)?;
        let block = self.value_to_block.get(&value)?;
        Some((value, block))
    }

    /// The block behind a value, when it is locally known.
    pub fn block_for(&self, value: &Value) -> Option<&Block> {
        self.value_to_block.get(value)
    }

    // ───────────────────────────────────────────────────────────────────────
    // Votes
    // ───────────────────────────────────────────────────────────────────────

    /// Whether `voter` was already counted for `kind` in this record.
    pub fn has_voted(&self, kind: VoteKind, voter: &UserId) -> bool {
        self.voters(kind).contains(voter)
    }

    /// Count a remote vote: tally increment plus dedup-set insert.
    ///
    /// The caller must have checked [`has_voted`](Self::has_voted) first;
    /// counting the same voter twice is a classifier bug.
    pub fn record_vote(&mut self, kind: VoteKind, voter: &UserId, value: Value) {
        debug_assert!(!self.has_voted(kind, voter), "duplicate vote slipped past the classifier");
        *self.tallies_mut(kind).entry(value).or_insert(0) += 1;
        self.voters_mut(kind).insert(voter.clone());
    }

    /// Count a remote vote whose tally belongs to an *older* record while
    /// the dedup set stays here: used when a vote tagged for the previous
    /// period arrives and the live classifier still owns deduplication.
    pub fn record_vote_into(&mut self, kind: VoteKind, voter: &UserId, value: Value, target: &mut PeriodState) {
        debug_assert!(!self.has_voted(kind, voter), "duplicate vote slipped past the classifier");
        *target.tallies_mut(kind).entry(value).or_insert(0) += 1;
        self.voters_mut(kind).insert(voter.clone());
    }

    /// Count this node's own vote.
    ///
    /// Idempotent per (kind, period), exactly like remote counting: a step-5
    /// next-vote after a step-4 next-vote is re-broadcast but not re-counted,
    /// which is also how every peer tallies it.
    pub fn count_own_vote(&mut self, kind: VoteKind, me: &UserId, value: Value) {
        if !self.voters_mut(kind).insert(me.clone()) {
            return;
        }
        *self.tallies_mut(kind).entry(value).or_insert(0) += 1;
    }

    /// The tally for `value` under `kind`.
    pub fn tally(&self, kind: VoteKind, value: &Value) -> u64 {
        self.tallies(kind).get(value).copied().unwrap_or(0)
    }

    /// The first value whose tally reaches `required`, skipping `⊥` when
    /// asked. At most one value can reach a Byzantine quorum, so "first in
    /// value order" is not a real choice.
    pub fn quorum_value(&self, kind: VoteKind, required: u64, skip_bottom: bool) -> Option<Value> {
        self.tallies(kind)
            .iter()
            .filter(|(value, _)| !(skip_bottom && value.is_bottom()))
            .find(|(_, tally)| **tally >= required)
            .map(|(value, _)| *value)
    }

    /// Number of voters counted for `kind` in this record.
    pub fn voter_count(&self, kind: VoteKind) -> usize {
        self.voters(kind).len()
    }

    /// Sum of all tallies for `kind` in this record.
    pub fn vote_total(&self, kind: VoteKind) -> u64 {
        self.tallies(kind).values().sum()
    }

    fn tallies(&self, kind: VoteKind) -> &BTreeMap<Value, u64> {
        match kind {
            VoteKind::Soft => &self.soft_votes,
            VoteKind::Cert => &self.cert_votes,
            VoteKind::Next => &self.next_votes,
        }
    }

    fn tallies_mut(&mut self, kind: VoteKind) -> &mut BTreeMap<Value, u64> {
        match kind {
            VoteKind::Soft => &mut self.soft_votes,
            VoteKind::Cert => &mut self.cert_votes,
            VoteKind::Next => &mut self.next_votes,
        }
    }

    fn voters(&self, kind: VoteKind) -> &HashSet<UserId> {
        match kind {
            VoteKind::Soft => &self.have_soft_voted,
            VoteKind::Cert => &self.have_cert_voted,
            VoteKind::Next => &self.have_next_voted,
        }
    }

    fn voters_mut(&mut self, kind: VoteKind) -> &mut HashSet<UserId> {
        match kind {
            VoteKind::Soft => &mut self.have_soft_voted,
            VoteKind::Cert => &mut self.have_cert_voted,
            VoteKind::Next => &mut self.have_next_voted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sortis_types::{Credential, Round};

    fn block(tag: &[u8]) -> Block {
        Block::new(Hash::ZERO, vec![sortis_types::Transaction::new(tag.to_vec())])
    }

    #[test]
    fn fresh_period_starts_at_bottom() {
        let state = PeriodState::new(Period(1));
        assert_eq!(state.starting_value(), Value::Bottom);
        assert_eq!(state.my_cert_vote(), None);
        assert_eq!(state.lowest_proposal(), None);
    }

    #[test]
    fn tally_matches_voter_count() {
        let mut state = PeriodState::new(Period(1));
        let voters = ["3001", "3002", "3003"].map(|s| UserId(s.into()));
        let value = Value::Block(Hash::of(b"v"));

        for voter in &voters {
            assert!(!state.has_voted(VoteKind::Soft, voter));
            state.record_vote(VoteKind::Soft, voter, value);
        }

        assert_eq!(state.tally(VoteKind::Soft, &value), 3);
        assert_eq!(state.voter_count(VoteKind::Soft), 3);
        assert_eq!(state.vote_total(VoteKind::Soft), 3);
        // Other kinds are untouched.
        assert_eq!(state.vote_total(VoteKind::Cert), 0);
    }

    #[test]
    fn own_vote_is_counted_once_per_kind() {
        let mut state = PeriodState::new(Period(1));
        let me = UserId("3001".into());

        // Step 4 votes ⊥, step 5 re-votes; only the first one counts.
        state.count_own_vote(VoteKind::Next, &me, Value::Bottom);
        state.count_own_vote(VoteKind::Next, &me, Value::Bottom);

        assert_eq!(state.tally(VoteKind::Next, &Value::Bottom), 1);
        assert_eq!(state.voter_count(VoteKind::Next), 1);
    }

    #[test]
    fn dedup_sets_are_per_kind() {
        let mut state = PeriodState::new(Period(1));
        let voter = UserId("3001".into());
        let value = Value::Block(Hash::of(b"v"));

        state.record_vote(VoteKind::Soft, &voter, value);
        assert!(state.has_voted(VoteKind::Soft, &voter));
        assert!(!state.has_voted(VoteKind::Cert, &voter));
        assert!(!state.has_voted(VoteKind::Next, &voter));
    }

    #[test]
    fn quorum_value_skips_bottom_when_asked() {
        let mut state = PeriodState::new(Period(1));
        for voter in ["a", "b", "c"] {
            state.record_vote(VoteKind::Next, &UserId(voter.into()), Value::Bottom);
        }
        assert_eq!(
            state.quorum_value(VoteKind::Next, 3, false),
            Some(Value::Bottom)
        );
        assert_eq!(state.quorum_value(VoteKind::Next, 3, true), None);

        let v = Value::Block(Hash::of(b"v"));
        let mut with_value = PeriodState::new(Period(2));
        for voter in ["a", "b", "c"] {
            with_value.record_vote(VoteKind::Next, &UserId(voter.into()), v);
        }
        assert_eq!(with_value.quorum_value(VoteKind::Next, 3, true), Some(v));
    }

    #[test]
    fn lowest_proposal_orders_by_credential_hash() {
        let mut state = PeriodState::new(Period(1));
        let mut entries: Vec<(Hash, Value)> = ["3004", "3002", "3003"]
            .iter()
            .map(|id| {
                let cred = Credential::proposal(&UserId(id.to_string()), Round(1), Period(1));
                let value = Value::Block(Hash::of(id.as_bytes()));
                (cred.proposer_hash(), value)
            })
            .collect();
        for (hash, value) in &entries {
            state.record_proposal(*hash, *value, block(b"b"));
        }
        entries.sort_by_key(|(hash, _)| *hash);
        assert_eq!(state.lowest_proposal(), Some(entries[0].1));
    }

    #[test]
    fn cross_period_counting_keeps_dedup_local() {
        let mut current = PeriodState::new(Period(2));
        let mut last = PeriodState::new(Period(1));
        let voter = UserId("3001".into());
        let value = Value::Block(Hash::of(b"v"));

        current.record_vote_into(VoteKind::Soft, &voter, value, &mut last);

        assert_eq!(last.tally(VoteKind::Soft, &value), 1);
        assert_eq!(current.tally(VoteKind::Soft, &value), 0);
        assert!(current.has_voted(VoteKind::Soft, &voter));
        assert!(!last.has_voted(VoteKind::Soft, &voter));
    }
}
