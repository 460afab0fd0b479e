//! The in-memory ledger and its verification hook.

use sortis_types::{tip_hash, Block, Blockchain, Hash};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Opaque predicate deciding whether a candidate chain is acceptable.
///
/// Injected so the adoption rule never degenerates into accepting any
/// longer chain unseen.
pub trait ChainVerifier: Send + Sync {
    fn verify(&self, chain: &[Block]) -> bool;
}

/// Default verifier: every block must link to its predecessor's hash, with
/// the genesis block linking to [`Hash::ZERO`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkVerifier;

impl ChainVerifier for LinkVerifier {
    fn verify(&self, chain: &[Block]) -> bool {
        let mut expected_parent = Hash::ZERO;
        for block in chain {
            if block.parent != expected_parent {
                return false;
            }
            expected_parent = block.hash();
        }
        true
    }
}

/// Verifier that accepts anything. Test-and-bench escape hatch only.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl ChainVerifier for AcceptAll {
    fn verify(&self, _chain: &[Block]) -> bool {
        true
    }
}

/// The replicated ledger, owned by the event loop.
///
/// One block is appended per halted round; catch-up may replace the whole
/// chain with a strictly longer verified one.
pub struct LedgerState {
    chain: Blockchain,
    verifier: Arc<dyn ChainVerifier>,
}

impl LedgerState {
    pub fn new(verifier: Arc<dyn ChainVerifier>) -> Self {
        Self {
            chain: Vec::new(),
            verifier,
        }
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Hash of the chain tip, [`Hash::ZERO`] for an empty chain.
    pub fn tip_hash(&self) -> Hash {
        tip_hash(&self.chain)
    }

    /// Append the block committed by a halted round.
    pub fn append(&mut self, block: Block) {
        self.chain.push(block);
        info!(height = self.chain.len(), "Appended committed block");
    }

    /// Adopt a candidate chain iff it is strictly longer than ours and the
    /// verifier accepts it. Returns whether adoption happened.
    pub fn try_adopt(&mut self, candidate: Blockchain) -> bool {
        if candidate.len() <= self.chain.len() {
            debug!(
                ours = self.chain.len(),
                theirs = candidate.len(),
                "Candidate chain is not longer; keeping ours"
            );
            return false;
        }
        if !self.verifier.verify(&candidate) {
            warn!(len = candidate.len(), "Candidate chain failed verification");
            return false;
        }
        info!(
            from = self.chain.len(),
            to = candidate.len(),
            "Adopting longer verified chain"
        );
        self.chain = candidate;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sortis_types::Transaction;

    fn linked_chain(len: usize) -> Blockchain {
        let mut chain = Vec::new();
        let mut parent = Hash::ZERO;
        for i in 0..len {
            let block = Block::new(parent, vec![Transaction::new(vec![i as u8])]);
            parent = block.hash();
            chain.push(block);
        }
        chain
    }

    #[test]
    fn link_verifier_accepts_well_linked_chains() {
        assert!(LinkVerifier.verify(&linked_chain(0)));
        assert!(LinkVerifier.verify(&linked_chain(3)));
    }

    #[test]
    fn link_verifier_rejects_broken_links() {
        let mut chain = linked_chain(3);
        chain[1].parent = Hash::of(b"bogus");
        assert!(!LinkVerifier.verify(&chain));

        // Genesis must link to the zero hash.
        let mut chain = linked_chain(2);
        chain[0].parent = Hash::of(b"bogus");
        assert!(!LinkVerifier.verify(&chain));
    }

    #[test]
    fn adoption_requires_strictly_longer() {
        let mut ledger = LedgerState::new(Arc::new(LinkVerifier));
        assert!(ledger.try_adopt(linked_chain(2)));
        assert_eq!(ledger.len(), 2);

        // Same length is refused.
        assert!(!ledger.try_adopt(linked_chain(2)));
        // Shorter is refused.
        assert!(!ledger.try_adopt(linked_chain(1)));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn adoption_requires_verification() {
        let mut ledger = LedgerState::new(Arc::new(LinkVerifier));
        let mut chain = linked_chain(3);
        chain[2].parent = Hash::of(b"bogus");
        assert!(!ledger.try_adopt(chain.clone()));

        // The permissive verifier would have taken it.
        let mut permissive = LedgerState::new(Arc::new(AcceptAll));
        assert!(permissive.try_adopt(chain));
    }

    #[test]
    fn append_extends_the_tip() {
        let mut ledger = LedgerState::new(Arc::new(LinkVerifier));
        let block = Block::new(ledger.tip_hash(), vec![]);
        let hash = block.hash();
        ledger.append(block);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.tip_hash(), hash);
    }
}
