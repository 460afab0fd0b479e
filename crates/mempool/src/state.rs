//! Staging buffer state.

use sortis_core::{Action, OutboundMessage, RequestId};
use sortis_types::{AppendTransactionArgs, Block, Hash, Response, Transaction, UserId};
use std::collections::HashSet;
use tracing::{debug, info};

/// The cross-round transaction staging buffer.
///
/// Client submissions and peer relays append here; every step-1 block
/// preparation snapshots the current contents. Transactions survive round
/// boundaries until a committed or adopted block includes them.
///
/// Uses `HashSet` for dedup rather than anything concurrent: access is
/// serialized through the event loop.
pub struct MempoolState {
    /// This node's identity, stamped on relayed transactions.
    user_id: UserId,

    /// Staged transactions in arrival order.
    staged: Vec<Transaction>,

    /// Hashes of staged transactions, for duplicate suppression.
    seen: HashSet<Hash>,
}

impl MempoolState {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            staged: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// The staged transactions, in arrival order.
    pub fn staged(&self) -> &[Transaction] {
        &self.staged
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Handle a transaction submitted by a client: stage it and relay it to
    /// every peer.
    pub fn on_submit_transaction(&mut self, tx: Transaction, request_id: RequestId) -> Vec<Action> {
        let mut actions = Vec::new();

        if self.stage(tx.clone()) {
            info!(staged = self.staged.len(), "Transaction staged via client submission");
            actions.push(Action::Broadcast {
                message: OutboundMessage::AppendTransaction(AppendTransactionArgs {
                    tx,
                    peer: self.user_id.clone(),
                }),
            });
        } else {
            debug!("Duplicate client submission ignored");
        }

        actions.push(Action::Respond {
            request_id,
            response: Response::ack(true),
        });
        actions
    }

    /// Handle a transaction relayed by a peer. Always acknowledged.
    pub fn on_append_transaction(
        &mut self,
        args: AppendTransactionArgs,
        request_id: RequestId,
    ) -> Vec<Action> {
        if self.stage(args.tx) {
            debug!(peer = %args.peer, staged = self.staged.len(), "Transaction staged via peer relay");
        } else {
            debug!(peer = %args.peer, "Duplicate relayed transaction ignored");
        }

        vec![Action::Respond {
            request_id,
            response: Response::ack(true),
        }]
    }

    /// Drop staged transactions that a committed or adopted block carries.
    pub fn prune_committed(&mut self, block: &Block) {
        let committed: HashSet<Hash> = block.transactions.iter().map(Transaction::hash).collect();
        let before = self.staged.len();
        self.staged.retain(|tx| !committed.contains(&tx.hash()));
        for hash in &committed {
            self.seen.remove(hash);
        }
        if self.staged.len() != before {
            debug!(
                pruned = before - self.staged.len(),
                staged = self.staged.len(),
                "Pruned committed transactions from staging buffer"
            );
        }
    }

    fn stage(&mut self, tx: Transaction) -> bool {
        if !self.seen.insert(tx.hash()) {
            return false;
        }
        self.staged.push(tx);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_mempool() -> MempoolState {
        MempoolState::new(UserId("3001".into()))
    }

    #[test]
    fn submission_stages_relays_and_acks() {
        let mut mempool = make_mempool();
        let tx = Transaction::new(b"tx".to_vec());

        let actions = mempool.on_submit_transaction(tx.clone(), RequestId(1));
        assert_eq!(mempool.staged(), &[tx]);

        assert!(actions.iter().any(|a| matches!(
            a,
            Action::Broadcast {
                message: OutboundMessage::AppendTransaction(_)
            }
        )));
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::Respond { response, .. } if response.is_success()
        )));
    }

    #[test]
    fn peer_relay_is_always_acked() {
        let mut mempool = make_mempool();
        let args = AppendTransactionArgs {
            tx: Transaction::new(b"tx".to_vec()),
            peer: UserId("3002".into()),
        };

        let actions = mempool.on_append_transaction(args.clone(), RequestId(1));
        assert_eq!(mempool.len(), 1);
        assert!(matches!(
            &actions[..],
            [Action::Respond { response, .. }] if response.is_success()
        ));

        // The duplicate is dropped but still acknowledged.
        let actions = mempool.on_append_transaction(args, RequestId(2));
        assert_eq!(mempool.len(), 1);
        assert!(matches!(
            &actions[..],
            [Action::Respond { response, .. }] if response.is_success()
        ));
    }

    #[test]
    fn duplicate_submission_is_not_rebroadcast() {
        let mut mempool = make_mempool();
        let tx = Transaction::new(b"tx".to_vec());

        mempool.on_submit_transaction(tx.clone(), RequestId(1));
        let actions = mempool.on_submit_transaction(tx, RequestId(2));

        assert_eq!(mempool.len(), 1);
        assert!(!actions.iter().any(Action::is_network));
    }

    #[test]
    fn prune_drops_exactly_the_committed_transactions() {
        let mut mempool = make_mempool();
        let committed = Transaction::new(b"committed".to_vec());
        let pending = Transaction::new(b"pending".to_vec());
        mempool.on_submit_transaction(committed.clone(), RequestId(1));
        mempool.on_submit_transaction(pending.clone(), RequestId(2));

        mempool.prune_committed(&Block::new(Hash::ZERO, vec![committed.clone()]));
        assert_eq!(mempool.staged(), &[pending]);

        // A pruned transaction may be staged again later.
        let actions = mempool.on_submit_transaction(committed, RequestId(3));
        assert_eq!(mempool.len(), 2);
        assert!(actions.iter().any(Action::is_network));
    }
}
