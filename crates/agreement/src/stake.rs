//! Stake registry and committee sortition.
//!
//! Every node computes the same stake assignment and candidate pool from the
//! sorted participant list, so the seeded committee draw agrees everywhere
//! without any communication. The draw stands in for a cryptographic VRF:
//! it keeps the properties the engine relies on (determinism, identical
//! selection on identical inputs) without real unforgeability.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sortis_types::{Hasher, Round, UserId};
use std::collections::BTreeMap;
use tracing::debug;

/// Committee role for the value-proposal step. The only role exercised;
/// sortition seeds on the role string, so per-step committees need no
/// structural change.
pub const ROLE_PROPOSER: &str = "proposer";

/// Stake weights and the weighted candidate pool they expand into.
#[derive(Debug, Clone)]
pub struct StakeRegistry {
    stakes: BTreeMap<UserId, u64>,
    candidates: Vec<UserId>,
}

impl StakeRegistry {
    /// Assign each participant a deterministic stake in `[min, max]` and
    /// expand the weighted candidate pool.
    ///
    /// `user_ids` must be the full sorted participant list; every node
    /// builds the registry from the same list and gets the same pool.
    pub fn new(user_ids: &[UserId], min_stake: u64, max_stake: u64) -> Self {
        assert!(min_stake > 0 && min_stake <= max_stake, "invalid stake bounds");

        let mut stakes = BTreeMap::new();
        let mut candidates = Vec::new();
        for user in user_ids {
            let stake = derive_stake(user, min_stake, max_stake);
            // user occupies `stake` slots in the pool
            for _ in 0..stake {
                candidates.push(user.clone());
            }
            stakes.insert(user.clone(), stake);
        }

        debug!(
            participants = stakes.len(),
            pool = candidates.len(),
            "Initialised stake registry"
        );

        Self { stakes, candidates }
    }

    /// The stake assigned to `user` (0 for unknown participants).
    pub fn stake_of(&self, user: &UserId) -> u64 {
        self.stakes.get(user).copied().unwrap_or(0)
    }

    /// The weighted candidate pool.
    pub fn candidates(&self) -> &[UserId] {
        &self.candidates
    }

    /// The number of committee seats `user` holds for `(round, role)`.
    pub fn seats(&self, round: Round, role: &str, user: &UserId, k: u64) -> u64 {
        if self.candidates.is_empty() {
            return 0;
        }
        let mut rng = draw_rng(round, role);
        let mut seats = 0;
        for _ in 0..k {
            let slot = rng.gen_range(0..self.candidates.len());
            if &self.candidates[slot] == user {
                seats += 1;
            }
        }
        seats
    }

    /// Whether `user` holds at least one seat for `(round, role)`.
    pub fn verify_sort(&self, round: Round, role: &str, user: &UserId, k: u64) -> bool {
        self.seats(round, role, user, k) >= 1
    }

    /// Every participant holding at least one seat for `(round, role)`.
    /// Mostly useful to tests and diagnostics.
    pub fn committee(&self, round: Round, role: &str, k: u64) -> Vec<UserId> {
        let mut members: Vec<UserId> = Vec::new();
        if self.candidates.is_empty() {
            return members;
        }
        let mut rng = draw_rng(round, role);
        for _ in 0..k {
            let slot = rng.gen_range(0..self.candidates.len());
            let user = &self.candidates[slot];
            if !members.contains(user) {
                members.push(user.clone());
            }
        }
        members
    }
}

/// Deterministic per-user stake in `[min, max]`.
fn derive_stake(user: &UserId, min: u64, max: u64) -> u64 {
    let digest = {
        let mut hasher = Hasher::new();
        hasher.update(b"stake").update(user.as_str().as_bytes());
        hasher.finalize()
    };
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    let span = max - min + 1;
    min + u64::from_le_bytes(prefix) % span
}

/// The seeded draw shared by selection and verification. Every node derives
/// the same RNG from `(round, role)`, so the k drawn slots agree everywhere.
fn draw_rng(round: Round, role: &str) -> ChaCha8Rng {
    let seed = {
        let mut hasher = Hasher::new();
        hasher
            .update(b"sortition")
            .update(&round.0.to_le_bytes())
            .update(role.as_bytes());
        hasher.finalize()
    };
    ChaCha8Rng::from_seed(*seed.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users(ids: &[&str]) -> Vec<UserId> {
        ids.iter().map(|s| UserId(s.to_string())).collect()
    }

    #[test]
    fn stakes_are_deterministic_and_bounded() {
        let ids = users(&["3001", "3002", "3003", "3004"]);
        let a = StakeRegistry::new(&ids, 1, 10);
        let b = StakeRegistry::new(&ids, 1, 10);
        for user in &ids {
            let stake = a.stake_of(user);
            assert!((1..=10).contains(&stake));
            assert_eq!(stake, b.stake_of(user));
        }
    }

    #[test]
    fn candidate_pool_is_stake_weighted() {
        let ids = users(&["3001", "3002"]);
        let registry = StakeRegistry::new(&ids, 1, 10);
        for user in &ids {
            let slots = registry
                .candidates()
                .iter()
                .filter(|c| *c == user)
                .count() as u64;
            assert_eq!(slots, registry.stake_of(user));
        }
    }

    #[test]
    fn draw_is_identical_across_registries() {
        let ids = users(&["3001", "3002", "3003", "3004"]);
        let a = StakeRegistry::new(&ids, 1, 10);
        let b = StakeRegistry::new(&ids, 1, 10);
        for round in 1..=20 {
            for user in &ids {
                assert_eq!(
                    a.seats(Round(round), ROLE_PROPOSER, user, 2),
                    b.seats(Round(round), ROLE_PROPOSER, user, 2),
                );
            }
        }
    }

    #[test]
    fn seats_sum_to_committee_size() {
        let ids = users(&["3001", "3002", "3003", "3004"]);
        let registry = StakeRegistry::new(&ids, 1, 10);
        for round in 1..=20 {
            let total: u64 = ids
                .iter()
                .map(|u| registry.seats(Round(round), ROLE_PROPOSER, u, 2))
                .sum();
            assert_eq!(total, 2);
        }
    }

    #[test]
    fn verify_sort_matches_seats() {
        let ids = users(&["3001", "3002", "3003", "3004"]);
        let registry = StakeRegistry::new(&ids, 1, 10);
        for round in 1..=20 {
            for user in &ids {
                let on_committee = registry.seats(Round(round), ROLE_PROPOSER, user, 2) >= 1;
                assert_eq!(
                    on_committee,
                    registry.verify_sort(Round(round), ROLE_PROPOSER, user, 2)
                );
            }
        }
    }

    #[test]
    fn different_rounds_rotate_the_committee() {
        let ids = users(&["3001", "3002", "3003", "3004", "3005", "3006"]);
        let registry = StakeRegistry::new(&ids, 1, 10);
        let committees: Vec<Vec<UserId>> = (1..=30)
            .map(|r| registry.committee(Round(r), ROLE_PROPOSER, 2))
            .collect();
        // The draw must not be constant across rounds.
        assert!(committees.windows(2).any(|w| w[0] != w[1]));
    }
}
