//! Simulated network conditions.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use sortis_core::OutboundMessage;
use std::time::Duration;

/// Simulated network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Number of nodes in the simulation.
    pub num_nodes: usize,

    /// Base one-way delivery latency.
    pub latency: Duration,

    /// Fraction of the base latency applied as symmetric jitter.
    pub jitter_fraction: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            num_nodes: 4,
            latency: Duration::from_millis(10),
            jitter_fraction: 0.1,
        }
    }
}

/// Message delivery policy: latency, jitter, and targeted drops.
pub struct SimulatedNetwork {
    config: NetworkConfig,

    /// Drop all `ProposeBlock` traffic. Starves step 2 of foreign
    /// proposals, which is the lever for forcing period rollovers.
    drop_proposals: bool,
}

impl SimulatedNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            drop_proposals: false,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Toggle dropping of proposal traffic.
    pub fn set_drop_proposals(&mut self, drop: bool) {
        self.drop_proposals = drop;
    }

    /// Whether this message is dropped instead of delivered.
    pub fn should_drop(&self, message: &OutboundMessage) -> bool {
        self.drop_proposals && matches!(message, OutboundMessage::ProposeBlock(_))
    }

    /// One-way delivery delay with seeded jitter.
    pub fn delay(&self, rng: &mut ChaCha8Rng) -> Duration {
        let base = self.config.latency.as_secs_f64();
        let jitter = base * self.config.jitter_fraction;
        let sampled = if jitter > 0.0 {
            rng.gen_range((base - jitter)..=(base + jitter))
        } else {
            base
        };
        Duration::from_secs_f64(sampled.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn delay_stays_within_jitter_bounds() {
        let network = SimulatedNetwork::new(NetworkConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..100 {
            let delay = network.delay(&mut rng);
            assert!(delay >= Duration::from_millis(9));
            assert!(delay <= Duration::from_millis(11));
        }
    }

    #[test]
    fn proposal_drop_is_targeted() {
        use sortis_types::{
            Block, Credential, Hash, Period, ProposeBlockArgs, RequestChainArgs, Round, UserId,
            Value,
        };

        let mut network = SimulatedNetwork::new(NetworkConfig::default());
        let peer = UserId("3001".into());
        let pull = OutboundMessage::RequestChain(RequestChainArgs { peer: peer.clone() });
        let block = Block::new(Hash::ZERO, vec![]);
        let proposal = OutboundMessage::ProposeBlock(ProposeBlockArgs {
            value: Value::Block(block.hash()),
            credential: Credential::proposal(&peer, Round(1), Period(1)),
            block,
            round: Round(1),
            peer,
        });

        assert!(!network.should_drop(&pull));
        assert!(!network.should_drop(&proposal));

        network.set_drop_proposals(true);
        assert!(network.should_drop(&proposal));
        assert!(!network.should_drop(&pull), "only proposals are dropped");
    }
}
