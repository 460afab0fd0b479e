//! Agreement configuration.

use std::time::Duration;

/// Protocol cadence and sortition parameters.
#[derive(Debug, Clone)]
pub struct AgreementConfig {
    /// Interval of the round timer, which drives step 1 while the node is
    /// ready for a new round.
    pub round_interval: Duration,

    /// Interval of the agreement timer between steps 2-4. Long enough for
    /// peers to deliver proposals before step 2 runs.
    pub step_interval: Duration,

    /// Compressed agreement-timer interval while polling step 5, which may
    /// need several evaluations as next-votes trickle in.
    pub step5_poll_interval: Duration,

    /// Committee size `k`: seats drawn per (round, role).
    pub committee_size: u64,

    /// Minimum stake assigned to a participant.
    pub min_stake: u64,

    /// Maximum stake assigned to a participant.
    pub max_stake: u64,
}

impl Default for AgreementConfig {
    fn default() -> Self {
        Self {
            round_interval: Duration::from_secs(5),
            step_interval: Duration::from_secs(10),
            step5_poll_interval: Duration::from_secs(2),
            committee_size: 2,
            min_stake: 1,
            max_stake: 10,
        }
    }
}
