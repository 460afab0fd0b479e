//! BA★ agreement state machine.
//!
//! This crate provides a synchronous implementation of the Algorand-style
//! BA★ agreement protocol that can be used for both simulation and
//! production.
//!
//! # Architecture
//!
//! The agreement state machine processes events synchronously:
//!
//! - Round timer → freeze the proposal block and run step 1 (value proposal)
//! - Agreement timer → advance the step cursor and run steps 2-5
//! - `ProposeBlock` received → verify sortition, register the value
//! - `Vote` received → classify into the owning period, re-check halting
//!
//! All I/O is performed by the runner via returned `Action`s.
//!
//! # Terminology
//!
//! - **Round**: One ledger-append cycle. Advances only on halting (or when
//!   a longer chain is adopted during catch-up).
//!
//! - **Period**: A retry slot within a round. Step 5's fallback quorum ends
//!   a period; the retiring tallies stay live one more generation because
//!   steps 2 and 5 of the next period read its next-vote quorums, and late
//!   votes may still land there.
//!
//! - **Step (1-5)**: Value proposal, soft-vote, cert-vote, next-vote of the
//!   committed value, next-vote of the fallback.
//!
//! - **Halting**: A cert-vote quorum for a single non-`⊥` value whose block
//!   is locally known; commits that block.
//!
//! # Safety
//!
//! - Each voter is counted at most once per (period, vote kind): the dedup
//!   set insert and the tally increment go through a single choke point.
//!
//! - Quorum intersection: any two quorums of `2⌊N/3⌋ + 1` overlap in an
//!   honest voter, so conflicting non-`⊥` values cannot both reach a
//!   cert-vote quorum in the same period.

mod config;
mod period;
mod stake;
mod state;

pub use config::AgreementConfig;
pub use period::PeriodState;
pub use stake::{StakeRegistry, ROLE_PROPOSER};
pub use state::{
    cert_vote_choice, fallback_vote_choice, halting_value, next_vote_choice, soft_vote_choice,
    AgreementState,
};
