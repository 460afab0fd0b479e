//! Transaction staging buffer.
//!
//! Holds the transactions waiting to be packed into a block. Unlike the
//! period tallies this buffer lives across rounds: it drains only when a
//! committed or adopted block carries its transactions.

mod state;

pub use state::MempoolState;
