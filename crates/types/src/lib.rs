//! Foundational types for the sortis agreement engine.
//!
//! This crate provides the types shared by every other workspace crate:
//!
//! - **Primitives**: [`Hash`], the credential placeholders ([`Credential`],
//!   [`sign_message`])
//! - **Identifiers**: [`UserId`], [`Round`], [`Period`], [`Step`]
//! - **Agreement types**: [`Value`] (including `⊥`), [`Block`],
//!   [`Transaction`], [`SignedVote`]
//! - **RPC surface**: [`Request`] / [`Response`] and their argument structs
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not
//! depend on any other workspace crates, making it the foundation layer.

mod block;
mod credential;
mod hash;
mod identifiers;
mod rpc;
mod value;
mod vote;

pub use block::{tip_hash, Block, Blockchain, Transaction};
pub use credential::{sign_message, Credential};
pub use hash::{Hash, Hasher, HexError};
pub use identifiers::{Period, Round, Step, UserId};
pub use rpc::{
    AppendBlockArgs, AppendTransactionArgs, ProposeBlockArgs, Request, RequestChainArgs, Response,
    VoteArgs,
};
pub use value::{Value, BOTTOM_LITERAL};
pub use vote::{SignedVote, UnknownVoteKind, VoteKind};
