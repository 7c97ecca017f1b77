//! Core value types for following a sharded ledger.
//!
//! These types are pure data: shard and nonce identifiers, the transaction
//! record fetched from the ledger gateway, and the predicates the finality
//! engine evaluates over them. No I/O happens in this crate.

mod identifiers;
mod transaction;

pub use identifiers::{Nonce, NonceByShard, Shard};
pub use transaction::{find_by_hash, DataDecodeError, Transaction, TransactionBuilder};
