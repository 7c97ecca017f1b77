//! Reference [`StateStorage`](shardtail_processor::StateStorage) backends.
//!
//! [`MemoryStorage`] keeps nonces in memory for tests and one-shot runs;
//! [`JsonFileStorage`] persists them as a JSON file so a follower survives
//! restarts. Neither backend persists the cross-shard ledger: tracking is
//! rebuilt through the restart buffer, which is exactly what the buffer is
//! for. A shard with no stored nonce starts from zero.

mod storage;

pub use storage::{JsonFileStorage, MemoryStorage};
