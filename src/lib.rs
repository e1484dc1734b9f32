//! # Ringbook
//!
//! An in-process limit-order matching benchmark: a synthetic generator
//! streams order messages through bounded lock-free rings into matching
//! workers, each of which owns a price-time-priority order book.
//!
//! ## Design Principles
//!
//! - **Single-Writer Books**: each worker exclusively owns one engine (no locks)
//! - **One Shared Structure**: the cell-seq ring is the only concurrent piece
//! - **O(1) Operations**: rest, cancel, and per-match work are constant time
//! - **Tick-Indexed Levels**: arrays + occupancy bitsets, no tree or hash walk
//! - **Pooled Nodes**: fixed arena, 32-bit indices, no hot-path allocation
//!
//! ## Architecture
//!
//! ```text
//! [Generator Thread] --> [RingQueue #0] --> [Worker 0: MatchingEngine]
//!                    --> [RingQueue #1] --> [Worker 1: MatchingEngine]
//!                    --> ...                          |
//!                                               [Shared Stats]
//! ```

pub mod bitset;
pub mod book;
pub mod config;
pub mod engine;
pub mod generator;
pub mod handle;
pub mod message;
pub mod pool;
pub mod queue;
pub mod stats;
pub mod worker;

// Re-exports for convenience
pub use book::{BookSide, PriceLevel, NO_PRICE};
pub use config::Config;
pub use engine::{MatchingEngine, DONE_FILL};
pub use generator::OrderGenerator;
pub use message::{MsgType, OrderIn, OrderMsg, Side, FLAG_FOK_RELAXED, FLAG_IOC};
pub use pool::{NodePool, OrderNode, PoolIndex, NIL};
pub use queue::RingQueue;
pub use stats::Stats;
pub use worker::{MatchingWorker, BATCH_SIZE};
