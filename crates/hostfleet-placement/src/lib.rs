//! hostfleet allocation core — candidate prioritization and node selection.
//!
//! Given a snapshot of the node repository and one allocation request,
//! this crate decides which nodes the request gets and in what order. It
//! never writes to the repository: the caller commits the chosen nodes
//! through its own transactional path.
//!
//! # Components
//!
//! - **`candidate`** — A node plus its allocation-time context
//! - **`priority`** — The staged total order over candidates
//! - **`allocator`** — Greedy selection with per-host capacity tracking
//! - **`pool`** — Candidate construction from a `NodeTable`
//! - **`capacity`** / **`spares`** — Host free capacity and spare-host policy
//! - **`config`** — Spare count and packing strategy
//!
//! # Flow
//!
//! ```text
//! NodeTable ──► CandidatePool ──► rank_candidates / allocate ──► Allocation
//!                 │                    │
//!                 ├─ HostCapacity      └─ priority::sort_candidates
//!                 └─ SpareHosts
//! ```

pub mod allocator;
pub mod candidate;
pub mod capacity;
pub mod config;
pub mod error;
pub mod pool;
pub mod priority;
pub mod spares;

pub use allocator::{Allocation, AllocationRequest, allocate, rank_candidates};
pub use candidate::{CandidateNode, CandidateOptions};
pub use capacity::HostCapacity;
pub use config::AllocationConfig;
pub use error::{AllocationError, AllocationResult};
pub use hostfleet_state::ResourceCapacity;
pub use pool::CandidatePool;
pub use priority::{Decision, PackingStrategy, PriorityStage, compare, decide, sort_candidates};
pub use spares::SpareHosts;
