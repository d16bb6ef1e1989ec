//! hostfleet-state — node model for the hostfleet allocation core.
//!
//! Holds the read-only view of the node repository that allocation
//! decisions are made against: nodes with their lifecycle state, flavor,
//! and parent-host linkage, plus the [`ResourceCapacity`] vector used for
//! capacity accounting.
//!
//! # Architecture
//!
//! Persistence lives in the node repository itself. This crate only
//! models a snapshot of it: a [`NodeTable`] keyed by hostname, loadable
//! from the repository's JSON export. Parent relations are plain
//! hostnames resolved through [`NodeLookup`], so nothing here borrows
//! from the repository's mutable storage.

pub mod error;
pub mod resources;
pub mod table;
pub mod types;

pub use error::{StateError, StateResult};
pub use resources::ResourceCapacity;
pub use table::{NodeLookup, NodeTable};
pub use types::*;
