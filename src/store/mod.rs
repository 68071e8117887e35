//! Entity Store Module
//!
//! Holds the authoritative copies of the three entity collections the distributor
//! manages: worker nodes, jobs, and job proposals.
//!
//! ## Core Concepts
//! - **Interface**: Orchestration code only talks to the `Store` trait, so the
//!   in-memory backend can be swapped for a bounded or persistent one.
//! - **Indexing**: Every collection is keyed by id. Nodes carry a secondary index on
//!   their public key, which makes registration idempotent.
//! - **Filtering**: List operations take a filter struct; an empty filter returns
//!   the whole collection.
//! - **Ordering**: Listings are sorted by creation time, then id.

pub mod memory;
pub mod store;
pub mod types;
