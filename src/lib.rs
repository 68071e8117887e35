//! Job Distributor Library
//!
//! Control plane that proposes job specs to a fleet of worker nodes, tracks each
//! proposal's lifecycle, and keeps an authenticated session with every node's
//! management API. The binary (`main.rs`) wires these modules behind HTTP.
//!
//! ## Architecture Modules
//! - **`store`**: In-memory, concurrency-safe repository of nodes, jobs, and proposals.
//! - **`node_client`**: Per-node REST client with session/legacy authentication
//!   and the registry of connected nodes.
//! - **`distributor`**: The proposal/job/node orchestration service and its HTTP API.
//! - **`config`**: Defaults, JSON file, and environment overrides.

pub mod config;
pub mod distributor;
pub mod node_client;
pub mod store;
