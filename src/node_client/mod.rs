//! Worker Node Client Module
//!
//! Talks to the REST management API of each worker node and keeps its
//! authentication state alive.
//!
//! ## Authentication
//! Two mutually exclusive schemes are supported:
//! 1. **Session**: credentials are posted to `/sessions` and the node answers with a
//!    `clsession` cookie, which is attached to every later request.
//! 2. **Legacy**: credentials are posted to `/v2/authenticate`; later requests carry
//!    HTTP basic credentials.
//!
//! Session auth is always tried first. A `401` on a live call triggers exactly one
//! re-authentication and one retry of the same request.
//!
//! ## Submodules
//! - **`client`**: `NodeClient`, one per worker node.
//! - **`registry`**: `ClientRegistry`, node id -> authenticated `NodeClient`.
//! - **`jobspec`**: Line-based inspection of job specs (`externalJobID`, required fields).
//! - **`protocol`**: Endpoint paths and wire DTOs of the node API.
//! - **`types`**: Domain views of what a node reports (jobs, keys).
//! - **`error`**: `NodeClientError`.

pub mod client;
pub mod error;
pub mod jobspec;
pub mod protocol;
pub mod registry;
pub mod types;
