//! Job Distributor Module
//!
//! The orchestration layer between callers, the `Store`, and the worker nodes.
//!
//! ## Proposal Lifecycle
//! Every `ProposeJob` creates a `PENDING` proposal and immediately tries to deliver
//! the job spec to the target node:
//! - delivered and accepted -> `APPROVED`, and the `Job` is created or linked;
//! - anything else -> `REJECTED`, with the delivery error kept as the reason.
//!
//! Either outcome may later be `REVOKED`. Mutations of one job are serialised
//! through a per-job async mutex; node I/O during a proposal runs outside it.
//!
//! ## Submodules
//! - **`service`**: `DistributorService`, every caller-facing operation.
//! - **`handlers`**: axum routes over the service.
//! - **`protocol`**: Routes and request/response DTOs.
//! - **`error`**: `DistributorError` and `DeliveryError`.

pub mod error;
pub mod handlers;
pub mod protocol;
pub mod service;

#[cfg(test)]
mod tests;
