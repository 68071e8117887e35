use crate::node_client::error::NodeClientError;
use crate::node_client::jobspec::SpecError;
use crate::store::types::InvalidTransition;

use axum::http::StatusCode;
use thiserror::Error;

/// Why a spec did not reach (or was not accepted by) its node.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no client provisioned for node {0}")]
    NoClient(String),

    #[error("invalid job spec: {0}")]
    InvalidSpec(#[from] SpecError),

    #[error(transparent)]
    Node(#[from] NodeClientError),
}

#[derive(Debug, Error)]
pub enum DistributorError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

impl DistributorError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DistributorError::NotFound(_) => StatusCode::NOT_FOUND,
            DistributorError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            DistributorError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DistributorError::InvalidTransition(_) => StatusCode::CONFLICT,
            DistributorError::Delivery(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// A node reporting a missing resource is a plain `NotFound` for the caller.
impl From<NodeClientError> for DistributorError {
    fn from(err: NodeClientError) -> Self {
        match err {
            NodeClientError::NotFound(what) => DistributorError::NotFound(what),
            other => DistributorError::Delivery(DeliveryError::Node(other)),
        }
    }
}
