//! Distributor API Protocol
//!
//! Routes and JSON bodies of the caller-facing HTTP API. Entities are returned
//! as stored; timestamps are Unix milliseconds.

use crate::node_client::types::{Key, RemoteJob};
use crate::store::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const ENDPOINT_PROPOSE_JOB: &str = "/jobs/propose";
pub const ENDPOINT_BATCH_PROPOSE_JOB: &str = "/jobs/batch_propose";
pub const ENDPOINT_LIST_JOBS: &str = "/jobs/list";
pub const ENDPOINT_JOB: &str = "/jobs/:id";
pub const ENDPOINT_REVOKE_JOB: &str = "/jobs/:id/revoke";
pub const ENDPOINT_UPDATE_JOB: &str = "/jobs/:id/update";

pub const ENDPOINT_LIST_PROPOSALS: &str = "/proposals/list";
pub const ENDPOINT_PROPOSAL: &str = "/proposals/:id";

pub const ENDPOINT_LIST_NODES: &str = "/nodes/list";
pub const ENDPOINT_REGISTER_NODE: &str = "/nodes/register";
pub const ENDPOINT_NODE: &str = "/nodes/:id";
pub const ENDPOINT_ENABLE_NODE: &str = "/nodes/:id/enable";
pub const ENDPOINT_DISABLE_NODE: &str = "/nodes/:id/disable";
pub const ENDPOINT_UPDATE_NODE: &str = "/nodes/:id/update";
pub const ENDPOINT_NODE_CHAIN_CONFIGS: &str = "/nodes/:id/chain_configs";
pub const ENDPOINT_CONNECT_NODE: &str = "/nodes/:id/connect";
pub const ENDPOINT_NODE_HEALTH: &str = "/nodes/:id/health";
pub const ENDPOINT_NODE_KEYS: &str = "/nodes/:id/keys/:key_type";
pub const ENDPOINT_REMOTE_JOBS: &str = "/nodes/:id/remote_jobs";
pub const ENDPOINT_REMOTE_JOB: &str = "/nodes/:id/remote_jobs/:job_id";

pub const ENDPOINT_LIST_KEYPAIRS: &str = "/keypairs";
pub const ENDPOINT_GET_KEYPAIR: &str = "/keypair";

// --- Jobs & Proposals ---

#[derive(Debug, Serialize, Deserialize)]
pub struct ProposeJobRequest {
    pub node_id: String,
    pub spec: String,
    #[serde(default)]
    pub labels: Labels,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeJobResponse {
    pub proposal: Proposal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchProposeJobRequest {
    pub node_ids: Vec<String>,
    pub spec: String,
    #[serde(default)]
    pub labels: Labels,
}

/// Per-node outcome of a batch proposal, keyed by node id.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BatchProposeJobResponse {
    pub success_responses: BTreeMap<String, ProposeJobResponse>,
    pub failed_responses: BTreeMap<String, ProposeJobFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeJobFailure {
    pub error_message: String,
    /// Present when the proposal was persisted but ended `REJECTED`.
    pub proposal: Option<Proposal>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListJobsRequest {
    #[serde(default)]
    pub filter: JobFilter,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<Job>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetJobResponse {
    pub job: Job,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListProposalsRequest {
    #[serde(default)]
    pub filter: ProposalFilter,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListProposalsResponse {
    pub proposals: Vec<Proposal>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetProposalResponse {
    pub proposal: Proposal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevokeJobResponse {
    pub proposal: Proposal,
}

/// A delete that could not be carried out is reported, not raised.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteJobResponse {
    pub job_id: String,
    pub deleted: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateJobRequest {
    #[serde(default)]
    pub labels: Labels,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateJobResponse {
    pub job: Job,
}

// --- Nodes ---

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListNodesRequest {
    #[serde(default)]
    pub filter: NodeFilter,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListNodesResponse {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeResponse {
    pub node: Node,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterNodeRequest {
    pub name: String,
    pub public_key: String,
    #[serde(default)]
    pub labels: Labels,
}

/// Absent fields are left unchanged.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateNodeRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub labels: Option<Labels>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectNodeRequest {
    pub url: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeChainConfig {
    pub chain_id: String,
    pub chain_type: String,
    pub account_address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListNodeChainConfigsResponse {
    pub chain_configs: Vec<NodeChainConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeHealth {
    pub node_id: String,
    pub healthy: bool,
    /// `None` when the node does not report its build info.
    pub version: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListKeysResponse {
    pub keys: Vec<Key>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListRemoteJobsResponse {
    pub jobs: Vec<RemoteJob>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetRemoteJobResponse {
    pub job: RemoteJob,
}

// --- Keypairs ---

/// CSA keypair view, derived from a node's public key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypair {
    pub public_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListKeypairsResponse {
    pub keypairs: Vec<Keypair>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetKeypairResponse {
    pub keypair: Keypair,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
