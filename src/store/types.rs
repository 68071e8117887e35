use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Key/value labels attached to nodes and jobs.
pub type Labels = BTreeMap<String, String>;

/// Identity and reachability record for a worker node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: String,
    pub name: String,
    /// CSA public key. Unique across nodes.
    pub public_key: String,
    pub labels: Labels,
    pub is_connected: bool,
    pub is_enabled: bool,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Node {
    /// Builds a freshly registered node with a random id.
    pub fn new(name: &str, public_key: &str, labels: Labels) -> Self {
        let now = now_ms();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            public_key: public_key.to_string(),
            labels,
            is_connected: true,
            is_enabled: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Lifecycle state of a proposal.
///
/// `Pending` moves to `Approved` or `Rejected` once delivery finishes.
/// Either outcome can later be `Revoked`. Nothing leaves `Revoked`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Revoked,
}

impl ProposalStatus {
    pub fn can_transition_to(self, next: ProposalStatus) -> bool {
        matches!(
            (self, next),
            (ProposalStatus::Pending, ProposalStatus::Approved)
                | (ProposalStatus::Pending, ProposalStatus::Rejected)
                | (ProposalStatus::Approved, ProposalStatus::Revoked)
                | (ProposalStatus::Rejected, ProposalStatus::Revoked)
        )
    }
}

/// Whether the payload reached the node transport layer.
/// Set once when the proposal is created.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Delivered,
    NotDelivered,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("proposal cannot move from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: ProposalStatus,
    pub to: ProposalStatus,
}

/// One attempt to deliver a job spec to one node. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Proposal {
    pub id: String,
    pub job_id: String,
    /// Node the proposal was addressed to.
    pub node_id: String,
    pub spec: String,
    pub status: ProposalStatus,
    pub delivery_status: DeliveryStatus,
    /// Why delivery failed, when the proposal ended `Rejected`.
    pub rejection_reason: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Proposal {
    pub fn new(job_id: &str, node_id: &str, spec: &str) -> Self {
        let now = now_ms();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            node_id: node_id.to_string(),
            spec: spec.to_string(),
            status: ProposalStatus::Pending,
            delivery_status: DeliveryStatus::Delivered,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the proposal to `next`, stamping `updated_at`.
    pub fn transition(&mut self, next: ProposalStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now_ms();
        Ok(())
    }
}

/// A spec that was delivered to and accepted by a node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    /// Same value as the job id carried by its proposals.
    pub id: String,
    pub node_id: String,
    /// Job identifier assigned by the node itself.
    pub remote_id: Option<String>,
    /// Every proposal that has ever targeted this job.
    pub proposal_ids: Vec<String>,
    pub labels: Labels,
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeFilter {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl NodeFilter {
    pub fn matches(&self, node: &Node) -> bool {
        if !self.ids.is_empty() && !self.ids.contains(&node.id) {
            return false;
        }
        match self.enabled {
            Some(enabled) => node.is_enabled == enabled,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFilter {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub node_ids: Vec<String>,
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        (self.ids.is_empty() || self.ids.contains(&job.id))
            && (self.node_ids.is_empty() || self.node_ids.contains(&job.node_id))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProposalFilter {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub job_ids: Vec<String>,
}

impl ProposalFilter {
    pub fn for_job(job_id: &str) -> Self {
        Self {
            ids: Vec::new(),
            job_ids: vec![job_id.to_string()],
        }
    }

    pub fn matches(&self, proposal: &Proposal) -> bool {
        (self.ids.is_empty() || self.ids.contains(&proposal.id))
            && (self.job_ids.is_empty() || self.job_ids.contains(&proposal.job_id))
    }
}

/// Helper to get the current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
