use super::error::{DeliveryError, DistributorError};
use super::protocol::*;

use crate::node_client::client::NodeClient;
use crate::node_client::jobspec::{extract_external_job_id, validate_job_spec};
use crate::node_client::registry::ClientRegistry;
use crate::node_client::types::{Credentials, Key, KeyType, RemoteJob};
use crate::store::store::Store;
use crate::store::types::*;

use dashmap::DashMap;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Entry point for every caller-facing operation.
///
/// State lives in the `Store`; node side effects go through the `ClientRegistry`.
/// There is no service-wide lock. Operations that read-modify-write one job take
/// that job's mutex, and never hold it across a proposal's delivery call.
pub struct DistributorService {
    store: Arc<dyn Store>,
    clients: Arc<ClientRegistry>,
    job_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl DistributorService {
    pub fn new(store: Arc<dyn Store>, clients: Arc<ClientRegistry>) -> Arc<Self> {
        Arc::new(Self {
            store,
            clients,
            job_locks: DashMap::new(),
        })
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    /// Takes the job's mutex, creating it on first use.
    ///
    /// The entry is evicted again when the guard drops and no other task holds
    /// or waits on it, so the map only tracks jobs with operations in flight.
    async fn lock_job(&self, job_id: &str) -> JobGuard<'_> {
        let mut held = JobGuard {
            locks: &self.job_locks,
            job_id: job_id.to_string(),
            guard: None,
        };
        let lock = self
            .job_locks
            .entry(job_id.to_string())
            .or_default()
            .value()
            .clone();
        held.guard = Some(lock.lock_owned().await);
        held
    }

    #[cfg(test)]
    pub(crate) fn tracked_job_locks(&self) -> usize {
        self.job_locks.len()
    }

    // --- Proposals ---

    /// Proposes a job spec to one node and records the outcome.
    ///
    /// The node id and spec are checked before any network call. A delivery
    /// failure is not an error: the returned proposal is `REJECTED` and carries
    /// the reason.
    pub async fn propose_job(
        &self,
        node_id: &str,
        spec: &str,
        labels: Labels,
    ) -> Result<Proposal, DistributorError> {
        require_id(node_id, "node id")?;
        if !self.store.node_exists(node_id) {
            return Err(DistributorError::NotFound(format!("node {}", node_id)));
        }
        if spec.trim().is_empty() {
            return Err(DistributorError::InvalidArgument(
                "job spec cannot be empty".to_string(),
            ));
        }

        let job_id = extract_external_job_id(spec)
            .unwrap_or_else(|| format!("job_{}", uuid::Uuid::new_v4()));

        let pending = Proposal::new(&job_id, node_id, spec);
        self.store.store_proposal(pending.clone());
        debug!(
            "Proposal {} for job {} created for node {}",
            pending.id, job_id, node_id
        );

        let outcome = self.deliver(node_id, spec).await;

        let _guard = self.lock_job(&job_id).await;

        let mut proposal = self.store.get_proposal(&pending.id).unwrap_or(pending);
        match outcome {
            Ok(remote) => {
                proposal.transition(ProposalStatus::Approved)?;
                self.link_job(&proposal, remote.id, labels);
                info!(
                    "Proposal {} approved: job {} running on node {}",
                    proposal.id, job_id, node_id
                );
            }
            Err(e) => {
                proposal.transition(ProposalStatus::Rejected)?;
                warn!(
                    "Proposal {} for job {} rejected: {}",
                    proposal.id, job_id, e
                );
                proposal.rejection_reason = Some(e.to_string());
            }
        }

        self.store.store_proposal(proposal.clone());
        Ok(proposal)
    }

    async fn deliver(&self, node_id: &str, spec: &str) -> Result<RemoteJob, DeliveryError> {
        let client = self
            .clients
            .get_client(node_id)
            .ok_or_else(|| DeliveryError::NoClient(node_id.to_string()))?;

        validate_job_spec(spec)?;

        Ok(client.create_job(spec).await?)
    }

    /// Creates the job for an approved proposal, or points an existing one at it.
    /// Caller holds the job lock.
    fn link_job(&self, proposal: &Proposal, remote_id: String, labels: Labels) {
        let now = now_ms();

        let job = match self.store.get_job(&proposal.job_id) {
            Some(mut job) => {
                if !job.proposal_ids.contains(&proposal.id) {
                    job.proposal_ids.push(proposal.id.clone());
                }
                job.node_id = proposal.node_id.clone();
                job.remote_id = Some(remote_id);
                job.labels = labels;
                job.updated_at = now;
                job
            }
            None => Job {
                id: proposal.job_id.clone(),
                node_id: proposal.node_id.clone(),
                remote_id: Some(remote_id),
                proposal_ids: vec![proposal.id.clone()],
                labels,
                created_at: now,
                updated_at: now,
            },
        };

        self.store.store_job(job);
    }

    /// Proposes the same spec to every distinct node concurrently.
    ///
    /// Never fails as a whole. A node lands in `failed_responses` when its
    /// proposal errored or ended `REJECTED`; successful nodes are not rolled back.
    pub async fn batch_propose_job(
        &self,
        node_ids: &[String],
        spec: &str,
        labels: Labels,
    ) -> BatchProposeJobResponse {
        let mut seen = HashSet::new();
        let targets: Vec<&str> = node_ids
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect();

        let labels = &labels;
        let attempts = targets.into_iter().map(|node_id| async move {
            let result = self.propose_job(node_id, spec, labels.clone()).await;
            (node_id.to_string(), result)
        });

        let mut response = BatchProposeJobResponse::default();
        for (node_id, result) in join_all(attempts).await {
            match result {
                Ok(proposal) if proposal.status == ProposalStatus::Rejected => {
                    let error_message = proposal
                        .rejection_reason
                        .clone()
                        .unwrap_or_else(|| "proposal rejected".to_string());
                    response.failed_responses.insert(
                        node_id,
                        ProposeJobFailure {
                            error_message,
                            proposal: Some(proposal),
                        },
                    );
                }
                Ok(proposal) => {
                    response
                        .success_responses
                        .insert(node_id, ProposeJobResponse { proposal });
                }
                Err(e) => {
                    response.failed_responses.insert(
                        node_id,
                        ProposeJobFailure {
                            error_message: e.to_string(),
                            proposal: None,
                        },
                    );
                }
            }
        }

        info!(
            "Batch proposal finished: {} succeeded, {} failed",
            response.success_responses.len(),
            response.failed_responses.len()
        );
        response
    }

    pub fn list_proposals(&self, filter: &ProposalFilter) -> Vec<Proposal> {
        self.store.list_proposals(filter)
    }

    pub fn get_proposal(&self, id: &str) -> Result<Proposal, DistributorError> {
        require_id(id, "proposal id")?;
        self.store
            .get_proposal(id)
            .ok_or_else(|| DistributorError::NotFound(format!("proposal {}", id)))
    }

    // --- Jobs ---

    pub fn list_jobs(&self, filter: &JobFilter) -> Vec<Job> {
        self.store.list_jobs(filter)
    }

    pub fn get_job(&self, id: &str) -> Result<Job, DistributorError> {
        require_id(id, "job id")?;
        self.store
            .get_job(id)
            .ok_or_else(|| DistributorError::NotFound(format!("job {}", id)))
    }

    /// Revokes the job's current proposal: the most recently updated one, ties
    /// going to the smallest proposal id.
    pub async fn revoke_job(&self, job_id: &str) -> Result<Proposal, DistributorError> {
        require_id(job_id, "job id")?;

        let _guard = self.lock_job(job_id).await;

        let mut proposal = self
            .store
            .list_proposals(&ProposalFilter::for_job(job_id))
            .into_iter()
            .max_by(|a, b| {
                a.updated_at
                    .cmp(&b.updated_at)
                    .then_with(|| b.id.cmp(&a.id))
            })
            .ok_or_else(|| DistributorError::NotFound(format!("no proposals for job {}", job_id)))?;

        proposal.transition(ProposalStatus::Revoked)?;
        self.store.store_proposal(proposal.clone());

        info!("Proposal {} of job {} revoked", proposal.id, job_id);
        Ok(proposal)
    }

    /// Deletes the job on its node, then locally.
    ///
    /// Nothing is raised when the job, its client, or the node-side delete is
    /// missing or fails: the job stays and the response says why.
    pub async fn delete_job(&self, job_id: &str) -> Result<DeleteJobResponse, DistributorError> {
        require_id(job_id, "job id")?;

        let _guard = self.lock_job(job_id).await;

        let Some(job) = self.store.get_job(job_id) else {
            debug!("Delete of unknown job {} ignored", job_id);
            return Ok(DeleteJobResponse {
                job_id: job_id.to_string(),
                deleted: false,
                reason: Some(format!("job {} not found", job_id)),
            });
        };

        match self.delete_job_from_node(&job).await {
            Ok(()) => {
                self.store.delete_job(job_id);
                info!("Job {} deleted from node {}", job_id, job.node_id);
                Ok(DeleteJobResponse {
                    job_id: job_id.to_string(),
                    deleted: true,
                    reason: None,
                })
            }
            Err(e) => {
                warn!("Job {} kept, node-side delete failed: {}", job_id, e);
                Ok(DeleteJobResponse {
                    job_id: job_id.to_string(),
                    deleted: false,
                    reason: Some(e.to_string()),
                })
            }
        }
    }

    async fn delete_job_from_node(&self, job: &Job) -> Result<(), DeliveryError> {
        let client = self
            .clients
            .get_client(&job.node_id)
            .ok_or_else(|| DeliveryError::NoClient(job.node_id.clone()))?;

        let remote_id = job.remote_id.as_deref().unwrap_or(&job.id);
        client.delete_job(remote_id).await?;
        Ok(())
    }

    /// Replaces the job's labels. The job spec on the node is left as is.
    pub async fn update_job(&self, job_id: &str, labels: Labels) -> Result<Job, DistributorError> {
        require_id(job_id, "job id")?;

        let _guard = self.lock_job(job_id).await;

        let mut job = self
            .store
            .get_job(job_id)
            .ok_or_else(|| DistributorError::NotFound(format!("job {}", job_id)))?;

        if !self.clients.contains(&job.node_id) {
            return Err(DistributorError::Internal(format!(
                "no client provisioned for node {}",
                job.node_id
            )));
        }

        job.labels = labels;
        job.updated_at = now_ms();
        self.store.store_job(job.clone());

        Ok(job)
    }

    // --- Nodes ---

    /// Registers a node, or returns the existing one carrying the same public key.
    pub fn register_node(
        &self,
        name: &str,
        public_key: &str,
        labels: Labels,
    ) -> Result<Node, DistributorError> {
        if public_key.trim().is_empty() {
            return Err(DistributorError::InvalidArgument(
                "public key is required".to_string(),
            ));
        }

        let (node, created) = self
            .store
            .register_node(Node::new(name, public_key, labels));

        if created {
            info!("Registered node {} ({})", node.id, node.name);
        } else {
            debug!("Node with public key {} already registered as {}", public_key, node.id);
        }
        Ok(node)
    }

    pub fn list_nodes(&self, filter: &NodeFilter) -> Vec<Node> {
        self.store.list_nodes(filter)
    }

    pub fn get_node(&self, id: &str) -> Result<Node, DistributorError> {
        require_id(id, "node id")?;
        self.store
            .get_node(id)
            .ok_or_else(|| DistributorError::NotFound(format!("node {}", id)))
    }

    pub fn enable_node(&self, id: &str) -> Result<Node, DistributorError> {
        self.set_enabled(id, true)
    }

    pub fn disable_node(&self, id: &str) -> Result<Node, DistributorError> {
        self.set_enabled(id, false)
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> Result<Node, DistributorError> {
        let node = self.modify_node(id, &mut |node| node.is_enabled = enabled)?;
        info!("Node {} enabled={}", id, enabled);
        Ok(node)
    }

    pub fn update_node(
        &self,
        id: &str,
        name: Option<String>,
        labels: Option<Labels>,
    ) -> Result<Node, DistributorError> {
        self.modify_node(id, &mut |node| {
            if let Some(name) = &name {
                node.name = name.clone();
            }
            if let Some(labels) = &labels {
                node.labels = labels.clone();
            }
        })
    }

    fn modify_node(
        &self,
        id: &str,
        change: &mut dyn FnMut(&mut Node),
    ) -> Result<Node, DistributorError> {
        require_id(id, "node id")?;
        self.store
            .update_node(id, &mut |node| {
                change(node);
                node.updated_at = now_ms();
            })
            .ok_or_else(|| DistributorError::NotFound(format!("node {}", id)))
    }

    /// Chain configurations are not tracked; known nodes report none.
    pub fn list_node_chain_configs(
        &self,
        node_id: &str,
    ) -> Result<Vec<NodeChainConfig>, DistributorError> {
        self.get_node(node_id)?;
        Ok(Vec::new())
    }

    /// Provisions a client for a registered node and marks it connected.
    ///
    /// Authentication failure leaves the node without a client, dropping any
    /// client a previous connect provisioned.
    pub async fn connect_node(
        &self,
        node_id: &str,
        url: &str,
        credentials: Credentials,
    ) -> Result<Node, DistributorError> {
        self.get_node(node_id)?;
        if url.trim().is_empty() {
            return Err(DistributorError::InvalidArgument(
                "node url is required".to_string(),
            ));
        }

        if let Err(e) = self.clients.add_node(node_id, url, credentials).await {
            if self.clients.remove_node(node_id).is_some() {
                warn!("Node {} re-connect failed, dropped its previous client", node_id);
                self.modify_node(node_id, &mut |node| node.is_connected = false)?;
            }
            return Err(DistributorError::Delivery(e.into()));
        }

        self.modify_node(node_id, &mut |node| node.is_connected = true)
    }

    // --- Node passthrough reads ---

    fn require_client(&self, node_id: &str) -> Result<Arc<NodeClient>, DistributorError> {
        self.get_node(node_id)?;
        self.clients.get_client(node_id).ok_or_else(|| {
            DistributorError::Internal(format!("no client provisioned for node {}", node_id))
        })
    }

    pub async fn node_health(&self, node_id: &str) -> Result<NodeHealth, DistributorError> {
        let client = self.require_client(node_id)?;

        let healthy = client.is_healthy().await;
        let version = match client.get_version().await {
            Ok(version) => Some(version),
            Err(e) => {
                debug!("Node {} did not report a version: {}", node_id, e);
                None
            }
        };

        Ok(NodeHealth {
            node_id: node_id.to_string(),
            healthy,
            version,
        })
    }

    pub async fn list_node_keys(
        &self,
        node_id: &str,
        key_type: KeyType,
    ) -> Result<Vec<Key>, DistributorError> {
        let client = self.require_client(node_id)?;
        Ok(client.get_keys(key_type).await?)
    }

    pub async fn list_remote_jobs(&self, node_id: &str) -> Result<Vec<RemoteJob>, DistributorError> {
        let client = self.require_client(node_id)?;
        Ok(client.list_jobs().await?)
    }

    pub async fn get_remote_job(
        &self,
        node_id: &str,
        job_id: &str,
    ) -> Result<RemoteJob, DistributorError> {
        let client = self.require_client(node_id)?;
        require_id(job_id, "job id")?;
        Ok(client.get_job(job_id).await?)
    }

    // --- Keypairs ---

    /// CSA keypairs of all nodes carrying a public key, oldest node first.
    pub fn list_keypairs(&self) -> Vec<Keypair> {
        self.store
            .list_nodes(&NodeFilter::default())
            .into_iter()
            .filter(|node| !node.public_key.is_empty())
            .map(|node| Keypair {
                public_key: node.public_key,
            })
            .collect()
    }

    pub fn get_keypair(&self) -> Result<Keypair, DistributorError> {
        self.list_keypairs()
            .into_iter()
            .next()
            .ok_or_else(|| DistributorError::NotFound("no keypair registered".to_string()))
    }
}

struct JobGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    job_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        // Releases the guard's Arc first; the map entry is then the only owner
        // unless another task has cloned it under the shard lock.
        drop(self.guard.take());
        self.locks
            .remove_if(&self.job_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn require_id(id: &str, what: &str) -> Result<(), DistributorError> {
    if id.is_empty() {
        return Err(DistributorError::InvalidArgument(format!("{} is required", what)));
    }
    Ok(())
}
