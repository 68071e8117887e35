//! In-memory `Store` backend.
//!
//! Uses `DashMap` for every collection, so reads and writes on different keys
//! never contend on a single lock.

use super::store::Store;
use super::types::*;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

#[derive(Default)]
pub struct MemoryStore {
    nodes: DashMap<String, Node>,
    /// Secondary index: public key -> node id.
    nodes_by_key: DashMap<String, String>,
    jobs: DashMap<String, Job>,
    proposals: DashMap<String, Proposal>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[cfg(test)]
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    #[cfg(test)]
    pub fn proposal_count(&self) -> usize {
        self.proposals.len()
    }
}

impl Store for MemoryStore {
    fn register_node(&self, node: Node) -> (Node, bool) {
        // Lock order is always nodes_by_key -> nodes.
        match self.nodes_by_key.entry(node.public_key.clone()) {
            Entry::Occupied(mut entry) => {
                if let Some(existing) = self.nodes.get(entry.get()) {
                    return (existing.value().clone(), false);
                }
                // Stale index entry without a node behind it.
                entry.insert(node.id.clone());
                self.nodes.insert(node.id.clone(), node.clone());
                (node, true)
            }
            Entry::Vacant(entry) => {
                self.nodes.insert(node.id.clone(), node.clone());
                entry.insert(node.id.clone());
                (node, true)
            }
        }
    }

    fn update_node(&self, id: &str, update: &mut dyn FnMut(&mut Node)) -> Option<Node> {
        let mut entry = self.nodes.get_mut(id)?;
        update(entry.value_mut());
        Some(entry.value().clone())
    }

    fn get_node(&self, id: &str) -> Option<Node> {
        self.nodes.get(id).map(|entry| entry.value().clone())
    }

    fn get_node_by_public_key(&self, public_key: &str) -> Option<Node> {
        let node_id = self.nodes_by_key.get(public_key)?.value().clone();
        self.get_node(&node_id)
    }

    fn node_exists(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    fn list_nodes(&self, filter: &NodeFilter) -> Vec<Node> {
        let mut nodes: Vec<Node> = self
            .nodes
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        nodes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        nodes
    }

    fn store_job(&self, job: Job) {
        self.jobs.insert(job.id.clone(), job);
    }

    fn get_job(&self, id: &str) -> Option<Job> {
        self.jobs.get(id).map(|entry| entry.value().clone())
    }

    fn list_jobs(&self, filter: &JobFilter) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    fn delete_job(&self, id: &str) -> Option<Job> {
        self.jobs.remove(id).map(|(_, job)| job)
    }

    fn store_proposal(&self, proposal: Proposal) {
        self.proposals.insert(proposal.id.clone(), proposal);
    }

    fn get_proposal(&self, id: &str) -> Option<Proposal> {
        self.proposals.get(id).map(|entry| entry.value().clone())
    }

    fn list_proposals(&self, filter: &ProposalFilter) -> Vec<Proposal> {
        let mut proposals: Vec<Proposal> = self
            .proposals
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        proposals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        proposals
    }
}
