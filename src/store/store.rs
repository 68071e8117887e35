use super::types::*;

/// Storage backend for nodes, jobs, and proposals.
///
/// Implementations must be safe to call from many tasks at once. Every method is
/// individually atomic; callers that need read-modify-write across calls (the
/// job lifecycle) serialise themselves.
pub trait Store: Send + Sync {
    /// Inserts `node` unless another node already carries its public key.
    ///
    /// # Returns
    /// The stored node and `true` if it was created, or the existing node and `false`.
    fn register_node(&self, node: Node) -> (Node, bool);

    /// Applies `update` to the node in place and returns the updated copy.
    fn update_node(&self, id: &str, update: &mut dyn FnMut(&mut Node)) -> Option<Node>;

    fn get_node(&self, id: &str) -> Option<Node>;

    fn get_node_by_public_key(&self, public_key: &str) -> Option<Node>;

    fn node_exists(&self, id: &str) -> bool;

    /// Matching nodes, ordered by creation time then id.
    fn list_nodes(&self, filter: &NodeFilter) -> Vec<Node>;

    fn store_job(&self, job: Job);

    fn get_job(&self, id: &str) -> Option<Job>;

    fn list_jobs(&self, filter: &JobFilter) -> Vec<Job>;

    /// Removes a job, returning it if it was present.
    fn delete_job(&self, id: &str) -> Option<Job>;

    fn store_proposal(&self, proposal: Proposal);

    fn get_proposal(&self, id: &str) -> Option<Proposal>;

    fn list_proposals(&self, filter: &ProposalFilter) -> Vec<Proposal>;
}
