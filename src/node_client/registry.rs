//! Node Client Registry
//!
//! Maps node ids to authenticated `NodeClient`s. A client only enters the
//! registry after its first successful authentication.

use super::client::NodeClient;
use super::error::NodeClientError;
use super::types::Credentials;

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ClientRegistry {
    clients: DashMap<String, Arc<NodeClient>>,
    timeout: Duration,
}

impl ClientRegistry {
    /// Creates an empty registry whose clients use `timeout` per HTTP call.
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            clients: DashMap::new(),
            timeout,
        })
    }

    /// Connects to a node and registers its client.
    ///
    /// All-or-nothing: if authentication fails the registry is left untouched.
    /// Re-adding a known id replaces the previous client.
    pub async fn add_node(
        &self,
        node_id: &str,
        url: &str,
        credentials: Credentials,
    ) -> Result<Arc<NodeClient>, NodeClientError> {
        let client = NodeClient::new(node_id, url, credentials, self.timeout)?;
        client.authenticate().await?;

        let scheme = if client.has_session().await { "session" } else { "legacy" };
        let client = Arc::new(client);
        if self
            .clients
            .insert(node_id.to_string(), client.clone())
            .is_some()
        {
            tracing::info!("Replaced client for node {} ({} auth)", node_id, scheme);
        } else {
            tracing::info!(
                "Connected to node {} at {} ({} auth)",
                node_id,
                client.base_url(),
                scheme
            );
        }

        Ok(client)
    }

    pub fn get_client(&self, node_id: &str) -> Option<Arc<NodeClient>> {
        self.clients.get(node_id).map(|entry| entry.value().clone())
    }

    pub fn remove_node(&self, node_id: &str) -> Option<Arc<NodeClient>> {
        self.clients.remove(node_id).map(|(_, client)| client)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.clients.contains_key(node_id)
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.clients.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self {
            clients: DashMap::new(),
            timeout: DEFAULT_NODE_TIMEOUT,
        }
    }
}
