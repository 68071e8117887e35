//! Distributor Module Tests
//!
//! Drives `DistributorService` against an in-memory store and `wiremock`
//! worker nodes.
//!
//! ## Test Scopes
//! - **Proposals**: Validation order, job id selection, approval and rejection.
//! - **Batch**: Partial failure and de-duplication.
//! - **Concurrency / Timeouts**: Per-call timeout, batch fan-out, and job locks
//!   released during delivery.
//! - **Job lifecycle**: Revoke, delete, and label updates.
//! - **Nodes / Keypairs**: Registration, toggles, connect, passthrough reads.
//! - **HTTP API**: Routing and error status mapping.

#[cfg(test)]
mod tests {
    use crate::distributor::error::{DeliveryError, DistributorError};
    use crate::distributor::handlers::routes;
    use crate::distributor::service::DistributorService;
    use crate::node_client::registry::ClientRegistry;
    use crate::node_client::types::{Credentials, KeyType};
    use crate::store::memory::MemoryStore;
    use crate::store::store::Store;
    use crate::store::types::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SPEC: &str = "type = \"cron\"\nschemaVersion = 1\nexternalJobID = \"abc123\"\nschedule = \"CRON_TZ=UTC * * * * *\"\n";

    // ============================================================
    // HELPERS
    // ============================================================

    fn service() -> Arc<DistributorService> {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        DistributorService::new(store, ClientRegistry::new(Duration::from_secs(5)))
    }

    fn credentials() -> Credentials {
        Credentials::new("ops@example.com", "hunter2")
    }

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn mount_session_login(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/sessions"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("set-cookie", "clsession=session-token; Path=/"),
            )
            .mount(server)
            .await;
    }

    async fn mount_create_job(server: &MockServer, remote_id: &str) {
        Mock::given(method("POST"))
            .and(path("/v2/jobs"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": remote_id}})))
            .mount(server)
            .await;
    }

    /// Registers a node and connects it to a fresh mock server accepting session auth.
    async fn connected_node(service: &DistributorService, name: &str) -> (Node, MockServer) {
        let server = MockServer::start().await;
        mount_session_login(&server).await;

        let node = service
            .register_node(name, &format!("csa-{}", name), Labels::new())
            .unwrap();
        service
            .connect_node(&node.id, &server.uri(), credentials())
            .await
            .unwrap();

        (node, server)
    }

    fn approved_proposal(id: &str, job_id: &str, updated_at: u64) -> Proposal {
        let mut proposal = Proposal::new(job_id, "node-a", SPEC);
        proposal.id = id.to_string();
        proposal.status = ProposalStatus::Approved;
        proposal.updated_at = updated_at;
        proposal
    }

    fn stored_job(id: &str, node_id: &str, remote_id: Option<&str>) -> Job {
        Job {
            id: id.to_string(),
            node_id: node_id.to_string(),
            remote_id: remote_id.map(str::to_string),
            proposal_ids: vec!["p-1".to_string()],
            labels: Labels::new(),
            created_at: 1,
            updated_at: 1,
        }
    }

    // ============================================================
    // PROPOSAL TESTS
    // ============================================================

    #[tokio::test]
    async fn test_propose_to_unknown_node_creates_nothing() {
        let service = service();

        let err = service
            .propose_job("ghost", SPEC, Labels::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DistributorError::NotFound(_)), "Got {:?}", err);
        assert!(service.list_proposals(&ProposalFilter::default()).is_empty());
        assert!(service.list_jobs(&JobFilter::default()).is_empty());
    }

    #[tokio::test]
    async fn test_propose_validates_arguments_first() {
        let service = service();
        let node = service.register_node("a", "csa-a", Labels::new()).unwrap();

        let empty_id = service.propose_job("", SPEC, Labels::new()).await;
        assert!(matches!(empty_id, Err(DistributorError::InvalidArgument(_))));

        let blank = service.propose_job(&node.id, "  \n ", Labels::new()).await;
        assert!(matches!(blank, Err(DistributorError::InvalidArgument(_))));

        assert!(service.list_proposals(&ProposalFilter::default()).is_empty());
    }

    #[tokio::test]
    async fn test_propose_uses_external_job_id() {
        let service = service();
        let (node, server) = connected_node(&service, "a").await;
        mount_create_job(&server, "remote-1").await;

        let proposal = service
            .propose_job(&node.id, SPEC, labels(&[("env", "prod")]))
            .await
            .unwrap();

        assert_eq!(proposal.job_id, "abc123");
        assert_eq!(proposal.status, ProposalStatus::Approved);
        assert_eq!(proposal.delivery_status, DeliveryStatus::Delivered);

        let job = service.get_job("abc123").unwrap();
        assert_eq!(job.node_id, node.id);
        assert_eq!(job.remote_id.as_deref(), Some("remote-1"));
        assert_eq!(job.proposal_ids, vec![proposal.id.clone()]);
        assert_eq!(job.labels, labels(&[("env", "prod")]));
    }

    #[tokio::test]
    async fn test_propose_without_external_id_generates_one() {
        let service = service();
        let (node, server) = connected_node(&service, "a").await;
        mount_create_job(&server, "remote-1").await;

        let proposal = service
            .propose_job(&node.id, "type = \"cron\"\nschemaVersion = 1", Labels::new())
            .await
            .unwrap();

        assert!(proposal.job_id.starts_with("job_"));
        assert!(service.get_job(&proposal.job_id).is_ok());
    }

    #[tokio::test]
    async fn test_propose_invalid_spec_is_rejected_but_kept() {
        let service = service();
        let (node, server) = connected_node(&service, "a").await;
        Mock::given(method("POST"))
            .and(path("/v2/jobs"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let proposal = service
            .propose_job(&node.id, "type = \"cron\"\nexternalJobID = \"abc123\"", Labels::new())
            .await
            .unwrap();

        assert_eq!(proposal.status, ProposalStatus::Rejected);
        let reason = proposal.rejection_reason.clone().unwrap();
        assert!(reason.contains("schemaVersion"), "reason: {}", reason);

        let stored = service.get_proposal(&proposal.id).unwrap();
        assert_eq!(stored.status, ProposalStatus::Rejected);
        assert!(matches!(service.get_job("abc123"), Err(DistributorError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_propose_without_client_is_rejected() {
        let service = service();
        let node = service.register_node("a", "csa-a", Labels::new()).unwrap();

        let proposal = service.propose_job(&node.id, SPEC, Labels::new()).await.unwrap();

        assert_eq!(proposal.status, ProposalStatus::Rejected);
        assert!(proposal.rejection_reason.unwrap().contains("no client"));
    }

    #[tokio::test]
    async fn test_propose_node_failure_is_rejected() {
        let service = service();
        let (node, server) = connected_node(&service, "a").await;
        Mock::given(method("POST"))
            .and(path("/v2/jobs"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let proposal = service.propose_job(&node.id, SPEC, Labels::new()).await.unwrap();

        assert_eq!(proposal.status, ProposalStatus::Rejected);
        assert!(proposal.rejection_reason.unwrap().contains("500"));
        assert!(service.list_jobs(&JobFilter::default()).is_empty());
    }

    #[tokio::test]
    async fn test_repropose_links_existing_job() {
        let service = service();
        let (node, server) = connected_node(&service, "a").await;
        mount_create_job(&server, "remote-1").await;

        let first = service
            .propose_job(&node.id, SPEC, labels(&[("v", "1")]))
            .await
            .unwrap();
        let second = service
            .propose_job(&node.id, SPEC, labels(&[("v", "2")]))
            .await
            .unwrap();

        let job = service.get_job("abc123").unwrap();
        assert_eq!(job.proposal_ids, vec![first.id, second.id]);
        assert_eq!(job.labels, labels(&[("v", "2")]));
        assert_eq!(service.list_jobs(&JobFilter::default()).len(), 1);
    }

    // ============================================================
    // BATCH TESTS
    // ============================================================

    #[tokio::test]
    async fn test_batch_partial_failure() {
        let service = service();

        // Node A logs in once, then rejects everything
        let server_a = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("set-cookie", "clsession=a; Path=/"),
            )
            .up_to_n_times(1)
            .mount(&server_a)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/jobs"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server_a)
            .await;
        let node_a = service.register_node("a", "csa-a", Labels::new()).unwrap();
        service
            .connect_node(&node_a.id, &server_a.uri(), credentials())
            .await
            .unwrap();

        let (node_b, server_b) = connected_node(&service, "b").await;
        mount_create_job(&server_b, "remote-b").await;

        let response = service
            .batch_propose_job(&[node_a.id.clone(), node_b.id.clone()], SPEC, Labels::new())
            .await;

        assert_eq!(response.success_responses.len(), 1);
        assert_eq!(response.failed_responses.len(), 1);

        let failure = &response.failed_responses[&node_a.id];
        let rejected = failure.proposal.as_ref().unwrap();
        assert_eq!(rejected.status, ProposalStatus::Rejected);
        assert!(service.get_proposal(&rejected.id).is_ok());

        let success = &response.success_responses[&node_b.id];
        assert_eq!(success.proposal.status, ProposalStatus::Approved);

        let job = service.get_job("abc123").unwrap();
        assert_eq!(job.node_id, node_b.id);
        assert_eq!(job.proposal_ids, vec![success.proposal.id.clone()]);
    }

    #[tokio::test]
    async fn test_batch_dedupes_and_reports_errors() {
        let service = service();
        let (node, server) = connected_node(&service, "a").await;
        Mock::given(method("POST"))
            .and(path("/v2/jobs"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "r"}})))
            .expect(1)
            .mount(&server)
            .await;

        let response = service
            .batch_propose_job(
                &[node.id.clone(), node.id.clone(), "ghost".to_string()],
                SPEC,
                Labels::new(),
            )
            .await;

        assert_eq!(response.success_responses.len(), 1);
        let ghost = &response.failed_responses["ghost"];
        assert!(ghost.proposal.is_none());
        assert!(ghost.error_message.contains("ghost"));
    }

    // ============================================================
    // JOB LIFECYCLE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_revoke_targets_most_recently_updated_proposal() {
        let service = service();
        let store = service.store();
        store.store_proposal(approved_proposal("p-1", "job-1", 100));
        store.store_proposal(approved_proposal("p-2", "job-1", 300));
        store.store_proposal(approved_proposal("p-3", "job-1", 200));

        let revoked = service.revoke_job("job-1").await.unwrap();

        assert_eq!(revoked.id, "p-2");
        assert_eq!(revoked.status, ProposalStatus::Revoked);
        assert!(revoked.updated_at > 300);
        assert_eq!(store.get_proposal("p-1").unwrap().status, ProposalStatus::Approved);
        assert_eq!(store.get_proposal("p-3").unwrap().status, ProposalStatus::Approved);
    }

    #[tokio::test]
    async fn test_revoke_tie_goes_to_smallest_id() {
        let service = service();
        service.store().store_proposal(approved_proposal("p-b", "job-1", 100));
        service.store().store_proposal(approved_proposal("p-a", "job-1", 100));

        let revoked = service.revoke_job("job-1").await.unwrap();

        assert_eq!(revoked.id, "p-a");
    }

    #[tokio::test]
    async fn test_revoke_errors() {
        let service = service();
        assert!(matches!(
            service.revoke_job("job-1").await,
            Err(DistributorError::NotFound(_))
        ));

        service.store().store_proposal(approved_proposal("p-1", "job-1", 100));
        service.revoke_job("job-1").await.unwrap();

        // The latest proposal is now REVOKED
        assert!(matches!(
            service.revoke_job("job-1").await,
            Err(DistributorError::InvalidTransition(_))
        ));

        let mut pending = Proposal::new("job-2", "node-a", SPEC);
        pending.id = "p-2".to_string();
        service.store().store_proposal(pending);
        assert!(matches!(
            service.revoke_job("job-2").await,
            Err(DistributorError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_job_failure_keeps_job() {
        let service = service();
        let (node, server) = connected_node(&service, "a").await;
        Mock::given(method("DELETE"))
            .and(path("/v2/jobs/remote-7"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        service.store().store_job(stored_job("job-1", &node.id, Some("remote-7")));

        let response = service.delete_job("job-1").await.unwrap();

        assert!(!response.deleted);
        assert!(response.reason.unwrap().contains("500"));
        assert!(service.get_job("job-1").is_ok());
    }

    #[tokio::test]
    async fn test_delete_job_success_removes_job() {
        let service = service();
        let (node, server) = connected_node(&service, "a").await;
        Mock::given(method("DELETE"))
            .and(path("/v2/jobs/remote-7"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        service.store().store_job(stored_job("job-1", &node.id, Some("remote-7")));

        let response = service.delete_job("job-1").await.unwrap();

        assert!(response.deleted);
        assert!(matches!(service.get_job("job-1"), Err(DistributorError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_job_noops() {
        let service = service();

        let unknown = service.delete_job("missing").await.unwrap();
        assert!(!unknown.deleted);

        // Job exists but its node has no client
        service.store().store_job(stored_job("job-1", "offline-node", None));
        let no_client = service.delete_job("job-1").await.unwrap();
        assert!(!no_client.deleted);
        assert!(no_client.reason.unwrap().contains("no client"));
        assert!(service.get_job("job-1").is_ok());
    }

    #[tokio::test]
    async fn test_update_job() {
        let service = service();
        let (node, _server) = connected_node(&service, "a").await;
        service.store().store_job(stored_job("job-1", &node.id, None));
        service.store().store_job(stored_job("job-2", "offline-node", None));

        let job = service
            .update_job("job-1", labels(&[("team", "ops")]))
            .await
            .unwrap();
        assert_eq!(job.labels, labels(&[("team", "ops")]));
        assert!(job.updated_at > 1);

        assert!(matches!(
            service.update_job("missing", Labels::new()).await,
            Err(DistributorError::NotFound(_))
        ));
        assert!(matches!(
            service.update_job("job-2", Labels::new()).await,
            Err(DistributorError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_list_jobs_by_node() {
        let service = service();
        service.store().store_job(stored_job("job-1", "node-a", None));
        service.store().store_job(stored_job("job-2", "node-b", None));

        let filtered = service.list_jobs(&JobFilter {
            ids: vec![],
            node_ids: vec!["node-b".to_string()],
        });

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "job-2");
        assert_eq!(service.list_jobs(&JobFilter::default()).len(), 2);
    }

    #[tokio::test]
    async fn test_job_locks_released_after_operations() {
        let service = service();
        let node = service.register_node("a", "csa-a", Labels::new()).unwrap();

        for i in 0..50 {
            let job_id = format!("missing-{}", i);
            let _ = service.delete_job(&job_id).await;
            let _ = service.revoke_job(&job_id).await;
            let _ = service.update_job(&job_id, Labels::new()).await;
        }
        // No client: every proposal ends REJECTED under a fresh job id
        for _ in 0..10 {
            let spec = "type = \"cron\"\nschemaVersion = 1\n";
            service.propose_job(&node.id, spec, Labels::new()).await.unwrap();
        }

        assert_eq!(service.tracked_job_locks(), 0);
    }

    // ============================================================
    // CONCURRENCY AND TIMEOUT TESTS
    // ============================================================

    async fn mount_slow_create_job(server: &MockServer, remote_id: &str, delay: Duration) {
        Mock::given(method("POST"))
            .and(path("/v2/jobs"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"data": {"id": remote_id}}))
                    .set_delay(delay),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_slow_node_rejects_proposal_after_timeout() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let service = DistributorService::new(store, ClientRegistry::new(Duration::from_secs(1)));
        let (node, server) = connected_node(&service, "a").await;
        mount_slow_create_job(&server, "remote-1", Duration::from_secs(5)).await;

        let started = std::time::Instant::now();
        let proposal = service.propose_job(&node.id, SPEC, Labels::new()).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(proposal.status, ProposalStatus::Rejected);
        assert!(proposal
            .rejection_reason
            .unwrap()
            .contains("request to /v2/jobs failed"));
        assert!(service.get_job("abc123").is_err());
    }

    #[tokio::test]
    async fn test_batch_delivers_to_nodes_concurrently() {
        let service = service();
        let (a, server_a) = connected_node(&service, "a").await;
        let (b, server_b) = connected_node(&service, "b").await;
        let delay = Duration::from_millis(1500);
        mount_slow_create_job(&server_a, "remote-a", delay).await;
        mount_slow_create_job(&server_b, "remote-b", delay).await;

        let started = std::time::Instant::now();
        let response = service
            .batch_propose_job(&[a.id.clone(), b.id.clone()], SPEC, Labels::new())
            .await;

        assert_eq!(response.success_responses.len(), 2);
        assert!(
            started.elapsed() < Duration::from_millis(2500),
            "Two deliveries should overlap, took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn test_update_job_not_blocked_by_delivery_in_flight() {
        let service = service();
        let (node, server) = connected_node(&service, "a").await;
        mount_slow_create_job(&server, "remote-2", Duration::from_secs(2)).await;
        service
            .store()
            .store_job(stored_job("abc123", &node.id, Some("remote-1")));

        let proposing = {
            let service = service.clone();
            let node_id = node.id.clone();
            tokio::spawn(async move { service.propose_job(&node_id, SPEC, Labels::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;

        let updated = tokio::time::timeout(
            Duration::from_millis(500),
            service.update_job("abc123", labels(&[("team", "ops")])),
        )
        .await
        .expect("update should not wait for the delivery")
        .unwrap();
        assert_eq!(updated.labels, labels(&[("team", "ops")]));

        let proposal = proposing.await.unwrap().unwrap();
        assert_eq!(proposal.status, ProposalStatus::Approved);
        assert_eq!(service.get_job("abc123").unwrap().remote_id.as_deref(), Some("remote-2"));
        assert_eq!(service.tracked_job_locks(), 0);
    }

    // ============================================================
    // NODE TESTS
    // ============================================================

    #[test]
    fn test_register_node_idempotent() {
        let service = service();

        let first = service.register_node("a", "csa-a", Labels::new()).unwrap();
        let second = service.register_node("renamed", "csa-a", Labels::new()).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "a");
        assert!(first.is_connected && first.is_enabled);
        assert_eq!(service.list_nodes(&NodeFilter::default()).len(), 1);

        assert!(matches!(
            service.register_node("b", " ", Labels::new()),
            Err(DistributorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_enable_disable_update_node() {
        let service = service();
        let node = service.register_node("a", "csa-a", Labels::new()).unwrap();

        assert!(!service.disable_node(&node.id).unwrap().is_enabled);
        assert_eq!(
            service
                .list_nodes(&NodeFilter {
                    ids: vec![],
                    enabled: Some(false)
                })
                .len(),
            1
        );
        assert!(service.enable_node(&node.id).unwrap().is_enabled);

        let updated = service
            .update_node(&node.id, Some("b".to_string()), None)
            .unwrap();
        assert_eq!(updated.name, "b");
        assert_eq!(updated.public_key, "csa-a");

        assert!(matches!(
            service.enable_node("missing"),
            Err(DistributorError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_node_chain_configs() {
        let service = service();
        let node = service.register_node("a", "csa-a", Labels::new()).unwrap();

        assert!(service.list_node_chain_configs(&node.id).unwrap().is_empty());
        assert!(service.list_node_chain_configs("missing").is_err());
    }

    #[test]
    fn test_keypairs_ordered_by_creation() {
        let service = service();
        assert!(matches!(service.get_keypair(), Err(DistributorError::NotFound(_))));

        let mut newer = Node::new("newer", "csa-newer", Labels::new());
        newer.created_at = 200;
        let mut older = Node::new("older", "csa-older", Labels::new());
        older.created_at = 100;
        let mut blank = Node::new("blank", "", Labels::new());
        blank.created_at = 50;
        service.store().register_node(newer);
        service.store().register_node(older);
        service.store().register_node(blank);

        let keys: Vec<String> = service
            .list_keypairs()
            .into_iter()
            .map(|k| k.public_key)
            .collect();

        assert_eq!(keys, vec!["csa-older", "csa-newer"]);
        assert_eq!(service.get_keypair().unwrap().public_key, "csa-older");
    }

    #[tokio::test]
    async fn test_connect_node() {
        let service = service();
        let server = MockServer::start().await;
        mount_session_login(&server).await;

        let node = service.register_node("a", "csa-a", Labels::new()).unwrap();
        service
            .store()
            .update_node(&node.id, &mut |n| n.is_connected = false);

        let connected = service
            .connect_node(&node.id, &server.uri(), credentials())
            .await
            .unwrap();

        assert!(connected.is_connected);
        assert!(service.clients().contains(&node.id));

        let unknown = service
            .connect_node("missing", &server.uri(), credentials())
            .await;
        assert!(matches!(unknown, Err(DistributorError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_connect_node_auth_failure() {
        let service = service();
        let server = MockServer::start().await;
        let node = service.register_node("a", "csa-a", Labels::new()).unwrap();

        let err = service
            .connect_node(&node.id, &server.uri(), credentials())
            .await
            .unwrap_err();

        assert!(matches!(err, DistributorError::Delivery(DeliveryError::Node(_))));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(!service.clients().contains(&node.id));
    }

    #[tokio::test]
    async fn test_failed_reconnect_drops_previous_client() {
        let service = service();
        let (node, _server) = connected_node(&service, "a").await;
        let unreachable = MockServer::start().await;

        let result = service
            .connect_node(&node.id, &unreachable.uri(), credentials())
            .await;

        assert!(matches!(result, Err(DistributorError::Delivery(_))));
        assert!(!service.clients().contains(&node.id));
        assert!(!service.get_node(&node.id).unwrap().is_connected);
    }

    #[tokio::test]
    async fn test_node_passthrough_reads() {
        let service = service();
        let (node, server) = connected_node(&service, "a").await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"healthy": true})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/build_info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"version": "2.14.0"}})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/keys/p2p"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": "p2p_1"}]})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/jobs/404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let health = service.node_health(&node.id).await.unwrap();
        assert!(health.healthy);
        assert_eq!(health.version.as_deref(), Some("2.14.0"));

        let keys = service.list_node_keys(&node.id, KeyType::P2p).await.unwrap();
        assert_eq!(keys[0].id, "p2p_1");

        assert!(matches!(
            service.get_remote_job(&node.id, "404").await,
            Err(DistributorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_passthrough_requires_client() {
        let service = service();
        let node = service.register_node("a", "csa-a", Labels::new()).unwrap();

        assert!(matches!(
            service.list_remote_jobs(&node.id).await,
            Err(DistributorError::Internal(_))
        ));
        assert!(matches!(
            service.node_health("missing").await,
            Err(DistributorError::NotFound(_))
        ));
    }

    // ============================================================
    // HTTP API TESTS
    // ============================================================

    async fn call(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_api_register_and_get_node() {
        let service = service();
        let app = routes(service.clone());

        let (status, body) = call(
            app.clone(),
            post_json(
                "/nodes/register",
                json!({"name": "a", "public_key": "csa-a", "labels": {"region": "eu"}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let node_id = body["node"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["node"]["labels"]["region"], "eu");

        let (status, body) = call(app.clone(), get(&format!("/nodes/{}", node_id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["node"]["public_key"], "csa-a");

        let (status, body) = call(app, post_json("/nodes/list", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nodes"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_api_error_statuses() {
        let service = service();
        let node = service.register_node("a", "csa-a", Labels::new()).unwrap();
        let app = routes(service);

        let (status, body) = call(app.clone(), get("/jobs/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("missing"));

        let (status, _) = call(
            app.clone(),
            post_json("/jobs/propose", json!({"node_id": "", "spec": SPEC})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(app.clone(), get(&format!("/nodes/{}/keys/solana", node.id))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(app.clone(), get(&format!("/nodes/{}/remote_jobs", node.id))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _) = call(app.clone(), post_json("/nodes/missing/enable", json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(app, get("/keypair")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_rejected_proposal_is_ok() {
        let service = service();
        let node = service.register_node("a", "csa-a", Labels::new()).unwrap();
        let app = routes(service);

        let (status, body) = call(
            app.clone(),
            post_json("/jobs/propose", json!({"node_id": node.id, "spec": SPEC})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["proposal"]["status"], "REJECTED");

        let (status, body) = call(app, post_json("/jobs/abc123/revoke", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["proposal"]["status"], "REVOKED");
    }
}
