use super::error::DistributorError;
use super::protocol::*;
use super::service::DistributorService;

use crate::node_client::types::{Credentials, KeyType};

use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router, extract::Path};
use std::sync::Arc;

type ApiResult<T> = Result<Json<T>, DistributorError>;

impl IntoResponse for DistributorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Builds the HTTP API over a shared service.
pub fn routes(service: Arc<DistributorService>) -> Router {
    Router::new()
        .route(ENDPOINT_PROPOSE_JOB, post(handle_propose_job))
        .route(ENDPOINT_BATCH_PROPOSE_JOB, post(handle_batch_propose_job))
        .route(ENDPOINT_LIST_JOBS, post(handle_list_jobs))
        .route(ENDPOINT_JOB, get(handle_get_job).delete(handle_delete_job))
        .route(ENDPOINT_REVOKE_JOB, post(handle_revoke_job))
        .route(ENDPOINT_UPDATE_JOB, post(handle_update_job))
        .route(ENDPOINT_LIST_PROPOSALS, post(handle_list_proposals))
        .route(ENDPOINT_PROPOSAL, get(handle_get_proposal))
        .route(ENDPOINT_LIST_NODES, post(handle_list_nodes))
        .route(ENDPOINT_REGISTER_NODE, post(handle_register_node))
        .route(ENDPOINT_NODE, get(handle_get_node))
        .route(ENDPOINT_ENABLE_NODE, post(handle_enable_node))
        .route(ENDPOINT_DISABLE_NODE, post(handle_disable_node))
        .route(ENDPOINT_UPDATE_NODE, post(handle_update_node))
        .route(ENDPOINT_NODE_CHAIN_CONFIGS, get(handle_list_node_chain_configs))
        .route(ENDPOINT_CONNECT_NODE, post(handle_connect_node))
        .route(ENDPOINT_NODE_HEALTH, get(handle_node_health))
        .route(ENDPOINT_NODE_KEYS, get(handle_list_node_keys))
        .route(ENDPOINT_REMOTE_JOBS, get(handle_list_remote_jobs))
        .route(ENDPOINT_REMOTE_JOB, get(handle_get_remote_job))
        .route(ENDPOINT_LIST_KEYPAIRS, get(handle_list_keypairs))
        .route(ENDPOINT_GET_KEYPAIR, get(handle_get_keypair))
        .layer(Extension(service))
}

// --- Jobs & Proposals ---

pub async fn handle_propose_job(
    Extension(service): Extension<Arc<DistributorService>>,
    Json(req): Json<ProposeJobRequest>,
) -> ApiResult<ProposeJobResponse> {
    let proposal = service
        .propose_job(&req.node_id, &req.spec, req.labels)
        .await?;
    Ok(Json(ProposeJobResponse { proposal }))
}

pub async fn handle_batch_propose_job(
    Extension(service): Extension<Arc<DistributorService>>,
    Json(req): Json<BatchProposeJobRequest>,
) -> Json<BatchProposeJobResponse> {
    Json(
        service
            .batch_propose_job(&req.node_ids, &req.spec, req.labels)
            .await,
    )
}

pub async fn handle_list_jobs(
    Extension(service): Extension<Arc<DistributorService>>,
    Json(req): Json<ListJobsRequest>,
) -> Json<ListJobsResponse> {
    Json(ListJobsResponse {
        jobs: service.list_jobs(&req.filter),
    })
}

pub async fn handle_get_job(
    Extension(service): Extension<Arc<DistributorService>>,
    Path(job_id): Path<String>,
) -> ApiResult<GetJobResponse> {
    let job = service.get_job(&job_id)?;
    Ok(Json(GetJobResponse { job }))
}

pub async fn handle_revoke_job(
    Extension(service): Extension<Arc<DistributorService>>,
    Path(job_id): Path<String>,
) -> ApiResult<RevokeJobResponse> {
    let proposal = service.revoke_job(&job_id).await?;
    Ok(Json(RevokeJobResponse { proposal }))
}

pub async fn handle_delete_job(
    Extension(service): Extension<Arc<DistributorService>>,
    Path(job_id): Path<String>,
) -> ApiResult<DeleteJobResponse> {
    Ok(Json(service.delete_job(&job_id).await?))
}

pub async fn handle_update_job(
    Extension(service): Extension<Arc<DistributorService>>,
    Path(job_id): Path<String>,
    Json(req): Json<UpdateJobRequest>,
) -> ApiResult<UpdateJobResponse> {
    let job = service.update_job(&job_id, req.labels).await?;
    Ok(Json(UpdateJobResponse { job }))
}

pub async fn handle_list_proposals(
    Extension(service): Extension<Arc<DistributorService>>,
    Json(req): Json<ListProposalsRequest>,
) -> Json<ListProposalsResponse> {
    Json(ListProposalsResponse {
        proposals: service.list_proposals(&req.filter),
    })
}

pub async fn handle_get_proposal(
    Extension(service): Extension<Arc<DistributorService>>,
    Path(proposal_id): Path<String>,
) -> ApiResult<GetProposalResponse> {
    let proposal = service.get_proposal(&proposal_id)?;
    Ok(Json(GetProposalResponse { proposal }))
}

// --- Nodes ---

pub async fn handle_list_nodes(
    Extension(service): Extension<Arc<DistributorService>>,
    Json(req): Json<ListNodesRequest>,
) -> Json<ListNodesResponse> {
    Json(ListNodesResponse {
        nodes: service.list_nodes(&req.filter),
    })
}

pub async fn handle_register_node(
    Extension(service): Extension<Arc<DistributorService>>,
    Json(req): Json<RegisterNodeRequest>,
) -> ApiResult<NodeResponse> {
    let node = service.register_node(&req.name, &req.public_key, req.labels)?;
    Ok(Json(NodeResponse { node }))
}

pub async fn handle_get_node(
    Extension(service): Extension<Arc<DistributorService>>,
    Path(node_id): Path<String>,
) -> ApiResult<NodeResponse> {
    let node = service.get_node(&node_id)?;
    Ok(Json(NodeResponse { node }))
}

/// Enable, disable and update return the modified node. An unknown node id
/// answers `404` rather than an empty success.
pub async fn handle_enable_node(
    Extension(service): Extension<Arc<DistributorService>>,
    Path(node_id): Path<String>,
) -> ApiResult<NodeResponse> {
    let node = service.enable_node(&node_id)?;
    Ok(Json(NodeResponse { node }))
}

pub async fn handle_disable_node(
    Extension(service): Extension<Arc<DistributorService>>,
    Path(node_id): Path<String>,
) -> ApiResult<NodeResponse> {
    let node = service.disable_node(&node_id)?;
    Ok(Json(NodeResponse { node }))
}

pub async fn handle_update_node(
    Extension(service): Extension<Arc<DistributorService>>,
    Path(node_id): Path<String>,
    Json(req): Json<UpdateNodeRequest>,
) -> ApiResult<NodeResponse> {
    let node = service.update_node(&node_id, req.name, req.labels)?;
    Ok(Json(NodeResponse { node }))
}

pub async fn handle_list_node_chain_configs(
    Extension(service): Extension<Arc<DistributorService>>,
    Path(node_id): Path<String>,
) -> ApiResult<ListNodeChainConfigsResponse> {
    let chain_configs = service.list_node_chain_configs(&node_id)?;
    Ok(Json(ListNodeChainConfigsResponse { chain_configs }))
}

pub async fn handle_connect_node(
    Extension(service): Extension<Arc<DistributorService>>,
    Path(node_id): Path<String>,
    Json(req): Json<ConnectNodeRequest>,
) -> ApiResult<NodeResponse> {
    let credentials = Credentials::new(&req.email, &req.password);
    let node = service.connect_node(&node_id, &req.url, credentials).await?;
    Ok(Json(NodeResponse { node }))
}

pub async fn handle_node_health(
    Extension(service): Extension<Arc<DistributorService>>,
    Path(node_id): Path<String>,
) -> ApiResult<NodeHealth> {
    Ok(Json(service.node_health(&node_id).await?))
}

pub async fn handle_list_node_keys(
    Extension(service): Extension<Arc<DistributorService>>,
    Path((node_id, key_type)): Path<(String, String)>,
) -> ApiResult<ListKeysResponse> {
    let key_type: KeyType = key_type
        .parse()
        .map_err(DistributorError::InvalidArgument)?;
    let keys = service.list_node_keys(&node_id, key_type).await?;
    Ok(Json(ListKeysResponse { keys }))
}

pub async fn handle_list_remote_jobs(
    Extension(service): Extension<Arc<DistributorService>>,
    Path(node_id): Path<String>,
) -> ApiResult<ListRemoteJobsResponse> {
    let jobs = service.list_remote_jobs(&node_id).await?;
    Ok(Json(ListRemoteJobsResponse { jobs }))
}

pub async fn handle_get_remote_job(
    Extension(service): Extension<Arc<DistributorService>>,
    Path((node_id, job_id)): Path<(String, String)>,
) -> ApiResult<GetRemoteJobResponse> {
    let job = service.get_remote_job(&node_id, &job_id).await?;
    Ok(Json(GetRemoteJobResponse { job }))
}

// --- Keypairs ---

pub async fn handle_list_keypairs(
    Extension(service): Extension<Arc<DistributorService>>,
) -> Json<ListKeypairsResponse> {
    Json(ListKeypairsResponse {
        keypairs: service.list_keypairs(),
    })
}

pub async fn handle_get_keypair(
    Extension(service): Extension<Arc<DistributorService>>,
) -> ApiResult<GetKeypairResponse> {
    let keypair = service.get_keypair()?;
    Ok(Json(GetKeypairResponse { keypair }))
}
