//! Node Management API Protocol
//!
//! Endpoint paths and request/response bodies of the worker node REST API.

use super::types::{Key, KeyType, RemoteJob};
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Session login. Answers with a `clsession` cookie.
pub const ENDPOINT_SESSIONS: &str = "/sessions";
/// Legacy login for nodes without session support.
pub const ENDPOINT_AUTHENTICATE: &str = "/v2/authenticate";
/// Job collection (create, list). Single jobs live under `/v2/jobs/{id}`.
pub const ENDPOINT_JOBS: &str = "/v2/jobs";
/// Key listings live under `/v2/keys/{eth|p2p|ocr|csa}`.
pub const ENDPOINT_KEYS: &str = "/v2/keys";
pub const ENDPOINT_HEALTH: &str = "/health";
pub const ENDPOINT_BUILD_INFO: &str = "/v2/build_info";

pub const SESSION_COOKIE: &str = "clsession";
pub const USER_AGENT: &str = concat!("job-distributor/", env!("CARGO_PKG_VERSION"));

pub fn job_path(job_id: &str) -> String {
    format!("{}/{}", ENDPOINT_JOBS, job_id)
}

pub fn keys_path(key_type: KeyType) -> String {
    format!("{}/{}", ENDPOINT_KEYS, key_type)
}

// --- Data Transfer Objects ---

/// Body of both `/sessions` and `/v2/authenticate`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateJobRequest<'a> {
    pub toml: &'a str,
}

/// Nodes answer job reads either wrapped in `data` or with the bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum JobEnvelope {
    Wrapped { data: RemoteJob },
    Bare(RemoteJob),
}

impl JobEnvelope {
    pub fn into_job(self) -> RemoteJob {
        match self {
            JobEnvelope::Wrapped { data } => data,
            JobEnvelope::Bare(job) => job,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JobsResponse {
    #[serde(default)]
    pub data: Option<Vec<RemoteJob>>,
}

#[derive(Debug, Deserialize)]
pub struct KeysResponse {
    #[serde(default)]
    pub data: Option<Vec<Key>>,
}

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct BuildInfoResponse {
    pub data: BuildInfo,
}

#[derive(Debug, Deserialize)]
pub struct BuildInfo {
    pub version: String,
}
