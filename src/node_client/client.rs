use super::error::NodeClientError;
use super::protocol::*;
use super::types::*;

use reqwest::header::{COOKIE, HeaderMap};
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Authenticated client for one worker node's management API.
///
/// While a session token is held every request carries the `clsession` cookie;
/// otherwise it falls back to HTTP basic credentials (legacy nodes).
pub struct NodeClient {
    node_id: String,
    base_url: String,
    credentials: Credentials,
    http_client: reqwest::Client,
    session: RwLock<Option<String>>,
}

impl NodeClient {
    /// Builds an unauthenticated client. Call [`NodeClient::authenticate`] before use.
    ///
    /// # Arguments
    /// * `base_url` - Node API root; a trailing `/` is dropped.
    /// * `timeout` - Applied to every single HTTP call.
    pub fn new(
        node_id: &str,
        base_url: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, NodeClientError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(NodeClientError::Client)?;

        Ok(Self {
            node_id: node_id.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            http_client,
            session: RwLock::new(None),
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// True when the last authentication produced a session cookie.
    pub async fn has_session(&self) -> bool {
        self.session.read().await.is_some()
    }

    // --- Authentication ---

    /// Logs in, preferring session auth and falling back to legacy auth.
    ///
    /// # Returns
    /// * `Err(Authentication)` only if both schemes fail, carrying both causes.
    pub async fn authenticate(&self) -> Result<(), NodeClientError> {
        match self.login_session().await {
            Ok(token) => {
                *self.session.write().await = Some(token);
                debug!("Session established with node {}", self.node_id);
                Ok(())
            }
            Err(session_err) => {
                warn!(
                    "Session auth failed for node {}, trying legacy auth: {}",
                    self.node_id, session_err
                );
                *self.session.write().await = None;

                self.login_legacy()
                    .await
                    .map_err(|legacy_err| NodeClientError::Authentication {
                        session: session_err.to_string(),
                        legacy: legacy_err.to_string(),
                    })?;

                debug!("Legacy auth accepted by node {}", self.node_id);
                Ok(())
            }
        }
    }

    async fn login_session(&self) -> Result<String, NodeClientError> {
        let response = self.post_login(ENDPOINT_SESSIONS).await?;
        let response = expect_status(ENDPOINT_SESSIONS, response, &[StatusCode::OK]).await?;

        response
            .cookies()
            .find(|cookie| cookie.name() == SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| NodeClientError::Decode {
                path: ENDPOINT_SESSIONS.to_string(),
                message: format!("no {} cookie in response", SESSION_COOKIE),
            })
    }

    async fn login_legacy(&self) -> Result<(), NodeClientError> {
        let response = self.post_login(ENDPOINT_AUTHENTICATE).await?;
        expect_status(ENDPOINT_AUTHENTICATE, response, &[StatusCode::OK]).await?;
        Ok(())
    }

    async fn post_login(&self, path: &str) -> Result<Response, NodeClientError> {
        self.http_client
            .post(self.url(path))
            .json(&LoginRequest {
                email: &self.credentials.email,
                password: &self.credentials.password,
            })
            .send()
            .await
            .map_err(|source| transport(path, source))
    }

    // --- Request Pipeline ---

    /// Sends an authenticated request.
    ///
    /// A `401` triggers one re-authentication and one retry of the same request.
    /// If the retry is rejected as well the node is reported as
    /// `AuthenticationExhausted`; any non-401 response is returned as is.
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        headers: &HeaderMap,
    ) -> Result<Response, NodeClientError> {
        let mut reauthenticated = false;

        loop {
            let response = self.send(method.clone(), path, body, headers).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            if reauthenticated {
                return Err(NodeClientError::AuthenticationExhausted {
                    node_id: self.node_id.clone(),
                });
            }

            warn!(
                "Node {} rejected {} {}, re-authenticating",
                self.node_id, method, path
            );
            self.authenticate().await?;
            reauthenticated = true;
        }
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        headers: &HeaderMap,
    ) -> Result<Response, NodeClientError> {
        let mut builder = self
            .http_client
            .request(method, self.url(path))
            .headers(headers.clone());

        if let Some(body) = body {
            builder = builder.json(body);
        }

        builder = match self.session.read().await.as_deref() {
            Some(token) => builder.header(COOKIE, format!("{}={}", SESSION_COOKIE, token)),
            None => builder.basic_auth(&self.credentials.email, Some(&self.credentials.password)),
        };

        builder.send().await.map_err(|source| transport(path, source))
    }

    async fn get(&self, path: &str) -> Result<Response, NodeClientError> {
        self.request::<()>(Method::GET, path, None, &HeaderMap::new())
            .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // --- Jobs ---

    /// Submits a job spec. The node must answer `200` or `201`.
    pub async fn create_job(&self, spec: &str) -> Result<RemoteJob, NodeClientError> {
        debug!("Creating job on node {}", self.node_id);

        let response = self
            .request(
                Method::POST,
                ENDPOINT_JOBS,
                Some(&CreateJobRequest { toml: spec }),
                &HeaderMap::new(),
            )
            .await?;
        let response =
            expect_status(ENDPOINT_JOBS, response, &[StatusCode::OK, StatusCode::CREATED]).await?;
        let envelope: JobEnvelope = read_json(ENDPOINT_JOBS, response).await?;
        let job = envelope.into_job();

        info!("Job {} created on node {}", job.id, self.node_id);
        Ok(job)
    }

    pub async fn get_job(&self, job_id: &str) -> Result<RemoteJob, NodeClientError> {
        let path = job_path(job_id);
        let response = self.get(&path).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(NodeClientError::NotFound(format!("job {}", job_id)));
        }

        let response = expect_status(&path, response, &[StatusCode::OK]).await?;
        let envelope: JobEnvelope = read_json(&path, response).await?;
        Ok(envelope.into_job())
    }

    /// Lists every job on the node. An empty body or a missing `data` array is no jobs.
    pub async fn list_jobs(&self) -> Result<Vec<RemoteJob>, NodeClientError> {
        let response = self.get(ENDPOINT_JOBS).await?;
        let response = expect_status(ENDPOINT_JOBS, response, &[StatusCode::OK]).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|source| transport(ENDPOINT_JOBS, source))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let jobs: JobsResponse = decode(ENDPOINT_JOBS, &bytes)?;
        let jobs = jobs.data.unwrap_or_default();

        debug!("Node {} reports {} job(s)", self.node_id, jobs.len());
        Ok(jobs)
    }

    pub async fn delete_job(&self, job_id: &str) -> Result<(), NodeClientError> {
        let path = job_path(job_id);
        let response = self
            .request::<()>(Method::DELETE, &path, None, &HeaderMap::new())
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(NodeClientError::NotFound(format!("job {}", job_id)));
        }

        expect_status(&path, response, &[StatusCode::OK, StatusCode::NO_CONTENT]).await?;

        info!("Job {} deleted from node {}", job_id, self.node_id);
        Ok(())
    }

    // --- Keys ---

    /// Keys of one type held by the node. A missing `data` field reads as none.
    pub async fn get_keys(&self, key_type: KeyType) -> Result<Vec<Key>, NodeClientError> {
        let path = keys_path(key_type);
        let response = self.get(&path).await?;
        let response = expect_status(&path, response, &[StatusCode::OK]).await?;
        let keys: KeysResponse = read_json(&path, response).await?;
        Ok(keys.data.unwrap_or_default())
    }

    // --- Health ---

    /// Never fails: unreachable or non-200 means unhealthy. A 200 whose body
    /// cannot be read as `{healthy, version}` counts as healthy.
    pub async fn is_healthy(&self) -> bool {
        let response = match self.get(ENDPOINT_HEALTH).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Health check failed for node {}: {}", self.node_id, e);
                return false;
            }
        };

        if response.status() != StatusCode::OK {
            warn!("Node {} unhealthy: {}", self.node_id, response.status());
            return false;
        }

        match response.json::<HealthResponse>().await {
            Ok(health) => {
                debug!(
                    "Node {} health={} (version: {})",
                    self.node_id, health.healthy, health.version
                );
                health.healthy
            }
            Err(_) => true,
        }
    }

    pub async fn get_version(&self) -> Result<String, NodeClientError> {
        let response = self.get(ENDPOINT_BUILD_INFO).await?;
        let response = expect_status(ENDPOINT_BUILD_INFO, response, &[StatusCode::OK]).await?;
        let info: BuildInfoResponse = read_json(ENDPOINT_BUILD_INFO, response).await?;
        Ok(info.data.version)
    }
}

// --- Response Helpers ---

fn transport(path: &str, source: reqwest::Error) -> NodeClientError {
    NodeClientError::Transport {
        path: path.to_string(),
        source,
    }
}

/// Passes the response through if its status is one of `accepted`.
async fn expect_status(
    path: &str,
    response: Response,
    accepted: &[StatusCode],
) -> Result<Response, NodeClientError> {
    let status = response.status();
    if accepted.contains(&status) {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(NodeClientError::UnexpectedStatus {
        path: path.to_string(),
        status,
        body,
    })
}

async fn read_json<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, NodeClientError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|source| transport(path, source))?;
    decode(path, &bytes)
}

fn decode<T: DeserializeOwned>(path: &str, bytes: &[u8]) -> Result<T, NodeClientError> {
    serde_json::from_slice(bytes).map_err(|e| NodeClientError::Decode {
        path: path.to_string(),
        message: e.to_string(),
    })
}
