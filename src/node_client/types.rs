use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Login material for a node's management API.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A job as reported by a worker node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteJob {
    pub id: String,
    #[serde(rename = "externalJobID", default)]
    pub external_job_id: String,
    #[serde(rename = "type", default)]
    pub job_type: String,
    #[serde(rename = "schemaVersion", default)]
    pub schema_version: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub spec: serde_json::Value,
    #[serde(rename = "maxTaskDuration", default)]
    pub max_task_duration: String,
    #[serde(rename = "pipelineSpec", default)]
    pub pipeline_spec: PipelineSpec,
    #[serde(default)]
    pub errors: Vec<RemoteJobError>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineSpec {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "dotDagSource", default)]
    pub dot_dag_source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteJobError {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub occurrences: i64,
}

/// Key material families a node can report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Eth,
    P2p,
    Ocr,
    Csa,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Eth => "eth",
            KeyType::P2p => "p2p",
            KeyType::Ocr => "ocr",
            KeyType::Csa => "csa",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eth" => Ok(KeyType::Eth),
            "p2p" => Ok(KeyType::P2p),
            "ocr" => Ok(KeyType::Ocr),
            "csa" => Ok(KeyType::Csa),
            other => Err(format!("unknown key type: {}", other)),
        }
    }
}

/// A credential/identity artifact reported by a node. Never persisted locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Key {
    pub id: String,
    #[serde(default)]
    pub address: String,
    #[serde(rename = "publicKey", default)]
    pub public_key: String,
    #[serde(rename = "type", default)]
    pub key_type: String,
}
