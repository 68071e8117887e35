//! Job Spec Inspection
//!
//! Job specs are opaque TOML text to the distributor. Only a handful of
//! top-level keys are read, by scanning lines rather than parsing the document.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const EXTERNAL_JOB_ID_KEY: &str = "externalJobID";

/// Keys every spec must assign at the start of a line.
static REQUIRED_FIELDS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    ["type", "schemaVersion"]
        .into_iter()
        .map(|field| {
            let pattern = format!(r"(?m)^\s*{}\s*=", regex::escape(field));
            (field, Regex::new(&pattern).expect("static field pattern"))
        })
        .collect()
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("job spec cannot be empty")]
    Empty,

    #[error("job spec missing required field: {0}")]
    MissingField(&'static str),
}

/// Returns the value of the first `externalJobID = ...` line, with surrounding
/// whitespace and quotes removed. An empty value counts as undeclared.
pub fn extract_external_job_id(spec: &str) -> Option<String> {
    spec.lines().find_map(|line| {
        let (key, value) = line.trim().split_once('=')?;
        if key.trim() != EXTERNAL_JOB_ID_KEY {
            return None;
        }
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Checks that a job spec is non-blank and declares `type` and `schemaVersion`.
pub fn validate_job_spec(spec: &str) -> Result<(), SpecError> {
    if spec.trim().is_empty() {
        return Err(SpecError::Empty);
    }

    for (field, pattern) in REQUIRED_FIELDS.iter() {
        if !pattern.is_match(spec) {
            return Err(SpecError::MissingField(field));
        }
    }

    Ok(())
}
