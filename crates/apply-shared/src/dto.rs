//! Data Transfer Objects - per-action success payloads.

use serde::{Deserialize, Serialize};

/// `config`: non-secret flags the UI adapts to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPayload {
    pub require_user_key: bool,
    pub has_user_key: bool,
}

/// `perplexity_scout`: employer and job summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoutPayload {
    pub summary: String,
}

/// `generate_application`: the two drafts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftPayload {
    pub draft_native: String,
    pub draft_target: String,
}

/// `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}
