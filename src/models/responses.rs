use crate::core::completeness::ProfileCompleteness;
use crate::core::scoring::CompatibilityResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

/// One ranked candidate in a feed page
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub user_id: String,
    pub display_name: String,
    pub compatibility: CompatibilityResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Ready,
    Locked,
}

/// Response for the discovery feed endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryFeedResponse {
    pub status: FeedStatus,
    pub completeness: ProfileCompleteness,
    pub candidates: Vec<FeedEntry>,
    pub total_results: usize,
    pub next_offset: Option<usize>,
    pub skipped_records: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwipeResponse {
    pub success: bool,
    pub action: String,
    pub matched: bool,
    pub match_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub match_id: Uuid,
    pub user_id: String,
    pub matched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchesResponse {
    pub user_id: String,
    pub context: String,
    pub matches: Vec<MatchSummary>,
}

/// Result of an undo or unmatch request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedResponse {
    pub changed: bool,
}
