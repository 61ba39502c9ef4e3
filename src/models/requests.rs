use crate::models::{MatchingContext, SwipeAction};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

fn default_context() -> String {
    MatchingContext::SearcherMatching.as_str().to_string()
}

fn validate_context(raw: &str) -> Result<(), ValidationError> {
    MatchingContext::parse(raw)
        .map(|_| ())
        .ok_or_else(|| ValidationError::new("unknown_context"))
}

fn validate_action(raw: &str) -> Result<(), ValidationError> {
    SwipeAction::parse(raw)
        .map(|_| ())
        .ok_or_else(|| ValidationError::new("unknown_action"))
}

/// Pairwise compatibility request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "other_user_id")]
    pub other_user_id: String,
}

/// Request for a page of the discovery feed
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryFeedRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[validate(custom(function = "validate_context"))]
    #[serde(default = "default_context")]
    pub context: String,
    #[serde(default)]
    pub offset: usize,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SwipeRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "target_user_id")]
    pub target_user_id: String,
    #[validate(custom(function = "validate_action"))]
    pub action: String,
    #[validate(custom(function = "validate_context"))]
    #[serde(default = "default_context")]
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UndoSwipeRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "target_user_id")]
    pub target_user_id: String,
    #[validate(custom(function = "validate_context"))]
    #[serde(default = "default_context")]
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[serde(alias = "match_id")]
    pub match_id: uuid::Uuid,
}

/// Query string for per-user listings (`/matches`, `/swipes/stats`)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserContextQuery {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[validate(custom(function = "validate_context"))]
    #[serde(default = "default_context")]
    pub context: String,
}
