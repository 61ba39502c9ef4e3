use crate::models::{
    MatchRecord, MatchingContext, PairKey, RawProfileRecord, Swipe, SwipeStats, VerificationData,
};
use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

/// Collaborator failure. Propagated unchanged; the core never retries.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Persistence unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Candidate pool query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateFilter {
    pub context: MatchingContext,
    pub user_type: String,
    /// Sorted, so equal filters hash and cache identically.
    pub exclude_ids: Vec<String>,
    pub limit: usize,
}

impl CandidateFilter {
    pub fn new(context: MatchingContext, exclude_ids: impl IntoIterator<Item = String>, limit: usize) -> Self {
        let mut exclude_ids: Vec<String> = exclude_ids.into_iter().collect();
        exclude_ids.sort();
        exclude_ids.dedup();
        Self {
            context,
            user_type: context.candidate_user_type().to_string(),
            exclude_ids,
            limit,
        }
    }

    pub fn excludes(&self, user_id: &str) -> bool {
        self.exclude_ids.binary_search_by(|id| id.as_str().cmp(user_id)).is_ok()
    }
}

/// What a swipe write does to the directional row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertDecision {
    /// No prior row; store the incoming swipe.
    Insert,
    /// Overwrite the prior row with the incoming swipe.
    Replace,
    /// Keep the prior row untouched.
    Unchanged,
    /// The pair's state forbids this swipe; nothing is written.
    Rejected,
}

impl UpsertDecision {
    pub fn writes(&self) -> bool {
        matches!(self, Self::Insert | Self::Replace)
    }
}

/// Rules a [`SwipeStore`] applies while it holds the pair's lock.
///
/// Storage reads the current rows and the pair's latest match, asks the
/// policy, and executes the answer. It never interprets the rows itself.
pub trait SwipePolicy: Send + Sync {
    fn decide(&self, existing: Option<&Swipe>, incoming: &Swipe, latest_match: Option<&MatchRecord>) -> UpsertDecision;

    /// Whether the rows as they stand after the write call for a match.
    fn forms_match(&self, stored: &Swipe, reciprocal: Option<&Swipe>, latest_match: Option<&MatchRecord>) -> bool;
}

/// Result of [`SwipeStore::apply_swipe`].
#[derive(Debug, Clone, PartialEq)]
pub struct SwipeWrite {
    pub decision: UpsertDecision,
    /// The row as it stands after the write.
    pub stored: Swipe,
    /// The opposite-direction row, read in the same consistency scope.
    pub reciprocal: Option<Swipe>,
    /// Set when the policy called for a match.
    pub matched: Option<MatchRecordOutcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchRecordOutcome {
    Created(MatchRecord),
    AlreadyActive(MatchRecord),
}

impl MatchRecordOutcome {
    pub fn record(&self) -> &MatchRecord {
        match self {
            Self::Created(record) | Self::AlreadyActive(record) => record,
        }
    }
}

/// Result of [`SwipeStore::delete_swipe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeRemoval {
    Removed,
    Missing,
    /// The pair holds an active match; the row was kept.
    PairMatched,
}

/// Source of raw profile rows.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<RawProfileRecord>, StoreError>;

    async fn query_candidates(&self, filter: &CandidateFilter) -> Result<Vec<RawProfileRecord>, StoreError>;
}

/// Auxiliary account facts, consumed only by the completeness evaluator.
#[async_trait]
pub trait VerificationProvider: Send + Sync {
    async fn verification(&self, user_id: &str) -> Result<VerificationData, StoreError>;
}

/// Directional swipe rows, one per (swiper, swiped, context).
#[async_trait]
pub trait SwipeStore: Send + Sync {
    /// Write `swipe` as `policy` decides, read the reciprocal row and create
    /// the match if the policy calls for one. All of it happens within one
    /// transaction that serialises writers on the same pair, and written
    /// rows are stamped inside it.
    async fn apply_swipe(&self, swipe: &Swipe, policy: &dyn SwipePolicy) -> Result<SwipeWrite, StoreError>;

    async fn get_swipe(
        &self,
        swiper_id: &str,
        swiped_id: &str,
        context: MatchingContext,
    ) -> Result<Option<Swipe>, StoreError>;

    async fn list_swipes_by_swiper(
        &self,
        swiper_id: &str,
        context: MatchingContext,
    ) -> Result<HashSet<String>, StoreError>;

    /// Remove the row unless the pair is matched, checked under the pair lock.
    async fn delete_swipe(
        &self,
        swiper_id: &str,
        swiped_id: &str,
        context: MatchingContext,
    ) -> Result<SwipeRemoval, StoreError>;

    /// Like/pass counts. `active_matches` is left at zero.
    async fn swipe_stats(&self, user_id: &str, context: MatchingContext) -> Result<SwipeStats, StoreError>;
}

/// Match records. At most one active record per pair.
#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn get_match(&self, match_id: Uuid) -> Result<Option<MatchRecord>, StoreError>;

    /// Most recent record for the pair, active or not.
    async fn latest_match(&self, pair: &PairKey) -> Result<Option<MatchRecord>, StoreError>;

    /// Active records involving `user_id`, newest first.
    async fn list_matches_for_user(
        &self,
        user_id: &str,
        context: MatchingContext,
    ) -> Result<Vec<MatchRecord>, StoreError>;

    /// Soft-deactivate under the pair lock, stamping `unmatched_at` with the
    /// application clock. Returns the updated record if it was active.
    async fn deactivate_match(&self, match_id: Uuid) -> Result<Option<MatchRecord>, StoreError>;
}

/// Backing store of the swipe/match state machine.
pub trait MatchLedger: SwipeStore + MatchStore {}

impl<T: SwipeStore + MatchStore + ?Sized> MatchLedger for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_filter_normalises_exclusions() {
        let filter = CandidateFilter::new(
            MatchingContext::SearcherMatching,
            vec!["b".to_string(), "a".to_string(), "b".to_string()],
            50,
        );

        assert_eq!(filter.exclude_ids, vec!["a", "b"]);
        assert!(filter.excludes("a"));
        assert!(!filter.excludes("c"));
        assert_eq!(filter.user_type, "searcher");
    }
}
