use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Matching mode; swipes, matches and candidate pools are scoped by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "matching_context", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchingContext {
    SearcherMatching,
    ResidentMatching,
}

impl MatchingContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearcherMatching => "searcher_matching",
            Self::ResidentMatching => "resident_matching",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "searcher_matching" | "searcher" => Some(Self::SearcherMatching),
            "resident_matching" | "resident" => Some(Self::ResidentMatching),
            _ => None,
        }
    }

    /// User type shown in the candidate pool for this context.
    ///
    /// Searchers browse other searchers; residents look for searchers to
    /// fill a room.
    pub fn candidate_user_type(&self) -> &'static str {
        "searcher"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "swipe_action", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SwipeAction {
    Like,
    Pass,
}

impl SwipeAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "like" | "liked" => Some(Self::Like),
            "pass" | "passed" => Some(Self::Pass),
            _ => None,
        }
    }
}

/// A directional like/pass decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swipe {
    pub swiper_id: String,
    pub swiped_id: String,
    pub action: SwipeAction,
    pub context: MatchingContext,
    pub recorded_at: DateTime<Utc>,
}

impl Swipe {
    pub fn new(
        swiper_id: impl Into<String>,
        swiped_id: impl Into<String>,
        action: SwipeAction,
        context: MatchingContext,
    ) -> Self {
        Self {
            swiper_id: swiper_id.into(),
            swiped_id: swiped_id.into(),
            action,
            context,
            recorded_at: Utc::now(),
        }
    }

    pub fn pair(&self) -> PairKey {
        PairKey::new(&self.swiper_id, &self.swiped_id, self.context)
    }
}

/// Unordered user pair within a context. `user1_id` sorts before `user2_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub user1_id: String,
    pub user2_id: String,
    pub context: MatchingContext,
}

impl PairKey {
    pub fn new(a: &str, b: &str, context: MatchingContext) -> Self {
        let (user1_id, user2_id) = if a <= b { (a, b) } else { (b, a) };
        Self {
            user1_id: user1_id.to_string(),
            user2_id: user2_id.to_string(),
            context,
        }
    }

    pub fn includes(&self, user_id: &str) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    pub fn counterpart(&self, user_id: &str) -> Option<&str> {
        if self.user1_id == user_id {
            Some(&self.user2_id)
        } else if self.user2_id == user_id {
            Some(&self.user1_id)
        } else {
            None
        }
    }

    /// Stable text key, used for advisory locks and cache keys.
    pub fn lock_key(&self) -> String {
        format!("{}:{}:{}", self.context.as_str(), self.user1_id, self.user2_id)
    }
}

/// Persisted record of a mutual like. Never mutated except for soft
/// deactivation on unmatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: uuid::Uuid,
    pub pair: PairKey,
    pub matched_at: DateTime<Utc>,
    pub is_active: bool,
    pub unmatched_at: Option<DateTime<Utc>>,
}

impl MatchRecord {
    pub fn new(pair: PairKey) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            pair,
            matched_at: Utc::now(),
            is_active: true,
            unmatched_at: None,
        }
    }
}

/// Event published the moment a pair becomes matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedEvent {
    pub match_id: uuid::Uuid,
    pub pair: PairKey,
    pub matched_at: DateTime<Utc>,
}

impl From<&MatchRecord> for MatchedEvent {
    fn from(record: &MatchRecord) -> Self {
        Self {
            match_id: record.id,
            pair: record.pair.clone(),
            matched_at: record.matched_at,
        }
    }
}

/// Per-user swipe counters for one context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwipeStats {
    pub user_id: String,
    pub liked: i64,
    pub passed: i64,
    pub active_matches: i64,
    pub last_swiped_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_unordered() {
        let ab = PairKey::new("alice", "bob", MatchingContext::SearcherMatching);
        let ba = PairKey::new("bob", "alice", MatchingContext::SearcherMatching);

        assert_eq!(ab, ba);
        assert_eq!(ab.counterpart("bob"), Some("alice"));
        assert_eq!(ab.counterpart("carol"), None);
        assert_eq!(ab.lock_key(), "searcher_matching:alice:bob");
    }

    #[test]
    fn test_pair_key_scoped_by_context() {
        let searcher = PairKey::new("a", "b", MatchingContext::SearcherMatching);
        let resident = PairKey::new("a", "b", MatchingContext::ResidentMatching);
        assert_ne!(searcher, resident);
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(SwipeAction::parse("LIKED"), Some(SwipeAction::Like));
        assert_eq!(SwipeAction::parse("pass"), Some(SwipeAction::Pass));
        assert_eq!(SwipeAction::parse("superlike"), None);
    }
}
