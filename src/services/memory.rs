use crate::models::{
    MatchRecord, MatchingContext, PairKey, RawProfileRecord, Swipe, SwipeAction, SwipeStats, VerificationData,
};
use crate::services::store::{
    CandidateFilter, MatchRecordOutcome, MatchStore, ProfileStore, StoreError, SwipePolicy, SwipeRemoval, SwipeStore,
    SwipeWrite, UpsertDecision, VerificationProvider,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

type SwipeKey = (String, String, MatchingContext);

#[derive(Debug, Default)]
struct LedgerState {
    swipes: HashMap<SwipeKey, Swipe>,
    /// Insertion order doubles as creation order.
    matches: Vec<MatchRecord>,
}

impl LedgerState {
    fn latest_match(&self, pair: &PairKey) -> Option<&MatchRecord> {
        self.matches.iter().rev().find(|m| &m.pair == pair)
    }

    fn record_match(&mut self, pair: &PairKey) -> MatchRecordOutcome {
        if let Some(active) = self.matches.iter().find(|m| &m.pair == pair && m.is_active) {
            return MatchRecordOutcome::AlreadyActive(active.clone());
        }
        let record = MatchRecord::new(pair.clone());
        self.matches.push(record.clone());
        MatchRecordOutcome::Created(record)
    }
}

/// Swipe and match ledger held in process memory.
///
/// Every operation runs under one mutex, so a swipe write, the read of its
/// reciprocal and the match it forms are never interleaved with another
/// writer or an unmatch.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(swiper_id: &str, swiped_id: &str, context: MatchingContext) -> SwipeKey {
    (swiper_id.to_string(), swiped_id.to_string(), context)
}

#[async_trait]
impl SwipeStore for MemoryLedger {
    async fn apply_swipe(&self, swipe: &Swipe, policy: &dyn SwipePolicy) -> Result<SwipeWrite, StoreError> {
        let mut state = self.state.lock().await;

        let pair = swipe.pair();
        let latest = state.latest_match(&pair).cloned();
        let own_key = key(&swipe.swiper_id, &swipe.swiped_id, swipe.context);
        let existing = state.swipes.get(&own_key).cloned();
        let decision = policy.decide(existing.as_ref(), swipe, latest.as_ref());

        let stored = if decision.writes() {
            let row = Swipe {
                recorded_at: Utc::now(),
                ..swipe.clone()
            };
            state.swipes.insert(own_key, row.clone());
            row
        } else {
            existing.unwrap_or_else(|| swipe.clone())
        };

        let reciprocal = state
            .swipes
            .get(&key(&swipe.swiped_id, &swipe.swiper_id, swipe.context))
            .cloned();

        let matched = match decision {
            UpsertDecision::Rejected => None,
            _ if policy.forms_match(&stored, reciprocal.as_ref(), latest.as_ref()) => Some(state.record_match(&pair)),
            _ => None,
        };

        Ok(SwipeWrite {
            decision,
            stored,
            reciprocal,
            matched,
        })
    }

    async fn get_swipe(
        &self,
        swiper_id: &str,
        swiped_id: &str,
        context: MatchingContext,
    ) -> Result<Option<Swipe>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.swipes.get(&key(swiper_id, swiped_id, context)).cloned())
    }

    async fn list_swipes_by_swiper(
        &self,
        swiper_id: &str,
        context: MatchingContext,
    ) -> Result<HashSet<String>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .swipes
            .values()
            .filter(|s| s.swiper_id == swiper_id && s.context == context)
            .map(|s| s.swiped_id.clone())
            .collect())
    }

    async fn delete_swipe(
        &self,
        swiper_id: &str,
        swiped_id: &str,
        context: MatchingContext,
    ) -> Result<SwipeRemoval, StoreError> {
        let mut state = self.state.lock().await;
        let pair = PairKey::new(swiper_id, swiped_id, context);
        if state.latest_match(&pair).is_some_and(|m| m.is_active) {
            return Ok(SwipeRemoval::PairMatched);
        }
        Ok(match state.swipes.remove(&key(swiper_id, swiped_id, context)) {
            Some(_) => SwipeRemoval::Removed,
            None => SwipeRemoval::Missing,
        })
    }

    async fn swipe_stats(&self, user_id: &str, context: MatchingContext) -> Result<SwipeStats, StoreError> {
        let state = self.state.lock().await;
        let mut stats = SwipeStats {
            user_id: user_id.to_string(),
            ..SwipeStats::default()
        };
        for swipe in state
            .swipes
            .values()
            .filter(|s| s.swiper_id == user_id && s.context == context)
        {
            match swipe.action {
                SwipeAction::Like => stats.liked += 1,
                SwipeAction::Pass => stats.passed += 1,
            }
            if stats.last_swiped_at.map_or(true, |t| swipe.recorded_at > t) {
                stats.last_swiped_at = Some(swipe.recorded_at);
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl MatchStore for MemoryLedger {
    async fn get_match(&self, match_id: Uuid) -> Result<Option<MatchRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.matches.iter().find(|m| m.id == match_id).cloned())
    }

    async fn latest_match(&self, pair: &PairKey) -> Result<Option<MatchRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.latest_match(pair).cloned())
    }

    async fn list_matches_for_user(
        &self,
        user_id: &str,
        context: MatchingContext,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .matches
            .iter()
            .rev()
            .filter(|m| m.is_active && m.pair.context == context && m.pair.includes(user_id))
            .cloned()
            .collect())
    }

    async fn deactivate_match(&self, match_id: Uuid) -> Result<Option<MatchRecord>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state
            .matches
            .iter_mut()
            .find(|m| m.id == match_id && m.is_active)
            .map(|m| {
                m.is_active = false;
                m.unmatched_at = Some(Utc::now());
                m.clone()
            }))
    }
}

/// Profile rows and verification facts held in process memory.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<BTreeMap<String, RawProfileRecord>>,
    verification: RwLock<HashMap<String, VerificationData>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a row under its user id. Rows without one are rejected.
    pub async fn insert(&self, record: RawProfileRecord) -> bool {
        let Some(user_id) = record.user_id().map(str::to_string) else {
            return false;
        };
        self.profiles.write().await.insert(user_id, record);
        true
    }

    pub async fn set_verification(&self, user_id: &str, data: VerificationData) {
        self.verification.write().await.insert(user_id.to_string(), data);
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<RawProfileRecord>, StoreError> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn query_candidates(&self, filter: &CandidateFilter) -> Result<Vec<RawProfileRecord>, StoreError> {
        let profiles = self.profiles.read().await;
        Ok(profiles
            .iter()
            .filter(|(id, _)| !filter.excludes(id))
            .filter(|(_, record)| record.user_type().map_or(true, |t| t.eq_ignore_ascii_case(&filter.user_type)))
            .take(filter.limit)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[async_trait]
impl VerificationProvider for MemoryProfileStore {
    async fn verification(&self, user_id: &str) -> Result<VerificationData, StoreError> {
        Ok(self
            .verification
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}
