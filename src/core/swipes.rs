use crate::core::error::MatchingError;
use crate::models::{MatchRecord, MatchedEvent, MatchingContext, PairKey, Swipe, SwipeAction, SwipeStats};
use crate::services::{MatchLedger, MatchRecordOutcome, SwipePolicy, SwipeRemoval, UpsertDecision};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

const EVENT_CAPACITY: usize = 256;

/// When the pair was last unmatched, if its latest match is inactive.
fn unmatched_since(latest_match: Option<&MatchRecord>) -> Option<DateTime<Utc>> {
    latest_match.filter(|m| !m.is_active).and_then(|m| m.unmatched_at)
}

/// Upsert policy for a directional swipe.
///
/// - pass on an actively matched pair: rejected, the row is left alone
/// - no prior row: insert
/// - different action: replace, so the latest decision wins
/// - same action: unchanged, keeping the original timestamp, unless the
///   prior row predates the pair's last unmatch, in which case it is
///   refreshed so it counts as a fresh decision
pub fn resolve_upsert(
    existing: Option<&Swipe>,
    incoming: &Swipe,
    latest_match: Option<&MatchRecord>,
) -> UpsertDecision {
    if incoming.action == SwipeAction::Pass && latest_match.is_some_and(|m| m.is_active) {
        return UpsertDecision::Rejected;
    }
    let stale_before = unmatched_since(latest_match);
    match existing {
        None => UpsertDecision::Insert,
        Some(prev) if prev.action != incoming.action => UpsertDecision::Replace,
        Some(prev) if stale_before.is_some_and(|t| prev.recorded_at <= t) => UpsertDecision::Replace,
        Some(_) => UpsertDecision::Unchanged,
    }
}

/// Both directions hold a like, each recorded after the last unmatch.
pub fn is_mutual(stored: &Swipe, reciprocal: Option<&Swipe>, latest_match: Option<&MatchRecord>) -> bool {
    let stale_before = unmatched_since(latest_match);
    stored.action == SwipeAction::Like
        && reciprocal.is_some_and(|r| {
            r.action == SwipeAction::Like
                && stale_before.map_or(true, |t| r.recorded_at > t && stored.recorded_at > t)
        })
}

/// The like/pass rules, evaluated by the ledger under the pair lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwipeRules;

impl SwipePolicy for SwipeRules {
    fn decide(&self, existing: Option<&Swipe>, incoming: &Swipe, latest_match: Option<&MatchRecord>) -> UpsertDecision {
        resolve_upsert(existing, incoming, latest_match)
    }

    // Likes are re-evaluated even when unchanged; an already active match
    // comes back as `AlreadyActive` and is not announced again.
    fn forms_match(&self, stored: &Swipe, reciprocal: Option<&Swipe>, latest_match: Option<&MatchRecord>) -> bool {
        is_mutual(stored, reciprocal, latest_match)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwipeOutcome {
    pub swipe: Swipe,
    #[serde(skip)]
    pub decision: UpsertDecision,
    /// Set only on the call that created the match.
    pub matched: Option<MatchRecord>,
}

/// Per-pair like/pass state machine on top of a [`MatchLedger`].
///
/// A pair becomes matched the moment both directions hold a like, and a
/// [`MatchedEvent`] is published exactly once per match record.
#[derive(Clone)]
pub struct SwipeMachine {
    ledger: Arc<dyn MatchLedger>,
    events: broadcast::Sender<MatchedEvent>,
}

impl SwipeMachine {
    pub fn new(ledger: Arc<dyn MatchLedger>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { ledger, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MatchedEvent> {
        self.events.subscribe()
    }

    pub fn ledger(&self) -> &Arc<dyn MatchLedger> {
        &self.ledger
    }

    pub async fn record_swipe(
        &self,
        swiper_id: &str,
        swiped_id: &str,
        action: SwipeAction,
        context: MatchingContext,
    ) -> Result<SwipeOutcome, MatchingError> {
        if swiper_id == swiped_id {
            return Err(MatchingError::SelfSwipeRejected(swiper_id.to_string()));
        }

        let swipe = Swipe::new(swiper_id, swiped_id, action, context);
        let write = self.ledger.apply_swipe(&swipe, &SwipeRules).await?;

        debug!(
            swiper = %swiper_id,
            swiped = %swiped_id,
            context = context.as_str(),
            decision = ?write.decision,
            "Swipe applied"
        );

        if write.decision == UpsertDecision::Rejected {
            return Err(MatchingError::PairAlreadyMatched(
                swiper_id.to_string(),
                swiped_id.to_string(),
            ));
        }

        let matched = match write.matched {
            Some(MatchRecordOutcome::Created(record)) => {
                info!(
                    match_id = %record.id,
                    user1 = %record.pair.user1_id,
                    user2 = %record.pair.user2_id,
                    context = context.as_str(),
                    "Pair matched"
                );
                if self.events.send(MatchedEvent::from(&record)).is_err() {
                    debug!(match_id = %record.id, "No match event subscribers");
                }
                Some(record)
            }
            _ => None,
        };

        Ok(SwipeOutcome {
            swipe: write.stored,
            decision: write.decision,
            matched,
        })
    }

    pub async fn check_matched(
        &self,
        user_a: &str,
        user_b: &str,
        context: MatchingContext,
    ) -> Result<bool, MatchingError> {
        let pair = PairKey::new(user_a, user_b, context);
        Ok(self
            .ledger
            .latest_match(&pair)
            .await?
            .is_some_and(|m| m.is_active))
    }

    /// Counterpart ids of the user's active matches, newest first.
    pub async fn list_matches(&self, user_id: &str, context: MatchingContext) -> Result<Vec<String>, MatchingError> {
        Ok(self
            .list_match_records(user_id, context)
            .await?
            .iter()
            .filter_map(|m| m.pair.counterpart(user_id).map(str::to_string))
            .collect())
    }

    pub async fn list_match_records(
        &self,
        user_id: &str,
        context: MatchingContext,
    ) -> Result<Vec<MatchRecord>, MatchingError> {
        Ok(self.ledger.list_matches_for_user(user_id, context).await?)
    }

    /// Soft-deactivate a match on behalf of one of its participants.
    ///
    /// Returns `false` if the match does not exist or is already inactive.
    /// Swipe rows are kept; a rematch needs fresh likes from both sides.
    pub async fn unmatch(&self, user_id: &str, match_id: Uuid) -> Result<bool, MatchingError> {
        let Some(record) = self.ledger.get_match(match_id).await? else {
            return Ok(false);
        };
        if !record.pair.includes(user_id) {
            return Err(MatchingError::NotAParticipant(user_id.to_string()));
        }
        if !record.is_active {
            return Ok(false);
        }

        let deactivated = self.ledger.deactivate_match(match_id).await?;
        if deactivated.is_some() {
            info!(match_id = %match_id, user = %user_id, "Pair unmatched");
        }
        Ok(deactivated.is_some())
    }

    /// Remove the caller's own swipe so the candidate reappears in the feed.
    pub async fn undo_swipe(
        &self,
        swiper_id: &str,
        swiped_id: &str,
        context: MatchingContext,
    ) -> Result<bool, MatchingError> {
        if swiper_id == swiped_id {
            return Err(MatchingError::SelfSwipeRejected(swiper_id.to_string()));
        }
        match self.ledger.delete_swipe(swiper_id, swiped_id, context).await? {
            SwipeRemoval::Removed => Ok(true),
            SwipeRemoval::Missing => Ok(false),
            SwipeRemoval::PairMatched => Err(MatchingError::PairAlreadyMatched(
                swiper_id.to_string(),
                swiped_id.to_string(),
            )),
        }
    }

    pub async fn stats(&self, user_id: &str, context: MatchingContext) -> Result<SwipeStats, MatchingError> {
        let mut stats = self.ledger.swipe_stats(user_id, context).await?;
        stats.active_matches = self.ledger.list_matches_for_user(user_id, context).await?.len() as i64;
        Ok(stats)
    }
}
