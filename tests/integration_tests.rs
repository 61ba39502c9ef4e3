// Integration tests for Coloc Match

use async_trait::async_trait;
use chrono::NaiveDate;
use coloc_match::core::{CompatibilityScorer, Matcher, MatchingError, SwipeMachine};
use coloc_match::models::{
    MatchRecord, MatchingContext, PairKey, RawProfileRecord, Swipe, SwipeAction, SwipeStats, VerificationData,
};
use coloc_match::services::{
    DiscoveryOutcome, MatchStore, MatchingService, MemoryLedger, MemoryProfileStore, ProfileStore, StoreError,
    SwipePolicy, SwipeRemoval, SwipeStore, SwipeWrite, UpsertDecision, VerificationProvider,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const CTX: MatchingContext = MatchingContext::SearcherMatching;

fn machine() -> SwipeMachine {
    SwipeMachine::new(Arc::new(MemoryLedger::new()))
}

/// Memory ledger that holds pass writes back before applying them.
struct SlowPassLedger {
    inner: MemoryLedger,
    delay: Duration,
}

#[async_trait]
impl SwipeStore for SlowPassLedger {
    async fn apply_swipe(&self, swipe: &Swipe, policy: &dyn SwipePolicy) -> Result<SwipeWrite, StoreError> {
        if swipe.action == SwipeAction::Pass {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.apply_swipe(swipe, policy).await
    }

    async fn get_swipe(
        &self,
        swiper_id: &str,
        swiped_id: &str,
        context: MatchingContext,
    ) -> Result<Option<Swipe>, StoreError> {
        self.inner.get_swipe(swiper_id, swiped_id, context).await
    }

    async fn list_swipes_by_swiper(
        &self,
        swiper_id: &str,
        context: MatchingContext,
    ) -> Result<HashSet<String>, StoreError> {
        self.inner.list_swipes_by_swiper(swiper_id, context).await
    }

    async fn delete_swipe(
        &self,
        swiper_id: &str,
        swiped_id: &str,
        context: MatchingContext,
    ) -> Result<SwipeRemoval, StoreError> {
        self.inner.delete_swipe(swiper_id, swiped_id, context).await
    }

    async fn swipe_stats(&self, user_id: &str, context: MatchingContext) -> Result<SwipeStats, StoreError> {
        self.inner.swipe_stats(user_id, context).await
    }
}

#[async_trait]
impl MatchStore for SlowPassLedger {
    async fn get_match(&self, match_id: Uuid) -> Result<Option<MatchRecord>, StoreError> {
        self.inner.get_match(match_id).await
    }

    async fn latest_match(&self, pair: &PairKey) -> Result<Option<MatchRecord>, StoreError> {
        self.inner.latest_match(pair).await
    }

    async fn list_matches_for_user(
        &self,
        user_id: &str,
        context: MatchingContext,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        self.inner.list_matches_for_user(user_id, context).await
    }

    async fn deactivate_match(&self, match_id: Uuid) -> Result<Option<MatchRecord>, StoreError> {
        self.inner.deactivate_match(match_id).await
    }
}

fn raw(value: serde_json::Value) -> RawProfileRecord {
    RawProfileRecord::from_value(value).unwrap()
}

fn create_test_record(id: &str, cleanliness: u8, min_budget: u32, max_budget: u32) -> RawProfileRecord {
    raw(json!({
        "user_id": id,
        "user_type": "searcher",
        "first_name": format!("User {}", id),
        "last_name": "Test",
        "date_of_birth": "1997-09-03",
        "gender": "male",
        "languages_spoken": ["French"],
        "occupation_status": "employed",
        "bio": "Looking for a calm flatshare",
        "interests": ["climbing", "cooking"],
        "cleanliness_level": cleanliness,
        "social_energy": 5,
        "house_rules_preference": 6,
        "wake_up_time": "early",
        "sleep_time": "normal",
        "work_schedule": "hybrid",
        "guest_frequency": "sometimes",
        "smoking": false,
        "pets": false,
        "core_values": ["respect", "communication"],
        "important_qualities": ["tidy"],
        "min_budget": min_budget,
        "max_budget": max_budget,
        "age_range_min": 20,
        "age_range_max": 35
    }))
}

async fn create_test_service() -> (MatchingService, Arc<MemoryProfileStore>) {
    let store = Arc::new(MemoryProfileStore::new());

    store.insert(create_test_record("viewer", 8, 700, 1000)).await;
    store
        .set_verification(
            "viewer",
            VerificationData {
                email_verified: true,
                ..VerificationData::default()
            },
        )
        .await;

    store.insert(create_test_record("c2", 2, 500, 600)).await;
    store.insert(create_test_record("c7", 7, 750, 950)).await;
    store.insert(create_test_record("c9", 9, 800, 1200)).await;
    store
        .insert(raw(json!({ "user_id": "owner", "user_type": "owner", "cleanliness_level": 8 })))
        .await;

    let scorer = CompatibilityScorer::bundled()
        .unwrap()
        .with_reference_date(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
    let service = MatchingService::new(
        store.clone() as Arc<dyn ProfileStore>,
        store.clone() as Arc<dyn VerificationProvider>,
        machine(),
        Matcher::new(scorer),
        500,
    );
    (service, store)
}

fn feed_ids(outcome: &DiscoveryOutcome) -> Vec<String> {
    match outcome {
        DiscoveryOutcome::Ready { feed, .. } => feed.iter().map(|c| c.profile.user_id.clone()).collect(),
        DiscoveryOutcome::Locked { .. } => panic!("expected a ready feed"),
    }
}

#[tokio::test]
async fn test_mutual_likes_create_one_match() {
    let swipes = machine();
    let mut events = swipes.subscribe();

    let first = swipes.record_swipe("alice", "bob", SwipeAction::Like, CTX).await.unwrap();
    assert!(first.matched.is_none());

    let second = swipes.record_swipe("bob", "alice", SwipeAction::Like, CTX).await.unwrap();
    let record = second.matched.expect("second like should match");

    let event = events.recv().await.unwrap();
    assert_eq!(event.match_id, record.id);
    assert!(swipes.check_matched("alice", "bob", CTX).await.unwrap());
    assert_eq!(swipes.list_matches("alice", CTX).await.unwrap(), vec!["bob".to_string()]);

    // Repeating the like neither duplicates the row nor re-announces the match.
    let repeat = swipes.record_swipe("bob", "alice", SwipeAction::Like, CTX).await.unwrap();
    assert_eq!(repeat.decision, UpsertDecision::Unchanged);
    assert_eq!(repeat.swipe.recorded_at, second.swipe.recorded_at);
    assert!(repeat.matched.is_none());
    assert!(events.try_recv().is_err());

    let stats = swipes.stats("bob", CTX).await.unwrap();
    assert_eq!(stats.liked, 1);
    assert_eq!(stats.active_matches, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mutual_likes_match_exactly_once() {
    for round in 0..20 {
        let swipes = machine();
        let a = format!("a{}", round);
        let b = format!("b{}", round);

        let left = {
            let swipes = swipes.clone();
            let (a, b) = (a.clone(), b.clone());
            tokio::spawn(async move { swipes.record_swipe(&a, &b, SwipeAction::Like, CTX).await })
        };
        let right = {
            let swipes = swipes.clone();
            let (a, b) = (a.clone(), b.clone());
            tokio::spawn(async move { swipes.record_swipe(&b, &a, SwipeAction::Like, CTX).await })
        };

        let (left, right) = tokio::join!(left, right);
        let created = [left.unwrap().unwrap(), right.unwrap().unwrap()]
            .iter()
            .filter(|outcome| outcome.matched.is_some())
            .count();

        assert_eq!(created, 1, "round {} created {} matches", round, created);
        assert_eq!(swipes.list_match_records(&a, CTX).await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn test_pass_landing_after_completed_match_is_rejected() {
    let swipes = SwipeMachine::new(Arc::new(SlowPassLedger {
        inner: MemoryLedger::new(),
        delay: Duration::from_millis(50),
    }));
    swipes.record_swipe("alice", "bob", SwipeAction::Like, CTX).await.unwrap();

    let pass = {
        let swipes = swipes.clone();
        tokio::spawn(async move { swipes.record_swipe("alice", "bob", SwipeAction::Pass, CTX).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let like = swipes.record_swipe("bob", "alice", SwipeAction::Like, CTX).await.unwrap();
    assert!(like.matched.is_some());

    let err = pass.await.unwrap().unwrap_err();
    assert!(matches!(err, MatchingError::PairAlreadyMatched(_, _)));

    let row = swipes.ledger().get_swipe("alice", "bob", CTX).await.unwrap().unwrap();
    assert_eq!(row.action, SwipeAction::Like);
    assert!(swipes.check_matched("alice", "bob", CTX).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pass_and_like_never_split_a_match() {
    for round in 0..20 {
        let swipes = machine();
        let a = format!("a{}", round);
        let b = format!("b{}", round);
        swipes.record_swipe(&a, &b, SwipeAction::Like, CTX).await.unwrap();

        let pass = {
            let swipes = swipes.clone();
            let (a, b) = (a.clone(), b.clone());
            tokio::spawn(async move { swipes.record_swipe(&a, &b, SwipeAction::Pass, CTX).await })
        };
        let like = {
            let swipes = swipes.clone();
            let (a, b) = (a.clone(), b.clone());
            tokio::spawn(async move { swipes.record_swipe(&b, &a, SwipeAction::Like, CTX).await })
        };
        let (pass, like) = tokio::join!(pass, like);
        let (pass, like) = (pass.unwrap(), like.unwrap().unwrap());

        let row = swipes.ledger().get_swipe(&a, &b, CTX).await.unwrap().unwrap();
        if swipes.check_matched(&a, &b, CTX).await.unwrap() {
            assert!(like.matched.is_some(), "round {}", round);
            assert_eq!(row.action, SwipeAction::Like, "round {}", round);
            assert!(matches!(pass, Err(MatchingError::PairAlreadyMatched(_, _))), "round {}", round);
        } else {
            assert!(like.matched.is_none(), "round {}", round);
            assert_eq!(row.action, SwipeAction::Pass, "round {}", round);
            assert!(pass.is_ok(), "round {}", round);
        }
    }
}

#[tokio::test]
async fn test_latest_decision_wins() {
    let swipes = machine();

    swipes.record_swipe("alice", "bob", SwipeAction::Pass, CTX).await.unwrap();
    let changed = swipes.record_swipe("alice", "bob", SwipeAction::Like, CTX).await.unwrap();
    assert_eq!(changed.decision, UpsertDecision::Replace);
    assert_eq!(changed.swipe.action, SwipeAction::Like);

    let stats = swipes.stats("alice", CTX).await.unwrap();
    assert_eq!(stats.liked, 1);
    assert_eq!(stats.passed, 0);
}

#[tokio::test]
async fn test_contexts_are_independent() {
    let swipes = machine();

    swipes.record_swipe("alice", "bob", SwipeAction::Like, CTX).await.unwrap();
    let other = swipes
        .record_swipe("bob", "alice", SwipeAction::Like, MatchingContext::ResidentMatching)
        .await
        .unwrap();

    assert!(other.matched.is_none());
    assert!(!swipes.check_matched("alice", "bob", CTX).await.unwrap());
}

#[tokio::test]
async fn test_self_swipe_rejected() {
    let swipes = machine();

    let err = swipes.record_swipe("alice", "alice", SwipeAction::Like, CTX).await.unwrap_err();
    assert!(matches!(err, MatchingError::SelfSwipeRejected(_)));
    assert_eq!(swipes.stats("alice", CTX).await.unwrap().liked, 0);
}

#[tokio::test]
async fn test_pass_on_active_match_rejected() {
    let swipes = machine();
    swipes.record_swipe("alice", "bob", SwipeAction::Like, CTX).await.unwrap();
    swipes.record_swipe("bob", "alice", SwipeAction::Like, CTX).await.unwrap();

    let err = swipes.record_swipe("alice", "bob", SwipeAction::Pass, CTX).await.unwrap_err();
    assert!(matches!(err, MatchingError::PairAlreadyMatched(_, _)));
}

#[tokio::test]
async fn test_unmatch_then_rematch_needs_fresh_likes() {
    let swipes = machine();
    swipes.record_swipe("alice", "bob", SwipeAction::Like, CTX).await.unwrap();
    let first = swipes
        .record_swipe("bob", "alice", SwipeAction::Like, CTX)
        .await
        .unwrap()
        .matched
        .unwrap();

    let err = swipes.unmatch("carol", first.id).await.unwrap_err();
    assert!(matches!(err, MatchingError::NotAParticipant(_)));

    assert!(swipes.unmatch("alice", first.id).await.unwrap());
    assert!(!swipes.unmatch("alice", first.id).await.unwrap());
    assert!(!swipes.check_matched("alice", "bob", CTX).await.unwrap());
    assert!(swipes.list_matches("alice", CTX).await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(5)).await;

    // Alice's renewed like is fresh, Bob's old one is not.
    let renewed = swipes.record_swipe("alice", "bob", SwipeAction::Like, CTX).await.unwrap();
    assert_eq!(renewed.decision, UpsertDecision::Replace);
    assert!(renewed.matched.is_none());

    let rematch = swipes
        .record_swipe("bob", "alice", SwipeAction::Like, CTX)
        .await
        .unwrap()
        .matched
        .expect("fresh likes from both sides should rematch");
    assert_ne!(rematch.id, first.id);
    assert!(swipes.check_matched("alice", "bob", CTX).await.unwrap());
}

#[tokio::test]
async fn test_unmatch_unknown_match_is_noop() {
    let swipes = machine();
    assert!(!swipes.unmatch("alice", uuid::Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn test_undo_swipe() {
    let swipes = machine();
    swipes.record_swipe("alice", "bob", SwipeAction::Pass, CTX).await.unwrap();

    assert!(swipes.undo_swipe("alice", "bob", CTX).await.unwrap());
    assert!(!swipes.undo_swipe("alice", "bob", CTX).await.unwrap());
    assert_eq!(swipes.stats("alice", CTX).await.unwrap().passed, 0);

    swipes.record_swipe("alice", "bob", SwipeAction::Like, CTX).await.unwrap();
    swipes.record_swipe("bob", "alice", SwipeAction::Like, CTX).await.unwrap();
    let err = swipes.undo_swipe("alice", "bob", CTX).await.unwrap_err();
    assert!(matches!(err, MatchingError::PairAlreadyMatched(_, _)));
}

#[tokio::test]
async fn test_discovery_feed_end_to_end() {
    let (service, _) = create_test_service().await;

    let outcome = service.discovery_feed("viewer", CTX).await.unwrap();
    let ids = feed_ids(&outcome);

    // Owners are not in the searcher pool and the viewer never sees themselves.
    assert_eq!(ids.len(), 3);
    assert!(!ids.contains(&"viewer".to_string()));
    assert!(!ids.contains(&"owner".to_string()));
    let pos = |id: &str| ids.iter().position(|o| o == id).unwrap();
    assert!(pos("c7") < pos("c2"));

    if let DiscoveryOutcome::Ready { completeness, feed, skipped } = &outcome {
        assert!(completeness.is_unlocked);
        assert_eq!(*skipped, 0);
        assert!(feed.iter().all(|c| c.result.is_score_reliable));
    }

    // A decision removes the candidate on the very next request.
    service
        .swipes()
        .record_swipe("viewer", "c7", SwipeAction::Like, CTX)
        .await
        .unwrap();
    let ids = feed_ids(&service.discovery_feed("viewer", CTX).await.unwrap());
    assert_eq!(ids.len(), 2);
    assert!(!ids.contains(&"c7".to_string()));

    // Undo brings it back.
    service.swipes().undo_swipe("viewer", "c7", CTX).await.unwrap();
    let ids = feed_ids(&service.discovery_feed("viewer", CTX).await.unwrap());
    assert!(ids.contains(&"c7".to_string()));
}

#[tokio::test]
async fn test_discovery_feed_locked_until_verified() {
    let (service, store) = create_test_service().await;
    store.insert(create_test_record("newcomer", 6, 600, 900)).await;

    match service.discovery_feed("newcomer", CTX).await.unwrap() {
        DiscoveryOutcome::Locked { completeness } => {
            assert!(!completeness.is_unlocked);
            assert_eq!(completeness.required_for_unlock, vec!["verified_contact"]);
        }
        DiscoveryOutcome::Ready { .. } => panic!("unverified profile should be locked"),
    }

    store
        .set_verification(
            "newcomer",
            VerificationData {
                phone_verified: true,
                ..VerificationData::default()
            },
        )
        .await;
    assert!(matches!(
        service.discovery_feed("newcomer", CTX).await.unwrap(),
        DiscoveryOutcome::Ready { .. }
    ));
}

#[tokio::test]
async fn test_discovery_feed_missing_viewer() {
    let (service, _) = create_test_service().await;
    let err = service.discovery_feed("ghost", CTX).await.unwrap_err();
    assert!(matches!(err, MatchingError::ProfileNotFound(_)));
}

#[tokio::test]
async fn test_compatibility_between_stored_profiles() {
    let (service, _) = create_test_service().await;

    let result = service.compatibility("viewer", "c7").await.unwrap();
    assert_eq!(result.user1_id, "viewer");
    assert_eq!(result.user2_id, "c7");
    assert!(result.is_score_reliable);

    let reverse = service.compatibility("c7", "viewer").await.unwrap();
    assert_eq!(result.score, reverse.score);
}
