use crate::core::completeness::ProfileCompleteness;
use crate::core::error::MatchingError;
use crate::core::matcher::{Matcher, RankedFeed};
use crate::core::normalizer::normalize;
use crate::core::scoring::CompatibilityResult;
use crate::core::swipes::SwipeMachine;
use crate::models::{MatchingContext, Profile};
use crate::services::store::{CandidateFilter, ProfileStore, VerificationProvider};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of asking for a discovery feed.
#[derive(Debug, Clone)]
pub enum DiscoveryOutcome {
    /// The viewer's profile is not complete enough to browse.
    Locked { completeness: ProfileCompleteness },
    Ready {
        completeness: ProfileCompleteness,
        feed: RankedFeed,
        /// Candidate rows dropped as malformed.
        skipped: usize,
    },
}

/// Wires the pure core to its collaborators.
#[derive(Clone)]
pub struct MatchingService {
    profiles: Arc<dyn ProfileStore>,
    verification: Arc<dyn VerificationProvider>,
    swipes: SwipeMachine,
    matcher: Matcher,
    candidate_pool_limit: usize,
}

impl MatchingService {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        verification: Arc<dyn VerificationProvider>,
        swipes: SwipeMachine,
        matcher: Matcher,
        candidate_pool_limit: usize,
    ) -> Self {
        Self {
            profiles,
            verification,
            swipes,
            matcher,
            candidate_pool_limit,
        }
    }

    pub fn swipes(&self) -> &SwipeMachine {
        &self.swipes
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub async fn load_profile(&self, user_id: &str) -> Result<Profile, MatchingError> {
        let record = self
            .profiles
            .get_profile(user_id)
            .await?
            .ok_or_else(|| MatchingError::ProfileNotFound(user_id.to_string()))?;
        Ok(normalize(&record)?)
    }

    /// Completeness including verification facts.
    pub async fn completeness(&self, user_id: &str) -> Result<ProfileCompleteness, MatchingError> {
        let profile = self.load_profile(user_id).await?;
        self.completeness_of(&profile).await
    }

    async fn completeness_of(&self, profile: &Profile) -> Result<ProfileCompleteness, MatchingError> {
        let verification = self.verification.verification(&profile.user_id).await?;
        Ok(self
            .matcher
            .scorer()
            .table()
            .evaluate(profile, Some(&verification)))
    }

    pub async fn compatibility(&self, user_id: &str, other_id: &str) -> Result<CompatibilityResult, MatchingError> {
        let (a, b) = tokio::try_join!(self.load_profile(user_id), self.load_profile(other_id))?;
        Ok(self.matcher.scorer().score(&a, &b))
    }

    /// Ranked candidates for `viewer_id`, or `Locked` if their profile does
    /// not unlock discovery yet.
    pub async fn discovery_feed(
        &self,
        viewer_id: &str,
        context: MatchingContext,
    ) -> Result<DiscoveryOutcome, MatchingError> {
        let viewer = self.load_profile(viewer_id).await?;
        let completeness = self.completeness_of(&viewer).await?;

        if !completeness.is_unlocked {
            info!(
                viewer = %viewer_id,
                percentage = completeness.percentage,
                missing = ?completeness.required_for_unlock,
                "Discovery locked"
            );
            return Ok(DiscoveryOutcome::Locked { completeness });
        }

        // Always read fresh so a swipe made a moment ago is honoured.
        let decided = self
            .swipes
            .ledger()
            .list_swipes_by_swiper(viewer_id, context)
            .await?;

        let exclude = decided.iter().cloned().chain(std::iter::once(viewer_id.to_string()));
        let filter = CandidateFilter::new(context, exclude, self.candidate_pool_limit);
        let records = self.profiles.query_candidates(&filter).await?;

        let outcome = self.matcher.rank_records(&viewer, &records, &decided);

        debug!(
            viewer = %viewer_id,
            context = context.as_str(),
            fetched = records.len(),
            ranked = outcome.feed.len(),
            skipped = outcome.skipped,
            "Discovery feed built"
        );

        Ok(DiscoveryOutcome::Ready {
            completeness,
            feed: outcome.feed,
            skipped: outcome.skipped,
        })
    }
}
