use crate::core::normalizer::normalize;
use crate::core::scoring::{CompatibilityResult, CompatibilityScorer};
use crate::models::{Profile, RawProfileRecord};
use std::collections::HashSet;
use tracing::{debug, warn};

/// A candidate together with its compatibility against the viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub profile: Profile,
    pub result: CompatibilityResult,
}

/// Candidates ordered by descending score, ties broken by ascending id.
///
/// Iteration borrows the feed, so it can be walked any number of times and
/// always yields the same order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedFeed {
    entries: Vec<RankedCandidate>,
}

impl RankedFeed {
    pub fn iter(&self) -> std::slice::Iter<'_, RankedCandidate> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Window of at most `limit` entries starting at `offset`.
    pub fn page(&self, offset: usize, limit: usize) -> &[RankedCandidate] {
        let start = offset.min(self.entries.len());
        let end = start.saturating_add(limit).min(self.entries.len());
        &self.entries[start..end]
    }

    pub fn into_vec(self) -> Vec<RankedCandidate> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a RankedFeed {
    type Item = &'a RankedCandidate;
    type IntoIter = std::slice::Iter<'a, RankedCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Feed built from raw store records.
#[derive(Debug, Clone, Default)]
pub struct RankingOutcome {
    pub feed: RankedFeed,
    /// Records dropped because they could not be normalised.
    pub skipped: usize,
}

/// Candidate ranker.
///
/// Pure with respect to its arguments: fetching the pool and the set of
/// already-decided ids is the caller's job.
#[derive(Debug, Clone)]
pub struct Matcher {
    scorer: CompatibilityScorer,
}

impl Matcher {
    pub fn new(scorer: CompatibilityScorer) -> Self {
        Self { scorer }
    }

    pub fn scorer(&self) -> &CompatibilityScorer {
        &self.scorer
    }

    /// Score every eligible candidate against `viewer` and order them.
    ///
    /// Excludes the viewer, any id in `already_decided`, and repeated ids
    /// (first occurrence wins).
    pub fn rank_candidates(
        &self,
        viewer: &Profile,
        pool: &[Profile],
        already_decided: &HashSet<String>,
    ) -> RankedFeed {
        let mut seen: HashSet<&str> = HashSet::with_capacity(pool.len());

        let mut entries: Vec<RankedCandidate> = pool
            .iter()
            .filter(|candidate| candidate.user_id != viewer.user_id)
            .filter(|candidate| !already_decided.contains(&candidate.user_id))
            .filter(|candidate| seen.insert(candidate.user_id.as_str()))
            .map(|candidate| RankedCandidate {
                result: self.scorer.score(viewer, candidate),
                profile: candidate.clone(),
            })
            .collect();

        entries.sort_by(|a, b| {
            b.result
                .score
                .cmp(&a.result.score)
                .then_with(|| a.profile.user_id.cmp(&b.profile.user_id))
        });

        debug!(
            viewer = %viewer.user_id,
            pool = pool.len(),
            ranked = entries.len(),
            "Ranked candidates"
        );

        RankedFeed { entries }
    }

    /// Normalise raw records, skipping malformed ones, then rank.
    pub fn rank_records(
        &self,
        viewer: &Profile,
        records: &[RawProfileRecord],
        already_decided: &HashSet<String>,
    ) -> RankingOutcome {
        let mut skipped = 0;
        let pool: Vec<Profile> = records
            .iter()
            .filter_map(|record| match normalize(record) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!(viewer = %viewer.user_id, "Skipping candidate record: {}", e);
                    skipped += 1;
                    None
                }
            })
            .collect();

        RankingOutcome {
            feed: self.rank_candidates(viewer, &pool, already_decided),
            skipped,
        }
    }
}
