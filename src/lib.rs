//! Coloc Match - roommate compatibility and swipe matching engine
//!
//! Normalises loosely-typed profile rows, grades profile completeness,
//! scores pairwise roommate compatibility, ranks a discovery feed and runs
//! the per-pair like/pass state machine that forms matches.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{
    normalize, CompatibilityResult, CompatibilityScorer, CompletenessTable, Matcher, MatchingError, ProfileCompleteness,
    RankedFeed, ScoringWeights, SwipeMachine,
};
pub use models::{MatchingContext, Profile, RawProfileRecord, SwipeAction};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let profile = Profile::new("u1");
        let report = CompletenessTable::bundled().unwrap().evaluate(&profile, None);
        assert!(!report.is_unlocked);
        let matcher = Matcher::new(CompatibilityScorer::bundled().unwrap());
        assert_eq!(matcher.scorer().weights(), &ScoringWeights::default());
    }
}
