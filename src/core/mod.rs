// Core algorithm exports
pub mod completeness;
pub mod dealbreakers;
pub mod error;
pub mod insights;
pub mod matcher;
pub mod normalizer;
pub mod scoring;
pub mod swipes;

pub use completeness::{CompletenessTable, ProfileCompleteness, ProfileField, TableError};
pub use dealbreakers::{Conflict, Habit};
pub use error::{MatchingError, NormalizeError};
pub use insights::{CompatibilityQuality, MatchInsights};
pub use matcher::{Matcher, RankedCandidate, RankedFeed, RankingOutcome};
pub use normalizer::normalize;
pub use scoring::{CompatibilityResult, CompatibilityScorer, Dimension, DimensionScore, ScoringWeights};
pub use swipes::{is_mutual, resolve_upsert, SwipeMachine, SwipeOutcome, SwipeRules};
