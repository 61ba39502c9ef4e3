// Model exports
pub mod domain;
pub mod raw;
pub mod requests;
pub mod responses;
pub mod swipe;

pub use domain::{
    AgeRange, BudgetRange, ColivingSize, CulturalOpenness, DietType, EventInterest, Frequency, GenderMix,
    MusicHabits, Profile, SharingOpenness, TimePreference, VerificationData, WorkSchedule,
};
pub use raw::{CleanlinessTag, CleanlinessValue, RawField, RawProfileRecord};
pub use requests::{
    CompatibilityRequest, DiscoveryFeedRequest, SwipeRequest, UndoSwipeRequest, UnmatchRequest, UserContextQuery,
};
pub use responses::{
    ChangedResponse, DiscoveryFeedResponse, ErrorResponse, FeedEntry, FeedStatus, HealthResponse, MatchSummary,
    MatchesResponse, SwipeResponse,
};
pub use swipe::{MatchRecord, MatchedEvent, MatchingContext, PairKey, Swipe, SwipeAction, SwipeStats};
