use crate::services::StoreError;
use thiserror::Error;

/// A raw profile row that cannot become a [`crate::models::Profile`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("profile record has no user id")]
    MissingUserId,
}

/// Errors surfaced by the matching core.
#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("Malformed profile data: {0}")]
    MalformedProfileData(#[from] NormalizeError),

    #[error("User {0} cannot swipe on themselves")]
    SelfSwipeRejected(String),

    #[error("Users {0} and {1} are matched; unmatch before passing")]
    PairAlreadyMatched(String, String),

    #[error("User {0} is not part of this match")]
    NotAParticipant(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
