// Service exports
pub mod cache;
pub mod matching;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod supabase;

pub use cache::{CacheError, CacheKey, CacheManager, CacheStats, CachedProfileStore};
pub use matching::{DiscoveryOutcome, MatchingService};
pub use memory::{MemoryLedger, MemoryProfileStore};
pub use postgres::PostgresLedger;
pub use store::{
    CandidateFilter, MatchLedger, MatchRecordOutcome, MatchStore, ProfileStore, StoreError, SwipePolicy, SwipeRemoval,
    SwipeStore, SwipeWrite, UpsertDecision, VerificationProvider,
};
pub use supabase::{SupabaseClient, SupabaseTables};
