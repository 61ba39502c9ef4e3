use crate::config::DatabaseSettings;
use crate::models::{MatchRecord, MatchingContext, PairKey, Swipe, SwipeStats};
use crate::services::store::{
    MatchRecordOutcome, MatchStore, StoreError, SwipePolicy, SwipeRemoval, SwipeStore, SwipeWrite, UpsertDecision,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Row};
use std::collections::HashSet;
use std::time::Duration;
use uuid::Uuid;

const SWIPE_COLUMNS: &str = "swiper_id, swiped_id, action, context, recorded_at";
const MATCH_COLUMNS: &str = "id, user1_id, user2_id, context, matched_at, is_active, unmatched_at";

/// `unmatched_at` is bound from the application clock, the same clock that
/// stamps swipe rows, so freshness comparisons never mix clocks.
const DEACTIVATE_MATCH: &str = "UPDATE user_matches SET is_active = FALSE, unmatched_at = $2 \
     WHERE id = $1 AND is_active \
     RETURNING id, user1_id, user2_id, context, matched_at, is_active, unmatched_at";

/// PostgreSQL-backed swipe and match ledger.
///
/// Every write touching a pair (swipe, match creation, unmatch, undo) runs
/// in a transaction holding an advisory lock keyed on the unordered pair,
/// and at most one active match per pair is enforced by a partial unique
/// index.
#[derive(Debug, Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Connect and run pending migrations.
    pub async fn new(database_url: &str, max_connections: u32, min_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn from_settings(url: &str, settings: &DatabaseSettings) -> Result<Self, StoreError> {
        tracing::info!(
            max_connections = settings.max_connections,
            "Connecting to PostgreSQL swipe ledger"
        );
        Self::new(url, settings.max_connections, settings.min_connections).await
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }

    async fn lock_pair(conn: &mut PgConnection, pair: &PairKey) -> Result<(), StoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(pair.lock_key())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn fetch_swipe(
        conn: &mut PgConnection,
        swiper_id: &str,
        swiped_id: &str,
        context: MatchingContext,
    ) -> Result<Option<Swipe>, StoreError> {
        let query = format!(
            "SELECT {} FROM user_swipes WHERE swiper_id = $1 AND swiped_id = $2 AND context = $3",
            SWIPE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(swiper_id)
            .bind(swiped_id)
            .bind(context)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.as_ref().map(swipe_from_row).transpose()?)
    }

    async fn fetch_latest_match(conn: &mut PgConnection, pair: &PairKey) -> Result<Option<MatchRecord>, StoreError> {
        let query = format!(
            "SELECT {} FROM user_matches \
             WHERE user1_id = $1 AND user2_id = $2 AND context = $3 \
             ORDER BY matched_at DESC LIMIT 1",
            MATCH_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(&pair.user1_id)
            .bind(&pair.user2_id)
            .bind(pair.context)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.as_ref().map(match_from_row).transpose()?)
    }

    /// Create an active record unless one already exists. Callers hold the
    /// pair lock, so only one of them ever observes `Created`.
    async fn insert_match(conn: &mut PgConnection, pair: &PairKey) -> Result<MatchRecordOutcome, StoreError> {
        let candidate = MatchRecord::new(pair.clone());
        let insert = format!(
            "INSERT INTO user_matches (id, user1_id, user2_id, context, matched_at, is_active) \
             VALUES ($1, $2, $3, $4, $5, TRUE) \
             ON CONFLICT (user1_id, user2_id, context) WHERE is_active DO NOTHING \
             RETURNING {}",
            MATCH_COLUMNS
        );

        let created = sqlx::query(&insert)
            .bind(candidate.id)
            .bind(&pair.user1_id)
            .bind(&pair.user2_id)
            .bind(pair.context)
            .bind(candidate.matched_at)
            .fetch_optional(&mut *conn)
            .await?;

        if let Some(row) = created {
            return Ok(MatchRecordOutcome::Created(match_from_row(&row)?));
        }

        let existing = format!(
            "SELECT {} FROM user_matches \
             WHERE user1_id = $1 AND user2_id = $2 AND context = $3 AND is_active",
            MATCH_COLUMNS
        );
        let row = sqlx::query(&existing)
            .bind(&pair.user1_id)
            .bind(&pair.user2_id)
            .bind(pair.context)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| StoreError::Unavailable(format!("active match for {} vanished", pair.lock_key())))?;

        Ok(MatchRecordOutcome::AlreadyActive(match_from_row(&row)?))
    }
}

fn swipe_from_row(row: &PgRow) -> Result<Swipe, sqlx::Error> {
    Ok(Swipe {
        swiper_id: row.try_get("swiper_id")?,
        swiped_id: row.try_get("swiped_id")?,
        action: row.try_get("action")?,
        context: row.try_get("context")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

fn match_from_row(row: &PgRow) -> Result<MatchRecord, sqlx::Error> {
    Ok(MatchRecord {
        id: row.try_get("id")?,
        pair: PairKey {
            user1_id: row.try_get("user1_id")?,
            user2_id: row.try_get("user2_id")?,
            context: row.try_get("context")?,
        },
        matched_at: row.try_get("matched_at")?,
        is_active: row.try_get("is_active")?,
        unmatched_at: row.try_get("unmatched_at")?,
    })
}

#[async_trait]
impl SwipeStore for PostgresLedger {
    async fn apply_swipe(&self, swipe: &Swipe, policy: &dyn SwipePolicy) -> Result<SwipeWrite, StoreError> {
        let pair = swipe.pair();
        let mut tx = self.pool.begin().await?;
        Self::lock_pair(&mut tx, &pair).await?;

        let latest = Self::fetch_latest_match(&mut tx, &pair).await?;
        let existing = Self::fetch_swipe(&mut tx, &swipe.swiper_id, &swipe.swiped_id, swipe.context).await?;
        let decision = policy.decide(existing.as_ref(), swipe, latest.as_ref());

        let stored = if decision.writes() {
            let row = Swipe {
                recorded_at: Utc::now(),
                ..swipe.clone()
            };
            let query = r#"
                INSERT INTO user_swipes (swiper_id, swiped_id, action, context, recorded_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (swiper_id, swiped_id, context)
                DO UPDATE SET
                    action = EXCLUDED.action,
                    recorded_at = EXCLUDED.recorded_at
            "#;
            sqlx::query(query)
                .bind(&row.swiper_id)
                .bind(&row.swiped_id)
                .bind(row.action)
                .bind(row.context)
                .bind(row.recorded_at)
                .execute(&mut *tx)
                .await?;
            row
        } else {
            existing.unwrap_or_else(|| swipe.clone())
        };

        let reciprocal = Self::fetch_swipe(&mut tx, &swipe.swiped_id, &swipe.swiper_id, swipe.context).await?;

        let matched = match decision {
            UpsertDecision::Rejected => None,
            _ if policy.forms_match(&stored, reciprocal.as_ref(), latest.as_ref()) => {
                Some(Self::insert_match(&mut tx, &pair).await?)
            }
            _ => None,
        };

        tx.commit().await?;

        tracing::debug!(
            "Applied swipe {} -> {} ({:?}, {:?})",
            swipe.swiper_id,
            swipe.swiped_id,
            swipe.action,
            decision
        );

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
        let query = format!(
            "SELECT {} FROM user_swipes WHERE swiper_id = $1 AND swiped_id = $2 AND context = $3",
            SWIPE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(swiper_id)
            .bind(swiped_id)
            .bind(context)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(swipe_from_row).transpose()?)
    }

    async fn list_swipes_by_swiper(
        &self,
        swiper_id: &str,
        context: MatchingContext,
    ) -> Result<HashSet<String>, StoreError> {
        let query = r#"
            SELECT swiped_id
            FROM user_swipes
            WHERE swiper_id = $1 AND context = $2
        "#;

        let rows = sqlx::query(query)
            .bind(swiper_id)
            .bind(context)
            .fetch_all(&self.pool)
            .await?;

        let decided = rows
            .iter()
            .map(|row| row.try_get::<String, _>("swiped_id"))
            .collect::<Result<HashSet<_>, _>>()?;

        tracing::debug!("User {} has decided on {} profiles", swiper_id, decided.len());

        Ok(decided)
    }

    async fn delete_swipe(
        &self,
        swiper_id: &str,
        swiped_id: &str,
        context: MatchingContext,
    ) -> Result<SwipeRemoval, StoreError> {
        let pair = PairKey::new(swiper_id, swiped_id, context);
        let mut tx = self.pool.begin().await?;
        Self::lock_pair(&mut tx, &pair).await?;

        if Self::fetch_latest_match(&mut tx, &pair).await?.is_some_and(|m| m.is_active) {
            return Ok(SwipeRemoval::PairMatched);
        }

        let query = r#"
            DELETE FROM user_swipes
            WHERE swiper_id = $1 AND swiped_id = $2 AND context = $3
        "#;

        let result = sqlx::query(query)
            .bind(swiper_id)
            .bind(swiped_id)
            .bind(context)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(if result.rows_affected() > 0 {
            SwipeRemoval::Removed
        } else {
            SwipeRemoval::Missing
        })
    }

    async fn swipe_stats(&self, user_id: &str, context: MatchingContext) -> Result<SwipeStats, StoreError> {
        let query = r#"
            SELECT
                COUNT(*) FILTER (WHERE action = 'like') AS liked,
                COUNT(*) FILTER (WHERE action = 'pass') AS passed,
                MAX(recorded_at) AS last_swiped_at
            FROM user_swipes
            WHERE swiper_id = $1 AND context = $2
        "#;

        let row = sqlx::query(query)
            .bind(user_id)
            .bind(context)
            .fetch_one(&self.pool)
            .await?;

        Ok(SwipeStats {
            user_id: user_id.to_string(),
            liked: row.try_get("liked")?,
            passed: row.try_get("passed")?,
            active_matches: 0,
            last_swiped_at: row.try_get("last_swiped_at")?,
        })
    }
}

#[async_trait]
impl MatchStore for PostgresLedger {
    async fn get_match(&self, match_id: Uuid) -> Result<Option<MatchRecord>, StoreError> {
        let query = format!("SELECT {} FROM user_matches WHERE id = $1", MATCH_COLUMNS);
        let row = sqlx::query(&query)
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(match_from_row).transpose()?)
    }

    async fn latest_match(&self, pair: &PairKey) -> Result<Option<MatchRecord>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_latest_match(&mut conn, pair).await
    }

    async fn list_matches_for_user(
        &self,
        user_id: &str,
        context: MatchingContext,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        let query = format!(
            "SELECT {} FROM user_matches \
             WHERE is_active AND context = $2 AND (user1_id = $1 OR user2_id = $1) \
             ORDER BY matched_at DESC",
            MATCH_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(context)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(match_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn deactivate_match(&self, match_id: Uuid) -> Result<Option<MatchRecord>, StoreError> {
        let Some(record) = self.get_match(match_id).await? else {
            return Ok(None);
        };

        let mut tx = self.pool.begin().await?;
        Self::lock_pair(&mut tx, &record.pair).await?;

        let row = sqlx::query(DEACTIVATE_MATCH)
            .bind(match_id)
            .bind(Utc::now())
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;

        if row.is_some() {
            tracing::info!("Deactivated match {}", match_id);
        }
        Ok(row.as_ref().map(match_from_row).transpose()?)
    }
}
