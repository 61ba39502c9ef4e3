use actix_web::{web, HttpResponse, Responder};
use validator::{Validate, ValidationErrors};

use crate::core::MatchingError;
use crate::models::{
    ChangedResponse, CompatibilityRequest, DiscoveryFeedRequest, DiscoveryFeedResponse, ErrorResponse, FeedEntry,
    FeedStatus, HealthResponse, MatchSummary, MatchesResponse, MatchingContext, SwipeAction, SwipeRequest,
    SwipeResponse, UndoSwipeRequest, UnmatchRequest, UserContextQuery,
};
use crate::services::{DiscoveryOutcome, MatchingService, StoreError};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: MatchingService,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

/// Configure all matching routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/profiles/{user_id}/completeness", web::get().to(completeness))
        .route("/compatibility", web::post().to(compatibility))
        .route("/discovery/feed", web::post().to(discovery_feed))
        .route("/swipes", web::post().to(record_swipe))
        .route("/swipes/undo", web::post().to(undo_swipe))
        .route("/swipes/stats", web::get().to(swipe_stats))
        .route("/matches", web::get().to(list_matches))
        .route("/matches/unmatch", web::post().to(unmatch));
}

fn error_body(status: u16, error: &str, message: String) -> ErrorResponse {
    ErrorResponse {
        error: error.to_string(),
        message,
        status_code: status,
    }
}

fn validation_failed(errors: ValidationErrors) -> HttpResponse {
    tracing::info!("Validation failed: {}", errors);
    HttpResponse::BadRequest().json(error_body(400, "Validation failed", errors.to_string()))
}

fn parse_context(raw: &str) -> Result<MatchingContext, HttpResponse> {
    MatchingContext::parse(raw).ok_or_else(|| {
        HttpResponse::BadRequest().json(error_body(400, "Invalid context", format!("Unknown context: {}", raw)))
    })
}

/// Map a core error onto a JSON error response
fn matching_error(err: MatchingError) -> HttpResponse {
    let message = err.to_string();
    match err {
        MatchingError::SelfSwipeRejected(_) => {
            HttpResponse::BadRequest().json(error_body(400, "Self swipe rejected", message))
        }
        MatchingError::ProfileNotFound(_) => HttpResponse::NotFound().json(error_body(404, "Profile not found", message)),
        MatchingError::NotAParticipant(_) => HttpResponse::Forbidden().json(error_body(403, "Not a participant", message)),
        MatchingError::PairAlreadyMatched(_, _) => {
            HttpResponse::Conflict().json(error_body(409, "Pair already matched", message))
        }
        MatchingError::MalformedProfileData(_) => {
            HttpResponse::UnprocessableEntity().json(error_body(422, "Malformed profile data", message))
        }
        MatchingError::Store(StoreError::InvalidResponse(_)) => {
            tracing::error!("Upstream returned an invalid response: {}", message);
            HttpResponse::BadGateway().json(error_body(502, "Upstream error", message))
        }
        MatchingError::Store(_) => {
            tracing::error!("Persistence unavailable: {}", message);
            HttpResponse::ServiceUnavailable().json(error_body(503, "Persistence unavailable", message))
        }
    }
}

async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// GET /api/v1/profiles/{user_id}/completeness
async fn completeness(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match state.service.completeness(&path).await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => matching_error(e),
    }
}

/// POST /api/v1/compatibility
async fn compatibility(state: web::Data<AppState>, req: web::Json<CompatibilityRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    match state.service.compatibility(&req.user_id, &req.other_user_id).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => matching_error(e),
    }
}

/// POST /api/v1/discovery/feed
///
/// Request body:
/// ```json
/// { "userId": "string", "context": "searcher_matching", "offset": 0, "limit": 20 }
/// ```
async fn discovery_feed(state: web::Data<AppState>, req: web::Json<DiscoveryFeedRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }
    let context = match parse_context(&req.context) {
        Ok(context) => context,
        Err(response) => return response,
    };
    let limit = req
        .limit
        .unwrap_or(state.default_page_size)
        .min(state.max_page_size);

    tracing::info!("Building feed for user: {}, offset: {}, limit: {}", req.user_id, req.offset, limit);

    let outcome = match state.service.discovery_feed(&req.user_id, context).await {
        Ok(outcome) => outcome,
        Err(e) => return matching_error(e),
    };

    let response = match outcome {
        DiscoveryOutcome::Locked { completeness } => DiscoveryFeedResponse {
            status: FeedStatus::Locked,
            completeness,
            candidates: Vec::new(),
            total_results: 0,
            next_offset: None,
            skipped_records: 0,
        },
        DiscoveryOutcome::Ready {
            completeness,
            feed,
            skipped,
        } => {
            let candidates: Vec<FeedEntry> = feed
                .page(req.offset, limit)
                .iter()
                .map(|ranked| FeedEntry {
                    user_id: ranked.profile.user_id.clone(),
                    display_name: ranked.profile.display_name(),
                    compatibility: ranked.result.clone(),
                })
                .collect();
            let end = req.offset.saturating_add(candidates.len());
            DiscoveryFeedResponse {
                status: FeedStatus::Ready,
                completeness,
                total_results: feed.len(),
                next_offset: (end < feed.len()).then_some(end),
                candidates,
                skipped_records: skipped,
            }
        }
    };

    HttpResponse::Ok().json(response)
}

/// POST /api/v1/swipes
async fn record_swipe(state: web::Data<AppState>, req: web::Json<SwipeRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }
    let context = match parse_context(&req.context) {
        Ok(context) => context,
        Err(response) => return response,
    };
    let Some(action) = SwipeAction::parse(&req.action) else {
        return HttpResponse::BadRequest().json(error_body(400, "Invalid action", format!("Unknown action: {}", req.action)));
    };

    match state
        .service
        .swipes()
        .record_swipe(&req.user_id, &req.target_user_id, action, context)
        .await
    {
        Ok(outcome) => HttpResponse::Ok().json(SwipeResponse {
            success: true,
            action: req.action.to_lowercase(),
            matched: outcome.matched.is_some(),
            match_id: outcome.matched.map(|m| m.id),
        }),
        Err(e) => matching_error(e),
    }
}

/// POST /api/v1/swipes/undo
async fn undo_swipe(state: web::Data<AppState>, req: web::Json<UndoSwipeRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }
    let context = match parse_context(&req.context) {
        Ok(context) => context,
        Err(response) => return response,
    };

    match state
        .service
        .swipes()
        .undo_swipe(&req.user_id, &req.target_user_id, context)
        .await
    {
        Ok(changed) => HttpResponse::Ok().json(ChangedResponse { changed }),
        Err(e) => matching_error(e),
    }
}

/// GET /api/v1/swipes/stats?userId=...&context=...
async fn swipe_stats(state: web::Data<AppState>, query: web::Query<UserContextQuery>) -> impl Responder {
    if let Err(errors) = query.validate() {
        return validation_failed(errors);
    }
    let context = match parse_context(&query.context) {
        Ok(context) => context,
        Err(response) => return response,
    };

    match state.service.swipes().stats(&query.user_id, context).await {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => matching_error(e),
    }
}

/// GET /api/v1/matches?userId=...&context=...
async fn list_matches(state: web::Data<AppState>, query: web::Query<UserContextQuery>) -> impl Responder {
    if let Err(errors) = query.validate() {
        return validation_failed(errors);
    }
    let context = match parse_context(&query.context) {
        Ok(context) => context,
        Err(response) => return response,
    };

    match state.service.swipes().list_match_records(&query.user_id, context).await {
        Ok(records) => {
            let matches = records
                .iter()
                .filter_map(|record| {
                    record.pair.counterpart(&query.user_id).map(|other| MatchSummary {
                        match_id: record.id,
                        user_id: other.to_string(),
                        matched_at: record.matched_at,
                    })
                })
                .collect();
            HttpResponse::Ok().json(MatchesResponse {
                user_id: query.user_id.clone(),
                context: context.as_str().to_string(),
                matches,
            })
        }
        Err(e) => matching_error(e),
    }
}

/// POST /api/v1/matches/unmatch
async fn unmatch(state: web::Data<AppState>, req: web::Json<UnmatchRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    match state.service.swipes().unmatch(&req.user_id, req.match_id).await {
        Ok(changed) => HttpResponse::Ok().json(ChangedResponse { changed }),
        Err(e) => matching_error(e),
    }
}
