use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use coloc_match::config::{LoggingSettings, Settings};
use coloc_match::core::{CompatibilityScorer, Matcher, ScoringWeights, SwipeMachine};
use coloc_match::models::RawProfileRecord;
use coloc_match::routes::{self, matching::AppState};
use coloc_match::services::{
    CacheManager, CachedProfileStore, MatchLedger, MatchingService, MemoryLedger, MemoryProfileStore, PostgresLedger,
    ProfileStore, SupabaseClient, VerificationProvider,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)).json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

/// `RUST_LOG` wins over `logging.level`.
fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn startup_error(what: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", what, err);
    std::io::Error::other(format!("{}: {}", what, err))
}

async fn memory_profiles(seed: Option<&str>) -> std::io::Result<Arc<MemoryProfileStore>> {
    let store = Arc::new(MemoryProfileStore::new());
    if let Some(path) = seed {
        let raw = std::fs::read_to_string(path).map_err(|e| startup_error("Failed to read seed profiles", e))?;
        let records: Vec<RawProfileRecord> =
            serde_json::from_str(&raw).map_err(|e| startup_error("Failed to parse seed profiles", e))?;
        let mut loaded = 0;
        for record in records {
            if store.insert(record).await {
                loaded += 1;
            }
        }
        info!("Seeded {} profiles from {}", loaded, path);
    }
    Ok(store)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    let settings = Settings::load();
    init_tracing(&settings.as_ref().map(|s| s.logging.clone()).unwrap_or_default());

    info!("Starting coloc-match service...");

    let settings = settings.map_err(|e| startup_error("Failed to load configuration", e))?;

    // Scoring configuration
    let table = settings
        .scoring
        .load_completeness_table()
        .map_err(|e| startup_error("Invalid completeness table", e))?;
    let weights = ScoringWeights::from(&settings.scoring.weights);
    info!(
        table_version = table.version,
        threshold = table.threshold,
        "Scorer initialized with weights: {:?}",
        weights
    );
    let matcher = Matcher::new(CompatibilityScorer::new(weights, Arc::new(table)));

    // Swipe/match ledger
    let ledger: Arc<dyn MatchLedger> = match &settings.database.url {
        Some(url) => Arc::new(
            PostgresLedger::from_settings(url, &settings.database)
                .await
                .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?,
        ),
        None => {
            warn!("No database configured; swipes and matches are kept in memory only");
            Arc::new(MemoryLedger::new())
        }
    };

    // Profile store and verification provider
    let (profiles, verification): (Arc<dyn ProfileStore>, Arc<dyn VerificationProvider>) = match &settings.supabase {
        Some(supabase) => {
            let client = Arc::new(
                SupabaseClient::from_settings(supabase).map_err(|e| startup_error("Failed to build REST client", e))?,
            );
            info!("Profile store: {}", supabase.url);
            (client.clone() as Arc<dyn ProfileStore>, client as Arc<dyn VerificationProvider>)
        }
        None => {
            warn!("No profile backend configured; serving profiles from memory");
            let store = memory_profiles(settings.matching.seed_profiles.as_deref()).await?;
            (store.clone() as Arc<dyn ProfileStore>, store as Arc<dyn VerificationProvider>)
        }
    };

    // Candidate pool cache (Redis optional)
    let cache = match CacheManager::new(
        settings.cache.redis_url.as_deref(),
        settings.cache.l1_cache_size,
        settings.cache.ttl_secs,
    )
    .await
    {
        Ok(cache) => cache,
        Err(e) => {
            warn!("Failed to connect to Redis ({}), using in-process cache only", e);
            CacheManager::in_memory(settings.cache.l1_cache_size, settings.cache.ttl_secs)
        }
    };
    info!(
        "Cache manager initialized (L1: {} entries, TTL: {}s)",
        settings.cache.l1_cache_size, settings.cache.ttl_secs
    );
    let profiles: Arc<dyn ProfileStore> = Arc::new(CachedProfileStore::new(profiles, Arc::new(cache)));

    let swipes = SwipeMachine::new(ledger);

    let mut events = swipes.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!(
                    match_id = %event.match_id,
                    user1 = %event.pair.user1_id,
                    user2 = %event.pair.user2_id,
                    context = event.pair.context.as_str(),
                    "Match event"
                ),
                Err(RecvError::Lagged(skipped)) => warn!("Match event log lagged by {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app_state = AppState {
        service: MatchingService::new(
            profiles,
            verification,
            swipes,
            matcher,
            settings.matching.candidate_pool_limit,
        ),
        default_page_size: settings.matching.default_page_size,
        max_page_size: settings.matching.max_page_size,
    };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
