use crate::core::completeness::{CompletenessTable, TableError};
use crate::core::scoring::ScoringWeights;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    /// Hosted profile store. Without it profiles are served from memory.
    pub supabase: Option<SupabaseSettings>,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseSettings {
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_profiles_table")]
    pub profiles_table: String,
    #[serde(default = "default_verification_table")]
    pub verification_table: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_profiles_table() -> String { "user_profiles".to_string() }
fn default_verification_table() -> String { "user_verifications".to_string() }
fn default_timeout_secs() -> u64 { 30 }

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Swipe/match ledger. Without it the ledger lives in memory.
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub redis_url: Option<String>,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_l1_cache_size")]
    pub l1_cache_size: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_secs: default_ttl_secs(),
            l1_cache_size: default_l1_cache_size(),
        }
    }
}

fn default_ttl_secs() -> u64 { 300 }
fn default_l1_cache_size() -> u64 { 1000 }

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
    /// Upper bound on candidates fetched per feed request.
    #[serde(default = "default_candidate_pool_limit")]
    pub candidate_pool_limit: usize,
    /// JSON array of profile rows loaded into the in-memory profile store.
    pub seed_profiles: Option<String>,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            candidate_pool_limit: default_candidate_pool_limit(),
            seed_profiles: None,
        }
    }
}

fn default_page_size() -> usize { 20 }
fn default_max_page_size() -> usize { 100 }
fn default_candidate_pool_limit() -> usize { 500 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
    /// Overrides the bundled completeness table.
    pub completeness_table: Option<String>,
}

impl ScoringSettings {
    pub fn load_completeness_table(&self) -> Result<CompletenessTable, TableError> {
        match &self.completeness_table {
            Some(path) => CompletenessTable::from_path(path),
            None => CompletenessTable::bundled(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_lifestyle_weight")]
    pub lifestyle: f64,
    #[serde(default = "default_schedule_weight")]
    pub schedule: f64,
    #[serde(default = "default_budget_weight")]
    pub budget: f64,
    #[serde(default = "default_social_weight")]
    pub social: f64,
    #[serde(default = "default_values_weight")]
    pub values: f64,
    #[serde(default = "default_deal_breakers_weight")]
    pub deal_breakers: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            lifestyle: default_lifestyle_weight(),
            schedule: default_schedule_weight(),
            budget: default_budget_weight(),
            social: default_social_weight(),
            values: default_values_weight(),
            deal_breakers: default_deal_breakers_weight(),
        }
    }
}

impl From<&WeightsConfig> for ScoringWeights {
    fn from(config: &WeightsConfig) -> Self {
        Self {
            lifestyle: config.lifestyle,
            schedule: config.schedule,
            budget: config.budget,
            social: config.social,
            values: config.values,
            deal_breakers: config.deal_breakers,
        }
    }
}

fn default_lifestyle_weight() -> f64 { 0.25 }
fn default_schedule_weight() -> f64 { 0.15 }
fn default_budget_weight() -> f64 { 0.20 }
fn default_social_weight() -> f64 { 0.15 }
fn default_values_weight() -> f64 { 0.15 }
fn default_deal_breakers_weight() -> f64 { 0.10 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Later sources override earlier ones:
    /// 1. `config/default.toml`
    /// 2. `config/local.toml` (development overrides)
    /// 3. Environment variables prefixed with `COLOC__`,
    ///    e.g. `COLOC__SERVER__PORT` -> `server.port`
    /// 4. `DATABASE_URL`, `REDIS_URL`, `SUPABASE_URL` and `SUPABASE_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(environment())
            .build()?;

        substitute_env_vars(settings)?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        settings.try_deserialize()
    }
}

fn environment() -> Environment {
    Environment::with_prefix("COLOC")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Apply the conventional unprefixed variables used by hosting platforms.
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    for (var, key) in [
        ("DATABASE_URL", "database.url"),
        ("REDIS_URL", "cache.redis_url"),
        ("SUPABASE_URL", "supabase.url"),
        ("SUPABASE_KEY", "supabase.api_key"),
    ] {
        if let Ok(value) = env::var(var) {
            builder = builder.set_override(key, value)?;
        }
    }

    builder.build()
}
