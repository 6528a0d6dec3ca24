//! Configuration module
//!
//! Service settings are read once at startup from the environment (with an
//! optional `.env` file) and validated before anything connects.

use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 4000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const SESSION_TTL_SECS: u64 = 3600;
const UPLOAD_EXPIRY_SECS: u64 = 1800;
// Cloudflare direct upload expiry must lie between two minutes and six hours.
const MIN_UPLOAD_EXPIRY_SECS: u64 = 120;
const MAX_UPLOAD_EXPIRY_SECS: u64 = 6 * 3600;
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";
const CLOUDFLARE_BATCH_API_BASE: &str = "https://batch.imagedelivery.net";
const CDN_ROOT: &str = "/cdn-images";

/// Base configuration for the HTTP service
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// `pretty` or `json`
    pub log_format: String,
    pub cdn_root: String,
}

/// Cloudflare Images account settings
#[derive(Clone, Debug)]
pub struct HostingConfig {
    pub account_id: String,
    pub api_token: String,
    pub api_base: String,
    pub upload_expiry: Duration,
    /// Fetch and delete through the batch API with a short-lived batch token
    pub use_batch_token: bool,
    pub batch_api_base: String,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Redis connection string; the in-process cache is used when absent
    pub redis_url: Option<String>,
    pub key_prefix: String,
    pub session_ttl: Duration,
}

/// Relation (authorization) service endpoints
#[derive(Clone, Debug)]
pub struct RelationConfig {
    pub read_url: String,
    pub write_url: String,
}

/// Upper bounds on every external call
#[derive(Clone, Debug)]
pub struct TimeoutConfig {
    pub upload_batch: Duration,
    pub hosting_call: Duration,
    pub store: Duration,
    pub relation: Duration,
    pub cache: Duration,
}

/// Background reconciliation jobs. A zero interval disables the job.
#[derive(Clone, Debug)]
pub struct ReconcileConfig {
    pub counter_interval_secs: u64,
    pub ownership_sweep_interval_secs: u64,
    pub ownership_sweep_batch_size: i64,
    pub ownership_sweep_grace_secs: i64,
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub base: BaseConfig,
    pub hosting: HostingConfig,
    pub cache: CacheConfig,
    pub relation: RelationConfig,
    pub timeouts: TimeoutConfig,
    pub reconcile: ReconcileConfig,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ServiceConfig>);

impl Config {
    fn as_service(&self) -> &ServiceConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.as_service().base.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = ServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_service().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_service().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_service().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.as_service().base.environment
    }

    pub fn database_url(&self) -> &str {
        &self.as_service().base.database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_service().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_service().base.db_timeout_seconds
    }

    pub fn log_format(&self) -> &str {
        &self.as_service().base.log_format
    }

    pub fn cdn_root(&self) -> &str {
        &self.as_service().base.cdn_root
    }

    pub fn hosting(&self) -> &HostingConfig {
        &self.as_service().hosting
    }

    pub fn cache(&self) -> &CacheConfig {
        &self.as_service().cache
    }

    pub fn relation(&self) -> &RelationConfig {
        &self.as_service().relation
    }

    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.as_service().timeouts
    }

    pub fn reconcile(&self) -> &ReconcileConfig {
        &self.as_service().reconcile
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn string_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn required<F>(lookup: &F, key: &str) -> Result<String, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("{} must be set", key))
}

fn millis<F>(lookup: &F, key: &str, default: u64) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    Duration::from_millis(parse_or(lookup, key, default))
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins = string_or(&lookup, "CORS_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let base = BaseConfig {
            server_port: parse_or(&lookup, "PORT", DEFAULT_PORT),
            cors_origins,
            environment,
            database_url: required(&lookup, "DATABASE_URL")?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: parse_or(&lookup, "DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            log_format: string_or(&lookup, "LOG_FORMAT", "pretty").to_lowercase(),
            cdn_root: string_or(&lookup, "CDN_ROOT", CDN_ROOT),
        };

        let hosting = HostingConfig {
            account_id: required(&lookup, "CLOUDFLARE_ACCOUNT_ID")?,
            api_token: required(&lookup, "CLOUDFLARE_API_TOKEN")?,
            api_base: string_or(&lookup, "CLOUDFLARE_API_BASE", CLOUDFLARE_API_BASE),
            upload_expiry: Duration::from_secs(parse_or(
                &lookup,
                "CLOUDFLARE_UPLOAD_EXPIRY_SECS",
                UPLOAD_EXPIRY_SECS,
            )),
            use_batch_token: parse_or(&lookup, "CLOUDFLARE_USE_BATCH_TOKEN", false),
            batch_api_base: string_or(
                &lookup,
                "CLOUDFLARE_BATCH_API_BASE",
                CLOUDFLARE_BATCH_API_BASE,
            ),
        };

        let cache = CacheConfig {
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            key_prefix: string_or(&lookup, "CACHE_KEY_PREFIX", "imgvault"),
            session_ttl: Duration::from_secs(parse_or(
                &lookup,
                "SESSION_TTL_SECS",
                SESSION_TTL_SECS,
            )),
        };

        let relation = RelationConfig {
            read_url: required(&lookup, "RELATION_READ_URL")?,
            write_url: required(&lookup, "RELATION_WRITE_URL")?,
        };

        let timeouts = TimeoutConfig {
            upload_batch: millis(&lookup, "UPLOAD_BATCH_TIMEOUT_MS", 3000),
            hosting_call: millis(&lookup, "HOSTING_CALL_TIMEOUT_MS", 2000),
            store: millis(&lookup, "STORE_TIMEOUT_MS", 2000),
            relation: millis(&lookup, "RELATION_TIMEOUT_MS", 2000),
            cache: millis(&lookup, "CACHE_TIMEOUT_MS", 1000),
        };

        let reconcile = ReconcileConfig {
            counter_interval_secs: parse_or(&lookup, "COUNTER_RECONCILE_INTERVAL_SECS", 300),
            ownership_sweep_interval_secs: parse_or(&lookup, "OWNERSHIP_SWEEP_INTERVAL_SECS", 600),
            ownership_sweep_batch_size: parse_or(&lookup, "OWNERSHIP_SWEEP_BATCH_SIZE", 100),
            ownership_sweep_grace_secs: parse_or(&lookup, "OWNERSHIP_SWEEP_GRACE_SECS", 120),
        };

        Ok(ServiceConfig {
            base,
            hosting,
            cache,
            relation,
            timeouts,
            reconcile,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let is_production = matches!(
            self.base.environment.to_lowercase().as_str(),
            "production" | "prod"
        );
        if is_production && self.base.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if !self.base.database_url.starts_with("postgres://")
            && !self.base.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if !self.base.cdn_root.starts_with('/') || self.base.cdn_root.ends_with('/') {
            return Err(anyhow::anyhow!(
                "CDN_ROOT must start with '/' and must not end with '/'"
            ));
        }

        if !matches!(self.base.log_format.as_str(), "pretty" | "json") {
            return Err(anyhow::anyhow!("LOG_FORMAT must be 'pretty' or 'json'"));
        }

        let expiry = self.hosting.upload_expiry.as_secs();
        if !(MIN_UPLOAD_EXPIRY_SECS..=MAX_UPLOAD_EXPIRY_SECS).contains(&expiry) {
            return Err(anyhow::anyhow!(
                "CLOUDFLARE_UPLOAD_EXPIRY_SECS must be between {} and {}",
                MIN_UPLOAD_EXPIRY_SECS,
                MAX_UPLOAD_EXPIRY_SECS
            ));
        }

        for (key, value) in [
            ("CLOUDFLARE_API_BASE", &self.hosting.api_base),
            ("CLOUDFLARE_BATCH_API_BASE", &self.hosting.batch_api_base),
            ("RELATION_READ_URL", &self.relation.read_url),
            ("RELATION_WRITE_URL", &self.relation.write_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", key, e))?;
        }

        if let Some(redis_url) = &self.cache.redis_url {
            if !redis_url.starts_with("redis://") && !redis_url.starts_with("rediss://") {
                return Err(anyhow::anyhow!(
                    "REDIS_URL must start with redis:// or rediss://"
                ));
            }
        }

        if self.cache.session_ttl.is_zero() {
            return Err(anyhow::anyhow!("SESSION_TTL_SECS must be greater than 0"));
        }

        let timeouts = [
            ("UPLOAD_BATCH_TIMEOUT_MS", self.timeouts.upload_batch),
            ("HOSTING_CALL_TIMEOUT_MS", self.timeouts.hosting_call),
            ("STORE_TIMEOUT_MS", self.timeouts.store),
            ("RELATION_TIMEOUT_MS", self.timeouts.relation),
            ("CACHE_TIMEOUT_MS", self.timeouts.cache),
        ];
        if let Some((key, _)) = timeouts.iter().find(|(_, d)| d.is_zero()) {
            return Err(anyhow::anyhow!("{} must be greater than 0", key));
        }

        if self.reconcile.ownership_sweep_batch_size <= 0 {
            return Err(anyhow::anyhow!(
                "OWNERSHIP_SWEEP_BATCH_SIZE must be greater than 0"
            ));
        }

        Ok(())
    }
}
