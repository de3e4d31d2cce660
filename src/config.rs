//! Configuration options for the Hustly inventory client

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Project endpoint and public key.
/// It's recommended to load these values from environment variables.
#[derive(Debug, Clone)]
pub struct HustlyConfig {
    pub url: Url,
    pub anon_key: String,
}

impl HustlyConfig {
    /// Creates a new configuration, validating the URL and key.
    pub fn new(url_str: &str, anon_key: &str) -> Result<Self> {
        let url = Url::parse(url_str)?;
        if anon_key.trim().is_empty() {
            return Err(Error::config("anon_key cannot be empty"));
        }
        Ok(Self {
            url,
            anon_key: anon_key.to_string(),
        })
    }

    /// Reads `SUPABASE_URL` and `SUPABASE_ANON_KEY`.
    pub fn from_env() -> Result<Self> {
        let url_str = std::env::var("SUPABASE_URL")
            .map_err(|_| Error::config("SUPABASE_URL environment variable not found"))?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY")
            .map_err(|_| Error::config("SUPABASE_ANON_KEY environment variable not found"))?;
        Self::new(&url_str, &anon_key)
    }

    /// Base URL without the trailing slash `Url` adds to bare hosts
    pub fn base_url(&self) -> String {
        self.url.as_str().trim_end_matches('/').to_string()
    }
}

/// Tuning for the inventory fetch, cache and fallback layer
#[derive(Debug, Clone)]
pub struct InventoryOptions {
    /// Listings table name
    pub table: String,

    /// Hard timeout a single listing read is raced against
    pub query_timeout: Duration,

    /// Ceiling applied to every requested page size
    pub max_limit: u32,

    /// Page size used when the caller does not pick one
    pub default_limit: u32,

    /// How long a cached result set stays valid
    pub cache_ttl: Duration,

    /// Maximum number of distinct filter sets kept in the cache
    pub cache_capacity: u64,

    /// Minimum spacing between identical requests
    pub debounce_window: Duration,

    /// Automatic retries after a failed read
    pub max_retries: u32,

    /// Backoff unit, multiplied by the attempt number
    pub retry_backoff: Duration,
}

impl Default for InventoryOptions {
    fn default() -> Self {
        Self {
            table: "listings".to_string(),
            query_timeout: Duration::from_secs(8),
            max_limit: 100,
            default_limit: 50,
            cache_ttl: Duration::from_secs(45),
            cache_capacity: 64,
            debounce_window: Duration::from_secs(2),
            max_retries: 2,
            retry_backoff: Duration::from_secs(2),
        }
    }
}

impl InventoryOptions {
    /// Set the listings table name
    pub fn with_table(mut self, value: &str) -> Self {
        self.table = value.to_string();
        self
    }

    /// Set the per-read timeout
    pub fn with_query_timeout(mut self, value: Duration) -> Self {
        self.query_timeout = value;
        self
    }

    /// Set the page size ceiling
    pub fn with_max_limit(mut self, value: u32) -> Self {
        self.max_limit = value.max(1);
        self
    }

    /// Set the default page size
    pub fn with_default_limit(mut self, value: u32) -> Self {
        self.default_limit = value.max(1);
        self
    }

    /// Set the cache TTL
    pub fn with_cache_ttl(mut self, value: Duration) -> Self {
        self.cache_ttl = value;
        self
    }

    /// Set the cache capacity
    pub fn with_cache_capacity(mut self, value: u64) -> Self {
        self.cache_capacity = value;
        self
    }

    /// Set the debounce window
    pub fn with_debounce_window(mut self, value: Duration) -> Self {
        self.debounce_window = value;
        self
    }

    /// Set the automatic retry budget
    pub fn with_max_retries(mut self, value: u32) -> Self {
        self.max_retries = value;
        self
    }

    /// Set the backoff unit
    pub fn with_retry_backoff(mut self, value: Duration) -> Self {
        self.retry_backoff = value;
        self
    }
}

/// Configuration options for the client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Whether to refresh an expired session before a tenant-scoped call
    pub auto_refresh_token: bool,

    /// Whether to keep the session returned by sign-in
    pub persist_session: bool,

    /// Transport-level timeout for every HTTP request
    pub request_timeout: Option<Duration>,

    /// The database schema
    pub db_schema: String,

    /// Inventory layer tuning
    pub inventory: InventoryOptions,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            auto_refresh_token: true,
            persist_session: true,
            request_timeout: Some(Duration::from_secs(30)),
            db_schema: "public".to_string(),
            inventory: InventoryOptions::default(),
        }
    }
}

impl ClientOptions {
    /// Set whether to automatically refresh the token
    pub fn with_auto_refresh_token(mut self, value: bool) -> Self {
        self.auto_refresh_token = value;
        self
    }

    /// Set whether to persist the session
    pub fn with_persist_session(mut self, value: bool) -> Self {
        self.persist_session = value;
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the database schema
    pub fn with_db_schema(mut self, value: &str) -> Self {
        self.db_schema = value.to_string();
        self
    }

    /// Replace the inventory options
    pub fn with_inventory(mut self, value: InventoryOptions) -> Self {
        self.inventory = value;
        self
    }
}
