//! Hustly inventory client
//!
//! Tenant-scoped access to a reseller's listings stored behind a Supabase
//! style gateway, with a short-lived result cache and a controller that keeps
//! something sensible on screen when the backend is slow or failing.

pub mod auth;
pub mod config;
pub mod error;
pub mod fetch;
pub mod inventory;
pub mod postgrest;

use std::sync::Arc;

use reqwest::Client;
use tracing::warn;

use crate::auth::Auth;
use crate::config::{ClientOptions, HustlyConfig};
use crate::inventory::{InventoryController, ListingCache, ListingRepository, QueryExecutor};
use crate::postgrest::PostgrestClient;

/// The main entry point for the Hustly client
pub struct Hustly {
    /// The base URL for the project
    pub url: String,
    /// The anonymous API key for the project
    pub key: String,
    /// HTTP client used for requests
    pub http_client: Client,
    /// Auth client holding the signed-in session
    pub auth: Arc<Auth>,
    /// Client options
    pub options: ClientOptions,
    cache: ListingCache,
}

impl Hustly {
    /// Create a new client
    ///
    /// # Arguments
    ///
    /// * `url` - The base URL for your project
    /// * `key` - The anonymous API key for your project
    ///
    /// # Example
    ///
    /// ```
    /// use hustly_inventory::Hustly;
    ///
    /// let hustly = Hustly::new("https://your-project-url.supabase.co", "your-anon-key");
    /// ```
    pub fn new(url: &str, key: &str) -> Self {
        Self::new_with_options(url, key, ClientOptions::default())
    }

    /// Create a new client with custom options
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use hustly_inventory::{Hustly, config::{ClientOptions, InventoryOptions}};
    ///
    /// let options = ClientOptions::default()
    ///     .with_inventory(InventoryOptions::default().with_cache_ttl(Duration::from_secs(30)));
    /// let hustly = Hustly::new_with_options(
    ///     "https://your-project-url.supabase.co",
    ///     "your-anon-key",
    ///     options
    /// );
    /// ```
    pub fn new_with_options(url: &str, key: &str, options: ClientOptions) -> Self {
        let url = url.trim_end_matches('/').to_string();
        let http_client = build_client(&options);
        let cache = ListingCache::new(&options.inventory);
        let auth =
            Auth::new(&url, key, http_client.clone(), options.clone()).with_cache(cache.clone());

        Self {
            url,
            key: key.to_string(),
            http_client,
            auth: Arc::new(auth),
            options,
            cache,
        }
    }

    /// Create a client from a validated configuration
    pub fn from_config(config: &HustlyConfig, options: ClientOptions) -> Self {
        Self::new_with_options(&config.base_url(), &config.anon_key, options)
    }

    /// Get a reference to the auth client for sign-in and session handling
    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Create a new PostgrestClient for a specific table or view
    ///
    /// # Example
    ///
    /// ```
    /// use hustly_inventory::Hustly;
    ///
    /// let hustly = Hustly::new("https://your-project-url.supabase.co", "your-anon-key");
    /// let query = hustly.from("listings");
    /// ```
    pub fn from(&self, table: &str) -> PostgrestClient {
        PostgrestClient::new(&self.url, &self.key, table, self.http_client.clone())
            .with_schema(&self.options.db_schema)
    }

    /// Result-set cache shared by every controller and repository of this client
    pub fn cache(&self) -> &ListingCache {
        &self.cache
    }

    /// Single tenant-scoped listing read
    pub fn listing_source(&self) -> QueryExecutor {
        QueryExecutor::new(
            self.from(&self.options.inventory.table),
            Arc::clone(&self.auth),
            &self.options.inventory,
        )
    }

    /// Controller for one inventory screen
    ///
    /// # Example
    ///
    /// ```no_run
    /// use hustly_inventory::Hustly;
    /// use hustly_inventory::inventory::ListingFilters;
    ///
    /// # async fn run() -> Result<(), hustly_inventory::error::Error> {
    /// let hustly = Hustly::new("https://your-project-url.supabase.co", "your-anon-key");
    /// hustly.auth().sign_in_with_password("seller@example.com", "password").await?;
    ///
    /// let inventory = hustly.inventory_controller();
    /// inventory.load(ListingFilters::new(50).with_search("drill")).await;
    /// println!("{} listings", inventory.view().stats.total_items);
    /// # Ok(())
    /// # }
    /// ```
    pub fn inventory_controller(&self) -> InventoryController<QueryExecutor> {
        InventoryController::new(
            self.listing_source(),
            self.cache.clone(),
            self.options.inventory.clone(),
        )
    }

    /// Listing writes for the signed-in user
    pub fn listings(&self) -> ListingRepository {
        ListingRepository::new(
            self.from(&self.options.inventory.table),
            Arc::clone(&self.auth),
            self.cache.clone(),
        )
    }
}

fn build_client(options: &ClientOptions) -> Client {
    let mut builder = Client::builder();
    if let Some(timeout) = options.request_timeout {
        builder = builder.timeout(timeout);
    }
    match builder.build() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "falling back to a default HTTP client");
            Client::new()
        }
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::{ClientOptions, HustlyConfig, InventoryOptions};
    pub use crate::error::Error;
    pub use crate::inventory::{
        FetchError, FetchErrorKind, InventoryController, InventoryView, Listing, ListingFilters,
        ListingStatus, LoadOutcome, Phase,
    };
    pub use crate::Hustly;
}
