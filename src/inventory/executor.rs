//! Single tenant-scoped listing read, raced against a timeout

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::Auth;
use crate::config::InventoryOptions;
use crate::error::Error;
use crate::inventory::filters::{CategoryFilter, ListingFilters, StatusFilter};
use crate::inventory::model::Listing;
use crate::postgrest::{escape_pattern, PostgrestClient, SortOrder};

/// Why a listing read failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// No usable session; never retried, never masked by cached data
    AuthenticationRequired,
    /// The read did not settle in time
    Timeout,
    /// Transport failure or an error reported by the gateway
    Backend,
    /// Superseded by a newer request or dropped at teardown
    Aborted,
}

impl FetchErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchErrorKind::Timeout | FetchErrorKind::Backend)
    }
}

/// Failure half of a listing read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::AuthenticationRequired, message)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            FetchErrorKind::Timeout,
            format!("listing query timed out after {}ms", after.as_millis()),
        )
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Backend, message)
    }

    pub fn aborted() -> Self {
        Self::new(FetchErrorKind::Aborted, "request superseded")
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FetchError {}

impl From<Error> for FetchError {
    fn from(error: Error) -> Self {
        match error {
            Error::Auth(message) => FetchError::auth(message),
            Error::Jwt(e) => FetchError::auth(e.to_string()),
            Error::Http(e) if e.is_timeout() => FetchError::new(FetchErrorKind::Timeout, e.to_string()),
            Error::Database { details, status } => FetchError::backend(
                details
                    .message
                    .unwrap_or_else(|| format!("database request failed with status {}", status)),
            ),
            e => FetchError::backend(e.to_string()),
        }
    }
}

/// Anything that can answer a listing query for the current tenant
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// User id the next `fetch` would be scoped to; fails without a session
    async fn tenant(&self) -> Result<String, FetchError>;

    async fn fetch(&self, filters: &ListingFilters) -> Result<Vec<Listing>, FetchError>;
}

#[async_trait]
impl<S: ListingSource + ?Sized> ListingSource for Arc<S> {
    async fn tenant(&self) -> Result<String, FetchError> {
        (**self).tenant().await
    }

    async fn fetch(&self, filters: &ListingFilters) -> Result<Vec<Listing>, FetchError> {
        (**self).fetch(filters).await
    }
}

/// Reads listings from the Postgrest gateway.
///
/// Never retries; retry policy belongs to the controller.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    table: PostgrestClient,
    auth: Arc<Auth>,
    query_timeout: Duration,
    max_limit: u32,
}

impl QueryExecutor {
    pub fn new(table: PostgrestClient, auth: Arc<Auth>, options: &InventoryOptions) -> Self {
        Self {
            table,
            auth,
            query_timeout: options.query_timeout,
            max_limit: options.max_limit,
        }
    }

    async fn read(&self, filters: &ListingFilters) -> Result<Vec<Value>, Error> {
        let tenant = self.auth.tenant().await?;

        let mut select = self
            .table
            .clone()
            .with_auth(&tenant.access_token)
            .select("*")
            .eq("user_id", &tenant.user_id)
            .order("created_at", SortOrder::Descending)
            .limit(filters.effective_limit(self.max_limit));

        if let Some(term) = filters.search_term() {
            select = select.ilike("title", &format!("*{}*", escape_pattern(term)));
        }
        if let StatusFilter::Only(status) = filters.status {
            select = select.eq("status", status);
        }
        if let CategoryFilter::Only(category) = &filters.category {
            select = select.eq("category", category);
        }

        debug!(table = self.table.table(), user_id = %tenant.user_id, %filters, "listing query");
        select.execute::<Value>().await
    }
}

#[async_trait]
impl ListingSource for QueryExecutor {
    async fn tenant(&self) -> Result<String, FetchError> {
        Ok(self.auth.tenant().await?.user_id)
    }

    async fn fetch(&self, filters: &ListingFilters) -> Result<Vec<Listing>, FetchError> {
        let rows = match tokio::time::timeout(self.query_timeout, self.read(filters)).await {
            Ok(result) => result?,
            Err(_) => return Err(FetchError::timeout(self.query_timeout)),
        };

        let total = rows.len();
        let listings: Vec<Listing> = rows
            .into_iter()
            .filter_map(|row| match Listing::from_row(row) {
                Ok(listing) => Some(listing),
                Err(e) => {
                    warn!(error = %e, "skipping malformed listing row");
                    None
                }
            })
            .collect();

        debug!(rows = total, listings = listings.len(), "listing query complete");
        Ok(listings)
    }
}
