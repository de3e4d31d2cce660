//! Tenant-scoped listing writes.
//!
//! Every successful write clears the shared listing cache so the next read
//! for any filter set goes back to the gateway.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use crate::auth::{Auth, Tenant};
use crate::error::{Error, Result};
use crate::inventory::cache::ListingCache;
use crate::inventory::model::{Listing, ListingPatch, ListingStatus, NewListing};
use crate::inventory::sale::{SaleRecord, SaleSummary};
use crate::postgrest::PostgrestClient;

#[derive(Debug, Clone)]
pub struct ListingRepository {
    table: PostgrestClient,
    auth: Arc<Auth>,
    cache: ListingCache,
}

impl ListingRepository {
    pub fn new(table: PostgrestClient, auth: Arc<Auth>, cache: ListingCache) -> Self {
        Self { table, auth, cache }
    }

    async fn scoped(&self) -> Result<(PostgrestClient, Tenant)> {
        let tenant = self.auth.tenant().await?;
        let table = self.table.clone().with_auth(&tenant.access_token);
        Ok((table, tenant))
    }

    fn written(&self, action: &str, id: &str) {
        self.cache.invalidate_all();
        info!(action, id, "listing written");
    }

    /// Fetch one listing owned by the signed-in user
    pub async fn get(&self, id: &str) -> Result<Option<Listing>> {
        let (table, tenant) = self.scoped().await?;
        let row = table
            .select("*")
            .eq("id", id)
            .eq("user_id", &tenant.user_id)
            .execute_one::<Value>()
            .await?;
        row.map(Listing::from_row).transpose()
    }

    pub async fn create(&self, listing: NewListing) -> Result<Listing> {
        listing.validate()?;
        let (table, tenant) = self.scoped().await?;

        let mut row = serde_json::to_value(&listing)?;
        if let Value::Object(columns) = &mut row {
            columns.insert("user_id".to_string(), Value::String(tenant.user_id.clone()));
            if listing.status == ListingStatus::Active {
                columns.insert("listed_date".to_string(), Value::String(Utc::now().to_rfc3339()));
            }
        }

        let created = table
            .insert(row)
            .execute::<Value>()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::general("insert returned no rows"))
            .and_then(Listing::from_row)?;

        self.written("create", &created.id);
        Ok(created)
    }

    /// Partial update; only the fields set on `patch` are sent
    pub async fn update(&self, id: &str, patch: ListingPatch) -> Result<Listing> {
        patch.validate()?;
        self.apply(id, &patch, "update").await
    }

    /// Moving to `Active` stamps `listed_date` the first time
    pub async fn set_status(&self, id: &str, status: ListingStatus) -> Result<Listing> {
        let mut patch = ListingPatch {
            status: Some(status),
            ..Default::default()
        };
        if status == ListingStatus::Active {
            let current = self.require(id).await?;
            if current.listed_date.is_none() {
                patch.listed_date = Some(Some(Utc::now()));
            }
        }
        self.apply(id, &patch, status.as_str()).await
    }

    /// Record a sale and the profit figures derived from it
    pub async fn mark_sold(&self, id: &str, sale: SaleRecord) -> Result<Listing> {
        sale.validate()?;
        let listing = self.require(id).await?;
        let summary = SaleSummary::compute(&listing, &sale);
        self.apply(id, &summary.to_patch(), "sold").await
    }

    pub async fn archive(&self, id: &str) -> Result<Listing> {
        self.set_status(id, ListingStatus::Archived).await
    }

    /// Hard delete
    pub async fn delete(&self, id: &str) -> Result<()> {
        let (table, tenant) = self.scoped().await?;
        let removed = table
            .delete()
            .eq("id", id)
            .eq("user_id", &tenant.user_id)
            .execute::<Value>()
            .await?;
        if removed.is_empty() {
            return Err(Error::not_found(format!("listing {}", id)));
        }
        self.written("delete", id);
        Ok(())
    }

    async fn require(&self, id: &str) -> Result<Listing> {
        self.get(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("listing {}", id)))
    }

    async fn apply(&self, id: &str, patch: &ListingPatch, action: &str) -> Result<Listing> {
        let (table, tenant) = self.scoped().await?;
        let row = table
            .update(patch)
            .eq("id", id)
            .eq("user_id", &tenant.user_id)
            .execute::<Value>()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("listing {}", id)))?;

        let listing = Listing::from_row(row)?;
        self.written(action, id);
        Ok(listing)
    }
}
