//! Inventory listings: tenant-scoped reads, the result-set cache, and the
//! controller that decides what the UI shows when the backend misbehaves.

mod lenient;

pub mod cache;
pub mod controller;
pub mod executor;
pub mod filters;
pub mod model;
pub mod repository;
pub mod sale;
pub mod stats;

pub use cache::{CacheEntry, ListingCache};
pub use controller::{InventoryController, InventoryView, LoadOutcome, Phase, SkipReason};
pub use executor::{FetchError, FetchErrorKind, ListingSource, QueryExecutor};
pub use filters::{CategoryFilter, ListingFilters, StatusFilter};
pub use model::{
    Consignment, Listing, ListingPatch, ListingStatus, Measurements, NewListing, SourceType,
    Sourcing,
};
pub use repository::ListingRepository;
pub use sale::{SaleRecord, SaleSummary};
pub use stats::InventoryStats;
