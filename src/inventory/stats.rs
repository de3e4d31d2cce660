//! Rollups over the listings currently on screen

use serde::Serialize;

use crate::inventory::model::{Listing, ListingStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct InventoryStats {
    pub total_items: usize,
    /// Sum of `price` over every listing
    pub total_value: f64,
    pub active_items: usize,
    pub draft_items: usize,
}

impl InventoryStats {
    pub fn from_listings(listings: &[Listing]) -> Self {
        listings.iter().fold(
            InventoryStats {
                total_items: listings.len(),
                ..Default::default()
            },
            |mut stats, listing| {
                stats.total_value += listing.price;
                match listing.status {
                    ListingStatus::Active => stats.active_items += 1,
                    ListingStatus::Draft => stats.draft_items += 1,
                    ListingStatus::Sold | ListingStatus::Archived => {}
                }
                stats
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing(id: &str, price: serde_json::Value, status: &str) -> Listing {
        Listing::from_row(json!({ "id": id, "user_id": "u", "price": price, "status": status }))
            .unwrap()
    }

    #[test]
    fn empty_inventory_is_all_zero() {
        assert_eq!(InventoryStats::from_listings(&[]), InventoryStats::default());
    }

    #[test]
    fn totals_and_status_counts() {
        let listings = vec![
            listing("1", json!(45), "active"),
            listing("2", json!("10.5"), "draft"),
            listing("3", json!(null), "draft"),
            listing("4", json!(100), "sold"),
            listing("5", json!(4.5), "archived"),
        ];
        let stats = InventoryStats::from_listings(&listings);
        assert_eq!(stats.total_items, 5);
        assert_eq!(stats.total_value, 160.0);
        assert_eq!(stats.active_items, 1);
        assert_eq!(stats.draft_items, 2);
    }

    #[test]
    fn total_value_matches_price_sum() {
        let listings: Vec<Listing> = (0..20)
            .map(|i| listing(&i.to_string(), json!(i as f64 * 1.25), "active"))
            .collect();
        let expected: f64 = listings.iter().map(|l| l.price).sum();
        assert_eq!(InventoryStats::from_listings(&listings).total_value, expected);
    }
}
