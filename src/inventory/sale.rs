//! Profit bookkeeping for a completed sale

use chrono::{DateTime, Utc};

use crate::error::Error;
use crate::inventory::model::{Listing, ListingPatch, ListingStatus};

/// What the item actually sold for, and when
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaleRecord {
    pub sold_price: f64,
    pub sold_at: DateTime<Utc>,
}

impl SaleRecord {
    pub fn new(sold_price: f64, sold_at: DateTime<Utc>) -> Self {
        Self {
            sold_price,
            sold_at,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.sold_price.is_finite() || self.sold_price < 0.0 {
            return Err(Error::validation("sold_price must be a non-negative number"));
        }
        Ok(())
    }
}

/// Derived figures written back when a listing is marked sold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaleSummary {
    pub sold_price: f64,
    pub sold_at: DateTime<Utc>,
    /// Cost basis, else purchase price, else zero
    pub cost: f64,
    pub consignor_payout: f64,
    pub net_profit: f64,
    /// Percent of the sold price, two decimals
    pub profit_margin: f64,
    pub days_to_sell: i64,
}

impl SaleSummary {
    pub fn compute(listing: &Listing, sale: &SaleRecord) -> Self {
        let sold = sale.sold_price;
        let cost = listing
            .cost_basis
            .or(listing.purchase_price)
            .unwrap_or(0.0);
        let consignor_payout = listing
            .consignment()
            .and_then(|c| c.consignment_percentage)
            .map(|percentage| sold * percentage / 100.0)
            .unwrap_or(0.0);

        let net_profit = sold
            - cost
            - listing.shipping_cost.unwrap_or(0.0)
            - listing.fees_paid.unwrap_or(0.0)
            - consignor_payout;

        let profit_margin = if sold > 0.0 {
            round2(net_profit / sold * 100.0)
        } else {
            0.0
        };

        let days_to_sell = listing
            .listed_date
            .or(listing.created_at)
            .map(|start| (sale.sold_at - start).num_days().max(0))
            .unwrap_or(0);

        Self {
            sold_price: sold,
            sold_at: sale.sold_at,
            cost,
            consignor_payout,
            net_profit,
            profit_margin,
            days_to_sell,
        }
    }

    /// Columns written by `mark_sold`
    pub fn to_patch(&self) -> ListingPatch {
        ListingPatch {
            status: Some(ListingStatus::Sold),
            sold_price: Some(Some(self.sold_price)),
            sold_date: Some(Some(self.sold_at)),
            days_to_sell: Some(Some(self.days_to_sell)),
            net_profit: Some(Some(self.net_profit)),
            profit_margin: Some(Some(self.profit_margin)),
            ..Default::default()
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn net_profit_deducts_costs_and_fees() {
        let listing = Listing::from_row(json!({
            "id": "1", "user_id": "u", "price": 60,
            "purchase_price": 10, "shipping_cost": 5.5, "fees_paid": "4.5",
            "listed_date": "2024-03-01T12:00:00Z"
        }))
        .unwrap();

        let summary = SaleSummary::compute(&listing, &SaleRecord::new(50.0, at(8)));
        assert_eq!(summary.cost, 10.0);
        assert_eq!(summary.net_profit, 30.0);
        assert_eq!(summary.profit_margin, 60.0);
        assert_eq!(summary.days_to_sell, 7);
    }

    #[test]
    fn cost_basis_wins_over_purchase_price() {
        let listing = Listing::from_row(json!({
            "id": "1", "user_id": "u", "purchase_price": 10, "cost_basis": 12
        }))
        .unwrap();
        let summary = SaleSummary::compute(&listing, &SaleRecord::new(30.0, at(2)));
        assert_eq!(summary.cost, 12.0);
        assert_eq!(summary.net_profit, 18.0);
    }

    #[test]
    fn consignor_share_only_when_consigned() {
        let consigned = Listing::from_row(json!({
            "id": "1", "user_id": "u",
            "is_consignment": true, "consignment_percentage": 40
        }))
        .unwrap();
        let summary = SaleSummary::compute(&consigned, &SaleRecord::new(100.0, at(2)));
        assert_eq!(summary.consignor_payout, 40.0);
        assert_eq!(summary.net_profit, 60.0);

        let own = Listing::from_row(json!({
            "id": "2", "user_id": "u",
            "is_consignment": false, "consignment_percentage": 40
        }))
        .unwrap();
        let summary = SaleSummary::compute(&own, &SaleRecord::new(100.0, at(2)));
        assert_eq!(summary.consignor_payout, 0.0);
    }

    #[test]
    fn margin_is_rounded_and_zero_for_free_items() {
        let listing = Listing::from_row(json!({ "id": "1", "user_id": "u", "purchase_price": 1 }))
            .unwrap();
        let summary = SaleSummary::compute(&listing, &SaleRecord::new(3.0, at(2)));
        assert_eq!(summary.profit_margin, 66.67);

        let summary = SaleSummary::compute(&listing, &SaleRecord::new(0.0, at(2)));
        assert_eq!(summary.net_profit, -1.0);
        assert_eq!(summary.profit_margin, 0.0);
    }

    #[test]
    fn days_to_sell_falls_back_to_created_at_and_never_goes_negative() {
        let listing = Listing::from_row(json!({
            "id": "1", "user_id": "u", "created_at": "2024-03-10T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(
            SaleSummary::compute(&listing, &SaleRecord::new(5.0, at(12))).days_to_sell,
            2
        );
        assert_eq!(
            SaleSummary::compute(&listing, &SaleRecord::new(5.0, at(3))).days_to_sell,
            0
        );
    }

    #[test]
    fn patch_marks_the_listing_sold() {
        let listing = Listing::from_row(json!({ "id": "1", "user_id": "u" })).unwrap();
        let patch = SaleSummary::compute(&listing, &SaleRecord::new(20.0, at(5))).to_patch();
        assert_eq!(patch.status, Some(ListingStatus::Sold));
        assert_eq!(patch.sold_price, Some(Some(20.0)));
        assert!(patch.title.is_none());
    }
}
