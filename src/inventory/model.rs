//! Listing records and write payloads

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;
use crate::inventory::lenient;

/// Lifecycle status of a listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Draft,
    Active,
    Sold,
    Archived,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Draft => "draft",
            ListingStatus::Active => "active",
            ListingStatus::Sold => "sold",
            ListingStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(ListingStatus::Draft),
            "active" => Ok(ListingStatus::Active),
            "sold" => Ok(ListingStatus::Sold),
            "archived" => Ok(ListingStatus::Archived),
            other => Err(Error::validation(format!("unknown listing status '{}'", other))),
        }
    }
}

impl<'de> Deserialize<'de> for ListingStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient::status(deserializer)
    }
}

/// Where an item was sourced
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceType {
    ThriftStore,
    EstateSale,
    GarageSale,
    FleaMarket,
    Online,
    Wholesale,
    /// Free text that matches none of the known kinds
    Other(String),
}

impl SourceType {
    pub fn as_str(&self) -> &str {
        match self {
            SourceType::ThriftStore => "thrift_store",
            SourceType::EstateSale => "estate_sale",
            SourceType::GarageSale => "garage_sale",
            SourceType::FleaMarket => "flea_market",
            SourceType::Online => "online",
            SourceType::Wholesale => "wholesale",
            SourceType::Other(text) => text,
        }
    }
}

impl From<&str> for SourceType {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "thrift_store" => SourceType::ThriftStore,
            "estate_sale" => SourceType::EstateSale,
            "garage_sale" => SourceType::GarageSale,
            "flea_market" => SourceType::FleaMarket,
            "online" => SourceType::Online,
            "wholesale" => SourceType::Wholesale,
            "other" => SourceType::Other("other".to_string()),
            _ => SourceType::Other(value.trim().to_string()),
        }
    }
}

impl Serialize for SourceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SourceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(SourceType::from(text.as_str()))
    }
}

/// Consignment columns; only meaningful when `is_consignment` is set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Consignment {
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_consignment: bool,
    /// Consignor's share of the sale, in percent
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub consignment_percentage: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub consignor_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub consignor_contact: Option<String>,
}

/// Sourcing columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sourcing {
    #[serde(default, deserialize_with = "lenient::source_type")]
    pub source_type: Option<SourceType>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub source_location: Option<String>,
}

/// Free-text measurements; the unit is part of the text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub length: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub width: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub height: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub weight: Option<String>,
}

/// One inventory item / marketplace draft, normalized.
///
/// Deserializing from a gateway row enforces the shape guarantees callers
/// rely on: `photos` and `keywords` are always arrays of strings and `price`
/// is always a non-negative number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(deserialize_with = "lenient::identifier")]
    pub id: String,
    #[serde(deserialize_with = "lenient::identifier")]
    pub user_id: String,

    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub condition: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub brand: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub keywords: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub photos: Vec<String>,

    #[serde(default, deserialize_with = "lenient::price")]
    pub price: f64,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub purchase_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub shipping_cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub cost_basis: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub fees_paid: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub net_profit: Option<f64>,
    /// Percentage of the sold price
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub profit_margin: Option<f64>,

    #[serde(default)]
    pub status: ListingStatus,
    #[serde(default, deserialize_with = "lenient::optional_timestamp")]
    pub listed_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::optional_timestamp")]
    pub sold_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub sold_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_integer")]
    pub days_to_sell: Option<i64>,

    #[serde(flatten)]
    pub consignment: Consignment,
    #[serde(flatten)]
    pub sourcing: Sourcing,
    #[serde(flatten)]
    pub measurements: Measurements,

    #[serde(default, deserialize_with = "lenient::optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::optional_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Listing {
    /// Consignment terms, if this item is held on consignment
    pub fn consignment(&self) -> Option<&Consignment> {
        self.consignment
            .is_consignment
            .then_some(&self.consignment)
    }

    /// Normalize one gateway row
    pub fn from_row(row: serde_json::Value) -> Result<Self, Error> {
        Ok(serde_json::from_value(row)?)
    }
}

fn check_amount(field: &str, value: Option<f64>) -> Result<(), Error> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(Error::validation(format!(
            "{} must be a non-negative number",
            field
        ))),
        _ => Ok(()),
    }
}

fn check_consignment(consignment: &Consignment) -> Result<(), Error> {
    if !consignment.is_consignment {
        return Ok(());
    }
    match consignment.consignment_percentage {
        Some(p) if !(0.0..=100.0).contains(&p) => Err(Error::validation(
            "consignment_percentage must be between 0 and 100",
        )),
        _ => Ok(()),
    }
}

/// Payload for creating a listing; `user_id` is taken from the session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewListing {
    pub title: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub keywords: Vec<String>,
    pub photos: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_basis: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fees_paid: Option<f64>,
    pub status: ListingStatus,
    #[serde(flatten)]
    pub consignment: Consignment,
    #[serde(flatten)]
    pub sourcing: Sourcing,
    #[serde(flatten)]
    pub measurements: Measurements,
}

impl NewListing {
    pub fn new(title: &str, price: f64) -> Self {
        Self {
            title: title.to_string(),
            price,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.title.trim().is_empty() {
            return Err(Error::validation("title is required"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(Error::validation("price must be a non-negative number"));
        }
        check_amount("purchase_price", self.purchase_price)?;
        check_amount("shipping_cost", self.shipping_cost)?;
        check_amount("cost_basis", self.cost_basis)?;
        check_amount("fees_paid", self.fees_paid)?;
        check_consignment(&self.consignment)
    }
}

/// Field-by-field update.
///
/// Outer `None` leaves a column untouched; `Some(None)` clears a nullable
/// column. Identity columns are not part of the patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photos: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_cost: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_basis: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fees_paid: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_profit: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_margin: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ListingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listed_date: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sold_date: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sold_price: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_to_sell: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_consignment: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consignment_percentage: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consignor_name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consignor_contact: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<Option<SourceType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_location: Option<Option<String>>,
}

impl ListingPatch {
    pub fn is_empty(&self) -> bool {
        self == &ListingPatch::default()
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.is_empty() {
            return Err(Error::validation("patch has no fields"));
        }
        if matches!(&self.title, Some(title) if title.trim().is_empty()) {
            return Err(Error::validation("title is required"));
        }
        check_amount("price", self.price)?;
        check_amount("purchase_price", self.purchase_price.flatten())?;
        check_amount("shipping_cost", self.shipping_cost.flatten())?;
        check_amount("cost_basis", self.cost_basis.flatten())?;
        check_amount("fees_paid", self.fees_paid.flatten())?;
        check_amount("sold_price", self.sold_price.flatten())?;
        match self.consignment_percentage.flatten() {
            Some(p) if !(0.0..=100.0).contains(&p) => Err(Error::validation(
                "consignment_percentage must be between 0 and 100",
            )),
            _ => Ok(()),
        }
    }
}
