//! Types for the Postgrest client

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// Writes ask the gateway to echo the affected rows back
pub(crate) const PREFER_REPRESENTATION: &str = "return=representation";
