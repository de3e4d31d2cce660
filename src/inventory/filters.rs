//! Filter sets for listing queries and their cache fingerprints

use std::fmt;

use crate::inventory::model::ListingStatus;

/// Status filter: every status or exactly one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ListingStatus),
}

/// Category filter: every category or exactly one
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl From<&str> for StatusFilter {
    fn from(value: &str) -> Self {
        match value.trim() {
            "" | "all" => StatusFilter::All,
            s => s.parse().map(StatusFilter::Only).unwrap_or_default(),
        }
    }
}

impl From<&str> for CategoryFilter {
    fn from(value: &str) -> Self {
        match value.trim() {
            "" | "all" => CategoryFilter::All,
            s => CategoryFilter::Only(s.to_string()),
        }
    }
}

/// One listing query as requested by the UI
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListingFilters {
    /// Case-insensitive substring of the title
    pub search: Option<String>,
    pub status: StatusFilter,
    pub category: CategoryFilter,
    /// Requested page size; clamped by the executor
    pub limit: u32,
}

impl Default for ListingFilters {
    fn default() -> Self {
        Self {
            search: None,
            status: StatusFilter::All,
            category: CategoryFilter::All,
            limit: 50,
        }
    }
}

impl ListingFilters {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn with_search(mut self, term: &str) -> Self {
        self.search = Some(term.to_string());
        self
    }

    pub fn with_status(mut self, status: impl Into<StatusFilter>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<CategoryFilter>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Trimmed search term, `None` when blank
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    /// Page size actually sent, in `1..=max_limit`
    pub fn effective_limit(&self, max_limit: u32) -> u32 {
        self.limit.clamp(1, max_limit.max(1))
    }

    /// Canonical form: two requests that hit the same rows compare equal
    pub fn normalized(&self, max_limit: u32) -> Self {
        Self {
            search: self.search_term().map(str::to_lowercase),
            status: self.status,
            category: match &self.category {
                CategoryFilter::Only(c) if c.trim().is_empty() => CategoryFilter::All,
                CategoryFilter::Only(c) => CategoryFilter::Only(c.trim().to_string()),
                CategoryFilter::All => CategoryFilter::All,
            },
            limit: self.effective_limit(max_limit),
        }
    }

    /// Deterministic cache key for this filter set
    pub fn fingerprint(&self, max_limit: u32) -> String {
        let normalized = self.normalized(max_limit);
        format!(
            "search={}|status={}|category={}|limit={}",
            escape(normalized.search.as_deref().unwrap_or("")),
            match normalized.status {
                StatusFilter::All => "all",
                StatusFilter::Only(status) => status.as_str(),
            },
            match &normalized.category {
                CategoryFilter::All => "all".to_string(),
                CategoryFilter::Only(category) => escape(category),
            },
            normalized.limit
        )
    }
}

impl From<ListingStatus> for StatusFilter {
    fn from(status: ListingStatus) -> Self {
        StatusFilter::Only(status)
    }
}

// Keeps `|` and `=` inside values from colliding with the key layout.
pub(crate) fn escape(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('|', "%7C")
        .replace('=', "%3D")
}

impl fmt::Display for ListingFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fingerprint(u32::MAX))
    }
}
