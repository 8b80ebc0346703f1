use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Upper bound on a single page; also what `size=all` resolves to.
pub const MAX_PAGE_SIZE: i64 = 10_000;

/// Requested page size: an explicit count or the `all` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    Limited(i64),
    All,
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize::Limited(10)
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(PageSize::All);
        }
        s.parse::<i64>()
            .map(PageSize::Limited)
            .map_err(|_| format!("size must be an integer or \"all\", got '{s}'"))
    }
}

impl std::fmt::Display for PageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageSize::Limited(n) => write!(f, "{n}"),
            PageSize::All => f.write_str("all"),
        }
    }
}

/// Paging/filter input as received from the request layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub index: String,
    /// 1-based page number.
    pub page: i64,
    pub size: PageSize,
    pub order_id: Option<String>,
    pub customer_id: Option<String>,
    /// Inclusive upper time bound (ISO-8601). `None` means "now".
    pub until: Option<String>,
}

impl QueryParams {
    /// First page of `index` with the default size and no filters.
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            page: 1,
            size: PageSize::default(),
            order_id: None,
            customer_id: None,
            until: None,
        }
    }

    pub fn page(mut self, page: i64) -> Self {
        self.page = page;
        self
    }

    pub fn size(mut self, size: PageSize) -> Self {
        self.size = size;
        self
    }

    pub fn order_id(mut self, id: impl Into<String>) -> Self {
        self.order_id = Some(id.into());
        self
    }

    pub fn customer_id(mut self, id: impl Into<String>) -> Self {
        self.customer_id = Some(id.into());
        self
    }

    pub fn until(mut self, ts: impl Into<String>) -> Self {
        self.until = Some(ts.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Exact-match condition on a source field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermFilter {
    pub field: String,
    pub value: String,
}

/// Backend-neutral search request produced by the query builder.
///
/// All conditions are combined with AND. Backends translate it into their
/// own dialect (Elasticsearch DSL, in-memory predicate, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Field holding the ordering timestamp.
    pub timestamp_field: String,
    /// Inclusive upper bound on `timestamp_field`.
    pub until: String,
    pub filters: Vec<TermFilter>,
    pub sort: SortOrder,
    /// Number of matches to skip.
    pub from: u64,
    /// Number of matches to return.
    pub size: u64,
}
