use serde::{Deserialize, Serialize};

/// Paging and ordering for `retrieve` operations.
///
/// `page` is zero-based. `sort_by` names a column; modules whitelist the
/// columns they accept and fall back to `created_at` for anything else.
#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub page: usize,

    #[serde(default = "default_size")]
    pub size: usize,

    #[serde(default, rename = "sortBy")]
    pub sort_by: Option<String>,

    #[serde(default)]
    pub descending: bool,
}

fn default_size() -> usize {
    20
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 0,
            size: default_size(),
            sort_by: None,
            descending: false,
        }
    }
}

impl ListParams {
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }

    /// Resolve the ORDER BY column against an allow-list.
    pub fn order_column<'a>(&'a self, allowed: &[&'a str]) -> &'a str {
        self.sort_by
            .as_deref()
            .and_then(|col| allowed.iter().copied().find(|a| *a == col))
            .unwrap_or("created_at")
    }
}

/// One page of a `retrieve` operation.
#[derive(Debug, Clone, Serialize)]
pub struct ListResult<T: Serialize> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub size: usize,
}

/// Generate a new random ID (UUIDv4, no dashes).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Get the current time as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
