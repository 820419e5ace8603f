use serde::{Deserialize, Serialize};

/// Totals reported alongside one page of results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total: u64,
    pub total_pages: u32,
}

/// One page of a remote list: `{ data: [...], pagination: { total, totalPages } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage<T> {
    #[serde(rename = "data")]
    pub items: Vec<T>,
    #[serde(default)]
    pub pagination: PageInfo,
}

impl<T> ListPage<T> {
    pub fn new(items: Vec<T>, total: u64, total_pages: u32) -> Self {
        Self {
            items,
            pagination: PageInfo { total, total_pages },
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), 0, 0)
    }

    /// Slice `page` (1-based) out of a full result set, as the backend does.
    pub fn paginate(all: &[T], page: u32, limit: u32) -> Self
    where
        T: Clone,
    {
        let limit = limit.max(1) as usize;
        let total = all.len();
        let total_pages = total.div_ceil(limit) as u32;
        let start = (page.max(1) as usize - 1).saturating_mul(limit);
        let items = all.iter().skip(start).take(limit).cloned().collect();
        Self::new(items, total as u64, total_pages)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
