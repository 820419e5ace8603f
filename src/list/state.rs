use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub total_pages: u32,
    /// Last page actually displayed, which after stale-page recovery may be
    /// one less than the page requested
    pub current: u32,
}

/// Everything a table view renders from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListState<T> {
    pub data: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub search_term: String,
    pub pagination: Pagination,
    #[serde(skip)]
    pub(crate) in_flight: usize,
    /// Last committed failure was the backend refusing the session
    #[serde(skip)]
    pub(crate) session_rejected: bool,
}

impl<T> ListState<T> {
    pub(crate) fn new(initial_page: u32, initial_search: String) -> Self {
        Self {
            data: Vec::new(),
            loading: false,
            error: None,
            search_term: initial_search,
            pagination: Pagination {
                total: 0,
                total_pages: 0,
                current: initial_page,
            },
            in_flight: 0,
            session_rejected: false,
        }
    }

    pub(crate) fn begin_request(&mut self) {
        self.in_flight += 1;
        self.loading = true;
    }

    pub(crate) fn end_request(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.loading = self.in_flight > 0;
    }

    /// Whether the backend refused the session on the last committed fetch
    pub fn session_rejected(&self) -> bool {
        self.session_rejected
    }
}
