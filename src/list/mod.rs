//! Remote list controller: pagination, search and stale-page recovery over any
//! paginated backend resource.

pub mod controller;
pub mod fetcher;
pub mod state;

pub use controller::{ListController, ListOptions};
pub use fetcher::{fetch_fn, FnFetcher, PageFetcher};
pub use state::{ListState, Pagination};
