use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::watch;

use super::fetcher::PageFetcher;
use super::state::{ListState, Pagination};
use crate::error::ApiError;
use crate::models::ListPage;

/// Where a list starts when its view mounts
#[derive(Debug, Clone)]
pub struct ListOptions {
    pub initial_page: u32,
    pub initial_search: String,
    /// Resource name used in log lines
    pub label: String,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            initial_page: 1,
            initial_search: String::new(),
            label: "list".to_string(),
        }
    }
}

impl ListOptions {
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.initial_page = page.max(1);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.initial_search = search.into();
        self
    }
}

/// Pagination and search state machine for one mounted table view.
///
/// Handles are cheap to clone and may be driven from several tasks. Every
/// issued fetch takes a ticket; only the most recently issued one may commit
/// its result, so a slow response can never overwrite a newer one. `loading`
/// stays set while any fetch is outstanding.
pub struct ListController<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ListController<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<T> {
    fetcher: RwLock<Arc<dyn PageFetcher<T>>>,
    state: watch::Sender<ListState<T>>,
    latest_ticket: AtomicU64,
    /// Page asked for by the latest ticket
    latest_page: AtomicU32,
    initialized: AtomicBool,
    mounted: AtomicBool,
    options: ListOptions,
}

/// Settles one request's share of `loading`, even if the fetch future is dropped
struct InFlight<'a, T> {
    state: &'a watch::Sender<ListState<T>>,
    armed: bool,
}

impl<'a, T> InFlight<'a, T> {
    fn start(state: &'a watch::Sender<ListState<T>>) -> Self {
        state.send_modify(ListState::begin_request);
        Self { state, armed: true }
    }

    fn finish(mut self, commit: impl FnOnce(&mut ListState<T>)) {
        self.armed = false;
        self.state.send_modify(|s| {
            commit(s);
            s.end_request();
        });
    }

    /// The view is gone; leave its state untouched
    fn abandon(mut self) {
        self.armed = false;
    }
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_modify(ListState::end_request);
        }
    }
}

impl<T> ListController<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Build a controller without fetching; call `initialize` to load.
    pub fn new(fetcher: Arc<dyn PageFetcher<T>>, options: ListOptions) -> Self {
        let initial_page = options.initial_page.max(1);
        let (state, _) = watch::channel(ListState::new(initial_page, options.initial_search.clone()));

        Self {
            inner: Arc::new(Inner {
                fetcher: RwLock::new(fetcher),
                state,
                latest_ticket: AtomicU64::new(0),
                latest_page: AtomicU32::new(initial_page),
                initialized: AtomicBool::new(false),
                mounted: AtomicBool::new(true),
                options,
            }),
        }
    }

    /// Build and perform the initial load
    pub async fn mount(fetcher: Arc<dyn PageFetcher<T>>, options: ListOptions) -> Self {
        let controller = Self::new(fetcher, options);
        controller.initialize().await;
        controller
    }

    /// Initial load of `(initial_page, initial_search)`. Only the first call fetches.
    pub async fn initialize(&self) {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        let page = self.inner.options.initial_page.max(1);
        let search = self.inner.options.initial_search.clone();
        self.load(page, search).await;
    }

    /// Swap in the latest fetch function. Never triggers a fetch by itself.
    pub fn replace_fetcher(&self, fetcher: Arc<dyn PageFetcher<T>>) {
        match self.inner.fetcher.write() {
            Ok(mut slot) => *slot = fetcher,
            Err(poisoned) => *poisoned.into_inner() = fetcher,
        }
    }

    /// Change the filter and load its first page
    pub async fn set_search(&self, term: impl Into<String>) {
        let term = term.into();
        if self.is_mounted() {
            self.inner.state.send_modify(|s| s.search_term = term.clone());
        }
        self.load(1, term).await;
    }

    /// Load `page` with the current filter.
    ///
    /// A no-op for the page already shown, or, while a fetch is outstanding,
    /// for the page that fetch asked for.
    pub async fn go_to_page(&self, page: u32) {
        if page == 0 {
            tracing::warn!("[{}] ignoring request for page 0", self.inner.options.label);
            return;
        }

        let (target, search) = {
            let state = self.inner.state.borrow();
            let target = if state.in_flight > 0 {
                self.inner.latest_page.load(Ordering::SeqCst)
            } else {
                state.pagination.current
            };
            (target, state.search_term.clone())
        };
        if page == target {
            return;
        }

        self.load(page, search).await;
    }

    /// Reload the page currently shown with the current filter
    pub async fn refresh(&self) {
        let (current, search) = {
            let state = self.inner.state.borrow();
            (state.pagination.current, state.search_term.clone())
        };
        self.load(current, search).await;
    }

    pub fn snapshot(&self) -> ListState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListState<T>> {
        self.inner.state.subscribe()
    }

    /// Detach from the view; fetches that settle afterwards are not committed.
    pub fn unmount(&self) {
        self.inner.mounted.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }

    fn current_fetcher(&self) -> Arc<dyn PageFetcher<T>> {
        match self.inner.fetcher.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn load(&self, page: u32, search: String) {
        let inner = &self.inner;
        let label = &inner.options.label;
        if !self.is_mounted() {
            return;
        }

        let ticket = inner.latest_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        inner.latest_page.store(page, Ordering::SeqCst);
        let in_flight = InFlight::start(&inner.state);
        tracing::debug!("[{}] fetch #{} page={} search={:?}", label, ticket, page, search);

        let fetcher = self.current_fetcher();
        let outcome = fetch_with_recovery(fetcher.as_ref(), page, &search, label).await;

        if !self.is_mounted() {
            tracing::debug!("[{}] fetch #{} settled after unmount, dropped", label, ticket);
            in_flight.abandon();
            return;
        }

        let latest = inner.latest_ticket.load(Ordering::SeqCst);
        if ticket != latest {
            tracing::debug!("[{}] fetch #{} superseded by #{}, discarded", label, ticket, latest);
            in_flight.finish(|_| {});
            return;
        }

        match outcome {
            Ok((shown_page, response)) => in_flight.finish(|s| {
                s.data = response.items;
                s.pagination = Pagination {
                    total: response.pagination.total,
                    total_pages: response.pagination.total_pages,
                    current: shown_page,
                };
                s.error = None;
                s.session_rejected = false;
            }),
            Err(e) => {
                tracing::warn!("[{}] fetch #{} failed: {}", label, ticket, e);
                in_flight.finish(|s| {
                    s.session_rejected = e.is_session_rejection();
                    s.error = Some(e.to_string());
                });
            }
        }
    }
}

/// Fetch `page`; when it comes back empty and is past the first page, show the
/// page before it instead. One step only.
async fn fetch_with_recovery<T>(
    fetcher: &dyn PageFetcher<T>,
    page: u32,
    search: &str,
    label: &str,
) -> Result<(u32, ListPage<T>), ApiError> {
    let response = fetcher.fetch_page(page, search).await?;
    if !response.is_empty() || page <= 1 {
        return Ok((page, response));
    }

    let previous = page - 1;
    tracing::debug!("[{}] page {} is empty, showing page {}", label, page, previous);
    let response = fetcher.fetch_page(previous, search).await?;
    Ok((previous, response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PAGE_LIMIT;
    use crate::list::fetch_fn;
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    /// In-memory resource that records every request it serves
    #[derive(Clone, Default)]
    struct Backend {
        rows: Arc<Mutex<Vec<String>>>,
        calls: Arc<Mutex<Vec<(u32, String)>>>,
        failing: Arc<AtomicBool>,
    }

    impl Backend {
        fn with_rows(n: usize) -> Self {
            let backend = Self::default();
            *backend.rows.lock().unwrap() = (0..n).map(|i| format!("murid-{:03}", i)).collect();
            backend
        }

        fn serve(&self, page: u32, search: &str) -> Result<ListPage<String>, ApiError> {
            self.calls.lock().unwrap().push((page, search.to_string()));
            if self.failing.load(Ordering::SeqCst) {
                return Err(ApiError::network("Failed to fetch student data"));
            }
            let rows: Vec<String> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.contains(search))
                .cloned()
                .collect();
            Ok(ListPage::paginate(&rows, page, PAGE_LIMIT))
        }

        fn fetcher(&self) -> Arc<dyn PageFetcher<String>> {
            let backend = self.clone();
            fetch_fn(move |page, search| {
                let backend = backend.clone();
                async move { backend.serve(page, &search) }
            })
        }

        /// Like `fetcher`, but requests for `gated_page` wait for a permit
        fn gated_fetcher(&self, gated_page: u32, gate: Arc<Semaphore>) -> Arc<dyn PageFetcher<String>> {
            let backend = self.clone();
            fetch_fn(move |page, search| {
                let backend = backend.clone();
                let gate = gate.clone();
                async move {
                    if page == gated_page {
                        let _permit = gate.acquire().await.expect("gate closed");
                    }
                    backend.serve(page, &search)
                }
            })
        }

        fn calls(&self) -> Vec<(u32, String)> {
            self.calls.lock().unwrap().clone()
        }

        fn remove_last(&self) {
            self.rows.lock().unwrap().pop();
        }
    }

    async fn mounted(backend: &Backend) -> ListController<String> {
        ListController::mount(backend.fetcher(), ListOptions::labeled("murid")).await
    }

    #[tokio::test]
    async fn initial_load_fetches_exactly_once() {
        let backend = Backend::with_rows(120);
        let list = mounted(&backend).await;
        list.initialize().await;

        let state = list.snapshot();
        assert_eq!(backend.calls(), vec![(1, String::new())]);
        assert_eq!(state.data.len(), 50);
        assert_eq!(state.pagination, Pagination { total: 120, total_pages: 3, current: 1 });
        assert!(!state.loading);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn going_to_the_current_page_is_a_no_op() {
        let backend = Backend::with_rows(120);
        let list = mounted(&backend).await;
        let before = list.snapshot();

        list.go_to_page(1).await;
        list.go_to_page(1).await;

        assert_eq!(list.snapshot(), before);
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn page_zero_is_ignored() {
        let backend = Backend::with_rows(10);
        let list = mounted(&backend).await;
        list.go_to_page(0).await;
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn deleting_the_last_row_falls_back_one_page() {
        let backend = Backend::with_rows(101);
        let list = mounted(&backend).await;
        list.go_to_page(3).await;
        assert_eq!(list.snapshot().data, vec!["murid-100".to_string()]);

        backend.remove_last();
        list.refresh().await;

        let state = list.snapshot();
        assert_eq!(state.pagination.current, 2);
        assert_eq!(state.pagination.total_pages, 2);
        assert_eq!(state.data.first().map(String::as_str), Some("murid-050"));
        assert_eq!(state.data.len(), 50);
        assert_eq!(&backend.calls()[2..], &[(3, String::new()), (2, String::new())]);
    }

    #[tokio::test]
    async fn recovery_is_a_single_step() {
        let backend = Backend::with_rows(10);
        let list = mounted(&backend).await;

        list.go_to_page(5).await;

        let state = list.snapshot();
        assert_eq!(state.pagination.current, 4);
        assert!(state.data.is_empty());
        assert_eq!(&backend.calls()[1..], &[(5, String::new()), (4, String::new())]);
    }

    #[tokio::test]
    async fn empty_first_page_is_not_recovered() {
        let backend = Backend::with_rows(0);
        let list = mounted(&backend).await;

        let state = list.snapshot();
        assert!(state.data.is_empty());
        assert_eq!(state.pagination.current, 1);
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn search_always_restarts_at_page_one() {
        let backend = Backend::with_rows(150);
        let list = mounted(&backend).await;
        list.go_to_page(3).await;

        list.set_search("murid-1").await;

        let state = list.snapshot();
        assert_eq!(state.search_term, "murid-1");
        assert_eq!(state.pagination.current, 1);
        assert_eq!(state.pagination.total, 50);
        assert_eq!(backend.calls().last(), Some(&(1, "murid-1".to_string())));

        list.refresh().await;
        assert_eq!(backend.calls().last(), Some(&(1, "murid-1".to_string())));
    }

    #[tokio::test]
    async fn backend_refusing_the_session_is_flagged() {
        let backend = Backend::with_rows(60);
        let list = mounted(&backend).await;
        assert!(!list.snapshot().session_rejected());

        list.replace_fetcher(fetch_fn(|_, _| async { Err::<ListPage<String>, _>(ApiError::unauthorized("Token expired")) }));
        list.refresh().await;
        let state = list.snapshot();
        assert!(state.session_rejected());
        assert_eq!(state.error.as_deref(), Some("Token expired"));

        list.replace_fetcher(backend.fetcher());
        list.refresh().await;
        assert!(!list.snapshot().session_rejected());

        backend.failing.store(true, Ordering::SeqCst);
        list.refresh().await;
        assert!(!list.snapshot().session_rejected());
    }

    #[tokio::test]
    async fn failure_keeps_rows_and_success_clears_error() {
        let backend = Backend::with_rows(60);
        let list = mounted(&backend).await;
        let rows = list.snapshot().data;

        backend.failing.store(true, Ordering::SeqCst);
        list.go_to_page(2).await;

        let state = list.snapshot();
        assert_eq!(state.error.as_deref(), Some("Failed to fetch student data"));
        assert_eq!(state.data, rows);
        assert_eq!(state.pagination.current, 1);
        assert!(!state.loading);

        backend.failing.store(false, Ordering::SeqCst);
        list.go_to_page(2).await;
        let state = list.snapshot();
        assert_eq!(state.error, None);
        assert_eq!(state.pagination.current, 2);
        assert_eq!(state.data.len(), 10);
    }

    #[tokio::test]
    async fn loading_spans_the_whole_request() {
        let backend = Backend::with_rows(120);
        let gate = Arc::new(Semaphore::new(0));
        let list = mounted(&backend).await;
        list.replace_fetcher(backend.gated_fetcher(2, gate.clone()));
        let mut rx = list.subscribe();

        let task = tokio::spawn({
            let list = list.clone();
            async move { list.go_to_page(2).await }
        });

        rx.wait_for(|s| s.loading).await.unwrap();
        assert_eq!(list.snapshot().pagination.current, 1);

        gate.add_permits(1);
        task.await.unwrap();

        let state = list.snapshot();
        assert!(!state.loading);
        assert_eq!(state.pagination.current, 2);
    }

    #[tokio::test]
    async fn slow_older_response_cannot_overwrite_newer_one() {
        let backend = Backend::with_rows(150);
        let gate = Arc::new(Semaphore::new(0));
        let list = mounted(&backend).await;
        list.replace_fetcher(backend.gated_fetcher(2, gate.clone()));

        let slow = tokio::spawn({
            let list = list.clone();
            async move { list.go_to_page(2).await }
        });
        list.subscribe().wait_for(|s| s.loading).await.unwrap();

        list.go_to_page(3).await;
        let state = list.snapshot();
        assert_eq!(state.pagination.current, 3);
        assert!(state.loading, "older request is still outstanding");

        gate.add_permits(1);
        slow.await.unwrap();

        let state = list.snapshot();
        assert_eq!(state.pagination.current, 3);
        assert_eq!(state.data.first().map(String::as_str), Some("murid-100"));
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn going_back_while_a_page_is_loading_wins() {
        let backend = Backend::with_rows(120);
        let gate = Arc::new(Semaphore::new(0));
        let list = mounted(&backend).await;
        list.replace_fetcher(backend.gated_fetcher(2, gate.clone()));

        let slow = tokio::spawn({
            let list = list.clone();
            async move { list.go_to_page(2).await }
        });
        list.subscribe().wait_for(|s| s.loading).await.unwrap();

        // Page 1 is still shown, but page 2 is what the pending fetch would show
        list.go_to_page(1).await;
        assert_eq!(backend.calls().last(), Some(&(1, String::new())));

        gate.add_permits(1);
        slow.await.unwrap();

        let state = list.snapshot();
        assert_eq!(state.pagination.current, 1);
        assert_eq!(state.data.first().map(String::as_str), Some("murid-000"));
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn repeating_the_pending_page_does_not_refetch() {
        let backend = Backend::with_rows(120);
        let gate = Arc::new(Semaphore::new(0));
        let list = mounted(&backend).await;
        list.replace_fetcher(backend.gated_fetcher(2, gate.clone()));

        let slow = tokio::spawn({
            let list = list.clone();
            async move { list.go_to_page(2).await }
        });
        list.subscribe().wait_for(|s| s.loading).await.unwrap();

        list.go_to_page(2).await;
        gate.add_permits(1);
        slow.await.unwrap();

        assert_eq!(backend.calls(), vec![(1, String::new()), (2, String::new())]);
        assert_eq!(list.snapshot().pagination.current, 2);
    }

    #[tokio::test]
    async fn replacing_the_fetcher_does_not_fetch() {
        let first = Backend::with_rows(5);
        let second = Backend::with_rows(70);
        let list = mounted(&first).await;

        list.replace_fetcher(second.fetcher());
        assert!(second.calls().is_empty());

        list.refresh().await;
        assert_eq!(second.calls(), vec![(1, String::new())]);
        assert_eq!(list.snapshot().pagination.total, 70);
        assert_eq!(first.calls().len(), 1);
    }

    #[tokio::test]
    async fn results_after_unmount_are_not_committed() {
        let backend = Backend::with_rows(120);
        let gate = Arc::new(Semaphore::new(0));
        let list = mounted(&backend).await;
        list.replace_fetcher(backend.gated_fetcher(2, gate.clone()));

        let pending = tokio::spawn({
            let list = list.clone();
            async move { list.go_to_page(2).await }
        });
        list.subscribe().wait_for(|s| s.loading).await.unwrap();
        let before = list.snapshot();

        list.unmount();
        gate.add_permits(1);
        pending.await.unwrap();

        assert_eq!(list.snapshot(), before);
        list.refresh().await;
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn dropped_fetch_does_not_leave_loading_stuck() {
        let backend = Backend::with_rows(120);
        let gate = Arc::new(Semaphore::new(0));
        let list = mounted(&backend).await;
        list.replace_fetcher(backend.gated_fetcher(2, gate));

        let abandoned = tokio::time::timeout(std::time::Duration::from_millis(20), list.go_to_page(2)).await;
        assert!(abandoned.is_err());
        assert!(!list.snapshot().loading);
    }

    #[tokio::test]
    async fn starts_from_requested_page_and_search() {
        let backend = Backend::with_rows(120);
        let options = ListOptions::labeled("murid").page(2).search("murid-0");
        let list = ListController::mount(backend.fetcher(), options).await;

        let state = list.snapshot();
        assert_eq!(backend.calls(), vec![(2, "murid-0".to_string())]);
        assert_eq!(state.search_term, "murid-0");
        assert_eq!(state.pagination.current, 2);
    }
}
