//! Reusable post listing state with de-duplication and stale-result
//! suppression.
//!
//! A [`PostFeed`] wraps a [`PostSource`] and exposes the listing as a
//! [`QueryState`] snapshot. Each instance moves through
//! `Idle → Loading → {Ready, Failed}` and may re-enter `Loading` on any new
//! request.
//!
//! Two guards decide whether a response is applied:
//!
//! - **Mounted**: once [`PostFeed::unmount`] is called, in-flight responses
//!   are dropped. The request itself is not cancelled.
//! - **Sequence**: every request takes a ticket from a monotonic counter; a
//!   response is applied only if its ticket is still the latest one issued,
//!   so a slow early request never overwrites a later one.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::{
    client::ContentClient,
    error::Result,
    types::{Page, Post, PostQuery},
};

/// Anything that can produce pages of posts for a [`PostFeed`].
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch_page(&self, query: &PostQuery) -> Result<Page>;

    async fn search_page(&self, search: &str, page: u32, per_page: u32) -> Result<Page>;
}

#[async_trait]
impl PostSource for ContentClient {
    async fn fetch_page(&self, query: &PostQuery) -> Result<Page> {
        Ok(self.list_posts(query).await)
    }

    async fn search_page(&self, search: &str, page: u32, per_page: u32) -> Result<Page> {
        Ok(self.search_posts(search, page, per_page).await)
    }
}

/// Lifecycle phase of a [`PostFeed`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryPhase {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Snapshot of a feed's listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryState {
    pub posts: Vec<Post>,
    pub loading: bool,
    pub error: Option<String>,
    pub total: u64,
    pub total_pages: u64,
    pub phase: QueryPhase,
}

/// Construction options for a [`PostFeed`].
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Parameters every fetch starts from.
    pub initial_params: PostQuery,
    /// Whether [`PostFeed::mount`] issues the first fetch.
    pub auto_fetch: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            initial_params: PostQuery::default(),
            auto_fetch: true,
        }
    }
}

impl QueryOptions {
    /// Options that start the feed from `initial_params`.
    pub fn with_params(initial_params: PostQuery) -> Self {
        Self {
            initial_params,
            ..Self::default()
        }
    }

    /// Disables the automatic fetch on mount.
    #[must_use]
    pub fn manual(mut self) -> Self {
        self.auto_fetch = false;
        self
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: QueryState,
    /// Key of the latest issued request when it was a non-append fetch.
    /// Cleared by any other request and by a failure of that fetch.
    last_key: Option<String>,
}

#[derive(Debug)]
struct Shared<S: ?Sized> {
    options: QueryOptions,
    inner: Mutex<Inner>,
    mounted: AtomicBool,
    issued: AtomicU64,
    source: Arc<S>,
}

impl<S: ?Sized> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How a successful response is merged into the current posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Apply {
    Replace,
    Append,
}

/// Post listing state bound to one consumer.
///
/// Clones share the same state, so one clone can drive fetches while another
/// reads [`PostFeed::state`] or calls [`PostFeed::unmount`].
#[derive(Debug)]
pub struct PostFeed<S: ?Sized> {
    shared: Arc<Shared<S>>,
}

impl<S: ?Sized> Clone for PostFeed<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: PostSource + ?Sized> PostFeed<S> {
    /// Creates a mounted feed with empty state. No request is made until
    /// [`PostFeed::mount`] or an explicit fetch.
    pub fn new(source: Arc<S>, options: QueryOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                options,
                inner: Mutex::new(Inner::default()),
                mounted: AtomicBool::new(true),
                issued: AtomicU64::new(0),
                source,
            }),
        }
    }

    /// Marks the feed active and, when `auto_fetch` is set, loads the
    /// initial listing.
    pub async fn mount(&self) {
        self.shared.mounted.store(true, Ordering::Release);
        if self.shared.options.auto_fetch {
            self.fetch(PostQuery::default(), false).await;
        }
    }

    /// Detaches the feed. Responses still in flight are discarded and later
    /// calls do nothing.
    pub fn unmount(&self) {
        self.shared.mounted.store(false, Ordering::Release);
    }

    /// `false` after [`PostFeed::unmount`].
    pub fn is_mounted(&self) -> bool {
        self.shared.mounted.load(Ordering::Acquire)
    }

    /// Current state snapshot.
    pub fn state(&self) -> QueryState {
        self.shared.lock().state.clone()
    }

    /// Fetches `params` layered over the initial parameters.
    ///
    /// With `append` the results are added after the current posts ("load
    /// more"); otherwise they replace them. A non-append fetch whose merged
    /// parameters equal those of the latest issued request is skipped while
    /// posts are present, even if that request is still in flight.
    #[instrument(skip(self))]
    pub async fn fetch(&self, params: PostQuery, append: bool) {
        if !self.is_mounted() {
            return;
        }

        let merged = params.merged_over(&self.shared.options.initial_params);
        let key = serde_json::to_string(&merged).unwrap_or_default();

        let (ticket, mode) = {
            let mut inner = self.shared.lock();
            if !append
                && inner.last_key.as_deref() == Some(key.as_str())
                && !inner.state.posts.is_empty()
            {
                debug!("Skipping fetch with unchanged parameters");
                return;
            }
            let (mode, key) = if append {
                (Apply::Append, None)
            } else {
                (Apply::Replace, Some(key))
            };
            (self.begin(&mut inner, key), mode)
        };

        let result = self.shared.source.fetch_page(&merged).await;
        self.finish(ticket, result, mode);
    }

    /// Replaces the posts with search results, ignoring de-duplication.
    #[instrument(skip(self))]
    pub async fn search(&self, search: &str, page: u32, per_page: u32) {
        if !self.is_mounted() {
            return;
        }

        let ticket = self.begin(&mut self.shared.lock(), None);
        let result = self
            .shared
            .source
            .search_page(search, page, per_page)
            .await;
        self.finish(ticket, result, Apply::Replace);
    }

    /// Forgets the de-duplication key and reloads the initial listing.
    pub async fn refresh(&self) {
        self.shared.lock().last_key = None;
        self.fetch(PostQuery::default(), false).await;
    }

    /// Enters `Loading`, records the request's de-dup key and issues a new
    /// ticket. Must run under the state lock so tickets, keys and state
    /// transitions stay ordered.
    fn begin(&self, inner: &mut Inner, key: Option<String>) -> u64 {
        inner.last_key = key;
        inner.state.loading = true;
        inner.state.error = None;
        inner.state.phase = QueryPhase::Loading;
        self.shared.issued.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn finish(&self, ticket: u64, result: Result<Page>, mode: Apply) {
        let mut inner = self.shared.lock();

        if !self.is_mounted() {
            debug!(ticket, "Dropping response for unmounted feed");
            return;
        }
        let latest = self.shared.issued.load(Ordering::Acquire);
        if ticket != latest {
            debug!(ticket, latest, "Dropping stale response");
            return;
        }

        match result {
            Ok(page) => {
                let state = &mut inner.state;
                match mode {
                    Apply::Append => state.posts.extend(page.posts),
                    Apply::Replace => state.posts = page.posts,
                }
                state.total = page.total;
                state.total_pages = page.total_pages;
                state.loading = false;
                state.phase = QueryPhase::Ready;
            }
            Err(e) => {
                error!(error = %e, "Post feed request failed");
                // A failed fetch must not suppress an identical retry.
                inner.last_key = None;
                let state = &mut inner.state;
                state.error = Some(e.to_string());
                state.loading = false;
                state.phase = QueryPhase::Failed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::atomic::AtomicUsize};

    use tokio::sync::oneshot;

    use super::*;
    use crate::{error::Error, fallback::placeholder_posts};

    struct Step {
        result: Result<Page, String>,
        gate: Option<oneshot::Receiver<()>>,
    }

    /// Scripted source: answers each call with the next queued step.
    #[derive(Default)]
    struct ScriptedSource {
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
        queries: Mutex<Vec<PostQuery>>,
    }

    impl ScriptedSource {
        fn push(&self, result: Result<Page, String>) {
            self.steps
                .lock()
                .unwrap()
                .push_back(Step { result, gate: None });
        }

        fn push_gated(&self, result: Result<Page, String>, gate: oneshot::Receiver<()>) {
            self.steps.lock().unwrap().push_back(Step {
                result,
                gate: Some(gate),
            });
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn answer(&self) -> Result<Page> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self
                .steps
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected call to scripted source");
            if let Some(gate) = step.gate {
                let _ = gate.await;
            }
            step.result.map_err(Error::Source)
        }
    }

    #[async_trait]
    impl PostSource for ScriptedSource {
        async fn fetch_page(&self, query: &PostQuery) -> Result<Page> {
            self.queries.lock().unwrap().push(query.clone());
            self.answer().await
        }

        async fn search_page(&self, search: &str, page: u32, per_page: u32) -> Result<Page> {
            self.queries.lock().unwrap().push(PostQuery {
                search: Some(search.to_string()),
                page: Some(page),
                per_page: Some(per_page),
                ..PostQuery::default()
            });
            self.answer().await
        }
    }

    fn page_of(ids: &[u64]) -> Page {
        let posts: Vec<Post> = placeholder_posts(Some(6))
            .into_iter()
            .cycle()
            .zip(ids)
            .map(|(mut post, id)| {
                post.id = *id;
                post.slug = format!("post-{id}");
                post
            })
            .collect();
        Page {
            total: 40,
            total_pages: 4,
            posts,
        }
    }

    fn ids(state: &QueryState) -> Vec<u64> {
        state.posts.iter().map(|p| p.id).collect()
    }

    fn page_query(page: u32) -> PostQuery {
        PostQuery {
            page: Some(page),
            ..PostQuery::default()
        }
    }

    #[tokio::test]
    async fn test_new_feed_starts_idle_and_empty() {
        let source = Arc::new(ScriptedSource::default());
        let feed = PostFeed::new(source.clone(), QueryOptions::default().manual());

        let state = feed.state();
        assert_eq!(state.phase, QueryPhase::Idle);
        assert!(state.posts.is_empty());
        assert!(!state.loading);

        feed.mount().await;
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_mount_auto_fetches_initial_params() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok(page_of(&[1, 2, 3])));
        let initial = PostQuery {
            per_page: Some(3),
            ..PostQuery::default()
        };
        let feed = PostFeed::new(source.clone(), QueryOptions::with_params(initial.clone()));

        feed.mount().await;

        let state = feed.state();
        assert_eq!(ids(&state), [1, 2, 3]);
        assert_eq!(state.total, 40);
        assert_eq!(state.total_pages, 4);
        assert_eq!(state.phase, QueryPhase::Ready);
        assert!(!state.loading);
        assert_eq!(source.queries.lock().unwrap()[0], initial);
    }

    #[tokio::test]
    async fn test_identical_fetch_is_skipped_when_posts_present() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok(page_of(&[1, 2])));
        let feed = PostFeed::new(source.clone(), QueryOptions::default().manual());

        feed.fetch(PostQuery::default(), false).await;
        feed.fetch(PostQuery::default(), false).await;

        assert_eq!(source.calls(), 1);
        assert_eq!(ids(&feed.state()), [1, 2]);
    }

    #[tokio::test]
    async fn test_identical_fetch_repeats_when_posts_empty() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok(page_of(&[])));
        source.push(Ok(page_of(&[9])));
        let feed = PostFeed::new(source.clone(), QueryOptions::default().manual());

        feed.fetch(PostQuery::default(), false).await;
        feed.fetch(PostQuery::default(), false).await;

        assert_eq!(source.calls(), 2);
        assert_eq!(ids(&feed.state()), [9]);
    }

    #[tokio::test]
    async fn test_append_concatenates_in_arrival_order() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok(page_of(&[1, 2, 3])));
        source.push(Ok(page_of(&[4, 5])));
        let feed = PostFeed::new(source.clone(), QueryOptions::default().manual());

        feed.fetch(page_query(1), false).await;
        feed.fetch(page_query(2), true).await;

        assert_eq!(ids(&feed.state()), [1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_replacing_fetch_overwrites_posts() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok(page_of(&[1, 2])));
        source.push(Ok(page_of(&[7])));
        let feed = PostFeed::new(source.clone(), QueryOptions::default().manual());

        feed.fetch(page_query(1), false).await;
        feed.fetch(page_query(2), false).await;

        assert_eq!(ids(&feed.state()), [7]);
    }

    #[tokio::test]
    async fn test_fetch_merges_params_over_initial() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok(page_of(&[1])));
        let initial = PostQuery {
            per_page: Some(6),
            categories: Some(vec![3]),
            ..PostQuery::default()
        };
        let feed = PostFeed::new(source.clone(), QueryOptions::with_params(initial).manual());

        feed.fetch(page_query(2), false).await;

        let sent = source.queries.lock().unwrap()[0].clone();
        assert_eq!(sent.page, Some(2));
        assert_eq!(sent.per_page, Some(6));
        assert_eq!(sent.categories, Some(vec![3]));
    }

    #[tokio::test]
    async fn test_search_replaces_and_bypasses_dedup() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok(page_of(&[1, 2])));
        source.push(Ok(page_of(&[5])));
        source.push(Ok(page_of(&[1, 2])));
        let feed = PostFeed::new(source.clone(), QueryOptions::default().manual());

        feed.fetch(PostQuery::default(), false).await;
        feed.search("insulin", 1, 10).await;
        assert_eq!(ids(&feed.state()), [5]);

        // The search results do not belong to the default key, so going
        // back to the default listing must hit the source again.
        feed.fetch(PostQuery::default(), false).await;
        assert_eq!(source.calls(), 3);
        assert_eq!(ids(&feed.state()), [1, 2]);
    }

    #[tokio::test]
    async fn test_refresh_forces_refetch() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok(page_of(&[1])));
        source.push(Ok(page_of(&[2])));
        let feed = PostFeed::new(source.clone(), QueryOptions::default().manual());

        feed.fetch(PostQuery::default(), false).await;
        feed.refresh().await;

        assert_eq!(source.calls(), 2);
        assert_eq!(ids(&feed.state()), [2]);
    }

    #[tokio::test]
    async fn test_source_error_is_stored_without_touching_posts() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok(page_of(&[1, 2])));
        source.push(Err("backend exploded".to_string()));
        let feed = PostFeed::new(source.clone(), QueryOptions::default().manual());

        feed.fetch(page_query(1), false).await;
        feed.fetch(page_query(2), true).await;

        let state = feed.state();
        assert_eq!(state.error.as_deref(), Some("backend exploded"));
        assert!(!state.loading);
        assert_eq!(state.phase, QueryPhase::Failed);
        assert_eq!(ids(&state), [1, 2]);
        assert_eq!(state.total, 40);
    }

    #[tokio::test]
    async fn test_next_fetch_clears_previous_error() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Err("down".to_string()));
        source.push(Ok(page_of(&[3])));
        let feed = PostFeed::new(source.clone(), QueryOptions::default().manual());

        feed.fetch(PostQuery::default(), false).await;
        assert!(feed.state().error.is_some());

        feed.fetch(PostQuery::default(), false).await;
        let state = feed.state();
        assert_eq!(state.error, None);
        assert_eq!(state.phase, QueryPhase::Ready);
    }

    #[tokio::test]
    async fn test_slow_earlier_response_does_not_overwrite_newer_one() {
        let source = Arc::new(ScriptedSource::default());
        let (release, gate) = oneshot::channel();
        source.push_gated(Ok(page_of(&[1])), gate);
        source.push(Ok(page_of(&[2])));
        let feed = PostFeed::new(source.clone(), QueryOptions::default().manual());

        let slow = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.fetch(page_query(1), false).await })
        };
        while source.calls() < 1 {
            tokio::task::yield_now().await;
        }

        feed.fetch(page_query(2), false).await;
        release.send(()).unwrap();
        slow.await.unwrap();

        let state = feed.state();
        assert_eq!(ids(&state), [2]);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_returning_to_shown_listing_while_other_fetch_in_flight() {
        let source = Arc::new(ScriptedSource::default());
        let (release, gate) = oneshot::channel();
        source.push(Ok(page_of(&[1])));
        source.push_gated(Ok(page_of(&[2])), gate);
        source.push(Ok(page_of(&[1])));
        let feed = PostFeed::new(source.clone(), QueryOptions::default().manual());

        feed.fetch(page_query(1), false).await;
        let pending = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.fetch(page_query(2), false).await })
        };
        while source.calls() < 2 {
            tokio::task::yield_now().await;
        }

        // Page 1 is on screen, but page 2 is the latest request.
        feed.fetch(page_query(1), false).await;
        release.send(()).unwrap();
        pending.await.unwrap();

        assert_eq!(source.calls(), 3);
        assert_eq!(ids(&feed.state()), [1]);
    }

    #[tokio::test]
    async fn test_identical_fetch_is_skipped_while_first_is_in_flight() {
        let source = Arc::new(ScriptedSource::default());
        let (release, gate) = oneshot::channel();
        source.push(Ok(page_of(&[1])));
        source.push_gated(Ok(page_of(&[2])), gate);
        let feed = PostFeed::new(source.clone(), QueryOptions::default().manual());

        feed.fetch(page_query(1), false).await;
        let first = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.fetch(page_query(2), false).await })
        };
        while source.calls() < 2 {
            tokio::task::yield_now().await;
        }

        feed.fetch(page_query(2), false).await;
        release.send(()).unwrap();
        first.await.unwrap();

        assert_eq!(source.calls(), 2);
        assert_eq!(ids(&feed.state()), [2]);
    }

    #[tokio::test]
    async fn test_failed_fetch_does_not_suppress_identical_retry() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Ok(page_of(&[1])));
        source.push(Err("timeout".to_string()));
        source.push(Ok(page_of(&[2])));
        let feed = PostFeed::new(source.clone(), QueryOptions::default().manual());

        feed.fetch(page_query(1), false).await;
        feed.fetch(page_query(2), false).await;
        feed.fetch(page_query(2), false).await;

        assert_eq!(source.calls(), 3);
        assert_eq!(ids(&feed.state()), [2]);
        assert_eq!(feed.state().phase, QueryPhase::Ready);
    }

    #[tokio::test]
    async fn test_unmounted_feed_drops_in_flight_response() {
        let source = Arc::new(ScriptedSource::default());
        let (release, gate) = oneshot::channel();
        source.push_gated(Ok(page_of(&[1, 2])), gate);
        let feed = PostFeed::new(source.clone(), QueryOptions::default().manual());

        let pending = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.fetch(PostQuery::default(), false).await })
        };
        while source.calls() < 1 {
            tokio::task::yield_now().await;
        }

        feed.unmount();
        release.send(()).unwrap();
        pending.await.unwrap();

        assert!(feed.state().posts.is_empty());
        assert!(!feed.is_mounted());
    }

    #[tokio::test]
    async fn test_unmounted_feed_ignores_new_calls() {
        let source = Arc::new(ScriptedSource::default());
        let feed = PostFeed::new(source.clone(), QueryOptions::default().manual());

        feed.unmount();
        feed.fetch(PostQuery::default(), false).await;
        feed.search("x", 1, 10).await;

        assert_eq!(source.calls(), 0);
        assert_eq!(feed.state().phase, QueryPhase::Idle);
    }
}
