//! Request-scoped batching of relation lookups
//!
//! Resolvers ask the [`BatchCoordinator`] for the records related to one
//! source key. Requests for the same relation edge at the same call site
//! accumulate in a batch window until the executor calls
//! [`BatchCoordinator::dispatch`], which issues exactly one backing fetch per
//! window with the deduplicated key set and routes each result back to the
//! handles waiting on it.

mod window;

use std::collections::HashMap;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

pub use window::CallSiteId;
use window::{BatchWindow, WindowKey};

use super::error::FieldError;
use super::schema::RelationEdge;
use crate::models::{Entity, EntityKey};
use crate::repositories::Fetcher;

/// What one source key reached along a relation edge
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// Single-cardinality edge; `None` when nothing matched
    One(Option<Entity>),
    /// List-cardinality edge, possibly empty
    Many(Vec<Entity>),
}

pub type LoadResult = Result<Related, FieldError>;

/// Pending result of a [`BatchCoordinator::request`]
///
/// Cloneable; every clone settles with the same result.
#[derive(Clone)]
pub struct LoadHandle(Shared<BoxFuture<'static, LoadResult>>);

impl LoadHandle {
    fn pending() -> (oneshot::Sender<LoadResult>, Self) {
        let (sender, receiver) = oneshot::channel();
        let settled = async move { receiver.await.unwrap_or(Err(FieldError::Cancelled)) };
        (sender, Self(settled.boxed().shared()))
    }

    /// A handle that is already settled
    pub fn ready(result: LoadResult) -> Self {
        Self(future::ready(result).boxed().shared())
    }
}

impl IntoFuture for LoadHandle {
    type Output = LoadResult;
    type IntoFuture = Shared<BoxFuture<'static, LoadResult>>;

    fn into_future(self) -> Self::IntoFuture {
        self.0
    }
}

impl std::fmt::Debug for LoadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LoadHandle")
            .field(&self.0.peek().is_some())
            .finish()
    }
}

/// Per-execution batching state
///
/// Created at the start of one query execution and dropped at its end; never
/// shared between executions.
pub struct BatchCoordinator {
    fetcher: Arc<dyn Fetcher>,
    windows: Mutex<HashMap<WindowKey, BatchWindow>>,
    cancel: CancellationToken,
    dispatched: AtomicUsize,
}

impl BatchCoordinator {
    pub fn new(fetcher: Arc<dyn Fetcher>, cancel: CancellationToken) -> Self {
        Self {
            fetcher,
            windows: Mutex::new(HashMap::new()),
            cancel,
            dispatched: AtomicUsize::new(0),
        }
    }

    /// Ask for the records related to `key` along `edge`
    ///
    /// The handle settles after the next [`dispatch`](Self::dispatch).
    pub fn request(
        &self,
        edge: &'static RelationEdge,
        call_site: CallSiteId,
        key: EntityKey,
    ) -> LoadHandle {
        if self.cancel.is_cancelled() {
            return LoadHandle::ready(Err(FieldError::Cancelled));
        }

        self.lock_windows()
            .entry(WindowKey {
                edge: edge.id,
                call_site,
            })
            .or_insert_with(|| BatchWindow::new(edge, call_site))
            .enqueue(key)
    }

    /// Number of windows currently accumulating keys
    pub fn open_windows(&self) -> usize {
        self.lock_windows().len()
    }

    /// Number of backing fetches issued so far
    pub fn dispatched_batches(&self) -> usize {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Close every open window and fetch each one's key set
    ///
    /// Windows are fetched concurrently. Once the execution is cancelled, open
    /// windows are abandoned without fetching and results of fetches already
    /// in flight are discarded.
    pub async fn dispatch(&self) {
        let windows: Vec<BatchWindow> = self.lock_windows().drain().map(|(_, w)| w).collect();
        if windows.is_empty() {
            return;
        }

        if self.cancel.is_cancelled() {
            tracing::debug!(windows = windows.len(), "Abandoning batch windows");
            return;
        }

        future::join_all(windows.into_iter().map(|window| self.flush(window))).await;
    }

    async fn flush(&self, window: BatchWindow) {
        tracing::debug!(
            edge = %window.edge.id,
            call_site = %window.call_site,
            keys = window.keys().len(),
            "Dispatching batch"
        );
        self.dispatched.fetch_add(1, Ordering::Relaxed);

        let outcome = self.fetcher.fetch_by_keys(window.edge, window.keys()).await;
        if self.cancel.is_cancelled() {
            tracing::debug!(edge = %window.edge.id, "Discarding batch after cancellation");
            return;
        }
        if let Err(error) = &outcome {
            tracing::warn!(edge = %window.edge.id, error = %error, "Batch fetch failed");
        }
        window.resolve(outcome);
    }

    fn lock_windows(&self) -> MutexGuard<'_, HashMap<WindowKey, BatchWindow>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for BatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCoordinator")
            .field("open_windows", &self.open_windows())
            .field("dispatched", &self.dispatched_batches())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::schema::{entity_graph, EdgeId};
    use crate::models::{MemberTypeId, User};
    use crate::repositories::{FetchCall, MemoryStore};
    use assert_matches::assert_matches;
    use tracing_test::traced_test;

    fn coordinator(store: &Arc<MemoryStore>) -> BatchCoordinator {
        BatchCoordinator::new(store.clone(), CancellationToken::new())
    }

    #[tokio::test]
    async fn test_one_fetch_per_window() {
        let store = Arc::new(MemoryStore::seeded());
        let users = store.users();
        let coordinator = coordinator(&store);
        let edge = entity_graph().edge(EdgeId::UserPosts);

        let handles: Vec<_> = users
            .iter()
            .map(|user| coordinator.request(edge, CallSiteId(1), user.id.into()))
            .collect();
        assert_eq!(coordinator.open_windows(), 1);

        coordinator.dispatch().await;
        assert_eq!(coordinator.open_windows(), 0);
        assert_eq!(coordinator.dispatched_batches(), 1);

        for handle in handles {
            assert_matches!(handle.await, Ok(Related::Many(_)));
        }
        assert_eq!(
            store.calls(),
            vec![FetchCall::ByKeys {
                edge: EdgeId::UserPosts,
                keys: users.iter().map(|u| u.id.into()).collect(),
            }]
        );
    }

    #[tokio::test]
    async fn test_duplicate_keys_are_fetched_once() {
        let store = Arc::new(MemoryStore::seeded());
        let coordinator = coordinator(&store);
        let edge = entity_graph().edge(EdgeId::ProfileMemberType);
        let key = EntityKey::from(MemberTypeId::Basic);

        let first = coordinator.request(edge, CallSiteId(3), key);
        let second = coordinator.request(edge, CallSiteId(3), key);
        coordinator.dispatch().await;

        let (Ok(first), Ok(second)) = (first.await, second.await) else {
            panic!("member type lookup failed");
        };
        assert_eq!(first, second);
        assert_eq!(
            store.calls(),
            vec![FetchCall::ByKeys {
                edge: EdgeId::ProfileMemberType,
                keys: vec![key],
            }]
        );
    }

    #[tokio::test]
    async fn test_call_sites_get_separate_windows() {
        let store = Arc::new(MemoryStore::seeded());
        let coordinator = coordinator(&store);
        let edge = entity_graph().edge(EdgeId::UserProfile);
        let user = store.users()[0].clone();

        coordinator.request(edge, CallSiteId(1), user.id.into());
        coordinator.request(edge, CallSiteId(2), user.id.into());
        assert_eq!(coordinator.open_windows(), 2);

        coordinator.dispatch().await;
        assert_eq!(coordinator.dispatched_batches(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_does_not_touch_other_windows() {
        let store = Arc::new(MemoryStore::seeded());
        store.fail_edge(EdgeId::UserPosts);
        let coordinator = coordinator(&store);
        let user: User = store.users()[0].clone();

        let posts = coordinator.request(
            entity_graph().edge(EdgeId::UserPosts),
            CallSiteId(1),
            user.id.into(),
        );
        let profile = coordinator.request(
            entity_graph().edge(EdgeId::UserProfile),
            CallSiteId(2),
            user.id.into(),
        );
        coordinator.dispatch().await;

        assert_matches!(posts.await, Err(FieldError::Fetch { .. }));
        assert_matches!(profile.await, Ok(Related::One(Some(_))));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_fetch_is_logged() {
        let store = Arc::new(MemoryStore::seeded());
        store.fail_edge(EdgeId::PostAuthor);
        let coordinator = coordinator(&store);

        let handle = coordinator.request(
            entity_graph().edge(EdgeId::PostAuthor),
            CallSiteId(4),
            store.users()[0].id.into(),
        );
        coordinator.dispatch().await;

        assert_matches!(handle.await, Err(FieldError::Fetch { .. }));
        assert!(logs_contain("Batch fetch failed"));
    }

    #[tokio::test]
    async fn test_cancelled_dispatch_issues_no_fetch() {
        let store = Arc::new(MemoryStore::seeded());
        let token = CancellationToken::new();
        let coordinator = BatchCoordinator::new(store.clone(), token.clone());
        let user = store.users()[0].clone();

        let handle = coordinator.request(
            entity_graph().edge(EdgeId::UserPosts),
            CallSiteId(1),
            user.id.into(),
        );
        token.cancel();
        coordinator.dispatch().await;

        assert_matches!(handle.await, Err(FieldError::Cancelled));
        assert!(store.calls().is_empty());
        assert_eq!(coordinator.dispatched_batches(), 0);
    }

    #[tokio::test]
    async fn test_request_after_cancellation_settles_immediately() {
        let store = Arc::new(MemoryStore::new());
        let token = CancellationToken::new();
        token.cancel();
        let coordinator = BatchCoordinator::new(store, token);

        let handle = coordinator.request(
            entity_graph().edge(EdgeId::PostAuthor),
            CallSiteId(0),
            uuid::Uuid::new_v4().into(),
        );
        assert_eq!(coordinator.open_windows(), 0);
        assert_matches!(handle.await, Err(FieldError::Cancelled));
    }
}
