//! Debounced user lookup.
//!
//! Every keystroke starts a new query generation. A query waits out the idle
//! gap, and its result is published only while it is still the newest one.
//! Superseded queries are aborted, so a slow answer for an older term can
//! never overwrite a newer one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::TicketApi;
use crate::types::User;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SearchState {
    #[default]
    Idle,
    /// Waiting for typing to settle.
    Pending { query: String },
    Loading { query: String },
    Ready { query: String, users: Vec<User> },
    Failed { query: String, message: String },
}

impl SearchState {
    pub fn query(&self) -> Option<&str> {
        match self {
            SearchState::Idle => None,
            SearchState::Pending { query }
            | SearchState::Loading { query }
            | SearchState::Ready { query, .. }
            | SearchState::Failed { query, .. } => Some(query),
        }
    }
}

pub struct UserSearch {
    api: Arc<dyn TicketApi>,
    debounce: Duration,
    limit: u32,
    generation: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
    state: Arc<watch::Sender<SearchState>>,
}

impl UserSearch {
    pub fn new(api: Arc<dyn TicketApi>, debounce: Duration, limit: u32) -> Self {
        let (state, _) = watch::channel(SearchState::Idle);
        Self {
            api,
            debounce,
            limit,
            generation: Arc::new(AtomicU64::new(0)),
            task: None,
            state: Arc::new(state),
        }
    }

    /// Feed the latest input. Must be called from within a tokio runtime.
    pub fn input(&mut self, query: &str) {
        let id = self.supersede();
        let query = query.trim().to_string();

        if query.is_empty() {
            self.state.send_replace(SearchState::Idle);
            return;
        }

        self.state.send_replace(SearchState::Pending {
            query: query.clone(),
        });

        let api = Arc::clone(&self.api);
        let state = Arc::clone(&self.state);
        let generation = Arc::clone(&self.generation);
        let debounce = self.debounce;
        let limit = self.limit;

        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let loading = SearchState::Loading {
                query: query.clone(),
            };
            if !publish_if_current(&state, &generation, id, loading) {
                return;
            }

            let result = api.search_users(&query, limit).await;
            let settled = match result {
                Ok(page) => SearchState::Ready {
                    query: query.clone(),
                    users: page.data,
                },
                Err(e) => SearchState::Failed {
                    query: query.clone(),
                    message: e.to_string(),
                },
            };
            if !publish_if_current(&state, &generation, id, settled) {
                debug!(query = %query, "discarding superseded search result");
            }
        }));
    }

    /// Stop any pending or in-flight query, e.g. when the picker closes.
    pub fn cancel(&mut self) {
        self.supersede();
        self.state.send_replace(SearchState::Idle);
    }

    pub fn current(&self) -> SearchState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    fn supersede(&mut self) -> u64 {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Publish `next` only while `id` is the newest generation. The check runs under
/// the channel lock and `supersede` bumps the generation before publishing, so
/// a stale task either loses the check or is overwritten, on any runtime flavor.
fn publish_if_current(
    state: &watch::Sender<SearchState>,
    generation: &AtomicU64,
    id: u64,
    next: SearchState,
) -> bool {
    state.send_if_modified(|current| {
        if generation.load(Ordering::SeqCst) != id {
            return false;
        }
        *current = next;
        true
    })
}

impl Drop for UserSearch {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{Call, FakeApi};

    const DEBOUNCE: Duration = Duration::from_millis(300);

    fn users() -> Vec<User> {
        ["Ana", "Anabel", "Bruno"]
            .into_iter()
            .enumerate()
            .map(|(i, name)| User {
                id: i as u64 + 1,
                name: Some(name.to_string()),
                ..Default::default()
            })
            .collect()
    }

    fn searches(api: &FakeApi) -> Vec<String> {
        api.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SearchUsers(term) => Some(term),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_stale_generation_cannot_publish() {
        let newer = SearchState::Pending {
            query: "anab".to_string(),
        };
        let (state, rx) = watch::channel(newer.clone());
        let generation = AtomicU64::new(2);

        let stale = SearchState::Ready {
            query: "ana".to_string(),
            users: users(),
        };
        assert!(!publish_if_current(&state, &generation, 1, stale));
        assert_eq!(*rx.borrow(), newer);
        assert!(!rx.has_changed().unwrap());

        let fresh = SearchState::Ready {
            query: "anab".to_string(),
            users: Vec::new(),
        };
        assert!(publish_if_current(&state, &generation, 2, fresh.clone()));
        assert_eq!(*rx.borrow(), fresh);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_input_coalesces() {
        let api = Arc::new(FakeApi::new().with_users(users()));
        let mut search = UserSearch::new(api.clone(), DEBOUNCE, 20);

        for query in ["a", "an", "ana"] {
            search.input(query);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(searches(&api), vec!["ana".to_string()]);
        let SearchState::Ready { query, users } = search.current() else {
            panic!("search should have settled");
        };
        assert_eq!(query, "ana");
        assert_eq!(users.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_for_older_query_is_discarded() {
        let api = Arc::new(FakeApi::new().with_users(users()));
        api.delay_search("ana", Duration::from_millis(500));
        let mut search = UserSearch::new(api.clone(), DEBOUNCE, 20);
        let mut rx = search.subscribe();

        search.input("ana");
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(search.current().query(), Some("ana"));
        assert!(matches!(search.current(), SearchState::Loading { .. }));

        search.input("anab");
        tokio::time::sleep(Duration::from_millis(2000)).await;

        assert_eq!(searches(&api), vec!["ana".to_string(), "anab".to_string()]);
        let state = rx.borrow_and_update().clone();
        let SearchState::Ready { query, users } = state.clone() else {
            panic!("expected results, got {state:?}");
        };
        assert_eq!(query, "anab");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name.as_deref(), Some("Anabel"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_pending_query() {
        let api = Arc::new(FakeApi::new().with_users(users()));
        let mut search = UserSearch::new(api.clone(), DEBOUNCE, 20);

        search.input("bru");
        search.cancel();
        tokio::time::sleep(Duration::from_millis(1000)).await;

        assert!(searches(&api).is_empty());
        assert_eq!(search.current(), SearchState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_input_goes_idle() {
        let api = Arc::new(FakeApi::new().with_users(users()));
        let mut search = UserSearch::new(api.clone(), DEBOUNCE, 20);

        search.input("   ");
        tokio::time::sleep(Duration::from_millis(1000)).await;

        assert!(searches(&api).is_empty());
        assert_eq!(search.current(), SearchState::Idle);
    }
}
