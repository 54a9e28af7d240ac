use std::sync::Arc;

use shared::{
    domain::{Task, TaskId, TaskPriority, TaskStatus},
    protocol::{NewTask, TaskListQuery, TaskPatch},
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

pub mod auth;
pub mod store;

pub use auth::{AuthClient, AuthSession};
pub use store::{HttpTaskStore, TaskPage, TaskStore};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Current filter selection. An unset status/priority and an empty search
/// string mean "no constraint" and are omitted from the wire query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskFilters {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub search: String,
}

/// What the user is currently looking at: filters plus 1-based page.
/// `page_size` is fixed for the lifetime of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    pub filters: TaskFilters,
    pub page: u32,
    pub page_size: u32,
}

impl QueryState {
    fn with_page_size(page_size: u32) -> Self {
        Self {
            filters: TaskFilters::default(),
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub(crate) fn to_wire(&self) -> TaskListQuery {
        TaskListQuery {
            page: self.page,
            limit: self.page_size,
            status: self.filters.status,
            priority: self.filters.priority,
            search: if self.filters.search.is_empty() {
                None
            } else {
                Some(self.filters.search.clone())
            },
        }
    }
}

/// The last successfully fetched page plus loading/error status. Replaced
/// wholesale on every successful fetch, never merged field-by-field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultState {
    pub items: Vec<Task>,
    pub total_count: u64,
    pub page_count: u32,
    pub is_loading: bool,
    pub last_error: Option<ViewError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("failed to load tasks: {0}")]
    FetchFailed(String),
    #[error("failed to save task change: {0}")]
    MutationFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentError {
    #[error("unknown filter field `{0}`; expected status, priority, or search")]
    UnknownFilterField(String),
    #[error("invalid value `{value}` for filter `{field}`")]
    InvalidFilterValue { field: &'static str, value: String },
}

/// A single-filter change. Typed callers construct variants directly;
/// string-based intents (form inputs, CLI flags) go through [`parse`].
///
/// [`parse`]: FilterUpdate::parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterUpdate {
    Status(Option<TaskStatus>),
    Priority(Option<TaskPriority>),
    Search(String),
}

impl FilterUpdate {
    /// Maps a `(field, value)` intent to a filter change. Unknown fields are
    /// a configuration error on the caller's side, not a fetch failure. An
    /// empty value clears the status/priority constraint.
    pub fn parse(field: &str, value: &str) -> Result<Self, IntentError> {
        match field {
            "status" if value.is_empty() => Ok(Self::Status(None)),
            "status" => TaskStatus::parse(value)
                .map(|status| Self::Status(Some(status)))
                .ok_or_else(|| IntentError::InvalidFilterValue {
                    field: "status",
                    value: value.to_string(),
                }),
            "priority" if value.is_empty() => Ok(Self::Priority(None)),
            "priority" => TaskPriority::parse(value)
                .map(|priority| Self::Priority(Some(priority)))
                .ok_or_else(|| IntentError::InvalidFilterValue {
                    field: "priority",
                    value: value.to_string(),
                }),
            "search" => Ok(Self::Search(value.to_string())),
            other => Err(IntentError::UnknownFilterField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEvent {
    /// Query or result state changed; subscribers should re-read snapshots.
    StateChanged,
    /// A create/update/delete round trip succeeded (toast material).
    MutationApplied(MutationKind),
}

struct ControllerState {
    query: QueryState,
    result: ResultState,
    /// Monotonic fetch counter. Each fetch captures the value it was issued
    /// under; a completion only applies while no newer fetch exists.
    fetch_seq: u64,
}

/// Single source of truth for the task collection view: owns the query and
/// result state, and is the sole initiator of list fetches. The rendering
/// layer subscribes to [`DashboardEvent`]s and reads snapshots; it never
/// mutates state itself.
pub struct TaskListController {
    store: Arc<dyn TaskStore>,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<DashboardEvent>,
}

impl TaskListController {
    pub fn new(store: Arc<dyn TaskStore>) -> Arc<Self> {
        Self::with_page_size(store, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(store: Arc<dyn TaskStore>, page_size: u32) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            store,
            inner: Mutex::new(ControllerState {
                query: QueryState::with_page_size(page_size),
                result: ResultState::default(),
                fetch_seq: 0,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    pub async fn query_state(&self) -> QueryState {
        self.inner.lock().await.query.clone()
    }

    pub async fn result_state(&self) -> ResultState {
        self.inner.lock().await.result.clone()
    }

    /// Applies one filter change and re-fetches. Any filter change resets
    /// the page to 1 so a narrower result set cannot strand the view on an
    /// out-of-range page.
    pub async fn set_filter(&self, update: FilterUpdate) {
        {
            let mut inner = self.inner.lock().await;
            match update {
                FilterUpdate::Status(status) => inner.query.filters.status = status,
                FilterUpdate::Priority(priority) => inner.query.filters.priority = priority,
                FilterUpdate::Search(search) => inner.query.filters.search = search,
            }
            inner.query.page = 1;
        }
        self.run_fetch().await;
    }

    /// Moves to page `n` and re-fetches. Requests outside
    /// `[1, page_count]` (page 1 only while no page count is known) are
    /// ignored and never reach the store.
    pub async fn set_page(&self, page: u32) {
        {
            let mut inner = self.inner.lock().await;
            let page_count = inner.result.page_count;
            let in_range = if page_count == 0 {
                page == 1
            } else {
                (1..=page_count).contains(&page)
            };
            if !in_range {
                info!(
                    requested = page,
                    page_count, "ignoring out-of-range page request"
                );
                return;
            }
            inner.query.page = page;
        }
        self.run_fetch().await;
    }

    /// Re-issues the fetch for the current query without changing it. Also
    /// the initial load: the presentation layer calls this once on startup.
    pub async fn refresh(&self) {
        self.run_fetch().await;
    }

    pub async fn create_task(&self, fields: NewTask) {
        match self.store.create(&fields).await {
            Ok(task) => {
                info!(task_id = %task.id, "task created");
                let _ = self
                    .events
                    .send(DashboardEvent::MutationApplied(MutationKind::Create));
                self.run_fetch().await;
            }
            Err(err) => self.record_mutation_failure("create", err).await,
        }
    }

    pub async fn update_task(&self, id: &TaskId, fields: TaskPatch) {
        match self.store.update(id, &fields).await {
            Ok(task) => {
                info!(task_id = %task.id, "task updated");
                let _ = self
                    .events
                    .send(DashboardEvent::MutationApplied(MutationKind::Update));
                self.run_fetch().await;
            }
            Err(err) => self.record_mutation_failure("update", err).await,
        }
    }

    /// Deletes a task and resynchronizes. Only call after the user confirmed
    /// the delete intent; the controller itself never asks.
    pub async fn delete_task(&self, id: &TaskId) {
        match self.store.delete(id).await {
            Ok(()) => {
                info!(task_id = %id, "task deleted");
                let _ = self
                    .events
                    .send(DashboardEvent::MutationApplied(MutationKind::Delete));
                self.run_fetch().await;
            }
            Err(err) => self.record_mutation_failure("delete", err).await,
        }
    }

    /// The fetch protocol: mark loading and clear the previous error, issue
    /// the list request built from the current query, then apply the result
    /// only if no newer fetch was issued in the meantime. A failed fetch
    /// keeps the previous items on screen.
    async fn run_fetch(&self) {
        let (seq, query) = {
            let mut inner = self.inner.lock().await;
            inner.fetch_seq += 1;
            inner.result.is_loading = true;
            inner.result.last_error = None;
            (inner.fetch_seq, inner.query.to_wire())
        };
        let _ = self.events.send(DashboardEvent::StateChanged);

        let outcome = self.store.list(&query).await;

        {
            let mut inner = self.inner.lock().await;
            if inner.fetch_seq != seq {
                info!(
                    issued_seq = seq,
                    current_seq = inner.fetch_seq,
                    "discarding superseded task list response"
                );
                return;
            }
            match outcome {
                Ok(page) => {
                    inner.result.items = page.items;
                    inner.result.total_count = page.total_count;
                    inner.result.page_count = page.page_count;
                    inner.result.is_loading = false;
                }
                Err(err) => {
                    warn!("task list fetch failed: {err:#}");
                    inner.result.last_error = Some(ViewError::FetchFailed(err.to_string()));
                    inner.result.is_loading = false;
                }
            }
        }
        let _ = self.events.send(DashboardEvent::StateChanged);
    }

    async fn record_mutation_failure(&self, action: &str, err: anyhow::Error) {
        warn!("task {action} failed: {err:#}");
        {
            let mut inner = self.inner.lock().await;
            inner.result.last_error = Some(ViewError::MutationFailed(err.to_string()));
        }
        let _ = self.events.send(DashboardEvent::StateChanged);
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
