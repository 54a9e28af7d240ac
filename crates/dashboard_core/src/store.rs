use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use shared::{
    domain::{Task, TaskId},
    error::ApiErrorBody,
    protocol::{NewTask, TaskListQuery, TaskListResponse, TaskPatch, TaskResponse},
};
use tracing::debug;

use crate::auth::AuthSession;

/// One page of tasks as reported by the last list call. Order is
/// server-determined and preserved as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPage {
    pub items: Vec<Task>,
    pub total_count: u64,
    pub page_count: u32,
}

/// The remote task collection. The controller only talks to this seam, so
/// tests substitute in-memory fakes for the HTTP store.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn list(&self, query: &TaskListQuery) -> Result<TaskPage>;
    async fn create(&self, fields: &NewTask) -> Result<Task>;
    async fn update(&self, id: &TaskId, fields: &TaskPatch) -> Result<Task>;
    async fn delete(&self, id: &TaskId) -> Result<()>;
}

/// `TaskStore` over the remote `/tasks` API. Attaches the session's bearer
/// token when one is present; a 401 is reported like any other failure and
/// session renewal stays the session owner's concern.
pub struct HttpTaskStore {
    http: Client,
    server_url: String,
    session: Arc<AuthSession>,
}

impl HttpTaskStore {
    pub fn new(server_url: impl Into<String>, session: Arc<AuthSession>) -> Self {
        Self {
            http: Client::new(),
            server_url: trim_trailing_slash(server_url.into()),
            session,
        }
    }

    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.bearer_token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl TaskStore for HttpTaskStore {
    async fn list(&self, query: &TaskListQuery) -> Result<TaskPage> {
        debug!(page = query.page, limit = query.limit, "listing tasks");
        let request = self
            .http
            .get(format!("{}/tasks", self.server_url))
            .query(query);
        let response = self
            .authorize(request)
            .await
            .send()
            .await
            .context("task list request failed")?;
        let body: TaskListResponse = read_success(response)
            .await?
            .json()
            .await
            .context("invalid task list response")?;
        Ok(TaskPage {
            items: body.data.tasks,
            total_count: body.data.pagination.total,
            page_count: body.data.pagination.pages,
        })
    }

    async fn create(&self, fields: &NewTask) -> Result<Task> {
        let request = self
            .http
            .post(format!("{}/tasks", self.server_url))
            .json(fields);
        let response = self
            .authorize(request)
            .await
            .send()
            .await
            .context("task create request failed")?;
        let body: TaskResponse = read_success(response)
            .await?
            .json()
            .await
            .context("invalid task create response")?;
        Ok(body.data.task)
    }

    async fn update(&self, id: &TaskId, fields: &TaskPatch) -> Result<Task> {
        let request = self
            .http
            .put(format!("{}/tasks/{}", self.server_url, id.0))
            .json(fields);
        let response = self
            .authorize(request)
            .await
            .send()
            .await
            .context("task update request failed")?;
        let body: TaskResponse = read_success(response)
            .await?
            .json()
            .await
            .context("invalid task update response")?;
        Ok(body.data.task)
    }

    async fn delete(&self, id: &TaskId) -> Result<()> {
        let request = self
            .http
            .delete(format!("{}/tasks/{}", self.server_url, id.0));
        let response = self
            .authorize(request)
            .await
            .send()
            .await
            .context("task delete request failed")?;
        read_success(response).await?;
        Ok(())
    }
}

/// Passes 2xx responses through; otherwise folds the server's `message`
/// body (when it has one) into the error.
pub(crate) async fn read_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let bytes = response.bytes().await.unwrap_or_default();
    match ApiErrorBody::message_from_bytes(&bytes) {
        Some(message) => Err(anyhow!("{message} (status {status})")),
        None => Err(anyhow!("request failed with status {status}")),
    }
}

pub(crate) fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
