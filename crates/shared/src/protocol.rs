use serde::{Deserialize, Serialize};

use crate::domain::{Task, TaskPriority, TaskStatus, UserProfile};

/// Query string for `GET /tasks`. Unset filters are omitted entirely: an
/// absent parameter means "no constraint", never "match the empty string".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskListQuery {
    pub page: u32,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationInfo {
    pub total: u64,
    pub pages: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskListData {
    pub tasks: Vec<Task>,
    pub pagination: PaginationInfo,
}

/// Envelope of `GET /tasks`: `{ "data": { "tasks": [...], "pagination": ... } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskListResponse {
    pub data: TaskListData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskData {
    pub task: Task,
}

/// Envelope of `POST /tasks` and `PUT /tasks/:id`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskResponse {
    pub data: TaskData,
}

/// Body of `POST /tasks`. Status and priority fall back to the server
/// defaults (`pending`, `medium`) when omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTask {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: None,
            priority: None,
        }
    }
}

/// Body of `PUT /tasks/:id`; only the present fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthData {
    pub token: String,
    pub user: UserProfile,
}

/// Envelope of `POST /auth/login` and `POST /auth/register`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub data: AuthData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserData {
    pub user: UserProfile,
}

/// Envelope of `GET /auth/me` and `PUT /auth/profile`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserResponse {
    pub data: UserData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_omits_unset_filters() {
        let query = TaskListQuery {
            page: 1,
            limit: 10,
            status: Some(TaskStatus::Pending),
            priority: None,
            search: None,
        };
        let encoded = serde_json::to_value(&query).unwrap();
        let object = encoded.as_object().unwrap();
        assert_eq!(object.get("status").unwrap(), "pending");
        assert!(!object.contains_key("priority"));
        assert!(!object.contains_key("search"));
    }

    #[test]
    fn new_task_serializes_only_provided_fields() {
        let body = serde_json::to_value(NewTask::titled("buy milk")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "title": "buy milk" }),
            "defaults are the server's to apply"
        );
    }

    #[test]
    fn list_envelope_deserializes() {
        let json = serde_json::json!({
            "data": {
                "tasks": [{
                    "_id": "a1",
                    "title": "one",
                    "status": "pending",
                    "priority": "low",
                    "createdAt": "2024-06-01T10:00:00Z"
                }],
                "pagination": { "total": 14, "pages": 2 }
            }
        });
        let response: TaskListResponse = serde_json::from_value(json).unwrap();
        assert_eq!(response.data.tasks.len(), 1);
        assert_eq!(response.data.pagination.total, 14);
        assert_eq!(response.data.pagination.pages, 2);
    }
}
