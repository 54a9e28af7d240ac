use serde::{Deserialize, Serialize};

/// Error body some API responses carry alongside a non-2xx status:
/// `{ "message": "..." }`. Anything else deserializes to `message: None`
/// and callers fall back to a generic description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    /// Best-effort extraction of a server-provided message from a raw body.
    pub fn message_from_bytes(bytes: &[u8]) -> Option<String> {
        serde_json::from_slice::<ApiErrorBody>(bytes)
            .ok()
            .and_then(|body| body.message)
            .filter(|message| !message.is_empty())
    }
}
