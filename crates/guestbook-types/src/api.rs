use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// Operator token claims. Token issuance lives outside this system; the
/// engine only verifies signature and expiry, so `sub` is informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: String,
    pub exp: usize,
}

// -- Messages --

/// Guest submission, shared by the REST handler and the live
/// `send_message` command.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub reply_to_id: Option<i64>,
}

/// Operator reply. The reply target is required: operator replies always
/// attach to an existing top-level message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminReplyRequest {
    pub content: String,
    pub reply_to_id: i64,
}
