use serde::{Deserialize, Serialize};

/// An in-console notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Username of the recipient.
    pub receiver: String,
    #[serde(default)]
    pub unread: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateMessage {
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub receiver: String,
}
