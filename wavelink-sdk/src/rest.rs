//! REST collaborator for chat/room management and history.
//!
//! Consumed, not owned, by the core: the connection layer never calls
//! this. Failures carry the HTTP status text, which is all the UI needs
//! to show.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A chat room as the backend describes it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub chat_id: String,
    pub participants: Vec<String>,
    #[serde(default)]
    pub chat_name: Option<String>,
    pub chat_type: ChatKind,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_activity: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Direct,
    Group,
}

/// One message from the history endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMessage {
    pub message_id: String,
    pub chat_id: String,
    pub user_id: String,
    pub message: String,
    pub timestamp: i64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub delivered: bool,
    #[serde(default)]
    pub read: bool,
}

/// A page of history plus the pagination cursor for the next one.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub messages: Vec<HistoryMessage>,
    /// Opaque cursor; pass its `timestamp` back as `last_timestamp`.
    #[serde(default)]
    pub last_evaluated_key: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedChat {
    chat_id: String,
}

/// Thin JSON client over the chat management API.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// All chats the given user participates in.
    pub async fn list_chats(&self, user_id: &str) -> Result<Vec<ChatSummary>, Error> {
        let url = format!("{}/chats?userId={user_id}", self.base_url);
        let response = self.http.get(url).send().await.map_err(to_api_error)?;
        decode(response).await
    }

    /// One page of a room's history. `last_timestamp` is the cursor from
    /// the previous page, None for the newest page.
    pub async fn fetch_messages(
        &self,
        chat_id: &str,
        limit: u32,
        last_timestamp: Option<i64>,
    ) -> Result<HistoryPage, Error> {
        let mut url = format!("{}/chats/{chat_id}/messages?limit={limit}", self.base_url);
        if let Some(cursor) = last_timestamp {
            url.push_str(&format!("&lastTimestamp={cursor}"));
        }
        let response = self.http.get(url).send().await.map_err(to_api_error)?;
        decode(response).await
    }

    /// Create a room; returns the server-assigned chat id.
    pub async fn create_chat(
        &self,
        participants: &[String],
        chat_name: Option<&str>,
        chat_type: ChatKind,
    ) -> Result<String, Error> {
        let url = format!("{}/chats", self.base_url);
        let body = serde_json::json!({
            "participants": participants,
            "chatName": chat_name,
            "chatType": chat_type,
        });
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(to_api_error)?;
        let created: CreatedChat = decode(response).await?;
        Ok(created.chat_id)
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, Error> {
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Api(
            status
                .canonical_reason()
                .unwrap_or_else(|| status.as_str())
                .to_string(),
        ));
    }
    response.json().await.map_err(to_api_error)
}

fn to_api_error(e: reqwest::Error) -> Error {
    Error::Api(e.to_string())
}
