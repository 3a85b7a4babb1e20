//! Daily log of relayed chat exchanges.
//!
//! Persisted as `{ "chatList": [{ "createdAt", "data": [..] }] }` in a
//! day-partitioned document. An exchange whose `parentMessageId` matches the
//! last reply of a thread is appended to that thread; anything else opens a
//! new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::ClientIdentity;

/// Where a request came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestInfo {
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ua: Option<String>,
}

/// One prompt and the final upstream message answering it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatExchange {
    pub created_at: DateTime<Utc>,
    pub req_info: RequestInfo,
    #[serde(default)]
    pub prompt: String,
    /// Fields of the upstream reply (`id`, `text`, ...), stored inline.
    #[serde(flatten)]
    pub reply: Map<String, Value>,
}

impl ChatExchange {
    pub fn new(
        identity: &ClientIdentity,
        prompt: impl Into<String>,
        reply: Map<String, Value>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            created_at: at,
            req_info: RequestInfo {
                ip: identity.address_key().to_string(),
                ua: identity.user_agent.clone(),
            },
            prompt: prompt.into(),
            reply,
        }
    }

    /// Upstream message id of the reply, used to thread follow-ups.
    pub fn reply_id(&self) -> Option<&str> {
        self.reply.get("id").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatThread {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub data: Vec<ChatExchange>,
}

/// The persisted chat log document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatLog {
    pub chat_list: Vec<ChatThread>,
}

impl ChatLog {
    /// Appends `exchange`, returning true when it continued an existing thread.
    pub fn append(&mut self, exchange: ChatExchange, parent_message_id: Option<&str>) -> bool {
        let thread = parent_message_id
            .filter(|parent| !parent.is_empty())
            .and_then(|parent| {
                self.chat_list.iter_mut().find(|thread| {
                    thread.data.last().and_then(ChatExchange::reply_id) == Some(parent)
                })
            });

        match thread {
            Some(thread) => {
                thread.data.push(exchange);
                true
            }
            None => {
                self.chat_list.push(ChatThread {
                    created_at: exchange.created_at,
                    data: vec![exchange],
                });
                false
            }
        }
    }
}

/// Last newline-delimited JSON object of an upstream reply stream.
///
/// The completion service streams one JSON message per line, each a more
/// complete version of the reply. Anything unparsable yields an empty map.
pub fn final_message(stream: &[u8]) -> Map<String, Value> {
    stream
        .split(|b| *b == b'\n')
        .rev()
        .find(|line| !line.iter().all(u8::is_ascii_whitespace))
        .and_then(|line| serde_json::from_slice::<Value>(line).ok())
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default()
}
