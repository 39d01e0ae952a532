//! Bounded conversation history keyed by an opaque conversation id.
//!
//! Two backends: `InMemoryConversationStore` (size-capped, TTL-evicted) and
//! `RedisConversationStore` (list per conversation, trimmed and expired on write).

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use crate::config::ConversationLimits;

const REDIS_KEY_PREFIX: &str = "talent:conversation:";

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Stored messages, oldest first. Unknown or expired ids yield an empty history.
    async fn history(&self, conversation_id: &str)
        -> Result<Vec<ConversationMessage>, ConversationError>;

    /// Appends messages, keeping only the most recent `max_messages`.
    async fn append(
        &self,
        conversation_id: &str,
        messages: &[ConversationMessage],
    ) -> Result<(), ConversationError>;
}

struct Conversation {
    messages: VecDeque<ConversationMessage>,
    touched: Instant,
}

/// Process-local store. Entries idle longer than the TTL are dropped, and once
/// `max_conversations` is reached the least recently used conversation is evicted.
pub struct InMemoryConversationStore {
    limits: ConversationLimits,
    conversations: Mutex<HashMap<String, Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new(limits: ConversationLimits) -> Self {
        Self {
            limits,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    fn purge_expired(&self, conversations: &mut HashMap<String, Conversation>, now: Instant) {
        let ttl = self.limits.ttl;
        conversations.retain(|_, c| now.duration_since(c.touched) < ttl);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.conversations.lock().await.len()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn history(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ConversationMessage>, ConversationError> {
        let now = Instant::now();
        let mut conversations = self.conversations.lock().await;
        self.purge_expired(&mut conversations, now);
        Ok(match conversations.get_mut(conversation_id) {
            Some(conversation) => {
                conversation.touched = now;
                conversation.messages.iter().cloned().collect()
            }
            None => Vec::new(),
        })
    }

    async fn append(
        &self,
        conversation_id: &str,
        messages: &[ConversationMessage],
    ) -> Result<(), ConversationError> {
        let now = Instant::now();
        let mut conversations = self.conversations.lock().await;
        self.purge_expired(&mut conversations, now);

        if !conversations.contains_key(conversation_id)
            && conversations.len() >= self.limits.max_conversations
        {
            let oldest = conversations
                .iter()
                .min_by_key(|(_, c)| c.touched)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                conversations.remove(&id);
            }
        }

        let conversation = conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| Conversation {
                messages: VecDeque::new(),
                touched: now,
            });
        conversation.touched = now;
        conversation.messages.extend(messages.iter().cloned());
        while conversation.messages.len() > self.limits.max_messages {
            conversation.messages.pop_front();
        }
        Ok(())
    }
}

/// Redis-backed store: one list per conversation, trimmed and given a TTL on every write.
#[derive(Clone)]
pub struct RedisConversationStore {
    conn: MultiplexedConnection,
    limits: ConversationLimits,
}

impl RedisConversationStore {
    pub async fn connect(
        client: &redis::Client,
        limits: ConversationLimits,
    ) -> Result<Self, ConversationError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn, limits })
    }

    fn key(conversation_id: &str) -> String {
        format!("{REDIS_KEY_PREFIX}{conversation_id}")
    }
}

#[async_trait]
impl ConversationStore for RedisConversationStore {
    async fn history(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ConversationMessage>, ConversationError> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.lrange(Self::key(conversation_id), 0, -1).await?;
        Ok(raw
            .iter()
            .filter_map(|item| match serde_json::from_str(item) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(conversation_id, error = %e, "skipping undecodable history entry");
                    None
                }
            })
            .collect())
    }

    async fn append(
        &self,
        conversation_id: &str,
        messages: &[ConversationMessage],
    ) -> Result<(), ConversationError> {
        if messages.is_empty() {
            return Ok(());
        }
        let encoded = messages
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        let key = Self::key(conversation_id);
        let mut conn = self.conn.clone();
        // LTRIM with -0 would keep the whole list.
        if self.limits.max_messages == 0 {
            conn.del::<_, ()>(&key).await?;
            return Ok(());
        }
        let keep = self.limits.max_messages as isize;

        redis::pipe()
            .atomic()
            .rpush(&key, encoded)
            .ltrim(&key, -keep, -1)
            .expire(&key, self.limits.ttl.as_secs() as i64)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}

/// Loads history, degrading to an empty history when the store is unavailable.
pub async fn load_history(
    store: &dyn ConversationStore,
    conversation_id: &str,
) -> Vec<ConversationMessage> {
    match store.history(conversation_id).await {
        Ok(history) => history,
        Err(e) => {
            warn!(conversation_id, error = %e, "conversation history unavailable");
            Vec::new()
        }
    }
}

/// Records one search exchange; failures are logged only.
pub async fn record_exchange(
    store: &dyn ConversationStore,
    conversation_id: &str,
    query: &str,
    reply: &str,
) {
    let messages = [
        ConversationMessage::new(Role::User, query),
        ConversationMessage::new(Role::Assistant, reply),
    ];
    if let Err(e) = store.append(conversation_id, &messages).await {
        warn!(conversation_id, error = %e, "failed to record conversation exchange");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limits(max_messages: usize, ttl_secs: u64, max_conversations: usize) -> ConversationLimits {
        ConversationLimits {
            max_messages,
            ttl: Duration::from_secs(ttl_secs),
            max_conversations,
        }
    }

    fn user(text: &str) -> ConversationMessage {
        ConversationMessage::new(Role::User, text)
    }

    #[tokio::test]
    async fn test_history_keeps_most_recent_messages() {
        let store = InMemoryConversationStore::new(limits(3, 60, 10));
        for i in 0..5 {
            store.append("c1", &[user(&format!("m{i}"))]).await.unwrap();
        }
        let contents: Vec<String> = store
            .history("c1")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_empty() {
        let store = InMemoryConversationStore::new(limits(3, 60, 10));
        assert!(store.history("missing").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_conversations_expire() {
        let store = InMemoryConversationStore::new(limits(10, 60, 10));
        store.append("c1", &[user("hello")]).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(store.history("c1").await.unwrap().len(), 1);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.history("c1").await.unwrap().is_empty());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_least_recently_used_conversation_is_evicted() {
        let store = InMemoryConversationStore::new(limits(10, 3600, 2));
        store.append("a", &[user("1")]).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        store.append("b", &[user("2")]).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        // Reading "a" makes "b" the least recently used.
        store.history("a").await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        store.append("c", &[user("3")]).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert!(store.history("b").await.unwrap().is_empty());
        assert_eq!(store.history("a").await.unwrap().len(), 1);
        assert_eq!(store.history("c").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_exchange_appends_user_then_assistant() {
        let store = InMemoryConversationStore::new(limits(10, 60, 10));
        record_exchange(&store, "c1", "Find Rust developers", "I found 2 candidates").await;
        let history = load_history(&store, "c1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "I found 2 candidates");
    }

    #[test]
    fn test_message_wire_format() {
        let message = user("hi");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "user");
        let back: ConversationMessage = serde_json::from_value(value).unwrap();
        assert_eq!(back, message);
    }
}
