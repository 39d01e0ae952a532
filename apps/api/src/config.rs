use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Conversation history lives in Redis when set, in process memory otherwise.
    pub redis_url: Option<String>,
    /// Vector index store. Falls back to the in-memory store when unset.
    pub qdrant_url: Option<String>,
    pub qdrant_api_key: Option<String>,
    pub anthropic_api_key: String,
    pub embedding: EmbeddingSettings,
    pub timeouts: Timeouts,
    pub search: SearchTuning,
    pub conversations: ConversationLimits,
    pub reindex_on_startup: bool,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimensions: usize,
}

#[derive(Debug, Clone)]
pub struct Timeouts {
    pub llm: Duration,
    pub embedding: Duration,
    pub vector_store: Duration,
    /// Upper bound for one whole search request.
    pub search: Duration,
}

/// Ranking knobs. The gate and cap carry no contract beyond "tunable".
#[derive(Debug, Clone, PartialEq)]
pub struct SearchTuning {
    pub top_k: usize,
    pub min_score: f32,
    pub score_cap: f32,
}

impl Default for SearchTuning {
    fn default() -> Self {
        Self {
            top_k: 15,
            min_score: 0.3,
            score_cap: 2.0,
        }
    }
}

impl SearchTuning {
    /// Rejects NaN, infinities and a gate outside `[0, score_cap]`.
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            anyhow::bail!("SEARCH_TOP_K must be at least 1");
        }
        if !self.score_cap.is_finite() || self.score_cap <= 0.0 {
            anyhow::bail!("SEARCH_SCORE_CAP must be a positive finite number");
        }
        if !self.min_score.is_finite() || self.min_score < 0.0 {
            anyhow::bail!("SEARCH_MIN_SCORE must be a non-negative finite number");
        }
        if self.min_score > self.score_cap {
            anyhow::bail!("SEARCH_MIN_SCORE must not exceed SEARCH_SCORE_CAP");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationLimits {
    pub max_messages: usize,
    pub ttl: Duration,
    pub max_conversations: usize,
}

impl Default for ConversationLimits {
    fn default() -> Self {
        Self {
            max_messages: 10,
            ttl: Duration::from_secs(3600),
            max_conversations: 1000,
        }
    }
}

impl ConversationLimits {
    pub fn validate(&self) -> Result<()> {
        if self.max_messages == 0 {
            anyhow::bail!("CONVERSATION_MAX_MESSAGES must be at least 1");
        }
        if self.max_conversations == 0 {
            anyhow::bail!("CONVERSATION_MAX_ENTRIES must be at least 1");
        }
        Ok(())
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let search_defaults = SearchTuning::default();
        let conversation_defaults = ConversationLimits::default();

        let search = SearchTuning {
            top_k: env_or("SEARCH_TOP_K", search_defaults.top_k)?,
            min_score: env_or("SEARCH_MIN_SCORE", search_defaults.min_score)?,
            score_cap: env_or("SEARCH_SCORE_CAP", search_defaults.score_cap)?,
        };
        search.validate()?;

        let conversations = ConversationLimits {
            max_messages: env_or("CONVERSATION_MAX_MESSAGES", conversation_defaults.max_messages)?,
            ttl: Duration::from_secs(env_or(
                "CONVERSATION_TTL_SECS",
                conversation_defaults.ttl.as_secs(),
            )?),
            max_conversations: env_or(
                "CONVERSATION_MAX_ENTRIES",
                conversation_defaults.max_conversations,
            )?,
        };
        conversations.validate()?;

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: optional_env("REDIS_URL"),
            qdrant_url: optional_env("QDRANT_URL"),
            qdrant_api_key: optional_env("QDRANT_API_KEY"),
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            embedding: EmbeddingSettings {
                api_url: optional_env("EMBEDDING_API_URL")
                    .unwrap_or_else(|| "http://localhost:8081/v1/embeddings".to_string()),
                api_key: optional_env("EMBEDDING_API_KEY"),
                model: optional_env("EMBEDDING_MODEL")
                    .unwrap_or_else(|| "sentence-transformers/all-MiniLM-L6-v2".to_string()),
                dimensions: env_or("EMBEDDING_DIMENSIONS", 384)?,
            },
            timeouts: Timeouts {
                llm: Duration::from_secs(env_or("LLM_TIMEOUT_SECS", 120)?),
                embedding: Duration::from_secs(env_or("EMBEDDING_TIMEOUT_SECS", 30)?),
                vector_store: Duration::from_secs(env_or("VECTOR_TIMEOUT_SECS", 15)?),
                search: Duration::from_secs(env_or("SEARCH_TIMEOUT_SECS", 90)?),
            },
            search,
            conversations,
            reindex_on_startup: env_or("REINDEX_ON_STARTUP", false)?,
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Config used by router tests; nothing in it is dialled.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/talent_test".to_string(),
            redis_url: None,
            qdrant_url: None,
            qdrant_api_key: None,
            anthropic_api_key: "test-key".to_string(),
            embedding: EmbeddingSettings {
                api_url: "http://localhost:8081/v1/embeddings".to_string(),
                api_key: None,
                model: "test".to_string(),
                dimensions: 64,
            },
            timeouts: Timeouts {
                llm: Duration::from_secs(5),
                embedding: Duration::from_secs(5),
                vector_store: Duration::from_secs(5),
                search: Duration::from_secs(5),
            },
            search: SearchTuning::default(),
            conversations: ConversationLimits::default(),
            reindex_on_startup: false,
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_tuning_defaults_match_documented_values() {
        let tuning = SearchTuning::default();
        assert_eq!(tuning.top_k, 15);
        assert!((tuning.min_score - 0.3).abs() < f32::EPSILON);
        assert!((tuning.score_cap - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_search_tuning_rejects_nan_and_negative_scores() {
        let tuning = |min_score: f32, score_cap: f32| SearchTuning {
            min_score,
            score_cap,
            ..SearchTuning::default()
        };
        assert!(SearchTuning::default().validate().is_ok());
        assert!(tuning(0.0, 0.5).validate().is_ok());
        assert!(tuning(-2.0, -1.0).validate().is_err());
        assert!(tuning(0.3, -1.0).validate().is_err());
        assert!(tuning(-0.1, 2.0).validate().is_err());
        assert!(tuning(f32::NAN, 2.0).validate().is_err());
        assert!(tuning(0.3, f32::NAN).validate().is_err());
        assert!(tuning(0.3, f32::INFINITY).validate().is_err());
        assert!(tuning(1.5, 1.0).validate().is_err());

        let parsed: f32 = "NaN".parse().unwrap();
        assert!(tuning(parsed, 2.0).validate().is_err());
    }

    #[test]
    fn test_conversation_limits_reject_zero_messages() {
        assert!(ConversationLimits::default().validate().is_ok());
        let limits = ConversationLimits {
            max_messages: 0,
            ..ConversationLimits::default()
        };
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_env_or_uses_default_when_unset() {
        let value: usize = env_or("TALENT_TEST_SURELY_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_env_or_rejects_garbage() {
        std::env::set_var("TALENT_TEST_GARBAGE_NUMBER", "seven");
        let result: Result<usize> = env_or("TALENT_TEST_GARBAGE_NUMBER", 7);
        assert!(result.is_err());
        std::env::remove_var("TALENT_TEST_GARBAGE_NUMBER");
    }

    #[test]
    fn test_optional_env_treats_blank_as_unset() {
        std::env::set_var("TALENT_TEST_BLANK_VALUE", "   ");
        assert!(optional_env("TALENT_TEST_BLANK_VALUE").is_none());
        std::env::remove_var("TALENT_TEST_BLANK_VALUE");
    }
}
