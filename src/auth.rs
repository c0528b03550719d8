//! API-key issuance and bearer-token parsing.

use rand::distr::Alphanumeric;
use rand::Rng as _;
use serde::{Deserialize, Serialize};

use crate::constants::{API_KEY_PREFIX, API_KEY_RANDOM_LEN};
use crate::error::{ArenaError, ArenaResult};
use crate::store::{self, Namespace, RecordStore};

/// Record stored under `api_keys/<key>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRecord {
    pub agent_id: String,
}

pub fn make_api_key() -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(API_KEY_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("{API_KEY_PREFIX}{suffix}")
}

pub fn looks_like_api_key(candidate: &str) -> bool {
    candidate
        .strip_prefix(API_KEY_PREFIX)
        .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(false)
}

/// Extract the key from an `Authorization` header value.
pub fn parse_bearer(header: Option<&str>) -> ArenaResult<&str> {
    let token = header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(ArenaError::Unauthenticated)?;
    if !looks_like_api_key(token) {
        return Err(ArenaError::Unauthenticated);
    }
    Ok(token)
}

pub async fn bind_key(store: &dyn RecordStore, api_key: &str, agent_id: &str) -> ArenaResult<()> {
    let record = ApiKeyRecord {
        agent_id: agent_id.to_string(),
    };
    store::persist(store, Namespace::ApiKeys, api_key, &record).await?;
    Ok(())
}

/// Agent id bound to `api_key`, or `Unauthenticated`.
pub async fn resolve_key(store: &dyn RecordStore, api_key: &str) -> ArenaResult<String> {
    let record: Option<ApiKeyRecord> = store::fetch(store, Namespace::ApiKeys, api_key).await?;
    record
        .map(|record| record.agent_id)
        .ok_or(ArenaError::Unauthenticated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn generated_keys_have_prefix_and_length() {
        let key = make_api_key();
        assert!(key.starts_with("mab_"));
        assert_eq!(key.len(), 4 + 32);
        assert!(looks_like_api_key(&key));
        assert_ne!(make_api_key(), key);
    }

    #[test]
    fn parse_bearer_requires_scheme_and_prefix() {
        assert_eq!(parse_bearer(Some("Bearer mab_abc123")).ok(), Some("mab_abc123"));
        assert_eq!(parse_bearer(Some("Bearer  mab_abc123 ")).ok(), Some("mab_abc123"));
        assert!(matches!(parse_bearer(None), Err(ArenaError::Unauthenticated)));
        assert!(parse_bearer(Some("mab_abc123")).is_err());
        assert!(parse_bearer(Some("Bearer sk_abc123")).is_err());
        assert!(parse_bearer(Some("Bearer mab_")).is_err());
        assert!(parse_bearer(Some("Basic mab_abc123")).is_err());
    }

    #[tokio::test]
    async fn keys_resolve_to_their_agent() {
        let store = MemoryStore::new();
        bind_key(&store, "mab_one", "agent-1").await.expect("bind");
        assert_eq!(resolve_key(&store, "mab_one").await.expect("resolve"), "agent-1");
        assert!(matches!(
            resolve_key(&store, "mab_two").await,
            Err(ArenaError::Unauthenticated)
        ));
    }
}
