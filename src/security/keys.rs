//! API key generation, hashing and lookup.
//!
//! Keys are never stored in plain text: the store maps the lowercase hex
//! sha256 of a key to the client it belongs to.

use super::Tier;
use crate::config::ApiKeyEntry;
use rand::distributions::{Alphanumeric, DistString};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Length of the random part of a generated key.
const KEY_RANDOM_LEN: usize = 43;

/// Client owning an API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub name: String,
    pub tier: Tier,
    pub active: bool,
    /// Stable identifier used for rate limiting (the key hash).
    #[serde(skip)]
    pub key_id: String,
}

impl ClientInfo {
    /// Client used for unauthenticated requests when debug mode allows them.
    pub fn anonymous() -> Self {
        Self {
            name: "Web UI".to_string(),
            tier: Tier::Enterprise,
            active: true,
            key_id: "anonymous".to_string(),
        }
    }
}

/// A freshly generated key. The plain key is only available here.
#[derive(Debug, Clone)]
pub struct IssuedKey {
    pub api_key: String,
    pub key_sha256: String,
    pub name: String,
    pub tier: Tier,
}

/// Hash an API key for storage.
pub fn hash_api_key(api_key: &str) -> String {
    let digest = Sha256::digest(api_key.as_bytes());
    hex::encode(digest)
}

/// Generate a new API key of the form `{prefix}_{random}`.
pub fn generate_api_key(prefix: &str) -> String {
    let random_part = Alphanumeric.sample_string(&mut rand::thread_rng(), KEY_RANDOM_LEN);
    format!("{}_{}", prefix, random_part)
}

/// Strip an optional `Bearer ` scheme from an authorization header value.
pub fn strip_bearer(header_value: &str) -> &str {
    let value = header_value.trim();
    match value.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => value[7..].trim(),
        _ => value,
    }
}

/// In-memory API key store.
#[derive(Debug, Default)]
pub struct ApiKeyStore {
    keys: RwLock<HashMap<String, ClientInfo>>,
}

impl ApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from configured key entries.
    pub fn from_entries(entries: &[ApiKeyEntry]) -> Self {
        let mut keys = HashMap::new();
        for entry in entries {
            let hash = entry.key_sha256.trim().to_lowercase();
            if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                warn!("Skipping API key '{}': key_sha256 is not a sha256 hex digest", entry.name);
                continue;
            }
            let tier = entry.tier.parse().unwrap_or_else(|_| {
                warn!("Unknown tier '{}' for API key '{}', using free", entry.tier, entry.name);
                Tier::Free
            });
            keys.insert(
                hash.clone(),
                ClientInfo {
                    name: entry.name.clone(),
                    tier,
                    active: entry.active,
                    key_id: hash,
                },
            );
        }
        Self {
            keys: RwLock::new(keys),
        }
    }

    /// Create a new key, store its hash and return the plain key once.
    pub async fn create(&self, name: &str, tier: Tier) -> IssuedKey {
        let api_key = generate_api_key("ts");
        let key_sha256 = hash_api_key(&api_key);
        self.insert_hashed(&key_sha256, name, tier, true).await;
        IssuedKey {
            api_key,
            key_sha256,
            name: name.to_string(),
            tier,
        }
    }

    /// Store an already hashed key.
    pub async fn insert_hashed(&self, key_sha256: &str, name: &str, tier: Tier, active: bool) {
        let hash = key_sha256.to_lowercase();
        let client = ClientInfo {
            name: name.to_string(),
            tier,
            active,
            key_id: hash.clone(),
        };
        self.keys.write().await.insert(hash, client);
    }

    /// Validate an authorization header value and return the active client.
    pub async fn validate(&self, header_value: &str) -> Option<ClientInfo> {
        let api_key = strip_bearer(header_value);
        if api_key.is_empty() {
            return None;
        }

        let hash = hash_api_key(api_key);
        let keys = self.keys.read().await;
        match keys.get(&hash) {
            Some(client) if client.active => Some(client.clone()),
            Some(client) => {
                debug!("Rejected inactive API key for client {}", client.name);
                None
            }
            None => None,
        }
    }

    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }
}
