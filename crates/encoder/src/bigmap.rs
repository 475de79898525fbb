//! Lazy per-key access to on-chain big maps.
//!
//! A big map decodes to a [`BigMapHandle`] holding its on-chain id; its
//! contents are effectively unbounded and are never loaded in full. The
//! only read path is [`BigMapHandle::get`], which encodes the key, asks
//! the injected [`BigMapFetcher`] for that one entry, and decodes a hit
//! through the value token. Key absence is an `Ok(None)`, not an error.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use tzkit_micheline::Micheline;

use crate::bigint::BigInt;
use crate::error::{Path, SchemaError};
use crate::token::Token;
use crate::value::Value;

/// Errors from a fetcher backend (RPC failure, bad response, ...).
/// Key absence is not an error; backends signal it with `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fetch backend error: {0}")]
pub struct FetchError(pub String);

/// The injected capability that reads one big-map entry from the chain.
///
/// Implementations live in the RPC layer. Whether identical concurrent
/// fetches are deduplicated or cached is the implementation's policy;
/// this core issues one fetch per `get` and guarantees nothing more.
#[async_trait]
pub trait BigMapFetcher: Send + Sync {
    /// Fetch the raw value expression stored under `key_expr` in big
    /// map `big_map_id`, or `None` if the key is absent.
    async fn fetch(
        &self,
        big_map_id: &BigInt,
        key_expr: &Micheline,
    ) -> Result<Option<Micheline>, FetchError>;
}

/// A decoded big-map value: the on-chain id plus the key and value
/// tokens of the declaring type, bound to a fetcher.
///
/// Handles are created fresh on every decode, hold no cache and no
/// mutable state, and are safe to share across concurrent `get` calls.
#[derive(Clone)]
pub struct BigMapHandle {
    id: BigInt,
    key: Arc<Token>,
    value: Arc<Token>,
    fetcher: Arc<dyn BigMapFetcher>,
}

impl BigMapHandle {
    pub fn new(
        id: BigInt,
        key: Arc<Token>,
        value: Arc<Token>,
        fetcher: Arc<dyn BigMapFetcher>,
    ) -> BigMapHandle {
        BigMapHandle {
            id,
            key,
            value,
            fetcher,
        }
    }

    /// The on-chain big-map id.
    pub fn id(&self) -> &BigInt {
        &self.id
    }

    /// Look up one key. `Ok(None)` means the key is absent, which is a
    /// normal outcome; errors are type mismatches or backend failures.
    pub async fn get(&self, key: &Value) -> Result<Option<Value>, SchemaError> {
        let path = Path::root();
        let key_expr = self.key.encode_object(key, &path)?;
        let raw = self
            .fetcher
            .fetch(&self.id, &key_expr)
            .await
            .map_err(|e| SchemaError::Fetch {
                id: self.id.to_string(),
                message: e.to_string(),
            })?;
        match raw {
            Some(expr) => {
                let v = self.value.decode(&expr, &path, &self.fetcher)?;
                Ok(Some(v))
            }
            None => Ok(None),
        }
    }
}

impl fmt::Debug for BigMapHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigMapHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// A fetcher backed by a fixed set of entries, keyed by big-map id and
/// the wire JSON of the key expression. Misses return `Ok(None)`, so an
/// empty one doubles as the fetcher for schemas without big maps.
#[derive(Default)]
pub struct StaticFetcher {
    entries: Vec<(BigInt, serde_json::Value, Micheline)>,
}

impl StaticFetcher {
    pub fn empty() -> StaticFetcher {
        StaticFetcher::default()
    }

    /// Add one entry under the given id and key expression.
    pub fn with_entry(mut self, id: BigInt, key: Micheline, value: Micheline) -> StaticFetcher {
        self.entries.push((id, key.to_json(), value));
        self
    }
}

#[async_trait]
impl BigMapFetcher for StaticFetcher {
    async fn fetch(
        &self,
        big_map_id: &BigInt,
        key_expr: &Micheline,
    ) -> Result<Option<Micheline>, FetchError> {
        let wanted = key_expr.to_json();
        Ok(self
            .entries
            .iter()
            .find(|(id, key, _)| id == big_map_id && *key == wanted)
            .map(|(_, _, value)| value.clone()))
    }
}
