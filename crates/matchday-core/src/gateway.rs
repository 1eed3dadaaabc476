//! Cache-first fetch with provider fallback.
//!
//! One logical data request: cache lookup, then on a miss
//! [`ProviderSelector::execute_with_fallback`], then storing the winning value with the
//! caller's TTL, tags and priority.

use crate::{
    cache::{EntryOptions, ResponseCache},
    provider::{FallbackOutcome, ProviderError, ProviderSelector, SelectorError},
};
use serde::Serialize;
use serde_json::Value;
use std::{future::Future, sync::Arc};
use tracing::debug;

/// Where a fetched value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "provider", rename_all = "snake_case")]
pub enum FetchSource {
    Cache,
    Provider(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchOutcome {
    pub value: Value,
    pub source: FetchSource,
}

/// Result of [`DataGateway::fetch`].
#[derive(Debug)]
pub enum FetchResult {
    Found(FetchOutcome),
    /// The value was not cached and no provider could serve it.
    Unavailable(FallbackOutcome<Value>),
}

impl FetchResult {
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Found(outcome) => Some(&outcome.value),
            Self::Unavailable(_) => None,
        }
    }

    pub fn into_outcome(self) -> Option<FetchOutcome> {
        match self {
            Self::Found(outcome) => Some(outcome),
            Self::Unavailable(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct DataGateway {
    cache: Arc<ResponseCache>,
    selector: Arc<ProviderSelector>,
}

impl DataGateway {
    #[must_use]
    pub fn new(cache: Arc<ResponseCache>, selector: Arc<ProviderSelector>) -> Self {
        Self { cache, selector }
    }

    /// Returns the cached value for `key`, or fetches it through the providers and caches
    /// it with `options`.
    ///
    /// # Errors
    ///
    /// Propagates configuration errors from the selector, e.g. no providers registered.
    pub async fn fetch<F, Fut>(
        &self,
        key: &str,
        options: EntryOptions,
        operation_fn: F,
    ) -> Result<FetchResult, SelectorError>
    where
        F: FnMut(Arc<str>) -> Fut,
        Fut: Future<Output = Result<Value, ProviderError>>,
    {
        if let Some(value) = self.cache.get(key) {
            debug!(key = %key, "served from cache");
            return Ok(FetchResult::Found(FetchOutcome { value, source: FetchSource::Cache }));
        }

        match self.selector.execute_with_fallback(key, operation_fn).await? {
            FallbackOutcome::Success { value, provider, .. } => {
                self.cache.set(key, value.clone(), options);
                debug!(key = %key, provider = %provider, "fetched and cached");
                Ok(FetchResult::Found(FetchOutcome { value, source: FetchSource::Provider(provider) }))
            }
            unavailable => Ok(FetchResult::Unavailable(unavailable)),
        }
    }
}
