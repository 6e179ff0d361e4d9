use crate::errors::StoreError;
use crate::FeatureFlag;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A cache API used to make custom flag cache implementations (in-process maps, Redis, ...).
///
/// A miss is `Ok(None)`, never an error. Implementations should stop and return
/// [`StoreError::Cancelled`] once `token` is cancelled.
#[async_trait]
pub trait FlagCache: Sync + Send {
    /// Gets the cached flag identified by `key`.
    async fn get(
        &self,
        key: &str,
        token: &CancellationToken,
    ) -> Result<Option<Arc<FeatureFlag>>, StoreError>;

    /// Stores `flag` under `key`, optionally expiring after `ttl`.
    async fn set(
        &self,
        key: &str,
        flag: Arc<FeatureFlag>,
        ttl: Option<Duration>,
        token: &CancellationToken,
    ) -> Result<(), StoreError>;

    /// Removes the flag stored under `key`.
    async fn remove(&self, key: &str, token: &CancellationToken) -> Result<(), StoreError>;

    /// Removes every cached flag.
    async fn clear(&self, token: &CancellationToken) -> Result<(), StoreError>;
}

/// Cache used when none is configured: every read is a miss and writes are dropped.
#[derive(Default)]
pub struct EmptyFlagCache {}

impl EmptyFlagCache {
    /// Creates a new [`EmptyFlagCache`].
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl FlagCache for EmptyFlagCache {
    async fn get(
        &self,
        _: &str,
        _: &CancellationToken,
    ) -> Result<Option<Arc<FeatureFlag>>, StoreError> {
        Ok(None)
    }

    async fn set(
        &self,
        _: &str,
        _: Arc<FeatureFlag>,
        _: Option<Duration>,
        _: &CancellationToken,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn remove(&self, _: &str, _: &CancellationToken) -> Result<(), StoreError> {
        Ok(())
    }

    async fn clear(&self, _: &CancellationToken) -> Result<(), StoreError> {
        Ok(())
    }
}
