use crate::errors::StoreError;
use crate::FeatureFlag;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// The authoritative store of flag definitions (usually a SQL table owned by the
/// management plane).
///
/// Keys are unique: a second [`FlagRepository::create`] for a stored key must either
/// succeed as a no-op or fail with [`StoreError::AlreadyExists`]. The evaluator
/// treats both as success. Implementations should stop and return
/// [`StoreError::Cancelled`] once `token` is cancelled.
#[async_trait]
pub trait FlagRepository: Sync + Send {
    /// Loads the flag identified by `key`.
    async fn get(
        &self,
        key: &str,
        token: &CancellationToken,
    ) -> Result<Option<FeatureFlag>, StoreError>;

    /// Persists a new flag and returns the stored record.
    async fn create(
        &self,
        flag: &FeatureFlag,
        token: &CancellationToken,
    ) -> Result<FeatureFlag, StoreError>;
}
