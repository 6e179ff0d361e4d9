use crate::cache::EmptyFlagCache;
use crate::errors::{ErrorKind, FlagError};
use crate::eval::manager::EvaluationManager;
use crate::{FlagCache, FlagEvaluator, FlagRepository};
use std::sync::Arc;
use std::time::Duration;

/// Configuration options of a [`FlagEvaluator`].
pub struct Options {
    repository: Arc<dyn FlagRepository>,
    cache: Arc<dyn FlagCache>,
    cache_ttl: Option<Duration>,
    operation_timeout: Option<Duration>,
    manager: EvaluationManager,
}

impl Options {
    /// Get the configured [`FlagRepository`].
    pub fn repository(&self) -> &dyn FlagRepository {
        self.repository.as_ref()
    }

    /// Get the configured [`FlagCache`].
    pub fn cache(&self) -> &dyn FlagCache {
        self.cache.as_ref()
    }

    /// Get the time-to-live of cached flags.
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl
    }

    /// Get the timeout applied to each cache and repository call.
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout
    }

    /// Get the [`EvaluationManager`] used to evaluate flags.
    pub fn manager(&self) -> &EvaluationManager {
        &self.manager
    }
}

/// Builder to create a [`FlagEvaluator`].
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use flagcore::{FlagEvaluator, FlagRepository};
///
/// fn build(repository: Arc<dyn FlagRepository>) -> FlagEvaluator {
///     FlagEvaluator::builder(repository)
///         .cache_ttl(Duration::from_secs(300))
///         .operation_timeout(Duration::from_secs(2))
///         .build()
///         .unwrap()
/// }
/// ```
pub struct FlagEvaluatorBuilder {
    repository: Arc<dyn FlagRepository>,
    cache: Option<Arc<dyn FlagCache>>,
    cache_ttl: Option<Duration>,
    operation_timeout: Option<Duration>,
    manager: Option<EvaluationManager>,
}

impl FlagEvaluatorBuilder {
    pub(crate) fn new(repository: Arc<dyn FlagRepository>) -> Self {
        Self {
            repository,
            cache: None,
            cache_ttl: None,
            operation_timeout: None,
            manager: None,
        }
    }

    /// Sets a [`FlagCache`] implementation consulted before the repository.
    /// Default is a cache that never holds anything.
    pub fn cache(mut self, cache: Arc<dyn FlagCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets how long flags stay in the cache. Default is no expiry.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Sets a timeout for each cache and repository call. Default is no timeout.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Replaces the [`EvaluationManager`]. Default has every evaluator registered.
    pub fn manager(mut self, manager: EvaluationManager) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Creates a [`FlagEvaluator`] from the configuration made on the builder.
    ///
    /// # Errors
    ///
    /// This method fails if the cache TTL or the operation timeout is zero.
    pub fn build(self) -> Result<FlagEvaluator, FlagError> {
        if self.cache_ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(FlagError::new(
                ErrorKind::InvalidOptions,
                "Cache TTL must be greater than zero".to_owned(),
            ));
        }
        if self.operation_timeout.is_some_and(|t| t.is_zero()) {
            return Err(FlagError::new(
                ErrorKind::InvalidOptions,
                "Operation timeout must be greater than zero".to_owned(),
            ));
        }
        Ok(FlagEvaluator::with_options(Options {
            repository: self.repository,
            cache: self.cache.unwrap_or_else(|| Arc::new(EmptyFlagCache::new())),
            cache_ttl: self.cache_ttl,
            operation_timeout: self.operation_timeout,
            manager: self.manager.unwrap_or_default(),
        }))
    }
}
