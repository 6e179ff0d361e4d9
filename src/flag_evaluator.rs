use crate::builder::{FlagEvaluatorBuilder, Options};
use crate::errors::{ErrorKind, FlagError, StoreError};
use crate::eval::result::EvaluationResult;
use crate::value::coerce_variation;
use crate::{EvaluationContext, FeatureFlag, FlagRepository};
use chrono::Utc;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use std::any::type_name;
use std::future::Future;
use std::sync::Arc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// The main component for evaluating feature flags.
///
/// Flags are looked up cache-aside (cache first, then the repository). A key that is
/// unknown to both is auto-created as a disabled flag, so evaluating a flag before it
/// is configured is never an error.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use flagcore::{EvaluationContext, FlagEvaluator, FlagRepository};
/// use tokio_util::sync::CancellationToken;
///
/// async fn handler(repository: Arc<dyn FlagRepository>) {
///     let evaluator = FlagEvaluator::new(repository).unwrap();
///
///     let context = EvaluationContext::new().user_id("user-1").tenant_id("acme");
///     let token = CancellationToken::new();
///     let enabled = evaluator.is_enabled("new-checkout", &context, &token).await.unwrap();
/// }
/// ```
pub struct FlagEvaluator {
    options: Arc<Options>,
}

impl FlagEvaluator {
    pub(crate) fn with_options(options: Options) -> Self {
        Self {
            options: Arc::new(options),
        }
    }

    /// Creates a new [`FlagEvaluatorBuilder`] used to build a [`FlagEvaluator`].
    pub fn builder(repository: Arc<dyn FlagRepository>) -> FlagEvaluatorBuilder {
        FlagEvaluatorBuilder::new(repository)
    }

    /// Creates a new [`FlagEvaluator`] with default options and no cache.
    pub fn new(repository: Arc<dyn FlagRepository>) -> Result<Self, FlagError> {
        FlagEvaluatorBuilder::new(repository).build()
    }

    /// Evaluates the flag identified by `key` for `context`.
    ///
    /// # Errors
    ///
    /// This method fails when `token` is cancelled (or a collaborator call times out),
    /// when the repository cannot be read, and when the flag is misconfigured (a
    /// scheduled flag without enable date, or a mode set no evaluator accepts).
    /// Data-quality problems such as an unknown timezone produce a disabled result
    /// instead.
    pub async fn evaluate(
        &self,
        key: &str,
        context: &EvaluationContext,
        token: &CancellationToken,
    ) -> Result<EvaluationResult, FlagError> {
        let flag = self.resolve_flag(key, token).await?;
        self.options.manager().evaluate(&flag, context)
    }

    /// Shorthand for `evaluate(..).is_enabled`.
    pub async fn is_enabled(
        &self,
        key: &str,
        context: &EvaluationContext,
        token: &CancellationToken,
    ) -> Result<bool, FlagError> {
        Ok(self.evaluate(key, context, token).await?.is_enabled)
    }

    /// Evaluates the flag and converts the served variation's value to `T`.
    ///
    /// Returns `default` when the flag is disabled, when the served variation has no
    /// value, or when the value cannot be converted to `T`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use flagcore::{EvaluationContext, FlagEvaluator};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// async fn page_size(evaluator: &FlagEvaluator) -> i64 {
    ///     let context = EvaluationContext::new().user_id("user-1");
    ///     evaluator
    ///         .get_variation("page-size", 20, &context, &CancellationToken::new())
    ///         .await
    ///         .unwrap_or(20)
    /// }
    /// ```
    pub async fn get_variation<T: DeserializeOwned>(
        &self,
        key: &str,
        default: T,
        context: &EvaluationContext,
        token: &CancellationToken,
    ) -> Result<T, FlagError> {
        let flag = self.resolve_flag(key, token).await?;
        let result = self.options.manager().evaluate(&flag, context)?;
        if !result.is_enabled {
            return Ok(default);
        }
        let value = if let Some(value) = flag.variations.get(&result.variation) {
            value
        } else {
            warn!(
                event_id = 2300;
                "Flag '{key}' served the variation '{}' which has no value. Returning the default value.",
                result.variation
            );
            return Ok(default);
        };
        match coerce_variation::<T>(value) {
            Some(val) => Ok(val),
            None => {
                warn!(
                    event_id = 2301;
                    "The value '{value}' of variation '{}' of flag '{key}' cannot be converted to '{}'. Returning the default value.",
                    result.variation,
                    type_name::<T>()
                );
                Ok(default)
            }
        }
    }

    /// Drops the cached copy of the flag identified by `key`.
    pub async fn invalidate(&self, key: &str, token: &CancellationToken) -> Result<(), FlagError> {
        self.guard("cache remove", token, self.options.cache().remove(key, token))
            .await?
            .map_err(|err| Self::store_failure(ErrorKind::CacheFailure, "cache remove", err))
    }

    /// Drops every cached flag.
    pub async fn clear_cache(&self, token: &CancellationToken) -> Result<(), FlagError> {
        self.guard("cache clear", token, self.options.cache().clear(token))
            .await?
            .map_err(|err| Self::store_failure(ErrorKind::CacheFailure, "cache clear", err))
    }

    async fn resolve_flag(
        &self,
        key: &str,
        token: &CancellationToken,
    ) -> Result<Arc<FeatureFlag>, FlagError> {
        if token.is_cancelled() {
            return Err(FlagError::cancelled("evaluate"));
        }
        let flag = self.lookup_flag(key, token).await?;
        if flag.is_expired(Utc::now()) {
            warn!(
                event_id = 2200;
                "Flag '{key}' has passed its expiration date and should be cleaned up."
            );
        }
        Ok(flag)
    }

    async fn lookup_flag(
        &self,
        key: &str,
        token: &CancellationToken,
    ) -> Result<Arc<FeatureFlag>, FlagError> {
        match self
            .guard("cache get", token, self.options.cache().get(key, token))
            .await?
        {
            Ok(Some(flag)) => return Ok(flag),
            Ok(None) => {}
            Err(err) => {
                warn!(
                    event_id = ErrorKind::CacheFailure.as_code();
                    "Reading flag '{key}' from the cache failed ({err}). Falling back to the repository."
                );
            }
        }

        let stored = self
            .guard("repository get", token, self.options.repository().get(key, token))
            .await?
            .map_err(|err| {
                Self::store_failure(ErrorKind::RepositoryFailure, "repository get", err)
            })?;

        if let Some(stored) = stored {
            let flag = Arc::new(stored);
            self.populate_cache(key, &flag, token).await?;
            return Ok(flag);
        }

        self.auto_create(key, token).await
    }

    async fn auto_create(
        &self,
        key: &str,
        token: &CancellationToken,
    ) -> Result<Arc<FeatureFlag>, FlagError> {
        info!("Flag '{key}' does not exist. Creating it as a disabled flag.");
        let default = FeatureFlag::auto_created(key, Utc::now());
        let create = self.options.repository().create(&default, token);
        match self.guard("repository create", token, create).await? {
            Ok(stored) => {
                let flag = Arc::new(stored);
                self.populate_cache(key, &flag, token).await?;
                Ok(flag)
            }
            Err(StoreError::AlreadyExists(_)) => {
                debug!("Flag '{key}' was created concurrently by another caller.");
                let reread = self
                    .guard("repository get", token, self.options.repository().get(key, token))
                    .await?
                    .map_err(|err| {
                        Self::store_failure(ErrorKind::RepositoryFailure, "repository get", err)
                    })?;
                match reread {
                    Some(stored) => {
                        let flag = Arc::new(stored);
                        self.populate_cache(key, &flag, token).await?;
                        Ok(flag)
                    }
                    None => Ok(Arc::new(default)),
                }
            }
            Err(err) => {
                warn!(
                    event_id = ErrorKind::RepositoryFailure.as_code();
                    "Persisting the auto-created flag '{key}' failed ({err}). Evaluating the in-memory default."
                );
                Ok(Arc::new(default))
            }
        }
    }

    async fn populate_cache(
        &self,
        key: &str,
        flag: &Arc<FeatureFlag>,
        token: &CancellationToken,
    ) -> Result<(), FlagError> {
        let set = self.options.cache().set(
            key,
            Arc::clone(flag),
            self.options.cache_ttl(),
            token,
        );
        if let Err(err) = self.guard("cache set", token, set).await? {
            warn!(
                event_id = ErrorKind::CacheFailure.as_code();
                "Caching flag '{key}' failed ({err})."
            );
        }
        Ok(())
    }

    /// Races a collaborator call against the cancellation token and the configured
    /// timeout. The outer error is cancellation or timeout, the inner one any other
    /// store failure.
    async fn guard<T, F>(
        &self,
        operation: &str,
        token: &CancellationToken,
        call: F,
    ) -> Result<Result<T, StoreError>, FlagError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let guarded = async {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(FlagError::cancelled(operation)),
                result = call => match result {
                    Err(StoreError::Cancelled) => Err(FlagError::cancelled(operation)),
                    other => Ok(other),
                },
            }
        };
        match self.options.operation_timeout() {
            Some(limit) => match timeout(limit, guarded).await {
                Ok(result) => result,
                Err(_) => Err(FlagError::new(
                    ErrorKind::TimedOut,
                    format!(
                        "Operation '{operation}' timed out after {}ms.",
                        limit.as_millis()
                    ),
                )),
            },
            None => guarded.await,
        }
    }

    fn store_failure(kind: ErrorKind, operation: &str, err: StoreError) -> FlagError {
        let err = FlagError::new(kind, format!("Operation '{operation}' failed ({err})."));
        warn!(event_id = err.kind.as_code(); "{}", err);
        err
    }
}
