//! Feature flag evaluation engine.
//!
//! Decides, for a flag definition and a request-scoped [`EvaluationContext`], whether
//! the flag is on, which variation it serves and why. The [`FlagEvaluator`] is the
//! entry point: it loads flags cache-aside from a [`FlagRepository`] and a
//! [`FlagCache`], and hands them to the [`EvaluationManager`].

#![warn(missing_docs)]

#[macro_use]
mod macros;
mod builder;
mod cache;
mod constants;
mod context;
mod errors;
mod eval;
mod flag_evaluator;
mod model;
mod modes;
mod repository;
mod timezone;
mod utils;
mod value;

pub use builder::{FlagEvaluatorBuilder, Options};
pub use cache::{EmptyFlagCache, FlagCache};
pub use constants::PKG_VERSION;
pub use context::{AttributeValue, EvaluationContext};
pub use errors::{ErrorKind, FlagError, StoreError};
pub use eval::evaluators::{Evaluator, RolloutScope};
pub use eval::manager::EvaluationManager;
pub use eval::matcher::matches as rule_matches;
pub use eval::result::EvaluationResult;
pub use flag_evaluator::FlagEvaluator;
pub use repository::FlagRepository;

pub use model::enums::{EvaluationMode, EvaluatorType, TargetingOperator};
pub use model::flag::{
    AccessControl, ActivationSchedule, AuditEntry, AuditTrail, FeatureFlag, FlagVariations,
    OperationalWindow, RetentionPolicy, TargetingRule,
};
pub use modes::EvaluationModes;

pub use timezone::resolve_time_zone;
pub use utils::rollout_percentage;
pub use value::coerce_variation;
