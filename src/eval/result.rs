use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The outcome of a flag evaluation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// Whether the flag is on for the evaluated context.
    pub is_enabled: bool,
    /// Name of the served variation.
    pub variation: String,
    /// Human readable explanation of the decision.
    pub reason: String,
}

impl EvaluationResult {
    pub(crate) fn enabled(variation: &str, reason: impl Into<String>) -> Self {
        Self {
            is_enabled: true,
            variation: variation.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn disabled(variation: &str, reason: impl Into<String>) -> Self {
        Self {
            is_enabled: false,
            variation: variation.to_owned(),
            reason: reason.into(),
        }
    }
}

impl Display for EvaluationResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = if self.is_enabled { "enabled" } else { "disabled" };
        write!(f, "{state} ('{}'): {}", self.variation, self.reason)
    }
}
