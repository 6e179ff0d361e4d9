use crate::errors::{ErrorKind, FlagError};
use crate::eval::evaluators::Evaluator;
use crate::eval::result::EvaluationResult;
use crate::{EvaluationContext, EvaluatorType, FeatureFlag};
use log::{debug, error};

/// Selects the evaluator responsible for a flag and delegates the evaluation to it.
///
/// Evaluators are kept in a fixed priority order:
/// ActivationSchedule, OperationalWindow, CustomTargeting, TenantRollout, UserRollout,
/// TerminalState. Exactly one evaluator runs per evaluation: the first one that can
/// process the flag.
///
/// # Examples
///
/// ```rust
/// use flagcore::{EvaluationContext, EvaluationManager, EvaluationMode, FeatureFlag};
///
/// let manager = EvaluationManager::default();
/// let flag = FeatureFlag::new("f1").with_modes([EvaluationMode::Enabled]);
///
/// let result = manager.evaluate(&flag, &EvaluationContext::new()).unwrap();
/// assert!(result.is_enabled);
/// assert_eq!(result.reason, "Feature flag 'f1' is explicitly enabled");
/// ```
#[derive(Debug, Clone)]
pub struct EvaluationManager {
    evaluators: Vec<Evaluator>,
}

impl EvaluationManager {
    /// Creates a manager from the given evaluator types. Order and duplicates in
    /// `types` do not matter.
    pub fn new(types: &[EvaluatorType]) -> Self {
        let mut types = types.to_vec();
        types.sort();
        types.dedup();
        Self {
            evaluators: types.into_iter().map(Evaluator::from).collect(),
        }
    }

    /// The registered evaluators in the order they are consulted.
    pub fn evaluator_types(&self) -> Vec<EvaluatorType> {
        self.evaluators.iter().map(|e| e.evaluator_type()).collect()
    }

    /// Evaluates `flag` for `context`.
    ///
    /// # Errors
    ///
    /// This method fails when no evaluator accepts the flag, or when the selected
    /// evaluator finds the flag misconfigured (e.g. a schedule without enable date).
    pub fn evaluate(
        &self,
        flag: &FeatureFlag,
        context: &EvaluationContext,
    ) -> Result<EvaluationResult, FlagError> {
        let evaluator = if let Some(evaluator) = self
            .evaluators
            .iter()
            .find(|e| e.can_process(flag, context))
        {
            evaluator
        } else {
            let err = FlagError::new(
                ErrorKind::NoEvaluator,
                format!(
                    "No evaluator can process flag '{}' with modes {}.",
                    flag.key, flag.evaluation_modes
                ),
            );
            error!(event_id = err.kind.as_code(); "{}", err);
            return Err(err);
        };
        debug!("Evaluating flag '{}' with the {} evaluator.", flag.key, evaluator.evaluator_type());
        match evaluator.process(flag, context) {
            Ok(result) => {
                debug!("Flag '{}' evaluated to {result}.", flag.key);
                Ok(result)
            }
            Err(err) => {
                error!(event_id = err.kind.as_code(); "{}", err);
                Err(err)
            }
        }
    }
}

impl Default for EvaluationManager {
    fn default() -> Self {
        Self::new(&EvaluatorType::ALL)
    }
}
