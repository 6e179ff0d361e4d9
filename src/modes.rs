use crate::model::enums::EvaluationMode;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The set of [`EvaluationMode`]s configured on a flag.
///
/// Modes combine freely; which evaluator processes a flag is decided by the
/// [`crate::EvaluationManager`] from the modes present in this set.
///
/// # Examples
///
/// ```rust
/// use flagcore::{EvaluationMode, EvaluationModes};
///
/// let modes = EvaluationModes::from([EvaluationMode::Enabled, EvaluationMode::TimeWindow]);
/// assert!(modes.contains(EvaluationMode::TimeWindow));
/// assert!(!modes.contains(EvaluationMode::Disabled));
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<EvaluationMode>", into = "Vec<EvaluationMode>")]
pub struct EvaluationModes {
    bits: u16,
}

impl EvaluationModes {
    /// Creates an empty set. A flag without modes evaluates as disabled.
    pub fn new() -> Self {
        Self { bits: 0 }
    }

    /// Adds `mode` to the set.
    pub fn insert(&mut self, mode: EvaluationMode) {
        self.bits |= Self::bit(mode);
    }

    /// Removes `mode` from the set.
    pub fn remove(&mut self, mode: EvaluationMode) {
        self.bits &= !Self::bit(mode);
    }

    /// Returns a copy of the set with `mode` added.
    pub fn with(mut self, mode: EvaluationMode) -> Self {
        self.insert(mode);
        self
    }

    /// Returns `true` when `mode` is in the set.
    pub fn contains(&self, mode: EvaluationMode) -> bool {
        self.bits & Self::bit(mode) != 0
    }

    /// Returns `true` when at least one of `modes` is in the set.
    pub fn contains_any(&self, modes: &[EvaluationMode]) -> bool {
        modes.iter().any(|mode| self.contains(*mode))
    }

    /// Returns `true` when no mode is set.
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// The number of modes in the set.
    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Iterates the modes in ascending code order.
    pub fn iter(&self) -> impl Iterator<Item = EvaluationMode> + '_ {
        EvaluationMode::ALL
            .iter()
            .copied()
            .filter(move |mode| self.contains(*mode))
    }

    fn bit(mode: EvaluationMode) -> u16 {
        1 << (mode as u8)
    }
}

impl FromIterator<EvaluationMode> for EvaluationModes {
    fn from_iter<I: IntoIterator<Item = EvaluationMode>>(iter: I) -> Self {
        let mut modes = Self::new();
        for mode in iter {
            modes.insert(mode);
        }
        modes
    }
}

impl From<Vec<EvaluationMode>> for EvaluationModes {
    fn from(value: Vec<EvaluationMode>) -> Self {
        value.into_iter().collect()
    }
}

impl<const N: usize> From<[EvaluationMode; N]> for EvaluationModes {
    fn from(value: [EvaluationMode; N]) -> Self {
        value.into_iter().collect()
    }
}

impl From<EvaluationModes> for Vec<EvaluationMode> {
    fn from(value: EvaluationModes) -> Self {
        value.iter().collect()
    }
}

impl Display for EvaluationModes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names = self
            .iter()
            .map(|mode| format!("{mode}"))
            .collect::<Vec<String>>()
            .join(", ");
        write!(f, "[{names}]")
    }
}

impl std::fmt::Debug for EvaluationModes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
