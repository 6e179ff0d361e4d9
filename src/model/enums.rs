use serde::de::{Error as DeError, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Tag describing which evaluation concern applies to a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum EvaluationMode {
    /// The flag is switched off.
    Disabled = 0,
    /// The flag is switched on.
    Enabled = 1,
    /// The flag follows its [`crate::ActivationSchedule`].
    Scheduled = 2,
    /// The flag follows its [`crate::OperationalWindow`].
    TimeWindow = 3,
    /// The flag is decided by its targeting rules.
    UserTargeted = 4,
    /// The flag is rolled out to a percentage of users.
    UserRolloutPercentage = 5,
    /// The flag is rolled out to a percentage of tenants.
    TenantRolloutPercentage = 6,
    /// The flag is limited to specific tenants.
    TenantTargeted = 7,
}

impl EvaluationMode {
    /// Alias of [`EvaluationMode::UserTargeted`].
    pub const TARGETING_RULES: EvaluationMode = EvaluationMode::UserTargeted;

    pub(crate) const ALL: [EvaluationMode; 8] = [
        EvaluationMode::Disabled,
        EvaluationMode::Enabled,
        EvaluationMode::Scheduled,
        EvaluationMode::TimeWindow,
        EvaluationMode::UserTargeted,
        EvaluationMode::UserRolloutPercentage,
        EvaluationMode::TenantRolloutPercentage,
        EvaluationMode::TenantTargeted,
    ];
}

impl Display for EvaluationMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluationMode::Disabled => f.write_str("Disabled"),
            EvaluationMode::Enabled => f.write_str("Enabled"),
            EvaluationMode::Scheduled => f.write_str("Scheduled"),
            EvaluationMode::TimeWindow => f.write_str("TimeWindow"),
            EvaluationMode::UserTargeted => f.write_str("UserTargeted"),
            EvaluationMode::UserRolloutPercentage => f.write_str("UserRolloutPercentage"),
            EvaluationMode::TenantRolloutPercentage => f.write_str("TenantRolloutPercentage"),
            EvaluationMode::TenantTargeted => f.write_str("TenantTargeted"),
        }
    }
}

/// Targeting rule comparison operator.
///
/// Deserializes from its numeric code or its name. Anything unrecognized becomes
/// [`TargetingOperator::Unknown`], which never matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetingOperator {
    /// The attribute equals one of the values (case-insensitive).
    Equals,
    /// The attribute equals none of the values (case-insensitive).
    NotEquals,
    /// The attribute contains one of the values as a substring (case-insensitive).
    Contains,
    /// The attribute contains none of the values as a substring (case-insensitive).
    NotContains,
    /// Same as [`TargetingOperator::Equals`] over a value list.
    In,
    /// Same as [`TargetingOperator::NotEquals`] over a value list.
    NotIn,
    /// The attribute, as a number, is greater than one of the values.
    GreaterThan,
    /// The attribute, as a number, is less than one of the values.
    LessThan,
    /// An operator this version does not know.
    Unknown,
}

impl TargetingOperator {
    const NAMES: [(TargetingOperator, &'static str); 8] = [
        (TargetingOperator::Equals, "Equals"),
        (TargetingOperator::NotEquals, "NotEquals"),
        (TargetingOperator::Contains, "Contains"),
        (TargetingOperator::NotContains, "NotContains"),
        (TargetingOperator::In, "In"),
        (TargetingOperator::NotIn, "NotIn"),
        (TargetingOperator::GreaterThan, "GreaterThan"),
        (TargetingOperator::LessThan, "LessThan"),
    ];

    /// Maps a numeric operator code to the operator.
    pub fn from_code(code: u64) -> Self {
        Self::NAMES
            .get(code as usize)
            .map(|(op, _)| *op)
            .unwrap_or(TargetingOperator::Unknown)
    }

    /// The numeric code of the operator. [`None`] for unknown operators.
    pub fn code(&self) -> Option<u8> {
        Self::NAMES
            .iter()
            .position(|(op, _)| op == self)
            .map(|pos| pos as u8)
    }

    pub(crate) fn is_negated(&self) -> bool {
        matches!(
            self,
            TargetingOperator::NotEquals | TargetingOperator::NotContains | TargetingOperator::NotIn
        )
    }
}

impl FromStr for TargetingOperator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::NAMES
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s.trim()))
            .map(|(op, _)| *op)
            .unwrap_or(TargetingOperator::Unknown))
    }
}

impl Display for TargetingOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match Self::NAMES.iter().find(|(op, _)| op == self) {
            Some((_, name)) => f.write_str(name),
            None => f.write_str("Unknown"),
        }
    }
}

impl Serialize for TargetingOperator {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.code() {
            Some(code) => serializer.serialize_u8(code),
            None => serializer.serialize_str("Unknown"),
        }
    }
}

struct OperatorVisitor;

impl Visitor<'_> for OperatorVisitor {
    type Value = TargetingOperator;

    fn expecting(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str("an operator code or name")
    }

    fn visit_u64<E: DeError>(self, v: u64) -> Result<Self::Value, E> {
        Ok(TargetingOperator::from_code(v))
    }

    fn visit_i64<E: DeError>(self, v: i64) -> Result<Self::Value, E> {
        if v < 0 {
            return Ok(TargetingOperator::Unknown);
        }
        Ok(TargetingOperator::from_code(v as u64))
    }

    fn visit_str<E: DeError>(self, v: &str) -> Result<Self::Value, E> {
        Ok(TargetingOperator::from_str(v).unwrap_or(TargetingOperator::Unknown))
    }
}

impl<'de> Deserialize<'de> for TargetingOperator {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(OperatorVisitor)
    }
}

/// The evaluators known by the [`crate::EvaluationManager`], in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EvaluatorType {
    /// Enable/disable dates.
    ActivationSchedule,
    /// Daily time window.
    OperationalWindow,
    /// Targeting rules.
    CustomTargeting,
    /// Tenant access control and rollout.
    TenantRollout,
    /// User access control and rollout.
    UserRollout,
    /// Plain enabled/disabled state.
    TerminalState,
}

impl EvaluatorType {
    /// Every evaluator type, in priority order.
    pub const ALL: [EvaluatorType; 6] = [
        EvaluatorType::ActivationSchedule,
        EvaluatorType::OperationalWindow,
        EvaluatorType::CustomTargeting,
        EvaluatorType::TenantRollout,
        EvaluatorType::UserRollout,
        EvaluatorType::TerminalState,
    ];
}

impl Display for EvaluatorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluatorType::ActivationSchedule => f.write_str("ActivationSchedule"),
            EvaluatorType::OperationalWindow => f.write_str("OperationalWindow"),
            EvaluatorType::CustomTargeting => f.write_str("CustomTargeting"),
            EvaluatorType::TenantRollout => f.write_str("TenantRollout"),
            EvaluatorType::UserRollout => f.write_str("UserRollout"),
            EvaluatorType::TerminalState => f.write_str("TerminalState"),
        }
    }
}
