use crate::constants::{SYSTEM_ACTOR, VARIATION_OFF, VARIATION_ON};
use crate::model::enums::{EvaluationMode, TargetingOperator};
use crate::modes::EvaluationModes;
use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Describes a feature flag.
///
/// Flags are produced by the management plane (or auto-created on first evaluation)
/// and only read by the evaluation core.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlag {
    /// Unique key of the flag.
    pub key: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Free text description.
    #[serde(default)]
    pub description: String,
    /// The modes that decide which evaluator processes the flag.
    #[serde(default)]
    pub evaluation_modes: EvaluationModes,
    /// Used by [`EvaluationMode::Scheduled`].
    #[serde(default)]
    pub schedule: ActivationSchedule,
    /// Used by [`EvaluationMode::TimeWindow`].
    #[serde(default)]
    pub operational_window: OperationalWindow,
    /// Targeting rules, evaluated in order. The first match wins.
    #[serde(default)]
    pub targeting_rules: Vec<TargetingRule>,
    /// Lists and rollout percentage applied to user ids.
    #[serde(default)]
    pub user_access_control: AccessControl,
    /// Lists and rollout percentage applied to tenant ids.
    #[serde(default)]
    pub tenant_access_control: AccessControl,
    /// The values the flag serves.
    #[serde(default)]
    pub variations: FlagVariations,
    /// Free-form labels.
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Lifecycle metadata.
    #[serde(default)]
    pub retention: RetentionPolicy,
    /// Creation and last modification.
    #[serde(default)]
    pub audit: AuditTrail,
}

impl FeatureFlag {
    /// Creates a disabled flag with an `on`/`off` variation pair and `off` as default.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flagcore::{EvaluationMode, FeatureFlag};
    ///
    /// let flag = FeatureFlag::new("new-checkout");
    /// assert!(flag.evaluation_modes.contains(EvaluationMode::Disabled));
    /// assert_eq!(flag.variations.default_variation, "off");
    /// ```
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_owned(),
            name: key.to_owned(),
            description: String::default(),
            evaluation_modes: EvaluationModes::from([EvaluationMode::Disabled]),
            schedule: ActivationSchedule::default(),
            operational_window: OperationalWindow::default(),
            targeting_rules: Vec::new(),
            user_access_control: AccessControl::default(),
            tenant_access_control: AccessControl::default(),
            variations: FlagVariations::default(),
            tags: HashMap::new(),
            retention: RetentionPolicy::default(),
            audit: AuditTrail::default(),
        }
    }

    /// The flag created when an unknown key is evaluated for the first time.
    pub fn auto_created(key: &str, now: DateTime<Utc>) -> Self {
        Self {
            description: format!("Auto-created flag for {key}"),
            audit: AuditTrail::created_by(SYSTEM_ACTOR, now),
            ..Self::new(key)
        }
    }

    /// Replaces the evaluation modes of the flag.
    pub fn with_modes<M: Into<EvaluationModes>>(mut self, modes: M) -> Self {
        self.evaluation_modes = modes.into();
        self
    }

    /// Returns `true` when the flag is not permanent and its expiration date has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.retention.is_permanent {
            return false;
        }
        match self.retention.expiration_date {
            Some(expiration) => now >= expiration,
            None => false,
        }
    }
}

/// Enable and disable instants of a scheduled flag.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivationSchedule {
    /// The flag is off before this instant.
    #[serde(default)]
    pub enable_date: Option<DateTime<Utc>>,
    /// The flag is off from this instant on. [`None`] keeps it on.
    #[serde(default)]
    pub disable_date: Option<DateTime<Utc>>,
}

impl ActivationSchedule {
    /// Creates a schedule starting at `enable_date`.
    pub fn new(enable_date: DateTime<Utc>, disable_date: Option<DateTime<Utc>>) -> Self {
        Self {
            enable_date: Some(enable_date),
            disable_date,
        }
    }

    /// Returns `true` when no date is configured at all.
    pub fn is_unscheduled(&self) -> bool {
        self.enable_date.is_none() && self.disable_date.is_none()
    }
}

/// Daily time window during which a flag is on.
///
/// A window whose start is later than its end crosses midnight. An empty
/// `days_active` list does not restrict the days.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationalWindow {
    /// Opening time of day (inclusive).
    pub start_time: NaiveTime,
    /// Closing time of day (inclusive).
    pub end_time: NaiveTime,
    /// IANA or Windows timezone identifier.
    #[serde(default = "utc_zone")]
    pub time_zone: String,
    /// The weekdays the window opens on.
    #[serde(default)]
    pub days_active: Vec<Weekday>,
}

fn utc_zone() -> String {
    "UTC".to_owned()
}

impl OperationalWindow {
    /// Creates a window open every day between `start_time` and `end_time`.
    pub fn new(start_time: NaiveTime, end_time: NaiveTime, time_zone: &str) -> Self {
        Self {
            start_time,
            end_time,
            time_zone: time_zone.to_owned(),
            days_active: Vec::new(),
        }
    }

    /// The window that never closes.
    pub fn always_open() -> Self {
        Self {
            start_time: NaiveTime::MIN,
            end_time: Self::end_of_day(),
            time_zone: utc_zone(),
            days_active: Self::ALL_DAYS.to_vec(),
        }
    }

    /// Restricts the window to the given days.
    pub fn with_days<I: IntoIterator<Item = Weekday>>(mut self, days: I) -> Self {
        self.days_active = days.into_iter().collect();
        self
    }

    /// Returns `true` for the all-day, every-day window.
    pub fn is_always_open(&self) -> bool {
        self.start_time == NaiveTime::MIN
            && self.end_time == Self::end_of_day()
            && !self.restricts_days()
    }

    /// Returns `true` when some weekdays are excluded.
    pub fn restricts_days(&self) -> bool {
        !self.days_active.is_empty()
            && !Self::ALL_DAYS.iter().all(|d| self.days_active.contains(d))
    }

    pub(crate) fn allows_day(&self, day: Weekday) -> bool {
        !self.restricts_days() || self.days_active.contains(&day)
    }

    /// Inclusive on both ends; handles windows crossing midnight.
    pub(crate) fn contains_time(&self, time: NaiveTime) -> bool {
        if self.start_time <= self.end_time {
            self.start_time <= time && time <= self.end_time
        } else {
            time >= self.start_time || time <= self.end_time
        }
    }

    fn end_of_day() -> NaiveTime {
        NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
    }

    const ALL_DAYS: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];
}

impl Default for OperationalWindow {
    fn default() -> Self {
        Self::always_open()
    }
}

/// Describes a targeting rule.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetingRule {
    /// The context attribute the rule is based on.
    pub attribute: String,
    /// How the attribute is compared to the values.
    pub operator: TargetingOperator,
    /// Comparison values. The rule matches when any of them matches.
    #[serde(default)]
    pub values: Vec<String>,
    /// The variation served when the rule matches.
    pub variation: String,
}

impl TargetingRule {
    /// Creates a new [`TargetingRule`].
    pub fn new(
        attribute: &str,
        operator: TargetingOperator,
        values: &[&str],
        variation: &str,
    ) -> Self {
        Self {
            attribute: attribute.to_owned(),
            operator,
            values: values.iter().map(|v| v.to_string()).collect(),
            variation: variation.to_owned(),
        }
    }
}

impl Display for TargetingRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.attribute,
            self.operator,
            self.values.join(", ")
        )
    }
}

/// Allow list, block list and rollout percentage for users or tenants.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessControl {
    /// Identifiers that always get the flag.
    #[serde(default)]
    pub allowed: Vec<String>,
    /// Identifiers that never get the flag. Wins over `allowed`.
    #[serde(default)]
    pub blocked: Vec<String>,
    /// A number between 0 and 100. Values above 100 count as 100.
    #[serde(default = "full_rollout")]
    pub rollout_percentage: u8,
}

fn full_rollout() -> u8 {
    100
}

impl AccessControl {
    /// Creates access control with lists and a rollout percentage.
    pub fn new(allowed: &[&str], blocked: &[&str], rollout_percentage: u8) -> Self {
        Self {
            allowed: allowed.iter().map(|v| v.to_string()).collect(),
            blocked: blocked.iter().map(|v| v.to_string()).collect(),
            rollout_percentage,
        }
    }

    /// Access control that only restricts by percentage.
    pub fn rollout(rollout_percentage: u8) -> Self {
        Self::new(&[], &[], rollout_percentage)
    }

    /// Returns `true` when any list is set or the rollout is below 100%.
    pub fn has_access_restrictions(&self) -> bool {
        !self.allowed.is_empty() || !self.blocked.is_empty() || self.percentage() < 100
    }

    /// The rollout percentage, capped at 100.
    pub fn percentage(&self) -> u8 {
        self.rollout_percentage.min(100)
    }

    pub(crate) fn is_blocked(&self, id: &str) -> bool {
        Self::list_contains(&self.blocked, id)
    }

    pub(crate) fn is_allowed(&self, id: &str) -> bool {
        Self::list_contains(&self.allowed, id)
    }

    fn list_contains(list: &[String], id: &str) -> bool {
        let id = id.trim();
        list.iter().any(|item| item.trim().eq_ignore_ascii_case(id))
    }
}

impl Default for AccessControl {
    fn default() -> Self {
        Self::rollout(100)
    }
}

/// The values a flag can serve, keyed by variation name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlagVariations {
    /// Variation name to value.
    #[serde(default)]
    pub values: HashMap<String, serde_json::Value>,
    /// The variation served while the flag is off.
    #[serde(default = "off_variation")]
    pub default_variation: String,
}

fn off_variation() -> String {
    VARIATION_OFF.to_owned()
}

impl FlagVariations {
    /// Creates variations with the given default.
    pub fn new(values: HashMap<String, serde_json::Value>, default_variation: &str) -> Self {
        Self {
            values,
            default_variation: default_variation.to_owned(),
        }
    }

    /// The value of a variation.
    pub fn get(&self, variation: &str) -> Option<&serde_json::Value> {
        self.values.get(variation)
    }
}

impl Default for FlagVariations {
    fn default() -> Self {
        Self {
            values: HashMap::from([
                (VARIATION_ON.to_owned(), serde_json::Value::Bool(true)),
                (VARIATION_OFF.to_owned(), serde_json::Value::Bool(false)),
            ]),
            default_variation: off_variation(),
        }
    }
}

/// Lifecycle metadata of a flag.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    /// Permanent flags never expire.
    #[serde(default)]
    pub is_permanent: bool,
    /// The flag should be cleaned up after this instant.
    #[serde(default)]
    pub expiration_date: Option<DateTime<Utc>>,
}

/// Who changed a flag, and when.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Who made the change.
    pub actor: String,
    /// When the change was made.
    pub timestamp: DateTime<Utc>,
}

/// Audit information of a flag.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditTrail {
    /// The creation of the flag.
    #[serde(default)]
    pub created: Option<AuditEntry>,
    /// The latest change of the flag.
    #[serde(default)]
    pub last_modified: Option<AuditEntry>,
}

impl AuditTrail {
    /// A trail with only a creation entry.
    pub fn created_by(actor: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            created: Some(AuditEntry {
                actor: actor.to_owned(),
                timestamp,
            }),
            last_modified: None,
        }
    }
}
