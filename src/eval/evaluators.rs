use crate::constants::*;
use crate::context::{non_blank, AttributeValue};
use crate::errors::{ErrorKind, FlagError};
use crate::eval::matcher;
use crate::eval::result::EvaluationResult;
use crate::timezone::resolve_time_zone;
use crate::utils::rollout_percentage;
use crate::EvaluationMode::*;
use crate::{AccessControl, EvaluationContext, EvaluationMode, EvaluatorType, FeatureFlag};
use chrono::{Datelike, Timelike};
use log::warn;
use std::collections::HashMap;

/// Which identifier and access control a rollout evaluator works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutScope {
    /// Works on the tenant id and the tenant access control.
    Tenant,
    /// Works on the user id and the user access control.
    User,
}

impl RolloutScope {
    fn label(&self) -> &'static str {
        match self {
            RolloutScope::Tenant => "Tenant",
            RolloutScope::User => "User",
        }
    }

    fn plural(&self) -> &'static str {
        match self {
            RolloutScope::Tenant => "tenants",
            RolloutScope::User => "users",
        }
    }

    fn id<'a>(&self, context: &'a EvaluationContext) -> Option<&'a str> {
        match self {
            RolloutScope::Tenant => non_blank(context.get_tenant_id()),
            RolloutScope::User => non_blank(context.get_user_id()),
        }
    }

    fn access_control<'a>(&self, flag: &'a FeatureFlag) -> &'a AccessControl {
        match self {
            RolloutScope::Tenant => &flag.tenant_access_control,
            RolloutScope::User => &flag.user_access_control,
        }
    }

    fn modes(&self) -> &'static [EvaluationMode] {
        match self {
            RolloutScope::Tenant => &[TenantRolloutPercentage, TenantTargeted],
            RolloutScope::User => &[UserRolloutPercentage],
        }
    }
}

/// One evaluation concern. The [`crate::EvaluationManager`] picks the first evaluator
/// whose [`Evaluator::can_process`] accepts the flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluator {
    /// Enables the flag between its enable and disable dates.
    ActivationSchedule,
    /// Enables the flag inside its daily time window.
    OperationalWindow,
    /// Serves the variation of the first matching targeting rule.
    CustomTargeting,
    /// Allow list, block list and percentage rollout.
    Rollout(RolloutScope),
    /// Explicit on/off state. The fallback of every flag.
    TerminalState,
}

impl From<EvaluatorType> for Evaluator {
    fn from(value: EvaluatorType) -> Self {
        match value {
            EvaluatorType::ActivationSchedule => Evaluator::ActivationSchedule,
            EvaluatorType::OperationalWindow => Evaluator::OperationalWindow,
            EvaluatorType::CustomTargeting => Evaluator::CustomTargeting,
            EvaluatorType::TenantRollout => Evaluator::Rollout(RolloutScope::Tenant),
            EvaluatorType::UserRollout => Evaluator::Rollout(RolloutScope::User),
            EvaluatorType::TerminalState => Evaluator::TerminalState,
        }
    }
}

impl Evaluator {
    /// The [`EvaluatorType`] this evaluator is registered as.
    pub fn evaluator_type(&self) -> EvaluatorType {
        match self {
            Evaluator::ActivationSchedule => EvaluatorType::ActivationSchedule,
            Evaluator::OperationalWindow => EvaluatorType::OperationalWindow,
            Evaluator::CustomTargeting => EvaluatorType::CustomTargeting,
            Evaluator::Rollout(RolloutScope::Tenant) => EvaluatorType::TenantRollout,
            Evaluator::Rollout(RolloutScope::User) => EvaluatorType::UserRollout,
            Evaluator::TerminalState => EvaluatorType::TerminalState,
        }
    }

    /// Returns `true` when this evaluator is responsible for `flag`.
    pub fn can_process(&self, flag: &FeatureFlag, context: &EvaluationContext) -> bool {
        let modes = &flag.evaluation_modes;
        match self {
            Evaluator::ActivationSchedule => modes.contains(Scheduled),
            Evaluator::OperationalWindow => modes.contains(TimeWindow),
            Evaluator::CustomTargeting => modes.contains(UserTargeted),
            Evaluator::Rollout(scope) => {
                // An explicit on/off state outranks a rollout mode without restrictions.
                scope.id(context).is_some()
                    && (scope.access_control(flag).has_access_restrictions()
                        || (modes.contains_any(scope.modes())
                            && !modes.contains_any(&[Disabled, Enabled])))
            }
            Evaluator::TerminalState => {
                modes.is_empty() || modes.contains_any(&[Disabled, Enabled])
            }
        }
    }

    /// Evaluates `flag` for `context`.
    ///
    /// # Errors
    ///
    /// Fails on a scheduled flag without enable date and on a rollout without
    /// the matching identifier.
    pub fn process(
        &self,
        flag: &FeatureFlag,
        context: &EvaluationContext,
    ) -> Result<EvaluationResult, FlagError> {
        match self {
            Evaluator::ActivationSchedule => eval_schedule(flag, context),
            Evaluator::OperationalWindow => Ok(eval_window(flag, context)),
            Evaluator::CustomTargeting => Ok(eval_targeting(flag, context)),
            Evaluator::Rollout(scope) => eval_rollout(*scope, flag, context),
            Evaluator::TerminalState => Ok(eval_terminal(flag)),
        }
    }
}

fn default_variation(flag: &FeatureFlag) -> &str {
    flag.variations.default_variation.as_str()
}

fn eval_schedule(
    flag: &FeatureFlag,
    context: &EvaluationContext,
) -> Result<EvaluationResult, FlagError> {
    let enable_date = if let Some(enable_date) = flag.schedule.enable_date {
        enable_date
    } else {
        return Err(FlagError::new(
            ErrorKind::ScheduleNotConfigured,
            format!(
                "Flag '{}' is scheduled but its schedule is not set up (enable date is missing).",
                flag.key
            ),
        ));
    };
    let time = context.time_or_now();
    if time < enable_date {
        return Ok(EvaluationResult::disabled(
            default_variation(flag),
            REASON_SCHEDULE_NOT_REACHED,
        ));
    }
    if let Some(disable_date) = flag.schedule.disable_date {
        if time >= disable_date {
            return Ok(EvaluationResult::disabled(
                default_variation(flag),
                REASON_SCHEDULE_PASSED,
            ));
        }
    }
    Ok(EvaluationResult::enabled(VARIATION_ON, REASON_SCHEDULE_REACHED))
}

fn eval_window(flag: &FeatureFlag, context: &EvaluationContext) -> EvaluationResult {
    let window = &flag.operational_window;
    if window.is_always_open() {
        return EvaluationResult::enabled(VARIATION_ON, REASON_WINDOW_ALWAYS_OPEN);
    }
    let zone_name = context.get_time_zone().unwrap_or(window.time_zone.as_str());
    let tz = if let Some(tz) = resolve_time_zone(zone_name) {
        tz
    } else {
        warn!(
            event_id = 2100;
            "Flag '{}' uses an unknown timezone '{zone_name}', the operational window is treated as closed.",
            flag.key
        );
        return EvaluationResult::disabled(
            default_variation(flag),
            format!("Invalid timezone: {zone_name}"),
        );
    };
    let local = context.time_or_now().with_timezone(&tz);
    if !window.allows_day(local.weekday()) {
        return EvaluationResult::disabled(default_variation(flag), REASON_OUTSIDE_DAYS);
    }
    // Compare at second precision; the sentinel end of day is 23:59:59.
    let time_of_day = local.time().with_nanosecond(0).unwrap_or(local.time());
    if window.contains_time(time_of_day) {
        EvaluationResult::enabled(VARIATION_ON, REASON_WITHIN_WINDOW)
    } else {
        EvaluationResult::disabled(default_variation(flag), REASON_OUTSIDE_WINDOW)
    }
}

fn eval_targeting(flag: &FeatureFlag, context: &EvaluationContext) -> EvaluationResult {
    let mut attributes: HashMap<String, AttributeValue> = context.attributes().clone();
    if let Some(tenant_id) = non_blank(context.get_tenant_id()) {
        attributes
            .entry(TENANT_ID_ATTRIBUTE.to_owned())
            .or_insert_with(|| tenant_id.into());
    }
    if let Some(user_id) = non_blank(context.get_user_id()) {
        attributes
            .entry(USER_ID_ATTRIBUTE.to_owned())
            .or_insert_with(|| user_id.into());
    }
    match flag
        .targeting_rules
        .iter()
        .find(|rule| matcher::matches(rule, &attributes))
    {
        Some(rule) => EvaluationResult::enabled(
            rule.variation.as_str(),
            format!("Targeting rule matched: {rule}"),
        ),
        None => EvaluationResult::disabled(default_variation(flag), REASON_NO_RULE_MATCHED),
    }
}

fn eval_rollout(
    scope: RolloutScope,
    flag: &FeatureFlag,
    context: &EvaluationContext,
) -> Result<EvaluationResult, FlagError> {
    let label = scope.label();
    let id = if let Some(id) = scope.id(context) {
        id
    } else {
        return Err(FlagError::new(
            ErrorKind::MissingIdentifier,
            format!(
                "{label} rollout of flag '{}' was evaluated without a {} id.",
                flag.key,
                label.to_lowercase()
            ),
        ));
    };
    let acl = scope.access_control(flag);
    if acl.is_blocked(id) {
        return Ok(EvaluationResult::disabled(
            default_variation(flag),
            format!("{label} explicitly blocked"),
        ));
    }
    if acl.is_allowed(id) {
        return Ok(EvaluationResult::enabled(
            VARIATION_ON,
            format!("{label} explicitly allowed"),
        ));
    }
    let percentage = acl.percentage();
    if percentage == 0 {
        return Ok(EvaluationResult::disabled(
            default_variation(flag),
            format!("Access restricted to all {}", scope.plural()),
        ));
    }
    if percentage == 100 {
        return Ok(EvaluationResult::enabled(
            VARIATION_ON,
            format!("Access unrestricted to all {}", scope.plural()),
        ));
    }
    let bucket = rollout_percentage(&flag.key, id);
    if bucket < percentage {
        Ok(EvaluationResult::enabled(
            VARIATION_ON,
            format!("{label} in rollout: {bucket}% < {percentage}%"),
        ))
    } else {
        Ok(EvaluationResult::disabled(
            default_variation(flag),
            format!("{label} not in rollout: {bucket}% >= {percentage}%"),
        ))
    }
}

fn eval_terminal(flag: &FeatureFlag) -> EvaluationResult {
    let modes = &flag.evaluation_modes;
    if modes.contains(Disabled) || !modes.contains(Enabled) {
        return EvaluationResult::disabled(
            default_variation(flag),
            format!("Feature flag '{}' is explicitly disabled", flag.key),
        );
    }
    EvaluationResult::enabled(
        VARIATION_ON,
        format!("Feature flag '{}' is explicitly enabled", flag.key),
    )
}
