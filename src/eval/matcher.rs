use crate::context::AttributeValue;
use crate::{TargetingOperator, TargetingOperator::*, TargetingRule};
use std::collections::HashMap;

/// Returns `true` when `rule` matches the given attributes.
///
/// A missing attribute, an unknown operator, or a comparand that is not a number
/// for a numeric operator never produces a match.
pub fn matches(rule: &TargetingRule, attributes: &HashMap<String, AttributeValue>) -> bool {
    let attr = if let Some(attr) = attributes.get(&rule.attribute) {
        attr
    } else {
        return false;
    };
    match rule.operator {
        Equals | NotEquals | In | NotIn => eval_text(&rule.values, attr, &rule.operator, |a, b| {
            a == b
        }),
        Contains | NotContains => {
            eval_text(&rule.values, attr, &rule.operator, |a, b| a.contains(b))
        }
        GreaterThan | LessThan => eval_number(&rule.values, attr, &rule.operator),
        Unknown => false,
    }
}

fn eval_text<F>(values: &[String], attr: &AttributeValue, op: &TargetingOperator, cmp: F) -> bool
where
    F: Fn(&str, &str) -> bool,
{
    let attr_val = attr.as_text().to_lowercase();
    let any = values
        .iter()
        .any(|item| cmp(attr_val.as_str(), item.to_lowercase().as_str()));
    any != op.is_negated()
}

fn eval_number(values: &[String], attr: &AttributeValue, op: &TargetingOperator) -> bool {
    let attr_val = if let Some(attr_val) = attr.as_float() {
        attr_val
    } else {
        return false;
    };
    values
        .iter()
        .filter_map(|item| item.trim().parse::<f64>().ok())
        .any(|comp_val| match op {
            GreaterThan => attr_val > comp_val,
            LessThan => attr_val < comp_val,
            _ => false,
        })
}
