use chrono::{DateTime, Utc};
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Supported context attribute value types.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// String attribute value.
    String(String),
    /// Signed integer attribute value.
    Int(i64),
    /// Unsigned integer attribute value.
    UInt(u64),
    /// Float attribute value.
    Float(f64),
    /// Boolean attribute value.
    Bool(bool),
    /// Datetime attribute value.
    DateTime(DateTime<Utc>),
    /// String vector attribute value.
    StringVec(Vec<String>),
    /// Explicitly empty attribute value. Compared as an empty string.
    Null,
}

impl AttributeValue {
    /// The text form used by the string targeting operators.
    pub(crate) fn as_text(&self) -> String {
        match self {
            AttributeValue::String(val) => val.clone(),
            AttributeValue::Int(val) => val.to_string(),
            AttributeValue::UInt(val) => val.to_string(),
            AttributeValue::Float(val) => val.to_string(),
            AttributeValue::Bool(val) => val.to_string(),
            AttributeValue::DateTime(val) => val.to_rfc3339(),
            AttributeValue::StringVec(val) => val.join(","),
            AttributeValue::Null => String::default(),
        }
    }

    /// The numeric form used by the comparison targeting operators.
    pub(crate) fn as_float(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(val) => Some(*val as f64),
            AttributeValue::UInt(val) => Some(*val as f64),
            AttributeValue::Float(val) => Some(*val),
            AttributeValue::DateTime(val) => Some(val.timestamp() as f64),
            AttributeValue::String(val) => val.trim().parse().ok(),
            _ => None,
        }
    }
}

impl Display for AttributeValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::StringVec(_) => f.write_str("<vec of strings>"),
            AttributeValue::Null => f.write_str("null"),
            _ => f.write_str(self.as_text().as_str()),
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            AttributeValue::String(val) => serializer.serialize_str(val),
            AttributeValue::Int(val) => serializer.serialize_i64(*val),
            AttributeValue::UInt(val) => serializer.serialize_u64(*val),
            AttributeValue::Float(val) => serializer.serialize_f64(*val),
            AttributeValue::Bool(val) => serializer.serialize_bool(*val),
            AttributeValue::DateTime(val) => serializer.serialize_str(val.to_rfc3339().as_str()),
            AttributeValue::StringVec(val) => {
                let mut seq = serializer.serialize_seq(Some(val.len()))?;
                for element in val {
                    seq.serialize_element(element)?;
                }
                seq.end()
            }
            AttributeValue::Null => serializer.serialize_none(),
        }
    }
}

impl From<Vec<&str>> for AttributeValue {
    fn from(value: Vec<&str>) -> Self {
        Self::StringVec(value.iter().map(|x| x.to_string()).collect())
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(val) => val.into(),
            None => AttributeValue::Null,
        }
    }
}

attribute_from!(AttributeValue::String <= String, &str);
attribute_from!(AttributeValue::DateTime <= DateTime<Utc>);
attribute_from!(AttributeValue::StringVec <= Vec<String>);
attribute_from!(AttributeValue::Bool <= bool);
attribute_from!(AttributeValue::Float <= f64, f32);
attribute_from!(AttributeValue::UInt <= u8, u16, u32, u64);
attribute_from!(AttributeValue::Int <= i8, i16, i32, i64);

/// The request-scoped input of an evaluation: who is asking, on behalf of which tenant,
/// with which attributes, and at what time.
///
/// # Examples:
///
/// ```rust
/// use flagcore::EvaluationContext;
///
/// let context = EvaluationContext::new()
///     .user_id("user-1")
///     .tenant_id("acme")
///     .attribute("region", "eu-west")
///     .attribute("seats", 42)
///     .time_zone("Europe/Budapest");
/// ```
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationContext {
    user_id: Option<String>,
    tenant_id: Option<String>,
    attributes: HashMap<String, AttributeValue>,
    evaluation_time: Option<DateTime<Utc>>,
    time_zone: Option<String>,
}

impl EvaluationContext {
    /// Initializes an empty [`EvaluationContext`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier of the user the flag is evaluated for.
    pub fn user_id(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_owned());
        self
    }

    /// Identifier of the tenant the flag is evaluated for.
    pub fn tenant_id(mut self, tenant_id: &str) -> Self {
        self.tenant_id = Some(tenant_id.to_owned());
        self
    }

    /// Custom attribute used by targeting rules (e.g. region, plan, app version).
    ///
    /// # Examples:
    ///
    /// ```rust
    /// use flagcore::EvaluationContext;
    ///
    /// let context = EvaluationContext::new()
    ///     .attribute("plan", "enterprise")
    ///     .attribute("score", 4.5)
    ///     .attribute("roles", vec!["admin", "billing"]);
    /// ```
    pub fn attribute<T: Into<AttributeValue>>(mut self, key: &str, value: T) -> Self {
        self.attributes.insert(key.to_owned(), value.into());
        self
    }

    /// The instant the flag is evaluated at. Defaults to the current UTC time.
    pub fn evaluation_time(mut self, time: DateTime<Utc>) -> Self {
        self.evaluation_time = Some(time);
        self
    }

    /// Overrides the timezone of the flag's operational window.
    pub fn time_zone(mut self, time_zone: &str) -> Self {
        self.time_zone = Some(time_zone.to_owned());
        self
    }

    /// The user identifier, if set.
    pub fn get_user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// The tenant identifier, if set.
    pub fn get_tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// The timezone override, if set.
    pub fn get_time_zone(&self) -> Option<&str> {
        self.time_zone.as_deref()
    }

    /// The evaluation instant, if set.
    pub fn get_evaluation_time(&self) -> Option<DateTime<Utc>> {
        self.evaluation_time
    }

    /// Gets a custom attribute by key.
    pub fn get_attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Every custom attribute of the context.
    pub fn attributes(&self) -> &HashMap<String, AttributeValue> {
        &self.attributes
    }

    /// The evaluation time, or now when none was given.
    pub(crate) fn time_or_now(&self) -> DateTime<Utc> {
        self.evaluation_time.unwrap_or_else(Utc::now)
    }
}

impl Display for EvaluationContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(self) {
            Ok(str) => write!(f, "{str}"),
            Err(_) => f.write_str("<invalid context>"),
        }
    }
}

/// Returns the trimmed identifier when it is present and not blank.
pub(crate) fn non_blank(id: Option<&str>) -> Option<&str> {
    id.map(str::trim).filter(|id| !id.is_empty())
}
