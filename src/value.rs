use serde::de::DeserializeOwned;
use serde_json::Value;

/// Converts a stored variation value into the type requested by the caller.
///
/// The value is first mapped structurally (so integers widen into floats and JSON
/// objects map onto structs). When that fails, strings are parsed as JSON
/// (`"42"` → `42`, `"{\"a\":1}"` → a struct) and scalars are offered in their text
/// form (`42` → `"42"`). Returns [`None`] when no conversion applies.
///
/// # Examples
///
/// ```rust
/// use flagcore::coerce_variation;
/// use serde_json::json;
///
/// assert_eq!(coerce_variation::<f64>(&json!(3)), Some(3.0));
/// assert_eq!(coerce_variation::<i64>(&json!("42")), Some(42));
/// assert_eq!(coerce_variation::<String>(&json!(true)), Some("true".to_owned()));
/// assert_eq!(coerce_variation::<bool>(&json!("maybe")), None);
/// ```
pub fn coerce_variation<T: DeserializeOwned>(value: &Value) -> Option<T> {
    if let Ok(val) = serde_json::from_value::<T>(value.clone()) {
        return Some(val);
    }
    match value {
        Value::String(text) => serde_json::from_str::<T>(text.trim()).ok(),
        Value::Number(_) | Value::Bool(_) => {
            serde_json::from_value::<T>(Value::String(value.to_string())).ok()
        }
        _ => None,
    }
}
