// Tool argument access with the validation messages tools report

use nowbridge_core::{NowError, NowResult};
use serde_json::{Map, Value};

/// Arguments of one tool call.
///
/// Strings are treated as absent when empty, so `""` fails a required check
/// the same way a missing key does.
#[derive(Debug, Clone, Default)]
pub struct Args(Map<String, Value>);

impl Args {
    /// Wrap raw call arguments. `null` is accepted as "no arguments".
    pub fn new(value: Value) -> NowResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            _ => Err(NowError::invalid_request("Tool arguments must be a JSON object")),
        }
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// A non-empty string argument.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.str(key).map(str::to_string)
    }

    /// A string argument that must be present.
    pub fn required(&self, key: &str) -> NowResult<&str> {
        self.str(key)
            .ok_or_else(|| NowError::invalid_request(format!("{} is required", key)))
    }

    /// Check that every key is present, reporting all of them in one message
    /// (`a and b are required`, `a, b, and c are required`).
    pub fn require_all(&self, keys: &[&str]) -> NowResult<()> {
        if keys.iter().all(|k| self.is_present(k)) {
            return Ok(());
        }
        Err(NowError::invalid_request(format!(
            "{} {} required",
            join_names(keys),
            if keys.len() == 1 { "is" } else { "are" }
        )))
    }

    fn is_present(&self, key: &str) -> bool {
        match self.0.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    /// A non-negative integer. Accepts JSON numbers (fractions truncated)
    /// and numeric strings.
    pub fn u32(&self, key: &str) -> Option<u32> {
        match self.0.get(key)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .map(|v| v.min(u32::MAX as u64) as u32),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The `limit` argument, or `default` when absent or zero.
    pub fn limit_or(&self, default: u32) -> u32 {
        self.u32("limit").filter(|n| *n > 0).unwrap_or(default)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.0.get(key).and_then(Value::as_object)
    }

    /// An object argument as a JSON value, for use as an update payload.
    pub fn required_object(&self, key: &str) -> NowResult<Value> {
        match self.0.get(key) {
            Some(Value::Object(map)) => Ok(Value::Object(map.clone())),
            Some(Value::Null) | None => Err(NowError::invalid_request(format!("{} is required", key))),
            Some(_) => Err(NowError::invalid_request(format!("{} must be an object", key))),
        }
    }

    /// All arguments as a JSON object, e.g. to use as a record payload.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

fn join_names(keys: &[&str]) -> String {
    match keys {
        [] => String::new(),
        [one] => one.to_string(),
        [a, b] => format!("{} and {}", a, b),
        [rest @ .., last] => format!("{}, and {}", rest.join(", "), last),
    }
}
