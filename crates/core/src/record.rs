use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A platform record: field name to field value.
///
/// Field names are kept sorted so serialized output is stable.
pub type Record = BTreeMap<String, FieldValue>;

const REFERENCE_KEYS: [&str; 3] = ["value", "display_value", "link"];

/// A single field value as returned by the Table API.
///
/// Reference fields come back as objects with a string `value` and
/// optionally a string `display_value` and `link`. Objects of any other
/// shape are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    Reference {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        link: Option<String>,
    },
    Other(Value),
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from)
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::Text(s),
            Value::Object(map) => match reference_parts(&map) {
                Some((value, display_value, link)) => Self::Reference {
                    value,
                    display_value,
                    link,
                },
                None => Self::Other(Value::Object(map)),
            },
            other => Self::Other(other),
        }
    }
}

/// Split an object into reference parts when it has exactly the reference
/// shape: a string `value`, and only string `display_value`/`link` besides.
fn reference_parts(map: &Map<String, Value>) -> Option<(String, Option<String>, Option<String>)> {
    if !map.keys().all(|k| REFERENCE_KEYS.contains(&k.as_str())) {
        return None;
    }
    let optional = |key: &str| match map.get(key) {
        None => Some(None),
        Some(Value::String(s)) => Some(Some(s.clone())),
        Some(_) => None,
    };
    let value = map.get("value")?.as_str()?.to_string();
    Some((value, optional("display_value")?, optional("link")?))
}

impl FieldValue {
    /// Truthiness used when computing CMDB completeness metrics.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(true),
            Self::Text(s) => !s.is_empty(),
            Self::Reference { value, .. } => !value.is_empty(),
            Self::Other(v) => !v.is_null(),
        }
    }

    /// Borrow the value as a string, if it is text or a reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Reference { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Whether the identifier looks like a sys_id: exactly 32 ASCII hex digits.
///
/// Tools use this to decide between a direct fetch and a lookup by
/// number or name.
pub fn is_sys_id(identifier: &str) -> bool {
    identifier.len() == 32 && identifier.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_sys_id() {
        assert!(is_sys_id("46d44b5fa9fe198101d7e5e0b7b4c3b5"));
        assert!(is_sys_id("46D44B5FA9FE198101D7E5E0B7B4C3B5"));
        assert!(!is_sys_id("INC0010001"));
        assert!(!is_sys_id("46d44b5fa9fe198101d7e5e0b7b4c3b"));
        assert!(!is_sys_id("46d44b5fa9fe198101d7e5e0b7b4c3bz"));
        assert!(!is_sys_id(""));
    }

    #[test]
    fn test_record_deserializes_mixed_fields() {
        let record: Record = serde_json::from_value(json!({
            "number": "INC0010001",
            "active": true,
            "priority": 2,
            "closed_at": null,
            "caller_id": {
                "value": "6816f79cc0a8016401c5a33be04be441",
                "link": "https://dev.service-now.com/api/now/table/sys_user/6816f79cc0a8016401c5a33be04be441"
            }
        }))
        .unwrap();

        assert_eq!(record["number"], FieldValue::from("INC0010001"));
        assert_eq!(record["active"], FieldValue::Bool(true));
        assert_eq!(record["closed_at"], FieldValue::Null);
        assert_eq!(
            record["caller_id"].as_str(),
            Some("6816f79cc0a8016401c5a33be04be441")
        );
        assert!(matches!(record["priority"], FieldValue::Number(_)));
    }

    #[test]
    fn test_truthiness() {
        assert!(!FieldValue::Null.is_truthy());
        assert!(!FieldValue::from("").is_truthy());
        assert!(FieldValue::from("10.0.0.1").is_truthy());
        assert!(!FieldValue::Bool(false).is_truthy());
        assert!(!FieldValue::Number(0.into()).is_truthy());
        assert!(FieldValue::Number(3.into()).is_truthy());
    }

    #[test]
    fn test_unfamiliar_objects_survive_a_round_trip() {
        let input = json!({
            "f": {"display_value": null, "extra": "y", "value": "x"},
            "g": {"value": 5},
            "h": {"value": "abc", "display_value": "Beth Anglin"},
            "tags": ["a", "b"]
        });

        let record: Record = serde_json::from_value(input.clone()).unwrap();
        assert!(matches!(record["f"], FieldValue::Other(_)));
        assert!(matches!(record["g"], FieldValue::Other(_)));
        assert!(matches!(record["h"], FieldValue::Reference { .. }));
        assert!(matches!(record["tags"], FieldValue::Other(_)));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back, input);
        assert_eq!(back["f"]["extra"], "y");
        assert!(back["f"].as_object().unwrap().contains_key("display_value"));
    }

    #[test]
    fn test_reference_serializes_without_empty_fields() {
        let value = FieldValue::Reference {
            value: "abc".to_string(),
            display_value: None,
            link: None,
        };
        assert_eq!(serde_json::to_value(&value).unwrap(), json!({"value": "abc"}));
    }
}
