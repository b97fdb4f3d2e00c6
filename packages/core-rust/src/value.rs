use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Dynamically-typed value exchanged between the host and plugin handlers.
///
/// Mirrors the six shapes of the wire encoding exactly, so conversion to and
/// from the wire is total in both directions. Numbers are IEEE 754 doubles;
/// integers beyond 2^53 lose precision, as they would on the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value. Wire null, an unset wire kind, and a missing key all
    /// decode to this.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit floating-point number.
    Number(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered sequence of values.
    List(Vec<Value>),
    /// Mapping of unique names to values. `BTreeMap` keeps exports stable.
    Struct(BTreeMap<String, Value>),
}

impl Value {
    /// Builds an empty struct value.
    #[must_use]
    pub fn empty_struct() -> Self {
        Value::Struct(BTreeMap::new())
    }

    /// Converts any serializable value.
    ///
    /// Lenient by contract: if `value` cannot be represented (e.g. a map
    /// with non-string keys), its `Debug` representation is returned as a
    /// string instead of an error.
    pub fn from_serialize<T: Serialize + fmt::Debug>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(json) => Value::from(json),
            Err(_) => Value::String(format!("{value:?}")),
        }
    }

    /// Deserializes this value into a typed Rust structure.
    ///
    /// # Errors
    ///
    /// Returns an error if the shape of the value does not match `T`.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::Value::from(self.clone()))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_struct(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// Looks up a field of a struct value. Returns `None` for non-structs.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_struct().and_then(|fields| fields.get(key))
    }

    /// Short human-readable name of the variant, used in log fields.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Struct(_) => "struct",
        }
    }
}

// ---------------------------------------------------------------------------
// serde_json bridge
// ---------------------------------------------------------------------------

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Struct(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            // NaN and infinities have no JSON form.
            Value::Number(n) => serde_json::Number::from_f64(n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Struct(fields) => serde_json::Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_json::Value::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::Value::from(self.clone()))
    }
}

// ---------------------------------------------------------------------------
// Primitive conversions
// ---------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Value::Struct(fields)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_bridge_preserves_nesting() {
        let json = json!({
            "name": "Ada",
            "tags": ["a", "b"],
            "meta": { "age": 36.0, "admin": false, "missing": null }
        });
        let value = Value::from(json.clone());

        assert_eq!(value.get("name").and_then(Value::as_str), Some("Ada"));
        assert_eq!(
            value.get("tags").and_then(Value::as_list).map(<[Value]>::len),
            Some(2)
        );
        assert!(value.get("meta").and_then(|m| m.get("missing")).unwrap().is_null());
        assert_eq!(serde_json::Value::from(value), json);
    }

    #[test]
    fn non_finite_numbers_become_json_null() {
        let json = serde_json::Value::from(Value::Number(f64::NAN));
        assert!(json.is_null());
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Greeting {
        name: String,
        formal: bool,
    }

    #[test]
    fn typed_round_trip_through_serde() {
        let greeting = Greeting {
            name: "Ada".to_string(),
            formal: true,
        };
        let value = Value::from_serialize(&greeting);
        assert_eq!(value.get("formal"), Some(&Value::Bool(true)));

        let back: Greeting = value.deserialize_into().unwrap();
        assert_eq!(back, greeting);
    }

    #[test]
    fn unserializable_value_falls_back_to_debug_string() {
        // serde_json rejects maps whose keys are not strings.
        let mut weird = std::collections::HashMap::new();
        weird.insert(vec![1u8], 2u8);

        let value = Value::from_serialize(&weird);
        assert_eq!(value, Value::String(format!("{weird:?}")));
    }

    #[test]
    fn option_conversion_maps_none_to_null() {
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::String("x".to_string()));
    }

    #[test]
    fn kind_name_labels_each_variant() {
        let json = json!({"a": [1, "x", true, null]});
        let value = Value::from(json);
        assert_eq!(value.kind_name(), "struct");
        let items = value.get("a").and_then(Value::as_list).unwrap();
        let kinds: Vec<_> = items.iter().map(Value::kind_name).collect();
        assert_eq!(kinds, ["number", "string", "bool", "null"]);
    }

    #[test]
    fn display_renders_json() {
        let value = Value::from(json!({"a": [1.5, true]}));
        assert_eq!(value.to_string(), r#"{"a":[1.5,true]}"#);
    }
}
