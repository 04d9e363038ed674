//! Decoding of tool-call arguments.
//!
//! The voice platform sends arguments either as a JSON object or as a string
//! holding an encoded object, and edit payloads arrive in several equivalent
//! shapes. Everything is normalized here so the core only ever sees
//! [`FieldChanges`].

use serde_json::{Map, Value};

use orderline_core::domain::fields::{FieldChanges, FieldValue, ItemField};
use orderline_core::errors::OrderError;
use orderline_core::parser::rules::number_value;

const PAIR_NAME_KEYS: &[&str] = &["property", "field", "name", "key"];

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolArgs {
    values: Map<String, Value>,
}

impl ToolArgs {
    pub fn from_value(raw: &Value) -> Result<Self, OrderError> {
        match raw {
            Value::Null => Ok(Self::default()),
            Value::Object(values) => Ok(Self { values: values.clone() }),
            Value::String(encoded) if encoded.trim().is_empty() => Ok(Self::default()),
            Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
                Ok(Value::Object(values)) => Ok(Self { values }),
                _ => Err(OrderError::ParseFailure {
                    message: "tool arguments must be a JSON object".to_string(),
                }),
            },
            _ => Err(OrderError::ParseFailure {
                message: "tool arguments must be a JSON object".to_string(),
            }),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// First non-null value among `keys`.
    pub fn get(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().filter_map(|key| self.values.get(*key)).find(|value| !value.is_null())
    }

    pub fn text(&self, keys: &[&str]) -> Option<String> {
        let value = match self.get(keys)? {
            Value::String(text) => text.trim().to_string(),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            _ => return None,
        };
        (!value.is_empty()).then_some(value)
    }

    pub fn require_text(&self, keys: &[&str], field: &str) -> Result<String, OrderError> {
        self.text(keys).ok_or_else(|| OrderError::invalid_value(field, "a value is required"))
    }

    pub fn index(&self, keys: &[&str]) -> Result<i64, OrderError> {
        let value = self
            .get(keys)
            .ok_or_else(|| OrderError::invalid_value("index", "an item index is required"))?;
        index_value(value)
    }

    /// A list of item indices, a single index, or nothing.
    pub fn indices(&self, keys: &[&str]) -> Result<Option<Vec<i64>>, OrderError> {
        let Some(value) = self.get(keys) else {
            return Ok(None);
        };
        match value {
            Value::Array(entries) => entries.iter().map(index_value).collect::<Result<_, _>>().map(Some),
            Value::String(encoded) if encoded.trim_start().starts_with('[') => {
                let decoded: Value = serde_json::from_str(encoded).map_err(|_| {
                    OrderError::invalid_value("indices", "expected a list of item numbers")
                })?;
                match decoded {
                    Value::Array(entries) => {
                        entries.iter().map(index_value).collect::<Result<_, _>>().map(Some)
                    }
                    _ => Err(OrderError::invalid_value("indices", "expected a list of item numbers")),
                }
            }
            single => index_value(single).map(|index| Some(vec![index])),
        }
    }

    /// The remaining arguments once `excluded` keys are removed.
    pub fn without(&self, excluded: &[&str]) -> Map<String, Value> {
        self.values
            .iter()
            .filter(|(key, _)| !excluded.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

fn index_value(value: &Value) -> Result<i64, OrderError> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .ok_or_else(|| OrderError::invalid_value("index", "expected a whole number")),
        Value::String(text) => {
            let trimmed = text.trim().to_ascii_lowercase();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| number_value(&trimmed).map(i64::from))
                .ok_or_else(|| OrderError::invalid_value("index", "expected a whole number"))
        }
        _ => Err(OrderError::invalid_value("index", "expected a whole number")),
    }
}

/// The edit payload shapes accepted from the platform.
#[derive(Debug)]
pub enum EditPayload<'a> {
    /// `{"size": "large", "sauces": ["garlic"]}`, values may be wrapped as `{"value": ...}`.
    Mapping(&'a Map<String, Value>),
    /// `[{"property": "size", "value": "large"}]`
    Pairs(&'a [Value]),
    /// A string holding either of the above, JSON encoded.
    Encoded(&'a str),
}

impl<'a> EditPayload<'a> {
    pub fn classify(raw: &'a Value) -> Result<Self, OrderError> {
        match raw {
            Value::Object(mapping) => Ok(Self::Mapping(mapping)),
            Value::Array(pairs) => Ok(Self::Pairs(pairs)),
            Value::String(encoded) => Ok(Self::Encoded(encoded)),
            _ => Err(OrderError::invalid_value(
                "changes",
                "expected a mapping of item properties to new values",
            )),
        }
    }

    pub fn normalize(self) -> Result<FieldChanges, OrderError> {
        let changes = match self {
            Self::Mapping(mapping) => from_mapping(mapping)?,
            Self::Pairs(pairs) => from_pairs(pairs)?,
            Self::Encoded(encoded) => {
                let decoded: Value = serde_json::from_str(encoded).map_err(|_| {
                    OrderError::invalid_value("changes", "the requested changes could not be read")
                })?;
                match EditPayload::classify(&decoded)? {
                    EditPayload::Encoded(_) => {
                        return Err(OrderError::invalid_value(
                            "changes",
                            "the requested changes could not be read",
                        ))
                    }
                    nested => nested.normalize()?,
                }
            }
        };

        if changes.is_empty() {
            return Err(OrderError::invalid_value("changes", "no changes were given"));
        }
        Ok(changes)
    }
}

/// Normalizes any accepted edit payload shape into [`FieldChanges`].
pub fn normalize_changes(raw: &Value) -> Result<FieldChanges, OrderError> {
    EditPayload::classify(raw)?.normalize()
}

fn from_mapping(mapping: &Map<String, Value>) -> Result<FieldChanges, OrderError> {
    let mut changes = FieldChanges::new();
    for (key, value) in mapping {
        let field: ItemField = key.parse()?;
        changes.insert(field, FieldValue::from_json(value));
    }
    Ok(changes)
}

fn from_pairs(pairs: &[Value]) -> Result<FieldChanges, OrderError> {
    let mut changes = FieldChanges::new();
    for pair in pairs {
        let Value::Object(entry) = pair else {
            return Err(OrderError::invalid_value(
                "changes",
                "each change needs a property and a value",
            ));
        };
        let name = PAIR_NAME_KEYS
            .iter()
            .find_map(|key| entry.get(*key).and_then(Value::as_str))
            .ok_or_else(|| OrderError::invalid_value("changes", "each change needs a property"))?;
        let field: ItemField = name.parse()?;
        let value = entry.get("value").map(FieldValue::from_json).unwrap_or(FieldValue::Null);
        changes.insert(field, value);
    }
    Ok(changes)
}
