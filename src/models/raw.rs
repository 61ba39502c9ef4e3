use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A profile row exactly as the persistence layer returned it.
///
/// Field names and value types vary between onboarding versions, so the row
/// is kept as a JSON object and read through [`RawProfileRecord::field`],
/// which classifies each value into a [`RawField`] variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawProfileRecord(pub Map<String, Value>);

/// Shape of a single raw value.
#[derive(Debug, Clone, PartialEq)]
pub enum RawField<'a> {
    Missing,
    Bool(bool),
    Number(f64),
    Text(&'a str),
    List(Vec<&'a str>),
    Unsupported,
}

impl RawProfileRecord {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Looks up the first of `keys` that holds a non-null value.
    pub fn field(&self, keys: &[&str]) -> RawField<'_> {
        keys.iter()
            .filter_map(|key| self.0.get(*key))
            .find(|value| !value.is_null())
            .map(classify)
            .unwrap_or(RawField::Missing)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Non-blank user id, if the row carries one.
    pub fn user_id(&self) -> Option<&str> {
        self.text(&["user_id", "userId", "id"])
    }

    pub fn user_type(&self) -> Option<&str> {
        self.text(&["user_type", "userType"])
    }

    fn text(&self, keys: &[&str]) -> Option<&str> {
        match self.field(keys) {
            RawField::Text(text) if !text.trim().is_empty() => Some(text.trim()),
            _ => None,
        }
    }
}

fn classify(value: &Value) -> RawField<'_> {
    match value {
        Value::Null => RawField::Missing,
        Value::Bool(flag) => RawField::Bool(*flag),
        Value::Number(number) => number
            .as_f64()
            .map(RawField::Number)
            .unwrap_or(RawField::Unsupported),
        Value::String(text) => RawField::Text(text.as_str()),
        Value::Array(items) => RawField::List(items.iter().filter_map(Value::as_str).collect()),
        Value::Object(_) => RawField::Unsupported,
    }
}

impl From<Map<String, Value>> for RawProfileRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Vocabulary accepted for textual cleanliness levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanlinessTag {
    VeryRelaxed,
    Relaxed,
    Moderate,
    Tidy,
    VeryTidy,
    Spotless,
}

impl CleanlinessTag {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "very_relaxed" => Some(Self::VeryRelaxed),
            "relaxed" => Some(Self::Relaxed),
            "moderate" => Some(Self::Moderate),
            "tidy" => Some(Self::Tidy),
            "very_tidy" => Some(Self::VeryTidy),
            "spotless" => Some(Self::Spotless),
            _ => None,
        }
    }

    /// Position on the 1-10 cleanliness scale.
    pub fn level(&self) -> u8 {
        match self {
            Self::VeryRelaxed => 2,
            Self::Relaxed => 3,
            Self::Moderate => 5,
            Self::Tidy => 7,
            Self::VeryTidy => 8,
            Self::Spotless => 9,
        }
    }
}

/// Cleanliness as it may appear in a raw row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CleanlinessValue {
    Numeric(f64),
    Vocabulary(CleanlinessTag),
    Unknown,
}

impl CleanlinessValue {
    pub fn from_raw(field: RawField<'_>) -> Self {
        match field {
            RawField::Number(n) => Self::Numeric(n),
            RawField::Text(text) => match CleanlinessTag::parse(text) {
                Some(tag) => Self::Vocabulary(tag),
                None => text
                    .trim()
                    .parse::<i64>()
                    .map(|n| Self::Numeric(n as f64))
                    .unwrap_or(Self::Unknown),
            },
            RawField::Missing
            | RawField::Bool(_)
            | RawField::List(_)
            | RawField::Unsupported => Self::Unknown,
        }
    }
}
