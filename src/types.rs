use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const NO_VERIFICATION: &str = "none";

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    /// Anything the host sends that the gate does not track (`failed`, `null`, ...).
    Other,
}

impl<'de> Deserialize<'de> for TodoStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value.as_str() {
            Some("pending") => Self::Pending,
            Some("in_progress") => Self::InProgress,
            Some("completed") => Self::Completed,
            _ => Self::Other,
        })
    }
}

/// Strings pass through, null is `None`, other JSON values keep their JSON text.
fn text_of(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(text_of(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn optional_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(text_of(Value::deserialize(deserializer)?))
}

/// Only reached when the key is present, so an explicit null stays distinct from a missing key.
fn present_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Option<String>>, D::Error> {
    Ok(Some(text_of(Value::deserialize(deserializer)?)))
}

fn lenient_metadata<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<TodoMetadata>, D::Error> {
    match Value::deserialize(deserializer)? {
        value @ Value::Object(_) => serde_json::from_value(value).map(Some).map_err(D::Error::custom),
        _ => Ok(None),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TodoMetadata {
    /// Outer `None`: key absent. `Some(None)`: sent as null.
    #[serde(
        default,
        deserialize_with = "present_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub verification_method: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub verification_evidence: Option<String>,
}

/// One todo entry. A wrongly typed field degrades that field only, never the whole list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Todo {
    #[serde(default, deserialize_with = "lenient_text")]
    pub content: String,
    #[serde(default)]
    pub status: TodoStatus,
    #[serde(
        default,
        deserialize_with = "lenient_metadata",
        skip_serializing_if = "Option::is_none"
    )]
    pub metadata: Option<TodoMetadata>,
}

impl Todo {
    /// A missing method means `none`. Any declared method other than `none`, null included,
    /// asks for evidence.
    pub fn requires_evidence(&self) -> bool {
        match self
            .metadata
            .as_ref()
            .and_then(|m| m.verification_method.as_ref())
        {
            None => false,
            Some(None) => true,
            Some(Some(method)) => method != NO_VERIFICATION,
        }
    }

    /// Evidence with surrounding whitespace removed; empty when absent.
    pub fn evidence(&self) -> &str {
        self.metadata
            .as_ref()
            .and_then(|m| m.verification_evidence.as_deref())
            .unwrap_or("")
            .trim()
    }
}

#[derive(Debug, Clone)]
pub struct Directive {
    pub text: String,
    pub session_id: String,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub text: String,
    pub session_id: String,
}
