//! Resource values and content formats

use serde::{Deserialize, Serialize};

/// Last value a device reported for a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Opaque(Vec<u8>),
}

impl ResourceValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ResourceValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ResourceValue::String(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

impl From<i64> for ResourceValue {
    fn from(v: i64) -> Self {
        ResourceValue::Integer(v)
    }
}

impl From<&str> for ResourceValue {
    fn from(v: &str) -> Self {
        ResourceValue::String(v.to_string())
    }
}

impl From<String> for ResourceValue {
    fn from(v: String) -> Self {
        ResourceValue::String(v)
    }
}

/// Payload encoding of a write request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentFormat {
    Opaque,
    Text,
    Tlv,
    Json,
}

impl ContentFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ContentFormat::Opaque => "OPAQUE",
            ContentFormat::Text => "TEXT",
            ContentFormat::Tlv => "TLV",
            ContentFormat::Json => "JSON",
        }
    }
}
