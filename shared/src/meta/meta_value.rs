use std::{borrow::Cow, fmt};

use crate::EntityRef;

/// Stable identifier of a meta store property.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetaKey(Cow<'static, str>);

impl MetaKey {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for MetaKey {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

pub const TARGET_ENTITY: MetaKey = MetaKey::from_static("target_entity");
pub const TARGET_BLOCK: MetaKey = MetaKey::from_static("target_block");
pub const HIT_LOCATION: MetaKey = MetaKey::from_static("hit_location");
pub const DAMAGE: MetaKey = MetaKey::from_static("damage");
pub const CHARGE_VALUE: MetaKey = MetaKey::from_static("charge_value");

#[derive(Clone, Debug, PartialEq)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Entity(EntityRef),
    Position([f64; 3]),
    Bytes(Vec<u8>),
}

impl MetaValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetaValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            MetaValue::Float(value) => Some(*value),
            MetaValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetaValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<EntityRef> {
        match self {
            MetaValue::Entity(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_position(&self) -> Option<[f64; 3]> {
        match self {
            MetaValue::Position(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            MetaValue::Bytes(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Bool(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        MetaValue::Int(value)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        MetaValue::Float(value)
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::Text(value)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Text(value.to_string())
    }
}

impl From<EntityRef> for MetaValue {
    fn from(value: EntityRef) -> Self {
        MetaValue::Entity(value)
    }
}

impl From<[f64; 3]> for MetaValue {
    fn from(value: [f64; 3]) -> Self {
        MetaValue::Position(value)
    }
}

impl From<Vec<u8>> for MetaValue {
    fn from(value: Vec<u8>) -> Self {
        MetaValue::Bytes(value)
    }
}
