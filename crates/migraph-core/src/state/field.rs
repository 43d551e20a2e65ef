//! Field definitions for entities.

use super::types::{FieldType, ScalarType};
use serde::{Deserialize, Serialize};

/// A field definition within an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field data type.
    pub field_type: FieldType,
    /// Whether the field is the entity's primary key.
    pub primary_key: bool,
    /// Whether a value is required.
    pub required: bool,
    /// Default value if not provided.
    pub default: Option<DefaultValue>,
    /// Whether this field should be indexed.
    pub indexed: bool,
}

/// Default value for a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    String(String),
    /// Auto-incrementing integer, assigned by the datastore.
    AutoIncrement,
    /// Auto-generated UUID.
    AutoUuid,
}

impl FieldDef {
    /// Create a new required field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            primary_key: false,
            required: true,
            default: None,
            indexed: false,
        }
    }

    /// Create an optional field (required = false).
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::new(name, field_type)
        }
    }

    /// The synthesized auto-incrementing key used when an entity declares none.
    pub fn auto_key(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::scalar(ScalarType::Int64))
            .with_primary_key()
            .with_default(DefaultValue::AutoIncrement)
    }

    /// Mark as the primary key.
    pub fn with_primary_key(mut self) -> Self {
        self.primary_key = true;
        self.indexed = true;
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark as indexed.
    pub fn with_index(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Check if this field has a default value.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}
