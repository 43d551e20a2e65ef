//! Field type descriptions.

use serde::{Deserialize, Serialize};

/// Scalar data types a field may hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// Fixed-precision decimal.
    Decimal {
        /// Total number of digits.
        precision: u8,
        /// Number of digits after decimal point.
        scale: u8,
    },
    /// UTF-8 string, optionally length-limited.
    String {
        /// Maximum length in characters.
        max_length: Option<u32>,
    },
    /// Binary data.
    Bytes,
    /// Timestamp.
    Timestamp,
    /// UUID (128-bit identifier).
    Uuid,
}

/// Field types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// A scalar value.
    Scalar(ScalarType),
    /// An optional scalar value (nullable).
    OptionalScalar(ScalarType),
    /// An array of scalar values.
    ArrayScalar(ScalarType),
    /// An enumeration type.
    Enum {
        /// Name of the enum type.
        name: String,
        /// Allowed variant values.
        variants: Vec<String>,
    },
    /// A reference to another entity, possibly in another module.
    Reference {
        /// Module label of the referenced entity.
        module: String,
        /// Name of the referenced entity.
        entity: String,
    },
}

impl ScalarType {
    /// Unbounded string.
    pub fn string() -> Self {
        ScalarType::String { max_length: None }
    }

    /// Length-limited string.
    pub fn varchar(max_length: u32) -> Self {
        ScalarType::String {
            max_length: Some(max_length),
        }
    }

    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarType::Int32 | ScalarType::Int64 | ScalarType::Float64 | ScalarType::Decimal { .. }
        )
    }
}

impl FieldType {
    /// Create a scalar field type.
    pub fn scalar(scalar: ScalarType) -> Self {
        FieldType::Scalar(scalar)
    }

    /// Create an optional scalar field type.
    pub fn optional_scalar(scalar: ScalarType) -> Self {
        FieldType::OptionalScalar(scalar)
    }

    /// Create a reference to an entity.
    pub fn reference(module: impl Into<String>, entity: impl Into<String>) -> Self {
        FieldType::Reference {
            module: module.into(),
            entity: entity.into(),
        }
    }

    /// Check if this type is nullable.
    pub fn is_nullable(&self) -> bool {
        matches!(self, FieldType::OptionalScalar(_))
    }

    /// Get the inner scalar type if this is a scalar-based type.
    pub fn scalar_type(&self) -> Option<&ScalarType> {
        match self {
            FieldType::Scalar(s) | FieldType::OptionalScalar(s) | FieldType::ArrayScalar(s) => {
                Some(s)
            }
            _ => None,
        }
    }
}
