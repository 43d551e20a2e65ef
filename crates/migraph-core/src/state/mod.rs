//! Schema state model.
//!
//! A pure, in-memory description of every entity known at a point in the
//! migration history. States are only changed by applying actions.

pub mod entity;
pub mod field;
pub mod schema;
pub mod types;

pub use entity::{EntityKey, EntityState};
pub use field::{DefaultValue, FieldDef};
pub use schema::SchemaState;
pub use types::{FieldType, ScalarType};
