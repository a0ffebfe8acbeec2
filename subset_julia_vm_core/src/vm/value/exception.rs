//! Exception values.
//!
//! Thrown errors travel as ordinary values so catch blocks can inspect them
//! (`e isa MethodError`, field access, rethrow). The `ty` id points at the
//! exception's node in the lattice; handler narrowing is a subtype check
//! against it.

use crate::types::TypeId;

use super::value_enum::Value;

/// A thrown exception: its lattice type, a rendered message, and any
/// payload fields the taxonomy prescribes (`DomainError` carries the value,
/// `MethodError` the function name and argument types, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionValue {
    pub ty: TypeId,
    pub message: String,
    pub fields: Vec<(String, Value)>,
}

impl ExceptionValue {
    pub fn new(ty: TypeId, message: impl Into<String>) -> Self {
        Self {
            ty,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_fields(
        ty: TypeId,
        message: impl Into<String>,
        fields: Vec<(String, Value)>,
    ) -> Self {
        Self {
            ty,
            message: message.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}
