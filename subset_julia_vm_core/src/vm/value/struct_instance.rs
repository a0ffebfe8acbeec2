//! User-defined struct instances.

use std::cell::RefCell;
use std::rc::Rc;

use crate::types::{Ty, TypeId};

use super::value_enum::Value;

/// An instance of a registered concrete type.
///
/// `ty` is the fully-applied type (`Point{Float64}`, not bare `Point`), so
/// `typeof` reflects the actual parameters without consulting the lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct StructInstance {
    pub type_id: TypeId,
    pub ty: Ty,
    pub values: Vec<Value>,
}

impl StructInstance {
    pub fn new(type_id: TypeId, ty: Ty, values: Vec<Value>) -> Self {
        Self {
            type_id,
            ty,
            values,
        }
    }

    pub fn field(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }
}

/// Heap handle for `mutable struct` instances: every alias observes
/// mutations.
pub type StructRef = Rc<RefCell<StructInstance>>;
