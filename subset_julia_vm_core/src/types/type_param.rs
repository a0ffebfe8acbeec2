//! Type parameter declarations with optional bounds.
//!
//! `TypeParam` represents where-clause declarations like `T`, `T<:Number`,
//! or `Integer<:T<:Real`. Bounds are full type expressions so user-defined
//! abstract types work as bounds.

use serde::{Deserialize, Serialize};

use super::Ty;

/// A type parameter declaration with optional upper and lower bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParam {
    /// The name of the type parameter (e.g., "T", "S")
    pub name: String,
    /// Optional upper bound: `T<:Number` means T must be a subtype of Number.
    #[serde(default)]
    pub upper_bound: Option<Ty>,
    /// Optional lower bound: `T>:Integer` means Integer must be a subtype of T.
    #[serde(default)]
    pub lower_bound: Option<Ty>,
}

impl TypeParam {
    /// Create a new unbounded type parameter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            upper_bound: None,
            lower_bound: None,
        }
    }

    /// Create a new type parameter with an upper bound.
    pub fn with_bound(name: impl Into<String>, bound: Ty) -> Self {
        Self {
            name: name.into(),
            upper_bound: Some(bound),
            lower_bound: None,
        }
    }

    pub fn has_constraints(&self) -> bool {
        self.upper_bound.is_some() || self.lower_bound.is_some()
    }
}
