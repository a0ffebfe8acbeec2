//! Type system for the core engine.
//!
//! The lattice has a single top (`Any`) and a single bottom (the empty
//! union). Nominal types (concrete leaves and abstract internal nodes) live
//! in an id-indexed arena ([`TypeLattice`]); composite types (parametric
//! applications, tuples, unions, `UnionAll`) are structural expressions
//! ([`Ty`]) whose leaves reference arena ids. Parent/child edges are ids,
//! never owned references, so the registry stays cycle-free.
//!
//! # Sub-modules
//!
//! - `lattice`: the nominal-type arena and bootstrap hierarchy
//! - `ty`: structural type expressions and substitution
//! - `subtype`: the subtype relation with type-variable bindings
//! - `type_param`: where-clause type parameter declarations
//! - `promotion`: numeric promotion fallback rules
//! - `dispatch_error`: method dispatch error types

mod dispatch_error;
mod lattice;
mod promotion;
mod subtype;
mod ty;
mod type_param;

pub use dispatch_error::DispatchError;
pub use lattice::{core_types, Field, LatticeError, TypeId, TypeKind, TypeLattice, TypeNode};
pub use promotion::{fallback_promote, numeric_priority};
pub use subtype::{is_subtype, subtype_env, Bindings};
pub use ty::{Ty, TyArg};
pub use type_param::TypeParam;
