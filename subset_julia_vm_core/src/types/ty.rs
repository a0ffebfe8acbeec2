//! Structural type expressions.
//!
//! A [`Ty`] is the runtime representation of a type: nominal leaves reference
//! the lattice arena by id, composites (parametric applications, tuples,
//! unions, `UnionAll`) are built structurally on top. `Ty` values flow
//! through dispatch signatures, `typeof` results, return annotations, and
//! `DataType` values.

use serde::{Deserialize, Serialize};

use super::lattice::{core_types, TypeId, TypeLattice};

/// A type parameter argument: either a type or an integer value
/// (`Array{Float64,2}` carries the rank 2 as a value parameter).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TyArg {
    Ty(Ty),
    Int(i64),
}

/// A structural type expression over the nominal lattice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ty {
    /// A nominal type by arena id (`Int64`, `Number`, a user struct, or the
    /// erasure of a parametric type such as bare `Complex`).
    Named(TypeId),
    /// A parametric type constructor applied to arguments: `Complex{Int64}`,
    /// `Array{Float64,2}`, `Rational{Int64}`, `Point{T}`.
    Applied(TypeId, Vec<TyArg>),
    /// Covariant tuple type `Tuple{T1, T2, ...}`.
    Tuple(Vec<Ty>),
    /// Finite union; the empty union is the bottom type.
    Union(Vec<Ty>),
    /// Universal quantification `body where var <: bound`.
    UnionAll {
        var: String,
        bound: Option<Box<Ty>>,
        body: Box<Ty>,
    },
    /// An occurrence of a where-clause type variable.
    Var(String),
    /// The `Type{T}` dispatch pattern: matches the type object `T` itself.
    TypeOf(Box<Ty>),
}

impl Ty {
    /// The bottom type `Union{}`.
    pub fn bottom() -> Ty {
        Ty::Union(Vec::new())
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, Ty::Union(members) if members.is_empty())
    }

    pub fn any() -> Ty {
        Ty::Named(core_types::ANY)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Ty::Named(id) if *id == core_types::ANY)
    }

    /// Head constructor id for nominal and parametric types.
    pub fn head(&self) -> Option<TypeId> {
        match self {
            Ty::Named(id) | Ty::Applied(id, _) => Some(*id),
            Ty::Tuple(_) => Some(core_types::TUPLE),
            _ => None,
        }
    }

    /// Build a `Union`, flattening nested unions and deduplicating members.
    /// A single-member union collapses to the member itself.
    pub fn union_of(members: Vec<Ty>) -> Ty {
        let mut flat: Vec<Ty> = Vec::new();
        for m in members {
            match m {
                Ty::Union(inner) => {
                    for t in inner {
                        if !flat.contains(&t) {
                            flat.push(t);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        if flat.len() == 1 {
            flat.pop().unwrap()
        } else {
            Ty::Union(flat)
        }
    }

    /// Remove `Missing` from a union. `Missing` itself collapses to the
    /// bottom type; types not involving `Missing` are returned unchanged.
    pub fn nonmissingtype(&self) -> Ty {
        let missing = Ty::Named(core_types::MISSING);
        match self {
            t if *t == missing => Ty::bottom(),
            Ty::Union(members) => {
                let kept: Vec<Ty> = members.iter().filter(|m| **m != missing).cloned().collect();
                Ty::union_of(kept)
            }
            other => other.clone(),
        }
    }

    /// Substitute every free occurrence of `var_name` with `replacement`.
    /// A `UnionAll` binding the same name shadows the substitution.
    pub fn substitute(&self, var_name: &str, replacement: &Ty) -> Ty {
        match self {
            Ty::Var(name) if name == var_name => replacement.clone(),
            Ty::Var(_) | Ty::Named(_) => self.clone(),
            Ty::Applied(id, args) => Ty::Applied(
                *id,
                args.iter()
                    .map(|arg| match arg {
                        TyArg::Ty(t) => TyArg::Ty(t.substitute(var_name, replacement)),
                        TyArg::Int(n) => TyArg::Int(*n),
                    })
                    .collect(),
            ),
            Ty::Tuple(elems) => Ty::Tuple(
                elems
                    .iter()
                    .map(|t| t.substitute(var_name, replacement))
                    .collect(),
            ),
            Ty::Union(members) => Ty::Union(
                members
                    .iter()
                    .map(|t| t.substitute(var_name, replacement))
                    .collect(),
            ),
            Ty::UnionAll { var, bound, body } => {
                if var == var_name {
                    self.clone()
                } else {
                    Ty::UnionAll {
                        var: var.clone(),
                        bound: bound
                            .as_ref()
                            .map(|b| Box::new(b.substitute(var_name, replacement))),
                        body: Box::new(body.substitute(var_name, replacement)),
                    }
                }
            }
            Ty::TypeOf(inner) => Ty::TypeOf(Box::new(inner.substitute(var_name, replacement))),
        }
    }

    /// True if the expression contains a free type variable.
    pub fn has_free_vars(&self) -> bool {
        match self {
            Ty::Var(_) => true,
            Ty::Named(_) => false,
            Ty::Applied(_, args) => args.iter().any(|a| match a {
                TyArg::Ty(t) => t.has_free_vars(),
                TyArg::Int(_) => false,
            }),
            Ty::Tuple(elems) => elems.iter().any(Ty::has_free_vars),
            Ty::Union(members) => members.iter().any(Ty::has_free_vars),
            Ty::UnionAll { var, body, .. } => {
                // The bound variable is no longer free inside the body.
                body.substitute(var, &Ty::any()).has_free_vars()
            }
            Ty::TypeOf(inner) => inner.has_free_vars(),
        }
    }

    /// Whether this type is concrete: a leaf that a value can report from
    /// `typeof`. Abstract nominal types, unions, unquantified variables and
    /// `UnionAll`s are not concrete.
    pub fn is_concrete(&self, lat: &TypeLattice) -> bool {
        match self {
            Ty::Named(id) => lat.is_concrete(*id) && lat.node(*id).arity() == 0,
            Ty::Applied(id, args) => {
                lat.is_concrete(*id)
                    && args.iter().all(|arg| match arg {
                        TyArg::Ty(t) => t.is_concrete(lat),
                        TyArg::Int(_) => true,
                    })
            }
            Ty::Tuple(elems) => elems.iter().all(|t| t.is_concrete(lat)),
            Ty::TypeOf(_) => true,
            Ty::Union(_) | Ty::UnionAll { .. } | Ty::Var(_) => false,
        }
    }

    /// Render with names resolved through the lattice.
    pub fn display(&self, lat: &TypeLattice) -> String {
        match self {
            Ty::Named(id) => lat.name(*id).to_string(),
            Ty::Applied(id, args) => {
                let rendered: Vec<String> = args
                    .iter()
                    .map(|arg| match arg {
                        TyArg::Ty(t) => t.display(lat),
                        TyArg::Int(n) => n.to_string(),
                    })
                    .collect();
                format!("{}{{{}}}", lat.name(*id), rendered.join(", "))
            }
            Ty::Tuple(elems) => {
                let rendered: Vec<String> = elems.iter().map(|t| t.display(lat)).collect();
                format!("Tuple{{{}}}", rendered.join(", "))
            }
            Ty::Union(members) => {
                let rendered: Vec<String> = members.iter().map(|t| t.display(lat)).collect();
                format!("Union{{{}}}", rendered.join(", "))
            }
            Ty::UnionAll { var, bound, body } => match bound {
                Some(b) => format!("{} where {}<:{}", body.display(lat), var, b.display(lat)),
                None => format!("{} where {}", body.display(lat), var),
            },
            Ty::Var(name) => name.clone(),
            Ty::TypeOf(inner) => format!("Type{{{}}}", inner.display(lat)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonmissingtype_removes_missing_from_union() {
        let missing = Ty::Named(core_types::MISSING);
        let int64 = Ty::Named(core_types::INT64);
        let union = Ty::Union(vec![int64.clone(), missing.clone()]);
        assert_eq!(union.nonmissingtype(), int64);
    }

    #[test]
    fn test_nonmissingtype_of_missing_is_bottom() {
        assert!(Ty::Named(core_types::MISSING).nonmissingtype().is_bottom());
    }

    #[test]
    fn test_nonmissingtype_without_missing_is_identity() {
        let t = Ty::Union(vec![
            Ty::Named(core_types::INT64),
            Ty::Named(core_types::FLOAT64),
        ]);
        assert_eq!(t.nonmissingtype(), t);
    }

    #[test]
    fn test_substitute_in_applied() {
        let vec_t = Ty::Applied(
            core_types::ARRAY,
            vec![TyArg::Ty(Ty::Var("T".to_string())), TyArg::Int(1)],
        );
        let vec_int = vec_t.substitute("T", &Ty::Named(core_types::INT64));
        assert_eq!(
            vec_int,
            Ty::Applied(
                core_types::ARRAY,
                vec![TyArg::Ty(Ty::Named(core_types::INT64)), TyArg::Int(1)],
            )
        );
    }

    #[test]
    fn test_substitute_shadowed_by_unionall() {
        let inner = Ty::UnionAll {
            var: "T".to_string(),
            bound: None,
            body: Box::new(Ty::Var("T".to_string())),
        };
        // Substitution must not reach under the shadowing binder
        assert_eq!(inner.substitute("T", &Ty::Named(core_types::INT64)), inner);
    }

    #[test]
    fn test_union_of_flattens_and_dedups() {
        let int64 = Ty::Named(core_types::INT64);
        let f64t = Ty::Named(core_types::FLOAT64);
        let nested = Ty::union_of(vec![
            int64.clone(),
            Ty::Union(vec![int64.clone(), f64t.clone()]),
        ]);
        assert_eq!(nested, Ty::Union(vec![int64, f64t]));
    }

    #[test]
    fn test_union_of_single_member_collapses() {
        let int64 = Ty::Named(core_types::INT64);
        assert_eq!(Ty::union_of(vec![int64.clone()]), int64);
    }

    #[test]
    fn test_display_with_lattice() {
        let lat = TypeLattice::bootstrap();
        let complex_int = Ty::Applied(
            core_types::COMPLEX,
            vec![TyArg::Ty(Ty::Named(core_types::INT64))],
        );
        assert_eq!(complex_int.display(&lat), "Complex{Int64}");
        let matrix = Ty::Applied(
            core_types::ARRAY,
            vec![TyArg::Ty(Ty::Named(core_types::FLOAT64)), TyArg::Int(2)],
        );
        assert_eq!(matrix.display(&lat), "Array{Float64, 2}");
    }
}
