//! The subtype relation (`A <: B`) with type-variable bindings.
//!
//! Dispatch is built on this relation, so the rules here are the contract:
//!
//! - reflexive, transitive, antisymmetric w.r.t. type identity;
//! - nominal types relate through the lattice's parent edges;
//! - parametric element slots are invariant (`Array{Int64,1}` is NOT a
//!   subtype of `Array{Real,1}`); tuples are covariant;
//! - `A <: Union{...}` iff `A <: Ui` for some member, `Union{...} <: B` iff
//!   every member is `<: B`;
//! - `A <: (X where T<:U)` iff some `T* <: U` makes `A <: X[T:=T*]` hold.
//!
//! When a signature mentions where-clause variables, matching records the
//! discovered instantiations in a bindings map. A variable occurring in
//! several parameters must bind consistently: `f(x::T, y::T) where T` does
//! not accept `(Int64, Float64)`.

use std::collections::HashMap;

use super::lattice::{core_types, TypeLattice};
use super::ty::{Ty, TyArg};
use super::type_param::TypeParam;

/// Bindings discovered while matching signature type variables.
pub type Bindings = HashMap<String, TyArg>;

/// Check `a <: b` with no open type variables.
pub fn is_subtype(a: &Ty, b: &Ty, lat: &TypeLattice) -> bool {
    let mut bindings = Bindings::new();
    subtype_env(a, b, lat, &[], &mut bindings)
}

/// Check `a <: b` where `b` may mention the open variables in `vars`.
/// Successful matches record variable instantiations into `bindings`;
/// a variable bound earlier must re-bind to the identical type.
pub fn subtype_env(
    a: &Ty,
    b: &Ty,
    lat: &TypeLattice,
    vars: &[TypeParam],
    bindings: &mut Bindings,
) -> bool {
    if a == b {
        return true;
    }

    // Union{T1, T2, ...} <: U iff every member is <: U.
    // The empty union (bottom) is a subtype of everything.
    if let Ty::Union(members) = a {
        return members.iter().all(|m| subtype_env(m, b, lat, vars, bindings));
    }

    // A variable on the left stands for whatever it is bound to, or its
    // declared upper bound when unbound (sound over-approximation).
    if let Ty::Var(name) = a {
        let resolved = resolve_var(name, vars, bindings);
        return subtype_env(&resolved, b, lat, vars, bindings);
    }

    // `(X where T) <: B` is checked against the bound-erased body.
    if let Ty::UnionAll { var, bound, body } = a {
        let replacement = bound.as_deref().cloned().unwrap_or_else(Ty::any);
        let erased = body.substitute(var, &replacement);
        return subtype_env(&erased, b, lat, vars, bindings);
    }

    match b {
        // T <: Union{T1, T2, ...} iff T <: Ti for some member.
        Ty::Union(members) => members.iter().any(|m| subtype_env(a, m, lat, vars, bindings)),

        Ty::Var(name) => bind_var(name, TyArg::Ty(a.clone()), lat, vars, bindings),

        Ty::UnionAll { var, bound, body } => {
            let mut extended = vars.to_vec();
            extended.push(TypeParam {
                name: var.clone(),
                upper_bound: bound.as_deref().cloned(),
                lower_bound: None,
            });
            // The quantified variable is scoped to this check.
            let shadowed = bindings.remove(var);
            let ok = subtype_env(a, body, lat, &extended, bindings);
            bindings.remove(var);
            if let Some(prev) = shadowed {
                bindings.insert(var.clone(), prev);
            }
            ok
        }

        Ty::Named(target) => match a {
            Ty::Named(id) | Ty::Applied(id, _) => lat.is_ancestor(*target, *id),
            Ty::Tuple(_) => lat.is_ancestor(*target, core_types::TUPLE),
            Ty::TypeOf(_) => lat.is_ancestor(*target, core_types::DATA_TYPE),
            _ => false,
        },

        Ty::Applied(target, params) => match a {
            Ty::Applied(id, args) if id == target && args.len() == params.len() => args
                .iter()
                .zip(params.iter())
                .all(|(arg, param)| tyarg_invariant_match(arg, param, lat, vars, bindings)),
            _ => false,
        },

        Ty::Tuple(params) => match a {
            Ty::Tuple(elems) if elems.len() == params.len() => elems
                .iter()
                .zip(params.iter())
                .all(|(e, p)| subtype_env(e, p, lat, vars, bindings)),
            _ => false,
        },

        // Type{T} matches exactly the type object T (invariant), or binds T.
        Ty::TypeOf(inner) => match a {
            Ty::TypeOf(actual) => match inner.as_ref() {
                Ty::Var(name) if is_open_var(name, vars) => {
                    bind_var(name, TyArg::Ty(actual.as_ref().clone()), lat, vars, bindings)
                }
                _ => actual == inner,
            },
            _ => false,
        },
    }
}

fn is_open_var(name: &str, vars: &[TypeParam]) -> bool {
    vars.iter().any(|p| p.name == name)
}

fn resolve_var(name: &str, vars: &[TypeParam], bindings: &Bindings) -> Ty {
    if let Some(TyArg::Ty(t)) = bindings.get(name) {
        return t.clone();
    }
    vars.iter()
        .find(|p| p.name == name)
        .and_then(|p| p.upper_bound.clone())
        .unwrap_or_else(Ty::any)
}

/// Verify the upper/lower bound of `name` against a candidate instantiation.
fn check_var_bound(
    name: &str,
    candidate: &Ty,
    lat: &TypeLattice,
    vars: &[TypeParam],
    bindings: &mut Bindings,
) -> bool {
    let Some(param) = vars.iter().find(|p| p.name == name) else {
        return true;
    };
    if let Some(upper) = &param.upper_bound {
        if !subtype_env(candidate, upper, lat, vars, bindings) {
            return false;
        }
    }
    if let Some(lower) = &param.lower_bound {
        if !subtype_env(lower, candidate, lat, vars, bindings) {
            return false;
        }
    }
    true
}

/// Bind an open variable, or verify consistency with its existing binding.
/// Variables not in scope are treated as `Any` (malformed signatures match
/// permissively rather than silently failing dispatch).
fn bind_var(
    name: &str,
    value: TyArg,
    lat: &TypeLattice,
    vars: &[TypeParam],
    bindings: &mut Bindings,
) -> bool {
    if !is_open_var(name, vars) {
        return true;
    }
    if let Some(existing) = bindings.get(name) {
        return *existing == value;
    }
    if let TyArg::Ty(t) = &value {
        let candidate = t.clone();
        if !check_var_bound(name, &candidate, lat, vars, bindings) {
            return false;
        }
    }
    bindings.insert(name.to_string(), value);
    true
}

/// Invariant match for a parametric element slot: the argument must equal the
/// parameter, except that open variables bind and nested applications recurse
/// position-wise.
fn tyarg_invariant_match(
    arg: &TyArg,
    param: &TyArg,
    lat: &TypeLattice,
    vars: &[TypeParam],
    bindings: &mut Bindings,
) -> bool {
    match (arg, param) {
        (TyArg::Int(a), TyArg::Int(b)) => a == b,
        (TyArg::Int(n), TyArg::Ty(Ty::Var(name))) => {
            bind_var(name, TyArg::Int(*n), lat, vars, bindings)
        }
        (TyArg::Ty(a), TyArg::Ty(p)) => ty_invariant_match(a, p, lat, vars, bindings),
        _ => false,
    }
}

fn ty_invariant_match(
    arg: &Ty,
    param: &Ty,
    lat: &TypeLattice,
    vars: &[TypeParam],
    bindings: &mut Bindings,
) -> bool {
    match param {
        Ty::Var(name) if is_open_var(name, vars) => {
            bind_var(name, TyArg::Ty(arg.clone()), lat, vars, bindings)
        }
        Ty::Applied(pid, pargs) => match arg {
            Ty::Applied(aid, aargs) if aid == pid && aargs.len() == pargs.len() => aargs
                .iter()
                .zip(pargs.iter())
                .all(|(a, p)| tyarg_invariant_match(a, p, lat, vars, bindings)),
            _ => false,
        },
        Ty::Tuple(pelems) => match arg {
            Ty::Tuple(aelems) if aelems.len() == pelems.len() => aelems
                .iter()
                .zip(pelems.iter())
                .all(|(a, p)| ty_invariant_match(a, p, lat, vars, bindings)),
            _ => false,
        },
        _ => arg == param,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::core_types as c;

    fn lat() -> TypeLattice {
        TypeLattice::bootstrap()
    }

    fn named(id: crate::types::TypeId) -> Ty {
        Ty::Named(id)
    }

    fn complex_of(t: Ty) -> Ty {
        Ty::Applied(c::COMPLEX, vec![TyArg::Ty(t)])
    }

    fn vector_of(t: Ty) -> Ty {
        Ty::Applied(c::ARRAY, vec![TyArg::Ty(t), TyArg::Int(1)])
    }

    #[test]
    fn test_subtype_reflexive() {
        let lat = lat();
        for t in [
            named(c::INT64),
            named(c::NUMBER),
            complex_of(named(c::INT64)),
            Ty::Tuple(vec![named(c::INT64), named(c::STRING)]),
            Ty::Union(vec![named(c::INT64), named(c::MISSING)]),
        ] {
            assert!(is_subtype(&t, &t, &lat), "{:?} <: itself", t);
        }
    }

    #[test]
    fn test_subtype_numeric_tower() {
        let lat = lat();
        assert!(is_subtype(&named(c::INT64), &named(c::INTEGER), &lat));
        assert!(is_subtype(&named(c::INT64), &named(c::REAL), &lat));
        assert!(is_subtype(&named(c::INT64), &named(c::NUMBER), &lat));
        assert!(is_subtype(&named(c::INT64), &named(c::ANY), &lat));
        assert!(is_subtype(&named(c::BOOL), &named(c::INTEGER), &lat));
        assert!(!is_subtype(&named(c::BOOL), &named(c::SIGNED), &lat));
        assert!(!is_subtype(&named(c::INT64), &named(c::FLOAT64), &lat));
        assert!(!is_subtype(&named(c::STRING), &named(c::NUMBER), &lat));
    }

    #[test]
    fn test_subtype_transitive_over_samples() {
        let lat = lat();
        let samples = [
            named(c::INT64),
            named(c::SIGNED),
            named(c::INTEGER),
            named(c::REAL),
            named(c::NUMBER),
            named(c::ANY),
            named(c::FLOAT64),
            named(c::ABSTRACT_FLOAT),
            complex_of(named(c::INT64)),
            Ty::Union(vec![named(c::INT64), named(c::FLOAT64)]),
            Ty::bottom(),
        ];
        for a in &samples {
            for b in &samples {
                for ct in &samples {
                    if is_subtype(a, b, &lat) && is_subtype(b, ct, &lat) {
                        assert!(
                            is_subtype(a, ct, &lat),
                            "transitivity violated: {:?} <: {:?} <: {:?}",
                            a,
                            b,
                            ct
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_bottom_is_subtype_of_everything() {
        let lat = lat();
        assert!(is_subtype(&Ty::bottom(), &named(c::INT64), &lat));
        assert!(is_subtype(&Ty::bottom(), &Ty::bottom(), &lat));
        assert!(!is_subtype(&named(c::INT64), &Ty::bottom(), &lat));
    }

    #[test]
    fn test_parametric_invariance() {
        let lat = lat();
        // Vector{Int64} <: Vector{Real} is FALSE (invariance)
        assert!(!is_subtype(
            &vector_of(named(c::INT64)),
            &vector_of(named(c::REAL)),
            &lat
        ));
        // But Vector{Int64} <: AbstractArray (erasure walks the lattice)
        assert!(is_subtype(
            &vector_of(named(c::INT64)),
            &named(c::ABSTRACT_ARRAY),
            &lat
        ));
        // And Complex{Int64} <: Complex <: Number
        assert!(is_subtype(
            &complex_of(named(c::INT64)),
            &named(c::COMPLEX),
            &lat
        ));
        assert!(is_subtype(
            &complex_of(named(c::INT64)),
            &named(c::NUMBER),
            &lat
        ));
    }

    #[test]
    fn test_tuple_covariance() {
        let lat = lat();
        let t1 = Ty::Tuple(vec![named(c::INT64), named(c::FLOAT64)]);
        let t2 = Ty::Tuple(vec![named(c::INTEGER), named(c::REAL)]);
        assert!(is_subtype(&t1, &t2, &lat));
        assert!(!is_subtype(&t2, &t1, &lat));
        // Arity must match
        let t3 = Ty::Tuple(vec![named(c::INT64)]);
        assert!(!is_subtype(&t3, &t2, &lat));
    }

    #[test]
    fn test_union_rules() {
        let lat = lat();
        let int_or_missing = Ty::Union(vec![named(c::INT64), named(c::MISSING)]);
        assert!(is_subtype(&named(c::INT64), &int_or_missing, &lat));
        assert!(is_subtype(&named(c::MISSING), &int_or_missing, &lat));
        assert!(!is_subtype(&named(c::FLOAT64), &int_or_missing, &lat));
        // Union on the left: every member must fit
        assert!(is_subtype(&int_or_missing, &Ty::any(), &lat));
        assert!(!is_subtype(&int_or_missing, &named(c::INTEGER), &lat));
        let small_union = Ty::Union(vec![named(c::INT64), named(c::INT32)]);
        assert!(is_subtype(&small_union, &named(c::SIGNED), &lat));
    }

    #[test]
    fn test_unionall_instantiation() {
        let lat = lat();
        // Vector{Int64} <: (Vector{T} where T<:Real)
        let vec_where = Ty::UnionAll {
            var: "T".to_string(),
            bound: Some(Box::new(named(c::REAL))),
            body: Box::new(vector_of(Ty::Var("T".to_string()))),
        };
        assert!(is_subtype(&vector_of(named(c::INT64)), &vec_where, &lat));
        // Vector{String} does not satisfy the bound
        assert!(!is_subtype(&vector_of(named(c::STRING)), &vec_where, &lat));
        // A bare Int64 is not a Vector at all
        assert!(!is_subtype(&named(c::INT64), &vec_where, &lat));
    }

    #[test]
    fn test_shared_variable_binds_consistently() {
        let lat = lat();
        let vars = vec![TypeParam::new("T")];
        let t_var = Ty::Var("T".to_string());

        let mut bindings = Bindings::new();
        assert!(subtype_env(&named(c::INT64), &t_var, &lat, &vars, &mut bindings));
        // Second occurrence with the same type: fine
        assert!(subtype_env(&named(c::INT64), &t_var, &lat, &vars, &mut bindings));
        // Second occurrence with a different type: rejected
        assert!(!subtype_env(&named(c::FLOAT64), &t_var, &lat, &vars, &mut bindings));
        assert_eq!(
            bindings.get("T"),
            Some(&TyArg::Ty(named(c::INT64)))
        );
    }

    #[test]
    fn test_var_bound_is_enforced() {
        let lat = lat();
        let vars = vec![TypeParam::with_bound("T", named(c::REAL))];
        let t_var = Ty::Var("T".to_string());

        let mut bindings = Bindings::new();
        assert!(subtype_env(&named(c::INT64), &t_var, &lat, &vars, &mut bindings));

        let mut bindings = Bindings::new();
        assert!(!subtype_env(&named(c::STRING), &t_var, &lat, &vars, &mut bindings));
    }

    #[test]
    fn test_parametric_var_binding_extracts_element_type() {
        let lat = lat();
        let vars = vec![TypeParam::new("T")];
        let sig = complex_of(Ty::Var("T".to_string()));
        let mut bindings = Bindings::new();
        assert!(subtype_env(
            &complex_of(named(c::INT64)),
            &sig,
            &lat,
            &vars,
            &mut bindings
        ));
        assert_eq!(bindings.get("T"), Some(&TyArg::Ty(named(c::INT64))));
    }

    #[test]
    fn test_array_rank_binds_as_value_param() {
        let lat = lat();
        let vars = vec![TypeParam::new("T"), TypeParam::new("N")];
        let sig = Ty::Applied(
            c::ARRAY,
            vec![
                TyArg::Ty(Ty::Var("T".to_string())),
                TyArg::Ty(Ty::Var("N".to_string())),
            ],
        );
        let arg = Ty::Applied(c::ARRAY, vec![TyArg::Ty(named(c::FLOAT64)), TyArg::Int(2)]);
        let mut bindings = Bindings::new();
        assert!(subtype_env(&arg, &sig, &lat, &vars, &mut bindings));
        assert_eq!(bindings.get("T"), Some(&TyArg::Ty(named(c::FLOAT64))));
        assert_eq!(bindings.get("N"), Some(&TyArg::Int(2)));
    }

    #[test]
    fn test_typeof_pattern_matches_type_object_exactly() {
        let lat = lat();
        let type_int = Ty::TypeOf(Box::new(named(c::INT64)));
        let type_integer = Ty::TypeOf(Box::new(named(c::INTEGER)));
        // Type{Int64} <: Type{Int64}, but Type{Int64} is NOT <: Type{Integer}
        assert!(is_subtype(&type_int, &type_int, &lat));
        assert!(!is_subtype(&type_int, &type_integer, &lat));
        // Type objects are DataType values
        assert!(is_subtype(&type_int, &named(c::DATA_TYPE), &lat));
        assert!(is_subtype(&type_int, &named(c::TYPE), &lat));
    }

    #[test]
    fn test_typeof_var_binds_the_type_object() {
        let lat = lat();
        let vars = vec![TypeParam::with_bound("T", named(c::NUMBER))];
        let sig = Ty::TypeOf(Box::new(Ty::Var("T".to_string())));
        let mut bindings = Bindings::new();
        assert!(subtype_env(
            &Ty::TypeOf(Box::new(named(c::FLOAT64))),
            &sig,
            &lat,
            &vars,
            &mut bindings
        ));
        assert_eq!(bindings.get("T"), Some(&TyArg::Ty(named(c::FLOAT64))));
        // Bound violation: Type{String} does not match Type{T<:Number}
        let mut bindings = Bindings::new();
        assert!(!subtype_env(
            &Ty::TypeOf(Box::new(named(c::STRING))),
            &sig,
            &lat,
            &vars,
            &mut bindings
        ));
    }

    #[test]
    fn test_user_registered_types_participate() {
        let mut lat = lat();
        let shape = lat.register_abstract("Shape", c::ANY).unwrap();
        let circle = lat
            .register_struct("Circle", shape, Vec::new(), false, Vec::new())
            .unwrap();
        assert!(is_subtype(&named(circle), &named(shape), &lat));
        assert!(is_subtype(&named(circle), &Ty::any(), &lat));
        assert!(!is_subtype(&named(shape), &named(circle), &lat));
    }
}
