//! Method table for multiple dispatch support.
//!
//! Each generic function name binds an ordered list of methods. Dispatch for
//! runtime argument types `(A1,…,An)`:
//!
//! 1. collect every method whose signature is applicable (`Ai <: Si` under
//!    the subtype relation, with all type-variable bindings satisfiable
//!    simultaneously);
//! 2. keep the maxima of the specificity partial order (`M` is more
//!    specific than `M'` iff each `Si <: S'i` with at least one strict);
//! 3. a unique maximum wins; several incomparable maxima raise
//!    `AmbiguityError`; an empty applicable set raises `MethodError`.
//!
//! Bindings discovered during matching are returned to the caller, which
//! installs them into the callee frame — on every path, including the
//! specialised-opcode fallback.
//!
//! Builtins are registered through the same table, so a user method with a
//! more specific signature takes precedence over a native one.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::types::{
    core_types, subtype_env, Bindings, DispatchError, Ty, TyArg, TypeLattice, TypeParam,
};
use crate::vm::value::Value;
use crate::vm::{Vm, VmError};

/// A native method implementation. Executes without pushing an interpreted
/// frame.
pub type NativeFn = fn(&mut Vm, Vec<Value>) -> Result<Value, VmError>;

/// What runs when a method is selected.
#[derive(Clone, Copy)]
pub enum MethodBody {
    /// Index into the program's function table.
    Bytecode { fn_index: usize },
    /// A builtin.
    Native(NativeFn),
}

impl std::fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodBody::Bytecode { fn_index } => {
                f.debug_struct("Bytecode").field("fn_index", fn_index).finish()
            }
            MethodBody::Native(_) => f.write_str("Native(..)"),
        }
    }
}

/// One (signature, body) pair belonging to a generic function.
#[derive(Debug, Clone)]
pub struct Method {
    pub sig: Vec<Ty>,
    /// Where-clause type parameters with bounds.
    pub type_params: Vec<TypeParam>,
    pub body: MethodBody,
}

/// A named callable whose behaviour is the union of its registered methods.
#[derive(Debug, Clone, Default)]
pub struct GenericFunction {
    pub methods: Vec<Method>,
}

/// The outcome of a successful dispatch: which body to run and the type
/// variable bindings discovered while matching.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub body: MethodBody,
    pub bindings: Bindings,
    pub method_index: usize,
}

/// Registry of all generic functions, with a dispatch cache invalidated by
/// a monotonic version counter.
#[derive(Debug, Default)]
pub struct MethodRegistry {
    tables: HashMap<String, GenericFunction>,
    /// Bumped on every mutation; cache entries remember the version they
    /// were filled at and are ignored when stale.
    version: u64,
    #[allow(clippy::type_complexity)]
    dispatch_cache: RefCell<HashMap<(String, Vec<Ty>), (usize, u64)>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn function(&self, name: &str) -> Option<&GenericFunction> {
        self.tables.get(name)
    }

    /// Register a method. Re-registration of the same signature replaces the
    /// prior body (last writer wins).
    pub fn add_method(
        &mut self,
        name: &str,
        sig: Vec<Ty>,
        type_params: Vec<TypeParam>,
        body: MethodBody,
    ) {
        let gf = self.tables.entry(name.to_string()).or_default();
        let method = Method {
            sig,
            type_params,
            body,
        };
        if let Some(pos) = gf
            .methods
            .iter()
            .position(|m| m.sig == method.sig && m.type_params == method.type_params)
        {
            gf.methods[pos] = method;
        } else {
            gf.methods.push(method);
        }
        self.version += 1;
        self.dispatch_cache.borrow_mut().clear();
    }

    /// Register a native method (builtin bootstrap surface).
    pub fn add_native(&mut self, name: &str, sig: Vec<Ty>, f: NativeFn) {
        self.add_method(name, sig, Vec::new(), MethodBody::Native(f));
    }

    /// Find the unique most-specific applicable method for the call.
    pub fn dispatch(
        &self,
        name: &str,
        arg_types: &[Ty],
        lat: &TypeLattice,
    ) -> Result<DispatchResult, DispatchError> {
        let Some(gf) = self.tables.get(name) else {
            return Err(no_method_error(name, arg_types, lat));
        };

        // Cache fast path: a hit re-derives only the bindings for the
        // remembered method.
        let cache_key = (name.to_string(), arg_types.to_vec());
        if let Some(&(idx, stamp)) = self.dispatch_cache.borrow().get(&cache_key) {
            if stamp == self.version && idx < gf.methods.len() {
                if let Some(bindings) = match_method(&gf.methods[idx], arg_types, lat) {
                    return Ok(DispatchResult {
                        body: gf.methods[idx].body,
                        bindings,
                        method_index: idx,
                    });
                }
            }
        }

        let mut applicable: Vec<(usize, Bindings)> = Vec::new();
        for (idx, method) in gf.methods.iter().enumerate() {
            if method.sig.len() != arg_types.len() {
                continue;
            }
            if let Some(bindings) = match_method(method, arg_types, lat) {
                applicable.push((idx, bindings));
            }
        }

        if applicable.is_empty() {
            return Err(no_method_error(name, arg_types, lat));
        }

        // Keep the maxima of the specificity order.
        let maxima: Vec<&(usize, Bindings)> = applicable
            .iter()
            .filter(|(idx, _)| {
                !applicable.iter().any(|(other, _)| {
                    other != idx
                        && more_specific(&gf.methods[*other], &gf.methods[*idx], lat)
                })
            })
            .collect();

        if maxima.len() > 1 {
            // Incomparable maxima: dispatch is ambiguous.
            let candidates: Vec<String> = maxima
                .iter()
                .map(|(idx, _)| render_sig(name, &gf.methods[*idx].sig, lat))
                .collect();
            let message = format!(
                "MethodError: {} is ambiguous. Candidates:\n  {}",
                render_sig(name, arg_types, lat),
                candidates.join("\n  ")
            );
            return Err(DispatchError::AmbiguousMethod {
                name: name.to_string(),
                arg_types: arg_types.to_vec(),
                message,
            });
        }

        let (idx, bindings) = maxima[0];
        self.dispatch_cache
            .borrow_mut()
            .insert(cache_key, (*idx, self.version));
        Ok(DispatchResult {
            body: gf.methods[*idx].body,
            bindings: bindings.clone(),
            method_index: *idx,
        })
    }

    #[cfg(test)]
    pub(crate) fn cache_len(&self) -> usize {
        self.dispatch_cache.borrow().len()
    }
}

/// Check applicability of one method, returning the bindings on success.
fn match_method(method: &Method, arg_types: &[Ty], lat: &TypeLattice) -> Option<Bindings> {
    if method.sig.len() != arg_types.len() {
        return None;
    }
    let mut bindings = Bindings::new();
    for (arg, param) in arg_types.iter().zip(&method.sig) {
        if !subtype_env(arg, param, lat, &method.type_params, &mut bindings) {
            return None;
        }
    }
    Some(bindings)
}

fn no_method_error(name: &str, arg_types: &[Ty], lat: &TypeLattice) -> DispatchError {
    DispatchError::NoMethodFound {
        name: name.to_string(),
        arg_types: arg_types.to_vec(),
        message: format!(
            "MethodError: no method matching {}",
            render_sig(name, arg_types, lat)
        ),
    }
}

fn render_sig(name: &str, types: &[Ty], lat: &TypeLattice) -> String {
    let rendered: Vec<String> = types.iter().map(|t| format!("::{}", t.display(lat))).collect();
    format!("{}({})", name, rendered.join(", "))
}

/// `a` strictly more specific than `b`: every position at least as specific,
/// at least one strictly.
fn more_specific(a: &Method, b: &Method, lat: &TypeLattice) -> bool {
    let sig_a = erased_sig(a);
    let sig_b = erased_sig(b);
    if sig_a.len() != sig_b.len() {
        return false;
    }
    let mut strict = false;
    for (ta, tb) in sig_a.iter().zip(&sig_b) {
        if !spec_le(ta, tb, lat) {
            return false;
        }
        if !spec_le(tb, ta, lat) {
            strict = true;
        }
    }
    strict
}

/// Replace each where-clause variable with its upper bound (or `Any`) so
/// signatures compare without open variables.
fn erased_sig(method: &Method) -> Vec<Ty> {
    method
        .sig
        .iter()
        .map(|ty| {
            let mut erased = ty.clone();
            for tp in &method.type_params {
                let replacement = tp.upper_bound.clone().unwrap_or_else(Ty::any);
                erased = erased.substitute(&tp.name, &replacement);
            }
            erased
        })
        .collect()
}

/// The per-position specificity preorder: `a` at least as specific as `b`.
///
/// Unlike the subtype relation, parametric slots compare covariantly here,
/// which yields the intended tie-breaks: concrete outranks abstract, a
/// parametric instance outranks its `UnionAll` erasure, and a union is less
/// specific than each of its members.
fn spec_le(a: &Ty, b: &Ty, lat: &TypeLattice) -> bool {
    if a == b {
        return true;
    }
    match a {
        Ty::Union(members) => return members.iter().all(|m| spec_le(m, b, lat)),
        Ty::UnionAll { var, bound, body } => {
            let replacement = bound.as_deref().cloned().unwrap_or_else(Ty::any);
            return spec_le(&body.substitute(var, &replacement), b, lat);
        }
        Ty::Var(_) => return spec_le(&Ty::any(), b, lat),
        _ => {}
    }
    match b {
        Ty::Union(members) => members.iter().any(|m| spec_le(a, m, lat)),
        Ty::UnionAll { var, bound, body } => {
            let replacement = bound.as_deref().cloned().unwrap_or_else(Ty::any);
            spec_le(a, &body.substitute(var, &replacement), lat)
        }
        Ty::Var(_) => true,
        Ty::Named(nb) => match a {
            Ty::Named(na) | Ty::Applied(na, _) => lat.is_ancestor(*nb, *na),
            Ty::Tuple(_) => lat.is_ancestor(*nb, core_types::TUPLE),
            Ty::TypeOf(_) => lat.is_ancestor(*nb, core_types::DATA_TYPE),
            _ => false,
        },
        Ty::Applied(nb, bargs) => match a {
            Ty::Applied(na, aargs) if na == nb && aargs.len() == bargs.len() => aargs
                .iter()
                .zip(bargs)
                .all(|(x, y)| match (x, y) {
                    (TyArg::Int(p), TyArg::Int(q)) => p == q,
                    (TyArg::Ty(p), TyArg::Ty(q)) => spec_le(p, q, lat),
                    (TyArg::Int(_), TyArg::Ty(q)) => matches!(q, Ty::Var(_)) || q.is_any(),
                    (TyArg::Ty(_), TyArg::Int(_)) => false,
                }),
            _ => false,
        },
        Ty::Tuple(belems) => match a {
            Ty::Tuple(aelems) if aelems.len() == belems.len() => aelems
                .iter()
                .zip(belems)
                .all(|(x, y)| spec_le(x, y, lat)),
            _ => false,
        },
        Ty::TypeOf(bi) => match a {
            Ty::TypeOf(ai) => spec_le(ai, bi, lat),
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::core_types as c;

    fn nop(_vm: &mut Vm, _args: Vec<Value>) -> Result<Value, VmError> {
        Ok(Value::Nothing)
    }

    fn named(id: crate::types::TypeId) -> Ty {
        Ty::Named(id)
    }

    fn add(reg: &mut MethodRegistry, name: &str, sig: Vec<Ty>) {
        reg.add_method(name, sig, Vec::new(), MethodBody::Native(nop));
    }

    fn dispatch_index(reg: &MethodRegistry, name: &str, args: &[Ty]) -> Result<usize, DispatchError> {
        let lat = TypeLattice::bootstrap();
        reg.dispatch(name, args, &lat).map(|r| r.method_index)
    }

    #[test]
    fn test_concrete_beats_abstract() {
        let mut reg = MethodRegistry::new();
        add(&mut reg, "f", vec![named(c::NUMBER)]); // index 0
        add(&mut reg, "f", vec![named(c::INT64)]); // index 1
        assert_eq!(dispatch_index(&reg, "f", &[named(c::INT64)]), Ok(1));
        assert_eq!(dispatch_index(&reg, "f", &[named(c::FLOAT64)]), Ok(0));
    }

    #[test]
    fn test_bool_beats_integer_method() {
        let mut reg = MethodRegistry::new();
        add(&mut reg, "f", vec![named(c::INTEGER)]); // 0
        add(&mut reg, "f", vec![named(c::BOOL)]); // 1
        assert_eq!(dispatch_index(&reg, "f", &[named(c::BOOL)]), Ok(1));
        assert_eq!(dispatch_index(&reg, "f", &[named(c::INT64)]), Ok(0));
    }

    #[test]
    fn test_no_method_error() {
        let mut reg = MethodRegistry::new();
        add(&mut reg, "f", vec![named(c::STRING)]);
        let err = dispatch_index(&reg, "f", &[named(c::INT64)]).unwrap_err();
        assert!(matches!(err, DispatchError::NoMethodFound { .. }));
        assert!(err.to_string().contains("no method matching f(::Int64)"));
    }

    #[test]
    fn test_unknown_function_is_method_error() {
        let reg = MethodRegistry::new();
        let err = dispatch_index(&reg, "nope", &[named(c::INT64)]).unwrap_err();
        assert!(matches!(err, DispatchError::NoMethodFound { .. }));
    }

    #[test]
    fn test_ambiguous_incomparable_maxima() {
        // f(::Int64, ::Number) and f(::Number, ::Int64) are incomparable
        // maxima for (Int64, Int64).
        let mut reg = MethodRegistry::new();
        add(&mut reg, "f", vec![named(c::INT64), named(c::NUMBER)]);
        add(&mut reg, "f", vec![named(c::NUMBER), named(c::INT64)]);
        let err = dispatch_index(&reg, "f", &[named(c::INT64), named(c::INT64)]).unwrap_err();
        assert!(matches!(err, DispatchError::AmbiguousMethod { .. }));
        // A strictly more specific method resolves the ambiguity
        add(&mut reg, "f", vec![named(c::INT64), named(c::INT64)]);
        assert_eq!(
            dispatch_index(&reg, "f", &[named(c::INT64), named(c::INT64)]),
            Ok(2)
        );
    }

    #[test]
    fn test_union_less_specific_than_members() {
        let mut reg = MethodRegistry::new();
        add(
            &mut reg,
            "f",
            vec![Ty::Union(vec![named(c::INT64), named(c::FLOAT64)])],
        ); // 0
        add(&mut reg, "f", vec![named(c::INT64)]); // 1
        assert_eq!(dispatch_index(&reg, "f", &[named(c::INT64)]), Ok(1));
        assert_eq!(dispatch_index(&reg, "f", &[named(c::FLOAT64)]), Ok(0));
    }

    #[test]
    fn test_parametric_outranks_unionall_erasure() {
        let complex_int = Ty::Applied(c::COMPLEX, vec![TyArg::Ty(named(c::INT64))]);
        let mut reg = MethodRegistry::new();
        // f(z::Complex{T}) where T  — the erased signature
        reg.add_method(
            "f",
            vec![Ty::Applied(
                c::COMPLEX,
                vec![TyArg::Ty(Ty::Var("T".to_string()))],
            )],
            vec![TypeParam::new("T")],
            MethodBody::Native(nop),
        ); // 0
        // f(z::Complex{Int64}) — the instance
        add(&mut reg, "f", vec![complex_int.clone()]); // 1
        assert_eq!(dispatch_index(&reg, "f", &[complex_int]), Ok(1));
        let complex_f64 = Ty::Applied(c::COMPLEX, vec![TyArg::Ty(named(c::FLOAT64))]);
        assert_eq!(dispatch_index(&reg, "f", &[complex_f64]), Ok(0));
    }

    #[test]
    fn test_where_clause_bindings_returned() {
        let lat = TypeLattice::bootstrap();
        let mut reg = MethodRegistry::new();
        reg.add_method(
            "f",
            vec![
                Ty::Applied(c::COMPLEX, vec![TyArg::Ty(Ty::Var("T".to_string()))]),
            ],
            vec![TypeParam::with_bound("T", named(c::REAL))],
            MethodBody::Native(nop),
        );
        let complex_int = Ty::Applied(c::COMPLEX, vec![TyArg::Ty(named(c::INT64))]);
        let result = reg.dispatch("f", &[complex_int], &lat).unwrap();
        assert_eq!(
            result.bindings.get("T"),
            Some(&TyArg::Ty(named(c::INT64)))
        );
    }

    #[test]
    fn test_shared_type_variable_rejects_mismatched_args() {
        let lat = TypeLattice::bootstrap();
        let mut reg = MethodRegistry::new();
        reg.add_method(
            "f",
            vec![Ty::Var("T".to_string()), Ty::Var("T".to_string())],
            vec![TypeParam::new("T")],
            MethodBody::Native(nop),
        );
        assert!(reg
            .dispatch("f", &[named(c::INT64), named(c::INT64)], &lat)
            .is_ok());
        assert!(reg
            .dispatch("f", &[named(c::INT64), named(c::FLOAT64)], &lat)
            .is_err());
    }

    #[test]
    fn test_replacement_on_same_signature() {
        fn other(_vm: &mut Vm, _args: Vec<Value>) -> Result<Value, VmError> {
            Ok(Value::I64(1))
        }
        let mut reg = MethodRegistry::new();
        add(&mut reg, "f", vec![named(c::INT64)]);
        assert_eq!(reg.function("f").unwrap().methods.len(), 1);
        reg.add_method("f", vec![named(c::INT64)], Vec::new(), MethodBody::Native(other));
        // Same signature replaced, not appended
        assert_eq!(reg.function("f").unwrap().methods.len(), 1);
    }

    #[test]
    fn test_dispatch_cache_hit_and_invalidation() {
        let lat = TypeLattice::bootstrap();
        let mut reg = MethodRegistry::new();
        add(&mut reg, "g", vec![named(c::NUMBER)]); // 0

        let r1 = reg.dispatch("g", &[named(c::INT64)], &lat).unwrap();
        assert_eq!(r1.method_index, 0);
        assert_eq!(reg.cache_len(), 1);

        // Second call hits the cache
        let r2 = reg.dispatch("g", &[named(c::INT64)], &lat).unwrap();
        assert_eq!(r2.method_index, 0);

        // Adding a more specific method clears the cache and redirects
        add(&mut reg, "g", vec![named(c::INT64)]); // 1
        assert_eq!(reg.cache_len(), 0);
        let r3 = reg.dispatch("g", &[named(c::INT64)], &lat).unwrap();
        assert_eq!(r3.method_index, 1);
    }

    #[test]
    fn test_typeof_signature_dispatch() {
        // convert-style signature: f(::Type{T}, x::Number) where T
        let lat = TypeLattice::bootstrap();
        let mut reg = MethodRegistry::new();
        reg.add_method(
            "f",
            vec![
                Ty::TypeOf(Box::new(Ty::Var("T".to_string()))),
                named(c::NUMBER),
            ],
            vec![TypeParam::new("T")],
            MethodBody::Native(nop),
        );
        let result = reg
            .dispatch(
                "f",
                &[Ty::TypeOf(Box::new(named(c::FLOAT64))), named(c::INT64)],
                &lat,
            )
            .unwrap();
        assert_eq!(
            result.bindings.get("T"),
            Some(&TyArg::Ty(named(c::FLOAT64)))
        );
    }
}
