//! Numeric promotion fallback rules.
//!
//! Promotion is a two-layer system: `promote_rule` methods registered in the
//! method table are consulted first (in both argument orders), and only when
//! neither order has a rule does the engine fall back to the priority-based
//! rules here. The VM's `promote_type` entry point owns that layering; this
//! module is the bottom layer, covering the built-in numeric tower.
//!
//! The fallback must stay symmetric: `fallback_promote(A, B)` and
//! `fallback_promote(B, A)` agree for every pair it defines.

use super::lattice::{core_types as c, TypeId};
use super::ty::{Ty, TyArg};

/// Priority of a built-in numeric type; wider types have higher priority.
/// Returns 0 for types outside the machine numeric tower.
pub fn numeric_priority(id: TypeId) -> i32 {
    match id {
        c::BIGFLOAT => 110,
        c::FLOAT64 => 100,
        c::FLOAT32 => 90,
        c::FLOAT16 => 88,
        c::BIGINT => 87,
        c::INT128 => 85,
        c::INT64 => 80,
        c::INT32 => 70,
        c::INT16 => 60,
        c::INT8 => 50,
        c::UINT128 => 45,
        c::UINT64 => 44,
        c::UINT32 => 43,
        c::UINT16 => 42,
        c::UINT8 => 41,
        c::BOOL => 10,
        _ => 0,
    }
}

fn is_machine_numeric(id: TypeId) -> bool {
    numeric_priority(id) > 0
}

fn is_float(id: TypeId) -> bool {
    matches!(id, c::FLOAT16 | c::FLOAT32 | c::FLOAT64 | c::BIGFLOAT)
}

fn complex_param(ty: &Ty) -> Option<&Ty> {
    match ty {
        Ty::Applied(id, args) if *id == c::COMPLEX => match args.first() {
            Some(TyArg::Ty(t)) => Some(t),
            _ => None,
        },
        _ => None,
    }
}

fn is_rational(ty: &Ty) -> bool {
    matches!(ty, Ty::Applied(id, _) | Ty::Named(id) if *id == c::RATIONAL)
}

fn machine_id(ty: &Ty) -> Option<TypeId> {
    match ty {
        Ty::Named(id) if is_machine_numeric(*id) => Some(*id),
        _ => None,
    }
}

/// Common type of two built-in numeric types, or `None` when the pair is
/// outside the fallback's domain (the caller then widens to `Any`).
pub fn fallback_promote(a: &Ty, b: &Ty) -> Option<Ty> {
    if a == b {
        return Some(a.clone());
    }

    // Complex{T} + S -> Complex{promote(T, S)}
    match (complex_param(a), complex_param(b)) {
        (Some(ea), Some(eb)) => {
            let elem = fallback_promote(ea, eb)?;
            return Some(Ty::Applied(c::COMPLEX, vec![TyArg::Ty(elem)]));
        }
        (Some(ea), None) => {
            let elem = fallback_promote(ea, b)?;
            return Some(Ty::Applied(c::COMPLEX, vec![TyArg::Ty(elem)]));
        }
        (None, Some(eb)) => {
            let elem = fallback_promote(a, eb)?;
            return Some(Ty::Applied(c::COMPLEX, vec![TyArg::Ty(elem)]));
        }
        (None, None) => {}
    }

    // Rational + Integer -> Rational; Rational + Float -> Float
    if is_rational(a) {
        if let Some(id) = machine_id(b) {
            return Some(if is_float(id) { b.clone() } else { a.clone() });
        }
    }
    if is_rational(b) {
        if let Some(id) = machine_id(a) {
            return Some(if is_float(id) { a.clone() } else { b.clone() });
        }
    }

    let (ia, ib) = (machine_id(a)?, machine_id(b)?);

    // Bool promotes to any other numeric type
    if ia == c::BOOL {
        return Some(b.clone());
    }
    if ib == c::BOOL {
        return Some(a.clone());
    }

    // Float beats integer; otherwise the higher-priority width wins
    if is_float(ia) && !is_float(ib) {
        return Some(a.clone());
    }
    if is_float(ib) && !is_float(ia) {
        return Some(b.clone());
    }
    Some(if numeric_priority(ia) >= numeric_priority(ib) {
        a.clone()
    } else {
        b.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(id: TypeId) -> Ty {
        Ty::Named(id)
    }

    fn complex_of(t: Ty) -> Ty {
        Ty::Applied(c::COMPLEX, vec![TyArg::Ty(t)])
    }

    fn rational() -> Ty {
        Ty::Applied(c::RATIONAL, vec![TyArg::Ty(named(c::INT64))])
    }

    fn promote(a: &Ty, b: &Ty) -> Option<Ty> {
        fallback_promote(a, b)
    }

    #[test]
    fn test_bool_promotes_to_any_number() {
        assert_eq!(promote(&named(c::BOOL), &named(c::INT64)), Some(named(c::INT64)));
        assert_eq!(
            promote(&named(c::BOOL), &named(c::FLOAT32)),
            Some(named(c::FLOAT32))
        );
        assert_eq!(
            promote(&named(c::FLOAT64), &named(c::BOOL)),
            Some(named(c::FLOAT64))
        );
    }

    #[test]
    fn test_float_int_promotion() {
        assert_eq!(
            promote(&named(c::INT64), &named(c::FLOAT64)),
            Some(named(c::FLOAT64))
        );
        assert_eq!(
            promote(&named(c::FLOAT32), &named(c::INT8)),
            Some(named(c::FLOAT32))
        );
        assert_eq!(
            promote(&named(c::INT32), &named(c::INT64)),
            Some(named(c::INT64))
        );
    }

    #[test]
    fn test_big_number_promotion() {
        assert_eq!(
            promote(&named(c::INT64), &named(c::BIGINT)),
            Some(named(c::BIGINT))
        );
        assert_eq!(
            promote(&named(c::BIGINT), &named(c::FLOAT64)),
            Some(named(c::FLOAT64))
        );
        assert_eq!(
            promote(&named(c::BIGFLOAT), &named(c::FLOAT64)),
            Some(named(c::BIGFLOAT))
        );
    }

    #[test]
    fn test_rational_promotion() {
        assert_eq!(promote(&rational(), &named(c::INT64)), Some(rational()));
        assert_eq!(
            promote(&rational(), &named(c::FLOAT64)),
            Some(named(c::FLOAT64))
        );
        assert_eq!(promote(&named(c::INT64), &rational()), Some(rational()));
    }

    #[test]
    fn test_complex_promotion() {
        assert_eq!(
            promote(&complex_of(named(c::INT64)), &named(c::FLOAT64)),
            Some(complex_of(named(c::FLOAT64)))
        );
        assert_eq!(
            promote(&named(c::BOOL), &complex_of(named(c::INT64))),
            Some(complex_of(named(c::INT64)))
        );
        assert_eq!(
            promote(&complex_of(named(c::FLOAT32)), &complex_of(named(c::FLOAT64))),
            Some(complex_of(named(c::FLOAT64)))
        );
    }

    #[test]
    fn test_fallback_symmetry() {
        let tower = [
            named(c::BOOL),
            named(c::INT8),
            named(c::INT64),
            named(c::UINT8),
            named(c::FLOAT32),
            named(c::FLOAT64),
            named(c::BIGINT),
            named(c::BIGFLOAT),
            rational(),
            complex_of(named(c::INT64)),
            complex_of(named(c::FLOAT64)),
        ];
        for a in &tower {
            for b in &tower {
                assert_eq!(
                    promote(a, b),
                    promote(b, a),
                    "promotion not symmetric for {:?} / {:?}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_non_numeric_pairs_have_no_rule() {
        assert_eq!(promote(&named(c::STRING), &named(c::INT64)), None);
        assert_eq!(promote(&named(c::NOTHING), &named(c::FLOAT64)), None);
    }
}
