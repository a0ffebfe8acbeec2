//! Equality and ordered comparison builtins.
//!
//! `==` is value equality: numeric equality crosses types (`1 == 1.0`),
//! containers compare elementwise, and `missing` propagates (a comparison
//! touching `missing` is `missing`, not a Bool). `===` is egal: identical
//! type and value, pointer identity for mutable containers, bitwise
//! identity for floats. The two agree on every singleton value (`nothing`,
//! types, symbols, chars).

use std::cmp::Ordering;
use std::rc::Rc;

use num_traits::ToPrimitive;

use super::value::{bigfloat_from_f64, RustBigInt, Value};
use super::{Vm, VmError};

// ── NativeFn entry points ───────────────────────────────────────────────────

pub(crate) fn nf_eq(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let b = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    value_eq(vm, &a, &b)
}

pub(crate) fn nf_ne(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let b = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    match value_eq(vm, &a, &b)? {
        Value::Bool(x) => Ok(Value::Bool(!x)),
        missing => Ok(missing),
    }
}

pub(crate) fn nf_egal(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let b = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    Ok(Value::Bool(egal(&a, &b)))
}

pub(crate) fn nf_negal(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let b = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    Ok(Value::Bool(!egal(&a, &b)))
}

macro_rules! ordered_entry {
    ($name:ident, $($ord:pat_param)|+) => {
        pub(crate) fn $name(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
            let b = args.pop().ok_or(VmError::StackUnderflow)?;
            let a = args.pop().ok_or(VmError::StackUnderflow)?;
            if matches!(a, Value::Missing) || matches!(b, Value::Missing) {
                return Ok(Value::Missing);
            }
            match ordered_cmp(vm, &a, &b)? {
                Some(ord) => Ok(Value::Bool(matches!(ord, $($ord)|+))),
                // Unordered (NaN involved): every ordered comparison is false
                None => Ok(Value::Bool(false)),
            }
        }
    };
}

ordered_entry!(nf_lt, Ordering::Less);
ordered_entry!(nf_le, Ordering::Less | Ordering::Equal);
ordered_entry!(nf_gt, Ordering::Greater);
ordered_entry!(nf_ge, Ordering::Greater | Ordering::Equal);

// ── value equality ──────────────────────────────────────────────────────────

/// `a == b`, three-valued: `Bool` or `Missing`.
pub(crate) fn value_eq(vm: &mut Vm, a: &Value, b: &Value) -> Result<Value, VmError> {
    if matches!(a, Value::Missing) || matches!(b, Value::Missing) {
        return Ok(Value::Missing);
    }

    // Complex equality (including complex vs. real)
    match (a, b) {
        (Value::Complex(x), Value::Complex(y)) => {
            return combine_eq(vm, &[(&x.re, &y.re), (&x.im, &y.im)]);
        }
        (Value::Complex(z), other) | (other, Value::Complex(z)) if other.is_number() => {
            let im_zero = numeric_cmp(&z.im, &Value::I64(0)) == Some(Ordering::Equal);
            if !im_zero {
                return Ok(Value::Bool(false));
            }
            return value_eq(vm, &z.re.clone(), other);
        }
        _ => {}
    }

    if a.is_number() && b.is_number() {
        return Ok(Value::Bool(numeric_cmp(a, b) == Some(Ordering::Equal)));
    }

    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(Value::Bool(x == y)),
        (Value::Char(x), Value::Char(y)) => Ok(Value::Bool(x == y)),
        (Value::Sym(x), Value::Sym(y)) => Ok(Value::Bool(x == y)),
        (Value::Nothing, Value::Nothing) => Ok(Value::Bool(true)),
        (Value::DataType(x), Value::DataType(y)) => Ok(Value::Bool(x == y)),
        (Value::Version(x), Value::Version(y)) => Ok(Value::Bool(x == y)),
        (Value::Regex(x), Value::Regex(y)) => Ok(Value::Bool(x == y)),
        (Value::Tuple(x), Value::Tuple(y)) => {
            if x.elements.len() != y.elements.len() {
                return Ok(Value::Bool(false));
            }
            let pairs: Vec<(&Value, &Value)> =
                x.elements.iter().zip(y.elements.iter()).collect();
            combine_eq(vm, &pairs)
        }
        (Value::NamedTuple(x), Value::NamedTuple(y)) => {
            if x.names != y.names {
                return Ok(Value::Bool(false));
            }
            let pairs: Vec<(&Value, &Value)> = x.values.iter().zip(y.values.iter()).collect();
            combine_eq(vm, &pairs)
        }
        (Value::Pair(x), Value::Pair(y)) => {
            combine_eq(vm, &[(&x.first, &y.first), (&x.second, &y.second)])
        }
        (Value::Struct(_) | Value::MutStruct(_), Value::Struct(_) | Value::MutStruct(_)) => {
            let (xt, xv) = struct_parts(a);
            let (yt, yv) = struct_parts(b);
            if xt != yt || xv.len() != yv.len() {
                return Ok(Value::Bool(false));
            }
            let pairs: Vec<(&Value, &Value)> = xv.iter().zip(yv.iter()).collect();
            combine_eq(vm, &pairs)
        }
        (Value::Set(x), Value::Set(y)) => {
            let x = x.borrow();
            let y = y.borrow();
            if x.len() != y.len() {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(x.items().iter().all(|i| y.contains(i))))
        }
        (Value::Exception(x), Value::Exception(y)) => {
            Ok(Value::Bool(x.ty == y.ty && x.message == y.message))
        }
        (Value::Function(x), Value::Function(y)) => Ok(Value::Bool(x.name == y.name)),
        _ => {
            // Sequence containers (arrays, ranges, memory) compare
            // elementwise across representation.
            if is_sequence(a) && is_sequence(b) {
                let xs = vm.iterable_items(a)?;
                let ys = vm.iterable_items(b)?;
                if xs.len() != ys.len() {
                    return Ok(Value::Bool(false));
                }
                let pairs: Vec<(&Value, &Value)> = xs.iter().zip(ys.iter()).collect();
                return combine_eq(vm, &pairs);
            }
            // Cross-variant comparisons of unrelated values are simply unequal.
            Ok(Value::Bool(a == b))
        }
    }
}

fn struct_parts(v: &Value) -> (crate::types::Ty, Vec<Value>) {
    match v {
        Value::Struct(s) => (s.ty.clone(), s.values.clone()),
        Value::MutStruct(s) => {
            let s = s.borrow();
            (s.ty.clone(), s.values.clone())
        }
        _ => unreachable!("struct_parts on non-struct"),
    }
}

fn is_sequence(v: &Value) -> bool {
    matches!(v, Value::Array(_) | Value::Range(_) | Value::Memory(_))
}

/// Elementwise conjunction with missing propagation: any false wins, then
/// any missing, then true.
fn combine_eq(vm: &mut Vm, pairs: &[(&Value, &Value)]) -> Result<Value, VmError> {
    let mut saw_missing = false;
    for (x, y) in pairs {
        match value_eq(vm, x, y)? {
            Value::Bool(false) => return Ok(Value::Bool(false)),
            Value::Bool(true) => {}
            _ => saw_missing = true,
        }
    }
    Ok(if saw_missing {
        Value::Missing
    } else {
        Value::Bool(true)
    })
}

// ── numeric ordering ────────────────────────────────────────────────────────

/// Cross-type numeric comparison. `None` means unordered (NaN involved).
pub(crate) fn numeric_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    use Value::*;

    // Exact integer vs integer
    if let (Option::Some(x), Option::Some(y)) = (a.as_int(), b.as_int()) {
        return Option::Some(x.cmp(&y));
    }
    match (a, b) {
        (U128(x), U128(y)) => return Option::Some(x.cmp(y)),
        (BigInt(x), BigInt(y)) => return Option::Some(x.cmp(y)),
        (BigInt(x), _) if b.as_int().is_some() => {
            return Option::Some(x.cmp(&RustBigInt::from(b.as_int().unwrap())));
        }
        (_, BigInt(y)) if a.as_int().is_some() => {
            return Option::Some(RustBigInt::from(a.as_int().unwrap()).cmp(y));
        }
        (BigFloat(x), BigFloat(y)) => return bigfloat_ordering(x.cmp(y)),
        (BigFloat(x), _) => {
            let y = b.as_f64_lossy()?;
            return bigfloat_ordering(x.cmp(&bigfloat_from_f64(y)));
        }
        (_, BigFloat(y)) => {
            let x = a.as_f64_lossy()?;
            return bigfloat_ordering(bigfloat_from_f64(x).cmp(y));
        }
        (Rational(x), Rational(y)) => {
            return Option::Some(((x.num as i128) * (y.den as i128)).cmp(&((y.num as i128) * (x.den as i128))));
        }
        (Rational(r), _) if b.as_int().is_some() => {
            let y = b.as_int().unwrap();
            return Option::Some((r.num as i128).cmp(&(y * r.den as i128)));
        }
        (_, Rational(r)) if a.as_int().is_some() => {
            let x = a.as_int().unwrap();
            return Option::Some((x * r.den as i128).cmp(&(r.num as i128)));
        }
        _ => {}
    }
    // Mixed float comparisons happen in f64
    let x = a.as_f64_lossy().or_else(|| match a {
        BigInt(n) => n.to_f64(),
        _ => None,
    })?;
    let y = b.as_f64_lossy().or_else(|| match b {
        BigInt(n) => n.to_f64(),
        _ => None,
    })?;
    x.partial_cmp(&y)
}

fn bigfloat_ordering(cmp: Option<i128>) -> Option<Ordering> {
    cmp.map(|c| c.cmp(&0))
}

/// Ordering across the orderable values: numbers, strings, chars, symbols,
/// versions, and bools.
fn ordered_cmp(vm: &Vm, a: &Value, b: &Value) -> Result<Option<Ordering>, VmError> {
    if a.is_number() && b.is_number() {
        if matches!(a, Value::Complex(_)) || matches!(b, Value::Complex(_)) {
            return Err(VmError::MethodError(
                "MethodError: no method matching isless(::Complex, ::Complex)".to_string(),
            ));
        }
        return Ok(numeric_cmp(a, b));
    }
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(Some(x.cmp(y))),
        (Value::Char(x), Value::Char(y)) => Ok(Some(x.cmp(y))),
        (Value::Sym(x), Value::Sym(y)) => Ok(Some(x.as_str().cmp(y.as_str()))),
        (Value::Version(x), Value::Version(y)) => Ok(Some(x.cmp(y))),
        _ => Err(VmError::MethodError(format!(
            "MethodError: no method matching isless(::{}, ::{})",
            a.type_of().display(&vm.lattice),
            b.type_of().display(&vm.lattice)
        ))),
    }
}

// ── egal (===) ──────────────────────────────────────────────────────────────

/// Identity comparison: same type and same value; mutable containers by
/// pointer, floats bitwise.
pub(crate) fn egal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => Rc::ptr_eq(x, y),
        (Value::Memory(x), Value::Memory(y)) => Rc::ptr_eq(x, y),
        (Value::MutStruct(x), Value::MutStruct(y)) => Rc::ptr_eq(x, y),
        (Value::Set(x), Value::Set(y)) => Rc::ptr_eq(x, y),
        (Value::IoBuf(x), Value::IoBuf(y)) => Rc::ptr_eq(x, y),
        (Value::F64(x), Value::F64(y)) => x.to_bits() == y.to_bits(),
        (Value::F32(x), Value::F32(y)) => x.to_bits() == y.to_bits(),
        (Value::F16(x), Value::F16(y)) => x.to_bits() == y.to_bits(),
        (Value::Tuple(x), Value::Tuple(y)) => {
            x.elements.len() == y.elements.len()
                && x.elements.iter().zip(&y.elements).all(|(p, q)| egal(p, q))
        }
        (Value::Struct(x), Value::Struct(y)) => {
            x.ty == y.ty
                && x.values.len() == y.values.len()
                && x.values.iter().zip(&y.values).all(|(p, q)| egal(p, q))
        }
        _ => a.type_of() == b.type_of() && a == b,
    }
}
