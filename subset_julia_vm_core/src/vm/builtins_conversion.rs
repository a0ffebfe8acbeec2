//! Conversion builtins: `convert`, numeric casts, `parse`/`tryparse`, and
//! the promotion surface.
//!
//! `convert(T, x)` is an ordinary generic function; the natives here are its
//! base methods and user methods with more specific signatures shadow them.
//! Narrow targets check representability and raise `InexactError` rather
//! than silently widening or truncating.

use num_traits::ToPrimitive;

use crate::types::{core_types as c, Ty, TyArg, TypeId};

use super::value::{
    bigfloat_from_f64, bigfloat_from_i64, bigfloat_parse, ComplexValue, RationalValue,
    RustBigInt, Value,
};
use super::{Vm, VmError};

// ── NativeFn entry points ───────────────────────────────────────────────────

/// Base `convert(T, x)` method.
pub(crate) fn nf_convert(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    let t = args.pop().ok_or(VmError::StackUnderflow)?;
    let Value::DataType(target) = t else {
        return Err(VmError::TypeError(
            "convert: first argument must be a type".to_string(),
        ));
    };
    convert_to(vm, &target, x)
}

/// `promote_type(A, B)`.
pub(crate) fn nf_promote_type(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let b = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    match (a, b) {
        (Value::DataType(x), Value::DataType(y)) => {
            let promoted = vm.promote_type_tys(&x, &y);
            Ok(Value::DataType(promoted))
        }
        _ => Err(VmError::TypeError(
            "promote_type: expected two types".to_string(),
        )),
    }
}

/// Base `promote_rule(A, B) = Union{}` — the hook users extend.
pub(crate) fn nf_promote_rule_base(_vm: &mut Vm, _args: Vec<Value>) -> Result<Value, VmError> {
    Ok(Value::DataType(Ty::bottom()))
}

pub(crate) fn nf_parse(vm: &mut Vm, args: Vec<Value>) -> Result<Value, VmError> {
    match try_parse_impl(vm, args)? {
        Value::Nothing => Err(VmError::ArgumentError(
            "cannot parse input as the requested type".to_string(),
        )),
        value => Ok(value),
    }
}

pub(crate) fn nf_tryparse(vm: &mut Vm, args: Vec<Value>) -> Result<Value, VmError> {
    try_parse_impl(vm, args)
}

fn try_parse_impl(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let s = args.pop().ok_or(VmError::StackUnderflow)?;
    let t = args.pop().ok_or(VmError::StackUnderflow)?;
    let (Value::DataType(target), Value::Str(text)) = (t, s) else {
        return Err(VmError::TypeError(
            "parse: expected a type and a string".to_string(),
        ));
    };
    let text = text.trim();
    let parsed = match &target {
        Ty::Named(id) => match *id {
            c::INT8 => text.parse::<i8>().ok().map(Value::I8),
            c::INT16 => text.parse::<i16>().ok().map(Value::I16),
            c::INT32 => text.parse::<i32>().ok().map(Value::I32),
            c::INT64 => text.parse::<i64>().ok().map(Value::I64),
            c::INT128 => text.parse::<i128>().ok().map(Value::I128),
            c::UINT8 => text.parse::<u8>().ok().map(Value::U8),
            c::UINT16 => text.parse::<u16>().ok().map(Value::U16),
            c::UINT32 => text.parse::<u32>().ok().map(Value::U32),
            c::UINT64 => text.parse::<u64>().ok().map(Value::U64),
            c::UINT128 => text.parse::<u128>().ok().map(Value::U128),
            c::FLOAT16 => text
                .parse::<f32>()
                .ok()
                .map(|x| Value::F16(half::f16::from_f32(x))),
            c::FLOAT32 => text.parse::<f32>().ok().map(Value::F32),
            c::FLOAT64 => text.parse::<f64>().ok().map(Value::F64),
            c::BOOL => match text {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            c::BIGINT => text.parse::<RustBigInt>().ok().map(Value::BigInt),
            c::BIGFLOAT => bigfloat_parse(text).map(Value::BigFloat),
            _ => {
                return Err(VmError::MethodError(
                    "MethodError: no method matching parse for this target type".to_string(),
                ));
            }
        },
        _ => {
            return Err(VmError::MethodError(
                "MethodError: no method matching parse for this target type".to_string(),
            ));
        }
    };
    Ok(parsed.unwrap_or(Value::Nothing))
}

// ── conversion core ────────────────────────────────────────────────────────

/// Whether `T(x)` on this nominal target is a numeric/char cast.
pub(crate) fn is_castable_target(id: TypeId) -> bool {
    matches!(
        id,
        c::INT8
            | c::INT16
            | c::INT32
            | c::INT64
            | c::INT128
            | c::UINT8
            | c::UINT16
            | c::UINT32
            | c::UINT64
            | c::UINT128
            | c::BOOL
            | c::FLOAT16
            | c::FLOAT32
            | c::FLOAT64
            | c::BIGINT
            | c::BIGFLOAT
            | c::CHAR
            | c::STRING
    )
}

/// Conversion dispatcher shared by `convert` and constructor casts.
pub(crate) fn convert_to(vm: &mut Vm, target: &Ty, x: Value) -> Result<Value, VmError> {
    if target.is_any() || crate::types::is_subtype(&x.type_of(), target, &vm.lattice) {
        return Ok(x);
    }
    match target {
        Ty::Named(id) if is_castable_target(*id) => cast_to(vm, *id, x),
        Ty::Named(id) if *id == c::RATIONAL => to_rational(&x),
        Ty::Applied(id, args) if *id == c::RATIONAL => {
            // Only Rational{Int64} is representable
            let _ = args;
            to_rational(&x)
        }
        Ty::Named(id) if *id == c::COMPLEX => to_complex(vm, None, x),
        Ty::Applied(id, args) if *id == c::COMPLEX => {
            let elem = match args.first() {
                Some(TyArg::Ty(t)) => Some(t.clone()),
                _ => None,
            };
            to_complex(vm, elem, x)
        }
        Ty::Union(members) => {
            for member in members {
                if let Ok(converted) = convert_to(vm, member, x.clone()) {
                    return Ok(converted);
                }
            }
            Err(no_convert(vm, target, &x))
        }
        Ty::Tuple(tys) => match x {
            Value::Tuple(t) if t.elements.len() == tys.len() => {
                let mut converted = Vec::with_capacity(tys.len());
                for (ty, v) in tys.iter().zip(t.elements) {
                    converted.push(convert_to(vm, ty, v)?);
                }
                Ok(Value::Tuple(super::value::TupleValue::new(converted)))
            }
            other => Err(no_convert(vm, target, &other)),
        },
        _ => Err(no_convert(vm, target, &x)),
    }
}

fn no_convert(vm: &Vm, target: &Ty, x: &Value) -> VmError {
    VmError::MethodError(format!(
        "MethodError: Cannot `convert` an object of type {} to an object of type {}",
        x.type_of().display(&vm.lattice),
        target.display(&vm.lattice)
    ))
}

fn to_rational(x: &Value) -> Result<Value, VmError> {
    match x {
        Value::Rational(_) => Ok(x.clone()),
        _ => match x.as_index() {
            Some(n) => Ok(Value::Rational(RationalValue::from_int(n))),
            None => Err(VmError::InexactError(
                "Rational() of a non-integer value".to_string(),
            )),
        },
    }
}

fn to_complex(vm: &mut Vm, elem: Option<Ty>, x: Value) -> Result<Value, VmError> {
    let (re, im) = match x {
        Value::Complex(z) => (z.re, z.im),
        real if real.is_number() => (real, Value::I64(0)),
        other => {
            return Err(VmError::InexactError(format!(
                "Complex conversion of non-numeric {}",
                other.type_of().display(&vm.lattice)
            )));
        }
    };
    match elem {
        Some(ty) => {
            let re = convert_to(vm, &ty, re)?;
            let im = convert_to(vm, &ty, im)?;
            Ok(Value::Complex(Box::new(ComplexValue { re, im })))
        }
        None => super::builtins_numeric::make_complex(vm, re, im),
    }
}

/// Cast to a nominal numeric/char/string target, checking representability.
pub(crate) fn cast_to(vm: &mut Vm, target: TypeId, x: Value) -> Result<Value, VmError> {
    match target {
        c::INT8 | c::INT16 | c::INT32 | c::INT64 | c::INT128 | c::UINT8 | c::UINT16
        | c::UINT32 | c::UINT64 | c::UINT128 => cast_integer(vm, target, x),
        c::BOOL => match &x {
            Value::Bool(_) => Ok(x),
            _ => match exact_int(&x) {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                Some(n) => Err(VmError::InexactError(format!("Bool({})", n))),
                None => Err(no_convert(vm, &Ty::Named(c::BOOL), &x)),
            },
        },
        c::FLOAT16 => real_to_f64(vm, &x).map(|v| Value::F16(half::f16::from_f64(v))),
        c::FLOAT32 => real_to_f64(vm, &x).map(|v| Value::F32(v as f32)),
        c::FLOAT64 => real_to_f64(vm, &x).map(Value::F64),
        c::BIGINT => match &x {
            Value::BigInt(_) => Ok(x),
            _ => match exact_int(&x) {
                Some(n) => Ok(Value::BigInt(RustBigInt::from(n))),
                None => match &x {
                    Value::U128(n) => Ok(Value::BigInt(RustBigInt::from(*n))),
                    Value::F16(_) | Value::F32(_) | Value::F64(_) => {
                        let f = x.as_f64_lossy().unwrap_or(f64::NAN);
                        if f.fract() != 0.0 || !f.is_finite() {
                            return Err(VmError::InexactError(format!("BigInt({})", f)));
                        }
                        Ok(Value::BigInt(RustBigInt::from(f as i64)))
                    }
                    _ => Err(no_convert(vm, &Ty::Named(c::BIGINT), &x)),
                },
            },
        },
        c::BIGFLOAT => match &x {
            Value::BigFloat(_) => Ok(x),
            Value::BigInt(n) => bigfloat_parse(&n.to_string())
                .map(Value::BigFloat)
                .ok_or_else(|| VmError::Internal("BigInt render failed".to_string())),
            _ => match exact_int(&x) {
                Some(n) => match i64::try_from(n) {
                    Ok(small) => Ok(Value::BigFloat(bigfloat_from_i64(small))),
                    // i128 payloads outside i64 go through the decimal parser
                    Err(_) => bigfloat_parse(&n.to_string())
                        .map(Value::BigFloat)
                        .ok_or_else(|| VmError::Internal("integer render failed".to_string())),
                },
                None => real_to_f64(vm, &x).map(|f| Value::BigFloat(bigfloat_from_f64(f))),
            },
        },
        c::CHAR => match &x {
            Value::Char(_) => Ok(x),
            _ => match exact_int(&x) {
                Some(n) => u32::try_from(n)
                    .ok()
                    .and_then(char::from_u32)
                    .map(Value::Char)
                    .ok_or_else(|| {
                        VmError::InexactError(format!("Char({}): invalid code point", n))
                    }),
                None => Err(no_convert(vm, &Ty::Named(c::CHAR), &x)),
            },
        },
        c::STRING => match &x {
            Value::Str(_) => Ok(x),
            _ => Err(no_convert(vm, &Ty::Named(c::STRING), &x)),
        },
        _ => Err(no_convert(vm, &Ty::Named(target), &x)),
    }
}

fn cast_integer(vm: &mut Vm, target: TypeId, x: Value) -> Result<Value, VmError> {
    // Resolve the payload to an exact i128 (or u128 for the top half of
    // UInt128), raising InexactError for fractional floats.
    if let Value::U128(n) = &x {
        if target == c::UINT128 {
            return Ok(x);
        }
        let narrow = i128::try_from(*n)
            .map_err(|_| VmError::InexactError(format!("{}({})", vm.lattice.name(target), n)))?;
        return int_to_width(target, narrow, vm);
    }
    let n = match exact_int(&x) {
        Some(n) => n,
        None => match &x {
            Value::F16(_) | Value::F32(_) | Value::F64(_) => {
                let f = x.as_f64_lossy().unwrap_or(f64::NAN);
                if !f.is_finite() || f.fract() != 0.0 {
                    return Err(VmError::InexactError(format!(
                        "{}({})",
                        vm.lattice.name(target),
                        f
                    )));
                }
                f as i128
            }
            Value::BigInt(b) => b.to_i128().ok_or_else(|| {
                VmError::InexactError(format!("{}({})", vm.lattice.name(target), b))
            })?,
            Value::Rational(r) => {
                if r.den != 1 {
                    return Err(VmError::InexactError(format!(
                        "{}({})",
                        vm.lattice.name(target),
                        r
                    )));
                }
                r.num as i128
            }
            Value::Char(ch) => *ch as u32 as i128,
            _ => return Err(no_convert(vm, &Ty::Named(target), &x)),
        },
    };
    int_to_width(target, n, vm)
}

fn int_to_width(target: TypeId, n: i128, vm: &Vm) -> Result<Value, VmError> {
    let inexact = || VmError::InexactError(format!("{}({})", vm.lattice.name(target), n));
    Ok(match target {
        c::INT8 => Value::I8(i8::try_from(n).map_err(|_| inexact())?),
        c::INT16 => Value::I16(i16::try_from(n).map_err(|_| inexact())?),
        c::INT32 => Value::I32(i32::try_from(n).map_err(|_| inexact())?),
        c::INT64 => Value::I64(i64::try_from(n).map_err(|_| inexact())?),
        c::INT128 => Value::I128(n),
        c::UINT8 => Value::U8(u8::try_from(n).map_err(|_| inexact())?),
        c::UINT16 => Value::U16(u16::try_from(n).map_err(|_| inexact())?),
        c::UINT32 => Value::U32(u32::try_from(n).map_err(|_| inexact())?),
        c::UINT64 => Value::U64(u64::try_from(n).map_err(|_| inexact())?),
        c::UINT128 => Value::U128(u128::try_from(n).map_err(|_| inexact())?),
        _ => return Err(VmError::Internal("int_to_width on non-integer target".into())),
    })
}

/// Exact integer payload of machine ints and Bool (not floats).
fn exact_int(v: &Value) -> Option<i128> {
    v.as_int()
}

fn real_to_f64(vm: &mut Vm, x: &Value) -> Result<f64, VmError> {
    match x {
        Value::BigFloat(_) => Err(no_convert(vm, &Ty::Named(c::FLOAT64), x)),
        _ => x
            .as_f64_lossy()
            .ok_or_else(|| no_convert(vm, &Ty::Named(c::FLOAT64), x)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm() -> Vm {
        Vm::new()
    }

    #[test]
    fn test_narrow_cast_checks_range() {
        let mut vm = vm();
        assert_eq!(cast_to(&mut vm, c::INT8, Value::I64(127)).unwrap(), Value::I8(127));
        assert!(matches!(
            cast_to(&mut vm, c::INT8, Value::I64(128)),
            Err(VmError::InexactError(_))
        ));
        assert!(matches!(
            cast_to(&mut vm, c::UINT8, Value::I64(-1)),
            Err(VmError::InexactError(_))
        ));
    }

    #[test]
    fn test_float_to_int_requires_integral() {
        let mut vm = vm();
        assert_eq!(
            cast_to(&mut vm, c::INT64, Value::F64(3.0)).unwrap(),
            Value::I64(3)
        );
        assert!(matches!(
            cast_to(&mut vm, c::INT64, Value::F64(3.5)),
            Err(VmError::InexactError(_))
        ));
    }

    #[test]
    fn test_bool_cast_is_zero_or_one() {
        let mut vm = vm();
        assert_eq!(
            cast_to(&mut vm, c::BOOL, Value::I64(1)).unwrap(),
            Value::Bool(true)
        );
        assert!(matches!(
            cast_to(&mut vm, c::BOOL, Value::I64(2)),
            Err(VmError::InexactError(_))
        ));
    }

    #[test]
    fn test_char_roundtrip() {
        let mut vm = vm();
        assert_eq!(
            cast_to(&mut vm, c::CHAR, Value::I64(0x61)).unwrap(),
            Value::Char('a')
        );
        assert_eq!(
            cast_to(&mut vm, c::INT64, Value::Char('a')).unwrap(),
            Value::I64(0x61)
        );
        assert!(matches!(
            cast_to(&mut vm, c::CHAR, Value::I64(-1)),
            Err(VmError::InexactError(_))
        ));
    }

    #[test]
    fn test_parse_and_tryparse() {
        let mut vm = vm();
        assert_eq!(
            nf_parse(
                &mut vm,
                vec![
                    Value::DataType(Ty::Named(c::INT64)),
                    Value::Str("42".into())
                ]
            )
            .unwrap(),
            Value::I64(42)
        );
        assert!(nf_parse(
            &mut vm,
            vec![
                Value::DataType(Ty::Named(c::INT64)),
                Value::Str("forty".into())
            ]
        )
        .is_err());
        assert_eq!(
            nf_tryparse(
                &mut vm,
                vec![
                    Value::DataType(Ty::Named(c::INT64)),
                    Value::Str("forty".into())
                ]
            )
            .unwrap(),
            Value::Nothing
        );
        assert_eq!(
            nf_parse(
                &mut vm,
                vec![
                    Value::DataType(Ty::Named(c::BOOL)),
                    Value::Str("true".into())
                ]
            )
            .unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_convert_to_union_takes_first_fit() {
        let mut vm = vm();
        let target = Ty::Union(vec![Ty::Named(c::FLOAT64), Ty::Named(c::MISSING)]);
        assert_eq!(
            convert_to(&mut vm, &target, Value::I64(2)).unwrap(),
            Value::F64(2.0)
        );
        assert_eq!(
            convert_to(&mut vm, &target, Value::Missing).unwrap(),
            Value::Missing
        );
    }

    #[test]
    fn test_convert_identity_preserves_narrow_types() {
        let mut vm = vm();
        assert_eq!(
            convert_to(&mut vm, &Ty::Named(c::INT8), Value::I8(5)).unwrap(),
            Value::I8(5)
        );
    }
}
