//! Numeric builtins: arithmetic over the full tower with promotion.
//!
//! Binary operations first widen `Bool` operands to `Int64`, then either run
//! directly (equal operand types) or promote both sides through
//! `promote_type` and retry. Machine-integer arithmetic wraps two's
//! complement at the operands' width; `Rational` arithmetic is exact and
//! raises `OverflowError` instead of wrapping; `BigFloat` operations capture
//! the process-wide precision and rounding mode at entry.

use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::types::{core_types as c, TypeId};

use super::value::{
    bigfloat_add, bigfloat_div, bigfloat_from_i64, bigfloat_mul, bigfloat_parse, bigfloat_sub,
    ComplexValue, RationalValue, RustBigInt, Value,
};
use super::{Vm, VmError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Rem,
    Pow,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::IntDiv => "÷",
            ArithOp::Rem => "rem",
            ArithOp::Pow => "^",
        }
    }
}

// ── NativeFn entry points ───────────────────────────────────────────────────

macro_rules! binop_entry {
    ($name:ident, $op:expr) => {
        pub(crate) fn $name(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
            let b = args.pop().ok_or(VmError::StackUnderflow)?;
            let a = args.pop().ok_or(VmError::StackUnderflow)?;
            numeric_binop(vm, $op, a, b)
        }
    };
}

binop_entry!(nf_add, ArithOp::Add);
binop_entry!(nf_sub, ArithOp::Sub);
binop_entry!(nf_mul, ArithOp::Mul);
binop_entry!(nf_div, ArithOp::Div);
binop_entry!(nf_intdiv, ArithOp::IntDiv);
binop_entry!(nf_rem, ArithOp::Rem);
binop_entry!(nf_pow, ArithOp::Pow);

/// `a \ b` is `b / a`.
pub(crate) fn nf_backslash(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let b = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    numeric_binop(vm, ArithOp::Div, b, a)
}

/// `%` is `rem` (sign of the dividend).
pub(crate) fn nf_percent(vm: &mut Vm, args: Vec<Value>) -> Result<Value, VmError> {
    nf_rem(vm, args)
}

/// Floored modulus (sign of the divisor).
pub(crate) fn nf_mod(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let b = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    floored_mod(vm, a, b)
}

pub(crate) fn nf_neg(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    negate(a)
}

pub(crate) fn nf_unary_plus(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    if a.is_number() {
        Ok(a)
    } else {
        Err(VmError::MethodError(
            "MethodError: no method matching +(::non-numeric)".to_string(),
        ))
    }
}

/// `num // den` rational construction.
pub(crate) fn nf_rational(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let den = args.pop().ok_or(VmError::StackUnderflow)?;
    let num = args.pop().ok_or(VmError::StackUnderflow)?;
    match (num_as_i64(&num), num_as_i64(&den)) {
        (Some(n), Some(d)) => rational_value(n, d),
        _ => match (&num, &den) {
            (Value::Rational(r), _) => {
                // (a//b) // c == a // (b*c)
                let d = num_as_i64(&den).ok_or_else(|| {
                    VmError::ArgumentError("// expects integer operands".to_string())
                })?;
                let den128 = (r.den as i128) * (d as i128);
                rational_from_i128(r.num as i128, den128)
            }
            _ => Err(VmError::ArgumentError(
                "// expects integer operands".to_string(),
            )),
        },
    }
}

/// `big(x)`: arbitrary-precision widening.
pub(crate) fn nf_big(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    match a {
        Value::BigInt(_) | Value::BigFloat(_) => Ok(a),
        Value::Bool(b) => Ok(Value::BigInt(RustBigInt::from(b as i64))),
        _ => {
            if let Some(n) = a.as_int() {
                Ok(Value::BigInt(RustBigInt::from(n)))
            } else if let Some(x) = a.as_f64_lossy() {
                Ok(Value::new_bigfloat_f64(x))
            } else {
                Err(VmError::MethodError(
                    "MethodError: no method matching big(::non-numeric)".to_string(),
                ))
            }
        }
    }
}

pub(crate) fn nf_abs(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    match a {
        Value::I8(x) => Ok(Value::I8(x.wrapping_abs())),
        Value::I16(x) => Ok(Value::I16(x.wrapping_abs())),
        Value::I32(x) => Ok(Value::I32(x.wrapping_abs())),
        Value::I64(x) => Ok(Value::I64(x.wrapping_abs())),
        Value::I128(x) => Ok(Value::I128(x.wrapping_abs())),
        v @ (Value::U8(_) | Value::U16(_) | Value::U32(_) | Value::U64(_) | Value::U128(_)) => {
            Ok(v)
        }
        Value::Bool(b) => Ok(Value::Bool(b)),
        Value::F16(x) => Ok(Value::F16(half::f16::from_f64(x.to_f64().abs()))),
        Value::F32(x) => Ok(Value::F32(x.abs())),
        Value::F64(x) => Ok(Value::F64(x.abs())),
        Value::BigInt(n) => Ok(Value::BigInt(n.abs())),
        Value::BigFloat(x) => Ok(Value::BigFloat(x.abs())),
        Value::Rational(r) => Ok(Value::Rational(RationalValue {
            num: r.num.wrapping_abs(),
            den: r.den,
        })),
        Value::Complex(z) => {
            // |a+bi| = hypot(a, b)
            let re = z.re.as_f64_lossy().unwrap_or(f64::NAN);
            let im = z.im.as_f64_lossy().unwrap_or(f64::NAN);
            Ok(Value::F64(re.hypot(im)))
        }
        other => Err(VmError::MethodError(format!(
            "MethodError: no method matching abs(::{})",
            other.type_of().display(&vm.lattice)
        ))),
    }
}

// ── integer-division family ────────────────────────────────────────────────

pub(crate) fn nf_fld(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let b = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    floor_div(vm, a, b)
}

pub(crate) fn nf_cld(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let b = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    let (x, y) = int_pair(&a, &b)?;
    if y == 0 {
        return Err(VmError::DivideError);
    }
    // cld(x, y) == fld(x, y) + (y ∤ x)
    let fl = floored_div_i128(x, y)?;
    let result = if x % y == 0 { fl } else { fl + 1 };
    Ok(Value::I64(i128_to_i64(result, "cld")?))
}

pub(crate) fn nf_fldmod(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let b = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    let q = floor_div(vm, a.clone(), b.clone())?;
    let r = floored_mod(vm, a, b)?;
    Ok(Value::Tuple(super::value::TupleValue::new(vec![q, r])))
}

pub(crate) fn nf_mod1(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let b = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    one_based_mod(vm, a, b)
}

pub(crate) fn nf_fld1(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let b = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    one_based_fld(vm, a, b)
}

pub(crate) fn nf_fldmod1(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let b = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    let q = one_based_fld(vm, a.clone(), b.clone())?;
    let r = one_based_mod(vm, a, b)?;
    Ok(Value::Tuple(super::value::TupleValue::new(vec![q, r])))
}

// ── gcd family ─────────────────────────────────────────────────────────────

pub(crate) fn nf_gcd(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let b = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    match (&a, &b) {
        (Value::BigInt(x), Value::BigInt(y)) => Ok(Value::BigInt(x.gcd(y))),
        _ => {
            let (x, y) = int_pair(&a, &b)?;
            Ok(Value::I64(i128_to_i64(x.gcd(&y), "gcd")?))
        }
    }
}

pub(crate) fn nf_lcm(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let b = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    match (&a, &b) {
        (Value::BigInt(x), Value::BigInt(y)) => Ok(Value::BigInt(x.lcm(y))),
        _ => {
            let (x, y) = int_pair(&a, &b)?;
            Ok(Value::I64(i128_to_i64(x.lcm(&y), "lcm")?))
        }
    }
}

/// Extended gcd: `gcdx(a, b) == (g, u, v)` with `u*a + v*b == g`.
pub(crate) fn nf_gcdx(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let b = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    let (x, y) = int_pair(&a, &b)?;
    let e = x.extended_gcd(&y);
    Ok(Value::Tuple(super::value::TupleValue::new(vec![
        Value::I64(i128_to_i64(e.gcd, "gcdx")?),
        Value::I64(i128_to_i64(e.x, "gcdx")?),
        Value::I64(i128_to_i64(e.y, "gcdx")?),
    ])))
}

/// `powermod(b, e, m)`: modular exponentiation without overflow.
pub(crate) fn nf_powermod(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let m = args.pop().ok_or(VmError::StackUnderflow)?;
    let e = args.pop().ok_or(VmError::StackUnderflow)?;
    let b = args.pop().ok_or(VmError::StackUnderflow)?;
    let (bi, ei) = int_pair(&b, &e)?;
    let mi = num_as_i64(&m).ok_or_else(|| {
        VmError::ArgumentError("powermod expects integer arguments".to_string())
    })? as i128;
    if mi == 0 {
        return Err(VmError::DivideError);
    }
    if ei < 0 {
        return Err(VmError::DomainError {
            value: ei.to_string(),
            message: "powermod exponent must be non-negative".to_string(),
        });
    }
    let base = RustBigInt::from(bi);
    let result = base.modpow(&RustBigInt::from(ei), &RustBigInt::from(mi));
    // modpow is non-negative; match Julia's mod semantics for negative m
    let r = result
        .to_i128()
        .ok_or_else(|| VmError::OverflowError("powermod overflow".to_string()))?;
    Ok(Value::I64(i128_to_i64(r.rem_euclid(mi.abs()), "powermod")?))
}

/// `invmod(a, m)`: multiplicative inverse of `a` modulo `m`.
pub(crate) fn nf_invmod(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let m = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    let (x, modulus) = int_pair(&a, &m)?;
    if modulus == 0 {
        return Err(VmError::DomainError {
            value: "0".to_string(),
            message: "invmod: modulus must be nonzero".to_string(),
        });
    }
    let e = x.extended_gcd(&modulus);
    if e.gcd != 1 && e.gcd != -1 {
        return Err(VmError::DomainError {
            value: x.to_string(),
            message: format!("invmod: {} and {} are not coprime", x, modulus),
        });
    }
    let inv = e.x.rem_euclid(modulus.abs());
    Ok(Value::I64(i128_to_i64(inv, "invmod")?))
}

// ── numeric predicates ─────────────────────────────────────────────────────

pub(crate) fn nf_isinf(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    Ok(Value::Bool(match &a {
        Value::F16(x) => x.to_f64().is_infinite(),
        Value::F32(x) => x.is_infinite(),
        Value::F64(x) => x.is_infinite(),
        Value::BigFloat(x) => x.is_inf(),
        _ => false,
    }))
}

pub(crate) fn nf_isnan(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    Ok(Value::Bool(match &a {
        Value::F16(x) => x.to_f64().is_nan(),
        Value::F32(x) => x.is_nan(),
        Value::F64(x) => x.is_nan(),
        Value::BigFloat(x) => x.is_nan(),
        _ => false,
    }))
}

pub(crate) fn nf_isfinite(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    Ok(Value::Bool(match &a {
        Value::F16(x) => x.to_f64().is_finite(),
        Value::F32(x) => x.is_finite(),
        Value::F64(x) => x.is_finite(),
        Value::BigFloat(x) => !x.is_inf() && !x.is_nan(),
        _ => a.is_number(),
    }))
}

pub(crate) fn nf_iszero(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    Ok(Value::Bool(is_zero(&a)))
}

pub(crate) fn nf_isone(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    Ok(Value::Bool(match &a {
        Value::F16(x) => x.to_f64() == 1.0,
        Value::F32(x) => *x == 1.0,
        Value::F64(x) => *x == 1.0,
        Value::BigInt(n) => *n == RustBigInt::from(1),
        Value::BigFloat(x) => x.cmp(&bigfloat_from_i64(1)) == Some(0),
        Value::Rational(r) => r.num == 1 && r.den == 1,
        Value::Complex(z) => is_zero(&z.im) && matches!(z.re.as_f64_lossy(), Some(x) if x == 1.0),
        other => other.as_int() == Some(1),
    }))
}

pub(crate) fn nf_signbit(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    Ok(Value::Bool(match &a {
        Value::F16(x) => x.to_f64().is_sign_negative(),
        Value::F32(x) => x.is_sign_negative(),
        Value::F64(x) => x.is_sign_negative(),
        Value::BigInt(n) => n.is_negative(),
        Value::Rational(r) => r.num < 0,
        other => matches!(other.as_int(), Some(n) if n < 0),
    }))
}

pub(crate) fn nf_iseven(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    int_parity(&a).map(|n| Value::Bool(n % 2 == 0))
}

pub(crate) fn nf_isodd(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    int_parity(&a).map(|n| Value::Bool(n % 2 != 0))
}

pub(crate) fn nf_ispow2(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    let n = int_parity(&a)?;
    Ok(Value::Bool(n > 0 && (n & (n - 1)) == 0))
}

fn int_parity(a: &Value) -> Result<i128, VmError> {
    match a {
        Value::BigInt(n) => n.to_i128().ok_or_else(|| {
            VmError::OverflowError("integer too large for parity check".to_string())
        }),
        other => other.as_int().ok_or_else(|| {
            VmError::MethodError(
                "MethodError: no method matching parity predicate for non-integer".to_string(),
            )
        }),
    }
}

fn is_zero(v: &Value) -> bool {
    match v {
        Value::F16(x) => x.to_f64() == 0.0,
        Value::F32(x) => *x == 0.0,
        Value::F64(x) => *x == 0.0,
        Value::BigInt(n) => n.is_zero(),
        Value::BigFloat(x) => x.is_zero(),
        Value::Rational(r) => r.num == 0,
        Value::Complex(z) => is_zero(&z.re) && is_zero(&z.im),
        other => other.as_int() == Some(0),
    }
}

// ── the promotion-driven binop core ────────────────────────────────────────

pub(crate) fn numeric_binop(
    vm: &mut Vm,
    op: ArithOp,
    a: Value,
    b: Value,
) -> Result<Value, VmError> {
    // missing propagates through arithmetic
    if matches!(a, Value::Missing) || matches!(b, Value::Missing) {
        return Ok(Value::Missing);
    }
    if !a.is_number() || !b.is_number() {
        return Err(binop_method_error(vm, op, &a, &b));
    }
    // Bool arithmetic widens to Int64 (true + true == 2).
    let a = widen_bool(a);
    let b = widen_bool(b);

    let ta = a.type_of();
    let tb = b.type_of();
    if ta == tb {
        return same_type_binop(vm, op, a, b);
    }
    let target = vm.promote_type_tys(&ta, &tb);
    if target.is_any() {
        return Err(binop_method_error(vm, op, &a, &b));
    }
    let pa = vm.convert_value(&target, a)?;
    let pb = vm.convert_value(&target, b)?;
    same_type_binop(vm, op, pa, pb)
}

fn widen_bool(v: Value) -> Value {
    match v {
        Value::Bool(b) => Value::I64(b as i64),
        other => other,
    }
}

fn binop_method_error(vm: &Vm, op: ArithOp, a: &Value, b: &Value) -> VmError {
    VmError::MethodError(format!(
        "MethodError: no method matching {}(::{}, ::{})",
        op.symbol(),
        a.type_of().display(&vm.lattice),
        b.type_of().display(&vm.lattice)
    ))
}

fn same_type_binop(vm: &mut Vm, op: ArithOp, a: Value, b: Value) -> Result<Value, VmError> {
    match (&a, &b) {
        (Value::U128(x), Value::U128(y)) => u128_op(op, *x, *y),
        (Value::I128(x), Value::I128(y)) => i128_op(op, *x, *y),
        (Value::F16(x), Value::F16(y)) => {
            float_op(op, x.to_f64(), y.to_f64()).map(|r| match r {
                Value::F64(v) => Value::F16(half::f16::from_f64(v)),
                other => other,
            })
        }
        (Value::F32(x), Value::F32(y)) => float_op(op, *x as f64, *y as f64).map(|r| match r {
            Value::F64(v) => Value::F32(v as f32),
            other => other,
        }),
        (Value::F64(x), Value::F64(y)) => float_op(op, *x, *y),
        (Value::BigInt(x), Value::BigInt(y)) => bigint_op(op, x, y),
        (Value::BigFloat(x), Value::BigFloat(y)) => bigfloat_op(op, x, y),
        (Value::Rational(x), Value::Rational(y)) => rational_op(op, *x, *y),
        (Value::Complex(_), Value::Complex(_)) => {
            let (Value::Complex(x), Value::Complex(y)) = (a, b) else {
                unreachable!()
            };
            complex_op(vm, op, *x, *y)
        }
        _ => {
            // Machine integers of the same width ≤ 64 bits.
            let id = machine_int_id(&a);
            match (id, a.as_int(), b.as_int()) {
                (Some(id), Some(x), Some(y)) => machine_int_op(op, id, x, y),
                _ => Err(binop_method_error(vm, op, &a, &b)),
            }
        }
    }
}

fn machine_int_id(v: &Value) -> Option<TypeId> {
    Some(match v {
        Value::I8(_) => c::INT8,
        Value::I16(_) => c::INT16,
        Value::I32(_) => c::INT32,
        Value::I64(_) => c::INT64,
        Value::U8(_) => c::UINT8,
        Value::U16(_) => c::UINT16,
        Value::U32(_) => c::UINT32,
        Value::U64(_) => c::UINT64,
        _ => return None,
    })
}

/// Truncate a two's-complement i128 result back to the operands' width.
fn wrap_to_width(id: TypeId, v: i128) -> Value {
    match id {
        c::INT8 => Value::I8(v as i8),
        c::INT16 => Value::I16(v as i16),
        c::INT32 => Value::I32(v as i32),
        c::INT64 => Value::I64(v as i64),
        c::UINT8 => Value::U8(v as u8),
        c::UINT16 => Value::U16(v as u16),
        c::UINT32 => Value::U32(v as u32),
        c::UINT64 => Value::U64(v as u64),
        _ => Value::I64(v as i64),
    }
}

fn machine_int_op(op: ArithOp, id: TypeId, x: i128, y: i128) -> Result<Value, VmError> {
    match op {
        ArithOp::Add => Ok(wrap_to_width(id, x.wrapping_add(y))),
        ArithOp::Sub => Ok(wrap_to_width(id, x.wrapping_sub(y))),
        ArithOp::Mul => Ok(wrap_to_width(id, x.wrapping_mul(y))),
        // Integer / integer is float division
        ArithOp::Div => Ok(Value::F64(x as f64 / y as f64)),
        ArithOp::IntDiv => {
            if y == 0 {
                return Err(VmError::DivideError);
            }
            let q = x.checked_div(y).ok_or(VmError::DivideError)?;
            Ok(wrap_to_width(id, q))
        }
        ArithOp::Rem => {
            if y == 0 {
                return Err(VmError::DivideError);
            }
            Ok(wrap_to_width(id, x % y))
        }
        ArithOp::Pow => {
            if y < 0 {
                return Err(VmError::DomainError {
                    value: y.to_string(),
                    message:
                        "Cannot raise an integer to a negative power; convert to float first"
                            .to_string(),
                });
            }
            let mut acc: i128 = 1;
            let mut base = x;
            let mut exp = y as u128;
            while exp > 0 {
                if exp & 1 == 1 {
                    acc = acc.wrapping_mul(base);
                }
                base = base.wrapping_mul(base);
                exp >>= 1;
            }
            Ok(wrap_to_width(id, acc))
        }
    }
}

fn i128_op(op: ArithOp, x: i128, y: i128) -> Result<Value, VmError> {
    match op {
        ArithOp::Add => Ok(Value::I128(x.wrapping_add(y))),
        ArithOp::Sub => Ok(Value::I128(x.wrapping_sub(y))),
        ArithOp::Mul => Ok(Value::I128(x.wrapping_mul(y))),
        ArithOp::Div => Ok(Value::F64(x as f64 / y as f64)),
        ArithOp::IntDiv => {
            if y == 0 {
                return Err(VmError::DivideError);
            }
            Ok(Value::I128(x.checked_div(y).ok_or(VmError::DivideError)?))
        }
        ArithOp::Rem => {
            if y == 0 {
                return Err(VmError::DivideError);
            }
            Ok(Value::I128(x % y))
        }
        ArithOp::Pow => machine_int_pow_128(x, y).map(Value::I128),
    }
}

fn u128_op(op: ArithOp, x: u128, y: u128) -> Result<Value, VmError> {
    match op {
        ArithOp::Add => Ok(Value::U128(x.wrapping_add(y))),
        ArithOp::Sub => Ok(Value::U128(x.wrapping_sub(y))),
        ArithOp::Mul => Ok(Value::U128(x.wrapping_mul(y))),
        ArithOp::Div => Ok(Value::F64(x as f64 / y as f64)),
        ArithOp::IntDiv => {
            if y == 0 {
                return Err(VmError::DivideError);
            }
            Ok(Value::U128(x / y))
        }
        ArithOp::Rem => {
            if y == 0 {
                return Err(VmError::DivideError);
            }
            Ok(Value::U128(x % y))
        }
        ArithOp::Pow => {
            let mut acc: u128 = 1;
            let mut base = x;
            let mut exp = y;
            while exp > 0 {
                if exp & 1 == 1 {
                    acc = acc.wrapping_mul(base);
                }
                base = base.wrapping_mul(base);
                exp >>= 1;
            }
            Ok(Value::U128(acc))
        }
    }
}

fn machine_int_pow_128(x: i128, y: i128) -> Result<i128, VmError> {
    if y < 0 {
        return Err(VmError::DomainError {
            value: y.to_string(),
            message: "Cannot raise an integer to a negative power; convert to float first"
                .to_string(),
        });
    }
    let mut acc: i128 = 1;
    let mut base = x;
    let mut exp = y as u128;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = acc.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exp >>= 1;
    }
    Ok(acc)
}

fn float_op(op: ArithOp, x: f64, y: f64) -> Result<Value, VmError> {
    Ok(match op {
        ArithOp::Add => Value::F64(x + y),
        ArithOp::Sub => Value::F64(x - y),
        ArithOp::Mul => Value::F64(x * y),
        ArithOp::Div => Value::F64(x / y),
        ArithOp::IntDiv => Value::F64((x / y).floor()),
        ArithOp::Rem => Value::F64(x % y),
        ArithOp::Pow => Value::F64(x.powf(y)),
    })
}

fn bigint_op(op: ArithOp, x: &RustBigInt, y: &RustBigInt) -> Result<Value, VmError> {
    Ok(match op {
        ArithOp::Add => Value::BigInt(x + y),
        ArithOp::Sub => Value::BigInt(x - y),
        ArithOp::Mul => Value::BigInt(x * y),
        ArithOp::Div => {
            // Exact division of big integers lands in BigFloat.
            let bx = bigfloat_parse(&x.to_string())
                .ok_or_else(|| VmError::Internal("BigInt decimal render failed".to_string()))?;
            let by = bigfloat_parse(&y.to_string())
                .ok_or_else(|| VmError::Internal("BigInt decimal render failed".to_string()))?;
            if y.is_zero() {
                return Err(VmError::DivideError);
            }
            Value::BigFloat(bigfloat_div(&bx, &by))
        }
        ArithOp::IntDiv => {
            if y.is_zero() {
                return Err(VmError::DivideError);
            }
            Value::BigInt(x / y)
        }
        ArithOp::Rem => {
            if y.is_zero() {
                return Err(VmError::DivideError);
            }
            Value::BigInt(x % y)
        }
        ArithOp::Pow => {
            let exp = y.to_u32().ok_or_else(|| {
                VmError::DomainError {
                    value: y.to_string(),
                    message: "BigInt exponent out of range".to_string(),
                }
            })?;
            Value::BigInt(x.pow(exp))
        }
    })
}

fn bigfloat_op(
    op: ArithOp,
    x: &super::value::RustBigFloat,
    y: &super::value::RustBigFloat,
) -> Result<Value, VmError> {
    Ok(match op {
        ArithOp::Add => Value::BigFloat(bigfloat_add(x, y)),
        ArithOp::Sub => Value::BigFloat(bigfloat_sub(x, y)),
        ArithOp::Mul => Value::BigFloat(bigfloat_mul(x, y)),
        ArithOp::Div => {
            if y.is_zero() {
                return Err(VmError::DivideError);
            }
            Value::BigFloat(bigfloat_div(x, y))
        }
        ArithOp::IntDiv | ArithOp::Rem | ArithOp::Pow => {
            return Err(VmError::MethodError(format!(
                "MethodError: no method matching {}(::BigFloat, ::BigFloat)",
                op.symbol()
            )));
        }
    })
}

fn rational_op(op: ArithOp, x: RationalValue, y: RationalValue) -> Result<Value, VmError> {
    let (xn, xd, yn, yd) = (x.num as i128, x.den as i128, y.num as i128, y.den as i128);
    match op {
        ArithOp::Add => rational_from_i128(xn * yd + yn * xd, xd * yd),
        ArithOp::Sub => rational_from_i128(xn * yd - yn * xd, xd * yd),
        ArithOp::Mul => rational_from_i128(xn * yn, xd * yd),
        ArithOp::Div => {
            if yn == 0 {
                return Err(VmError::DivideError);
            }
            rational_from_i128(xn * yd, xd * yn)
        }
        ArithOp::Pow => {
            // q^n with integer n; a rational exponent leaves the field
            if y.den != 1 {
                return Err(VmError::DomainError {
                    value: y.to_string(),
                    message: "rational exponent; use float powers".to_string(),
                });
            }
            let mut exp = y.num;
            let (mut num, mut den) = (xn, xd);
            if exp < 0 {
                if xn == 0 {
                    return Err(VmError::DivideError);
                }
                std::mem::swap(&mut num, &mut den);
                exp = -exp;
            }
            let mut acc_n: i128 = 1;
            let mut acc_d: i128 = 1;
            for _ in 0..exp {
                acc_n = acc_n
                    .checked_mul(num)
                    .ok_or_else(|| VmError::OverflowError("rational power overflow".into()))?;
                acc_d = acc_d
                    .checked_mul(den)
                    .ok_or_else(|| VmError::OverflowError("rational power overflow".into()))?;
            }
            rational_from_i128(acc_n, acc_d)
        }
        ArithOp::IntDiv | ArithOp::Rem => Err(VmError::MethodError(format!(
            "MethodError: no method matching {}(::Rational, ::Rational)",
            op.symbol()
        ))),
    }
}

fn complex_op(vm: &mut Vm, op: ArithOp, x: ComplexValue, y: ComplexValue) -> Result<Value, VmError> {
    match op {
        ArithOp::Add | ArithOp::Sub => {
            let inner = if op == ArithOp::Add {
                ArithOp::Add
            } else {
                ArithOp::Sub
            };
            let re = numeric_binop(vm, inner, x.re.clone(), y.re.clone())?;
            let im = numeric_binop(vm, inner, x.im, y.im)?;
            make_complex(vm, re, im)
        }
        ArithOp::Mul => {
            // (a+bi)(c+di) = (ac - bd) + (ad + bc)i
            let ac = numeric_binop(vm, ArithOp::Mul, x.re.clone(), y.re.clone())?;
            let bd = numeric_binop(vm, ArithOp::Mul, x.im.clone(), y.im.clone())?;
            let ad = numeric_binop(vm, ArithOp::Mul, x.re, y.im)?;
            let bc = numeric_binop(vm, ArithOp::Mul, x.im, y.re)?;
            let re = numeric_binop(vm, ArithOp::Sub, ac, bd)?;
            let im = numeric_binop(vm, ArithOp::Add, ad, bc)?;
            make_complex(vm, re, im)
        }
        ArithOp::Div => {
            // (a+bi)/(c+di) = ((ac+bd) + (bc-ad)i) / (c²+d²)
            let cc = numeric_binop(vm, ArithOp::Mul, y.re.clone(), y.re.clone())?;
            let dd = numeric_binop(vm, ArithOp::Mul, y.im.clone(), y.im.clone())?;
            let denom = numeric_binop(vm, ArithOp::Add, cc, dd)?;
            if is_zero(&denom) {
                return Err(VmError::DivideError);
            }
            let ac = numeric_binop(vm, ArithOp::Mul, x.re.clone(), y.re.clone())?;
            let bd = numeric_binop(vm, ArithOp::Mul, x.im.clone(), y.im.clone())?;
            let bc = numeric_binop(vm, ArithOp::Mul, x.im, y.re)?;
            let ad = numeric_binop(vm, ArithOp::Mul, x.re, y.im)?;
            let re_num = numeric_binop(vm, ArithOp::Add, ac, bd)?;
            let im_num = numeric_binop(vm, ArithOp::Sub, bc, ad)?;
            let re = numeric_binop(vm, ArithOp::Div, re_num, denom.clone())?;
            let im = numeric_binop(vm, ArithOp::Div, im_num, denom)?;
            make_complex(vm, re, im)
        }
        ArithOp::Pow => {
            let Some(exp) = complex_int_exponent(&y) else {
                return Err(VmError::MethodError(
                    "MethodError: complex exponents are not supported".to_string(),
                ));
            };
            if exp < 0 {
                return Err(VmError::DomainError {
                    value: exp.to_string(),
                    message: "negative complex integer power".to_string(),
                });
            }
            let mut acc = Value::Complex(Box::new(ComplexValue {
                re: Value::I64(1),
                im: Value::I64(0),
            }));
            let base = Value::Complex(Box::new(x));
            for _ in 0..exp {
                acc = numeric_binop(vm, ArithOp::Mul, acc, base.clone())?;
            }
            Ok(acc)
        }
        ArithOp::IntDiv | ArithOp::Rem => Err(VmError::MethodError(format!(
            "MethodError: no method matching {}(::Complex, ::Complex)",
            op.symbol()
        ))),
    }
}

/// Integer payload of a purely-real complex exponent, if any.
fn complex_int_exponent(z: &ComplexValue) -> Option<i128> {
    if !is_zero(&z.im) {
        return None;
    }
    z.re.as_int()
}

/// Build a complex value with both parts promoted to a common type.
pub(crate) fn make_complex(vm: &mut Vm, re: Value, im: Value) -> Result<Value, VmError> {
    let tr = re.type_of();
    let ti = im.type_of();
    if tr == ti {
        return Ok(Value::Complex(Box::new(ComplexValue { re, im })));
    }
    let target = vm.promote_type_tys(&tr, &ti);
    if target.is_any() {
        return Err(VmError::MethodError(
            "MethodError: Complex parts must share a numeric type".to_string(),
        ));
    }
    let re = vm.convert_value(&target, re)?;
    let im = vm.convert_value(&target, im)?;
    Ok(Value::Complex(Box::new(ComplexValue { re, im })))
}

/// Complex constructor builtin: `Complex(re)`, `Complex(re, im)`, `complex(..)`.
pub(crate) fn nf_complex(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    match args.len() {
        1 => {
            let re = args.pop().unwrap();
            let im = Value::I64(0);
            make_complex(vm, re, im)
        }
        2 => {
            let im = args.pop().unwrap();
            let re = args.pop().unwrap();
            make_complex(vm, re, im)
        }
        n => Err(VmError::MethodError(format!(
            "MethodError: no method matching Complex with {} arguments",
            n
        ))),
    }
}

// ── helpers shared with other builtin modules ──────────────────────────────

fn negate(a: Value) -> Result<Value, VmError> {
    Ok(match a {
        Value::I8(x) => Value::I8(x.wrapping_neg()),
        Value::I16(x) => Value::I16(x.wrapping_neg()),
        Value::I32(x) => Value::I32(x.wrapping_neg()),
        Value::I64(x) => Value::I64(x.wrapping_neg()),
        Value::I128(x) => Value::I128(x.wrapping_neg()),
        Value::U8(x) => Value::U8(x.wrapping_neg()),
        Value::U16(x) => Value::U16(x.wrapping_neg()),
        Value::U32(x) => Value::U32(x.wrapping_neg()),
        Value::U64(x) => Value::U64(x.wrapping_neg()),
        Value::U128(x) => Value::U128(x.wrapping_neg()),
        Value::Bool(b) => Value::I64(-(b as i64)),
        Value::F16(x) => Value::F16(-x),
        Value::F32(x) => Value::F32(-x),
        Value::F64(x) => Value::F64(-x),
        Value::BigInt(n) => Value::BigInt(-n),
        Value::BigFloat(x) => Value::BigFloat(x.neg()),
        Value::Rational(r) => Value::Rational(RationalValue {
            num: r.num.wrapping_neg(),
            den: r.den,
        }),
        Value::Complex(z) => {
            let re = negate(z.re)?;
            let im = negate(z.im)?;
            Value::Complex(Box::new(ComplexValue { re, im }))
        }
        _ => {
            return Err(VmError::MethodError(
                "MethodError: no method matching -(::non-numeric)".to_string(),
            ));
        }
    })
}

fn num_as_i64(v: &Value) -> Option<i64> {
    v.as_index()
}

fn int_pair(a: &Value, b: &Value) -> Result<(i128, i128), VmError> {
    match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(VmError::MethodError(
            "MethodError: expected integer arguments".to_string(),
        )),
    }
}

fn i128_to_i64(v: i128, what: &str) -> Result<i64, VmError> {
    i64::try_from(v).map_err(|_| VmError::OverflowError(format!("{} overflow", what)))
}

pub(crate) fn rational_value(num: i64, den: i64) -> Result<Value, VmError> {
    match RationalValue::new(num, den) {
        Some(r) => Ok(Value::Rational(r)),
        None => Err(VmError::DivideError),
    }
}

fn rational_from_i128(num: i128, den: i128) -> Result<Value, VmError> {
    if den == 0 {
        return Err(VmError::DivideError);
    }
    let g = num.abs().gcd(&den.abs());
    let sign = if den < 0 { -1 } else { 1 };
    let (num, den) = (sign * num / g, den.abs() / g);
    match (i64::try_from(num), i64::try_from(den)) {
        (Ok(n), Ok(d)) => Ok(Value::Rational(RationalValue { num: n, den: d })),
        _ => Err(VmError::OverflowError("Rational overflow".to_string())),
    }
}

fn floor_div(vm: &mut Vm, a: Value, b: Value) -> Result<Value, VmError> {
    match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => {
            if y == 0 {
                return Err(VmError::DivideError);
            }
            Ok(Value::I64(i128_to_i64(floored_div_i128(x, y)?, "fld")?))
        }
        _ => {
            let q = numeric_binop(vm, ArithOp::Div, a, b)?;
            match q {
                Value::F64(x) => Ok(Value::F64(x.floor())),
                Value::F32(x) => Ok(Value::F32(x.floor())),
                other => Ok(other),
            }
        }
    }
}

fn floored_div_i128(x: i128, y: i128) -> Result<i128, VmError> {
    if y == 0 {
        return Err(VmError::DivideError);
    }
    let q = x.checked_div(y).ok_or(VmError::DivideError)?;
    if (x % y != 0) && ((x < 0) != (y < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

fn floored_mod(vm: &mut Vm, a: Value, b: Value) -> Result<Value, VmError> {
    match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => {
            if y == 0 {
                return Err(VmError::DivideError);
            }
            let r = x - floored_div_i128(x, y)? * y;
            Ok(Value::I64(i128_to_i64(r, "mod")?))
        }
        _ => {
            let r = numeric_binop(vm, ArithOp::Rem, a, b.clone())?;
            // adjust remainder to the divisor's sign
            match (&r, b.as_f64_lossy()) {
                (Value::F64(x), Some(y)) if *x != 0.0 && (x.is_sign_negative() != (y < 0.0)) => {
                    Ok(Value::F64(x + y))
                }
                _ => Ok(r),
            }
        }
    }
}

fn one_based_mod(vm: &mut Vm, a: Value, b: Value) -> Result<Value, VmError> {
    // mod1(x, y) == mod(x - 1, y) + 1
    let shifted = numeric_binop(vm, ArithOp::Sub, a, Value::I64(1))?;
    let m = floored_mod(vm, shifted, b)?;
    numeric_binop(vm, ArithOp::Add, m, Value::I64(1))
}

fn one_based_fld(vm: &mut Vm, a: Value, b: Value) -> Result<Value, VmError> {
    // fld1(x, y) == fld(x - 1, y) + 1
    let shifted = numeric_binop(vm, ArithOp::Sub, a, Value::I64(1))?;
    let q = floor_div(vm, shifted, b)?;
    numeric_binop(vm, ArithOp::Add, q, Value::I64(1))
}
