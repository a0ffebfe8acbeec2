//! Introspection builtins and the error-raising surface.

use crate::types::{core_types as c, is_subtype, Ty, TypeId};

use super::value::{
    bigfloat_from_i64, get_bigfloat_precision, get_bigfloat_rounding_mode,
    set_bigfloat_precision, set_bigfloat_rounding_mode, ExceptionValue, RationalValue,
    RustBigInt, SymbolValue, TupleValue, Value,
};
use super::{Vm, VmError};

// ── type introspection ──────────────────────────────────────────────────────

pub(crate) fn nf_typeof(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    Ok(Value::DataType(x.type_of()))
}

pub(crate) fn nf_isa(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let t = args.pop().ok_or(VmError::StackUnderflow)?;
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    let Value::DataType(target) = t else {
        return Err(VmError::TypeError(
            "isa: second argument must be a type".to_string(),
        ));
    };
    Ok(Value::Bool(is_subtype(
        &x.dispatch_type(),
        &target,
        &vm.lattice,
    )))
}

/// The `<:` operator on type objects.
pub(crate) fn nf_subtype(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let b = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    match (a, b) {
        (Value::DataType(x), Value::DataType(y)) => {
            Ok(Value::Bool(is_subtype(&x, &y, &vm.lattice)))
        }
        _ => Err(VmError::TypeError("<: expects two types".to_string())),
    }
}

pub(crate) fn nf_fieldnames(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let t = args.pop().ok_or(VmError::StackUnderflow)?;
    let id = datatype_head(vm, &t)?;
    let names: Vec<Value> = vm
        .lattice
        .fields(id)
        .iter()
        .map(|f| Value::Sym(SymbolValue::new(f.name.clone())))
        .collect();
    Ok(Value::Tuple(TupleValue::new(names)))
}

pub(crate) fn nf_fieldtypes(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let t = args.pop().ok_or(VmError::StackUnderflow)?;
    let Value::DataType(ty) = &t else {
        return Err(VmError::TypeError("fieldtypes expects a type".to_string()));
    };
    let id = datatype_head(vm, &t)?;
    // Resolve declared field types against explicit parameters.
    let node = vm.lattice.node(id).clone();
    let mut fields: Vec<Ty> = vm.lattice.fields(id).iter().map(|f| f.ty.clone()).collect();
    if let Ty::Applied(_, args) = ty {
        for (pname, arg) in node.params.iter().zip(args) {
            if let crate::types::TyArg::Ty(replacement) = arg {
                for field in &mut fields {
                    *field = field.substitute(pname, replacement);
                }
            }
        }
    }
    Ok(Value::Tuple(TupleValue::new(
        fields.into_iter().map(Value::DataType).collect(),
    )))
}

pub(crate) fn nf_nfields(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    let count = match &x {
        Value::Struct(s) => s.values.len(),
        Value::MutStruct(s) => s.borrow().values.len(),
        Value::Tuple(t) => t.elements.len(),
        Value::NamedTuple(nt) => nt.values.len(),
        Value::Complex(_) | Value::Rational(_) | Value::Pair(_) => 2,
        _ => {
            let id = x.type_of().head();
            match id {
                Some(id) => vm.lattice.fields(id).len(),
                None => 0,
            }
        }
    };
    Ok(Value::I64(count as i64))
}

fn datatype_head(vm: &Vm, t: &Value) -> Result<TypeId, VmError> {
    let Value::DataType(ty) = t else {
        return Err(VmError::TypeError("expected a type".to_string()));
    };
    ty.head().ok_or_else(|| {
        VmError::ArgumentError(format!(
            "type {} has no nominal head",
            ty.display(&vm.lattice)
        ))
    })
}

pub(crate) fn nf_nonmissingtype(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let t = args.pop().ok_or(VmError::StackUnderflow)?;
    let Value::DataType(ty) = t else {
        return Err(VmError::TypeError(
            "nonmissingtype expects a type".to_string(),
        ));
    };
    Ok(Value::DataType(ty.nonmissingtype()))
}

// ── numeric type queries ────────────────────────────────────────────────────

pub(crate) fn nf_typemin(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let t = args.pop().ok_or(VmError::StackUnderflow)?;
    let id = datatype_head(vm, &t)?;
    Ok(match id {
        c::INT8 => Value::I8(i8::MIN),
        c::INT16 => Value::I16(i16::MIN),
        c::INT32 => Value::I32(i32::MIN),
        c::INT64 => Value::I64(i64::MIN),
        c::INT128 => Value::I128(i128::MIN),
        c::UINT8 => Value::U8(u8::MIN),
        c::UINT16 => Value::U16(u16::MIN),
        c::UINT32 => Value::U32(u32::MIN),
        c::UINT64 => Value::U64(u64::MIN),
        c::UINT128 => Value::U128(u128::MIN),
        c::BOOL => Value::Bool(false),
        c::FLOAT16 => Value::F16(half::f16::NEG_INFINITY),
        c::FLOAT32 => Value::F32(f32::NEG_INFINITY),
        c::FLOAT64 => Value::F64(f64::NEG_INFINITY),
        _ => {
            return Err(VmError::MethodError(format!(
                "MethodError: no method matching typemin(::Type{{{}}})",
                vm.lattice.name(id)
            )));
        }
    })
}

pub(crate) fn nf_typemax(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let t = args.pop().ok_or(VmError::StackUnderflow)?;
    let id = datatype_head(vm, &t)?;
    Ok(match id {
        c::INT8 => Value::I8(i8::MAX),
        c::INT16 => Value::I16(i16::MAX),
        c::INT32 => Value::I32(i32::MAX),
        c::INT64 => Value::I64(i64::MAX),
        c::INT128 => Value::I128(i128::MAX),
        c::UINT8 => Value::U8(u8::MAX),
        c::UINT16 => Value::U16(u16::MAX),
        c::UINT32 => Value::U32(u32::MAX),
        c::UINT64 => Value::U64(u64::MAX),
        c::UINT128 => Value::U128(u128::MAX),
        c::BOOL => Value::Bool(true),
        c::FLOAT16 => Value::F16(half::f16::INFINITY),
        c::FLOAT32 => Value::F32(f32::INFINITY),
        c::FLOAT64 => Value::F64(f64::INFINITY),
        _ => {
            return Err(VmError::MethodError(format!(
                "MethodError: no method matching typemax(::Type{{{}}})",
                vm.lattice.name(id)
            )));
        }
    })
}

/// `zero(T)` / `zero(x)`.
pub(crate) fn nf_zero(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    unit_value(vm, &x, 0)
}

/// `one(T)` / `one(x)`.
pub(crate) fn nf_one(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    unit_value(vm, &x, 1)
}

/// `oneunit(T) == T(one(T))`.
pub(crate) fn nf_oneunit(vm: &mut Vm, args: Vec<Value>) -> Result<Value, VmError> {
    nf_one(vm, args)
}

fn unit_value(vm: &mut Vm, x: &Value, n: i64) -> Result<Value, VmError> {
    let ty = match x {
        Value::DataType(ty) => ty.clone(),
        other => other.type_of(),
    };
    match &ty {
        Ty::Named(id) => Ok(match *id {
            c::INT8 => Value::I8(n as i8),
            c::INT16 => Value::I16(n as i16),
            c::INT32 => Value::I32(n as i32),
            c::INT64 => Value::I64(n),
            c::INT128 => Value::I128(n as i128),
            c::UINT8 => Value::U8(n as u8),
            c::UINT16 => Value::U16(n as u16),
            c::UINT32 => Value::U32(n as u32),
            c::UINT64 => Value::U64(n as u64),
            c::UINT128 => Value::U128(n as u128),
            c::BOOL => Value::Bool(n != 0),
            c::FLOAT16 => Value::F16(half::f16::from_f64(n as f64)),
            c::FLOAT32 => Value::F32(n as f32),
            c::FLOAT64 => Value::F64(n as f64),
            c::BIGINT => Value::BigInt(RustBigInt::from(n)),
            c::BIGFLOAT => Value::BigFloat(bigfloat_from_i64(n)),
            _ => {
                return Err(VmError::MethodError(format!(
                    "MethodError: no method matching zero/one for {}",
                    vm.lattice.name(*id)
                )));
            }
        }),
        Ty::Applied(id, _) if *id == c::RATIONAL => {
            Ok(Value::Rational(RationalValue::from_int(n)))
        }
        Ty::Applied(id, args) if *id == c::COMPLEX => {
            let elem = match args.first() {
                Some(crate::types::TyArg::Ty(t)) => Value::DataType(t.clone()),
                _ => Value::DataType(Ty::Named(c::INT64)),
            };
            let re = unit_value(vm, &elem, n)?;
            let im = unit_value(vm, &elem, 0)?;
            Ok(Value::Complex(Box::new(super::value::ComplexValue {
                re,
                im,
            })))
        }
        _ => Err(VmError::MethodError(format!(
            "MethodError: no method matching zero/one for {}",
            ty.display(&vm.lattice)
        ))),
    }
}

pub(crate) fn nf_eps(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    if args.is_empty() {
        return Ok(Value::F64(f64::EPSILON));
    }
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    let ty = match &x {
        Value::DataType(ty) => ty.clone(),
        other => other.type_of(),
    };
    match ty.head() {
        Some(c::FLOAT64) => Ok(Value::F64(f64::EPSILON)),
        Some(c::FLOAT32) => Ok(Value::F32(f32::EPSILON)),
        Some(c::FLOAT16) => Ok(Value::F16(half::f16::EPSILON)),
        _ => Err(VmError::MethodError(
            "MethodError: no method matching eps for this type".to_string(),
        )),
    }
}

// ── BigFloat mode surface ──────────────────────────────────────────────────

pub(crate) fn nf_precision(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    match &x {
        Value::BigFloat(bf) => {
            let p = bf
                .precision()
                .unwrap_or_else(get_bigfloat_precision);
            Ok(Value::I64(p as i64))
        }
        Value::DataType(ty) if ty.head() == Some(c::BIGFLOAT) => {
            Ok(Value::I64(get_bigfloat_precision() as i64))
        }
        _ => Err(VmError::MethodError(
            "MethodError: no method matching precision for this value".to_string(),
        )),
    }
}

pub(crate) fn nf_setprecision(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let bits = args.pop().ok_or(VmError::StackUnderflow)?;
    // Optional leading type argument: setprecision(BigFloat, n)
    let bits = match bits {
        Value::DataType(_) => {
            return Err(VmError::ArgumentError(
                "setprecision: missing precision argument".to_string(),
            ));
        }
        other => other,
    };
    let n = bits
        .as_index()
        .filter(|n| *n > 0)
        .ok_or_else(|| VmError::DomainError {
            value: "precision".to_string(),
            message: "precision must be a positive integer".to_string(),
        })?;
    let old = set_bigfloat_precision(n as usize);
    Ok(Value::I64(old as i64))
}

const ROUNDING_MODES: [(&str, u8); 6] = [
    ("RoundNearest", 0),
    ("RoundToZero", 1),
    ("RoundUp", 2),
    ("RoundDown", 3),
    ("RoundFromZero", 4),
    ("RoundNearestTiesAway", 5),
];

pub(crate) fn nf_rounding(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let _ = args.pop();
    let mode = get_bigfloat_rounding_mode();
    let name = ROUNDING_MODES
        .iter()
        .find(|(_, m)| *m == mode)
        .map(|(n, _)| *n)
        .unwrap_or("RoundNearest");
    Ok(Value::Sym(SymbolValue::new(name)))
}

pub(crate) fn nf_setrounding(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let mode = args.pop().ok_or(VmError::StackUnderflow)?;
    let Value::Sym(sym) = mode else {
        return Err(VmError::ArgumentError(
            "setrounding expects a rounding mode symbol".to_string(),
        ));
    };
    let Some((_, code)) = ROUNDING_MODES.iter().find(|(n, _)| *n == sym.as_str()) else {
        return Err(VmError::ArgumentError(format!(
            "unknown rounding mode {}",
            sym
        )));
    };
    let old = set_bigfloat_rounding_mode(*code);
    let old_name = ROUNDING_MODES
        .iter()
        .find(|(_, m)| *m == old)
        .map(|(n, _)| *n)
        .unwrap_or("RoundNearest");
    Ok(Value::Sym(SymbolValue::new(old_name)))
}

// ── error raising and exception constructors ───────────────────────────────

pub(crate) fn nf_throw(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    Err(VmError::Thrown(x))
}

pub(crate) fn nf_error(vm: &mut Vm, args: Vec<Value>) -> Result<Value, VmError> {
    let message = args
        .iter()
        .map(|v| super::formatting::format_value(v, &vm.lattice, false))
        .collect::<Vec<_>>()
        .join("");
    Err(VmError::ErrorException(message))
}

macro_rules! exception_ctor {
    ($name:ident, $ty:expr) => {
        pub(crate) fn $name(vm: &mut Vm, args: Vec<Value>) -> Result<Value, VmError> {
            let message = args
                .iter()
                .map(|v| super::formatting::format_value(v, &vm.lattice, false))
                .collect::<Vec<_>>()
                .join(": ");
            Ok(Value::Exception(Box::new(ExceptionValue::new($ty, message))))
        }
    };
}

exception_ctor!(nf_error_exception, c::ERROR_EXCEPTION);
exception_ctor!(nf_argument_error, c::ARGUMENT_ERROR);
exception_ctor!(nf_assertion_error, c::ASSERTION_ERROR);
exception_ctor!(nf_key_error, c::KEY_ERROR);
exception_ctor!(nf_divide_error, c::DIVIDE_ERROR);
exception_ctor!(nf_bounds_error, c::BOUNDS_ERROR);
exception_ctor!(nf_method_error_ctor, c::METHOD_ERROR);
exception_ctor!(nf_eof_error, c::EOF_ERROR);

/// `DomainError(val)` / `DomainError(val, msg)` keeps the offending value.
pub(crate) fn nf_domain_error(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let (val, msg) = match args.len() {
        1 => (args.pop().unwrap(), String::new()),
        2 => {
            let msg = args.pop().unwrap();
            let val = args.pop().unwrap();
            (
                val,
                super::formatting::format_value(&msg, &vm.lattice, false),
            )
        }
        n => {
            return Err(VmError::MethodError(format!(
                "MethodError: no method matching DomainError with {} arguments",
                n
            )));
        }
    };
    let rendered = super::formatting::format_value(&val, &vm.lattice, false);
    Ok(Value::Exception(Box::new(ExceptionValue::with_fields(
        c::DOMAIN_ERROR,
        format!("DomainError with {}: {}", rendered, msg),
        vec![("val".to_string(), val)],
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm() -> Vm {
        Vm::new()
    }

    #[test]
    fn test_typeof_and_isa() {
        let mut vm = vm();
        assert_eq!(
            nf_typeof(&mut vm, vec![Value::I64(1)]).unwrap(),
            Value::DataType(Ty::Named(c::INT64))
        );
        assert_eq!(
            nf_isa(
                &mut vm,
                vec![Value::I64(1), Value::DataType(Ty::Named(c::INTEGER))]
            )
            .unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            nf_isa(
                &mut vm,
                vec![Value::I64(1), Value::DataType(Ty::Named(c::FLOAT64))]
            )
            .unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_isa_function_value_is_function() {
        // The engine answers true here (a function value is a Function).
        let mut vm = vm();
        let f = vm.function_value("+");
        assert_eq!(
            nf_isa(&mut vm, vec![f, Value::DataType(Ty::Named(c::FUNCTION))]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_typemin_typemax() {
        let mut vm = vm();
        assert_eq!(
            nf_typemin(&mut vm, vec![Value::DataType(Ty::Named(c::INT8))]).unwrap(),
            Value::I8(i8::MIN)
        );
        assert_eq!(
            nf_typemax(&mut vm, vec![Value::DataType(Ty::Named(c::BOOL))]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            nf_typemax(&mut vm, vec![Value::DataType(Ty::Named(c::FLOAT64))]).unwrap(),
            Value::F64(f64::INFINITY)
        );
    }

    #[test]
    fn test_zero_one_preserve_type() {
        let mut vm = vm();
        assert_eq!(
            nf_zero(&mut vm, vec![Value::DataType(Ty::Named(c::INT8))]).unwrap(),
            Value::I8(0)
        );
        assert_eq!(
            nf_one(&mut vm, vec![Value::F32(9.0)]).unwrap(),
            Value::F32(1.0)
        );
        assert_eq!(
            nf_zero(&mut vm, vec![Value::DataType(Ty::Named(c::BIGINT))]).unwrap(),
            Value::new_bigint(0)
        );
    }

    #[test]
    fn test_setprecision_roundtrip() {
        let mut vm = vm();
        let old = nf_setprecision(&mut vm, vec![Value::I64(128)]).unwrap();
        let restored = nf_setprecision(&mut vm, vec![old.clone()]).unwrap();
        assert_eq!(restored, Value::I64(128));
    }

    #[test]
    fn test_rounding_mode_symbols() {
        let mut vm = vm();
        let old = nf_setrounding(&mut vm, vec![Value::Sym(SymbolValue::new("RoundUp"))]).unwrap();
        assert_eq!(
            nf_rounding(&mut vm, vec![]).unwrap(),
            Value::Sym(SymbolValue::new("RoundUp"))
        );
        nf_setrounding(&mut vm, vec![old]).unwrap();
    }

    #[test]
    fn test_throw_carries_value() {
        let mut vm = vm();
        let err = nf_throw(&mut vm, vec![Value::I64(3)]).unwrap_err();
        assert_eq!(err, VmError::Thrown(Value::I64(3)));
    }

    #[test]
    fn test_fieldnames_of_registered_struct() {
        let mut vm = vm();
        let id = vm
            .register_type(
                "Point",
                c::ANY,
                vec![
                    crate::types::Field {
                        name: "x".to_string(),
                        ty: Ty::Named(c::FLOAT64),
                    },
                    crate::types::Field {
                        name: "y".to_string(),
                        ty: Ty::Named(c::FLOAT64),
                    },
                ],
                false,
                Vec::new(),
            )
            .unwrap();
        let result = nf_fieldnames(&mut vm, vec![Value::DataType(Ty::Named(id))]).unwrap();
        assert_eq!(
            result,
            Value::Tuple(TupleValue::new(vec![
                Value::Sym(SymbolValue::new("x")),
                Value::Sym(SymbolValue::new("y")),
            ]))
        );
    }
}
