//! Numeric-tower tests through the call surface: promotion symmetry,
//! operator commutativity, and the rational/complex scenarios.

mod common;

use common::{complex_i64, fresh_vm, rational};

use subset_julia_vm_core::core_types as c;
use subset_julia_vm_core::{Ty, TyArg, Value};

/// `1 // 2 + 2 == 5//2` of Rational type.
#[test]
fn test_rational_scenario() {
    let mut vm = fresh_vm();
    let half = vm.call("//", vec![Value::I64(1), Value::I64(2)]).unwrap();
    let result = vm.call("+", vec![half, Value::I64(2)]).unwrap();
    assert_eq!(result, rational(5, 2));
    assert_eq!(
        vm.call("typeof", vec![result]).unwrap(),
        Value::DataType(Ty::Applied(
            c::RATIONAL,
            vec![TyArg::Ty(Ty::Named(c::INT64))]
        ))
    );
}

/// `(1+2im) + (3+4im)` is `Complex{Int64}` with re=4, im=6.
#[test]
fn test_complex_scenario() {
    let mut vm = fresh_vm();
    let result = vm
        .call("+", vec![complex_i64(1, 2), complex_i64(3, 4)])
        .unwrap();
    assert_eq!(result, complex_i64(4, 6));
    assert_eq!(
        vm.call("typeof", vec![result]).unwrap(),
        Value::DataType(Ty::Applied(
            c::COMPLEX,
            vec![TyArg::Ty(Ty::Named(c::INT64))]
        ))
    );
}

/// Promotion symmetry at the `promote_type` surface.
#[test]
fn test_promote_type_symmetry() {
    let mut vm = fresh_vm();
    let tower = [
        Ty::Named(c::BOOL),
        Ty::Named(c::INT8),
        Ty::Named(c::INT32),
        Ty::Named(c::INT64),
        Ty::Named(c::UINT8),
        Ty::Named(c::FLOAT32),
        Ty::Named(c::FLOAT64),
        Ty::Named(c::BIGINT),
        Ty::Named(c::BIGFLOAT),
        Ty::Applied(c::RATIONAL, vec![TyArg::Ty(Ty::Named(c::INT64))]),
        Ty::Applied(c::COMPLEX, vec![TyArg::Ty(Ty::Named(c::INT64))]),
    ];
    for a in &tower {
        for b in &tower {
            let ab = vm
                .call(
                    "promote_type",
                    vec![Value::DataType(a.clone()), Value::DataType(b.clone())],
                )
                .unwrap();
            let ba = vm
                .call(
                    "promote_type",
                    vec![Value::DataType(b.clone()), Value::DataType(a.clone())],
                )
                .unwrap();
            assert_eq!(ab, ba, "promote_type not symmetric for {:?} / {:?}", a, b);
        }
    }
}

/// Commutativity of `+` and `*` across the registered mixed pairs.
#[test]
fn test_numeric_commutativity() {
    let mut vm = fresh_vm();
    let pairs = [
        (Value::I64(3), rational(1, 2)),
        (Value::I64(3), complex_i64(1, 2)),
        (Value::Bool(true), Value::F64(1.5)),
        (Value::Bool(true), Value::F32(0.5)),
        (Value::I64(7), Value::new_bigint(41)),
    ];
    for (a, b) in pairs {
        for op in ["+", "*"] {
            let ab = vm.call(op, vec![a.clone(), b.clone()]).unwrap();
            let ba = vm.call(op, vec![b.clone(), a.clone()]).unwrap();
            assert_eq!(
                vm.call("==", vec![ab.clone(), ba.clone()]).unwrap(),
                Value::Bool(true),
                "{} not commutative for {:?} / {:?} ({:?} vs {:?})",
                op,
                a,
                b,
                ab,
                ba
            );
        }
    }
}

/// Mixed promotion: `Bool + Float32` stays `Float32`,
/// `Int + Rational` is `Rational`, `Int + Complex` is `Complex`.
#[test]
fn test_mixed_operand_promotions() {
    let mut vm = fresh_vm();
    let r = vm
        .call("+", vec![Value::Bool(true), Value::F32(1.5)])
        .unwrap();
    assert_eq!(r, Value::F32(2.5));

    let r = vm.call("+", vec![Value::I64(1), rational(1, 2)]).unwrap();
    assert_eq!(r, rational(3, 2));

    let r = vm.call("+", vec![Value::I64(1), complex_i64(0, 1)]).unwrap();
    assert_eq!(r, complex_i64(1, 1));
}

/// A user `promote_rule` method extends `promote_type` (tried both orders).
#[test]
fn test_user_promote_rule_extends_promotion() {
    use subset_julia_vm_core::{Vm, VmError};

    fn meters_rule(_vm: &mut Vm, _args: Vec<Value>) -> Result<Value, VmError> {
        Ok(Value::DataType(Ty::Named(c::FLOAT64)))
    }

    let mut vm = fresh_vm();
    let meters = vm
        .register_type("Meters", c::ANY, Vec::new(), false, Vec::new())
        .unwrap();
    vm.register_builtin(
        "promote_rule",
        vec![
            Ty::TypeOf(Box::new(Ty::Named(meters))),
            Ty::TypeOf(Box::new(Ty::Named(c::INT64))),
        ],
        meters_rule,
    );
    // Both orders find the single-direction rule
    for (a, b) in [(meters, c::INT64), (c::INT64, meters)] {
        let result = vm
            .call(
                "promote_type",
                vec![
                    Value::DataType(Ty::Named(a)),
                    Value::DataType(Ty::Named(b)),
                ],
            )
            .unwrap();
        assert_eq!(result, Value::DataType(Ty::Named(c::FLOAT64)));
    }
}

/// BigFloat arithmetic reads the process-wide precision.
#[test]
fn test_bigfloat_respects_precision_setting() {
    let mut vm = fresh_vm();
    let old = vm.call("setprecision", vec![Value::I64(128)]).unwrap();
    let x = vm.call("big", vec![Value::F64(1.0)]).unwrap();
    let prec = vm.call("precision", vec![x]).unwrap();
    assert_eq!(prec, Value::I64(128));
    vm.call("setprecision", vec![old]).unwrap();
}

/// Integer `^` with a negative exponent is a DomainError; `2^10` stays Int.
#[test]
fn test_integer_power_domain() {
    let mut vm = fresh_vm();
    assert_eq!(
        vm.call("^", vec![Value::I64(2), Value::I64(10)]).unwrap(),
        Value::I64(1024)
    );
    let err = vm.call("^", vec![Value::I64(2), Value::I64(-1)]).unwrap_err();
    assert!(matches!(
        err,
        subset_julia_vm_core::VmError::DomainError { .. }
    ));
}

/// Singleton comparison parity: `==` and `===` agree for nothing, types,
/// symbols, and chars.
#[test]
fn test_singleton_eq_egal_parity_through_builtins() {
    use subset_julia_vm_core::vm::value::SymbolValue;
    let mut vm = fresh_vm();
    let singletons = [
        Value::Nothing,
        Value::DataType(Ty::Named(c::INT64)),
        Value::Sym(SymbolValue::new("s")),
        Value::Char('q'),
    ];
    for x in &singletons {
        for y in &singletons {
            let eq = vm.call("==", vec![x.clone(), y.clone()]).unwrap();
            let egal = vm.call("===", vec![x.clone(), y.clone()]).unwrap();
            assert_eq!(eq, egal, "parity broken for {:?} / {:?}", x, y);
        }
    }
}
