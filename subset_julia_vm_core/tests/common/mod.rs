//! Shared helpers for integration tests
// This helper module is consumed selectively by many integration test files.
#![allow(dead_code)]

use subset_julia_vm_core::core_types as c;
use subset_julia_vm_core::vm::value::{new_array_ref, ArrayValue, ComplexValue, RationalValue};
use subset_julia_vm_core::{Ty, Value, Vm};

pub fn int_vector(data: &[i64]) -> Value {
    Value::Array(new_array_ref(ArrayValue::vector(
        Ty::Named(c::INT64),
        data.iter().map(|&n| Value::I64(n)).collect(),
    )))
}

pub fn complex_i64(re: i64, im: i64) -> Value {
    Value::Complex(Box::new(ComplexValue {
        re: Value::I64(re),
        im: Value::I64(im),
    }))
}

pub fn rational(num: i64, den: i64) -> Value {
    Value::Rational(RationalValue::new(num, den).expect("nonzero denominator"))
}

pub fn expect_f64(v: &Value) -> f64 {
    match v {
        Value::F64(x) => *x,
        other => panic!("expected Float64, got {:?}", other),
    }
}

pub fn assert_approx(v: &Value, expected: f64) {
    let x = expect_f64(v);
    assert!(
        (x - expected).abs() < 1e-9,
        "expected ≈{}, got {}",
        expected,
        x
    );
}

pub fn fresh_vm() -> Vm {
    Vm::new()
}
