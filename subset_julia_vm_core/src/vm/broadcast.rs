//! Broadcasting: elementwise application of a callable across container
//! arguments, holding scalars fixed.
//!
//! `f.(a, b, c)` lowers to a `broadcast` call. Tuples broadcast to tuples;
//! arrays (and ranges) broadcast to an array of the promoted element type,
//! with singleton dimensions stretched and mismatched shapes raising
//! `DimensionMismatch`.

#[cfg(test)]
use crate::types::Ty;

use super::value::{new_array_ref, ArrayValue, TupleValue, Value};
use super::{Vm, VmError};

enum Slot {
    Scalar(Value),
    /// Flat column-major items plus their shape.
    Shaped { items: Vec<Value>, shape: Vec<usize> },
    Tuple(Vec<Value>),
}

pub(crate) fn nf_broadcast(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    if args.is_empty() {
        return Err(VmError::MethodError(
            "MethodError: no method matching broadcast()".to_string(),
        ));
    }
    let rest = args.split_off(1);
    let f = args.pop().ok_or(VmError::StackUnderflow)?;
    broadcast_call(vm, f, rest)
}

pub(crate) fn broadcast_call(vm: &mut Vm, f: Value, args: Vec<Value>) -> Result<Value, VmError> {
    let mut slots = Vec::with_capacity(args.len());
    for arg in args {
        slots.push(classify(arg));
    }

    let any_shaped = slots.iter().any(|s| matches!(s, Slot::Shaped { .. }));
    let any_tuple = slots.iter().any(|s| matches!(s, Slot::Tuple(_)));

    if !any_shaped && !any_tuple {
        // All scalars: plain call
        let scalars = slots
            .into_iter()
            .map(|s| match s {
                Slot::Scalar(v) => v,
                _ => unreachable!(),
            })
            .collect();
        return vm.call_value(f, scalars, Vec::new());
    }

    if any_tuple && !any_shaped {
        return broadcast_tuples(vm, f, slots);
    }

    // Arrays dominate: tuples participate as 1-D collections.
    let slots: Vec<Slot> = slots
        .into_iter()
        .map(|s| match s {
            Slot::Tuple(items) => {
                let shape = vec![items.len()];
                Slot::Shaped { items, shape }
            }
            other => other,
        })
        .collect();
    broadcast_arrays(vm, f, slots)
}

fn classify(arg: Value) -> Slot {
    match arg {
        Value::Array(ref arr) => {
            let arr = arr.borrow();
            Slot::Shaped {
                items: arr.to_vec(),
                shape: arr.shape.clone(),
            }
        }
        Value::Range(r) => Slot::Shaped {
            items: r.iter().map(Value::I64).collect(),
            shape: vec![r.len()],
        },
        Value::Generator(ref g) => Slot::Shaped {
            items: g.items.clone(),
            shape: vec![g.items.len()],
        },
        Value::Tuple(t) => Slot::Tuple(t.elements),
        // Some(x) protects its payload from broadcasting (Ref-style)
        Value::Some(inner) => Slot::Scalar(*inner),
        other => Slot::Scalar(other),
    }
}

fn broadcast_tuples(vm: &mut Vm, f: Value, slots: Vec<Slot>) -> Result<Value, VmError> {
    let mut len: Option<usize> = None;
    for slot in &slots {
        if let Slot::Tuple(items) = slot {
            match len {
                None => len = Some(items.len()),
                Some(n) if n == items.len() => {}
                Some(n) => {
                    return Err(VmError::DimensionMismatch(format!(
                        "tuples of lengths {} and {} cannot be broadcast together",
                        n,
                        items.len()
                    )));
                }
            }
        }
    }
    let len = len.unwrap_or(0);
    let mut results = Vec::with_capacity(len);
    for i in 0..len {
        let row: Vec<Value> = slots
            .iter()
            .map(|slot| match slot {
                Slot::Tuple(items) => items[i].clone(),
                Slot::Scalar(v) => v.clone(),
                Slot::Shaped { .. } => unreachable!(),
            })
            .collect();
        results.push(vm.call_value(f.clone(), row, Vec::new())?);
    }
    Ok(Value::Tuple(TupleValue::new(results)))
}

fn broadcast_arrays(vm: &mut Vm, f: Value, slots: Vec<Slot>) -> Result<Value, VmError> {
    // Result shape: dimensionwise max, each participating extent equal to
    // the result or 1.
    let mut result_shape: Vec<usize> = Vec::new();
    for slot in &slots {
        if let Slot::Shaped { shape, .. } = slot {
            if shape.len() > result_shape.len() {
                result_shape.resize(shape.len(), 1);
            }
            for (k, &dim) in shape.iter().enumerate() {
                if result_shape[k] == 1 {
                    result_shape[k] = dim;
                } else if dim != 1 && dim != result_shape[k] {
                    return Err(VmError::DimensionMismatch(format!(
                        "arrays could not be broadcast to a common size: dimension {} has extents {} and {}",
                        k + 1,
                        result_shape[k],
                        dim
                    )));
                }
            }
        }
    }

    let total: usize = result_shape.iter().product();
    let mut results = Vec::with_capacity(total);
    let mut pos = vec![0usize; result_shape.len()];
    for _ in 0..total {
        let row: Vec<Value> = slots
            .iter()
            .map(|slot| match slot {
                Slot::Scalar(v) => v.clone(),
                Slot::Shaped { items, shape } => items[flat_index(shape, &pos)].clone(),
                Slot::Tuple(_) => unreachable!(),
            })
            .collect();
        results.push(vm.call_value(f.clone(), row, Vec::new())?);
        advance(&mut pos, &result_shape);
    }

    let elem = vm.unify_element_type(&results);
    let array = ArrayValue::with_shape(elem, results, result_shape)
        .ok_or_else(|| VmError::Internal("broadcast shape mismatch".to_string()))?;
    Ok(Value::Array(new_array_ref(array)))
}

/// Column-major flat index into an array of `shape`, stretching singleton
/// dimensions.
fn flat_index(shape: &[usize], pos: &[usize]) -> usize {
    let mut flat = 0;
    let mut stride = 1;
    for (k, &dim) in shape.iter().enumerate() {
        let p = if dim == 1 { 0 } else { pos.get(k).copied().unwrap_or(0) };
        flat += p * stride;
        stride *= dim.max(1);
    }
    flat
}

/// Advance a column-major multi-index.
fn advance(pos: &mut [usize], shape: &[usize]) {
    for (p, &dim) in pos.iter_mut().zip(shape) {
        *p += 1;
        if *p < dim.max(1) {
            return;
        }
        *p = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::core_types as c;
    use crate::vm::value::RangeValue;

    fn vm() -> Vm {
        Vm::new()
    }

    fn int_vector(data: &[i64]) -> Value {
        Value::Array(new_array_ref(ArrayValue::vector(
            Ty::Named(c::INT64),
            data.iter().map(|&n| Value::I64(n)).collect(),
        )))
    }

    #[test]
    fn test_scalar_broadcast_is_plain_call() {
        let mut vm = vm();
        let plus = vm.function_value("+");
        let r = broadcast_call(&mut vm, plus, vec![Value::I64(1), Value::I64(2)]).unwrap();
        assert_eq!(r, Value::I64(3));
    }

    #[test]
    fn test_array_plus_scalar() {
        let mut vm = vm();
        let plus = vm.function_value("+");
        let r = broadcast_call(&mut vm, plus, vec![int_vector(&[1, 2, 3]), Value::I64(10)])
            .unwrap();
        assert_eq!(r, int_vector(&[11, 12, 13]));
    }

    #[test]
    fn test_tuple_broadcast_returns_tuple() {
        let mut vm = vm();
        let plus = vm.function_value("+");
        let t = Value::Tuple(TupleValue::new(vec![Value::I64(1), Value::I64(2)]));
        let r = broadcast_call(&mut vm, plus, vec![t, Value::I64(1)]).unwrap();
        assert_eq!(
            r,
            Value::Tuple(TupleValue::new(vec![Value::I64(2), Value::I64(3)]))
        );
    }

    #[test]
    fn test_mismatched_lengths_raise_dimension_mismatch() {
        let mut vm = vm();
        let plus = vm.function_value("+");
        let err =
            broadcast_call(&mut vm, plus, vec![int_vector(&[1, 2]), int_vector(&[1, 2, 3])])
                .unwrap_err();
        assert!(matches!(err, VmError::DimensionMismatch(_)));
    }

    #[test]
    fn test_promoted_element_type() {
        let mut vm = vm();
        let plus = vm.function_value("+");
        let r = broadcast_call(
            &mut vm,
            plus,
            vec![int_vector(&[1, 2]), Value::F64(0.5)],
        )
        .unwrap();
        let Value::Array(arr) = &r else { panic!() };
        assert_eq!(arr.borrow().elem, Ty::Named(c::FLOAT64));
        assert_eq!(arr.borrow().to_vec(), vec![Value::F64(1.5), Value::F64(2.5)]);
    }

    #[test]
    fn test_range_broadcasts_like_vector() {
        let mut vm = vm();
        let times = vm.function_value("*");
        let r = broadcast_call(
            &mut vm,
            times,
            vec![
                Value::Range(RangeValue::unit(1, 3)),
                Value::Range(RangeValue::unit(1, 3)),
            ],
        )
        .unwrap();
        assert_eq!(r, int_vector(&[1, 4, 9]));
    }
}
