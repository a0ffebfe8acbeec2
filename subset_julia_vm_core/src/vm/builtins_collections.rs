//! Container builtins: sizes, mutation, views, and the reductions that
//! consume generators without materialising intermediate arrays.

use super::builtins_equality::value_eq;
use super::value::{
    new_array_ref, new_set_ref, ArrayValue, SetValue, TupleValue, Value,
};
use super::{Vm, VmError};

// ── sizes ───────────────────────────────────────────────────────────────────

pub(crate) fn nf_length(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    let len = match &x {
        Value::Array(arr) => arr.borrow().len(),
        Value::Memory(mem) => mem.borrow().len(),
        Value::Str(s) => s.chars().count(),
        Value::Tuple(t) => t.len(),
        Value::NamedTuple(nt) => nt.len(),
        Value::Pairs(p) => p.len(),
        Value::Set(s) => s.borrow().len(),
        Value::Range(r) => r.len(),
        Value::Generator(g) => g.items.len(),
        Value::Bytes(b) => b.len(),
        _ => {
            return Err(VmError::MethodError(
                "MethodError: no method matching length for this value".to_string(),
            ));
        }
    };
    Ok(Value::I64(len as i64))
}

pub(crate) fn nf_size(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let dim = if args.len() == 2 { args.pop() } else { None };
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    let shape: Vec<usize> = match &x {
        Value::Array(arr) => arr.borrow().shape.clone(),
        Value::Memory(mem) => vec![mem.borrow().len()],
        Value::Range(r) => vec![r.len()],
        Value::Tuple(t) => vec![t.len()],
        _ => {
            return Err(VmError::MethodError(
                "MethodError: no method matching size for this value".to_string(),
            ));
        }
    };
    match dim {
        None => Ok(Value::Tuple(TupleValue::new(
            shape.into_iter().map(|d| Value::I64(d as i64)).collect(),
        ))),
        Some(k) => {
            let k = k.as_index().ok_or_else(|| {
                VmError::ArgumentError("size: dimension must be an integer".to_string())
            })?;
            if k < 1 {
                return Err(VmError::ArgumentError(format!(
                    "size: dimension {} out of range",
                    k
                )));
            }
            // Trailing dimensions are 1
            Ok(Value::I64(
                shape.get(k as usize - 1).copied().unwrap_or(1) as i64
            ))
        }
    }
}

pub(crate) fn nf_ndims(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    let n = match &x {
        Value::Array(arr) => arr.borrow().rank(),
        Value::Memory(_) | Value::Range(_) => 1,
        _ => {
            return Err(VmError::MethodError(
                "MethodError: no method matching ndims for this value".to_string(),
            ));
        }
    };
    Ok(Value::I64(n as i64))
}

/// `stride(A, k)`: distance in elements between adjacent entries along
/// dimension `k`; `stride(A, 1) == 1` for owned arrays (column-major).
pub(crate) fn nf_stride(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let k = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    let Value::Array(arr) = &a else {
        return Err(VmError::MethodError(
            "MethodError: no method matching stride for this value".to_string(),
        ));
    };
    let k = k
        .as_index()
        .ok_or_else(|| VmError::ArgumentError("stride: k must be an integer".to_string()))?;
    let arr = arr.borrow();
    if k < 1 || k as usize > arr.strides.len() {
        return Err(VmError::ArgumentError(format!(
            "stride: dimension {} out of range",
            k
        )));
    }
    Ok(Value::I64(arr.strides[k as usize - 1] as i64))
}

pub(crate) fn nf_strides(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    let Value::Array(arr) = &a else {
        return Err(VmError::MethodError(
            "MethodError: no method matching strides for this value".to_string(),
        ));
    };
    let strides = arr
        .borrow()
        .strides
        .iter()
        .map(|s| Value::I64(*s as i64))
        .collect();
    Ok(Value::Tuple(TupleValue::new(strides)))
}

// ── mutation ────────────────────────────────────────────────────────────────

pub(crate) fn nf_push(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    let coll = args.pop().ok_or(VmError::StackUnderflow)?;
    match &coll {
        Value::Array(arr) => {
            let elem = arr.borrow().elem.clone();
            let converted = if elem.is_any() {
                x
            } else {
                vm.convert_value(&elem, x)?
            };
            if !arr.borrow_mut().push(converted) {
                return Err(VmError::ArgumentError(
                    "push!: cannot grow a view or a non-vector array".to_string(),
                ));
            }
            Ok(coll)
        }
        Value::Set(set) => {
            set.borrow_mut().insert(x);
            Ok(coll)
        }
        other => Err(VmError::MethodError(format!(
            "MethodError: no method matching push!(::{}, ::Any)",
            other.type_of().display(&vm.lattice)
        ))),
    }
}

pub(crate) fn nf_pop(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let coll = args.pop().ok_or(VmError::StackUnderflow)?;
    match &coll {
        Value::Array(arr) => arr.borrow_mut().pop().ok_or_else(|| {
            VmError::ArgumentError("pop!: array must be non-empty and growable".to_string())
        }),
        other => Err(VmError::MethodError(format!(
            "MethodError: no method matching pop!(::{})",
            other.type_of().display(&vm.lattice)
        ))),
    }
}

pub(crate) fn nf_copy(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    Ok(match &x {
        Value::Array(arr) => {
            let arr = arr.borrow();
            Value::Array(new_array_ref(
                ArrayValue::with_shape(arr.elem.clone(), arr.to_vec(), arr.shape.clone())
                    .unwrap_or_else(|| ArrayValue::vector(arr.elem.clone(), arr.to_vec())),
            ))
        }
        Value::Set(s) => {
            let mut fresh = SetValue::new();
            for item in s.borrow().items() {
                fresh.insert(item.clone());
            }
            Value::Set(new_set_ref(fresh))
        }
        other => other.clone(),
    })
}

pub(crate) fn nf_fill(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    let coll = args.pop().ok_or(VmError::StackUnderflow)?;
    let Value::Array(arr) = &coll else {
        return Err(VmError::MethodError(
            "MethodError: no method matching fill! for this value".to_string(),
        ));
    };
    let elem = arr.borrow().elem.clone();
    let converted = if elem.is_any() {
        x
    } else {
        vm.convert_value(&elem, x)?
    };
    let len = arr.borrow().len();
    for i in 1..=len {
        arr.borrow().set(&[i as i64], converted.clone());
    }
    Ok(coll)
}

pub(crate) fn nf_getindex(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    if args.len() < 2 {
        return Err(VmError::ArgumentError(
            "getindex expects a container and indices".to_string(),
        ));
    }
    let indices = args.split_off(1);
    let container = args.pop().ok_or(VmError::StackUnderflow)?;
    vm.get_index(&container, &indices)
}

pub(crate) fn nf_setindex(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    if args.len() < 3 {
        return Err(VmError::ArgumentError(
            "setindex! expects a container, a value, and indices".to_string(),
        ));
    }
    let indices = args.split_off(2);
    let value = args.pop().ok_or(VmError::StackUnderflow)?;
    let container = args.pop().ok_or(VmError::StackUnderflow)?;
    vm.set_index(&container, &indices, value)?;
    Ok(container)
}

/// `view(A, r)`: an aliasing window into the parent storage. Writes through
/// the view are visible in the parent and conversely.
pub(crate) fn nf_view(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let index = args.pop().ok_or(VmError::StackUnderflow)?;
    let a = args.pop().ok_or(VmError::StackUnderflow)?;
    let Value::Array(arr) = &a else {
        return Err(VmError::MethodError(
            "MethodError: no method matching view for this value".to_string(),
        ));
    };
    match index {
        Value::Range(r) => {
            if r.step != 1 {
                return Err(VmError::ArgumentError(
                    "view: only unit ranges are supported".to_string(),
                ));
            }
            let view = arr.borrow().view_range(r.start, r.stop).ok_or_else(|| {
                VmError::BoundsError {
                    index: vec![r.start, r.stop],
                    length: format!("{}-element array", arr.borrow().len()),
                }
            })?;
            Ok(Value::Array(new_array_ref(view)))
        }
        other => Err(VmError::ArgumentError(format!(
            "view: unsupported index of type {}",
            other.type_of().display(&vm.lattice)
        ))),
    }
}

// ── iteration-consuming builtins ────────────────────────────────────────────

pub(crate) fn nf_collect(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    if let Value::Array(_) = &x {
        return nf_copy(vm, vec![x]);
    }
    let items = vm.iterable_items(&x)?;
    let elem = vm.unify_element_type(&items);
    Ok(Value::Array(new_array_ref(ArrayValue::vector(elem, items))))
}

pub(crate) fn nf_sum(vm: &mut Vm, args: Vec<Value>) -> Result<Value, VmError> {
    reduce_with(vm, args, "+", "sum")
}

pub(crate) fn nf_prod(vm: &mut Vm, args: Vec<Value>) -> Result<Value, VmError> {
    reduce_with(vm, args, "*", "prod")
}

/// `sum(xs)` / `sum(f, xs)`; consumption fuses with the reduction, no
/// intermediate array.
fn reduce_with(
    vm: &mut Vm,
    mut args: Vec<Value>,
    op: &str,
    what: &str,
) -> Result<Value, VmError> {
    let (f, xs) = match args.len() {
        1 => (None, args.pop().unwrap()),
        2 => {
            let xs = args.pop().unwrap();
            (Some(args.pop().unwrap()), xs)
        }
        n => {
            return Err(VmError::MethodError(format!(
                "MethodError: no method matching {} with {} arguments",
                what, n
            )));
        }
    };
    let items = vm.iterable_items(&xs)?;
    let mut acc: Option<Value> = None;
    for item in items {
        let mapped = match &f {
            Some(f) => vm.call_value(f.clone(), vec![item], Vec::new())?,
            None => item,
        };
        acc = Some(match acc {
            None => mapped,
            Some(prev) => vm.call_function(op, vec![prev, mapped])?,
        });
    }
    match acc {
        Some(result) => Ok(result),
        None => Err(VmError::ArgumentError(format!(
            "{}: reducing over an empty collection is not allowed",
            what
        ))),
    }
}

pub(crate) fn nf_any(vm: &mut Vm, args: Vec<Value>) -> Result<Value, VmError> {
    short_circuit(vm, args, true)
}

pub(crate) fn nf_all(vm: &mut Vm, args: Vec<Value>) -> Result<Value, VmError> {
    short_circuit(vm, args, false)
}

fn short_circuit(vm: &mut Vm, mut args: Vec<Value>, stop_on: bool) -> Result<Value, VmError> {
    let (f, xs) = match args.len() {
        1 => (None, args.pop().unwrap()),
        2 => {
            let xs = args.pop().unwrap();
            (Some(args.pop().unwrap()), xs)
        }
        n => {
            return Err(VmError::MethodError(format!(
                "MethodError: no method matching any/all with {} arguments",
                n
            )));
        }
    };
    let items = vm.iterable_items(&xs)?;
    for item in items {
        let tested = match &f {
            Some(f) => vm.call_value(f.clone(), vec![item], Vec::new())?,
            None => item,
        };
        match tested {
            Value::Bool(b) => {
                if b == stop_on {
                    return Ok(Value::Bool(stop_on));
                }
            }
            other => {
                return Err(VmError::TypeError(format!(
                    "non-boolean ({}) used in boolean context",
                    other.type_of().display(&vm.lattice)
                )));
            }
        }
    }
    Ok(Value::Bool(!stop_on))
}

pub(crate) fn nf_map(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    if args.len() < 2 {
        return Err(VmError::MethodError(
            "MethodError: no method matching map with these arguments".to_string(),
        ));
    }
    let containers = args.split_off(1);
    let f = args.pop().ok_or(VmError::StackUnderflow)?;

    let all_tuples = containers.iter().all(|x| matches!(x, Value::Tuple(_)));
    let mut columns = Vec::with_capacity(containers.len());
    for cont in &containers {
        columns.push(vm.iterable_items(cont)?);
    }
    let len = columns.iter().map(Vec::len).min().unwrap_or(0);
    let mut results = Vec::with_capacity(len);
    for i in 0..len {
        let row: Vec<Value> = columns.iter().map(|col| col[i].clone()).collect();
        results.push(vm.call_value(f.clone(), row, Vec::new())?);
    }
    if all_tuples {
        return Ok(Value::Tuple(TupleValue::new(results)));
    }
    let elem = vm.unify_element_type(&results);
    Ok(Value::Array(new_array_ref(ArrayValue::vector(
        elem, results,
    ))))
}

pub(crate) fn nf_first(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    match &x {
        Value::Range(r) if !r.is_empty() => return Ok(Value::I64(r.start)),
        Value::Pair(p) => return Ok(p.first.clone()),
        _ => {}
    }
    let items = vm.iterable_items(&x)?;
    items.into_iter().next().ok_or(VmError::BoundsError {
        index: vec![1],
        length: "empty collection".to_string(),
    })
}

pub(crate) fn nf_last(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    if let Value::Range(r) = &x {
        if !r.is_empty() {
            return r
                .get(r.len())
                .map(Value::I64)
                .ok_or_else(|| VmError::Internal("range last out of sync".to_string()));
        }
    }
    let items = vm.iterable_items(&x)?;
    items.into_iter().last().ok_or(VmError::BoundsError {
        index: vec![1],
        length: "empty collection".to_string(),
    })
}

/// `x in coll` with `==` semantics.
pub(crate) fn nf_in(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let coll = args.pop().ok_or(VmError::StackUnderflow)?;
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    let items = vm.iterable_items(&coll)?;
    for item in items {
        if let Value::Bool(true) = value_eq(vm, &x, &item)? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

/// `Set()` / `Set(iterable)` constructor.
pub(crate) fn nf_set_ctor(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let mut set = SetValue::new();
    if let Some(src) = args.pop() {
        for item in vm.iterable_items(&src)? {
            set.insert(item);
        }
    }
    Ok(Value::Set(new_set_ref(set)))
}

/// Range constructors: `range(start, stop)` and the lowered `a:b` / `a:s:b`.
pub(crate) fn nf_colon(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let err = || VmError::ArgumentError("range bounds must be integers".to_string());
    match args.len() {
        2 => {
            let stop = args.pop().unwrap().as_index().ok_or_else(err)?;
            let start = args.pop().unwrap().as_index().ok_or_else(err)?;
            Ok(Value::Range(super::value::RangeValue::unit(start, stop)))
        }
        3 => {
            let stop = args.pop().unwrap().as_index().ok_or_else(err)?;
            let step = args.pop().unwrap().as_index().ok_or_else(err)?;
            let start = args.pop().unwrap().as_index().ok_or_else(err)?;
            if step == 0 {
                return Err(VmError::ArgumentError(
                    "range step cannot be zero".to_string(),
                ));
            }
            Ok(Value::Range(super::value::RangeValue {
                start,
                stop,
                step,
            }))
        }
        n => Err(VmError::MethodError(format!(
            "MethodError: no method matching (:) with {} arguments",
            n
        ))),
    }
}

/// Keys of a kwargs bundle as a tuple of symbols.
pub(crate) fn nf_keys(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    match &x {
        Value::Pairs(p) => Ok(Value::Tuple(TupleValue::new(
            p.keys
                .iter()
                .map(|k| Value::Sym(super::value::SymbolValue::new(k.clone())))
                .collect(),
        ))),
        Value::NamedTuple(nt) => Ok(Value::Tuple(TupleValue::new(
            nt.names
                .iter()
                .map(|k| Value::Sym(super::value::SymbolValue::new(k.clone())))
                .collect(),
        ))),
        _ => Err(VmError::MethodError(
            "MethodError: no method matching keys for this value".to_string(),
        )),
    }
}

pub(crate) fn nf_values(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    match &x {
        Value::Pairs(p) => Ok(Value::Tuple(TupleValue::new(p.values.clone()))),
        Value::NamedTuple(nt) => Ok(Value::Tuple(TupleValue::new(nt.values.clone()))),
        _ => Err(VmError::MethodError(
            "MethodError: no method matching values for this value".to_string(),
        )),
    }
}

/// `a => b` pair construction.
pub(crate) fn nf_pair(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let second = args.pop().ok_or(VmError::StackUnderflow)?;
    let first = args.pop().ok_or(VmError::StackUnderflow)?;
    Ok(Value::Pair(Box::new(super::value::PairValue {
        first,
        second,
    })))
}

/// `Generator` wrapping used by lowered generator expressions: the element
/// stream is materialised eagerly, the wrapper keeps the lazy surface.
pub(crate) fn nf_generator(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let xs = args.pop().ok_or(VmError::StackUnderflow)?;
    let f = args.pop().ok_or(VmError::StackUnderflow)?;
    let items = vm.iterable_items(&xs)?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(vm.call_value(f.clone(), vec![item], Vec::new())?);
    }
    Ok(Value::Generator(Box::new(super::value::GeneratorValue {
        items: out,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{core_types as c, Ty};

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
    fn test_length_and_size() {
        let mut vm = vm();
        let v = int_vector(&[1, 2, 3]);
        assert_eq!(nf_length(&mut vm, vec![v.clone()]).unwrap(), Value::I64(3));
        assert_eq!(
            nf_size(&mut vm, vec![v]).unwrap(),
            Value::Tuple(TupleValue::new(vec![Value::I64(3)]))
        );
        // length counts characters, not bytes
        assert_eq!(
            nf_length(&mut vm, vec![Value::Str("héllo".into())]).unwrap(),
            Value::I64(5)
        );
    }

    #[test]
    fn test_strides_are_column_major() {
        let mut vm = vm();
        let m = Value::Array(new_array_ref(
            ArrayValue::with_shape(
                Ty::Named(c::FLOAT64),
                vec![Value::F64(0.0); 6],
                vec![2, 3],
            )
            .unwrap(),
        ));
        assert_eq!(
            nf_stride(&mut vm, vec![m.clone(), Value::I64(1)]).unwrap(),
            Value::I64(1)
        );
        assert_eq!(
            nf_stride(&mut vm, vec![m.clone(), Value::I64(2)]).unwrap(),
            Value::I64(2)
        );
        assert_eq!(
            nf_strides(&mut vm, vec![m]).unwrap(),
            Value::Tuple(TupleValue::new(vec![Value::I64(1), Value::I64(2)]))
        );
    }

    #[test]
    fn test_push_converts_to_element_type() {
        let mut vm = vm();
        let v = int_vector(&[1]);
        nf_push(&mut vm, vec![v.clone(), Value::I64(2)]).unwrap();
        assert_eq!(nf_length(&mut vm, vec![v.clone()]).unwrap(), Value::I64(2));
        // Pushing 2.5 into an Int64 vector is inexact
        assert!(matches!(
            nf_push(&mut vm, vec![v, Value::F64(2.5)]),
            Err(VmError::InexactError(_))
        ));
    }

    #[test]
    fn test_sum_of_range_and_generator_fusion() {
        let mut vm = vm();
        let r = Value::Range(super::super::value::RangeValue::unit(1, 10));
        assert_eq!(nf_sum(&mut vm, vec![r.clone()]).unwrap(), Value::I64(55));
        // sum(x^2 for x in 1:10) == 385 via a pre-materialised generator
        let squares = Value::Generator(Box::new(super::super::value::GeneratorValue {
            items: (1..=10).map(|x| Value::I64(x * x)).collect(),
        }));
        assert_eq!(nf_sum(&mut vm, vec![squares]).unwrap(), Value::I64(385));
    }

    #[test]
    fn test_sum_empty_collection_errors() {
        let mut vm = vm();
        let empty = int_vector(&[]);
        assert!(matches!(
            nf_sum(&mut vm, vec![empty]),
            Err(VmError::ArgumentError(_))
        ));
    }

    #[test]
    fn test_any_all_short_circuit_and_type_check() {
        let mut vm = vm();
        let bools = Value::Tuple(TupleValue::new(vec![
            Value::Bool(false),
            Value::Bool(true),
        ]));
        assert_eq!(nf_any(&mut vm, vec![bools.clone()]).unwrap(), Value::Bool(true));
        assert_eq!(nf_all(&mut vm, vec![bools]).unwrap(), Value::Bool(false));
        let ints = Value::Tuple(TupleValue::new(vec![Value::I64(1)]));
        assert!(matches!(
            nf_any(&mut vm, vec![ints]),
            Err(VmError::TypeError(_))
        ));
    }

    #[test]
    fn test_collect_range() {
        let mut vm = vm();
        let r = Value::Range(super::super::value::RangeValue::unit(1, 3));
        let collected = nf_collect(&mut vm, vec![r]).unwrap();
        assert_eq!(collected, int_vector(&[1, 2, 3]));
    }

    #[test]
    fn test_in_uses_value_equality() {
        let mut vm = vm();
        let v = int_vector(&[1, 2, 3]);
        assert_eq!(
            nf_in(&mut vm, vec![Value::F64(2.0), v.clone()]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            nf_in(&mut vm, vec![Value::I64(9), v]).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_set_ctor_dedups() {
        let mut vm = vm();
        let v = int_vector(&[1, 2, 2, 3]);
        let set = nf_set_ctor(&mut vm, vec![v]).unwrap();
        assert_eq!(nf_length(&mut vm, vec![set]).unwrap(), Value::I64(3));
    }

    #[test]
    fn test_view_aliasing_through_builtin() {
        let mut vm = vm();
        let parent = int_vector(&[10, 20, 30, 40]);
        let view = nf_view(
            &mut vm,
            vec![
                parent.clone(),
                Value::Range(super::super::value::RangeValue::unit(2, 3)),
            ],
        )
        .unwrap();
        vm.set_index(&view, &[Value::I64(1)], Value::I64(-1)).unwrap();
        assert_eq!(
            vm.get_index(&parent, &[Value::I64(2)]).unwrap(),
            Value::I64(-1)
        );
    }
}
