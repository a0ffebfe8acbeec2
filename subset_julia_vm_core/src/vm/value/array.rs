//! N-dimensional arrays over flat memory buffers.
//!
//! `Memory{T}` is the raw flat buffer; every `Array{T,N}` addresses a
//! `MemoryRef` through an offset, a shape, and column-major strides
//! (`stride(A,1) == 1`). Views are ordinary `ArrayValue`s sharing the parent
//! buffer with a shifted offset, so writes through a view are visible in the
//! parent and vice versa.

use std::cell::RefCell;
use std::rc::Rc;

use crate::types::Ty;

use super::value_enum::Value;

/// Flat typed buffer with bounds-checked indexing; the parent storage for
/// arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryValue {
    pub elem: Ty,
    pub data: Vec<Value>,
}

impl MemoryValue {
    pub fn new(elem: Ty, data: Vec<Value>) -> Self {
        Self { elem, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 1-based bounds-checked read.
    pub fn get(&self, index: usize) -> Option<&Value> {
        if index == 0 {
            return None;
        }
        self.data.get(index - 1)
    }

    /// 1-based bounds-checked write.
    pub fn set(&mut self, index: usize, value: Value) -> bool {
        if index == 0 || index > self.data.len() {
            return false;
        }
        self.data[index - 1] = value;
        true
    }
}

pub type MemoryRef = Rc<RefCell<MemoryValue>>;

pub fn new_memory_ref(mem: MemoryValue) -> MemoryRef {
    Rc::new(RefCell::new(mem))
}

/// An N-dimensional array of element type `elem`, addressing shared memory
/// column-major.
#[derive(Debug, Clone)]
pub struct ArrayValue {
    pub elem: Ty,
    pub mem: MemoryRef,
    /// 0-based offset into the memory buffer.
    pub offset: usize,
    pub shape: Vec<usize>,
    /// Column-major strides in elements: `strides[0] == 1` for owned arrays.
    pub strides: Vec<usize>,
}

impl PartialEq for ArrayValue {
    fn eq(&self, other: &Self) -> bool {
        if self.shape != other.shape {
            return false;
        }
        self.iter_values().eq(other.iter_values())
    }
}

/// Column-major strides for a shape: `[1, n1, n1*n2, ...]`.
pub fn column_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = Vec::with_capacity(shape.len());
    let mut acc = 1usize;
    for dim in shape {
        strides.push(acc);
        acc *= dim.max(&1);
    }
    strides
}

impl ArrayValue {
    /// A fresh rank-1 array owning its buffer.
    pub fn vector(elem: Ty, data: Vec<Value>) -> Self {
        let shape = vec![data.len()];
        let strides = column_major_strides(&shape);
        Self {
            elem: elem.clone(),
            mem: new_memory_ref(MemoryValue::new(elem, data)),
            offset: 0,
            shape,
            strides,
        }
    }

    /// A fresh array owning its buffer with the given shape (column-major
    /// data order). The data length must equal the shape product.
    pub fn with_shape(elem: Ty, data: Vec<Value>, shape: Vec<usize>) -> Option<Self> {
        if shape.iter().product::<usize>() != data.len() {
            return None;
        }
        let strides = column_major_strides(&shape);
        Some(Self {
            elem: elem.clone(),
            mem: new_memory_ref(MemoryValue::new(elem, data)),
            offset: 0,
            shape,
            strides,
        })
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this array addresses its buffer whole and contiguously
    /// (offset 0, canonical strides). Only such arrays may grow.
    pub fn owns_buffer(&self) -> bool {
        self.offset == 0
            && self.strides == column_major_strides(&self.shape)
            && self.mem.borrow().len() == self.len()
    }

    /// Flat position in the memory buffer for 1-based indices, or `None`
    /// when out of bounds or of the wrong rank.
    pub fn linear_index(&self, indices: &[i64]) -> Option<usize> {
        if indices.len() != self.shape.len() {
            // A single linear index addresses any array
            if indices.len() == 1 {
                let i = indices[0];
                if i < 1 || i as usize > self.len() {
                    return None;
                }
                return Some(self.offset + self.linear_to_flat(i as usize - 1));
            }
            return None;
        }
        let mut flat = self.offset;
        for ((&i, &dim), &stride) in indices.iter().zip(&self.shape).zip(&self.strides) {
            if i < 1 || i as usize > dim {
                return None;
            }
            flat += (i as usize - 1) * stride;
        }
        Some(flat)
    }

    /// Map a 0-based linear position to a flat buffer position through the
    /// strides (identity for owned arrays, shifted for views).
    fn linear_to_flat(&self, mut linear: usize) -> usize {
        let mut flat = 0usize;
        for (&dim, &stride) in self.shape.iter().zip(&self.strides) {
            let dim = dim.max(1);
            flat += (linear % dim) * stride;
            linear /= dim;
        }
        flat
    }

    pub fn get(&self, indices: &[i64]) -> Option<Value> {
        let flat = self.linear_index(indices)?;
        self.mem.borrow().data.get(flat).cloned()
    }

    pub fn set(&self, indices: &[i64], value: Value) -> bool {
        let Some(flat) = self.linear_index(indices) else {
            return false;
        };
        let mut mem = self.mem.borrow_mut();
        if flat >= mem.data.len() {
            return false;
        }
        mem.data[flat] = value;
        true
    }

    /// Elements in column-major order.
    pub fn iter_values(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.len()).map(|linear| {
            let flat = self.offset + self.linear_to_flat(linear);
            self.mem.borrow().data[flat].clone()
        })
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.iter_values().collect()
    }

    /// Contiguous 1-D view over 1-based `[first, last]` of a vector-shaped
    /// axis. The view aliases the parent buffer.
    pub fn view_range(&self, first: i64, last: i64) -> Option<ArrayValue> {
        if self.rank() != 1 {
            return None;
        }
        if first < 1 || last > self.shape[0] as i64 || last < first - 1 {
            return None;
        }
        let len = (last - first + 1).max(0) as usize;
        Some(ArrayValue {
            elem: self.elem.clone(),
            mem: Rc::clone(&self.mem),
            offset: self.offset + (first as usize - 1) * self.strides[0],
            shape: vec![len],
            strides: vec![self.strides[0]],
        })
    }

    /// Append to a growable rank-1 array.
    pub fn push(&mut self, value: Value) -> bool {
        if self.rank() != 1 || !self.owns_buffer() {
            return false;
        }
        self.mem.borrow_mut().data.push(value);
        self.shape[0] += 1;
        true
    }

    /// Remove and return the last element of a growable rank-1 array.
    pub fn pop(&mut self) -> Option<Value> {
        if self.rank() != 1 || !self.owns_buffer() || self.is_empty() {
            return None;
        }
        let value = self.mem.borrow_mut().data.pop();
        self.shape[0] -= 1;
        value
    }
}

pub type ArrayRef = Rc<RefCell<ArrayValue>>;

pub fn new_array_ref(arr: ArrayValue) -> ArrayRef {
    Rc::new(RefCell::new(arr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::core_types as c;

    fn int_vector(data: &[i64]) -> ArrayValue {
        ArrayValue::vector(
            Ty::Named(c::INT64),
            data.iter().map(|&n| Value::I64(n)).collect(),
        )
    }

    #[test]
    fn test_column_major_strides() {
        assert_eq!(column_major_strides(&[4]), vec![1]);
        assert_eq!(column_major_strides(&[3, 4]), vec![1, 3]);
        assert_eq!(column_major_strides(&[2, 3, 4]), vec![1, 2, 6]);
    }

    #[test]
    fn test_matrix_column_major_indexing() {
        // 2x3 matrix stored column-major: [a11, a21, a12, a22, a13, a23]
        let m = ArrayValue::with_shape(
            Ty::Named(c::INT64),
            (1..=6).map(Value::I64).collect(),
            vec![2, 3],
        )
        .unwrap();
        assert_eq!(m.get(&[1, 1]), Some(Value::I64(1)));
        assert_eq!(m.get(&[2, 1]), Some(Value::I64(2)));
        assert_eq!(m.get(&[1, 2]), Some(Value::I64(3)));
        assert_eq!(m.get(&[2, 3]), Some(Value::I64(6)));
        assert_eq!(m.get(&[3, 1]), None);
    }

    #[test]
    fn test_linear_index_into_matrix() {
        let m = ArrayValue::with_shape(
            Ty::Named(c::INT64),
            (1..=6).map(Value::I64).collect(),
            vec![2, 3],
        )
        .unwrap();
        // Linear indexing walks column-major order
        assert_eq!(m.get(&[5]), Some(Value::I64(5)));
    }

    #[test]
    fn test_view_aliases_parent_both_directions() {
        let parent = new_array_ref(int_vector(&[10, 20, 30, 40, 50]));
        let view = parent.borrow().view_range(2, 4).unwrap();

        // Write through the view, observe in the parent
        assert!(view.set(&[1], Value::I64(99)));
        assert_eq!(parent.borrow().get(&[2]), Some(Value::I64(99)));

        // Write through the parent, observe in the view
        assert!(parent.borrow().set(&[4], Value::I64(-7)));
        assert_eq!(view.get(&[3]), Some(Value::I64(-7)));
    }

    #[test]
    fn test_view_is_bounds_checked() {
        let parent = int_vector(&[1, 2, 3]);
        assert!(parent.view_range(0, 2).is_none());
        assert!(parent.view_range(2, 4).is_none());
        let v = parent.view_range(2, 3).unwrap();
        assert_eq!(v.get(&[3]), None);
    }

    #[test]
    fn test_push_pop_on_owned_vector() {
        let mut v = int_vector(&[1, 2]);
        assert!(v.push(Value::I64(3)));
        assert_eq!(v.shape, vec![3]);
        assert_eq!(v.pop(), Some(Value::I64(3)));
        assert_eq!(v.shape, vec![2]);
    }

    #[test]
    fn test_views_do_not_grow() {
        let parent = int_vector(&[1, 2, 3]);
        let mut view = parent.view_range(1, 2).unwrap();
        assert!(!view.push(Value::I64(9)));
    }

    #[test]
    fn test_memory_bounds_checked() {
        let mem = MemoryValue::new(Ty::Named(c::INT64), vec![Value::I64(1), Value::I64(2)]);
        assert_eq!(mem.get(1), Some(&Value::I64(1)));
        assert_eq!(mem.get(0), None);
        assert_eq!(mem.get(3), None);
    }
}
