//! Small container values: tuples, named tuples, kwargs `Pairs`, sets,
//! generators, AST values, integer ranges, and the in-memory IO buffer
//! behind `sprint`.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::value_enum::Value;

/// An interned identifier (`:foo`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolValue(String);

impl SymbolValue {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SymbolValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, ":{}", self.0)
    }
}

/// Immutable heterogeneous fixed-length sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TupleValue {
    pub elements: Vec<Value>,
}

impl TupleValue {
    pub fn new(elements: Vec<Value>) -> Self {
        Self { elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Tuple plus an ordered key list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NamedTupleValue {
    pub names: Vec<String>,
    pub values: Vec<Value>,
}

impl NamedTupleValue {
    /// Names and values must pair up one-to-one.
    pub fn new(names: Vec<String>, values: Vec<Value>) -> Option<Self> {
        if names.len() != values.len() {
            return None;
        }
        Some(Self { names, values })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.values[i])
    }
}

/// Ordered symbol→value mapping used to pass collected keyword arguments.
///
/// A kw-collecting callee always receives a `Pairs`, possibly empty — never
/// `nothing`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PairsValue {
    pub keys: Vec<String>,
    pub values: Vec<Value>,
}

impl PairsValue {
    pub fn new(keys: Vec<String>, values: Vec<Value>) -> Option<Self> {
        if keys.len() != values.len() {
            return None;
        }
        Some(Self { keys, values })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.keys
            .iter()
            .position(|k| k == key)
            .map(|i| &self.values[i])
    }
}

/// `first => second`.
#[derive(Debug, Clone, PartialEq)]
pub struct PairValue {
    pub first: Value,
    pub second: Value,
}

/// Unordered unique elements. Backed by a vector with linear membership;
/// observed order is insertion order but is not part of the contract.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetValue {
    items: Vec<Value>,
}

impl SetValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert if not already present; returns true when the set grew.
    pub fn insert(&mut self, value: Value) -> bool {
        if self.items.contains(&value) {
            false
        } else {
            self.items.push(value);
            true
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.items.contains(value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }
}

/// Shared handle for sets: like arrays, sets are reference values — any
/// alias observes mutations.
pub type SetRef = Rc<RefCell<SetValue>>;

pub fn new_set_ref(set: SetValue) -> SetRef {
    Rc::new(RefCell::new(set))
}

/// A generator expression's element stream.
///
/// Materialised eagerly at creation; the observable surface stays lazy
/// (`typeof` reports `Generator`, consumers drain the items in order).
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorValue {
    pub items: Vec<Value>,
}

/// AST node as data: `Expr(head, args...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprValue {
    pub head: SymbolValue,
    pub args: Vec<Value>,
}

/// Integer range `start:step:stop` (half of the surface's range zoo; float
/// ranges are not part of the core).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeValue {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl RangeValue {
    pub fn unit(start: i64, stop: i64) -> Self {
        Self {
            start,
            stop,
            step: 1,
        }
    }

    pub fn is_unit(&self) -> bool {
        self.step == 1
    }

    pub fn len(&self) -> usize {
        if self.step > 0 {
            if self.stop < self.start {
                0
            } else {
                ((self.stop - self.start) / self.step + 1) as usize
            }
        } else if self.step < 0 {
            if self.stop > self.start {
                0
            } else {
                ((self.start - self.stop) / (-self.step) + 1) as usize
            }
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 1-based element access.
    pub fn get(&self, index: usize) -> Option<i64> {
        if index == 0 || index > self.len() {
            return None;
        }
        Some(self.start + self.step * (index as i64 - 1))
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        let range = *self;
        (1..=range.len()).map(move |i| range.start + range.step * (i as i64 - 1))
    }
}

/// In-memory IO buffer used by `sprint` and print routing.
/// Interior mutability: printing mutates through shared handles.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IoBuffer {
    pub buf: String,
    /// `:compact` IOContext property.
    pub compact: bool,
}

pub type IoRef = Rc<RefCell<IoBuffer>>;
