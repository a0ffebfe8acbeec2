//! Function and closure identities.

use super::value_enum::Value;

/// Identity of a generic function; behaviour is the union of the methods
/// registered under this name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionValue {
    pub name: String,
}

impl FunctionValue {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// An anonymous function closed over bindings from its defining frame.
/// Do-blocks and generator bodies lower to these.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosureValue {
    /// Index into the program's function table.
    pub fn_index: usize,
    pub captures: Vec<(String, Value)>,
}

impl ClosureValue {
    pub fn new(fn_index: usize, captures: Vec<(String, Value)>) -> Self {
        Self { fn_index, captures }
    }
}
