//! Call frames.
//!
//! Every active method invocation owns a frame: operand stack, symbol-keyed
//! local slots, the type-parameter bindings discovered by dispatch, and a
//! handler chain for structured unwinding. Frames are stacked LIFO; only the
//! top frame executes.

use std::collections::HashMap;

use crate::span::Span;
use crate::types::{Ty, TyArg};

use super::value::Value;

/// An installed exception handler. Unwinding truncates the operand stack to
/// `stack_len` and resumes at `catch_ip` with the exception value pushed.
#[derive(Debug, Clone)]
pub(crate) struct Handler {
    pub catch_ip: usize,
    pub stack_len: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub stack: Vec<Value>,
    pub locals: HashMap<String, Value>,
    /// Where-clause bindings (`T -> Int64`, `N -> 2`). Populated by dispatch
    /// on every call path, including specialised-opcode fallback.
    pub type_bindings: HashMap<String, TyArg>,
    pub handlers: Vec<Handler>,
    pub chunk: usize,
    pub ip: usize,
    pub return_ty: Option<Ty>,
    pub fn_index: Option<usize>,
    pub span: Option<Span>,
}

impl Frame {
    pub fn new(chunk: usize) -> Self {
        Self {
            stack: Vec::new(),
            locals: HashMap::new(),
            type_bindings: HashMap::new(),
            handlers: Vec::new(),
            chunk,
            ip: 0,
            return_ty: None,
            fn_index: None,
            span: None,
        }
    }

    /// Install the dispatch bindings, also exposing each one as a local so
    /// bodies can read `T` as a value (`T` loads a `DataType`, a value
    /// parameter loads its integer).
    pub fn bind_type_params(&mut self, bindings: &HashMap<String, TyArg>) {
        for (name, arg) in bindings {
            let value = match arg {
                TyArg::Ty(t) => Value::DataType(t.clone()),
                TyArg::Int(n) => Value::I64(*n),
            };
            self.locals.insert(name.clone(), value);
            self.type_bindings.insert(name.clone(), arg.clone());
        }
    }

    /// Resolve a type expression against this frame's bindings
    /// (substituting bound variables).
    pub fn resolve_ty(&self, ty: &Ty) -> Ty {
        let mut resolved = ty.clone();
        for (name, arg) in &self.type_bindings {
            if let TyArg::Ty(t) = arg {
                resolved = resolved.substitute(name, t);
            }
        }
        resolved
    }
}
