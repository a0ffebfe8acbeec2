//! Embedding surface.
//!
//! Everything the core exposes to collaborators: program loading through an
//! externally-supplied [`Lowerer`], execution, dispatch-honouring calls, and
//! runtime registration of builtins and types.

use thiserror::Error;

use crate::dispatch::NativeFn;
use crate::ir::Program;
use crate::types::{Field, Ty, TypeId};
use crate::vm::value::Value;
use crate::vm::{Vm, VmError};

/// The parser/lowerer contract: surface syntax in, instruction stream out.
/// The core ships no implementation; embedders install their own.
pub trait Lowerer {
    fn lower(&mut self, source: &str) -> Result<Program, ApiError>;
}

/// Errors crossing the embedding boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("lower error: {0}")]
    Lower(String),
    #[error(transparent)]
    Runtime(#[from] VmError),
    #[error(transparent)]
    Bytecode(#[from] crate::bytecode::BytecodeError),
}

/// Parse and lower source text into an executable program.
pub fn load_program(lowerer: &mut dyn Lowerer, source: &str) -> Result<Program, ApiError> {
    lowerer.lower(source)
}

/// Execute a program to completion, returning the last top-level
/// expression's value.
pub fn run(vm: &mut Vm, program: Program) -> Result<Value, ApiError> {
    vm.run(program).map_err(ApiError::from)
}

/// Invoke a generic function by identity, honouring multiple dispatch.
pub fn call(vm: &mut Vm, name: &str, args: Vec<Value>) -> Result<Value, ApiError> {
    vm.call(name, args).map_err(ApiError::from)
}

/// Add a native method at runtime bootstrap.
pub fn register_builtin(vm: &mut Vm, name: &str, signature: Vec<Ty>, implementation: NativeFn) {
    vm.register_builtin(name, signature, implementation);
}

/// Extend the lattice with a concrete type.
pub fn register_type(
    vm: &mut Vm,
    name: &str,
    parent: TypeId,
    fields: Vec<Field>,
    mutable: bool,
    params: Vec<String>,
) -> Result<TypeId, ApiError> {
    vm.register_type(name, parent, fields, mutable, params)
        .map_err(ApiError::from)
}

/// Extend the lattice with an abstract type.
pub fn register_abstract(vm: &mut Vm, name: &str, parent: TypeId) -> Result<TypeId, ApiError> {
    vm.register_abstract(name, parent).map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instr, ProgramBuilder};

    struct ConstLowerer;

    impl Lowerer for ConstLowerer {
        fn lower(&mut self, source: &str) -> Result<Program, ApiError> {
            // A stand-in collaborator: lowers any integer literal program.
            let n: i64 = source
                .trim()
                .parse()
                .map_err(|_| ApiError::Lower("expected an integer literal".to_string()))?;
            let mut pb = ProgramBuilder::new();
            let k = pb.constant(Value::I64(n));
            pb.entry(vec![Instr::LoadConst(k), Instr::Return]);
            Ok(pb.finish())
        }
    }

    #[test]
    fn test_load_and_run_through_the_contract() {
        let mut lowerer = ConstLowerer;
        let program = load_program(&mut lowerer, "42").unwrap();
        let mut vm = Vm::new();
        assert_eq!(run(&mut vm, program).unwrap(), Value::I64(42));
    }

    #[test]
    fn test_lower_errors_surface() {
        let mut lowerer = ConstLowerer;
        assert!(matches!(
            load_program(&mut lowerer, "not a number"),
            Err(ApiError::Lower(_))
        ));
    }

    #[test]
    fn test_call_by_identity() {
        let mut vm = Vm::new();
        assert_eq!(
            call(&mut vm, "+", vec![Value::I64(1), Value::I64(2)]).unwrap(),
            Value::I64(3)
        );
    }
}
