// Prevent accidental debug output in library code (Issue #2888).
#![deny(clippy::print_stderr)]

//! Core execution engine for a dynamically-typed, multiple-dispatch numeric
//! language: tagged runtime values, an id-arena type lattice, a flat
//! instruction stream, a multi-dispatch method table, and a stack-based
//! interpreter with structured exception unwinding.
//!
//! Surface parsing/lowering, the source-form standard library, and the
//! macro expander's bodies are external collaborators reached through the
//! [`api`] module's contracts.

// Core modules
pub mod api;
pub mod bytecode;
pub mod dispatch;
pub mod ir;
pub mod macros;
pub mod span;
pub mod types;
pub mod vm;

pub use api::{call, load_program, register_abstract, register_builtin, register_type, run,
    ApiError, Lowerer};
pub use ir::{Chunk, FunctionBuilder, Instr, Program, ProgramBuilder};
pub use types::{core_types, Ty, TyArg, TypeId, TypeLattice, TypeParam};
pub use vm::value::Value;
pub use vm::{Vm, VmError};
