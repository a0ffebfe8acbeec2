//! The instruction stream and program container.
//!
//! The lowerer emits a flat stream of [`Instr`] per chunk, with literal
//! values materialised into a per-program constants table. Jump offsets are
//! relative to the *following* instruction (`Jump(0)` is a no-op).
//!
//! Two-operand numeric opcodes (`AddI64`, `AddF64`, ...) are dispatch
//! *hints*, not contracts: the interpreter takes the fast path only when
//! both operands' runtime variants match the hinted primitive, and falls
//! back to full dynamic dispatch otherwise. A `BigInt` flowing through an
//! `AddI64` site must behave exactly as if the site were `CallDyn("+", 2)`.

use serde::{Deserialize, Serialize};

use crate::span::Span;
use crate::types::{Ty, TypeParam};
use crate::vm::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instr {
    // === Constants / locals / globals ===
    /// Push `consts[i]`.
    LoadConst(u32),
    LoadLocal(String),
    StoreLocal(String),
    /// Process-wide namespace; reads and writes are immediate.
    LoadGlobal(String),
    StoreGlobal(String),

    // === Stack ===
    Pop,
    Dup,

    // === Control ===
    /// Unconditional relative jump (offset from the next instruction).
    Jump(i32),
    /// Pop a Bool; jump when false. A non-Bool condition is a TypeError.
    JumpIfFalse(i32),
    /// Pop the return value, convert through the return annotation if any,
    /// pop the frame, push the value in the caller.
    Return,

    // === Calls ===
    /// Pop `n` arguments, pop the callee, dispatch, push the result.
    Call(u32),
    /// Pop `m` alternating symbol/value pairs, then `n` positional
    /// arguments, then the callee.
    CallKw(u32, u32),
    /// Like `Call`, but the single popped argument tuple is expanded into
    /// positionals.
    CallSplat(u32),
    /// Like `CallKw`, but the keyword bundle is a `Pairs`/named tuple value
    /// expanded into keyword pairs.
    CallKwSplat(u32),
    /// Dynamic call of a named generic function with `n` stack arguments
    /// (no callee value on the stack). The generic fallback for every
    /// specialised opcode.
    CallDyn(String, u32),

    // === Specialised numeric opcodes (dispatch hints) ===
    AddI64,
    SubI64,
    MulI64,
    AddF64,
    SubF64,
    MulF64,
    DivF64,
    LtI64,
    LeI64,
    EqI64,
    LtF64,
    LeF64,
    EqF64,

    // === Exceptions ===
    /// Install a handler; on unwinding, control lands at the relative
    /// catch offset with the exception value pushed.
    PushHandler(i32),
    PopHandler,
    /// Pop a value and raise it.
    Throw,
    /// Re-raise the exception currently being handled.
    Rethrow,

    // === Struct / array ===
    /// Pop `k` field values (first pushed first), build an instance of the
    /// named registered type.
    NewStruct(String, u32),
    /// Pop an instance, push field `j` (0-based slot).
    GetField(u32),
    /// Pop the value then the instance, set field `j`, push the instance.
    SetField(u32),
    /// Field access by name (slot resolved at runtime).
    GetFieldNamed(String),
    /// Pop `n` elements (first pushed first), build a vector.
    NewArray(u32),
    /// Pop `n` index values, pop the container, push the element.
    GetIndex(u32),
    /// Pop the value, `n` indices, then the container; store; push the
    /// container.
    SetIndex(u32),

    // === Type ops ===
    /// Pop a type object, pop a value, push `value isa type`.
    IsA,
    /// Pop a value, push its concrete type as a `DataType`.
    TypeOf,

    // === Closures ===
    /// Build a closure over `fn_index`, capturing the named locals from the
    /// current frame.
    MakeClosure { fn_index: u32, captures: Vec<String> },
}

/// One flat instruction sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub code: Vec<Instr>,
}

/// A positional parameter with its declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Ty,
}

/// A keyword parameter. `default` is the literal default value (`None`
/// marks a required keyword, whose absence raises `UndefKeywordError`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KwParam {
    pub name: String,
    pub default: Option<Value>,
}

/// Callable body metadata: one entry per lowered function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionProto {
    pub name: String,
    pub params: Vec<Param>,
    /// Where-clause type parameters with bounds.
    pub type_params: Vec<TypeParam>,
    pub return_ty: Option<Ty>,
    pub kw_params: Vec<KwParam>,
    /// Binding name of a `kwargs...` collector. The collector always
    /// receives a `Pairs`, possibly empty.
    pub collects_kwargs: Option<String>,
    pub chunk: usize,
    pub span: Option<Span>,
}

/// A method-table registration carried by the program: on `run`, each entry
/// is inserted under `name` with the function's signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    pub fn_index: usize,
}

/// An executable program: constants, chunks, function table, method
/// registrations, and the entry chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub consts: Vec<Value>,
    pub chunks: Vec<Chunk>,
    pub functions: Vec<FunctionProto>,
    pub methods: Vec<MethodDecl>,
    /// Chunk index of the top-level code.
    pub entry: usize,
}

/// Incremental construction surface used by the lowerer and by tests.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    consts: Vec<Value>,
    chunks: Vec<Chunk>,
    functions: Vec<FunctionProto>,
    methods: Vec<MethodDecl>,
    entry: Option<usize>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a literal into the constants table, deduplicating.
    pub fn constant(&mut self, value: Value) -> u32 {
        if let Some(pos) = self.consts.iter().position(|c| *c == value) {
            return pos as u32;
        }
        self.consts.push(value);
        (self.consts.len() - 1) as u32
    }

    pub fn add_chunk(&mut self, code: Vec<Instr>) -> usize {
        self.chunks.push(Chunk { code });
        self.chunks.len() - 1
    }

    /// Set the top-level code.
    pub fn entry(&mut self, code: Vec<Instr>) -> usize {
        let idx = self.add_chunk(code);
        self.entry = Some(idx);
        idx
    }

    /// Start a function definition; finish with [`FunctionBuilder::register`]
    /// (adds a method-table entry) or [`FunctionBuilder::body_only`].
    pub fn function(&mut self, name: impl Into<String>) -> FunctionBuilder<'_> {
        FunctionBuilder {
            builder: self,
            proto: FunctionProto {
                name: name.into(),
                params: Vec::new(),
                type_params: Vec::new(),
                return_ty: None,
                kw_params: Vec::new(),
                collects_kwargs: None,
                chunk: 0,
                span: None,
            },
        }
    }

    pub fn finish(self) -> Program {
        Program {
            consts: self.consts,
            chunks: self.chunks,
            functions: self.functions,
            methods: self.methods,
            entry: self.entry.unwrap_or(0),
        }
    }
}

/// Builder for one function body.
#[derive(Debug)]
pub struct FunctionBuilder<'a> {
    builder: &'a mut ProgramBuilder,
    proto: FunctionProto,
}

impl<'a> FunctionBuilder<'a> {
    pub fn param(mut self, name: impl Into<String>, ty: Ty) -> Self {
        self.proto.params.push(Param {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn type_param(mut self, tp: TypeParam) -> Self {
        self.proto.type_params.push(tp);
        self
    }

    pub fn returns(mut self, ty: Ty) -> Self {
        self.proto.return_ty = Some(ty);
        self
    }

    pub fn kw_param(mut self, name: impl Into<String>, default: Option<Value>) -> Self {
        self.proto.kw_params.push(KwParam {
            name: name.into(),
            default,
        });
        self
    }

    pub fn collects_kwargs(mut self, binding: impl Into<String>) -> Self {
        self.proto.collects_kwargs = Some(binding.into());
        self
    }

    /// Finish the function and register it in the method table under its
    /// name. Returns the function index.
    pub fn register(self, code: Vec<Instr>) -> usize {
        let FunctionBuilder { builder, mut proto } = self;
        let name = proto.name.clone();
        proto.chunk = builder.add_chunk(code);
        builder.functions.push(proto);
        let fn_index = builder.functions.len() - 1;
        builder.methods.push(MethodDecl { name, fn_index });
        fn_index
    }

    /// Finish the function without a method-table entry (closure and
    /// generator bodies reached only through `MakeClosure`).
    /// Returns the function index.
    pub fn body_only(self, code: Vec<Instr>) -> usize {
        let FunctionBuilder { builder, mut proto } = self;
        proto.chunk = builder.add_chunk(code);
        builder.functions.push(proto);
        builder.functions.len() - 1
    }
}
