//! The bytecode interpreter.
//!
//! A single-threaded fetch-decode-execute loop over the current frame's
//! instruction stream. Exactly one frame executes at a time; calls push a
//! frame, returns pop it, and there is no preemption. Every call resolves
//! through the method registry; every dispatch decision goes through the
//! subtype relation.

pub mod broadcast;
mod builtins;
mod builtins_collections;
mod builtins_conversion;
mod builtins_equality;
mod builtins_numeric;
mod builtins_reflection;
mod builtins_strings;
pub mod error;
mod formatting;
mod frame;
pub mod value;

pub use error::VmError;
pub use formatting::{format_repr, format_value};

use std::collections::HashMap;

use crate::dispatch::{MethodBody, MethodRegistry, NativeFn};
use crate::ir::{Instr, Program};
use crate::macros::MacroRegistry;
use crate::types::{
    fallback_promote, is_subtype, Bindings, Field, Ty, TyArg, TypeId, TypeLattice,
};

use frame::{Frame, Handler};
use value::{ClosureValue, FunctionValue, PairsValue, StructInstance, SymbolValue, Value};

/// Upper bound on interpreted frame depth. Interpreted calls recurse
/// through the host stack, so the bound stays conservative.
const MAX_FRAMES: usize = 512;

/// The virtual machine: lattice, method registry, globals, and the frame
/// stack. All state the resource model calls process-wide lives here.
#[derive(Debug)]
pub struct Vm {
    pub lattice: TypeLattice,
    pub registry: MethodRegistry,
    pub globals: HashMap<String, Value>,
    pub macros: MacroRegistry,
    /// Present but possibly empty (§ resource model).
    pub depot_path: Vec<String>,
    pub load_path: Vec<String>,
    program: Program,
    frames: Vec<Frame>,
    output: String,
    /// The exception currently being handled (readable by `Rethrow`).
    current_exception: Option<Value>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// A VM with the bootstrap lattice and all builtins registered.
    pub fn new() -> Self {
        let mut vm = Self {
            lattice: TypeLattice::bootstrap(),
            registry: MethodRegistry::new(),
            globals: HashMap::new(),
            macros: MacroRegistry::new(),
            depot_path: Vec::new(),
            load_path: Vec::new(),
            program: Program::default(),
            frames: Vec::new(),
            output: String::new(),
            current_exception: None,
        };
        builtins::install(&mut vm);
        // Every registered type is reachable as a global type object, so
        // `Float64(x)`-style constructor calls work through LoadGlobal.
        let type_globals: Vec<(String, TypeId)> = vm
            .lattice
            .iter()
            .map(|(id, node)| (node.name.clone(), id))
            .collect();
        for (name, id) in type_globals {
            vm.globals.insert(name, Value::DataType(Ty::Named(id)));
        }
        vm.globals.insert("nothing".to_string(), Value::Nothing);
        vm.globals.insert("missing".to_string(), Value::Missing);
        vm.globals.insert("NaN".to_string(), Value::F64(f64::NAN));
        vm.globals.insert("Inf".to_string(), Value::F64(f64::INFINITY));
        vm.globals.insert(
            "im".to_string(),
            Value::Complex(Box::new(value::ComplexValue {
                re: Value::I64(0),
                im: Value::I64(1),
            })),
        );
        vm.globals.insert("pi".to_string(), Value::F64(std::f64::consts::PI));
        vm
    }

    // ── embedding surface ───────────────────────────────────────────────

    /// Execute a program to completion; the result is the entry chunk's
    /// last value.
    pub fn run(&mut self, program: Program) -> Result<Value, VmError> {
        self.install_program(program);
        let entry = self.program.entry;
        self.frames.push(Frame::new(entry));
        let result = self.frame_loop();
        self.frames.pop();
        result
    }

    /// Invoke a generic function by name, honouring multiple dispatch.
    /// Names bound to callable globals (type constructors, function-valued
    /// bindings) are invoked through the same path as a lowered call site.
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, VmError> {
        if !self.registry.contains(name) {
            if let Some(value) = self.globals.get(name).cloned() {
                return self.call_value(value, args, Vec::new());
            }
        }
        self.call_function(name, args)
    }

    /// Register a native method under `name` with the given signature.
    pub fn register_builtin(&mut self, name: &str, sig: Vec<Ty>, f: NativeFn) {
        self.registry.add_native(name, sig, f);
    }

    /// Register a concrete type; returns its id. The type object becomes a
    /// global under its name.
    pub fn register_type(
        &mut self,
        name: &str,
        parent: TypeId,
        fields: Vec<Field>,
        mutable: bool,
        params: Vec<String>,
    ) -> Result<TypeId, VmError> {
        let id = self
            .lattice
            .register_struct(name, parent, fields, mutable, params)
            .map_err(|e| VmError::ArgumentError(e.to_string()))?;
        self.globals
            .insert(name.to_string(), Value::DataType(Ty::Named(id)));
        Ok(id)
    }

    /// Register an abstract type; returns its id.
    pub fn register_abstract(&mut self, name: &str, parent: TypeId) -> Result<TypeId, VmError> {
        let id = self
            .lattice
            .register_abstract(name, parent)
            .map_err(|e| VmError::ArgumentError(e.to_string()))?;
        self.globals
            .insert(name.to_string(), Value::DataType(Ty::Named(id)));
        Ok(id)
    }

    /// Everything printed so far (print builtins write here).
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub(crate) fn push_output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Install a program and register the methods it declares.
    fn install_program(&mut self, program: Program) {
        self.program = program;
        for decl in self.program.methods.clone() {
            let Some(proto) = self.program.functions.get(decl.fn_index) else {
                continue;
            };
            let sig: Vec<Ty> = proto.params.iter().map(|p| p.ty.clone()).collect();
            self.registry.add_method(
                &decl.name,
                sig,
                proto.type_params.clone(),
                MethodBody::Bytecode {
                    fn_index: decl.fn_index,
                },
            );
        }
    }

    // ── calls ───────────────────────────────────────────────────────────

    pub(crate) fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value, VmError> {
        self.call_function_kw(name, args, Vec::new())
    }

    pub(crate) fn call_function_kw(
        &mut self,
        name: &str,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, VmError> {
        let arg_tys: Vec<Ty> = args.iter().map(Value::dispatch_type).collect();
        let resolved = self
            .registry
            .dispatch(name, &arg_tys, &self.lattice)
            .map_err(VmError::from)?;
        match resolved.body {
            MethodBody::Native(f) => {
                if !kwargs.is_empty() {
                    return Err(VmError::MethodError(format!(
                        "MethodError: {} does not accept keyword arguments",
                        name
                    )));
                }
                f(self, args)
            }
            MethodBody::Bytecode { fn_index } => {
                self.call_proto(fn_index, args, kwargs, None, resolved.bindings)
            }
        }
    }

    /// Call any callable value: generic function, closure, or type
    /// constructor.
    pub(crate) fn call_value(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, VmError> {
        match callee {
            Value::Function(f) => self.call_function_kw(&f.name, args, kwargs),
            Value::Closure(cl) => {
                self.call_proto(cl.fn_index, args, kwargs, Some(cl.captures), Bindings::new())
            }
            Value::DataType(ty) => self.call_constructor(&ty, args, kwargs),
            other => Err(VmError::MethodError(format!(
                "MethodError: objects of type {} are not callable",
                other.type_of().display(&self.lattice)
            ))),
        }
    }

    /// Push a frame for a lowered function and run it to completion.
    fn call_proto(
        &mut self,
        fn_index: usize,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        captures: Option<Vec<(String, Value)>>,
        bindings: Bindings,
    ) -> Result<Value, VmError> {
        let Some(proto) = self.program.functions.get(fn_index).cloned() else {
            // A method-table entry pointing at a missing body is an
            // inconsistency, not a user error.
            return Err(VmError::Internal(format!(
                "method table references unknown function index {}",
                fn_index
            )));
        };
        if proto.params.len() != args.len() {
            return Err(VmError::MethodError(format!(
                "MethodError: no method matching {} with {} arguments",
                proto.name,
                args.len()
            )));
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(VmError::ErrorException("stack overflow".to_string()));
        }

        let mut frame = Frame::new(proto.chunk);
        frame.fn_index = Some(fn_index);
        frame.span = proto.span;
        frame.return_ty = proto.return_ty.clone();
        frame.bind_type_params(&bindings);
        if let Some(caps) = captures {
            for (name, value) in caps {
                frame.locals.insert(name, value);
            }
        }
        for (param, value) in proto.params.iter().zip(args) {
            frame.locals.insert(param.name.clone(), value);
        }

        // Keyword matching: named parameters first, the rest flow to the
        // collector. An empty bundle is still a Pairs, never nothing.
        let mut rest: Vec<(String, Value)> = Vec::new();
        for (key, value) in kwargs {
            if proto.kw_params.iter().any(|kp| kp.name == key) {
                frame.locals.insert(key, value);
            } else {
                rest.push((key, value));
            }
        }
        for kp in &proto.kw_params {
            if !frame.locals.contains_key(&kp.name) {
                match &kp.default {
                    Some(default) => {
                        frame.locals.insert(kp.name.clone(), default.clone());
                    }
                    None => return Err(VmError::UndefKeywordError(kp.name.clone())),
                }
            }
        }
        match &proto.collects_kwargs {
            Some(binding) => {
                let (keys, values) = rest.into_iter().unzip();
                let pairs = PairsValue::new(keys, values)
                    .ok_or_else(|| VmError::Internal("kwargs pairing mismatch".to_string()))?;
                frame.locals.insert(binding.clone(), Value::Pairs(pairs));
            }
            None => {
                if let Some((key, _)) = rest.first() {
                    return Err(VmError::MethodError(format!(
                        "MethodError: {} got unsupported keyword argument \"{}\"",
                        proto.name, key
                    )));
                }
            }
        }

        self.frames.push(frame);
        let result = self.frame_loop();
        self.frames.pop();
        result
    }

    // ── the interpreter loop ────────────────────────────────────────────

    /// Run the top frame until it returns a value or an uncaught error
    /// escapes it.
    fn frame_loop(&mut self) -> Result<Value, VmError> {
        loop {
            match self.step() {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(e) => {
                    if !e.is_catchable() {
                        return Err(e);
                    }
                    let frame = self
                        .frames
                        .last_mut()
                        .ok_or(VmError::StackUnderflow)?;
                    match frame.handlers.pop() {
                        Some(handler) => {
                            frame.stack.truncate(handler.stack_len);
                            frame.ip = handler.catch_ip;
                            let exc = e.to_exception_value();
                            self.current_exception = Some(exc.clone());
                            let frame = self.frames.last_mut().ok_or(VmError::StackUnderflow)?;
                            frame.stack.push(exc);
                        }
                        // No handler in this frame: unwind to the caller.
                        None => return Err(e),
                    }
                }
            }
        }
    }

    /// Execute one instruction. `Ok(Some(v))` means the frame returned `v`.
    fn step(&mut self) -> Result<Option<Value>, VmError> {
        let (chunk_idx, ip) = {
            let frame = self.frames.last().ok_or(VmError::StackUnderflow)?;
            (frame.chunk, frame.ip)
        };
        let chunk = self
            .program
            .chunks
            .get(chunk_idx)
            .ok_or_else(|| VmError::Internal(format!("invalid chunk index {}", chunk_idx)))?;
        let Some(instr) = chunk.code.get(ip).cloned() else {
            // Fell off the end: the frame's value is the stack top.
            let value = self
                .frames
                .last_mut()
                .ok_or(VmError::StackUnderflow)?
                .stack
                .pop()
                .unwrap_or(Value::Nothing);
            return self.finish_frame(value).map(Some);
        };
        self.frames
            .last_mut()
            .ok_or(VmError::StackUnderflow)?
            .ip = ip + 1;

        match instr {
            Instr::LoadConst(i) => {
                let value = self
                    .program
                    .consts
                    .get(i as usize)
                    .cloned()
                    .ok_or_else(|| {
                        VmError::InvalidInstruction(format!("constant index {} out of range", i))
                    })?;
                self.push(value);
            }
            Instr::LoadLocal(name) => {
                let value = self
                    .frames
                    .last()
                    .ok_or(VmError::StackUnderflow)?
                    .locals
                    .get(&name)
                    .cloned()
                    .ok_or(VmError::UndefVarError(name))?;
                self.push(value);
            }
            Instr::StoreLocal(name) => {
                let value = self.pop()?;
                self.frames
                    .last_mut()
                    .ok_or(VmError::StackUnderflow)?
                    .locals
                    .insert(name, value);
            }
            Instr::LoadGlobal(name) => {
                // Generic functions resolve as first-class function values.
                let value = match self.globals.get(&name) {
                    Some(v) => v.clone(),
                    None if self.registry.contains(&name) => {
                        Value::Function(FunctionValue::new(&name))
                    }
                    None => return Err(VmError::UndefVarError(name)),
                };
                self.push(value);
            }
            Instr::StoreGlobal(name) => {
                let value = self.pop()?;
                self.globals.insert(name, value);
            }
            Instr::Pop => {
                self.pop()?;
            }
            Instr::Dup => {
                let top = self.peek()?.clone();
                self.push(top);
            }
            Instr::Jump(rel) => self.jump(rel)?,
            Instr::JumpIfFalse(rel) => {
                let cond = self.pop()?;
                match cond {
                    Value::Bool(true) => {}
                    Value::Bool(false) => self.jump(rel)?,
                    other => {
                        return Err(VmError::TypeError(format!(
                            "non-boolean ({}) used in boolean context",
                            other.type_of().display(&self.lattice)
                        )));
                    }
                }
            }
            Instr::Return => {
                let value = self.pop()?;
                return self.finish_frame(value).map(Some);
            }
            Instr::Call(n) => {
                let args = self.pop_args(n as usize)?;
                let callee = self.pop()?;
                let result = self.call_value(callee, args, Vec::new())?;
                self.push(result);
            }
            Instr::CallKw(n, m) => {
                let kwargs = self.pop_kw_pairs(m as usize)?;
                let args = self.pop_args(n as usize)?;
                let callee = self.pop()?;
                let result = self.call_value(callee, args, kwargs)?;
                self.push(result);
            }
            Instr::CallSplat(n) => {
                let packed = self.pop_args(n as usize)?;
                let mut args = Vec::new();
                for value in packed {
                    args.extend(self.iterable_items(&value)?);
                }
                let callee = self.pop()?;
                let result = self.call_value(callee, args, Vec::new())?;
                self.push(result);
            }
            Instr::CallKwSplat(n) => {
                let bundle = self.pop()?;
                let kwargs = self.kw_bundle_pairs(&bundle)?;
                let args = self.pop_args(n as usize)?;
                let callee = self.pop()?;
                let result = self.call_value(callee, args, kwargs)?;
                self.push(result);
            }
            Instr::CallDyn(name, n) => {
                let args = self.pop_args(n as usize)?;
                let result = self.call_function(&name, args)?;
                self.push(result);
            }
            Instr::AddI64
            | Instr::SubI64
            | Instr::MulI64
            | Instr::AddF64
            | Instr::SubF64
            | Instr::MulF64
            | Instr::DivF64
            | Instr::LtI64
            | Instr::LeI64
            | Instr::EqI64
            | Instr::LtF64
            | Instr::LeF64
            | Instr::EqF64 => self.specialised_binop(&instr)?,
            Instr::PushHandler(rel) => {
                let frame = self.frames.last_mut().ok_or(VmError::StackUnderflow)?;
                let catch_ip = offset_ip(frame.ip, rel)?;
                let stack_len = frame.stack.len();
                frame.handlers.push(Handler {
                    catch_ip,
                    stack_len,
                });
            }
            Instr::PopHandler => {
                let frame = self.frames.last_mut().ok_or(VmError::StackUnderflow)?;
                if frame.handlers.pop().is_none() {
                    // Handler-chain inconsistency is bytecode corruption.
                    return Err(VmError::Internal(
                        "PopHandler with empty handler chain".to_string(),
                    ));
                }
            }
            Instr::Throw => {
                let value = self.pop()?;
                return Err(VmError::Thrown(value));
            }
            Instr::Rethrow => match &self.current_exception {
                Some(exc) => return Err(VmError::Thrown(exc.clone())),
                None => {
                    return Err(VmError::ErrorException(
                        "rethrow() not allowed outside a catch block".to_string(),
                    ));
                }
            },
            Instr::NewStruct(name, k) => {
                let values = self.pop_args(k as usize)?;
                let result = self.construct_struct_by_name(&name, values)?;
                self.push(result);
            }
            Instr::GetField(j) => {
                let target = self.pop()?;
                let value = self.get_field_by_index(&target, j as usize)?;
                self.push(value);
            }
            Instr::SetField(j) => {
                let value = self.pop()?;
                let target = self.pop()?;
                let updated = self.set_field_by_index(target, j as usize, value)?;
                self.push(updated);
            }
            Instr::GetFieldNamed(name) => {
                let target = self.pop()?;
                let value = self.get_field_by_name(&target, &name)?;
                self.push(value);
            }
            Instr::NewArray(n) => {
                let values = self.pop_args(n as usize)?;
                let elem = self.unify_element_type(&values);
                let array = value::ArrayValue::vector(elem, values);
                self.push(Value::Array(value::new_array_ref(array)));
            }
            Instr::GetIndex(n) => {
                let indices = self.pop_args(n as usize)?;
                let container = self.pop()?;
                let result = self.get_index(&container, &indices)?;
                self.push(result);
            }
            Instr::SetIndex(n) => {
                let value = self.pop()?;
                let indices = self.pop_args(n as usize)?;
                let container = self.pop()?;
                self.set_index(&container, &indices, value)?;
                self.push(container);
            }
            Instr::IsA => {
                let ty = self.pop()?;
                let value = self.pop()?;
                let Value::DataType(target) = ty else {
                    return Err(VmError::TypeError(
                        "isa: expected a type as the second operand".to_string(),
                    ));
                };
                let result = is_subtype(&value.dispatch_type(), &target, &self.lattice);
                self.push(Value::Bool(result));
            }
            Instr::TypeOf => {
                let value = self.pop()?;
                self.push(Value::DataType(value.type_of()));
            }
            Instr::MakeClosure { fn_index, captures } => {
                let frame = self.frames.last().ok_or(VmError::StackUnderflow)?;
                let mut captured = Vec::with_capacity(captures.len());
                for name in captures {
                    let value = frame
                        .locals
                        .get(&name)
                        .cloned()
                        .ok_or_else(|| VmError::UndefVarError(name.clone()))?;
                    captured.push((name, value));
                }
                let closure = ClosureValue::new(fn_index as usize, captured);
                self.push(Value::Closure(Box::new(closure)));
            }
        }
        Ok(None)
    }

    /// Apply the return annotation (narrow-type preserving) and hand the
    /// value to the caller.
    fn finish_frame(&mut self, value: Value) -> Result<Value, VmError> {
        let return_ty = {
            let frame = self.frames.last().ok_or(VmError::StackUnderflow)?;
            frame.return_ty.clone().map(|ty| frame.resolve_ty(&ty))
        };
        match return_ty {
            None => Ok(value),
            Some(ty) => {
                if is_subtype(&value.type_of(), &ty, &self.lattice) {
                    return Ok(value);
                }
                self.convert_value(&ty, value).map_err(|e| match e {
                    VmError::MethodError(msg) => {
                        VmError::TypeError(format!("in return value conversion: {}", msg))
                    }
                    other => other,
                })
            }
        }
    }

    fn specialised_binop(&mut self, instr: &Instr) -> Result<(), VmError> {
        let b = self.pop()?;
        let a = self.pop()?;
        // The opcode is a hint: the fast path fires only when both operand
        // variants match the hinted primitive. Anything else — including a
        // BigInt hiding behind a Number annotation — re-enters dynamic
        // dispatch so user methods and where-clause bindings apply.
        let fast = match (instr, &a, &b) {
            (Instr::AddI64, Value::I64(x), Value::I64(y)) => Some(Value::I64(x.wrapping_add(*y))),
            (Instr::SubI64, Value::I64(x), Value::I64(y)) => Some(Value::I64(x.wrapping_sub(*y))),
            (Instr::MulI64, Value::I64(x), Value::I64(y)) => Some(Value::I64(x.wrapping_mul(*y))),
            (Instr::AddF64, Value::F64(x), Value::F64(y)) => Some(Value::F64(x + y)),
            (Instr::SubF64, Value::F64(x), Value::F64(y)) => Some(Value::F64(x - y)),
            (Instr::MulF64, Value::F64(x), Value::F64(y)) => Some(Value::F64(x * y)),
            (Instr::DivF64, Value::F64(x), Value::F64(y)) => Some(Value::F64(x / y)),
            (Instr::LtI64, Value::I64(x), Value::I64(y)) => Some(Value::Bool(x < y)),
            (Instr::LeI64, Value::I64(x), Value::I64(y)) => Some(Value::Bool(x <= y)),
            (Instr::EqI64, Value::I64(x), Value::I64(y)) => Some(Value::Bool(x == y)),
            (Instr::LtF64, Value::F64(x), Value::F64(y)) => Some(Value::Bool(x < y)),
            (Instr::LeF64, Value::F64(x), Value::F64(y)) => Some(Value::Bool(x <= y)),
            (Instr::EqF64, Value::F64(x), Value::F64(y)) => Some(Value::Bool(x == y)),
            _ => None,
        };
        match fast {
            Some(result) => {
                self.push(result);
                Ok(())
            }
            None => {
                let name = match instr {
                    Instr::AddI64 | Instr::AddF64 => "+",
                    Instr::SubI64 | Instr::SubF64 => "-",
                    Instr::MulI64 | Instr::MulF64 => "*",
                    Instr::DivF64 => "/",
                    Instr::LtI64 | Instr::LtF64 => "<",
                    Instr::LeI64 | Instr::LeF64 => "<=",
                    Instr::EqI64 | Instr::EqF64 => "==",
                    _ => return Err(VmError::Internal("bad specialised opcode".to_string())),
                };
                let result = self.call_function(name, vec![a, b])?;
                self.push(result);
                Ok(())
            }
        }
    }

    // ── conversion, promotion, construction ─────────────────────────────

    /// `convert(T, x)`: identity when `typeof(x) <: T`, otherwise dispatch
    /// through the extensible `convert` generic function.
    pub(crate) fn convert_value(&mut self, target: &Ty, value: Value) -> Result<Value, VmError> {
        if target.is_any() || is_subtype(&value.type_of(), target, &self.lattice) {
            return Ok(value);
        }
        self.call_function("convert", vec![Value::DataType(target.clone()), value])
    }

    /// `promote_type(A, B)`: user `promote_rule` methods in both orders,
    /// then the built-in numeric fallback, widening to `Any` when neither
    /// side has a rule.
    pub(crate) fn promote_type_tys(&mut self, a: &Ty, b: &Ty) -> Ty {
        if a == b {
            return a.clone();
        }
        for (x, y) in [(a, b), (b, a)] {
            if self.registry.contains("promote_rule") {
                let result = self.call_function(
                    "promote_rule",
                    vec![Value::DataType(x.clone()), Value::DataType(y.clone())],
                );
                match result {
                    Ok(Value::DataType(ty)) if !ty.is_bottom() => return ty,
                    // No rule in this order (or a non-type result): keep going.
                    _ => {}
                }
            }
        }
        fallback_promote(a, b).unwrap_or_else(Ty::any)
    }

    /// `T(args...)` with `T` a type object.
    fn call_constructor(
        &mut self,
        ty: &Ty,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, VmError> {
        // User-defined constructor methods are generic functions named
        // after the type (the @kwdef surface registers one).
        if let Some(id) = ty.head() {
            let name = self.lattice.name(id).to_string();
            if self.registry.contains(&name) {
                let arg_tys: Vec<Ty> = args.iter().map(Value::dispatch_type).collect();
                if self.registry.dispatch(&name, &arg_tys, &self.lattice).is_ok() {
                    return self.call_function_kw(&name, args, kwargs);
                }
            }
        }
        if !kwargs.is_empty() {
            return Err(VmError::MethodError(format!(
                "MethodError: no constructor for {} accepts keyword arguments",
                ty.display(&self.lattice)
            )));
        }
        match ty {
            Ty::Named(id) if builtins_conversion::is_castable_target(*id) => {
                if args.len() != 1 {
                    return Err(VmError::MethodError(format!(
                        "MethodError: no method matching {}({} arguments)",
                        self.lattice.name(*id),
                        args.len()
                    )));
                }
                let mut args = args;
                builtins_conversion::cast_to(self, *id, args.pop().unwrap())
            }
            Ty::Named(id) => {
                let name = self.lattice.name(*id).to_string();
                self.construct_struct_by_name(&name, args)
            }
            Ty::Applied(id, _) => {
                self.construct_struct(*id, args, Some(ty.clone()))
            }
            _ => Err(VmError::TypeError(format!(
                "type {} is not constructible",
                ty.display(&self.lattice)
            ))),
        }
    }

    pub(crate) fn construct_struct_by_name(
        &mut self,
        name: &str,
        values: Vec<Value>,
    ) -> Result<Value, VmError> {
        let id = self
            .lattice
            .id_of(name)
            .ok_or_else(|| VmError::UndefVarError(name.to_string()))?;
        self.construct_struct(id, values, None)
    }

    /// Default (field-wise) construction of a registered concrete type.
    /// With `explicit_ty`, field declarations are resolved against the
    /// given parameters; otherwise parameters are inferred from the
    /// argument types.
    fn construct_struct(
        &mut self,
        id: TypeId,
        values: Vec<Value>,
        explicit_ty: Option<Ty>,
    ) -> Result<Value, VmError> {
        if self.lattice.is_abstract(id) {
            return Err(VmError::MethodError(format!(
                "MethodError: abstract type {} cannot be instantiated",
                self.lattice.name(id)
            )));
        }
        let node = self.lattice.node(id).clone();
        let fields = self.lattice.fields(id).to_vec();
        if fields.len() != values.len() {
            return Err(VmError::MethodError(format!(
                "MethodError: no method matching {}({} arguments, expected {})",
                node.name,
                values.len(),
                fields.len()
            )));
        }

        // Resolve type parameters: explicitly given, or inferred from the
        // arguments bound through directly-parameterised fields.
        let mut param_bindings: HashMap<String, Ty> = HashMap::new();
        if let Some(Ty::Applied(_, args)) = &explicit_ty {
            for (pname, arg) in node.params.iter().zip(args) {
                if let TyArg::Ty(t) = arg {
                    param_bindings.insert(pname.clone(), t.clone());
                }
            }
        } else {
            for (field, value) in fields.iter().zip(&values) {
                if let Ty::Var(v) = &field.ty {
                    let vt = value.type_of();
                    if let Some(existing) = param_bindings.get(v) {
                        if *existing != vt {
                            return Err(VmError::MethodError(format!(
                                "MethodError: no method matching {}: mismatched values for type parameter {}",
                                node.name, v
                            )));
                        }
                    } else {
                        param_bindings.insert(v.clone(), vt);
                    }
                }
            }
        }

        // Convert each argument to its (resolved) declared field type.
        let mut converted = Vec::with_capacity(values.len());
        for (field, value) in fields.iter().zip(values) {
            let mut declared = field.ty.clone();
            for (v, t) in &param_bindings {
                declared = declared.substitute(v, t);
            }
            if declared.has_free_vars() || declared.is_any() {
                converted.push(value);
            } else {
                converted.push(self.convert_value(&declared, value)?);
            }
        }

        let ty = match explicit_ty {
            Some(t) => t,
            None => {
                if node.params.is_empty() {
                    Ty::Named(id)
                } else {
                    let args = node
                        .params
                        .iter()
                        .map(|p| {
                            TyArg::Ty(
                                param_bindings.get(p).cloned().unwrap_or_else(Ty::any),
                            )
                        })
                        .collect();
                    Ty::Applied(id, args)
                }
            }
        };

        let instance = StructInstance::new(id, ty, converted);
        if self.lattice.is_mutable(id) {
            Ok(Value::MutStruct(std::rc::Rc::new(std::cell::RefCell::new(
                instance,
            ))))
        } else {
            Ok(Value::Struct(Box::new(instance)))
        }
    }

    // ── fields and indexing ─────────────────────────────────────────────

    fn get_field_by_index(&self, target: &Value, index: usize) -> Result<Value, VmError> {
        let fetch = |values: &[Value]| {
            values.get(index).cloned().ok_or(VmError::BoundsError {
                index: vec![index as i64 + 1],
                length: format!("{}-field object", values.len()),
            })
        };
        match target {
            Value::Struct(s) => fetch(&s.values),
            Value::MutStruct(s) => fetch(&s.borrow().values),
            Value::Tuple(t) => fetch(&t.elements),
            Value::Complex(z) => fetch(&[z.re.clone(), z.im.clone()]),
            Value::Rational(r) => fetch(&[Value::I64(r.num), Value::I64(r.den)]),
            Value::Pair(p) => fetch(&[p.first.clone(), p.second.clone()]),
            other => Err(VmError::TypeError(format!(
                "getfield: {} has no fields",
                other.type_of().display(&self.lattice)
            ))),
        }
    }

    fn set_field_by_index(
        &mut self,
        target: Value,
        index: usize,
        value: Value,
    ) -> Result<Value, VmError> {
        match target {
            Value::MutStruct(s) => {
                let (type_id, declared) = {
                    let inst = s.borrow();
                    let fields = self.lattice.fields(inst.type_id);
                    let declared = fields.get(index).map(|f| f.ty.clone());
                    (inst.type_id, declared)
                };
                let Some(declared) = declared else {
                    return Err(VmError::BoundsError {
                        index: vec![index as i64 + 1],
                        length: format!("type {}", self.lattice.name(type_id)),
                    });
                };
                let converted = if declared.has_free_vars() || declared.is_any() {
                    value
                } else {
                    self.convert_value(&declared, value)?
                };
                s.borrow_mut().values[index] = converted;
                Ok(Value::MutStruct(s))
            }
            Value::Struct(s) => Err(VmError::TypeError(format!(
                "setfield!: immutable struct of type {} cannot be changed",
                s.ty.display(&self.lattice)
            ))),
            other => Err(VmError::TypeError(format!(
                "setfield!: {} has no mutable fields",
                other.type_of().display(&self.lattice)
            ))),
        }
    }

    fn get_field_by_name(&self, target: &Value, name: &str) -> Result<Value, VmError> {
        match target {
            Value::NamedTuple(nt) => nt.get(name).cloned().ok_or_else(|| {
                VmError::TypeError(format!("NamedTuple has no field {}", name))
            }),
            Value::Struct(s) => self.struct_field_by_name(s, name),
            Value::MutStruct(s) => self.struct_field_by_name(&s.borrow(), name),
            Value::Complex(z) => match name {
                "re" => Ok(z.re.clone()),
                "im" => Ok(z.im.clone()),
                _ => Err(VmError::TypeError(format!("Complex has no field {}", name))),
            },
            Value::Rational(r) => match name {
                "num" => Ok(Value::I64(r.num)),
                "den" => Ok(Value::I64(r.den)),
                _ => Err(VmError::TypeError(format!("Rational has no field {}", name))),
            },
            Value::Pair(p) => match name {
                "first" => Ok(p.first.clone()),
                "second" => Ok(p.second.clone()),
                _ => Err(VmError::TypeError(format!("Pair has no field {}", name))),
            },
            Value::Expr(e) => match name {
                "head" => Ok(Value::Sym(e.head.clone())),
                "args" => {
                    let array = value::ArrayValue::vector(Ty::any(), e.args.clone());
                    Ok(Value::Array(value::new_array_ref(array)))
                }
                _ => Err(VmError::TypeError(format!("Expr has no field {}", name))),
            },
            Value::QuoteNode(inner) => match name {
                "value" => Ok((**inner).clone()),
                _ => Err(VmError::TypeError(format!(
                    "QuoteNode has no field {}",
                    name
                ))),
            },
            Value::Exception(e) => {
                if name == "msg" || name == "message" {
                    return Ok(Value::Str(e.message.clone()));
                }
                e.field(name).cloned().ok_or_else(|| {
                    VmError::TypeError(format!(
                        "{} has no field {}",
                        self.lattice.name(e.ty),
                        name
                    ))
                })
            }
            other => Err(VmError::TypeError(format!(
                "{} has no field {}",
                other.type_of().display(&self.lattice),
                name
            ))),
        }
    }

    fn struct_field_by_name(
        &self,
        instance: &StructInstance,
        name: &str,
    ) -> Result<Value, VmError> {
        let fields = self.lattice.fields(instance.type_id);
        let index = fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| {
                VmError::TypeError(format!(
                    "type {} has no field {}",
                    self.lattice.name(instance.type_id),
                    name
                ))
            })?;
        instance
            .values
            .get(index)
            .cloned()
            .ok_or_else(|| VmError::Internal("field slot out of range".to_string()))
    }

    pub(crate) fn get_index(
        &mut self,
        container: &Value,
        indices: &[Value],
    ) -> Result<Value, VmError> {
        match container {
            Value::Array(arr) => {
                // A single range index slices (copying); integers index.
                if indices.len() == 1 {
                    if let Value::Range(r) = &indices[0] {
                        let arr = arr.borrow();
                        let mut out = Vec::with_capacity(r.len());
                        for i in r.iter() {
                            out.push(arr.get(&[i]).ok_or_else(|| {
                                bounds_error(&[i], arr.len())
                            })?);
                        }
                        let elem = arr.elem.clone();
                        drop(arr);
                        return Ok(Value::Array(value::new_array_ref(
                            value::ArrayValue::vector(elem, out),
                        )));
                    }
                }
                let idx = numeric_indices(indices)?;
                let arr = arr.borrow();
                arr.get(&idx).ok_or_else(|| bounds_error(&idx, arr.len()))
            }
            Value::Memory(mem) => {
                let idx = numeric_indices(indices)?;
                if idx.len() != 1 {
                    return Err(VmError::ArgumentError(
                        "Memory takes a single linear index".to_string(),
                    ));
                }
                let mem = mem.borrow();
                mem.get(idx[0].max(0) as usize)
                    .cloned()
                    .ok_or_else(|| bounds_error(&idx, mem.len()))
            }
            Value::Tuple(t) => {
                let idx = single_index(indices)?;
                if idx < 1 || idx as usize > t.elements.len() {
                    return Err(bounds_error(&[idx], t.elements.len()));
                }
                Ok(t.elements[idx as usize - 1].clone())
            }
            Value::Range(r) => {
                let idx = single_index(indices)?;
                r.get(idx.max(0) as usize)
                    .map(Value::I64)
                    .ok_or_else(|| bounds_error(&[idx], r.len()))
            }
            Value::Str(s) => {
                let idx = single_index(indices)?;
                string_char_at(s, idx)
            }
            Value::NamedTuple(nt) => match &indices[..] {
                [Value::Sym(sym)] => nt.get(sym.as_str()).cloned().ok_or_else(|| {
                    VmError::TypeError(format!("NamedTuple has no field {}", sym.as_str()))
                }),
                _ => {
                    let idx = single_index(indices)?;
                    if idx < 1 || idx as usize > nt.values.len() {
                        return Err(bounds_error(&[idx], nt.values.len()));
                    }
                    Ok(nt.values[idx as usize - 1].clone())
                }
            },
            Value::Pairs(pairs) => match &indices[..] {
                [Value::Sym(sym)] => pairs.get(sym.as_str()).cloned().ok_or_else(|| {
                    VmError::KeyError(format!(":{}", sym.as_str()))
                }),
                _ => Err(VmError::ArgumentError(
                    "Pairs are indexed by symbol".to_string(),
                )),
            },
            other => Err(VmError::TypeError(format!(
                "getindex: {} is not indexable",
                other.type_of().display(&self.lattice)
            ))),
        }
    }

    pub(crate) fn set_index(
        &mut self,
        container: &Value,
        indices: &[Value],
        value: Value,
    ) -> Result<(), VmError> {
        match container {
            Value::Array(arr) => {
                let idx = numeric_indices(indices)?;
                let elem = arr.borrow().elem.clone();
                let converted = if elem.is_any() {
                    value
                } else {
                    self.convert_value(&elem, value)?
                };
                let arr = arr.borrow();
                if !arr.set(&idx, converted) {
                    return Err(bounds_error(&idx, arr.len()));
                }
                Ok(())
            }
            Value::Memory(mem) => {
                let idx = numeric_indices(indices)?;
                if idx.len() != 1 {
                    return Err(VmError::ArgumentError(
                        "Memory takes a single linear index".to_string(),
                    ));
                }
                let elem = mem.borrow().elem.clone();
                let converted = if elem.is_any() {
                    value
                } else {
                    self.convert_value(&elem, value)?
                };
                let len = mem.borrow().len();
                if !mem.borrow_mut().set(idx[0].max(0) as usize, converted) {
                    return Err(bounds_error(&idx, len));
                }
                Ok(())
            }
            other => Err(VmError::TypeError(format!(
                "setindex!: {} is not mutable-indexable",
                other.type_of().display(&self.lattice)
            ))),
        }
    }

    // ── iteration and element types ─────────────────────────────────────

    /// Materialise the elements of an iterable value, in iteration order.
    pub(crate) fn iterable_items(&mut self, value: &Value) -> Result<Vec<Value>, VmError> {
        match value {
            Value::Tuple(t) => Ok(t.elements.clone()),
            Value::Array(arr) => Ok(arr.borrow().to_vec()),
            Value::Memory(mem) => Ok(mem.borrow().data.clone()),
            Value::Range(r) => Ok(r.iter().map(Value::I64).collect()),
            Value::Generator(g) => Ok(g.items.clone()),
            Value::Set(s) => Ok(s.borrow().items().to_vec()),
            Value::Str(s) => Ok(s.chars().map(Value::Char).collect()),
            Value::Pairs(p) => Ok(p
                .keys
                .iter()
                .zip(&p.values)
                .map(|(k, v)| {
                    Value::Pair(Box::new(value::PairValue {
                        first: Value::Sym(SymbolValue::new(k.clone())),
                        second: v.clone(),
                    }))
                })
                .collect()),
            Value::NamedTuple(nt) => Ok(nt.values.clone()),
            other => Err(VmError::MethodError(format!(
                "MethodError: no method matching iterate(::{})",
                other.type_of().display(&self.lattice)
            ))),
        }
    }

    /// Common element type of a value list: the shared concrete type, a
    /// numeric promotion when they differ numerically, `Any` otherwise.
    pub(crate) fn unify_element_type(&mut self, values: &[Value]) -> Ty {
        let mut iter = values.iter();
        let Some(first) = iter.next() else {
            return Ty::any();
        };
        let mut ty = first.type_of();
        for v in iter {
            let vt = v.type_of();
            if vt == ty {
                continue;
            }
            ty = self.promote_type_tys(&ty, &vt);
            if ty.is_any() {
                return ty;
            }
        }
        ty
    }

    // ── stack helpers ───────────────────────────────────────────────────

    pub(crate) fn push(&mut self, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.stack.push(value);
        }
    }

    pub(crate) fn pop(&mut self) -> Result<Value, VmError> {
        self.frames
            .last_mut()
            .ok_or(VmError::StackUnderflow)?
            .stack
            .pop()
            .ok_or(VmError::StackUnderflow)
    }

    fn peek(&self) -> Result<&Value, VmError> {
        self.frames
            .last()
            .ok_or(VmError::StackUnderflow)?
            .stack
            .last()
            .ok_or(VmError::StackUnderflow)
    }

    /// Pop `n` values, restoring push order.
    fn pop_args(&mut self, n: usize) -> Result<Vec<Value>, VmError> {
        let mut args = Vec::with_capacity(n);
        for _ in 0..n {
            args.push(self.pop()?);
        }
        args.reverse();
        Ok(args)
    }

    /// Pop `m` alternating symbol/value pairs pushed in source order.
    fn pop_kw_pairs(&mut self, m: usize) -> Result<Vec<(String, Value)>, VmError> {
        let mut pairs = Vec::with_capacity(m);
        for _ in 0..m {
            let value = self.pop()?;
            let key = self.pop()?;
            let name = match key {
                Value::Sym(sym) => sym.as_str().to_string(),
                other => {
                    return Err(VmError::TypeError(format!(
                        "keyword name must be a Symbol, got {}",
                        other.type_of().display(&self.lattice)
                    )));
                }
            };
            pairs.push((name, value));
        }
        pairs.reverse();
        Ok(pairs)
    }

    fn kw_bundle_pairs(&self, bundle: &Value) -> Result<Vec<(String, Value)>, VmError> {
        match bundle {
            Value::Pairs(p) => Ok(p
                .keys
                .iter()
                .cloned()
                .zip(p.values.iter().cloned())
                .collect()),
            Value::NamedTuple(nt) => Ok(nt
                .names
                .iter()
                .cloned()
                .zip(nt.values.iter().cloned())
                .collect()),
            other => Err(VmError::ArgumentError(format!(
                "expected a keyword container, got {}",
                other.type_of().display(&self.lattice)
            ))),
        }
    }

    fn jump(&mut self, rel: i32) -> Result<(), VmError> {
        let frame = self.frames.last_mut().ok_or(VmError::StackUnderflow)?;
        frame.ip = offset_ip(frame.ip, rel)?;
        Ok(())
    }
}

fn offset_ip(ip: usize, rel: i32) -> Result<usize, VmError> {
    let target = ip as i64 + rel as i64;
    if target < 0 {
        return Err(VmError::InvalidInstruction(format!(
            "jump target {} out of range",
            target
        )));
    }
    Ok(target as usize)
}

fn bounds_error(indices: &[i64], len: usize) -> VmError {
    VmError::BoundsError {
        index: indices.to_vec(),
        length: format!("{}-element container", len),
    }
}

fn numeric_indices(indices: &[Value]) -> Result<Vec<i64>, VmError> {
    indices
        .iter()
        .map(|v| {
            v.as_index().ok_or_else(|| {
                VmError::ArgumentError("array indices must be integers".to_string())
            })
        })
        .collect()
}

fn single_index(indices: &[Value]) -> Result<i64, VmError> {
    if indices.len() != 1 {
        return Err(VmError::ArgumentError(
            "expected a single index".to_string(),
        ));
    }
    indices[0]
        .as_index()
        .ok_or_else(|| VmError::ArgumentError("index must be an integer".to_string()))
}

/// 1-based byte index into a string, validating char boundaries.
fn string_char_at(s: &str, index: i64) -> Result<Value, VmError> {
    if index < 1 || index as usize > s.len() {
        return Err(VmError::BoundsError {
            index: vec![index],
            length: format!("{}-codeunit String", s.len()),
        });
    }
    let byte = index as usize - 1;
    if !s.is_char_boundary(byte) {
        return Err(VmError::StringIndexError {
            index,
            string: s.to_string(),
        });
    }
    Ok(Value::Char(s[byte..].chars().next().ok_or_else(|| {
        VmError::Internal("char boundary check out of sync".to_string())
    })?))
}

impl Vm {
    /// Function identity value for a registered generic function.
    pub fn function_value(&self, name: &str) -> Value {
        Value::Function(FunctionValue::new(name))
    }
}
