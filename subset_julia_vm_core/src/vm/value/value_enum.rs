//! `Value` - the main runtime value type for the core engine.
//!
//! Every variant reports a fully-parameterised concrete type from
//! [`Value::type_of`] (`Complex{Int64}`, `Array{Float64,2}`); dispatch uses
//! [`Value::dispatch_type`], which differs only for type objects (`Int64` the
//! value dispatches as `Type{Int64}`).

use half::f16;

use crate::types::{core_types as c, Ty, TyArg};

use super::array::{ArrayRef, MemoryRef};
use super::container::{
    ExprValue, GeneratorValue, IoRef, NamedTupleValue, PairValue, PairsValue, RangeValue, SetRef,
    SymbolValue, TupleValue,
};
use super::exception::ExceptionValue;
use super::metadata::{ClosureValue, FunctionValue};
use super::number::{bigfloat_from_f64, ComplexValue, RationalValue};
use super::regex::{RegexValue, VersionNumber};
use super::struct_instance::{StructInstance, StructRef};
use super::{RustBigFloat, RustBigInt};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    // Signed integers
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    BigInt(RustBigInt),
    // Unsigned integers
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    // Boolean (numerically coercible, but its own type for dispatch)
    Bool(bool),
    // Floating point
    F16(f16),
    F32(f32),
    F64(f64),
    BigFloat(RustBigFloat),
    // Exact ratios and complex numbers
    Rational(RationalValue),
    Complex(Box<ComplexValue>),
    // Text
    Str(String),
    Char(char),
    Sym(SymbolValue),
    // Singletons
    Nothing,
    Missing,
    // Containers
    Tuple(TupleValue),
    NamedTuple(NamedTupleValue),
    Pairs(PairsValue),
    Pair(Box<PairValue>),
    Array(ArrayRef),
    Memory(MemoryRef),
    Range(RangeValue),
    Set(SetRef),
    Bytes(Vec<u8>),
    // User-defined structs (immutable by value, mutable by shared handle)
    Struct(Box<StructInstance>),
    MutStruct(StructRef),
    // Wrappers
    Regex(RegexValue),
    Version(VersionNumber),
    Html(Box<Value>),
    Text(Box<Value>),
    Mime(String),
    Some(Box<Value>),
    // Types and callables as values
    DataType(Ty),
    Function(FunctionValue),
    Closure(Box<ClosureValue>),
    // Metaprogramming
    Generator(Box<GeneratorValue>),
    Expr(Box<ExprValue>),
    QuoteNode(Box<Value>),
    // Errors as data
    Exception(Box<ExceptionValue>),
    // In-memory IO for sprint/print routing
    IoBuf(IoRef),
}

impl Value {
    /// The concrete runtime type, with parameters reflecting the value's
    /// actual element types.
    pub fn type_of(&self) -> Ty {
        match self {
            Value::I8(_) => Ty::Named(c::INT8),
            Value::I16(_) => Ty::Named(c::INT16),
            Value::I32(_) => Ty::Named(c::INT32),
            Value::I64(_) => Ty::Named(c::INT64),
            Value::I128(_) => Ty::Named(c::INT128),
            Value::BigInt(_) => Ty::Named(c::BIGINT),
            Value::U8(_) => Ty::Named(c::UINT8),
            Value::U16(_) => Ty::Named(c::UINT16),
            Value::U32(_) => Ty::Named(c::UINT32),
            Value::U64(_) => Ty::Named(c::UINT64),
            Value::U128(_) => Ty::Named(c::UINT128),
            Value::Bool(_) => Ty::Named(c::BOOL),
            Value::F16(_) => Ty::Named(c::FLOAT16),
            Value::F32(_) => Ty::Named(c::FLOAT32),
            Value::F64(_) => Ty::Named(c::FLOAT64),
            Value::BigFloat(_) => Ty::Named(c::BIGFLOAT),
            Value::Rational(_) => {
                Ty::Applied(c::RATIONAL, vec![TyArg::Ty(Ty::Named(c::INT64))])
            }
            Value::Complex(z) => Ty::Applied(c::COMPLEX, vec![TyArg::Ty(z.re.type_of())]),
            Value::Str(_) => Ty::Named(c::STRING),
            Value::Char(_) => Ty::Named(c::CHAR),
            Value::Sym(_) => Ty::Named(c::SYMBOL),
            Value::Nothing => Ty::Named(c::NOTHING),
            Value::Missing => Ty::Named(c::MISSING),
            Value::Tuple(t) => Ty::Tuple(t.elements.iter().map(Value::type_of).collect()),
            Value::NamedTuple(_) => Ty::Named(c::NAMED_TUPLE),
            Value::Pairs(_) => Ty::Named(c::PAIRS),
            Value::Pair(p) => Ty::Applied(
                c::PAIR,
                vec![
                    TyArg::Ty(p.first.type_of()),
                    TyArg::Ty(p.second.type_of()),
                ],
            ),
            Value::Array(arr) => {
                let arr = arr.borrow();
                Ty::Applied(
                    c::ARRAY,
                    vec![TyArg::Ty(arr.elem.clone()), TyArg::Int(arr.rank() as i64)],
                )
            }
            Value::Memory(mem) => {
                Ty::Applied(c::MEMORY, vec![TyArg::Ty(mem.borrow().elem.clone())])
            }
            Value::Range(r) => {
                if r.is_unit() {
                    Ty::Named(c::UNIT_RANGE)
                } else {
                    Ty::Named(c::STEP_RANGE)
                }
            }
            Value::Set(_) => Ty::Applied(c::SET, vec![TyArg::Ty(Ty::any())]),
            Value::Bytes(_) => Ty::Named(c::CODE_UNITS),
            Value::Struct(s) => s.ty.clone(),
            Value::MutStruct(s) => s.borrow().ty.clone(),
            Value::Regex(_) => Ty::Named(c::REGEX),
            Value::Version(_) => Ty::Named(c::VERSION_NUMBER),
            Value::Html(inner) => Ty::Applied(c::HTML, vec![TyArg::Ty(inner.type_of())]),
            Value::Text(inner) => Ty::Applied(c::TEXT, vec![TyArg::Ty(inner.type_of())]),
            Value::Mime(_) => Ty::Named(c::MIME),
            Value::Some(inner) => Ty::Applied(c::SOME, vec![TyArg::Ty(inner.type_of())]),
            Value::DataType(ty) => {
                if matches!(ty, Ty::UnionAll { .. }) {
                    Ty::Named(c::UNION_ALL)
                } else {
                    Ty::Named(c::DATA_TYPE)
                }
            }
            Value::Function(_) | Value::Closure(_) => Ty::Named(c::FUNCTION),
            Value::Generator(_) => Ty::Named(c::GENERATOR),
            Value::Expr(_) => Ty::Named(c::EXPR),
            Value::QuoteNode(_) => Ty::Named(c::QUOTE_NODE),
            Value::Exception(e) => Ty::Named(e.ty),
            Value::IoBuf(_) => Ty::Named(c::IO_BUFFER),
        }
    }

    /// The type used for method dispatch. Identical to [`Value::type_of`]
    /// except for type objects: the value `Int64` dispatches as
    /// `Type{Int64}` so `::Type{T}` signatures can match it.
    pub fn dispatch_type(&self) -> Ty {
        match self {
            Value::DataType(ty) => Ty::TypeOf(Box::new(ty.clone())),
            other => other.type_of(),
        }
    }

    /// Whether the variant belongs to the numeric tower.
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::I8(_)
                | Value::I16(_)
                | Value::I32(_)
                | Value::I64(_)
                | Value::I128(_)
                | Value::BigInt(_)
                | Value::U8(_)
                | Value::U16(_)
                | Value::U32(_)
                | Value::U64(_)
                | Value::U128(_)
                | Value::Bool(_)
                | Value::F16(_)
                | Value::F32(_)
                | Value::F64(_)
                | Value::BigFloat(_)
                | Value::Rational(_)
                | Value::Complex(_)
        )
    }

    /// Machine-integer (and Bool) payload widened to i128.
    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::I8(n) => Some(*n as i128),
            Value::I16(n) => Some(*n as i128),
            Value::I32(n) => Some(*n as i128),
            Value::I64(n) => Some(*n as i128),
            Value::I128(n) => Some(*n),
            Value::U8(n) => Some(*n as i128),
            Value::U16(n) => Some(*n as i128),
            Value::U32(n) => Some(*n as i128),
            Value::U64(n) => Some(*n as i128),
            Value::U128(n) => i128::try_from(*n).ok(),
            Value::Bool(b) => Some(*b as i128),
            _ => None,
        }
    }

    /// Index argument: a machine integer that fits an i64.
    pub fn as_index(&self) -> Option<i64> {
        self.as_int().and_then(|n| i64::try_from(n).ok())
    }

    /// Real payload widened to f64 (loses precision for Big* types).
    pub fn as_f64_lossy(&self) -> Option<f64> {
        match self {
            Value::F16(x) => Some(x.to_f64()),
            Value::F32(x) => Some(*x as f64),
            Value::F64(x) => Some(*x),
            Value::Rational(r) => Some(r.to_f64()),
            Value::BigInt(n) => {
                use num_traits::ToPrimitive;
                n.to_f64()
            }
            other => other.as_int().map(|n| n as f64),
        }
    }

    pub fn new_bigint(n: i64) -> Self {
        Value::BigInt(RustBigInt::from(n))
    }

    pub fn new_bigfloat_f64(x: f64) -> Self {
        Value::BigFloat(bigfloat_from_f64(x))
    }
}

/// Serializable subset of `Value` used for the program constants table.
/// Only literal-shaped values appear there.
#[derive(serde::Serialize, serde::Deserialize)]
enum SerializableValue {
    Nothing,
    Missing,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    F16(f16),
    F32(f32),
    F64(f64),
    BigInt(String),
    BigFloat(String),
    Rational(RationalValue),
    Str(String),
    Char(char),
    Sym(String),
    Range(RangeValue),
    Version(VersionNumber),
    Bytes(Vec<u8>),
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let sv = match self {
            Value::Nothing => SerializableValue::Nothing,
            Value::Missing => SerializableValue::Missing,
            Value::Bool(v) => SerializableValue::Bool(*v),
            Value::I8(v) => SerializableValue::I8(*v),
            Value::I16(v) => SerializableValue::I16(*v),
            Value::I32(v) => SerializableValue::I32(*v),
            Value::I64(v) => SerializableValue::I64(*v),
            Value::I128(v) => SerializableValue::I128(*v),
            Value::U8(v) => SerializableValue::U8(*v),
            Value::U16(v) => SerializableValue::U16(*v),
            Value::U32(v) => SerializableValue::U32(*v),
            Value::U64(v) => SerializableValue::U64(*v),
            Value::U128(v) => SerializableValue::U128(*v),
            Value::F16(v) => SerializableValue::F16(*v),
            Value::F32(v) => SerializableValue::F32(*v),
            Value::F64(v) => SerializableValue::F64(*v),
            Value::BigInt(v) => SerializableValue::BigInt(v.to_string()),
            Value::BigFloat(v) => SerializableValue::BigFloat(format!("{}", v)),
            Value::Rational(v) => SerializableValue::Rational(*v),
            Value::Str(v) => SerializableValue::Str(v.clone()),
            Value::Char(v) => SerializableValue::Char(*v),
            Value::Sym(v) => SerializableValue::Sym(v.as_str().to_string()),
            Value::Range(v) => SerializableValue::Range(*v),
            Value::Version(v) => SerializableValue::Version(*v),
            Value::Bytes(v) => SerializableValue::Bytes(v.clone()),
            other => {
                return Err(serde::ser::Error::custom(format!(
                    "cannot serialize non-literal Value variant: {:?}",
                    std::mem::discriminant(other)
                )));
            }
        };
        sv.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let sv = SerializableValue::deserialize(deserializer)?;
        Ok(match sv {
            SerializableValue::Nothing => Value::Nothing,
            SerializableValue::Missing => Value::Missing,
            SerializableValue::Bool(v) => Value::Bool(v),
            SerializableValue::I8(v) => Value::I8(v),
            SerializableValue::I16(v) => Value::I16(v),
            SerializableValue::I32(v) => Value::I32(v),
            SerializableValue::I64(v) => Value::I64(v),
            SerializableValue::I128(v) => Value::I128(v),
            SerializableValue::U8(v) => Value::U8(v),
            SerializableValue::U16(v) => Value::U16(v),
            SerializableValue::U32(v) => Value::U32(v),
            SerializableValue::U64(v) => Value::U64(v),
            SerializableValue::U128(v) => Value::U128(v),
            SerializableValue::F16(v) => Value::F16(v),
            SerializableValue::F32(v) => Value::F32(v),
            SerializableValue::F64(v) => Value::F64(v),
            SerializableValue::BigInt(s) => {
                Value::BigInt(s.parse::<RustBigInt>().unwrap_or_default())
            }
            SerializableValue::BigFloat(s) => Value::BigFloat(
                super::number::bigfloat_parse(&s)
                    .unwrap_or_else(|| bigfloat_from_f64(f64::NAN)),
            ),
            SerializableValue::Rational(v) => Value::Rational(v),
            SerializableValue::Str(v) => Value::Str(v),
            SerializableValue::Char(v) => Value::Char(v),
            SerializableValue::Sym(v) => Value::Sym(SymbolValue::new(v)),
            SerializableValue::Range(v) => Value::Range(v),
            SerializableValue::Version(v) => Value::Version(v),
            SerializableValue::Bytes(v) => Value::Bytes(v),
        })
    }
}
