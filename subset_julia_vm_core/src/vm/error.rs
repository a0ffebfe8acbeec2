//! Runtime errors raised during execution.
//!
//! Catchable errors correspond to nodes of the exception tree in the
//! lattice; `to_exception_value` converts them into `Value::Exception` when
//! unwinding reaches a handler. Fatal conditions (stack underflow, invalid
//! instructions, internal inconsistencies) never reach handlers: they abort
//! the interpreter loop.

use crate::types::{core_types as c, DispatchError, TypeId};

use super::value::{ExceptionValue, Value};

/// Runtime errors that can occur during VM execution.
#[derive(Debug, Clone, PartialEq)]
pub enum VmError {
    // ── catchable (the §-taxonomy plus the engine's carry-overs) ──
    ErrorException(String),
    AssertionError(String),
    MethodError(String),
    AmbiguityError(String),
    TypeError(String),
    ArgumentError(String),
    DivideError,
    DomainError { value: String, message: String },
    InexactError(String),
    DimensionMismatch(String),
    KeyError(String),
    StringIndexError { index: i64, string: String },
    EofError(String),
    UndefKeywordError(String),
    OverflowError(String),
    BoundsError { index: Vec<i64>, length: String },
    UndefVarError(String),
    /// `throw(x)` with an arbitrary value.
    Thrown(Value),

    // ── fatal: abort the interpreter loop, never caught ──
    StackUnderflow,
    InvalidInstruction(String),
    Internal(String),
}

impl VmError {
    /// Whether this error may be caught by a handler. Bytecode corruption,
    /// method-table inconsistency and stack underflow are unrecoverable.
    pub fn is_catchable(&self) -> bool {
        !matches!(
            self,
            VmError::StackUnderflow | VmError::InvalidInstruction(_) | VmError::Internal(_)
        )
    }

    /// The lattice node of the carried exception type (`None` for fatal
    /// errors and for `Thrown`, whose payload carries its own type).
    pub fn exception_type(&self) -> Option<TypeId> {
        Some(match self {
            VmError::ErrorException(_) => c::ERROR_EXCEPTION,
            VmError::AssertionError(_) => c::ASSERTION_ERROR,
            VmError::MethodError(_) => c::METHOD_ERROR,
            VmError::AmbiguityError(_) => c::AMBIGUITY_ERROR,
            VmError::TypeError(_) => c::TYPE_ERROR,
            VmError::ArgumentError(_) => c::ARGUMENT_ERROR,
            VmError::DivideError => c::DIVIDE_ERROR,
            VmError::DomainError { .. } => c::DOMAIN_ERROR,
            VmError::InexactError(_) => c::INEXACT_ERROR,
            VmError::DimensionMismatch(_) => c::DIMENSION_MISMATCH,
            VmError::KeyError(_) => c::KEY_ERROR,
            VmError::StringIndexError { .. } => c::STRING_INDEX_ERROR,
            VmError::EofError(_) => c::EOF_ERROR,
            VmError::UndefKeywordError(_) => c::UNDEF_KEYWORD_ERROR,
            VmError::OverflowError(_) => c::OVERFLOW_ERROR,
            VmError::BoundsError { .. } => c::BOUNDS_ERROR,
            VmError::UndefVarError(_) => c::UNDEF_VAR_ERROR,
            VmError::Thrown(_)
            | VmError::StackUnderflow
            | VmError::InvalidInstruction(_)
            | VmError::Internal(_) => return None,
        })
    }

    /// The value a catch block observes for this error.
    pub fn to_exception_value(&self) -> Value {
        if let VmError::Thrown(v) = self {
            return v.clone();
        }
        let message = self.to_string();
        let ty = self
            .exception_type()
            .unwrap_or(c::ERROR_EXCEPTION);
        let fields = match self {
            VmError::DomainError { value, .. } => {
                vec![("val".to_string(), Value::Str(value.clone()))]
            }
            VmError::KeyError(key) => vec![("key".to_string(), Value::Str(key.clone()))],
            VmError::UndefVarError(name) => {
                vec![("var".to_string(), Value::Str(name.clone()))]
            }
            _ => Vec::new(),
        };
        Value::Exception(Box::new(ExceptionValue::with_fields(ty, message, fields)))
    }
}

impl From<DispatchError> for VmError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::NoMethodFound { message, .. } => VmError::MethodError(message),
            DispatchError::AmbiguousMethod { message, .. } => VmError::AmbiguityError(message),
        }
    }
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ErrorException(msg) => write!(f, "ErrorException: {}", msg),
            Self::AssertionError(msg) => write!(f, "AssertionError: {}", msg),
            Self::MethodError(msg) | Self::AmbiguityError(msg) => write!(f, "{}", msg),
            Self::TypeError(msg) => write!(f, "TypeError: {}", msg),
            Self::ArgumentError(msg) => write!(f, "ArgumentError: {}", msg),
            Self::DivideError => write!(f, "DivideError: integer division error"),
            Self::DomainError { value, message } => {
                write!(f, "DomainError with {}: {}", value, message)
            }
            Self::InexactError(msg) => write!(f, "InexactError: {}", msg),
            Self::DimensionMismatch(msg) => write!(f, "DimensionMismatch: {}", msg),
            Self::KeyError(key) => write!(f, "KeyError: key {} not found", key),
            Self::StringIndexError { index, string } => {
                write!(
                    f,
                    "StringIndexError: invalid index [{}] into {:?}",
                    index, string
                )
            }
            Self::EofError(msg) => write!(f, "EOFError: {}", msg),
            Self::UndefKeywordError(name) => {
                write!(f, "UndefKeywordError: keyword argument `{}` not assigned", name)
            }
            Self::OverflowError(msg) => write!(f, "OverflowError: {}", msg),
            Self::BoundsError { index, length } => {
                write!(
                    f,
                    "BoundsError: attempt to access {} at index {:?}",
                    length, index
                )
            }
            Self::UndefVarError(name) => write!(f, "UndefVarError: `{}` not defined", name),
            Self::Thrown(_) => write!(f, "unhandled exception"),
            Self::StackUnderflow => write!(f, "Stack underflow"),
            Self::InvalidInstruction(msg) => write!(f, "Invalid instruction: {}", msg),
            Self::Internal(msg) => write!(f, "InternalError: {}", msg),
        }
    }
}

impl std::error::Error for VmError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors_are_not_catchable() {
        assert!(!VmError::StackUnderflow.is_catchable());
        assert!(!VmError::Internal("x".into()).is_catchable());
        assert!(!VmError::InvalidInstruction("x".into()).is_catchable());
        assert!(VmError::DivideError.is_catchable());
        assert!(VmError::TypeError("x".into()).is_catchable());
    }

    #[test]
    fn test_exception_value_carries_lattice_type() {
        let err = VmError::DivideError;
        match err.to_exception_value() {
            Value::Exception(e) => assert_eq!(e.ty, c::DIVIDE_ERROR),
            other => panic!("expected exception value, got {:?}", other),
        }
    }

    #[test]
    fn test_thrown_payload_passes_through() {
        let err = VmError::Thrown(Value::I64(7));
        assert_eq!(err.to_exception_value(), Value::I64(7));
    }

    #[test]
    fn test_dispatch_error_conversion() {
        let e = DispatchError::NoMethodFound {
            name: "f".into(),
            arg_types: vec![],
            message: "MethodError: no method matching f()".into(),
        };
        assert!(matches!(VmError::from(e), VmError::MethodError(_)));
    }
}
