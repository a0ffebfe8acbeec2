//! Runtime values.
//!
//! This module contains all the runtime value types for the core engine.
//!
//! # Module Organization
//!
//! - `array.rs`: `MemoryValue` flat buffers and `ArrayValue` N-D arrays/views
//! - `container.rs`: tuples, named tuples, kwargs `Pairs`, sets, generators,
//!   `Expr`/`Symbol` AST values, integer ranges
//! - `exception.rs`: exception values carried through unwinding
//! - `metadata.rs`: function and closure identities
//! - `number.rs`: `Rational`/`Complex` payloads and BigFloat helpers
//! - `regex.rs`: compiled regex and `VersionNumber` values
//! - `struct_instance.rs`: user-defined struct instances
//! - `value_enum.rs`: the `Value` enum and `typeof` mapping

mod array;
mod container;
mod exception;
mod metadata;
mod number;
mod regex;
mod struct_instance;
mod value_enum;

pub use array::{new_array_ref, new_memory_ref, ArrayRef, ArrayValue, MemoryRef, MemoryValue};
pub use container::{
    new_set_ref, ExprValue, GeneratorValue, IoBuffer, IoRef, NamedTupleValue, PairValue,
    PairsValue, RangeValue, SetRef, SetValue, SymbolValue, TupleValue,
};
pub use exception::ExceptionValue;
pub use metadata::{ClosureValue, FunctionValue};
pub use number::{
    bigfloat_add, bigfloat_div, bigfloat_from_f64, bigfloat_from_i64, bigfloat_mul,
    bigfloat_parse, bigfloat_sub, ComplexValue, RationalValue,
};
pub use regex::{RegexValue, VersionNumber};
pub use struct_instance::{StructInstance, StructRef};
pub use value_enum::Value;

// Re-export the arbitrary-precision backing types
pub use astro_float::BigFloat as RustBigFloat;
pub use astro_float::RoundingMode as BigFloatRoundingMode;
pub use num_bigint::BigInt as RustBigInt;

/// Default precision for new BigFloat values (in bits).
/// This is the initial value; it can be changed via setprecision.
pub const BIGFLOAT_DEFAULT_PRECISION: usize = 256;

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Mutable process-wide precision for BigFloat.
static BIGFLOAT_PRECISION_GLOBAL: AtomicUsize = AtomicUsize::new(BIGFLOAT_DEFAULT_PRECISION);

/// Process-wide rounding mode for BigFloat operations.
/// 0=ToEven (RoundNearest), 1=ToZero, 2=Up, 3=Down, 4=FromZero, 5=ToOdd
static BIGFLOAT_ROUNDING_MODE: AtomicU8 = AtomicU8::new(0);

/// Get the current default precision for BigFloat (in bits).
pub fn get_bigfloat_precision() -> usize {
    BIGFLOAT_PRECISION_GLOBAL.load(Ordering::SeqCst)
}

/// Set the default precision for BigFloat (in bits).
/// Returns the previous precision.
pub fn set_bigfloat_precision(precision: usize) -> usize {
    BIGFLOAT_PRECISION_GLOBAL.swap(precision, Ordering::SeqCst)
}

/// Get the current rounding mode for BigFloat operations as a raw u8.
pub fn get_bigfloat_rounding_mode() -> u8 {
    BIGFLOAT_ROUNDING_MODE.load(Ordering::SeqCst)
}

/// Set the rounding mode for BigFloat operations.
/// Returns the previous mode.
pub fn set_bigfloat_rounding_mode(mode: u8) -> u8 {
    BIGFLOAT_ROUNDING_MODE.swap(mode, Ordering::SeqCst)
}

/// Convert a rounding mode u8 to the astro-float enum.
pub fn u8_to_bigfloat_rounding_mode(mode: u8) -> BigFloatRoundingMode {
    match mode {
        0 => BigFloatRoundingMode::ToEven,
        1 => BigFloatRoundingMode::ToZero,
        2 => BigFloatRoundingMode::Up,
        3 => BigFloatRoundingMode::Down,
        4 => BigFloatRoundingMode::FromZero,
        5 => BigFloatRoundingMode::ToOdd,
        _ => BigFloatRoundingMode::ToEven,
    }
}

/// Capture the precision and rounding mode once, at operation entry.
/// Every BigFloat operation reads the pair exactly once so a concurrent
/// `setprecision` cannot tear a single operation.
pub fn capture_bigfloat_mode() -> (usize, BigFloatRoundingMode) {
    (
        get_bigfloat_precision(),
        u8_to_bigfloat_rounding_mode(get_bigfloat_rounding_mode()),
    )
}
