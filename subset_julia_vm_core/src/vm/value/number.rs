//! Rational and Complex payloads, plus BigFloat arithmetic helpers.

use num_integer::Integer;

use super::value_enum::Value;
use super::{capture_bigfloat_mode, RustBigFloat};

/// A normalised rational number over `Int64`.
///
/// Invariants: `den > 0` and `gcd(|num|, den) == 1`. Construction through
/// [`RationalValue::new`] maintains both; a zero denominator is rejected
/// (the caller raises the division error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RationalValue {
    pub num: i64,
    pub den: i64,
}

impl RationalValue {
    /// Normalise `num // den`. Returns `None` for a zero denominator.
    pub fn new(num: i64, den: i64) -> Option<Self> {
        if den == 0 {
            return None;
        }
        let g = num.abs().gcd(&den.abs());
        let sign = if den < 0 { -1 } else { 1 };
        Some(Self {
            num: sign * num / g,
            den: den.abs() / g,
        })
    }

    pub fn from_int(n: i64) -> Self {
        Self { num: n, den: 1 }
    }

    pub fn is_integer(&self) -> bool {
        self.den == 1
    }

    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl std::fmt::Display for RationalValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}//{}", self.num, self.den)
    }
}

/// A complex number with a single element type.
///
/// Both parts carry the same concrete numeric type; the builtin constructor
/// promotes mismatched parts before building the value.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexValue {
    pub re: Value,
    pub im: Value,
}

// ── BigFloat helpers ────────────────────────────────────────────────────────
//
// Each operation captures the process-wide precision and rounding mode once
// at entry (see `capture_bigfloat_mode`).

pub fn bigfloat_from_f64(val: f64) -> RustBigFloat {
    let (precision, _) = capture_bigfloat_mode();
    RustBigFloat::from_f64(val, precision)
}

pub fn bigfloat_from_i64(val: i64) -> RustBigFloat {
    let (precision, _) = capture_bigfloat_mode();
    // f64 is exact up to 2^53; wider integers go through the decimal parser.
    if val.abs() <= (1i64 << 53) {
        RustBigFloat::from_f64(val as f64, precision)
    } else {
        bigfloat_parse(&val.to_string())
            .unwrap_or_else(|| RustBigFloat::from_f64(val as f64, precision))
    }
}

/// Parse a decimal string into a BigFloat at the current precision.
/// Returns `None` when the text is not numeric.
pub fn bigfloat_parse(s: &str) -> Option<RustBigFloat> {
    let (precision, rm) = capture_bigfloat_mode();
    let mut consts = astro_float::Consts::new().ok()?;
    let bf = RustBigFloat::parse(s, astro_float::Radix::Dec, precision, rm, &mut consts);
    if bf.is_nan() && !s.to_lowercase().contains("nan") {
        return None;
    }
    Some(bf)
}

pub fn bigfloat_add(a: &RustBigFloat, b: &RustBigFloat) -> RustBigFloat {
    let (precision, rm) = capture_bigfloat_mode();
    a.add(b, precision, rm)
}

pub fn bigfloat_sub(a: &RustBigFloat, b: &RustBigFloat) -> RustBigFloat {
    let (precision, rm) = capture_bigfloat_mode();
    a.sub(b, precision, rm)
}

pub fn bigfloat_mul(a: &RustBigFloat, b: &RustBigFloat) -> RustBigFloat {
    let (precision, rm) = capture_bigfloat_mode();
    a.mul(b, precision, rm)
}

pub fn bigfloat_div(a: &RustBigFloat, b: &RustBigFloat) -> RustBigFloat {
    let (precision, rm) = capture_bigfloat_mode();
    a.div(b, precision, rm)
}
