//! Value rendering for `string`, `repr`, `sprint`, and print routing.

use crate::types::TypeLattice;

use super::value::Value;

/// `string(x)`-style rendering. With `compact`, floats drop redundant
/// fractional digits (the `:compact` IOContext property).
pub fn format_value(value: &Value, lat: &TypeLattice, compact: bool) -> String {
    match value {
        Value::I8(n) => n.to_string(),
        Value::I16(n) => n.to_string(),
        Value::I32(n) => n.to_string(),
        Value::I64(n) => n.to_string(),
        Value::I128(n) => n.to_string(),
        Value::U8(n) => n.to_string(),
        Value::U16(n) => n.to_string(),
        Value::U32(n) => n.to_string(),
        Value::U64(n) => n.to_string(),
        Value::U128(n) => n.to_string(),
        Value::BigInt(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::F16(x) => format_float(x.to_f64(), compact),
        Value::F32(x) => format_float(*x as f64, compact),
        Value::F64(x) => format_float(*x, compact),
        Value::BigFloat(x) => format!("{}", x),
        Value::Rational(r) => r.to_string(),
        Value::Complex(z) => {
            let re = format_value(&z.re, lat, compact);
            let im = format_value(&z.im, lat, compact);
            if im.starts_with('-') {
                format!("{} - {}im", re, &im[1..])
            } else {
                format!("{} + {}im", re, im)
            }
        }
        Value::Str(s) => s.clone(),
        Value::Char(c) => c.to_string(),
        Value::Sym(s) => s.to_string(),
        Value::Nothing => "nothing".to_string(),
        Value::Missing => "missing".to_string(),
        Value::Tuple(t) => {
            let parts: Vec<String> = t
                .elements
                .iter()
                .map(|v| format_repr(v, lat, compact))
                .collect();
            if parts.len() == 1 {
                format!("({},)", parts[0])
            } else {
                format!("({})", parts.join(", "))
            }
        }
        Value::NamedTuple(nt) => {
            let parts: Vec<String> = nt
                .names
                .iter()
                .zip(&nt.values)
                .map(|(n, v)| format!("{} = {}", n, format_repr(v, lat, compact)))
                .collect();
            format!("({})", parts.join(", "))
        }
        Value::Pairs(p) => {
            let parts: Vec<String> = p
                .keys
                .iter()
                .zip(&p.values)
                .map(|(k, v)| format!(":{} => {}", k, format_repr(v, lat, compact)))
                .collect();
            format!("pairs(({}))", parts.join(", "))
        }
        Value::Pair(p) => format!(
            "{} => {}",
            format_repr(&p.first, lat, compact),
            format_repr(&p.second, lat, compact)
        ),
        Value::Array(arr) => {
            let arr = arr.borrow();
            let parts: Vec<String> = arr
                .iter_values()
                .map(|v| format_repr(&v, lat, compact))
                .collect();
            if arr.rank() == 1 {
                format!("[{}]", parts.join(", "))
            } else {
                format!(
                    "{}[{}]",
                    value.type_of().display(lat),
                    parts.join(", ")
                )
            }
        }
        Value::Memory(mem) => {
            let mem = mem.borrow();
            let parts: Vec<String> = mem
                .data
                .iter()
                .map(|v| format_repr(v, lat, compact))
                .collect();
            format!("Memory([{}])", parts.join(", "))
        }
        Value::Range(r) => {
            if r.is_unit() {
                format!("{}:{}", r.start, r.stop)
            } else {
                format!("{}:{}:{}", r.start, r.step, r.stop)
            }
        }
        Value::Set(s) => {
            let parts: Vec<String> = s
                .borrow()
                .items()
                .iter()
                .map(|v| format_repr(v, lat, compact))
                .collect();
            format!("Set([{}])", parts.join(", "))
        }
        Value::Bytes(b) => {
            let parts: Vec<String> = b.iter().map(|x| format!("0x{:02x}", x)).collect();
            format!("UInt8[{}]", parts.join(", "))
        }
        Value::Struct(s) => {
            let parts: Vec<String> = s
                .values
                .iter()
                .map(|v| format_repr(v, lat, compact))
                .collect();
            format!("{}({})", s.ty.display(lat), parts.join(", "))
        }
        Value::MutStruct(s) => {
            let s = s.borrow();
            let parts: Vec<String> = s
                .values
                .iter()
                .map(|v| format_repr(v, lat, compact))
                .collect();
            format!("{}({})", s.ty.display(lat), parts.join(", "))
        }
        Value::Regex(r) => format!("r\"{}\"", r.pattern),
        Value::Version(v) => format!("v\"{}\"", v),
        Value::Html(inner) => format!("HTML({})", format_repr(inner, lat, compact)),
        Value::Text(inner) => format!("Text({})", format_repr(inner, lat, compact)),
        Value::Mime(m) => format!("MIME(\"{}\")", m),
        Value::Some(inner) => format!("Some({})", format_repr(inner, lat, compact)),
        Value::DataType(ty) => ty.display(lat),
        Value::Function(f) => f.name.clone(),
        Value::Closure(_) => "#<closure>".to_string(),
        Value::Generator(_) => "Base.Generator(...)".to_string(),
        Value::Expr(e) => {
            let parts: Vec<String> = e
                .args
                .iter()
                .map(|v| format_repr(v, lat, compact))
                .collect();
            format!("Expr({}, {})", e.head, parts.join(", "))
        }
        Value::QuoteNode(inner) => format!("QuoteNode({})", format_repr(inner, lat, compact)),
        Value::Exception(e) => {
            if e.message.is_empty() {
                lat.name(e.ty).to_string()
            } else {
                e.message.clone()
            }
        }
        Value::IoBuf(_) => "IOBuffer(...)".to_string(),
    }
}

/// `repr(x)`-style rendering: like `string` but strings are quoted, chars
/// get their literal form.
pub fn format_repr(value: &Value, lat: &TypeLattice, compact: bool) -> String {
    match value {
        Value::Str(s) => format!("{:?}", s),
        Value::Char(c) => format!("'{}'", c),
        other => format_value(other, lat, compact),
    }
}

fn format_float(x: f64, compact: bool) -> String {
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "Inf" } else { "-Inf" }.to_string();
    }
    if compact {
        // :compact trims to shortest round-trippable-ish form
        let s = format!("{}", x);
        return s;
    }
    if x == x.trunc() && x.abs() < 1e16 {
        format!("{:.1}", x)
    } else {
        format!("{}", x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeLattice;
    use crate::vm::value::{ComplexValue, RationalValue};

    fn lat() -> TypeLattice {
        TypeLattice::bootstrap()
    }

    #[test]
    fn test_float_formatting_keeps_decimal_point() {
        assert_eq!(format_value(&Value::F64(12.0), &lat(), false), "12.0");
        assert_eq!(format_value(&Value::F64(12.5), &lat(), false), "12.5");
        assert_eq!(format_value(&Value::F64(f64::NAN), &lat(), false), "NaN");
    }

    #[test]
    fn test_compact_float_drops_trailing_zero_digits() {
        assert_eq!(format_value(&Value::F64(12.0), &lat(), true), "12");
    }

    #[test]
    fn test_complex_rendering() {
        let z = Value::Complex(Box::new(ComplexValue {
            re: Value::I64(4),
            im: Value::I64(-6),
        }));
        assert_eq!(format_value(&z, &lat(), false), "4 - 6im");
    }

    #[test]
    fn test_rational_rendering() {
        let r = Value::Rational(RationalValue::new(5, 2).unwrap());
        assert_eq!(format_value(&r, &lat(), false), "5//2");
    }

    #[test]
    fn test_string_vs_repr() {
        let s = Value::Str("hi".to_string());
        assert_eq!(format_value(&s, &lat(), false), "hi");
        assert_eq!(format_repr(&s, &lat(), false), "\"hi\"");
    }

    #[test]
    fn test_tuple_rendering_single_element_trailing_comma() {
        let t = Value::Tuple(crate::vm::value::TupleValue::new(vec![Value::I64(1)]));
        assert_eq!(format_value(&t, &lat(), false), "(1,)");
    }
}
