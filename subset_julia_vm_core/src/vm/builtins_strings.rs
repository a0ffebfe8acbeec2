//! String builtins.
//!
//! Strings are immutable UTF-8; indices are 1-based *byte* positions, and
//! an index inside a multi-byte character raises `StringIndexError` (the
//! `nextind`/`prevind`/`thisind` family navigates valid boundaries).

use crate::vm::value::{IoBuffer, RegexValue, Value};

use super::formatting::{format_repr, format_value};
use super::{Vm, VmError};

// ── rendering ───────────────────────────────────────────────────────────────

/// `string(xs...)`: concatenated `string` renderings.
pub(crate) fn nf_string(vm: &mut Vm, args: Vec<Value>) -> Result<Value, VmError> {
    let mut out = String::new();
    for v in &args {
        out.push_str(&format_value(v, &vm.lattice, false));
    }
    Ok(Value::Str(out))
}

pub(crate) fn nf_repr(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    Ok(Value::Str(format_repr(&x, &vm.lattice, false)))
}

/// `sprint(f, args...)`: call `f(io, args...)` against a fresh buffer and
/// return its contents.
pub(crate) fn nf_sprint(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    if args.is_empty() {
        return Err(VmError::MethodError(
            "MethodError: no method matching sprint()".to_string(),
        ));
    }
    let rest = args.split_off(1);
    let f = args.pop().ok_or(VmError::StackUnderflow)?;
    let io = Value::IoBuf(std::rc::Rc::new(std::cell::RefCell::new(IoBuffer::default())));
    let mut call_args = vec![io.clone()];
    call_args.extend(rest);
    vm.call_value(f, call_args, Vec::new())?;
    let Value::IoBuf(buf) = io else { unreachable!() };
    let contents = buf.borrow().buf.clone();
    Ok(Value::Str(contents))
}

/// `IOContext(io, :compact => true)`-style property attachment.
pub(crate) fn nf_iocontext(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let prop = args.pop().ok_or(VmError::StackUnderflow)?;
    let io = args.pop().ok_or(VmError::StackUnderflow)?;
    let Value::IoBuf(buf) = &io else {
        return Err(VmError::ArgumentError(
            "IOContext expects an IO as the first argument".to_string(),
        ));
    };
    let Value::Pair(pair) = &prop else {
        return Err(VmError::ArgumentError(
            "IOContext expects property pairs".to_string(),
        ));
    };
    if let (Value::Sym(key), Value::Bool(flag)) = (&pair.first, &pair.second) {
        if key.as_str() == "compact" {
            buf.borrow_mut().compact = *flag;
            return Ok(io);
        }
    }
    // Unknown properties are accepted and ignored
    Ok(io)
}

/// `print(...)` / `print(io, ...)`: route to the IO buffer when one leads
/// the arguments, otherwise to the VM output.
pub(crate) fn nf_print(vm: &mut Vm, args: Vec<Value>) -> Result<Value, VmError> {
    print_impl(vm, args, false)
}

pub(crate) fn nf_println(vm: &mut Vm, args: Vec<Value>) -> Result<Value, VmError> {
    print_impl(vm, args, true)
}

fn print_impl(vm: &mut Vm, args: Vec<Value>, newline: bool) -> Result<Value, VmError> {
    let (io, rest) = match args.split_first() {
        Some((Value::IoBuf(buf), rest)) => (Some(buf.clone()), rest.to_vec()),
        _ => (None, args),
    };
    let compact = io.as_ref().map(|b| b.borrow().compact).unwrap_or(false);
    let mut text = String::new();
    for v in &rest {
        text.push_str(&format_value(v, &vm.lattice, compact));
    }
    if newline {
        text.push('\n');
    }
    match io {
        Some(buf) => buf.borrow_mut().buf.push_str(&text),
        None => vm.push_output(&text),
    }
    Ok(Value::Nothing)
}

// ── concatenation ───────────────────────────────────────────────────────────

/// `*` on strings and chars is concatenation.
pub(crate) fn nf_concat(vm: &mut Vm, args: Vec<Value>) -> Result<Value, VmError> {
    let mut out = String::new();
    for v in &args {
        match v {
            Value::Str(s) => out.push_str(s),
            Value::Char(ch) => out.push(*ch),
            other => {
                return Err(VmError::MethodError(format!(
                    "MethodError: no method matching *(::AbstractString, ::{})",
                    other.type_of().display(&vm.lattice)
                )));
            }
        }
    }
    Ok(Value::Str(out))
}

// ── code units and index navigation ────────────────────────────────────────

pub(crate) fn nf_ncodeunits(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let s = pop_str(&mut args)?;
    Ok(Value::I64(s.len() as i64))
}

pub(crate) fn nf_codeunit(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let i = pop_index(&mut args)?;
    let s = pop_str(&mut args)?;
    if i < 1 || i as usize > s.len() {
        return Err(VmError::BoundsError {
            index: vec![i],
            length: format!("{}-codeunit String", s.len()),
        });
    }
    Ok(Value::U8(s.as_bytes()[i as usize - 1]))
}

pub(crate) fn nf_codeunits(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let s = pop_str(&mut args)?;
    Ok(Value::Bytes(s.into_bytes()))
}

/// First valid index after `i` (`i == 0` gives 1; past-the-end allowed as
/// the sentinel `ncodeunits + 1`).
pub(crate) fn nf_nextind(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let i = pop_index(&mut args)?;
    let s = pop_str(&mut args)?;
    let n = s.len() as i64;
    if i < 0 || i > n {
        return Err(VmError::BoundsError {
            index: vec![i],
            length: format!("{}-codeunit String", n),
        });
    }
    if i == 0 {
        return Ok(Value::I64(1));
    }
    let mut j = i as usize; // byte position after the current unit
    loop {
        j += 1;
        if j > s.len() || s.is_char_boundary(j - 1) {
            return Ok(Value::I64(j as i64));
        }
    }
}

/// Last valid index before `i` (`thisind`-style boundary walk downward).
pub(crate) fn nf_prevind(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let i = pop_index(&mut args)?;
    let s = pop_str(&mut args)?;
    let n = s.len() as i64;
    if i < 1 || i > n + 1 {
        return Err(VmError::BoundsError {
            index: vec![i],
            length: format!("{}-codeunit String", n),
        });
    }
    let mut j = i as usize - 1;
    while j >= 1 && !s.is_char_boundary(j - 1) {
        j -= 1;
    }
    Ok(Value::I64(j as i64))
}

/// Largest valid index not exceeding `i`.
pub(crate) fn nf_thisind(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let i = pop_index(&mut args)?;
    let s = pop_str(&mut args)?;
    Ok(Value::I64(thisind(&s, i)?))
}

fn thisind(s: &str, i: i64) -> Result<i64, VmError> {
    let n = s.len() as i64;
    if i < 0 || i > n + 1 {
        return Err(VmError::BoundsError {
            index: vec![i],
            length: format!("{}-codeunit String", n),
        });
    }
    if i == 0 || i == n + 1 {
        return Ok(i);
    }
    let mut j = i as usize;
    while j >= 1 && !s.is_char_boundary(j - 1) {
        j -= 1;
    }
    Ok(j as i64)
}

pub(crate) fn nf_isvalid(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let i = pop_index(&mut args)?;
    let s = pop_str(&mut args)?;
    if i < 1 || i as usize > s.len() {
        return Ok(Value::Bool(false));
    }
    Ok(Value::Bool(s.is_char_boundary(i as usize - 1)))
}

/// Index into `reverse(s)` matching the character at `i` in `s`.
pub(crate) fn nf_reverseind(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let i = pop_index(&mut args)?;
    let s = pop_str(&mut args)?;
    let n = s.len() as i64;
    Ok(Value::I64(thisind(&s, n - i + 1)?))
}

// ── predicates and transforms ──────────────────────────────────────────────

pub(crate) fn nf_ascii(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let s = pop_str(&mut args)?;
    if let Some(bad) = s.chars().find(|ch| !ch.is_ascii()) {
        return Err(VmError::ArgumentError(format!(
            "invalid ASCII character '{}'",
            bad
        )));
    }
    Ok(Value::Str(s))
}

pub(crate) fn nf_bitstring(vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    let bits = match &x {
        Value::I8(v) => format!("{:08b}", *v as u8),
        Value::I16(v) => format!("{:016b}", *v as u16),
        Value::I32(v) => format!("{:032b}", *v as u32),
        Value::I64(v) => format!("{:064b}", *v as u64),
        Value::I128(v) => format!("{:0128b}", *v as u128),
        Value::U8(v) => format!("{:08b}", v),
        Value::U16(v) => format!("{:016b}", v),
        Value::U32(v) => format!("{:032b}", v),
        Value::U64(v) => format!("{:064b}", v),
        Value::U128(v) => format!("{:0128b}", v),
        Value::Bool(v) => format!("{:08b}", *v as u8),
        Value::F16(v) => format!("{:016b}", v.to_bits()),
        Value::F32(v) => format!("{:032b}", v.to_bits()),
        Value::F64(v) => format!("{:064b}", v.to_bits()),
        Value::Char(v) => format!("{:032b}", *v as u32),
        other => {
            return Err(VmError::MethodError(format!(
                "MethodError: no method matching bitstring(::{})",
                other.type_of().display(&vm.lattice)
            )));
        }
    };
    Ok(Value::Str(bits))
}

pub(crate) fn nf_bytes2hex(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let x = args.pop().ok_or(VmError::StackUnderflow)?;
    let bytes = match &x {
        Value::Bytes(b) => b.clone(),
        Value::Array(arr) => {
            let mut out = Vec::new();
            for v in arr.borrow().iter_values() {
                match v {
                    Value::U8(b) => out.push(b),
                    _ => {
                        return Err(VmError::ArgumentError(
                            "bytes2hex expects a byte vector".to_string(),
                        ));
                    }
                }
            }
            out
        }
        _ => {
            return Err(VmError::ArgumentError(
                "bytes2hex expects a byte vector".to_string(),
            ));
        }
    };
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    Ok(Value::Str(out))
}

pub(crate) fn nf_hex2bytes(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let s = pop_str(&mut args)?;
    if s.len() % 2 != 0 {
        return Err(VmError::ArgumentError(
            "hex2bytes: input length must be even".to_string(),
        ));
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    let bytes = s.as_bytes();
    for pair in bytes.chunks(2) {
        let hi = hex_digit(pair[0])?;
        let lo = hex_digit(pair[1])?;
        out.push(hi * 16 + lo);
    }
    Ok(Value::Bytes(out))
}

fn hex_digit(b: u8) -> Result<u8, VmError> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(VmError::ArgumentError(format!(
            "hex2bytes: invalid hex digit '{}'",
            b as char
        ))),
    }
}

pub(crate) fn nf_uppercase(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    match args.pop().ok_or(VmError::StackUnderflow)? {
        Value::Str(s) => Ok(Value::Str(s.to_uppercase())),
        Value::Char(ch) => Ok(Value::Char(
            ch.to_uppercase().next().unwrap_or(ch),
        )),
        _ => Err(VmError::MethodError(
            "MethodError: no method matching uppercase".to_string(),
        )),
    }
}

pub(crate) fn nf_lowercase(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    match args.pop().ok_or(VmError::StackUnderflow)? {
        Value::Str(s) => Ok(Value::Str(s.to_lowercase())),
        Value::Char(ch) => Ok(Value::Char(
            ch.to_lowercase().next().unwrap_or(ch),
        )),
        _ => Err(VmError::MethodError(
            "MethodError: no method matching lowercase".to_string(),
        )),
    }
}

pub(crate) fn nf_split(_vm: &mut Vm, args: Vec<Value>) -> Result<Value, VmError> {
    split_impl(args)
}

/// Without a split limit, `rsplit` yields the same substrings as `split`
/// (the direction only matters when a limit drops pieces).
pub(crate) fn nf_rsplit(_vm: &mut Vm, args: Vec<Value>) -> Result<Value, VmError> {
    split_impl(args)
}

fn split_impl(mut args: Vec<Value>) -> Result<Value, VmError> {
    let delim = if args.len() == 2 { args.pop() } else { None };
    let s = pop_str(&mut args)?;
    let parts: Vec<String> = match &delim {
        None => s.split_whitespace().map(str::to_string).collect(),
        Some(Value::Str(d)) => s.split(d.as_str()).map(str::to_string).collect(),
        Some(Value::Char(ch)) => s.split(*ch).map(str::to_string).collect(),
        Some(_) => {
            return Err(VmError::ArgumentError(
                "split: delimiter must be a string or character".to_string(),
            ));
        }
    };
    let values: Vec<Value> = parts.into_iter().map(Value::Str).collect();
    Ok(Value::Array(super::value::new_array_ref(
        super::value::ArrayValue::vector(
            crate::types::Ty::Named(crate::types::core_types::STRING),
            values,
        ),
    )))
}

pub(crate) fn nf_unescape_string(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let s = pop_str(&mut args)?;
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('e') => out.push('\x1b'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Ok(Value::Str(out))
}

/// `occursin(needle, haystack)` for strings, chars, and regex patterns.
pub(crate) fn nf_occursin(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let haystack = pop_str(&mut args)?;
    let needle = args.pop().ok_or(VmError::StackUnderflow)?;
    Ok(Value::Bool(match &needle {
        Value::Str(n) => haystack.contains(n.as_str()),
        Value::Char(ch) => haystack.contains(*ch),
        Value::Regex(re) => re.is_match(&haystack),
        _ => {
            return Err(VmError::MethodError(
                "MethodError: no method matching occursin for this pattern".to_string(),
            ));
        }
    }))
}

/// `Regex(pattern)` / `Regex(pattern, flags)` constructor.
pub(crate) fn nf_regex_ctor(_vm: &mut Vm, mut args: Vec<Value>) -> Result<Value, VmError> {
    let (pattern, flags) = match args.len() {
        1 => (args.pop().unwrap(), String::new()),
        2 => {
            let f = args.pop().unwrap();
            let p = args.pop().unwrap();
            let Value::Str(f) = f else {
                return Err(VmError::ArgumentError(
                    "Regex flags must be a string".to_string(),
                ));
            };
            (p, f)
        }
        n => {
            return Err(VmError::MethodError(format!(
                "MethodError: no method matching Regex with {} arguments",
                n
            )));
        }
    };
    let Value::Str(pattern) = pattern else {
        return Err(VmError::ArgumentError(
            "Regex pattern must be a string".to_string(),
        ));
    };
    RegexValue::new(&pattern, &flags)
        .map(Value::Regex)
        .map_err(VmError::ArgumentError)
}

fn pop_str(args: &mut Vec<Value>) -> Result<String, VmError> {
    match args.pop().ok_or(VmError::StackUnderflow)? {
        Value::Str(s) => Ok(s),
        _ => Err(VmError::MethodError(
            "MethodError: expected a String argument".to_string(),
        )),
    }
}

fn pop_index(args: &mut Vec<Value>) -> Result<i64, VmError> {
    args.pop()
        .ok_or(VmError::StackUnderflow)?
        .as_index()
        .ok_or_else(|| VmError::ArgumentError("index must be an integer".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm() -> Vm {
        Vm::new()
    }

    #[test]
    fn test_string_concat_and_render() {
        let mut vm = vm();
        assert_eq!(
            nf_concat(&mut vm, vec![Value::Str("ab".into()), Value::Str("cd".into())]).unwrap(),
            Value::Str("abcd".into())
        );
        assert_eq!(
            nf_string(&mut vm, vec![Value::Str("x = ".into()), Value::I64(3)]).unwrap(),
            Value::Str("x = 3".into())
        );
    }

    #[test]
    fn test_index_navigation_on_multibyte() {
        let mut vm = vm();
        let s = Value::Str("héllo".into()); // h=1, é=2..3, l=4, l=5, o=6
        assert_eq!(
            nf_ncodeunits(&mut vm, vec![s.clone()]).unwrap(),
            Value::I64(6)
        );
        assert_eq!(
            nf_nextind(&mut vm, vec![s.clone(), Value::I64(2)]).unwrap(),
            Value::I64(4)
        );
        assert_eq!(
            nf_prevind(&mut vm, vec![s.clone(), Value::I64(4)]).unwrap(),
            Value::I64(2)
        );
        assert_eq!(
            nf_thisind(&mut vm, vec![s.clone(), Value::I64(3)]).unwrap(),
            Value::I64(2)
        );
        assert_eq!(
            nf_isvalid(&mut vm, vec![s.clone(), Value::I64(3)]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            nf_isvalid(&mut vm, vec![s, Value::I64(2)]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_hex_roundtrip() {
        let mut vm = vm();
        let bytes = Value::Bytes(vec![0xde, 0xad, 0xbe, 0xef]);
        let hex = nf_bytes2hex(&mut vm, vec![bytes.clone()]).unwrap();
        assert_eq!(hex, Value::Str("deadbeef".into()));
        assert_eq!(
            nf_hex2bytes(&mut vm, vec![hex]).unwrap(),
            bytes
        );
        assert!(nf_hex2bytes(&mut vm, vec![Value::Str("xyz".into())]).is_err());
    }

    #[test]
    fn test_split_default_whitespace() {
        let mut vm = vm();
        let result = nf_split(&mut vm, vec![Value::Str("a b  c".into())]).unwrap();
        let Value::Array(arr) = result else {
            panic!("split must return an array")
        };
        let words: Vec<Value> = arr.borrow().to_vec();
        assert_eq!(
            words,
            vec![
                Value::Str("a".into()),
                Value::Str("b".into()),
                Value::Str("c".into())
            ]
        );
    }

    #[test]
    fn test_occursin_with_regex() {
        let mut vm = vm();
        let re = Value::Regex(RegexValue::new("l+o", "").unwrap());
        assert_eq!(
            nf_occursin(&mut vm, vec![re, Value::Str("hello".into())]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            nf_occursin(
                &mut vm,
                vec![Value::Str("xyz".into()), Value::Str("hello".into())]
            )
            .unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_sprint_writes_through_io() {
        let mut vm = vm();
        let print_fn = vm.function_value("print");
        let result = nf_sprint(&mut vm, vec![print_fn, Value::I64(42)]).unwrap();
        assert_eq!(result, Value::Str("42".into()));
    }

    #[test]
    fn test_ascii_rejects_non_ascii() {
        let mut vm = vm();
        assert!(nf_ascii(&mut vm, vec![Value::Str("héllo".into())]).is_err());
        assert_eq!(
            nf_ascii(&mut vm, vec![Value::Str("hello".into())]).unwrap(),
            Value::Str("hello".into())
        );
    }

    #[test]
    fn test_unescape_string() {
        let mut vm = vm();
        assert_eq!(
            nf_unescape_string(&mut vm, vec![Value::Str("a\\nb\\t".into())]).unwrap(),
            Value::Str("a\nb\t".into())
        );
    }

    #[test]
    fn test_bitstring_widths() {
        let mut vm = vm();
        assert_eq!(
            nf_bitstring(&mut vm, vec![Value::U8(5)]).unwrap(),
            Value::Str("00000101".into())
        );
        let Value::Str(s) = nf_bitstring(&mut vm, vec![Value::I64(1)]).unwrap() else {
            panic!()
        };
        assert_eq!(s.len(), 64);
    }
}
