//! Builtin registration.
//!
//! Every native operation is registered in the method table as if it were
//! user-defined, so user overloads with more specific signatures shadow the
//! natives transparently — including the operators reached through
//! specialised opcodes.

use crate::types::{core_types as c, Ty};

use super::broadcast::nf_broadcast;
use super::builtins_collections as coll;
use super::builtins_conversion as conv;
use super::builtins_equality as eq;
use super::builtins_numeric as num;
use super::builtins_reflection as refl;
use super::builtins_strings as strs;
use super::Vm;

fn any() -> Ty {
    Ty::any()
}

fn number() -> Ty {
    Ty::Named(c::NUMBER)
}

fn integer() -> Ty {
    Ty::Named(c::INTEGER)
}

fn type_ty() -> Ty {
    Ty::Named(c::TYPE)
}

fn stringy() -> Ty {
    Ty::Named(c::ABSTRACT_STRING)
}

fn text_like() -> Ty {
    Ty::Union(vec![
        Ty::Named(c::ABSTRACT_STRING),
        Ty::Named(c::ABSTRACT_CHAR),
    ])
}

fn func() -> Ty {
    Ty::Named(c::FUNCTION)
}

/// Install every builtin into the VM's method registry.
pub(crate) fn install(vm: &mut Vm) {
    let reg = &mut vm.registry;

    // ── arithmetic ──────────────────────────────────────────────────────
    let missing_or_number = || {
        Ty::Union(vec![Ty::Named(c::NUMBER), Ty::Named(c::MISSING)])
    };
    reg.add_native("+", vec![missing_or_number(), missing_or_number()], num::nf_add);
    reg.add_native("+", vec![number(), number()], num::nf_add);
    reg.add_native("+", vec![number()], num::nf_unary_plus);
    reg.add_native("-", vec![missing_or_number(), missing_or_number()], num::nf_sub);
    reg.add_native("-", vec![number(), number()], num::nf_sub);
    reg.add_native("-", vec![number()], num::nf_neg);
    reg.add_native("*", vec![missing_or_number(), missing_or_number()], num::nf_mul);
    reg.add_native("*", vec![number(), number()], num::nf_mul);
    reg.add_native("*", vec![text_like(), text_like()], strs::nf_concat);
    reg.add_native("/", vec![missing_or_number(), missing_or_number()], num::nf_div);
    reg.add_native("/", vec![number(), number()], num::nf_div);
    reg.add_native("\\", vec![number(), number()], num::nf_backslash);
    reg.add_native("÷", vec![number(), number()], num::nf_intdiv);
    reg.add_native("div", vec![number(), number()], num::nf_intdiv);
    reg.add_native("%", vec![number(), number()], num::nf_percent);
    reg.add_native("rem", vec![number(), number()], num::nf_rem);
    reg.add_native("mod", vec![number(), number()], num::nf_mod);
    reg.add_native("^", vec![number(), number()], num::nf_pow);
    reg.add_native("fld", vec![number(), number()], num::nf_fld);
    reg.add_native("cld", vec![number(), number()], num::nf_cld);
    reg.add_native("fldmod", vec![number(), number()], num::nf_fldmod);
    reg.add_native("mod1", vec![number(), number()], num::nf_mod1);
    reg.add_native("fld1", vec![number(), number()], num::nf_fld1);
    reg.add_native("fldmod1", vec![number(), number()], num::nf_fldmod1);
    reg.add_native("gcd", vec![integer(), integer()], num::nf_gcd);
    reg.add_native("lcm", vec![integer(), integer()], num::nf_lcm);
    reg.add_native("gcdx", vec![integer(), integer()], num::nf_gcdx);
    reg.add_native(
        "powermod",
        vec![integer(), integer(), integer()],
        num::nf_powermod,
    );
    reg.add_native("invmod", vec![integer(), integer()], num::nf_invmod);
    reg.add_native("//", vec![integer(), integer()], num::nf_rational);
    reg.add_native("//", vec![Ty::Named(c::RATIONAL), integer()], num::nf_rational);
    reg.add_native("abs", vec![number()], num::nf_abs);
    reg.add_native("big", vec![number()], num::nf_big);
    reg.add_native("Complex", vec![number()], num::nf_complex);
    reg.add_native("Complex", vec![number(), number()], num::nf_complex);
    reg.add_native("complex", vec![number()], num::nf_complex);
    reg.add_native("complex", vec![number(), number()], num::nf_complex);

    // ── comparison ──────────────────────────────────────────────────────
    reg.add_native("==", vec![any(), any()], eq::nf_eq);
    reg.add_native("!=", vec![any(), any()], eq::nf_ne);
    reg.add_native("<", vec![any(), any()], eq::nf_lt);
    reg.add_native("<=", vec![any(), any()], eq::nf_le);
    reg.add_native(">", vec![any(), any()], eq::nf_gt);
    reg.add_native(">=", vec![any(), any()], eq::nf_ge);
    reg.add_native("===", vec![any(), any()], eq::nf_egal);
    reg.add_native("!==", vec![any(), any()], eq::nf_negal);

    // ── introspection ───────────────────────────────────────────────────
    reg.add_native("typeof", vec![any()], refl::nf_typeof);
    reg.add_native("isa", vec![any(), type_ty()], refl::nf_isa);
    reg.add_native("<:", vec![type_ty(), type_ty()], refl::nf_subtype);
    reg.add_native("fieldnames", vec![type_ty()], refl::nf_fieldnames);
    reg.add_native("fieldtypes", vec![type_ty()], refl::nf_fieldtypes);
    reg.add_native("nfields", vec![any()], refl::nf_nfields);
    reg.add_native("typemin", vec![type_ty()], refl::nf_typemin);
    reg.add_native("typemax", vec![type_ty()], refl::nf_typemax);
    reg.add_native("zero", vec![any()], refl::nf_zero);
    reg.add_native("one", vec![any()], refl::nf_one);
    reg.add_native("oneunit", vec![any()], refl::nf_oneunit);
    reg.add_native("eps", vec![], refl::nf_eps);
    reg.add_native("eps", vec![any()], refl::nf_eps);
    reg.add_native("precision", vec![any()], refl::nf_precision);
    reg.add_native("rounding", vec![], refl::nf_rounding);
    reg.add_native("rounding", vec![type_ty()], refl::nf_rounding);
    reg.add_native("setprecision", vec![integer()], refl::nf_setprecision);
    reg.add_native(
        "setprecision",
        vec![type_ty(), integer()],
        refl::nf_setprecision,
    );
    reg.add_native(
        "setrounding",
        vec![Ty::Named(c::SYMBOL)],
        refl::nf_setrounding,
    );
    reg.add_native(
        "setrounding",
        vec![type_ty(), Ty::Named(c::SYMBOL)],
        refl::nf_setrounding,
    );
    reg.add_native("nonmissingtype", vec![type_ty()], refl::nf_nonmissingtype);

    // ── numeric predicates ──────────────────────────────────────────────
    reg.add_native("isinf", vec![number()], num::nf_isinf);
    reg.add_native("isnan", vec![number()], num::nf_isnan);
    reg.add_native("isfinite", vec![number()], num::nf_isfinite);
    reg.add_native("iszero", vec![number()], num::nf_iszero);
    reg.add_native("isone", vec![number()], num::nf_isone);
    reg.add_native("signbit", vec![number()], num::nf_signbit);
    reg.add_native("iseven", vec![integer()], num::nf_iseven);
    reg.add_native("isodd", vec![integer()], num::nf_isodd);
    reg.add_native("ispow2", vec![integer()], num::nf_ispow2);

    // ── conversion ──────────────────────────────────────────────────────
    reg.add_native("convert", vec![type_ty(), any()], conv::nf_convert);
    reg.add_native(
        "promote_type",
        vec![type_ty(), type_ty()],
        conv::nf_promote_type,
    );
    reg.add_native(
        "promote_rule",
        vec![type_ty(), type_ty()],
        conv::nf_promote_rule_base,
    );
    reg.add_native("parse", vec![type_ty(), stringy()], conv::nf_parse);
    reg.add_native("tryparse", vec![type_ty(), stringy()], conv::nf_tryparse);

    // ── containers ──────────────────────────────────────────────────────
    reg.add_native("length", vec![any()], coll::nf_length);
    reg.add_native("size", vec![any()], coll::nf_size);
    reg.add_native("size", vec![any(), integer()], coll::nf_size);
    reg.add_native("ndims", vec![any()], coll::nf_ndims);
    reg.add_native("stride", vec![any(), integer()], coll::nf_stride);
    reg.add_native("strides", vec![any()], coll::nf_strides);
    reg.add_native("push!", vec![any(), any()], coll::nf_push);
    reg.add_native("pop!", vec![any()], coll::nf_pop);
    reg.add_native("copy", vec![any()], coll::nf_copy);
    reg.add_native("fill!", vec![any(), any()], coll::nf_fill);
    reg.add_native("getindex", vec![any(), any()], coll::nf_getindex);
    reg.add_native("getindex", vec![any(), any(), any()], coll::nf_getindex);
    reg.add_native("setindex!", vec![any(), any(), any()], coll::nf_setindex);
    reg.add_native(
        "setindex!",
        vec![any(), any(), any(), any()],
        coll::nf_setindex,
    );
    reg.add_native("view", vec![any(), any()], coll::nf_view);
    reg.add_native("collect", vec![any()], coll::nf_collect);
    reg.add_native("sum", vec![any()], coll::nf_sum);
    reg.add_native("sum", vec![func(), any()], coll::nf_sum);
    reg.add_native("prod", vec![any()], coll::nf_prod);
    reg.add_native("prod", vec![func(), any()], coll::nf_prod);
    reg.add_native("any", vec![any()], coll::nf_any);
    reg.add_native("any", vec![func(), any()], coll::nf_any);
    reg.add_native("all", vec![any()], coll::nf_all);
    reg.add_native("all", vec![func(), any()], coll::nf_all);
    reg.add_native("map", vec![func(), any()], coll::nf_map);
    reg.add_native("map", vec![func(), any(), any()], coll::nf_map);
    reg.add_native("first", vec![any()], coll::nf_first);
    reg.add_native("last", vec![any()], coll::nf_last);
    reg.add_native("in", vec![any(), any()], coll::nf_in);
    reg.add_native("Set", vec![], coll::nf_set_ctor);
    reg.add_native("Set", vec![any()], coll::nf_set_ctor);
    reg.add_native(":", vec![integer(), integer()], coll::nf_colon);
    reg.add_native(":", vec![integer(), integer(), integer()], coll::nf_colon);
    reg.add_native("keys", vec![any()], coll::nf_keys);
    reg.add_native("values", vec![any()], coll::nf_values);
    reg.add_native("=>", vec![any(), any()], coll::nf_pair);
    reg.add_native("Pair", vec![any(), any()], coll::nf_pair);
    reg.add_native("Generator", vec![any(), any()], coll::nf_generator);

    // ── broadcast ───────────────────────────────────────────────────────
    for arity in 1..=4 {
        let mut sig = vec![any()];
        sig.extend(std::iter::repeat(any()).take(arity - 1));
        reg.add_native("broadcast", sig, nf_broadcast);
    }

    // ── strings ─────────────────────────────────────────────────────────
    for arity in 0..=5 {
        reg.add_native("string", vec![any(); arity], strs::nf_string);
    }
    reg.add_native("repr", vec![any()], strs::nf_repr);
    for arity in 1..=3 {
        let mut sig = vec![func()];
        sig.extend(std::iter::repeat(any()).take(arity - 1));
        reg.add_native("sprint", sig, strs::nf_sprint);
    }
    for arity in 0..=4 {
        reg.add_native("print", vec![any(); arity], strs::nf_print);
        reg.add_native("println", vec![any(); arity], strs::nf_println);
    }
    reg.add_native("IOContext", vec![any(), any()], strs::nf_iocontext);
    reg.add_native("ncodeunits", vec![stringy()], strs::nf_ncodeunits);
    reg.add_native("codeunit", vec![stringy(), integer()], strs::nf_codeunit);
    reg.add_native("codeunits", vec![stringy()], strs::nf_codeunits);
    reg.add_native("nextind", vec![stringy(), integer()], strs::nf_nextind);
    reg.add_native("prevind", vec![stringy(), integer()], strs::nf_prevind);
    reg.add_native("thisind", vec![stringy(), integer()], strs::nf_thisind);
    reg.add_native("isvalid", vec![stringy(), integer()], strs::nf_isvalid);
    reg.add_native("reverseind", vec![stringy(), integer()], strs::nf_reverseind);
    reg.add_native("ascii", vec![stringy()], strs::nf_ascii);
    reg.add_native("bitstring", vec![any()], strs::nf_bitstring);
    reg.add_native("bytes2hex", vec![any()], strs::nf_bytes2hex);
    reg.add_native("hex2bytes", vec![stringy()], strs::nf_hex2bytes);
    reg.add_native("uppercase", vec![text_like()], strs::nf_uppercase);
    reg.add_native("lowercase", vec![text_like()], strs::nf_lowercase);
    reg.add_native("split", vec![stringy()], strs::nf_split);
    reg.add_native("split", vec![stringy(), any()], strs::nf_split);
    reg.add_native("rsplit", vec![stringy()], strs::nf_rsplit);
    reg.add_native("rsplit", vec![stringy(), any()], strs::nf_rsplit);
    reg.add_native("unescape_string", vec![stringy()], strs::nf_unescape_string);
    reg.add_native("occursin", vec![any(), stringy()], strs::nf_occursin);
    reg.add_native("Regex", vec![stringy()], strs::nf_regex_ctor);
    reg.add_native("Regex", vec![stringy(), stringy()], strs::nf_regex_ctor);

    // ── error raising and exception constructors ────────────────────────
    reg.add_native("throw", vec![any()], refl::nf_throw);
    for arity in 1..=3 {
        reg.add_native("error", vec![any(); arity], refl::nf_error);
    }
    reg.add_native("ErrorException", vec![any()], refl::nf_error_exception);
    reg.add_native("ArgumentError", vec![any()], refl::nf_argument_error);
    reg.add_native("AssertionError", vec![any()], refl::nf_assertion_error);
    reg.add_native("KeyError", vec![any()], refl::nf_key_error);
    reg.add_native("DivideError", vec![], refl::nf_divide_error);
    reg.add_native("BoundsError", vec![], refl::nf_bounds_error);
    reg.add_native("BoundsError", vec![any()], refl::nf_bounds_error);
    reg.add_native("BoundsError", vec![any(), any()], refl::nf_bounds_error);
    reg.add_native("MethodError", vec![any()], refl::nf_method_error_ctor);
    reg.add_native("MethodError", vec![any(), any()], refl::nf_method_error_ctor);
    reg.add_native("EOFError", vec![], refl::nf_eof_error);
    reg.add_native("DomainError", vec![any()], refl::nf_domain_error);
    reg.add_native("DomainError", vec![any(), any()], refl::nf_domain_error);
}
