//! Tests for multiple dispatch through the full interpreter: user methods,
//! builtin shadowing, specialised-opcode fallback, and where-clause
//! bindings.

mod common;

use common::{assert_approx, complex_i64, fresh_vm};

use subset_julia_vm_core::core_types as c;
use subset_julia_vm_core::types::Field;
use subset_julia_vm_core::{Instr, ProgramBuilder, Ty, TypeParam, Value, VmError};

/// Scenario: abstract `Shape` with concrete `Circle(r)` / `Rectangle(w,h)`
/// and an `area` generic function dispatching on each.
#[test]
fn test_area_dispatches_on_concrete_shape() {
    let mut vm = fresh_vm();
    let shape = vm.register_abstract("Shape", c::ANY).unwrap();
    let circle = vm
        .register_type(
            "Circle",
            shape,
            vec![Field {
                name: "r".to_string(),
                ty: Ty::Named(c::FLOAT64),
            }],
            false,
            Vec::new(),
        )
        .unwrap();
    let rectangle = vm
        .register_type(
            "Rectangle",
            shape,
            vec![
                Field {
                    name: "w".to_string(),
                    ty: Ty::Named(c::FLOAT64),
                },
                Field {
                    name: "h".to_string(),
                    ty: Ty::Named(c::FLOAT64),
                },
            ],
            false,
            Vec::new(),
        )
        .unwrap();

    let mut pb = ProgramBuilder::new();
    let pi = pb.constant(Value::F64(std::f64::consts::PI));
    // area(c::Circle) = pi * c.r * c.r
    pb.function("area").param("c", Ty::Named(circle)).register(vec![
        Instr::LoadConst(pi),
        Instr::LoadLocal("c".to_string()),
        Instr::GetField(0),
        Instr::CallDyn("*".to_string(), 2),
        Instr::LoadLocal("c".to_string()),
        Instr::GetField(0),
        Instr::CallDyn("*".to_string(), 2),
        Instr::Return,
    ]);
    // area(r::Rectangle) = r.w * r.h
    pb.function("area")
        .param("r", Ty::Named(rectangle))
        .register(vec![
            Instr::LoadLocal("r".to_string()),
            Instr::GetField(0),
            Instr::LoadLocal("r".to_string()),
            Instr::GetField(1),
            Instr::CallDyn("*".to_string(), 2),
            Instr::Return,
        ]);
    let two = pb.constant(Value::F64(2.0));
    pb.entry(vec![
        Instr::LoadGlobal("Circle".to_string()),
        Instr::LoadConst(two),
        Instr::Call(1),
        Instr::CallDyn("area".to_string(), 1),
        Instr::Return,
    ]);

    let result = vm.run(pb.finish()).unwrap();
    assert_approx(&result, 12.566370614359172);

    // area(Rectangle(3.0, 4.0)) == 12.0 through the call surface
    let rect = vm
        .call("Rectangle", vec![Value::F64(3.0), Value::F64(4.0)])
        .unwrap();
    let area = vm.call("area", vec![rect]).unwrap();
    assert_eq!(area, Value::F64(12.0));
}

/// Scenario: `double(x::Number) = x + x` reached through a specialised
/// opcode still handles a BigInt (the hint falls back to dispatch).
#[test]
fn test_double_of_big_int_through_add_hint() {
    let mut vm = fresh_vm();
    let mut pb = ProgramBuilder::new();
    // The body uses AddI64: statically "Int-looking", dynamically a BigInt.
    pb.function("double")
        .param("x", Ty::Named(c::NUMBER))
        .register(vec![
            Instr::LoadLocal("x".to_string()),
            Instr::LoadLocal("x".to_string()),
            Instr::AddI64,
            Instr::Return,
        ]);
    pb.entry(vec![]);
    vm.run(pb.finish()).unwrap();

    let result = vm.call("double", vec![Value::new_bigint(21)]).unwrap();
    assert_eq!(result, Value::new_bigint(42));
    assert_eq!(
        vm.call("typeof", vec![result]).unwrap(),
        Value::DataType(Ty::Named(c::BIGINT))
    );

    // The same body still takes the fast path for machine ints
    assert_eq!(
        vm.call("double", vec![Value::I64(21)]).unwrap(),
        Value::I64(42)
    );
}

/// Scenario: a user-registered `+(a::Point, b::Point)` is honoured from
/// every call site, including the specialised opcode path.
#[test]
fn test_user_defined_operator_method_on_point() {
    let mut vm = fresh_vm();
    let point = vm
        .register_type(
            "Point",
            c::ANY,
            vec![
                Field {
                    name: "x".to_string(),
                    ty: Ty::Named(c::INT64),
                },
                Field {
                    name: "y".to_string(),
                    ty: Ty::Named(c::INT64),
                },
            ],
            false,
            Vec::new(),
        )
        .unwrap();

    let mut pb = ProgramBuilder::new();
    pb.function("+")
        .param("a", Ty::Named(point))
        .param("b", Ty::Named(point))
        .register(vec![
            Instr::LoadLocal("a".to_string()),
            Instr::GetField(0),
            Instr::LoadLocal("b".to_string()),
            Instr::GetField(0),
            Instr::CallDyn("+".to_string(), 2),
            Instr::LoadLocal("a".to_string()),
            Instr::GetField(1),
            Instr::LoadLocal("b".to_string()),
            Instr::GetField(1),
            Instr::CallDyn("+".to_string(), 2),
            Instr::NewStruct("Point".to_string(), 2),
            Instr::Return,
        ]);
    // Entry: Point(1,2) + Point(3,4) through the AddI64 hint — the hint
    // must fall back to dispatch and find the user method.
    let one = pb.constant(Value::I64(1));
    let two = pb.constant(Value::I64(2));
    let three = pb.constant(Value::I64(3));
    let four = pb.constant(Value::I64(4));
    pb.entry(vec![
        Instr::LoadConst(one),
        Instr::LoadConst(two),
        Instr::NewStruct("Point".to_string(), 2),
        Instr::LoadConst(three),
        Instr::LoadConst(four),
        Instr::NewStruct("Point".to_string(), 2),
        Instr::AddI64,
        Instr::Return,
    ]);

    let result = vm.run(pb.finish()).unwrap();
    match &result {
        Value::Struct(s) => {
            assert_eq!(s.values, vec![Value::I64(4), Value::I64(6)]);
        }
        other => panic!("expected Point, got {:?}", other),
    }
}

/// No applicable method raises MethodError; incomparable maxima raise
/// AmbiguityError; a more specific method resolves it.
#[test]
fn test_method_and_ambiguity_errors_through_vm() {
    let mut vm = fresh_vm();
    let mut pb = ProgramBuilder::new();
    pb.function("f")
        .param("x", Ty::Named(c::INT64))
        .param("y", Ty::Named(c::NUMBER))
        .register(vec![Instr::LoadLocal("x".to_string()), Instr::Return]);
    pb.function("f")
        .param("x", Ty::Named(c::NUMBER))
        .param("y", Ty::Named(c::INT64))
        .register(vec![Instr::LoadLocal("y".to_string()), Instr::Return]);
    pb.entry(vec![]);
    vm.run(pb.finish()).unwrap();

    let err = vm
        .call("f", vec![Value::I64(1), Value::I64(2)])
        .unwrap_err();
    assert!(matches!(err, VmError::AmbiguityError(_)), "got {:?}", err);

    let err = vm
        .call("f", vec![Value::Str("a".into()), Value::Str("b".into())])
        .unwrap_err();
    assert!(matches!(err, VmError::MethodError(_)), "got {:?}", err);

    // (Float64, Int64) applies only to the second method
    assert_eq!(
        vm.call("f", vec![Value::F64(1.0), Value::I64(2)]).unwrap(),
        Value::I64(2)
    );
}

/// Where-clause bindings are installed in the callee frame: the body reads
/// `T` as a type object.
#[test]
fn test_where_clause_binding_visible_in_body() {
    let mut vm = fresh_vm();
    let mut pb = ProgramBuilder::new();
    // eltype_of(z::Complex{T}) where T<:Real = T
    pb.function("eltype_of")
        .param(
            "z",
            Ty::Applied(
                c::COMPLEX,
                vec![subset_julia_vm_core::TyArg::Ty(Ty::Var("T".to_string()))],
            ),
        )
        .type_param(TypeParam::with_bound("T", Ty::Named(c::REAL)))
        .register(vec![Instr::LoadLocal("T".to_string()), Instr::Return]);
    pb.entry(vec![]);
    vm.run(pb.finish()).unwrap();

    let result = vm.call("eltype_of", vec![complex_i64(1, 2)]).unwrap();
    assert_eq!(result, Value::DataType(Ty::Named(c::INT64)));

    // A Complex{String} cannot exist, but a bound violation surfaces as a
    // MethodError for arguments outside the quantified region.
    let err = vm.call("eltype_of", vec![Value::I64(1)]).unwrap_err();
    assert!(matches!(err, VmError::MethodError(_)));
}

/// Last writer wins: re-registering an identical signature replaces the
/// body, and the dispatch cache does not serve the stale method.
#[test]
fn test_method_replacement_is_visible_to_later_calls() {
    let mut vm = fresh_vm();
    let mut pb = ProgramBuilder::new();
    let k1 = pb.constant(Value::I64(1));
    pb.function("answer")
        .param("x", Ty::Named(c::INT64))
        .register(vec![Instr::LoadConst(k1), Instr::Return]);
    pb.entry(vec![]);
    vm.run(pb.finish()).unwrap();
    assert_eq!(vm.call("answer", vec![Value::I64(0)]).unwrap(), Value::I64(1));

    let mut pb = ProgramBuilder::new();
    let k2 = pb.constant(Value::I64(2));
    pb.function("answer")
        .param("x", Ty::Named(c::INT64))
        .register(vec![Instr::LoadConst(k2), Instr::Return]);
    pb.entry(vec![]);
    vm.run(pb.finish()).unwrap();
    assert_eq!(vm.call("answer", vec![Value::I64(0)]).unwrap(), Value::I64(2));
}
