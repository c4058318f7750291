use std::path::PathBuf;

use axon_compiler::{Compilation, CompileOptions, Compiler, SourceFile, SourceId, Type};

fn compile(source: &str) -> (Option<Compilation>, Vec<String>) {
    let file = SourceFile::new(SourceId(0), PathBuf::from("test.ax"), source.to_string());
    let mut compiler = Compiler::new(CompileOptions::default());
    let result = compiler.compile(&file).ok();
    let messages = compiler
        .diagnostics()
        .entries()
        .iter()
        .map(|diagnostic| diagnostic.message.clone())
        .collect();
    (result, messages)
}

fn assert_clean(source: &str) -> Compilation {
    let (result, messages) = compile(source);
    match result {
        Some(compilation) => {
            assert!(messages.is_empty(), "unexpected diagnostics: {messages:?}");
            compilation
        }
        None => panic!("compilation failed: {messages:?}"),
    }
}

fn assert_error(source: &str, fragment: &str) {
    let (result, messages) = compile(source);
    assert!(result.is_none(), "expected compilation to fail");
    assert!(
        messages.iter().any(|message| message.contains(fragment)),
        "missing '{fragment}' in {messages:?}"
    );
}

#[test]
fn accepts_a_simple_function() {
    assert_clean("fn add(a: i32, b: i32) -> i32:\n    return a + b\n");
}

#[test]
fn rejects_assignment_to_immutable_binding() {
    assert_error(
        "fn test():\n    let x = 10\n    x = 20\n",
        "Cannot assign to immutable variable 'x'",
    );
}

#[test]
fn var_bindings_are_mutable() {
    assert_clean("fn test():\n    var x = 10\n    x = 20\n");
}

#[test]
fn rejects_break_outside_loop() {
    assert_error("fn test():\n    break\n", "'break' outside of loop");
}

#[test]
fn rejects_continue_outside_loop() {
    assert_error("fn test():\n    continue\n", "'continue' outside of loop");
}

#[test]
fn allows_break_inside_while() {
    assert_clean("fn test():\n    while true:\n        break\n");
}

#[test]
fn registers_enum_variant_constructors() {
    let compilation = assert_clean("enum Color:\n    Red\n    Green\n    RGB(i32, i32, i32)\n");
    let symbols = compilation.checker.symbols();

    assert!(symbols.lookup("Color::Red").is_some());
    assert!(symbols.lookup("Color::Green").is_some());

    let rgb = symbols.lookup("Color::RGB").expect("RGB constructor");
    match &rgb.ty {
        Type::Function { params, ret, .. } => {
            assert_eq!(params.as_slice(), &[Type::I32, Type::I32, Type::I32]);
            assert_eq!(**ret, Type::Enum("Color".to_string()));
        }
        other => panic!("expected constructor function type, got {other}"),
    }
}

#[test]
fn enum_constructors_are_callable_by_qualified_name() {
    assert_clean(
        "enum Color:\n    Red\n    RGB(i32, i32, i32)\n\nfn main():\n    let c = Color::RGB(1, 2, 3)\n",
    );
}

#[test]
fn rejects_missing_return_value() {
    assert_error(
        "fn answer() -> i64:\n    let x = 1\n",
        "Function 'answer' must return a value",
    );
}

#[test]
fn void_functions_need_no_return() {
    assert_clean("fn log():\n    let x = 1\n");
}

#[test]
fn rejects_return_type_mismatch() {
    assert_error(
        "fn answer() -> i64:\n    return true\n",
        "Type mismatch: expected i64, got bool",
    );
}

#[test]
fn rejects_bare_return_in_value_function() {
    assert_error(
        "fn answer() -> i64:\n    return\n",
        "Expected return value of type i64",
    );
}

#[test]
fn comprehension_names_resolve_inside_their_scope() {
    assert_error(
        "fn f() -> List[i64]:\n    return [x for x in range(0, 3) if not valid]\n",
        "Undefined symbol 'valid'",
    );
}

#[test]
fn rejects_non_bool_condition() {
    assert_error("fn f():\n    if 1:\n        return\n", "Condition must be bool");
}

#[test]
fn rejects_non_bool_while_condition() {
    assert_error("fn f():\n    while 1:\n        return\n", "Condition must be bool");
}

#[test]
fn rejects_undefined_symbol() {
    assert_error("fn f() -> i64:\n    return missing\n", "Undefined symbol 'missing'");
}

#[test]
fn rejects_redefinition_in_same_scope() {
    assert_error(
        "fn f():\n    let x = 1\n    let x = 2\n",
        "Redefinition of 'x'",
    );
}

#[test]
fn allows_shadowing_in_nested_block() {
    assert_clean("fn f():\n    let x = 1\n    if true:\n        let x = 2\n");
}

#[test]
fn rejects_duplicate_function_names() {
    assert_error(
        "fn f():\n    return\n\nfn f():\n    return\n",
        "Redefinition of 'f'",
    );
}

#[test]
fn rejects_arity_mismatch() {
    assert_error(
        "fn inc(x: i64) -> i64:\n    return x + 1\n\nfn main():\n    inc(1, 2)\n",
        "Expected 1 arguments, got 2",
    );
}

#[test]
fn rejects_argument_type_mismatch() {
    assert_error(
        "fn inc(x: i64) -> i64:\n    return x + 1\n\nfn main():\n    inc(true)\n",
        "Type mismatch: expected i64, got bool",
    );
}

#[test]
fn rejects_calling_a_non_function() {
    assert_error(
        "fn main():\n    let x = 1\n    x()\n",
        "Cannot call non-function type",
    );
}

#[test]
fn integer_widening_is_permitted() {
    assert_clean(
        "fn wide(x: i64) -> i64:\n    return x\n\nfn main() -> i64:\n    let a: i32 = 1\n    return wide(a)\n",
    );
}

#[test]
fn int_to_float_is_permitted() {
    assert_clean("fn half(x: f64) -> f64:\n    return x\n\nfn main() -> f64:\n    return half(2)\n");
}

#[test]
fn float_to_int_is_rejected() {
    assert_error(
        "fn trunc(x: i64) -> i64:\n    return x\n\nfn main() -> i64:\n    return trunc(2.5)\n",
        "Type mismatch: expected i64, got f64",
    );
}

#[test]
fn optional_accepts_the_inner_type() {
    assert_clean(
        "fn find(x: Optional[i64]):\n    let y = x\n\nfn main():\n    find(5)\n    find(None)\n",
    );
}

#[test]
fn none_literal_infers_into_optional_annotation() {
    assert_clean("fn f():\n    let x: Optional[i64] = None\n");
}

#[test]
fn empty_list_unifies_with_annotation() {
    assert_clean("fn f():\n    let xs: List[i64] = []\n");
}

#[test]
fn rejects_mismatched_annotation() {
    assert_error(
        "fn f():\n    let flag: bool = 1\n",
        "Type mismatch: expected bool, got i64",
    );
}

#[test]
fn rejects_binding_without_type_or_initializer() {
    assert_error("fn f():\n    let x\n", "Cannot determine type of 'x'");
}

#[test]
fn for_binds_list_element_type() {
    assert_clean("fn f():\n    for x in [1, 2, 3]:\n        let y: i64 = x\n");
}

#[test]
fn for_over_range_binds_i64() {
    assert_clean("fn f():\n    for i in 0..10:\n        let y: i64 = i\n");
}

#[test]
fn range_bounds_must_be_integers() {
    assert_error(
        "fn f():\n    for i in 1.5..3:\n        break\n",
        "Range start must be integer",
    );
}

#[test]
fn struct_fields_resolve_through_members() {
    assert_clean(
        "struct Point:\n    x: i64\n    y: i64\n\nfn get_x(p: Point) -> i64:\n    return p.x\n",
    );
}

#[test]
fn rejects_unknown_struct_field() {
    assert_error(
        "struct Point:\n    x: i64\n\nfn get_z(p: Point) -> i64:\n    return p.z\n",
        "Struct 'Point' has no field 'z'",
    );
}

#[test]
fn rejects_duplicate_struct_fields() {
    assert_error(
        "struct Point:\n    x: i64\n    x: i64\n",
        "Duplicate field 'x' in struct 'Point'",
    );
}

#[test]
fn forward_type_references_resolve_through_hoisting() {
    // The name is registered in pass 1, so an earlier declaration may
    // reference the type; its fields only exist once pass 2 reaches the body.
    assert_clean(
        "fn make(w: Wheel) -> Wheel:\n    return w\n\nstruct Wheel:\n    radius: i64\n",
    );
}

#[test]
fn class_fields_resolve_through_members() {
    assert_clean(
        "class Animal:\n    age: i64\n\nfn get_age(a: Animal) -> i64:\n    return a.age\n",
    );
}

#[test]
fn type_alias_resolves_to_target() {
    assert_clean("type Id = i64\n\nfn f(x: Id) -> i64:\n    return x\n");
}

#[test]
fn match_guard_must_be_bool() {
    assert_error(
        "fn f(x: i64):\n    match x:\n        case 1 if 2:\n            return\n",
        "Match guard must be bool",
    );
}

#[test]
fn list_comprehension_condition_must_be_bool() {
    assert_error(
        "fn f():\n    let xs = [x for x in range(0, 3) if 1]\n",
        "Comprehension condition must be bool",
    );
}

#[test]
fn list_comprehension_yields_a_list() {
    assert_clean("fn f():\n    let xs: List[i64] = [x * 2 for x in range(0, 3)]\n");
}

#[test]
fn tuple_indexing_uses_the_first_element_type() {
    assert_clean("fn f() -> i64:\n    let t = (1, true)\n    return t[0]\n");
}

#[test]
fn string_indexing_yields_char() {
    assert_clean("fn f(s: str) -> char:\n    return s[0]\n");
}

#[test]
fn slicing_preserves_the_container() {
    assert_clean(
        "fn f(xs: List[i64], s: str):\n    let a: List[i64] = xs[1:2]\n    let b: str = s[1:]\n",
    );
}

#[test]
fn rejects_invalid_assignment_target() {
    assert_error("fn f():\n    1 = 2\n", "Invalid assignment target");
}

#[test]
fn params_are_immutable_unless_marked_mut() {
    assert_error(
        "fn f(x: i64):\n    x = 1\n",
        "Cannot assign to immutable variable 'x'",
    );
    assert_clean("fn f(mut x: i64):\n    x = 1\n");
}

#[test]
fn logical_operands_must_be_bool() {
    assert_error(
        "fn f(a: bool) -> bool:\n    return a and 1\n",
        "Right operand must be bool",
    );
}

#[test]
fn bitwise_operands_must_be_integers() {
    assert_error(
        "fn f(a: i64) -> i64:\n    return a & 1.5\n",
        "Right operand must be integer",
    );
}

#[test]
fn arithmetic_operands_must_be_numeric() {
    assert_error(
        "fn f(a: i64) -> i64:\n    return a + \"one\"\n",
        "Right operand must be numeric",
    );
}

#[test]
fn mixed_arithmetic_widens_to_float() {
    assert_clean("fn f(a: i64, b: f64) -> f64:\n    return a + b\n");
}

#[test]
fn builtins_are_preinstalled() {
    assert_clean(
        "fn f():\n    print(\"hi\")\n    let n: i64 = len(\"abc\")\n    for i in range(0, 3):\n        print(i)\n",
    );
}

#[test]
fn await_and_spawn_pass_the_operand_type_through() {
    assert_clean(
        "async fn fetch() -> i64:\n    return 1\n\nasync fn run() -> i64:\n    let x = spawn fetch()\n    return await fetch()\n",
    );
}

#[test]
fn yield_operand_names_must_resolve() {
    assert_error(
        "fn gen():\n    yield missing\n",
        "Undefined symbol 'missing'",
    );
}

#[test]
fn lambdas_infer_function_types() {
    assert_clean("fn f():\n    let double: fn(i64) -> i64 = |x: i64| x * 2\n");
}

#[test]
fn lambda_return_annotation_is_enforced() {
    assert_error(
        "fn f():\n    let odd = |x: i64| -> bool x + 1\n",
        "Type mismatch: expected bool, got i64",
    );
}

#[test]
fn trait_default_bodies_are_checked() {
    assert_clean("trait Shape:\n    fn area(self) -> f64:\n        return 0.0\n");
}

#[test]
fn impl_methods_are_checked() {
    assert_error(
        "struct Circle:\n    r: f64\n\nimpl Circle:\n    fn area(self) -> f64:\n        return missing\n",
        "Undefined symbol 'missing'",
    );
}

#[test]
fn imports_are_accepted_without_resolution() {
    assert_clean("import std.math as m\nfrom std.io import read\n\nfn f():\n    return\n");
}

#[test]
fn generic_functions_check_with_opaque_parameters() {
    assert_clean("fn first[T](a: T, b: T) -> T:\n    return a\n");
}

#[test]
fn diagnostics_arrive_in_source_order() {
    let (_, messages) = compile(
        "fn f():\n    let x = missing_one\n    let y = missing_two\n",
    );
    let first = messages
        .iter()
        .position(|message| message.contains("missing_one"))
        .expect("first error");
    let second = messages
        .iter()
        .position(|message| message.contains("missing_two"))
        .expect("second error");
    assert!(first < second);
}

#[test]
fn checking_continues_after_an_error() {
    let (_, messages) = compile(
        "fn f():\n    break\n    let x: bool = 1\n",
    );
    assert!(messages.iter().any(|message| message.contains("'break' outside of loop")));
    assert!(messages
        .iter()
        .any(|message| message.contains("Type mismatch: expected bool, got i64")));
}
