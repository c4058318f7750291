use std::path::PathBuf;

use axon_compiler::{
    BinaryOp, Decl, Expr, ExprKind, Lexer, Parser, Program, SourceFile, SourceId, Stmt,
    TypeExprKind,
};

fn parse(source: &str) -> (Program, Vec<String>) {
    let file = SourceFile::new(SourceId(0), PathBuf::from("test.ax"), source.to_string());
    let lexer = Lexer::new(&file);
    let mut parser = Parser::new(lexer, "test.ax");
    let program = parser.parse();
    let messages = parser
        .into_diagnostics()
        .entries()
        .iter()
        .map(|diagnostic| diagnostic.message.clone())
        .collect();
    (program, messages)
}

fn parse_expr(source: &str) -> Expr {
    let file = SourceFile::new(SourceId(0), PathBuf::from("expr.ax"), source.to_string());
    let lexer = Lexer::new(&file);
    let mut parser = Parser::new(lexer, "expr.ax");
    parser.parse_expression().expect("expression should parse")
}

#[test]
fn parses_a_function_declaration() {
    let (program, messages) = parse("fn add(a: i32, b: i32) -> i32:\n    return a + b\n");
    assert!(messages.is_empty(), "unexpected diagnostics: {messages:?}");
    assert_eq!(program.declarations.len(), 1);

    let Decl::Fn(decl) = &program.declarations[0] else {
        panic!("expected a function declaration");
    };
    assert_eq!(decl.name, "add");
    assert_eq!(decl.params.len(), 2);
    assert!(!decl.is_async);
    match &decl.return_type.as_ref().expect("return type").kind {
        TypeExprKind::Simple(name) => assert_eq!(name, "i32"),
        other => panic!("expected simple return type, got {other:?}"),
    }
    assert_eq!(decl.body.statements.len(), 1);
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let expr = parse_expr("a + b * c");
    let ExprKind::Binary { op, right, .. } = &expr.kind else {
        panic!("expected binary expression");
    };
    assert_eq!(*op, BinaryOp::Add);
    let ExprKind::Binary { op: inner, .. } = &right.kind else {
        panic!("expected b * c on the right");
    };
    assert_eq!(*inner, BinaryOp::Mul);
}

#[test]
fn power_is_right_associative() {
    let expr = parse_expr("a ** b ** c");
    let ExprKind::Binary { op, left, right } = &expr.kind else {
        panic!("expected binary expression");
    };
    assert_eq!(*op, BinaryOp::Pow);
    assert!(matches!(left.kind, ExprKind::Identifier(_)));
    assert!(matches!(
        right.kind,
        ExprKind::Binary {
            op: BinaryOp::Pow,
            ..
        }
    ));
}

#[test]
fn equality_is_left_associative() {
    let expr = parse_expr("a == b == c");
    let ExprKind::Binary { op, left, right } = &expr.kind else {
        panic!("expected binary expression");
    };
    assert_eq!(*op, BinaryOp::Eq);
    assert!(matches!(
        left.kind,
        ExprKind::Binary {
            op: BinaryOp::Eq,
            ..
        }
    ));
    assert!(matches!(right.kind, ExprKind::Identifier(_)));
}

#[test]
fn assignment_is_right_associative() {
    let expr = parse_expr("a = b = c");
    let ExprKind::Assign { target, value, op } = &expr.kind else {
        panic!("expected assignment");
    };
    assert!(op.is_none());
    assert!(matches!(target.kind, ExprKind::Identifier(_)));
    assert!(matches!(value.kind, ExprKind::Assign { .. }));
}

#[test]
fn compound_assignment_carries_the_underlying_op() {
    let expr = parse_expr("a += 1");
    let ExprKind::Assign { op, .. } = &expr.kind else {
        panic!("expected assignment");
    };
    assert_eq!(*op, Some(BinaryOp::Add));
}

#[test]
fn range_is_exclusive() {
    let expr = parse_expr("1..10");
    let ExprKind::Range { inclusive, .. } = &expr.kind else {
        panic!("expected range");
    };
    assert!(!inclusive);
}

#[test]
fn parenthesized_comma_makes_a_tuple() {
    let tuple = parse_expr("(1, 2)");
    assert!(matches!(&tuple.kind, ExprKind::Tuple(items) if items.len() == 2));

    let grouped = parse_expr("(1)");
    assert!(matches!(grouped.kind, ExprKind::IntLiteral(1)));

    let trailing = parse_expr("(1,)");
    assert!(matches!(&trailing.kind, ExprKind::Tuple(items) if items.len() == 1));
}

#[test]
fn parses_list_comprehension() {
    let expr = parse_expr("[x * x for x in xs if x > 0]");
    let ExprKind::ListComp { var, condition, .. } = &expr.kind else {
        panic!("expected comprehension");
    };
    assert_eq!(var, "x");
    assert!(condition.is_some());
}

#[test]
fn parses_dict_literal() {
    let expr = parse_expr("{\"a\": 1, \"b\": 2}");
    assert!(matches!(&expr.kind, ExprKind::Dict(entries) if entries.len() == 2));
}

#[test]
fn parses_lambda_with_annotations() {
    let expr = parse_expr("|x: i64, y| -> i64 x + y");
    let ExprKind::Lambda {
        params,
        return_type,
        ..
    } = &expr.kind
    else {
        panic!("expected lambda");
    };
    assert_eq!(params.len(), 2);
    assert!(params[0].declared_type.is_some());
    assert!(params[1].declared_type.is_none());
    assert!(return_type.is_some());
}

#[test]
fn parses_slices() {
    let expr = parse_expr("xs[1:4:2]");
    let ExprKind::Slice {
        start, end, step, ..
    } = &expr.kind
    else {
        panic!("expected slice");
    };
    assert!(start.is_some() && end.is_some() && step.is_some());

    let open = parse_expr("xs[:n]");
    let ExprKind::Slice { start, end, .. } = &open.kind else {
        panic!("expected slice");
    };
    assert!(start.is_none() && end.is_some());

    let plain = parse_expr("xs[0]");
    assert!(matches!(plain.kind, ExprKind::Index { .. }));
}

#[test]
fn qualified_names_fold_into_identifiers() {
    let expr = parse_expr("Color::Red");
    let ExprKind::Identifier(name) = &expr.kind else {
        panic!("expected identifier");
    };
    assert_eq!(name, "Color::Red");
}

#[test]
fn await_parses_as_a_prefix_operator() {
    let expr = parse_expr("await fetch()");
    assert!(matches!(expr.kind, ExprKind::Await(_)));
}

#[test]
fn parses_enum_with_tuple_variants() {
    let source = "enum Color:\n    Red\n    Green\n    RGB(i32, i32, i32)\n";
    let (program, messages) = parse(source);
    assert!(messages.is_empty(), "unexpected diagnostics: {messages:?}");

    let Decl::Enum(decl) = &program.declarations[0] else {
        panic!("expected an enum declaration");
    };
    assert_eq!(decl.name, "Color");
    assert_eq!(decl.variants.len(), 3);
    assert_eq!(decl.variants[2].name, "RGB");
    assert_eq!(decl.variants[2].fields.len(), 3);
}

#[test]
fn parses_struct_with_fields_and_method() {
    let source = "\
struct Point:
    x: f64
    y: f64

    fn norm(self) -> f64:
        return 0.0
";
    let (program, messages) = parse(source);
    assert!(messages.is_empty(), "unexpected diagnostics: {messages:?}");

    let Decl::Struct(decl) = &program.declarations[0] else {
        panic!("expected a struct declaration");
    };
    assert_eq!(decl.fields.len(), 2);
    assert_eq!(decl.methods.len(), 1);
    assert_eq!(decl.methods[0].params[0].name, "self");
}

#[test]
fn parses_class_with_base() {
    let source = "class Dog(Animal):\n    name: str\n";
    let (program, messages) = parse(source);
    assert!(messages.is_empty(), "unexpected diagnostics: {messages:?}");

    let Decl::Class(decl) = &program.declarations[0] else {
        panic!("expected a class declaration");
    };
    assert_eq!(decl.base.as_deref(), Some("Animal"));
}

#[test]
fn parses_trait_and_impl() {
    let source = "\
trait Shape:
    fn area(self) -> f64:
        return 0.0

impl Shape for Circle:
    fn area(self) -> f64:
        return 3.14
";
    let (program, messages) = parse(source);
    assert!(messages.is_empty(), "unexpected diagnostics: {messages:?}");
    assert_eq!(program.declarations.len(), 2);

    let Decl::Impl(decl) = &program.declarations[1] else {
        panic!("expected an impl declaration");
    };
    assert_eq!(decl.trait_name.as_deref(), Some("Shape"));
    assert_eq!(decl.type_name, "Circle");
}

#[test]
fn parses_imports() {
    let source = "import std.math as m\nfrom std.io import read, write\nfrom std.os import *\n";
    let (program, messages) = parse(source);
    assert!(messages.is_empty(), "unexpected diagnostics: {messages:?}");
    assert_eq!(program.declarations.len(), 3);

    let Decl::Import(first) = &program.declarations[0] else {
        panic!("expected an import");
    };
    assert_eq!(first.module_path, "std.math");
    assert_eq!(first.alias.as_deref(), Some("m"));

    let Decl::Import(second) = &program.declarations[1] else {
        panic!("expected an import");
    };
    assert_eq!(second.symbols, vec!["read".to_string(), "write".to_string()]);

    let Decl::Import(third) = &program.declarations[2] else {
        panic!("expected an import");
    };
    assert!(third.import_all);
}

#[test]
fn parses_match_with_guard() {
    let source = "\
fn classify(x: i64) -> i64:
    match x:
        case 0:
            return 0
        case 1 if x > 0:
            return 1
    return 2
";
    let (program, messages) = parse(source);
    assert!(messages.is_empty(), "unexpected diagnostics: {messages:?}");

    let Decl::Fn(decl) = &program.declarations[0] else {
        panic!("expected a function");
    };
    let Stmt::Match(match_stmt) = &decl.body.statements[0] else {
        panic!("expected a match statement");
    };
    assert_eq!(match_stmt.arms.len(), 2);
    assert!(match_stmt.arms[0].guard.is_none());
    assert!(match_stmt.arms[1].guard.is_some());
}

#[test]
fn parses_generic_and_reference_types() {
    let source = "fn f(xs: List[i64], d: Dict[str, i64], r: &mut i64, t: (i64, bool)) -> fn(i64) -> bool:\n    return g\n";
    let (program, messages) = parse(source);
    assert!(messages.is_empty(), "unexpected diagnostics: {messages:?}");

    let Decl::Fn(decl) = &program.declarations[0] else {
        panic!("expected a function");
    };
    assert!(matches!(
        decl.params[0].declared_type.as_ref().map(|t| &t.kind),
        Some(TypeExprKind::Generic { .. })
    ));
    assert!(matches!(
        decl.params[2].declared_type.as_ref().map(|t| &t.kind),
        Some(TypeExprKind::Reference { mutable: true, .. })
    ));
    assert!(matches!(
        decl.params[3].declared_type.as_ref().map(|t| &t.kind),
        Some(TypeExprKind::Tuple(_))
    ));
    assert!(matches!(
        decl.return_type.as_ref().map(|t| &t.kind),
        Some(TypeExprKind::Function { .. })
    ));
}

#[test]
fn missing_block_indent_is_reported() {
    let (_, messages) = parse("fn f():\nreturn 1\n");
    assert!(
        messages
            .iter()
            .any(|message| message.contains("Expected indented block")),
        "missing diagnostic: {messages:?}"
    );
}

#[test]
fn recovers_at_statement_boundaries() {
    let source = "let = 5\n\nfn ok() -> i64:\n    return 1\n";
    let (program, messages) = parse(source);
    assert!(!messages.is_empty(), "expected at least one diagnostic");
    assert_eq!(
        program.declarations.len(),
        1,
        "recovery should still parse the following function"
    );
}

#[test]
fn one_diagnostic_per_broken_construct() {
    // Panic mode suppresses cascading errors until resynchronization.
    let (_, messages) = parse("fn f(:\n");
    assert_eq!(messages.len(), 1, "got {messages:?}");
}

#[test]
fn async_fn_sets_the_flag() {
    let (program, messages) = parse("async fn poll() -> i64:\n    return 1\n");
    assert!(messages.is_empty(), "unexpected diagnostics: {messages:?}");
    let Decl::Fn(decl) = &program.declarations[0] else {
        panic!("expected a function");
    };
    assert!(decl.is_async);
}

#[test]
fn pub_marks_declarations_public() {
    let (program, messages) = parse("pub fn api() -> i64:\n    return 1\n");
    assert!(messages.is_empty(), "unexpected diagnostics: {messages:?}");
    let Decl::Fn(decl) = &program.declarations[0] else {
        panic!("expected a function");
    };
    assert!(decl.is_public);
}
