use std::path::PathBuf;

use axon_compiler::{Lexer, SourceFile, SourceId, TokenKind};

fn lex(source: &str) -> (Vec<TokenKind>, Vec<String>) {
    let file = SourceFile::new(SourceId(0), PathBuf::from("test.ax"), source.to_string());
    let mut lexer = Lexer::new(&file);
    let kinds = lexer
        .tokenize_all()
        .into_iter()
        .map(|token| token.kind)
        .collect();
    let messages = lexer
        .diagnostics()
        .entries()
        .iter()
        .map(|diagnostic| diagnostic.message.clone())
        .collect();
    (kinds, messages)
}

#[test]
fn lexes_a_single_integer() {
    let (kinds, messages) = lex("42");
    assert_eq!(kinds, vec![TokenKind::IntegerLiteral(42), TokenKind::Eof]);
    assert!(messages.is_empty(), "unexpected diagnostics: {messages:?}");
}

#[test]
fn decodes_radix_literals() {
    let (kinds, messages) = lex("0xFF 0b1010 0o17");
    assert_eq!(
        kinds,
        vec![
            TokenKind::IntegerLiteral(255),
            TokenKind::IntegerLiteral(10),
            TokenKind::IntegerLiteral(15),
            TokenKind::Eof,
        ]
    );
    assert!(messages.is_empty(), "unexpected diagnostics: {messages:?}");
}

#[test]
fn decodes_floats_and_exponents() {
    let (kinds, _) = lex("3.14 1e3 2.5e-1 .5");
    assert_eq!(
        kinds,
        vec![
            TokenKind::FloatLiteral(3.14),
            TokenKind::FloatLiteral(1e3),
            TokenKind::FloatLiteral(2.5e-1),
            TokenKind::FloatLiteral(0.5),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn bare_dot_is_left_to_the_punctuator() {
    let (kinds, _) = lex("a.b");
    assert_eq!(
        kinds,
        vec![
            TokenKind::Identifier,
            TokenKind::Dot,
            TokenKind::Identifier,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn empty_source_is_a_lone_eof() {
    let (kinds, messages) = lex("");
    assert_eq!(kinds, vec![TokenKind::Eof]);
    assert!(messages.is_empty());
}

#[test]
fn comments_and_blank_lines_lex_to_eof() {
    let (kinds, messages) = lex("# a comment\n\n   \n# another\n");
    assert_eq!(kinds, vec![TokenKind::Eof]);
    assert!(messages.is_empty());
}

#[test]
fn blocks_emit_balanced_indents_and_dedents() {
    let source = "fn f():\n    if x:\n        y\n    z\n";
    let (kinds, messages) = lex(source);
    let indents = kinds
        .iter()
        .filter(|kind| matches!(kind, TokenKind::Indent))
        .count();
    let dedents = kinds
        .iter()
        .filter(|kind| matches!(kind, TokenKind::Dedent))
        .count();
    assert_eq!(indents, 2);
    assert_eq!(indents, dedents);
    assert!(matches!(kinds.last(), Some(TokenKind::Eof)));
    assert!(messages.is_empty(), "unexpected diagnostics: {messages:?}");
}

#[test]
fn eof_flushes_open_indentation() {
    let (kinds, _) = lex("fn f():\n    return 1");
    let dedents = kinds
        .iter()
        .filter(|kind| matches!(kind, TokenKind::Dedent))
        .count();
    assert_eq!(dedents, 1);
    assert!(matches!(kinds.last(), Some(TokenKind::Eof)));
}

#[test]
fn tab_counts_as_four_spaces() {
    let spaces = lex("if x:\n    y\n").0;
    let tab = lex("if x:\n\ty\n").0;
    assert_eq!(spaces, tab);
}

#[test]
fn inconsistent_dedent_reports_and_continues() {
    let source = "fn f():\n    let x = 1\n   let y = 2\n";
    let (kinds, messages) = lex(source);
    assert!(
        messages
            .iter()
            .any(|message| message.contains("Inconsistent indentation")),
        "missing indentation diagnostic: {messages:?}"
    );
    // The remainder of the file is still tokenized.
    let identifiers = kinds
        .iter()
        .filter(|kind| matches!(kind, TokenKind::Identifier))
        .count();
    assert!(identifiers >= 3, "lexing stopped early: {kinds:?}");
    assert!(matches!(kinds.last(), Some(TokenKind::Eof)));
}

#[test]
fn unterminated_string_reports_and_continues() {
    let (kinds, messages) = lex("let s = \"oops\nlet t = 1\n");
    assert!(
        messages
            .iter()
            .any(|message| message.contains("Unterminated string literal")),
        "missing diagnostic: {messages:?}"
    );
    assert!(kinds.contains(&TokenKind::IntegerLiteral(1)));
    assert!(matches!(kinds.last(), Some(TokenKind::Eof)));
}

#[test]
fn unexpected_character_reports_and_continues() {
    let (kinds, messages) = lex("let x = 1 $ 2\n");
    assert!(
        messages
            .iter()
            .any(|message| message.contains("Unexpected character '$'")),
        "missing diagnostic: {messages:?}"
    );
    assert!(kinds.contains(&TokenKind::IntegerLiteral(2)));
}

#[test]
fn decodes_escape_sequences() {
    let (kinds, _) = lex(r#""a\n\t\\\"b\0""#);
    match &kinds[0] {
        TokenKind::StringLiteral { value, fstring } => {
            assert_eq!(value, "a\n\t\\\"b\0");
            assert!(!fstring);
        }
        other => panic!("expected string literal, got {other:?}"),
    }
}

#[test]
fn unknown_escape_is_preserved_verbatim() {
    let (kinds, messages) = lex(r#""a\qb""#);
    match &kinds[0] {
        TokenKind::StringLiteral { value, .. } => assert_eq!(value, "a\\qb"),
        other => panic!("expected string literal, got {other:?}"),
    }
    assert!(messages.is_empty());
}

#[test]
fn triple_quoted_string_spans_newlines() {
    let (kinds, messages) = lex("\"\"\"line one\nline two\"\"\"");
    match &kinds[0] {
        TokenKind::StringLiteral { value, .. } => assert_eq!(value, "line one\nline two"),
        other => panic!("expected string literal, got {other:?}"),
    }
    assert!(messages.is_empty());
}

#[test]
fn fstring_prefix_sets_the_flag() {
    let (kinds, _) = lex("f\"x = {x}\"");
    match &kinds[0] {
        TokenKind::StringLiteral { value, fstring } => {
            // Interpolation is not spliced here; the raw body is observed.
            assert_eq!(value, "x = {x}");
            assert!(fstring);
        }
        other => panic!("expected string literal, got {other:?}"),
    }
}

#[test]
fn single_quoted_strings_work() {
    let (kinds, _) = lex("'hi'");
    match &kinds[0] {
        TokenKind::StringLiteral { value, .. } => assert_eq!(value, "hi"),
        other => panic!("expected string literal, got {other:?}"),
    }
}

#[test]
fn line_continuation_joins_lines() {
    let (kinds, _) = lex("1 \\\n+ 2\n");
    assert_eq!(
        kinds,
        vec![
            TokenKind::IntegerLiteral(1),
            TokenKind::Plus,
            TokenKind::IntegerLiteral(2),
            TokenKind::Newline,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn greedy_operator_matching() {
    let (kinds, _) = lex("** == != <= >= << >> -> => :: .. ... += -= *= /= %=");
    assert_eq!(
        kinds,
        vec![
            TokenKind::StarStar,
            TokenKind::EqualEqual,
            TokenKind::BangEqual,
            TokenKind::LessEqual,
            TokenKind::GreaterEqual,
            TokenKind::ShiftLeft,
            TokenKind::ShiftRight,
            TokenKind::Arrow,
            TokenKind::FatArrow,
            TokenKind::ColonColon,
            TokenKind::DotDot,
            TokenKind::DotDotDot,
            TokenKind::PlusEqual,
            TokenKind::MinusEqual,
            TokenKind::StarEqual,
            TokenKind::SlashEqual,
            TokenKind::PercentEqual,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn bare_bang_is_an_error() {
    let (_, messages) = lex("!x");
    assert!(messages
        .iter()
        .any(|message| message.contains("Unexpected character '!'")));
}

#[test]
fn doubling_interior_spaces_does_not_change_the_stream() {
    let compact = lex("fn f(a: i64) -> i64:\n    return a + 1\n").0;
    let spaced = lex("fn  f(a:  i64)  ->  i64:\n    return  a  +  1\n").0;
    assert_eq!(compact, spaced);
}

#[test]
fn keywords_are_distinguished_from_identifiers() {
    use axon_compiler::Keyword;
    let (kinds, _) = lex("fn let letter true None self Self");
    assert_eq!(
        kinds,
        vec![
            TokenKind::Keyword(Keyword::Fn),
            TokenKind::Keyword(Keyword::Let),
            TokenKind::Identifier,
            TokenKind::BooleanLiteral(true),
            TokenKind::NoneLiteral,
            TokenKind::Keyword(Keyword::SelfValue),
            TokenKind::Keyword(Keyword::SelfType),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn locations_are_one_based() {
    let file = SourceFile::new(
        SourceId(0),
        PathBuf::from("test.ax"),
        "let x = 1\n".to_string(),
    );
    let mut lexer = Lexer::new(&file);
    let tokens = lexer.tokenize_all();
    assert_eq!(tokens[0].location.line, 1);
    assert_eq!(tokens[0].location.column, 1);
    assert_eq!(tokens[1].location.column, 5);
    assert_eq!(tokens[1].location.offset, 4);
}
