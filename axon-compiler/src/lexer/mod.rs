use std::num::{ParseFloatError, ParseIntError};

use thiserror::Error;

use crate::diagnostics::Diagnostics;
use crate::source::{SourceFile, SourceLocation};

/// A tab counts as this many spaces when measuring indentation.
const TAB_WIDTH: usize = 4;

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub location: SourceLocation,
}

impl Token {
    fn new(kind: TokenKind, lexeme: String, location: SourceLocation) -> Self {
        Self {
            kind,
            lexeme,
            location,
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    IntegerLiteral(i64),
    FloatLiteral(f64),
    StringLiteral { value: String, fstring: bool },
    CharLiteral(char),
    BooleanLiteral(bool),
    NoneLiteral,

    Identifier,
    Keyword(Keyword),

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    StarStar,

    // Comparison
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // Bitwise
    Ampersand,
    Pipe,
    Caret,
    Tilde,
    ShiftLeft,
    ShiftRight,

    // Assignment
    Equal,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    PercentEqual,

    // Special operators
    Arrow,
    FatArrow,
    Question,
    At,
    DotDot,
    DotDotDot,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    ColonColon,
    Semicolon,
    Dot,

    // Structure
    Newline,
    Indent,
    Dedent,

    Eof,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Fn,
    Let,
    Var,
    Const,
    Struct,
    Class,
    Trait,
    Impl,
    Enum,
    Type,
    If,
    Else,
    Elif,
    Match,
    Case,
    While,
    For,
    In,
    Break,
    Continue,
    Return,
    Yield,
    Async,
    Await,
    Spawn,
    Import,
    From,
    As,
    Pub,
    Mut,
    SelfValue,
    SelfType,
    Super,
    And,
    Or,
    Not,
}

#[derive(Debug, Error)]
pub enum LexerError {
    #[error("Unexpected character '{ch}'")]
    UnexpectedCharacter { ch: char },
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Invalid integer literal '{lexeme}': {source}")]
    IntegerParse {
        lexeme: String,
        #[source]
        source: ParseIntError,
    },
    #[error("Invalid floating-point literal '{lexeme}': {source}")]
    FloatParse {
        lexeme: String,
        #[source]
        source: ParseFloatError,
    },
    #[error("Inconsistent indentation")]
    InconsistentIndentation,
}

/// Byte-at-a-time scanner with an indentation state machine. `Indent` and
/// `Dedent` tokens bracket every block opened by a trailing ':'; the parser
/// relies on the stream staying balanced, with any shortfall flushed at EOF.
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    line: usize,
    column: usize,
    at_line_start: bool,
    indent_stack: Vec<usize>,
    pending_dedents: usize,
    peeked: Option<Token>,
    diagnostics: Diagnostics,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a SourceFile) -> Self {
        Self {
            input: &source.contents,
            position: 0,
            line: 1,
            column: 1,
            at_line_start: true,
            indent_stack: vec![0],
            pending_dedents: 0,
            peeked: None,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    pub fn next_token(&mut self) -> Token {
        if let Some(token) = self.peeked.take() {
            return token;
        }
        if self.pending_dedents > 0 {
            self.pending_dedents -= 1;
            return self.structural_token(TokenKind::Dedent);
        }
        if self.at_line_start {
            if let Some(token) = self.handle_indentation() {
                return token;
            }
        }
        self.scan_token()
    }

    pub fn peek_token(&mut self) -> &Token {
        if self.peeked.is_none() {
            let token = self.next_token();
            self.peeked = Some(token);
        }
        self.peeked.as_ref().expect("token was just peeked")
    }

    pub fn tokenize_all(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.is_eof();
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    /// Measures the leading whitespace of the next non-blank line and compares
    /// it against the indentation stack, producing at most one structural
    /// token per call (further dedents are left pending).
    fn handle_indentation(&mut self) -> Option<Token> {
        self.at_line_start = false;
        loop {
            let mut width = 0usize;
            loop {
                match self.peek_char() {
                    Some(' ') => {
                        width += 1;
                        self.advance_char();
                    }
                    Some('\t') => {
                        width += TAB_WIDTH;
                        self.advance_char();
                    }
                    _ => break,
                }
            }

            match self.peek_char() {
                // Blank line: indentation is not significant, skip it.
                Some('\n') => {
                    self.advance_char();
                    continue;
                }
                Some('\r') => {
                    self.advance_char();
                    continue;
                }
                // Comment-only line.
                Some('#') => {
                    self.skip_line_comment();
                    continue;
                }
                // EOF dedents are flushed by scan_token.
                None => return None,
                _ => {}
            }

            let top = self.indent_stack.last().copied().unwrap_or(0);
            if width > top {
                self.indent_stack.push(width);
                return Some(self.structural_token(TokenKind::Indent));
            }
            if width < top {
                let mut dedents = 0usize;
                while self.indent_stack.len() > 1
                    && self.indent_stack.last().copied().unwrap_or(0) > width
                {
                    self.indent_stack.pop();
                    dedents += 1;
                }
                if self.indent_stack.last().copied().unwrap_or(0) != width {
                    let location = self.location();
                    self.diagnostics
                        .push_error(LexerError::InconsistentIndentation.to_string(), Some(location));
                }
                self.pending_dedents = dedents.saturating_sub(1);
                return Some(self.structural_token(TokenKind::Dedent));
            }
            return None;
        }
    }

    fn scan_token(&mut self) -> Token {
        self.skip_inline_whitespace();
        let location = self.location();

        let ch = match self.peek_char() {
            Some(ch) => ch,
            None => {
                // Balance every open indentation level before the final EOF.
                if self.indent_stack.len() > 1 {
                    self.indent_stack.pop();
                    return Token::new(TokenKind::Dedent, String::new(), location);
                }
                return Token::new(TokenKind::Eof, String::new(), location);
            }
        };

        match ch {
            '\n' => {
                self.advance_char();
                self.at_line_start = true;
                Token::new(TokenKind::Newline, "\n".to_string(), location)
            }
            '#' => {
                self.skip_line_comment();
                self.scan_token()
            }
            '"' | '\'' => self.scan_string(ch, location, self.position, false),
            'f' | 'F' if matches!(self.peek_next_char(), Some('"') | Some('\'')) => {
                let start = self.position;
                self.advance_char();
                let quote = match self.peek_char() {
                    Some(quote) => quote,
                    None => return self.error_token(LexerError::UnterminatedString, location),
                };
                self.scan_string(quote, location, start, true)
            }
            '0'..='9' => self.scan_number(location),
            'a'..='z' | 'A'..='Z' | '_' => self.scan_identifier(location),
            _ => self.scan_operator(ch, location),
        }
    }

    fn scan_identifier(&mut self, location: SourceLocation) -> Token {
        let start = self.position;
        self.advance_char();
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.advance_char();
            } else {
                break;
            }
        }

        let lexeme = self.slice(start, self.position).to_string();
        let kind = match lexeme.as_str() {
            "true" => TokenKind::BooleanLiteral(true),
            "false" => TokenKind::BooleanLiteral(false),
            "None" => TokenKind::NoneLiteral,
            other => match keyword_from_lexeme(other) {
                Some(keyword) => TokenKind::Keyword(keyword),
                None => TokenKind::Identifier,
            },
        };
        Token::new(kind, lexeme, location)
    }

    fn scan_number(&mut self, location: SourceLocation) -> Token {
        let start = self.position;
        let first = self.advance_char().unwrap_or('0');

        // Radix prefixes: 0x / 0b / 0o.
        if first == '0' {
            match self.peek_char() {
                Some('x') | Some('X') => {
                    self.advance_char();
                    while matches!(self.peek_char(), Some(ch) if ch.is_ascii_hexdigit()) {
                        self.advance_char();
                    }
                    return self.radix_token(start, 16, location);
                }
                Some('b') | Some('B') => {
                    self.advance_char();
                    while matches!(self.peek_char(), Some('0') | Some('1')) {
                        self.advance_char();
                    }
                    return self.radix_token(start, 2, location);
                }
                Some('o') | Some('O') => {
                    self.advance_char();
                    while matches!(self.peek_char(), Some('0'..='7')) {
                        self.advance_char();
                    }
                    return self.radix_token(start, 8, location);
                }
                _ => {}
            }
        }

        let mut is_float = false;
        while matches!(self.peek_char(), Some(ch) if ch.is_ascii_digit()) {
            self.advance_char();
        }

        // A '.' only starts a fraction when a digit follows; a bare '.' is
        // left for the member-access punctuator.
        if self.peek_char() == Some('.')
            && matches!(self.peek_next_char(), Some(ch) if ch.is_ascii_digit())
        {
            is_float = true;
            self.advance_char();
            while matches!(self.peek_char(), Some(ch) if ch.is_ascii_digit()) {
                self.advance_char();
            }
        }

        if matches!(self.peek_char(), Some('e') | Some('E')) {
            is_float = true;
            self.advance_char();
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.advance_char();
            }
            while matches!(self.peek_char(), Some(ch) if ch.is_ascii_digit()) {
                self.advance_char();
            }
        }

        let lexeme = self.slice(start, self.position).to_string();
        if is_float {
            match lexeme.parse::<f64>() {
                Ok(value) => Token::new(TokenKind::FloatLiteral(value), lexeme, location),
                Err(source) => {
                    self.error_token(LexerError::FloatParse { lexeme, source }, location)
                }
            }
        } else {
            match lexeme.parse::<i64>() {
                Ok(value) => Token::new(TokenKind::IntegerLiteral(value), lexeme, location),
                Err(source) => {
                    self.error_token(LexerError::IntegerParse { lexeme, source }, location)
                }
            }
        }
    }

    /// Scans a fraction that started with '.' (e.g. `.5`).
    fn scan_leading_dot_float(&mut self, start: usize, location: SourceLocation) -> Token {
        while matches!(self.peek_char(), Some(ch) if ch.is_ascii_digit()) {
            self.advance_char();
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            self.advance_char();
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.advance_char();
            }
            while matches!(self.peek_char(), Some(ch) if ch.is_ascii_digit()) {
                self.advance_char();
            }
        }
        let lexeme = self.slice(start, self.position).to_string();
        let padded = format!("0{lexeme}");
        match padded.parse::<f64>() {
            Ok(value) => Token::new(TokenKind::FloatLiteral(value), lexeme, location),
            Err(source) => self.error_token(LexerError::FloatParse { lexeme, source }, location),
        }
    }

    fn radix_token(&mut self, start: usize, radix: u32, location: SourceLocation) -> Token {
        let lexeme = self.slice(start, self.position).to_string();
        match i64::from_str_radix(&lexeme[2..], radix) {
            Ok(value) => Token::new(TokenKind::IntegerLiteral(value), lexeme, location),
            Err(source) => self.error_token(LexerError::IntegerParse { lexeme, source }, location),
        }
    }

    fn scan_string(
        &mut self,
        quote: char,
        location: SourceLocation,
        start: usize,
        fstring: bool,
    ) -> Token {
        self.advance_char(); // consume opening quote

        // Three identical quotes open a multi-line string.
        let triple = self.peek_char() == Some(quote) && self.peek_next_char() == Some(quote);
        if triple {
            self.advance_char();
            self.advance_char();
        }

        let mut value = String::new();
        loop {
            let ch = match self.peek_char() {
                Some(ch) => ch,
                None => return self.error_token(LexerError::UnterminatedString, location),
            };

            if triple {
                if ch == quote
                    && self.peek_next_char() == Some(quote)
                    && self.peek_char_at(2) == Some(quote)
                {
                    self.advance_char();
                    self.advance_char();
                    self.advance_char();
                    break;
                }
            } else {
                if ch == quote {
                    self.advance_char();
                    break;
                }
                if ch == '\n' {
                    // The newline stays in the stream so line structure
                    // survives the error.
                    return self.error_token(LexerError::UnterminatedString, location);
                }
            }

            if ch == '\\' {
                self.advance_char();
                let escaped = match self.peek_char() {
                    Some(escaped) => escaped,
                    None => return self.error_token(LexerError::UnterminatedString, location),
                };
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '\\' => value.push('\\'),
                    '\'' => value.push('\''),
                    '"' => value.push('"'),
                    '0' => value.push('\0'),
                    other => {
                        // Unknown escape: keep both characters verbatim.
                        value.push('\\');
                        value.push(other);
                    }
                }
                self.advance_char();
            } else {
                value.push(ch);
                self.advance_char();
            }
        }

        let lexeme = self.slice(start, self.position).to_string();
        Token::new(
            TokenKind::StringLiteral { value, fstring },
            lexeme,
            location,
        )
    }

    fn scan_operator(&mut self, ch: char, location: SourceLocation) -> Token {
        let start = self.position;
        self.advance_char();
        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '~' => TokenKind::Tilde,
            '@' => TokenKind::At,
            '?' => TokenKind::Question,
            '+' => {
                if self.match_char('=') {
                    TokenKind::PlusEqual
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.match_char('>') {
                    TokenKind::Arrow
                } else if self.match_char('=') {
                    TokenKind::MinusEqual
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.match_char('*') {
                    TokenKind::StarStar
                } else if self.match_char('=') {
                    TokenKind::StarEqual
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.match_char('=') {
                    TokenKind::SlashEqual
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.match_char('=') {
                    TokenKind::PercentEqual
                } else {
                    TokenKind::Percent
                }
            }
            '=' => {
                if self.match_char('>') {
                    TokenKind::FatArrow
                } else if self.match_char('=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                }
            }
            '!' => {
                if self.match_char('=') {
                    TokenKind::BangEqual
                } else {
                    return self.error_token(LexerError::UnexpectedCharacter { ch }, location);
                }
            }
            '<' => {
                if self.match_char('<') {
                    TokenKind::ShiftLeft
                } else if self.match_char('=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.match_char('>') {
                    TokenKind::ShiftRight
                } else if self.match_char('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            '&' => TokenKind::Ampersand,
            '|' => TokenKind::Pipe,
            '^' => TokenKind::Caret,
            ':' => {
                if self.match_char(':') {
                    TokenKind::ColonColon
                } else {
                    TokenKind::Colon
                }
            }
            '.' => {
                if self.match_char('.') {
                    if self.match_char('.') {
                        TokenKind::DotDotDot
                    } else {
                        TokenKind::DotDot
                    }
                } else if matches!(self.peek_char(), Some(ch) if ch.is_ascii_digit()) {
                    return self.scan_leading_dot_float(start, location);
                } else {
                    TokenKind::Dot
                }
            }
            other => {
                return self.error_token(LexerError::UnexpectedCharacter { ch: other }, location);
            }
        };

        let lexeme = self.slice(start, self.position).to_string();
        Token::new(kind, lexeme, location)
    }

    fn error_token(&mut self, error: LexerError, location: SourceLocation) -> Token {
        self.diagnostics.push_error(error.to_string(), Some(location));
        Token::new(TokenKind::Error, String::new(), location)
    }

    fn structural_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, String::new(), self.location())
    }

    fn skip_inline_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            match ch {
                ' ' | '\t' | '\r' => {
                    self.advance_char();
                }
                // Line continuation: backslash immediately before a newline
                // consumes both and does not start a new line.
                '\\' if self.peek_next_char() == Some('\n') => {
                    self.advance_char();
                    self.advance_char();
                }
                _ => break,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == '\n' {
                break;
            }
            self.advance_char();
        }
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column, self.position)
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek_next_char(&self) -> Option<char> {
        self.peek_char_at(1)
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.position..].chars().nth(offset)
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.position += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.advance_char();
            true
        } else {
            false
        }
    }

    fn slice(&self, start: usize, end: usize) -> &str {
        &self.input[start..end]
    }
}

fn keyword_from_lexeme(lexeme: &str) -> Option<Keyword> {
    match lexeme {
        "fn" => Some(Keyword::Fn),
        "let" => Some(Keyword::Let),
        "var" => Some(Keyword::Var),
        "const" => Some(Keyword::Const),
        "struct" => Some(Keyword::Struct),
        "class" => Some(Keyword::Class),
        "trait" => Some(Keyword::Trait),
        "impl" => Some(Keyword::Impl),
        "enum" => Some(Keyword::Enum),
        "type" => Some(Keyword::Type),
        "if" => Some(Keyword::If),
        "else" => Some(Keyword::Else),
        "elif" => Some(Keyword::Elif),
        "match" => Some(Keyword::Match),
        "case" => Some(Keyword::Case),
        "while" => Some(Keyword::While),
        "for" => Some(Keyword::For),
        "in" => Some(Keyword::In),
        "break" => Some(Keyword::Break),
        "continue" => Some(Keyword::Continue),
        "return" => Some(Keyword::Return),
        "yield" => Some(Keyword::Yield),
        "async" => Some(Keyword::Async),
        "await" => Some(Keyword::Await),
        "spawn" => Some(Keyword::Spawn),
        "import" => Some(Keyword::Import),
        "from" => Some(Keyword::From),
        "as" => Some(Keyword::As),
        "pub" => Some(Keyword::Pub),
        "mut" => Some(Keyword::Mut),
        "self" => Some(Keyword::SelfValue),
        "Self" => Some(Keyword::SelfType),
        "super" => Some(Keyword::Super),
        "and" => Some(Keyword::And),
        "or" => Some(Keyword::Or),
        "not" => Some(Keyword::Not),
        _ => None,
    }
}
