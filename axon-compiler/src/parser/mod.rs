use anyhow::{anyhow, Result};

use crate::ast::*;
use crate::diagnostics::Diagnostics;
use crate::lexer::{Keyword, Lexer, Token, TokenKind};
use crate::source::SourceLocation;

// Operator precedence levels, lowest to highest. An infix operator binds its
// right operand one level tighter, except the right-associative levels
// (assignment and power) which reuse their own level.
const PREC_NONE: u8 = 0;
const PREC_ASSIGNMENT: u8 = 1;
const PREC_OR: u8 = 2;
const PREC_AND: u8 = 3;
const PREC_EQUALITY: u8 = 4;
const PREC_COMPARISON: u8 = 5;
const PREC_BIT_OR: u8 = 6;
const PREC_BIT_XOR: u8 = 7;
const PREC_BIT_AND: u8 = 8;
const PREC_SHIFT: u8 = 9;
const PREC_RANGE: u8 = 10;
const PREC_TERM: u8 = 11;
const PREC_FACTOR: u8 = 12;
const PREC_POWER: u8 = 13;
const PREC_UNARY: u8 = 14;

fn precedence_of(kind: &TokenKind) -> u8 {
    match kind {
        TokenKind::Equal
        | TokenKind::PlusEqual
        | TokenKind::MinusEqual
        | TokenKind::StarEqual
        | TokenKind::SlashEqual
        | TokenKind::PercentEqual => PREC_ASSIGNMENT,
        TokenKind::Keyword(Keyword::Or) => PREC_OR,
        TokenKind::Keyword(Keyword::And) => PREC_AND,
        TokenKind::EqualEqual | TokenKind::BangEqual => PREC_EQUALITY,
        TokenKind::Less | TokenKind::LessEqual | TokenKind::Greater | TokenKind::GreaterEqual => {
            PREC_COMPARISON
        }
        TokenKind::Pipe => PREC_BIT_OR,
        TokenKind::Caret => PREC_BIT_XOR,
        TokenKind::Ampersand => PREC_BIT_AND,
        TokenKind::ShiftLeft | TokenKind::ShiftRight => PREC_SHIFT,
        TokenKind::DotDot => PREC_RANGE,
        TokenKind::Plus | TokenKind::Minus => PREC_TERM,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent | TokenKind::At => PREC_FACTOR,
        TokenKind::StarStar => PREC_POWER,
        _ => PREC_NONE,
    }
}

/// Recursive-descent statement parser with a Pratt expression core. Consumes
/// tokens strictly left to right through the lexer's one-token lookahead.
///
/// Errors are accumulated, not thrown: a failed construct records a single
/// diagnostic (further ones are suppressed while in panic mode) and the
/// top-level loop resynchronizes at the next statement boundary.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    filename: String,
    current: Token,
    previous: Token,
    diagnostics: Diagnostics,
    panic_mode: bool,
    next_node_id: u32,
}

impl<'a> Parser<'a> {
    pub fn new(mut lexer: Lexer<'a>, filename: impl Into<String>) -> Self {
        let current = lexer.next_token();
        let previous = current.clone();
        Self {
            lexer,
            filename: filename.into(),
            current,
            previous,
            diagnostics: Diagnostics::new(),
            panic_mode: false,
            next_node_id: 0,
        }
    }

    pub fn parse(&mut self) -> Program {
        let mut declarations = Vec::new();

        while !self.at_end() {
            self.skip_newlines();
            if self.at_end() {
                break;
            }
            match self.parse_declaration() {
                Ok(Some(decl)) => declarations.push(decl),
                Ok(None) => {}
                Err(_) => self.synchronize(),
            }
        }

        Program {
            declarations,
            filename: self.filename.clone(),
        }
    }

    /// Lexical and syntactic diagnostics, in source order.
    pub fn into_diagnostics(mut self) -> Diagnostics {
        let mut combined = self.lexer.take_diagnostics();
        combined.extend(self.diagnostics);
        combined
    }

    // === Error handling ===

    fn error_here(&mut self, message: impl Into<String>) -> anyhow::Error {
        let message = message.into();
        if !self.panic_mode {
            self.panic_mode = true;
            self.diagnostics.push_error(
                format!("{}, got {:?}", message, self.current.kind),
                Some(self.current.location),
            );
        }
        anyhow!(message)
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while !self.at_end() {
            if matches!(self.previous.kind, TokenKind::Newline) {
                return;
            }
            match &self.current.kind {
                TokenKind::Keyword(
                    Keyword::Fn
                    | Keyword::Let
                    | Keyword::Var
                    | Keyword::Const
                    | Keyword::If
                    | Keyword::While
                    | Keyword::For
                    | Keyword::Return
                    | Keyword::Struct
                    | Keyword::Class
                    | Keyword::Trait
                    | Keyword::Impl,
                ) => return,
                _ => {}
            }
            self.advance();
        }
    }

    // === Token management ===

    fn advance(&mut self) -> Token {
        self.previous = std::mem::replace(&mut self.current, self.lexer.next_token());
        self.previous.clone()
    }

    fn at_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eof)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.current.kind, TokenKind::Keyword(kw) if kw == keyword)
    }

    fn match_kind(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, message: &str) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(message))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword, message: &str) -> Result<Token> {
        if self.check_keyword(keyword) {
            Ok(self.advance())
        } else {
            Err(self.error_here(message))
        }
    }

    fn expect_identifier(&mut self, message: &str) -> Result<Token> {
        if matches!(self.current.kind, TokenKind::Identifier) {
            Ok(self.advance())
        } else {
            Err(self.error_here(message))
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.current.kind, TokenKind::Newline) {
            self.advance();
        }
    }

    fn new_expr(&mut self, location: SourceLocation, kind: ExprKind) -> Expr {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        Expr { id, location, kind }
    }

    // === Declarations ===

    fn parse_declaration(&mut self) -> Result<Option<Decl>> {
        let is_public = self.match_keyword(Keyword::Pub);

        match &self.current.kind {
            TokenKind::Keyword(Keyword::Fn) | TokenKind::Keyword(Keyword::Async) => {
                Ok(Some(Decl::Fn(self.parse_function(is_public)?)))
            }
            TokenKind::Keyword(Keyword::Struct) => {
                Ok(Some(Decl::Struct(self.parse_struct(is_public)?)))
            }
            TokenKind::Keyword(Keyword::Class) => {
                Ok(Some(Decl::Class(self.parse_class(is_public)?)))
            }
            TokenKind::Keyword(Keyword::Trait) => {
                Ok(Some(Decl::Trait(self.parse_trait(is_public)?)))
            }
            TokenKind::Keyword(Keyword::Impl) => Ok(Some(Decl::Impl(self.parse_impl()?))),
            TokenKind::Keyword(Keyword::Enum) => Ok(Some(Decl::Enum(self.parse_enum(is_public)?))),
            TokenKind::Keyword(Keyword::Type) => {
                Ok(Some(Decl::TypeAlias(self.parse_type_alias(is_public)?)))
            }
            TokenKind::Keyword(Keyword::Import) | TokenKind::Keyword(Keyword::From) => {
                Ok(Some(Decl::Import(self.parse_import()?)))
            }
            _ => {
                // Top-level statements are accepted and discarded; the program
                // proper is its declaration list.
                let _ = self.parse_statement()?;
                Ok(None)
            }
        }
    }

    fn parse_function(&mut self, is_public: bool) -> Result<FnDecl> {
        let is_async = self.match_keyword(Keyword::Async);
        self.expect_keyword(Keyword::Fn, "Expected 'fn'")?;
        let name_token = self.expect_identifier("Expected function name")?;

        let type_params = if self.match_kind(&TokenKind::LBracket) {
            self.parse_type_params()?
        } else {
            Vec::new()
        };

        self.expect(&TokenKind::LParen, "Expected '(' after function name")?;
        let params = self.parse_param_list()?;

        let return_type = if self.match_kind(&TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        self.expect(&TokenKind::Colon, "Expected ':' before function body")?;
        let body = self.parse_block()?;

        Ok(FnDecl {
            location: name_token.location,
            name: name_token.lexeme,
            type_params,
            params,
            return_type,
            body,
            is_async,
            is_public,
        })
    }

    fn parse_type_params(&mut self) -> Result<Vec<String>> {
        let mut params = Vec::new();
        loop {
            let name = self.expect_identifier("Expected type parameter")?;
            params.push(name.lexeme);
            if !self.match_kind(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBracket, "Expected ']' after type parameters")?;
        Ok(params)
    }

    fn parse_param_list(&mut self) -> Result<Vec<Param>> {
        let mut params = Vec::new();
        if self.match_kind(&TokenKind::RParen) {
            return Ok(params);
        }

        // A leading `self` gets the implicit type `Self`.
        if self.check_keyword(Keyword::SelfValue) {
            let token = self.advance();
            params.push(Param {
                location: token.location,
                name: "self".to_string(),
                declared_type: Some(TypeExpr {
                    location: token.location,
                    kind: TypeExprKind::Simple("Self".to_string()),
                }),
                default_value: None,
                mutable: false,
            });
            if !self.match_kind(&TokenKind::Comma) {
                self.expect(&TokenKind::RParen, "Expected ')' after parameters")?;
                return Ok(params);
            }
        }

        loop {
            let mutable = self.match_keyword(Keyword::Mut);
            let name_token = self.expect_identifier("Expected parameter name")?;
            self.expect(&TokenKind::Colon, "Expected ':' after parameter name")?;
            let declared_type = self.parse_type()?;

            let default_value = if self.match_kind(&TokenKind::Equal) {
                Some(self.parse_expression()?)
            } else {
                None
            };

            params.push(Param {
                location: name_token.location,
                name: name_token.lexeme,
                declared_type: Some(declared_type),
                default_value,
                mutable,
            });

            if !self.match_kind(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(&TokenKind::RParen, "Expected ')' after parameters")?;
        Ok(params)
    }

    fn parse_struct(&mut self, is_public: bool) -> Result<StructDecl> {
        self.expect_keyword(Keyword::Struct, "Expected 'struct'")?;
        let name_token = self.expect_identifier("Expected struct name")?;

        let type_params = if self.match_kind(&TokenKind::LBracket) {
            self.parse_type_params()?
        } else {
            Vec::new()
        };

        self.expect(&TokenKind::Colon, "Expected ':' before struct body")?;
        let (fields, methods) = self.parse_member_body("struct")?;

        Ok(StructDecl {
            location: name_token.location,
            name: name_token.lexeme,
            type_params,
            fields,
            methods,
            is_public,
        })
    }

    fn parse_class(&mut self, is_public: bool) -> Result<ClassDecl> {
        self.expect_keyword(Keyword::Class, "Expected 'class'")?;
        let name_token = self.expect_identifier("Expected class name")?;

        let base = if self.match_kind(&TokenKind::LParen) {
            let base_token = self.expect_identifier("Expected base class name")?;
            self.expect(&TokenKind::RParen, "Expected ')' after base class")?;
            Some(base_token.lexeme)
        } else {
            None
        };

        self.expect(&TokenKind::Colon, "Expected ':' before class body")?;
        let (fields, methods) = self.parse_member_body("class")?;

        Ok(ClassDecl {
            location: name_token.location,
            name: name_token.lexeme,
            type_params: Vec::new(),
            base,
            fields,
            methods,
            is_public,
        })
    }

    /// Shared body parser for struct and class declarations: any mix of
    /// `[pub] name: type [= default]` fields and `fn` methods.
    fn parse_member_body(&mut self, owner: &str) -> Result<(Vec<FieldDecl>, Vec<FnDecl>)> {
        let mut fields = Vec::new();
        let mut methods = Vec::new();

        self.skip_newlines();
        self.expect(&TokenKind::Indent, "Expected indented block")?;

        loop {
            self.skip_newlines();
            if self.match_kind(&TokenKind::Dedent) || self.at_end() {
                break;
            }

            let member_public = self.match_keyword(Keyword::Pub);

            if self.check_keyword(Keyword::Fn) || self.check_keyword(Keyword::Async) {
                methods.push(self.parse_function(member_public)?);
                continue;
            }

            if matches!(self.current.kind, TokenKind::Identifier) {
                let name_token = self.advance();
                self.expect(&TokenKind::Colon, "Expected ':' after field name")?;
                let declared_type = self.parse_type()?;
                let default_value = if self.match_kind(&TokenKind::Equal) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                fields.push(FieldDecl {
                    location: name_token.location,
                    name: name_token.lexeme,
                    declared_type,
                    default_value,
                    is_public: member_public,
                });
                continue;
            }

            return Err(self.error_here(format!("Expected field or method in {owner}")));
        }

        Ok((fields, methods))
    }

    fn parse_trait(&mut self, is_public: bool) -> Result<TraitDecl> {
        self.expect_keyword(Keyword::Trait, "Expected 'trait'")?;
        let name_token = self.expect_identifier("Expected trait name")?;

        let type_params = if self.match_kind(&TokenKind::LBracket) {
            self.parse_type_params()?
        } else {
            Vec::new()
        };

        self.expect(&TokenKind::Colon, "Expected ':' before trait body")?;
        self.skip_newlines();
        self.expect(&TokenKind::Indent, "Expected indented block")?;

        let mut methods = Vec::new();
        loop {
            self.skip_newlines();
            if self.match_kind(&TokenKind::Dedent) || self.at_end() {
                break;
            }
            if self.check_keyword(Keyword::Fn) || self.check_keyword(Keyword::Async) {
                methods.push(self.parse_function(false)?);
            } else {
                return Err(self.error_here("Expected method in trait"));
            }
        }

        Ok(TraitDecl {
            location: name_token.location,
            name: name_token.lexeme,
            type_params,
            methods,
            is_public,
        })
    }

    fn parse_impl(&mut self) -> Result<ImplDecl> {
        self.expect_keyword(Keyword::Impl, "Expected 'impl'")?;
        let first = self.expect_identifier("Expected type or trait name")?;

        // `impl Trait for Type:` names the trait first.
        let (type_name, trait_name) = if self.match_keyword(Keyword::For) {
            let type_token = self.expect_identifier("Expected type name")?;
            (type_token.lexeme, Some(first.lexeme))
        } else {
            (first.lexeme, None)
        };

        self.expect(&TokenKind::Colon, "Expected ':' before impl body")?;
        self.skip_newlines();
        self.expect(&TokenKind::Indent, "Expected indented block")?;

        let mut methods = Vec::new();
        loop {
            self.skip_newlines();
            if self.match_kind(&TokenKind::Dedent) || self.at_end() {
                break;
            }
            if self.check_keyword(Keyword::Fn) || self.check_keyword(Keyword::Async) {
                methods.push(self.parse_function(false)?);
            } else {
                return Err(self.error_here("Expected method in impl block"));
            }
        }

        Ok(ImplDecl {
            location: first.location,
            type_name,
            trait_name,
            methods,
        })
    }

    fn parse_enum(&mut self, is_public: bool) -> Result<EnumDecl> {
        self.expect_keyword(Keyword::Enum, "Expected 'enum'")?;
        let name_token = self.expect_identifier("Expected enum name")?;

        let type_params = if self.match_kind(&TokenKind::LBracket) {
            self.parse_type_params()?
        } else {
            Vec::new()
        };

        self.expect(&TokenKind::Colon, "Expected ':' before enum body")?;
        self.skip_newlines();
        self.expect(&TokenKind::Indent, "Expected indented block")?;

        let mut variants = Vec::new();
        loop {
            self.skip_newlines();
            if self.match_kind(&TokenKind::Dedent) || self.at_end() {
                break;
            }

            let variant_token = self.expect_identifier("Expected variant name")?;
            let mut fields = Vec::new();
            if self.match_kind(&TokenKind::LParen) {
                if !self.check(&TokenKind::RParen) {
                    loop {
                        fields.push(self.parse_type()?);
                        if !self.match_kind(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RParen, "Expected ')' after variant fields")?;
            }

            variants.push(EnumVariantDecl {
                location: variant_token.location,
                name: variant_token.lexeme,
                fields,
            });
        }

        Ok(EnumDecl {
            location: name_token.location,
            name: name_token.lexeme,
            type_params,
            variants,
            is_public,
        })
    }

    fn parse_type_alias(&mut self, is_public: bool) -> Result<TypeAliasDecl> {
        self.expect_keyword(Keyword::Type, "Expected 'type'")?;
        let name_token = self.expect_identifier("Expected type name")?;
        self.expect(&TokenKind::Equal, "Expected '=' after type name")?;
        let aliased = self.parse_type()?;

        Ok(TypeAliasDecl {
            location: name_token.location,
            name: name_token.lexeme,
            aliased,
            is_public,
        })
    }

    fn parse_import(&mut self) -> Result<ImportDecl> {
        if self.match_keyword(Keyword::Import) {
            let first = self.expect_identifier("Expected module name")?;
            let location = first.location;
            let mut module_path = first.lexeme;
            while self.match_kind(&TokenKind::Dot) {
                let next = self.expect_identifier("Expected module name")?;
                module_path.push('.');
                module_path.push_str(&next.lexeme);
            }

            let alias = if self.match_keyword(Keyword::As) {
                Some(self.expect_identifier("Expected alias name")?.lexeme)
            } else {
                None
            };

            Ok(ImportDecl {
                location,
                module_path,
                alias,
                symbols: Vec::new(),
                import_all: false,
            })
        } else {
            self.expect_keyword(Keyword::From, "Expected 'from'")?;
            let first = self.expect_identifier("Expected module name")?;
            let location = first.location;
            let mut module_path = first.lexeme;
            while self.match_kind(&TokenKind::Dot) {
                let next = self.expect_identifier("Expected module name")?;
                module_path.push('.');
                module_path.push_str(&next.lexeme);
            }

            self.expect_keyword(Keyword::Import, "Expected 'import'")?;

            let mut symbols = Vec::new();
            let mut import_all = false;
            if self.match_kind(&TokenKind::Star) {
                import_all = true;
            } else {
                loop {
                    symbols.push(self.expect_identifier("Expected symbol name")?.lexeme);
                    if !self.match_kind(&TokenKind::Comma) {
                        break;
                    }
                }
            }

            Ok(ImportDecl {
                location,
                module_path,
                alias: None,
                symbols,
                import_all,
            })
        }
    }

    // === Statements ===

    fn parse_statement(&mut self) -> Result<Stmt> {
        match &self.current.kind {
            TokenKind::Keyword(Keyword::If) => self.parse_if_statement(),
            TokenKind::Keyword(Keyword::While) => self.parse_while_statement(),
            TokenKind::Keyword(Keyword::For) => self.parse_for_statement(),
            TokenKind::Keyword(Keyword::Match) => self.parse_match_statement(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return_statement(),
            TokenKind::Keyword(Keyword::Break) => {
                let token = self.advance();
                Ok(Stmt::Break(BreakStmt {
                    location: token.location,
                }))
            }
            TokenKind::Keyword(Keyword::Continue) => {
                let token = self.advance();
                Ok(Stmt::Continue(ContinueStmt {
                    location: token.location,
                }))
            }
            TokenKind::Keyword(Keyword::Yield) => {
                let token = self.advance();
                let value = self.parse_expression()?;
                Ok(Stmt::Yield(YieldStmt {
                    location: token.location,
                    value,
                }))
            }
            TokenKind::Keyword(Keyword::Let | Keyword::Var | Keyword::Const) => {
                self.parse_var_decl_statement()
            }
            TokenKind::Keyword(
                Keyword::Fn | Keyword::Struct | Keyword::Class | Keyword::Trait | Keyword::Impl,
            ) => Err(self.error_here("Unexpected declaration in block")),
            _ => {
                let expression = self.parse_expression()?;
                Ok(Stmt::Expression(ExprStmt { expression }))
            }
        }
    }

    fn parse_var_decl_statement(&mut self) -> Result<Stmt> {
        let keyword_token = self.advance();
        let (mutable, is_const) = match keyword_token.kind {
            TokenKind::Keyword(Keyword::Var) => (true, false),
            TokenKind::Keyword(Keyword::Const) => (false, true),
            _ => (false, false),
        };

        let name_token = self.expect_identifier("Expected variable name")?;

        let declared_type = if self.match_kind(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let initializer = if self.match_kind(&TokenKind::Equal) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(Stmt::VarDecl(VarDeclStmt {
            location: name_token.location,
            name: name_token.lexeme,
            declared_type,
            initializer,
            mutable,
            is_const,
        }))
    }

    fn parse_if_statement(&mut self) -> Result<Stmt> {
        let if_token = self.expect_keyword(Keyword::If, "Expected 'if'")?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::Colon, "Expected ':' after if condition")?;
        let then_block = self.parse_block()?;

        let mut elif_blocks = Vec::new();
        while self.match_keyword(Keyword::Elif) {
            let elif_condition = self.parse_expression()?;
            self.expect(&TokenKind::Colon, "Expected ':' after elif condition")?;
            let elif_block = self.parse_block()?;
            elif_blocks.push((elif_condition, elif_block));
        }

        let else_block = if self.match_keyword(Keyword::Else) {
            self.expect(&TokenKind::Colon, "Expected ':' after else")?;
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Stmt::If(IfStmt {
            location: if_token.location,
            condition,
            then_block,
            elif_blocks,
            else_block,
        }))
    }

    fn parse_while_statement(&mut self) -> Result<Stmt> {
        let while_token = self.expect_keyword(Keyword::While, "Expected 'while'")?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::Colon, "Expected ':' after while condition")?;
        let body = self.parse_block()?;

        Ok(Stmt::While(WhileStmt {
            location: while_token.location,
            condition,
            body,
        }))
    }

    fn parse_for_statement(&mut self) -> Result<Stmt> {
        let for_token = self.expect_keyword(Keyword::For, "Expected 'for'")?;
        let variable = self.expect_identifier("Expected loop variable")?;
        self.expect_keyword(Keyword::In, "Expected 'in'")?;
        let iterable = self.parse_expression()?;
        self.expect(&TokenKind::Colon, "Expected ':' after for header")?;
        let body = self.parse_block()?;

        Ok(Stmt::For(ForStmt {
            location: for_token.location,
            variable: variable.lexeme,
            iterable,
            body,
        }))
    }

    fn parse_match_statement(&mut self) -> Result<Stmt> {
        let match_token = self.expect_keyword(Keyword::Match, "Expected 'match'")?;
        let value = self.parse_expression()?;
        self.expect(&TokenKind::Colon, "Expected ':' after match value")?;
        self.skip_newlines();
        self.expect(&TokenKind::Indent, "Expected indented block")?;

        let mut arms = Vec::new();
        loop {
            self.skip_newlines();
            if self.match_kind(&TokenKind::Dedent) || self.at_end() {
                break;
            }

            let case_token = self.expect_keyword(Keyword::Case, "Expected 'case' in match block")?;
            let pattern = self.parse_expression()?;
            let guard = if self.match_keyword(Keyword::If) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            self.expect(&TokenKind::Colon, "Expected ':' after case pattern")?;
            let body = self.parse_block()?;

            arms.push(MatchArm {
                location: case_token.location,
                pattern,
                guard,
                body,
            });
        }

        Ok(Stmt::Match(MatchStmt {
            location: match_token.location,
            value,
            arms,
        }))
    }

    fn parse_return_statement(&mut self) -> Result<Stmt> {
        let return_token = self.expect_keyword(Keyword::Return, "Expected 'return'")?;

        let value = if matches!(
            self.current.kind,
            TokenKind::Newline | TokenKind::Dedent | TokenKind::Eof
        ) {
            None
        } else {
            Some(self.parse_expression()?)
        };

        Ok(Stmt::Return(ReturnStmt {
            location: return_token.location,
            value,
        }))
    }

    /// Parses one indented block: NEWLINE* INDENT statement* DEDENT. The
    /// lexer guarantees the DEDENT (or EOF) for every INDENT it emits.
    fn parse_block(&mut self) -> Result<Block> {
        self.skip_newlines();
        self.expect(&TokenKind::Indent, "Expected indented block")?;

        let mut statements = Vec::new();
        loop {
            self.skip_newlines();
            if self.match_kind(&TokenKind::Dedent) || self.at_end() {
                break;
            }
            statements.push(self.parse_statement()?);
        }

        Ok(Block { statements })
    }

    // === Expressions (Pratt) ===

    pub fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_precedence(PREC_ASSIGNMENT)
    }

    fn parse_precedence(&mut self, min_precedence: u8) -> Result<Expr> {
        let mut left = self.parse_prefix()?;

        loop {
            let precedence = precedence_of(&self.current.kind);
            if precedence < min_precedence || precedence == PREC_NONE {
                break;
            }
            left = self.parse_infix(left, precedence)?;
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr> {
        match &self.current.kind {
            TokenKind::Minus => {
                let token = self.advance();
                let operand = self.parse_precedence(PREC_UNARY)?;
                Ok(self.new_expr(
                    token.location,
                    ExprKind::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(operand),
                    },
                ))
            }
            TokenKind::Keyword(Keyword::Not) => {
                let token = self.advance();
                let operand = self.parse_precedence(PREC_UNARY)?;
                Ok(self.new_expr(
                    token.location,
                    ExprKind::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(operand),
                    },
                ))
            }
            TokenKind::Tilde => {
                let token = self.advance();
                let operand = self.parse_precedence(PREC_UNARY)?;
                Ok(self.new_expr(
                    token.location,
                    ExprKind::Unary {
                        op: UnaryOp::BitNot,
                        operand: Box::new(operand),
                    },
                ))
            }
            TokenKind::Keyword(Keyword::Await) => {
                let token = self.advance();
                let operand = self.parse_precedence(PREC_UNARY)?;
                Ok(self.new_expr(token.location, ExprKind::Await(Box::new(operand))))
            }
            TokenKind::Keyword(Keyword::Spawn) => {
                let token = self.advance();
                let operand = self.parse_precedence(PREC_UNARY)?;
                Ok(self.new_expr(token.location, ExprKind::Spawn(Box::new(operand))))
            }
            _ => {
                let primary = self.parse_primary()?;
                self.parse_postfix(primary)
            }
        }
    }

    fn parse_infix(&mut self, left: Expr, precedence: u8) -> Result<Expr> {
        let op_token = self.advance();
        let location = left.location;

        // `**` and the assignment forms are right-associative.
        let right_min = match op_token.kind {
            TokenKind::StarStar
            | TokenKind::Equal
            | TokenKind::PlusEqual
            | TokenKind::MinusEqual
            | TokenKind::StarEqual
            | TokenKind::SlashEqual
            | TokenKind::PercentEqual => precedence,
            _ => precedence + 1,
        };
        let right = self.parse_precedence(right_min)?;

        let kind = match op_token.kind {
            TokenKind::Equal => ExprKind::Assign {
                target: Box::new(left),
                value: Box::new(right),
                op: None,
            },
            TokenKind::PlusEqual => ExprKind::Assign {
                target: Box::new(left),
                value: Box::new(right),
                op: Some(BinaryOp::Add),
            },
            TokenKind::MinusEqual => ExprKind::Assign {
                target: Box::new(left),
                value: Box::new(right),
                op: Some(BinaryOp::Sub),
            },
            TokenKind::StarEqual => ExprKind::Assign {
                target: Box::new(left),
                value: Box::new(right),
                op: Some(BinaryOp::Mul),
            },
            TokenKind::SlashEqual => ExprKind::Assign {
                target: Box::new(left),
                value: Box::new(right),
                op: Some(BinaryOp::Div),
            },
            TokenKind::PercentEqual => ExprKind::Assign {
                target: Box::new(left),
                value: Box::new(right),
                op: Some(BinaryOp::Mod),
            },
            TokenKind::DotDot => ExprKind::Range {
                start: Box::new(left),
                end: Box::new(right),
                inclusive: false,
            },
            ref other => {
                let op = match binary_op_from_token(other) {
                    Some(op) => op,
                    None => return Err(self.error_here("Unexpected infix operator")),
                };
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
        };

        Ok(self.new_expr(location, kind))
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr> {
        loop {
            match &self.current.kind {
                TokenKind::LParen => {
                    self.advance();
                    let mut arguments = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            arguments.push(self.parse_expression()?);
                            if !self.match_kind(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&TokenKind::RParen, "Expected ')' after arguments")?;
                    let location = expr.location;
                    expr = self.new_expr(
                        location,
                        ExprKind::Call {
                            callee: Box::new(expr),
                            arguments,
                        },
                    );
                }
                TokenKind::LBracket => {
                    expr = self.parse_index_or_slice(expr)?;
                }
                TokenKind::Dot => {
                    self.advance();
                    let field = self.expect_identifier("Expected member name after '.'")?;
                    let location = expr.location;
                    expr = self.new_expr(
                        location,
                        ExprKind::Member {
                            object: Box::new(expr),
                            field: field.lexeme,
                        },
                    );
                }
                TokenKind::ColonColon => {
                    // Qualified names (`Color::Red`) fold into a single
                    // identifier, matching the symbol table's registration of
                    // enum variant constructors.
                    let qualifier = match &expr.kind {
                        ExprKind::Identifier(name) => name.clone(),
                        _ => return Err(self.error_here("Expected type name before '::'")),
                    };
                    self.advance();
                    let member = self.expect_identifier("Expected name after '::'")?;
                    let location = expr.location;
                    expr = self.new_expr(
                        location,
                        ExprKind::Identifier(format!("{qualifier}::{}", member.lexeme)),
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_index_or_slice(&mut self, object: Expr) -> Result<Expr> {
        self.expect(&TokenKind::LBracket, "Expected '['")?;
        let location = object.location;

        let start = if self.check(&TokenKind::Colon) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };

        if self.match_kind(&TokenKind::Colon) {
            let end = if self.check(&TokenKind::Colon) || self.check(&TokenKind::RBracket) {
                None
            } else {
                Some(Box::new(self.parse_expression()?))
            };
            let step = if self.match_kind(&TokenKind::Colon) {
                if self.check(&TokenKind::RBracket) {
                    None
                } else {
                    Some(Box::new(self.parse_expression()?))
                }
            } else {
                None
            };
            self.expect(&TokenKind::RBracket, "Expected ']' after slice")?;
            return Ok(self.new_expr(
                location,
                ExprKind::Slice {
                    object: Box::new(object),
                    start,
                    end,
                    step,
                },
            ));
        }

        let index = match start {
            Some(index) => index,
            None => return Err(self.error_here("Expected expression in index")),
        };
        self.expect(&TokenKind::RBracket, "Expected ']' after index")?;
        Ok(self.new_expr(
            location,
            ExprKind::Index {
                object: Box::new(object),
                index,
            },
        ))
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.current.clone();
        match token.kind {
            TokenKind::IntegerLiteral(value) => {
                self.advance();
                Ok(self.new_expr(token.location, ExprKind::IntLiteral(value)))
            }
            TokenKind::FloatLiteral(value) => {
                self.advance();
                Ok(self.new_expr(token.location, ExprKind::FloatLiteral(value)))
            }
            TokenKind::StringLiteral { value, fstring } => {
                self.advance();
                Ok(self.new_expr(token.location, ExprKind::StringLiteral { value, fstring }))
            }
            TokenKind::BooleanLiteral(value) => {
                self.advance();
                Ok(self.new_expr(token.location, ExprKind::BoolLiteral(value)))
            }
            TokenKind::NoneLiteral => {
                self.advance();
                Ok(self.new_expr(token.location, ExprKind::NoneLiteral))
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(self.new_expr(token.location, ExprKind::Identifier(token.lexeme)))
            }
            TokenKind::Keyword(Keyword::SelfValue) => {
                self.advance();
                Ok(self.new_expr(token.location, ExprKind::Identifier("self".to_string())))
            }
            TokenKind::LParen => self.parse_tuple_or_grouped(),
            TokenKind::LBracket => self.parse_list_or_comprehension(),
            TokenKind::LBrace => self.parse_dict_literal(),
            TokenKind::Pipe => self.parse_lambda(),
            _ => Err(self.error_here("Expected expression")),
        }
    }

    fn parse_tuple_or_grouped(&mut self) -> Result<Expr> {
        let open = self.expect(&TokenKind::LParen, "Expected '('")?;

        if self.match_kind(&TokenKind::RParen) {
            return Ok(self.new_expr(open.location, ExprKind::Tuple(Vec::new())));
        }

        let first = self.parse_expression()?;

        // A comma inside parentheses marks a tuple; a trailing comma is fine.
        if self.match_kind(&TokenKind::Comma) {
            let mut elements = vec![first];
            while !self.check(&TokenKind::RParen) {
                elements.push(self.parse_expression()?);
                if !self.match_kind(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RParen, "Expected ')' after tuple")?;
            return Ok(self.new_expr(open.location, ExprKind::Tuple(elements)));
        }

        self.expect(&TokenKind::RParen, "Expected ')' after expression")?;
        Ok(first)
    }

    fn parse_list_or_comprehension(&mut self) -> Result<Expr> {
        let open = self.expect(&TokenKind::LBracket, "Expected '['")?;

        if self.match_kind(&TokenKind::RBracket) {
            return Ok(self.new_expr(open.location, ExprKind::List(Vec::new())));
        }

        let first = self.parse_expression()?;

        if self.match_keyword(Keyword::For) {
            let var = self.expect_identifier("Expected variable in comprehension")?;
            self.expect_keyword(Keyword::In, "Expected 'in'")?;
            let iterable = self.parse_expression()?;
            let condition = if self.match_keyword(Keyword::If) {
                Some(Box::new(self.parse_expression()?))
            } else {
                None
            };
            self.expect(&TokenKind::RBracket, "Expected ']' after comprehension")?;
            return Ok(self.new_expr(
                open.location,
                ExprKind::ListComp {
                    element: Box::new(first),
                    var: var.lexeme,
                    iterable: Box::new(iterable),
                    condition,
                },
            ));
        }

        let mut elements = vec![first];
        while self.match_kind(&TokenKind::Comma) {
            if self.check(&TokenKind::RBracket) {
                break;
            }
            elements.push(self.parse_expression()?);
        }
        self.expect(&TokenKind::RBracket, "Expected ']' after list")?;
        Ok(self.new_expr(open.location, ExprKind::List(elements)))
    }

    fn parse_dict_literal(&mut self) -> Result<Expr> {
        let open = self.expect(&TokenKind::LBrace, "Expected '{'")?;

        if self.match_kind(&TokenKind::RBrace) {
            return Ok(self.new_expr(open.location, ExprKind::Dict(Vec::new())));
        }

        let mut entries = Vec::new();
        loop {
            let key = self.parse_expression()?;
            self.expect(&TokenKind::Colon, "Expected ':' in dict literal")?;
            let value = self.parse_expression()?;
            entries.push((key, value));

            if !self.match_kind(&TokenKind::Comma) {
                break;
            }
            if self.check(&TokenKind::RBrace) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "Expected '}' after dict literal")?;
        Ok(self.new_expr(open.location, ExprKind::Dict(entries)))
    }

    fn parse_lambda(&mut self) -> Result<Expr> {
        let open = self.expect(&TokenKind::Pipe, "Expected '|'")?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::Pipe) {
            loop {
                let name_token = self.expect_identifier("Expected parameter name in lambda")?;
                let declared_type = if self.match_kind(&TokenKind::Colon) {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                params.push(Param {
                    location: name_token.location,
                    name: name_token.lexeme,
                    declared_type,
                    default_value: None,
                    mutable: false,
                });
                if !self.match_kind(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::Pipe, "Expected '|' after lambda parameters")?;

        let return_type = if self.match_kind(&TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = if self.match_kind(&TokenKind::LBrace) {
            let inner = self.parse_expression()?;
            self.expect(&TokenKind::RBrace, "Expected '}' after lambda body")?;
            inner
        } else {
            self.parse_expression()?
        };

        Ok(self.new_expr(
            open.location,
            ExprKind::Lambda {
                params,
                return_type,
                body: Box::new(body),
            },
        ))
    }

    // === Types ===

    fn parse_type(&mut self) -> Result<TypeExpr> {
        let token = self.current.clone();
        match &token.kind {
            TokenKind::Ampersand => {
                self.advance();
                let mutable = self.match_keyword(Keyword::Mut);
                let inner = self.parse_type()?;
                Ok(TypeExpr {
                    location: token.location,
                    kind: TypeExprKind::Reference {
                        inner: Box::new(inner),
                        mutable,
                    },
                })
            }
            TokenKind::LBracket => {
                self.advance();
                let element = self.parse_type()?;
                let size = if self.match_kind(&TokenKind::Semicolon) {
                    let size_token =
                        self.expect(&TokenKind::IntegerLiteral(0), "Expected array size")?;
                    match size_token.kind {
                        TokenKind::IntegerLiteral(value) if value >= 0 => Some(value as usize),
                        _ => return Err(self.error_here("Expected array size")),
                    }
                } else {
                    None
                };
                self.expect(&TokenKind::RBracket, "Expected ']' after array type")?;
                Ok(TypeExpr {
                    location: token.location,
                    kind: TypeExprKind::Array {
                        element: Box::new(element),
                        size,
                    },
                })
            }
            TokenKind::LParen => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    loop {
                        elements.push(self.parse_type()?);
                        if !self.match_kind(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RParen, "Expected ')' after tuple type")?;
                Ok(TypeExpr {
                    location: token.location,
                    kind: TypeExprKind::Tuple(elements),
                })
            }
            TokenKind::Keyword(Keyword::Fn) => {
                self.advance();
                self.expect(&TokenKind::LParen, "Expected '(' in function type")?;
                let mut params = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    loop {
                        params.push(self.parse_type()?);
                        if !self.match_kind(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RParen, "Expected ')' in function type")?;
                let ret = if self.match_kind(&TokenKind::Arrow) {
                    Some(Box::new(self.parse_type()?))
                } else {
                    None
                };
                Ok(TypeExpr {
                    location: token.location,
                    kind: TypeExprKind::Function { params, ret },
                })
            }
            TokenKind::Keyword(Keyword::SelfType) => {
                self.advance();
                Ok(TypeExpr {
                    location: token.location,
                    kind: TypeExprKind::Simple("Self".to_string()),
                })
            }
            TokenKind::Identifier => {
                self.advance();
                if self.match_kind(&TokenKind::LBracket) {
                    let mut args = Vec::new();
                    loop {
                        args.push(self.parse_type()?);
                        if !self.match_kind(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(&TokenKind::RBracket, "Expected ']' after type arguments")?;
                    Ok(TypeExpr {
                        location: token.location,
                        kind: TypeExprKind::Generic {
                            name: token.lexeme,
                            args,
                        },
                    })
                } else {
                    Ok(TypeExpr {
                        location: token.location,
                        kind: TypeExprKind::Simple(token.lexeme),
                    })
                }
            }
            _ => Err(self.error_here("Expected type")),
        }
    }
}

fn binary_op_from_token(kind: &TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Mod,
        TokenKind::StarStar => BinaryOp::Pow,
        TokenKind::EqualEqual => BinaryOp::Eq,
        TokenKind::BangEqual => BinaryOp::Ne,
        TokenKind::Less => BinaryOp::Lt,
        TokenKind::LessEqual => BinaryOp::Le,
        TokenKind::Greater => BinaryOp::Gt,
        TokenKind::GreaterEqual => BinaryOp::Ge,
        TokenKind::Keyword(Keyword::And) => BinaryOp::And,
        TokenKind::Keyword(Keyword::Or) => BinaryOp::Or,
        TokenKind::Ampersand => BinaryOp::BitAnd,
        TokenKind::Pipe => BinaryOp::BitOr,
        TokenKind::Caret => BinaryOp::BitXor,
        TokenKind::ShiftLeft => BinaryOp::Shl,
        TokenKind::ShiftRight => BinaryOp::Shr,
        TokenKind::At => BinaryOp::MatMul,
        _ => return None,
    };
    Some(op)
}
