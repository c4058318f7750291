mod ast;
mod checker;
mod compiler;
mod diagnostics;
mod lexer;
mod lower;
mod parser;
mod source;
mod symbols;
mod types;

pub use crate::ast::{
    BinaryOp, Block, BreakStmt, ClassDecl, ContinueStmt, Decl, EnumDecl, EnumVariantDecl, Expr,
    ExprKind, ExprStmt, FieldDecl, FnDecl, ForStmt, IfStmt, ImplDecl, ImportDecl, MatchArm,
    MatchStmt, NodeId, Param, Program, ReturnStmt, Stmt, StructDecl, TraitDecl, TypeAliasDecl,
    TypeExpr, TypeExprKind, UnaryOp, VarDeclStmt, WhileStmt, YieldStmt,
};
pub use crate::checker::TypeChecker;
pub use crate::compiler::{Compilation, CompileOptions, Compiler};
pub use crate::diagnostics::{Diagnostic, DiagnosticLevel, Diagnostics};
pub use crate::lexer::{Keyword, Lexer, LexerError, Token, TokenKind};
pub use crate::lower::Lowerer;
pub use crate::parser::Parser;
pub use crate::source::{SourceFile, SourceId, SourceLocation};
pub use crate::symbols::{
    ClassDef, EnumDef, EnumVariantDef, FieldDef, NominalDef, Scope, ScopeKind, StructDef, Symbol,
    SymbolKind, SymbolTable, TraitDef,
};
pub use crate::types::{common_type, is_assignable, substitute, Type};
