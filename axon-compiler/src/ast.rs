use crate::source::SourceLocation;

/// Parser-assigned identity of an expression node, used by the type checker
/// to record inferred types without mutating the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub declarations: Vec<Decl>,
    pub filename: String,
}

// === Type expressions ===

#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub location: SourceLocation,
    pub kind: TypeExprKind,
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    Simple(String),
    Generic {
        name: String,
        args: Vec<TypeExpr>,
    },
    Array {
        element: Box<TypeExpr>,
        size: Option<usize>,
    },
    Tuple(Vec<TypeExpr>),
    Function {
        params: Vec<TypeExpr>,
        ret: Option<Box<TypeExpr>>,
    },
    Reference {
        inner: Box<TypeExpr>,
        mutable: bool,
    },
}

// === Expressions ===

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub location: SourceLocation,
    pub kind: ExprKind,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral {
        value: String,
        fstring: bool,
    },
    BoolLiteral(bool),
    NoneLiteral,
    Identifier(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        object: Box<Expr>,
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Member {
        object: Box<Expr>,
        field: String,
    },
    Lambda {
        params: Vec<Param>,
        return_type: Option<TypeExpr>,
        body: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
    },
    List(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Tuple(Vec<Expr>),
    ListComp {
        element: Box<Expr>,
        var: String,
        iterable: Box<Expr>,
        condition: Option<Box<Expr>>,
    },
    Await(Box<Expr>),
    Spawn(Box<Expr>),
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        op: Option<BinaryOp>,
    },
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
        inclusive: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    MatMul,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

// === Statements ===

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expression(ExprStmt),
    VarDecl(VarDeclStmt),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    Match(MatchStmt),
    Return(ReturnStmt),
    Break(BreakStmt),
    Continue(ContinueStmt),
    Yield(YieldStmt),
}

#[derive(Debug, Clone)]
pub struct ExprStmt {
    pub expression: Expr,
}

#[derive(Debug, Clone)]
pub struct VarDeclStmt {
    pub location: SourceLocation,
    pub name: String,
    pub declared_type: Option<TypeExpr>,
    pub initializer: Option<Expr>,
    pub mutable: bool,
    pub is_const: bool,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub location: SourceLocation,
    pub condition: Expr,
    pub then_block: Block,
    pub elif_blocks: Vec<(Expr, Block)>,
    pub else_block: Option<Block>,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub location: SourceLocation,
    pub condition: Expr,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct ForStmt {
    pub location: SourceLocation,
    pub variable: String,
    pub iterable: Expr,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct MatchStmt {
    pub location: SourceLocation,
    pub value: Expr,
    pub arms: Vec<MatchArm>,
}

#[derive(Debug, Clone)]
pub struct MatchArm {
    pub location: SourceLocation,
    pub pattern: Expr,
    pub guard: Option<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct ReturnStmt {
    pub location: SourceLocation,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct BreakStmt {
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct ContinueStmt {
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct YieldStmt {
    pub location: SourceLocation,
    pub value: Expr,
}

// === Declarations ===

#[derive(Debug, Clone)]
pub enum Decl {
    Fn(FnDecl),
    Struct(StructDecl),
    Class(ClassDecl),
    Trait(TraitDecl),
    Impl(ImplDecl),
    Enum(EnumDecl),
    TypeAlias(TypeAliasDecl),
    Import(ImportDecl),
}

impl Decl {
    pub fn location(&self) -> SourceLocation {
        match self {
            Decl::Fn(decl) => decl.location,
            Decl::Struct(decl) => decl.location,
            Decl::Class(decl) => decl.location,
            Decl::Trait(decl) => decl.location,
            Decl::Impl(decl) => decl.location,
            Decl::Enum(decl) => decl.location,
            Decl::TypeAlias(decl) => decl.location,
            Decl::Import(decl) => decl.location,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub location: SourceLocation,
    pub name: String,
    pub declared_type: Option<TypeExpr>,
    pub default_value: Option<Expr>,
    pub mutable: bool,
}

#[derive(Debug, Clone)]
pub struct FnDecl {
    pub location: SourceLocation,
    pub name: String,
    pub type_params: Vec<String>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Block,
    pub is_async: bool,
    pub is_public: bool,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub location: SourceLocation,
    pub name: String,
    pub declared_type: TypeExpr,
    pub default_value: Option<Expr>,
    pub is_public: bool,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub location: SourceLocation,
    pub name: String,
    pub type_params: Vec<String>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<FnDecl>,
    pub is_public: bool,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub location: SourceLocation,
    pub name: String,
    pub type_params: Vec<String>,
    pub base: Option<String>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<FnDecl>,
    pub is_public: bool,
}

#[derive(Debug, Clone)]
pub struct TraitDecl {
    pub location: SourceLocation,
    pub name: String,
    pub type_params: Vec<String>,
    pub methods: Vec<FnDecl>,
    pub is_public: bool,
}

#[derive(Debug, Clone)]
pub struct ImplDecl {
    pub location: SourceLocation,
    pub type_name: String,
    pub trait_name: Option<String>,
    pub methods: Vec<FnDecl>,
}

#[derive(Debug, Clone)]
pub struct EnumVariantDecl {
    pub location: SourceLocation,
    pub name: String,
    pub fields: Vec<TypeExpr>,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub location: SourceLocation,
    pub name: String,
    pub type_params: Vec<String>,
    pub variants: Vec<EnumVariantDecl>,
    pub is_public: bool,
}

#[derive(Debug, Clone)]
pub struct TypeAliasDecl {
    pub location: SourceLocation,
    pub name: String,
    pub aliased: TypeExpr,
    pub is_public: bool,
}

#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub location: SourceLocation,
    pub module_path: String,
    pub alias: Option<String>,
    pub symbols: Vec<String>,
    pub import_all: bool,
}
