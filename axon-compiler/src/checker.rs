use std::collections::{HashMap, HashSet};

use crate::ast::*;
use crate::diagnostics::Diagnostics;
use crate::source::SourceLocation;
use crate::symbols::{
    ClassDef, EnumDef, EnumVariantDef, FieldDef, NominalDef, ScopeKind, StructDef, Symbol,
    SymbolKind, SymbolTable, TraitDef,
};
use crate::types::{common_type, is_assignable, Type};

/// Two-pass semantic analyzer. Pass 1 hoists user-defined type names into the
/// registry so bodies may reference each other; pass 2 checks declarations in
/// source order, inferring a type for every expression.
///
/// Diagnostics accumulate and never unwind: each error produces a best-effort
/// `Unknown` so sibling nodes still see a shape-consistent tree.
pub struct TypeChecker {
    symbols: SymbolTable,
    diagnostics: Diagnostics,
    next_type_var: usize,
    type_var_bindings: HashMap<usize, Type>,
    type_params: Vec<HashSet<String>>,
    expr_types: HashMap<NodeId, Type>,
}

impl TypeChecker {
    pub fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
            diagnostics: Diagnostics::new(),
            next_type_var: 0,
            type_var_bindings: HashMap::new(),
            type_params: Vec::new(),
            expr_types: HashMap::new(),
        }
    }

    pub fn check(&mut self, program: &Program) {
        // Pass 1: hoist nominal type names so forward references resolve.
        for decl in &program.declarations {
            self.hoist_declaration(decl);
        }
        // Pass 2: check bodies in declaration order.
        for decl in &program.declarations {
            self.check_declaration(decl);
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

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Inferred type of an expression node, with type variables resolved.
    /// The assignment is made once per node and never changes afterwards.
    pub fn expr_type(&self, id: NodeId) -> Option<Type> {
        self.expr_types.get(&id).map(|ty| self.resolve_vars(ty))
    }

    // === Error helpers ===

    fn error(&mut self, message: impl Into<String>, location: SourceLocation) {
        self.diagnostics.push_error(message, Some(location));
    }

    fn error_type_mismatch(&mut self, expected: &Type, actual: &Type, location: SourceLocation) {
        let expected = self.resolve_vars(expected);
        let actual = self.resolve_vars(actual);
        self.error(
            format!("Type mismatch: expected {expected}, got {actual}"),
            location,
        );
    }

    fn error_undefined(&mut self, name: &str, location: SourceLocation) {
        self.error(format!("Undefined symbol '{name}'"), location);
    }

    fn error_redefinition(&mut self, name: &str, location: SourceLocation) {
        self.error(format!("Redefinition of '{name}'"), location);
    }

    // === Type variables ===

    fn fresh_type_var(&mut self) -> Type {
        let id = self.next_type_var;
        self.next_type_var += 1;
        Type::TypeVar(id)
    }

    /// Substitutes resolved type-variable bindings throughout a type.
    fn resolve_vars(&self, ty: &Type) -> Type {
        match ty {
            Type::TypeVar(id) => match self.type_var_bindings.get(id) {
                Some(bound) => self.resolve_vars(bound),
                None => ty.clone(),
            },
            Type::Array { element, size } => Type::Array {
                element: Box::new(self.resolve_vars(element)),
                size: *size,
            },
            Type::List(element) => Type::List(Box::new(self.resolve_vars(element))),
            Type::Dict { key, value } => Type::Dict {
                key: Box::new(self.resolve_vars(key)),
                value: Box::new(self.resolve_vars(value)),
            },
            Type::Tuple(elements) => Type::Tuple(
                elements
                    .iter()
                    .map(|element| self.resolve_vars(element))
                    .collect(),
            ),
            Type::Function {
                params,
                ret,
                is_async,
            } => Type::Function {
                params: params.iter().map(|param| self.resolve_vars(param)).collect(),
                ret: Box::new(self.resolve_vars(ret)),
                is_async: *is_async,
            },
            Type::Optional(inner) => Type::Optional(Box::new(self.resolve_vars(inner))),
            Type::Reference { inner, mutable } => Type::Reference {
                inner: Box::new(self.resolve_vars(inner)),
                mutable: *mutable,
            },
            Type::Result { ok, err } => Type::Result {
                ok: Box::new(self.resolve_vars(ok)),
                err: Box::new(self.resolve_vars(err)),
            },
            other => other.clone(),
        }
    }

    fn bind_type_var(&mut self, id: usize, ty: &Type) {
        if matches!(ty, Type::TypeVar(other) if *other == id) {
            return;
        }
        self.type_var_bindings.insert(id, ty.clone());
    }

    /// Assignability with unification: unresolved type variables bind to
    /// whatever they are compared against, and structural types are walked so
    /// inner variables (e.g. the element of an empty list literal) resolve.
    fn types_compatible(&mut self, from: &Type, to: &Type) -> bool {
        let from = self.resolve_vars(from);
        let to = self.resolve_vars(to);

        match (&from, &to) {
            (Type::TypeVar(id), other) | (other, Type::TypeVar(id)) => {
                self.bind_type_var(*id, other);
                true
            }
            (Type::List(a), Type::List(b)) => self.types_compatible(a, b),
            (
                Type::Dict {
                    key: ak,
                    value: av,
                },
                Type::Dict {
                    key: bk,
                    value: bv,
                },
            ) => self.types_compatible(ak, bk) && self.types_compatible(av, bv),
            (
                Type::Array {
                    element: ae,
                    size: asz,
                },
                Type::Array {
                    element: be,
                    size: bsz,
                },
            ) => self.types_compatible(ae, be) && (asz == bsz || bsz.is_none()),
            (Type::Tuple(a), Type::Tuple(b)) if a.len() == b.len() => a
                .iter()
                .zip(b.iter())
                .all(|(x, y)| self.types_compatible(x, y)),
            (
                Type::Function {
                    params: ap,
                    ret: ar,
                    ..
                },
                Type::Function {
                    params: bp,
                    ret: br,
                    ..
                },
            ) if ap.len() == bp.len() => {
                ap.iter()
                    .zip(bp.iter())
                    .all(|(x, y)| self.types_compatible(x, y))
                    && self.types_compatible(ar, br)
            }
            (Type::Optional(a), Type::Optional(b)) => self.types_compatible(a, b),
            (_, Type::Optional(inner)) => self.types_compatible(&from, inner),
            _ => is_assignable(&from, &to),
        }
    }

    fn ensure_assignable(&mut self, from: &Type, to: &Type, location: SourceLocation) -> bool {
        if self.types_compatible(from, to) {
            true
        } else {
            self.error_type_mismatch(to, from, location);
            false
        }
    }

    /// Unknown, unresolved type variables, and unsubstituted generics are
    /// treated as opaque: operand-class checks stay silent for them so a
    /// single failure does not cascade.
    fn is_opaque(&self, ty: &Type) -> bool {
        match ty {
            Type::Unknown | Type::Generic(_) => true,
            Type::TypeVar(id) => !self.type_var_bindings.contains_key(id),
            _ => false,
        }
    }

    // === Type resolution ===

    fn push_type_params(&mut self, names: &[String]) {
        self.type_params.push(names.iter().cloned().collect());
    }

    fn pop_type_params(&mut self) {
        self.type_params.pop();
    }

    fn is_type_param(&self, name: &str) -> bool {
        self.type_params.iter().any(|scope| scope.contains(name))
    }

    fn resolve_type(&mut self, type_expr: &TypeExpr) -> Type {
        match &type_expr.kind {
            TypeExprKind::Simple(name) => self.resolve_simple_type(name),
            TypeExprKind::Generic { name, args } => {
                let resolved: Vec<Type> = args.iter().map(|arg| self.resolve_type(arg)).collect();
                self.resolve_generic_type(name, resolved, type_expr.location)
            }
            TypeExprKind::Array { element, size } => Type::Array {
                element: Box::new(self.resolve_type(element)),
                size: *size,
            },
            TypeExprKind::Tuple(elements) => Type::Tuple(
                elements
                    .iter()
                    .map(|element| self.resolve_type(element))
                    .collect(),
            ),
            TypeExprKind::Function { params, ret } => {
                let params = params.iter().map(|param| self.resolve_type(param)).collect();
                let ret = match ret {
                    Some(ret) => self.resolve_type(ret),
                    None => Type::Void,
                };
                Type::function(params, ret)
            }
            TypeExprKind::Reference { inner, mutable } => Type::Reference {
                inner: Box::new(self.resolve_type(inner)),
                mutable: *mutable,
            },
        }
    }

    fn resolve_simple_type(&mut self, name: &str) -> Type {
        if self.is_type_param(name) {
            return Type::Generic(name.to_string());
        }
        match self.symbols.lookup_type(name) {
            Some(ty) => ty.clone(),
            // Unresolved names (including the implicit `Self`) stay Unknown.
            None => Type::Unknown,
        }
    }

    fn resolve_generic_type(
        &mut self,
        name: &str,
        mut args: Vec<Type>,
        location: SourceLocation,
    ) -> Type {
        match (name, args.len()) {
            ("List", 1) => Type::List(Box::new(args.remove(0))),
            ("Dict", 2) => {
                let value = args.pop().unwrap_or(Type::Unknown);
                let key = args.pop().unwrap_or(Type::Unknown);
                Type::Dict {
                    key: Box::new(key),
                    value: Box::new(value),
                }
            }
            ("Optional", 1) => Type::Optional(Box::new(args.remove(0))),
            ("Result", 2) => {
                let err = args.pop().unwrap_or(Type::Unknown);
                let ok = args.pop().unwrap_or(Type::Unknown);
                Type::Result {
                    ok: Box::new(ok),
                    err: Box::new(err),
                }
            }
            _ => {
                // User-defined generic reference: type arguments are recorded
                // by the parse but not substituted at use sites in this core.
                match self.symbols.lookup_type(name) {
                    Some(ty) => ty.clone(),
                    None => {
                        self.error(format!("Unknown generic type '{name}'"), location);
                        Type::Unknown
                    }
                }
            }
        }
    }

    // === Declarations ===

    fn hoist_declaration(&mut self, decl: &Decl) {
        let (name, location, ty, def) = match decl {
            Decl::Struct(decl) => (
                &decl.name,
                decl.location,
                Type::Struct(decl.name.clone()),
                NominalDef::Struct(StructDef {
                    type_params: decl.type_params.clone(),
                    fields: Vec::new(),
                }),
            ),
            Decl::Class(decl) => (
                &decl.name,
                decl.location,
                Type::Class(decl.name.clone()),
                NominalDef::Class(ClassDef {
                    type_params: decl.type_params.clone(),
                    fields: Vec::new(),
                    base: None,
                }),
            ),
            Decl::Enum(decl) => (
                &decl.name,
                decl.location,
                Type::Enum(decl.name.clone()),
                NominalDef::Enum(EnumDef {
                    type_params: decl.type_params.clone(),
                    variants: Vec::new(),
                }),
            ),
            Decl::Trait(decl) => (
                &decl.name,
                decl.location,
                Type::Trait(decl.name.clone()),
                NominalDef::Trait(TraitDef {
                    type_params: decl.type_params.clone(),
                    methods: Vec::new(),
                }),
            ),
            _ => return,
        };

        if self.symbols.lookup_type(name).is_some() {
            self.error_redefinition(name, location);
            return;
        }
        self.symbols.register_type(name.clone(), ty);
        self.symbols.define_nominal(name.clone(), def);
    }

    fn check_declaration(&mut self, decl: &Decl) {
        match decl {
            Decl::Fn(decl) => self.check_function(decl),
            Decl::Struct(decl) => self.check_struct(decl),
            Decl::Class(decl) => self.check_class(decl),
            Decl::Trait(decl) => self.check_trait(decl),
            Decl::Impl(decl) => self.check_impl(decl),
            Decl::Enum(decl) => self.check_enum(decl),
            Decl::TypeAlias(decl) => self.check_type_alias(decl),
            Decl::Import(_) => {
                // No module resolution in this core; the declaration stands.
            }
        }
    }

    fn function_param_types(&mut self, decl: &FnDecl) -> Vec<Type> {
        decl.params
            .iter()
            .map(|param| match &param.declared_type {
                Some(annotation) => self.resolve_type(annotation),
                None => Type::Unknown,
            })
            .collect()
    }

    fn check_function(&mut self, decl: &FnDecl) {
        self.push_type_params(&decl.type_params);

        let param_types = self.function_param_types(decl);
        let return_type = match &decl.return_type {
            Some(annotation) => self.resolve_type(annotation),
            None => Type::Void,
        };

        let fn_type = Type::Function {
            params: param_types.clone(),
            ret: Box::new(return_type.clone()),
            is_async: decl.is_async,
        };

        let mut symbol = Symbol::new(&decl.name, SymbolKind::Function, fn_type);
        symbol.public = decl.is_public;
        symbol.initialized = true;
        symbol.location = decl.location;
        symbol.type_params = decl.type_params.clone();
        if !self.symbols.define(symbol) {
            self.error_redefinition(&decl.name, decl.location);
        }

        self.symbols.enter_scope(ScopeKind::Function);
        self.symbols.current_scope_mut().expected_return_type = Some(return_type.clone());

        for (param, param_type) in decl.params.iter().zip(param_types.iter()) {
            let mut symbol = Symbol::new(&param.name, SymbolKind::Parameter, param_type.clone());
            symbol.mutable = param.mutable;
            symbol.initialized = true;
            symbol.location = param.location;
            self.symbols.define(symbol);

            if let Some(default) = &param.default_value {
                let default_type = self.infer_expr(default);
                self.ensure_assignable(&default_type, param_type, param.location);
            }
        }

        self.check_block(&decl.body);

        let has_return = self.symbols.current_function_has_return();
        if !matches!(return_type, Type::Void | Type::Unknown) && !has_return {
            self.error(
                format!("Function '{}' must return a value", decl.name),
                decl.location,
            );
        }

        self.symbols.exit_scope();
        self.pop_type_params();
    }

    fn check_struct(&mut self, decl: &StructDecl) {
        self.symbols.enter_scope(ScopeKind::Struct);
        self.push_type_params(&decl.type_params);

        let mut fields = Vec::new();
        let mut seen = HashSet::new();
        for field in &decl.fields {
            if !seen.insert(field.name.clone()) {
                self.error(
                    format!("Duplicate field '{}' in struct '{}'", field.name, decl.name),
                    field.location,
                );
                continue;
            }
            let field_type = self.resolve_type(&field.declared_type);
            if let Some(default) = &field.default_value {
                let default_type = self.infer_expr(default);
                self.ensure_assignable(&default_type, &field_type, field.location);
            }
            fields.push(FieldDef {
                name: field.name.clone(),
                ty: field_type,
                public: field.is_public,
            });
        }

        if let Some(NominalDef::Struct(def)) = self.symbols.nominal_mut(&decl.name) {
            def.fields = fields;
        }

        for method in &decl.methods {
            self.check_function(method);
        }

        self.pop_type_params();
        self.symbols.exit_scope();
    }

    fn check_class(&mut self, decl: &ClassDecl) {
        self.symbols.enter_scope(ScopeKind::Class);
        self.push_type_params(&decl.type_params);

        let mut fields = Vec::new();
        let mut seen = HashSet::new();
        for field in &decl.fields {
            if !seen.insert(field.name.clone()) {
                self.error(
                    format!("Duplicate field '{}' in class '{}'", field.name, decl.name),
                    field.location,
                );
                continue;
            }
            let field_type = self.resolve_type(&field.declared_type);
            if let Some(default) = &field.default_value {
                let default_type = self.infer_expr(default);
                self.ensure_assignable(&default_type, &field_type, field.location);
            }
            fields.push(FieldDef {
                name: field.name.clone(),
                ty: field_type,
                public: field.is_public,
            });
        }

        if let Some(NominalDef::Class(def)) = self.symbols.nominal_mut(&decl.name) {
            def.fields = fields;
            def.base = decl.base.clone();
        }

        for method in &decl.methods {
            self.check_function(method);
        }

        self.pop_type_params();
        self.symbols.exit_scope();
    }

    fn check_trait(&mut self, decl: &TraitDecl) {
        self.symbols.enter_scope(ScopeKind::Trait);
        self.push_type_params(&decl.type_params);

        let mut methods = Vec::new();
        for method in &decl.methods {
            let param_types = self.function_param_types(method);
            let return_type = match &method.return_type {
                Some(annotation) => self.resolve_type(annotation),
                None => Type::Void,
            };
            methods.push((
                method.name.clone(),
                Type::Function {
                    params: param_types,
                    ret: Box::new(return_type),
                    is_async: method.is_async,
                },
            ));
            // Default bodies are checked like ordinary functions.
            self.check_function(method);
        }

        if let Some(NominalDef::Trait(def)) = self.symbols.nominal_mut(&decl.name) {
            def.methods = methods;
        }

        self.pop_type_params();
        self.symbols.exit_scope();
    }

    fn check_impl(&mut self, decl: &ImplDecl) {
        // Trait conformance is not verified in this core; the methods are
        // checked like any other function.
        self.symbols.enter_scope(ScopeKind::Impl);
        for method in &decl.methods {
            self.check_function(method);
        }
        self.symbols.exit_scope();
    }

    fn check_enum(&mut self, decl: &EnumDecl) {
        self.push_type_params(&decl.type_params);

        let enum_type = Type::Enum(decl.name.clone());
        let mut variants = Vec::new();
        for variant in &decl.variants {
            let field_types: Vec<Type> = variant
                .fields
                .iter()
                .map(|field| self.resolve_type(field))
                .collect();

            // Each variant doubles as a constructor function under the
            // qualified name `Enum::Variant`.
            let ctor_type = Type::function(field_types.clone(), enum_type.clone());
            let qualified = format!("{}::{}", decl.name, variant.name);
            let mut symbol = Symbol::new(qualified.clone(), SymbolKind::EnumVariant, ctor_type);
            symbol.initialized = true;
            symbol.location = variant.location;
            if !self.symbols.define(symbol) {
                self.error_redefinition(&qualified, variant.location);
            }

            variants.push(EnumVariantDef {
                name: variant.name.clone(),
                fields: field_types,
            });
        }

        if let Some(NominalDef::Enum(def)) = self.symbols.nominal_mut(&decl.name) {
            def.variants = variants;
        }

        self.pop_type_params();
    }

    fn check_type_alias(&mut self, decl: &TypeAliasDecl) {
        let aliased = self.resolve_type(&decl.aliased);
        self.symbols.register_type(decl.name.clone(), aliased);
    }

    // === Statements ===

    fn check_block(&mut self, block: &Block) {
        self.symbols.enter_scope(ScopeKind::Block);
        for stmt in &block.statements {
            self.check_statement(stmt);
        }
        self.symbols.exit_scope();
    }

    fn check_statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expression(stmt) => {
                self.infer_expr(&stmt.expression);
            }
            Stmt::VarDecl(stmt) => self.check_var_decl(stmt),
            Stmt::If(stmt) => self.check_if(stmt),
            Stmt::While(stmt) => self.check_while(stmt),
            Stmt::For(stmt) => self.check_for(stmt),
            Stmt::Match(stmt) => self.check_match(stmt),
            Stmt::Return(stmt) => self.check_return(stmt),
            Stmt::Break(stmt) => {
                if !self.symbols.in_loop() {
                    self.error("'break' outside of loop", stmt.location);
                }
            }
            Stmt::Continue(stmt) => {
                if !self.symbols.in_loop() {
                    self.error("'continue' outside of loop", stmt.location);
                }
            }
            Stmt::Yield(stmt) => {
                // Generator semantics are not modeled; the operand is checked
                // so its names resolve.
                self.infer_expr(&stmt.value);
            }
        }
    }

    fn check_var_decl(&mut self, stmt: &VarDeclStmt) {
        let declared = stmt
            .declared_type
            .as_ref()
            .map(|annotation| self.resolve_type(annotation));
        let inferred = stmt
            .initializer
            .as_ref()
            .map(|initializer| self.infer_expr(initializer));

        let var_type = match (declared, inferred) {
            (Some(declared), Some(inferred)) => {
                self.ensure_assignable(&inferred, &declared, stmt.location);
                declared
            }
            (Some(declared), None) => declared,
            (None, Some(inferred)) => inferred,
            (None, None) => {
                self.error(
                    format!("Cannot determine type of '{}'", stmt.name),
                    stmt.location,
                );
                Type::Unknown
            }
        };

        let mut symbol = Symbol::new(&stmt.name, SymbolKind::Variable, var_type);
        symbol.mutable = stmt.mutable;
        symbol.initialized = stmt.initializer.is_some();
        symbol.location = stmt.location;
        if !self.symbols.define(symbol) {
            self.error_redefinition(&stmt.name, stmt.location);
        }
    }

    fn check_condition(&mut self, condition: &Expr) {
        let condition_type = self.infer_expr(condition);
        let resolved = self.resolve_vars(&condition_type);
        if !matches!(resolved, Type::Bool) && !self.is_opaque(&resolved) {
            self.error("Condition must be bool", condition.location);
        }
    }

    fn check_if(&mut self, stmt: &IfStmt) {
        self.check_condition(&stmt.condition);
        self.check_block(&stmt.then_block);
        for (condition, block) in &stmt.elif_blocks {
            self.check_condition(condition);
            self.check_block(block);
        }
        if let Some(block) = &stmt.else_block {
            self.check_block(block);
        }
    }

    fn check_while(&mut self, stmt: &WhileStmt) {
        self.check_condition(&stmt.condition);
        self.symbols.enter_scope(ScopeKind::Loop);
        self.check_block(&stmt.body);
        self.symbols.exit_scope();
    }

    /// Element type a `for` loop binds its variable to. Ranges are typed as
    /// List[i64], so the i64 fallback covers them.
    fn element_type_of(&self, iterable: &Type) -> Type {
        match self.resolve_vars(iterable) {
            Type::List(element) => *element,
            Type::Array { element, .. } => *element,
            _ => Type::I64,
        }
    }

    fn check_for(&mut self, stmt: &ForStmt) {
        let iterable_type = self.infer_expr(&stmt.iterable);
        let element_type = self.element_type_of(&iterable_type);

        self.symbols.enter_scope(ScopeKind::Loop);
        let mut symbol = Symbol::new(&stmt.variable, SymbolKind::Variable, element_type);
        symbol.initialized = true;
        symbol.location = stmt.location;
        self.symbols.define(symbol);

        self.check_block(&stmt.body);
        self.symbols.exit_scope();
    }

    fn check_match(&mut self, stmt: &MatchStmt) {
        let value_type = self.infer_expr(&stmt.value);

        for arm in &stmt.arms {
            // Patterns are checked as plain expressions in this core.
            let pattern_type = self.infer_expr(&arm.pattern);
            let _ = self.types_compatible(&pattern_type, &value_type);

            if let Some(guard) = &arm.guard {
                let guard_type = self.infer_expr(guard);
                let resolved = self.resolve_vars(&guard_type);
                if !matches!(resolved, Type::Bool) && !self.is_opaque(&resolved) {
                    self.error("Match guard must be bool", guard.location);
                }
            }
            self.check_block(&arm.body);
        }
    }

    fn check_return(&mut self, stmt: &ReturnStmt) {
        if !self.symbols.in_function() {
            self.error("'return' outside of function", stmt.location);
            return;
        }

        self.symbols.mark_current_function_has_return();

        let expected = self.symbols.current_return_type();
        match (&stmt.value, expected) {
            (Some(value), Some(expected)) => {
                let actual = self.infer_expr(value);
                self.ensure_assignable(&actual, &expected, stmt.location);
            }
            (Some(value), None) => {
                self.infer_expr(value);
            }
            (None, Some(expected)) => {
                if !matches!(expected, Type::Void | Type::Unknown) {
                    self.error(
                        format!("Expected return value of type {expected}"),
                        stmt.location,
                    );
                }
            }
            (None, None) => {}
        }
    }

    // === Expression inference ===

    fn infer_expr(&mut self, expr: &Expr) -> Type {
        let ty = self.infer_expr_kind(expr);
        self.expr_types.entry(expr.id).or_insert_with(|| ty.clone());
        ty
    }

    fn infer_expr_kind(&mut self, expr: &Expr) -> Type {
        match &expr.kind {
            ExprKind::IntLiteral(_) => Type::I64,
            ExprKind::FloatLiteral(_) => Type::F64,
            // F-strings are observed as their raw body here; downstream
            // consumers treat them identically to plain strings.
            ExprKind::StringLiteral { .. } => Type::Str,
            ExprKind::BoolLiteral(_) => Type::Bool,
            ExprKind::NoneLiteral => {
                let inner = self.fresh_type_var();
                Type::Optional(Box::new(inner))
            }
            ExprKind::Identifier(name) => match self.symbols.lookup(name) {
                Some(symbol) => symbol.ty.clone(),
                None => {
                    self.error_undefined(name, expr.location);
                    Type::Unknown
                }
            },
            ExprKind::Binary { op, left, right } => self.infer_binary(*op, left, right),
            ExprKind::Unary { op, operand } => self.infer_unary(*op, operand),
            ExprKind::Call { callee, arguments } => self.infer_call(callee, arguments, expr.location),
            ExprKind::Index { object, index } => self.infer_index(object, index),
            ExprKind::Slice {
                object,
                start,
                end,
                step,
            } => self.infer_slice(object, start, end, step),
            ExprKind::Member { object, field } => self.infer_member(object, field, expr.location),
            ExprKind::Lambda {
                params,
                return_type,
                body,
            } => self.infer_lambda(params, return_type, body),
            ExprKind::Ternary {
                condition,
                then_value,
                else_value,
            } => self.infer_ternary(condition, then_value, else_value),
            ExprKind::List(elements) => self.infer_list(elements),
            ExprKind::Dict(entries) => self.infer_dict(entries),
            ExprKind::Tuple(elements) => Type::Tuple(
                elements
                    .iter()
                    .map(|element| self.infer_expr(element))
                    .collect(),
            ),
            ExprKind::ListComp {
                element,
                var,
                iterable,
                condition,
            } => self.infer_list_comp(element, var, iterable, condition),
            // Future unwrapping is not modeled; await and spawn pass the
            // operand type through.
            ExprKind::Await(operand) => self.infer_expr(operand),
            ExprKind::Spawn(operand) => self.infer_expr(operand),
            ExprKind::Assign { target, value, .. } => self.infer_assign(target, value, expr.location),
            ExprKind::Range { start, end, .. } => self.infer_range(start, end),
        }
    }

    fn infer_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Type {
        let left_type = self.infer_expr(left);
        let right_type = self.infer_expr(right);
        let left_resolved = self.resolve_vars(&left_type);
        let right_resolved = self.resolve_vars(&right_type);

        if op.is_arithmetic() {
            if !left_resolved.is_numeric() && !self.is_opaque(&left_resolved) {
                self.error("Left operand must be numeric", left.location);
            }
            if !right_resolved.is_numeric() && !self.is_opaque(&right_resolved) {
                self.error("Right operand must be numeric", right.location);
            }
            return common_type(&left_resolved, &right_resolved);
        }

        if op.is_comparison() {
            return Type::Bool;
        }

        if op.is_logical() {
            if !matches!(left_resolved, Type::Bool) && !self.is_opaque(&left_resolved) {
                self.error("Left operand must be bool", left.location);
            }
            if !matches!(right_resolved, Type::Bool) && !self.is_opaque(&right_resolved) {
                self.error("Right operand must be bool", right.location);
            }
            return Type::Bool;
        }

        if op.is_bitwise() {
            if !left_resolved.is_integer() && !self.is_opaque(&left_resolved) {
                self.error("Left operand must be integer", left.location);
            }
            if !right_resolved.is_integer() && !self.is_opaque(&right_resolved) {
                self.error("Right operand must be integer", right.location);
            }
            return left_resolved;
        }

        // Matrix multiplication passes the left type through.
        left_resolved
    }

    fn infer_unary(&mut self, op: UnaryOp, operand: &Expr) -> Type {
        let operand_type = self.infer_expr(operand);
        let resolved = self.resolve_vars(&operand_type);

        match op {
            UnaryOp::Neg => {
                if !resolved.is_numeric() && !self.is_opaque(&resolved) {
                    self.error("Operand must be numeric", operand.location);
                }
                resolved
            }
            UnaryOp::Not => {
                if !matches!(resolved, Type::Bool) && !self.is_opaque(&resolved) {
                    self.error("Operand must be bool", operand.location);
                }
                Type::Bool
            }
            UnaryOp::BitNot => {
                if !resolved.is_integer() && !self.is_opaque(&resolved) {
                    self.error("Operand must be integer", operand.location);
                }
                resolved
            }
        }
    }

    fn infer_call(&mut self, callee: &Expr, arguments: &[Expr], location: SourceLocation) -> Type {
        let callee_type = self.infer_expr(callee);
        let resolved = self.resolve_vars(&callee_type);

        let (params, ret) = match resolved {
            Type::Function { params, ret, .. } => (params, *ret),
            other => {
                for argument in arguments {
                    self.infer_expr(argument);
                }
                if !self.is_opaque(&other) {
                    self.error("Cannot call non-function type", callee.location);
                }
                return Type::Unknown;
            }
        };

        if arguments.len() != params.len() {
            self.error(
                format!(
                    "Expected {} arguments, got {}",
                    params.len(),
                    arguments.len()
                ),
                location,
            );
        }

        for (argument, param) in arguments.iter().zip(params.iter()) {
            let argument_type = self.infer_expr(argument);
            self.ensure_assignable(&argument_type, param, argument.location);
        }
        // Arguments past the declared arity still get their types inferred.
        for argument in arguments.iter().skip(params.len()) {
            self.infer_expr(argument);
        }

        ret
    }

    fn infer_index(&mut self, object: &Expr, index: &Expr) -> Type {
        let object_type = self.infer_expr(object);
        self.infer_expr(index);
        let resolved = self.resolve_vars(&object_type);

        match resolved {
            Type::List(element) => *element,
            Type::Array { element, .. } => *element,
            Type::Dict { value, .. } => *value,
            // Without a constant-index analysis the first element stands in
            // for the whole tuple.
            Type::Tuple(elements) => elements.first().cloned().unwrap_or(Type::Unknown),
            Type::Str => Type::Char,
            other => {
                if !self.is_opaque(&other) {
                    self.error(format!("Cannot index type {other}"), object.location);
                }
                Type::Unknown
            }
        }
    }

    fn infer_slice(
        &mut self,
        object: &Expr,
        start: &Option<Box<Expr>>,
        end: &Option<Box<Expr>>,
        step: &Option<Box<Expr>>,
    ) -> Type {
        let object_type = self.infer_expr(object);

        for bound in [start, end, step].into_iter().flatten() {
            let bound_type = self.infer_expr(bound);
            let resolved = self.resolve_vars(&bound_type);
            if !resolved.is_integer() && !self.is_opaque(&resolved) {
                self.error("Slice bound must be integer", bound.location);
            }
        }

        // Slicing yields the same container shape as the operand.
        match self.resolve_vars(&object_type) {
            list @ Type::List(_) => list,
            Type::Array { element, .. } => Type::Array {
                element,
                size: None,
            },
            Type::Str => Type::Str,
            other => {
                if !self.is_opaque(&other) {
                    self.error(format!("Cannot slice type {other}"), object.location);
                }
                Type::Unknown
            }
        }
    }

    fn infer_member(&mut self, object: &Expr, field: &str, location: SourceLocation) -> Type {
        let object_type = self.infer_expr(object);
        let resolved = self.resolve_vars(&object_type);

        match &resolved {
            Type::Struct(name) => match self.symbols.struct_def(name).and_then(|def| def.field(field))
            {
                Some(field_def) => field_def.ty.clone(),
                None => {
                    self.error(
                        format!("Struct '{name}' has no field '{field}'"),
                        location,
                    );
                    Type::Unknown
                }
            },
            Type::Class(name) => match self.symbols.class_def(name).and_then(|def| def.field(field))
            {
                Some(field_def) => field_def.ty.clone(),
                None => {
                    self.error(format!("Class '{name}' has no field '{field}'"), location);
                    Type::Unknown
                }
            },
            other => {
                if !self.is_opaque(other) {
                    self.error(format!("Cannot access member on type {other}"), location);
                }
                Type::Unknown
            }
        }
    }

    fn infer_lambda(
        &mut self,
        params: &[Param],
        return_type: &Option<TypeExpr>,
        body: &Expr,
    ) -> Type {
        self.symbols.enter_scope(ScopeKind::Function);

        let mut param_types = Vec::with_capacity(params.len());
        for param in params {
            let param_type = match &param.declared_type {
                Some(annotation) => self.resolve_type(annotation),
                None => self.fresh_type_var(),
            };
            param_types.push(param_type.clone());

            let mut symbol = Symbol::new(&param.name, SymbolKind::Parameter, param_type);
            symbol.initialized = true;
            symbol.location = param.location;
            self.symbols.define(symbol);
        }

        let body_type = self.infer_expr(body);
        self.symbols.exit_scope();

        let ret = match return_type {
            Some(annotation) => {
                let declared = self.resolve_type(annotation);
                self.ensure_assignable(&body_type, &declared, body.location);
                declared
            }
            None => body_type,
        };

        Type::function(param_types, ret)
    }

    fn infer_ternary(&mut self, condition: &Expr, then_value: &Expr, else_value: &Expr) -> Type {
        self.check_condition(condition);
        let then_type = self.infer_expr(then_value);
        let else_type = self.infer_expr(else_value);
        let then_resolved = self.resolve_vars(&then_type);
        let else_resolved = self.resolve_vars(&else_type);

        if then_resolved == else_resolved {
            return then_resolved;
        }
        if then_resolved.is_numeric() && else_resolved.is_numeric() {
            return common_type(&then_resolved, &else_resolved);
        }
        if !self.types_compatible(&else_resolved, &then_resolved) {
            self.error_type_mismatch(&then_resolved, &else_resolved, else_value.location);
        }
        then_resolved
    }

    fn infer_list(&mut self, elements: &[Expr]) -> Type {
        if elements.is_empty() {
            let element = self.fresh_type_var();
            return Type::List(Box::new(element));
        }

        let mut element_type = self.infer_expr(&elements[0]);
        for element in &elements[1..] {
            let next = self.infer_expr(element);
            element_type = common_type(
                &self.resolve_vars(&element_type),
                &self.resolve_vars(&next),
            );
        }
        Type::List(Box::new(element_type))
    }

    fn infer_dict(&mut self, entries: &[(Expr, Expr)]) -> Type {
        if entries.is_empty() {
            let key = self.fresh_type_var();
            let value = self.fresh_type_var();
            return Type::Dict {
                key: Box::new(key),
                value: Box::new(value),
            };
        }

        let mut key_type = self.infer_expr(&entries[0].0);
        let mut value_type = self.infer_expr(&entries[0].1);
        for (key, value) in &entries[1..] {
            let next_key = self.infer_expr(key);
            let next_value = self.infer_expr(value);
            key_type = common_type(&self.resolve_vars(&key_type), &self.resolve_vars(&next_key));
            value_type = common_type(
                &self.resolve_vars(&value_type),
                &self.resolve_vars(&next_value),
            );
        }
        Type::Dict {
            key: Box::new(key_type),
            value: Box::new(value_type),
        }
    }

    fn infer_list_comp(
        &mut self,
        element: &Expr,
        var: &str,
        iterable: &Expr,
        condition: &Option<Box<Expr>>,
    ) -> Type {
        let iterable_type = self.infer_expr(iterable);
        let element_type = self.element_type_of(&iterable_type);

        self.symbols.enter_scope(ScopeKind::Block);
        let mut symbol = Symbol::new(var, SymbolKind::Variable, element_type);
        symbol.initialized = true;
        symbol.location = iterable.location;
        self.symbols.define(symbol);

        if let Some(condition) = condition {
            let condition_type = self.infer_expr(condition);
            let resolved = self.resolve_vars(&condition_type);
            if !matches!(resolved, Type::Bool) && !self.is_opaque(&resolved) {
                self.error("Comprehension condition must be bool", condition.location);
            }
        }

        let result_type = self.infer_expr(element);
        self.symbols.exit_scope();

        Type::List(Box::new(result_type))
    }

    fn infer_assign(&mut self, target: &Expr, value: &Expr, location: SourceLocation) -> Type {
        match &target.kind {
            ExprKind::Identifier(name) => {
                let immutable = self
                    .symbols
                    .lookup(name)
                    .map(|symbol| !symbol.mutable)
                    .unwrap_or(false);
                if immutable {
                    self.error(
                        format!("Cannot assign to immutable variable '{name}'"),
                        location,
                    );
                }
            }
            ExprKind::Member { .. } | ExprKind::Index { .. } => {}
            _ => {
                self.error("Invalid assignment target", target.location);
            }
        }

        let target_type = self.infer_expr(target);
        let value_type = self.infer_expr(value);
        self.ensure_assignable(&value_type, &target_type, location);
        target_type
    }

    fn infer_range(&mut self, start: &Expr, end: &Expr) -> Type {
        let start_type = self.infer_expr(start);
        let resolved = self.resolve_vars(&start_type);
        if !resolved.is_integer() && !self.is_opaque(&resolved) {
            self.error("Range start must be integer", start.location);
        }
        let end_type = self.infer_expr(end);
        let resolved = self.resolve_vars(&end_type);
        if !resolved.is_integer() && !self.is_opaque(&resolved) {
            self.error("Range end must be integer", end.location);
        }
        // Ranges are iterables of integers; List stands in for a dedicated
        // Range type in this core.
        Type::list(Type::I64)
    }
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}
