use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;

use crate::ast::*;
use crate::checker::TypeChecker;
use crate::diagnostics::Diagnostics;
use crate::types::Type;

/// Lowers a checked program to textual LLVM-style IR: one function per `fn`
/// declaration, an alloca per local, structured control flow, and at most one
/// terminator per basic block. `for` over a range becomes an index loop.
///
/// The lowerer consumes only the public contract of the front-end: the
/// declaration list in source order, symbol-table lookups for nominal types,
/// and the per-expression types recorded by the checker.
pub struct Lowerer<'a> {
    checker: &'a TypeChecker,
    header: String,
    body: String,
    diagnostics: Diagnostics,
    externs: BTreeSet<String>,
    string_constants: Vec<String>,
    next_temp: usize,
    next_label: usize,
    next_string: usize,
    locals: Vec<HashMap<String, (String, Type)>>,
    loop_targets: Vec<(String, String)>,
    block_terminated: bool,
}

#[derive(Clone)]
struct Value {
    repr: String,
    ty: Type,
}

impl Value {
    fn new(repr: impl Into<String>, ty: Type) -> Self {
        Self {
            repr: repr.into(),
            ty,
        }
    }
}

impl<'a> Lowerer<'a> {
    pub fn new(checker: &'a TypeChecker) -> Self {
        Self {
            checker,
            header: String::new(),
            body: String::new(),
            diagnostics: Diagnostics::new(),
            externs: BTreeSet::new(),
            string_constants: Vec::new(),
            next_temp: 0,
            next_label: 0,
            next_string: 0,
            locals: Vec::new(),
            loop_targets: Vec::new(),
            block_terminated: false,
        }
    }

    pub fn lower(mut self, program: &Program) -> (String, Diagnostics) {
        let _ = writeln!(self.header, "; ModuleID = '{}'", program.filename);

        for decl in &program.declarations {
            match decl {
                Decl::Struct(decl) => self.lower_struct(decl),
                Decl::Fn(decl) => self.lower_function(decl),
                // Enums lower to their i64 tag; classes, traits, impls, type
                // aliases, and imports have no object-code footprint here.
                _ => {}
            }
        }

        let mut out = String::new();
        out.push_str(&self.header);
        if !self.string_constants.is_empty() {
            out.push('\n');
            for constant in &self.string_constants {
                out.push_str(constant);
                out.push('\n');
            }
        }
        if !self.externs.is_empty() {
            out.push('\n');
            for declaration in &self.externs {
                out.push_str(declaration);
                out.push('\n');
            }
        }
        out.push_str(&self.body);
        (out, self.diagnostics)
    }

    fn unsupported(&mut self, what: &str, location: crate::source::SourceLocation) -> Value {
        self.diagnostics
            .push_error(format!("Unsupported in IR lowering: {what}"), Some(location));
        Value::new("0", Type::Unknown)
    }

    // === Declarations ===

    fn lower_struct(&mut self, decl: &StructDecl) {
        let fields = match self.checker.symbols().struct_def(&decl.name) {
            Some(def) => def
                .fields
                .iter()
                .map(|field| ir_type(&field.ty))
                .collect::<Vec<_>>()
                .join(", "),
            None => String::new(),
        };
        let _ = writeln!(self.header, "%{} = type {{ {} }}", decl.name, fields);
    }

    fn lower_function(&mut self, decl: &FnDecl) {
        let param_types: Vec<Type> = decl
            .params
            .iter()
            .map(|param| self.declared_param_type(decl, param))
            .collect();
        let return_type = self.declared_return_type(decl);

        let params = decl
            .params
            .iter()
            .zip(param_types.iter())
            .map(|(param, ty)| format!("{} %{}", ir_type(ty), param.name))
            .collect::<Vec<_>>()
            .join(", ");

        let _ = writeln!(
            self.body,
            "\ndefine {} @{}({}) {{",
            ir_type(&return_type),
            decl.name,
            params
        );
        self.block_terminated = false;
        self.next_temp = 0;
        self.next_label = 0;
        self.locals.push(HashMap::new());
        self.emit_label("entry");

        for (param, ty) in decl.params.iter().zip(param_types.iter()) {
            let slot = format!("%{}.addr", param.name);
            self.emit(&format!("{slot} = alloca {}", ir_type(ty)));
            self.emit(&format!("store {} %{}, ptr {slot}", ir_type(ty), param.name));
            self.declare_local(&param.name, &slot, ty.clone());
        }

        self.lower_block(&decl.body);

        if !self.block_terminated {
            match return_type {
                Type::Void => self.emit("ret void"),
                ref ty => {
                    let zero = zero_value(ty);
                    self.emit(&format!("ret {} {}", ir_type(ty), zero));
                }
            }
        }

        self.locals.pop();
        self.body.push_str("}\n");
    }

    fn declared_param_type(&mut self, decl: &FnDecl, param: &Param) -> Type {
        // The checker recorded the function symbol; read parameter types back
        // from it so both stages agree.
        if let Some(symbol) = self.checker.symbols().lookup(&decl.name) {
            if let Type::Function { params, .. } = &symbol.ty {
                if let Some(index) = decl.params.iter().position(|p| p.name == param.name) {
                    if let Some(ty) = params.get(index) {
                        return ty.clone();
                    }
                }
            }
        }
        Type::Unknown
    }

    fn declared_return_type(&mut self, decl: &FnDecl) -> Type {
        if let Some(symbol) = self.checker.symbols().lookup(&decl.name) {
            if let Type::Function { ret, .. } = &symbol.ty {
                return (**ret).clone();
            }
        }
        Type::Void
    }

    // === Statements ===

    fn lower_block(&mut self, block: &Block) {
        self.locals.push(HashMap::new());
        for stmt in &block.statements {
            self.lower_statement(stmt);
        }
        self.locals.pop();
    }

    fn lower_statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expression(stmt) => {
                self.lower_expr(&stmt.expression);
            }
            Stmt::VarDecl(stmt) => self.lower_var_decl(stmt),
            Stmt::If(stmt) => self.lower_if(stmt),
            Stmt::While(stmt) => self.lower_while(stmt),
            Stmt::For(stmt) => self.lower_for(stmt),
            Stmt::Return(stmt) => self.lower_return(stmt),
            Stmt::Break(stmt) => {
                if let Some((_, break_label)) = self.loop_targets.last().cloned() {
                    self.emit_terminator(&format!("br label %{break_label}"));
                } else {
                    self.unsupported("break outside loop", stmt.location);
                }
            }
            Stmt::Continue(stmt) => {
                if let Some((continue_label, _)) = self.loop_targets.last().cloned() {
                    self.emit_terminator(&format!("br label %{continue_label}"));
                } else {
                    self.unsupported("continue outside loop", stmt.location);
                }
            }
            Stmt::Match(stmt) => {
                self.unsupported("match statement", stmt.location);
            }
            Stmt::Yield(stmt) => {
                self.unsupported("yield statement", stmt.location);
            }
        }
    }

    fn lower_var_decl(&mut self, stmt: &VarDeclStmt) {
        let init = stmt.initializer.as_ref().map(|init| self.lower_expr(init));
        let ty = match &init {
            Some(value) if !matches!(value.ty, Type::Unknown) => value.ty.clone(),
            _ => Type::I64,
        };
        let slot = format!("%{}.addr{}", stmt.name, self.next_temp);
        self.next_temp += 1;
        self.emit(&format!("{slot} = alloca {}", ir_type(&ty)));
        if let Some(value) = init {
            let value = self.coerce(value, &ty);
            self.emit(&format!("store {} {}, ptr {slot}", ir_type(&ty), value.repr));
        }
        self.declare_local(&stmt.name, &slot, ty);
    }

    fn lower_if(&mut self, stmt: &IfStmt) {
        // elif chains lower as nested if/else.
        let mut branches: Vec<(&Expr, &Block)> = vec![(&stmt.condition, &stmt.then_block)];
        branches.extend(stmt.elif_blocks.iter().map(|(cond, block)| (cond, block)));
        self.lower_if_chain(&branches, stmt.else_block.as_ref());
    }

    fn lower_if_chain(&mut self, branches: &[(&Expr, &Block)], else_block: Option<&Block>) {
        let (condition, then_block) = branches[0];
        let rest = &branches[1..];

        let then_label = self.fresh_label("then");
        let else_label = self.fresh_label("else");
        let end_label = self.fresh_label("endif");

        let cond = self.lower_expr(condition);
        let has_else = !rest.is_empty() || else_block.is_some();
        let false_target = if has_else { &else_label } else { &end_label };
        self.emit_terminator(&format!(
            "br i1 {}, label %{}, label %{}",
            cond.repr, then_label, false_target
        ));

        self.emit_label(&then_label);
        self.lower_block(then_block);
        self.emit_terminator(&format!("br label %{end_label}"));

        if has_else {
            self.emit_label(&else_label);
            if !rest.is_empty() {
                self.lower_if_chain(rest, else_block);
            } else if let Some(block) = else_block {
                self.lower_block(block);
            }
            self.emit_terminator(&format!("br label %{end_label}"));
        }

        self.emit_label(&end_label);
    }

    fn lower_while(&mut self, stmt: &WhileStmt) {
        let cond_label = self.fresh_label("loop.cond");
        let body_label = self.fresh_label("loop.body");
        let end_label = self.fresh_label("loop.end");

        self.emit_terminator(&format!("br label %{cond_label}"));
        self.emit_label(&cond_label);
        let cond = self.lower_expr(&stmt.condition);
        self.emit_terminator(&format!(
            "br i1 {}, label %{}, label %{}",
            cond.repr, body_label, end_label
        ));

        self.emit_label(&body_label);
        self.loop_targets.push((cond_label.clone(), end_label.clone()));
        self.lower_block(&stmt.body);
        self.loop_targets.pop();
        self.emit_terminator(&format!("br label %{cond_label}"));

        self.emit_label(&end_label);
    }

    /// `for i in a..b` (or `range(a, b)`) becomes `i = a; while i < b: body;
    /// i += 1`. Other iterables need runtime support this boundary does not
    /// provide.
    fn lower_for(&mut self, stmt: &ForStmt) {
        let bounds = match &stmt.iterable.kind {
            ExprKind::Range { start, end, .. } => Some((start.as_ref(), end.as_ref())),
            ExprKind::Call { callee, arguments } if arguments.len() == 2 => {
                match &callee.kind {
                    ExprKind::Identifier(name) if name == "range" => {
                        Some((&arguments[0], &arguments[1]))
                    }
                    _ => None,
                }
            }
            _ => None,
        };
        let Some((start, end)) = bounds else {
            self.unsupported("for over a non-range iterable", stmt.location);
            return;
        };

        let start = self.lower_expr(start);
        let start = self.coerce(start, &Type::I64);
        let end = self.lower_expr(end);
        let end = self.coerce(end, &Type::I64);

        let index_slot = format!("%{}.addr{}", stmt.variable, self.next_temp);
        self.next_temp += 1;
        self.emit(&format!("{index_slot} = alloca i64"));
        self.emit(&format!("store i64 {}, ptr {index_slot}", start.repr));

        let cond_label = self.fresh_label("for.cond");
        let body_label = self.fresh_label("for.body");
        let step_label = self.fresh_label("for.step");
        let end_label = self.fresh_label("for.end");

        self.emit_terminator(&format!("br label %{cond_label}"));
        self.emit_label(&cond_label);
        let current = self.fresh_temp();
        self.emit(&format!("{current} = load i64, ptr {index_slot}"));
        let flag = self.fresh_temp();
        self.emit(&format!("{flag} = icmp slt i64 {current}, {}", end.repr));
        self.emit_terminator(&format!(
            "br i1 {flag}, label %{body_label}, label %{end_label}"
        ));

        self.emit_label(&body_label);
        self.locals.push(HashMap::new());
        self.declare_local(&stmt.variable, &index_slot, Type::I64);
        self.loop_targets.push((step_label.clone(), end_label.clone()));
        self.lower_block(&stmt.body);
        self.loop_targets.pop();
        self.locals.pop();
        self.emit_terminator(&format!("br label %{step_label}"));

        self.emit_label(&step_label);
        let reloaded = self.fresh_temp();
        self.emit(&format!("{reloaded} = load i64, ptr {index_slot}"));
        let incremented = self.fresh_temp();
        self.emit(&format!("{incremented} = add i64 {reloaded}, 1"));
        self.emit(&format!("store i64 {incremented}, ptr {index_slot}"));
        self.emit_terminator(&format!("br label %{cond_label}"));

        self.emit_label(&end_label);
    }

    fn lower_return(&mut self, stmt: &ReturnStmt) {
        match &stmt.value {
            Some(value) => {
                let value = self.lower_expr(value);
                if matches!(value.ty, Type::Void) {
                    self.emit_terminator("ret void");
                } else {
                    self.emit_terminator(&format!(
                        "ret {} {}",
                        ir_type(&value.ty),
                        value.repr
                    ));
                }
            }
            None => self.emit_terminator("ret void"),
        }
    }

    // === Expressions ===

    fn lower_expr(&mut self, expr: &Expr) -> Value {
        match &expr.kind {
            ExprKind::IntLiteral(value) => Value::new(value.to_string(), Type::I64),
            ExprKind::FloatLiteral(value) => Value::new(float_repr(*value), Type::F64),
            ExprKind::BoolLiteral(value) => {
                Value::new(if *value { "1" } else { "0" }, Type::Bool)
            }
            ExprKind::StringLiteral { value, .. } => {
                let global = self.intern_string(value);
                Value::new(global, Type::Str)
            }
            ExprKind::NoneLiteral => Value::new("null", Type::Unknown),
            ExprKind::Identifier(name) => self.lower_identifier(name, expr),
            ExprKind::Binary { op, left, right } => self.lower_binary(*op, left, right, expr),
            ExprKind::Unary { op, operand } => self.lower_unary(*op, operand),
            ExprKind::Call { callee, arguments } => self.lower_call(callee, arguments, expr),
            ExprKind::Member { object, field } => self.lower_member(object, field, expr),
            ExprKind::Assign { target, value, op } => self.lower_assign(target, value, *op, expr),
            ExprKind::Ternary {
                condition,
                then_value,
                else_value,
            } => {
                let cond = self.lower_expr(condition);
                let then_value = self.lower_expr(then_value);
                let else_value = self.lower_expr(else_value);
                let result = self.fresh_temp();
                let ty = then_value.ty.clone();
                self.emit(&format!(
                    "{result} = select i1 {}, {} {}, {} {}",
                    cond.repr,
                    ir_type(&ty),
                    then_value.repr,
                    ir_type(&else_value.ty),
                    else_value.repr
                ));
                Value::new(result, ty)
            }
            ExprKind::Await(operand) | ExprKind::Spawn(operand) => self.lower_expr(operand),
            _ => self.unsupported("expression form", expr.location),
        }
    }

    fn lower_identifier(&mut self, name: &str, expr: &Expr) -> Value {
        if let Some((slot, ty)) = self.lookup_local(name) {
            let temp = self.fresh_temp();
            self.emit(&format!("{temp} = load {}, ptr {slot}", ir_type(&ty)));
            return Value::new(temp, ty);
        }
        if let Some(symbol) = self.checker.symbols().lookup(name) {
            return Value::new(format!("@{name}"), symbol.ty.clone());
        }
        self.unsupported("reference to unknown symbol", expr.location)
    }

    fn lower_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, expr: &Expr) -> Value {
        let lhs = self.lower_expr(left);
        let rhs = self.lower_expr(right);

        if op.is_arithmetic() {
            if matches!(op, BinaryOp::Pow) {
                return self.lower_pow(lhs, rhs);
            }
            let result_ty = self
                .checker
                .expr_type(expr.id)
                .unwrap_or_else(|| lhs.ty.clone());
            let lhs = self.coerce(lhs, &result_ty);
            let rhs = self.coerce(rhs, &result_ty);
            let instruction = arithmetic_instruction(op, &result_ty);
            let temp = self.fresh_temp();
            self.emit(&format!(
                "{temp} = {instruction} {} {}, {}",
                ir_type(&result_ty),
                lhs.repr,
                rhs.repr
            ));
            return Value::new(temp, result_ty);
        }

        if op.is_comparison() {
            let operand_ty = if lhs.ty.is_float() || rhs.ty.is_float() {
                Type::F64
            } else {
                lhs.ty.clone()
            };
            let lhs = self.coerce(lhs, &operand_ty);
            let rhs = self.coerce(rhs, &operand_ty);
            let instruction = comparison_instruction(op, &operand_ty);
            let temp = self.fresh_temp();
            self.emit(&format!(
                "{temp} = {instruction} {} {}, {}",
                ir_type(&operand_ty),
                lhs.repr,
                rhs.repr
            ));
            return Value::new(temp, Type::Bool);
        }

        if op.is_logical() {
            let instruction = if matches!(op, BinaryOp::And) { "and" } else { "or" };
            let temp = self.fresh_temp();
            self.emit(&format!("{temp} = {instruction} i1 {}, {}", lhs.repr, rhs.repr));
            return Value::new(temp, Type::Bool);
        }

        if op.is_bitwise() {
            let ty = lhs.ty.clone();
            let instruction = match op {
                BinaryOp::BitAnd => "and",
                BinaryOp::BitOr => "or",
                BinaryOp::BitXor => "xor",
                BinaryOp::Shl => "shl",
                _ => {
                    if is_unsigned(&ty) {
                        "lshr"
                    } else {
                        "ashr"
                    }
                }
            };
            let temp = self.fresh_temp();
            self.emit(&format!(
                "{temp} = {instruction} {} {}, {}",
                ir_type(&ty),
                lhs.repr,
                rhs.repr
            ));
            return Value::new(temp, ty);
        }

        self.unsupported("matrix multiplication", expr.location)
    }

    fn lower_pow(&mut self, lhs: Value, rhs: Value) -> Value {
        self.externs
            .insert("declare double @pow(double, double)".to_string());
        let lhs = self.coerce(lhs, &Type::F64);
        let rhs = self.coerce(rhs, &Type::F64);
        let temp = self.fresh_temp();
        self.emit(&format!(
            "{temp} = call double @pow(double {}, double {})",
            lhs.repr, rhs.repr
        ));
        Value::new(temp, Type::F64)
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expr) -> Value {
        let value = self.lower_expr(operand);
        let temp = self.fresh_temp();
        match op {
            UnaryOp::Neg => {
                if value.ty.is_float() {
                    self.emit(&format!(
                        "{temp} = fneg {} {}",
                        ir_type(&value.ty),
                        value.repr
                    ));
                } else {
                    self.emit(&format!(
                        "{temp} = sub {} 0, {}",
                        ir_type(&value.ty),
                        value.repr
                    ));
                }
                Value::new(temp, value.ty)
            }
            UnaryOp::Not => {
                self.emit(&format!("{temp} = xor i1 {}, 1", value.repr));
                Value::new(temp, Type::Bool)
            }
            UnaryOp::BitNot => {
                self.emit(&format!(
                    "{temp} = xor {} {}, -1",
                    ir_type(&value.ty),
                    value.repr
                ));
                Value::new(temp, value.ty)
            }
        }
    }

    fn lower_call(&mut self, callee: &Expr, arguments: &[Expr], expr: &Expr) -> Value {
        let name = match &callee.kind {
            ExprKind::Identifier(name) => name.clone(),
            _ => return self.unsupported("indirect call", expr.location),
        };

        if name == "print" {
            return self.lower_print(arguments, expr);
        }
        if name == "len" {
            self.externs
                .insert("declare i64 @axon_len(ptr)".to_string());
            let argument = arguments
                .first()
                .map(|argument| self.lower_expr(argument))
                .unwrap_or_else(|| Value::new("null", Type::Unknown));
            let temp = self.fresh_temp();
            self.emit(&format!(
                "{temp} = call i64 @axon_len(ptr {})",
                argument.repr
            ));
            return Value::new(temp, Type::I64);
        }
        if name == "range" {
            self.externs
                .insert("declare ptr @axon_range(i64, i64)".to_string());
            let lowered: Vec<Value> = arguments
                .iter()
                .map(|argument| self.lower_expr(argument))
                .collect();
            let args = lowered
                .iter()
                .map(|value| format!("i64 {}", value.repr))
                .collect::<Vec<_>>()
                .join(", ");
            let temp = self.fresh_temp();
            self.emit(&format!("{temp} = call ptr @axon_range({args})"));
            return Value::new(temp, Type::list(Type::I64));
        }
        if name == "type" {
            self.externs
                .insert("declare ptr @axon_type_name(ptr)".to_string());
            let argument = arguments
                .first()
                .map(|argument| self.lower_expr(argument))
                .unwrap_or_else(|| Value::new("null", Type::Unknown));
            let temp = self.fresh_temp();
            self.emit(&format!(
                "{temp} = call ptr @axon_type_name(ptr {})",
                argument.repr
            ));
            return Value::new(temp, Type::Str);
        }

        let Some(symbol) = self.checker.symbols().lookup(&name) else {
            return self.unsupported("call to unknown function", expr.location);
        };
        let Type::Function { params, ret, .. } = symbol.ty.clone() else {
            return self.unsupported("call of a non-function value", expr.location);
        };

        let mut lowered = Vec::new();
        for (argument, param) in arguments.iter().zip(params.iter()) {
            let value = self.lower_expr(argument);
            let value = self.coerce(value, param);
            lowered.push(format!("{} {}", ir_type(param), value.repr));
        }
        let args = lowered.join(", ");

        let ret_ty = *ret;
        if matches!(ret_ty, Type::Void) {
            self.emit(&format!("call void @{name}({args})"));
            Value::new("0", Type::Void)
        } else {
            let temp = self.fresh_temp();
            self.emit(&format!(
                "{temp} = call {} @{name}({args})",
                ir_type(&ret_ty)
            ));
            Value::new(temp, ret_ty)
        }
    }

    fn lower_print(&mut self, arguments: &[Expr], expr: &Expr) -> Value {
        self.externs
            .insert("declare i32 @printf(ptr, ...)".to_string());
        let Some(argument) = arguments.first() else {
            return self.unsupported("print with no arguments", expr.location);
        };
        let value = self.lower_expr(argument);
        let (format_str, value) = match &value.ty {
            Type::F32 | Type::F64 => ("%f\n", self.coerce(value, &Type::F64)),
            Type::Str => ("%s\n", value),
            Type::Bool => {
                let widened = self.fresh_temp();
                self.emit(&format!("{widened} = zext i1 {} to i64", value.repr));
                ("%ld\n", Value::new(widened, Type::I64))
            }
            _ => ("%ld\n", value),
        };
        let format_global = self.intern_string(format_str);
        let temp = self.fresh_temp();
        self.emit(&format!(
            "{temp} = call i32 (ptr, ...) @printf(ptr {format_global}, {} {})",
            ir_type(&value.ty),
            value.repr
        ));
        Value::new(temp, Type::I64)
    }

    fn lower_member(&mut self, object: &Expr, field: &str, expr: &Expr) -> Value {
        let ExprKind::Identifier(name) = &object.kind else {
            return self.unsupported("member access on a temporary", expr.location);
        };
        let Some((slot, ty)) = self.lookup_local(name) else {
            return self.unsupported("member access on unknown local", expr.location);
        };
        let Type::Struct(struct_name) = &ty else {
            return self.unsupported("member access on non-struct value", expr.location);
        };
        let Some(def) = self.checker.symbols().struct_def(struct_name) else {
            return self.unsupported("member access on undefined struct", expr.location);
        };
        let Some(index) = def.fields.iter().position(|f| f.name == field) else {
            return self.unsupported("member access on missing field", expr.location);
        };
        let field_ty = def.fields[index].ty.clone();

        let pointer = self.fresh_temp();
        self.emit(&format!(
            "{pointer} = getelementptr inbounds %{struct_name}, ptr {slot}, i32 0, i32 {index}"
        ));
        let temp = self.fresh_temp();
        self.emit(&format!(
            "{temp} = load {}, ptr {pointer}",
            ir_type(&field_ty)
        ));
        Value::new(temp, field_ty)
    }

    fn lower_assign(
        &mut self,
        target: &Expr,
        value: &Expr,
        op: Option<BinaryOp>,
        expr: &Expr,
    ) -> Value {
        let ExprKind::Identifier(name) = &target.kind else {
            return self.unsupported("assignment to a non-identifier target", expr.location);
        };
        let Some((slot, ty)) = self.lookup_local(name) else {
            return self.unsupported("assignment to unknown local", expr.location);
        };

        let new_value = match op {
            Some(op) => {
                let current = self.fresh_temp();
                self.emit(&format!("{current} = load {}, ptr {slot}", ir_type(&ty)));
                let rhs = self.lower_expr(value);
                let rhs = self.coerce(rhs, &ty);
                let instruction = arithmetic_instruction(op, &ty);
                let temp = self.fresh_temp();
                self.emit(&format!(
                    "{temp} = {instruction} {} {current}, {}",
                    ir_type(&ty),
                    rhs.repr
                ));
                Value::new(temp, ty.clone())
            }
            None => {
                let rhs = self.lower_expr(value);
                self.coerce(rhs, &ty)
            }
        };

        self.emit(&format!(
            "store {} {}, ptr {slot}",
            ir_type(&ty),
            new_value.repr
        ));
        new_value
    }

    // === Helpers ===

    fn coerce(&mut self, value: Value, target: &Type) -> Value {
        if &value.ty == target {
            return value;
        }
        if value.ty.is_integer() && target.is_float() {
            let temp = self.fresh_temp();
            self.emit(&format!(
                "{temp} = sitofp {} {} to {}",
                ir_type(&value.ty),
                value.repr,
                ir_type(target)
            ));
            return Value::new(temp, target.clone());
        }
        if value.ty.is_integer() && target.is_integer() {
            let from_bits = integer_bits(&value.ty);
            let to_bits = integer_bits(target);
            if from_bits < to_bits {
                let temp = self.fresh_temp();
                let op = if is_unsigned(&value.ty) { "zext" } else { "sext" };
                self.emit(&format!(
                    "{temp} = {op} {} {} to {}",
                    ir_type(&value.ty),
                    value.repr,
                    ir_type(target)
                ));
                return Value::new(temp, target.clone());
            }
        }
        if matches!(value.ty, Type::F32) && matches!(target, Type::F64) {
            let temp = self.fresh_temp();
            self.emit(&format!("{temp} = fpext float {} to double", value.repr));
            return Value::new(temp, target.clone());
        }
        Value::new(value.repr, target.clone())
    }

    fn intern_string(&mut self, value: &str) -> String {
        let name = format!("@.str.{}", self.next_string);
        self.next_string += 1;
        let bytes = value.as_bytes();
        let mut encoded = String::new();
        for byte in bytes {
            match byte {
                b' '..=b'~' if *byte != b'"' && *byte != b'\\' => encoded.push(*byte as char),
                _ => {
                    let _ = write!(encoded, "\\{byte:02X}");
                }
            }
        }
        encoded.push_str("\\00");
        self.string_constants.push(format!(
            "{name} = private unnamed_addr constant [{} x i8] c\"{encoded}\"",
            bytes.len() + 1
        ));
        name
    }

    fn declare_local(&mut self, name: &str, slot: &str, ty: Type) {
        if let Some(scope) = self.locals.last_mut() {
            scope.insert(name.to_string(), (slot.to_string(), ty));
        }
    }

    fn lookup_local(&self, name: &str) -> Option<(String, Type)> {
        for scope in self.locals.iter().rev() {
            if let Some(entry) = scope.get(name) {
                return Some(entry.clone());
            }
        }
        None
    }

    fn fresh_temp(&mut self) -> String {
        let temp = format!("%t{}", self.next_temp);
        self.next_temp += 1;
        temp
    }

    fn fresh_label(&mut self, prefix: &str) -> String {
        let label = format!("{prefix}{}", self.next_label);
        self.next_label += 1;
        label
    }

    fn emit(&mut self, line: &str) {
        // A terminated block accepts no further instructions until the next
        // label opens a new one.
        if self.block_terminated {
            return;
        }
        let _ = writeln!(self.body, "  {line}");
    }

    fn emit_terminator(&mut self, line: &str) {
        if self.block_terminated {
            return;
        }
        let _ = writeln!(self.body, "  {line}");
        self.block_terminated = true;
    }

    fn emit_label(&mut self, label: &str) {
        let _ = writeln!(self.body, "{label}:");
        self.block_terminated = false;
    }
}

fn ir_type(ty: &Type) -> String {
    match ty {
        Type::Void => "void".to_string(),
        Type::Bool => "i1".to_string(),
        Type::I8 | Type::U8 | Type::Char => "i8".to_string(),
        Type::I16 | Type::U16 => "i16".to_string(),
        Type::I32 | Type::U32 => "i32".to_string(),
        Type::I64 | Type::U64 => "i64".to_string(),
        Type::F32 => "float".to_string(),
        Type::F64 => "double".to_string(),
        Type::Struct(name) => format!("%{name}"),
        // Enums lower to their discriminant tag.
        Type::Enum(_) => "i64".to_string(),
        // Strings and every aggregate the runtime owns are opaque pointers.
        _ => "ptr".to_string(),
    }
}

fn zero_value(ty: &Type) -> &'static str {
    match ty {
        Type::F32 | Type::F64 => "0.0",
        Type::Struct(_) => "zeroinitializer",
        Type::Str => "null",
        _ => "0",
    }
}

fn integer_bits(ty: &Type) -> u32 {
    match ty {
        Type::I8 | Type::U8 => 8,
        Type::I16 | Type::U16 => 16,
        Type::I32 | Type::U32 => 32,
        _ => 64,
    }
}

fn is_unsigned(ty: &Type) -> bool {
    matches!(ty, Type::U8 | Type::U16 | Type::U32 | Type::U64)
}

fn arithmetic_instruction(op: BinaryOp, ty: &Type) -> &'static str {
    let float = ty.is_float();
    match op {
        BinaryOp::Add => {
            if float {
                "fadd"
            } else {
                "add"
            }
        }
        BinaryOp::Sub => {
            if float {
                "fsub"
            } else {
                "sub"
            }
        }
        BinaryOp::Mul => {
            if float {
                "fmul"
            } else {
                "mul"
            }
        }
        BinaryOp::Div => {
            if float {
                "fdiv"
            } else if is_unsigned(ty) {
                "udiv"
            } else {
                "sdiv"
            }
        }
        _ => {
            if float {
                "frem"
            } else if is_unsigned(ty) {
                "urem"
            } else {
                "srem"
            }
        }
    }
}

fn comparison_instruction(op: BinaryOp, ty: &Type) -> String {
    if ty.is_float() {
        let condition = match op {
            BinaryOp::Eq => "oeq",
            BinaryOp::Ne => "one",
            BinaryOp::Lt => "olt",
            BinaryOp::Le => "ole",
            BinaryOp::Gt => "ogt",
            _ => "oge",
        };
        format!("fcmp {condition}")
    } else {
        let unsigned = is_unsigned(ty);
        let condition = match op {
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "ne",
            BinaryOp::Lt => {
                if unsigned {
                    "ult"
                } else {
                    "slt"
                }
            }
            BinaryOp::Le => {
                if unsigned {
                    "ule"
                } else {
                    "sle"
                }
            }
            BinaryOp::Gt => {
                if unsigned {
                    "ugt"
                } else {
                    "sgt"
                }
            }
            _ => {
                if unsigned {
                    "uge"
                } else {
                    "sge"
                }
            }
        };
        format!("icmp {condition}")
    }
}

fn float_repr(value: f64) -> String {
    // Hexadecimal form is always an exact, valid LLVM float constant.
    format!("0x{:016X}", value.to_bits())
}
