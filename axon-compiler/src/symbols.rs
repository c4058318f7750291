use std::collections::HashMap;

use crate::source::SourceLocation;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Parameter,
    Type,
    Trait,
    Module,
    EnumVariant,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Type,
    pub mutable: bool,
    pub public: bool,
    pub initialized: bool,
    pub location: SourceLocation,
    pub type_params: Vec<String>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, ty: Type) -> Self {
        Self {
            name: name.into(),
            kind,
            ty,
            mutable: false,
            public: false,
            initialized: false,
            location: SourceLocation::default(),
            type_params: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Module,
    Function,
    Block,
    Loop,
    Struct,
    Class,
    Trait,
    Impl,
}

#[derive(Debug)]
pub struct Scope {
    kind: ScopeKind,
    symbols: HashMap<String, Symbol>,
    pub expected_return_type: Option<Type>,
    pub has_return: bool,
}

impl Scope {
    fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            symbols: HashMap::new(),
            expected_return_type: None,
            has_return: false,
        }
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    fn define(&mut self, symbol: Symbol) -> bool {
        if self.symbols.contains_key(&symbol.name) {
            return false;
        }
        self.symbols.insert(symbol.name.clone(), symbol);
        true
    }

    fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }
}

// === Nominal type definitions ===
//
// Nominal types are carried by name inside `Type`; the definitions below are
// the registry they index into. Hoisting registers an empty definition so
// forward references resolve, and pass 2 fills in the body.

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: Type,
    pub public: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StructDef {
    pub type_params: Vec<String>,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Default)]
pub struct ClassDef {
    pub type_params: Vec<String>,
    pub fields: Vec<FieldDef>,
    pub base: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EnumVariantDef {
    pub name: String,
    pub fields: Vec<Type>,
}

#[derive(Debug, Clone, Default)]
pub struct EnumDef {
    pub type_params: Vec<String>,
    pub variants: Vec<EnumVariantDef>,
}

#[derive(Debug, Clone, Default)]
pub struct TraitDef {
    pub type_params: Vec<String>,
    pub methods: Vec<(String, Type)>,
}

#[derive(Debug, Clone)]
pub enum NominalDef {
    Struct(StructDef),
    Class(ClassDef),
    Enum(EnumDef),
    Trait(TraitDef),
}

impl StructDef {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }
}

impl ClassDef {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Lexical scope stack plus the process-global type registry. The current
/// scope is always the top of the stack; `lookup` walks downward, so an inner
/// definition shadows an outer one without mutating it.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    type_registry: HashMap<String, Type>,
    nominals: HashMap<String, NominalDef>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            scopes: vec![Scope::new(ScopeKind::Global)],
            type_registry: HashMap::new(),
            nominals: HashMap::new(),
        };
        table.install_builtins();
        table
    }

    fn install_builtins(&mut self) {
        self.register_type("void", Type::Void);
        self.register_type("bool", Type::Bool);
        self.register_type("i8", Type::I8);
        self.register_type("i16", Type::I16);
        self.register_type("i32", Type::I32);
        self.register_type("i64", Type::I64);
        self.register_type("u8", Type::U8);
        self.register_type("u16", Type::U16);
        self.register_type("u32", Type::U32);
        self.register_type("u64", Type::U64);
        self.register_type("f32", Type::F32);
        self.register_type("f64", Type::F64);
        self.register_type("char", Type::Char);
        self.register_type("str", Type::Str);

        let mut print_sym = Symbol::new(
            "print",
            SymbolKind::Function,
            Type::function(vec![Type::Unknown], Type::Void),
        );
        print_sym.initialized = true;
        self.define(print_sym);

        let mut len_sym = Symbol::new(
            "len",
            SymbolKind::Function,
            Type::function(vec![Type::Unknown], Type::I64),
        );
        len_sym.initialized = true;
        self.define(len_sym);

        // range is typed as returning List[i64]; the lowerer special-cases it.
        let mut range_sym = Symbol::new(
            "range",
            SymbolKind::Function,
            Type::function(vec![Type::I64, Type::I64], Type::list(Type::I64)),
        );
        range_sym.initialized = true;
        self.define(range_sym);

        let mut type_sym = Symbol::new(
            "type",
            SymbolKind::Function,
            Type::function(vec![Type::Unknown], Type::Str),
        );
        type_sym.initialized = true;
        self.define(type_sym);
    }

    pub fn enter_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope::new(kind));
    }

    pub fn exit_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn current_scope(&self) -> &Scope {
        self.scopes.last().expect("scope stack is never empty")
    }

    pub fn current_scope_mut(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    /// Defines a symbol in the current scope; false when the name is taken.
    pub fn define(&mut self, symbol: Symbol) -> bool {
        self.current_scope_mut().define(symbol)
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        for scope in self.scopes.iter().rev() {
            if let Some(symbol) = scope.lookup(name) {
                return Some(symbol);
            }
        }
        None
    }

    pub fn lookup_local(&self, name: &str) -> Option<&Symbol> {
        self.current_scope().lookup(name)
    }

    pub fn register_type(&mut self, name: impl Into<String>, ty: Type) {
        self.type_registry.insert(name.into(), ty);
    }

    pub fn lookup_type(&self, name: &str) -> Option<&Type> {
        self.type_registry.get(name)
    }

    pub fn define_nominal(&mut self, name: impl Into<String>, def: NominalDef) {
        self.nominals.insert(name.into(), def);
    }

    pub fn nominal(&self, name: &str) -> Option<&NominalDef> {
        self.nominals.get(name)
    }

    pub fn nominal_mut(&mut self, name: &str) -> Option<&mut NominalDef> {
        self.nominals.get_mut(name)
    }

    pub fn struct_def(&self, name: &str) -> Option<&StructDef> {
        match self.nominals.get(name) {
            Some(NominalDef::Struct(def)) => Some(def),
            _ => None,
        }
    }

    pub fn class_def(&self, name: &str) -> Option<&ClassDef> {
        match self.nominals.get(name) {
            Some(NominalDef::Class(def)) => Some(def),
            _ => None,
        }
    }

    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        match self.nominals.get(name) {
            Some(NominalDef::Enum(def)) => Some(def),
            _ => None,
        }
    }

    pub fn trait_def(&self, name: &str) -> Option<&TraitDef> {
        match self.nominals.get(name) {
            Some(NominalDef::Trait(def)) => Some(def),
            _ => None,
        }
    }

    pub fn in_loop(&self) -> bool {
        self.scopes
            .iter()
            .any(|scope| scope.kind() == ScopeKind::Loop)
    }

    pub fn in_function(&self) -> bool {
        self.scopes
            .iter()
            .any(|scope| scope.kind() == ScopeKind::Function)
    }

    /// Declared return type of the nearest enclosing function scope.
    pub fn current_return_type(&self) -> Option<Type> {
        self.scopes
            .iter()
            .rev()
            .find(|scope| scope.kind() == ScopeKind::Function)
            .and_then(|scope| scope.expected_return_type.clone())
    }

    pub fn mark_current_function_has_return(&mut self) {
        for scope in self.scopes.iter_mut().rev() {
            if scope.kind() == ScopeKind::Function {
                scope.has_return = true;
                return;
            }
        }
    }

    pub fn current_function_has_return(&self) -> bool {
        self.scopes
            .iter()
            .rev()
            .find(|scope| scope.kind() == ScopeKind::Function)
            .map(|scope| scope.has_return)
            .unwrap_or(false)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
