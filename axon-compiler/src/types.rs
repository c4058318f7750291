use std::collections::HashMap;
use std::fmt;

/// Semantic type of an expression or symbol. Primitives compare equal by kind
/// tag, structural types by shape, and nominal types (Struct, Class, Enum,
/// Trait) by name alone; their bodies live in the symbol table's registry.
/// `TypeVar` compares by identity; the checker owns the resolution mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
    Str,
    Array {
        element: Box<Type>,
        size: Option<usize>,
    },
    List(Box<Type>),
    Dict {
        key: Box<Type>,
        value: Box<Type>,
    },
    Tuple(Vec<Type>),
    Function {
        params: Vec<Type>,
        ret: Box<Type>,
        is_async: bool,
    },
    Reference {
        inner: Box<Type>,
        mutable: bool,
    },
    Optional(Box<Type>),
    Result {
        ok: Box<Type>,
        err: Box<Type>,
    },
    Struct(String),
    Class(String),
    Enum(String),
    Trait(String),
    Generic(String),
    TypeVar(usize),
    Never,
    Unknown,
}

impl Type {
    pub fn function(params: Vec<Type>, ret: Type) -> Type {
        Type::Function {
            params,
            ret: Box::new(ret),
            is_async: false,
        }
    }

    pub fn list(element: Type) -> Type {
        Type::List(Box::new(element))
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Type::I8
                | Type::I16
                | Type::I32
                | Type::I64
                | Type::U8
                | Type::U16
                | Type::U32
                | Type::U64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::F32 | Type::F64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Type::Void | Type::Bool | Type::Char | Type::Str | Type::F32 | Type::F64
        ) || self.is_integer()
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Type::Struct(name) | Type::Class(name) | Type::Enum(name) | Type::Trait(name) => {
                Some(name)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Bool => write!(f, "bool"),
            Type::I8 => write!(f, "i8"),
            Type::I16 => write!(f, "i16"),
            Type::I32 => write!(f, "i32"),
            Type::I64 => write!(f, "i64"),
            Type::U8 => write!(f, "u8"),
            Type::U16 => write!(f, "u16"),
            Type::U32 => write!(f, "u32"),
            Type::U64 => write!(f, "u64"),
            Type::F32 => write!(f, "f32"),
            Type::F64 => write!(f, "f64"),
            Type::Char => write!(f, "char"),
            Type::Str => write!(f, "str"),
            Type::Array { element, size } => match size {
                Some(size) => write!(f, "[{element}; {size}]"),
                None => write!(f, "[{element}]"),
            },
            Type::List(element) => write!(f, "List[{element}]"),
            Type::Dict { key, value } => write!(f, "Dict[{key}, {value}]"),
            Type::Tuple(elements) => {
                write!(f, "(")?;
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, ")")
            }
            Type::Function {
                params,
                ret,
                is_async,
            } => {
                if *is_async {
                    write!(f, "async ")?;
                }
                write!(f, "fn(")?;
                for (index, param) in params.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") -> {ret}")
            }
            Type::Reference { inner, mutable } => {
                if *mutable {
                    write!(f, "&mut {inner}")
                } else {
                    write!(f, "&{inner}")
                }
            }
            Type::Optional(inner) => write!(f, "{inner}?"),
            Type::Result { ok, err } => write!(f, "Result[{ok}, {err}]"),
            Type::Struct(name)
            | Type::Class(name)
            | Type::Enum(name)
            | Type::Trait(name)
            | Type::Generic(name) => write!(f, "{name}"),
            Type::TypeVar(id) => write!(f, "T{id}"),
            Type::Never => write!(f, "!"),
            Type::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Directional compatibility: may a value of `from` be used where `to` is
/// expected? Integer widening is unconditionally permitted between integer
/// kinds; a mutable reference target requires exact equality of the referent.
pub fn is_assignable(from: &Type, to: &Type) -> bool {
    if from == to {
        return true;
    }
    if matches!(from, Type::Never) {
        return true;
    }
    // Unknown marks an earlier error; it is compatible in both directions so
    // one mistake does not cascade.
    if matches!(from, Type::Unknown) || matches!(to, Type::Unknown) {
        return true;
    }
    if from.is_integer() && to.is_integer() {
        return true;
    }
    if from.is_integer() && to.is_float() {
        return true;
    }
    if let Type::Optional(inner) = to {
        return is_assignable(from, inner);
    }
    if let Type::Reference { inner, mutable } = to {
        if *mutable {
            return from == inner.as_ref();
        }
        return is_assignable(from, inner);
    }
    false
}

/// Common type of two operands in mixed arithmetic and collection
/// homogenization: f64 dominates, any other float pairing gives f32, two
/// integers give i64, anything else is Unknown.
pub fn common_type(a: &Type, b: &Type) -> Type {
    if a == b {
        return a.clone();
    }
    if a.is_float() || b.is_float() {
        if matches!(a, Type::F64) || matches!(b, Type::F64) {
            return Type::F64;
        }
        return Type::F32;
    }
    if a.is_integer() && b.is_integer() {
        return Type::I64;
    }
    Type::Unknown
}

/// Replaces `Generic` nodes with concrete types throughout a composite type.
pub fn substitute(ty: &Type, substitutions: &HashMap<String, Type>) -> Type {
    match ty {
        Type::Generic(name) => substitutions.get(name).cloned().unwrap_or_else(|| ty.clone()),
        Type::Array { element, size } => Type::Array {
            element: Box::new(substitute(element, substitutions)),
            size: *size,
        },
        Type::List(element) => Type::List(Box::new(substitute(element, substitutions))),
        Type::Dict { key, value } => Type::Dict {
            key: Box::new(substitute(key, substitutions)),
            value: Box::new(substitute(value, substitutions)),
        },
        Type::Tuple(elements) => Type::Tuple(
            elements
                .iter()
                .map(|element| substitute(element, substitutions))
                .collect(),
        ),
        Type::Function {
            params,
            ret,
            is_async,
        } => Type::Function {
            params: params
                .iter()
                .map(|param| substitute(param, substitutions))
                .collect(),
            ret: Box::new(substitute(ret, substitutions)),
            is_async: *is_async,
        },
        Type::Reference { inner, mutable } => Type::Reference {
            inner: Box::new(substitute(inner, substitutions)),
            mutable: *mutable,
        },
        Type::Optional(inner) => Type::Optional(Box::new(substitute(inner, substitutions))),
        Type::Result { ok, err } => Type::Result {
            ok: Box::new(substitute(ok, substitutions)),
            err: Box::new(substitute(err, substitutions)),
        },
        other => other.clone(),
    }
}
