//! Runtime object model shared by the tree-walking evaluator.
//!
//! `Value` is the monkey book's `Object` made into a Rust sum type: every
//! kind of thing a Monkey program can produce at runtime is one variant
//! here, including the two transient wrappers (`ReturnValue`, `Error`) that
//! the evaluator uses to unwind control flow and never lets escape to a
//! caller outside this crate.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::environment::Environment;
use monkey_par::{BlockStatement, Identifier};

/// The subset of `Value` that can be used as a `HashMap` key.
///
/// Monkey only allows integers, booleans and strings as hash keys; combining
/// the tag with the value here means `1` and `true` never collide even
/// though both could otherwise hash to the same bits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Integer(i64),
    Boolean(bool),
    String(String),
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashKey::Integer(i) => write!(f, "{i}"),
            HashKey::Boolean(b) => write!(f, "{b}"),
            HashKey::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// A host-provided function invocable from Monkey code, e.g. `len`.
///
/// Wrapped in `Rc` so `Value` stays cheaply cloneable; a plain `fn` pointer
/// would already be `Copy`, but the indirection keeps `Value::clone()`
/// uniform across every callable variant.
#[derive(Clone)]
pub struct BuiltinFn(pub Rc<dyn Fn(&[Value]) -> Value>);

impl fmt::Debug for BuiltinFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<builtin>")
    }
}

impl PartialEq for BuiltinFn {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// A closure: parameter names, a body, and the environment it was defined
/// in. Calling it binds the parameters in a fresh environment whose outer
/// is `env`, so the body still sees whatever was in scope at definition
/// time even after the defining call has returned.
#[derive(Debug, Clone)]
pub struct Function {
    pub parameters: Vec<Identifier>,
    pub body: BlockStatement,
    pub env: Rc<Environment>,
    pub name: Option<String>,
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        // Two function literals are the same Value only if they came from
        // the same evaluation of the same literal; structural AST equality
        // would make two independently-defined but textually identical
        // functions compare equal, which the book's semantics never do.
        Rc::ptr_eq(&self.env, &other.env)
            && self.parameters == other.parameters
            && self.body == other.body
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Boolean(bool),
    String(String),
    Array(Vec<Value>),
    Hash(IndexMap<HashKey, (Value, Value)>),
    /// Wraps the value produced by a `return`; unwrapped at the call or
    /// program boundary and never visible to user code.
    ReturnValue(Box<Value>),
    /// Halts evaluation of the enclosing program or block; carries a
    /// human-readable message.
    Error(String),
    Function(Function),
    Builtin(BuiltinFn),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Boolean(_) => "BOOLEAN",
            Value::String(_) => "STRING",
            Value::Array(_) => "ARRAY",
            Value::Hash(_) => "HASH",
            Value::ReturnValue(_) => "RETURN_VALUE",
            Value::Error(_) => "ERROR",
            Value::Function(_) => "FUNCTION",
            Value::Builtin(_) => "BUILTIN",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// `is_truthy`: everything is truthy except `Null` and `false`.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Boolean(false))
    }

    /// Hash key for this value, if it is one of the hashable kinds.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Integer(i) => Some(HashKey::Integer(*i)),
            Value::Boolean(b) => Some(HashKey::Boolean(*b)),
            Value::String(s) => Some(HashKey::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Array(elems) => {
                let rendered: Vec<String> = elems.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Value::Hash(pairs) => {
                let rendered: Vec<String> = pairs
                    .values()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            Value::ReturnValue(v) => write!(f, "{v}"),
            Value::Error(msg) => write!(f, "ERROR: {msg}"),
            Value::Function(func) => {
                let params: Vec<String> =
                    func.parameters.iter().map(|p| p.to_string()).collect();
                write!(f, "fn({}) {{\n{}\n}}", params.join(", "), func.body)
            }
            Value::Builtin(_) => write!(f, "builtin function"),
        }
    }
}
