//! The dynamic host model that interception operates on.
//!
//! An [`Object`] is a shared bag of named members, a [`Function`] is a shared
//! callable invoked with an explicit receiver, and [`Value`] ties the two
//! together with a handful of primitive kinds. Objects and functions compare
//! by identity, which is what lets an undo handle prove it put back the very
//! same callable it took out.

use crate::common::TimerId;
use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The signature every callable in the host model shares.
pub type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value> + Send + Sync;

/// A dynamically typed value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The absent value. Returned by calls that produce nothing.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Function(Function),
    Object(Object),
    /// A handle produced by a `TimerHost`.
    Timer(TimerId),
}

impl Value {
    /// A short, human-readable name of the value's kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::List(_) => "list",
            Value::Function(_) => "function",
            Value::Object(_) => "object",
            Value::Timer(_) => "timer",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_timer(&self) -> Option<TimerId> {
        match self {
            Value::Timer(id) => Some(*id),
            _ => None,
        }
    }

    /// Invokes the value if it is a function.
    pub fn call(&self, receiver: &Value, args: &[Value]) -> Result<Value> {
        match self {
            Value::Function(f) => f.call(receiver, args),
            other => Err(Error::NotCallable(other.type_name().to_string())),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Timer(a), Value::Timer(b)) => a == b,
            _ => false,
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Number(n as f64)
            }
        })*
    };
}

number_from!(i32, i64, u32, u64, usize, f32, f64);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<TimerId> for Value {
    fn from(id: TimerId) -> Self {
        Value::Timer(id)
    }
}

struct FunctionInner {
    name: Option<String>,
    body: Box<NativeFn>,
}

/// A shared callable. Clones refer to the same function.
#[derive(Clone)]
pub struct Function {
    inner: Arc<FunctionInner>,
}

impl Function {
    /// Wraps a closure taking `(receiver, arguments)`.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(FunctionInner {
                name: None,
                body: Box::new(body),
            }),
        }
    }

    /// Like [`Function::new`], with a name that shows up in logs and `Debug`.
    pub fn named<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(FunctionInner {
                name: Some(name.into()),
                body: Box::new(body),
            }),
        }
    }

    /// Builds a replacement suitable for [`intercept`](crate::aspect::intercept).
    ///
    /// The wrapper installed by `intercept` calls its replacement with
    /// `[proceed, List(args)]`; this unpacks those two parameters so the
    /// closure receives `(receiver, proceed, args)` directly.
    pub fn advice<F>(body: F) -> Self
    where
        F: Fn(&Value, &Function, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Function::named("advice", move |receiver, args| {
            let proceed = args.first().and_then(Value::as_function).ok_or_else(|| {
                Error::InvalidArgument("advice expects a proceed function first".to_string())
            })?;
            let call_args = args.get(1).and_then(Value::as_list).unwrap_or(&[]);
            body(receiver, proceed, call_args)
        })
    }

    pub fn name(&self) -> &str {
        self.inner.name.as_deref().unwrap_or("anonymous")
    }

    /// Invokes the function with an explicit receiver.
    pub fn call(&self, receiver: &Value, args: &[Value]) -> Result<Value> {
        (self.inner.body)(receiver, args)
    }

    /// Reference identity.
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name())
    }
}

/// A shared bag of named members with reference identity.
///
/// Member reads clone the value out of the bag, so no lock is held while a
/// member runs and members are free to read or rewrite the object they are
/// called on.
#[derive(Clone, Default)]
pub struct Object {
    members: Arc<RwLock<HashMap<String, Value>>>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style `set`.
    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Returns the member, or `Undefined` when it is absent.
    pub fn get(&self, name: &str) -> Value {
        self.members.read().get(name).cloned().unwrap_or_default()
    }

    /// `true` when the member exists and is not `Undefined`.
    pub fn has(&self, name: &str) -> bool {
        self.members
            .read()
            .get(name)
            .is_some_and(|value| !value.is_undefined())
    }

    /// Writes a member and returns the value it replaced.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.members.write().insert(name.into(), value.into())
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.members.write().remove(name)
    }

    /// Member names in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.members.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Invokes a member with this object as the receiver.
    pub fn call_method(&self, name: &str, args: &[Value]) -> Result<Value> {
        let member = self.get(name);
        match member {
            Value::Undefined => Err(Error::MissingMember(name.to_string())),
            Value::Function(f) => f.call(&Value::Object(self.clone()), args),
            other => Err(Error::NotCallable(format!(
                "member `{}` ({})",
                name,
                other.type_name()
            ))),
        }
    }

    /// Reference identity.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.members, &other.members)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object").field("members", &self.keys()).finish()
    }
}
