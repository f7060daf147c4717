//! Runtime values and the conversions between them.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::scope::ScopeRef;
use super::{Abrupt, Interpreter};
use crate::ast::{FunctionDecl, Span};

/// Sparse writes further than this past the end of an array are stored as plain properties.
const MAX_ARRAY_GROWTH: usize = 10_000;

/// Shared, mutable heap object.
pub type ObjRef = Rc<RefCell<Object>>;

/// Native function: interpreter, `this`, arguments, call-site span.
pub type NativeFn = Rc<dyn Fn(&mut Interpreter, &Value, &[Value], Span) -> Result<Value, Abrupt>>;

/// A script value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(ObjRef),
}

/// Heap object: a kind plus ordered own properties and an optional prototype.
pub struct Object {
    pub kind: ObjectKind,
    pub properties: IndexMap<String, Value>,
    pub prototype: Option<ObjRef>,
}

pub enum ObjectKind {
    Ordinary,
    Array(Vec<Value>),
    Function(Callable),
}

#[derive(Clone)]
pub enum Callable {
    Script(Rc<Closure>),
    Native { name: Rc<str>, func: NativeFn },
}

/// A script function together with the scope it closes over.
pub struct Closure {
    pub decl: Rc<FunctionDecl>,
    pub scope: ScopeRef,
}

impl Object {
    pub fn new(kind: ObjectKind, prototype: Option<ObjRef>) -> ObjRef {
        Rc::new(RefCell::new(Object {
            kind,
            properties: IndexMap::new(),
            prototype,
        }))
    }

    /// Own property lookup, including array `length` and indices.
    pub fn get_own(&self, key: &str) -> Option<Value> {
        if let ObjectKind::Array(items) = &self.kind {
            if key == "length" {
                return Some(Value::Number(items.len() as f64));
            }
            if let Some(index) = array_index(key) {
                return Some(items.get(index).cloned().unwrap_or_default());
            }
        }
        self.properties.get(key).cloned()
    }

    pub fn has_own(&self, key: &str) -> bool {
        if let ObjectKind::Array(items) = &self.kind {
            if key == "length" {
                return true;
            }
            if let Some(index) = array_index(key) {
                return index < items.len();
            }
        }
        self.properties.contains_key(key)
    }

    /// Write an own property. Arrays route `length` and dense indices to their element storage.
    pub fn set(&mut self, key: &str, value: Value) {
        if let ObjectKind::Array(items) = &mut self.kind {
            if key == "length" {
                let len = value.to_number();
                if len >= 0.0 && len.fract() == 0.0 && len <= (items.len() + MAX_ARRAY_GROWTH) as f64 {
                    items.resize(len as usize, Value::Undefined);
                }
                return;
            }
            if let Some(index) = array_index(key) {
                if index < items.len() {
                    items[index] = value;
                    return;
                }
                if index <= items.len() + MAX_ARRAY_GROWTH {
                    items.resize(index, Value::Undefined);
                    items.push(value);
                    return;
                }
            }
        }
        self.properties.insert(key.to_string(), value);
    }

    /// Own enumerable keys in insertion order (array indices first).
    pub fn own_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let ObjectKind::Array(items) = &self.kind {
            keys.extend((0..items.len()).map(|i| i.to_string()));
        }
        keys.extend(self.properties.keys().cloned());
        keys
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }
}

/// Parse a canonical array index (`"0"`, `"17"`, not `"01"`).
pub fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse().ok()
}

/// Walk the prototype chain starting at `object`.
pub fn lookup_property(object: &ObjRef, key: &str) -> Option<Value> {
    let mut current = Some(object.clone());
    let mut hops = 0;
    while let Some(obj) = current {
        let borrowed = obj.borrow();
        if let Some(value) = borrowed.get_own(key) {
            return Some(value);
        }
        current = borrowed.prototype.clone();
        hops += 1;
        if hops > 1_000 {
            return None;
        }
    }
    None
}

/// Format a number the way script `String(n)` does for the common cases.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

/// Parse a string the way script `Number(s)` does for the common cases.
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |v| v as f64);
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) => {
            trimmed.parse().unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::String(s.into())
    }

    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        self.as_object().is_some_and(|obj| obj.borrow().is_callable())
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(obj) if obj.borrow().is_callable() => "function",
            Value::Object(_) => "object",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Object(_) => string_to_number(&self.to_js_string()),
        }
    }

    /// Script `String(value)`.
    pub fn to_js_string(&self) -> String {
        self.to_js_string_bounded(0)
    }

    fn to_js_string_bounded(&self, depth: usize) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.to_string(),
            Value::Object(obj) => {
                if depth > 8 {
                    return String::new();
                }
                let borrowed = obj.borrow();
                match &borrowed.kind {
                    ObjectKind::Array(items) => items
                        .iter()
                        .map(|item| match item {
                            Value::Undefined | Value::Null => String::new(),
                            other => other.to_js_string_bounded(depth + 1),
                        })
                        .collect::<Vec<_>>()
                        .join(","),
                    ObjectKind::Function(Callable::Script(closure)) => {
                        format!("function {}() {{ [code] }}", closure.decl.name.as_deref().unwrap_or(""))
                    }
                    ObjectKind::Function(Callable::Native { name, .. }) => {
                        format!("function {}() {{ [native code] }}", name)
                    }
                    ObjectKind::Ordinary => {
                        drop(borrowed);
                        let message = lookup_property(obj, "message");
                        let name = lookup_property(obj, "name");
                        match (name, message) {
                            (Some(name), Some(message)) => {
                                let name = name.to_js_string_bounded(depth + 1);
                                let message = message.to_js_string_bounded(depth + 1);
                                if message.is_empty() { name } else { format!("{}: {}", name, message) }
                            }
                            _ => "[object Object]".to_string(),
                        }
                    }
                }
            }
        }
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
                self.to_number() == other.to_number()
            }
            (Value::Bool(_), _) => Value::Number(self.to_number()).loose_equals(other),
            (_, Value::Bool(_)) => self.loose_equals(&Value::Number(other.to_number())),
            (Value::Object(_), Value::String(_) | Value::Number(_)) => {
                Value::string(self.to_js_string()).loose_equals(other)
            }
            (Value::String(_) | Value::Number(_), Value::Object(_)) => {
                self.loose_equals(&Value::string(other.to_js_string()))
            }
            _ => self.strict_equals(other),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", number_to_string(*n)),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Object(obj) => match obj.try_borrow().map(|o| o.is_callable()) {
                Ok(true) => write!(f, "[function]"),
                _ => write!(f, "[object]"),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_js_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(2.5), "2.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number(" 42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert!(string_to_number("abc").is_nan());
    }

    #[test]
    fn test_loose_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(Value::from("1").loose_equals(&Value::from(1.0)));
        assert!(Value::from(true).loose_equals(&Value::from(1.0)));
        assert!(!Value::Null.loose_equals(&Value::from(0.0)));
    }

    #[test]
    fn test_strict_equality_distinguishes_types() {
        assert!(!Value::from("1").strict_equals(&Value::from(1.0)));
        assert!(Value::from("a").strict_equals(&Value::from("a")));
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));
    }

    #[test]
    fn test_array_index_is_canonical() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("12"), Some(12));
        assert_eq!(array_index("01"), None);
        assert_eq!(array_index("x"), None);
    }
}
