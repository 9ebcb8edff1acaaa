// src/template/value.rs

use std::collections::BTreeMap;
use std::fmt;

use super::TemplateError;

/// Dynamically-typed value flowing through template pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Truthiness as used by `if`, `and`, `or`, `not`, `default` and `empty`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    /// Look up a field by name. Missing fields (and fields of non-maps)
    /// evaluate to `Nil` rather than failing.
    pub fn field(&self, name: &str) -> Value {
        match self {
            Value::Map(m) => m.get(name).cloned().unwrap_or(Value::Nil),
            _ => Value::Nil,
        }
    }

    /// Integer coercion used by the math helpers: ints pass through, strings
    /// are parsed, bools map to 0/1 and nil to 0.
    pub fn to_int(&self) -> Result<i64, TemplateError> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Nil => Ok(0),
            Value::Str(s) => s.trim().parse().map_err(|_| {
                TemplateError::Exec(format!("cannot convert {s:?} to an integer"))
            }),
            other => Err(TemplateError::Exec(format!(
                "cannot convert {} to an integer",
                other.type_name()
            ))),
        }
    }

    pub fn into_list(self) -> Result<Vec<Value>, TemplateError> {
        match self {
            Value::List(l) => Ok(l),
            Value::Nil => Ok(Vec::new()),
            other => Err(TemplateError::Exec(format!(
                "expected a list, got {}",
                other.type_name()
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(m) => {
                f.write_str("map[")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_template_output() {
        assert_eq!(Value::Nil.to_string(), "");
        assert_eq!(Value::Int(-3).to_string(), "-3");
        let list = Value::List(vec![Value::from("a"), Value::Int(1)]);
        assert_eq!(list.to_string(), "[a 1]");
    }

    #[test]
    fn missing_fields_are_nil() {
        let mut m = BTreeMap::new();
        m.insert("Index".to_string(), Value::Int(2));
        let data = Value::Map(m);
        assert_eq!(data.field("Index"), Value::Int(2));
        assert_eq!(data.field("Nope"), Value::Nil);
        assert_eq!(Value::Int(1).field("Index"), Value::Nil);
    }

    #[test]
    fn string_to_int_coercion() {
        assert_eq!(Value::from(" 42 ").to_int().unwrap(), 42);
        assert!(Value::from("x").to_int().is_err());
    }
}
