//! Concrete values decoded from a solver model through the arena.

use std::collections::BTreeMap;
use std::fmt;

/// A concrete value read back from a satisfying assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    /// Set members, in arena edge order with absent members filtered out.
    Set(Vec<Value>),
    /// Function graph as key-value pairs.
    Fun(Vec<(Value, Value)>),
    Record(BTreeMap<String, Value>),
    Tuple(Vec<Value>),
    Seq(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Set(elems) => {
                write!(f, "{{")?;
                join(f, elems)?;
                write!(f, "}}")
            }
            Value::Fun(pairs) => {
                write!(f, "[")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} -> {}", k, v)?;
                }
                write!(f, "]")
            }
            Value::Record(fields) => {
                write!(f, "[")?;
                for (i, (name, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, v)?;
                }
                write!(f, "]")
            }
            Value::Tuple(elems) => {
                write!(f, "(")?;
                join(f, elems)?;
                write!(f, ")")
            }
            Value::Seq(elems) => {
                write!(f, "<<")?;
                join(f, elems)?;
                write!(f, ">>")
            }
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, elems: &[Value]) -> fmt::Result {
    for (i, v) in elems.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", v)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let v = Value::Set(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(v.to_string(), "{1, 2}");
        let t = Value::Tuple(vec![Value::Bool(true), Value::Str("a".into())]);
        assert_eq!(t.to_string(), "(true, \"a\")");
    }
}
