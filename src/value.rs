//! Concrete data manipulated by demonstrations and programs.

use crate::primitive::Primitive;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete value: the arguments and results recorded in a demonstration, and everything a
/// program computes.
///
/// Values are totally ordered and hashable (floats are compared by [`OrderedFloat`]), so they can
/// key the equivalence classes used during synthesis.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Serialize, Deserialize)]
pub enum Value {
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(OrderedFloat<f64>),
    /// A boolean.
    Bool(bool),
    /// A string.
    Str(String),
    /// A list of values.
    List(Vec<Value>),
    /// A function built from primitives, passed to `map`, `filter` and `fold`. The stages are
    /// applied in order: the first one to the call's arguments, each later one (all unary) to the
    /// previous result.
    Fn(Vec<Primitive>),
}

/// The shape of a value, as far as primitive applicability is concerned.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum Sort {
    /// Integers only.
    Int,
    /// Floats only.
    Float,
    /// Either an integer or a float.
    Num,
    /// Booleans.
    Bool,
    /// Strings.
    Str,
    /// Lists of any element sort.
    List,
    /// Function values.
    Fn,
    /// Anything.
    Any,
}

impl Sort {
    /// Returns whether `value` satisfies this sort constraint.
    pub fn admits(self, value: &Value) -> bool {
        match (self, value) {
            (Sort::Any, _) => true,
            (Sort::Num, Value::Int(_)) | (Sort::Num, Value::Float(_)) => true,
            (s, v) => s == v.sort(),
        }
    }

    /// The most specific sort admitting every value of both sorts.
    pub fn join(self, other: Sort) -> Sort {
        match (self, other) {
            (a, b) if a == b => a,
            (Sort::Int | Sort::Float | Sort::Num, Sort::Int | Sort::Float | Sort::Num) => Sort::Num,
            _ => Sort::Any,
        }
    }

    /// The join of the sorts of `values`, or `Any` when there are none.
    pub fn of<'v>(values: impl IntoIterator<Item = &'v Value>) -> Sort {
        let mut sorts = values.into_iter().map(Value::sort);
        match sorts.next() {
            Some(first) => sorts.fold(first, Sort::join),
            None => Sort::Any,
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Sort::Int => "Int",
            Sort::Float => "Float",
            Sort::Num => "Num",
            Sort::Bool => "Bool",
            Sort::Str => "Str",
            Sort::List => "List",
            Sort::Fn => "Fn",
            Sort::Any => "Any",
        };
        f.write_str(s)
    }
}

impl Value {
    /// Creates a float value.
    pub fn float(f: f64) -> Self {
        Value::Float(OrderedFloat(f))
    }

    /// Creates a list of integers.
    pub fn ints(xs: &[i64]) -> Self {
        Value::List(xs.iter().map(|x| Value::Int(*x)).collect())
    }

    /// Creates a function value that applies a single primitive.
    pub fn function(p: Primitive) -> Self {
        Value::Fn(vec![p])
    }

    /// Creates a string value.
    pub fn str(s: &str) -> Self {
        Value::Str(String::from(s))
    }

    /// The most specific sort of this value.
    pub fn sort(&self) -> Sort {
        match self {
            Value::Int(_) => Sort::Int,
            Value::Float(_) => Sort::Float,
            Value::Bool(_) => Sort::Bool,
            Value::Str(_) => Sort::Str,
            Value::List(_) => Sort::List,
            Value::Fn(_) => Sort::Fn,
        }
    }

    /// The elements of a list value.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(xs) => Some(xs),
            _ => None,
        }
    }

    /// The payload of a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The numeric payload of an integer or float, widened to `f64`.
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(f.0),
            _ => None,
        }
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

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(xs: Vec<Value>) -> Self {
        Value::List(xs)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x.0),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(xs) => {
                f.write_str("[")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", x)?;
                }
                f.write_str("]")
            }
            Value::Fn(stages) => {
                // outermost stage first, as in f . g
                f.write_str("<")?;
                for (i, p) in stages.iter().rev().enumerate() {
                    if i > 0 {
                        f.write_str(" . ")?;
                    }
                    write!(f, "{}", p)?;
                }
                f.write_str(">")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_constraints() {
        assert!(Sort::Num.admits(&Value::Int(3)));
        assert!(Sort::Num.admits(&Value::float(0.5)));
        assert!(!Sort::Num.admits(&Value::Bool(true)));
        assert!(Sort::List.admits(&Value::ints(&[])));
        assert!(Sort::Any.admits(&Value::str("x")));
        assert!(!Sort::Int.admits(&Value::float(1.0)));
    }

    #[test]
    fn display() {
        let v = Value::List(vec![
            Value::Int(1),
            Value::float(2.5),
            Value::Bool(false),
            Value::str("hi"),
        ]);
        assert_eq!(v.to_string(), "[1, 2.5, false, \"hi\"]");
    }

    #[test]
    fn sort_joins() {
        assert_eq!(Sort::Int.join(Sort::Int), Sort::Int);
        assert_eq!(Sort::Int.join(Sort::Float), Sort::Num);
        assert_eq!(Sort::Num.join(Sort::Int), Sort::Num);
        assert_eq!(Sort::Str.join(Sort::Int), Sort::Any);
        assert_eq!(Sort::of(&[Value::Int(2), Value::float(0.5)]), Sort::Num);
        assert_eq!(Sort::of(&[Value::ints(&[1]), Value::ints(&[])]), Sort::List);
        assert_eq!(Sort::of(&Vec::new()), Sort::Any);
    }

    #[test]
    fn function_values() {
        use crate::primitive::Primitive;
        let f = Value::Fn(vec![Primitive::Increment, Primitive::Double]);
        assert_eq!(f.sort(), Sort::Fn);
        assert!(Sort::Fn.admits(&f));
        assert!(!Sort::Fn.admits(&Value::Int(1)));
        assert_eq!(f.to_string(), "<double . increment>");
        assert_eq!(Value::function(Primitive::Negate).to_string(), "<negate>");
    }

    #[test]
    fn ints_and_floats_are_distinct() {
        assert_ne!(Value::Int(2), Value::float(2.0));
    }
}
