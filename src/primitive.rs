//! The closed library of primitives a demonstration may use.
//!
//! Every primitive is a variant of [`Primitive`]; names are resolved once through the
//! process-wide [`Library`], which is built lazily on first use and never modified afterwards, so
//! it can be read from any number of threads without synchronization.

use crate::error::PrimitiveError;
use crate::token::Token;
use crate::value::{Sort, Value};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A pure operation on values.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum Primitive {
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDiv,
    Modulo,
    Double,
    Increment,
    Decrement,
    Negate,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    And,
    Or,
    Not,
    Len,
    Head,
    Last,
    Tail,
    Init,
    Concat,
    Cons,
    Append,
    Upper,
    Lower,
    Trim,
    StrLen,
    Words,
    Numbers,
    Map,
    Filter,
    Fold,
    Compose,
    If,
}

use Primitive::*;

/// Parameter and return sorts of a primitive.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Signature {
    /// One constraint per parameter, in order.
    pub params: &'static [Sort],
    /// Sort of the result.
    pub ret: Sort,
}

const NUM_NUM: &[Sort] = &[Sort::Num, Sort::Num];
const NUM: &[Sort] = &[Sort::Num];
const ANY_ANY: &[Sort] = &[Sort::Any, Sort::Any];
const BOOL_BOOL: &[Sort] = &[Sort::Bool, Sort::Bool];
const BOOL: &[Sort] = &[Sort::Bool];
const LIST: &[Sort] = &[Sort::List];
const LIST_LIST: &[Sort] = &[Sort::List, Sort::List];
const ANY_LIST: &[Sort] = &[Sort::Any, Sort::List];
const STR: &[Sort] = &[Sort::Str];
const STR_STR: &[Sort] = &[Sort::Str, Sort::Str];
const FN_LIST: &[Sort] = &[Sort::Fn, Sort::List];
const FN_ANY_LIST: &[Sort] = &[Sort::Fn, Sort::Any, Sort::List];
const FN_FN: &[Sort] = &[Sort::Fn, Sort::Fn];
const BOOL_ANY_ANY: &[Sort] = &[Sort::Bool, Sort::Any, Sort::Any];

impl Primitive {
    /// Every primitive, in declaration order.
    pub const ALL: &'static [Primitive] = &[
        Add, Subtract, Multiply, Divide, FloorDiv, Modulo, Double, Increment, Decrement, Negate,
        Eq, Ne, Gt, Lt, Ge, Le, And, Or, Not, Len, Head, Last, Tail, Init, Concat, Cons, Append,
        Upper, Lower, Trim, StrLen, Words, Numbers, Map, Filter, Fold, Compose, If,
    ];

    /// The unique name the recorder uses for this primitive.
    pub fn name(&self) -> &'static str {
        match self {
            Add => "add",
            Subtract => "subtract",
            Multiply => "multiply",
            Divide => "divide",
            FloorDiv => "floor_div",
            Modulo => "modulo",
            Double => "double",
            Increment => "increment",
            Decrement => "decrement",
            Negate => "negate",
            Eq => "eq",
            Ne => "ne",
            Gt => "gt",
            Lt => "lt",
            Ge => "ge",
            Le => "le",
            And => "and",
            Or => "or",
            Not => "not",
            Len => "len",
            Head => "head",
            Last => "last",
            Tail => "tail",
            Init => "init",
            Concat => "concat",
            Cons => "cons",
            Append => "append",
            Upper => "upper",
            Lower => "lower",
            Trim => "trim",
            StrLen => "str_len",
            Words => "words",
            Numbers => "numbers",
            Map => "map",
            Filter => "filter",
            Fold => "fold",
            Compose => "compose",
            If => "if",
        }
    }

    /// The sorts this primitive accepts and produces.
    pub fn signature(&self) -> Signature {
        let (params, ret) = match self {
            Add | Subtract | Multiply | FloorDiv | Modulo => (NUM_NUM, Sort::Num),
            Divide => (NUM_NUM, Sort::Float),
            Double | Increment | Decrement | Negate => (NUM, Sort::Num),
            Eq | Ne => (ANY_ANY, Sort::Bool),
            Gt | Lt | Ge | Le => (NUM_NUM, Sort::Bool),
            And | Or => (BOOL_BOOL, Sort::Bool),
            Not => (BOOL, Sort::Bool),
            Len => (LIST, Sort::Int),
            Head | Last => (LIST, Sort::Any),
            Tail | Init => (LIST, Sort::List),
            Concat => (LIST_LIST, Sort::List),
            Cons => (ANY_LIST, Sort::List),
            Append => (STR_STR, Sort::Str),
            Upper | Lower | Trim => (STR, Sort::Str),
            StrLen => (STR, Sort::Int),
            Words | Numbers => (STR, Sort::List),
            Map | Filter => (FN_LIST, Sort::List),
            Fold => (FN_ANY_LIST, Sort::Any),
            Compose => (FN_FN, Sort::Fn),
            If => (BOOL_ANY_ANY, Sort::Any),
        };
        Signature { params, ret }
    }

    /// Number of arguments.
    pub fn arity(&self) -> usize {
        self.signature().params.len()
    }

    /// Returns whether `value` may be passed as argument `position`.
    pub fn accepts(&self, position: usize, value: &Value) -> bool {
        self.signature()
            .params
            .get(position)
            .map_or(false, |sort| sort.admits(value))
    }

    /// Applies the primitive to concrete arguments.
    pub fn apply(&self, args: &[&Value]) -> Result<Value, PrimitiveError> {
        let op = self.name();
        let sig = self.signature();
        if args.len() != sig.params.len() {
            return Err(PrimitiveError::Arity {
                op,
                expected: sig.params.len(),
                found: args.len(),
            });
        }
        for (position, (sort, arg)) in sig.params.iter().zip(args).enumerate() {
            if !sort.admits(arg) {
                return Err(mismatch(op, position, *sort, arg));
            }
        }
        match self {
            Add => numeric(op, args[0], args[1], |a, b| a.checked_add(b), |a, b| Ok(a + b)),
            Subtract => numeric(op, args[0], args[1], |a, b| a.checked_sub(b), |a, b| Ok(a - b)),
            Multiply => numeric(op, args[0], args[1], |a, b| a.checked_mul(b), |a, b| Ok(a * b)),
            Divide => {
                let a = number(op, 0, args[0])?;
                let b = number(op, 1, args[1])?;
                if b == 0.0 {
                    return Err(PrimitiveError::DivisionByZero { op });
                }
                Ok(Value::float(a / b))
            }
            FloorDiv => {
                if number(op, 1, args[1])? == 0.0 {
                    return Err(PrimitiveError::DivisionByZero { op });
                }
                numeric(op, args[0], args[1], floor_div, |a, b| Ok((a / b).floor()))
            }
            Modulo => {
                if number(op, 1, args[1])? == 0.0 {
                    return Err(PrimitiveError::DivisionByZero { op });
                }
                numeric(op, args[0], args[1], floor_mod, |a, b| {
                    let r = a % b;
                    Ok(if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r })
                })
            }
            Double => numeric(op, args[0], &Value::Int(2), |a, b| a.checked_mul(b), |a, b| {
                Ok(a * b)
            }),
            Increment => numeric(op, args[0], &Value::Int(1), |a, b| a.checked_add(b), |a, b| {
                Ok(a + b)
            }),
            Decrement => numeric(op, args[0], &Value::Int(1), |a, b| a.checked_sub(b), |a, b| {
                Ok(a - b)
            }),
            Negate => match args[0] {
                Value::Int(i) => i.checked_neg().map(Value::Int).ok_or(PrimitiveError::Overflow { op }),
                other => Ok(Value::float(-number(op, 0, other)?)),
            },
            Eq => Ok(Value::Bool(loose_eq(args[0], args[1]))),
            Ne => Ok(Value::Bool(!loose_eq(args[0], args[1]))),
            Gt | Lt | Ge | Le => {
                let ord = match (args[0], args[1]) {
                    (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
                    (a, b) => number(op, 0, a)?.partial_cmp(&number(op, 1, b)?),
                };
                let holds = match (self, ord) {
                    (_, None) => false,
                    (Gt, Some(o)) => o.is_gt(),
                    (Lt, Some(o)) => o.is_lt(),
                    (Ge, Some(o)) => o.is_ge(),
                    (_, Some(o)) => o.is_le(),
                };
                Ok(Value::Bool(holds))
            }
            And => Ok(Value::Bool(boolean(op, 0, args[0])? && boolean(op, 1, args[1])?)),
            Or => Ok(Value::Bool(boolean(op, 0, args[0])? || boolean(op, 1, args[1])?)),
            Not => Ok(Value::Bool(!boolean(op, 0, args[0])?)),
            Len => Ok(Value::Int(list(op, 0, args[0])?.len() as i64)),
            Head => list(op, 0, args[0])?
                .first()
                .cloned()
                .ok_or(PrimitiveError::EmptyList { op }),
            Last => list(op, 0, args[0])?
                .last()
                .cloned()
                .ok_or(PrimitiveError::EmptyList { op }),
            Tail => {
                let xs = list(op, 0, args[0])?;
                Ok(Value::List(xs.iter().skip(1).cloned().collect()))
            }
            Init => {
                let xs = list(op, 0, args[0])?;
                let keep = xs.len().saturating_sub(1);
                Ok(Value::List(xs[..keep].to_vec()))
            }
            Concat => {
                let mut xs = list(op, 0, args[0])?.to_vec();
                xs.extend_from_slice(list(op, 1, args[1])?);
                Ok(Value::List(xs))
            }
            Cons => {
                let mut xs = vec![args[0].clone()];
                xs.extend_from_slice(list(op, 1, args[1])?);
                Ok(Value::List(xs))
            }
            Append => Ok(Value::Str(format!(
                "{}{}",
                string(op, 0, args[0])?,
                string(op, 1, args[1])?
            ))),
            Upper => Ok(Value::Str(string(op, 0, args[0])?.to_uppercase())),
            Lower => Ok(Value::Str(string(op, 0, args[0])?.to_lowercase())),
            Trim => Ok(Value::str(string(op, 0, args[0])?.trim())),
            StrLen => Ok(Value::Int(string(op, 0, args[0])?.chars().count() as i64)),
            Words => Ok(Value::List(
                Token::Alphanumeric
                    .all_matches(string(op, 0, args[0])?)
                    .into_iter()
                    .map(Value::str)
                    .collect(),
            )),
            Numbers => Token::Digits
                .all_matches(string(op, 0, args[0])?)
                .into_iter()
                .map(|d| {
                    d.parse::<i64>()
                        .map(Value::Int)
                        .map_err(|_| PrimitiveError::Overflow { op })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Map => list(op, 1, args[1])?
                .iter()
                .map(|x| call(op, args[0], &[x]))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Filter => {
                let mut kept = Vec::new();
                for x in list(op, 1, args[1])? {
                    if boolean(op, 0, &call(op, args[0], &[x])?)? {
                        kept.push(x.clone());
                    }
                }
                Ok(Value::List(kept))
            }
            Fold => {
                let mut acc = args[1].clone();
                for x in list(op, 2, args[2])? {
                    acc = call(op, args[0], &[&acc, x])?;
                }
                Ok(acc)
            }
            Compose => {
                let outer = function(op, 0, args[0])?;
                let inner = function(op, 1, args[1])?;
                if let Some(first) = outer.first().filter(|p| p.arity() != 1) {
                    return Err(PrimitiveError::Arity {
                        op: first.name(),
                        expected: 1,
                        found: first.arity(),
                    });
                }
                Ok(Value::Fn(inner.iter().chain(outer).copied().collect()))
            }
            If => Ok(if boolean(op, 0, args[0])? {
                args[1].clone()
            } else {
                args[2].clone()
            }),
        }
    }
}

// Calls a function value: the first stage takes the arguments, later stages the previous result.
fn call(op: &'static str, f: &Value, args: &[&Value]) -> Result<Value, PrimitiveError> {
    let stages = function(op, 0, f)?;
    let (first, rest) = match stages.split_first() {
        Some(split) => split,
        None => {
            return match args {
                [x] => Ok((*x).clone()),
                _ => Err(PrimitiveError::Arity {
                    op,
                    expected: 1,
                    found: args.len(),
                }),
            }
        }
    };
    let mut v = first.apply(args)?;
    for p in rest {
        v = p.apply(&[&v])?;
    }
    Ok(v)
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn mismatch(op: &'static str, position: usize, expected: Sort, found: &Value) -> PrimitiveError {
    PrimitiveError::SortMismatch {
        op,
        position,
        expected,
        found: found.clone(),
    }
}

fn number(op: &'static str, position: usize, v: &Value) -> Result<f64, PrimitiveError> {
    v.as_f64().ok_or_else(|| mismatch(op, position, Sort::Num, v))
}

fn boolean(op: &'static str, position: usize, v: &Value) -> Result<bool, PrimitiveError> {
    v.as_bool().ok_or_else(|| mismatch(op, position, Sort::Bool, v))
}

fn list<'v>(op: &'static str, position: usize, v: &'v Value) -> Result<&'v [Value], PrimitiveError> {
    v.as_list().ok_or_else(|| mismatch(op, position, Sort::List, v))
}

fn string<'v>(op: &'static str, position: usize, v: &'v Value) -> Result<&'v str, PrimitiveError> {
    match v {
        Value::Str(s) => Ok(s),
        _ => Err(mismatch(op, position, Sort::Str, v)),
    }
}

// Int op Int stays integral, anything involving a float is computed in f64.
fn numeric(
    op: &'static str,
    a: &Value,
    b: &Value,
    int: impl Fn(i64, i64) -> Option<i64>,
    float: impl Fn(f64, f64) -> Result<f64, PrimitiveError>,
) -> Result<Value, PrimitiveError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => int(*x, *y)
            .map(Value::Int)
            .ok_or(PrimitiveError::Overflow { op }),
        _ => Ok(Value::float(float(number(op, 0, a)?, number(op, 1, b)?)?)),
    }
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        r.checked_add(b)
    } else {
        Some(r)
    }
}

fn function<'v>(
    op: &'static str,
    position: usize,
    v: &'v Value,
) -> Result<&'v [Primitive], PrimitiveError> {
    match v {
        Value::Fn(stages) => Ok(stages),
        _ => Err(mismatch(op, position, Sort::Fn, v)),
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
            a.as_f64() == b.as_f64()
        }
        _ => a == b,
    }
}

/// The binding forms of expressions and program graphs.
///
/// Unlike the `map`, `filter`, `fold`, `compose` and `if` primitives, which take evaluated
/// function values, combinators evaluate an operand expression once per binding.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    /// Applies a body to every element of a list.
    Map,
    /// Keeps the elements of a list a predicate holds for.
    Filter,
    /// Threads an accumulator through the elements of a list.
    Fold,
    /// Evaluates an inner expression and binds its value for an outer one.
    Compose,
    /// Chooses between two expressions.
    Conditional,
}

impl Combinator {
    /// Label used when rendering programs and graphs.
    pub fn name(&self) -> &'static str {
        match self {
            Combinator::Map => "map",
            Combinator::Filter => "filter",
            Combinator::Fold => "fold",
            Combinator::Compose => "compose",
            Combinator::Conditional => "if",
        }
    }

    /// Number of operands.
    pub fn arity(&self) -> usize {
        match self {
            Combinator::Map | Combinator::Filter | Combinator::Compose => 2,
            Combinator::Fold | Combinator::Conditional => 3,
        }
    }
}

/// The registry of primitives, keyed by name.
#[derive(Debug)]
pub struct Library {
    by_name: BTreeMap<&'static str, Primitive>,
}

lazy_static! {
    static ref STANDARD: Library = Library::standard();
}

impl Library {
    /// Version of the primitive set; bumped whenever a primitive is added or changes meaning.
    pub const VERSION: u32 = 2;

    fn standard() -> Self {
        let by_name = Primitive::ALL.iter().map(|p| (p.name(), *p)).collect();
        Self { by_name }
    }

    /// The process-wide library.
    pub fn global() -> &'static Library {
        &STANDARD
    }

    /// Resolves a primitive by name.
    pub fn lookup(&self, name: &str) -> Option<Primitive> {
        self.by_name.get(name).copied()
    }

    /// All primitives in lexicographic name order.
    pub fn primitives(&self) -> impl Iterator<Item = Primitive> + '_ {
        self.by_name.values().copied()
    }

    /// Number of primitives.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns whether the library is empty.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(p: Primitive, args: &[Value]) -> Result<Value, PrimitiveError> {
        let refs: Vec<&Value> = args.iter().collect();
        p.apply(&refs)
    }

    #[test]
    fn names_are_unique_and_resolve() {
        let lib = Library::global();
        assert_eq!(lib.len(), Primitive::ALL.len());
        for p in Primitive::ALL {
            assert_eq!(lib.lookup(p.name()), Some(*p));
        }
        assert_eq!(lib.lookup("frobnicate"), None);
    }

    #[test]
    fn name_order() {
        let names: Vec<_> = Library::global().primitives().map(|p| p.name()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names[0], "add");
    }

    #[test]
    fn arithmetic() {
        assert_eq!(apply(Multiply, &[Value::Int(5), Value::Int(2)]), Ok(Value::Int(10)));
        assert_eq!(apply(Add, &[Value::Int(1), Value::float(0.5)]), Ok(Value::float(1.5)));
        assert_eq!(apply(Divide, &[Value::Int(7), Value::Int(2)]), Ok(Value::float(3.5)));
        assert_eq!(apply(FloorDiv, &[Value::Int(-7), Value::Int(2)]), Ok(Value::Int(-4)));
        assert_eq!(apply(Modulo, &[Value::Int(-7), Value::Int(3)]), Ok(Value::Int(2)));
        assert_eq!(apply(Modulo, &[Value::Int(7), Value::Int(-3)]), Ok(Value::Int(-2)));
        assert_eq!(apply(Double, &[Value::Int(21)]), Ok(Value::Int(42)));
        assert_eq!(apply(Negate, &[Value::float(1.5)]), Ok(Value::float(-1.5)));
    }

    #[test]
    fn domain_errors() {
        assert_eq!(
            apply(Divide, &[Value::Int(1), Value::Int(0)]),
            Err(PrimitiveError::DivisionByZero { op: "divide" })
        );
        assert_eq!(
            apply(Modulo, &[Value::Int(1), Value::Int(0)]),
            Err(PrimitiveError::DivisionByZero { op: "modulo" })
        );
        assert_eq!(
            apply(Add, &[Value::Int(i64::MAX), Value::Int(1)]),
            Err(PrimitiveError::Overflow { op: "add" })
        );
        assert_eq!(
            apply(Head, &[Value::ints(&[])]),
            Err(PrimitiveError::EmptyList { op: "head" })
        );
        assert!(matches!(
            apply(Add, &[Value::Bool(true), Value::Int(1)]),
            Err(PrimitiveError::SortMismatch { position: 0, .. })
        ));
        assert!(matches!(
            apply(Not, &[]),
            Err(PrimitiveError::Arity { expected: 1, found: 0, .. })
        ));
    }

    #[test]
    fn comparisons() {
        assert_eq!(apply(Eq, &[Value::Int(2), Value::float(2.0)]), Ok(Value::Bool(true)));
        assert_eq!(apply(Ne, &[Value::str("a"), Value::str("b")]), Ok(Value::Bool(true)));
        assert_eq!(apply(Gt, &[Value::Int(3), Value::Int(2)]), Ok(Value::Bool(true)));
        assert_eq!(apply(Le, &[Value::float(2.5), Value::Int(2)]), Ok(Value::Bool(false)));
    }

    #[test]
    fn lists() {
        let xs = Value::ints(&[1, 2, 3]);
        assert_eq!(apply(Len, &[xs.clone()]), Ok(Value::Int(3)));
        assert_eq!(apply(Last, &[xs.clone()]), Ok(Value::Int(3)));
        assert_eq!(apply(Tail, &[xs.clone()]), Ok(Value::ints(&[2, 3])));
        assert_eq!(apply(Init, &[xs.clone()]), Ok(Value::ints(&[1, 2])));
        assert_eq!(apply(Tail, &[Value::ints(&[])]), Ok(Value::ints(&[])));
        assert_eq!(
            apply(Cons, &[Value::Int(0), xs.clone()]),
            Ok(Value::ints(&[0, 1, 2, 3]))
        );
        assert_eq!(
            apply(Concat, &[xs.clone(), Value::ints(&[4])]),
            Ok(Value::ints(&[1, 2, 3, 4]))
        );
    }

    #[test]
    fn strings() {
        assert_eq!(
            apply(Append, &[Value::str("ab"), Value::str("cd")]),
            Ok(Value::str("abcd"))
        );
        assert_eq!(apply(Upper, &[Value::str("abc")]), Ok(Value::str("ABC")));
        assert_eq!(apply(Trim, &[Value::str("  x ")]), Ok(Value::str("x")));
        assert_eq!(apply(StrLen, &[Value::str("héllo")]), Ok(Value::Int(5)));
        assert_eq!(
            apply(Words, &[Value::str("Ben Bitdiddle, 2002")]),
            Ok(Value::List(vec![
                Value::str("Ben"),
                Value::str("Bitdiddle"),
                Value::str("2002")
            ]))
        );
        assert_eq!(
            apply(Numbers, &[Value::str("(617) 253-1337")]),
            Ok(Value::ints(&[617, 253, 1337]))
        );
    }

    #[test]
    fn higher_order() {
        let xs = Value::ints(&[1, 2, 3]);
        assert_eq!(
            apply(Map, &[Value::function(Double), xs.clone()]),
            Ok(Value::ints(&[2, 4, 6]))
        );
        assert_eq!(
            apply(
                Filter,
                &[
                    Value::function(Not),
                    Value::List(vec![Value::Bool(true), Value::Bool(false)])
                ]
            ),
            Ok(Value::List(vec![Value::Bool(false)]))
        );
        assert_eq!(
            apply(Fold, &[Value::function(Subtract), Value::Int(10), xs.clone()]),
            Ok(Value::Int(4))
        );
        let twice_then_inc = apply(Compose, &[Value::function(Increment), Value::function(Double)]);
        assert_eq!(twice_then_inc, Ok(Value::Fn(vec![Double, Increment])));
        assert_eq!(
            apply(Map, &[Value::Fn(vec![Double, Increment]), xs.clone()]),
            Ok(Value::ints(&[3, 5, 7]))
        );
        assert!(matches!(
            apply(Compose, &[Value::function(Add), Value::function(Double)]),
            Err(PrimitiveError::Arity { op: "add", .. })
        ));
        assert!(matches!(
            apply(Filter, &[Value::function(Double), xs]),
            Err(PrimitiveError::SortMismatch { op: "filter", .. })
        ));
        assert!(matches!(
            apply(Map, &[Value::Int(1), Value::ints(&[1])]),
            Err(PrimitiveError::SortMismatch { op: "map", position: 0, .. })
        ));
    }

    #[test]
    fn conditional_primitive() {
        assert_eq!(
            apply(If, &[Value::Bool(true), Value::Int(1), Value::Int(2)]),
            Ok(Value::Int(1))
        );
        assert_eq!(
            apply(If, &[Value::Bool(false), Value::Int(1), Value::str("x")]),
            Ok(Value::str("x"))
        );
        for name in ["map", "filter", "fold", "compose", "if"] {
            assert!(Library::global().lookup(name).is_some(), "{}", name);
        }
    }

    #[test]
    fn combinator_arity() {
        assert_eq!(Combinator::Fold.arity(), 3);
        assert_eq!(Combinator::Map.name(), "map");
    }
}
