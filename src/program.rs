//! Generalized programs.

use crate::error::PrimitiveError;
use crate::expr::Expr;
use crate::value::{Sort, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a program parameter comes from.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum ParameterSource {
    /// One of the demonstration inputs.
    Input,
    /// A constant that differed between demonstrations, with the value it took in each.
    Generalized {
        /// One value per demonstration, in demonstration order.
        values: Vec<Value>,
    },
}

/// A declared program parameter. `InputRef(index)` in the program body refers to it.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Parameter {
    /// Position in the argument list.
    pub index: usize,
    /// Origin of the parameter.
    pub source: ParameterSource,
    /// The sort every argument bound to this parameter must have: the join of the sorts it took
    /// across the demonstrations.
    pub sort: Sort,
}

impl Parameter {
    /// A parameter standing for demonstration input `index`.
    pub fn input(index: usize, sort: Sort) -> Self {
        Self {
            index,
            source: ParameterSource::Input,
            sort,
        }
    }

    /// A parameter generalizing a constant that took `values` across the demonstrations.
    pub fn generalized(index: usize, values: Vec<Value>) -> Self {
        Self {
            index,
            sort: Sort::of(&values),
            source: ParameterSource::Generalized { values },
        }
    }
}

/// A program learned from one or more demonstrations.
///
/// The first parameters are the demonstration inputs; any further ones are constants the
/// demonstrations disagreed on. A program is immutable once synthesized and can be stored with
/// any serde format.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Program {
    /// The program body.
    pub expr: Expr,
    /// Declared parameters, ordered by index.
    pub parameters: Vec<Parameter>,
    /// The sort of the demonstrated outputs.
    pub returns: Sort,
}

impl Program {
    /// Number of arguments the program takes.
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Whether `args` has one value per parameter, each admitted by the parameter's sort.
    pub fn accepts(&self, args: &[Value]) -> bool {
        args.len() == self.parameters.len()
            && self.parameters.iter().zip(args).all(|(p, v)| p.sort.admits(v))
    }

    /// Parameters that generalize a constant rather than stand for an input.
    pub fn generalized(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(|p| matches!(p.source, ParameterSource::Generalized { .. }))
    }

    /// The full argument list that replays demonstration `example`, given its inputs.
    pub fn arguments_for(&self, example: usize, inputs: &[Value]) -> Vec<Value> {
        let mut args = inputs.to_vec();
        for p in self.generalized() {
            if let ParameterSource::Generalized { values } = &p.source {
                if let Some(v) = values.get(example) {
                    args.push(v.clone());
                }
            }
        }
        args
    }

    /// Evaluates the program body directly on an argument list.
    pub fn eval(&self, args: &[Value]) -> Result<Value, PrimitiveError> {
        self.expr.eval(args)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for p in &self.parameters {
            if p.index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "in{}", p.index)?;
        }
        write!(f, ") -> {}", self.expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::Primitive;

    fn scale() -> Program {
        Program {
            expr: Expr::Apply(Primitive::Multiply, vec![Expr::InputRef(0), Expr::InputRef(1)]),
            parameters: vec![
                Parameter::input(0, Sort::Int),
                Parameter::generalized(1, vec![Value::Int(2), Value::Int(3)]),
            ],
            returns: Sort::Int,
        }
    }

    #[test]
    fn replay_arguments() {
        let p = scale();
        assert_eq!(p.arity(), 2);
        assert_eq!(
            p.arguments_for(1, &[Value::Int(7)]),
            vec![Value::Int(7), Value::Int(3)]
        );
        assert_eq!(p.eval(&p.arguments_for(0, &[Value::Int(5)])), Ok(Value::Int(10)));
    }

    #[test]
    fn parameters_carry_sorts() {
        let p = scale();
        assert_eq!(p.parameters[1].sort, Sort::Int);
        assert!(p.accepts(&[Value::Int(1), Value::Int(2)]));
        assert!(!p.accepts(&[Value::str("a"), Value::Int(2)]));
        assert!(!p.accepts(&[Value::Int(1)]));
        let mixed = Parameter::generalized(0, vec![Value::Int(1), Value::float(0.5)]);
        assert_eq!(mixed.sort, Sort::Num);
    }

    #[test]
    fn display() {
        assert_eq!(scale().to_string(), "(in0, in1) -> multiply(in0, in1)");
    }

    #[test]
    fn persists_as_json() {
        let p = scale();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(serde_json::from_str::<Program>(&json).unwrap(), p);
    }
}
