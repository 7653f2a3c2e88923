//! Expression trees: the programs the synthesizer searches over.

use crate::error::PrimitiveError;
use crate::primitive::{Combinator, Primitive};
use crate::value::{Sort, Value};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// An expression tree.
///
/// Variables bound by combinators are referenced with de Bruijn indices: `Bound(0)` is the
/// innermost binding. [`Expr::MapOver`] and [`Expr::FilterOver`] bind the current element,
/// [`Expr::FoldOver`] binds the accumulator and then the element (so `Bound(0)` is the element and
/// `Bound(1)` the accumulator), and [`Expr::Compose`] binds the value of its inner expression while
/// evaluating the outer one.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
pub enum Expr {
    /// A constant.
    Literal(Value),
    /// The value of a program parameter.
    InputRef(usize),
    /// A variable bound by an enclosing combinator.
    Bound(usize),
    /// A primitive applied to argument expressions.
    Apply(Primitive, Vec<Expr>),
    /// `Compose(outer, inner)` evaluates `outer` with the value of `inner` bound.
    Compose(Box<Expr>, Box<Expr>),
    /// `MapOver(body, collection)`.
    MapOver(Box<Expr>, Box<Expr>),
    /// `FilterOver(predicate, collection)`.
    FilterOver(Box<Expr>, Box<Expr>),
    /// `FoldOver(combiner, initial, collection)`.
    FoldOver(Box<Expr>, Box<Expr>, Box<Expr>),
    /// `Conditional(predicate, then, else)`.
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// One primitive application observed while evaluating an expression.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Application {
    /// The primitive that was applied.
    pub op: Primitive,
    /// What it returned.
    pub result: Value,
}

impl Expr {
    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        let mut stack = vec![self];
        let mut n = 0;
        while let Some(e) = stack.pop() {
            n += 1;
            stack.extend(e.children());
        }
        n
    }

    /// The immediate sub-expressions, in operand order.
    pub fn children(&self) -> SmallVec<[&Expr; 3]> {
        match self {
            Expr::Literal(_) | Expr::InputRef(_) | Expr::Bound(_) => SmallVec::new(),
            Expr::Apply(_, args) => args.iter().collect(),
            Expr::Compose(a, b) | Expr::MapOver(a, b) | Expr::FilterOver(a, b) => {
                SmallVec::from_slice(&[&**a, &**b])
            }
            Expr::FoldOver(a, b, c) | Expr::Conditional(a, b, c) => {
                SmallVec::from_slice(&[&**a, &**b, &**c])
            }
        }
    }

    /// The combinator at the root of this expression, if any.
    pub fn combinator(&self) -> Option<Combinator> {
        match self {
            Expr::Compose(..) => Some(Combinator::Compose),
            Expr::MapOver(..) => Some(Combinator::Map),
            Expr::FilterOver(..) => Some(Combinator::Filter),
            Expr::FoldOver(..) => Some(Combinator::Fold),
            Expr::Conditional(..) => Some(Combinator::Conditional),
            _ => None,
        }
    }

    /// A short description of the root node alone.
    pub fn label(&self) -> String {
        match self {
            Expr::Literal(v) => v.to_string(),
            Expr::InputRef(i) => format!("in{}", i),
            Expr::Bound(k) => format!("#{}", k),
            Expr::Apply(p, _) => String::from(p.name()),
            e => e.combinator().map(|c| c.name()).unwrap_or_default().to_string(),
        }
    }

    /// Rebuilds this node over new children, given in operand order. Leaves are returned as they
    /// are, as is any node handed the wrong number of children.
    pub(crate) fn with_children(&self, children: Vec<Expr>) -> Expr {
        if let Expr::Apply(p, _) = self {
            return Expr::Apply(*p, children);
        }
        let mut it = children.into_iter().map(Box::new);
        match (self, it.next(), it.next(), it.next()) {
            (Expr::Compose(..), Some(a), Some(b), None) => Expr::Compose(a, b),
            (Expr::MapOver(..), Some(a), Some(b), None) => Expr::MapOver(a, b),
            (Expr::FilterOver(..), Some(a), Some(b), None) => Expr::FilterOver(a, b),
            (Expr::FoldOver(..), Some(a), Some(b), Some(c)) => Expr::FoldOver(a, b, c),
            (Expr::Conditional(..), Some(a), Some(b), Some(c)) => Expr::Conditional(a, b, c),
            _ => self.clone(),
        }
    }

    /// Lowers applications of the `map`, `filter`, `fold` and `compose` primitives to constant
    /// function values into the corresponding loop nodes, so that the body becomes part of the
    /// program tree.
    ///
    /// ```
    /// use exemplar::expr::Expr;
    /// use exemplar::primitive::Primitive;
    /// use exemplar::value::Value;
    ///
    /// let e = Expr::Apply(
    ///     Primitive::Map,
    ///     vec![Expr::Literal(Value::function(Primitive::Double)), Expr::InputRef(0)],
    /// );
    /// assert_eq!(e.inline_functions().to_string(), "map(double(#0), in0)");
    /// ```
    pub fn inline_functions(&self) -> Expr {
        let children: Vec<Expr> = self.children().iter().map(|c| c.inline_functions()).collect();
        let e = self.with_children(children);
        let lowered = match &e {
            Expr::Apply(Primitive::Compose, args) if args.iter().all(is_literal) => {
                e.eval(&[]).ok().map(Expr::Literal)
            }
            Expr::Apply(Primitive::Map, args) => match args.as_slice() {
                [Expr::Literal(Value::Fn(f)), coll] => stage_body(f, &[Expr::Bound(0)])
                    .map(|body| Expr::MapOver(Box::new(body), Box::new(coll.clone()))),
                _ => None,
            },
            Expr::Apply(Primitive::Filter, args) => match args.as_slice() {
                [Expr::Literal(Value::Fn(f)), coll] => stage_body(f, &[Expr::Bound(0)])
                    .map(|body| Expr::FilterOver(Box::new(body), Box::new(coll.clone()))),
                _ => None,
            },
            Expr::Apply(Primitive::Fold, args) => match args.as_slice() {
                [Expr::Literal(Value::Fn(f)), init, coll] => {
                    stage_body(f, &[Expr::Bound(1), Expr::Bound(0)]).map(|body| {
                        Expr::FoldOver(
                            Box::new(body),
                            Box::new(init.clone()),
                            Box::new(coll.clone()),
                        )
                    })
                }
                _ => None,
            },
            _ => None,
        };
        lowered.unwrap_or(e)
    }

    /// Evaluates the expression on the given inputs.
    ///
    /// ```
    /// use exemplar::expr::Expr;
    /// use exemplar::primitive::Primitive;
    /// use exemplar::value::Value;
    ///
    /// let e = Expr::MapOver(
    ///     Box::new(Expr::Apply(Primitive::Double, vec![Expr::Bound(0)])),
    ///     Box::new(Expr::InputRef(0)),
    /// );
    /// assert_eq!(e.eval(&[Value::ints(&[1, 2, 3])]), Ok(Value::ints(&[2, 4, 6])));
    /// ```
    pub fn eval(&self, inputs: &[Value]) -> Result<Value, PrimitiveError> {
        self.eval_in(inputs, &[])
    }

    /// Evaluates the expression with `env` holding the values of the enclosing bindings, innermost
    /// last.
    pub fn eval_in(&self, inputs: &[Value], env: &[Value]) -> Result<Value, PrimitiveError> {
        Evaluator::new(inputs, env, false).run(self)
    }

    /// Evaluates the expression and also returns every primitive application performed, in
    /// evaluation order, including those inside loop bodies.
    pub fn eval_traced(
        &self,
        inputs: &[Value],
    ) -> Result<(Value, Vec<Application>), PrimitiveError> {
        self.eval_traced_in(inputs, &[])
    }

    /// Like [`Expr::eval_traced`], with enclosing bindings as in [`Expr::eval_in`].
    pub fn eval_traced_in(
        &self,
        inputs: &[Value],
        env: &[Value],
    ) -> Result<(Value, Vec<Application>), PrimitiveError> {
        let mut evaluator = Evaluator::new(inputs, env, true);
        let value = evaluator.run(self)?;
        Ok((value, evaluator.applications))
    }
}

fn is_literal(e: &Expr) -> bool {
    matches!(e, Expr::Literal(_))
}

// The body of a function value applied to `args`: the first stage takes all of them, every later
// stage the result of the one before.
fn stage_body(stages: &[Primitive], args: &[Expr]) -> Option<Expr> {
    let (first, rest) = match stages.split_first() {
        Some(split) => split,
        None if args.len() == 1 => return Some(args[0].clone()),
        None => return None,
    };
    if first.arity() != args.len() || rest.iter().any(|p| p.arity() != 1) {
        return None;
    }
    let mut body = Expr::Apply(*first, args.to_vec());
    for p in rest {
        body = Expr::Apply(*p, vec![body]);
    }
    Some(body)
}

enum Frame<'e> {
    Eval(&'e Expr),
    Call(Primitive, usize),
    Bind(&'e Expr),
    Unbind,
    Branch(&'e Expr, &'e Expr),
    MapBegin(&'e Expr),
    FilterBegin(&'e Expr),
    FoldBegin(&'e Expr),
    Map {
        body: &'e Expr,
        rest: std::vec::IntoIter<Value>,
        out: Vec<Value>,
        pending: bool,
    },
    Filter {
        pred: &'e Expr,
        rest: std::vec::IntoIter<Value>,
        out: Vec<Value>,
        current: Option<Value>,
    },
    Fold {
        comb: &'e Expr,
        rest: std::vec::IntoIter<Value>,
        acc: Option<Value>,
    },
}

struct Evaluator<'a> {
    inputs: &'a [Value],
    env: Vec<Value>,
    values: Vec<Value>,
    record: bool,
    applications: Vec<Application>,
}

fn expect_list(op: &'static str, position: usize, v: Value) -> Result<Vec<Value>, PrimitiveError> {
    match v {
        Value::List(xs) => Ok(xs),
        found => Err(PrimitiveError::SortMismatch {
            op,
            position,
            expected: Sort::List,
            found,
        }),
    }
}

fn expect_bool(op: &'static str, v: Value) -> Result<bool, PrimitiveError> {
    match v {
        Value::Bool(b) => Ok(b),
        found => Err(PrimitiveError::SortMismatch {
            op,
            position: 0,
            expected: Sort::Bool,
            found,
        }),
    }
}

impl<'a> Evaluator<'a> {
    fn new(inputs: &'a [Value], env: &[Value], record: bool) -> Self {
        Self {
            inputs,
            env: env.to_vec(),
            values: Vec::new(),
            record,
            applications: Vec::new(),
        }
    }

    fn pop(&mut self) -> Value {
        // frames only consume values their children pushed
        debug_assert!(!self.values.is_empty(), "evaluator value stack underflow");
        self.values.pop().unwrap_or(Value::List(Vec::new()))
    }

    fn run(&mut self, root: &Expr) -> Result<Value, PrimitiveError> {
        let mut stack = vec![Frame::Eval(root)];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Eval(e) => match e {
                    Expr::Literal(v) => self.values.push(v.clone()),
                    Expr::InputRef(i) => {
                        let v = self.inputs.get(*i).ok_or(PrimitiveError::MissingInput(*i))?;
                        self.values.push(v.clone());
                    }
                    Expr::Bound(k) => {
                        let v = self
                            .env
                            .len()
                            .checked_sub(k + 1)
                            .and_then(|at| self.env.get(at))
                            .ok_or(PrimitiveError::UnboundVariable(*k))?;
                        self.values.push(v.clone());
                    }
                    Expr::Apply(p, args) => {
                        stack.push(Frame::Call(*p, args.len()));
                        stack.extend(args.iter().rev().map(Frame::Eval));
                    }
                    Expr::Compose(outer, inner) => {
                        stack.push(Frame::Bind(outer));
                        stack.push(Frame::Eval(inner));
                    }
                    Expr::MapOver(body, coll) => {
                        stack.push(Frame::MapBegin(body));
                        stack.push(Frame::Eval(coll));
                    }
                    Expr::FilterOver(pred, coll) => {
                        stack.push(Frame::FilterBegin(pred));
                        stack.push(Frame::Eval(coll));
                    }
                    Expr::FoldOver(comb, init, coll) => {
                        stack.push(Frame::FoldBegin(comb));
                        stack.push(Frame::Eval(coll));
                        stack.push(Frame::Eval(init));
                    }
                    Expr::Conditional(pred, then, other) => {
                        stack.push(Frame::Branch(then, other));
                        stack.push(Frame::Eval(pred));
                    }
                },
                Frame::Call(p, n) => {
                    let args = self.values.split_off(self.values.len().saturating_sub(n));
                    let refs: SmallVec<[&Value; 3]> = args.iter().collect();
                    let result = p.apply(&refs)?;
                    if self.record {
                        self.applications.push(Application {
                            op: p,
                            result: result.clone(),
                        });
                    }
                    self.values.push(result);
                }
                Frame::Bind(outer) => {
                    let v = self.pop();
                    self.env.push(v);
                    stack.push(Frame::Unbind);
                    stack.push(Frame::Eval(outer));
                }
                Frame::Unbind => {
                    self.env.pop();
                }
                Frame::Branch(then, other) => {
                    let cond = self.pop();
                    let chosen = if expect_bool("if", cond)? { then } else { other };
                    stack.push(Frame::Eval(chosen));
                }
                Frame::MapBegin(body) => {
                    let xs = expect_list("map", 1, self.pop())?;
                    stack.push(Frame::Map {
                        body,
                        out: Vec::with_capacity(xs.len()),
                        rest: xs.into_iter(),
                        pending: false,
                    });
                }
                Frame::FilterBegin(pred) => {
                    let xs = expect_list("filter", 1, self.pop())?;
                    stack.push(Frame::Filter {
                        pred,
                        out: Vec::new(),
                        rest: xs.into_iter(),
                        current: None,
                    });
                }
                Frame::FoldBegin(comb) => {
                    let xs = expect_list("fold", 2, self.pop())?;
                    let init = self.pop();
                    stack.push(Frame::Fold {
                        comb,
                        rest: xs.into_iter(),
                        acc: Some(init),
                    });
                }
                Frame::Map {
                    body,
                    mut rest,
                    mut out,
                    pending,
                } => {
                    if pending {
                        let y = self.pop();
                        self.env.pop();
                        out.push(y);
                    }
                    match rest.next() {
                        Some(x) => {
                            self.env.push(x);
                            stack.push(Frame::Map {
                                body,
                                rest,
                                out,
                                pending: true,
                            });
                            stack.push(Frame::Eval(body));
                        }
                        None => self.values.push(Value::List(out)),
                    }
                }
                Frame::Filter {
                    pred,
                    mut rest,
                    mut out,
                    current,
                } => {
                    if let Some(x) = current {
                        let keep = expect_bool("filter", self.pop())?;
                        self.env.pop();
                        if keep {
                            out.push(x);
                        }
                    }
                    match rest.next() {
                        Some(x) => {
                            self.env.push(x.clone());
                            stack.push(Frame::Filter {
                                pred,
                                rest,
                                out,
                                current: Some(x),
                            });
                            stack.push(Frame::Eval(pred));
                        }
                        None => self.values.push(Value::List(out)),
                    }
                }
                Frame::Fold { comb, mut rest, acc } => {
                    let acc = match acc {
                        Some(acc) => acc,
                        None => {
                            let next = self.pop();
                            self.env.pop();
                            self.env.pop();
                            next
                        }
                    };
                    match rest.next() {
                        Some(x) => {
                            self.env.push(acc);
                            self.env.push(x);
                            stack.push(Frame::Fold {
                                comb,
                                rest,
                                acc: None,
                            });
                            stack.push(Frame::Eval(comb));
                        }
                        None => self.values.push(acc),
                    }
                }
            }
        }
        Ok(self.pop())
    }
}

enum Piece<'e> {
    Expr(&'e Expr),
    Text(&'static str),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = vec![Piece::Expr(self)];
        while let Some(piece) = stack.pop() {
            let e = match piece {
                Piece::Text(s) => {
                    f.write_str(s)?;
                    continue;
                }
                Piece::Expr(e) => e,
            };
            let children = e.children();
            if children.is_empty() && e.combinator().is_none() {
                if let Expr::Apply(p, _) = e {
                    write!(f, "{}()", p)?;
                } else {
                    f.write_str(&e.label())?;
                }
                continue;
            }
            write!(f, "{}(", e.label())?;
            stack.push(Piece::Text(")"));
            for (i, child) in children.iter().enumerate().rev() {
                stack.push(Piece::Expr(child));
                if i > 0 {
                    stack.push(Piece::Text(", "));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Primitive::*;

    fn apply(p: Primitive, args: Vec<Expr>) -> Expr {
        Expr::Apply(p, args)
    }

    fn fold_sum() -> Expr {
        Expr::FoldOver(
            Box::new(apply(Add, vec![Expr::Bound(1), Expr::Bound(0)])),
            Box::new(Expr::Literal(Value::Int(0))),
            Box::new(Expr::InputRef(0)),
        )
    }

    #[test]
    fn size_counts_every_node() {
        assert_eq!(Expr::InputRef(0).size(), 1);
        assert_eq!(
            apply(Multiply, vec![Expr::InputRef(0), Expr::Literal(Value::Int(2))]).size(),
            3
        );
        assert_eq!(fold_sum().size(), 6);
    }

    #[test]
    fn display() {
        assert_eq!(
            apply(Multiply, vec![Expr::InputRef(0), Expr::Literal(Value::Int(2))]).to_string(),
            "multiply(in0, 2)"
        );
        assert_eq!(fold_sum().to_string(), "fold(add(#1, #0), 0, in0)");
        let cond = Expr::Conditional(
            Box::new(apply(Gt, vec![Expr::Bound(0), Expr::Literal(Value::Int(2))])),
            Box::new(Expr::Bound(0)),
            Box::new(apply(Negate, vec![Expr::Bound(0)])),
        );
        assert_eq!(cond.to_string(), "if(gt(#0, 2), #0, negate(#0))");
    }

    #[test]
    fn fold_binds_accumulator_below_element() {
        // subtract(acc, x) over [1, 2, 3] from 10
        let e = Expr::FoldOver(
            Box::new(apply(Subtract, vec![Expr::Bound(1), Expr::Bound(0)])),
            Box::new(Expr::Literal(Value::Int(10))),
            Box::new(Expr::InputRef(0)),
        );
        assert_eq!(e.eval(&[Value::ints(&[1, 2, 3])]), Ok(Value::Int(4)));
        assert_eq!(fold_sum().eval(&[Value::ints(&[])]), Ok(Value::Int(0)));
    }

    #[test]
    fn filter_and_conditional() {
        let evens = Expr::FilterOver(
            Box::new(apply(
                Eq,
                vec![
                    apply(Modulo, vec![Expr::Bound(0), Expr::Literal(Value::Int(2))]),
                    Expr::Literal(Value::Int(0)),
                ],
            )),
            Box::new(Expr::InputRef(0)),
        );
        assert_eq!(
            evens.eval(&[Value::ints(&[1, 2, 3, 4])]),
            Ok(Value::ints(&[2, 4]))
        );

        let abs = Expr::MapOver(
            Box::new(Expr::Conditional(
                Box::new(apply(Lt, vec![Expr::Bound(0), Expr::Literal(Value::Int(0))])),
                Box::new(apply(Negate, vec![Expr::Bound(0)])),
                Box::new(Expr::Bound(0)),
            )),
            Box::new(Expr::InputRef(0)),
        );
        assert_eq!(
            abs.eval(&[Value::ints(&[-1, 2, -3])]),
            Ok(Value::ints(&[1, 2, 3]))
        );
    }

    #[test]
    fn compose_binds_inner_value() {
        // (x + 1) * (x + 1)
        let e = Expr::Compose(
            Box::new(apply(Multiply, vec![Expr::Bound(0), Expr::Bound(0)])),
            Box::new(apply(Increment, vec![Expr::InputRef(0)])),
        );
        assert_eq!(e.eval(&[Value::Int(4)]), Ok(Value::Int(25)));
    }

    #[test]
    fn nested_maps_see_outer_bindings() {
        // map(map(add(#0, #1), in1), in0)
        let e = Expr::MapOver(
            Box::new(Expr::MapOver(
                Box::new(apply(Add, vec![Expr::Bound(0), Expr::Bound(1)])),
                Box::new(Expr::InputRef(1)),
            )),
            Box::new(Expr::InputRef(0)),
        );
        assert_eq!(
            e.eval(&[Value::ints(&[10, 20]), Value::ints(&[1, 2])]),
            Ok(Value::List(vec![Value::ints(&[11, 12]), Value::ints(&[21, 22])]))
        );
    }

    #[test]
    fn errors() {
        assert_eq!(Expr::Bound(0).eval(&[]), Err(PrimitiveError::UnboundVariable(0)));
        assert_eq!(Expr::InputRef(2).eval(&[]), Err(PrimitiveError::MissingInput(2)));
        let e = Expr::MapOver(Box::new(Expr::Bound(0)), Box::new(Expr::Literal(Value::Int(1))));
        assert!(matches!(
            e.eval(&[]),
            Err(PrimitiveError::SortMismatch { op: "map", .. })
        ));
        assert_eq!(
            apply(Head, vec![Expr::Literal(Value::ints(&[]))]).eval(&[]),
            Err(PrimitiveError::EmptyList { op: "head" })
        );
    }

    #[test]
    fn traced_evaluation_reports_loop_bodies() {
        let e = Expr::MapOver(
            Box::new(apply(Double, vec![Expr::Bound(0)])),
            Box::new(Expr::InputRef(0)),
        );
        let (v, apps) = e.eval_traced(&[Value::ints(&[1, 2])]).unwrap();
        assert_eq!(v, Value::ints(&[2, 4]));
        assert_eq!(
            apps,
            vec![
                Application {
                    op: Double,
                    result: Value::Int(2)
                },
                Application {
                    op: Double,
                    result: Value::Int(4)
                },
            ]
        );
    }

    #[test]
    fn function_applications_lower_to_loops() {
        let f = |stages: Vec<Primitive>| Expr::Literal(Value::Fn(stages));
        let mapped = apply(Map, vec![f(vec![Increment, Double]), Expr::InputRef(0)]);
        let lowered = mapped.inline_functions();
        assert_eq!(lowered.to_string(), "map(double(increment(#0)), in0)");
        let xs = [Value::ints(&[1, 2])];
        assert_eq!(lowered.eval(&xs), mapped.eval(&xs));

        let summed = apply(
            Fold,
            vec![f(vec![Add]), Expr::Literal(Value::Int(0)), Expr::InputRef(0)],
        );
        assert_eq!(summed.inline_functions(), fold_sum());

        let composed = apply(
            Filter,
            vec![
                apply(Compose, vec![f(vec![Not]), f(vec![Not])]),
                Expr::InputRef(0),
            ],
        );
        assert_eq!(
            composed.inline_functions().to_string(),
            "filter(not(not(#0)), in0)"
        );

        // a binary first stage cannot be mapped
        let kept = apply(Map, vec![f(vec![Add]), Expr::InputRef(0)]);
        assert_eq!(kept.inline_functions(), kept);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "underflow")]
    fn popping_an_empty_stack_is_a_bug() {
        Evaluator::new(&[], &[], false).pop();
    }

    #[test]
    fn serde_round_trip() {
        let e = fold_sum();
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(serde_json::from_str::<Expr>(&json).unwrap(), e);
    }
}
