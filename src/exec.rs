//! Execution of program graphs.
//!
//! The graph is run with an explicit work stack, so deeply nested programs do not grow the call
//! stack. Each node's value is cached for the duration of a run. Combinator bodies are re-run once
//! per binding: because a subtree occupies a contiguous id range, clearing a body's cached values
//! before an iteration is a matter of resetting that range.

use crate::compile::{Node, NodeId, NodeKind, ProgramGraph, Source};
use crate::error::{GraphInvariantError, PrimitiveApplicationError, PrimitiveError, RuntimeError};
use crate::primitive::Combinator;
use crate::value::{Sort, Value};
use std::vec;

/// Runs a graph on a full argument list (inputs followed by generalized constants).
///
/// The graph is validated first, so a graph that was edited or deserialized from an untrusted
/// source is rejected rather than run. Each argument must be admitted by the sort its parameter
/// was learned with.
///
/// ```
/// use exemplar::compile::compile;
/// use exemplar::exec;
/// use exemplar::expr::Expr;
/// use exemplar::primitive::Primitive;
/// use exemplar::program::{Parameter, Program};
/// use exemplar::value::{Sort, Value};
///
/// let program = Program {
///     expr: Expr::MapOver(
///         Box::new(Expr::Apply(Primitive::Double, vec![Expr::Bound(0)])),
///         Box::new(Expr::InputRef(0)),
///     ),
///     parameters: vec![Parameter::input(0, Sort::List)],
///     returns: Sort::List,
/// };
/// let graph = compile(&program);
/// assert_eq!(exec::run(&graph, &[Value::ints(&[1, 2, 3])]), Ok(Value::ints(&[2, 4, 6])));
/// assert!(exec::run(&graph, &[Value::Int(1)]).is_err());
/// ```
pub fn run(graph: &ProgramGraph, params: &[Value]) -> Result<Value, RuntimeError> {
    if params.len() != graph.parameters() {
        return Err(RuntimeError::ParameterCount {
            expected: graph.parameters(),
            found: params.len(),
        });
    }
    graph.validate()?;
    let mismatch = graph
        .parameter_sorts()
        .iter()
        .zip(params)
        .position(|(sort, v)| !sort.admits(v));
    if let Some(index) = mismatch {
        log::debug!(target: "exec", "argument {} rejected: {}", index, params[index]);
        return Err(RuntimeError::ArgumentSort {
            index,
            expected: graph.parameter_sorts()[index],
            found: params[index].clone(),
        });
    }
    let mut machine = Machine::new(graph, params);
    let result = machine.run(graph.output())?;
    log::debug!(target: "exec", "{} nodes produced {}", graph.nodes().len(), result);
    Ok(result)
}

enum Gather {
    Map(Vec<Value>),
    Filter(Vec<Value>),
    Fold(Value),
}

struct Loop {
    node: NodeId,
    body: NodeId,
    rest: vec::IntoIter<Value>,
    gather: Gather,
    // element of the iteration in flight
    current: Option<Value>,
    depth: usize,
}

enum Task {
    Visit(NodeId),
    Reduce(NodeId),
    Bind(NodeId),
    Unbind(NodeId),
    LoopStart(NodeId),
    Loop(Loop),
    Branch(NodeId),
    Select(NodeId, NodeId),
}

struct Machine<'g> {
    graph: &'g ProgramGraph,
    params: &'g [Value],
    cache: Vec<Option<Value>>,
    env: Vec<Value>,
}

impl<'g> Machine<'g> {
    fn new(graph: &'g ProgramGraph, params: &'g [Value]) -> Self {
        Self {
            graph,
            params,
            cache: vec![None; graph.nodes().len()],
            env: Vec::new(),
        }
    }

    fn fail(&self, id: NodeId, source: PrimitiveError) -> RuntimeError {
        PrimitiveApplicationError {
            node: id,
            label: self.graph.label(id).unwrap_or_default(),
            source,
        }
        .into()
    }

    fn node(&self, id: NodeId) -> Result<&'g Node, RuntimeError> {
        let graph = self.graph;
        graph
            .node(id)
            .ok_or(RuntimeError::Malformed(GraphInvariantError::MissingNode {
                from: id,
                to: graph.output(),
            }))
    }

    fn missing_slot(&self, node: &Node) -> RuntimeError {
        RuntimeError::Malformed(GraphInvariantError::Slots {
            node: node.id,
            expected: node.kind.arity(),
            found: node.inputs.len(),
        })
    }

    fn child(&self, node: &Node, slot: usize) -> Result<NodeId, RuntimeError> {
        match node.inputs.get(slot) {
            Some(Source::Node(id)) => Ok(*id),
            _ => Err(self.missing_slot(node)),
        }
    }

    // The value flowing into `slot`, which must already be computed.
    fn operand(&self, node: &Node, slot: usize) -> Result<Value, RuntimeError> {
        let value = match node.inputs.get(slot) {
            Some(Source::Param(i)) => {
                return self
                    .params
                    .get(*i)
                    .cloned()
                    .ok_or_else(|| self.fail(node.id, PrimitiveError::MissingInput(*i)));
            }
            Some(Source::Node(id)) => self.cache.get(id.0).cloned().flatten(),
            None => None,
        };
        value.ok_or_else(|| self.missing_slot(node))
    }

    fn store(&mut self, id: NodeId, value: Value) {
        log::trace!(target: "exec", "node {} = {}", id, value);
        self.cache[id.0] = Some(value);
    }

    // Forgets the values of the subtree rooted at `id`.
    fn clear(&mut self, id: NodeId) -> Result<(), RuntimeError> {
        let span = self.node(id)?.span;
        let end = match id.0.checked_add(span) {
            Some(end) => end.min(self.cache.len()),
            None => self.cache.len(),
        };
        for slot in &mut self.cache[id.0..end] {
            *slot = None;
        }
        Ok(())
    }

    fn run(&mut self, root: NodeId) -> Result<Value, RuntimeError> {
        let mut tasks = vec![Task::Visit(root)];
        while let Some(task) = tasks.pop() {
            match task {
                Task::Visit(id) => {
                    if self.cache.get(id.0).map_or(false, Option::is_some) {
                        continue;
                    }
                    let node = self.node(id)?;
                    match &node.kind {
                        NodeKind::Literal(v) => self.store(id, v.clone()),
                        NodeKind::Bound(k) => {
                            let v = self
                                .env
                                .len()
                                .checked_sub(k + 1)
                                .and_then(|at| self.env.get(at))
                                .cloned()
                                .ok_or_else(|| self.fail(id, PrimitiveError::UnboundVariable(*k)))?;
                            self.store(id, v);
                        }
                        NodeKind::Input(_) | NodeKind::Apply(_) => {
                            tasks.push(Task::Reduce(id));
                            for source in node.inputs.iter().rev() {
                                if let Source::Node(child) = source {
                                    tasks.push(Task::Visit(*child));
                                }
                            }
                        }
                        NodeKind::Combinator(Combinator::Compose) => {
                            tasks.push(Task::Bind(id));
                            tasks.push(Task::Visit(self.child(node, 1)?));
                        }
                        NodeKind::Combinator(Combinator::Map | Combinator::Filter) => {
                            tasks.push(Task::LoopStart(id));
                            tasks.push(Task::Visit(self.child(node, 1)?));
                        }
                        NodeKind::Combinator(Combinator::Fold) => {
                            tasks.push(Task::LoopStart(id));
                            tasks.push(Task::Visit(self.child(node, 2)?));
                            tasks.push(Task::Visit(self.child(node, 1)?));
                        }
                        NodeKind::Combinator(Combinator::Conditional) => {
                            tasks.push(Task::Branch(id));
                            tasks.push(Task::Visit(self.child(node, 0)?));
                        }
                    }
                }
                Task::Reduce(id) => {
                    let node = self.node(id)?;
                    let value = match &node.kind {
                        NodeKind::Apply(p) => {
                            let args = (0..node.inputs.len())
                                .map(|slot| self.operand(node, slot))
                                .collect::<Result<Vec<_>, _>>()?;
                            let refs: Vec<&Value> = args.iter().collect();
                            p.apply(&refs).map_err(|e| self.fail(id, e))?
                        }
                        _ => self.operand(node, 0)?,
                    };
                    self.store(id, value);
                }
                Task::Bind(id) => {
                    let node = self.node(id)?;
                    let inner = self.operand(node, 1)?;
                    let outer = self.child(node, 0)?;
                    self.env.push(inner);
                    self.clear(outer)?;
                    tasks.push(Task::Unbind(id));
                    tasks.push(Task::Visit(outer));
                }
                Task::Unbind(id) => {
                    self.env.pop();
                    let value = self.operand(self.node(id)?, 0)?;
                    self.store(id, value);
                }
                Task::LoopStart(id) => {
                    let node = self.node(id)?;
                    let (op, gather, position) = match node.kind {
                        NodeKind::Combinator(Combinator::Fold) => {
                            ("fold", Gather::Fold(self.operand(node, 1)?), 2)
                        }
                        NodeKind::Combinator(Combinator::Filter) => {
                            ("filter", Gather::Filter(Vec::new()), 1)
                        }
                        _ => ("map", Gather::Map(Vec::new()), 1),
                    };
                    let xs = match self.operand(node, position)? {
                        Value::List(xs) => xs,
                        found => {
                            return Err(self.fail(
                                id,
                                PrimitiveError::SortMismatch {
                                    op,
                                    position,
                                    expected: Sort::List,
                                    found,
                                },
                            ))
                        }
                    };
                    tasks.push(Task::Loop(Loop {
                        node: id,
                        body: self.child(node, 0)?,
                        rest: xs.into_iter(),
                        gather,
                        current: None,
                        depth: self.env.len(),
                    }));
                }
                Task::Loop(mut lp) => {
                    if let Some(x) = lp.current.take() {
                        let y = self.operand(self.node(lp.node)?, 0)?;
                        self.env.truncate(lp.depth);
                        match &mut lp.gather {
                            Gather::Map(out) => out.push(y),
                            Gather::Filter(out) => match y {
                                Value::Bool(true) => out.push(x),
                                Value::Bool(false) => {}
                                found => {
                                    return Err(self.fail(
                                        lp.node,
                                        PrimitiveError::SortMismatch {
                                            op: "filter",
                                            position: 0,
                                            expected: Sort::Bool,
                                            found,
                                        },
                                    ))
                                }
                            },
                            Gather::Fold(acc) => *acc = y,
                        }
                    }
                    match lp.rest.next() {
                        Some(x) => {
                            if let Gather::Fold(acc) = &lp.gather {
                                self.env.push(acc.clone());
                            }
                            self.env.push(x.clone());
                            lp.current = Some(x);
                            self.clear(lp.body)?;
                            let body = lp.body;
                            tasks.push(Task::Loop(lp));
                            tasks.push(Task::Visit(body));
                        }
                        None => {
                            let value = match lp.gather {
                                Gather::Map(out) | Gather::Filter(out) => Value::List(out),
                                Gather::Fold(acc) => acc,
                            };
                            self.store(lp.node, value);
                        }
                    }
                }
                Task::Branch(id) => {
                    let node = self.node(id)?;
                    let chosen = match self.operand(node, 0)? {
                        Value::Bool(true) => self.child(node, 1)?,
                        Value::Bool(false) => self.child(node, 2)?,
                        found => {
                            return Err(self.fail(
                                id,
                                PrimitiveError::SortMismatch {
                                    op: "if",
                                    position: 0,
                                    expected: Sort::Bool,
                                    found,
                                },
                            ))
                        }
                    };
                    tasks.push(Task::Select(id, chosen));
                    tasks.push(Task::Visit(chosen));
                }
                Task::Select(id, chosen) => {
                    let node = self.node(id)?;
                    let value = self
                        .cache
                        .get(chosen.0)
                        .cloned()
                        .flatten()
                        .ok_or_else(|| self.missing_slot(node))?;
                    self.store(id, value);
                }
            }
        }
        let output = self.node(root)?;
        self.cache
            .get(root.0)
            .cloned()
            .flatten()
            .ok_or_else(|| self.missing_slot(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::expr::Expr;
    use crate::primitive::Primitive::*;
    use crate::program::{Parameter, Program};

    fn program(expr: Expr, parameters: usize) -> Program {
        Program {
            expr,
            parameters: (0..parameters)
                .map(|index| Parameter::input(index, Sort::Any))
                .collect(),
            returns: Sort::Any,
        }
    }

    fn lit(i: i64) -> Expr {
        Expr::Literal(Value::Int(i))
    }

    fn apply(p: crate::primitive::Primitive, args: Vec<Expr>) -> Expr {
        Expr::Apply(p, args)
    }

    #[test]
    fn agrees_with_direct_evaluation() {
        let exprs = vec![
            apply(Multiply, vec![Expr::InputRef(0), lit(2)]),
            Expr::FoldOver(
                Box::new(apply(Subtract, vec![Expr::Bound(1), Expr::Bound(0)])),
                Box::new(lit(100)),
                Box::new(Expr::InputRef(1)),
            ),
            Expr::FilterOver(
                Box::new(apply(Gt, vec![Expr::Bound(0), Expr::InputRef(0)])),
                Box::new(Expr::InputRef(1)),
            ),
            Expr::MapOver(
                Box::new(Expr::Conditional(
                    Box::new(apply(Lt, vec![Expr::Bound(0), lit(3)])),
                    Box::new(apply(Negate, vec![Expr::Bound(0)])),
                    Box::new(Expr::Bound(0)),
                )),
                Box::new(Expr::InputRef(1)),
            ),
            Expr::Compose(
                Box::new(apply(Multiply, vec![Expr::Bound(0), Expr::Bound(0)])),
                Box::new(apply(Increment, vec![Expr::InputRef(0)])),
            ),
            // nested loops see the outer element
            Expr::MapOver(
                Box::new(Expr::MapOver(
                    Box::new(apply(Add, vec![Expr::Bound(0), Expr::Bound(1)])),
                    Box::new(Expr::InputRef(1)),
                )),
                Box::new(Expr::InputRef(1)),
            ),
        ];
        let args = [Value::Int(3), Value::ints(&[1, 4, 2, 5])];
        for e in exprs {
            let graph = compile(&program(e.clone(), 2));
            let direct = e.eval(&args).unwrap();
            assert_eq!(run(&graph, &args), Ok(direct), "{}", e);
        }
    }

    #[test]
    fn fold_order() {
        let e = Expr::FoldOver(
            Box::new(apply(Subtract, vec![Expr::Bound(1), Expr::Bound(0)])),
            Box::new(lit(10)),
            Box::new(Expr::InputRef(0)),
        );
        let graph = compile(&program(e, 1));
        assert_eq!(run(&graph, &[Value::ints(&[1, 2, 3])]), Ok(Value::Int(4)));
        assert_eq!(run(&graph, &[Value::ints(&[])]), Ok(Value::Int(10)));
    }

    #[test]
    fn parameter_count() {
        let graph = compile(&program(Expr::InputRef(0), 1));
        assert_eq!(
            run(&graph, &[]),
            Err(RuntimeError::ParameterCount {
                expected: 1,
                found: 0
            })
        );
    }

    #[test]
    fn arguments_must_have_the_learned_sort() {
        let mut p = program(apply(Multiply, vec![Expr::InputRef(0), Expr::InputRef(1)]), 2);
        p.parameters[0].sort = Sort::Num;
        p.parameters[1].sort = Sort::Int;
        let graph = compile(&p);
        assert_eq!(
            run(&graph, &[Value::float(1.5), Value::Int(2)]),
            Ok(Value::float(3.0))
        );
        assert_eq!(
            run(&graph, &[Value::Int(3), Value::str("2")]),
            Err(RuntimeError::ArgumentSort {
                index: 1,
                expected: Sort::Int,
                found: Value::str("2")
            })
        );
    }

    #[test]
    fn tampered_spans_are_rejected() {
        let doubled = Expr::MapOver(
            Box::new(apply(Double, vec![Expr::Bound(0)])),
            Box::new(Expr::InputRef(0)),
        );
        let graph = compile(&program(doubled, 1));
        let mut json = serde_json::to_value(&graph).unwrap();
        json["nodes"][1]["span"] = serde_json::Value::from(u64::MAX);
        let tampered: ProgramGraph = serde_json::from_value(json).unwrap();
        assert!(matches!(
            run(&tampered, &[Value::ints(&[1])]),
            Err(RuntimeError::Malformed(GraphInvariantError::Span { .. }))
        ));
    }

    #[test]
    fn errors_name_the_failing_node() {
        let e = apply(Add, vec![lit(1), apply(Head, vec![Expr::InputRef(0)])]);
        let graph = compile(&program(e, 1));
        assert_eq!(
            run(&graph, &[Value::ints(&[])]),
            Err(RuntimeError::PrimitiveApplication(PrimitiveApplicationError {
                node: NodeId(2),
                label: String::from("head"),
                source: PrimitiveError::EmptyList { op: "head" },
            }))
        );

        let e = Expr::MapOver(Box::new(Expr::Bound(0)), Box::new(Expr::InputRef(0)));
        let graph = compile(&program(e, 1));
        match run(&graph, &[Value::Int(4)]) {
            Err(RuntimeError::PrimitiveApplication(err)) => {
                assert_eq!(err.node, NodeId(0));
                assert_eq!(err.label, "map");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unbound_variable() {
        let graph = compile(&program(apply(Negate, vec![Expr::Bound(0)]), 0));
        assert!(matches!(
            run(&graph, &[]),
            Err(RuntimeError::PrimitiveApplication(PrimitiveApplicationError {
                node: NodeId(1),
                source: PrimitiveError::UnboundVariable(0),
                ..
            }))
        ));
    }
}
