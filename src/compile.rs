//! Compilation of programs into data-flow graphs.
//!
//! Every expression node becomes one graph node; node ids are preorder positions, so the output
//! node is always node 0 and the nodes of any subtree occupy a contiguous id range. Equal
//! subtrees are not merged. Data flows along edges from a node (or a graph parameter) into an
//! input slot of its parent.

use crate::error::GraphInvariantError;
use crate::expr::Expr;
use crate::graph;
use crate::primitive::{Combinator, Primitive};
use crate::program::Program;
use crate::value::{Sort, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a node within its graph.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a node computes.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum NodeKind {
    /// A constant.
    Literal(Value),
    /// Forwards graph parameter `i`.
    Input(usize),
    /// Reads a value bound by an enclosing combinator node.
    Bound(usize),
    /// Applies a primitive to its inputs.
    Apply(Primitive),
    /// A combinator; its inputs are its operands in [`Expr`] order.
    Combinator(Combinator),
}

impl NodeKind {
    /// Name of the kind of operation the node performs.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Literal(_) => "literal",
            NodeKind::Input(_) => "input",
            NodeKind::Bound(_) => "bound",
            NodeKind::Apply(p) => p.name(),
            NodeKind::Combinator(c) => c.name(),
        }
    }

    /// Number of input slots.
    pub fn arity(&self) -> usize {
        match self {
            NodeKind::Literal(_) | NodeKind::Bound(_) => 0,
            NodeKind::Input(_) => 1,
            NodeKind::Apply(p) => p.arity(),
            NodeKind::Combinator(c) => c.arity(),
        }
    }
}

/// Where a slot gets its value.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum Source {
    /// A graph parameter.
    Param(usize),
    /// Another node.
    Node(NodeId),
}

/// A graph node.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Node {
    /// The node's id.
    pub id: NodeId,
    /// What it computes.
    pub kind: NodeKind,
    /// One source per input slot.
    pub inputs: Vec<Source>,
    /// Number of nodes in the subtree rooted here, this one included.
    pub span: usize,
}

/// A directed edge into an input slot.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Producer.
    pub from: Source,
    /// Consumer.
    pub to: NodeId,
    /// Input slot of the consumer.
    pub slot: usize,
}

/// An executable data-flow graph.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ProgramGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    output: NodeId,
    parameters: Vec<Sort>,
    returns: Sort,
}

/// Compiles a program into a graph.
///
/// ```
/// use exemplar::compile::{compile, NodeId};
/// use exemplar::expr::Expr;
/// use exemplar::primitive::Primitive;
/// use exemplar::program::{Parameter, Program};
/// use exemplar::value::{Sort, Value};
///
/// let program = Program {
///     expr: Expr::Apply(Primitive::Multiply, vec![Expr::InputRef(0), Expr::Literal(Value::Int(2))]),
///     parameters: vec![Parameter::input(0, Sort::Int)],
///     returns: Sort::Int,
/// };
/// let graph = compile(&program);
/// assert_eq!(graph.nodes().len(), 3);
/// assert_eq!(graph.output(), NodeId(0));
/// assert_eq!(graph.label(NodeId(0)).as_deref(), Some("multiply"));
/// assert!(graph.validate().is_ok());
/// ```
pub fn compile(program: &Program) -> ProgramGraph {
    let mut nodes: Vec<Node> = Vec::with_capacity(program.expr.size());
    let mut edges = Vec::new();
    let mut pending: Vec<(&Expr, Option<(NodeId, usize)>)> = vec![(&program.expr, None)];
    while let Some((e, parent)) = pending.pop() {
        let id = NodeId(nodes.len());
        let kind = match e {
            Expr::Literal(v) => NodeKind::Literal(v.clone()),
            Expr::InputRef(i) => NodeKind::Input(*i),
            Expr::Bound(k) => NodeKind::Bound(*k),
            Expr::Apply(p, _) => NodeKind::Apply(*p),
            Expr::Compose(..) => NodeKind::Combinator(Combinator::Compose),
            Expr::MapOver(..) => NodeKind::Combinator(Combinator::Map),
            Expr::FilterOver(..) => NodeKind::Combinator(Combinator::Filter),
            Expr::FoldOver(..) => NodeKind::Combinator(Combinator::Fold),
            Expr::Conditional(..) => NodeKind::Combinator(Combinator::Conditional),
        };
        let mut inputs = Vec::with_capacity(kind.arity());
        if let Expr::InputRef(i) = e {
            inputs.push(Source::Param(*i));
            edges.push(Edge {
                from: Source::Param(*i),
                to: id,
                slot: 0,
            });
        }
        if let Some((to, slot)) = parent {
            nodes[to.0].inputs.push(Source::Node(id));
            edges.push(Edge {
                from: Source::Node(id),
                to,
                slot,
            });
        }
        nodes.push(Node {
            id,
            kind,
            inputs,
            span: e.size(),
        });
        let children = e.children();
        for (slot, child) in children.iter().enumerate().rev() {
            pending.push((*child, Some((id, slot))));
        }
    }
    log::debug!(target: "exec", "compiled {} into {} nodes", program.expr, nodes.len());
    ProgramGraph {
        nodes,
        edges,
        output: NodeId(0),
        parameters: program.parameters.iter().map(|p| p.sort).collect(),
        returns: program.returns,
    }
}

impl ProgramGraph {
    /// All nodes, ordered by id.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The node with the given id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// All edges.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// The node whose value is the program's result.
    pub fn output(&self) -> NodeId {
        self.output
    }

    /// Number of parameters the graph reads.
    pub fn parameters(&self) -> usize {
        self.parameters.len()
    }

    /// The sort each parameter must have, by index.
    pub fn parameter_sorts(&self) -> &[Sort] {
        &self.parameters
    }

    /// The sort of the value the demonstrations produced.
    pub fn returns(&self) -> Sort {
        self.returns
    }

    /// Human-readable label of a node: the primitive or combinator name, the constant, or the
    /// parameter it forwards.
    pub fn label(&self, id: NodeId) -> Option<String> {
        let node = self.node(id)?;
        Some(match &node.kind {
            NodeKind::Literal(v) => v.to_string(),
            NodeKind::Input(i) => format!("in{}", i),
            NodeKind::Bound(k) => format!("#{}", k),
            NodeKind::Apply(p) => String::from(p.name()),
            NodeKind::Combinator(c) => String::from(c.name()),
        })
    }

    /// Edges into a node, ordered by slot.
    pub fn input_edges(&self, id: NodeId) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self.edges.iter().filter(|e| e.to == id).collect();
        edges.sort_by_key(|e| e.slot);
        edges
    }

    fn adjacency(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.edges.iter().filter_map(|e| match e.from {
            Source::Node(from) => Some((from, e.to)),
            Source::Param(_) => None,
        })
    }

    /// Node ids ordered so that every node comes after the nodes feeding it, or `None` if the
    /// graph has a cycle.
    pub fn topological_order(&self) -> Option<Vec<NodeId>> {
        let ids: Vec<NodeId> = self.nodes.iter().map(|n| n.id).collect();
        graph::topological_sort(&ids, &graph::adjacency_map(self.adjacency()))
    }

    /// Checks the structural invariants: nodes numbered by position with subtree spans that fit
    /// the graph, every slot filled by an existing producer, no cycles, and every node on a path
    /// to the output.
    pub fn validate(&self) -> Result<(), GraphInvariantError> {
        for (position, node) in self.nodes.iter().enumerate() {
            if node.id.0 != position {
                return Err(GraphInvariantError::Misnumbered {
                    position,
                    found: node.id,
                });
            }
            let remaining = self.nodes.len() - position;
            if node.span == 0 || node.span > remaining {
                return Err(GraphInvariantError::Span {
                    node: node.id,
                    span: node.span,
                    remaining,
                });
            }
            if node.inputs.len() != node.kind.arity() {
                return Err(GraphInvariantError::Slots {
                    node: node.id,
                    expected: node.kind.arity(),
                    found: node.inputs.len(),
                });
            }
            for source in &node.inputs {
                match *source {
                    Source::Node(from) if self.node(from).is_none() => {
                        return Err(GraphInvariantError::MissingNode { from, to: node.id });
                    }
                    Source::Param(p) if p >= self.parameters.len() => {
                        return Err(GraphInvariantError::UnknownParameter {
                            node: node.id,
                            parameter: p,
                            declared: self.parameters.len(),
                        });
                    }
                    _ => {}
                }
            }
        }
        if self.topological_order().is_none() {
            return Err(GraphInvariantError::Cycle);
        }
        let live = graph::ancestors(self.output, &graph::adjacency_map(self.adjacency()));
        match self.nodes.iter().find(|n| !live.contains(&n.id)) {
            Some(n) => Err(GraphInvariantError::Detached(n.id)),
            None => Ok(()),
        }
    }
}
