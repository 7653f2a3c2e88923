//! Errors reported by the engine.
//!
//! Every failure is returned to the caller as a value carrying enough context (the offending
//! step, node or sub-expression) to explain it to the user. Nothing here is recovered from inside
//! the engine.

use crate::compile::NodeId;
use crate::expr::Expr;
use crate::value::{Sort, Value};
use thiserror::Error;

/// A domain or sort error raised while applying a primitive or a combinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    /// An argument does not satisfy the primitive's sort constraint.
    #[error("`{op}` expects {expected} as argument {position}, found {found}")]
    SortMismatch {
        /// Operation name.
        op: &'static str,
        /// Zero-based argument position.
        position: usize,
        /// Required sort.
        expected: Sort,
        /// Offending value.
        found: Value,
    },
    /// The wrong number of arguments was supplied.
    #[error("`{op}` takes {expected} arguments, {found} given")]
    Arity {
        /// Operation name.
        op: &'static str,
        /// Declared arity.
        expected: usize,
        /// Supplied argument count.
        found: usize,
    },
    /// Division, floor division or modulo by zero.
    #[error("division by zero in `{op}`")]
    DivisionByZero {
        /// Operation name.
        op: &'static str,
    },
    /// An operation that needs at least one element got an empty list.
    #[error("`{op}` of an empty list")]
    EmptyList {
        /// Operation name.
        op: &'static str,
    },
    /// Integer arithmetic left the range of `i64`.
    #[error("integer overflow in `{op}`")]
    Overflow {
        /// Operation name.
        op: &'static str,
    },
    /// A reference to a variable no enclosing combinator binds.
    #[error("reference to unbound variable #{0}")]
    UnboundVariable(usize),
    /// A reference to an input the caller did not supply.
    #[error("reference to missing input in{0}")]
    MissingInput(usize),
}

/// The recorder produced a trace the engine cannot interpret.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedTraceError {
    /// The operation is not part of the primitive library.
    #[error("step {step}: unknown operation `{name}`")]
    UnknownOperation {
        /// Index of the offending step.
        step: usize,
        /// Recorded operation name.
        name: String,
    },
    /// The recorded argument count does not match the primitive's arity.
    #[error("step {step}: `{op}` takes {expected} arguments, {found} recorded")]
    ArityMismatch {
        /// Index of the offending step.
        step: usize,
        /// Operation name.
        op: &'static str,
        /// Declared arity.
        expected: usize,
        /// Recorded argument count.
        found: usize,
    },
    /// The primitive cannot be applied to the recorded arguments.
    #[error("step {step}: {source}")]
    Inapplicable {
        /// Index of the offending step.
        step: usize,
        /// Why the application failed.
        source: PrimitiveError,
    },
    /// The recorded result is not what the primitive computes.
    #[error("step {step}: `{op}` yields {computed}, but {recorded} was recorded")]
    ResultMismatch {
        /// Index of the offending step.
        step: usize,
        /// Operation name.
        op: &'static str,
        /// Result stored in the trace.
        recorded: Value,
        /// Result of applying the primitive.
        computed: Value,
    },
    /// There is no step to take the output from.
    #[error("demonstration has no steps and no explicit output")]
    Empty,
}

/// A best-effort guess that yields the demonstrated output but was not verified against the
/// demonstrated steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unverified {
    /// The guessed expression.
    pub expr: Expr,
}

/// The search exhausted its size bound without explaining the demonstration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("demonstration {example} not understood within {size_bound} nodes")]
pub struct NoHypothesisFoundError {
    /// Index of the example that could not be explained.
    pub example: usize,
    /// The node-count bound that was exhausted.
    pub size_bound: usize,
    /// The smallest expression producing the right output, if any was seen.
    pub closest: Option<Unverified>,
}

/// Two demonstrations cannot be reconciled into one program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnificationConflictError {
    /// The hypotheses differ in shape at the given pair of sub-expressions.
    #[error("cannot reconcile `{left}` with `{right}`")]
    Shape {
        /// Sub-expression of the first hypothesis.
        left: Expr,
        /// Aligned sub-expression of the other hypothesis.
        right: Expr,
    },
    /// The demonstrations were started with different numbers of inputs.
    #[error("demonstrations take {left} and {right} inputs")]
    InputCount {
        /// Inputs of the first demonstration.
        left: usize,
        /// Inputs of the other demonstration.
        right: usize,
    },
    /// There was nothing to unify.
    #[error("no hypotheses to unify")]
    Empty,
}

/// The caller aborted a running synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("synthesis cancelled before enumerating size {size}")]
pub struct CancelledError {
    /// The enumeration size that was about to start.
    pub size: usize,
}

/// A primitive or combinator failed while a program graph was running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("node {node} (`{label}`): {source}")]
pub struct PrimitiveApplicationError {
    /// The node whose evaluation failed.
    pub node: NodeId,
    /// The node's label.
    pub label: String,
    /// The underlying failure.
    pub source: PrimitiveError,
}

/// A program graph breaks one of its structural invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphInvariantError {
    /// A node's id is not its position in the node list.
    #[error("node at position {position} is numbered {found}")]
    Misnumbered {
        /// Position in the node list.
        position: usize,
        /// The id the node carries.
        found: NodeId,
    },
    /// A node's subtree span is empty or runs past the end of the graph.
    #[error("node {node} spans {span} nodes, only {remaining} remain")]
    Span {
        /// The offending node.
        node: NodeId,
        /// The recorded span.
        span: usize,
        /// Nodes from this one to the end of the graph.
        remaining: usize,
    },
    /// Following edges from some node leads back to it.
    #[error("graph contains a cycle")]
    Cycle,
    /// A node does not have exactly as many inputs as its kind takes.
    #[error("node {node} has {found} inputs, its kind takes {expected}")]
    Slots {
        /// The offending node.
        node: NodeId,
        /// Inputs the node kind takes.
        expected: usize,
        /// Inputs present.
        found: usize,
    },
    /// An edge refers to a node that does not exist.
    #[error("edge into node {to} refers to missing node {from}")]
    MissingNode {
        /// The referenced node.
        from: NodeId,
        /// The node the edge feeds.
        to: NodeId,
    },
    /// A node reads a parameter the graph does not declare.
    #[error("node {node} reads parameter {parameter} of {declared}")]
    UnknownParameter {
        /// The offending node.
        node: NodeId,
        /// The parameter index read.
        parameter: usize,
        /// Number of declared parameters.
        declared: usize,
    },
    /// A node has no path to the output node.
    #[error("node {0} does not lead to the output")]
    Detached(NodeId),
}

/// Failure while running a program graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// A node could not be evaluated.
    #[error(transparent)]
    PrimitiveApplication(#[from] PrimitiveApplicationError),
    /// The graph breaks a structural invariant.
    #[error(transparent)]
    Malformed(#[from] GraphInvariantError),
    /// An argument is not of the sort its parameter was learned with.
    #[error("parameter {index} takes {expected}, {found} given")]
    ArgumentSort {
        /// The parameter index.
        index: usize,
        /// The parameter's declared sort.
        expected: Sort,
        /// The offending argument.
        found: Value,
    },
    /// The caller supplied the wrong number of parameter values.
    #[error("program takes {expected} parameters, {found} given")]
    ParameterCount {
        /// Declared parameter count.
        expected: usize,
        /// Supplied parameter count.
        found: usize,
    },
}

/// Failure of a synthesis request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    /// No example was supplied.
    #[error("no demonstrations to learn from")]
    NoExamples,
    /// A demonstration could not be explained.
    #[error(transparent)]
    NoHypothesisFound(#[from] NoHypothesisFoundError),
    /// Demonstrations disagree on the shape of the program.
    #[error(transparent)]
    UnificationConflict(#[from] UnificationConflictError),
    /// The caller cancelled the search.
    #[error(transparent)]
    Cancelled(#[from] CancelledError),
    /// The generalized program does not replay a demonstration.
    #[error("program does not replay demonstration {example}: {reason}")]
    Verification {
        /// Index of the example that failed to replay.
        example: usize,
        /// What went wrong.
        reason: String,
    },
}
