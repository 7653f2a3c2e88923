//! Reconciliation of per-demonstration hypotheses into one program.
//!
//! The hypotheses are aligned node by node in preorder. They must agree everywhere except at
//! leaves: where aligned literals and input references stand for different values in their own
//! demonstrations, the position becomes a new program parameter, numbered after the inputs in the
//! order the divergences are met. This is the
//! expression-level counterpart of intersecting the program sets learned from each example: what
//! all demonstrations agree on is kept, and the rest is abstracted.

use crate::error::UnificationConflictError;
use crate::expr::Expr;
use crate::program::{Parameter, ParameterSource, Program};
use crate::synth::Hypothesis;
use crate::trace::Example;
use crate::value::{Sort, Value};
use std::mem;

/// Unifies one hypothesis per example (in example order) into a program.
pub fn unify(
    hypotheses: &[Hypothesis],
    examples: &[Example],
) -> Result<Program, UnificationConflictError> {
    let inputs = examples.first().map_or(0, |e| e.inputs.len());
    if let Some(e) = examples.iter().find(|e| e.inputs.len() != inputs) {
        return Err(UnificationConflictError::InputCount {
            left: inputs,
            right: e.inputs.len(),
        });
    }
    let mut parameters: Vec<Parameter> = (0..inputs)
        .map(|index| Parameter::input(index, Sort::of(examples.iter().map(|e| &e.inputs[index]))))
        .collect();
    let exprs: Vec<&Expr> = hypotheses.iter().map(|h| &h.expr).collect();
    if exprs.is_empty() {
        return Err(UnificationConflictError::Empty);
    }
    let expr = align(&exprs, examples, &mut parameters)?;
    log::debug!(
        target: "unify",
        "{} hypotheses unified into {} ({} generalized constants)",
        hypotheses.len(),
        expr,
        parameters.len() - inputs
    );
    Ok(Program {
        expr,
        parameters,
        returns: Sort::of(examples.iter().map(|e| &e.output)),
    })
}

fn same_head(a: &Expr, b: &Expr) -> bool {
    match (a, b) {
        (Expr::Literal(_), Expr::Literal(_)) => true,
        (Expr::InputRef(i), Expr::InputRef(j)) => i == j,
        (Expr::Bound(i), Expr::Bound(j)) => i == j,
        (Expr::Apply(p, xs), Expr::Apply(q, ys)) => p == q && xs.len() == ys.len(),
        _ => mem::discriminant(a) == mem::discriminant(b),
    }
}

fn is_value_leaf(e: &Expr) -> bool {
    matches!(e, Expr::Literal(_) | Expr::InputRef(_))
}

fn conflict(left: &Expr, right: &Expr) -> UnificationConflictError {
    log::debug!(target: "unify", "conflict: {} vs {}", left, right);
    UnificationConflictError::Shape {
        left: left.clone(),
        right: right.clone(),
    }
}

// Aligns sub-expressions at the same position in every hypothesis. `nodes[k]` belongs to the
// hypothesis of `examples[k]`.
fn align(
    nodes: &[&Expr],
    examples: &[Example],
    parameters: &mut Vec<Parameter>,
) -> Result<Expr, UnificationConflictError> {
    let first = nodes[0];
    if nodes.iter().all(|e| is_value_leaf(e)) && !nodes.iter().all(|e| same_head(first, e)) {
        return generalize(nodes, examples, parameters);
    }
    if let Some(other) = nodes[1..].iter().find(|e| !same_head(first, e)) {
        return Err(conflict(first, other));
    }
    if let Expr::Literal(_) = first {
        return generalize(nodes, examples, parameters);
    }
    let children: Vec<_> = nodes.iter().map(|e| e.children()).collect();
    let width = children[0].len();
    let mut aligned = Vec::with_capacity(width);
    for i in 0..width {
        let column: Vec<&Expr> = children.iter().map(|c| c[i]).collect();
        aligned.push(align(&column, examples, parameters)?);
    }
    Ok(first.with_children(aligned))
}

// Reconciles a column of literals and input references by the value each leaf has in its own
// demonstration. A literal every demonstration agrees with stays; anything else becomes a
// parameter.
fn generalize(
    nodes: &[&Expr],
    examples: &[Example],
    parameters: &mut Vec<Parameter>,
) -> Result<Expr, UnificationConflictError> {
    let mut values = Vec::with_capacity(nodes.len());
    for (k, e) in nodes.iter().enumerate() {
        let v = match e {
            Expr::Literal(v) => Some(v),
            Expr::InputRef(i) => examples.get(k).and_then(|ex| ex.inputs.get(*i)),
            _ => None,
        };
        match v {
            Some(v) => values.push(v.clone()),
            None => return Err(conflict(nodes[0], e)),
        }
    }
    let literal = nodes.iter().find_map(|e| match e {
        Expr::Literal(v) => Some(v),
        _ => None,
    });
    if let Some(v) = literal {
        if values.iter().all(|x| x == v) {
            return Ok(Expr::Literal(v.clone()));
        }
    }
    Ok(Expr::InputRef(parameter_for(values, parameters)))
}

// Reuses the parameter of an earlier divergence with the same values, or declares a new one.
fn parameter_for(values: Vec<Value>, parameters: &mut Vec<Parameter>) -> usize {
    let existing = parameters.iter().find(|p| match &p.source {
        ParameterSource::Generalized { values: v } => v == &values,
        ParameterSource::Input => false,
    });
    if let Some(p) = existing {
        return p.index;
    }
    let index = parameters.len();
    log::trace!(target: "unify", "in{} generalizes {:?}", index, values);
    parameters.push(Parameter::generalized(index, values));
    index
}
