//! Detection of loops in a demonstration.
//!
//! A user who maps, filters or folds over a list performs the same sequence of operations once
//! per element. Such runs are found by scanning the trace for periodic repetitions of operations
//! whose arguments walk through a list that occurs in the demonstration. For every run, the loop
//! body is synthesized by a nested search that explains all iterations at once, and the resulting
//! [`Template`] is handed to the top-level search, which only has to find the list (and the
//! initial accumulator) to complete the loop.

use super::search::{Anchor, Context, Coverage, Problem, Search};
use super::{CancellationToken, SynthesisConfig};
use crate::error::CancelledError;
use crate::expr::Expr;
use crate::trace::{Example, TraceStep};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LoopKind {
    Map,
    Filter,
    Fold { init: Value },
}

/// A loop whose body is known, waiting for its operands.
#[derive(Debug, Clone)]
pub(crate) struct Template {
    pub kind: LoopKind,
    pub body: Expr,
    pub body_size: usize,
    /// The list the loop walks through.
    pub collection: Value,
    /// The loop's result.
    pub value: Value,
    /// The demonstration steps performed by the loop.
    pub cover: Coverage,
}

/// A periodic stretch of the trace: `count` iterations of `period` steps each, starting at
/// `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Run {
    start: usize,
    period: usize,
    count: usize,
    list: Value,
    // (offset within an iteration, argument position)
    element: (usize, usize),
    accumulator: Option<(usize, usize)>,
}

impl Run {
    fn step<'e>(&self, example: &'e Example, k: usize, offset: usize) -> &'e TraceStep {
        &example.steps[self.start + k * self.period + offset]
    }

    fn result<'e>(&self, example: &'e Example, k: usize) -> &'e Value {
        &self.step(example, k, self.period - 1).result
    }

    fn steps(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.count * self.period
    }
}

fn arg<'e>(example: &'e Example, step: &'e TraceStep, position: usize) -> Option<&'e Value> {
    step.args.get(position).and_then(|a| example.resolve(a))
}

// Every distinct list value in the demonstration, in order of appearance.
fn lists(example: &Example) -> Vec<&Value> {
    let mut out: Vec<&Value> = Vec::new();
    let candidates = example.inputs.iter().chain(example.steps.iter().flat_map(|s| {
        s.args
            .iter()
            .filter_map(move |a| example.resolve(a))
            .chain(std::iter::once(&s.result))
    }));
    for v in candidates {
        if let Value::List(xs) = v {
            if xs.len() >= 2 && !out.contains(&v) {
                out.push(v);
            }
        }
    }
    out
}

fn find_runs(example: &Example) -> Vec<Run> {
    let steps = &example.steps;
    let mut runs = Vec::new();
    for list in lists(example) {
        let xs = match list.as_list() {
            Some(xs) => xs,
            None => continue,
        };
        let count = xs.len();
        for start in 0..steps.len() {
            for period in 1.. {
                if start + count * period > steps.len() {
                    break;
                }
                let mut run = Run {
                    start,
                    period,
                    count,
                    list: list.clone(),
                    element: (0, 0),
                    accumulator: None,
                };
                let repeats = (1..count).all(|k| {
                    (0..period).all(|o| {
                        let (a, b) = (run.step(example, 0, o), run.step(example, k, o));
                        a.op == b.op && a.args.len() == b.args.len()
                    })
                });
                if !repeats {
                    continue;
                }
                let slots: Vec<(usize, usize)> = (0..period)
                    .flat_map(|o| (0..run.step(example, 0, o).args.len()).map(move |j| (o, j)))
                    .collect();
                let element = slots.iter().copied().find(|&(o, j)| {
                    (0..count).all(|k| arg(example, run.step(example, k, o), j) == Some(&xs[k]))
                });
                run.element = match element {
                    Some(slot) => slot,
                    None => continue,
                };
                run.accumulator = slots.iter().copied().find(|&(o, j)| {
                    (o, j) != run.element
                        && (1..count).all(|k| {
                            arg(example, run.step(example, k, o), j)
                                == Some(run.result(example, k - 1))
                        })
                });
                log::trace!(
                    target: "synth",
                    "run over {} at step {}: {} x {} steps",
                    list,
                    start,
                    count,
                    period
                );
                runs.push(run);
            }
        }
    }
    runs
}

/// Finds the loops a demonstration performs and synthesizes their bodies.
pub(crate) fn detect(
    example: &Example,
    config: &SynthesisConfig,
    token: &CancellationToken,
) -> Result<Vec<Template>, CancelledError> {
    let mut templates = Vec::new();
    for run in find_runs(example) {
        let bound = config
            .size_bound
            .saturating_sub(2)
            .min(config.body_size_bound);
        let body = match body_for(example, &run, bound, token)? {
            Some(body) => body,
            None => continue,
        };
        let results: Vec<Value> = (0..run.count)
            .map(|k| run.result(example, k).clone())
            .collect();
        let mut cover = Coverage::empty(example.steps.len());
        run.steps().for_each(|i| cover.insert(i));
        let template = |kind: LoopKind, value: Value| Template {
            kind,
            body: body.clone(),
            body_size: body.size(),
            collection: run.list.clone(),
            value,
            cover: cover.clone(),
        };
        match run.accumulator {
            Some((o, j)) => {
                let init = match arg(example, run.step(example, 0, o), j) {
                    Some(v) => v.clone(),
                    None => continue,
                };
                let last = results.last().cloned().unwrap_or_else(|| init.clone());
                templates.push(template(LoopKind::Fold { init }, last));
            }
            None => {
                if results.iter().all(|r| r.as_bool().is_some()) {
                    let xs = run.list.as_list().unwrap_or_default();
                    let kept = xs
                        .iter()
                        .zip(&results)
                        .filter(|(_, r)| r.as_bool() == Some(true))
                        .map(|(x, _)| x.clone())
                        .collect();
                    templates.push(template(LoopKind::Map, Value::List(results.clone())));
                    templates.push(template(LoopKind::Filter, Value::List(kept)));
                } else {
                    templates.push(template(LoopKind::Map, Value::List(results)));
                }
            }
        }
        log::debug!(target: "synth", "loop body {} for steps {:?}", body, run.steps());
    }
    Ok(templates)
}

// Searches for one expression reproducing every iteration of a run, with the element (and the
// accumulator) bound.
fn body_for(
    example: &Example,
    run: &Run,
    size_bound: usize,
    token: &CancellationToken,
) -> Result<Option<Expr>, CancelledError> {
    let xs = run.list.as_list().unwrap_or_default();
    let fold_init = run
        .accumulator
        .and_then(|(o, j)| arg(example, run.step(example, 0, o), j));
    let contexts = (0..run.count)
        .map(|k| {
            let mut env = Vec::with_capacity(2);
            if let Some(init) = fold_init {
                let acc = if k == 0 {
                    init.clone()
                } else {
                    run.result(example, k - 1).clone()
                };
                env.push(acc);
            }
            env.push(xs[k].clone());
            Context {
                inputs: &example.inputs,
                env,
            }
        })
        .collect();
    let anchors = (0..run.count)
        .flat_map(|k| {
            (0..run.period).map(move |o| {
                let s = run.step(example, k, o);
                Anchor {
                    context: k,
                    op: s.op,
                    value: s.result.clone(),
                }
            })
        })
        .collect();

    let mut leaves = vec![Expr::Bound(0)];
    if fold_init.is_some() {
        leaves.push(Expr::Bound(1));
    }
    leaves.extend((0..example.inputs.len()).map(Expr::InputRef));
    for o in 0..run.period {
        for j in 0..run.step(example, 0, o).args.len() {
            if Some((o, j)) == run.accumulator || (o, j) == run.element {
                continue;
            }
            let first = arg(example, run.step(example, 0, o), j);
            let constant =
                (1..run.count).all(|k| arg(example, run.step(example, k, o), j) == first);
            if let (true, Some(v)) = (constant, first) {
                let leaf = Expr::Literal(v.clone());
                if !leaves.contains(&leaf) {
                    leaves.push(leaf);
                }
            }
        }
    }

    let problem = Problem {
        contexts,
        targets: (0..run.count)
            .map(|k| run.result(example, k).clone())
            .collect(),
        anchors,
        leaves,
        templates: Vec::new(),
        combinators: true,
        size_bound,
    };
    Ok(Search::new(&problem).run(token)?.found)
}
