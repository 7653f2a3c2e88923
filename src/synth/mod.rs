//! Inference of programs from demonstrations.
//!
//! Each demonstration is explained on its own by a bottom-up enumerative search over expressions
//! of increasing size (see [`synthesize_example`]). The per-demonstration hypotheses are then
//! reconciled into a single [`Program`] by the [unifier](crate::unify), compiled, and replayed on
//! every demonstration before being returned.

mod pattern;
mod search;

use crate::compile::compile;
use crate::error::{CancelledError, NoHypothesisFoundError, SynthesisError, Unverified};
use crate::exec;
use crate::expr::Expr;
use crate::program::Program;
use crate::trace::Example;
use crate::unify::unify;
use crate::value::Value;
use rayon::prelude::*;
use search::{Anchor, Context, Problem, Search};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tuning knobs for a synthesis request.
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Largest expression (in nodes) the search enumerates.
    pub size_bound: usize,
    /// Largest loop body (in nodes) the nested body search enumerates.
    pub body_size_bound: usize,
    /// Whether to look for repeated operation sequences and propose loops for them.
    pub detect_loops: bool,
    /// Whether to search the demonstrations concurrently on the rayon thread pool.
    pub parallel: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            size_bound: 8,
            body_size_bound: 5,
            detect_loops: true,
            parallel: false,
        }
    }
}

/// Lets a caller abort a running synthesis, either explicitly or after a deadline.
///
/// Clones share the same flag, so a token can be handed to another thread and cancelled from
/// there. The search polls the token every time it moves on to a larger expression size.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    /// A token that is only cancelled explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::default(),
            deadline: Some(deadline),
        }
    }

    /// A token that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Returns whether cancellation was requested or the deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
            || self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    pub(crate) fn check(&self, size: usize) -> Result<(), CancelledError> {
        if self.is_cancelled() {
            log::debug!(target: "synth", "cancelled before size {}", size);
            Err(CancelledError { size })
        } else {
            Ok(())
        }
    }
}

/// An expression explaining one or more demonstrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hypothesis {
    /// The expression.
    pub expr: Expr,
    /// Indices of the demonstrations it reproduces.
    pub verified_against: Vec<usize>,
}

/// Finds the smallest expression that reproduces the demonstration's output and every one of its
/// steps.
///
/// ```
/// use exemplar::synth::{synthesize_example, CancellationToken, SynthesisConfig};
/// use exemplar::trace::Demonstration;
/// use exemplar::value::Value;
///
/// let mut demo = Demonstration::new(vec![Value::ints(&[1, 2, 3])]);
/// demo.apply("double", vec![Value::Int(1)], Value::Int(2))
///     .apply("double", vec![Value::Int(2)], Value::Int(4))
///     .apply("double", vec![Value::Int(3)], Value::Int(6));
/// let example = demo.returns(Value::ints(&[2, 4, 6])).unwrap();
///
/// let config = SynthesisConfig::default();
/// let h = synthesize_example(&example, &config, &CancellationToken::new()).unwrap();
/// assert_eq!(h.expr.to_string(), "map(double(#0), in0)");
/// ```
pub fn synthesize_example(
    example: &Example,
    config: &SynthesisConfig,
    token: &CancellationToken,
) -> Result<Hypothesis, SynthesisError> {
    explain(0, example, config, token)
}

fn explain(
    index: usize,
    example: &Example,
    config: &SynthesisConfig,
    token: &CancellationToken,
) -> Result<Hypothesis, SynthesisError> {
    token.check(0)?;
    let templates = if config.detect_loops {
        pattern::detect(example, config, token)?
    } else {
        Vec::new()
    };
    let mut leaves: Vec<Expr> = (0..example.inputs.len()).map(Expr::InputRef).collect();
    leaves.extend(example.literals().into_iter().cloned().map(Expr::Literal));
    let problem = Problem {
        contexts: vec![Context {
            inputs: &example.inputs,
            env: Vec::new(),
        }],
        targets: vec![example.output.clone()],
        anchors: example
            .steps
            .iter()
            .map(|s| Anchor {
                context: 0,
                op: s.op,
                value: s.result.clone(),
            })
            .collect(),
        leaves,
        templates,
        combinators: false,
        size_bound: config.size_bound,
    };
    let outcome = Search::new(&problem).run(token)?;
    let expr = match outcome.found {
        Some(expr) => expr,
        None => {
            return Err(NoHypothesisFoundError {
                example: index,
                size_bound: config.size_bound,
                closest: outcome.closest.map(|expr| Unverified { expr }),
            }
            .into())
        }
    };
    log::debug!(target: "synth", "demonstration {}: {}", index, expr);
    if let Err(reason) = replays(&expr, example) {
        return Err(SynthesisError::Verification {
            example: index,
            reason,
        });
    }
    // replay needs the recorded `map`/`filter`/`fold` applications, so lower afterwards
    let expr = expr.inline_functions();
    Ok(Hypothesis {
        expr,
        verified_against: vec![index],
    })
}

// Re-evaluates an expression on a demonstration, checking the output and that every step is
// performed along the way.
fn replays(expr: &Expr, example: &Example) -> Result<(), String> {
    let (value, applications) = expr.eval_traced(&example.inputs).map_err(|e| e.to_string())?;
    if value != example.output {
        return Err(format!("produced {}, expected {}", value, example.output));
    }
    for (i, step) in example.steps.iter().enumerate() {
        if !applications
            .iter()
            .any(|a| a.op == step.op && a.result == step.result)
        {
            return Err(format!("step {} (`{}` = {}) is never performed", i, step.op, step.result));
        }
    }
    Ok(())
}

/// Infers one program consistent with every demonstration.
///
/// The returned program has been compiled and replayed on each demonstration.
pub fn synthesize(
    examples: &[Example],
    config: &SynthesisConfig,
    token: &CancellationToken,
) -> Result<Program, SynthesisError> {
    if examples.is_empty() {
        return Err(SynthesisError::NoExamples);
    }
    let results: Vec<Result<Hypothesis, SynthesisError>> = if config.parallel {
        examples
            .par_iter()
            .enumerate()
            .map(|(i, ex)| explain(i, ex, config, token))
            .collect()
    } else {
        examples
            .iter()
            .enumerate()
            .map(|(i, ex)| explain(i, ex, config, token))
            .collect()
    };
    let hypotheses = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    let program = unify(&hypotheses, examples)?;
    let graph = compile(&program);
    for (i, ex) in examples.iter().enumerate() {
        let args = program.arguments_for(i, &ex.inputs);
        let value: Value = exec::run(&graph, &args).map_err(|e| SynthesisError::Verification {
            example: i,
            reason: e.to_string(),
        })?;
        if value != ex.output {
            return Err(SynthesisError::Verification {
                example: i,
                reason: format!("produced {}, expected {}", value, ex.output),
            });
        }
    }
    log::debug!(
        target: "synth",
        "program {} with {} parameters replays {} demonstrations",
        program.expr,
        program.parameters.len(),
        examples.len()
    );
    Ok(program)
}
