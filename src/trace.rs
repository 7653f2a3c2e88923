//! Demonstrations: what the user did, step by step.
//!
//! The recorder hands over raw steps that only hold concrete values. Normalization resolves each
//! operation name against the [`Library`] and replaces argument values by references to where
//! they came from: an earlier step's result, a demonstration input, or nowhere (a literal the
//! user typed in).

use crate::error::MalformedTraceError;
use crate::primitive::{Library, Primitive};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// One operation application as captured by the recorder.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct RawStep {
    /// Name of the applied operation.
    pub op: String,
    /// Concrete argument values.
    pub args: Vec<Value>,
    /// Concrete result.
    pub result: Value,
}

impl RawStep {
    /// Creates a raw step.
    pub fn new(op: &str, args: Vec<Value>, result: Value) -> Self {
        Self {
            op: String::from(op),
            args,
            result,
        }
    }
}

/// Where a step argument came from.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
pub enum Arg {
    /// A constant.
    Literal(Value),
    /// A demonstration input.
    Input(usize),
    /// The result of an earlier step.
    Step(usize),
}

/// A normalized step.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    /// The applied primitive.
    pub op: Primitive,
    /// Argument sources, in order.
    pub args: Vec<Arg>,
    /// The step's result.
    pub result: Value,
}

/// A normalized demonstration.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Example {
    /// Values the demonstration started from.
    pub inputs: Vec<Value>,
    /// Steps in the order they were performed.
    pub steps: Vec<TraceStep>,
    /// The value the user designated as the result.
    pub output: Value,
}

impl Example {
    /// The concrete value of a step argument.
    pub fn resolve<'a>(&'a self, arg: &'a Arg) -> Option<&'a Value> {
        match arg {
            Arg::Literal(v) => Some(v),
            Arg::Input(i) => self.inputs.get(*i),
            Arg::Step(j) => self.steps.get(*j).map(|s| &s.result),
        }
    }

    /// Literal step arguments, deduplicated, in order of first appearance.
    pub fn literals(&self) -> Vec<&Value> {
        let mut seen: Vec<&Value> = Vec::new();
        for step in &self.steps {
            for arg in &step.args {
                if let Arg::Literal(v) = arg {
                    if !seen.contains(&v) {
                        seen.push(v);
                    }
                }
            }
        }
        seen
    }
}

/// Records a demonstration one step at a time.
///
/// ```
/// use exemplar::primitive::Primitive;
/// use exemplar::trace::{Arg, Demonstration};
/// use exemplar::value::Value;
///
/// let mut demo = Demonstration::new(vec![Value::Int(5)]);
/// demo.apply("multiply", vec![Value::Int(5), Value::Int(2)], Value::Int(10));
/// let example = demo.returns(Value::Int(10)).unwrap();
/// assert_eq!(example.steps[0].op, Primitive::Multiply);
/// assert_eq!(example.steps[0].args, vec![Arg::Input(0), Arg::Literal(Value::Int(2))]);
/// ```
#[derive(Debug, Clone)]
pub struct Demonstration {
    inputs: Vec<Value>,
    steps: Vec<RawStep>,
}

impl Demonstration {
    /// Starts a demonstration on the given inputs.
    pub fn new(inputs: Vec<Value>) -> Self {
        Self {
            inputs,
            steps: Vec::new(),
        }
    }

    /// Records one operation application.
    pub fn apply(&mut self, op: &str, args: Vec<Value>, result: Value) -> &mut Self {
        self.steps.push(RawStep::new(op, args, result));
        self
    }

    /// Finishes the demonstration with an explicit output.
    pub fn returns(self, output: Value) -> Result<Example, MalformedTraceError> {
        normalize(self.inputs, &self.steps, output)
    }

    /// Finishes the demonstration with the last step's result as the output.
    pub fn finish(self) -> Result<Example, MalformedTraceError> {
        submit_demonstration(self.inputs, &self.steps)
    }
}

/// Normalizes a recorded demonstration whose output is the result of its final step.
pub fn submit_demonstration(
    inputs: Vec<Value>,
    steps: &[RawStep],
) -> Result<Example, MalformedTraceError> {
    let output = steps
        .last()
        .map(|s| s.result.clone())
        .ok_or(MalformedTraceError::Empty)?;
    normalize(inputs, steps, output)
}

/// Normalizes a recorded demonstration with an explicit output.
pub fn normalize(
    inputs: Vec<Value>,
    raw: &[RawStep],
    output: Value,
) -> Result<Example, MalformedTraceError> {
    let library = Library::global();
    let mut steps: Vec<TraceStep> = Vec::with_capacity(raw.len());
    for (index, step) in raw.iter().enumerate() {
        let op = library
            .lookup(&step.op)
            .ok_or_else(|| MalformedTraceError::UnknownOperation {
                step: index,
                name: step.op.clone(),
            })?;
        if step.args.len() != op.arity() {
            return Err(MalformedTraceError::ArityMismatch {
                step: index,
                op: op.name(),
                expected: op.arity(),
                found: step.args.len(),
            });
        }
        let refs: Vec<&Value> = step.args.iter().collect();
        let computed = op
            .apply(&refs)
            .map_err(|source| MalformedTraceError::Inapplicable {
                step: index,
                source,
            })?;
        if computed != step.result {
            return Err(MalformedTraceError::ResultMismatch {
                step: index,
                op: op.name(),
                recorded: step.result.clone(),
                computed,
            });
        }
        let args = step
            .args
            .iter()
            .map(|v| source_of(v, &inputs, &steps))
            .collect();
        steps.push(TraceStep {
            op,
            args,
            result: step.result.clone(),
        });
    }
    log::debug!(target: "synth", "normalized demonstration with {} steps", steps.len());
    Ok(Example {
        inputs,
        steps,
        output,
    })
}

fn source_of(v: &Value, inputs: &[Value], earlier: &[TraceStep]) -> Arg {
    if let Some(j) = earlier.iter().rposition(|s| &s.result == v) {
        return Arg::Step(j);
    }
    match inputs.iter().position(|x| x == v) {
        Some(i) => Arg::Input(i),
        None => Arg::Literal(v.clone()),
    }
}
