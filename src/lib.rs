//! Program synthesis by demonstration.
//!
//! This crate infers small functional programs from recorded demonstrations. A demonstration is
//! what a user did by hand: the inputs they started from, the sequence of primitive operations
//! they applied (each with its concrete arguments and result), and the value they ended up with.
//! From one or more demonstrations, the engine finds the smallest expression that reproduces every
//! demonstrated step, generalizes the constants that differ between demonstrations into
//! parameters, and compiles the result into a data-flow graph that can be run on new inputs.
//!
//! For example, a user scales a quantity by two in one session and by three in another:
//!
//! | Input | Recorded steps | Output |
//! |---|---|---|
//! | 5 | `multiply(5, 2) = 10` | 10 |
//! | 7 | `multiply(7, 3) = 21` | 21 |
//!
//! The learned program takes the quantity and the factor as parameters:
//!
//! ```
//! use exemplar::compile::compile;
//! use exemplar::exec;
//! use exemplar::synth::{synthesize, CancellationToken, SynthesisConfig};
//! use exemplar::trace::Demonstration;
//! use exemplar::value::Value;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut first = Demonstration::new(vec![Value::Int(5)]);
//! first.apply("multiply", vec![Value::Int(5), Value::Int(2)], Value::Int(10));
//! let mut second = Demonstration::new(vec![Value::Int(7)]);
//! second.apply("multiply", vec![Value::Int(7), Value::Int(3)], Value::Int(21));
//! let examples = vec![first.finish()?, second.finish()?];
//!
//! let program = synthesize(&examples, &SynthesisConfig::default(), &CancellationToken::new())?;
//! assert_eq!(program.to_string(), "(in0, in1) -> multiply(in0, in1)");
//!
//! // run the program on a new quantity and factor
//! let graph = compile(&program);
//! assert_eq!(exec::run(&graph, &[Value::Int(10), Value::Int(4)])?, Value::Int(40));
//! # Ok(())
//! # }
//! ```
//!
//! Repetition is recognized as well: applying the same operations to every element of a list is
//! learned as a `map`, `filter` or `fold` over that list, with the loop body inferred from the
//! iterations.
//!
//! The stages are exposed separately. [`trace`] validates and normalizes raw recordings, [`synth`]
//! searches for hypotheses and drives the whole pipeline, [`unify`] reconciles hypotheses across
//! demonstrations, [`compile`] builds the graph, and [`exec`] runs it. Learned programs implement
//! serde's `Serialize` and `Deserialize` so they can be stored and reloaded.

#![doc(html_root_url = "https://docs.rs/exemplar/0.1.0")]
#![warn(missing_docs)]

pub mod compile;
pub mod error;
pub mod exec;
pub mod expr;
mod graph;
pub mod primitive;
pub mod program;
pub mod synth;
mod token;
pub mod trace;
pub mod unify;
pub mod value;
