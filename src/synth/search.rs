//! Bottom-up enumeration of expressions by size.
//!
//! A search runs over one or more evaluation contexts at once: the top-level search has a single
//! context (the demonstration's inputs), while the search for a loop body has one context per
//! loop iteration, each binding that iteration's element (and accumulator). Every candidate
//! carries its value in every context, so candidates are compared, combined and checked against
//! the targets without ever being re-evaluated from scratch.

use super::pattern::{LoopKind, Template};
use super::CancellationToken;
use crate::error::CancelledError;
use crate::expr::Expr;
use crate::primitive::{Library, Primitive};
use crate::value::Value;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::{smallvec, SmallVec};

pub(crate) type CandId = usize;

/// Where a candidate is evaluated.
pub(crate) struct Context<'a> {
    pub inputs: &'a [Value],
    /// Values of the enclosing bindings, innermost last.
    pub env: Vec<Value>,
}

/// A demonstrated step a solution has to perform: applying `op` must yield `value` in `context`.
pub(crate) struct Anchor {
    pub context: usize,
    pub op: Primitive,
    pub value: Value,
}

pub(crate) struct Problem<'a> {
    pub contexts: Vec<Context<'a>>,
    /// Required value per context.
    pub targets: Vec<Value>,
    pub anchors: Vec<Anchor>,
    /// Size-one expressions, in enumeration order.
    pub leaves: Vec<Expr>,
    pub templates: Vec<Template>,
    /// Whether to enumerate `Compose` and `Conditional`.
    pub combinators: bool,
    pub size_bound: usize,
}

/// The set of anchors a candidate reproduces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Coverage(SmallVec<[u64; 2]>);

impl Coverage {
    pub fn empty(n: usize) -> Self {
        Coverage(smallvec![0; (n + 63) / 64])
    }

    pub fn full(n: usize) -> Self {
        let mut c = Self::empty(n);
        (0..n).for_each(|i| c.insert(i));
        c
    }

    pub fn insert(&mut self, i: usize) {
        self.0[i / 64] |= 1 << (i % 64);
    }

    pub fn union_with(&mut self, other: &Coverage) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a |= b;
        }
    }

    fn union_masked(&mut self, other: &Coverage, mask: &Coverage) {
        for ((a, b), m) in self.0.iter_mut().zip(&other.0).zip(&mask.0) {
            *a |= b & m;
        }
    }
}

enum Shape {
    Leaf(Expr),
    Apply(Primitive, SmallVec<[CandId; 3]>),
    Loop(usize, CandId),
    Fold(usize, CandId, CandId),
    Compose(CandId, CandId),
    Conditional(CandId, CandId, CandId),
}

struct Candidate {
    shape: Shape,
    values: Vec<Value>,
    cover: Coverage,
    // bit k set when the candidate refers to Bound(k)
    free: u32,
}

pub(crate) struct Outcome {
    pub found: Option<Expr>,
    /// The first candidate that matched the targets without reproducing every anchor.
    pub closest: Option<Expr>,
}

pub(crate) struct Search<'p> {
    problem: &'p Problem<'p>,
    cands: Vec<Candidate>,
    by_size: Vec<Vec<CandId>>,
    seen: FxHashSet<(Vec<Value>, Coverage, u32)>,
    anchors_by_op: FxHashMap<Primitive, Vec<usize>>,
    full: Coverage,
    closest: Option<CandId>,
}

impl<'p> Search<'p> {
    pub fn new(problem: &'p Problem<'p>) -> Self {
        let mut anchors_by_op: FxHashMap<Primitive, Vec<usize>> = FxHashMap::default();
        for (i, a) in problem.anchors.iter().enumerate() {
            anchors_by_op.entry(a.op).or_default().push(i);
        }
        Self {
            problem,
            cands: Vec::new(),
            by_size: vec![Vec::new()],
            seen: FxHashSet::default(),
            anchors_by_op,
            full: Coverage::full(problem.anchors.len()),
            closest: None,
        }
    }

    pub fn run(mut self, token: &CancellationToken) -> Result<Outcome, CancelledError> {
        for size in 1..=self.problem.size_bound {
            token.check(size)?;
            let mut level = Vec::new();
            let found = if size == 1 {
                self.leaves(&mut level)
            } else {
                self.loops(size, &mut level)
                    .or_else(|| self.applications(size, &mut level))
                    .or_else(|| self.compositions(size, &mut level))
                    .or_else(|| self.conditionals(size, &mut level))
            };
            log::trace!(
                target: "synth",
                "size {}: {} new candidates ({} total)",
                size,
                level.len(),
                self.cands.len()
            );
            if let Some(id) = found {
                return Ok(Outcome {
                    found: Some(self.build(id)),
                    closest: None,
                });
            }
            self.by_size.push(level);
        }
        log::debug!(
            target: "synth",
            "exhausted size bound {} after {} candidates",
            self.problem.size_bound,
            self.cands.len()
        );
        Ok(Outcome {
            found: None,
            closest: self.closest.map(|id| self.build(id)),
        })
    }

    // Records a candidate unless an equivalent one exists, returning it if it solves the problem.
    //
    // When compositions are enumerated, a candidate's bound variables may be rebound later, so
    // candidates referring to different variables are never merged. Two outers that refer to the
    // same variables but differ elsewhere still are, if their values agree in every context.
    fn offer(&mut self, cand: Candidate, level: &mut Vec<CandId>) -> Option<CandId> {
        let free = if self.problem.combinators { cand.free } else { 0 };
        if !self.seen.insert((cand.values.clone(), cand.cover.clone(), free)) {
            return None;
        }
        let id = self.cands.len();
        let hit = cand.values == self.problem.targets;
        let solved = hit && cand.cover == self.full;
        self.cands.push(cand);
        level.push(id);
        if solved {
            return Some(id);
        }
        if hit && self.closest.is_none() {
            self.closest = Some(id);
        }
        None
    }

    fn mark(&self, context: usize, op: Primitive, value: &Value, cover: &mut Coverage) {
        if let Some(ids) = self.anchors_by_op.get(&op) {
            for &i in ids {
                let a = &self.problem.anchors[i];
                if a.context == context && &a.value == value {
                    cover.insert(i);
                }
            }
        }
    }

    fn leaves(&mut self, level: &mut Vec<CandId>) -> Option<CandId> {
        let problem = self.problem;
        for leaf in &problem.leaves {
            let values: Result<Vec<Value>, _> = problem
                .contexts
                .iter()
                .map(|c| leaf.eval_in(c.inputs, &c.env))
                .collect();
            let values = match values {
                Ok(values) => values,
                Err(_) => continue,
            };
            let free = match leaf {
                Expr::Bound(k) => 1 << k,
                _ => 0,
            };
            let cand = Candidate {
                shape: Shape::Leaf(leaf.clone()),
                values,
                cover: Coverage::empty(problem.anchors.len()),
                free,
            };
            if let Some(id) = self.offer(cand, level) {
                return Some(id);
            }
        }
        None
    }

    fn loops(&mut self, size: usize, level: &mut Vec<CandId>) -> Option<CandId> {
        let problem = self.problem;
        for (t, template) in problem.templates.iter().enumerate() {
            let fixed = 1 + template.body_size;
            if size <= fixed {
                continue;
            }
            let rest = size - fixed;
            match &template.kind {
                LoopKind::Fold { init } => {
                    for coll_size in 1..rest {
                        let colls = self.holding(coll_size, &template.collection);
                        let starts = self.holding(rest - coll_size, init);
                        for &coll in &colls {
                            for &start in &starts {
                                let shape = Shape::Fold(t, coll, start);
                                let cand = self.instantiate(template, &[coll, start], shape);
                                if let Some(id) = self.offer(cand, level) {
                                    return Some(id);
                                }
                            }
                        }
                    }
                }
                LoopKind::Map | LoopKind::Filter => {
                    for coll in self.holding(rest, &template.collection) {
                        let cand = self.instantiate(template, &[coll], Shape::Loop(t, coll));
                        if let Some(id) = self.offer(cand, level) {
                            return Some(id);
                        }
                    }
                }
            }
        }
        None
    }

    // Candidates of the given size whose value is `value` in every context.
    fn holding(&self, size: usize, value: &Value) -> Vec<CandId> {
        self.by_size[size]
            .iter()
            .copied()
            .filter(|&id| self.cands[id].values.iter().all(|v| v == value))
            .collect()
    }

    fn instantiate(&self, template: &Template, operands: &[CandId], shape: Shape) -> Candidate {
        let mut cover = template.cover.clone();
        let mut free = 0;
        for &id in operands {
            cover.union_with(&self.cands[id].cover);
            free |= self.cands[id].free;
        }
        Candidate {
            shape,
            values: vec![template.value.clone(); self.problem.contexts.len()],
            cover,
            free,
        }
    }

    fn applications(&mut self, size: usize, level: &mut Vec<CandId>) -> Option<CandId> {
        for p in Library::global().primitives() {
            let arity = p.arity();
            if arity == 0 || arity > size - 1 {
                continue;
            }
            // branching is left to `conditionals` unless the user chose it explicitly
            if p == Primitive::If && !self.anchors_by_op.contains_key(&Primitive::If) {
                continue;
            }
            for split in splits(size - 1, arity) {
                let choices: SmallVec<[Vec<CandId>; 3]> = split
                    .iter()
                    .enumerate()
                    .map(|(position, &s)| {
                        self.by_size[s]
                            .iter()
                            .copied()
                            .filter(|&id| self.cands[id].values.iter().all(|v| p.accepts(position, v)))
                            .collect()
                    })
                    .collect();
                let lens: SmallVec<[usize; 3]> = choices.iter().map(|c| c.len()).collect();
                if lens.contains(&0) {
                    continue;
                }
                let mut odometer: SmallVec<[usize; 3]> = smallvec![0; arity];
                loop {
                    let args: SmallVec<[CandId; 3]> =
                        odometer.iter().zip(&choices).map(|(&i, c)| c[i]).collect();
                    if let Some(cand) = self.apply(p, args) {
                        if let Some(id) = self.offer(cand, level) {
                            return Some(id);
                        }
                    }
                    if !advance(&mut odometer, &lens) {
                        break;
                    }
                }
            }
        }
        None
    }

    fn apply(&self, p: Primitive, args: SmallVec<[CandId; 3]>) -> Option<Candidate> {
        let n = self.problem.contexts.len();
        let mut values = Vec::with_capacity(n);
        let mut cover = Coverage::empty(self.problem.anchors.len());
        let mut free = 0;
        for &a in &args {
            cover.union_with(&self.cands[a].cover);
            free |= self.cands[a].free;
        }
        for c in 0..n {
            let refs: SmallVec<[&Value; 3]> =
                args.iter().map(|&a| &self.cands[a].values[c]).collect();
            let v = p.apply(&refs).ok()?;
            self.mark(c, p, &v, &mut cover);
            values.push(v);
        }
        Some(Candidate {
            shape: Shape::Apply(p, args),
            values,
            cover,
            free,
        })
    }

    fn compositions(&mut self, size: usize, level: &mut Vec<CandId>) -> Option<CandId> {
        if !self.problem.combinators || size < 4 {
            return None;
        }
        for outer_size in 2..size - 1 {
            let inner_size = size - 1 - outer_size;
            let outers: Vec<CandId> = self.by_size[outer_size]
                .iter()
                .copied()
                .filter(|&id| self.cands[id].free & 1 != 0)
                .collect();
            for &outer in &outers {
                for i in 0..self.by_size[inner_size].len() {
                    let inner = self.by_size[inner_size][i];
                    if let Some(cand) = self.compose(outer, inner) {
                        if let Some(id) = self.offer(cand, level) {
                            return Some(id);
                        }
                    }
                }
            }
        }
        None
    }

    // The outer expression sees the inner value as Bound(0), so it has to be re-evaluated in
    // every context rather than combined from pool values.
    fn compose(&self, outer: CandId, inner: CandId) -> Option<Candidate> {
        let expr = Expr::Compose(Box::new(self.build(outer)), Box::new(self.build(inner)));
        let mut values = Vec::with_capacity(self.problem.contexts.len());
        let mut cover = Coverage::empty(self.problem.anchors.len());
        for (c, ctx) in self.problem.contexts.iter().enumerate() {
            let (v, applications) = expr.eval_traced_in(ctx.inputs, &ctx.env).ok()?;
            for a in &applications {
                self.mark(c, a.op, &a.result, &mut cover);
            }
            values.push(v);
        }
        Some(Candidate {
            shape: Shape::Compose(outer, inner),
            values,
            cover,
            free: self.cands[inner].free | (self.cands[outer].free >> 1),
        })
    }

    fn conditionals(&mut self, size: usize, level: &mut Vec<CandId>) -> Option<CandId> {
        if !self.problem.combinators || self.problem.contexts.len() < 2 || size < 4 {
            return None;
        }
        for split in splits(size - 1, 3) {
            let preds: Vec<CandId> = self.by_size[split[0]]
                .iter()
                .copied()
                .filter(|&id| {
                    let vs = &self.cands[id].values;
                    vs.iter().all(|v| v.as_bool().is_some()) && vs.iter().any(|v| v != &vs[0])
                })
                .collect();
            for &pred in &preds {
                for i in 0..self.by_size[split[1]].len() {
                    let then = self.by_size[split[1]][i];
                    for j in 0..self.by_size[split[2]].len() {
                        let other = self.by_size[split[2]][j];
                        if then == other {
                            continue;
                        }
                        let cand = self.choose(pred, then, other);
                        if let Some(id) = self.offer(cand, level) {
                            return Some(id);
                        }
                    }
                }
            }
        }
        None
    }

    fn choose(&self, pred: CandId, then: CandId, other: CandId) -> Candidate {
        let taken: Vec<bool> = self.cands[pred]
            .values
            .iter()
            .map(|v| v.as_bool() == Some(true))
            .collect();
        let n = self.problem.anchors.len();
        let mut on_then = Coverage::empty(n);
        let mut on_else = Coverage::empty(n);
        for (i, a) in self.problem.anchors.iter().enumerate() {
            if taken[a.context] {
                on_then.insert(i);
            } else {
                on_else.insert(i);
            }
        }
        let mut cover = self.cands[pred].cover.clone();
        cover.union_masked(&self.cands[then].cover, &on_then);
        cover.union_masked(&self.cands[other].cover, &on_else);
        let values = taken
            .iter()
            .enumerate()
            .map(|(c, &t)| {
                let from = if t { then } else { other };
                self.cands[from].values[c].clone()
            })
            .collect();
        Candidate {
            shape: Shape::Conditional(pred, then, other),
            values,
            cover,
            free: self.cands[pred].free | self.cands[then].free | self.cands[other].free,
        }
    }

    fn build(&self, id: CandId) -> Expr {
        let templates = &self.problem.templates;
        match &self.cands[id].shape {
            Shape::Leaf(e) => e.clone(),
            Shape::Apply(p, args) => Expr::Apply(*p, args.iter().map(|&a| self.build(a)).collect()),
            Shape::Loop(t, coll) => {
                let body = Box::new(templates[*t].body.clone());
                let coll = Box::new(self.build(*coll));
                match templates[*t].kind {
                    LoopKind::Filter => Expr::FilterOver(body, coll),
                    _ => Expr::MapOver(body, coll),
                }
            }
            Shape::Fold(t, coll, init) => Expr::FoldOver(
                Box::new(templates[*t].body.clone()),
                Box::new(self.build(*init)),
                Box::new(self.build(*coll)),
            ),
            Shape::Compose(outer, inner) => {
                Expr::Compose(Box::new(self.build(*outer)), Box::new(self.build(*inner)))
            }
            Shape::Conditional(p, t, e) => Expr::Conditional(
                Box::new(self.build(*p)),
                Box::new(self.build(*t)),
                Box::new(self.build(*e)),
            ),
        }
    }
}

/// All ways to write `total` as an ordered sum of `parts` positive sizes, in lexicographic order.
fn splits(total: usize, parts: usize) -> Vec<SmallVec<[usize; 3]>> {
    if parts == 0 {
        return if total == 0 { vec![SmallVec::new()] } else { Vec::new() };
    }
    let mut out = Vec::new();
    for first in 1..=total.saturating_sub(parts - 1) {
        for rest in splits(total - first, parts - 1) {
            let mut split: SmallVec<[usize; 3]> = smallvec![first];
            split.extend(rest);
            out.push(split);
        }
    }
    out
}

// Steps to the next argument tuple, last position fastest. Returns false after the last tuple.
fn advance(indices: &mut [usize], lens: &[usize]) -> bool {
    for pos in (0..indices.len()).rev() {
        indices[pos] += 1;
        if indices[pos] < lens[pos] {
            return true;
        }
        indices[pos] = 0;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use Primitive::*;

    fn solve(problem: &Problem) -> Outcome {
        Search::new(problem).run(&CancellationToken::new()).unwrap()
    }

    #[test]
    fn splits_in_lexicographic_order() {
        let s: Vec<Vec<usize>> = splits(4, 2).into_iter().map(|s| s.to_vec()).collect();
        assert_eq!(s, vec![vec![1, 3], vec![2, 2], vec![3, 1]]);
        assert_eq!(splits(2, 3).len(), 0);
        assert_eq!(splits(3, 3).len(), 1);
    }

    #[test]
    fn odometer_visits_every_tuple() {
        let mut idx = [0, 0];
        let mut seen = vec![idx.to_vec()];
        while advance(&mut idx, &[2, 3]) {
            seen.push(idx.to_vec());
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[1], vec![0, 1]);
    }

    #[test]
    fn coverage_bits() {
        let mut c = Coverage::empty(70);
        c.insert(3);
        c.insert(65);
        assert_eq!(c.0[0], 1 << 3);
        assert_eq!(c.0[1], 1 << 1);
        let mut d = Coverage::empty(70);
        d.union_with(&c);
        assert_eq!(c, d);
        assert_ne!(d, Coverage::full(70));
    }

    #[test]
    fn multi_context_body() {
        // one context per element of [1, 2, 3], with the element bound
        let inputs = [Value::ints(&[1, 2, 3])];
        let contexts = (1..=3)
            .map(|x| Context {
                inputs: &inputs,
                env: vec![Value::Int(x)],
            })
            .collect();
        let anchors = (1..=3)
            .enumerate()
            .map(|(c, x)| Anchor {
                context: c,
                op: Increment,
                value: Value::Int(x + 1),
            })
            .collect();
        let problem = Problem {
            contexts,
            targets: vec![Value::Int(4), Value::Int(6), Value::Int(8)],
            anchors,
            leaves: vec![Expr::Bound(0), Expr::InputRef(0)],
            templates: Vec::new(),
            combinators: true,
            size_bound: 4,
        };
        let outcome = solve(&problem);
        assert_eq!(
            outcome.found.map(|e| e.to_string()),
            Some(String::from("double(increment(#0))"))
        );
    }

    #[test]
    fn bound_variables_survive_value_collisions() {
        // #0 and in0 are both 3, but only #0 can be rebound by a composition
        let inputs = [Value::Int(3)];
        let problem = |combinators| Problem {
            contexts: vec![Context {
                inputs: &inputs,
                env: vec![Value::Int(3)],
            }],
            targets: vec![Value::Int(0)],
            anchors: Vec::new(),
            leaves: vec![Expr::InputRef(0), Expr::Bound(0)],
            templates: Vec::new(),
            combinators,
            size_bound: 1,
        };
        let with = problem(true);
        let mut search = Search::new(&with);
        let mut level = Vec::new();
        assert_eq!(search.leaves(&mut level), None);
        assert_eq!(level.len(), 2);

        let without = problem(false);
        let mut search = Search::new(&without);
        let mut level = Vec::new();
        assert_eq!(search.leaves(&mut level), None);
        assert_eq!(level.len(), 1);
    }

    #[test]
    fn explicit_conditionals_are_enumerated() {
        let yes = [Value::Bool(true)];
        let no = [Value::Bool(false)];
        let problem = Problem {
            contexts: vec![
                Context {
                    inputs: &yes,
                    env: Vec::new(),
                },
                Context {
                    inputs: &no,
                    env: Vec::new(),
                },
            ],
            targets: vec![Value::Int(1), Value::Int(2)],
            anchors: vec![
                Anchor {
                    context: 0,
                    op: If,
                    value: Value::Int(1),
                },
                Anchor {
                    context: 1,
                    op: If,
                    value: Value::Int(2),
                },
            ],
            leaves: vec![
                Expr::InputRef(0),
                Expr::Literal(Value::Int(1)),
                Expr::Literal(Value::Int(2)),
            ],
            templates: Vec::new(),
            combinators: false,
            size_bound: 4,
        };
        let found = solve(&problem).found.map(|e| e.to_string());
        assert_eq!(found, Some(String::from("if(in0, 1, 2)")));
    }

    #[test]
    fn conditional_splits_contexts() {
        let inputs: [Value; 0] = [];
        let contexts = [true, false]
            .iter()
            .map(|&b| Context {
                inputs: &inputs,
                env: vec![Value::Bool(b)],
            })
            .collect();
        let problem = Problem {
            contexts,
            targets: vec![Value::str("yes"), Value::str("no")],
            anchors: Vec::new(),
            leaves: vec![
                Expr::Bound(0),
                Expr::Literal(Value::str("yes")),
                Expr::Literal(Value::str("no")),
            ],
            templates: Vec::new(),
            combinators: true,
            size_bound: 4,
        };
        let found = solve(&problem).found.map(|e| e.to_string());
        assert_eq!(found, Some(String::from("if(#0, \"yes\", \"no\")")));
    }

    #[test]
    fn unreachable_target_keeps_closest() {
        let inputs = [Value::Int(5)];
        let problem = Problem {
            contexts: vec![Context {
                inputs: &inputs,
                env: Vec::new(),
            }],
            targets: vec![Value::Int(10)],
            anchors: vec![Anchor {
                context: 0,
                op: Subtract,
                value: Value::Int(-1),
            }],
            leaves: vec![Expr::InputRef(0)],
            templates: Vec::new(),
            combinators: false,
            size_bound: 2,
        };
        let outcome = solve(&problem);
        assert_eq!(outcome.found, None);
        assert_eq!(
            outcome.closest,
            Some(Expr::Apply(Double, vec![Expr::InputRef(0)]))
        );
    }
}
