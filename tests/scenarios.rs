use exemplar::compile::compile;
use exemplar::error::{RuntimeError, SynthesisError};
use exemplar::exec;
use exemplar::expr::Expr;
use exemplar::primitive::Primitive;
use exemplar::program::{ParameterSource, Program};
use exemplar::synth::{synthesize, CancellationToken, SynthesisConfig};
use exemplar::trace::{Demonstration, Example};
use exemplar::value::{Sort, Value};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn demo(inputs: Vec<Value>, steps: &[(&str, Vec<Value>, Value)], output: Value) -> Example {
    let mut d = Demonstration::new(inputs);
    for (op, args, result) in steps {
        d.apply(op, args.clone(), result.clone());
    }
    d.returns(output).unwrap()
}

fn scale(x: i64, k: i64) -> Example {
    demo(
        vec![Value::Int(x)],
        &[("multiply", vec![Value::Int(x), Value::Int(k)], Value::Int(x * k))],
        Value::Int(x * k),
    )
}

fn learn(examples: &[Example]) -> Result<Program, SynthesisError> {
    synthesize(examples, &SynthesisConfig::default(), &CancellationToken::new())
}

#[test]
fn map_from_repeated_steps() {
    init();
    let ex = demo(
        vec![Value::ints(&[1, 2, 3])],
        &[
            ("double", vec![Value::Int(1)], Value::Int(2)),
            ("double", vec![Value::Int(2)], Value::Int(4)),
            ("double", vec![Value::Int(3)], Value::Int(6)),
        ],
        Value::ints(&[2, 4, 6]),
    );
    let program = learn(&[ex]).unwrap();
    assert_eq!(
        program.expr,
        Expr::MapOver(
            Box::new(Expr::Apply(Primitive::Double, vec![Expr::Bound(0)])),
            Box::new(Expr::InputRef(0)),
        )
    );
    let graph = compile(&program);
    assert_eq!(
        exec::run(&graph, &[Value::ints(&[5, 0, -1])]),
        Ok(Value::ints(&[10, 0, -2]))
    );
}

#[test]
fn agreeing_demonstrations_keep_constants() {
    init();
    let program = learn(&[scale(5, 2), scale(7, 2)]).unwrap();
    assert_eq!(
        program.expr,
        Expr::Apply(
            Primitive::Multiply,
            vec![Expr::InputRef(0), Expr::Literal(Value::Int(2))]
        )
    );
    assert_eq!(program.arity(), 1);
    assert_eq!(program.generalized().count(), 0);
}

#[test]
fn differing_constants_become_parameters() {
    init();
    let program = learn(&[scale(5, 2), scale(7, 3)]).unwrap();
    assert_eq!(
        program.expr,
        Expr::Apply(Primitive::Multiply, vec![Expr::InputRef(0), Expr::InputRef(1)])
    );
    assert_eq!(
        program.parameters[1].source,
        ParameterSource::Generalized {
            values: vec![Value::Int(2), Value::Int(3)]
        }
    );
    let graph = compile(&program);
    assert_eq!(exec::run(&graph, &[Value::Int(6), Value::Int(4)]), Ok(Value::Int(24)));
}

#[test]
fn demonstration_order_does_not_change_the_program() {
    init();
    let forward = learn(&[scale(5, 2), scale(7, 3)]).unwrap();
    let backward = learn(&[scale(7, 3), scale(5, 2)]).unwrap();
    assert_eq!(forward.expr, backward.expr);
    assert_eq!(forward.arity(), backward.arity());
    let values = |p: &Program| -> Vec<Value> {
        p.generalized()
            .flat_map(|param| match &param.source {
                ParameterSource::Generalized { values } => values.clone(),
                ParameterSource::Input => Vec::new(),
            })
            .collect()
    };
    let mut reversed = values(&backward);
    reversed.reverse();
    assert_eq!(values(&forward), reversed);
}

#[test]
fn input_reused_as_constant_unifies() {
    init();
    // the first demonstration multiplies its input by itself, the second by the constant 2
    let program = learn(&[scale(2, 2), scale(7, 2)]).unwrap();
    assert_eq!(
        program.expr,
        Expr::Apply(
            Primitive::Multiply,
            vec![Expr::InputRef(0), Expr::Literal(Value::Int(2))]
        )
    );
    assert_eq!(program.arity(), 1);
}

#[test]
fn arguments_are_checked_against_learned_sorts() {
    init();
    let program = learn(&[scale(5, 2), scale(7, 3)]).unwrap();
    assert_eq!(program.parameters[0].sort, Sort::Int);
    assert_eq!(program.returns, Sort::Int);
    let graph = compile(&program);
    assert_eq!(
        exec::run(&graph, &[Value::str("5"), Value::Int(2)]),
        Err(RuntimeError::ArgumentSort {
            index: 0,
            expected: Sort::Int,
            found: Value::str("5")
        })
    );
}

#[test]
fn unreachable_demonstration() {
    init();
    let ex = demo(
        vec![Value::Int(3)],
        &[("add", vec![Value::Int(3), Value::Int(4)], Value::Int(7))],
        Value::Int(100),
    );
    let config = SynthesisConfig {
        size_bound: 4,
        ..SynthesisConfig::default()
    };
    match synthesize(&[ex], &config, &CancellationToken::new()) {
        Err(SynthesisError::NoHypothesisFound(e)) => {
            assert_eq!(e.example, 0);
            assert_eq!(e.size_bound, 4);
            assert_eq!(e.closest, None);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn graph_agrees_with_expression() {
    init();
    let ex = demo(
        vec![Value::ints(&[1, 2, 3])],
        &[
            ("add", vec![Value::Int(0), Value::Int(1)], Value::Int(1)),
            ("add", vec![Value::Int(1), Value::Int(2)], Value::Int(3)),
            ("add", vec![Value::Int(3), Value::Int(3)], Value::Int(6)),
        ],
        Value::Int(6),
    );
    let program = learn(&[ex]).unwrap();
    let graph = compile(&program);
    assert!(graph.validate().is_ok());
    assert!(graph.topological_order().is_some());
    for xs in [vec![], vec![4], vec![10, -3, 8, 1]] {
        let args = [Value::ints(&xs)];
        assert_eq!(exec::run(&graph, &args).ok(), program.eval(&args).ok());
    }
    assert_eq!(
        exec::run(&graph, &[Value::ints(&[10, -3, 8, 1])]),
        Ok(Value::Int(16))
    );
}

#[test]
fn unification_is_deterministic() {
    init();
    let examples = [scale(5, 2), scale(7, 3), scale(2, 3)];
    let first = learn(&examples).unwrap();
    for _ in 0..3 {
        assert_eq!(learn(&examples).unwrap(), first);
    }
    assert_eq!(first.parameters.len(), 2);
}

#[test]
fn programs_persist_as_json() {
    init();
    let program = learn(&[scale(5, 2), scale(7, 3)]).unwrap();
    let json = serde_json::to_string(&program).unwrap();
    let restored: Program = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, program);
    let graph = compile(&restored);
    assert_eq!(
        exec::run(&graph, &restored.arguments_for(1, &[Value::Int(7)])),
        Ok(Value::Int(21))
    );
}

#[test]
fn malformed_trace_is_rejected() {
    let mut d = Demonstration::new(vec![Value::Int(2)]);
    d.apply("multiply", vec![Value::Int(2), Value::Int(2)], Value::Int(5));
    assert!(d.finish().is_err());
    let mut d = Demonstration::new(vec![Value::Int(2)]);
    d.apply("frobnicate", vec![Value::Int(2)], Value::Int(5));
    assert!(d.finish().is_err());
}
