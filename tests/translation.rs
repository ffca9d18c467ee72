//! §4.5.1 procedure-call summary translation, exercised end to end through
//! `analyze_module`'s `CallProc` handling (invariant 7 of the testable
//! properties: translating a callee's summary through the caller's actual
//! arguments preserves operation structure).

mod common;

use common::*;
use shard_analyzer::*;

#[test]
fn call_proc_substitutes_the_callees_parameter_with_the_callers_argument() {
    let mut interner = Interner::new();
    let (implicit, mut fields) = standard_host(&mut interner);
    let total = interner.intern("total");
    fields.declare(total, 0);

    let bump_name = id(&mut interner, "Bump");
    let bump_body = vec![
        load(&mut interner, "v", "total"),
        bind(&mut interner, "v2", builtin(&mut interner, "add", vec![var(&mut interner, "v"), var(&mut interner, "amt")])),
        store(&mut interner, "total", var(&mut interner, "v2")),
    ];
    let bump = procedure(bump_name, vec![int_param(&mut interner, "amt")], bump_body);

    let caller_name = id(&mut interner, "Caller");
    let caller_body = vec![call_proc(&mut interner, "Bump", vec![var(&mut interner, "x")])];
    let caller = transition(caller_name, vec![int_param(&mut interner, "x")], caller_body);

    // The procedure must precede its caller: `CallProc` resolution only sees
    // signatures of components already analyzed in source order.
    let m = module(vec![bump, caller]);

    let reports = run(&m, &implicit, &fields, &mut interner);
    assert_eq!(reports.len(), 1, "only the transition produces a report");
    let report = &reports[0];

    let pf = Pseudofield::scalar(total);
    assert!(report.summary.iter().any(|op| matches!(op, ComponentOperation::Read(p) if *p == pf)));

    let write_et = report
        .summary
        .iter()
        .find_map(|op| match op {
            ComponentOperation::Write(p, et) if *p == pf => Some(et),
            _ => None,
        })
        .expect("the translated write survives into the caller's summary");

    let ExpressionType::Val(kc) = write_et else { panic!("expected a folded value") };
    let total_summary = kc
        .contributions
        .get(&ContributionSource::Pseudofield(pf.clone()))
        .expect("the written field still contributes to its own new value");
    assert_eq!(total_summary.cardinality, Cardinality::Linear);
    assert!(total_summary.operators.contains(&ContributionOperator::BuiltinOp(interner.get("add").unwrap())));

    // The commutative write is recognized transitively through the
    // translated summary, so the call site is still shardable.
    assert!(report.constraints.contains(&ShardingConstraint::MustHavePCM(pf.clone(), "integer_add".to_string())));
    assert!(!report.constraints.contains(&ShardingConstraint::MustOwn(pf)));
    assert!(!report.constraints.contains(&ShardingConstraint::Unsat));
}

#[test]
fn call_proc_rejects_a_map_key_that_is_not_a_component_parameter() {
    let mut interner = Interner::new();
    let (implicit, mut fields) = standard_host(&mut interner);
    let balances = interner.intern("balances");
    fields.declare(balances, 1);

    let proc_name = id(&mut interner, "Credit");
    let proc_body = vec![map_update(&mut interner, "balances", &["who"], Some(int(1)))];
    let credit = procedure(proc_name, vec![addr_param(&mut interner, "who")], proc_body);

    let caller_name = id(&mut interner, "Caller");
    // `0xDEAD` is a literal, not a variable bound to a component parameter,
    // so the callee's map key cannot be mapped back to a caller parameter.
    let caller_body = vec![call_proc(&mut interner, "Credit", vec![addr(&mut interner, "0xDEAD")])];
    let caller = transition(caller_name, Vec::new(), caller_body);

    let m = module(vec![credit, caller]);
    let reports = run(&m, &implicit, &fields, &mut interner);
    assert_eq!(reports[0].constraints, vec![ShardingConstraint::Unsat]);
}
