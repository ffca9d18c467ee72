//! End-to-end scenarios (S1-S6): literal contract modules analyzed start to
//! finish, checked against their expected summary/constraint shape.

mod common;

use common::*;
use shard_analyzer::*;

#[test]
fn s1_plain_increment_is_commutative() {
    let mut interner = Interner::new();
    let (implicit, mut fields) = standard_host(&mut interner);
    let counter = interner.intern("counter");
    fields.declare(counter, 0);

    let name = id(&mut interner, "Incr");
    let body = vec![
        load(&mut interner, "v", "counter"),
        bind(&mut interner, "one", int(1)),
        bind(&mut interner, "v2", builtin(&mut interner, "add", vec![var(&mut interner, "v"), var(&mut interner, "one")])),
        store(&mut interner, "counter", var(&mut interner, "v2")),
    ];
    let m = module(vec![transition(name, Vec::new(), body)]);

    let reports = run(&m, &implicit, &fields, &mut interner);
    let report = &reports[0];

    let pf = Pseudofield::scalar(counter);
    assert!(report.summary.iter().any(|op| matches!(op, ComponentOperation::Read(p) if *p == pf)));
    assert!(report.summary.iter().any(|op| matches!(op, ComponentOperation::Write(p, _) if *p == pf)));

    assert!(report.constraints.contains(&ShardingConstraint::MustHavePCM(pf.clone(), "integer_add".to_string())));
    assert!(!report.constraints.contains(&ShardingConstraint::MustOwn(pf)));
    assert!(!report.constraints.contains(&ShardingConstraint::Unsat));
}

#[test]
fn s2_conditional_write_requires_ownership() {
    let mut interner = Interner::new();
    let (implicit, mut fields) = standard_host(&mut interner);
    let balance = interner.intern("balance");
    fields.declare(balance, 1);
    let sender_key = implicit.component_params[0];

    let name = id(&mut interner, "CondWrite");
    let params = vec![int_param(&mut interner, "threshold"), int_param(&mut interner, "new_val")];
    let body = vec![
        map_get(&mut interner, "x", "balance", &["_sender"]),
        bind(&mut interner, "cond", builtin(&mut interner, "lt", vec![var(&mut interner, "x"), var(&mut interner, "threshold")])),
        match_stmt(
            &mut interner,
            "cond",
            vec![
                MatchClause {
                    pattern: Pattern::Literal(Literal::Bool(true)),
                    body: vec![map_update(&mut interner, "balance", &["_sender"], Some(var(&mut interner, "new_val")))],
                },
                MatchClause { pattern: Pattern::Literal(Literal::Bool(false)), body: Vec::new() },
            ],
        ),
    ];
    let m = module(vec![transition(name, params, body)]);

    let reports = run(&m, &implicit, &fields, &mut interner);
    let report = &reports[0];

    let pf = Pseudofield::mapped(balance, vec![sender_key]);
    assert!(report.summary.iter().any(|op| matches!(op, ComponentOperation::ConditionOn(_))));
    assert!(report.constraints.contains(&ShardingConstraint::MustOwn(pf)));
    assert!(!report.constraints.contains(&ShardingConstraint::Unsat));
}

#[test]
fn s3_accept_money_requires_sender_shard() {
    let mut interner = Interner::new();
    let (implicit, fields) = standard_host(&mut interner);

    let name = id(&mut interner, "Deposit");
    let m = module(vec![transition(name, Vec::new(), vec![accept()])]);

    let reports = run(&m, &implicit, &fields, &mut interner);
    let report = &reports[0];

    assert_eq!(report.constraints, vec![ShardingConstraint::SenderShard]);
}

#[test]
fn s4_send_to_parameter_address() {
    let mut interner = Interner::new();
    let (implicit, fields) = standard_host(&mut interner);

    let name = id(&mut interner, "Pay");
    let params = vec![addr_param(&mut interner, "to")];
    let msg = message(vec![(RECIPIENT_LABEL, var(&mut interner, "to")), (AMOUNT_LABEL, int(0))], &mut interner);
    let body = vec![send(msg)];
    let m = module(vec![transition(name, params, body)]);

    let reports = run(&m, &implicit, &fields, &mut interner);
    let report = &reports[0];

    // implicit `_sender` occupies index 0, so the declared `to` parameter is index 1.
    assert_eq!(report.constraints, vec![ShardingConstraint::AddrMustBeNonContract(1)]);
}

#[test]
fn s5_send_to_non_parameter_address_is_unsat() {
    let mut interner = Interner::new();
    let (implicit, fields) = standard_host(&mut interner);

    let name = id(&mut interner, "Pay");
    let msg = message(
        vec![(RECIPIENT_LABEL, addr(&mut interner, "0xCAFE")), (AMOUNT_LABEL, int(0))],
        &mut interner,
    );
    let body = vec![send(msg)];
    let m = module(vec![transition(name, Vec::new(), body)]);

    let reports = run(&m, &implicit, &fields, &mut interner);
    assert_eq!(reports[0].constraints, vec![ShardingConstraint::Unsat]);
}

#[test]
fn s6_spurious_option_match_over_a_map() {
    let mut interner = Interner::new();
    let (implicit, mut fields) = standard_host(&mut interner);
    let counts = interner.intern("counts");
    fields.declare(counts, 1);

    let name = id(&mut interner, "Increment");
    let params = vec![int_param(&mut interner, "k"), int_param(&mut interner, "d")];
    let body = vec![
        map_get(&mut interner, "opt", "counts", &["k"]),
        match_stmt(
            &mut interner,
            "opt",
            vec![
                some_clause(
                    &mut interner,
                    "x",
                    vec![
                        bind(&mut interner, "y", builtin(&mut interner, "add", vec![var(&mut interner, "x"), var(&mut interner, "d")])),
                        map_update(&mut interner, "counts", &["k"], Some(var(&mut interner, "y"))),
                    ],
                ),
                none_clause(vec![map_update(&mut interner, "counts", &["k"], Some(var(&mut interner, "d")))]),
            ],
        ),
    ];
    let m = module(vec![transition(name, params, body)]);

    let reports = run(&m, &implicit, &fields, &mut interner);
    let report = &reports[0];

    let k_sym = interner.get("k").expect("k was interned as a parameter");
    let pf = Pseudofield::mapped(counts, vec![k_sym]);

    assert!(report.summary.iter().any(|op| matches!(op, ComponentOperation::Write(p, _) if *p == pf)));
    assert!(report.constraints.contains(&ShardingConstraint::MustHavePCM(pf.clone(), "integer_add".to_string())));
    assert!(!report.constraints.contains(&ShardingConstraint::MustOwn(pf)));
    assert!(!report.constraints.contains(&ShardingConstraint::Unsat));
}
