//! The expression-type normalizer (§4.2): a bottom-up, fixpoint rewrite
//! that folds pending `Op`/`ComposeSequence`/`ComposeParallel`/`App` nodes
//! down to `Val` wherever the contribution algebra lets it, and performs
//! capture-avoiding beta-reduction for fully-applied lambdas.

use crate::contribution::{
    add_conditional, combine_par, combine_product, combine_seq, et_compose_par, et_compose_seq,
    Cardinality, ContributionOperator, ContributionSource, Contributions, KnownContribution, Precision,
};
use crate::expr_type::{ExpressionType, FunctionDef, FunctionDesc};

/// Which kind of parameter a [`substitute`] call is eliminating: a lambda's
/// de Bruijn level (bound during [`crate::eval`]) or a procedure's
/// positional parameter (bound during procedure-call translation, see
/// `statements.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstTarget {
    Formal(u32),
    Proc(u32),
}

impl SubstTarget {
    fn matches_source(self, source: &ContributionSource) -> bool {
        match (self, source) {
            (SubstTarget::Formal(i), ContributionSource::FormalParameter(j)) => i == *j,
            (SubstTarget::Proc(i), ContributionSource::ProcParameter(j)) => i == *j,
            _ => false,
        }
    }

    fn matches_fun_def(self, def: &FunctionDef) -> bool {
        match (self, def) {
            (SubstTarget::Formal(i), FunctionDef::FormalParameter(j)) => i == *j,
            (SubstTarget::Proc(i), FunctionDef::ProcParameter(j)) => i == *j,
            _ => false,
        }
    }
}

/// Normalizes `et` to a fixpoint: repeatedly applies one bottom-up rewrite
/// pass until the result stops changing. Idempotent by construction — a
/// second call on an already-normalized value is a single no-op pass.
#[must_use]
pub fn normalize(et: &ExpressionType) -> ExpressionType {
    let stepped = normalize_once(et);
    if &stepped == et {
        stepped
    } else {
        normalize(&stepped)
    }
}

fn normalize_once(et: &ExpressionType) -> ExpressionType {
    match et {
        ExpressionType::Unknown => ExpressionType::Unknown,
        ExpressionType::Val(kc) => ExpressionType::Val(kc.clone()),
        ExpressionType::CompositeVal { full, special } => ExpressionType::CompositeVal {
            full: Box::new(normalize(full)),
            special: Box::new(normalize(special)),
        },
        ExpressionType::Op(op, inner) => {
            let inner = normalize(inner);
            match &inner {
                ExpressionType::Val(kc) => ExpressionType::Val(lift_operator(kc, op)),
                _ => ExpressionType::Op(op.clone(), Box::new(inner)),
            }
        }
        ExpressionType::ComposeSequence(items) => {
            let items: Vec<_> = items.iter().map(normalize).collect();
            if items.iter().all(|e| matches!(e, ExpressionType::Val(_))) {
                let folded = items
                    .iter()
                    .filter_map(ExpressionType::as_val)
                    .cloned()
                    .fold(KnownContribution::nothing(), |acc, kc| et_compose_seq(&acc, &kc));
                ExpressionType::Val(folded)
            } else {
                ExpressionType::ComposeSequence(items)
            }
        }
        ExpressionType::ComposeParallel { cond, clauses } => {
            let cond = normalize(cond);
            let clauses: Vec<_> = clauses.iter().map(normalize).collect();
            if clauses.iter().all(|e| matches!(e, ExpressionType::Val(_))) {
                let mut vals = clauses.iter().filter_map(ExpressionType::as_val).cloned();
                let Some(first) = vals.next() else {
                    return ExpressionType::Val(KnownContribution::nothing());
                };
                let folded = vals.fold(first, |acc, kc| et_compose_par(&acc, &kc));
                let cond_kc = cond_as_known_contribution(&cond);
                ExpressionType::Val(add_conditional(&cond_kc, &folded))
            } else {
                ExpressionType::ComposeParallel { cond: Box::new(cond), clauses }
            }
        }
        ExpressionType::Fun(desc) => match &desc.def {
            FunctionDef::Body(body) => ExpressionType::Fun(FunctionDesc {
                levels: desc.levels.clone(),
                def: FunctionDef::Body(Box::new(normalize(body))),
            }),
            _ => ExpressionType::Fun(desc.clone()),
        },
        ExpressionType::App { callee, args } => {
            let args: Vec<_> = args.iter().map(normalize).collect();
            if args.iter().any(ExpressionType::is_unknown) {
                return ExpressionType::Unknown;
            }
            if let FunctionDef::Body(_) = &callee.def {
                if args.iter().all(is_reducible) {
                    return beta_reduce(callee, &args);
                }
            }
            ExpressionType::App { callee: callee.clone(), args }
        }
    }
}

fn is_reducible(et: &ExpressionType) -> bool {
    matches!(et, ExpressionType::Val(_) | ExpressionType::Fun(_))
}

fn cond_as_known_contribution(cond: &ExpressionType) -> KnownContribution {
    match cond {
        ExpressionType::Val(kc) => kc.clone(),
        // An unknowable condition conservatively poisons everything it
        // conditions: injecting the `Unknown` source here causes
        // `add_conditional` to tag the body with it, and `is_unknown`
        // propagates from there.
        _ => KnownContribution::unknown(),
    }
}

fn lift_operator(kc: &KnownContribution, op: &ContributionOperator) -> KnownContribution {
    let contributions = kc.contributions.clone().map_summaries(|mut summary| {
        summary.operators.insert(op.clone());
        summary
    });
    KnownContribution { precision: kc.precision, contributions }
}

/// Applies `args` to `callee` one curried layer at a time, in order.
fn beta_reduce(callee: &FunctionDesc, args: &[ExpressionType]) -> ExpressionType {
    let FunctionDef::Body(body) = &callee.def else {
        return ExpressionType::App { callee: callee.clone(), args: args.to_vec() };
    };
    let level = callee.levels.first().copied().unwrap_or(0);
    let mut result = normalize(&substitute(body, SubstTarget::Formal(level), args[0].clone()));
    for arg in &args[1..] {
        match result {
            ExpressionType::Fun(desc) => match &desc.def {
                FunctionDef::Body(inner_body) => {
                    let inner_level = desc.levels.first().copied().unwrap_or(0);
                    result = normalize(&substitute(inner_body, SubstTarget::Formal(inner_level), arg.clone()));
                }
                _ => return ExpressionType::App { callee: desc, args: vec![arg.clone()] },
            },
            ExpressionType::Unknown => return ExpressionType::Unknown,
            other => return other,
        }
    }
    result
}

/// Capture-avoiding substitution of `arg` for every occurrence of
/// `target` in `et`.
#[must_use]
pub fn substitute(et: &ExpressionType, target: SubstTarget, arg: ExpressionType) -> ExpressionType {
    match et {
        ExpressionType::Unknown => ExpressionType::Unknown,
        ExpressionType::Val(kc) => substitute_in_known_contribution(kc, target, &arg),
        ExpressionType::CompositeVal { full, special } => ExpressionType::CompositeVal {
            full: Box::new(substitute(full, target, arg.clone())),
            special: Box::new(substitute(special, target, arg)),
        },
        ExpressionType::Op(op, inner) => {
            ExpressionType::Op(op.clone(), Box::new(substitute(inner, target, arg)))
        }
        ExpressionType::ComposeSequence(items) => ExpressionType::ComposeSequence(
            items.iter().map(|e| substitute(e, target, arg.clone())).collect(),
        ),
        ExpressionType::ComposeParallel { cond, clauses } => ExpressionType::ComposeParallel {
            cond: Box::new(substitute(cond, target, arg.clone())),
            clauses: clauses.iter().map(|c| substitute(c, target, arg.clone())).collect(),
        },
        ExpressionType::Fun(desc) => substitute_fun(desc, target, arg),
        ExpressionType::App { callee, args } => substitute_app(callee, args, target, arg),
    }
}

fn substitute_fun(desc: &FunctionDesc, target: SubstTarget, arg: ExpressionType) -> ExpressionType {
    // A lambda whose own binder is the level being eliminated is the one
    // being applied: its body is the substitution result directly.
    if desc.levels.first().is_some_and(|lvl| match target {
        SubstTarget::Formal(i) => i == *lvl,
        SubstTarget::Proc(_) => false,
    }) {
        if let FunctionDef::Body(body) = &desc.def {
            return (**body).clone();
        }
    }
    match (&desc.def, &arg) {
        (def, ExpressionType::Fun(new_desc)) if target.matches_fun_def(def) => ExpressionType::Fun(new_desc.clone()),
        (FunctionDef::Body(body), _) => ExpressionType::Fun(FunctionDesc {
            levels: desc.levels.clone(),
            def: FunctionDef::Body(Box::new(substitute(body, target, arg))),
        }),
        _ => ExpressionType::Fun(desc.clone()),
    }
}

fn substitute_app(
    callee: &FunctionDesc,
    args: &[ExpressionType],
    target: SubstTarget,
    arg: ExpressionType,
) -> ExpressionType {
    let new_args: Vec<_> = args.iter().map(|a| substitute(a, target, arg.clone())).collect();
    match (&callee.def, &arg) {
        (def, ExpressionType::Fun(new_desc)) if target.matches_fun_def(def) => {
            ExpressionType::App { callee: new_desc.clone(), args: new_args }
        }
        (FunctionDef::Body(body), _) => {
            let new_callee = FunctionDesc {
                levels: callee.levels.clone(),
                def: FunctionDef::Body(Box::new(substitute(body, target, arg))),
            };
            ExpressionType::App { callee: new_callee, args: new_args }
        }
        _ => ExpressionType::App { callee: callee.clone(), args: new_args },
    }
}

fn substitute_in_known_contribution(
    kc: &KnownContribution,
    target: SubstTarget,
    arg: &ExpressionType,
) -> ExpressionType {
    let Some(target_source) = kc.contributions.sources().find(|s| target.matches_source(s)).cloned() else {
        return ExpressionType::Val(kc.clone());
    };
    let target_summary = kc.contributions.get(&target_source).expect("just located").clone();

    let mut contributions = Contributions::default();
    for (source, summary) in kc.contributions.iter() {
        if *source == target_source {
            continue;
        }
        contributions.insert_or_merge(source.clone(), combine_product(summary, &target_summary), combine_product);
    }
    let mut result = KnownContribution { precision: kc.precision, contributions };

    let arg_kc = match arg {
        ExpressionType::Val(arg_kc) => arg_kc.clone(),
        _ => KnownContribution::unknown(),
    };
    result = KnownContribution {
        precision: result.precision.min(arg_kc.precision),
        contributions: result.contributions.union_with(arg_kc.contributions, |a, b| combine_seq(a, b)),
    };
    ExpressionType::Val(result)
}
