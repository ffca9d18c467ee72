//! The statement analyzer / summary builder (§4.5), including §4.5.1
//! procedure-call summary translation.
//!
//! Two documented quirks are preserved faithfully rather than "fixed" (see
//! `DESIGN.md`): the read-after-write check consults the summary
//! accumulated across the *entire* component body, including effects from
//! sibling `match` branches already processed — not just the current
//! control-flow path — and a `Throw` contributes nothing itself but does
//! not prevent later statements in the same block from being analyzed.
//! Both fall out of the obvious implementation: one [`ComponentSummary`]
//! accumulates monotonically for the whole component, and `Throw` is
//! simply a no-op case in the statement match.

use crate::ast::{Expr, MatchClause, Statement, StatementLoc};
use crate::config::{FieldMetadata, ImplicitParams};
use crate::contribution::Pseudofield;
use crate::error::AnalysisError;
use crate::eval::{bind_pattern, evaluate};
use crate::expr_type::ExpressionType;
use crate::intern::{Interner, Symbol};
use crate::normalize::{normalize, substitute, SubstTarget};
use crate::pcm::PcmRegistry;
use crate::summary::{ComponentOperation, ComponentSummary, Environment, EnvironmentSignature};

pub struct StatementCtx<'a> {
    pub registry: &'a PcmRegistry,
    pub interner: &'a Interner,
    pub field_meta: &'a FieldMetadata,
    pub implicit: &'a ImplicitParams,
}

/// Analyzes a statement block, mutating `summary` in place (see the module
/// doc comment for why it is a single running accumulator rather than one
/// reset per branch) and returning the environment in effect after the
/// block.
pub fn analyze_block(
    env: &Environment,
    fp_count: &mut u32,
    stmts: &[StatementLoc],
    ctx: &StatementCtx,
    summary: &mut ComponentSummary,
) -> Result<Environment, AnalysisError> {
    let mut env = env.clone();
    for stmt in stmts {
        env = analyze_statement(&env, fp_count, stmt, ctx, summary)?;
    }
    Ok(env)
}

fn analyze_statement(
    env: &Environment,
    fp_count: &mut u32,
    stmt: &StatementLoc,
    ctx: &StatementCtx,
    summary: &mut ComponentSummary,
) -> Result<Environment, AnalysisError> {
    match &stmt.stmt {
        Statement::Load { dest, field } => {
            let pf = Pseudofield::scalar(field.name);
            Ok(read_field(env, fp_count, dest.name, pf, stmt, summary))
        }
        Statement::Store { field, value } => {
            let et = evaluate(env, fp_count, ctx.registry, ctx.interner, value)?;
            summary.insert(ComponentOperation::Write(Pseudofield::scalar(field.name), et));
            Ok(env.clone())
        }
        Statement::MapGet { dest, map, keys } => {
            if !keys_are_summarisable(env, ctx, map.name, keys) {
                summary.insert(not_summarisable(stmt, "map-get keys are not all component parameters"));
                return Ok(env.bind_shadow_aware(dest.name, ExpressionType::Unknown));
            }
            let pf = Pseudofield::mapped(map.name, keys.iter().map(|k| k.name).collect());
            Ok(read_field(env, fp_count, dest.name, pf, stmt, summary))
        }
        Statement::MapUpdate { map, keys, value } => {
            if !keys_are_summarisable(env, ctx, map.name, keys) {
                summary.insert(not_summarisable(stmt, "map-update keys are not all component parameters"));
                return Ok(env.clone());
            }
            let pf = Pseudofield::mapped(map.name, keys.iter().map(|k| k.name).collect());
            let et = match value {
                Some(v) => evaluate(env, fp_count, ctx.registry, ctx.interner, v)?,
                None => ExpressionType::nothing(),
            };
            summary.insert(ComponentOperation::Write(pf, et));
            Ok(env.clone())
        }
        Statement::AcceptPayment => {
            summary.insert(ComponentOperation::AcceptMoney);
            Ok(env.clone())
        }
        Statement::SendMsgs(expr) => {
            let et = evaluate(env, fp_count, ctx.registry, ctx.interner, expr)?;
            summary.insert(ComponentOperation::SendMessages(et));
            Ok(env.clone())
        }
        Statement::CreateEvent(expr) => {
            let et = evaluate(env, fp_count, ctx.registry, ctx.interner, expr)?;
            summary.insert(ComponentOperation::EmitEvent(et));
            Ok(env.clone())
        }
        Statement::ReadFromBlockchain { dest, .. } => Ok(env.bind_shadow_aware(dest.name, ExpressionType::nothing())),
        Statement::Bind { dest, expr } => {
            let et = evaluate(env, fp_count, ctx.registry, ctx.interner, expr)?;
            Ok(env.bind_shadow_aware(dest.name, et))
        }
        Statement::Match { scrutinee, clauses } => {
            analyze_match_stmt(env, fp_count, *scrutinee, clauses, stmt, ctx, summary)
        }
        Statement::CallProc { proc, args } => analyze_call_proc(env, fp_count, proc.name, args, stmt, ctx, summary),
        Statement::Iterate { .. } => {
            summary.insert(not_summarisable(stmt, "iteration is not summarisable"));
            Ok(env.clone())
        }
        Statement::Throw(_) => Ok(env.clone()),
    }
}

fn not_summarisable(stmt: &StatementLoc, reason: &str) -> ComponentOperation {
    ComponentOperation::AlwaysExclusive { at: Some(stmt.span), reason: reason.to_string() }
}

fn keys_are_summarisable(env: &Environment, ctx: &StatementCtx, map: Symbol, keys: &[crate::ast::Identifier]) -> bool {
    keys.len() as u32 == ctx.field_meta.depth_of(map)
        && keys.iter().all(|k| env.is_unshadowed_component_parameter(k.name))
}

/// Shared Load/MapGet logic: a read after a prior write to the same
/// pseudofield (anywhere in the summary accumulated so far) is flagged
/// `AlwaysExclusive` instead of `Read`.
fn read_field(
    env: &Environment,
    _fp_count: &mut u32,
    dest: Symbol,
    pf: Pseudofield,
    stmt: &StatementLoc,
    summary: &mut ComponentSummary,
) -> Environment {
    let written_already = summary
        .iter()
        .any(|op| matches!(op, ComponentOperation::Write(wpf, _) if *wpf == pf));
    if written_already {
        summary.insert(not_summarisable(stmt, "read of a field already written earlier in this component"));
        env.bind_shadow_aware(dest, ExpressionType::Unknown)
    } else {
        summary.insert(ComponentOperation::Read(pf.clone()));
        env.bind_shadow_aware(dest, ExpressionType::Val(crate::contribution::KnownContribution::single(
            crate::contribution::ContributionSource::Pseudofield(pf),
            crate::contribution::Cardinality::Linear,
        )))
    }
}

fn analyze_match_stmt(
    env: &Environment,
    fp_count: &mut u32,
    scrutinee: crate::ast::Identifier,
    clauses: &[MatchClause<Vec<StatementLoc>>],
    stmt: &StatementLoc,
    ctx: &StatementCtx,
    summary: &mut ComponentSummary,
) -> Result<Environment, AnalysisError> {
    let scrutinee_et = env
        .expr_type(scrutinee.name)
        .cloned()
        .ok_or_else(|| AnalysisError::unbound_identifier(scrutinee))?;

    let spurious = ctx.registry.modules().any(|m| m.is_spurious_conditional_stmt(&scrutinee_et, clauses));

    if spurious {
        let Some(clause) = clauses.iter().find(|c| matches!(c.pattern, crate::ast::Pattern::Some(_))) else {
            return Ok(env.clone());
        };
        let clause_env = bind_pattern(env, &clause.pattern, &scrutinee_et);
        return analyze_block(&clause_env, fp_count, &clause.body, ctx, summary);
    }

    let cond_et = normalize(&ExpressionType::Op(
        crate::contribution::ContributionOperator::Conditional,
        Box::new(scrutinee_et.clone()),
    ));
    if cond_et.is_unknown() {
        summary.insert(not_summarisable(stmt, "match condition is not summarisable"));
    } else {
        summary.insert(ComponentOperation::ConditionOn(cond_et));
    }

    let mut result_env = env.clone();
    for clause in clauses {
        let clause_env = bind_pattern(env, &clause.pattern, &scrutinee_et);
        result_env = analyze_block(&clause_env, fp_count, &clause.body, ctx, summary)?;
    }
    Ok(result_env)
}

// ---------------------------------------------------------------------
// §4.5.1 Procedure-call summary translation
// ---------------------------------------------------------------------

fn analyze_call_proc(
    env: &Environment,
    fp_count: &mut u32,
    proc: Symbol,
    args: &[crate::ast::ExprLoc],
    stmt: &StatementLoc,
    ctx: &StatementCtx,
    summary: &mut ComponentSummary,
) -> Result<Environment, AnalysisError> {
    let Some((callee_params, callee_summary)) = env.component_signature(proc) else {
        return Err(AnalysisError::unknown_procedure(stmt.span));
    };
    let callee_params = callee_params.to_vec();
    let callee_summary = callee_summary.clone();

    let mut full_params = ctx.implicit.component_params.clone();
    full_params.extend(callee_params);
    let mut full_args = ctx.implicit.implicit_args();
    full_args.extend(args.iter().cloned());

    let callee_keys = collect_map_keys(&callee_summary);
    for key in &callee_keys {
        let Some(pos) = full_params.iter().position(|p| p == key) else {
            summary.insert(not_summarisable(stmt, "callee uses a map key that is not one of its own parameters"));
            return Ok(env.clone());
        };
        let Some(actual) = full_args.get(pos) else {
            summary.insert(not_summarisable(stmt, "call is missing an argument the callee uses as a map key"));
            return Ok(env.clone());
        };
        let Expr::Var(actual_id) = &actual.expr else {
            summary.insert(not_summarisable(stmt, "call argument corresponding to a callee map key is not a variable"));
            return Ok(env.clone());
        };
        if !env.is_unshadowed_component_parameter(actual_id.name) {
            summary.insert(not_summarisable(stmt, "call argument corresponding to a callee map key is not itself a component parameter"));
            return Ok(env.clone());
        }
    }

    let arg_ets: Vec<ExpressionType> = full_args
        .iter()
        .map(|a| evaluate(env, fp_count, ctx.registry, ctx.interner, a))
        .collect::<Result<_, _>>()?;
    let arg_names: Vec<Option<Symbol>> = full_args
        .iter()
        .map(|a| if let Expr::Var(id) = &a.expr { Some(id.name) } else { None })
        .collect();

    for op in callee_summary.iter() {
        summary.insert(translate_operation(op, &full_params, &arg_ets, &arg_names));
    }
    Ok(env.clone())
}

fn collect_map_keys(summary: &ComponentSummary) -> Vec<Symbol> {
    let mut keys = Vec::new();
    let mut note = |pf: &Pseudofield, keys: &mut Vec<Symbol>| {
        if let Some(ks) = &pf.keys {
            for k in ks {
                if !keys.contains(k) {
                    keys.push(*k);
                }
            }
        }
    };
    for op in summary.iter() {
        match op {
            ComponentOperation::Read(pf) => note(pf, &mut keys),
            ComponentOperation::Write(pf, et) => {
                note(pf, &mut keys);
                for pf in embedded_pseudofields(et) {
                    note(&pf, &mut keys);
                }
            }
            ComponentOperation::ConditionOn(et) | ComponentOperation::EmitEvent(et) | ComponentOperation::SendMessages(et) => {
                for pf in embedded_pseudofields(et) {
                    note(&pf, &mut keys);
                }
            }
            ComponentOperation::AcceptMoney | ComponentOperation::AlwaysExclusive { .. } => {}
        }
    }
    keys
}

fn embedded_pseudofields(et: &ExpressionType) -> Vec<Pseudofield> {
    match et {
        ExpressionType::Val(kc) => kc
            .contributions
            .sources()
            .filter_map(|s| match s {
                crate::contribution::ContributionSource::Pseudofield(pf) => Some(pf.clone()),
                _ => None,
            })
            .collect(),
        ExpressionType::CompositeVal { full, special } => {
            let mut v = embedded_pseudofields(full);
            v.extend(embedded_pseudofields(special));
            v
        }
        _ => Vec::new(),
    }
}

fn remap_key(key: Symbol, params: &[Symbol], arg_names: &[Option<Symbol>]) -> Symbol {
    let pos = params.iter().position(|p| *p == key).expect("guarded: callee map keys are always callee parameters");
    arg_names[pos].expect("guarded: the corresponding argument is always a variable")
}

fn rewrite_pseudofield(pf: &Pseudofield, params: &[Symbol], arg_names: &[Option<Symbol>]) -> Pseudofield {
    let keys = pf.keys.as_ref().map(|ks| ks.iter().map(|k| remap_key(*k, params, arg_names)).collect());
    Pseudofield { field: pf.field, keys }
}

fn substitute_proc_params(et: &ExpressionType, arg_ets: &[ExpressionType]) -> ExpressionType {
    let mut current = et.clone();
    for (i, arg_et) in arg_ets.iter().enumerate() {
        current = normalize(&substitute(&current, SubstTarget::Proc(i as u32), arg_et.clone()));
    }
    current
}

fn remap_residual_keys(et: &ExpressionType, params: &[Symbol], arg_names: &[Option<Symbol>]) -> ExpressionType {
    match et {
        ExpressionType::Val(kc) => {
            let mut contributions = crate::contribution::Contributions::default();
            for (src, summary) in kc.contributions.iter() {
                let new_src = match src {
                    crate::contribution::ContributionSource::Pseudofield(pf) => {
                        crate::contribution::ContributionSource::Pseudofield(rewrite_pseudofield(pf, params, arg_names))
                    }
                    other => other.clone(),
                };
                contributions.insert_or_merge(new_src, summary.clone(), crate::contribution::combine_par);
            }
            ExpressionType::Val(crate::contribution::KnownContribution { precision: kc.precision, contributions })
        }
        ExpressionType::CompositeVal { full, special } => ExpressionType::CompositeVal {
            full: Box::new(remap_residual_keys(full, params, arg_names)),
            special: Box::new(remap_residual_keys(special, params, arg_names)),
        },
        other => other.clone(),
    }
}

fn translate_et(et: &ExpressionType, params: &[Symbol], arg_ets: &[ExpressionType], arg_names: &[Option<Symbol>]) -> ExpressionType {
    remap_residual_keys(&substitute_proc_params(et, arg_ets), params, arg_names)
}

fn translate_operation(
    op: &ComponentOperation,
    params: &[Symbol],
    arg_ets: &[ExpressionType],
    arg_names: &[Option<Symbol>],
) -> ComponentOperation {
    match op {
        ComponentOperation::Read(pf) => ComponentOperation::Read(rewrite_pseudofield(pf, params, arg_names)),
        ComponentOperation::Write(pf, et) => {
            ComponentOperation::Write(rewrite_pseudofield(pf, params, arg_names), translate_et(et, params, arg_ets, arg_names))
        }
        ComponentOperation::AcceptMoney => ComponentOperation::AcceptMoney,
        ComponentOperation::ConditionOn(et) => ComponentOperation::ConditionOn(translate_et(et, params, arg_ets, arg_names)),
        ComponentOperation::EmitEvent(et) => ComponentOperation::EmitEvent(translate_et(et, params, arg_ets, arg_names)),
        ComponentOperation::SendMessages(et) => ComponentOperation::SendMessages(translate_et(et, params, arg_ets, arg_names)),
        ComponentOperation::AlwaysExclusive { at, reason } => {
            ComponentOperation::AlwaysExclusive { at: *at, reason: reason.clone() }
        }
    }
}
