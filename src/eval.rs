//! The symbolic expression evaluator (§4.4): walks an [`ExprLoc`] in an
//! [`Environment`] and produces a normalized [`ExpressionType`].
//!
//! Every recursive call normalizes its result before returning rather than
//! normalizing only at the two call sites `spec.md` calls out explicitly
//! (`Let`'s bound expression, `Bind`'s statement expression). Normalization
//! is idempotent and a congruence over composition (folding sub-results
//! then combining them agrees with combining then folding), so eagerly
//! normalizing everywhere is observationally identical to the minimal
//! placement and considerably simpler to get right — see `DESIGN.md`.

use crate::ast::{Expr, ExprLoc, MatchClause, MessageField, Pattern};
use crate::contribution::{Cardinality, ContributionOperator, ContributionSource, Contributions, KnownContribution, Precision};
use crate::error::AnalysisError;
use crate::expr_type::{ExpressionType, FunctionDef, FunctionDesc};
use crate::intern::Interner;
use crate::normalize::normalize;
use crate::pcm::{PcmRegistry, SpuriousExprMatch};
use crate::summary::Environment;

/// Evaluates `expr` in `env`, threading the running de Bruijn level counter
/// `fp_count` (incremented once per `Fun` node encountered) and returning a
/// fully normalized expression-type.
pub fn evaluate(
    env: &Environment,
    fp_count: &mut u32,
    registry: &PcmRegistry,
    interner: &Interner,
    expr: &ExprLoc,
) -> Result<ExpressionType, AnalysisError> {
    let raw = eval_inner(env, fp_count, registry, interner, expr)?;
    Ok(normalize(&raw))
}

fn eval_inner(
    env: &Environment,
    fp_count: &mut u32,
    registry: &PcmRegistry,
    interner: &Interner,
    expr: &ExprLoc,
) -> Result<ExpressionType, AnalysisError> {
    match &expr.expr {
        Expr::Literal(lit) => Ok(literal_expression_type(lit)),
        Expr::Var(id) => env
            .expr_type(id.name)
            .cloned()
            .ok_or_else(|| AnalysisError::unbound_identifier(*id)),
        Expr::Builtin(builtin, args) => {
            let arg_ets = args
                .iter()
                .map(|a| evaluate(env, fp_count, registry, interner, a))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ExpressionType::Op(
                ContributionOperator::BuiltinOp(builtin.name),
                Box::new(ExpressionType::ComposeSequence(arg_ets)),
            ))
        }
        Expr::Constr { args, .. } => {
            let arg_ets = args
                .iter()
                .map(|a| evaluate(env, fp_count, registry, interner, a))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ExpressionType::ComposeSequence(arg_ets))
        }
        Expr::Let { name, rhs, body } => {
            let rhs_et = evaluate(env, fp_count, registry, interner, rhs)?;
            let inner_env = env.bind_shadow_aware(name.name, rhs_et);
            evaluate(&inner_env, fp_count, registry, interner, body)
        }
        Expr::TFun(inner) | Expr::TApp(inner) => evaluate(env, fp_count, registry, interner, inner),
        Expr::Fun { param, param_is_function_type, body } => {
            let level = *fp_count;
            *fp_count += 1;
            let param_et = if *param_is_function_type {
                ExpressionType::Fun(FunctionDesc { levels: vec![level], def: FunctionDef::FormalParameter(level) })
            } else {
                ExpressionType::Val(KnownContribution::single(
                    ContributionSource::FormalParameter(level),
                    Cardinality::Linear,
                ))
            };
            let inner_env = env.bind_shadow_aware(param.name, param_et);
            let body_et = evaluate(&inner_env, fp_count, registry, interner, body)?;
            Ok(ExpressionType::Fun(FunctionDesc {
                levels: vec![level],
                def: FunctionDef::Body(Box::new(body_et)),
            }))
        }
        Expr::App { func, args } => {
            if args.is_empty() {
                return Err(AnalysisError::empty_application(expr.span));
            }
            let func_et = evaluate(env, fp_count, registry, interner, func)?;
            let arg_ets = args
                .iter()
                .map(|a| evaluate(env, fp_count, registry, interner, a))
                .collect::<Result<Vec<_>, _>>()?;
            let callee = match func_et {
                ExpressionType::Fun(desc) => desc,
                ExpressionType::Unknown => match ExpressionType::unknown_function(args.len() as u32) {
                    ExpressionType::Fun(desc) => desc,
                    _ => return Ok(ExpressionType::Unknown),
                },
                _ => return Err(AnalysisError::not_a_function(func.span)),
            };
            Ok(ExpressionType::App { callee, args: arg_ets })
        }
        Expr::Message(fields) => eval_message(env, fp_count, registry, interner, fields),
        Expr::Match { scrutinee, clauses } => eval_match_expr(env, fp_count, registry, interner, scrutinee, clauses),
        Expr::Fixpoint => Err(AnalysisError::unanalyzable_fixpoint(expr.span)),
    }
}

fn eval_message(
    env: &Environment,
    fp_count: &mut u32,
    registry: &PcmRegistry,
    interner: &Interner,
    fields: &[MessageField],
) -> Result<ExpressionType, AnalysisError> {
    let amount_sym = interner.get(crate::ast::AMOUNT_LABEL);
    let recipient_sym = interner.get(crate::ast::RECIPIENT_LABEL);

    let mut full_parts = Vec::with_capacity(fields.len());
    let mut special_parts = Vec::new();
    for field in fields {
        let value_et = evaluate(env, fp_count, registry, interner, &field.value)?;
        full_parts.push(value_et.clone());
        if Some(field.label) == amount_sym {
            special_parts.push(amount_special_part(env, registry, &field.value));
        } else if Some(field.label) == recipient_sym {
            special_parts.push(value_et);
        }
    }
    let full = ExpressionType::ComposeParallel { cond: Box::new(ExpressionType::nothing()), clauses: full_parts };
    let special = if special_parts.is_empty() {
        ExpressionType::nothing()
    } else {
        ExpressionType::ComposeParallel { cond: Box::new(ExpressionType::nothing()), clauses: special_parts }
    };
    Ok(ExpressionType::CompositeVal { full: Box::new(full), special: Box::new(special) })
}

fn amount_special_part(env: &Environment, registry: &PcmRegistry, value_expr: &ExprLoc) -> ExpressionType {
    let is_zero_literal = matches!(&value_expr.expr, Expr::Literal(lit) if lit.is_zero());
    let is_pcm_unit = registry.modules().any(|m| m.is_unit(env, value_expr));
    if is_zero_literal || is_pcm_unit {
        ExpressionType::nothing()
    } else {
        ExpressionType::Val(KnownContribution { precision: Precision::SubsetOf, contributions: Contributions::default() })
    }
}

fn eval_match_expr(
    env: &Environment,
    fp_count: &mut u32,
    registry: &PcmRegistry,
    interner: &Interner,
    scrutinee: &ExprLoc,
    clauses: &[MatchClause<ExprLoc>],
) -> Result<ExpressionType, AnalysisError> {
    let scrutinee_et = evaluate(env, fp_count, registry, interner, scrutinee)?;
    let spurious = registry
        .modules()
        .find_map(|m| m.is_spurious_conditional_expr(env, scrutinee, clauses));

    if matches!(spurious, Some(SpuriousExprMatch::UnitForm)) {
        // `Some x => x | None => <unit>` is the identity match: its value is
        // exactly the `Some` clause's own expression-type, never a
        // composition with the unit branch's (nonexistent) contribution.
        let some_clause = clauses
            .iter()
            .find(|c| matches!(c.pattern, Pattern::Some(_)))
            .expect("UnitForm is only recognized when a Some clause is present");
        let clause_env = bind_pattern(env, &some_clause.pattern, &scrutinee_et);
        return evaluate(&clause_env, fp_count, registry, interner, &some_clause.body);
    }

    let cond = if spurious.is_some() {
        ExpressionType::nothing()
    } else {
        ExpressionType::Op(ContributionOperator::Conditional, Box::new(scrutinee_et.clone()))
    };

    let mut clause_ets = Vec::with_capacity(clauses.len());
    for clause in clauses {
        let clause_env = bind_pattern(env, &clause.pattern, &scrutinee_et);
        clause_ets.push(evaluate(&clause_env, fp_count, registry, interner, &clause.body)?);
    }
    Ok(ExpressionType::ComposeParallel { cond: Box::new(cond), clauses: clause_ets })
}

/// Binds every pattern binder to `et` — the scrutinee's whole value flows
/// into each binder, since this analysis does not track per-constructor
/// field decomposition.
pub fn bind_pattern(env: &Environment, pattern: &Pattern, et: &ExpressionType) -> Environment {
    match pattern {
        Pattern::Some(id) => env.bind_shadow_aware(id.name, et.clone()),
        Pattern::Constructor { binders, .. } => {
            binders.iter().fold(env.clone(), |e, b| e.bind_shadow_aware(b.name, et.clone()))
        }
        Pattern::None | Pattern::Wildcard | Pattern::Literal(_) => env.clone(),
    }
}

fn literal_expression_type(lit: &crate::ast::Literal) -> ExpressionType {
    ExpressionType::Val(KnownContribution::single(ContributionSource::ConstantLiteral(lit.clone()), Cardinality::Linear))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Builtin, Expr, Identifier, MatchClause, Pattern};
    use crate::intern::Interner;
    use crate::pcm::PcmRegistry;
    use crate::source::SourceSpan;

    fn v(interner: &mut Interner, name: &str) -> ExprLoc {
        ExprLoc::new(Expr::Var(Identifier { name: interner.intern(name), span: SourceSpan::default() }), SourceSpan::default())
    }

    fn id(interner: &mut Interner, name: &str) -> Identifier {
        Identifier { name: interner.intern(name), span: SourceSpan::default() }
    }

    /// Invariant 5: a PCM-spurious option match's expression-type equals the
    /// expression-type of its non-unit (`Some`) branch, since `eval_match_expr`
    /// passes `ExpressionType::nothing()` as the match's condition whenever a
    /// PCM recognizes the op-applying spurious form, and `add_conditional`
    /// with a `nothing` condition is the identity.
    #[test]
    fn spurious_option_match_equals_its_non_unit_branch() {
        let mut interner = Interner::new();
        let mut registry = PcmRegistry::new();
        registry.register(Box::new(crate::pcm::IntegerAddition::new(&mut interner)));

        let binder = id(&mut interner, "y");
        let scrutinee = v(&mut interner, "opt");
        let some_body = ExprLoc::new(
            Expr::Builtin(Builtin { name: interner.get("add").unwrap(), arity: 2 }, vec![v(&mut interner, "y"), v(&mut interner, "free")]),
            SourceSpan::default(),
        );
        let clauses = vec![
            MatchClause { pattern: Pattern::Some(binder), body: some_body.clone() },
            MatchClause { pattern: Pattern::None, body: v(&mut interner, "free") },
        ];

        let free_et = ExpressionType::Val(KnownContribution::single(
            ContributionSource::ContractParameter(interner.get("free").unwrap()),
            Cardinality::Linear,
        ));
        let opt_et = ExpressionType::Val(KnownContribution::single(
            ContributionSource::ContractParameter(interner.intern("opt_marker")),
            Cardinality::Linear,
        ));
        let env = Environment::empty()
            .bind_shadow_aware(interner.get("free").unwrap(), free_et)
            .bind_shadow_aware(interner.get("opt").unwrap(), opt_et.clone());

        let mut fp_count = 0;
        let match_et = evaluate(
            &env,
            &mut fp_count,
            &registry,
            &interner,
            &ExprLoc::new(Expr::Match { scrutinee: Box::new(scrutinee), clauses }, SourceSpan::default()),
        )
        .unwrap();

        // The `Some` branch's own expression-type, evaluated with `y` bound
        // exactly the way `bind_pattern` binds it inside the match: to the
        // scrutinee's own (here, `opt`'s) expression-type.
        let branch_env = env.bind_shadow_aware(binder.name, opt_et);
        let mut fp_count2 = 0;
        let branch_et = evaluate(&branch_env, &mut fp_count2, &registry, &interner, &some_body).unwrap();

        assert_eq!(match_et, branch_et);
    }

    /// Invariant 5, unit-absorbing form: `Some x => x | None => 0` must equal
    /// exactly the scrutinee's own expression-type, with no trace of the
    /// `None` clause's zero-literal contribution.
    #[test]
    fn spurious_option_match_unit_form_drops_the_none_literal() {
        let mut interner = Interner::new();
        let mut registry = PcmRegistry::new();
        registry.register(Box::new(crate::pcm::IntegerAddition::new(&mut interner)));

        let binder = id(&mut interner, "y");
        let scrutinee = v(&mut interner, "opt");
        let clauses = vec![
            MatchClause { pattern: Pattern::Some(binder), body: v(&mut interner, "y") },
            MatchClause {
                pattern: Pattern::None,
                body: ExprLoc::new(
                    Expr::Literal(crate::ast::Literal::zero(256, false)),
                    SourceSpan::default(),
                ),
            },
        ];

        let opt_et = ExpressionType::Val(KnownContribution::single(
            ContributionSource::ContractParameter(interner.intern("opt_marker")),
            Cardinality::Linear,
        ));
        let env = Environment::empty().bind_shadow_aware(interner.get("opt").unwrap(), opt_et.clone());

        let mut fp_count = 0;
        let match_et = evaluate(
            &env,
            &mut fp_count,
            &registry,
            &interner,
            &ExprLoc::new(Expr::Match { scrutinee: Box::new(scrutinee), clauses }, SourceSpan::default()),
        )
        .unwrap();

        assert_eq!(match_et, opt_et);
    }
}
