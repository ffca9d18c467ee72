//! The constraint synthesizer (§4.6): turns a finished [`ComponentSummary`]
//! into the set of [`ShardingConstraint`]s a runtime scheduler needs.

use crate::config::ImplicitParams;
use crate::contribution::{Cardinality, ContributionSource, Precision, Pseudofield};
use crate::expr_type::ExpressionType;
use crate::pcm::PcmRegistry;
use crate::summary::{ComponentOperation, ComponentSummary};

#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ShardingConstraint {
    MustOwn(Pseudofield),
    MustAcceptWeakRead(Pseudofield),
    MustHavePCM(Pseudofield, String),
    AddrMustBeNonContract(u32),
    MustNotHaveDuplicates(Vec<u32>),
    SenderShard,
    Unsat,
}

/// Synthesizes the sharding constraints for one component's finished
/// summary.
#[must_use]
pub fn synthesize(summary: &ComponentSummary, registry: &PcmRegistry, implicit: &ImplicitParams) -> Vec<ShardingConstraint> {
    if summary.contains_always_exclusive() {
        return vec![ShardingConstraint::Unsat];
    }

    let sends: Vec<&ExpressionType> = summary
        .iter()
        .filter_map(|op| match op {
            ComponentOperation::SendMessages(et) => Some(et),
            _ => None,
        })
        .collect();

    for et in &sends {
        if matches!(classify_send(et), SendShape::UnknownShape | SendShape::NonParamRecipient) {
            return vec![ShardingConstraint::Unsat];
        }
    }

    let mut constraints: Vec<ShardingConstraint> = Vec::new();
    let mut push = |c: ShardingConstraint, constraints: &mut Vec<ShardingConstraint>| {
        if !constraints.contains(&c) {
            constraints.push(c);
        }
    };

    if summary.iter().any(|op| matches!(op, ComponentOperation::AcceptMoney)) {
        push(ShardingConstraint::SenderShard, &mut constraints);
    }

    if sends.iter().any(|et| send_may_carry_money(et)) {
        push(ShardingConstraint::MustOwn(implicit.balance_pseudofield()), &mut constraints);
    }
    for et in &sends {
        for idx in recipient_proc_params(et) {
            push(ShardingConstraint::AddrMustBeNonContract(idx), &mut constraints);
        }
    }

    let commutative_writes: Vec<&ComponentOperation> =
        summary.iter().filter(|op| commutative_pcm_id(op, registry).is_some()).collect();

    for op in summary.iter() {
        match op {
            ComponentOperation::Read(pf) => {
                if !is_spurious_read(pf, summary, &commutative_writes) {
                    push(ShardingConstraint::MustOwn(pf.clone()), &mut constraints);
                }
            }
            ComponentOperation::Write(pf, et) => {
                if commutative_writes.contains(&op) {
                    let pcm_id = commutative_pcm_id(op, registry).expect("just filtered by this predicate");
                    push(ShardingConstraint::MustHavePCM(pf.clone(), pcm_id), &mut constraints);
                } else {
                    push(ShardingConstraint::MustOwn(pf.clone()), &mut constraints);
                }
                for src in pseudofield_sources(et) {
                    push(ShardingConstraint::MustOwn(src), &mut constraints);
                }
            }
            ComponentOperation::ConditionOn(et) => {
                for src in pseudofield_sources(et) {
                    push(ShardingConstraint::MustOwn(src), &mut constraints);
                }
            }
            ComponentOperation::EmitEvent(_) | ComponentOperation::SendMessages(_) | ComponentOperation::AcceptMoney => {}
            ComponentOperation::AlwaysExclusive { .. } => unreachable!("handled by the early return above"),
        }
    }

    constraints
}

enum SendShape {
    Ok,
    UnknownShape,
    NonParamRecipient,
}

fn special_part(et: &ExpressionType) -> Option<&ExpressionType> {
    match et {
        ExpressionType::CompositeVal { special, .. } => Some(special),
        _ => None,
    }
}

fn classify_send(et: &ExpressionType) -> SendShape {
    let Some(special) = special_part(et) else { return SendShape::UnknownShape };
    let ExpressionType::Val(kc) = special else { return SendShape::UnknownShape };
    if kc.contributions.sources().any(|s| !matches!(s, ContributionSource::ProcParameter(_))) {
        return SendShape::NonParamRecipient;
    }
    SendShape::Ok
}

fn send_may_carry_money(et: &ExpressionType) -> bool {
    match special_part(et) {
        Some(ExpressionType::Val(kc)) => kc.precision == Precision::SubsetOf,
        _ => false,
    }
}

fn recipient_proc_params(et: &ExpressionType) -> Vec<u32> {
    match special_part(et) {
        Some(ExpressionType::Val(kc)) => kc
            .contributions
            .sources()
            .filter_map(|s| match s {
                ContributionSource::ProcParameter(i) => Some(*i),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn pseudofield_sources(et: &ExpressionType) -> Vec<Pseudofield> {
    match et {
        ExpressionType::Val(kc) => kc
            .contributions
            .sources()
            .filter_map(|s| match s {
                ContributionSource::Pseudofield(pf) => Some(pf.clone()),
                _ => None,
            })
            .collect(),
        ExpressionType::CompositeVal { full, special } => {
            let mut v = pseudofield_sources(full);
            v.extend(pseudofield_sources(special));
            v
        }
        _ => Vec::new(),
    }
}

/// If `op` is a `Write` whose pseudofield-restricted contributions are
/// exactly `{ pf -> (Linear, {op}) }` for some registered PCM's operator,
/// returns that PCM's identifier.
fn commutative_pcm_id(op: &ComponentOperation, registry: &PcmRegistry) -> Option<String> {
    let ComponentOperation::Write(pf, ExpressionType::Val(kc)) = op else { return None };
    if kc.precision != Precision::Exactly {
        return None;
    }
    let mut pf_sources = kc.contributions.iter().filter(|(s, _)| matches!(s, ContributionSource::Pseudofield(_)));
    let (only_source, summary) = pf_sources.next()?;
    if pf_sources.next().is_some() {
        return None;
    }
    if only_source != &ContributionSource::Pseudofield(pf.clone()) {
        return None;
    }
    if summary.cardinality != Cardinality::Linear || summary.operators.len() != 1 {
        return None;
    }
    let op_kind = summary.operators.iter().next().expect("len checked above");
    registry.modules().find(|m| m.is_op(op_kind)).map(|m| m.identifier().to_string())
}

/// A `Read(pf)` is spurious — and so does not itself require `MustOwn` — if
/// restricting the summary to its non-commutative-write operations shows no
/// other operation's expression-type references `pf`, and none of those
/// expression-types is `Unknown`.
fn is_spurious_read(pf: &Pseudofield, summary: &ComponentSummary, commutative_writes: &[&ComponentOperation]) -> bool {
    for op in summary.iter() {
        if commutative_writes.contains(&op) {
            continue;
        }
        let et = match op {
            ComponentOperation::Write(_, et)
            | ComponentOperation::ConditionOn(et)
            | ComponentOperation::EmitEvent(et)
            | ComponentOperation::SendMessages(et) => et,
            _ => continue,
        };
        if et.is_unknown() || pseudofield_sources(et).contains(pf) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contribution::ContributionOperator;
    use crate::intern::Interner;
    use crate::pcm::IntegerAddition;
    use crate::source::SourceSpan;

    fn implicit(interner: &mut Interner) -> ImplicitParams {
        ImplicitParams { component_params: vec![interner.intern("_sender")], balance_field: interner.intern("balance") }
    }

    /// Invariant 8: any summary containing an `AlwaysExclusive`, no matter
    /// what else it contains, synthesizes to exactly `{Unsat}`.
    #[test]
    fn always_exclusive_closes_over_every_other_operation() {
        let mut interner = Interner::new();
        let implicit = implicit(&mut interner);
        let registry = PcmRegistry::new();

        let mut summary = ComponentSummary::new();
        summary.insert(ComponentOperation::AcceptMoney);
        summary.insert(ComponentOperation::Read(Pseudofield::scalar(interner.intern("counter"))));
        summary.insert(ComponentOperation::AlwaysExclusive { at: Some(SourceSpan::default()), reason: "iteration is not summarisable".to_string() });

        assert_eq!(synthesize(&summary, &registry, &implicit), vec![ShardingConstraint::Unsat]);
    }

    /// A write whose only pseudofield contribution is a single registered
    /// PCM operator at `Linear` cardinality is commutative: it requires at
    /// most `MustHavePCM`, never `MustOwn`.
    #[test]
    fn commutative_write_never_requires_ownership() {
        let mut interner = Interner::new();
        let implicit = implicit(&mut interner);
        let mut registry = PcmRegistry::new();
        registry.register(Box::new(IntegerAddition::new(&mut interner)));

        let counter = interner.intern("counter");
        let pf = Pseudofield::scalar(counter);
        let add = ContributionOperator::BuiltinOp(interner.get("add").unwrap());
        let et = ExpressionType::Val(crate::contribution::KnownContribution {
            precision: Precision::Exactly,
            contributions: crate::contribution::Contributions::single(
                ContributionSource::Pseudofield(pf.clone()),
                crate::contribution::ContributionSummary::with_operator(Cardinality::Linear, add),
            ),
        });

        let mut summary = ComponentSummary::new();
        summary.insert(ComponentOperation::Write(pf.clone(), et));
        let constraints = synthesize(&summary, &registry, &implicit);

        assert_eq!(constraints, vec![ShardingConstraint::MustHavePCM(pf, "integer_add".to_string())]);
    }

    /// A `Read(pf)` with no surviving non-commutative reference to `pf`
    /// anywhere else in the summary is spurious and drops out entirely.
    #[test]
    fn read_with_no_other_reference_is_spurious_and_needs_no_ownership() {
        let mut interner = Interner::new();
        let implicit = implicit(&mut interner);
        let registry = PcmRegistry::new();

        let counter = interner.intern("counter");
        let pf = Pseudofield::scalar(counter);

        let mut summary = ComponentSummary::new();
        summary.insert(ComponentOperation::Read(pf.clone()));
        let constraints = synthesize(&summary, &registry, &implicit);

        assert!(constraints.is_empty());
    }

    /// The same read is *not* spurious once some other non-commutative
    /// operation's expression-type references the same pseudofield.
    #[test]
    fn read_referenced_elsewhere_requires_ownership() {
        let mut interner = Interner::new();
        let implicit = implicit(&mut interner);
        let registry = PcmRegistry::new();

        let counter = interner.intern("counter");
        let pf = Pseudofield::scalar(counter);
        let referencing_et = ExpressionType::Val(crate::contribution::KnownContribution::single(
            ContributionSource::Pseudofield(pf.clone()),
            Cardinality::Linear,
        ));

        let mut summary = ComponentSummary::new();
        summary.insert(ComponentOperation::Read(pf.clone()));
        summary.insert(ComponentOperation::EmitEvent(referencing_et));
        let constraints = synthesize(&summary, &registry, &implicit);

        assert!(constraints.contains(&ShardingConstraint::MustOwn(pf)));
    }
}
