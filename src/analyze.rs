//! Top-level orchestration (§2): `analyze_module`, the single public entry
//! point tying the six pipeline stages together.

use crate::ast::{Component, ComponentKind, ExternalLibrary, LibraryEntry, Module, Param};
use crate::config::{FieldMetadata, ImplicitParams};
use crate::constraints::{self, ShardingConstraint};
use crate::contribution::{Cardinality, ContributionSource, KnownContribution};
use crate::error::AnalysisError;
use crate::eval::evaluate;
use crate::expr_type::ExpressionType;
use crate::intern::{Interner, Symbol};
use crate::pcm::PcmRegistry;
use crate::statements::{analyze_block, StatementCtx};
use crate::summary::{ComponentSummary, Environment, EnvironmentSignature};
use crate::tracer::AnalysisTracer;

/// The per-transition output of an `analyze_module` run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TransitionReport {
    pub name: String,
    pub summary: ComponentSummary,
    pub constraints: Vec<ShardingConstraint>,
}

/// Analyzes every transition in `module`, returning one [`TransitionReport`]
/// per transition in source order. Procedures are analyzed too (their
/// summaries are needed for `CallProc` translation) but do not themselves
/// produce a report.
pub fn analyze_module<Tr: AnalysisTracer>(
    module: &Module,
    implicit: &ImplicitParams,
    fields: &FieldMetadata,
    pcms: &PcmRegistry,
    interner: &Interner,
    tracer: &mut Tr,
) -> Result<Vec<TransitionReport>, AnalysisError> {
    tracer.on_module_entered(module.components.len());

    // Built-ins are resolved structurally through `Expr::Builtin` rather
    // than bound as named values, so folding them in is a no-op here — the
    // step is kept in the control flow for parity with the documented
    // pipeline order.
    let mut env = Environment::empty();

    for lib in topo_sort_libraries(&module.external_libraries, interner)? {
        env = bind_entries(&env, &lib.entries, pcms, interner)?;
    }
    env = bind_entries(&env, &module.library, pcms, interner)?;
    env = bind_params_as_contract(&env, &module.contract_params);

    let mut reports = Vec::new();
    for component in &module.components {
        let name = interner.resolve(component.name.name).to_string();
        tracer.on_component_entered(&name, component.kind);

        let comp_env = bind_component_env(&env, implicit, component);
        let mut summary = ComponentSummary::new();
        let mut fp_count = 0u32;
        let ctx = StatementCtx { registry: pcms, interner, field_meta: fields, implicit };
        analyze_block(&comp_env, &mut fp_count, &component.body, &ctx, &mut summary)?;

        tracer.on_component_exited(&name, &summary);

        let params: Vec<Symbol> = component.params.iter().map(|p| p.name.name).collect();
        env = env.bind(
            component.name.name,
            EnvironmentSignature::Component { params, summary: summary.clone(), kind: component.kind },
        );

        if component.kind == ComponentKind::Transition {
            let constraints = constraints::synthesize(&summary, pcms, implicit);
            for c in &constraints {
                tracer.on_constraint_emitted(&name, c);
            }
            reports.push(TransitionReport { name, summary, constraints });
        }
    }

    Ok(reports)
}

/// Orders `libraries` so that every library appears after everything it
/// `depends_on`. Returns `AnalysisError::UnresolvedLibrary` if a dependency
/// is missing or the dependency graph has a cycle.
fn topo_sort_libraries<'a>(
    libraries: &'a [ExternalLibrary],
    interner: &Interner,
) -> Result<Vec<&'a ExternalLibrary>, AnalysisError> {
    let mut ordered = Vec::with_capacity(libraries.len());
    let mut bound: Vec<Symbol> = Vec::new();
    let mut remaining: Vec<&ExternalLibrary> = libraries.iter().collect();

    while !remaining.is_empty() {
        let ready_idx = remaining.iter().position(|lib| lib.depends_on.iter().all(|dep| bound.contains(dep)));
        let Some(idx) = ready_idx else {
            let stuck = remaining[0];
            return Err(AnalysisError::unresolved_library(interner.resolve(stuck.name)));
        };
        let lib = remaining.remove(idx);
        bound.push(lib.name);
        ordered.push(lib);
    }
    Ok(ordered)
}

fn bind_entries(
    env: &Environment,
    entries: &[LibraryEntry],
    pcms: &PcmRegistry,
    interner: &Interner,
) -> Result<Environment, AnalysisError> {
    let mut env = env.clone();
    for entry in entries {
        match entry {
            LibraryEntry::Value { name, expr } => {
                let mut fp_count = 0u32;
                let et = evaluate(&env, &mut fp_count, pcms, interner, expr)?;
                env = env.bind_shadow_aware(name.name, et);
            }
            LibraryEntry::TypeDef { .. } => {}
        }
    }
    Ok(env)
}

fn contract_param_et(name: Symbol) -> ExpressionType {
    ExpressionType::Val(KnownContribution::single(ContributionSource::ContractParameter(name), Cardinality::Linear))
}

fn proc_param_et(index: u32) -> ExpressionType {
    ExpressionType::Val(KnownContribution::single(ContributionSource::ProcParameter(index), Cardinality::Linear))
}

/// Contract-construction parameters are bound by identity (`ContractParameter`)
/// since they are fixed once at deploy time, not per-call.
fn bind_params_as_contract(env: &Environment, params: &[Param]) -> Environment {
    params.iter().fold(env.clone(), |e, p| e.bind(p.name.name, EnvironmentSignature::component_parameter(contract_param_et(p.name.name))))
}

/// Binds a component's own environment: the implicit component parameters
/// prepended ahead of the component's declared parameters, each bound to a
/// `ProcParameter(i)` contribution at its positional index — this component
/// *is* "the enclosing procedure" while its own body is being analyzed, the
/// same positions `translate_operation` (§4.5.1) later substitutes when this
/// component is called from somewhere else. All are marked `ComponentParameter`
/// so map-key summarisability (§4.5) recognizes them.
fn bind_component_env(env: &Environment, implicit: &ImplicitParams, component: &Component) -> Environment {
    let implicit_count = implicit.component_params.len() as u32;
    let with_implicit = implicit.component_params.iter().enumerate().fold(env.clone(), |e, (i, &name)| {
        e.bind(name, EnvironmentSignature::component_parameter(proc_param_et(i as u32)))
    });
    component.params.iter().enumerate().fold(with_implicit, |e, (i, p)| {
        e.bind(p.name.name, EnvironmentSignature::component_parameter(proc_param_et(implicit_count + i as u32)))
    })
}
