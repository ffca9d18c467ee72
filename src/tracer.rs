//! Analysis tracing infrastructure.
//!
//! A trait-based tracer, parameterized into [`crate::analyze::analyze_module`]
//! as a type parameter so a [`NoopTracer`] run monomorphizes every hook away,
//! the same zero-cost shape `ouros::tracer::VmTracer` uses for the bytecode
//! VM.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (library default) |
//! | [`StderrTracer`] | Human-readable trace to stderr |
//! | [`RecordingTracer`] | Full event recording for post-mortem inspection |

use crate::ast::ComponentKind;
use crate::constraints::ShardingConstraint;
use crate::summary::ComponentSummary;

/// One recorded tracer event, captured by [`RecordingTracer`].
#[derive(Debug, Clone)]
pub enum TraceEvent {
    ModuleEntered { component_count: usize },
    ComponentEntered { name: String, kind: ComponentKind },
    ComponentExited { name: String, summary: ComponentSummary },
    ConstraintEmitted { component: String, constraint: ShardingConstraint },
}

/// Trait for observing an `analyze_module` run. All methods default to
/// no-ops; implementations override only the hooks they care about.
pub trait AnalysisTracer: std::fmt::Debug {
    #[inline(always)]
    fn on_module_entered(&mut self, _component_count: usize) {}

    #[inline(always)]
    fn on_component_entered(&mut self, _name: &str, _kind: ComponentKind) {}

    #[inline(always)]
    fn on_component_exited(&mut self, _name: &str, _summary: &ComponentSummary) {}

    #[inline(always)]
    fn on_constraint_emitted(&mut self, _component: &str, _constraint: &ShardingConstraint) {}
}

/// A tracer that does nothing; the library default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl AnalysisTracer for NoopTracer {}

/// Prints a human-readable trace of the analysis to stderr.
#[derive(Debug, Default)]
pub struct StderrTracer;

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl AnalysisTracer for StderrTracer {
    fn on_module_entered(&mut self, component_count: usize) {
        eprintln!("=== analyzing module ({component_count} components) ===");
    }

    fn on_component_entered(&mut self, name: &str, kind: ComponentKind) {
        eprintln!(">>> {kind} {name}");
    }

    fn on_component_exited(&mut self, name: &str, summary: &ComponentSummary) {
        eprintln!("<<< {name}  ({} operations)", summary.iter().count());
    }

    fn on_constraint_emitted(&mut self, component: &str, constraint: &ShardingConstraint) {
        eprintln!("    {component}: {constraint:?}");
    }
}

/// Records every event for later inspection, e.g. by test assertions.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}

impl AnalysisTracer for RecordingTracer {
    fn on_module_entered(&mut self, component_count: usize) {
        self.events.push(TraceEvent::ModuleEntered { component_count });
    }

    fn on_component_entered(&mut self, name: &str, kind: ComponentKind) {
        self.events.push(TraceEvent::ComponentEntered { name: name.to_string(), kind });
    }

    fn on_component_exited(&mut self, name: &str, summary: &ComponentSummary) {
        self.events.push(TraceEvent::ComponentExited { name: name.to_string(), summary: summary.clone() });
    }

    fn on_constraint_emitted(&mut self, component: &str, constraint: &ShardingConstraint) {
        self.events.push(TraceEvent::ConstraintEmitted {
            component: component.to_string(),
            constraint: constraint.clone(),
        });
    }
}
