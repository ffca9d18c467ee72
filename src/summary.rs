//! Component operations, component summaries, and the persistent analysis
//! environment (§3 Data Model, §5 Concurrency & Resource Model).
//!
//! The environment is purely functional and structurally shared: binding a
//! name returns a new `Environment` that shares the rest of its chain with
//! the one it was built from, the same `im`-style sharing the teacher gets
//! from its own state, just not via a mutable `Namespaces` table — this
//! engine's spec requires that a binding never mutates bindings visible
//! through an older handle to the same environment, so `Environment` is
//! deliberately its own small persistent structure (an `Rc`-backed chain)
//! rather than reusing `ouros::namespace::Namespaces`.

use crate::ast::ComponentKind;
use crate::expr_type::ExpressionType;
use crate::intern::Symbol;
use crate::source::SourceSpan;
use std::rc::Rc;

/// A single effect a component body can have, recorded in execution order
/// (deduplicated structurally, not by hash — summaries stay small).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ComponentOperation {
    Read(crate::contribution::Pseudofield),
    Write(crate::contribution::Pseudofield, ExpressionType),
    AcceptMoney,
    ConditionOn(ExpressionType),
    EmitEvent(ExpressionType),
    SendMessages(ExpressionType),
    /// A statement the analysis could not summarize precisely; forces the
    /// owning component to `Unsat` (§4.6).
    AlwaysExclusive { at: Option<SourceSpan>, reason: String },
}

/// The set of effects a component body has, in encounter order. Membership
/// is structural-equality based and insertion is idempotent, matching §3's
/// "order is not semantically significant but is kept for determinism".
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ComponentSummary(Vec<ComponentOperation>);

impl ComponentSummary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, op: ComponentOperation) {
        if !self.0.contains(&op) {
            self.0.push(op);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentOperation> {
        self.0.iter()
    }

    #[must_use]
    pub fn contains_always_exclusive(&self) -> bool {
        self.0.iter().any(|op| matches!(op, ComponentOperation::AlwaysExclusive { .. }))
    }

    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.0.iter().all(|op| other.0.contains(op))
    }
}

/// Whether an identifier binding shadows (or is) an unshadowed component
/// parameter — the summarisability test for map keys (§4.5) only accepts
/// `ComponentParameter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ShadowStatus {
    DoesNotShadow,
    ComponentParameter,
    ShadowsComponentParameter,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum EnvironmentSignature {
    Component { params: Vec<Symbol>, summary: ComponentSummary, kind: ComponentKind },
    Ident { shadow: ShadowStatus, pcm_membership: Vec<String>, expr_type: ExpressionType },
}

impl EnvironmentSignature {
    #[must_use]
    pub fn ident(expr_type: ExpressionType) -> Self {
        EnvironmentSignature::Ident { shadow: ShadowStatus::DoesNotShadow, pcm_membership: Vec::new(), expr_type }
    }

    #[must_use]
    pub fn component_parameter(expr_type: ExpressionType) -> Self {
        EnvironmentSignature::Ident {
            shadow: ShadowStatus::ComponentParameter,
            pcm_membership: Vec::new(),
            expr_type,
        }
    }

    #[must_use]
    pub fn with_pcm_membership(mut self, pcm_ids: Vec<String>) -> Self {
        if let EnvironmentSignature::Ident { pcm_membership, .. } = &mut self {
            *pcm_membership = pcm_ids;
        }
        self
    }
}

enum EnvNode {
    Empty,
    Bind { name: Symbol, sig: Rc<EnvironmentSignature>, parent: Rc<EnvNode> },
}

/// A persistent, structurally-shared binding environment. Cloning is O(1).
#[derive(Clone)]
pub struct Environment(Rc<EnvNode>);

impl Environment {
    #[must_use]
    pub fn empty() -> Self {
        Self(Rc::new(EnvNode::Empty))
    }

    /// Returns a new environment with `name` bound to `sig`, sharing the
    /// rest of the chain with `self`. Does not mutate `self`.
    #[must_use]
    pub fn bind(&self, name: Symbol, sig: EnvironmentSignature) -> Self {
        Self(Rc::new(EnvNode::Bind { name, sig: Rc::new(sig), parent: Rc::clone(&self.0) }))
    }

    /// Binds a name whose prior (possibly absent) status as an unshadowed
    /// component parameter determines the new binding's [`ShadowStatus`]:
    /// rebinding a component-parameter name shadows it.
    #[must_use]
    pub fn bind_shadow_aware(&self, name: Symbol, expr_type: ExpressionType) -> Self {
        let shadow = if self.is_unshadowed_component_parameter(name) {
            ShadowStatus::ShadowsComponentParameter
        } else {
            ShadowStatus::DoesNotShadow
        };
        self.bind(
            name,
            EnvironmentSignature::Ident { shadow, pcm_membership: Vec::new(), expr_type },
        )
    }

    pub fn lookup(&self, name: Symbol) -> Option<&EnvironmentSignature> {
        let mut node = self.0.as_ref();
        loop {
            match node {
                EnvNode::Empty => return None,
                EnvNode::Bind { name: bound, sig, parent } => {
                    if *bound == name {
                        return Some(sig.as_ref());
                    }
                    node = parent.as_ref();
                }
            }
        }
    }

    #[must_use]
    pub fn expr_type(&self, name: Symbol) -> Option<&ExpressionType> {
        match self.lookup(name)? {
            EnvironmentSignature::Ident { expr_type, .. } => Some(expr_type),
            EnvironmentSignature::Component { .. } => None,
        }
    }

    #[must_use]
    pub fn is_unshadowed_component_parameter(&self, name: Symbol) -> bool {
        matches!(
            self.lookup(name),
            Some(EnvironmentSignature::Ident { shadow: ShadowStatus::ComponentParameter, .. })
        )
    }

    #[must_use]
    pub fn pcm_membership(&self, name: Symbol, pcm_id: &str) -> bool {
        match self.lookup(name) {
            Some(EnvironmentSignature::Ident { pcm_membership, .. }) => {
                pcm_membership.iter().any(|p| p == pcm_id)
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn component_signature(&self, name: Symbol) -> Option<(&[Symbol], &ComponentSummary)> {
        match self.lookup(name)? {
            EnvironmentSignature::Component { params, summary, .. } => Some((params.as_slice(), summary)),
            EnvironmentSignature::Ident { .. } => None,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::empty()
    }
}
