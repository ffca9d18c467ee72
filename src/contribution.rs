//! The contribution algebra (§4.1): the lattice of cardinalities, the
//! pseudofield/source vocabulary, and the composition operators that
//! [`crate::normalize`] folds expression-types with.

use crate::ast::Literal;
use crate::intern::Symbol;
use indexmap::{IndexMap, IndexSet};

/// A field access, fully resolved to the key identifiers used to reach it.
/// `keys: None` means the field is a scalar (not a map); `Some(keys)` means
/// a bottom-level access through `keys.len()` map layers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Pseudofield {
    pub field: Symbol,
    pub keys: Option<Vec<Symbol>>,
}

impl Pseudofield {
    #[must_use]
    pub fn scalar(field: Symbol) -> Self {
        Self { field, keys: None }
    }

    #[must_use]
    pub fn mapped(field: Symbol, keys: Vec<Symbol>) -> Self {
        Self { field, keys: Some(keys) }
    }
}

/// Where a contribution to a value ultimately comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ContributionSource {
    /// The analysis gave up tracking provenance precisely.
    Unknown,
    ConstantLiteral(Literal),
    ContractParameter(Symbol),
    Pseudofield(Pseudofield),
    /// The de Bruijn level of an enclosing lambda parameter.
    FormalParameter(u32),
    /// The positional index of an enclosing procedure parameter.
    ProcParameter(u32),
}

/// How many distinct runtime values a source can contribute to an
/// expression, ordered as a three-point lattice: `None < Linear <
/// NonLinear`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Cardinality {
    None,
    Linear,
    NonLinear,
}

impl Cardinality {
    #[must_use]
    pub fn join(self, other: Self) -> Self {
        self.max(other)
    }

    /// Cardinality of combining two sources multiplicatively (e.g. as
    /// sibling arguments to the same operator).
    #[must_use]
    pub fn product(self, other: Self) -> Self {
        match (self, other) {
            (Cardinality::None, _) | (_, Cardinality::None) => Cardinality::None,
            (Cardinality::NonLinear, _) | (_, Cardinality::NonLinear) => Cardinality::NonLinear,
            (Cardinality::Linear, Cardinality::Linear) => Cardinality::Linear,
        }
    }

    /// Cardinality of combining two sources sequentially (one read, then
    /// another read of the same source later in the same component).
    #[must_use]
    pub fn sum_seq(self, other: Self) -> Self {
        match (self, other) {
            (Cardinality::None, x) | (x, Cardinality::None) => x,
            _ => Cardinality::NonLinear,
        }
    }
}

/// An operator a source's value has flowed through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ContributionOperator {
    BuiltinOp(Symbol),
    /// Tags a source that only contributes conditionally (inside a `match`
    /// branch or PCM-recognized option fold).
    Conditional,
}

/// Cardinality plus the set of operators a source has passed through.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContributionSummary {
    pub cardinality: Cardinality,
    pub operators: IndexSet<ContributionOperator>,
}

impl ContributionSummary {
    #[must_use]
    pub fn new(cardinality: Cardinality) -> Self {
        Self { cardinality, operators: IndexSet::new() }
    }

    #[must_use]
    pub fn with_operator(cardinality: Cardinality, op: ContributionOperator) -> Self {
        let mut operators = IndexSet::new();
        operators.insert(op);
        Self { cardinality, operators }
    }
}

/// A source-indexed map of contribution summaries. Insertion order is kept
/// for deterministic output, but equality and lookup are order-independent
/// (`IndexMap`'s `PartialEq` already ignores order).
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Contributions(IndexMap<ContributionSource, ContributionSummary>);

impl Contributions {
    #[must_use]
    pub fn single(source: ContributionSource, summary: ContributionSummary) -> Self {
        let mut map = IndexMap::new();
        map.insert(source, summary);
        Self(map)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, source: &ContributionSource) -> Option<&ContributionSummary> {
        self.0.get(source)
    }

    pub fn sources(&self) -> impl Iterator<Item = &ContributionSource> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContributionSource, &ContributionSummary)> {
        self.0.iter()
    }

    /// Overwrites (or inserts) `source`'s summary unconditionally.
    pub fn insert_overwrite(&mut self, source: ContributionSource, summary: ContributionSummary) {
        self.0.insert(source, summary);
    }

    /// Inserts `source`, merging with any existing summary via `merge`.
    pub fn insert_or_merge(
        &mut self,
        source: ContributionSource,
        summary: ContributionSummary,
        merge: impl FnOnce(&ContributionSummary, &ContributionSummary) -> ContributionSummary,
    ) {
        match self.0.shift_remove(&source) {
            Some(existing) => self.0.insert(source, merge(&existing, &summary)),
            None => self.0.insert(source, summary),
        };
    }

    /// Unions `other` into `self`, merging summaries for sources present in
    /// both via `merge`.
    #[must_use]
    pub fn union_with(
        mut self,
        other: Self,
        merge: impl Fn(&ContributionSummary, &ContributionSummary) -> ContributionSummary,
    ) -> Self {
        for (source, summary) in other.0 {
            self.insert_or_merge(source, summary, &merge);
        }
        self
    }

    #[must_use]
    pub fn map_summaries(mut self, f: impl Fn(ContributionSummary) -> ContributionSummary) -> Self {
        for value in self.0.values_mut() {
            let taken = std::mem::replace(
                value,
                ContributionSummary::new(Cardinality::None),
            );
            *value = f(taken);
        }
        self
    }
}

/// Whether `contributions` describes every possible source of a value
/// (`Exactly`) or merely a subset known to contribute, with others possibly
/// omitted (`SubsetOf`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Precision {
    Exactly,
    SubsetOf,
}

impl Precision {
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        if self == Precision::Exactly && other == Precision::Exactly {
            Precision::Exactly
        } else {
            Precision::SubsetOf
        }
    }
}

/// The full provenance description of a single (folded) value.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KnownContribution {
    pub precision: Precision,
    pub contributions: Contributions,
}

impl KnownContribution {
    /// The identity contribution: a value known to depend on nothing
    /// tracked (a fresh literal, a no-op).
    #[must_use]
    pub fn nothing() -> Self {
        Self { precision: Precision::Exactly, contributions: Contributions::default() }
    }

    #[must_use]
    pub fn is_nothing(&self) -> bool {
        self.precision == Precision::Exactly && self.contributions.is_empty()
    }

    #[must_use]
    pub fn single(source: ContributionSource, cardinality: Cardinality) -> Self {
        Self {
            precision: Precision::Exactly,
            contributions: Contributions::single(source, ContributionSummary::new(cardinality)),
        }
    }

    #[must_use]
    pub fn unknown() -> Self {
        Self {
            precision: Precision::SubsetOf,
            contributions: Contributions::single(
                ContributionSource::Unknown,
                ContributionSummary::new(Cardinality::Linear),
            ),
        }
    }
}

#[must_use]
pub fn combine_seq(a: &ContributionSummary, b: &ContributionSummary) -> ContributionSummary {
    let mut operators = a.operators.clone();
    operators.extend(b.operators.iter().cloned());
    ContributionSummary { cardinality: a.cardinality.sum_seq(b.cardinality), operators }
}

#[must_use]
pub fn combine_par(a: &ContributionSummary, b: &ContributionSummary) -> ContributionSummary {
    let mut operators = a.operators.clone();
    operators.extend(b.operators.iter().cloned());
    ContributionSummary { cardinality: a.cardinality.join(b.cardinality), operators }
}

/// Sibling-argument composition: cardinalities multiply, and if the result
/// collapses to `None` every non-`Conditional` operator tag is dropped
/// (there is nothing left for those operators to have acted on).
#[must_use]
pub fn combine_product(a: &ContributionSummary, b: &ContributionSummary) -> ContributionSummary {
    let cardinality = a.cardinality.product(b.cardinality);
    let mut operators = a.operators.clone();
    operators.extend(b.operators.iter().cloned());
    if cardinality == Cardinality::None {
        operators.retain(|op| matches!(op, ContributionOperator::Conditional));
    }
    ContributionSummary { cardinality, operators }
}

fn et_compose(
    a: &KnownContribution,
    b: &KnownContribution,
    merge: impl Fn(&ContributionSummary, &ContributionSummary) -> ContributionSummary,
) -> KnownContribution {
    KnownContribution {
        precision: a.precision.min(b.precision),
        contributions: a.contributions.clone().union_with(b.contributions.clone(), merge),
    }
}

/// Sequential composition of two known contributions (statements executed
/// one after another, or operator arguments evaluated in sequence).
#[must_use]
pub fn et_compose_seq(a: &KnownContribution, b: &KnownContribution) -> KnownContribution {
    et_compose(a, b, combine_seq)
}

/// Parallel composition (mutually exclusive `match` branches).
#[must_use]
pub fn et_compose_par(a: &KnownContribution, b: &KnownContribution) -> KnownContribution {
    et_compose(a, b, combine_par)
}

/// Marks every source that also appears in `cond`'s contributions with the
/// `Conditional` operator tag, and lowers precision to `SubsetOf` — unless
/// `cond` is exactly `nothing`, in which case the match was recognized as a
/// PCM-spurious conditional and `body` passes through unchanged.
#[must_use]
pub fn add_conditional(cond: &KnownContribution, body: &KnownContribution) -> KnownContribution {
    if cond.is_nothing() {
        return body.clone();
    }
    let mut contributions = body.contributions.clone();
    for (source, _) in cond.contributions.iter() {
        match contributions.get(source) {
            Some(existing) => {
                let mut merged = existing.clone();
                merged.operators.insert(ContributionOperator::Conditional);
                contributions.insert_overwrite(source.clone(), merged);
            }
            None => {
                contributions.insert_overwrite(
                    source.clone(),
                    ContributionSummary::with_operator(Cardinality::None, ContributionOperator::Conditional),
                );
            }
        }
    }
    KnownContribution { precision: Precision::SubsetOf, contributions }
}
