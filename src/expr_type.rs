//! Expression-types (§3 Data Model): the intermediate representation the
//! evaluator (`eval.rs`) builds and the normalizer (`normalize.rs`) folds
//! down to a [`KnownContribution`] wherever possible.

use crate::contribution::{ContributionOperator, ContributionSource, KnownContribution};

/// How a function value is represented.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum FunctionDef {
    /// The lambda's body, evaluated (but not necessarily normalized) in the
    /// environment that was active when the `Fun` node was built.
    Body(Box<ExpressionType>),
    /// The function value is itself bound to an enclosing lambda's formal
    /// parameter — opaque until that parameter is substituted.
    FormalParameter(u32),
    /// The function value is itself bound to an enclosing procedure's
    /// parameter — opaque until procedure-call translation substitutes it.
    ProcParameter(u32),
}

/// A (possibly curried) function value. `levels` holds the de Bruijn level
/// of the parameter this node itself binds.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionDesc {
    pub levels: Vec<u32>,
    pub def: FunctionDef,
}

/// The symbolic representation of an expression's value, carrying enough
/// structure for [`crate::normalize::normalize`] to fold it to a `Val`
/// wherever the evaluator could not fold it eagerly.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ExpressionType {
    /// The analysis gave up entirely on this expression.
    Unknown,
    /// A fully resolved contribution set.
    Val(KnownContribution),
    /// A `Message` literal's dual view: `full` covers every field, `special`
    /// covers only the reserved `_recipient`/`_amount` slots.
    CompositeVal { full: Box<ExpressionType>, special: Box<ExpressionType> },
    /// An operator applied to an as-yet-unfolded operand.
    Op(ContributionOperator, Box<ExpressionType>),
    /// Several expression-types evaluated in sequence (builtin/constructor
    /// arguments), pending a fold to `Val`.
    ComposeSequence(Vec<ExpressionType>),
    /// A `match`'s mutually exclusive branches, pending a fold to `Val` and
    /// conditioning on `cond`.
    ComposeParallel { cond: Box<ExpressionType>, clauses: Vec<ExpressionType> },
    Fun(FunctionDesc),
    /// A function applied to its (as-yet-unfolded) arguments.
    App { callee: FunctionDesc, args: Vec<ExpressionType> },
}

impl ExpressionType {
    #[must_use]
    pub fn nothing() -> Self {
        ExpressionType::Val(KnownContribution::nothing())
    }

    #[must_use]
    pub fn unknown_function(arity: u32) -> Self {
        if arity == 0 {
            return ExpressionType::Unknown;
        }
        let mut body = ExpressionType::Unknown;
        for level in (0..arity).rev() {
            body = ExpressionType::Fun(FunctionDesc {
                levels: vec![level],
                def: FunctionDef::Body(Box::new(body)),
            });
        }
        body
    }

    /// True if this expression-type (or anything it structurally contains)
    /// is `Unknown`, or is a `Val` whose contributions include the
    /// `Unknown` source.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        match self {
            ExpressionType::Unknown => true,
            ExpressionType::Val(kc) => kc.contributions.sources().any(|s| matches!(s, ContributionSource::Unknown)),
            ExpressionType::CompositeVal { full, special } => full.is_unknown() || special.is_unknown(),
            ExpressionType::Op(_, inner) => inner.is_unknown(),
            ExpressionType::ComposeSequence(items) => items.iter().any(ExpressionType::is_unknown),
            ExpressionType::ComposeParallel { cond, clauses } => {
                cond.is_unknown() || clauses.iter().any(ExpressionType::is_unknown)
            }
            ExpressionType::Fun(desc) => matches!(&desc.def, FunctionDef::Body(body) if body.is_unknown()),
            ExpressionType::App { callee, args } => {
                matches!(&callee.def, FunctionDef::Body(body) if body.is_unknown())
                    || args.iter().any(ExpressionType::is_unknown)
            }
        }
    }

    #[must_use]
    pub fn as_val(&self) -> Option<&KnownContribution> {
        match self {
            ExpressionType::Val(kc) => Some(kc),
            _ => None,
        }
    }
}
