//! Host-supplied configuration (§6 External Interfaces): the implicit
//! parameters every component carries and the per-field map-depth table.
//!
//! Plain in-memory structs built by the embedder — no JSON/TOML loading, in
//! the same way `ouros::resource::ResourceLimits` is a plain struct the
//! host constructs rather than something the interpreter deserializes
//! itself.

use crate::ast::{ExprLoc, Expr, Identifier};
use crate::intern::Symbol;
use crate::source::SourceSpan;
use ahash::AHashMap;

/// The implicit parameters threaded into every component call (`_sender`,
/// `_amount`, `_origin`, …) and the identifier used for the native balance
/// field, supplied once per module.
#[derive(Debug, Clone)]
pub struct ImplicitParams {
    /// Implicit component parameters, in the fixed order every component
    /// receives them.
    pub component_params: Vec<Symbol>,
    /// The field identifier the native balance is stored under, used when
    /// synthesizing `MustOwn(balance)` for transitions that may send money.
    pub balance_field: Symbol,
}

impl ImplicitParams {
    /// Builds the synthetic argument list used when prepending implicit
    /// parameters to a procedure call: one `Var` expression per implicit
    /// parameter, referring to the caller's own binding of the same name.
    #[must_use]
    pub fn implicit_args(&self) -> Vec<ExprLoc> {
        self.component_params
            .iter()
            .map(|&name| {
                ExprLoc::new(
                    Expr::Var(Identifier { name, span: SourceSpan::default() }),
                    SourceSpan::default(),
                )
            })
            .collect()
    }

    #[must_use]
    pub fn balance_pseudofield(&self) -> crate::contribution::Pseudofield {
        crate::contribution::Pseudofield::scalar(self.balance_field)
    }
}

/// Per-field map depth (the number of nested `Map` layers a full lookup
/// must supply keys for), reported by the host since field declarations
/// live in the contract's storage layout, not in component bodies.
#[derive(Debug, Clone, Default)]
pub struct FieldMetadata {
    depths: AHashMap<Symbol, u32>,
}

impl FieldMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, field: Symbol, depth: u32) {
        self.depths.insert(field, depth);
    }

    /// Map depth for `field`; scalar (non-map) fields not explicitly
    /// declared default to depth 0 rather than erroring, since a contract's
    /// scalar fields are typically not pre-registered by the host.
    #[must_use]
    pub fn depth_of(&self, field: Symbol) -> u32 {
        self.depths.get(&field).copied().unwrap_or(0)
    }
}
