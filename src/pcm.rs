//! The PCM (Partial Commutative Monoid) registry (§4.3): a capability-style
//! set of trait objects describing which built-in operators commute with
//! themselves over which fields, grounded on the same shape `ouros` uses
//! for `VmTracer`/`ResourceTracker` — a small trait, a default/no-op-ish
//! impl isn't meaningful here (there is no such thing as "no PCMs apply"
//! other than an empty registry), and call sites are generic or dynamic
//! over the trait rather than over an inheritance hierarchy.

use crate::ast::{Expr, ExprLoc, Identifier, Literal, MatchClause, Pattern, StatementLoc, TypeRef};
use crate::contribution::ContributionOperator;
use crate::expr_type::ExpressionType;
use crate::intern::{Interner, Symbol};
use crate::summary::Environment;

/// Recognized shape of a PCM-style `match` *expression* (§4.3/§4.4): either
/// the unit-absorbing form (`Some x => x | None => unit`) or the
/// op-applying form (`Some x => op(x, y) | None => y`).
#[derive(Debug, Clone)]
pub enum SpuriousExprMatch {
    UnitForm,
    OpForm { free_var: Identifier },
}

/// One recognized partial commutative monoid.
pub trait PcmModule: std::fmt::Debug {
    fn identifier(&self) -> &'static str;

    /// Whether `ty` is a type this PCM's operator applies to.
    fn is_applicable_type(&self, ty: &TypeRef) -> bool;

    fn is_unit_literal(&self, lit: &Literal) -> bool;

    /// Whether `expr` denotes this PCM's unit value: either a unit literal,
    /// or a variable known (via `env`) to carry this PCM's membership tag.
    fn is_unit(&self, env: &Environment, expr: &ExprLoc) -> bool;

    /// Whether `op` is this PCM's operator.
    fn is_op(&self, op: &ContributionOperator) -> bool;

    /// Whether `expr` is syntactically `op(a, b)` or `op(b, a)` for the two
    /// given variable names.
    fn is_op_expr(&self, expr: &ExprLoc, a: Symbol, b: Symbol) -> bool;

    /// Recognizes the PCM-spurious conditional *expression* forms.
    fn is_spurious_conditional_expr(
        &self,
        env: &Environment,
        scrutinee: &ExprLoc,
        clauses: &[MatchClause<ExprLoc>],
    ) -> Option<SpuriousExprMatch>;

    /// Recognizes the PCM-spurious conditional *statement* form: a match on
    /// a bottom-level map read (`scrutinee_et` is exactly `Val(Exactly, {pf
    /// -> (Linear, {})})`) whose `Some` branch stores `op(binder, free_var)`
    /// back into the same pseudofield and whose `None` branch stores
    /// `free_var` directly.
    fn is_spurious_conditional_stmt(
        &self,
        scrutinee_et: &ExpressionType,
        clauses: &[MatchClause<Vec<StatementLoc>>],
    ) -> bool;
}

/// The built-in PCM for `+` over integers.
#[derive(Debug)]
pub struct IntegerAddition {
    add_op: Symbol,
}

impl IntegerAddition {
    #[must_use]
    pub fn new(interner: &mut Interner) -> Self {
        Self { add_op: interner.intern("add") }
    }

    fn var_name(expr: &ExprLoc) -> Option<Symbol> {
        match &expr.expr {
            Expr::Var(id) => Some(id.name),
            _ => None,
        }
    }
}

impl PcmModule for IntegerAddition {
    fn identifier(&self) -> &'static str {
        "integer_add"
    }

    fn is_applicable_type(&self, ty: &TypeRef) -> bool {
        matches!(ty, TypeRef::Int { .. })
    }

    fn is_unit_literal(&self, lit: &Literal) -> bool {
        lit.is_zero()
    }

    fn is_unit(&self, env: &Environment, expr: &ExprLoc) -> bool {
        match &expr.expr {
            Expr::Literal(lit) => self.is_unit_literal(lit),
            Expr::Var(id) => env.pcm_membership(id.name, self.identifier()),
            _ => false,
        }
    }

    fn is_op(&self, op: &ContributionOperator) -> bool {
        matches!(op, ContributionOperator::BuiltinOp(name) if *name == self.add_op)
    }

    fn is_op_expr(&self, expr: &ExprLoc, a: Symbol, b: Symbol) -> bool {
        let Expr::Builtin(builtin, args) = &expr.expr else { return false };
        if builtin.name != self.add_op || args.len() != 2 {
            return false;
        }
        match (Self::var_name(&args[0]), Self::var_name(&args[1])) {
            (Some(x), Some(y)) => (x == a && y == b) || (x == b && y == a),
            _ => false,
        }
    }

    fn is_spurious_conditional_expr(
        &self,
        env: &Environment,
        scrutinee: &ExprLoc,
        clauses: &[MatchClause<ExprLoc>],
    ) -> Option<SpuriousExprMatch> {
        let some_clause = clauses.iter().find(|c| matches!(c.pattern, Pattern::Some(_)))?;
        let none_clause = clauses.iter().find(|c| matches!(c.pattern, Pattern::None))?;
        let Pattern::Some(binder) = &some_clause.pattern else { unreachable!() };

        if self.is_unit(env, &none_clause.body) && Self::var_name(&some_clause.body) == Some(binder.name) {
            return Some(SpuriousExprMatch::UnitForm);
        }
        if let Some(free_var) = Self::var_name(&none_clause.body) {
            if self.is_op_expr(&some_clause.body, binder.name, free_var) {
                return Some(SpuriousExprMatch::OpForm {
                    free_var: Identifier { name: free_var, span: none_clause.body.span },
                });
            }
        }
        let _ = scrutinee;
        None
    }

    fn is_spurious_conditional_stmt(
        &self,
        scrutinee_et: &ExpressionType,
        clauses: &[MatchClause<Vec<StatementLoc>>],
    ) -> bool {
        use crate::contribution::{Cardinality, ContributionSource, Precision};

        let ExpressionType::Val(kc) = scrutinee_et else { return false };
        if kc.precision != Precision::Exactly {
            return false;
        }
        let mut sources = kc.contributions.iter();
        let Some((ContributionSource::Pseudofield(pf), summary)) = sources.next() else { return false };
        if sources.next().is_some() || summary.cardinality != Cardinality::Linear || !summary.operators.is_empty() {
            return false;
        }

        let Some(some_clause) = clauses.iter().find(|c| matches!(c.pattern, Pattern::Some(_))) else { return false };
        let Some(none_clause) = clauses.iter().find(|c| matches!(c.pattern, Pattern::None)) else { return false };
        let Pattern::Some(binder) = &some_clause.pattern else { unreachable!() };

        let Some(none_store_value) = single_store_to(&none_clause.body, pf) else { return false };
        let Expr::Var(free_var) = &none_store_value.expr else { return false };

        let Some(some_bind_rhs) = single_bind_then_store(&some_clause.body, pf) else { return false };
        self.is_op_expr(&some_bind_rhs, binder.name, free_var.name)
    }
}

/// Finds a block that is exactly one `MapUpdate`/`Store` to `pf`'s field
/// with value `Some(v)`, and returns `v`.
fn single_store_to(
    body: &[StatementLoc],
    pf: &crate::contribution::Pseudofield,
) -> Option<ExprLoc> {
    use crate::ast::Statement;
    let [stmt] = body else { return None };
    match &stmt.stmt {
        Statement::Store { field, value } if field.name == pf.field && pf.keys.is_none() => Some(value.clone()),
        Statement::MapUpdate { map, keys, value: Some(value) } if map.name == pf.field => {
            let key_names: Vec<_> = keys.iter().map(|k| k.name).collect();
            if pf.keys.as_deref() == Some(&key_names) {
                Some(value.clone())
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Finds a two-statement block `x = rhs; <store rhs's binder to pf>` and
/// returns `rhs`.
fn single_bind_then_store(
    body: &[StatementLoc],
    pf: &crate::contribution::Pseudofield,
) -> Option<ExprLoc> {
    use crate::ast::Statement;
    let [bind_stmt, store_stmt] = body else { return None };
    let Statement::Bind { dest, expr } = &bind_stmt.stmt else { return None };
    let stored = single_store_to(std::slice::from_ref(store_stmt), pf)?;
    match &stored.expr {
        Expr::Var(id) if id.name == dest.name => Some(expr.clone()),
        _ => None,
    }
}

/// The open set of registered PCMs, queried by every other module that
/// needs to ask "is there a PCM for this"; new PCMs register here without
/// touching the synthesizer.
#[derive(Debug, Default)]
pub struct PcmRegistry {
    modules: Vec<Box<dyn PcmModule>>,
}

impl PcmRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard registry: integer addition only.
    #[must_use]
    pub fn standard(interner: &mut Interner) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(IntegerAddition::new(interner)));
        registry
    }

    pub fn register(&mut self, module: Box<dyn PcmModule>) {
        self.modules.push(module);
    }

    pub fn modules(&self) -> impl Iterator<Item = &dyn PcmModule> {
        self.modules.iter().map(std::convert::AsRef::as_ref)
    }

    #[must_use]
    pub fn find(&self, identifier: &str) -> Option<&dyn PcmModule> {
        self.modules().find(|m| m.identifier() == identifier)
    }
}
