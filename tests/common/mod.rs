//! Shared AST-construction helpers for the end-to-end and property tests.
//!
//! Building a [`Module`] by hand touches a lot of small plumbing (span
//! placeholders, interning every identifier) that has nothing to do with the
//! behavior under test, so it lives here once instead of in every test file.

#![allow(dead_code)]

use shard_analyzer::*;

pub fn sp() -> SourceSpan {
    SourceSpan::default()
}

pub fn id(interner: &mut Interner, name: &str) -> Identifier {
    Identifier { name: interner.intern(name), span: sp() }
}

pub fn var(interner: &mut Interner, name: &str) -> ExprLoc {
    ExprLoc::new(Expr::Var(id(interner, name)), sp())
}

pub fn int(value: i128) -> ExprLoc {
    ExprLoc::new(Expr::Literal(Literal::Int { value, bits: 32, signed: false }), sp())
}

pub fn addr(interner: &mut Interner, name: &str) -> ExprLoc {
    ExprLoc::new(Expr::Literal(Literal::Address(interner.intern(name))), sp())
}

pub fn builtin(interner: &mut Interner, name: &str, args: Vec<ExprLoc>) -> ExprLoc {
    let arity = args.len() as u8;
    ExprLoc::new(Expr::Builtin(Builtin { name: interner.intern(name), arity }, args), sp())
}

pub fn message(fields: Vec<(&str, ExprLoc)>, interner: &mut Interner) -> ExprLoc {
    let fields = fields.into_iter().map(|(label, value)| MessageField { label: interner.intern(label), value }).collect();
    ExprLoc::new(Expr::Message(fields), sp())
}

pub fn load(interner: &mut Interner, dest: &str, field: &str) -> StatementLoc {
    StatementLoc::new(Statement::Load { dest: id(interner, dest), field: id(interner, field) }, sp())
}

pub fn store(interner: &mut Interner, field: &str, value: ExprLoc) -> StatementLoc {
    StatementLoc::new(Statement::Store { field: id(interner, field), value }, sp())
}

pub fn map_get(interner: &mut Interner, dest: &str, map: &str, keys: &[&str]) -> StatementLoc {
    let keys = keys.iter().map(|k| id(interner, k)).collect();
    StatementLoc::new(Statement::MapGet { dest: id(interner, dest), map: id(interner, map), keys }, sp())
}

pub fn map_update(interner: &mut Interner, map: &str, keys: &[&str], value: Option<ExprLoc>) -> StatementLoc {
    let keys = keys.iter().map(|k| id(interner, k)).collect();
    StatementLoc::new(Statement::MapUpdate { map: id(interner, map), keys, value }, sp())
}

pub fn bind(interner: &mut Interner, dest: &str, expr: ExprLoc) -> StatementLoc {
    StatementLoc::new(Statement::Bind { dest: id(interner, dest), expr }, sp())
}

pub fn accept() -> StatementLoc {
    StatementLoc::new(Statement::AcceptPayment, sp())
}

pub fn send(expr: ExprLoc) -> StatementLoc {
    StatementLoc::new(Statement::SendMsgs(expr), sp())
}

pub fn call_proc(interner: &mut Interner, proc: &str, args: Vec<ExprLoc>) -> StatementLoc {
    StatementLoc::new(Statement::CallProc { proc: id(interner, proc), args }, sp())
}

pub fn some_clause(interner: &mut Interner, binder: &str, body: Vec<StatementLoc>) -> MatchClause<Vec<StatementLoc>> {
    MatchClause { pattern: Pattern::Some(id(interner, binder)), body }
}

pub fn none_clause(body: Vec<StatementLoc>) -> MatchClause<Vec<StatementLoc>> {
    MatchClause { pattern: Pattern::None, body }
}

pub fn match_stmt(interner: &mut Interner, scrutinee: &str, clauses: Vec<MatchClause<Vec<StatementLoc>>>) -> StatementLoc {
    StatementLoc::new(Statement::Match { scrutinee: id(interner, scrutinee), clauses }, sp())
}

pub fn int_param(interner: &mut Interner, name: &str) -> Param {
    Param { name: id(interner, name), ty: TypeRef::Int { bits: 32, signed: false } }
}

pub fn addr_param(interner: &mut Interner, name: &str) -> Param {
    Param { name: id(interner, name), ty: TypeRef::ByStr20 }
}

pub fn transition(name: Identifier, params: Vec<Param>, body: Vec<StatementLoc>) -> Component {
    Component { name, kind: ComponentKind::Transition, params, body }
}

pub fn procedure(name: Identifier, params: Vec<Param>, body: Vec<StatementLoc>) -> Component {
    Component { name, kind: ComponentKind::Procedure, params, body }
}

pub fn module(components: Vec<Component>) -> Module {
    Module { contract_params: Vec::new(), library: Vec::new(), external_libraries: Vec::new(), components }
}

/// The implicit-parameters / field-metadata pair most scenario tests need: a
/// single implicit `_sender` parameter and a native `balance` field.
pub fn standard_host(interner: &mut Interner) -> (ImplicitParams, FieldMetadata) {
    let implicit =
        ImplicitParams { component_params: vec![interner.intern("_sender")], balance_field: interner.intern("balance") };
    (implicit, FieldMetadata::new())
}

pub fn run(
    module: &Module,
    implicit: &ImplicitParams,
    fields: &FieldMetadata,
    interner: &mut Interner,
) -> Vec<TransitionReport> {
    let registry = PcmRegistry::standard(interner);
    analyze_module(module, implicit, fields, &registry, interner, &mut NoopTracer).expect("analysis should not error")
}
