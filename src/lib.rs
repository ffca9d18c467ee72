//! A static sharding analysis engine for smart contracts.
//!
//! Given a type-annotated contract module (`ast::Module`), [`analyze::analyze_module`]
//! computes, per transition, a [`analyze::TransitionReport`] describing which
//! state the transition touches and the sharding constraints a runtime
//! scheduler must enforce to run it safely in parallel with other shards.

mod analyze;
mod ast;
mod config;
mod constraints;
mod contribution;
mod error;
mod eval;
mod expr_type;
mod intern;
mod normalize;
mod pcm;
mod source;
mod statements;
mod summary;
mod tracer;

pub use crate::{
    analyze::{analyze_module, TransitionReport},
    ast::{
        Builtin, Component, ComponentKind, Expr, ExprLoc, ExternalLibrary, Identifier, Literal, LibraryEntry,
        MatchClause, MessageField, Module, Param, Pattern, Statement, StatementLoc, TypeRef, AMOUNT_LABEL,
        RECIPIENT_LABEL,
    },
    config::{FieldMetadata, ImplicitParams},
    constraints::ShardingConstraint,
    contribution::{
        Cardinality, ContributionOperator, ContributionSource, ContributionSummary, Contributions, KnownContribution,
        Precision, Pseudofield,
    },
    error::AnalysisError,
    expr_type::{ExpressionType, FunctionDef, FunctionDesc},
    intern::{Interner, Symbol},
    pcm::{IntegerAddition, PcmModule, PcmRegistry, SpuriousExprMatch},
    source::{CodeLoc, SourceSpan},
    summary::{ComponentOperation, ComponentSummary, Environment, EnvironmentSignature, ShadowStatus},
    tracer::{AnalysisTracer, NoopTracer, RecordingTracer, StderrTracer, TraceEvent},
};
