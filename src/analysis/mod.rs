//! Semantic analysis for Carlos
//!
//! Turns the parse tree into a resolved AST: every identifier reference
//! points at its semantic entity and every expression carries its type.
//! Roughly fifty static rules are enforced along the way; the first
//! violation aborts the analysis.

mod analyzer;
mod ast;
mod context;
mod stdlib;
mod types;

pub use analyzer::Analyzer;
pub use ast::{Entity, Expression, Function, Program, Statement, Variable};
pub use context::Context;
pub use stdlib::standard_library;
pub use types::{Field, FunctionType, StructType, Type};

use crate::errors::CarlosResult;
use crate::parser;

/// Analyze a parse tree and return the annotated program
pub fn analyze(program: &parser::Program) -> CarlosResult<Program> {
    Analyzer::new().analyze_program(program)
}
