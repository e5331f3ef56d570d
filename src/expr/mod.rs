//! The expression/action evaluator.
//!
//! State behavior and transition guards are user-supplied snippets over the
//! shared data environment. Snippets are compiled exactly once, when the
//! machine graph is built, and executed later against a simulation's
//! [`SimData`]. The core engine treats the compiled forms as opaque: it only
//! calls [`CompiledCondition::eval`] and [`CompiledProgram::run`].
//!
//! The language is deliberately small: arithmetic, comparisons, boolean
//! logic, a `matches(key, "regex")` builtin for conditions; assignment,
//! compound assignment, and `push(key, value)` for actions. There is no
//! looping and no way to reach outside the environment.

mod eval;
mod parser;
mod token;

use crate::data::SimData;
use crate::error::{BuildError, RuntimeError};
use crate::value::Value;

/// A compiled transition guard. Evaluates to a boolean against a read-only
/// view of the environment.
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    source: String,
    expr: parser::Expr,
}

impl CompiledCondition {
    /// Evaluates the condition. A non-boolean result is a
    /// [`RuntimeError::NotABool`]; evaluator failures propagate unchanged.
    pub fn eval(&self, data: &SimData) -> Result<bool, RuntimeError> {
        match eval::eval_expr(&self.expr, data, &self.source)? {
            Value::Bool(b) => Ok(b),
            _ => Err(RuntimeError::NotABool {
                snippet: self.source.clone(),
            }),
        }
    }

    /// The original snippet text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// A compiled action block. Mutates the environment in place.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    source: String,
    stmts: Vec<parser::Stmt>,
}

impl CompiledProgram {
    /// Executes every statement in order. The first failure aborts the
    /// block, leaving any earlier mutations in place.
    pub fn run(&self, data: &mut SimData) -> Result<(), RuntimeError> {
        for stmt in &self.stmts {
            eval::exec_stmt(stmt, data, &self.source)?;
        }
        Ok(())
    }

    /// The original snippet text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Compiles condition text into an executable guard.
pub fn compile_condition(text: &str) -> Result<CompiledCondition, BuildError> {
    Ok(CompiledCondition {
        source: text.to_string(),
        expr: parser::parse_expression(text)?,
    })
}

/// Compiles action text into an executable statement block. Whitespace-only
/// text compiles to an empty block.
pub fn compile_program(text: &str) -> Result<CompiledProgram, BuildError> {
    Ok(CompiledProgram {
        source: text.to_string(),
        stmts: parser::parse_program(text)?,
    })
}
