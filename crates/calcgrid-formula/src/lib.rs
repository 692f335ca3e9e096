//! # calcgrid-formula
//!
//! Expression evaluator and reference rewriter for calcgrid.
//!
//! This crate provides:
//! - Expression parsing (text → AST)
//! - Sandboxed evaluation (AST → [`Value`](calcgrid_core::Value)) against an [`EvalContext`]
//! - A small set of pure built-in functions
//! - Scanning and rewriting of `positional(..)`, `id(..)` and `pinned(..)` reference calls
//!
//! ## Example
//!
//! ```rust
//! use calcgrid_core::{CellAddress, Value};
//! use calcgrid_formula::{compile, EvalContext};
//!
//! struct Fixed;
//!
//! impl EvalContext for Fixed {
//!     fn cell_value(&mut self, _address: &CellAddress) -> calcgrid_core::Result<Value> {
//!         Ok(Value::Number(16.0))
//!     }
//! }
//!
//! let formula = compile("value(positional(1, 1)) + 5").unwrap();
//! assert_eq!(formula.evaluate(&mut Fixed).unwrap(), Value::Number(21.0));
//! ```

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod refs;

pub use ast::{BinaryOperator, Expr, ReferenceExpr, UnaryOperator};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{compile, evaluate, is_builtin, EvalContext, Formula, NoCells};
pub use parser::parse_expression;
pub use refs::{format_reference, rewrite_references, RefForm, ReferenceCall};
