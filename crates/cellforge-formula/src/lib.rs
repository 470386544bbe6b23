//! # cellforge-formula
//!
//! Formula handling for cellforge:
//! - parsing formula text into an AST ([`parse_formula`])
//! - extracting the references a formula reads ([`collect_references`])
//! - ordering cells by dependency, cycles included ([`DependencyGraph`])
//! - evaluating an AST against a workbook ([`evaluate`])
//!
//! ## Example
//!
//! ```rust
//! use cellforge_formula::{evaluate, parse_formula, EvaluationContext, FormulaValue};
//!
//! let ast = parse_formula("=SUM(1,2,3)*2").unwrap();
//! let value = evaluate(&ast, &EvaluationContext::simple()).unwrap();
//! assert_eq!(value, FormulaValue::Number(12.0));
//! ```

pub mod ast;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod references;

pub use ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
pub use dependency::{CellKey, DependencyGraph, EvalStep};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{compare_values, evaluate, EvaluationContext, FormulaValue, Grid};
pub use functions::{check_calls, contains_volatile_function, FunctionRegistry};
pub use parser::{parse_expression_text, parse_formula};
pub use references::{collect_references, format_reference_list, Reference};
