//! Embedded expression language.
//!
//! Formulas (`"abi.str * 2 + weapon.attack.physical"`) and skill expressions
//! (`"self.atk * 1.5 - target.def"`) are parsed into an [`Expr`] tree,
//! rewritten by one of the compilers in [`rewrite`], and executed by the
//! sandboxed [`interpreter`]. Nothing is ever turned into host code.
pub mod ast;
pub mod error;
pub mod evaluator;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod rewrite;
pub mod schema;
pub mod value;

pub use ast::{AccessorRoot, BinaryOp, Expr, UnaryOp};
pub use error::{CompileError, EvalError};
pub use evaluator::{
    CacheStats, EvalContext, Evaluated, ExpressionEvaluator, Locals, StatLookup,
};
pub use interpreter::{Bindings, NoBindings, interpret};
pub use parser::parse;
pub use rewrite::{CompiledFormula, compile_accessors, compile_attribute_formula};
pub use schema::NestedSchema;
pub use value::Value;
