//! Typed expression engine.
//!
//! This module provides:
//! - The type system and the typed, constant-aware evaluators
//! - Variable and macro resolvers read at a movable row index
//! - The function library (operators, date/time, string and row functions)
//! - The tree builder turning parse trees into evaluator trees

pub mod builder;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod function;
pub mod functions;
pub mod resolver;
pub mod types;

pub use builder::{Expression, ExpressionParser, ExpressionParserBuilder};
pub use context::{ExpressionContext, IndexSupplier, StopCheck};
pub use error::{ExpressionError, ExpressionResult};
pub use evaluator::{
    constant, instant_to_string, number_to_string, Callable, EvalValue, ExpressionEvaluator,
    StringList, StringSet, INFINITY_STRING, NEGATIVE_INFINITY_STRING,
};
pub use function::{Arity, Function};
pub use functions::FunctionRegistry;
pub use resolver::{dynamic_variable, find_resolver, MacroResolver, Resolver, VariableInfo};
pub use types::{widen, ExpressionType};
