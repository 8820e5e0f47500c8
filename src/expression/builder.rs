//! Expression tree builder: turns parse trees into evaluator trees bound to
//! one evaluation context.

use crate::expression::{
    dynamic_variable, find_resolver, ExpressionContext, ExpressionError,
    ExpressionEvaluator, ExpressionResult, ExpressionType, FunctionRegistry, MacroResolver,
    Resolver, StopCheck, StringList, StringSet,
};
use crate::syntax::{GrammarParser, Literal, Node, SourceParser};
use chrono::{DateTime, NaiveTime, Utc};
use log::debug;
use std::f64::consts;
use std::fmt;
use std::sync::Arc;

struct ParserState {
    context: Arc<ExpressionContext>,
    resolvers: Vec<Arc<dyn Resolver>>,
    macros: Vec<Arc<dyn MacroResolver>>,
    registry: Arc<FunctionRegistry>,
    source_parser: Arc<dyn SourceParser>,
}

/// Builds evaluator trees for one evaluation context.
///
/// Cloning is cheap; clones share the context, resolvers and registry. All
/// expressions built by one parser read the same row cursor.
#[derive(Clone)]
pub struct ExpressionParser {
    state: Arc<ParserState>,
}

impl fmt::Debug for ExpressionParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionParser")
            .field("context", &self.state.context)
            .field("resolvers", &self.state.resolvers.len())
            .field("macros", &self.state.macros.len())
            .field("functions", &self.state.registry.len())
            .finish()
    }
}

/// Configuration for an [`ExpressionParser`].
#[derive(Default)]
pub struct ExpressionParserBuilder {
    context: Option<Arc<ExpressionContext>>,
    stop_check: Option<StopCheck>,
    resolvers: Vec<Arc<dyn Resolver>>,
    macros: Vec<Arc<dyn MacroResolver>>,
    registry: Option<Arc<FunctionRegistry>>,
    source_parser: Option<Arc<dyn SourceParser>>,
}

impl ExpressionParserBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable resolver. Earlier resolvers win on name clashes.
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn with_macro_resolver(mut self, macros: Arc<dyn MacroResolver>) -> Self {
        self.macros.push(macros);
        self
    }

    /// Replace the built-in function registry.
    pub fn with_registry(mut self, registry: Arc<FunctionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replace the grammar used by [`ExpressionParser::parse`] and `eval`.
    pub fn with_source_parser(mut self, source_parser: Arc<dyn SourceParser>) -> Self {
        self.source_parser = Some(source_parser);
        self
    }

    /// Stop check for a context created by [`build`](Self::build). Ignored
    /// when an explicit context is given.
    pub fn with_stop_check(mut self, stop_check: StopCheck) -> Self {
        self.stop_check = Some(stop_check);
        self
    }

    pub fn with_context(mut self, context: Arc<ExpressionContext>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn build(self) -> ExpressionParser {
        let context = match (self.context, self.stop_check) {
            (Some(context), _) => context,
            (None, Some(stop_check)) => Arc::new(ExpressionContext::with_stop_check(stop_check)),
            (None, None) => Arc::new(ExpressionContext::new()),
        };
        ExpressionParser {
            state: Arc::new(ParserState {
                context,
                resolvers: self.resolvers,
                macros: self.macros,
                registry: self
                    .registry
                    .unwrap_or_else(|| Arc::new(FunctionRegistry::with_builtins())),
                source_parser: self.source_parser.unwrap_or_else(|| Arc::new(GrammarParser)),
            }),
        }
    }
}

impl ExpressionParser {
    pub fn builder() -> ExpressionParserBuilder {
        ExpressionParserBuilder::new()
    }

    pub fn context(&self) -> &Arc<ExpressionContext> {
        &self.state.context
    }

    pub fn resolvers(&self) -> &[Arc<dyn Resolver>] {
        &self.state.resolvers
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.state.registry
    }

    /// First resolver knowing variable `name`.
    pub fn resolver_for(&self, name: &str) -> Option<&Arc<dyn Resolver>> {
        find_resolver(&self.state.resolvers, name)
    }

    /// Parse source text and build its evaluator tree.
    pub fn parse(&self, source: &str) -> ExpressionResult<Expression> {
        let node = self.state.source_parser.parse(source)?;
        self.build(&node)
    }

    /// Build the evaluator tree of a parse tree.
    pub fn build(&self, node: &Node) -> ExpressionResult<Expression> {
        let root = self.build_evaluator(node)?;
        debug!(
            "built expression {} of type {} (constant: {})",
            node,
            root.expression_type(),
            root.is_constant()
        );
        Ok(Expression {
            root,
            context: Arc::clone(&self.state.context),
        })
    }

    /// Parse source text into a bare evaluator bound to this parser's
    /// context.
    pub fn parse_evaluator(&self, source: &str) -> ExpressionResult<ExpressionEvaluator> {
        let node = self.state.source_parser.parse(source)?;
        self.build_evaluator(&node)
    }

    /// Build the evaluator of one node, children first.
    pub fn build_evaluator(&self, node: &Node) -> ExpressionResult<ExpressionEvaluator> {
        self.state.context.check_stop()?;

        match node {
            Node::Literal(Literal::Number { value, integer }) => {
                let expression_type = if *integer {
                    ExpressionType::Integer
                } else {
                    ExpressionType::Double
                };
                Ok(ExpressionEvaluator::double_value(*value, expression_type))
            }
            Node::Literal(Literal::String(text)) => {
                Ok(ExpressionEvaluator::string_value(Some(text.clone())))
            }
            Node::Identifier(name) => match self.variable(name) {
                Some(variable) => variable,
                None => built_in_constant(name)
                    .ok_or_else(|| ExpressionError::UnknownVariable { name: name.clone() }),
            },
            Node::Variable(name) => self
                .variable(name)
                .unwrap_or_else(|| Err(ExpressionError::UnknownVariable { name: name.clone() })),
            Node::Macro(name) => self
                .state
                .macros
                .iter()
                .find_map(|m| m.macro_value(name))
                .map(|value| ExpressionEvaluator::string_value(Some(value)))
                .ok_or_else(|| ExpressionError::UnknownMacro { name: name.clone() }),
            Node::Call { name, args } => {
                let function = self
                    .state
                    .registry
                    .get(name)
                    .ok_or_else(|| ExpressionError::UnknownFunction { name: name.clone() })?;
                let inputs = args
                    .iter()
                    .map(|arg| self.build_evaluator(arg))
                    .collect::<ExpressionResult<Vec<_>>>()?;
                self.state.context.check_stop()?;

                let evaluator = function.compute(self, inputs)?;
                if evaluator.is_constant() {
                    debug!("folded {} to a constant {}", node, evaluator.expression_type());
                }
                Ok(evaluator)
            }
        }
    }

    fn variable(&self, name: &str) -> Option<ExpressionResult<ExpressionEvaluator>> {
        self.resolver_for(name).map(|resolver| {
            dynamic_variable(resolver, name, self.state.context.index_supplier())
        })
    }
}

/// Value of a built-in constant name.
fn built_in_constant(name: &str) -> Option<ExpressionEvaluator> {
    let evaluator = match name {
        "true" => ExpressionEvaluator::boolean_value(Some(true)),
        "false" => ExpressionEvaluator::boolean_value(Some(false)),
        "pi" => ExpressionEvaluator::double_value(consts::PI, ExpressionType::Double),
        "e" => ExpressionEvaluator::double_value(consts::E, ExpressionType::Double),
        "INFINITY" => ExpressionEvaluator::double_value(f64::INFINITY, ExpressionType::Double),
        "MISSING_NUMERIC" => ExpressionEvaluator::missing(ExpressionType::Double),
        "MISSING_NOMINAL" => ExpressionEvaluator::missing(ExpressionType::String),
        "MISSING_DATE" => ExpressionEvaluator::missing(ExpressionType::Instant),
        "MISSING_TIME" => ExpressionEvaluator::missing(ExpressionType::LocalTime),
        _ => {
            let ty = ExpressionType::ALL
                .iter()
                .find(|t| t.constant_name() == name)?;
            ExpressionEvaluator::string_value(Some(ty.constant_name().to_string()))
        }
    };
    Some(evaluator)
}

/// Root of a built evaluator tree together with its context.
#[derive(Debug, Clone)]
pub struct Expression {
    root: ExpressionEvaluator,
    context: Arc<ExpressionContext>,
}

impl Expression {
    pub fn expression_type(&self) -> ExpressionType {
        self.root.expression_type()
    }

    pub fn is_constant(&self) -> bool {
        self.root.is_constant()
    }

    pub fn context(&self) -> &Arc<ExpressionContext> {
        &self.context
    }

    pub fn evaluator(&self) -> &ExpressionEvaluator {
        &self.root
    }

    /// Move the row cursor of the shared context.
    pub fn set_index(&self, index: i64) {
        self.context.set_index(index);
    }

    pub fn evaluate_numerical(&self) -> ExpressionResult<f64> {
        self.context.check_stop()?;
        self.root.evaluate_numerical()
    }

    pub fn evaluate_nominal(&self) -> ExpressionResult<Option<String>> {
        self.context.check_stop()?;
        self.root.evaluate_nominal()
    }

    pub fn evaluate_boolean(&self) -> ExpressionResult<Option<bool>> {
        self.context.check_stop()?;
        self.root.evaluate_boolean()
    }

    pub fn evaluate_instant(&self) -> ExpressionResult<Option<DateTime<Utc>>> {
        self.context.check_stop()?;
        self.root.evaluate_instant()
    }

    pub fn evaluate_local_time(&self) -> ExpressionResult<Option<NaiveTime>> {
        self.context.check_stop()?;
        self.root.evaluate_local_time()
    }

    pub fn evaluate_string_set(&self) -> ExpressionResult<Option<StringSet>> {
        self.context.check_stop()?;
        self.root.evaluate_string_set()
    }

    pub fn evaluate_string_list(&self) -> ExpressionResult<Option<StringList>> {
        self.context.check_stop()?;
        self.root.evaluate_string_list()
    }

    /// Canonical text of the current value, whatever its type.
    pub fn evaluate_text(&self) -> ExpressionResult<Option<String>> {
        self.context.check_stop()?;
        (self.root.text_callable())()
    }
}
