//! `eval(source[, TYPE])` and `attribute(name[, TYPE])`: expressions and
//! variables chosen by a string value.
//!
//! With a constant first argument the work happens once while building.
//! Otherwise the result type cannot be known up front, so the type constant
//! becomes mandatory and the lookup is repeated for every evaluation.

use super::FunctionRegistry;
use crate::expression::function::{expect_type, type_constant};
use crate::expression::{
    dynamic_variable, Arity, ExpressionError, ExpressionEvaluator, ExpressionParser,
    ExpressionResult, ExpressionType, Function,
};
use log::{debug, trace};
use std::sync::Arc;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(Eval));
    registry.register(Arc::new(Attribute));
}

/// Validate `(STRING[, STRING])` and read the optional type constant.
fn requested_type(
    function: &dyn Function,
    inputs: &[ExpressionEvaluator],
) -> ExpressionResult<Option<ExpressionType>> {
    function.validate(inputs)?;
    inputs
        .get(1)
        .map(|ty| type_constant(function.name(), 2, ty))
        .transpose()
}

fn wrap_subexpression(source: &str, err: ExpressionError) -> ExpressionError {
    match err {
        ExpressionError::Cancelled => err,
        err => ExpressionError::SubexpressionEvaluation {
            function: "eval".to_string(),
            expression: source.to_string(),
            source: Box::new(err),
        },
    }
}

fn wrap_attribute(name: &str, err: ExpressionError) -> ExpressionError {
    match err {
        ExpressionError::Cancelled => err,
        err => ExpressionError::AttributeEvaluation {
            function: "attribute".to_string(),
            name: name.to_string(),
            source: Box::new(err),
        },
    }
}

fn non_constant(function: &str) -> ExpressionError {
    ExpressionError::NonConstantArgument {
        function: function.to_string(),
        position: 1,
    }
}

pub struct Eval;

impl Eval {
    fn build(
        parser: &ExpressionParser,
        source: &str,
        requested: Option<ExpressionType>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let inner = parser.parse_evaluator(source)?;
        match requested {
            Some(ty) => inner.adapt_to(ty, "eval"),
            None => Ok(inner.with_numeric_type(ExpressionType::Double)),
        }
    }
}

impl Function for Eval {
    fn name(&self) -> &str {
        "eval"
    }

    fn arity(&self) -> Arity {
        Arity::Range(1, 2)
    }

    fn compute_type(&self, inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        for (position, ty) in inputs.iter().enumerate() {
            expect_type(self.name(), position + 1, *ty, ExpressionType::String)?;
        }
        Ok(None)
    }

    fn compute(
        &self,
        parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let requested = requested_type(self, &inputs)?;
        let source = &inputs[0];

        if source.is_constant() {
            let Some(text) = source.evaluate_nominal()? else {
                return Ok(ExpressionEvaluator::missing(
                    requested.unwrap_or(ExpressionType::Double),
                ));
            };
            debug!("eval: building constant source {:?}", text);
            return Self::build(parser, &text, requested).map_err(|e| wrap_subexpression(&text, e));
        }

        let ty = requested.ok_or_else(|| non_constant(self.name()))?;
        let source = source.string_callable()?;
        let parser = parser.clone();
        Ok(ExpressionEvaluator::deferred(
            ty,
            Arc::new(move || match source()? {
                None => Ok(ExpressionEvaluator::missing(ty)),
                Some(text) => {
                    trace!("eval: building per-row source {:?}", text);
                    Self::build(&parser, &text, Some(ty)).map_err(|e| wrap_subexpression(&text, e))
                }
            }),
        ))
    }
}

pub struct Attribute;

impl Attribute {
    fn build(
        parser: &ExpressionParser,
        name: &str,
        requested: Option<ExpressionType>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let resolver = parser
            .resolver_for(name)
            .ok_or_else(|| ExpressionError::UnknownVariable {
                name: name.to_string(),
            })?;
        let variable = dynamic_variable(resolver, name, parser.context().index_supplier())?;
        match requested {
            Some(ty) => variable.adapt_to(ty, "attribute"),
            None => Ok(variable),
        }
    }
}

impl Function for Attribute {
    fn name(&self) -> &str {
        "attribute"
    }

    fn arity(&self) -> Arity {
        Arity::Range(1, 2)
    }

    fn compute_type(&self, inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        for (position, ty) in inputs.iter().enumerate() {
            expect_type(self.name(), position + 1, *ty, ExpressionType::String)?;
        }
        Ok(None)
    }

    fn compute(
        &self,
        parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let requested = requested_type(self, &inputs)?;
        let name = &inputs[0];

        if name.is_constant() {
            let Some(name) = name.evaluate_nominal()? else {
                return Ok(ExpressionEvaluator::missing(
                    requested.unwrap_or(ExpressionType::Double),
                ));
            };
            return Self::build(parser, &name, requested).map_err(|e| wrap_attribute(&name, e));
        }

        let ty = requested.ok_or_else(|| non_constant(self.name()))?;
        let name = name.string_callable()?;
        let parser = parser.clone();
        Ok(ExpressionEvaluator::deferred(
            ty,
            Arc::new(move || match name()? {
                None => Ok(ExpressionEvaluator::missing(ty)),
                Some(name) => {
                    Self::build(&parser, &name, Some(ty)).map_err(|e| wrap_attribute(&name, e))
                }
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnTable;

    fn parser() -> ExpressionParser {
        let table = ColumnTable::builder()
            .string_column(
                "source",
                vec![Some("1 + 1".to_string()), Some("x * 2".to_string()), Some("1 +".to_string())],
            )
            .string_column(
                "column",
                vec![Some("x".to_string()), Some("flag".to_string()), Some("nope".to_string())],
            )
            .integer_column("x", vec![10.0, 20.0, 30.0])
            .boolean_column("flag", vec![Some(true), Some(false), None])
            .build();
        ExpressionParser::builder()
            .with_resolver(Arc::new(table))
            .build()
    }

    #[test]
    fn test_eval_constant_source() {
        let expr = parser().parse("eval(\"2+2\")").unwrap();
        assert!(expr.is_constant());
        assert_eq!(expr.expression_type(), ExpressionType::Double);
        assert_eq!(expr.evaluate_numerical().unwrap(), 4.0);

        let expr = parser().parse("eval(\"x > 15\")").unwrap();
        assert_eq!(expr.expression_type(), ExpressionType::Boolean);
        expr.set_index(1);
        assert_eq!(expr.evaluate_boolean().unwrap(), Some(true));

        let expr = parser().parse("eval(\"3\", \"STRING\")").unwrap();
        assert_eq!(expr.evaluate_nominal().unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn test_eval_dynamic_source() {
        let expr = parser().parse("eval(source, \"DOUBLE\")").unwrap();
        assert!(!expr.is_constant());
        assert_eq!(expr.expression_type(), ExpressionType::Double);

        expr.set_index(0);
        assert_eq!(expr.evaluate_numerical().unwrap(), 2.0);
        expr.set_index(1);
        assert_eq!(expr.evaluate_numerical().unwrap(), 40.0);
        expr.set_index(2);
        assert!(matches!(
            expr.evaluate_numerical(),
            Err(ExpressionError::SubexpressionEvaluation { .. })
        ));
    }

    #[test]
    fn test_eval_errors() {
        assert!(matches!(
            parser().parse("eval(source)"),
            Err(ExpressionError::NonConstantArgument { position: 1, .. })
        ));
        assert!(matches!(
            parser().parse("eval(\"1\", \"REAL\")"),
            Err(ExpressionError::InvalidTypeConstant { .. })
        ));
        assert!(matches!(
            parser().parse("eval(\"1 +\")"),
            Err(ExpressionError::SubexpressionEvaluation { .. })
        ));
        assert!(matches!(
            parser().parse("eval(\"true\", \"DOUBLE\")"),
            Err(ExpressionError::SubexpressionEvaluation { .. })
        ));
    }

    #[test]
    fn test_attribute() {
        let expr = parser().parse("attribute(\"x\")").unwrap();
        assert_eq!(expr.expression_type(), ExpressionType::Integer);
        expr.set_index(2);
        assert_eq!(expr.evaluate_numerical().unwrap(), 30.0);

        let expr = parser().parse("attribute(column, \"STRING\")").unwrap();
        expr.set_index(0);
        assert_eq!(expr.evaluate_nominal().unwrap().as_deref(), Some("10"));
        expr.set_index(1);
        assert_eq!(expr.evaluate_nominal().unwrap().as_deref(), Some("false"));
        expr.set_index(2);
        assert!(matches!(
            expr.evaluate_nominal(),
            Err(ExpressionError::AttributeEvaluation { .. })
        ));

        assert!(matches!(
            parser().parse("attribute(\"nope\")"),
            Err(ExpressionError::AttributeEvaluation { .. })
        ));
        assert!(matches!(
            parser().parse("attribute(column)"),
            Err(ExpressionError::NonConstantArgument { .. })
        ));
    }

    #[test]
    fn test_attribute_of_missing_name() {
        let expr = parser().parse("attribute(MISSING_NOMINAL)").unwrap();
        assert!(expr.is_constant());
        assert_eq!(expr.expression_type(), ExpressionType::Double);
        assert!(expr.evaluate_numerical().unwrap().is_nan());

        let expr = parser()
            .parse("attribute(MISSING_NOMINAL, \"BOOLEAN\")")
            .unwrap();
        assert!(expr.is_constant());
        assert_eq!(expr.evaluate_boolean().unwrap(), None);
    }
}
