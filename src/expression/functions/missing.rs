//! `missing(value)` and `finite(number)`.

use super::FunctionRegistry;
use crate::expression::function::{expect_numeric, fold1, known_type};
use crate::expression::{
    Arity, ExpressionEvaluator, ExpressionParser, ExpressionResult, ExpressionType, Function,
};
use std::sync::Arc;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(Missing));
    registry.register(Arc::new(Finite));
}

/// True iff the argument is its type's missing value. Accepts every type.
pub struct Missing;

impl Function for Missing {
    fn name(&self) -> &str {
        "missing"
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn compute_type(&self, _inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        Ok(Some(ExpressionType::Boolean))
    }

    fn compute(
        &self,
        _parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        known_type(self, &inputs)?;
        let input = inputs[0].clone();
        if input.is_constant() {
            return Ok(ExpressionEvaluator::boolean_value(Some(
                input.evaluate_missing()?,
            )));
        }
        Ok(ExpressionEvaluator::of_boolean(
            Arc::new(move || Ok(Some(input.evaluate_missing()?))),
            false,
        ))
    }
}

/// Missing for NaN, false for infinities, true otherwise.
pub struct Finite;

impl Function for Finite {
    fn name(&self) -> &str {
        "finite"
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn compute_type(&self, inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        expect_numeric(self.name(), 1, inputs[0])?;
        Ok(Some(ExpressionType::Boolean))
    }

    fn compute(
        &self,
        _parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let ty = known_type(self, &inputs)?;
        fold1(&inputs[0], ty, |value: f64| {
            Ok(if value.is_nan() {
                None
            } else {
                Some(value.is_finite())
            })
        })
    }
}
