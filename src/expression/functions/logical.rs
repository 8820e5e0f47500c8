//! Boolean operators with three-valued logic, and `if`.

use super::FunctionRegistry;
use crate::expression::function::{expect_type, fold1, fold2, known_type};
use crate::expression::{
    widen, Arity, Callable, EvalValue, ExpressionError, ExpressionEvaluator, ExpressionParser,
    ExpressionResult, ExpressionType, Function, StringList, StringSet,
};
use chrono::{DateTime, NaiveTime, Utc};
use std::sync::Arc;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(Connective::new("&&", true)));
    registry.register(Arc::new(Connective::new("||", false)));
    registry.register(Arc::new(Not));
    registry.register(Arc::new(If));
}

/// `&&` (conjunction) or `||` (disjunction).
///
/// A missing operand only makes the result missing when the other operand
/// does not already decide it: `false && missing` is `false`,
/// `true || missing` is `true`.
pub struct Connective {
    name: &'static str,
    conjunction: bool,
}

impl Connective {
    pub fn new(name: &'static str, conjunction: bool) -> Self {
        Self { name, conjunction }
    }
}

fn kleene(conjunction: bool, a: Option<bool>, b: Option<bool>) -> Option<bool> {
    // The value that decides the result on its own.
    let dominant = !conjunction;
    match (a, b) {
        (Some(a), _) if a == dominant => Some(dominant),
        (_, Some(b)) if b == dominant => Some(dominant),
        (Some(_), Some(_)) => Some(!dominant),
        _ => None,
    }
}

impl Function for Connective {
    fn name(&self) -> &str {
        self.name
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(2)
    }

    fn compute_type(&self, inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        for (position, ty) in inputs.iter().enumerate() {
            expect_type(self.name, position + 1, *ty, ExpressionType::Boolean)?;
        }
        Ok(Some(ExpressionType::Boolean))
    }

    fn compute(
        &self,
        _parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let ty = known_type(self, &inputs)?;
        let conjunction = self.conjunction;
        fold2(&inputs[0], &inputs[1], ty, move |a: Option<bool>, b: Option<bool>| {
            Ok(kleene(conjunction, a, b))
        })
    }
}

pub struct Not;

impl Function for Not {
    fn name(&self) -> &str {
        "!"
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn compute_type(&self, inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        expect_type(self.name(), 1, inputs[0], ExpressionType::Boolean)?;
        Ok(Some(ExpressionType::Boolean))
    }

    fn compute(
        &self,
        _parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let ty = known_type(self, &inputs)?;
        fold1(&inputs[0], ty, |a: Option<bool>| Ok(a.map(|a| !a)))
    }
}

/// `if(condition, then[, else])`; without an else branch the result is
/// missing when the condition is false.
pub struct If;

fn select<T: EvalValue>(
    condition: Callable<Option<bool>>,
    then: &ExpressionEvaluator,
    otherwise: &ExpressionEvaluator,
    ty: ExpressionType,
) -> ExpressionResult<ExpressionEvaluator> {
    let then = T::callable(then)?;
    let otherwise = T::callable(otherwise)?;
    Ok(T::evaluator(
        Arc::new(move || match condition()? {
            Some(true) => then(),
            Some(false) => otherwise(),
            None => Ok(T::missing()),
        }),
        false,
        ty,
    ))
}

impl Function for If {
    fn name(&self) -> &str {
        "if"
    }

    fn arity(&self) -> Arity {
        Arity::Range(2, 3)
    }

    fn compute_type(&self, inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        expect_type(self.name(), 1, inputs[0], ExpressionType::Boolean)?;
        let then = inputs[1];
        match inputs.get(2) {
            None => Ok(Some(then)),
            Some(&otherwise) => widen(then, otherwise).map(Some).ok_or_else(|| {
                ExpressionError::input_type(self.name(), 3, then.constant_name(), otherwise)
            }),
        }
    }

    fn compute(
        &self,
        _parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let ty = known_type(self, &inputs)?;
        let condition = &inputs[0];
        let then = inputs[1].clone().with_numeric_type(ty);
        let otherwise = match inputs.get(2) {
            Some(otherwise) => otherwise.clone().with_numeric_type(ty),
            None => ExpressionEvaluator::missing(ty),
        };

        if condition.is_constant() {
            return Ok(match condition.evaluate_boolean()? {
                Some(true) => then,
                Some(false) => otherwise,
                None => ExpressionEvaluator::missing(ty),
            });
        }

        let condition = condition.boolean_callable()?;
        match ty {
            ExpressionType::Integer | ExpressionType::Double => {
                select::<f64>(condition, &then, &otherwise, ty)
            }
            ExpressionType::String => select::<Option<String>>(condition, &then, &otherwise, ty),
            ExpressionType::Boolean => select::<Option<bool>>(condition, &then, &otherwise, ty),
            ExpressionType::Instant => {
                select::<Option<DateTime<Utc>>>(condition, &then, &otherwise, ty)
            }
            ExpressionType::LocalTime => {
                select::<Option<NaiveTime>>(condition, &then, &otherwise, ty)
            }
            ExpressionType::StringSet => {
                select::<Option<StringSet>>(condition, &then, &otherwise, ty)
            }
            ExpressionType::StringList => {
                select::<Option<StringList>>(condition, &then, &otherwise, ty)
            }
        }
    }
}
