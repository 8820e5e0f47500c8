//! Functions reading the row cursor: `lead`, `lag`, `row_number` and
//! `rand`.

use super::FunctionRegistry;
use crate::expression::function::{expect_numeric, expect_type, known_type, type_constant};
use crate::expression::{
    dynamic_variable, Arity, ExpressionError, ExpressionEvaluator, ExpressionParser,
    ExpressionResult, ExpressionType, Function, IndexSupplier,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(Shift::new("lead", 1)));
    registry.register(Arc::new(Shift::new("lag", -1)));
    registry.register(Arc::new(RowNumber));
    registry.register(Arc::new(Random));
}

/// Index no resolver holds a value for.
const NO_ROW: i64 = i64::MIN;

/// `lead(name, offset[, TYPE])` / `lag(name, offset[, TYPE])`: the value
/// of variable `name` `offset` rows after / before the current one.
pub struct Shift {
    name: &'static str,
    direction: i64,
}

impl Shift {
    pub fn new(name: &'static str, direction: i64) -> Self {
        Self { name, direction }
    }

    fn build(
        &self,
        parser: &ExpressionParser,
        variable: &str,
        index: IndexSupplier,
        requested: Option<ExpressionType>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let resolver = parser
            .resolver_for(variable)
            .ok_or_else(|| ExpressionError::UnknownVariable {
                name: variable.to_string(),
            })?;
        let evaluator = dynamic_variable(resolver, variable, index)?;
        match requested {
            Some(ty) => evaluator.adapt_to(ty, self.name),
            None => Ok(evaluator),
        }
    }
}

impl Function for Shift {
    fn name(&self) -> &str {
        self.name
    }

    fn arity(&self) -> Arity {
        Arity::Range(2, 3)
    }

    fn compute_type(&self, inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        expect_type(self.name, 1, inputs[0], ExpressionType::String)?;
        expect_numeric(self.name, 2, inputs[1])?;
        if let Some(ty) = inputs.get(2) {
            expect_type(self.name, 3, *ty, ExpressionType::String)?;
        }
        Ok(None)
    }

    fn compute(
        &self,
        parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        self.validate(&inputs)?;
        let requested = inputs
            .get(2)
            .map(|ty| type_constant(self.name, 3, ty))
            .transpose()?;

        let offset = inputs[1].double_callable()?;
        let context = Arc::clone(parser.context());
        let direction = self.direction;
        let index: IndexSupplier = Arc::new(move || {
            let offset = offset()?;
            if offset.is_nan() {
                return Ok(NO_ROW);
            }
            let shift = (offset as i64).saturating_mul(direction);
            Ok(context.index().checked_add(shift).unwrap_or(NO_ROW))
        });

        let variable = &inputs[0];
        if variable.is_constant() {
            let Some(name) = variable.evaluate_nominal()? else {
                return Ok(ExpressionEvaluator::missing(
                    requested.unwrap_or(ExpressionType::Double),
                ));
            };
            return self.build(parser, &name, index, requested);
        }

        let ty = requested.ok_or_else(|| ExpressionError::NonConstantArgument {
            function: self.name.to_string(),
            position: 1,
        })?;
        let variable = variable.string_callable()?;
        let parser = parser.clone();
        let shift = Shift::new(self.name, self.direction);
        Ok(ExpressionEvaluator::deferred(
            ty,
            Arc::new(move || match variable()? {
                None => Ok(ExpressionEvaluator::missing(ty)),
                Some(name) => shift.build(&parser, &name, index.clone(), Some(ty)),
            }),
        ))
    }
}

/// 1-based number of the current row.
pub struct RowNumber;

impl Function for RowNumber {
    fn name(&self) -> &str {
        "row_number"
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(0)
    }

    fn compute_type(&self, _inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        Ok(Some(ExpressionType::Integer))
    }

    fn compute(
        &self,
        parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let ty = known_type(self, &inputs)?;
        let context = Arc::clone(parser.context());
        Ok(ExpressionEvaluator::of_double(
            Arc::new(move || Ok(context.index() as f64 + 1.0)),
            false,
            ty,
        ))
    }
}

/// `rand([seed])`: uniform in [0, 1). A constant seed makes the sequence
/// reproducible.
pub struct Random;

impl Function for Random {
    fn name(&self) -> &str {
        "rand"
    }

    fn arity(&self) -> Arity {
        Arity::Range(0, 1)
    }

    fn compute_type(&self, inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        if let Some(seed) = inputs.first() {
            expect_numeric(self.name(), 1, *seed)?;
        }
        Ok(Some(ExpressionType::Double))
    }

    fn compute(
        &self,
        _parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let ty = known_type(self, &inputs)?;
        let seed = match inputs.first() {
            Some(seed) if !seed.is_constant() => {
                return Err(ExpressionError::NonConstantArgument {
                    function: self.name().to_string(),
                    position: 1,
                })
            }
            Some(seed) => Some(seed.evaluate_numerical()?).filter(|s| !s.is_nan()),
            None => None,
        };
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed as u64),
            None => StdRng::from_entropy(),
        };
        let rng = Arc::new(Mutex::new(rng));
        Ok(ExpressionEvaluator::of_double(
            Arc::new(move || Ok(rng.lock().gen::<f64>())),
            false,
            ty,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnTable;

    fn parser() -> ExpressionParser {
        let table = ColumnTable::builder()
            .integer_column("x", vec![10.0, 20.0, 30.0])
            .boolean_column("flag", vec![Some(true), Some(false), None])
            .string_column(
                "which",
                vec![Some("x".to_string()), Some("flag".to_string()), None],
            )
            .build();
        ExpressionParser::builder()
            .with_resolver(Arc::new(table))
            .build()
    }

    fn numbers(source: &str, rows: i64) -> Vec<f64> {
        let expr = parser().parse(source).unwrap();
        (0..rows)
            .map(|i| {
                expr.set_index(i);
                expr.evaluate_numerical().unwrap()
            })
            .collect()
    }

    #[test]
    fn test_lag_and_lead() {
        let lag = numbers("lag(\"x\", 1)", 3);
        assert!(lag[0].is_nan());
        assert_eq!(&lag[1..], &[10.0, 20.0]);

        let lead = numbers("lead(\"x\", 2)", 3);
        assert_eq!(lead[0], 30.0);
        assert!(lead[1].is_nan());
        assert!(lead[2].is_nan());

        let back = numbers("lead(\"x\", -1)", 2);
        assert!(back[0].is_nan());
        assert_eq!(back[1], 10.0);

        assert!(numbers("lag(\"x\", MISSING_NUMERIC)", 1)[0].is_nan());
    }

    #[test]
    fn test_shift_types() {
        let expr = parser().parse("lag(\"x\", 1)").unwrap();
        assert_eq!(expr.expression_type(), ExpressionType::Integer);

        let expr = parser().parse("lag(\"x\", 1, \"DOUBLE\")").unwrap();
        assert_eq!(expr.expression_type(), ExpressionType::Double);
        expr.set_index(1);
        assert_eq!(expr.evaluate_numerical().unwrap(), 10.0);

        let expr = parser().parse("lead(\"flag\", 0, \"STRING\")").unwrap();
        expr.set_index(0);
        assert_eq!(expr.evaluate_nominal().unwrap().as_deref(), Some("true"));
        expr.set_index(2);
        assert_eq!(expr.evaluate_nominal().unwrap(), None);

        assert!(matches!(
            parser().parse("lead(\"flag\", 1, \"INSTANT\")"),
            Err(ExpressionError::TypeNotMatching {
                expected: ExpressionType::Instant,
                actual: ExpressionType::Boolean,
                ..
            })
        ));
    }

    #[test]
    fn test_shift_with_dynamic_name() {
        let expr = parser().parse("lag(which, 0, \"STRING\")").unwrap();
        assert!(!expr.is_constant());
        expr.set_index(0);
        assert_eq!(expr.evaluate_nominal().unwrap().as_deref(), Some("10"));
        expr.set_index(1);
        assert_eq!(expr.evaluate_nominal().unwrap().as_deref(), Some("false"));
        expr.set_index(2);
        assert_eq!(expr.evaluate_nominal().unwrap(), None);

        let expr = parser().parse("lag(which, 0, \"INSTANT\")").unwrap();
        expr.set_index(0);
        assert!(matches!(
            expr.evaluate_instant(),
            Err(ExpressionError::TypeNotMatching { .. })
        ));

        assert!(matches!(
            parser().parse("lag(which, 1)"),
            Err(ExpressionError::NonConstantArgument { position: 1, .. })
        ));
        assert!(matches!(
            parser().parse("lag(\"y\", 1)"),
            Err(ExpressionError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn test_row_number() {
        assert_eq!(numbers("row_number()", 3), vec![1.0, 2.0, 3.0]);
        let expr = parser().parse("row_number()").unwrap();
        assert!(!expr.is_constant());
        assert_eq!(expr.expression_type(), ExpressionType::Integer);
    }

    #[test]
    fn test_row_number_at_cursor_limits() {
        let expr = parser().parse("row_number()").unwrap();
        expr.set_index(i64::MAX);
        assert_eq!(expr.evaluate_numerical().unwrap(), i64::MAX as f64);
        expr.set_index(-1);
        assert_eq!(expr.evaluate_numerical().unwrap(), 0.0);
    }

    #[test]
    fn test_rand() {
        let values = numbers("rand()", 20);
        assert!(values.iter().all(|v| (0.0..1.0).contains(v)));
        assert!(!parser().parse("rand()").unwrap().is_constant());

        assert_eq!(numbers("rand(42)", 5), numbers("rand(42)", 5));
        assert!(matches!(
            parser().parse("rand(x)"),
            Err(ExpressionError::NonConstantArgument { .. })
        ));
    }
}
