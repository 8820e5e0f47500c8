//! Ordering comparisons: `<`, `>`, `<=` and `>=`.

use super::FunctionRegistry;
use crate::expression::function::{expect_numeric, fold2, known_type};
use crate::expression::{
    Arity, ExpressionError, ExpressionEvaluator, ExpressionParser, ExpressionResult,
    ExpressionType, Function,
};
use chrono::{DateTime, NaiveTime, Utc};
use std::cmp::Ordering;
use std::sync::Arc;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(Comparison::new("<", ComparisonOp::Less)));
    registry.register(Arc::new(Comparison::new(">", ComparisonOp::Greater)));
    registry.register(Arc::new(Comparison::new("<=", ComparisonOp::LessEqual)));
    registry.register(Arc::new(Comparison::new(">=", ComparisonOp::GreaterEqual)));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
}

impl ComparisonOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            ComparisonOp::Less => ordering == Ordering::Less,
            ComparisonOp::Greater => ordering == Ordering::Greater,
            ComparisonOp::LessEqual => ordering != Ordering::Greater,
            ComparisonOp::GreaterEqual => ordering != Ordering::Less,
        }
    }

    /// Missing on either side (or NaN) gives missing.
    fn compare<T: PartialOrd>(self, a: Option<T>, b: Option<T>) -> Option<bool> {
        let (a, b) = a.zip(b)?;
        a.partial_cmp(&b).map(|ordering| self.accepts(ordering))
    }
}

fn present(value: f64) -> Option<f64> {
    (!value.is_nan()).then_some(value)
}

pub struct Comparison {
    name: &'static str,
    op: ComparisonOp,
}

impl Comparison {
    pub fn new(name: &'static str, op: ComparisonOp) -> Self {
        Self { name, op }
    }
}

impl Function for Comparison {
    fn name(&self) -> &str {
        self.name
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(2)
    }

    fn compute_type(&self, inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        let (left, right) = (inputs[0], inputs[1]);
        if left.is_numeric() {
            expect_numeric(self.name, 2, right)?;
            return Ok(Some(ExpressionType::Boolean));
        }
        match left {
            ExpressionType::String | ExpressionType::Instant | ExpressionType::LocalTime => {
                if right == left {
                    Ok(Some(ExpressionType::Boolean))
                } else {
                    Err(ExpressionError::input_type(
                        self.name,
                        2,
                        left.constant_name(),
                        right,
                    ))
                }
            }
            _ => Err(ExpressionError::input_type(
                self.name,
                1,
                "INTEGER, DOUBLE, STRING, INSTANT or LOCAL_TIME",
                left,
            )),
        }
    }

    fn compute(
        &self,
        _parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let ty = known_type(self, &inputs)?;
        let op = self.op;
        let (left, right) = (&inputs[0], &inputs[1]);
        match left.expression_type() {
            ExpressionType::String => {
                fold2(left, right, ty, move |a: Option<String>, b: Option<String>| {
                    Ok(op.compare(a, b))
                })
            }
            ExpressionType::Instant => fold2(
                left,
                right,
                ty,
                move |a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>| Ok(op.compare(a, b)),
            ),
            ExpressionType::LocalTime => fold2(
                left,
                right,
                ty,
                move |a: Option<NaiveTime>, b: Option<NaiveTime>| Ok(op.compare(a, b)),
            ),
            _ => fold2(left, right, ty, move |a: f64, b: f64| {
                Ok(op.compare(present(a), present(b)))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::expression::{ExpressionError, ExpressionParser, ExpressionType};

    fn boolean(source: &str) -> Option<bool> {
        ExpressionParser::builder()
            .build()
            .parse(source)
            .unwrap()
            .evaluate_boolean()
            .unwrap()
    }

    #[test]
    fn test_numeric_comparisons() {
        assert_eq!(boolean("3+4 > 2"), Some(true));
        assert_eq!(boolean("1 < 1"), Some(false));
        assert_eq!(boolean("1 <= 1"), Some(true));
        assert_eq!(boolean("2.5 >= 3"), Some(false));
        assert_eq!(boolean("MISSING_NUMERIC < 1"), None);
    }

    #[test]
    fn test_string_and_time_comparisons() {
        assert_eq!(boolean("\"abc\" < \"abd\""), Some(true));
        assert_eq!(boolean("\"b\" > MISSING_NOMINAL"), None);
        assert_eq!(
            boolean("date_parse(1000) < date_parse(2000)"),
            Some(true)
        );
        assert_eq!(
            boolean("time_parse_str(\"10:00:00\") >= time_parse_str(\"09:30:00\")"),
            Some(true)
        );
    }

    #[test]
    fn test_mismatched_types() {
        let parser = ExpressionParser::builder().build();
        assert!(matches!(
            parser.parse("1 < \"a\""),
            Err(ExpressionError::FunctionInputType {
                position: 2,
                actual: ExpressionType::String,
                ..
            })
        ));
        assert!(matches!(
            parser.parse("true < false"),
            Err(ExpressionError::FunctionInputType { position: 1, .. })
        ));
    }
}
