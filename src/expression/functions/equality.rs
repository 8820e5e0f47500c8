//! `==` and `!=` across numeric, STRING, BOOLEAN and INSTANT values.
//!
//! Each unordered pair of value kinds has one comparator; the mirrored pair
//! delegates with swapped arguments. Missing on either side gives missing.

use super::string::parse_number;
use super::FunctionRegistry;
use crate::expression::function::{fold1, fold2, known_type};
use crate::expression::{
    Arity, ExpressionError, ExpressionEvaluator, ExpressionParser, ExpressionResult,
    ExpressionType, Function,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(Equality::new("==", false)));
    registry.register(Arc::new(Equality::new("!=", true)));
}

/// Value kinds taking part in equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Numeric,
    Text,
    Boolean,
    Instant,
}

impl Kind {
    fn of(ty: ExpressionType) -> Option<Kind> {
        match ty {
            ExpressionType::Integer | ExpressionType::Double => Some(Kind::Numeric),
            ExpressionType::String => Some(Kind::Text),
            ExpressionType::Boolean => Some(Kind::Boolean),
            ExpressionType::Instant => Some(Kind::Instant),
            _ => None,
        }
    }
}

type Flag = Option<bool>;
type Text = Option<String>;
type Moment = Option<DateTime<Utc>>;

fn number(value: f64) -> Option<f64> {
    (!value.is_nan()).then_some(value)
}

fn number_equals_text(a: f64, b: Text) -> Flag {
    let (a, b) = number(a).zip(b)?;
    Some(parse_number(&b) == a)
}

fn number_equals_boolean(a: f64, b: Flag) -> Flag {
    let (a, b) = number(a).zip(b)?;
    Some(if b { a == 1.0 } else { a == 0.0 })
}

fn number_equals_instant(a: f64, b: Moment) -> Flag {
    let (a, b) = number(a).zip(b)?;
    Some(a == b.timestamp_millis() as f64)
}

fn text_equals_boolean(a: Text, b: Flag) -> Flag {
    let (a, b) = a.zip(b)?;
    let a = a.trim();
    Some(if b {
        a.eq_ignore_ascii_case("true")
    } else {
        a.eq_ignore_ascii_case("false")
    })
}

fn text_equals_instant(a: Text, b: Moment) -> Flag {
    let (a, b) = a.zip(b)?;
    Some(
        DateTime::parse_from_rfc3339(a.trim())
            .map(|parsed| parsed.with_timezone(&Utc) == b)
            .unwrap_or(false),
    )
}

fn same<T: PartialEq>(a: Option<T>, b: Option<T>) -> Flag {
    let (a, b) = a.zip(b)?;
    Some(a == b)
}

/// Equality evaluator for `left == right`.
fn equals(
    left: &ExpressionEvaluator,
    right: &ExpressionEvaluator,
    left_kind: Kind,
    right_kind: Kind,
) -> ExpressionResult<ExpressionEvaluator> {
    let ty = ExpressionType::Boolean;
    match (left_kind, right_kind) {
        (Kind::Numeric, Kind::Numeric) => fold2(left, right, ty, |a: f64, b: f64| {
            Ok(number(a).zip(number(b)).map(|(a, b)| a == b))
        }),
        (Kind::Numeric, Kind::Text) => fold2(left, right, ty, |a: f64, b: Text| {
            Ok(number_equals_text(a, b))
        }),
        (Kind::Numeric, Kind::Boolean) => fold2(left, right, ty, |a: f64, b: Flag| {
            Ok(number_equals_boolean(a, b))
        }),
        (Kind::Numeric, Kind::Instant) => fold2(left, right, ty, |a: f64, b: Moment| {
            Ok(number_equals_instant(a, b))
        }),
        (Kind::Text, Kind::Text) => fold2(left, right, ty, |a: Text, b: Text| Ok(same(a, b))),
        (Kind::Text, Kind::Boolean) => fold2(left, right, ty, |a: Text, b: Flag| {
            Ok(text_equals_boolean(a, b))
        }),
        (Kind::Text, Kind::Instant) => fold2(left, right, ty, |a: Text, b: Moment| {
            Ok(text_equals_instant(a, b))
        }),
        (Kind::Boolean, Kind::Boolean) => {
            fold2(left, right, ty, |a: Flag, b: Flag| Ok(same(a, b)))
        }
        (Kind::Boolean, Kind::Instant) => fold2(left, right, ty, |a: Flag, b: Moment| {
            Ok(a.zip(b).map(|_| false))
        }),
        (Kind::Instant, Kind::Instant) => {
            fold2(left, right, ty, |a: Moment, b: Moment| Ok(same(a, b)))
        }
        (Kind::Text, Kind::Numeric)
        | (Kind::Boolean, Kind::Numeric)
        | (Kind::Instant, Kind::Numeric)
        | (Kind::Boolean, Kind::Text)
        | (Kind::Instant, Kind::Text)
        | (Kind::Instant, Kind::Boolean) => equals(right, left, right_kind, left_kind),
    }
}

pub struct Equality {
    name: &'static str,
    negated: bool,
}

impl Equality {
    pub fn new(name: &'static str, negated: bool) -> Self {
        Self { name, negated }
    }

    fn kind(&self, position: usize, ty: ExpressionType) -> ExpressionResult<Kind> {
        Kind::of(ty).ok_or_else(|| {
            ExpressionError::input_type(
                self.name,
                position,
                "INTEGER, DOUBLE, STRING, BOOLEAN or INSTANT",
                ty,
            )
        })
    }
}

impl Function for Equality {
    fn name(&self) -> &str {
        self.name
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(2)
    }

    fn compute_type(&self, inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        self.kind(1, inputs[0])?;
        self.kind(2, inputs[1])?;
        Ok(Some(ExpressionType::Boolean))
    }

    fn compute(
        &self,
        _parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let ty = known_type(self, &inputs)?;
        let (left, right) = (&inputs[0], &inputs[1]);
        let left_kind = self.kind(1, left.expression_type())?;
        let right_kind = self.kind(2, right.expression_type())?;

        let equal = equals(left, right, left_kind, right_kind)?;
        if self.negated {
            fold1(&equal, ty, |equal: Flag| Ok(equal.map(|e| !e)))
        } else {
            Ok(equal)
        }
    }
}
