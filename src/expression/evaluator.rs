//! Typed, constant-aware evaluators.
//!
//! An [`ExpressionEvaluator`] wraps exactly one zero-argument callable that
//! produces the value of a (sub-)expression for the row the shared
//! [`ExpressionContext`](crate::expression::ExpressionContext) currently points
//! at. Evaluators are built once per tree node and then called once per row.

use crate::expression::{ExpressionError, ExpressionResult, ExpressionType};
use chrono::{DateTime, NaiveTime, SecondsFormat, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A value producer for the current evaluation context.
pub type Callable<T> = Arc<dyn Fn() -> ExpressionResult<T> + Send + Sync>;

pub type StringSet = BTreeSet<String>;
pub type StringList = Vec<String>;

/// Text produced for positive infinity by `str` and understood by `parse`.
pub const INFINITY_STRING: &str = "∞";
/// Text produced for negative infinity by `str` and understood by `parse`.
pub const NEGATIVE_INFINITY_STRING: &str = "-∞";

#[derive(Clone)]
enum Accessor {
    Double(Callable<f64>),
    String(Callable<Option<String>>),
    Boolean(Callable<Option<bool>>),
    Instant(Callable<Option<DateTime<Utc>>>),
    LocalTime(Callable<Option<NaiveTime>>),
    StringSet(Callable<Option<StringSet>>),
    StringList(Callable<Option<StringList>>),
}

/// Evaluator for one node of an expression tree
#[derive(Clone)]
pub struct ExpressionEvaluator {
    expression_type: ExpressionType,
    constant: bool,
    accessor: Accessor,
}

impl fmt::Debug for ExpressionEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionEvaluator")
            .field("expression_type", &self.expression_type)
            .field("constant", &self.constant)
            .finish()
    }
}

/// Wrap a value into a callable that always returns it.
pub fn constant<T: Clone + Send + Sync + 'static>(value: T) -> Callable<T> {
    Arc::new(move || Ok(value.clone()))
}

impl ExpressionEvaluator {
    /// Numeric evaluator; `expression_type` must be INTEGER or DOUBLE.
    pub fn of_double(
        callable: Callable<f64>,
        constant: bool,
        expression_type: ExpressionType,
    ) -> Self {
        debug_assert!(expression_type.is_numeric());
        Self {
            expression_type,
            constant,
            accessor: Accessor::Double(callable),
        }
    }

    pub fn of_string(callable: Callable<Option<String>>, constant: bool) -> Self {
        Self {
            expression_type: ExpressionType::String,
            constant,
            accessor: Accessor::String(callable),
        }
    }

    pub fn of_boolean(callable: Callable<Option<bool>>, constant: bool) -> Self {
        Self {
            expression_type: ExpressionType::Boolean,
            constant,
            accessor: Accessor::Boolean(callable),
        }
    }

    pub fn of_instant(callable: Callable<Option<DateTime<Utc>>>, constant: bool) -> Self {
        Self {
            expression_type: ExpressionType::Instant,
            constant,
            accessor: Accessor::Instant(callable),
        }
    }

    pub fn of_local_time(callable: Callable<Option<NaiveTime>>, constant: bool) -> Self {
        Self {
            expression_type: ExpressionType::LocalTime,
            constant,
            accessor: Accessor::LocalTime(callable),
        }
    }

    pub fn of_string_set(callable: Callable<Option<StringSet>>, constant: bool) -> Self {
        Self {
            expression_type: ExpressionType::StringSet,
            constant,
            accessor: Accessor::StringSet(callable),
        }
    }

    pub fn of_string_list(callable: Callable<Option<StringList>>, constant: bool) -> Self {
        Self {
            expression_type: ExpressionType::StringList,
            constant,
            accessor: Accessor::StringList(callable),
        }
    }

    /// Constant numeric evaluator.
    pub fn double_value(value: f64, expression_type: ExpressionType) -> Self {
        Self::of_double(constant(value), true, expression_type)
    }

    pub fn string_value(value: Option<String>) -> Self {
        Self::of_string(constant(value), true)
    }

    pub fn boolean_value(value: Option<bool>) -> Self {
        Self::of_boolean(constant(value), true)
    }

    pub fn instant_value(value: Option<DateTime<Utc>>) -> Self {
        Self::of_instant(constant(value), true)
    }

    pub fn local_time_value(value: Option<NaiveTime>) -> Self {
        Self::of_local_time(constant(value), true)
    }

    pub fn string_set_value(value: Option<StringSet>) -> Self {
        Self::of_string_set(constant(value), true)
    }

    pub fn string_list_value(value: Option<StringList>) -> Self {
        Self::of_string_list(constant(value), true)
    }

    /// The constant missing value of the given type.
    pub fn missing(expression_type: ExpressionType) -> Self {
        match expression_type {
            ExpressionType::Integer | ExpressionType::Double => {
                Self::double_value(f64::NAN, expression_type)
            }
            ExpressionType::String => Self::string_value(None),
            ExpressionType::Boolean => Self::boolean_value(None),
            ExpressionType::Instant => Self::instant_value(None),
            ExpressionType::LocalTime => Self::local_time_value(None),
            ExpressionType::StringSet => Self::string_set_value(None),
            ExpressionType::StringList => Self::string_list_value(None),
        }
    }

    pub fn expression_type(&self) -> ExpressionType {
        self.expression_type
    }

    /// Whether the value is independent of the evaluation context.
    pub fn is_constant(&self) -> bool {
        self.constant
    }

    /// Reinterpret a numeric evaluator as another numeric type without
    /// touching its values.
    pub fn with_numeric_type(mut self, expression_type: ExpressionType) -> Self {
        if self.expression_type.is_numeric() && expression_type.is_numeric() {
            self.expression_type = expression_type;
        }
        self
    }

    fn wrong_accessor(&self, requested: &str) -> ExpressionError {
        ExpressionError::Fatal(format!(
            "evaluator of type {} cannot be evaluated as {}",
            self.expression_type, requested
        ))
    }

    pub fn double_callable(&self) -> ExpressionResult<Callable<f64>> {
        match &self.accessor {
            Accessor::Double(c) => Ok(c.clone()),
            _ => Err(self.wrong_accessor("numerical")),
        }
    }

    pub fn string_callable(&self) -> ExpressionResult<Callable<Option<String>>> {
        match &self.accessor {
            Accessor::String(c) => Ok(c.clone()),
            _ => Err(self.wrong_accessor("nominal")),
        }
    }

    pub fn boolean_callable(&self) -> ExpressionResult<Callable<Option<bool>>> {
        match &self.accessor {
            Accessor::Boolean(c) => Ok(c.clone()),
            _ => Err(self.wrong_accessor("boolean")),
        }
    }

    pub fn instant_callable(&self) -> ExpressionResult<Callable<Option<DateTime<Utc>>>> {
        match &self.accessor {
            Accessor::Instant(c) => Ok(c.clone()),
            _ => Err(self.wrong_accessor("instant")),
        }
    }

    pub fn local_time_callable(&self) -> ExpressionResult<Callable<Option<NaiveTime>>> {
        match &self.accessor {
            Accessor::LocalTime(c) => Ok(c.clone()),
            _ => Err(self.wrong_accessor("local time")),
        }
    }

    pub fn string_set_callable(&self) -> ExpressionResult<Callable<Option<StringSet>>> {
        match &self.accessor {
            Accessor::StringSet(c) => Ok(c.clone()),
            _ => Err(self.wrong_accessor("string set")),
        }
    }

    pub fn string_list_callable(&self) -> ExpressionResult<Callable<Option<StringList>>> {
        match &self.accessor {
            Accessor::StringList(c) => Ok(c.clone()),
            _ => Err(self.wrong_accessor("string list")),
        }
    }

    pub fn evaluate_numerical(&self) -> ExpressionResult<f64> {
        match &self.accessor {
            Accessor::Double(c) => c(),
            _ => Err(self.wrong_accessor("numerical")),
        }
    }

    pub fn evaluate_nominal(&self) -> ExpressionResult<Option<String>> {
        match &self.accessor {
            Accessor::String(c) => c(),
            _ => Err(self.wrong_accessor("nominal")),
        }
    }

    pub fn evaluate_boolean(&self) -> ExpressionResult<Option<bool>> {
        match &self.accessor {
            Accessor::Boolean(c) => c(),
            _ => Err(self.wrong_accessor("boolean")),
        }
    }

    pub fn evaluate_instant(&self) -> ExpressionResult<Option<DateTime<Utc>>> {
        match &self.accessor {
            Accessor::Instant(c) => c(),
            _ => Err(self.wrong_accessor("instant")),
        }
    }

    pub fn evaluate_local_time(&self) -> ExpressionResult<Option<NaiveTime>> {
        match &self.accessor {
            Accessor::LocalTime(c) => c(),
            _ => Err(self.wrong_accessor("local time")),
        }
    }

    pub fn evaluate_string_set(&self) -> ExpressionResult<Option<StringSet>> {
        match &self.accessor {
            Accessor::StringSet(c) => c(),
            _ => Err(self.wrong_accessor("string set")),
        }
    }

    pub fn evaluate_string_list(&self) -> ExpressionResult<Option<StringList>> {
        match &self.accessor {
            Accessor::StringList(c) => c(),
            _ => Err(self.wrong_accessor("string list")),
        }
    }

    /// Whether the current value is the missing sentinel of this type.
    pub fn evaluate_missing(&self) -> ExpressionResult<bool> {
        Ok(match &self.accessor {
            Accessor::Double(c) => c()?.is_nan(),
            Accessor::String(c) => c()?.is_none(),
            Accessor::Boolean(c) => c()?.is_none(),
            Accessor::Instant(c) => c()?.is_none(),
            Accessor::LocalTime(c) => c()?.is_none(),
            Accessor::StringSet(c) => c()?.is_none(),
            Accessor::StringList(c) => c()?.is_none(),
        })
    }

    /// Callable producing the canonical text of the value, missing stays
    /// missing.
    pub fn text_callable(&self) -> Callable<Option<String>> {
        match self.accessor.clone() {
            Accessor::Double(c) => Arc::new(move || Ok(number_to_string(c()?))),
            Accessor::String(c) => c,
            Accessor::Boolean(c) => Arc::new(move || Ok(c()?.map(|b| b.to_string()))),
            Accessor::Instant(c) => Arc::new(move || Ok(c()?.map(|i| instant_to_string(&i)))),
            Accessor::LocalTime(c) => Arc::new(move || Ok(c()?.map(|t| t.to_string()))),
            Accessor::StringSet(c) => {
                Arc::new(move || Ok(c()?.map(|s| format!("[{}]", join(s.iter())))))
            }
            Accessor::StringList(c) => {
                Arc::new(move || Ok(c()?.map(|l| format!("[{}]", join(l.iter())))))
            }
        }
    }

    /// Build an evaluator of `expression_type` whose value is produced by a
    /// freshly built evaluator on every call. Used when the shape of the
    /// computation is only known per row (`eval` and friends with
    /// non-constant inputs).
    pub fn deferred(
        expression_type: ExpressionType,
        produce: Arc<dyn Fn() -> ExpressionResult<ExpressionEvaluator> + Send + Sync>,
    ) -> Self {
        match expression_type {
            ExpressionType::Integer | ExpressionType::Double => Self::of_double(
                Arc::new(move || produce()?.evaluate_numerical()),
                false,
                expression_type,
            ),
            ExpressionType::String => {
                Self::of_string(Arc::new(move || produce()?.evaluate_nominal()), false)
            }
            ExpressionType::Boolean => {
                Self::of_boolean(Arc::new(move || produce()?.evaluate_boolean()), false)
            }
            ExpressionType::Instant => {
                Self::of_instant(Arc::new(move || produce()?.evaluate_instant()), false)
            }
            ExpressionType::LocalTime => {
                Self::of_local_time(Arc::new(move || produce()?.evaluate_local_time()), false)
            }
            ExpressionType::StringSet => {
                Self::of_string_set(Arc::new(move || produce()?.evaluate_string_set()), false)
            }
            ExpressionType::StringList => {
                Self::of_string_list(Arc::new(move || produce()?.evaluate_string_list()), false)
            }
        }
    }

    /// Present this evaluator as `expected`.
    ///
    /// INTEGER values are read as DOUBLE without conversion and any value can
    /// be read as STRING through its canonical text. Every other mismatch is
    /// a [`ExpressionError::TypeNotMatching`] error attributed to `function`.
    pub fn adapt_to(self, expected: ExpressionType, function: &str) -> ExpressionResult<Self> {
        let actual = self.expression_type;
        if actual == expected {
            return Ok(self);
        }
        match (actual, expected) {
            (ExpressionType::Integer, ExpressionType::Double) => {
                Ok(self.with_numeric_type(ExpressionType::Double))
            }
            (_, ExpressionType::String) if self.constant => {
                Ok(Self::string_value((self.text_callable())()?))
            }
            (_, ExpressionType::String) => Ok(Self::of_string(self.text_callable(), false)),
            _ => Err(ExpressionError::TypeNotMatching {
                function: function.to_string(),
                expected,
                actual,
            }),
        }
    }
}

fn join<'a>(items: impl Iterator<Item = &'a String>) -> String {
    items.map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Text form of a number: integral values without decimal point, infinities
/// as [`INFINITY_STRING`] / [`NEGATIVE_INFINITY_STRING`], NaN as missing.
pub fn number_to_string(value: f64) -> Option<String> {
    if value.is_nan() {
        None
    } else if value == f64::INFINITY {
        Some(INFINITY_STRING.to_string())
    } else if value == f64::NEG_INFINITY {
        Some(NEGATIVE_INFINITY_STRING.to_string())
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        Some(format!("{}", value as i64))
    } else {
        Some(value.to_string())
    }
}

/// ISO-8601 text of an instant, e.g. `2020-01-01T00:00:00Z`.
pub fn instant_to_string(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Value types that have a typed accessor on [`ExpressionEvaluator`].
///
/// Lets function implementations fold and specialise over inputs without
/// writing one variant per type.
pub trait EvalValue: Clone + Send + Sync + 'static {
    fn callable(evaluator: &ExpressionEvaluator) -> ExpressionResult<Callable<Self>>;

    /// `expression_type` is only consulted for numeric values.
    fn evaluator(
        callable: Callable<Self>,
        constant: bool,
        expression_type: ExpressionType,
    ) -> ExpressionEvaluator;

    fn is_missing(&self) -> bool;

    fn missing() -> Self;
}

impl EvalValue for f64 {
    fn callable(evaluator: &ExpressionEvaluator) -> ExpressionResult<Callable<Self>> {
        evaluator.double_callable()
    }

    fn evaluator(
        callable: Callable<Self>,
        constant: bool,
        expression_type: ExpressionType,
    ) -> ExpressionEvaluator {
        ExpressionEvaluator::of_double(callable, constant, expression_type)
    }

    fn is_missing(&self) -> bool {
        self.is_nan()
    }

    fn missing() -> Self {
        f64::NAN
    }
}

macro_rules! optional_eval_value {
    ($ty:ty, $getter:ident, $ctor:ident) => {
        impl EvalValue for Option<$ty> {
            fn callable(evaluator: &ExpressionEvaluator) -> ExpressionResult<Callable<Self>> {
                evaluator.$getter()
            }

            fn evaluator(
                callable: Callable<Self>,
                constant: bool,
                _expression_type: ExpressionType,
            ) -> ExpressionEvaluator {
                ExpressionEvaluator::$ctor(callable, constant)
            }

            fn is_missing(&self) -> bool {
                self.is_none()
            }

            fn missing() -> Self {
                None
            }
        }
    };
}

optional_eval_value!(String, string_callable, of_string);
optional_eval_value!(bool, boolean_callable, of_boolean);
optional_eval_value!(DateTime<Utc>, instant_callable, of_instant);
optional_eval_value!(NaiveTime, local_time_callable, of_local_time);
optional_eval_value!(StringSet, string_set_callable, of_string_set);
optional_eval_value!(StringList, string_list_callable, of_string_list);
