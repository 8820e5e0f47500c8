//! The function node abstraction and the folding helpers shared by all
//! built-in functions.
//!
//! Every operator and function is a [`Function`]: it validates its input
//! types once ([`Function::compute_type`]) and then builds one evaluator
//! closing over the evaluators of its arguments ([`Function::compute`]).
//! The `fold*` helpers implement the constant handling every function
//! relies on: when all inputs are constant the value is computed right away,
//! when only some are, the constant ones are read once and captured.

use crate::expression::{
    constant, Callable, EvalValue, ExpressionError, ExpressionEvaluator, ExpressionParser,
    ExpressionResult, ExpressionType,
};
use std::sync::Arc;

/// Number of arguments a function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Fixed(n) => count == n,
            Arity::Range(min, max) => (min..=max).contains(&count),
            Arity::AtLeast(min) => count >= min,
        }
    }

    pub fn describe(&self) -> String {
        match *self {
            Arity::Fixed(n) => n.to_string(),
            Arity::Range(min, max) => format!("{} to {}", min, max),
            Arity::AtLeast(min) => format!("at least {}", min),
        }
    }
}

/// An operator or built-in function.
pub trait Function: Send + Sync {
    /// Name used in expressions and in error messages.
    fn name(&self) -> &str;

    fn arity(&self) -> Arity;

    /// Validate the argument types and return the result type.
    ///
    /// `Ok(None)` means the result type depends on the value of a constant
    /// argument (a type constant, a variable name or a source text) and is
    /// settled in [`compute`](Self::compute).
    fn compute_type(&self, inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>>;

    /// Build the evaluator for this function over the given arguments.
    fn compute(
        &self,
        parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator>;

    fn check_arity(&self, count: usize) -> ExpressionResult<()> {
        let arity = self.arity();
        if arity.accepts(count) {
            Ok(())
        } else {
            Err(ExpressionError::FunctionArgumentCount {
                function: self.name().to_string(),
                expected: arity.describe(),
                actual: count,
            })
        }
    }

    /// Arity and type validation over evaluators.
    fn validate(&self, inputs: &[ExpressionEvaluator]) -> ExpressionResult<Option<ExpressionType>> {
        self.check_arity(inputs.len())?;
        let types: Vec<ExpressionType> = inputs.iter().map(|i| i.expression_type()).collect();
        self.compute_type(&types)
    }
}

/// Result type of a function whose type is fully determined by its inputs.
pub(crate) fn known_type(
    function: &dyn Function,
    inputs: &[ExpressionEvaluator],
) -> ExpressionResult<ExpressionType> {
    function.validate(inputs)?.ok_or_else(|| {
        ExpressionError::Fatal(format!(
            "function {} did not determine its result type",
            function.name()
        ))
    })
}

pub(crate) fn expect_numeric(
    function: &str,
    position: usize,
    actual: ExpressionType,
) -> ExpressionResult<()> {
    if actual.is_numeric() {
        Ok(())
    } else {
        Err(ExpressionError::input_type(
            function,
            position,
            "INTEGER or DOUBLE",
            actual,
        ))
    }
}

pub(crate) fn expect_type(
    function: &str,
    position: usize,
    actual: ExpressionType,
    expected: ExpressionType,
) -> ExpressionResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(ExpressionError::input_type(
            function,
            position,
            expected.constant_name(),
            actual,
        ))
    }
}

/// Read a constant type-constant argument such as `"DOUBLE"`.
pub(crate) fn type_constant(
    function: &str,
    position: usize,
    input: &ExpressionEvaluator,
) -> ExpressionResult<ExpressionType> {
    if !input.is_constant() {
        return Err(ExpressionError::NonConstantArgument {
            function: function.to_string(),
            position,
        });
    }
    let name = input.evaluate_nominal()?.unwrap_or_default();
    ExpressionType::from_constant_name(&name).ok_or_else(|| ExpressionError::InvalidTypeConstant {
        function: function.to_string(),
        name,
    })
}

/// Whether any constant input is missing. Non-constant inputs are not
/// evaluated.
pub(crate) fn any_constant_missing(inputs: &[ExpressionEvaluator]) -> ExpressionResult<bool> {
    for input in inputs.iter().filter(|i| i.is_constant()) {
        if input.evaluate_missing()? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// One typed argument: its callable and whether it is constant.
pub(crate) struct Input<T> {
    call: Callable<T>,
    constant: bool,
}

impl<T: EvalValue> Input<T> {
    pub(crate) fn of(evaluator: &ExpressionEvaluator) -> ExpressionResult<Self> {
        Ok(Self {
            call: T::callable(evaluator)?,
            constant: evaluator.is_constant(),
        })
    }
}

fn folded<R: EvalValue>(value: R, ty: ExpressionType) -> ExpressionEvaluator {
    R::evaluator(constant(value), true, ty)
}

/// Apply `f` to one argument.
pub(crate) fn fold1<A, R, F>(
    input: &ExpressionEvaluator,
    ty: ExpressionType,
    f: F,
) -> ExpressionResult<ExpressionEvaluator>
where
    A: EvalValue,
    R: EvalValue,
    F: Fn(A) -> ExpressionResult<R> + Send + Sync + 'static,
{
    let a = Input::<A>::of(input)?;
    if a.constant {
        return Ok(folded(f((a.call)()?)?, ty));
    }
    let call = a.call;
    Ok(R::evaluator(Arc::new(move || f(call()?)), false, ty))
}

/// Apply `f` to two arguments, reading constant arguments only once.
pub(crate) fn fold2<A, B, R, F>(
    left: &ExpressionEvaluator,
    right: &ExpressionEvaluator,
    ty: ExpressionType,
    f: F,
) -> ExpressionResult<ExpressionEvaluator>
where
    A: EvalValue,
    B: EvalValue,
    R: EvalValue,
    F: Fn(A, B) -> ExpressionResult<R> + Send + Sync + 'static,
{
    let a = Input::<A>::of(left)?;
    let b = Input::<B>::of(right)?;
    let callable: Callable<R> = match (a.constant, b.constant) {
        (true, true) => return Ok(folded(f((a.call)()?, (b.call)()?)?, ty)),
        (true, false) => {
            let left = (a.call)()?;
            let right = b.call;
            Arc::new(move || f(left.clone(), right()?))
        }
        (false, true) => {
            let left = a.call;
            let right = (b.call)()?;
            Arc::new(move || f(left()?, right.clone()))
        }
        (false, false) => {
            let (left, right) = (a.call, b.call);
            Arc::new(move || f(left()?, right()?))
        }
    };
    Ok(R::evaluator(callable, false, ty))
}

/// Apply `f` to a value argument and a list of STRING option arguments
/// (pattern, locale, ...).
///
/// The options are turned into a prepared object (a formatter) by
/// `prepare`. When all options are constant this happens once; otherwise it
/// happens on every call, and a missing option makes the result missing.
pub(crate) fn fold_prepared<A, P, R, Prep, F>(
    value: &ExpressionEvaluator,
    options: &[ExpressionEvaluator],
    ty: ExpressionType,
    prepare: Prep,
    f: F,
) -> ExpressionResult<ExpressionEvaluator>
where
    A: EvalValue,
    P: Send + Sync + 'static,
    R: EvalValue,
    Prep: Fn(&[Option<String>]) -> ExpressionResult<P> + Send + Sync + 'static,
    F: Fn(A, &P) -> ExpressionResult<R> + Send + Sync + 'static,
{
    let a = Input::<A>::of(value)?;
    let option_calls = options
        .iter()
        .map(|o| o.string_callable())
        .collect::<ExpressionResult<Vec<_>>>()?;

    if options.iter().all(|o| o.is_constant()) {
        let values = option_calls
            .iter()
            .map(|c| c())
            .collect::<ExpressionResult<Vec<_>>>()?;
        if values.iter().any(Option::is_none) {
            return Ok(folded(R::missing(), ty));
        }
        let prepared = prepare(&values)?;
        if a.constant {
            return Ok(folded(f((a.call)()?, &prepared)?, ty));
        }
        let call = a.call;
        return Ok(R::evaluator(
            Arc::new(move || f(call()?, &prepared)),
            false,
            ty,
        ));
    }

    let call = a.call;
    Ok(R::evaluator(
        Arc::new(move || {
            let value = call()?;
            let values = option_calls
                .iter()
                .map(|c| c())
                .collect::<ExpressionResult<Vec<_>>>()?;
            if values.iter().any(Option::is_none) {
                return Ok(R::missing());
            }
            f(value, &prepare(&values)?)
        }),
        false,
        ty,
    ))
}

/// Apply `f` to all arguments, which share one value type.
pub(crate) fn fold_all<A, R, F>(
    inputs: &[ExpressionEvaluator],
    ty: ExpressionType,
    f: F,
) -> ExpressionResult<ExpressionEvaluator>
where
    A: EvalValue,
    R: EvalValue,
    F: Fn(&[A]) -> ExpressionResult<R> + Send + Sync + 'static,
{
    let calls = inputs
        .iter()
        .map(|i| A::callable(i))
        .collect::<ExpressionResult<Vec<_>>>()?;
    let evaluate = move || -> ExpressionResult<R> {
        let values = calls.iter().map(|c| c()).collect::<ExpressionResult<Vec<A>>>()?;
        f(&values)
    };
    if inputs.iter().all(|i| i.is_constant()) {
        return Ok(folded(evaluate()?, ty));
    }
    Ok(R::evaluator(Arc::new(evaluate), false, ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(value: f64, calls: &Arc<AtomicUsize>) -> ExpressionEvaluator {
        let calls = calls.clone();
        ExpressionEvaluator::of_double(
            Arc::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            }),
            false,
            ExpressionType::Double,
        )
    }

    #[test]
    fn test_arity() {
        assert!(Arity::Fixed(2).accepts(2));
        assert!(!Arity::Fixed(2).accepts(3));
        assert!(Arity::Range(1, 3).accepts(1));
        assert!(Arity::Range(1, 3).accepts(3));
        assert!(!Arity::Range(1, 3).accepts(0));
        assert!(Arity::AtLeast(1).accepts(10));
        assert_eq!(Arity::Range(2, 3).describe(), "2 to 3");
        assert_eq!(Arity::AtLeast(1).describe(), "at least 1");
    }

    fn counting_constant(value: f64, calls: &Arc<AtomicUsize>) -> ExpressionEvaluator {
        let calls = calls.clone();
        ExpressionEvaluator::of_double(
            Arc::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            }),
            true,
            ExpressionType::Double,
        )
    }

    #[test]
    fn test_fold2_all_constant() {
        let left_calls = Arc::new(AtomicUsize::new(0));
        let right_calls = Arc::new(AtomicUsize::new(0));
        let applied = Arc::new(AtomicUsize::new(0));
        let left = counting_constant(2.0, &left_calls);
        let right = counting_constant(3.0, &right_calls);

        let counter = applied.clone();
        let eval = fold2(&left, &right, ExpressionType::Double, move |a: f64, b: f64| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(a * b)
        })
        .unwrap();
        assert!(eval.is_constant());
        for _ in 0..5 {
            assert_eq!(eval.evaluate_numerical().unwrap(), 6.0);
        }
        assert_eq!(left_calls.load(Ordering::SeqCst), 1);
        assert_eq!(right_calls.load(Ordering::SeqCst), 1);
        assert_eq!(applied.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fold2_reads_constant_side_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let constant_calls = Arc::new(AtomicUsize::new(0));
        let counter = constant_calls.clone();
        let left = ExpressionEvaluator::of_double(
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(10.0)
            }),
            true,
            ExpressionType::Double,
        );
        let right = counting(1.0, &calls);

        let eval = fold2(&left, &right, ExpressionType::Double, |a: f64, b: f64| Ok(a - b))
            .unwrap();
        assert!(!eval.is_constant());
        for _ in 0..4 {
            assert_eq!(eval.evaluate_numerical().unwrap(), 9.0);
        }
        assert_eq!(constant_calls.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_type_constant() {
        let input = ExpressionEvaluator::string_value(Some("double".to_string()));
        assert_eq!(
            type_constant("eval", 2, &input).unwrap(),
            ExpressionType::Double
        );

        let input = ExpressionEvaluator::string_value(Some("REAL".to_string()));
        assert!(matches!(
            type_constant("eval", 2, &input),
            Err(ExpressionError::InvalidTypeConstant { .. })
        ));

        let input = ExpressionEvaluator::of_string(Arc::new(|| Ok(None)), false);
        assert!(matches!(
            type_constant("eval", 2, &input),
            Err(ExpressionError::NonConstantArgument { position: 2, .. })
        ));
    }

    #[test]
    fn test_any_constant_missing_skips_dynamic_inputs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let inputs = vec![
            counting(1.0, &calls),
            ExpressionEvaluator::string_value(None),
        ];
        assert!(any_constant_missing(&inputs).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let inputs = vec![ExpressionEvaluator::double_value(1.0, ExpressionType::Integer)];
        assert!(!any_constant_missing(&inputs).unwrap());
    }

    #[test]
    fn test_fold_prepared_missing_option() {
        let value = ExpressionEvaluator::double_value(1.0, ExpressionType::Double);
        let options = vec![ExpressionEvaluator::of_string(Arc::new(|| Ok(None)), false)];
        let eval = fold_prepared(
            &value,
            &options,
            ExpressionType::String,
            |opts: &[Option<String>]| Ok(opts.len()),
            |a: f64, n: &usize| Ok(Some(format!("{}{}", a, n))),
        )
        .unwrap();
        assert!(!eval.is_constant());
        assert_eq!(eval.evaluate_nominal().unwrap(), None);
    }
}
