//! Interfaces to the data an expression reads: row-indexed variables and
//! named scalar macros.

use crate::expression::{
    ExpressionError, ExpressionEvaluator, ExpressionResult, ExpressionType, IndexSupplier,
    StringList, StringSet,
};
use chrono::{DateTime, NaiveTime, Utc};
use std::sync::Arc;

/// Name and type of a variable offered by a [`Resolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableInfo {
    pub name: String,
    pub expression_type: ExpressionType,
}

impl VariableInfo {
    pub fn new(name: impl Into<String>, expression_type: ExpressionType) -> Self {
        Self {
            name: name.into(),
            expression_type,
        }
    }
}

/// Provider of named, row-indexed values (typically the columns of a table).
///
/// Getters return the type's missing value for indices outside the data and
/// fail with [`ExpressionError::Fatal`] when asked for a type the variable
/// does not have. Resolvers are shared read-only between expression trees.
pub trait Resolver: Send + Sync {
    /// Iterate over all variables. Each call starts a fresh iteration.
    fn all_variables(&self) -> Box<dyn Iterator<Item = VariableInfo> + '_>;

    /// Declared type of a variable, `None` if the name is unknown.
    fn variable_type(&self, name: &str) -> Option<ExpressionType>;

    fn double_value(&self, name: &str, _index: i64) -> ExpressionResult<f64> {
        Err(unsupported(name, "numerical"))
    }

    fn string_value(&self, name: &str, _index: i64) -> ExpressionResult<Option<String>> {
        Err(unsupported(name, "nominal"))
    }

    fn boolean_value(&self, name: &str, _index: i64) -> ExpressionResult<Option<bool>> {
        Err(unsupported(name, "boolean"))
    }

    fn instant_value(&self, name: &str, _index: i64) -> ExpressionResult<Option<DateTime<Utc>>> {
        Err(unsupported(name, "instant"))
    }

    fn local_time_value(&self, name: &str, _index: i64) -> ExpressionResult<Option<NaiveTime>> {
        Err(unsupported(name, "local time"))
    }

    fn string_set_value(&self, name: &str, _index: i64) -> ExpressionResult<Option<StringSet>> {
        Err(unsupported(name, "string set"))
    }

    fn string_list_value(&self, name: &str, _index: i64) -> ExpressionResult<Option<StringList>> {
        Err(unsupported(name, "string list"))
    }
}

fn unsupported(name: &str, requested: &str) -> ExpressionError {
    ExpressionError::Fatal(format!(
        "variable '{}' cannot be read as {}",
        name, requested
    ))
}

/// Provider of named scalar constants (macros), referenced as `%{name}`.
pub trait MacroResolver: Send + Sync {
    fn macro_value(&self, name: &str) -> Option<String>;

    fn all_macros(&self) -> Box<dyn Iterator<Item = String> + '_>;
}

/// Build an evaluator reading variable `name` at the index produced by
/// `index`.
///
/// With the context's own index supplier this is plain variable access;
/// `lead`/`lag` pass a shifted supplier instead.
pub fn dynamic_variable(
    resolver: &Arc<dyn Resolver>,
    name: &str,
    index: IndexSupplier,
) -> ExpressionResult<ExpressionEvaluator> {
    let expression_type =
        resolver
            .variable_type(name)
            .ok_or_else(|| ExpressionError::UnknownVariable {
                name: name.to_string(),
            })?;
    let resolver = Arc::clone(resolver);
    let name = name.to_string();

    let evaluator = match expression_type {
        ExpressionType::Integer | ExpressionType::Double => ExpressionEvaluator::of_double(
            Arc::new(move || resolver.double_value(&name, index()?)),
            false,
            expression_type,
        ),
        ExpressionType::String => ExpressionEvaluator::of_string(
            Arc::new(move || resolver.string_value(&name, index()?)),
            false,
        ),
        ExpressionType::Boolean => ExpressionEvaluator::of_boolean(
            Arc::new(move || resolver.boolean_value(&name, index()?)),
            false,
        ),
        ExpressionType::Instant => ExpressionEvaluator::of_instant(
            Arc::new(move || resolver.instant_value(&name, index()?)),
            false,
        ),
        ExpressionType::LocalTime => ExpressionEvaluator::of_local_time(
            Arc::new(move || resolver.local_time_value(&name, index()?)),
            false,
        ),
        ExpressionType::StringSet => ExpressionEvaluator::of_string_set(
            Arc::new(move || resolver.string_set_value(&name, index()?)),
            false,
        ),
        ExpressionType::StringList => ExpressionEvaluator::of_string_list(
            Arc::new(move || resolver.string_list_value(&name, index()?)),
            false,
        ),
    };
    Ok(evaluator)
}

/// Find the first resolver knowing `name`.
pub fn find_resolver<'a>(
    resolvers: &'a [Arc<dyn Resolver>],
    name: &str,
) -> Option<&'a Arc<dyn Resolver>> {
    resolvers.iter().find(|r| r.variable_type(name).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ExpressionContext;

    /// Numeric-only resolver over a single column.
    struct Column {
        values: Vec<f64>,
    }

    impl Resolver for Column {
        fn all_variables(&self) -> Box<dyn Iterator<Item = VariableInfo> + '_> {
            Box::new(std::iter::once(VariableInfo::new("x", ExpressionType::Double)))
        }

        fn variable_type(&self, name: &str) -> Option<ExpressionType> {
            (name == "x").then_some(ExpressionType::Double)
        }

        fn double_value(&self, _name: &str, index: i64) -> ExpressionResult<f64> {
            Ok(usize::try_from(index)
                .ok()
                .and_then(|i| self.values.get(i).copied())
                .unwrap_or(f64::NAN))
        }
    }

    fn column() -> Arc<dyn Resolver> {
        Arc::new(Column {
            values: vec![1.0, 2.0, 3.0],
        })
    }

    #[test]
    fn test_dynamic_variable_follows_context() {
        let context = Arc::new(ExpressionContext::new());
        let eval = dynamic_variable(&column(), "x", context.index_supplier()).unwrap();
        assert!(!eval.is_constant());
        assert_eq!(eval.expression_type(), ExpressionType::Double);

        context.set_index(2);
        assert_eq!(eval.evaluate_numerical().unwrap(), 3.0);
        context.set_index(5);
        assert!(eval.evaluate_numerical().unwrap().is_nan());
    }

    #[test]
    fn test_dynamic_variable_with_shifted_index() {
        let context = Arc::new(ExpressionContext::new());
        let shifted = context.clone();
        let eval = dynamic_variable(&column(), "x", Arc::new(move || Ok(shifted.index() - 1)))
            .unwrap();

        context.set_index(1);
        assert_eq!(eval.evaluate_numerical().unwrap(), 1.0);
        context.set_index(0);
        assert!(eval.evaluate_numerical().unwrap().is_nan());
    }

    #[test]
    fn test_unknown_and_mismatched_variables() {
        let resolver = column();
        let context = Arc::new(ExpressionContext::new());
        assert!(matches!(
            dynamic_variable(&resolver, "y", context.index_supplier()),
            Err(ExpressionError::UnknownVariable { .. })
        ));

        let err = resolver.string_value("x", 0).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(resolver.all_variables().count(), 1);
        assert!(find_resolver(&[resolver.clone()], "x").is_some());
        assert!(find_resolver(&[resolver], "y").is_none());
    }
}
