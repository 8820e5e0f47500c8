//! String functions and the number/text conversions `parse` and `str`.

use super::FunctionRegistry;
use crate::expression::function::{expect_numeric, expect_type, fold1, fold2, fold_all, known_type};
use crate::expression::{
    number_to_string, Arity, ExpressionEvaluator, ExpressionParser, ExpressionResult,
    ExpressionType, Function, INFINITY_STRING, NEGATIVE_INFINITY_STRING,
};
use std::sync::Arc;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(Concat));
    registry.register(Arc::new(TextFunction::new("length", TextOp::Length)));
    registry.register(Arc::new(TextFunction::new("lower", TextOp::Lower)));
    registry.register(Arc::new(TextFunction::new("upper", TextOp::Upper)));
    registry.register(Arc::new(Contains));
    registry.register(Arc::new(TextFunction::new("parse", TextOp::Parse)));
    registry.register(Arc::new(NumberToText));
}

/// Read a decimal number; the infinity sentinels map to the infinities and
/// anything unreadable to NaN.
pub fn parse_number(text: &str) -> f64 {
    let text = text.trim();
    match text {
        INFINITY_STRING => f64::INFINITY,
        NEGATIVE_INFINITY_STRING => f64::NEG_INFINITY,
        // Rust also reads "inf" and "NaN", which are not decimal numbers.
        _ if text.chars().any(|c| c.is_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => text.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// `concat(s1, s2, ...)`: missing parts are skipped, all parts missing
/// gives missing.
pub struct Concat;

impl Function for Concat {
    fn name(&self) -> &str {
        "concat"
    }

    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }

    fn compute_type(&self, inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        for (position, ty) in inputs.iter().enumerate() {
            expect_type(self.name(), position + 1, *ty, ExpressionType::String)?;
        }
        Ok(Some(ExpressionType::String))
    }

    fn compute(
        &self,
        _parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let ty = known_type(self, &inputs)?;
        fold_all(&inputs, ty, |parts: &[Option<String>]| {
            if parts.iter().all(Option::is_none) {
                return Ok(None);
            }
            Ok(Some(parts.iter().flatten().map(String::as_str).collect::<String>()))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOp {
    Length,
    Lower,
    Upper,
    Parse,
}

/// One STRING argument in, one value out.
pub struct TextFunction {
    name: &'static str,
    op: TextOp,
}

impl TextFunction {
    pub fn new(name: &'static str, op: TextOp) -> Self {
        Self { name, op }
    }
}

impl Function for TextFunction {
    fn name(&self) -> &str {
        self.name
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn compute_type(&self, inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        expect_type(self.name, 1, inputs[0], ExpressionType::String)?;
        Ok(Some(match self.op {
            TextOp::Length => ExpressionType::Integer,
            TextOp::Parse => ExpressionType::Double,
            TextOp::Lower | TextOp::Upper => ExpressionType::String,
        }))
    }

    fn compute(
        &self,
        _parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let ty = known_type(self, &inputs)?;
        let input = &inputs[0];
        match self.op {
            TextOp::Length => fold1(input, ty, |s: Option<String>| {
                Ok(s.map_or(f64::NAN, |s| s.chars().count() as f64))
            }),
            TextOp::Parse => fold1(input, ty, |s: Option<String>| {
                Ok(s.map_or(f64::NAN, |s| parse_number(&s)))
            }),
            TextOp::Lower => fold1(input, ty, |s: Option<String>| Ok(s.map(|s| s.to_lowercase()))),
            TextOp::Upper => fold1(input, ty, |s: Option<String>| Ok(s.map(|s| s.to_uppercase()))),
        }
    }
}

/// `contains(text, part)`
pub struct Contains;

impl Function for Contains {
    fn name(&self) -> &str {
        "contains"
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(2)
    }

    fn compute_type(&self, inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        expect_type(self.name(), 1, inputs[0], ExpressionType::String)?;
        expect_type(self.name(), 2, inputs[1], ExpressionType::String)?;
        Ok(Some(ExpressionType::Boolean))
    }

    fn compute(
        &self,
        _parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let ty = known_type(self, &inputs)?;
        fold2(
            &inputs[0],
            &inputs[1],
            ty,
            |text: Option<String>, part: Option<String>| {
                Ok(text.zip(part).map(|(text, part)| text.contains(part.as_str())))
            },
        )
    }
}

/// `str(number)`
pub struct NumberToText;

impl Function for NumberToText {
    fn name(&self) -> &str {
        "str"
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn compute_type(&self, inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        expect_numeric(self.name(), 1, inputs[0])?;
        Ok(Some(ExpressionType::String))
    }

    fn compute(
        &self,
        _parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let ty = known_type(self, &inputs)?;
        fold1(&inputs[0], ty, |value: f64| Ok(number_to_string(value)))
    }
}
