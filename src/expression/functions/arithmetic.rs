//! Arithmetic operators and numeric functions.

use super::FunctionRegistry;
use crate::expression::function::{expect_numeric, fold1, fold2, known_type};
use crate::expression::{
    widen, Arity, ExpressionEvaluator, ExpressionParser, ExpressionResult, ExpressionType,
    Function,
};
use std::sync::Arc;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(Binary::new("+", BinaryOp::Add)));
    registry.register(Arc::new(Binary::new("-", BinaryOp::Subtract)));
    registry.register(Arc::new(Binary::new("*", BinaryOp::Multiply)));
    registry.register(Arc::new(Binary::new("/", BinaryOp::Divide)));
    registry.register(Arc::new(Binary::new("%", BinaryOp::Modulo)));
    registry.register(Arc::new(Binary::new("^", BinaryOp::Power)));
    registry.register(Arc::new(Unary::new("abs", UnaryOp::Abs)));
    registry.register(Arc::new(Unary::new("floor", UnaryOp::Floor)));
    registry.register(Arc::new(Unary::new("ceil", UnaryOp::Ceil)));
    registry.register(Arc::new(Unary::new("round", UnaryOp::Round)));
    registry.register(Arc::new(Unary::new("sqrt", UnaryOp::Sqrt)));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

impl BinaryOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Subtract => a - b,
            BinaryOp::Multiply => a * b,
            BinaryOp::Divide => a / b,
            BinaryOp::Modulo => a % b,
            BinaryOp::Power => a.powf(b),
        }
    }

    /// Division and powers leave the integers even for integer inputs.
    fn always_double(self) -> bool {
        matches!(self, BinaryOp::Divide | BinaryOp::Power)
    }
}

/// Binary arithmetic operator. `-` also serves as unary negation and `+`
/// concatenates as soon as one side is a STRING.
pub struct Binary {
    name: &'static str,
    op: BinaryOp,
}

impl Binary {
    pub fn new(name: &'static str, op: BinaryOp) -> Self {
        Self { name, op }
    }
}

impl Function for Binary {
    fn name(&self) -> &str {
        self.name
    }

    fn arity(&self) -> Arity {
        match self.op {
            BinaryOp::Subtract => Arity::Range(1, 2),
            _ => Arity::Fixed(2),
        }
    }

    fn compute_type(&self, inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        if let [operand] = inputs {
            expect_numeric(self.name, 1, *operand)?;
            return Ok(Some(*operand));
        }
        if self.op == BinaryOp::Add && inputs.contains(&ExpressionType::String) {
            return Ok(Some(ExpressionType::String));
        }
        for (position, ty) in inputs.iter().enumerate() {
            expect_numeric(self.name, position + 1, *ty)?;
        }
        let widened = widen(inputs[0], inputs[1]).unwrap_or(ExpressionType::Double);
        if self.op.always_double() {
            Ok(Some(ExpressionType::Double))
        } else {
            Ok(Some(widened))
        }
    }

    fn compute(
        &self,
        _parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let ty = known_type(self, &inputs)?;
        if let [operand] = inputs.as_slice() {
            return fold1(operand, ty, |a: f64| Ok(-a));
        }

        if ty == ExpressionType::String {
            let left = inputs[0].clone().adapt_to(ExpressionType::String, self.name)?;
            let right = inputs[1].clone().adapt_to(ExpressionType::String, self.name)?;
            return fold2(
                &left,
                &right,
                ty,
                |a: Option<String>, b: Option<String>| {
                    Ok(a.zip(b).map(|(a, b)| a + &b))
                },
            );
        }

        let op = self.op;
        fold2(&inputs[0], &inputs[1], ty, move |a: f64, b: f64| {
            Ok(op.apply(a, b))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Abs,
    Floor,
    Ceil,
    Round,
    Sqrt,
}

impl UnaryOp {
    fn apply(self, a: f64) -> f64 {
        match self {
            UnaryOp::Abs => a.abs(),
            UnaryOp::Floor => a.floor(),
            UnaryOp::Ceil => a.ceil(),
            UnaryOp::Round => a.round(),
            UnaryOp::Sqrt => a.sqrt(),
        }
    }
}

/// Single argument numeric function; keeps INTEGER except for `sqrt`.
pub struct Unary {
    name: &'static str,
    op: UnaryOp,
}

impl Unary {
    pub fn new(name: &'static str, op: UnaryOp) -> Self {
        Self { name, op }
    }
}

impl Function for Unary {
    fn name(&self) -> &str {
        self.name
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn compute_type(&self, inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        expect_numeric(self.name, 1, inputs[0])?;
        match self.op {
            UnaryOp::Sqrt => Ok(Some(ExpressionType::Double)),
            _ => Ok(Some(inputs[0])),
        }
    }

    fn compute(
        &self,
        _parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let ty = known_type(self, &inputs)?;
        let op = self.op;
        fold1(&inputs[0], ty, move |a: f64| Ok(op.apply(a)))
    }
}
