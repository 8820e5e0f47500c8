// Expression parser - converts tokens to a parse tree

use super::ast::{Literal, Node};
use super::lexer::Lexer;
use super::token::Token;
use crate::expression::{ExpressionError, ExpressionResult};

pub struct Parser {
    tokens: Vec<(Token, usize)>,
    position: usize,
}

impl Parser {
    pub fn new(source: &str) -> ExpressionResult<Self> {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize()?;
        Ok(Parser {
            tokens,
            position: 0,
        })
    }

    /// Parse the whole input as one expression
    pub fn parse(&mut self) -> ExpressionResult<Node> {
        if self.match_token(&Token::Eof) {
            return Err(self.error("Empty expression"));
        }
        let node = self.parse_expression()?;
        if !self.match_token(&Token::Eof) {
            return Err(self.error(format!("Unexpected token: {:?}", self.current_token())));
        }
        Ok(node)
    }

    /// Parse expression
    fn parse_expression(&mut self) -> ExpressionResult<Node> {
        self.parse_or()
    }

    /// Parse left-associative binary operators of one precedence level
    fn parse_binary(
        &mut self,
        operators: &[Token],
        next: fn(&mut Self) -> ExpressionResult<Node>,
    ) -> ExpressionResult<Node> {
        let mut left = next(self)?;

        while let Some(name) = operators
            .iter()
            .find(|op| self.match_token(op))
            .and_then(Token::operator_name)
        {
            self.advance();
            let right = next(self)?;
            left = Node::binary(name, left, right);
        }

        Ok(left)
    }

    /// Parse OR expression
    fn parse_or(&mut self) -> ExpressionResult<Node> {
        self.parse_binary(&[Token::Or], Self::parse_and)
    }

    /// Parse AND expression
    fn parse_and(&mut self) -> ExpressionResult<Node> {
        self.parse_binary(&[Token::And], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> ExpressionResult<Node> {
        self.parse_binary(&[Token::Equal, Token::NotEqual], Self::parse_comparison)
    }

    /// Parse comparison expression
    fn parse_comparison(&mut self) -> ExpressionResult<Node> {
        self.parse_binary(
            &[
                Token::Less,
                Token::Greater,
                Token::LessEqual,
                Token::GreaterEqual,
            ],
            Self::parse_addition,
        )
    }

    /// Parse addition/subtraction expression
    fn parse_addition(&mut self) -> ExpressionResult<Node> {
        self.parse_binary(&[Token::Plus, Token::Minus], Self::parse_multiplication)
    }

    /// Parse multiplication/division/modulo expression
    fn parse_multiplication(&mut self) -> ExpressionResult<Node> {
        self.parse_binary(
            &[Token::Star, Token::Slash, Token::Percent],
            Self::parse_unary,
        )
    }

    /// Parse unary expression
    fn parse_unary(&mut self) -> ExpressionResult<Node> {
        match self.current_token() {
            Token::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Node::unary("-", operand))
            }
            Token::Plus => {
                self.advance();
                self.parse_unary()
            }
            Token::Not => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Node::unary("!", operand))
            }
            _ => self.parse_power(),
        }
    }

    /// Parse exponentiation (right associative, binds tighter than unary minus)
    fn parse_power(&mut self) -> ExpressionResult<Node> {
        let base = self.parse_primary()?;
        if self.match_token(&Token::Caret) {
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(Node::binary("^", base, exponent));
        }
        Ok(base)
    }

    /// Parse primary expression
    fn parse_primary(&mut self) -> ExpressionResult<Node> {
        match self.current_token() {
            Token::Number(n) => {
                let value = n
                    .parse::<f64>()
                    .map_err(|e| self.error(format!("Invalid number {}: {}", n, e)))?;
                self.advance();
                let integer = !n.contains(['.', 'e', 'E']);
                Ok(Node::Literal(Literal::Number { value, integer }))
            }
            Token::String(s) => {
                self.advance();
                Ok(Node::string(s))
            }
            Token::Variable(name) => {
                self.advance();
                Ok(Node::variable(name))
            }
            Token::Macro(name) => {
                self.advance();
                Ok(Node::macro_ref(name))
            }
            Token::Identifier(name) => {
                self.advance();

                // Check for function call
                if self.match_token(&Token::LeftParen) {
                    self.advance();
                    let args = if self.match_token(&Token::RightParen) {
                        vec![]
                    } else {
                        self.parse_expression_list()?
                    };
                    self.expect_token(Token::RightParen)?;
                    Ok(Node::call(name, args))
                } else {
                    Ok(Node::identifier(name))
                }
            }
            Token::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_token(Token::RightParen)?;
                Ok(expr)
            }
            token => Err(self.error(format!("Unexpected token: {:?}", token))),
        }
    }

    /// Parse list of expressions
    fn parse_expression_list(&mut self) -> ExpressionResult<Vec<Node>> {
        let mut expressions = vec![];

        loop {
            expressions.push(self.parse_expression()?);
            if !self.match_token(&Token::Comma) {
                break;
            }
            self.advance();
        }

        Ok(expressions)
    }

    // Helper methods

    /// Get current token
    fn current_token(&self) -> Token {
        self.tokens
            .get(self.position)
            .map(|(t, _)| t.clone())
            .unwrap_or(Token::Eof)
    }

    fn current_position(&self) -> usize {
        self.tokens
            .get(self.position)
            .or(self.tokens.last())
            .map(|(_, p)| *p)
            .unwrap_or(0)
    }

    /// Advance to next token
    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    /// Check if current token matches
    fn match_token(&self, token: &Token) -> bool {
        self.current_token() == *token
    }

    /// Expect a specific token
    fn expect_token(&mut self, token: Token) -> ExpressionResult<()> {
        if self.current_token() == token {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!(
                "Expected {:?}, found {:?}",
                token,
                self.current_token()
            )))
        }
    }

    fn error(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::Syntax {
            position: self.current_position(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Node {
        Parser::new(source).unwrap().parse().unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse("3+4 > 2"),
            Node::binary(
                ">",
                Node::binary("+", Node::integer(3), Node::integer(4)),
                Node::integer(2)
            )
        );
        assert_eq!(parse("1 + 2 * 3").to_string(), "(1 + (2 * 3))");
        assert_eq!(parse("(1 + 2) * 3").to_string(), "((1 + 2) * 3)");
        assert_eq!(parse("a || b && c").to_string(), "(a || (b && c))");
        assert_eq!(parse("a == b < c").to_string(), "(a == (b < c))");
        assert_eq!(parse("10 - 4 - 3").to_string(), "((10 - 4) - 3)");
    }

    #[test]
    fn test_power_and_unary() {
        assert_eq!(parse("2 ^ 3 ^ 2").to_string(), "(2 ^ (3 ^ 2))");
        assert_eq!(parse("-2 ^ 2").to_string(), "-(2 ^ 2)");
        assert_eq!(parse("!missing(x)").to_string(), "!missing(x)");
        assert_eq!(parse("+5"), Node::integer(5));
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse("12"), Node::integer(12));
        assert_eq!(parse("1.5"), Node::double(1.5));
        assert_eq!(parse("1e3"), Node::double(1000.0));
        assert_eq!(parse("\"text\""), Node::string("text"));
    }

    #[test]
    fn test_function_calls() {
        assert_eq!(
            parse("lag(\"x\", 1)"),
            Node::call("lag", vec![Node::string("x"), Node::integer(1)])
        );
        assert_eq!(parse("row_number()"), Node::call("row_number", vec![]));
        assert_eq!(
            parse("concat([first name], %{suffix})"),
            Node::call(
                "concat",
                vec![Node::variable("first name"), Node::macro_ref("suffix")]
            )
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            Parser::new("").unwrap().parse(),
            Err(ExpressionError::Syntax { .. })
        ));
        assert!(matches!(
            Parser::new("1 +").unwrap().parse(),
            Err(ExpressionError::Syntax { position: 3, .. })
        ));
        assert!(Parser::new("f(1, 2").unwrap().parse().is_err());
        assert!(Parser::new("1 2").unwrap().parse().is_err());
        assert!(Parser::new("(1))").unwrap().parse().is_err());
    }
}
