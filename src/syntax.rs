// Syntax module - expression source text to parse tree

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{Literal, Node};
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::Token;

use crate::expression::ExpressionResult;

/// Turns expression source text into a parse tree.
///
/// The expression builder only sees this trait, so any front-end producing
/// [`Node`] trees can be plugged in.
pub trait SourceParser: Send + Sync {
    fn parse(&self, source: &str) -> ExpressionResult<Node>;
}

/// The built-in grammar: infix operators, function calls, `[variables]`
/// and `%{macros}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GrammarParser;

impl SourceParser for GrammarParser {
    fn parse(&self, source: &str) -> ExpressionResult<Node> {
        Parser::new(source)?.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grammar_parser() {
        let node = GrammarParser.parse("missing(x) || x > 1").unwrap();
        assert_eq!(node.to_string(), "(missing(x) || (x > 1))");
        assert!(GrammarParser.parse("x >").is_err());
    }
}
