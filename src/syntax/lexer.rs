// Expression lexer - tokenizes expression source text

use super::token::Token;
use crate::expression::{ExpressionError, ExpressionResult};

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let input: Vec<char> = input.chars().collect();
        let current_char = input.first().copied();
        Lexer {
            input,
            position: 0,
            current_char,
        }
    }

    /// Get the next token and the position it starts at
    pub fn next_token(&mut self) -> ExpressionResult<(Token, usize)> {
        self.skip_whitespace();
        let start = self.position;

        let Some(ch) = self.current_char else {
            return Ok((Token::Eof, start));
        };

        let token = match ch {
            '+' => self.single(Token::Plus),
            '-' => self.single(Token::Minus),
            '*' => self.single(Token::Star),
            '/' => self.single(Token::Slash),
            '^' => self.single(Token::Caret),
            '(' => self.single(Token::LeftParen),
            ')' => self.single(Token::RightParen),
            ',' => self.single(Token::Comma),
            '%' => {
                self.advance();
                if self.current_char == Some('{') {
                    self.advance();
                    Token::Macro(self.read_until('}', start, "macro")?)
                } else {
                    Token::Percent
                }
            }
            '=' => {
                self.advance();
                self.expect_char('=', start)?;
                Token::Equal
            }
            '!' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::NotEqual
                } else {
                    Token::Not
                }
            }
            '<' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::LessEqual
                } else {
                    Token::Less
                }
            }
            '>' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::GreaterEqual
                } else {
                    Token::Greater
                }
            }
            '&' => {
                self.advance();
                self.expect_char('&', start)?;
                Token::And
            }
            '|' => {
                self.advance();
                self.expect_char('|', start)?;
                Token::Or
            }
            '[' => {
                self.advance();
                Token::Variable(self.read_until(']', start, "variable name")?)
            }
            '"' => self.read_string(start)?,
            c if c.is_alphabetic() || c == '_' => self.read_identifier(),
            c if c.is_ascii_digit() => self.read_number(),
            c => {
                return Err(ExpressionError::Syntax {
                    position: start,
                    message: format!("Unexpected character '{}'", c),
                })
            }
        };

        Ok((token, start))
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    /// Advance to the next character
    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    /// Peek at the next character without advancing
    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn expect_char(&mut self, expected: char, start: usize) -> ExpressionResult<()> {
        if self.current_char == Some(expected) {
            self.advance();
            Ok(())
        } else {
            Err(ExpressionError::Syntax {
                position: start,
                message: format!("Expected '{}'", expected),
            })
        }
    }

    /// Skip whitespace characters
    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Read an identifier
    fn read_identifier(&mut self) -> Token {
        let mut identifier = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' {
                identifier.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Token::Identifier(identifier)
    }

    /// Read the text up to a closing delimiter (`]` or `}`)
    fn read_until(&mut self, close: char, start: usize, what: &str) -> ExpressionResult<String> {
        let mut text = String::new();

        while let Some(ch) = self.current_char {
            if ch == close {
                self.advance();
                return Ok(text);
            } else if ch == '\\' && self.peek() == Some(close) {
                self.advance();
                text.push(close);
                self.advance();
            } else {
                text.push(ch);
                self.advance();
            }
        }

        Err(ExpressionError::Syntax {
            position: start,
            message: format!("Unterminated {}", what),
        })
    }

    /// Read a double-quoted string literal
    fn read_string(&mut self, start: usize) -> ExpressionResult<Token> {
        self.advance(); // Skip opening quote
        let mut string = String::new();

        while let Some(ch) = self.current_char {
            match ch {
                '"' => {
                    self.advance();
                    return Ok(Token::String(string));
                }
                '\\' => {
                    let escaped = match self.peek() {
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some(other) => {
                            return Err(ExpressionError::Syntax {
                                position: self.position,
                                message: format!("Unknown escape sequence '\\{}'", other),
                            })
                        }
                        None => break,
                    };
                    string.push(escaped);
                    self.advance();
                    self.advance();
                }
                _ => {
                    string.push(ch);
                    self.advance();
                }
            }
        }

        Err(ExpressionError::Syntax {
            position: start,
            message: "Unterminated string literal".to_string(),
        })
    }

    /// Read a number (integer, decimal or with exponent)
    fn read_number(&mut self) -> Token {
        let mut number = String::new();
        let mut has_dot = false;

        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.' && !has_dot && self.peek().is_some_and(|c| c.is_ascii_digit()) {
                has_dot = true;
                number.push(ch);
                self.advance();
            } else if (ch == 'e' || ch == 'E') && self.exponent_follows() {
                number.push(ch);
                self.advance();
                if let Some(sign @ ('+' | '-')) = self.current_char {
                    number.push(sign);
                    self.advance();
                }
                while let Some(digit) = self.current_char.filter(|c| c.is_ascii_digit()) {
                    number.push(digit);
                    self.advance();
                }
                break;
            } else {
                break;
            }
        }

        Token::Number(number)
    }

    fn exponent_follows(&self) -> bool {
        match self.peek() {
            Some(c) if c.is_ascii_digit() => true,
            Some('+' | '-') => self
                .input
                .get(self.position + 2)
                .is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> ExpressionResult<Vec<(Token, usize)>> {
        let mut tokens = Vec::new();

        loop {
            let (token, position) = self.next_token()?;
            if token == Token::Eof {
                tokens.push((token, position));
                break;
            }
            tokens.push((token, position));
        }

        Ok(tokens)
    }
}
