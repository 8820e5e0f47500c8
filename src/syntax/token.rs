// Expression tokens for lexical analysis

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals and names
    Identifier(String),
    Number(String),
    String(String),
    Variable(String),
    Macro(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    And,
    Or,
    Not,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,

    // Special
    Eof,
}

impl Token {
    /// Function name the parser uses for an operator token
    pub fn operator_name(&self) -> Option<&'static str> {
        match self {
            Token::Plus => Some("+"),
            Token::Minus => Some("-"),
            Token::Star => Some("*"),
            Token::Slash => Some("/"),
            Token::Percent => Some("%"),
            Token::Caret => Some("^"),
            Token::Equal => Some("=="),
            Token::NotEqual => Some("!="),
            Token::Less => Some("<"),
            Token::Greater => Some(">"),
            Token::LessEqual => Some("<="),
            Token::GreaterEqual => Some(">="),
            Token::And => Some("&&"),
            Token::Or => Some("||"),
            Token::Not => Some("!"),
            _ => None,
        }
    }
}
