//! Parse tree consumed by the expression builder.

use std::fmt;

/// Literal constant in an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Numeric literal; `integer` is set for literals written without
    /// fraction or exponent.
    Number { value: f64, integer: bool },
    String(String),
}

/// Expression tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(Literal),

    /// Bare identifier: a variable if a resolver knows it, otherwise a
    /// built-in constant.
    Identifier(String),

    /// `[name]`: always a variable.
    Variable(String),

    /// `%{name}`
    Macro(String),

    /// Operator or function call. Operators use their symbol as name.
    Call { name: String, args: Vec<Node> },
}

impl Node {
    pub fn integer(value: i64) -> Self {
        Node::Literal(Literal::Number {
            value: value as f64,
            integer: true,
        })
    }

    pub fn double(value: f64) -> Self {
        Node::Literal(Literal::Number {
            value,
            integer: false,
        })
    }

    pub fn string(value: impl Into<String>) -> Self {
        Node::Literal(Literal::String(value.into()))
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Node::Identifier(name.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Node::Variable(name.into())
    }

    pub fn macro_ref(name: impl Into<String>) -> Self {
        Node::Macro(name.into())
    }

    pub fn call(name: impl Into<String>, args: Vec<Node>) -> Self {
        Node::Call {
            name: name.into(),
            args,
        }
    }

    pub fn binary(op: &str, left: Node, right: Node) -> Self {
        Self::call(op, vec![left, right])
    }

    pub fn unary(op: &str, operand: Node) -> Self {
        Self::call(op, vec![operand])
    }
}

fn is_operator(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| c.is_alphanumeric() || c == '_')
}

fn write_escaped(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in text.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Literal(Literal::Number { value, integer }) => {
                if *integer {
                    write!(f, "{}", *value as i64)
                } else {
                    write!(f, "{:?}", value)
                }
            }
            Node::Literal(Literal::String(s)) => write_escaped(f, s),
            Node::Identifier(name) => f.write_str(name),
            Node::Variable(name) => write!(f, "[{}]", name),
            Node::Macro(name) => write!(f, "%{{{}}}", name),
            Node::Call { name, args } if is_operator(name) && args.len() == 2 => {
                write!(f, "({} {} {})", args[0], name, args[1])
            }
            Node::Call { name, args } if is_operator(name) && args.len() == 1 => {
                write!(f, "{}{}", name, args[0])
            }
            Node::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_builders() {
        assert_eq!(
            Node::integer(3),
            Node::Literal(Literal::Number {
                value: 3.0,
                integer: true
            })
        );
        let call = Node::binary("+", Node::integer(1), Node::identifier("x"));
        match call {
            Node::Call { name, args } => {
                assert_eq!(name, "+");
                assert_eq!(args.len(), 2);
            }
            _ => panic!("Expected call node"),
        }
    }

    #[test]
    fn test_display() {
        let node = Node::binary(
            ">",
            Node::binary("+", Node::integer(3), Node::double(4.5)),
            Node::variable("my col"),
        );
        assert_eq!(node.to_string(), "((3 + 4.5) > [my col])");

        let node = Node::call(
            "lag",
            vec![Node::string("x \"q\""), Node::unary("-", Node::integer(1))],
        );
        assert_eq!(node.to_string(), "lag(\"x \\\"q\\\"\", -1)");
        assert_eq!(Node::macro_ref("m").to_string(), "%{m}");
        assert_eq!(Node::call("row_number", vec![]).to_string(), "row_number()");
    }
}
