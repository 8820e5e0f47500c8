//! Expression types and their compatibility rules.

use std::fmt;

/// Types an expression (or any of its sub-expressions) can evaluate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionType {
    Integer,
    Double,
    String,
    Boolean,
    Instant,
    LocalTime,
    StringSet,
    StringList,
}

impl ExpressionType {
    /// All types, in declaration order.
    pub const ALL: [ExpressionType; 8] = [
        ExpressionType::Integer,
        ExpressionType::Double,
        ExpressionType::String,
        ExpressionType::Boolean,
        ExpressionType::Instant,
        ExpressionType::LocalTime,
        ExpressionType::StringSet,
        ExpressionType::StringList,
    ];

    /// The name used for this type when it is passed as a type constant,
    /// e.g. `eval(source, DOUBLE)` or `lag("x", 1, "STRING")`.
    pub fn constant_name(&self) -> &'static str {
        match self {
            ExpressionType::Integer => "INTEGER",
            ExpressionType::Double => "DOUBLE",
            ExpressionType::String => "STRING",
            ExpressionType::Boolean => "BOOLEAN",
            ExpressionType::Instant => "INSTANT",
            ExpressionType::LocalTime => "LOCAL_TIME",
            ExpressionType::StringSet => "STRING_SET",
            ExpressionType::StringList => "STRING_LIST",
        }
    }

    /// Look up a type by its constant name (case-insensitive).
    pub fn from_constant_name(name: &str) -> Option<ExpressionType> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.constant_name().eq_ignore_ascii_case(name))
    }

    /// INTEGER and DOUBLE share the numeric representation.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ExpressionType::Integer | ExpressionType::Double)
    }
}

impl fmt::Display for ExpressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.constant_name())
    }
}

/// Combine two types into their common type.
///
/// INTEGER widens to DOUBLE; identical types stay as they are. Every other
/// pair is incompatible and the caller reports its own error.
pub fn widen(a: ExpressionType, b: ExpressionType) -> Option<ExpressionType> {
    match (a, b) {
        (ExpressionType::Integer, ExpressionType::Double)
        | (ExpressionType::Double, ExpressionType::Integer) => Some(ExpressionType::Double),
        (a, b) if a == b => Some(a),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widen() {
        assert_eq!(
            widen(ExpressionType::Integer, ExpressionType::Double),
            Some(ExpressionType::Double)
        );
        assert_eq!(
            widen(ExpressionType::Double, ExpressionType::Integer),
            Some(ExpressionType::Double)
        );
        assert_eq!(
            widen(ExpressionType::Double, ExpressionType::Double),
            Some(ExpressionType::Double)
        );
        assert_eq!(
            widen(ExpressionType::Integer, ExpressionType::Integer),
            Some(ExpressionType::Integer)
        );
        assert_eq!(widen(ExpressionType::String, ExpressionType::Double), None);
        assert_eq!(widen(ExpressionType::Boolean, ExpressionType::Integer), None);
        assert_eq!(widen(ExpressionType::Instant, ExpressionType::LocalTime), None);
    }

    #[test]
    fn test_constant_names() {
        for t in ExpressionType::ALL {
            assert_eq!(ExpressionType::from_constant_name(t.constant_name()), Some(t));
        }
        assert_eq!(
            ExpressionType::from_constant_name("local_time"),
            Some(ExpressionType::LocalTime)
        );
        assert_eq!(ExpressionType::from_constant_name("REAL"), None);
        assert_eq!(ExpressionType::StringSet.to_string(), "STRING_SET");
    }

    #[test]
    fn test_is_numeric() {
        assert!(ExpressionType::Integer.is_numeric());
        assert!(ExpressionType::Double.is_numeric());
        assert!(!ExpressionType::String.is_numeric());
        assert!(!ExpressionType::Instant.is_numeric());
    }
}
