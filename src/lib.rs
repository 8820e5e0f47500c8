pub mod expression;
pub mod syntax;
pub mod table;
