//! Built-in function library and the registry the tree builder looks
//! functions up in.

pub mod arithmetic;
pub mod comparison;
pub mod datetime;
pub mod equality;
pub mod logical;
pub mod missing;
pub mod row;
pub mod string;
pub mod subexpression;

use crate::expression::Function;
use std::collections::HashMap;
use std::sync::Arc;

/// Functions by name. Operators are registered under their symbol.
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in operator and function.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        arithmetic::register(&mut registry);
        comparison::register(&mut registry);
        equality::register(&mut registry);
        logical::register(&mut registry);
        missing::register(&mut registry);
        string::register(&mut registry);
        datetime::register(&mut registry);
        subexpression::register(&mut registry);
        row::register(&mut registry);
        registry
    }

    /// Add a function, replacing any function of the same name.
    pub fn register(&mut self, function: Arc<dyn Function>) {
        self.functions.insert(function.name().to_string(), function);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
