//! Macro-expander registry hook.
//!
//! Macros operate on unevaluated AST (`Expr` values) and return AST; the
//! expander runs before lowering, outside the core. The core only owns the
//! registry the external expander consults, plus the `gensym` counter
//! hygiene rewrites draw from. Macro bodies themselves (the `@test` family,
//! `@kwdef`, string macros) live with the expander.

use std::collections::HashMap;

use crate::vm::value::{ExprValue, Value};

/// A macro implementation: AST in, AST out.
pub type MacroFn = fn(&ExprValue) -> Result<Value, String>;

#[derive(Debug, Default)]
pub struct MacroRegistry {
    map: HashMap<String, MacroFn>,
    gensym_counter: u64,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `@name`. Re-registration replaces the prior expander.
    pub fn register(&mut self, name: &str, f: MacroFn) {
        self.map.insert(name.to_string(), f);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Expand one macro call. `Ok(None)` means the macro is unknown (the
    /// expander reports that at the call site).
    pub fn expand(&self, name: &str, input: &ExprValue) -> Option<Result<Value, String>> {
        self.map.get(name).map(|f| f(input))
    }

    /// A fresh unique identifier for hygiene rewrites.
    pub fn gensym(&mut self) -> String {
        self.gensym_counter += 1;
        format!("#gensym#{}", self.gensym_counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::value::SymbolValue;

    fn identity_macro(input: &ExprValue) -> Result<Value, String> {
        Ok(Value::Expr(Box::new(input.clone())))
    }

    #[test]
    fn test_register_and_expand() {
        let mut reg = MacroRegistry::new();
        reg.register("identity", identity_macro);
        let input = ExprValue {
            head: SymbolValue::new("call"),
            args: vec![Value::Sym(SymbolValue::new("f"))],
        };
        let expanded = reg.expand("identity", &input).unwrap().unwrap();
        assert_eq!(expanded, Value::Expr(Box::new(input)));
        assert!(reg.expand("unknown", &ExprValue {
            head: SymbolValue::new("call"),
            args: vec![],
        })
        .is_none());
    }

    #[test]
    fn test_gensym_is_unique() {
        let mut reg = MacroRegistry::new();
        let a = reg.gensym();
        let b = reg.gensym();
        assert_ne!(a, b);
    }
}
