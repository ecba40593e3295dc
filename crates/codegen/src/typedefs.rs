//! Typedef registry, keyed by lexical scope depth.
//!
//! The scope stack is pushed and popped in lockstep with block
//! delimiters; the parser consults a name-only shadow of this registry
//! while tokens are still being classified.

use anyhow::Result;
use lex::Loc;
use std::collections::HashMap;

use crate::error::sema_bail;
use crate::types::Type;

pub struct TypedefManager {
    scopes: Vec<HashMap<String, Type>>,
}

impl Default for TypedefManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TypedefManager {
    pub fn new() -> Self {
        TypedefManager {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn scope_begin(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn scope_end(&mut self) {
        self.scopes.pop();
        if self.scopes.is_empty() {
            // An unbalanced '}' cannot leave the registry empty; the
            // parser reports the syntax error itself.
            self.scope_begin();
        }
    }

    pub fn is_type(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|s| s.contains_key(name))
    }

    pub fn type_of(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    /// Register a typedef in the current scope. Shadowing an outer scope
    /// is allowed; redefining within the same scope is not.
    pub fn define(&mut self, name: &str, ty: Type, loc: Loc) -> Result<()> {
        let scope = self.scopes.last_mut().expect("typedef scope stack empty");
        if scope.contains_key(name) {
            sema_bail!(loc, "redefinition of typedef '{}'", name);
        }
        scope.insert(name.to_string(), ty);
        Ok(())
    }
}
