//! Symbol and scope management: a global table plus a stack of
//! block-local tables, searched innermost first.
//!
//! Functions live in an arena owned by the [`Context`](crate::Context);
//! the global table maps names to arena handles, so a forward
//! declaration and a later definition share one `Function`.

use anyhow::Result;
use lex::Loc;
use std::collections::HashMap;

use crate::error::sema_bail;
use crate::types::Type;

pub type FuncId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Global,
    Local,
}

/// A declared variable: its type, storage class, and position — a byte
/// offset into static memory for globals, or the frame-base offset at
/// which the variable was allocated for locals.
#[derive(Debug, Clone)]
pub struct Variable {
    pub ty: Type,
    pub storage: Storage,
    pub position: u32,
}

pub struct SymbolManager {
    // tables[0] is the global table.
    tables: Vec<HashMap<String, Variable>>,
    functions: HashMap<String, FuncId>,
}

impl Default for SymbolManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolManager {
    pub fn new() -> Self {
        SymbolManager {
            tables: vec![HashMap::new()],
            functions: HashMap::new(),
        }
    }

    pub fn scope_begin(&mut self) {
        self.tables.push(HashMap::new());
    }

    pub fn scope_end(&mut self) {
        self.tables.pop();
        assert!(!self.tables.is_empty(), "popped the global symbol table");
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.tables.iter().rev().any(|t| t.contains_key(name))
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.tables.iter().rev().find_map(|t| t.get(name))
    }

    /// Declare a variable in the innermost table. Shadowing an outer
    /// scope is fine; redeclaring within the same table is an error.
    pub fn add_variable(&mut self, name: &str, var: Variable, loc: Loc) -> Result<()> {
        let table = self.tables.last_mut().expect("symbol table stack empty");
        if table.contains_key(name) {
            sema_bail!(loc, "redeclaration of '{}'", name);
        }
        table.insert(name.to_string(), var);
        Ok(())
    }

    /// Declare a variable in the global table regardless of the current
    /// scope depth.
    pub fn add_global_variable(&mut self, name: &str, var: Variable, loc: Loc) -> Result<()> {
        let table = &mut self.tables[0];
        if table.contains_key(name) {
            sema_bail!(loc, "redeclaration of '{}'", name);
        }
        table.insert(name.to_string(), var);
        Ok(())
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn function_id(&self, name: &str) -> Option<FuncId> {
        self.functions.get(name).copied()
    }

    pub fn add_function(&mut self, name: &str, id: FuncId) {
        let prev = self.functions.insert(name.to_string(), id);
        assert!(prev.is_none(), "function '{}' registered twice", name);
    }
}
