//! Semantic analysis and code generation.
//!
//! Turns a parsed translation unit into a [`vm::Program`]: a static-data
//! image plus a linear instruction stream for the register machine. The
//! walk is a single recursive pass over the AST; expression evaluation
//! folds constants where it can and otherwise works an evaluation stack
//! whose slots and registers follow a strict LIFO discipline.
//!
//! Semantic errors are returned as located `anyhow` errors and abort the
//! unit; violations of internal invariants (register-pool exhaustion,
//! unbalanced frames) panic. There is no spilling: each function has 8
//! general-purpose and 4 floating-point registers, which bounds
//! expression depth at around eight live temporaries.

mod context;
mod decl;
mod declarator;
mod error;
mod expr;
mod function;
mod literal;
mod result;
mod scope;
mod stmt;
mod switch;
mod symbols;
mod typedefs;
mod types;

pub use context::{Context, START_FUNC};
pub use function::Function;
pub use result::ExpResult;
pub use scope::{Scope, ScopeFlags};
pub use switch::SwitchStmt;
pub use symbols::{FuncId, Storage, SymbolManager, Variable};
pub use typedefs::TypedefManager;
pub use types::{resulting_type, FunctionType, Primitive, Type, TypeKind};

use anyhow::Result;
use vm::Program;

/// Prefix for user goto labels, keeping them clear of function symbols.
pub(crate) const LABEL_PREFIX: &str = ".L.";

/// One in-progress compilation of one translation unit.
pub struct CodeGen {
    pub(crate) ctx: Context,
}

impl Default for CodeGen {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGen {
    pub fn new() -> Self {
        CodeGen {
            ctx: Context::new(),
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn into_program(self) -> Program {
        self.ctx.into_program()
    }
}

/// Compile a parsed translation unit.
pub fn compile(tu: &parse::TranslationUnit) -> Result<Program> {
    let mut cg = CodeGen::new();
    cg.translation_unit(tu)?;
    Ok(cg.into_program())
}

/// Parse and compile a source string.
pub fn compile_source(src: &str) -> Result<Program> {
    let tu = parse::parse_translation_unit(src)?;
    compile(&tu)
}
