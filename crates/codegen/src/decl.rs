//! Translation-unit walk: global declarations, function definitions,
//! local variables and initializers.
//!
//! Code emitted outside any function body (global initializers) is
//! accounted to the synthetic `_start` function. Function definitions
//! follow the frame protocol: reserve the return-value slot, copy the
//! caller-pushed parameters into own frame slots, generate the body,
//! then synthesize the fall-through return.

use anyhow::Result;
use lex::Loc;
use parse::ast;
use tracing::debug;
use vm::{Instruction, Register, REGISTER_SIZE};

use crate::error::sema_bail;
use crate::scope::ScopeFlags;
use crate::symbols::{FuncId, Storage, Variable};
use crate::types::{FunctionType, Type, TypeKind};
use crate::CodeGen;

impl CodeGen {
    pub fn translation_unit(&mut self, tu: &ast::TranslationUnit) -> Result<()> {
        for item in &tu.items {
            match item {
                ast::ExternalDecl::Function(f) => self.function_definition(f)?,
                ast::ExternalDecl::Declaration(d) => self.declare_global(d)?,
            }
        }
        debug!(
            instructions = self.ctx.here(),
            static_bytes = self.ctx.static_memory().len(),
            "translation unit compiled"
        );
        Ok(())
    }

    fn declare_global(&mut self, decl: &ast::Declaration) -> Result<()> {
        let base = self.resolve_base_type(&decl.specs, decl.loc)?;
        for d in &decl.declarators {
            let (name, ty) = self.resolve_declarator(&base, d)?;
            let Some(name) = name else {
                sema_bail!(d.loc, "declaration does not declare anything");
            };
            if decl.specs.is_typedef {
                self.ctx.typedefs_mut().define(&name, ty, d.loc)?;
                continue;
            }
            if let TypeKind::Function(ft) = &ty.kind {
                self.declare_function(&name, ft.clone(), d.loc)?;
                continue;
            }
            self.declare_global_variable(&name, ty, d)?;
        }
        Ok(())
    }

    /// Register a function prototype, unifying with any previous
    /// declaration of the same name.
    fn declare_function(&mut self, name: &str, ty: FunctionType, loc: Loc) -> Result<FuncId> {
        if let Some(id) = self.ctx.symbols().function_id(name) {
            let existing = self.ctx.function(id).ty().clone();
            if *existing.ret != *ty.ret {
                sema_bail!(loc, "conflicting return type for '{}'", name);
            }
            if existing.resolved && ty.resolved {
                if existing.params != ty.params || existing.variadic != ty.variadic {
                    sema_bail!(loc, "conflicting declaration of function '{}'", name);
                }
            } else if !existing.resolved && ty.resolved {
                *self.ctx.function_mut(id).ty_mut() = ty;
            }
            return Ok(id);
        }
        let id = self.ctx.add_function(name);
        self.ctx.function_mut(id).set_ty(ty);
        self.ctx.symbols_mut().add_function(name, id);
        Ok(id)
    }

    fn declare_global_variable(&mut self, name: &str, ty: Type, d: &ast::Declarator) -> Result<()> {
        let Some(size) = ty.storage_size() else {
            sema_bail!(d.loc, "array '{}' has unknown size", name);
        };
        if size == 0 {
            sema_bail!(d.loc, "variable '{}' has incomplete type", name);
        }
        let pos = self.ctx.static_alloc(size);
        let var = Variable {
            ty,
            storage: Storage::Global,
            position: pos,
        };
        self.ctx
            .symbols_mut()
            .add_global_variable(name, var.clone(), d.loc)?;
        if let Some(init) = &d.init {
            self.gen_initializer(init, &var, d.loc)?;
        }
        Ok(())
    }

    pub(crate) fn declare_local_variables(&mut self, decls: &[ast::Declaration]) -> Result<()> {
        for decl in decls {
            let base = self.resolve_base_type(&decl.specs, decl.loc)?;
            if decl.specs.is_typedef {
                for d in &decl.declarators {
                    let (name, ty) = self.resolve_declarator(&base, d)?;
                    let Some(name) = name else {
                        sema_bail!(d.loc, "typedef requires a name");
                    };
                    self.ctx.typedefs_mut().define(&name, ty, d.loc)?;
                }
                continue;
            }
            if decl.specs.is_static {
                sema_bail!(decl.loc, "unsupported construct: static local variables");
            }
            for d in &decl.declarators {
                let (name, ty) = self.resolve_declarator(&base, d)?;
                let Some(name) = name else {
                    sema_bail!(d.loc, "declaration does not declare anything");
                };
                if let TypeKind::Function(ft) = &ty.kind {
                    // A block-scope prototype still declares the global
                    // function.
                    self.declare_function(&name, ft.clone(), d.loc)?;
                    continue;
                }
                let Some(size) = ty.storage_size() else {
                    sema_bail!(d.loc, "array '{}' has unknown size", name);
                };
                if size == 0 {
                    sema_bail!(d.loc, "variable '{}' has incomplete type", name);
                }
                self.ctx.current_scope_mut().allocate_stack(size);
                self.ctx.allocate_stack(size);
                let pos = self.ctx.current_function().frame_offset();
                let var = Variable {
                    ty,
                    storage: Storage::Local,
                    position: pos,
                };
                self.ctx.symbols_mut().add_variable(&name, var.clone(), d.loc)?;
                if let Some(init) = &d.init {
                    self.gen_initializer(init, &var, d.loc)?;
                }
            }
        }
        Ok(())
    }

    fn gen_initializer(&mut self, init: &ast::Initializer, var: &Variable, loc: Loc) -> Result<()> {
        match init {
            ast::Initializer::Expr(e) => {
                let exp = self.eval_expr(e)?;
                self.check_not_void(&exp, loc)?;
                if !var.ty.fits_register() {
                    sema_bail!(loc, "invalid initialization");
                }
                if !exp.ty().allow_implicit_cast_to(&var.ty) {
                    sema_bail!(
                        loc,
                        "invalid implicit conversion from '{}' to '{}'",
                        exp.ty(),
                        var.ty
                    );
                }
                let val = exp.get_value(&mut self.ctx);
                let addr = self.variable_addr(var);
                self.ctx.emit(Instruction::Store {
                    src: val,
                    base: addr,
                    size: var.ty.size(),
                    offset: 0,
                });
                self.ctx.deallocate_register(val);
                self.ctx.deallocate_register(addr);
                self.dealloc_result(&exp);
                Ok(())
            }
            ast::Initializer::List(_) => {
                sema_bail!(loc, "unsupported construct: initializer lists")
            }
        }
    }

    fn function_definition(&mut self, fdef: &ast::FunctionDef) -> Result<()> {
        let loc = fdef.loc;
        let base = self.resolve_base_type(&fdef.specs, loc)?;
        let (name, ty) = self.resolve_declarator(&base, &fdef.declarator)?;
        let Some(name) = name else {
            sema_bail!(loc, "function definition requires a name");
        };
        let TypeKind::Function(mut impl_ty) = ty.kind else {
            sema_bail!(loc, "invalid function definition");
        };
        // A definition always fixes the parameter list, even the
        // empty-parens form.
        if !impl_ty.resolved {
            impl_ty.params = Vec::new();
            impl_ty.resolved = true;
        }

        let Some(ast::TypeModifier::FunctionOf { params, .. }) = fdef.declarator.modifiers.first()
        else {
            sema_bail!(loc, "invalid function definition");
        };
        let named_params = self.resolve_param_names(params, loc)?;

        // Unify with a previous declaration of the same name.
        match self.ctx.symbols().function_id(&name) {
            Some(id) => {
                let decl_ty = self.ctx.function(id).ty().clone();
                if *decl_ty.ret != *impl_ty.ret {
                    sema_bail!(loc, "conflicting return type for '{}'", name);
                }
                if decl_ty.resolved {
                    if decl_ty.params != impl_ty.params {
                        sema_bail!(loc, "conflicting parameter types for '{}'", name);
                    }
                } else {
                    *self.ctx.function_mut(id).ty_mut() = impl_ty.clone();
                }
            }
            None => {
                self.declare_function(&name, impl_ty.clone(), loc)?;
            }
        }

        let id = self.ctx.begin_function(&name);
        if self.ctx.function(id).was_implemented() {
            sema_bail!(loc, "redefinition of function '{}'", name);
        }
        self.ctx.function_mut(id).set_implemented();

        self.ctx.emit(Instruction::Label { name: name.clone() });

        // The return-value slot sits directly below the return address,
        // before any parameter or local.
        let ret_size = self.ctx.function(id).return_value_size();
        if ret_size > 0 {
            self.ctx.allocate_stack(ret_size);
        }

        // A scope of its own for the parameters, so closing it emits
        // their deallocation.
        self.ctx.begin_scope(ScopeFlags::NONE);
        self.allocate_parameters(&named_params, loc)?;
        self.gen_block(&fdef.body, ScopeFlags::NONE)?;
        self.ctx.end_scope();

        // Fall-through return: load the return address into $pc.
        let offset = self.ctx.current_function().frame_offset();
        self.ctx.emit(Instruction::Load {
            dst: Register::Pc,
            base: Register::Sp,
            size: REGISTER_SIZE,
            offset,
        });

        self.ctx.end_function();
        Ok(())
    }

    /// Copy the caller-pushed arguments into this function's own frame
    /// slots. The caller left them above the return address and the
    /// argument count, first parameter nearest the frame base.
    fn allocate_parameters(&mut self, params: &[(String, Type)], loc: Loc) -> Result<()> {
        let mut base_offset: i64 = -2 * REGISTER_SIZE as i64;
        for (name, ty) in params {
            // Array parameters decay to pointers.
            let ty = match &ty.kind {
                TypeKind::Array { elem, .. } => Type::pointer((**elem).clone()),
                _ => ty.clone(),
            };
            let size = ty.size();
            if size == 0 {
                sema_bail!(loc, "parameter '{}' has incomplete type", name);
            }
            self.ctx.current_scope_mut().allocate_stack(size);
            self.ctx.allocate_stack(size);
            let pos = self.ctx.current_function().frame_offset();
            let var = Variable {
                ty,
                storage: Storage::Local,
                position: pos,
            };
            self.ctx.symbols_mut().add_variable(name, var, loc)?;

            let val = self.ctx.allocate_pr();
            self.ctx.emit(Instruction::Load {
                dst: val,
                base: Register::Sp,
                size,
                offset: (pos as i64 - base_offset) as u32,
            });
            self.ctx.emit(Instruction::Store {
                src: val,
                base: Register::Sp,
                size,
                offset: 0,
            });
            self.ctx.deallocate_register(val);

            base_offset -= size as i64;
        }
        Ok(())
    }
}
