//! Statement-level code generation and control flow.
//!
//! Conditional and loop forms evaluate their controlling expression to a
//! register, emit a branch with a placeholder target, and patch the
//! target once the body's instruction count is known. break/continue
//! search the scope stack for the nearest eligible scope, unwind the
//! stack allocated between here and there, and jump to that scope's
//! begin (continue) or its deferred end (break).

use anyhow::Result;
use parse::ast::{Block, Stmt, StmtKind};
use vm::{AluOp, Instruction, Number, Register, REGISTER_SIZE};

use crate::error::sema_bail;
use crate::result::ExpResult;
use crate::scope::ScopeFlags;
use crate::switch::SwitchStmt;
use crate::CodeGen;
use crate::LABEL_PREFIX;

impl CodeGen {
    pub(crate) fn gen_block(&mut self, block: &Block, flags: ScopeFlags) -> Result<()> {
        self.ctx.begin_scope(flags);
        self.declare_local_variables(&block.decls)?;
        for s in &block.stmts {
            self.gen_statement(s, ScopeFlags::NONE)?;
        }
        self.ctx.end_scope();
        Ok(())
    }

    pub(crate) fn gen_statement(&mut self, stmt: &Stmt, flags: ScopeFlags) -> Result<()> {
        match &stmt.kind {
            StmtKind::Compound(block) => self.gen_block(block, flags)?,
            StmtKind::Expr(None) => {}
            StmtKind::Expr(Some(e)) => {
                let exp = self.eval_expr(e)?;
                self.dealloc_result(&exp);
                assert!(
                    self.ctx.current_function().all_registers_free(),
                    "register leak after expression statement"
                );
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let exp = self.eval_expr(cond)?;
                self.check_not_void(&exp, cond.loc)?;
                if !exp.ty().fits_register() {
                    sema_bail!(cond.loc, "invalid controlling expression");
                }
                let val = exp.get_value(&mut self.ctx);
                self.dealloc_result(&exp);

                match else_branch {
                    None => {
                        self.ctx.emit(Instruction::Not { dst: val, src: val });
                        let branch_at = self.ctx.emit(Instruction::Branch {
                            cond: val,
                            target: 0,
                        });
                        self.ctx.deallocate_register(val);
                        self.gen_statement(then_branch, ScopeFlags::NONE)?;
                        let here = self.ctx.here();
                        self.ctx.patch_to(branch_at, here);
                    }
                    Some(els) => {
                        // Branch on a true condition over the else part,
                        // which is emitted first.
                        let branch_at = self.ctx.emit(Instruction::Branch {
                            cond: val,
                            target: 0,
                        });
                        self.ctx.deallocate_register(val);
                        self.gen_statement(els, ScopeFlags::NONE)?;
                        let jump_at = self.ctx.emit(Instruction::Jump { target: 0 });
                        let here = self.ctx.here();
                        self.ctx.patch_to(branch_at, here);
                        self.gen_statement(then_branch, ScopeFlags::NONE)?;
                        let here = self.ctx.here();
                        self.ctx.patch_to(jump_at, here);
                    }
                }
            }
            StmtKind::While { cond, body } => {
                // The loop scope opens at the condition, so continue
                // re-evaluates it and break skips past the back-jump.
                let scope = self.ctx.begin_scope(ScopeFlags::LOOP);
                let exp = self.eval_expr(cond)?;
                self.check_not_void(&exp, cond.loc)?;
                if !exp.ty().fits_register() {
                    sema_bail!(cond.loc, "invalid controlling expression");
                }
                let val = exp.get_value(&mut self.ctx);
                self.dealloc_result(&exp);
                self.ctx.emit(Instruction::Not { dst: val, src: val });
                let branch_at = self.ctx.emit(Instruction::Branch {
                    cond: val,
                    target: 0,
                });
                self.ctx.deallocate_register(val);
                self.gen_statement(body, ScopeFlags::NONE)?;
                self.ctx.jump_to_scope_begin(scope);
                let here = self.ctx.here();
                self.ctx.patch_to(branch_at, here);
                self.ctx.end_scope();
            }
            StmtKind::DoWhile { body, cond } => {
                let scope = self.ctx.begin_scope(ScopeFlags::LOOP);
                self.gen_statement(body, ScopeFlags::NONE)?;
                let exp = self.eval_expr(cond)?;
                self.check_not_void(&exp, cond.loc)?;
                if !exp.ty().fits_register() {
                    sema_bail!(cond.loc, "invalid controlling expression");
                }
                let val = exp.get_value(&mut self.ctx);
                self.dealloc_result(&exp);
                let begin = self.ctx.scope(scope).begin() as i32;
                let target = begin - self.ctx.here() as i32 - 1;
                self.ctx.emit(Instruction::Branch { cond: val, target });
                self.ctx.deallocate_register(val);
                self.ctx.end_scope();
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                if let Some(e) = init {
                    let exp = self.eval_expr(e)?;
                    self.dealloc_result(&exp);
                }
                // Skip the step expression on the first iteration. The
                // step sits in front of the body, inside its own scope,
                // so continue lands on it instead of past it.
                let step_jump = self.ctx.emit(Instruction::Jump { target: 0 });
                let scope = self.ctx.begin_scope(ScopeFlags::LOOP);
                if let Some(e) = step {
                    let exp = self.eval_expr(e)?;
                    self.dealloc_result(&exp);
                }
                let here = self.ctx.here();
                self.ctx.patch_to(step_jump, here);

                let mut branch_at = None;
                if let Some(e) = cond {
                    let exp = self.eval_expr(e)?;
                    self.check_not_void(&exp, e.loc)?;
                    if !exp.ty().fits_register() {
                        sema_bail!(e.loc, "invalid controlling expression");
                    }
                    let val = exp.get_value(&mut self.ctx);
                    self.dealloc_result(&exp);
                    self.ctx.emit(Instruction::Not { dst: val, src: val });
                    branch_at = Some(self.ctx.emit(Instruction::Branch {
                        cond: val,
                        target: 0,
                    }));
                    self.ctx.deallocate_register(val);
                }

                self.gen_statement(body, ScopeFlags::NONE)?;
                self.ctx.jump_to_scope_begin(scope);
                if let Some(at) = branch_at {
                    let here = self.ctx.here();
                    self.ctx.patch_to(at, here);
                }
                self.ctx.end_scope();
            }
            StmtKind::Switch { cond, body } => self.gen_switch(cond, body, flags, stmt)?,
            StmtKind::Goto(name) => {
                self.ctx.emit(Instruction::JumpLabel {
                    label: format!("{}{}", LABEL_PREFIX, name),
                });
            }
            StmtKind::Label { name, stmt } => {
                self.ctx.emit(Instruction::Label {
                    name: format!("{}{}", LABEL_PREFIX, name),
                });
                self.gen_statement(stmt, ScopeFlags::NONE)?;
            }
            StmtKind::Case { .. } => {
                sema_bail!(stmt.loc, "case label outside a switch");
            }
            StmtKind::Default { .. } => {
                sema_bail!(stmt.loc, "default label outside a switch");
            }
            StmtKind::Continue => {
                let Some(scope) = self.ctx.scope_with(|f| f.can_continue) else {
                    sema_bail!(stmt.loc, "continue outside a for/while statement");
                };
                self.unwind_stack_to(scope);
                self.ctx.jump_to_scope_begin(scope);
            }
            StmtKind::Break => {
                let Some(scope) = self.ctx.scope_with(|f| f.can_break) else {
                    sema_bail!(stmt.loc, "break outside a for/while/switch statement");
                };
                self.unwind_stack_to(scope);
                self.ctx.jump_to_scope_end(scope);
            }
            StmtKind::Return(None) => {
                let frame = self.ctx.current_function().frame_offset();
                let ret_size = self.ctx.current_function().return_value_size();
                self.emit_return_sequence(frame - ret_size, ret_size);
            }
            StmtKind::Return(Some(e)) => {
                let exp = self.eval_expr(e)?;
                self.check_not_void(&exp, e.loc)?;
                let ret_size = self.ctx.current_function().return_value_size();
                if ret_size == 0 {
                    sema_bail!(stmt.loc, "returning a value from a void function");
                }
                let val = exp.get_value(&mut self.ctx);
                let ret_off = self.ctx.current_function().return_value_sp_offset();
                self.ctx.emit(Instruction::Store {
                    src: val,
                    base: Register::Sp,
                    size: ret_size,
                    offset: ret_off,
                });
                self.ctx.deallocate_register(val);

                let frame = self.ctx.current_function().frame_offset();
                self.emit_return_sequence(frame - ret_size, ret_size);

                // The return consumed the expression's slot along with
                // the locals; only the accounting needs adjusting.
                if let ExpResult::Stacked { .. } = exp {
                    let sz = exp.stack_alloc_size();
                    self.ctx.current_function_mut().shrink_frame(sz);
                }
            }
        }
        Ok(())
    }

    /// Drop the locals between here and the return address, then jump
    /// through it. The frame counter is untouched: the instructions are
    /// on this path only.
    fn emit_return_sequence(&mut self, locals: u32, ret_size: u32) {
        let adj = self.ctx.allocate_pr();
        self.ctx.emit(Instruction::Set {
            dst: adj,
            value: Number::Int(locals as i64),
            relocatable: false,
        });
        self.ctx.emit_alu(AluOp::Add, Register::Sp, Register::Sp, adj);
        self.ctx.deallocate_register(adj);

        let addr = self.ctx.allocate_pr();
        self.ctx.emit(Instruction::Load {
            dst: addr,
            base: Register::Sp,
            size: REGISTER_SIZE,
            offset: ret_size,
        });
        self.ctx.emit(Instruction::JumpReg { target: addr });
        self.ctx.deallocate_register(addr);
    }

    /// Emit the stack adjustment a break/continue needs before leaving
    /// for the given scope. The frame counter is untouched: the jump is
    /// path-local.
    fn unwind_stack_to(&mut self, scope: usize) {
        let mem = self.ctx.accumulated_stack(scope);
        if mem > 0 {
            let reg = self.ctx.allocate_pr();
            self.ctx.emit(Instruction::Set {
                dst: reg,
                value: Number::Int(mem as i64),
                relocatable: false,
            });
            self.ctx.emit_alu(AluOp::Add, Register::Sp, Register::Sp, reg);
            self.ctx.deallocate_register(reg);
        }
    }

    // ===== switch =====

    /// Collect the case labels of a switch body without generating code.
    /// Only labels at the body's top level take part in dispatch.
    fn scan_switch(&mut self, body: &Stmt) -> Result<SwitchStmt> {
        let StmtKind::Compound(block) = &body.kind else {
            sema_bail!(body.loc, "invalid switch statement");
        };
        let mut sw = SwitchStmt::new();
        for stmt in &block.stmts {
            let mut s = stmt;
            loop {
                match &s.kind {
                    StmtKind::Case { value, stmt } => {
                        let v = self.constant_expr(value)?;
                        sw.add_case(v, s.loc)?;
                        s = stmt;
                    }
                    StmtKind::Default { stmt } | StmtKind::Label { stmt, .. } => {
                        s = stmt;
                    }
                    _ => break,
                }
            }
        }
        Ok(sw)
    }

    fn gen_switch(
        &mut self,
        cond: &parse::ast::Expr,
        body: &Stmt,
        flags: ScopeFlags,
        stmt: &Stmt,
    ) -> Result<()> {
        let exp = self.eval_expr(cond)?;
        self.check_not_void(&exp, cond.loc)?;

        let mut sw = self.scan_switch(body)?;
        if !sw.is_sequential() {
            sema_bail!(
                stmt.loc,
                "unsupported construct: switch labels do not form a contiguous integer range"
            );
        }
        let (min, max) = sw.bounds();

        let val = exp.get_value(&mut self.ctx);
        let bound = self.ctx.allocate_pr();
        let cmp = self.ctx.allocate_pr();

        // Range check against [min, max]; out of range goes to default.
        self.ctx.emit(Instruction::Set {
            dst: bound,
            value: Number::Int(max),
            relocatable: false,
        });
        self.ctx.emit_alu(AluOp::CmpLt, cmp, bound, val);
        let default_branch_hi = self.ctx.emit(Instruction::Branch { cond: cmp, target: 0 });

        self.ctx.emit(Instruction::Set {
            dst: bound,
            value: Number::Int(min),
            relocatable: false,
        });
        self.ctx.emit_alu(AluOp::CmpLt, cmp, val, bound);
        let default_branch_lo = self.ctx.emit(Instruction::Branch { cond: cmp, target: 0 });

        // Computed jump into the table right below: $pc + (val - min) + 1.
        self.ctx.emit_alu(AluOp::Sub, val, val, bound);
        self.ctx.emit(Instruction::Set {
            dst: cmp,
            value: Number::Int(1),
            relocatable: false,
        });
        self.ctx.emit_alu(AluOp::Add, val, val, cmp);
        self.ctx.emit_alu(AluOp::Add, val, Register::Pc, val);
        self.ctx.emit(Instruction::JumpReg { target: val });

        // One table jump per case, in case order.
        let mut table = Vec::with_capacity((max - min + 1) as usize);
        for _ in min..=max {
            table.push(self.ctx.emit(Instruction::Jump { target: 0 }));
        }

        self.ctx.deallocate_register(val);
        self.ctx.deallocate_register(bound);
        self.ctx.deallocate_register(cmp);

        let body_begin = self.ctx.here();
        self.gen_switch_body(body, &mut sw, flags)?;

        let default_off = sw.default_offset().expect("default offset set by body walk") as usize;
        self.ctx.patch_to(default_branch_hi, body_begin + default_off);
        self.ctx.patch_to(default_branch_lo, body_begin + default_off);
        for (i, at) in table.iter().enumerate() {
            let case_off = sw.case_offset(min + i as i64) as usize;
            self.ctx.patch_to(*at, body_begin + case_off);
        }

        self.dealloc_result(&exp);
        Ok(())
    }

    fn gen_switch_body(&mut self, body: &Stmt, sw: &mut SwitchStmt, flags: ScopeFlags) -> Result<()> {
        let StmtKind::Compound(block) = &body.kind else {
            sema_bail!(body.loc, "invalid switch statement");
        };
        self.ctx.begin_scope(flags.with_break());
        let begin = self.ctx.current_scope().begin();

        self.declare_local_variables(&block.decls)?;

        for stmt in &block.stmts {
            let mut s = stmt;
            // Record offsets for any chain of labels in front of the
            // statement, then generate the statement itself.
            loop {
                match &s.kind {
                    StmtKind::Case { value, stmt } => {
                        let v = self.constant_expr(value)?;
                        let off = (self.ctx.here() - begin) as u32;
                        sw.set_case_offset(v, off);
                        s = stmt;
                    }
                    StmtKind::Default { stmt } => {
                        let off = (self.ctx.here() - begin) as u32;
                        sw.set_default_offset(off);
                        s = stmt;
                    }
                    StmtKind::Label { name, stmt } => {
                        self.ctx.emit(Instruction::Label {
                            name: format!("{}{}", LABEL_PREFIX, name),
                        });
                        s = stmt;
                    }
                    _ => {
                        self.gen_statement(s, ScopeFlags::NONE)?;
                        break;
                    }
                }
            }
        }

        // A switch without a default dispatches past the body.
        if sw.default_offset().is_none() {
            sw.set_default_offset((self.ctx.here() - begin) as u32);
        }
        self.ctx.end_scope();
        Ok(())
    }
}
