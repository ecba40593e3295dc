//! Expression evaluation and code generation.
//!
//! Every handler follows the evaluation-stack protocol: operands fold to
//! constants when possible, otherwise they are materialized into
//! registers, combined, and the result is pushed onto the evaluation
//! stack; consumed operand slots are deallocated exactly once, in
//! reverse push order, before the handler returns.

use anyhow::Result;
use lex::Loc;
use parse::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use vm::{AluOp, Instruction, Number, Register, REGISTER_SIZE};

use crate::error::sema_bail;
use crate::literal;
use crate::result::ExpResult;
use crate::symbols::{Storage, Variable};
use crate::types::{resulting_type, Primitive, Type, TypeKind};
use crate::CodeGen;

fn bool_ty() -> Type {
    Type::primitive(Primitive::Bool)
}

impl CodeGen {
    pub(crate) fn check_not_void(&self, exp: &ExpResult, loc: Loc) -> Result<()> {
        if exp.is_void() {
            sema_bail!(loc, "void value not ignored as it ought to be");
        }
        Ok(())
    }

    /// Release the stack slot a consumed result occupies.
    pub(crate) fn dealloc_result(&mut self, exp: &ExpResult) {
        if let ExpResult::Stacked {
            needs_dealloc: true, ..
        } = exp
        {
            self.ctx.deallocate_stack(exp.stack_alloc_size());
        }
    }

    /// Push a register onto the evaluation stack and wrap it as a
    /// stacked result; the register is released.
    fn push_value(&mut self, reg: Register, size: u32, ty: Type, indirect: bool) -> ExpResult {
        self.ctx.stack_push(reg, size);
        self.ctx.deallocate_register(reg);
        ExpResult::Stacked {
            ty,
            offset: self.ctx.current_function().frame_offset(),
            needs_dealloc: true,
            indirect,
        }
    }

    pub(crate) fn variable_addr(&mut self, var: &Variable) -> Register {
        let reg = self.ctx.allocate_pr();
        match var.storage {
            Storage::Global => {
                self.ctx.emit(Instruction::Set {
                    dst: reg,
                    value: Number::Int(var.position as i64),
                    relocatable: true,
                });
                self.ctx.emit_alu(AluOp::Add, reg, Register::Gp, reg);
            }
            Storage::Local => {
                let frame = self.ctx.current_function().frame_offset();
                assert!(frame >= var.position, "local above the stack pointer");
                self.ctx.emit(Instruction::Set {
                    dst: reg,
                    value: Number::Int((frame - var.position) as i64),
                    relocatable: false,
                });
                self.ctx.emit_alu(AluOp::Add, reg, reg, Register::Sp);
            }
        }
        reg
    }

    pub fn eval_expr(&mut self, e: &Expr) -> Result<ExpResult> {
        match &e.kind {
            ExprKind::Ident(name) => self.eval_ident(name, e.loc),
            ExprKind::IntLit { base, repr } => {
                let (ty, value) = literal::int_literal(*base, repr, e.loc)?;
                Ok(ExpResult::Constant { ty, value })
            }
            ExprKind::FloatLit { repr } => {
                let (ty, value) = literal::float_literal(repr, e.loc)?;
                Ok(ExpResult::Constant { ty, value })
            }
            ExprKind::CharLit { repr } => {
                let (ty, value) = literal::char_literal(repr, e.loc)?;
                Ok(ExpResult::Constant { ty, value })
            }
            ExprKind::StrLit { repr } => {
                let bytes = literal::string_literal(repr, e.loc)?;
                let reg = self.ctx.allocate_string(&bytes);
                let ty = Type::pointer(Type::primitive(Primitive::Char));
                Ok(self.push_value(reg, REGISTER_SIZE, ty, false))
            }
            ExprKind::Unary { op, expr } => self.eval_unary(*op, expr, e.loc),
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, e.loc),
            ExprKind::IncDec { pre, inc, target } => self.eval_incdec(*pre, *inc, target, e.loc),
            ExprKind::Assign { op, lhs, rhs } => self.eval_assign(*op, lhs, rhs, e.loc),
            ExprKind::Cond {
                cond,
                then_e,
                else_e,
            } => self.eval_cond(cond, then_e, else_e, e.loc),
            ExprKind::Comma { lhs, rhs } => {
                let first = self.eval_expr(lhs)?;
                self.dealloc_result(&first);
                self.eval_expr(rhs)
            }
            ExprKind::Cast { ty, expr } => self.eval_cast(ty, expr, e.loc),
            ExprKind::SizeofExpr(expr) => {
                let exp = self.eval_expr(expr)?;
                self.check_not_void(&exp, e.loc)?;
                let size = exp.ty().size();
                self.dealloc_result(&exp);
                Ok(ExpResult::Constant {
                    ty: Type::primitive(Primitive::UInt),
                    value: Number::Int(size as i64),
                })
            }
            ExprKind::SizeofType(tn) => {
                let ty = self.resolve_type_name(tn, e.loc)?;
                Ok(ExpResult::Constant {
                    ty: Type::primitive(Primitive::UInt),
                    value: Number::Int(ty.size() as i64),
                })
            }
            ExprKind::Call { callee, args } => self.eval_call(callee, args, e.loc),
            ExprKind::Index { base, index } => self.eval_index(base, index, e.loc),
            ExprKind::Member { .. } => {
                sema_bail!(e.loc, "unsupported construct: struct/union member access")
            }
        }
    }

    /// Evaluate an expression that must fold to a compile-time constant.
    pub(crate) fn constant_expr(&mut self, e: &Expr) -> Result<Number> {
        let res = self.eval_expr(e)?;
        match res {
            ExpResult::Constant { value, .. } => Ok(value),
            _ => sema_bail!(e.loc, "expected constant expression"),
        }
    }

    fn eval_ident(&mut self, name: &str, loc: Loc) -> Result<ExpResult> {
        if let Some(var) = self.ctx.symbols().variable(name).cloned() {
            let reg = self.variable_addr(&var);
            // Arrays are used through their address, so the pushed
            // address is already the value; everything else is a
            // pointer to the variable.
            let indirect = !matches!(var.ty.kind, TypeKind::Array { .. });
            let ty = var.ty.clone();
            return Ok(self.push_value(reg, REGISTER_SIZE, ty, indirect));
        }
        if let Some(id) = self.ctx.symbols().function_id(name) {
            let ty = Type::function(self.ctx.function(id).ty().clone());
            let reg = self.ctx.allocate_pr();
            self.ctx.emit(Instruction::LoadAddr {
                dst: reg,
                label: name.to_string(),
            });
            return Ok(self.push_value(reg, REGISTER_SIZE, ty, false));
        }
        sema_bail!(loc, "use of undefined identifier '{}'", name)
    }

    fn eval_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr, loc: Loc) -> Result<ExpResult> {
        use BinaryOp::*;

        let a = self.eval_expr(lhs)?;
        self.check_not_void(&a, lhs.loc)?;
        let b = self.eval_expr(rhs)?;
        self.check_not_void(&b, rhs.loc)?;

        let int_only = matches!(op, Mod | Shl | Shr | BitAnd | BitOr | BitXor);
        if int_only && (a.ty().is_floating_point() || b.ty().is_floating_point()) {
            sema_bail!(loc, "invalid floating-point operand to integer operator");
        }

        if a.is_constant() && b.is_constant() {
            let va = a.constant();
            let vb = b.constant();
            if matches!(op, Div | Mod) && vb.is_int() && va.is_int() && vb.int_value() == 0 {
                sema_bail!(loc, "division by zero in constant expression");
            }
            let (ty, value) = match op {
                Add => (resulting_type(a.ty(), b.ty(), loc)?, va.add(vb)),
                Sub => (resulting_type(a.ty(), b.ty(), loc)?, va.sub(vb)),
                Mul => (resulting_type(a.ty(), b.ty(), loc)?, va.mul(vb)),
                Div => (resulting_type(a.ty(), b.ty(), loc)?, va.div(vb)),
                Mod => (resulting_type(a.ty(), b.ty(), loc)?, va.rem(vb)),
                BitAnd => (resulting_type(a.ty(), b.ty(), loc)?, va.bit_and(vb)),
                BitOr => (resulting_type(a.ty(), b.ty(), loc)?, va.bit_or(vb)),
                BitXor => (resulting_type(a.ty(), b.ty(), loc)?, va.bit_xor(vb)),
                Shl => (a.ty().clone(), va.shl(vb)),
                Shr => (a.ty().clone(), va.shr(vb)),
                Lt => (bool_ty(), Number::Int(va.lt(vb) as i64)),
                Gt => (bool_ty(), Number::Int(vb.lt(va) as i64)),
                Le => (bool_ty(), Number::Int(va.le(vb) as i64)),
                Ge => (bool_ty(), Number::Int(vb.le(va) as i64)),
                Eq => (bool_ty(), Number::Int(va.eq_value(vb) as i64)),
                Ne => (bool_ty(), Number::Int(!va.eq_value(vb) as i64)),
                LogAnd => (bool_ty(), Number::Int((va.bool_value() && vb.bool_value()) as i64)),
                LogOr => (bool_ty(), Number::Int((va.bool_value() || vb.bool_value()) as i64)),
            };
            return Ok(ExpResult::Constant { ty, value });
        }

        let ty = match op {
            Add | Sub | Mul | Div | Mod | BitAnd | BitOr | BitXor => {
                resulting_type(a.ty(), b.ty(), loc)?
            }
            Shl | Shr => a.ty().clone(),
            Eq | Ne => {
                resulting_type(a.ty(), b.ty(), loc)?;
                bool_ty()
            }
            Lt | Gt | Le | Ge | LogAnd | LogOr => bool_ty(),
        };

        let ra = a.get_value(&mut self.ctx);
        let rb = b.get_value(&mut self.ctx);
        self.dealloc_result(&b);
        self.dealloc_result(&a);

        match op {
            Add => self.ctx.emit_alu(AluOp::Add, ra, ra, rb),
            Sub => self.ctx.emit_alu(AluOp::Sub, ra, ra, rb),
            Mul => self.ctx.emit_alu(AluOp::Mul, ra, ra, rb),
            Div => self.ctx.emit_alu(AluOp::Div, ra, ra, rb),
            Mod => self.ctx.emit_alu(AluOp::Mod, ra, ra, rb),
            BitAnd => self.ctx.emit_alu(AluOp::And, ra, ra, rb),
            BitOr => self.ctx.emit_alu(AluOp::Or, ra, ra, rb),
            BitXor => self.ctx.emit_alu(AluOp::Xor, ra, ra, rb),
            Shl => self.ctx.emit_alu(AluOp::Shl, ra, ra, rb),
            Shr => self.ctx.emit_alu(AluOp::Shr, ra, ra, rb),
            Lt => self.ctx.emit_alu(AluOp::CmpLt, ra, ra, rb),
            Gt => self.ctx.emit_alu(AluOp::CmpLt, ra, rb, ra),
            Le => {
                self.ctx.emit_alu(AluOp::CmpLt, ra, rb, ra);
                self.ctx.emit(Instruction::Not { dst: ra, src: ra });
            }
            Ge => {
                self.ctx.emit_alu(AluOp::CmpLt, ra, ra, rb);
                self.ctx.emit(Instruction::Not { dst: ra, src: ra });
            }
            Eq => self.ctx.emit_alu(AluOp::CmpEq, ra, ra, rb),
            Ne => self.ctx.emit_alu(AluOp::CmpNe, ra, ra, rb),
            LogAnd => self.ctx.emit_alu(AluOp::LogAnd, ra, ra, rb),
            LogOr => self.ctx.emit_alu(AluOp::LogOr, ra, ra, rb),
        }

        let size = ty.size();
        let res = self.push_value(ra, size, ty, false);
        self.ctx.deallocate_register(rb);
        Ok(res)
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, loc: Loc) -> Result<ExpResult> {
        let exp = self.eval_expr(operand)?;
        self.check_not_void(&exp, loc)?;

        match op {
            UnaryOp::Plus => Ok(exp),
            UnaryOp::Minus => {
                if let ExpResult::Constant { ty, value } = &exp {
                    return Ok(ExpResult::Constant {
                        ty: ty.clone(),
                        value: value.neg(),
                    });
                }
                let ty = exp.ty().clone();
                let val = exp.get_value(&mut self.ctx);
                self.dealloc_result(&exp);
                self.ctx.emit_alu(AluOp::Sub, val, Register::Zero, val);
                Ok(self.push_value(val, ty.size(), ty, false))
            }
            UnaryOp::BitNot => {
                if exp.ty().is_floating_point() {
                    sema_bail!(loc, "invalid floating-point operand to '~'");
                }
                if let ExpResult::Constant { ty, value } = &exp {
                    return Ok(ExpResult::Constant {
                        ty: ty.clone(),
                        value: value.bit_not(),
                    });
                }
                let ty = exp.ty().clone();
                let val = exp.get_value(&mut self.ctx);
                self.dealloc_result(&exp);
                let ones = self.ctx.allocate_int_constant(-1);
                self.ctx.emit_alu(AluOp::Xor, val, val, ones);
                self.ctx.deallocate_register(ones);
                Ok(self.push_value(val, ty.size(), ty, false))
            }
            UnaryOp::LogicalNot => {
                if let ExpResult::Constant { value, .. } = exp {
                    return Ok(ExpResult::Constant {
                        ty: bool_ty(),
                        value: value.logical_not(),
                    });
                }
                let val = exp.get_value(&mut self.ctx);
                self.dealloc_result(&exp);
                self.ctx.emit(Instruction::Not { dst: val, src: val });
                Ok(self.push_value(val, 1, bool_ty(), false))
            }
            UnaryOp::AddrOf => match exp {
                ExpResult::Constant { .. } => {
                    sema_bail!(loc, "cannot take the address of a constant")
                }
                ExpResult::Stacked {
                    ty,
                    offset,
                    needs_dealloc,
                    indirect: true,
                } => Ok(ExpResult::Stacked {
                    ty: Type::pointer(ty),
                    offset,
                    needs_dealloc,
                    indirect: false,
                }),
                _ => sema_bail!(loc, "lvalue required as operand of unary '&'"),
            },
            UnaryOp::Deref => {
                if exp.is_constant() {
                    sema_bail!(loc, "cannot dereference a constant");
                }
                let Some(elem) = exp.ty().dereference().cloned() else {
                    sema_bail!(loc, "cannot dereference a non-pointer value");
                };
                if let TypeKind::Function(_) = elem.kind {
                    // Dereferencing a function pointer yields the
                    // function designator; nothing moves.
                    if let ExpResult::Stacked {
                        offset,
                        needs_dealloc,
                        indirect,
                        ..
                    } = exp
                    {
                        return Ok(ExpResult::Stacked {
                            ty: elem,
                            offset,
                            needs_dealloc,
                            indirect,
                        });
                    }
                    unreachable!();
                }
                if elem.size() == 0 {
                    sema_bail!(loc, "cannot dereference a void pointer");
                }
                match exp {
                    ExpResult::Stacked {
                        offset,
                        needs_dealloc,
                        indirect: false,
                        ..
                    } => Ok(ExpResult::Stacked {
                        ty: elem,
                        offset,
                        needs_dealloc,
                        indirect: true,
                    }),
                    ref stacked => {
                        let val = stacked.get_value(&mut self.ctx);
                        self.dealloc_result(stacked);
                        Ok(self.push_value(val, REGISTER_SIZE, elem, true))
                    }
                }
            }
        }
    }

    fn eval_incdec(&mut self, pre: bool, inc: bool, target: &Expr, loc: Loc) -> Result<ExpResult> {
        let exp = self.eval_expr(target)?;
        self.check_not_void(&exp, loc)?;
        if exp.is_constant() {
            sema_bail!(
                loc,
                "cannot {} a constant",
                if inc { "increment" } else { "decrement" }
            );
        }
        if !exp.is_indirect() {
            sema_bail!(loc, "lvalue required as increment operand");
        }
        let step = exp.ty().increment();
        if step == 0 {
            sema_bail!(loc, "invalid operand type '{}' for increment", exp.ty());
        }
        let op = if inc { AluOp::Add } else { AluOp::Sub };
        let size = exp.ty().size();

        if pre {
            let val = exp.get_value(&mut self.ctx);
            let stepr = self.ctx.allocate_int_constant(step as i64);
            self.ctx.emit_alu(op, val, val, stepr);
            self.ctx.deallocate_register(stepr);
            let pos = exp.get_pointer(&mut self.ctx);
            self.ctx.emit(Instruction::Store {
                src: val,
                base: pos,
                size,
                offset: 0,
            });
            self.ctx.deallocate_register(pos);
            self.ctx.deallocate_register(val);
            // The result stays the updated lvalue.
            Ok(exp)
        } else {
            let val = exp.get_value(&mut self.ctx);
            let stepr = self.ctx.allocate_int_constant(step as i64);
            self.ctx.emit_alu(op, stepr, val, stepr);
            let pos = exp.get_pointer(&mut self.ctx);
            self.ctx.emit(Instruction::Store {
                src: stepr,
                base: pos,
                size,
                offset: 0,
            });
            self.ctx.deallocate_register(pos);
            self.ctx.deallocate_register(stepr);
            let ty = exp.ty().clone();
            self.dealloc_result(&exp);
            Ok(self.push_value(val, size, ty, false))
        }
    }

    fn eval_assign(
        &mut self,
        op: Option<BinaryOp>,
        lhs: &Expr,
        rhs: &Expr,
        loc: Loc,
    ) -> Result<ExpResult> {
        let target = self.eval_expr(lhs)?;
        let value = self.eval_expr(rhs)?;
        self.check_not_void(&target, lhs.loc)?;
        self.check_not_void(&value, rhs.loc)?;

        if target.is_constant() || !target.is_indirect() {
            sema_bail!(loc, "invalid lvalue in assignment");
        }
        if !value.ty().allow_implicit_cast_to(target.ty()) {
            sema_bail!(
                loc,
                "invalid implicit conversion from '{}' to '{}'",
                value.ty(),
                target.ty()
            );
        }
        let size = target.ty().size();

        match op {
            None => {
                let pos = target.get_pointer(&mut self.ctx);
                let val = value.get_value(&mut self.ctx);
                self.ctx.emit(Instruction::Store {
                    src: val,
                    base: pos,
                    size,
                    offset: 0,
                });
                self.ctx.deallocate_register(pos);
                self.ctx.deallocate_register(val);
            }
            Some(combine) => {
                use BinaryOp::*;
                let int_only = matches!(combine, Mod | Shl | Shr | BitAnd | BitOr | BitXor);
                if int_only
                    && (target.ty().is_floating_point() || value.ty().is_floating_point())
                {
                    sema_bail!(loc, "invalid floating-point operand to integer operator");
                }
                let alu = match combine {
                    Mul => AluOp::Mul,
                    Div => AluOp::Div,
                    Mod => AluOp::Mod,
                    Add => AluOp::Add,
                    Sub => AluOp::Sub,
                    Shl => AluOp::Shl,
                    Shr => AluOp::Shr,
                    BitAnd => AluOp::And,
                    BitXor => AluOp::Xor,
                    BitOr => AluOp::Or,
                    _ => panic!("{:?} is not a compound-assignment operator", combine),
                };
                let lval = target.get_value(&mut self.ctx);
                let val = value.get_value(&mut self.ctx);
                self.ctx.emit_alu(alu, val, lval, val);
                self.ctx.deallocate_register(lval);
                let pos = target.get_pointer(&mut self.ctx);
                self.ctx.emit(Instruction::Store {
                    src: val,
                    base: pos,
                    size,
                    offset: 0,
                });
                self.ctx.deallocate_register(pos);
                self.ctx.deallocate_register(val);
            }
        }

        self.dealloc_result(&value);
        Ok(target)
    }

    fn eval_cond(
        &mut self,
        cond: &Expr,
        then_e: &Expr,
        else_e: &Expr,
        loc: Loc,
    ) -> Result<ExpResult> {
        let c = self.eval_expr(cond)?;
        self.check_not_void(&c, cond.loc)?;

        if let ExpResult::Constant { value, .. } = c {
            return if value.bool_value() {
                self.eval_expr(then_e)
            } else {
                self.eval_expr(else_e)
            };
        }

        let cv = c.get_value(&mut self.ctx);
        self.dealloc_result(&c);
        let branch_at = self.ctx.emit(Instruction::Branch { cond: cv, target: 0 });
        self.ctx.deallocate_register(cv);

        // False arm first: the branch, taken on a true condition, skips
        // over it. Each arm pushes its value into the same frame slot;
        // the frame counter is rewound between arms because only one arm
        // executes.
        let e_res = self.eval_expr(else_e)?;
        self.check_not_void(&e_res, else_e.loc)?;
        let e_ty = e_res.ty().clone();
        let size = e_ty.size();
        let ev = e_res.get_value(&mut self.ctx);
        self.dealloc_result(&e_res);
        self.ctx.stack_push(ev, size);
        self.ctx.deallocate_register(ev);
        let result_offset = self.ctx.current_function().frame_offset();

        let jump_at = self.ctx.emit(Instruction::Jump { target: 0 });
        let here = self.ctx.here();
        self.ctx.patch_to(branch_at, here);

        self.ctx.current_function_mut().shrink_frame(size);

        let t_res = self.eval_expr(then_e)?;
        self.check_not_void(&t_res, then_e.loc)?;
        let ty = resulting_type(t_res.ty(), &e_ty, loc)?;
        let tv = t_res.get_value(&mut self.ctx);
        self.dealloc_result(&t_res);
        self.ctx.stack_push(tv, size);
        self.ctx.deallocate_register(tv);
        debug_assert_eq!(
            self.ctx.current_function().frame_offset(),
            result_offset,
            "conditional arms left unequal frames"
        );

        let here = self.ctx.here();
        self.ctx.patch_to(jump_at, here);

        Ok(ExpResult::Stacked {
            ty,
            offset: result_offset,
            needs_dealloc: true,
            indirect: false,
        })
    }

    fn eval_cast(&mut self, tn: &parse::ast::TypeName, operand: &Expr, loc: Loc) -> Result<ExpResult> {
        let ty = self.resolve_type_name(tn, loc)?;
        let exp = self.eval_expr(operand)?;
        self.check_not_void(&exp, loc)?;

        if !exp.ty().allow_explicit_cast_to(&ty) {
            sema_bail!(loc, "invalid cast from '{}' to '{}'", exp.ty(), ty);
        }

        if let ExpResult::Constant { value, .. } = exp {
            let value = if ty.is_floating_point() {
                Number::Float(value.float_value())
            } else {
                Number::Int(value.int_value())
            };
            return Ok(ExpResult::Constant { ty, value });
        }

        let mut val = exp.get_value(&mut self.ctx);
        let mut force_restack = false;

        // Register contents are interpreted per class, so crossing the
        // int/float domain rematerializes through the other class.
        if exp.ty().is_floating_point() != ty.is_floating_point() {
            let target = if ty.is_floating_point() {
                self.ctx.allocate_fp()
            } else {
                self.ctx.allocate_pr()
            };
            self.ctx.emit_alu(AluOp::Add, target, val, Register::Zero);
            self.ctx.deallocate_register(val);
            val = target;
            force_restack = true;
        }

        if ty.size() != exp.ty().size() || force_restack {
            self.dealloc_result(&exp);
            let size = ty.size();
            let res = self.push_value(val, size, ty, false);
            return Ok(res);
        }

        // Same size, same domain: the slot is already right; retype it.
        self.ctx.deallocate_register(val);
        if let ExpResult::Stacked {
            offset,
            needs_dealloc,
            indirect,
            ..
        } = exp
        {
            Ok(ExpResult::Stacked {
                ty,
                offset,
                needs_dealloc,
                indirect,
            })
        } else {
            unreachable!()
        }
    }

    fn eval_index(&mut self, base: &Expr, index: &Expr, loc: Loc) -> Result<ExpResult> {
        let mut base_r = self.eval_expr(base)?;
        let mut off_r = self.eval_expr(index)?;
        self.check_not_void(&base_r, base.loc)?;
        self.check_not_void(&off_r, index.loc)?;

        // a[i] and i[a] are the same expression.
        if base_r.ty().dereference().is_none() && off_r.ty().dereference().is_some() {
            std::mem::swap(&mut base_r, &mut off_r);
        }
        let Some(elem) = base_r.ty().dereference().cloned() else {
            sema_bail!(loc, "subscripted value is not a pointer or array");
        };
        if elem.size() == 0 {
            sema_bail!(loc, "cannot dereference a void pointer");
        }

        let pos = base_r.get_value(&mut self.ctx);
        let off = off_r.get_value(&mut self.ctx);
        self.dealloc_result(&off_r);
        self.dealloc_result(&base_r);

        let scale = self.ctx.allocate_int_constant(elem.size() as i64);
        self.ctx.emit_alu(AluOp::Mul, off, off, scale);
        self.ctx.deallocate_register(scale);
        self.ctx.emit_alu(AluOp::Add, pos, pos, off);

        let res = self.push_value(pos, REGISTER_SIZE, elem, true);
        self.ctx.deallocate_register(off);
        Ok(res)
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], loc: Loc) -> Result<ExpResult> {
        let fres = self.eval_expr(callee)?;
        self.check_not_void(&fres, loc)?;
        let TypeKind::Function(fty) = &fres.ty().kind else {
            sema_bail!(loc, "called object is not a function");
        };
        let fty = fty.clone();

        let mut stack_mem;
        if args.is_empty() {
            if fty.resolved && !fty.params.is_empty() {
                sema_bail!(loc, "too few arguments in call");
            }
            // Argument count of zero.
            self.ctx.stack_push_word(Register::Zero);
            stack_mem = REGISTER_SIZE;
        } else {
            stack_mem = self.eval_arguments(args, &fty, loc)?;
        }

        let func_addr = fres.get_value(&mut self.ctx);

        // Synthesize the return address: the stored value points just
        // past the indirect jump, two instructions after the add below.
        let reg = self.ctx.allocate_pr();
        self.ctx.allocate_stack(REGISTER_SIZE);
        stack_mem += REGISTER_SIZE;
        self.ctx.emit(Instruction::Set {
            dst: reg,
            value: Number::Int(2),
            relocatable: false,
        });
        self.ctx.emit_alu(AluOp::Add, reg, Register::Pc, reg);
        self.ctx.emit(Instruction::Store {
            src: reg,
            base: Register::Sp,
            size: REGISTER_SIZE,
            offset: 0,
        });
        self.ctx.deallocate_register(reg);

        self.ctx.emit(Instruction::JumpReg { target: func_addr });
        self.ctx.deallocate_register(func_addr);
        assert!(
            self.ctx.current_function().all_registers_free(),
            "registers live across a call"
        );

        let ret_size = fty.ret.size();
        let mut ret_reg = None;
        if !fty.ret.is_void() {
            assert!(ret_size > 0);
            // The callee left the return value on top of the stack; it
            // was pushed by the callee, so popping it must not touch
            // this function's frame accounting.
            let reg = self.ctx.allocate_pr();
            let r = self.ctx.allocate_pr();
            self.ctx.emit(Instruction::Load {
                dst: reg,
                base: Register::Sp,
                size: ret_size,
                offset: 0,
            });
            self.ctx.emit(Instruction::Set {
                dst: r,
                value: Number::Int(ret_size as i64),
                relocatable: false,
            });
            self.ctx.emit_alu(AluOp::Add, Register::Sp, Register::Sp, r);
            self.ctx.deallocate_register(r);
            ret_reg = Some(reg);
        }

        // Drop arguments, argument count and the return-address slot.
        self.ctx.deallocate_stack(stack_mem);
        self.dealloc_result(&fres);

        match ret_reg {
            Some(reg) => {
                let ty = (*fty.ret).clone();
                Ok(self.push_value(reg, ret_size, ty, false))
            }
            None => Ok(ExpResult::Void),
        }
    }

    /// Push the call arguments and the argument count; returns the bytes
    /// pushed. Arguments go in reverse declaration order, trailing
    /// variadic arguments first (right to left).
    fn eval_arguments(
        &mut self,
        args: &[Expr],
        fty: &crate::types::FunctionType,
        loc: Loc,
    ) -> Result<u32> {
        let declared = if fty.resolved { fty.params.len() } else { 0 };
        if fty.resolved {
            if args.len() < declared {
                sema_bail!(loc, "too few arguments in call");
            }
            if !fty.variadic && args.len() > declared {
                sema_bail!(loc, "too many arguments in call");
            }
        } else if !args.is_empty() {
            sema_bail!(loc, "too many arguments in call");
        }

        let mut mem = 0u32;

        // Trailing variadic arguments, right to left, unchecked.
        for arg in args[declared..].iter().rev() {
            let exp = self.eval_expr(arg)?;
            self.check_not_void(&exp, arg.loc)?;
            let size = exp.ty().size();
            let val = exp.get_value(&mut self.ctx);
            if exp.is_constant() {
                self.ctx.stack_push(val, size);
            } else if exp.is_indirect() {
                self.dealloc_result(&exp);
                self.ctx.stack_push(val, size);
            }
            // A direct stacked result already sits on the stack as the
            // argument.
            self.ctx.deallocate_register(val);
            mem += size;
        }

        // Declared parameters, last first.
        for i in (0..declared).rev() {
            let arg = &args[i];
            let param_ty = fty.params[i].clone();
            let exp = self.eval_expr(arg)?;
            self.check_not_void(&exp, arg.loc)?;
            if !exp.ty().allow_implicit_cast_to(&param_ty) {
                sema_bail!(
                    arg.loc,
                    "invalid implicit conversion from '{}' to '{}'",
                    exp.ty(),
                    param_ty
                );
            }
            let size = param_ty.size();
            let val = exp.get_value(&mut self.ctx);

            if exp.ty().is_floating_point() != param_ty.is_floating_point() {
                let cast = if param_ty.is_floating_point() {
                    self.ctx.allocate_fp()
                } else {
                    self.ctx.allocate_pr()
                };
                self.ctx.emit_alu(AluOp::Add, cast, val, Register::Zero);
                self.ctx.deallocate_register(val);
                self.dealloc_result(&exp);
                self.ctx.stack_push(cast, size);
                self.ctx.deallocate_register(cast);
            } else {
                if exp.is_constant() {
                    self.ctx.stack_push(val, size);
                } else if exp.is_indirect() || exp.ty().size() != size {
                    self.dealloc_result(&exp);
                    self.ctx.stack_push(val, size);
                }
                self.ctx.deallocate_register(val);
            }

            mem += size;
        }

        // The argument count goes on top.
        let reg = self.ctx.allocate_int_constant(args.len() as i64);
        self.ctx.stack_push_word(reg);
        self.ctx.deallocate_register(reg);
        mem += REGISTER_SIZE;

        Ok(mem)
    }
}
