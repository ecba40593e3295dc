//! Expression evaluation results.
//!
//! An expression evaluates to a compile-time constant, a value on the
//! evaluation stack, or nothing (a call to a void function). Stacked
//! results record the frame-base offset captured when the value was
//! pushed; an *indirect* stacked result's slot holds a pointer to the
//! real value rather than the value itself (array elements, dereferenced
//! pointers, addressable variables).
//!
//! Every stacked result that was pushed must be deallocated exactly once
//! by whoever consumes it.

use vm::{AluOp, Instruction, Number, Register, REGISTER_SIZE};

use crate::context::Context;
use crate::types::Type;

#[derive(Debug, Clone)]
pub enum ExpResult {
    Constant {
        ty: Type,
        value: Number,
    },
    Stacked {
        ty: Type,
        /// Frame-base offset recorded at push time; the slot sits at
        /// `$sp + (frame_offset - offset)`.
        offset: u32,
        needs_dealloc: bool,
        indirect: bool,
    },
    Void,
}

impl ExpResult {
    pub fn stacked(ty: Type, ctx: &Context) -> ExpResult {
        ExpResult::Stacked {
            ty,
            offset: ctx.current_function().frame_offset(),
            needs_dealloc: true,
            indirect: false,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, ExpResult::Void)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, ExpResult::Constant { .. })
    }

    pub fn is_indirect(&self) -> bool {
        matches!(self, ExpResult::Stacked { indirect: true, .. })
    }

    pub fn ty(&self) -> &Type {
        match self {
            ExpResult::Constant { ty, .. } | ExpResult::Stacked { ty, .. } => ty,
            ExpResult::Void => panic!("void result has no type"),
        }
    }

    pub fn constant(&self) -> Number {
        match self {
            ExpResult::Constant { value, .. } => *value,
            other => panic!("not a constant result: {:?}", other),
        }
    }

    /// Current `$sp`-relative offset of the slot.
    pub fn sp_offset(&self, ctx: &Context) -> u32 {
        let ExpResult::Stacked { offset, .. } = self else {
            panic!("not a stacked result");
        };
        let frame = ctx.current_function().frame_offset();
        assert!(frame >= *offset, "stacked result below the stack pointer");
        frame - offset
    }

    /// Bytes this result occupies on the evaluation stack. Indirect
    /// slots hold a pointer and are word-sized.
    pub fn stack_alloc_size(&self) -> u32 {
        let ExpResult::Stacked { ty, indirect, .. } = self else {
            panic!("not a stacked result");
        };
        if *indirect {
            REGISTER_SIZE
        } else {
            ty.size()
        }
    }

    /// Materialize the value into a fresh register of the class matching
    /// its type.
    pub fn get_value(&self, ctx: &mut Context) -> Register {
        match self {
            ExpResult::Constant { value, .. } => ctx.allocate_constant(*value, false),
            ExpResult::Stacked { ty, indirect, .. } => {
                assert!(ty.fits_register(), "value does not fit a register");
                let reg = if ty.is_floating_point() {
                    ctx.allocate_fp()
                } else {
                    ctx.allocate_pr()
                };
                let sp_off = self.sp_offset(ctx);
                if *indirect {
                    ctx.emit(Instruction::Load {
                        dst: reg,
                        base: Register::Sp,
                        size: REGISTER_SIZE,
                        offset: sp_off,
                    });
                    ctx.emit(Instruction::Load {
                        dst: reg,
                        base: reg,
                        size: ty.size(),
                        offset: 0,
                    });
                } else {
                    ctx.emit(Instruction::Load {
                        dst: reg,
                        base: Register::Sp,
                        size: ty.size(),
                        offset: sp_off,
                    });
                }
                reg
            }
            ExpResult::Void => panic!("materializing a void result"),
        }
    }

    /// Materialize the address of the value into a fresh register.
    pub fn get_pointer(&self, ctx: &mut Context) -> Register {
        let ExpResult::Stacked { indirect, .. } = self else {
            panic!("taking the address of a non-stacked result");
        };
        let reg = ctx.allocate_pr();
        let sp_off = self.sp_offset(ctx);
        if *indirect {
            ctx.emit(Instruction::Load {
                dst: reg,
                base: Register::Sp,
                size: REGISTER_SIZE,
                offset: sp_off,
            });
        } else {
            ctx.emit(Instruction::Set {
                dst: reg,
                value: Number::Int(sp_off as i64),
                relocatable: false,
            });
            ctx.emit_alu(AluOp::Add, reg, reg, Register::Sp);
        }
        reg
    }
}
