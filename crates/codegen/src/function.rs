//! Per-function register pools and frame accounting.
//!
//! Each function owns exactly 8 general-purpose and 4 floating-point
//! registers; allocation takes the lowest free register and exhaustion
//! is a fatal internal error (there is no spilling). The frame-base
//! offset tracks the distance from `$sp` to the frame base, which sits
//! on the stored return address.

use std::collections::BTreeSet;
use vm::{Register, NUM_FP_REGISTERS, NUM_PR_REGISTERS};

use crate::types::FunctionType;

pub struct Function {
    name: String,
    ty: Option<FunctionType>,
    // $sp + frame_offset == frame base (the return address slot).
    frame_offset: u32,
    pr_pool: BTreeSet<u8>,
    fp_pool: BTreeSet<u8>,
    implemented: bool,
}

impl Function {
    pub fn new(name: &str) -> Self {
        Function {
            name: name.to_string(),
            ty: None,
            frame_offset: 0,
            pr_pool: (0..NUM_PR_REGISTERS).collect(),
            fp_pool: (0..NUM_FP_REGISTERS).collect(),
            implemented: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_ty(&self) -> bool {
        self.ty.is_some()
    }

    pub fn ty(&self) -> &FunctionType {
        self.ty.as_ref().expect("function type not set")
    }

    pub fn ty_mut(&mut self) -> &mut FunctionType {
        self.ty.as_mut().expect("function type not set")
    }

    pub fn set_ty(&mut self, ty: FunctionType) {
        self.ty = Some(ty);
    }

    pub fn used_registers(&self) -> u32 {
        (NUM_PR_REGISTERS + NUM_FP_REGISTERS) as u32
            - self.pr_pool.len() as u32
            - self.fp_pool.len() as u32
    }

    pub fn all_registers_free(&self) -> bool {
        self.pr_pool.len() == NUM_PR_REGISTERS as usize
            && self.fp_pool.len() == NUM_FP_REGISTERS as usize
    }

    pub fn allocate_pr(&mut self) -> Register {
        let n = *self.pr_pool.iter().next().expect("register overflow");
        self.pr_pool.remove(&n);
        Register::Pr(n)
    }

    pub fn deallocate_pr(&mut self, reg: Register) {
        let Register::Pr(n) = reg else {
            panic!("{} is not a general-purpose register", reg);
        };
        assert!(self.pr_pool.insert(n), "{} deallocated twice", reg);
    }

    pub fn allocate_fp(&mut self) -> Register {
        let n = *self.fp_pool.iter().next().expect("register overflow");
        self.fp_pool.remove(&n);
        Register::Fp(n)
    }

    pub fn deallocate_fp(&mut self, reg: Register) {
        let Register::Fp(n) = reg else {
            panic!("{} is not a floating-point register", reg);
        };
        assert!(self.fp_pool.insert(n), "{} deallocated twice", reg);
    }

    pub fn frame_offset(&self) -> u32 {
        self.frame_offset
    }

    pub fn grow_frame(&mut self, bytes: u32) {
        self.frame_offset += bytes;
    }

    pub fn shrink_frame(&mut self, bytes: u32) {
        assert!(self.frame_offset >= bytes, "frame underflow");
        self.frame_offset -= bytes;
    }

    pub fn return_value_size(&self) -> u32 {
        self.ty().ret.size()
    }

    /// `$sp`-relative offset of the return-value slot, which sits
    /// directly below the frame base.
    pub fn return_value_sp_offset(&self) -> u32 {
        let ret = self.return_value_size();
        assert!(self.frame_offset >= ret, "frame smaller than return value");
        self.frame_offset - ret
    }

    /// `$sp`-relative offset of the stored return address.
    pub fn return_addr_sp_offset(&self) -> u32 {
        self.frame_offset
    }

    pub fn was_implemented(&self) -> bool {
        self.implemented
    }

    pub fn set_implemented(&mut self) {
        self.implemented = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_takes_lowest_free_register() {
        let mut f = Function::new("f");
        let a = f.allocate_pr();
        let b = f.allocate_pr();
        assert_eq!(a, Register::Pr(0));
        assert_eq!(b, Register::Pr(1));
        f.deallocate_pr(a);
        assert_eq!(f.allocate_pr(), Register::Pr(0));
        assert!(!f.all_registers_free());
    }

    #[test]
    #[should_panic(expected = "register overflow")]
    fn pool_exhaustion_is_fatal() {
        let mut f = Function::new("f");
        for _ in 0..=NUM_PR_REGISTERS {
            f.allocate_pr();
        }
    }

    #[test]
    #[should_panic(expected = "deallocated twice")]
    fn double_free_is_fatal() {
        let mut f = Function::new("f");
        let r = f.allocate_pr();
        f.deallocate_pr(r);
        f.deallocate_pr(r);
    }
}
