use std::fmt;

/// Size in bytes of one machine word. Every register holds one word;
/// pointers and function addresses are word-sized.
pub const REGISTER_SIZE: u32 = 8;

/// General-purpose registers available to the allocator per function.
pub const NUM_PR_REGISTERS: u8 = 8;
/// Floating-point registers available to the allocator per function.
pub const NUM_FP_REGISTERS: u8 = 4;

/// A machine register.
///
/// `Pr`/`Fp` are the allocatable pools; the rest are architectural:
/// `$sp` stack pointer, `$pc` program counter, `$gp` static-memory base,
/// `$zero` always-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Register {
    Pr(u8),
    Fp(u8),
    Sp,
    Pc,
    Gp,
    Zero,
}

impl Register {
    pub fn is_programmer(self) -> bool {
        matches!(self, Register::Pr(_))
    }

    pub fn is_floating_point(self) -> bool {
        matches!(self, Register::Fp(_))
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::Pr(n) => write!(f, "$pr{}", n),
            Register::Fp(n) => write!(f, "$fp{}", n),
            Register::Sp => write!(f, "$sp"),
            Register::Pc => write!(f, "$pc"),
            Register::Gp => write!(f, "$gp"),
            Register::Zero => write!(f, "$zero"),
        }
    }
}
