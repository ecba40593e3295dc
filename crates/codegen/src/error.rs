//! Semantic-error helpers.
//!
//! Semantic errors carry a `line:col` location and abort compilation of
//! the translation unit. Internal invariant violations (register-pool
//! exhaustion, malformed trees, stack leaks) are `panic!`s, never values.

/// Bail with a located semantic error.
macro_rules! sema_bail {
    ($loc:expr, $($arg:tt)*) => {
        return Err(anyhow::anyhow!("{}: {}", $loc, format!($($arg)*)))
    };
}

pub(crate) use sema_bail;
