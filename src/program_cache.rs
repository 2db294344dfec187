//! Compile-once cache for the operator's kernel module.
//!
//! Each operator owns one [`ProgramCache`]. The first dispatch triggers
//! JIT compilation; every later dispatch reuses the stored handle. The
//! compile outcome is recorded exactly once, success or failure: a failed
//! compile is a configuration fault, so it is replayed as the same error
//! instead of being re-attempted.

use std::sync::OnceLock;

use crate::backend_trait::{DispatchError, DispatchResult};

/// Thread-safe once-only holder for a compiled program handle.
///
/// `OnceLock` serializes concurrent first use: exactly one caller runs
/// the compile closure, everyone else blocks until the outcome is stored.
pub struct ProgramCache<P> {
    slot: OnceLock<Result<P, DispatchError>>,
}

impl<P> ProgramCache<P> {
    pub const fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// Return the compiled program, running `compile` on first use.
    ///
    /// Idempotent: `compile` is invoked at most once for the lifetime of
    /// the cache, across any number of threads. Once a handle is stored
    /// it is never recompiled; once a failure is stored it is returned
    /// verbatim on every subsequent call.
    pub fn get_or_compile<F>(&self, compile: F) -> DispatchResult<&P>
    where
        F: FnOnce() -> DispatchResult<P>,
    {
        self.slot.get_or_init(compile).as_ref().map_err(|e| e.clone())
    }

    /// Whether a compile outcome (success or failure) has been recorded.
    pub fn is_initialized(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl<P> Default for ProgramCache<P> {
    fn default() -> Self {
        Self::new()
    }
}
