//! Backend seam over the native compute API.
//!
//! The dispatch layer talks to the device through [`ComputeBackend`]:
//! compile a program, create a kernel invocation by entry-point name,
//! bind device buffers to positional argument slots, enqueue over a work
//! partition. The CUDA implementation lives in `cuda_backend`; tests
//! substitute a recording mock.

use thiserror::Error;

/// Errors surfaced by the dispatch layer.
///
/// None of these are retryable locally: they indicate misconfiguration,
/// resource exhaustion, or a driver fault, and the solver is expected to
/// abort the step (or the run, for [`DispatchError::Compile`]).
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// JIT compilation of the kernel module failed. Fatal for the run:
    /// the operator cannot execute without its compiled program.
    #[error("kernel JIT compilation failed: {0}")]
    Compile(String),
    /// Polynomial order outside the precompiled variant set.
    #[error("unsupported polynomial order {0} (supported: 2..=12)")]
    UnsupportedOrder(u32),
    /// Argument attachment failed. Fatal for the current call only.
    #[error("failed to bind kernel argument {slot} ({name}): {detail}")]
    Bind {
        slot: usize,
        name: &'static str,
        detail: String,
    },
    /// Submission to the command queue failed.
    #[error("kernel enqueue failed: {0}")]
    Enqueue(String),
    /// The compiled module has no entry point with the requested name.
    #[error("kernel entry point not found: {0}")]
    KernelMissing(&'static str),
    /// Scalar inputs that cannot describe a launch.
    #[error("invalid launch config: {0}")]
    InvalidConfig(String),
    /// Native driver error outside the categories above.
    #[error("device driver error: {0}")]
    Driver(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

/// Work partition for a one-dimensional kernel launch: total work-items
/// and work-items per group. `global` is a whole multiple of `local`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkPartition {
    pub global: u64,
    pub local: u64,
}

impl WorkPartition {
    /// Number of work groups in the launch.
    pub fn groups(&self) -> u64 {
        self.global / self.local
    }
}

/// Completion handle for an enqueued kernel. Dropping it is allowed; the
/// submitted work keeps running and is ordered by the queue.
pub trait LaunchEvent {
    /// Block the calling thread until the submitted kernel has finished.
    fn synchronize(&self) -> DispatchResult<()>;
}

/// Native compute API as seen by the dispatcher.
///
/// Binding mutates invocation state only; buffer contents are never read
/// or written at bind time. `enqueue` consumes the invocation, submits it
/// asynchronously, and returns a completion event.
pub trait ComputeBackend {
    /// Compiled device module holding every kernel variant.
    type Program;
    /// One kernel invocation being assembled.
    type Kernel;
    /// Opaque device-memory handle, owned and kept alive by the caller.
    type Buffer;
    /// Completion handle returned by `enqueue`.
    type Event: LaunchEvent;

    /// JIT-compile kernel source into an executable module.
    fn compile_program(&self, source: &str) -> DispatchResult<Self::Program>;

    /// Create an invocation of the named entry point.
    fn create_kernel(
        &self,
        program: &Self::Program,
        name: &'static str,
    ) -> DispatchResult<Self::Kernel>;

    /// Attach a device buffer to positional argument slot `slot`. Slots
    /// must be bound in increasing order starting from zero.
    fn bind_buffer(
        &self,
        kernel: &mut Self::Kernel,
        slot: usize,
        buffer: &Self::Buffer,
    ) -> DispatchResult<()>;

    /// Submit the fully bound invocation on the shared queue. Returns as
    /// soon as the work is enqueued.
    fn enqueue(
        &self,
        kernel: Self::Kernel,
        partition: WorkPartition,
    ) -> DispatchResult<Self::Event>;
}
