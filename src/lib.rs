//! sem-kernels: device kernel dispatch for spectral-element solver operators.
//!
//! This crate is the accelerator-dispatch layer of a spectral-element
//! fluid-flow solver. For each operator it owns:
//! - **Lazy JIT compilation**: kernel source is compiled once per process
//!   and the module handle reused for every later dispatch
//! - **Variant selection**: one precompiled entry point per element
//!   polynomial order, resolved at dispatch time from a lookup table
//! - **Positional argument binding**: device buffer handles are attached
//!   to the kernel-parameter array in a fixed, order-sensitive sequence
//! - **Asynchronous enqueue**: work is submitted to the shared stream and
//!   a completion event is returned; nothing here blocks on the kernel
//!
//! The solver, the device allocator, and the context/stream bootstrap are
//! external. Buffers arrive as opaque handles and leave untouched.
//!
//! # Quick Start
//!
//! ```ignore
//! use sem_kernels::{Conv1Args, Conv1Config, Conv1Kernel, CudaBackend};
//!
//! let op = Conv1Kernel::new(CudaBackend::new(0)?);
//! let event = op.dispatch(&args, &Conv1Config { elements, gdim: 3, order: 7 })?;
//! // event.synchronize()? if the caller needs completion; dropping it is fine.
//! ```

pub mod backend_trait;
pub mod conv1;
pub mod program_cache;

#[cfg(feature = "cuda")]
pub mod cuda_backend;

pub use backend_trait::{
    ComputeBackend, DispatchError, DispatchResult, LaunchEvent, WorkPartition,
};
pub use conv1::{
    variant_name, work_partition, Conv1Args, Conv1Config, Conv1Kernel, MAX_ORDER, MIN_ORDER,
    WORK_GROUP_SIZE,
};
pub use program_cache::ProgramCache;

#[cfg(feature = "cuda")]
pub use cuda_backend::{CudaBackend, CudaLaunchEvent, DeviceBuffer};
