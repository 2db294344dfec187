//! CUDA implementation of the compute backend.
//!
//! Thin layer over the cudarc driver API: NVRTC compiles the kernel
//! source to PTX, the module is loaded into the shared context, and
//! launches go through the context's stream with arguments passed as a
//! positional kernel-parameter array. Uses dynamic loading, so no CUDA
//! toolkit is needed at build time.

use std::sync::Arc;

use cudarc::driver::{
    sys, CudaContext, CudaEvent, CudaFunction, CudaModule, CudaStream, DriverError,
    LaunchConfig, PushKernelArg,
};
use cudarc::nvrtc;

use crate::backend_trait::{
    ComputeBackend, DispatchError, DispatchResult, LaunchEvent, WorkPartition,
};

impl From<DriverError> for DispatchError {
    fn from(err: DriverError) -> Self {
        DispatchError::Driver(format!("{err:?}"))
    }
}

/// Opaque handle to device memory owned by the external allocator.
///
/// The dispatch layer never allocates, copies, or frees through this
/// handle; it only forwards the raw pointer into the kernel-parameter
/// array. The caller keeps the underlying allocation alive for at least
/// the duration of the dispatched work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceBuffer(sys::CUdeviceptr);

impl DeviceBuffer {
    pub fn from_raw(ptr: sys::CUdeviceptr) -> Self {
        Self(ptr)
    }

    pub fn as_raw(&self) -> sys::CUdeviceptr {
        self.0
    }
}

/// CUDA backend bound to one device context and one command stream.
pub struct CudaBackend {
    ctx: Arc<CudaContext>,
    stream: Arc<CudaStream>,
}

impl CudaBackend {
    /// Bind to device `ordinal` and its default stream.
    pub fn new(ordinal: usize) -> DispatchResult<Self> {
        let ctx = CudaContext::new(ordinal)?;
        let stream = ctx.default_stream();
        Ok(Self { ctx, stream })
    }

    /// Wrap a context/stream pair owned by the caller. This is the
    /// normal path inside the solver, where the queue is process-wide.
    pub fn with_stream(ctx: Arc<CudaContext>, stream: Arc<CudaStream>) -> Self {
        Self { ctx, stream }
    }

    pub fn context(&self) -> &Arc<CudaContext> {
        &self.ctx
    }

    pub fn stream(&self) -> &Arc<CudaStream> {
        &self.stream
    }
}

/// One kernel invocation being assembled: the resolved entry point plus
/// the positionally bound device pointers.
pub struct CudaKernelCall {
    func: CudaFunction,
    name: &'static str,
    args: Vec<sys::CUdeviceptr>,
}

/// Completion handle recorded on the stream right after submission.
pub struct CudaLaunchEvent {
    event: CudaEvent,
}

impl LaunchEvent for CudaLaunchEvent {
    fn synchronize(&self) -> DispatchResult<()> {
        self.event.synchronize().map_err(DispatchError::from)
    }
}

impl ComputeBackend for CudaBackend {
    type Program = Arc<CudaModule>;
    type Kernel = CudaKernelCall;
    type Buffer = DeviceBuffer;
    type Event = CudaLaunchEvent;

    fn compile_program(&self, source: &str) -> DispatchResult<Self::Program> {
        let ptx = nvrtc::compile_ptx(source)
            .map_err(|e| DispatchError::Compile(e.to_string()))?;
        self.ctx
            .load_module(ptx)
            .map_err(|e| DispatchError::Compile(format!("module load failed: {e:?}")))
    }

    fn create_kernel(
        &self,
        program: &Self::Program,
        name: &'static str,
    ) -> DispatchResult<Self::Kernel> {
        let func = program
            .load_function(name)
            .map_err(|_| DispatchError::KernelMissing(name))?;
        Ok(CudaKernelCall {
            func,
            name,
            args: Vec::new(),
        })
    }

    fn bind_buffer(
        &self,
        kernel: &mut Self::Kernel,
        slot: usize,
        buffer: &Self::Buffer,
    ) -> DispatchResult<()> {
        // Positional contract: the parameter array has no gaps.
        if slot != kernel.args.len() {
            return Err(DispatchError::InvalidConfig(format!(
                "slot {slot} bound out of sequence (expected {})",
                kernel.args.len()
            )));
        }
        kernel.args.push(buffer.as_raw());
        Ok(())
    }

    fn enqueue(
        &self,
        kernel: Self::Kernel,
        partition: WorkPartition,
    ) -> DispatchResult<Self::Event> {
        let cfg = launch_config(&partition)?;

        unsafe {
            let mut builder = self.stream.launch_builder(&kernel.func);
            for arg in &kernel.args {
                builder.arg(arg);
            }
            builder
                .launch(cfg)
                .map_err(|e| DispatchError::Enqueue(format!("{}: {e:?}", kernel.name)))?;
        }

        let event = self
            .ctx
            .new_event(None)
            .map_err(|e| DispatchError::Enqueue(format!("event create: {e:?}")))?;
        event
            .record(&self.stream)
            .map_err(|e| DispatchError::Enqueue(format!("event record: {e:?}")))?;
        Ok(CudaLaunchEvent { event })
    }
}

fn launch_config(partition: &WorkPartition) -> DispatchResult<LaunchConfig> {
    let groups = u32::try_from(partition.groups()).map_err(|_| {
        DispatchError::InvalidConfig(format!(
            "group count {} exceeds u32::MAX",
            partition.groups()
        ))
    })?;
    let local = u32::try_from(partition.local).map_err(|_| {
        DispatchError::InvalidConfig(format!(
            "group size {} exceeds u32::MAX",
            partition.local
        ))
    })?;
    Ok(LaunchConfig {
        grid_dim: (groups, 1, 1),
        block_dim: (local, 1, 1),
        shared_mem_bytes: 0,
    })
}
