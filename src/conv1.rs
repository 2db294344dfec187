//! Convective-term operator dispatch.
//!
//! `conv1` evaluates the transport of a field by the velocity on every
//! spectral element: `du = vx*du/dx + vy*du/dy + vz*du/dz`, with physical
//! derivatives assembled from reference-space differentiation matrices
//! and the geometric metric terms. The arithmetic lives in the device
//! kernel; this module owns selecting the right per-order entry point,
//! binding its eighteen device arguments in the exact order the compiled
//! kernel expects, and submitting the launch.

use crate::backend_trait::{
    ComputeBackend, DispatchError, DispatchResult, WorkPartition,
};
use crate::program_cache::ProgramCache;

/// Kernel source holding every polynomial-order variant, compiled on
/// first dispatch. Consumed here as an opaque compile input.
const CONV1_SOURCE: &str = include_str!("kernels/conv1.cu");

/// Work-items per group. One group walks the quadrature volume of one
/// element; the kernel body gates the tail when the per-element point
/// count is not exactly this size.
pub const WORK_GROUP_SIZE: u64 = 256;

/// Smallest polynomial order with a precompiled variant.
pub const MIN_ORDER: u32 = 2;
/// Largest polynomial order with a precompiled variant.
pub const MAX_ORDER: u32 = 12;

/// Entry points compiled into the conv1 module, keyed by polynomial
/// order. The table is the dispatch surface: adding an order means adding
/// a row here and the matching kernel specialization.
const VARIANTS: [(u32, &str); 11] = [
    (2, "conv1_kernel_lx2"),
    (3, "conv1_kernel_lx3"),
    (4, "conv1_kernel_lx4"),
    (5, "conv1_kernel_lx5"),
    (6, "conv1_kernel_lx6"),
    (7, "conv1_kernel_lx7"),
    (8, "conv1_kernel_lx8"),
    (9, "conv1_kernel_lx9"),
    (10, "conv1_kernel_lx10"),
    (11, "conv1_kernel_lx11"),
    (12, "conv1_kernel_lx12"),
];

/// Resolve the entry-point name for a polynomial order, `None` outside
/// the supported range.
pub fn variant_name(order: u32) -> Option<&'static str> {
    VARIANTS
        .iter()
        .find(|(n, _)| *n == order)
        .map(|(_, name)| *name)
}

/// Scalar launch inputs, caller-owned and read-only.
#[derive(Debug, Clone, Copy)]
pub struct Conv1Config {
    /// Number of spectral elements in this rank's mesh partition.
    pub elements: u32,
    /// Geometric dimension, 2 or 3. Part of the operator contract but
    /// does not influence sizing; the kernel reads only the buffers.
    pub gdim: u32,
    /// Element polynomial order, `MIN_ORDER..=MAX_ORDER`.
    pub order: u32,
}

/// Device buffers for one conv1 application.
///
/// Slot order is a binary contract with the compiled kernel; it is
/// declared once in [`Conv1Args::slots`] and bound by a single loop. All
/// buffers are owned by the external device-memory subsystem and must
/// stay alive for the duration of the dispatch call; the enqueued kernel
/// reads them asynchronously under the queue's ordering.
pub struct Conv1Args<'a, B: ComputeBackend> {
    /// Output: convective derivative field.
    pub du: &'a B::Buffer,
    /// Input field being transported.
    pub u: &'a B::Buffer,
    pub vx: &'a B::Buffer,
    pub vy: &'a B::Buffer,
    pub vz: &'a B::Buffer,
    /// Differentiation-operator matrices for the three reference directions.
    pub dx: &'a B::Buffer,
    pub dy: &'a B::Buffer,
    pub dz: &'a B::Buffer,
    /// Metric derivatives of physical x with respect to r, s, t.
    pub drdx: &'a B::Buffer,
    pub dsdx: &'a B::Buffer,
    pub dtdx: &'a B::Buffer,
    /// Metric derivatives of physical y with respect to r, s, t.
    pub drdy: &'a B::Buffer,
    pub dsdy: &'a B::Buffer,
    pub dtdy: &'a B::Buffer,
    /// Metric derivatives of physical z with respect to r, s, t.
    pub drdz: &'a B::Buffer,
    pub dsdz: &'a B::Buffer,
    pub dtdz: &'a B::Buffer,
    /// Inverse Jacobian field.
    pub jacinv: &'a B::Buffer,
}

impl<'a, B: ComputeBackend> Conv1Args<'a, B> {
    /// The full argument contract, in slot order. Index in this array is
    /// the positional slot the buffer is bound to.
    pub fn slots(&self) -> [(&'static str, &'a B::Buffer); 18] {
        [
            ("du", self.du),
            ("u", self.u),
            ("vx", self.vx),
            ("vy", self.vy),
            ("vz", self.vz),
            ("dx", self.dx),
            ("dy", self.dy),
            ("dz", self.dz),
            ("drdx", self.drdx),
            ("dsdx", self.dsdx),
            ("dtdx", self.dtdx),
            ("drdy", self.drdy),
            ("dsdy", self.dsdy),
            ("dtdy", self.dtdy),
            ("drdz", self.drdz),
            ("dsdz", self.dsdz),
            ("dtdz", self.dtdz),
            ("jacinv", self.jacinv),
        ]
    }
}

/// Compute the work partition for an element count.
///
/// `local` is fixed at [`WORK_GROUP_SIZE`] and `global` is one group per
/// element, so `global % local == 0` holds by construction.
pub fn work_partition(elements: u32) -> DispatchResult<WorkPartition> {
    if elements == 0 {
        return Err(DispatchError::InvalidConfig(
            "element count must be positive".into(),
        ));
    }
    Ok(WorkPartition {
        global: WORK_GROUP_SIZE * u64::from(elements),
        local: WORK_GROUP_SIZE,
    })
}

/// Dispatcher for the convective-term operator.
///
/// Holds the backend handle and the operator's program cache. One
/// instance serves the whole run; `dispatch` is called once per operator
/// application per timestep or substep.
pub struct Conv1Kernel<B: ComputeBackend> {
    backend: B,
    program: ProgramCache<B::Program>,
}

impl<B: ComputeBackend> Conv1Kernel<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            program: ProgramCache::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Select, bind, and enqueue the conv1 kernel for one application.
    ///
    /// Synchronous up to submission only: the returned event may be
    /// awaited for completion or dropped. Any failure aborts the call
    /// with nothing enqueued; a bind or enqueue failure leaves the
    /// program cache intact, so later calls may still succeed.
    pub fn dispatch(
        &self,
        args: &Conv1Args<'_, B>,
        config: &Conv1Config,
    ) -> DispatchResult<B::Event> {
        if config.gdim != 2 && config.gdim != 3 {
            return Err(DispatchError::InvalidConfig(format!(
                "geometric dimension must be 2 or 3, got {}",
                config.gdim
            )));
        }
        if config.elements == 0 {
            return Err(DispatchError::InvalidConfig(
                "element count must be positive".into(),
            ));
        }

        let program = self.program.get_or_compile(|| {
            log::debug!(
                "compiling conv1 kernel module ({} order variants)",
                VARIANTS.len()
            );
            self.backend.compile_program(CONV1_SOURCE)
        })?;

        let name = variant_name(config.order)
            .ok_or(DispatchError::UnsupportedOrder(config.order))?;
        let mut kernel = self.backend.create_kernel(program, name)?;

        for (slot, (arg_name, buffer)) in args.slots().into_iter().enumerate() {
            self.backend
                .bind_buffer(&mut kernel, slot, buffer)
                .map_err(|e| DispatchError::Bind {
                    slot,
                    name: arg_name,
                    detail: e.to_string(),
                })?;
        }

        let partition = work_partition(config.elements)?;
        log::trace!(
            "enqueue {name}: {} elements, global {} local {}",
            config.elements,
            partition.global,
            partition.local
        );
        self.backend.enqueue(kernel, partition)
    }
}
