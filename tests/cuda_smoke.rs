//! Real-device smoke test for the conv1 dispatch path.
//!
//! Needs an NVIDIA driver and at least one GPU, so it is ignored by
//! default. Run with: cargo test --test cuda_smoke -- --ignored
#![cfg(feature = "cuda")]

use cudarc::driver::{CudaSlice, DevicePtr};
use sem_kernels::{
    Conv1Args, Conv1Config, Conv1Kernel, CudaBackend, DeviceBuffer, LaunchEvent,
};

#[test]
#[ignore = "requires a CUDA device"]
fn dispatches_on_a_real_device() {
    const ORDER: usize = 4;
    const ELEMENTS: usize = 8;
    let points = ORDER * ORDER * ORDER * ELEMENTS;

    let backend = match CudaBackend::new(0) {
        Ok(backend) => backend,
        Err(e) => panic!("no usable CUDA device: {e}"),
    };
    let stream = backend.stream().clone();

    // Slots 5..8 are the lx*lx differentiation matrices; the rest are
    // per-point volume fields.
    let slices: Vec<CudaSlice<f64>> = (0..18)
        .map(|slot| {
            let len = if (5..8).contains(&slot) {
                ORDER * ORDER
            } else {
                points
            };
            stream.alloc_zeros::<f64>(len).unwrap()
        })
        .collect();
    let handles: Vec<DeviceBuffer> = slices
        .iter()
        .map(|slice| {
            let (ptr, _sync) = slice.device_ptr(&stream);
            DeviceBuffer::from_raw(ptr)
        })
        .collect();

    let args = Conv1Args {
        du: &handles[0],
        u: &handles[1],
        vx: &handles[2],
        vy: &handles[3],
        vz: &handles[4],
        dx: &handles[5],
        dy: &handles[6],
        dz: &handles[7],
        drdx: &handles[8],
        dsdx: &handles[9],
        dtdx: &handles[10],
        drdy: &handles[11],
        dsdy: &handles[12],
        dtdy: &handles[13],
        drdz: &handles[14],
        dsdz: &handles[15],
        dtdz: &handles[16],
        jacinv: &handles[17],
    };

    let op = Conv1Kernel::new(backend);
    let config = Conv1Config {
        elements: ELEMENTS as u32,
        gdim: 3,
        order: ORDER as u32,
    };

    // First dispatch triggers the JIT compile; second reuses the module.
    let event = op.dispatch(&args, &config).unwrap();
    event.synchronize().unwrap();
    let event = op.dispatch(&args, &config).unwrap();
    event.synchronize().unwrap();
}
