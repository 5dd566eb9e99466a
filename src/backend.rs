//! Compile-time backend selection.
//!
//! `wgpu` takes precedence over `tch-gpu`, which takes precedence over the default `ndarray`.

use crate::error::{Error, Result};

/// First device id of a `CUDA_VISIBLE_DEVICES` style list, `None` for an empty list (CPU only).
pub fn parse_gpu(gpu: &str) -> Result<Option<usize>> {
    let Some(first) = gpu.split(',').map(str::trim).find(|id| !id.is_empty()) else {
        return Ok(None);
    };

    first
        .parse()
        .map(Some)
        .map_err(|_| Error::InvalidGpu(gpu.to_string()))
}

#[cfg(feature = "wgpu")]
mod selected {
    use super::*;
    use burn::backend::wgpu::WgpuDevice;

    pub type Backend = burn::backend::Wgpu;

    pub fn device(gpu: &str) -> Result<WgpuDevice> {
        Ok(match parse_gpu(gpu)? {
            Some(index) => WgpuDevice::DiscreteGpu(index),
            None => WgpuDevice::default(),
        })
    }
}

#[cfg(all(feature = "tch-gpu", not(feature = "wgpu")))]
mod selected {
    use super::*;
    use burn::backend::libtorch::LibTorchDevice;

    pub type Backend = burn::backend::LibTorch;

    pub fn device(gpu: &str) -> Result<LibTorchDevice> {
        Ok(match parse_gpu(gpu)? {
            Some(index) => LibTorchDevice::Cuda(index),
            None => LibTorchDevice::Cpu,
        })
    }
}

#[cfg(not(any(feature = "wgpu", feature = "tch-gpu")))]
mod selected {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;

    pub type Backend = burn::backend::NdArray;

    /// The ndarray backend only runs on the CPU, the id is still validated.
    pub fn device(gpu: &str) -> Result<NdArrayDevice> {
        parse_gpu(gpu)?;
        Ok(NdArrayDevice::Cpu)
    }
}

pub use selected::{device, Backend};
