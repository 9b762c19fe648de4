// core/src/gpu/nvml.rs
use super::Sampler;
use crate::error::SamplerError;
use nvml_wrapper::error::NvmlError;
use nvml_wrapper::Nvml;

const BYTES_PER_MB: u64 = 1024 * 1024;

fn nvml_err(step: impl Into<String>) -> impl FnOnce(NvmlError) -> SamplerError {
    let step = step.into();
    move |source| SamplerError::Nvml { step, source }
}

/// Samples through NVML and renders the same rows nvidia-smi would print.
pub struct NvmlSampler {
    // Holds exclusive ownership of NVML
    nvml: Nvml,
}

impl NvmlSampler {
    pub fn new() -> Result<Self, SamplerError> {
        let nvml = Nvml::init().map_err(nvml_err("initialization"))?;
        Ok(Self { nvml })
    }

    pub fn device_count(&self) -> Result<u32, SamplerError> {
        self.nvml.device_count().map_err(nvml_err("device count"))
    }

    // `index, util, used_mb, total_mb` for one device
    fn device_row(&self, index: u32) -> Result<String, SamplerError> {
        let device = self
            .nvml
            .device_by_index(index)
            .map_err(nvml_err(format!("access to GPU {}", index)))?;
        let util = device
            .utilization_rates()
            .map_err(nvml_err(format!("utilization query on GPU {}", index)))?
            .gpu;
        let mem = device
            .memory_info()
            .map_err(nvml_err(format!("memory query on GPU {}", index)))?;

        Ok(format!(
            "{}, {}, {}, {}",
            index,
            util,
            mem.used / BYTES_PER_MB,
            mem.total / BYTES_PER_MB
        ))
    }
}

impl Sampler for NvmlSampler {
    fn name(&self) -> &str {
        "nvml"
    }

    fn sample(&mut self) -> Result<String, SamplerError> {
        let count = self.device_count()?;
        let mut out = String::new();
        for i in 0..count {
            out.push_str(&self.device_row(i)?);
            out.push('\n');
        }
        Ok(out)
    }
}
