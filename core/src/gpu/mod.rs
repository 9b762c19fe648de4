// core/src/gpu/mod.rs
pub mod nvml;
pub mod parser;
pub mod sampler;

use crate::config::{Backend, SamplerConfig};
use crate::error::SamplerError;

pub use nvml::NvmlSampler;
pub use parser::parse_and_classify;
pub use sampler::SmiSampler;

/// Source of raw `index, util, used, total` rows.
pub trait Sampler {
    /// Short label for log lines.
    fn name(&self) -> &str;

    fn sample(&mut self) -> Result<String, SamplerError>;
}

pub fn build_sampler(config: &SamplerConfig) -> Result<Box<dyn Sampler>, SamplerError> {
    match config.backend {
        Backend::Smi => Ok(Box::new(SmiSampler::new(config.program.clone(), config.timeout))),
        Backend::Nvml => Ok(Box::new(NvmlSampler::new()?)),
    }
}
