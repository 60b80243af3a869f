use llama_cpp_2::sampling::LlamaSampler;

use crate::sys_debug;

/// Sampling settings, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    /// `0.0` or below selects greedy decoding.
    pub temperature: f32,
    pub top_p: f32,
    pub seed: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 0.95,
            seed: 1234,
        }
    }
}

impl SamplingConfig {
    pub fn is_greedy(&self) -> bool {
        self.temperature <= 0.0
    }
}

/// Create a sampler based on the configuration.
pub(crate) fn create_sampler(config: &SamplingConfig) -> LlamaSampler {
    if config.is_greedy() {
        sys_debug!("[SAMPLER] Using greedy sampler");
        return LlamaSampler::greedy();
    }

    sys_debug!(
        "[SAMPLER] Using temperature sampler: temp={}, top_p={}, seed={}",
        config.temperature,
        config.top_p,
        config.seed
    );
    let samplers = vec![
        LlamaSampler::top_p(config.top_p, 1),
        LlamaSampler::temp(config.temperature),
        LlamaSampler::dist(config.seed),
    ];
    LlamaSampler::chain_simple(samplers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_greedy() {
        assert!(SamplingConfig::default().is_greedy());
    }

    #[test]
    fn test_positive_temperature_is_not_greedy() {
        let config = SamplingConfig {
            temperature: 0.7,
            ..SamplingConfig::default()
        };
        assert!(!config.is_greedy());
    }
}
