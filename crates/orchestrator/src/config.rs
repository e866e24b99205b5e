//! Orchestrator configuration.

/// Tuning knobs for an [`Orchestrator`](crate::Orchestrator).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum number of workflows executing at the same time.
    pub pool_size: usize,
}

impl OrchestratorConfig {
    /// Returns a copy of this configuration with a different pool size.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { pool_size: 10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.pool_size, 10);
    }

    #[test]
    fn test_with_pool_size() {
        assert_eq!(OrchestratorConfig::default().with_pool_size(2).pool_size, 2);
    }
}
