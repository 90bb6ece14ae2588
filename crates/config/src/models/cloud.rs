use serde::{Deserialize, Serialize};

use crate::validation::ConfigValidator;
use crate::ConfigError;

/// 模拟云实例的缺省启停延迟
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CloudConfig {
    pub default_startup_delay_ms: u64,
    pub default_shutdown_delay_ms: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            default_startup_delay_ms: 5_000,
            default_shutdown_delay_ms: 2_000,
        }
    }
}

impl ConfigValidator for CloudConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        const MAX_DELAY_MS: u64 = 3_600_000;
        if self.default_startup_delay_ms > MAX_DELAY_MS
            || self.default_shutdown_delay_ms > MAX_DELAY_MS
        {
            return Err(ConfigError::Validation(
                "cloud 启停延迟不能超过一小时".to_string(),
            ));
        }
        Ok(())
    }
}
