use crate::{ConfigError, ConfigResult};

/// Trait for configuration validation
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}

/// General validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    pub fn validate_not_empty(value: &str, field_name: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{field_name} 不能为空")));
        }
        Ok(())
    }

    /// 周期类配置：大于0且不超过一天
    pub fn validate_interval_seconds(value: u64, field_name: &str) -> ConfigResult<()> {
        if value == 0 {
            return Err(ConfigError::Validation(format!("{field_name} 必须大于0")));
        }
        if value > 86_400 {
            return Err(ConfigError::Validation(format!(
                "{field_name} 不能超过86400秒"
            )));
        }
        Ok(())
    }
}
