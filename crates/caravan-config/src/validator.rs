//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::{Config, StoreBackend};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Turn the first error into a [`ConfigError`].
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(ConfigError::InvalidValue {
                field: err.path,
                message: err.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_engine(config, &mut result);
        Self::validate_store(config, &mut result);
        Self::validate_logging(config, &mut result);

        Ok(result)
    }

    fn validate_engine(config: &Config, result: &mut ValidationResult) {
        let engine = &config.engine;

        if !engine.backoff_multiplier.is_finite() || engine.backoff_multiplier < 1.0 {
            result.add_error(ValidationError::new(
                "engine.backoff_multiplier",
                "backoff_multiplier must be a finite number >= 1.0",
            ));
        }

        if engine.max_retry_delay_ms < engine.retry_delay_ms {
            result.add_error(ValidationError::new(
                "engine.max_retry_delay_ms",
                "max_retry_delay_ms cannot be smaller than retry_delay_ms",
            ));
        }

        if engine.max_retries > 20 {
            result.add_warning(ValidationWarning::new(
                "engine.max_retries",
                "max_retries is very high (>20), a broken step will hold its workflow for a long time",
            ));
        }

        if !engine.auto_retry && engine.max_retries == 0 {
            result.add_warning(ValidationWarning::new(
                "engine.max_retries",
                "max_retries = 0 has no effect while auto_retry is disabled",
            ));
        }

        for (i, field) in engine.result_echo_fields.iter().enumerate() {
            if field.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("engine.result_echo_fields[{}]", i),
                    "Echo field name cannot be empty",
                ));
            }
        }
    }

    fn validate_store(config: &Config, result: &mut ValidationResult) {
        let store = &config.store;

        if store.backend != StoreBackend::Memory && store.path.as_os_str().is_empty() {
            result.add_error(ValidationError::new(
                "store.path",
                format!("A path is required for the {} backend", store.backend),
            ));
        }

        if store.backend == StoreBackend::Memory && config.engine.auto_recover {
            result.add_warning(ValidationWarning::new(
                "engine.auto_recover",
                "auto_recover has nothing to recover with the memory backend",
            ));
        }
    }

    fn validate_logging(config: &Config, result: &mut ValidationResult) {
        let level = config.logging.level.trim().to_lowercase();
        // Full filter directives such as "caravan=debug,info" are accepted as-is.
        let is_directive = level.contains('=') || level.contains(',');
        if !is_directive && !LOG_LEVELS.contains(&level.as_str()) {
            result.add_error(ValidationError::new(
                "logging.level",
                format!(
                    "Unknown log level '{}', expected one of: {}",
                    config.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }

        if config.logging.json && config.logging.log_dir.is_none() {
            result.add_warning(ValidationWarning::new(
                "logging.json",
                "json only applies to the log file and log_dir is not set",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
