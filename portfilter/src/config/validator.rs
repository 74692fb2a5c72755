//! Configuration validation

use super::schema::{max_listing_len, Config, ControlConfig, EngineConfig};
use crate::error::{Result, ValidationError};
use std::net::Ipv4Addr;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate entire configuration
    pub fn validate(config: &Config) -> Result<()> {
        Self::validate_engine(&config.engine)?;
        Self::validate_control(&config.control)?;
        Self::validate_listing(config)?;
        Ok(())
    }

    fn validate_engine(engine: &EngineConfig) -> Result<()> {
        if engine.capacity == 0 {
            return Err(ValidationError::ZeroCapacity.into());
        }

        if engine.proxy_addr.parse::<Ipv4Addr>().is_err() {
            return Err(ValidationError::InvalidProxyAddr {
                addr: engine.proxy_addr.clone(),
            }
            .into());
        }

        Ok(())
    }

    fn validate_control(control: &ControlConfig) -> Result<()> {
        if control.socket_path.as_os_str().is_empty() {
            return Err(ValidationError::EmptySocketPath.into());
        }

        if control.max_command_len == 0 {
            return Err(ValidationError::ZeroBuffer {
                field: "max_command_len",
            }
            .into());
        }

        if control.show_buffer_len == 0 {
            return Err(ValidationError::ZeroBuffer {
                field: "show_buffer_len",
            }
            .into());
        }

        Ok(())
    }

    // Every legal table state has to fit in one show reply.
    fn validate_listing(config: &Config) -> Result<()> {
        let required = max_listing_len(config.engine.capacity);
        if config.control.show_buffer_len < required {
            return Err(ValidationError::ShowBufferTooSmall {
                len: config.control.show_buffer_len,
                required,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FilterError;
    use std::path::PathBuf;

    fn validation_error(config: &Config) -> ValidationError {
        match ConfigValidator::validate(config) {
            Err(FilterError::Validation(e)) => e,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_default_is_valid() {
        assert!(ConfigValidator::validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_capacity() {
        let mut config = Config::default();
        config.engine.capacity = 0;
        assert_eq!(validation_error(&config), ValidationError::ZeroCapacity);
    }

    #[test]
    fn test_bad_proxy_addr() {
        let mut config = Config::default();
        config.engine.proxy_addr = "131.1.1".to_string();
        assert_eq!(
            validation_error(&config),
            ValidationError::InvalidProxyAddr {
                addr: "131.1.1".to_string()
            }
        );

        // IPv6 is not supported
        config.engine.proxy_addr = "::1".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_zero_buffers() {
        let mut config = Config::default();
        config.control.max_command_len = 0;
        assert_eq!(
            validation_error(&config),
            ValidationError::ZeroBuffer {
                field: "max_command_len"
            }
        );

        let mut config = Config::default();
        config.control.show_buffer_len = 0;
        assert_eq!(
            validation_error(&config),
            ValidationError::ZeroBuffer {
                field: "show_buffer_len"
            }
        );
    }

    #[test]
    fn test_show_buffer_must_fit_full_table() {
        let mut config = Config::default();
        config.control.show_buffer_len = 200;
        assert_eq!(
            validation_error(&config),
            ValidationError::ShowBufferTooSmall {
                len: 200,
                required: 590
            }
        );

        config.engine.capacity = 16;
        assert!(ConfigValidator::validate(&config).is_ok());

        // 10 one-digit, 90 two-digit and 1 three-digit index
        let mut config = Config::default();
        config.engine.capacity = 101;
        config.control.show_buffer_len = 1202;
        assert_eq!(
            validation_error(&config),
            ValidationError::ShowBufferTooSmall {
                len: 1202,
                required: 1203
            }
        );
        config.control.show_buffer_len = 1203;
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_empty_socket_path() {
        let mut config = Config::default();
        config.control.socket_path = PathBuf::new();
        assert_eq!(validation_error(&config), ValidationError::EmptySocketPath);
    }
}
