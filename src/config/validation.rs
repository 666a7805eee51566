//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports present)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HostConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::HostConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: bind address is empty")]
    EmptyAddress { field: &'static str },

    #[error("{field}: bind address {address:?} has no port")]
    MissingPort { field: &'static str, address: String },

    #[error("rpc.max_message_bytes must be greater than zero")]
    ZeroMessageSize,

    #[error("http.request_timeout_secs must be greater than zero")]
    ZeroTimeout,

    #[error("observability.log_level {0:?} is not a known level")]
    UnknownLogLevel(String),
}

/// Expand the `:PORT` shorthand into an all-interfaces address.
pub fn normalize_authority(address: &str) -> String {
    let trimmed = address.trim();
    if trimmed.starts_with(':') {
        format!("0.0.0.0{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

fn check_address(field: &'static str, address: &str, errors: &mut Vec<ValidationError>) {
    if address.is_empty() {
        errors.push(ValidationError::EmptyAddress { field });
        return;
    }
    let has_port = address
        .rsplit_once(':')
        .map(|(_, port)| port.parse::<u16>().is_ok())
        .unwrap_or(false);
    if !has_port {
        errors.push(ValidationError::MissingPort {
            field,
            address: address.to_string(),
        });
    }
}

/// Validate a fully layered configuration.
pub fn validate_config(config: &HostConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address("rpc.bind_address", &config.rpc.bind_address, &mut errors);
    check_address("http.bind_address", &config.http.bind_address, &mut errors);

    if config.rpc.max_message_bytes == 0 {
        errors.push(ValidationError::ZeroMessageSize);
    }
    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
