//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate policy ranges for the defaults and every dependency override
//! - Check dependency names are unique and base URLs parse
//! - Check bind addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: InterlinkConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{InterlinkConfig, PolicyConfig};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{scope}.{field} must be at least 1")]
    Zero { scope: String, field: &'static str },

    #[error("{scope}.multiplier must be greater than 1 (got {value})")]
    Multiplier { scope: String, value: f64 },

    #[error("{scope}.base_delay_ms ({base}) exceeds max_delay_ms ({max})")]
    DelayRange { scope: String, base: u64, max: u64 },

    #[error("dependency at index {0} has an empty name")]
    EmptyName(usize),

    #[error("dependency '{0}' is declared more than once")]
    DuplicateName(String),

    #[error("dependency '{name}' has an invalid base_url '{url}': {reason}")]
    BaseUrl { name: String, url: String, reason: String },

    #[error("{field} '{value}' is not a valid socket address")]
    Address { field: &'static str, value: String },
}

pub fn validate_config(config: &InterlinkConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_policy("defaults", &config.defaults, &mut errors);

    let mut seen = HashSet::new();
    for (index, dep) in config.dependencies.iter().enumerate() {
        if dep.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName(index));
            continue;
        }
        if !seen.insert(dep.name.as_str()) {
            errors.push(ValidationError::DuplicateName(dep.name.clone()));
        }

        match url::Url::parse(&dep.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::BaseUrl {
                name: dep.name.clone(),
                url: dep.base_url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError::BaseUrl {
                name: dep.name.clone(),
                url: dep.base_url.clone(),
                reason: e.to_string(),
            }),
        }

        // Only report override problems the defaults did not already cause
        let effective = dep.apply_overrides(&config.defaults);
        if effective != config.defaults {
            validate_policy(&format!("dependencies.{}", dep.name), &effective, &mut errors);
        }
    }

    check_address("admin.bind_address", &config.admin.bind_address, &mut errors);
    if config.observability.metrics_enabled {
        check_address("observability.metrics_address", &config.observability.metrics_address, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_policy(scope: &str, policy: &PolicyConfig, errors: &mut Vec<ValidationError>) {
    let counts = [
        ("failure_threshold", u64::from(policy.failure_threshold)),
        ("success_threshold", u64::from(policy.success_threshold)),
        ("max_attempts", u64::from(policy.max_attempts)),
        ("recovery_timeout_ms", policy.recovery_timeout_ms),
        ("per_attempt_timeout_ms", policy.per_attempt_timeout_ms),
    ];
    for (field, value) in counts {
        if value == 0 {
            errors.push(ValidationError::Zero {
                scope: scope.to_string(),
                field,
            });
        }
    }

    if !(policy.multiplier > 1.0 && policy.multiplier.is_finite()) {
        errors.push(ValidationError::Multiplier {
            scope: scope.to_string(),
            value: policy.multiplier,
        });
    }

    if policy.base_delay_ms > policy.max_delay_ms {
        errors.push(ValidationError::DelayRange {
            scope: scope.to_string(),
            base: policy.base_delay_ms,
            max: policy.max_delay_ms,
        });
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Address {
            field,
            value: value.to_string(),
        });
    }
}
