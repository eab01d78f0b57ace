//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for interlink.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::resilience::backoff::RetryPolicy;
use crate::resilience::circuit_breaker::BreakerConfig;
use crate::resilience::registry::DependencyPolicy;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InterlinkConfig {
    /// Name reported by the health endpoints.
    pub service_name: String,

    /// Health / admin HTTP surface.
    pub admin: AdminConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Resilience policy applied to every dependency unless overridden.
    pub defaults: PolicyConfig,

    /// Downstream services this process calls.
    pub dependencies: Vec<DependencyConfig>,
}

impl Default for InterlinkConfig {
    fn default() -> Self {
        Self {
            service_name: "interlink".to_string(),
            admin: AdminConfig::default(),
            observability: ObservabilityConfig::default(),
            defaults: PolicyConfig::default(),
            dependencies: Vec::new(),
        }
    }
}

impl InterlinkConfig {
    pub fn dependency(&self, name: &str) -> Option<&DependencyConfig> {
        self.dependencies.iter().find(|d| d.name == name)
    }

    /// Effective policy for `name`: defaults with that dependency's overrides.
    pub fn policy_for(&self, name: &str) -> PolicyConfig {
        match self.dependency(name) {
            Some(dep) => dep.apply_overrides(&self.defaults),
            None => self.defaults.clone(),
        }
    }

    pub fn is_critical(&self, name: &str) -> bool {
        self.dependency(name).is_some_and(|d| d.critical)
    }
}

/// Health and admin HTTP server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bind address for `/health*` and `/admin/*`.
    pub bind_address: String,

    /// Expose `/admin/*` routes.
    pub enabled: bool,

    /// API key for `/admin/*` (Bearer token).
    pub api_key: String,

    /// Request timeout for the admin surface in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8081".to_string(),
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// `pretty` for development, `json` for production.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Circuit breaker, retry and timeout settings for a dependency.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Consecutive transient failures before the circuit opens.
    pub failure_threshold: u32,

    /// Time the circuit stays open before a probe, in milliseconds.
    pub recovery_timeout_ms: u64,

    /// Consecutive successful probes needed to close the circuit.
    pub success_threshold: u32,

    /// Total attempts per call, including the first.
    pub max_attempts: u32,

    /// Delay after the first failed attempt in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum backoff delay in milliseconds.
    pub max_delay_ms: u64,

    /// Backoff growth factor.
    pub multiplier: f64,

    /// Randomize backoff delays.
    pub jitter_enabled: bool,

    /// Timeout for a single attempt in milliseconds.
    pub per_attempt_timeout_ms: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 30_000,
            success_threshold: 1,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
            multiplier: 2.0,
            jitter_enabled: true,
            per_attempt_timeout_ms: 5_000,
        }
    }
}

impl PolicyConfig {
    pub fn to_policy(&self) -> DependencyPolicy {
        DependencyPolicy {
            breaker: BreakerConfig {
                failure_threshold: self.failure_threshold,
                recovery_timeout: Duration::from_millis(self.recovery_timeout_ms),
                success_threshold: self.success_threshold,
            },
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                base_delay: Duration::from_millis(self.base_delay_ms),
                max_delay: Duration::from_millis(self.max_delay_ms),
                multiplier: self.multiplier,
                jitter_enabled: self.jitter_enabled,
            },
            per_attempt_timeout: Duration::from_millis(self.per_attempt_timeout_ms),
        }
    }
}

/// A downstream service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DependencyConfig {
    /// Registry key and observability label (e.g. "cart-service").
    pub name: String,

    /// Base URL requests are issued against (e.g. "http://localhost:8003").
    pub base_url: String,

    /// An open circuit on this dependency makes the service unready.
    #[serde(default)]
    pub critical: bool,

    // Per-dependency overrides of `[defaults]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_attempt_timeout_ms: Option<u64>,
}

impl DependencyConfig {
    /// A dependency using the defaults unchanged.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            critical: false,
            failure_threshold: None,
            recovery_timeout_ms: None,
            success_threshold: None,
            max_attempts: None,
            base_delay_ms: None,
            max_delay_ms: None,
            multiplier: None,
            jitter_enabled: None,
            per_attempt_timeout_ms: None,
        }
    }

    pub fn apply_overrides(&self, defaults: &PolicyConfig) -> PolicyConfig {
        PolicyConfig {
            failure_threshold: self.failure_threshold.unwrap_or(defaults.failure_threshold),
            recovery_timeout_ms: self.recovery_timeout_ms.unwrap_or(defaults.recovery_timeout_ms),
            success_threshold: self.success_threshold.unwrap_or(defaults.success_threshold),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            base_delay_ms: self.base_delay_ms.unwrap_or(defaults.base_delay_ms),
            max_delay_ms: self.max_delay_ms.unwrap_or(defaults.max_delay_ms),
            multiplier: self.multiplier.unwrap_or(defaults.multiplier),
            jitter_enabled: self.jitter_enabled.unwrap_or(defaults.jitter_enabled),
            per_attempt_timeout_ms: self.per_attempt_timeout_ms.unwrap_or(defaults.per_attempt_timeout_ms),
        }
    }
}
