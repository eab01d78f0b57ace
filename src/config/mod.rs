//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → InterlinkConfig (validated, immutable)
//!     → BreakerRegistry policies + shared Arc<InterlinkConfig>
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → registry applies new policies (breaker state kept)
//!     → atomic swap of Arc<InterlinkConfig>
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - An invalid reload is logged and ignored; the running config stays

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{AdminConfig, DependencyConfig, InterlinkConfig, LogFormat, ObservabilityConfig, PolicyConfig};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
