//! imgvault core library
//!
//! Domain models, error taxonomy, configuration and the variant path
//! translator shared by every imgvault crate.

pub mod config;
pub mod error;
pub mod models;
pub mod variant_path;

pub use config::{
    BaseConfig, CacheConfig, Config, HostingConfig, ReconcileConfig, RelationConfig,
    ServiceConfig, TimeoutConfig,
};
pub use error::{AppError, ErrorMetadata, LogLevel, Violation};
pub use variant_path::VariantPathTranslator;
