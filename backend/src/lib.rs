//! # Profile Router - delimited files to profile update commands
//!
//! Profile Router reads delimited import files (CSV, TSV, ...) line by line and
//! turns every line into a typed, mergeable profile update, using a per-job
//! import configuration and the property types known to the profile store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Import File │────▶│   Parser    │────▶│ Line Split  │────▶│    Sink     │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (typed map) │     │ (envelopes) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                                ▲
//!                                  ┌─────────────┴─────────────┐
//!                                  │ Configuration + Schema    │
//!                                  └───────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use profile_router::{import_file, ErrorPolicy, FilePropertyTypes, ImportConfiguration, MemorySink};
//!
//! let config = ImportConfiguration::load("crm.json")?;
//! let provider = FilePropertyTypes::new("property-types");
//! let mut sink = MemorySink::new();
//! let report = import_file("people.csv".as_ref(), &config, &provider, &mut sink, ErrorPolicy::Collect)?;
//! println!("{}", report.summary());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (PropertyType, ProfileToImport, Event)
//! - [`config`] - Import configurations
//! - [`parser`] - Line tokenizing, multivalue splitting and decoding
//! - [`schema`] - Property type providers
//! - [`transform`] - Coercion, line transformer and job runner
//! - [`sink`] - Destinations for produced updates
//! - [`validation`] - Configuration schema validation
//! - [`registry`] - Stored configurations
//! - [`api`] - HTTP API server and event collector

// Core modules
pub mod error;
pub mod models;

// Configuration
pub mod config;

// Parsing
pub mod parser;

// Property types
pub mod schema;

// Transformation
pub mod transform;

// Output
pub mod sink;

// Validation
pub mod validation;

// Registry
pub mod registry;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError,
    FailureKind,
    ImportError,
    RecordError,
    RegistryError,
    SchemaError,
    ServerError,
    SinkError,
    TokenizeError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Event,
    ProfileToImport,
    PropertyType,
    PropertyValue,
    ValueType,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{ConfigType, ImportConfiguration, SinkKind};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{
    is_valid,
    is_valid_import_configuration,
    validate,
    validate_import_configuration,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_content,
    detect_encoding,
    split_line,
    split_multivalue,
};

// =============================================================================
// Re-exports - Schema
// =============================================================================

pub use schema::{
    FilePropertyTypes,
    InMemoryPropertyTypes,
    PropertyTypeProvider,
    SchemaSnapshot,
};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    import_file,
    run_import,
    run_import_bytes,
    transform_line,
    ErrorPolicy,
    ImportReport,
    LineOutcome,
    LineSplitProcessor,
    RecordFailure,
};

// =============================================================================
// Re-exports - Sinks
// =============================================================================

pub use sink::{JsonLinesSink, MemorySink, ProfileSink, RoutedProfile};

// =============================================================================
// Re-exports - Registry
// =============================================================================

pub use registry::{ConfigRegistry, StoredConfiguration};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, CollectorResponse, ImportResponse};

// Server
pub mod server {
    pub use crate::api::server::{build_router, start_server, AppState};
}
