//! # linkfeed-core
//!
//! Core types, traits, and abstractions for linkfeed.
//!
//! This crate provides the data structures shared by every other crate, the
//! collaborator traits the update scheduler and read path are written
//! against, and the declarative request-parameter schema together with the
//! validator that enforces it.

pub mod defaults;
pub mod error;
pub mod models;
pub mod schema;
pub mod traits;
pub mod validation;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use schema::{ParameterKind, ParameterSchema, ParameterSpec, RouteParameters, SchemaLoadError};
pub use traits::*;
pub use validation::{validate, ValidationError};
