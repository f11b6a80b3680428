//! Request middleware.

pub mod schema_validation;

pub use schema_validation::schema_validation;
