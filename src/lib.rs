//! Compiler for codified valid usage (VU) statements: a small Python-like
//! language embedded in API documentation. VUs are checked against the API
//! registry, stripped for the versions and extensions a documentation build
//! includes, and rendered as source, highlighted markup and English prose.

pub mod batch;
pub mod config;
pub mod dsl;
pub mod error;
pub mod preprocessor;
pub mod schema;

pub use dsl::{compile_vu, parse_vu, RenderOptions, VuOutcome, VuRequest};
pub use error::AppError;
pub use schema::Schema;
