//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` struct matching the database row, a
//! conversion into the matching `coffeetrace_core` type, and the create DTOs
//! used for inserts that the progression engine does not own.

pub mod batch;
pub mod evaluation;
pub mod processing_method;
pub mod progress;
pub mod stage;
