//! HTTP handlers.
//!
//! Handlers validate request DTOs, delegate every status-changing operation
//! to the progression engine in [`crate::state::AppState`], and wrap results
//! in [`crate::response::DataResponse`].

pub mod batches;
pub mod evaluations;
pub mod failure_comments;
pub mod methods;
pub mod progress;
