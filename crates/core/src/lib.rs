//! Coffee batch processing domain logic.
//!
//! Stage ordering, evaluation outcomes, the failure comment codec, stage
//! advancement and the batch progression engine. Persistence is reached
//! only through the traits in [`store`].

pub mod batch;
pub mod error;
pub mod evaluation;
pub mod failure_codec;
pub mod memory_store;
pub mod progress;
pub mod progression;
pub mod stage_advancer;
pub mod stage_catalog;
pub mod status;
pub mod store;
pub mod types;
