//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Methods that take
//! `&mut PgConnection` run inside a caller-owned transaction.

pub mod batch_repo;
pub mod evaluation_repo;
pub mod processing_method_repo;
pub mod progress_repo;
pub mod stage_repo;

pub use batch_repo::BatchRepo;
pub use evaluation_repo::EvaluationRepo;
pub use processing_method_repo::ProcessingMethodRepo;
pub use progress_repo::ProgressRepo;
pub use stage_repo::StageRepo;
