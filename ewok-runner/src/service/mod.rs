//! Service layer
//!
//! Services contain business logic for the runner. They drive steps
//! through a command runner and collect the reports.
//!
//! All services are trait-based to enable testing and dependency injection.

mod execution;

// Re-export traits
pub use execution::PipelineExecutor;

// Re-export implementations
pub use execution::StandardPipelineExecutor;
