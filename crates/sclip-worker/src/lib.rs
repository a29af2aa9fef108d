//! Job orchestration for the ShortClip backend.
//!
//! [`Orchestrator`] admits jobs through the weekly quota gate, persists them
//! and runs each one on its own background task:
//!
//! - `pipeline`: metadata, acquisition, segmentation and thumbnail for one job
//! - `executor`: task spawning and terminal failure handling
//! - `paths`: the per-job file namespace and its cleanup
//! - `logging`: the job span and typed lifecycle events

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod paths;
pub mod pipeline;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::spawn_job;
pub use logging::{job_span, JobEvent};
pub use orchestrator::{JobSummary, JobView, Orchestrator};
pub use paths::JobPaths;
pub use pipeline::{run_pipeline, JobContext, PipelineOutcome};
