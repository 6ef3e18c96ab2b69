pub mod config;
pub mod logging;

pub mod checksum;
pub mod error;
pub mod fetch_head;
pub mod job;
pub mod naming;
pub mod orchestrator;
pub mod planner;
pub mod retry;
pub mod safe_resume;
pub mod segmenter;
pub mod store;
pub mod strategy;
pub mod transfer;

pub use config::Settings;
pub use error::{EngineError, TransferError};
pub use job::{Job, JobDescriptor, JobId, JobKind, JobStatus};
pub use orchestrator::{JobEvent, JobHandle, Orchestrator, OrchestratorError};
