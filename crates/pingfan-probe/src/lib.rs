//! Concurrent ping fan-out: line classification, report queueing and orchestration.

pub mod error;
pub mod orchestrator;
pub mod parser;
pub mod progress;
pub mod queue;
pub mod reporter;
pub mod runner;
pub mod worker;

pub use error::RunError;
pub use orchestrator::{normalize_targets, Orchestrator, RunSettings, RunState};
pub use parser::classify;
pub use progress::Progress;
pub use queue::{Drained, ReportQueue, DEFAULT_QUEUE_CAPACITY};
pub use reporter::Reporter;
pub use runner::{ProbeLines, ProbeRunner, SystemPingRunner};
pub use worker::{format_parsed, run_probe, WorkerSettings};
