use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("no targets provided (use --targets host1,host2)")]
    NoTargets,
    #[error("failed to start {thread} thread")]
    Spawn {
        thread: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write report")]
    Report(#[source] io::Error),
    #[error("reporter thread panicked")]
    ReporterPanicked,
}

pub type Result<T> = std::result::Result<T, RunError>;
