use crate::error::{Result, RunError};
use crate::queue::ReportQueue;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Handle to the thread printing queued reports.
pub struct Reporter {
    queue: Arc<ReportQueue>,
    handle: JoinHandle<io::Result<u64>>,
}

impl Reporter {
    /// Starts printing batches from `queue` to `out` until the queue is closed.
    pub fn spawn<W>(queue: Arc<ReportQueue>, out: W) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        let reader = Arc::clone(&queue);
        let handle = thread::Builder::new()
            .name("reporter".to_string())
            .spawn(move || print_batches(&reader, out))
            .map_err(|source| RunError::Spawn {
                thread: "reporter".to_string(),
                source,
            })?;
        Ok(Self { queue, handle })
    }

    /// Closes the queue, waits for the remaining entries to be printed, and returns how many
    /// lines were written in total.
    pub fn stop(self) -> Result<u64> {
        self.queue.close();
        match self.handle.join() {
            Ok(result) => result.map_err(RunError::Report),
            Err(_) => Err(RunError::ReporterPanicked),
        }
    }
}

fn print_batches<W: Write>(queue: &ReportQueue, mut out: W) -> io::Result<u64> {
    let mut printed = 0u64;
    loop {
        let batch = queue.wait_drain();
        for entry in &batch.entries {
            writeln!(out, "{entry}")?;
            printed += 1;
        }
        out.flush()?;
        if batch.closed {
            tracing::debug!(printed, "reporter stopped");
            return Ok(printed);
        }
    }
}
