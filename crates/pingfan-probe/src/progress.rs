use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Lines a full `ping -c <count>` run prints: header, replies, blank, banner, two summaries.
pub fn expected_lines(count: u32, targets: usize) -> u64 {
    (u64::from(count) + 5).saturating_mul(targets as u64)
}

/// Running percentage of probe output consumed, redrawn in place as `\r12.5%`.
pub struct Progress {
    total: u64,
    seen: AtomicU64,
    out: Mutex<ProgressOut>,
}

struct ProgressOut {
    writer: Box<dyn Write + Send>,
    shown: Option<u64>,
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("total", &self.total)
            .field("seen", &self.seen())
            .finish()
    }
}

impl Progress {
    pub fn new<W>(total: u64, out: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            total,
            seen: AtomicU64::new(0),
            out: Mutex::new(ProgressOut {
                writer: Box::new(out),
                shown: None,
            }),
        }
    }

    pub fn seen(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }

    /// Counts one line of probe output.
    pub fn tick(&self) {
        let seen = self.seen.fetch_add(1, Ordering::Relaxed) + 1;
        // Stays below 100% until `finish`; failed launches never produce their share.
        let tenths = (seen.saturating_mul(1000) / self.total.max(1)).min(999);
        self.show(tenths, false);
    }

    pub fn finish(&self) {
        self.show(1000, true);
    }

    fn show(&self, tenths: u64, done: bool) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if out.shown.is_some_and(|shown| shown >= tenths) {
            return;
        }
        out.shown = Some(tenths);
        let end = if done { "\n" } else { "" };
        // Write errors are ignored.
        let _ = write!(out.writer, "\r{}.{}%{end}", tenths / 10, tenths % 10);
        let _ = out.writer.flush();
    }
}
