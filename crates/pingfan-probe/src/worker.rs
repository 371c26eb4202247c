use crate::parser::classify;
use crate::progress::Progress;
use crate::queue::ReportQueue;
use crate::runner::ProbeRunner;
use pingfan_model::{
    loss_percent, PacketCounts, ParsedLine, ProbeTask, Reply, ReportEntry, RttSummary,
    TargetReport,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Pause after the probe's output ends, before the worker returns.
    pub cooldown: Duration,
    /// Also enqueue per-reply lines, not only the end-of-run summaries.
    pub echo_replies: bool,
    /// Counts every line of probe output, recognized or not.
    pub progress: Option<Arc<Progress>>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(3),
            echo_replies: false,
            progress: None,
        }
    }
}

/// Probes one target to completion.
///
/// Summary lines are submitted to `queue` as they arrive; the returned report carries
/// everything that was parsed. A launch failure is logged and recorded, never propagated.
pub fn run_probe(
    task: ProbeTask,
    runner: &dyn ProbeRunner,
    queue: &ReportQueue,
    settings: &WorkerSettings,
) -> TargetReport {
    let lines = match runner.launch(&task) {
        Ok(lines) => lines,
        Err(err) => {
            let message = format!("{err:#}");
            tracing::error!(host = %task.target, error = %message, "probe failed to launch");
            return TargetReport::failed(task.target, message);
        }
    };

    tracing::debug!(host = %task.target, count = task.count, "probe started");
    let mut report = TargetReport::new(task.target.as_str());
    report.launched = true;

    for line in lines {
        if let Some(progress) = &settings.progress {
            progress.tick();
        }
        let parsed = classify(&line);
        let Some(text) = format_parsed(&parsed) else {
            tracing::trace!(
                host = %task.target,
                line = line.trim_end(),
                "unrecognized probe output"
            );
            continue;
        };

        let enqueue = match parsed {
            ParsedLine::SeqReply { sequence, rtt_ms } => {
                report.replies.push(Reply { sequence, rtt_ms });
                settings.echo_replies
            }
            ParsedLine::PacketSummary { sent, received } => {
                report.packets = Some(PacketCounts::new(sent, received));
                true
            }
            ParsedLine::RttStats {
                min_ms,
                avg_ms,
                max_ms,
                stdev_ms,
            } => {
                report.rtt = Some(RttSummary {
                    min_ms,
                    avg_ms,
                    max_ms,
                    stdev_ms,
                });
                true
            }
            ParsedLine::Unrecognized => false,
        };

        if enqueue {
            queue.submit(ReportEntry::new(task.target.as_str(), text));
        }
    }

    tracing::debug!(host = %task.target, replies = report.replies.len(), "probe output ended");
    if !settings.cooldown.is_zero() {
        thread::sleep(settings.cooldown);
    }
    report
}

/// Human-readable rendering of a parsed line; `None` for unrecognized lines.
pub fn format_parsed(parsed: &ParsedLine) -> Option<String> {
    let text = match *parsed {
        ParsedLine::SeqReply { sequence, rtt_ms } => format!("seq {sequence} time {rtt_ms:.3} ms"),
        ParsedLine::PacketSummary { sent, received } => match loss_percent(sent, received) {
            Some(loss) => format!("sent: {sent} received: {received} loss: {loss:.1}%"),
            None => format!("sent: {sent} received: {received} loss: n/a"),
        },
        ParsedLine::RttStats {
            min_ms,
            avg_ms,
            max_ms,
            stdev_ms,
        } => format!(
            "min: {min_ms:.3} avg: {avg_ms:.3} max: {max_ms:.3} stdev: {stdev_ms:.3} (ms)"
        ),
        ParsedLine::Unrecognized => return None,
    };
    Some(text)
}
