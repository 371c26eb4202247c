use crate::error::{Result, RunError};
use crate::progress::{expected_lines, Progress};
use crate::queue::{ReportQueue, DEFAULT_QUEUE_CAPACITY};
use crate::reporter::Reporter;
use crate::runner::ProbeRunner;
use crate::worker::{run_probe, WorkerSettings};
use chrono::{SecondsFormat, Utc};
use pingfan_model::{ProbeTask, RunReport, RunSettingsSummary, TargetReport, RUN_REPORT_VERSION};
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub count: u32,
    pub timeout_ms: u64,
    pub cooldown: Duration,
    pub grace: Duration,
    pub queue_capacity: usize,
    pub echo_replies: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            count: 10,
            timeout_ms: 1000,
            cooldown: Duration::from_secs(3),
            grace: Duration::from_secs(1),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            echo_replies: false,
        }
    }
}

impl RunSettings {
    fn worker_settings(&self, progress: Option<Arc<Progress>>) -> WorkerSettings {
        WorkerSettings {
            cooldown: self.cooldown,
            echo_replies: self.echo_replies,
            progress,
        }
    }

    fn summary(&self) -> RunSettingsSummary {
        RunSettingsSummary {
            count: self.count,
            timeout_ms: self.timeout_ms,
            cooldown_ms: duration_ms(self.cooldown),
            grace_ms: duration_ms(self.grace),
            queue_capacity: self.queue_capacity,
            echo_replies: self.echo_replies,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Draining,
    Terminated,
}

/// Trims each target and discards empty ones, keeping input order.
pub fn normalize_targets<I, S>(targets: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    targets
        .into_iter()
        .map(|target| target.as_ref().trim().to_string())
        .filter(|target| !target.is_empty())
        .collect()
}

/// Runs one probe worker per target and a single reporter, then shuts everything down.
pub struct Orchestrator {
    settings: RunSettings,
    runner: Arc<dyn ProbeRunner>,
    progress_out: Option<Box<dyn Write + Send>>,
    state: RunState,
}

impl Orchestrator {
    pub fn new(settings: RunSettings, runner: Arc<dyn ProbeRunner>) -> Self {
        Self {
            settings,
            runner,
            progress_out: None,
            state: RunState::Idle,
        }
    }

    /// Draws a running percentage of consumed probe output to `out` during the next run.
    pub fn with_progress<W>(mut self, out: W) -> Self
    where
        W: Write + Send + 'static,
    {
        self.progress_out = Some(Box::new(out));
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Probes every target concurrently, printing summaries to `out` as they arrive.
    ///
    /// Returns once every worker has finished and the reporter has printed everything that
    /// was queued. Failing to start a thread aborts the run.
    pub fn run<W>(&mut self, targets: &[String], out: W) -> Result<RunReport>
    where
        W: Write + Send + 'static,
    {
        let targets = normalize_targets(targets);
        if targets.is_empty() {
            return Err(RunError::NoTargets);
        }

        let started_at_utc = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let queue = Arc::new(ReportQueue::new(self.settings.queue_capacity));
        let reporter = Reporter::spawn(Arc::clone(&queue), out)?;
        let progress = self.progress_out.take().map(|out| {
            let total = expected_lines(self.settings.count, targets.len());
            Arc::new(Progress::new(total, out))
        });
        self.transition(RunState::Running);

        let mut workers = Vec::with_capacity(targets.len());
        for (index, target) in targets.iter().enumerate() {
            let task = ProbeTask {
                target: target.clone(),
                count: self.settings.count,
                timeout_ms: self.settings.timeout_ms,
            };
            let runner = Arc::clone(&self.runner);
            let queue = Arc::clone(&queue);
            let settings = self.settings.worker_settings(progress.clone());

            let spawned = thread::Builder::new()
                .name(format!("probe-{index}"))
                .spawn(move || run_probe(task, runner.as_ref(), &queue, &settings));

            match spawned {
                Ok(handle) => workers.push((target.clone(), handle)),
                Err(source) => {
                    tracing::error!(
                        host = %target,
                        error = %source,
                        "failed to start probe worker"
                    );
                    if let Err(err) = reporter.stop() {
                        tracing::warn!(error = %err, "reporter did not shut down cleanly");
                    }
                    self.transition(RunState::Terminated);
                    return Err(RunError::Spawn {
                        thread: format!("probe worker for {target}"),
                        source,
                    });
                }
            }
        }

        let mut reports = Vec::with_capacity(workers.len());
        for (target, handle) in workers {
            match handle.join() {
                Ok(report) => reports.push(report),
                Err(_) => {
                    tracing::error!(host = %target, "probe worker panicked");
                    reports.push(TargetReport::failed(target, "probe worker panicked"));
                }
            }
        }

        if let Some(progress) = &progress {
            progress.finish();
        }
        self.transition(RunState::Draining);
        if !self.settings.grace.is_zero() {
            thread::sleep(self.settings.grace);
        }

        let stopped = reporter.stop();
        self.transition(RunState::Terminated);
        let printed = stopped?;

        let dropped_reports = queue.dropped();
        if dropped_reports > 0 {
            tracing::warn!(
                dropped_reports,
                "report queue overflowed, some summaries were not printed"
            );
        }
        tracing::debug!(printed, targets = reports.len(), "run complete");

        Ok(RunReport {
            version: RUN_REPORT_VERSION,
            started_at_utc,
            finished_at_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            settings: self.settings.summary(),
            targets: reports,
            dropped_reports,
        })
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = ?self.state, to = ?next, "orchestrator state change");
        self.state = next;
    }
}
