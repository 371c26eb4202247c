use anyhow::anyhow;
use pingfan_model::ProbeTask;
use pingfan_probe::{Orchestrator, ProbeLines, ProbeRunner, RunSettings, RunState};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
struct FakeRunner {
    failing: Vec<String>,
    delays: HashMap<String, Duration>,
    launches: Arc<Mutex<HashMap<String, u32>>>,
}

impl FakeRunner {
    fn new(failing: &[&str]) -> Self {
        Self {
            failing: failing.iter().map(|t| t.to_string()).collect(),
            delays: HashMap::new(),
            launches: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn with_delay(mut self, target: &str, delay: Duration) -> Self {
        self.delays.insert(target.to_string(), delay);
        self
    }
}

impl ProbeRunner for FakeRunner {
    fn launch(&self, task: &ProbeTask) -> anyhow::Result<ProbeLines> {
        *self
            .launches
            .lock()
            .unwrap()
            .entry(task.target.clone())
            .or_insert(0) += 1;

        if self.failing.contains(&task.target) {
            return Err(anyhow!("failed to spawn ping for {}", task.target));
        }
        if let Some(delay) = self.delays.get(&task.target) {
            thread::sleep(*delay);
        }

        let target = &task.target;
        let mut lines = vec![format!("PING {target} ({target}) 56(84) bytes of data.")];
        for seq in 1..=task.count {
            lines.push(format!(
                "64 bytes from {target}: icmp_seq={seq} ttl=64 time=1.{seq} ms"
            ));
        }
        lines.push(format!("--- {target} ping statistics ---"));
        lines.push(format!(
            "{0} packets transmitted, {0} received, 0% packet loss, time 10ms",
            task.count
        ));
        lines.push("rtt min/avg/max/mdev = 1.100/1.200/1.300/0.050 ms".to_string());
        Ok(Box::new(lines.into_iter()))
    }
}

fn quick(count: u32) -> RunSettings {
    RunSettings {
        count,
        cooldown: Duration::ZERO,
        grace: Duration::ZERO,
        ..RunSettings::default()
    }
}

fn targets(names: &[&str]) -> Vec<String> {
    names.iter().map(|t| t.to_string()).collect()
}

#[test]
fn failed_launch_does_not_affect_other_targets() {
    let runner = Arc::new(FakeRunner::new(&["a"]));
    let out = SharedBuf::default();
    let mut orchestrator = Orchestrator::new(quick(3), runner.clone());

    let report = orchestrator
        .run(&targets(&["a", "b", "c"]), out.clone())
        .unwrap();

    let lines = out.lines();
    assert_eq!(lines.len(), 4);
    assert!(lines.iter().all(|line| !line.starts_with("a: ")));
    for target in ["b", "c"] {
        assert!(lines.contains(&format!("{target}: sent: 3 received: 3 loss: 0.0%")));
        assert!(lines.contains(&format!(
            "{target}: min: 1.100 avg: 1.200 max: 1.300 stdev: 0.050 (ms)"
        )));
    }

    assert_eq!(orchestrator.state(), RunState::Terminated);
    assert!(!report.targets[0].launched);
    assert!(report.targets[0].error.is_some());
    assert_eq!(report.targets[1].replies.len(), 3);
    assert_eq!(report.targets[2].replies.len(), 3);

    // No retries.
    assert_eq!(runner.launches.lock().unwrap().get("a"), Some(&1));
}

#[test]
fn entries_from_one_target_stay_in_order() {
    let runner = Arc::new(FakeRunner::new(&[]).with_delay("slow", Duration::from_millis(50)));
    let out = SharedBuf::default();
    let mut orchestrator = Orchestrator::new(quick(2), runner);

    orchestrator
        .run(&targets(&["slow", "fast"]), out.clone())
        .unwrap();

    let lines = out.lines();
    assert_eq!(lines.len(), 4);
    for target in ["slow", "fast"] {
        let own: Vec<&String> = lines
            .iter()
            .filter(|line| line.starts_with(&format!("{target}: ")))
            .collect();
        assert_eq!(own.len(), 2);
        assert!(own[0].contains("sent: 2"));
        assert!(own[1].contains("min: "));
    }
}

#[test]
fn workers_run_concurrently() {
    let delay = Duration::from_millis(200);
    let names = ["t0", "t1", "t2", "t3", "t4"];
    let runner = names
        .iter()
        .fold(FakeRunner::new(&[]), |runner, name| runner.with_delay(name, delay));
    let mut orchestrator = Orchestrator::new(quick(1), Arc::new(runner));

    let started = std::time::Instant::now();
    orchestrator.run(&targets(&names), io::sink()).unwrap();

    assert!(started.elapsed() < delay * names.len() as u32);
}

/// Stalls on every flush, so the reporter falls behind the workers.
#[derive(Clone, Default)]
struct SlowBuf(SharedBuf);

impl Write for SlowBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        thread::sleep(Duration::from_millis(50));
        Ok(())
    }
}

#[test]
fn small_queue_drops_overflow_without_blocking_producers() {
    let mut settings = quick(3);
    settings.queue_capacity = 1;
    settings.echo_replies = true;
    let out = SlowBuf::default();
    let mut orchestrator = Orchestrator::new(settings, Arc::new(FakeRunner::new(&[])));

    let report = orchestrator
        .run(&targets(&["x", "y", "z"]), out.clone())
        .unwrap();

    assert_eq!(report.targets.len(), 3);
    assert!(report.targets.iter().all(|t| t.packets.is_some()));
    assert!(report.dropped_reports > 0);

    // Three replies and two summaries per target: every entry is either printed or dropped.
    let printed = out.0.lines().len() as u64;
    assert_eq!(printed + report.dropped_reports, 3 * 5);
}

#[test]
fn progress_reaches_complete_after_all_workers() {
    let progress_out = SharedBuf::default();
    let mut orchestrator = Orchestrator::new(quick(2), Arc::new(FakeRunner::new(&["down"])))
        .with_progress(progress_out.clone());

    orchestrator
        .run(&targets(&["up", "down"]), io::sink())
        .unwrap();

    let drawn = String::from_utf8(progress_out.0.lock().unwrap().clone()).unwrap();
    assert!(drawn.starts_with('\r'));
    assert!(drawn.ends_with("\r100.0%\n"));
    // Only "up" produced output: 6 of the 14 expected lines.
    assert!(drawn.contains("\r42.8%"));
}

#[test]
fn echo_replies_prints_per_reply_lines() {
    let mut settings = quick(2);
    settings.echo_replies = true;
    let out = SharedBuf::default();
    let mut orchestrator = Orchestrator::new(settings, Arc::new(FakeRunner::new(&[])));

    orchestrator.run(&targets(&["h"]), out.clone()).unwrap();

    assert_eq!(
        out.lines(),
        vec![
            "h: seq 1 time 1.100 ms",
            "h: seq 2 time 1.200 ms",
            "h: sent: 2 received: 2 loss: 0.0%",
            "h: min: 1.100 avg: 1.200 max: 1.300 stdev: 0.050 (ms)",
        ]
    );
}
