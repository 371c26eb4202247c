use anyhow::{anyhow, Context, Result};
use pingfan_model::ProbeTask;
use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, Stdio};

/// Lines of probe output, in arrival order. The stream ends when the probe exits.
pub type ProbeLines = Box<dyn Iterator<Item = String> + Send>;

/// Launches the external probe for one task.
pub trait ProbeRunner: Send + Sync {
    fn launch(&self, task: &ProbeTask) -> Result<ProbeLines>;
}

/// Runs the system `ping` (or a compatible program) as a child process.
#[derive(Debug, Clone)]
pub struct SystemPingRunner {
    program: String,
}

impl Default for SystemPingRunner {
    fn default() -> Self {
        Self::new("ping")
    }
}

impl SystemPingRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the probe: `-c <count> [-W <wait>] <target>`.
    pub fn probe_args(task: &ProbeTask) -> Vec<String> {
        let mut args = vec!["-c".to_string(), task.count.to_string()];
        if task.timeout_ms > 0 {
            args.push("-W".to_string());
            args.push(reply_wait(task.timeout_ms));
        }
        args.push(task.target.clone());
        args
    }
}

// BSD ping takes -W in milliseconds, iputils ping in whole seconds.
fn reply_wait(timeout_ms: u64) -> String {
    if cfg!(any(target_os = "macos", target_os = "freebsd")) {
        timeout_ms.to_string()
    } else {
        ((timeout_ms + 999) / 1000).max(1).to_string()
    }
}

impl ProbeRunner for SystemPingRunner {
    fn launch(&self, task: &ProbeTask) -> Result<ProbeLines> {
        let target = &task.target;
        let mut child = Command::new(&self.program)
            .args(Self::probe_args(task))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {} for {target}", self.program))?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                reap(&mut child);
                return Err(anyhow!("missing {} stdout for {target}", self.program));
            }
        };

        Ok(Box::new(ChildLines {
            target: target.clone(),
            child: Some(child),
            reader: BufReader::new(stdout),
            buf: Vec::new(),
        }))
    }
}

/// Streams a child's stdout line by line and reaps the child once it is exhausted.
struct ChildLines {
    target: String,
    child: Option<Child>,
    reader: BufReader<ChildStdout>,
    buf: Vec<u8>,
}

impl ChildLines {
    fn finish(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        match child.wait() {
            Ok(status) => {
                tracing::debug!(host = %self.target, %status, "probe exited");
            }
            Err(err) => {
                tracing::warn!(host = %self.target, error = %err, "failed to wait for probe");
            }
        }
    }
}

impl Iterator for ChildLines {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.child.as_ref()?;

        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.finish();
                None
            }
            Ok(_) => Some(String::from_utf8_lossy(&self.buf).into_owned()),
            Err(err) => {
                tracing::warn!(host = %self.target, error = %err, "failed to read probe output");
                if let Some(child) = self.child.as_mut() {
                    reap(child);
                }
                self.child = None;
                None
            }
        }
    }
}

impl Drop for ChildLines {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            reap(child);
        }
    }
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
