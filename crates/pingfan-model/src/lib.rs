//! Shared data structures for pingfan.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const RUN_REPORT_VERSION: u32 = 1;

/// One unit of probing work. Owned by exactly one worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeTask {
    pub target: String,
    pub count: u32,
    pub timeout_ms: u64,
}

/// Outcome of classifying a single line of probe output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedLine {
    SeqReply {
        sequence: u32,
        rtt_ms: f64,
    },
    PacketSummary {
        sent: u32,
        received: u32,
    },
    RttStats {
        min_ms: f64,
        avg_ms: f64,
        max_ms: f64,
        stdev_ms: f64,
    },
    Unrecognized,
}

/// A line destined for the printed report stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportEntry {
    pub target: String,
    pub text: String,
}

impl ReportEntry {
    pub fn new(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.text)
    }
}

/// Percentage of packets lost, or `None` when nothing was sent.
pub fn loss_percent(sent: u32, received: u32) -> Option<f64> {
    if sent == 0 {
        return None;
    }
    Some(100.0 - f64::from(received) * 100.0 / f64::from(sent))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Reply {
    pub sequence: u32,
    pub rtt_ms: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PacketCounts {
    pub sent: u32,
    pub received: u32,
    pub loss_percent: Option<f64>,
}

impl PacketCounts {
    pub fn new(sent: u32, received: u32) -> Self {
        Self {
            sent,
            received,
            loss_percent: loss_percent(sent, received),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RttSummary {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    pub stdev_ms: f64,
}

/// Everything a worker learned about one target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetReport {
    pub target: String,
    pub launched: bool,
    pub replies: Vec<Reply>,
    pub packets: Option<PacketCounts>,
    pub rtt: Option<RttSummary>,
    pub error: Option<String>,
}

impl TargetReport {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            launched: false,
            replies: Vec::new(),
            packets: None,
            rtt: None,
            error: None,
        }
    }

    pub fn failed(target: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(target)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSettingsSummary {
    pub count: u32,
    pub timeout_ms: u64,
    pub cooldown_ms: u64,
    pub grace_ms: u64,
    pub queue_capacity: usize,
    pub echo_replies: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub version: u32,
    pub started_at_utc: String,
    pub finished_at_utc: String,
    pub settings: RunSettingsSummary,
    pub targets: Vec<TargetReport>,
    pub dropped_reports: u64,
}
