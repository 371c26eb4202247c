use pingfan_model::ParsedLine;
use regex::{Captures, Regex};
use std::str::FromStr;
use std::sync::OnceLock;

struct Patterns {
    reply: Regex,
    packets: Regex,
    rtt: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        reply: Regex::new(r"\d+ bytes from .*?\b(?:icmp_)?seq=(\S+).*?\btime[=<](\S+?) ?ms\b")
            .expect("valid reply pattern"),
        packets: Regex::new(r"(\S+) packets transmitted, (\S+) (?:packets )?received")
            .expect("valid packet summary pattern"),
        rtt: Regex::new(
            r"min/avg/max/(?:mdev|stddev) = ([^/\s]+)/([^/\s]+)/([^/\s]+)/([^/\s]+) ms",
        )
        .expect("valid rtt pattern"),
    })
}

/// Classifies one line of `ping` output.
///
/// Patterns are tried in order (reply, packet summary, rtt statistics). A line that has the
/// right shape but carries numbers that do not parse is [`ParsedLine::Unrecognized`].
///
/// Replies printed as `time<1 ms` carry only an upper bound; they are recorded as 1.0 ms.
pub fn classify(line: &str) -> ParsedLine {
    let line = line.trim_end();
    let patterns = patterns();

    if let Some(caps) = patterns.reply.captures(line) {
        return parse_reply(&caps).unwrap_or(ParsedLine::Unrecognized);
    }
    if let Some(caps) = patterns.packets.captures(line) {
        return parse_packets(&caps).unwrap_or(ParsedLine::Unrecognized);
    }
    if let Some(caps) = patterns.rtt.captures(line) {
        return parse_rtt(&caps).unwrap_or(ParsedLine::Unrecognized);
    }

    ParsedLine::Unrecognized
}

fn parse_reply(caps: &Captures<'_>) -> Option<ParsedLine> {
    let sequence = field(caps, 1)?;
    let rtt_ms = finite(field(caps, 2)?)?;
    Some(ParsedLine::SeqReply { sequence, rtt_ms })
}

fn parse_packets(caps: &Captures<'_>) -> Option<ParsedLine> {
    Some(ParsedLine::PacketSummary {
        sent: field(caps, 1)?,
        received: field(caps, 2)?,
    })
}

fn parse_rtt(caps: &Captures<'_>) -> Option<ParsedLine> {
    Some(ParsedLine::RttStats {
        min_ms: finite(field(caps, 1)?)?,
        avg_ms: finite(field(caps, 2)?)?,
        max_ms: finite(field(caps, 3)?)?,
        stdev_ms: finite(field(caps, 4)?)?,
    })
}

fn field<T: FromStr>(caps: &Captures<'_>, index: usize) -> Option<T> {
    caps.get(index)?.as_str().parse().ok()
}

// `f64::from_str` accepts "inf" and "NaN"; ping never prints those.
fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
