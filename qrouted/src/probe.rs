use std::net::Ipv4Addr;
use std::process::Command;
use std::time::Duration;

use anyhow::Context;
use log::trace;
use qroute::framework::Prober;
use qroute::metrics::ProbeReport;

use crate::routing::IPV4System;

/// Probes links with the system `ping`
#[derive(Clone, Debug)]
pub struct PingProber {
    /// how long to wait for each reply
    pub timeout: Duration,
}

impl PingProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Upper bound on the whole run, so a probe never blocks for longer than the cycle it belongs to
    fn deadline(&self, count: u32, interval: Duration) -> u64 {
        let total = interval * count + self.timeout;
        total.as_secs_f64().ceil() as u64 + 1
    }
}

impl Prober<IPV4System> for PingProber {
    fn probe(
        &mut self,
        target: &Ipv4Addr,
        count: u32,
        interval: Duration,
    ) -> anyhow::Result<ProbeReport> {
        let output = Command::new("ping")
            .arg("-n")
            .args(["-c", &count.to_string()])
            .args(["-i", &format!("{:.3}", interval.as_secs_f64())])
            .args(["-W", &self.timeout.as_secs_f64().ceil().max(1.0).to_string()])
            .args(["-w", &self.deadline(count, interval).to_string()])
            .arg(target.to_string())
            .output()
            .context("Failed to run ping")?;

        // ping exits non-zero when nothing came back, the output is still meaningful
        let stdout = String::from_utf8_lossy(&output.stdout);
        trace!("ping {target} exited with {}: {stdout}", output.status);
        Ok(parse_ping_output(&stdout, count))
    }
}

/// Extracts reply RTTs, the transmitted count and `mdev` from ping output.
/// Output that cannot be understood counts as total loss.
pub fn parse_ping_output(output: &str, count: u32) -> ProbeReport {
    let mut report = ProbeReport::total_loss(count);
    for line in output.lines() {
        if let Some(rtt) = parse_reply_time(line) {
            report.rtts_ms.push(rtt);
        } else if line.contains("packets transmitted") {
            if let Some(sent) = line
                .split_whitespace()
                .next()
                .and_then(|n| n.parse::<u32>().ok())
            {
                report.sent = sent;
            }
        } else if let Some(stats) = line.strip_prefix("rtt min/avg/max/mdev = ") {
            report.mdev_ms = stats
                .split_whitespace()
                .next()
                .and_then(|values| values.split('/').nth(3))
                .and_then(|mdev| mdev.parse::<f64>().ok());
        }
    }
    if report.rtts_ms.len() as u32 > report.sent {
        report.sent = report.rtts_ms.len() as u32;
    }
    report
}

fn parse_reply_time(line: &str) -> Option<f64> {
    let (_, rest) = line.split_once("time=")?;
    let value = rest.split_whitespace().next()?;
    value.trim_end_matches("ms").parse::<f64>().ok()
}
