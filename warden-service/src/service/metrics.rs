use log::debug;
use prometheus::{Encoder, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use warden_core::foundation::CustodyError;

#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub rounds_started: u64,
    pub rounds_completed: u64,
    pub rounds_failed: u64,
    pub signatures_produced: u64,
    pub rpc_ok: u64,
    pub rpc_error: u64,
}

pub struct Metrics {
    registry: Registry,
    rounds_total: IntCounterVec,
    signatures_total: IntCounter,
    rpc_requests_total: IntCounterVec,
    started_at: Instant,
    rounds_started: AtomicU64,
    rounds_completed: AtomicU64,
    rounds_failed: AtomicU64,
    signatures_seen: AtomicU64,
    rpc_ok: AtomicU64,
    rpc_error: AtomicU64,
}

impl Metrics {
    pub fn new() -> Result<Self, CustodyError> {
        debug!("initializing prometheus metrics");
        let registry = Registry::new();
        let rounds_total =
            IntCounterVec::new(prometheus::Opts::new("rounds_total", "MPC rounds by kind and outcome"), &["kind", "outcome"])
                .map_err(|err| metrics_err("register", err))?;
        let signatures_total = IntCounter::new("signatures_total", "Signatures produced")
            .map_err(|err| metrics_err("metrics", err))?;
        let rpc_requests_total = IntCounterVec::new(
            prometheus::Opts::new("rpc_requests_total", "RPC requests by method and status"),
            &["method", "status"],
        )
        .map_err(|err| metrics_err("metrics", err))?;

        registry.register(Box::new(rounds_total.clone())).map_err(|err| metrics_err("metrics", err))?;
        registry.register(Box::new(signatures_total.clone())).map_err(|err| metrics_err("metrics", err))?;
        registry.register(Box::new(rpc_requests_total.clone())).map_err(|err| metrics_err("metrics", err))?;

        Ok(Self {
            registry,
            rounds_total,
            signatures_total,
            rpc_requests_total,
            started_at: Instant::now(),
            rounds_started: AtomicU64::new(0),
            rounds_completed: AtomicU64::new(0),
            rounds_failed: AtomicU64::new(0),
            signatures_seen: AtomicU64::new(0),
            rpc_ok: AtomicU64::new(0),
            rpc_error: AtomicU64::new(0),
        })
    }

    pub fn inc_round(&self, kind: &str, outcome: &str) {
        self.rounds_total.with_label_values(&[kind, outcome]).inc();
        match outcome {
            "started" => {
                self.rounds_started.fetch_add(1, Ordering::Relaxed);
            }
            "completed" => {
                self.rounds_completed.fetch_add(1, Ordering::Relaxed);
            }
            "failed" => {
                self.rounds_failed.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn inc_signature(&self) {
        self.signatures_total.inc();
        self.signatures_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rpc_request(&self, method: &str, status: &str) {
        self.rpc_requests_total.with_label_values(&[method, status]).inc();
        match status {
            "ok" => {
                self.rpc_ok.fetch_add(1, Ordering::Relaxed);
            }
            "error" => {
                self.rpc_error.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime: self.started_at.elapsed(),
            rounds_started: self.rounds_started.load(Ordering::Relaxed),
            rounds_completed: self.rounds_completed.load(Ordering::Relaxed),
            rounds_failed: self.rounds_failed.load(Ordering::Relaxed),
            signatures_produced: self.signatures_seen.load(Ordering::Relaxed),
            rpc_ok: self.rpc_ok.load(Ordering::Relaxed),
            rpc_error: self.rpc_error.load(Ordering::Relaxed),
        }
    }

    pub fn encode(&self) -> Result<String, CustodyError> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| metrics_err("metrics", err))?;
        String::from_utf8(buffer).map_err(|err| metrics_err("metrics", err))
    }
}

fn metrics_err(operation: &str, err: impl std::fmt::Display) -> CustodyError {
    CustodyError::MetricsError { operation: operation.to_string(), details: err.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_snapshot_and_exposition() {
        let metrics = Metrics::new().expect("metrics");
        metrics.inc_round("keygen", "started");
        metrics.inc_round("keygen", "completed");
        metrics.inc_round("sign", "failed");
        metrics.inc_signature();
        metrics.inc_rpc_request("intent.sign", "ok");
        metrics.inc_rpc_request("intent.sign", "error");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rounds_started, 1);
        assert_eq!(snapshot.rounds_completed, 1);
        assert_eq!(snapshot.rounds_failed, 1);
        assert_eq!(snapshot.signatures_produced, 1);
        assert_eq!(snapshot.rpc_ok, 1);
        assert_eq!(snapshot.rpc_error, 1);

        let body = metrics.encode().expect("encode");
        assert!(body.contains("rounds_total"));
        assert!(body.contains("signatures_total"));
        assert!(body.contains("rpc_requests_total"));
    }
}
