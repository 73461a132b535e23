//! Engine-scoped metrics
//!
//! Counters live on the engine instance, not in process globals, so two
//! engines in one process never mix numbers. Recording is lock-free; the
//! dispatcher and the coherence layer bump counters, [`MetricsSnapshot`]
//! reads them out, and the engine logs a final snapshot when it drops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::dispatch::{AssignKind, Strategy};

/// Direction of a coherence transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    HostToDevice,
    DeviceToHost,
}

impl TransferDirection {
    pub fn name(self) -> &'static str {
        match self {
            TransferDirection::HostToDevice => "h2d",
            TransferDirection::DeviceToHost => "d2h",
        }
    }
}

/// Counters owned by one engine instance.
#[derive(Debug, Default)]
pub struct MetricsSink {
    accel_calls: AtomicU64,
    h2d_transfers: AtomicU64,
    h2d_bytes: AtomicU64,
    d2h_transfers: AtomicU64,
    d2h_bytes: AtomicU64,
    temporaries: AtomicU64,
    accel_assignments: AtomicU64,
    parallel_assignments: AtomicU64,
    vectorized_assignments: AtomicU64,
    scalar_assignments: AtomicU64,
}

impl MetricsSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_accel_call(&self) {
        self.accel_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transfer(&self, direction: TransferDirection, bytes: usize) {
        match direction {
            TransferDirection::HostToDevice => {
                self.h2d_transfers.fetch_add(1, Ordering::Relaxed);
                self.h2d_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
            }
            TransferDirection::DeviceToHost => {
                self.d2h_transfers.fetch_add(1, Ordering::Relaxed);
                self.d2h_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn record_assignment(&self, strategy: Strategy, temporaries: usize) {
        self.temporaries.fetch_add(temporaries as u64, Ordering::Relaxed);
        let counter = match strategy {
            Strategy::Accel => &self.accel_assignments,
            Strategy::Parallel => &self.parallel_assignments,
            Strategy::Vectorized => &self.vectorized_assignments,
            Strategy::Scalar => &self.scalar_assignments,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            accel_calls: self.accel_calls.load(Ordering::Relaxed),
            h2d_transfers: self.h2d_transfers.load(Ordering::Relaxed),
            h2d_bytes: self.h2d_bytes.load(Ordering::Relaxed),
            d2h_transfers: self.d2h_transfers.load(Ordering::Relaxed),
            d2h_bytes: self.d2h_bytes.load(Ordering::Relaxed),
            temporaries: self.temporaries.load(Ordering::Relaxed),
            accel_assignments: self.accel_assignments.load(Ordering::Relaxed),
            parallel_assignments: self.parallel_assignments.load(Ordering::Relaxed),
            vectorized_assignments: self.vectorized_assignments.load(Ordering::Relaxed),
            scalar_assignments: self.scalar_assignments.load(Ordering::Relaxed),
        }
    }
}

/// Counter values read at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub accel_calls: u64,
    pub h2d_transfers: u64,
    pub h2d_bytes: u64,
    pub d2h_transfers: u64,
    pub d2h_bytes: u64,
    pub temporaries: u64,
    pub accel_assignments: u64,
    pub parallel_assignments: u64,
    pub vectorized_assignments: u64,
    pub scalar_assignments: u64,
}

impl MetricsSnapshot {
    /// Assignments across all strategies.
    pub fn total_assignments(&self) -> u64 {
        self.accel_assignments
            + self.parallel_assignments
            + self.vectorized_assignments
            + self.scalar_assignments
    }

    /// Bytes moved in both directions.
    pub fn transfer_bytes(&self) -> u64 {
        self.h2d_bytes + self.d2h_bytes
    }

    pub fn log(&self) {
        tracing::debug!(
            assignments = self.total_assignments(),
            accel = self.accel_assignments,
            parallel = self.parallel_assignments,
            vectorized = self.vectorized_assignments,
            scalar = self.scalar_assignments,
            accel_calls = self.accel_calls,
            h2d_transfers = self.h2d_transfers,
            d2h_transfers = self.d2h_transfers,
            transfer_bytes = self.transfer_bytes(),
            temporaries = self.temporaries,
            "engine_metrics"
        );
    }
}

/// Execution record of one assignment.
#[derive(Debug, Clone)]
pub struct AssignMetrics {
    pub kind: &'static str,
    pub strategy: Strategy,
    pub elements: usize,
    pub temporaries: usize,
    pub duration_ns: u64,
}

impl AssignMetrics {
    pub(crate) fn new(
        kind: AssignKind,
        strategy: Strategy,
        elements: usize,
        temporaries: usize,
        started: Instant,
    ) -> Self {
        Self {
            kind: kind.name(),
            strategy,
            elements,
            temporaries,
            duration_ns: started.elapsed().as_nanos() as u64,
        }
    }

    /// Elements processed per second.
    pub fn throughput_eps(&self) -> f64 {
        if self.duration_ns == 0 {
            return 0.0;
        }
        self.elements as f64 * 1e9 / self.duration_ns as f64
    }

    pub fn log(&self) {
        tracing::debug!(
            kind = self.kind,
            strategy = %self.strategy,
            elements = self.elements,
            temporaries = self.temporaries,
            duration_ns = self.duration_ns,
            throughput_eps = self.throughput_eps(),
            "assignment_executed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_recording() {
        let sink = MetricsSink::new();
        sink.record_accel_call();
        sink.record_transfer(TransferDirection::HostToDevice, 128);
        sink.record_transfer(TransferDirection::DeviceToHost, 64);
        sink.record_assignment(Strategy::Vectorized, 2);
        sink.record_assignment(Strategy::Accel, 0);

        let snap = sink.snapshot();
        assert_eq!(snap.accel_calls, 1);
        assert_eq!(snap.h2d_transfers, 1);
        assert_eq!(snap.h2d_bytes, 128);
        assert_eq!(snap.d2h_bytes, 64);
        assert_eq!(snap.temporaries, 2);
        assert_eq!(snap.total_assignments(), 2);
        assert_eq!(snap.transfer_bytes(), 192);
    }

    #[test]
    fn test_throughput_handles_zero_duration() {
        let m = AssignMetrics {
            kind: "replace",
            strategy: Strategy::Scalar,
            elements: 100,
            temporaries: 0,
            duration_ns: 0,
        };
        assert_eq!(m.throughput_eps(), 0.0);

        let m = AssignMetrics {
            duration_ns: 1_000_000_000,
            ..m
        };
        assert_eq!(m.throughput_eps(), 100.0);
    }
}
