//! Metrics for the Matching Engine
//!
//! In-process counters only; nothing is exported over the network.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Simple atomic counter
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn increment(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Simple gauge for current values
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Latency summary in microseconds
#[derive(Debug)]
pub struct Histogram {
    count: AtomicU64,
    sum: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            min: AtomicU64::new(u64::MAX),
            max: AtomicU64::new(0),
        }
    }

    pub fn record(&self, value_us: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(value_us, Ordering::Relaxed);
        self.min.fetch_min(value_us, Ordering::Relaxed);
        self.max.fetch_max(value_us, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> HistogramStats {
        let count = self.count.load(Ordering::Relaxed);
        let sum = self.sum.load(Ordering::Relaxed);

        HistogramStats {
            count,
            avg_us: if count > 0 { sum / count } else { 0 },
            min_us: if count > 0 { self.min.load(Ordering::Relaxed) } else { 0 },
            max_us: self.max.load(Ordering::Relaxed),
        }
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistogramStats {
    pub count: u64,
    pub avg_us: u64,
    pub min_us: u64,
    pub max_us: u64,
}

/// Metrics for the matching engine
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub orders_received: Counter,
    pub orders_rejected: Counter,
    pub orders_rested: Counter,
    pub orders_cancelled: Counter,
    pub orders_expired: Counter,
    pub trades_executed: Counter,
    pub volume_traded: Counter,
    pub submit_latency: Histogram,
    pub resting_orders: Gauge,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submit(&self, trades: usize, volume: u64, rested: bool, elapsed: Duration) {
        self.trades_executed.add(trades as u64);
        self.volume_traded.add(volume);
        if rested {
            self.orders_rested.increment();
        }
        self.submit_latency.record(elapsed.as_micros() as u64);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency = self.submit_latency.get_stats();

        MetricsSnapshot {
            orders_received: self.orders_received.get(),
            orders_rejected: self.orders_rejected.get(),
            orders_rested: self.orders_rested.get(),
            orders_cancelled: self.orders_cancelled.get(),
            orders_expired: self.orders_expired.get(),
            trades_executed: self.trades_executed.get(),
            volume_traded: self.volume_traded.get(),
            submit_latency_avg_us: latency.avg_us,
            submit_latency_min_us: latency.min_us,
            submit_latency_max_us: latency.max_us,
            resting_orders: self.resting_orders.get(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub orders_received: u64,
    pub orders_rejected: u64,
    pub orders_rested: u64,
    pub orders_cancelled: u64,
    pub orders_expired: u64,
    pub trades_executed: u64,
    pub volume_traded: u64,
    pub submit_latency_avg_us: u64,
    pub submit_latency_min_us: u64,
    pub submit_latency_max_us: u64,
    pub resting_orders: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_stats() {
        let h = Histogram::new();
        assert_eq!(h.get_stats().min_us, 0);

        h.record(10);
        h.record(30);

        let stats = h.get_stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.avg_us, 20);
        assert_eq!(stats.min_us, 10);
        assert_eq!(stats.max_us, 30);
    }

    #[test]
    fn test_record_submit() {
        let m = EngineMetrics::new();
        m.orders_received.increment();
        m.record_submit(2, 15, true, Duration::from_micros(5));

        let snap = m.snapshot();
        assert_eq!(snap.orders_received, 1);
        assert_eq!(snap.trades_executed, 2);
        assert_eq!(snap.volume_traded, 15);
        assert_eq!(snap.orders_rested, 1);
    }
}
