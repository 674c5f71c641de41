// Metrics module - Prometheus-compatible composition metrics
// Provides counters and latency summaries for the compositing pipeline

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Most recent durations kept for percentiles; older samples are evicted.
pub const MAX_DURATION_SAMPLES: usize = 10_000;

/// Composition path taken by one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositionPath {
    Advanced,
    Legacy,
    Passthrough,
    Preview,
}

impl CompositionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositionPath::Advanced => "advanced",
            CompositionPath::Legacy => "legacy",
            CompositionPath::Passthrough => "passthrough",
            CompositionPath::Preview => "preview",
        }
    }
}

/// Histogram represents percentile statistics for latency measurements
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Histogram {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Composition counters and latency samples
/// Thread-safe via atomic operations and mutexes
pub struct Metrics {
    // Compositions by path (advanced, legacy, passthrough, preview)
    compositions: Mutex<HashMap<&'static str, u64>>,

    // Calls that failed with a fatal error, by error kind
    fatal_failures: Mutex<HashMap<&'static str, u64>>,

    // Skipped elements by error kind
    element_failures: Mutex<HashMap<&'static str, u64>>,

    elements_painted: AtomicU64,

    // Latest composition durations (stored in microseconds as u64)
    durations: Mutex<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            compositions: Mutex::new(HashMap::new()),
            fatal_failures: Mutex::new(HashMap::new()),
            element_failures: Mutex::new(HashMap::new()),
            elements_painted: AtomicU64::new(0),
            durations: Mutex::new(VecDeque::with_capacity(MAX_DURATION_SAMPLES)),
        }
    }

    /// Count a finished composition
    pub fn increment_composition(&self, path: CompositionPath) {
        if let Ok(mut counts) = self.compositions.lock() {
            *counts.entry(path.as_str()).or_insert(0) += 1;
        }
    }

    /// Count a composition that failed fatally
    pub fn increment_fatal_failure(&self, kind: &'static str) {
        if let Ok(mut counts) = self.fatal_failures.lock() {
            *counts.entry(kind).or_insert(0) += 1;
        }
    }

    /// Count an element skipped because of `kind`
    pub fn increment_element_failure(&self, kind: &'static str) {
        if let Ok(mut counts) = self.element_failures.lock() {
            *counts.entry(kind).or_insert(0) += 1;
        }
    }

    pub fn increment_elements_painted(&self) {
        self.elements_painted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a composition duration in milliseconds
    pub fn record_duration(&self, duration_ms: f64) {
        let duration_us = (duration_ms * 1000.0) as u64;
        if let Ok(mut durations) = self.durations.lock() {
            if durations.len() >= MAX_DURATION_SAMPLES {
                durations.pop_front();
            }
            durations.push_back(duration_us);
        }
    }

    pub fn composition_count(&self, path: CompositionPath) -> u64 {
        self.compositions
            .lock()
            .ok()
            .and_then(|counts| counts.get(path.as_str()).copied())
            .unwrap_or(0)
    }

    pub fn fatal_failure_count(&self, kind: &str) -> u64 {
        self.fatal_failures
            .lock()
            .ok()
            .and_then(|counts| counts.get(kind).copied())
            .unwrap_or(0)
    }

    pub fn element_failure_count(&self, kind: &str) -> u64 {
        self.element_failures
            .lock()
            .ok()
            .and_then(|counts| counts.get(kind).copied())
            .unwrap_or(0)
    }

    pub fn elements_painted(&self) -> u64 {
        self.elements_painted.load(Ordering::Relaxed)
    }

    /// Calculate histogram from duration samples
    pub fn get_duration_histogram(&self) -> Histogram {
        if let Ok(mut durations) = self.durations.lock() {
            calculate_histogram(durations.make_contiguous())
        } else {
            calculate_histogram(&[])
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP watermark_compositions_total Compositions completed by path\n");
        output.push_str("# TYPE watermark_compositions_total counter\n");
        if let Ok(counts) = self.compositions.lock() {
            for (path, count) in sorted(&counts) {
                output.push_str(&format!(
                    "watermark_compositions_total{{path=\"{}\"}} {}\n",
                    path, count
                ));
            }
        }

        output.push_str(
            "\n# HELP watermark_composition_failures_total Compositions aborted by a fatal error\n",
        );
        output.push_str("# TYPE watermark_composition_failures_total counter\n");
        if let Ok(counts) = self.fatal_failures.lock() {
            for (kind, count) in sorted(&counts) {
                output.push_str(&format!(
                    "watermark_composition_failures_total{{kind=\"{}\"}} {}\n",
                    kind, count
                ));
            }
        }

        output.push_str("\n# HELP watermark_element_failures_total Elements skipped by error kind\n");
        output.push_str("# TYPE watermark_element_failures_total counter\n");
        if let Ok(counts) = self.element_failures.lock() {
            for (kind, count) in sorted(&counts) {
                output.push_str(&format!(
                    "watermark_element_failures_total{{kind=\"{}\"}} {}\n",
                    kind, count
                ));
            }
        }

        output.push_str("\n# HELP watermark_elements_painted_total Elements painted\n");
        output.push_str("# TYPE watermark_elements_painted_total counter\n");
        output.push_str(&format!(
            "watermark_elements_painted_total {}\n",
            self.elements_painted()
        ));

        let histogram = self.get_duration_histogram();
        output.push_str(
            "\n# HELP watermark_composition_duration_seconds Composition duration in seconds\n",
        );
        output.push_str("# TYPE watermark_composition_duration_seconds summary\n");
        for (quantile, value_ms) in [
            ("0.5", histogram.p50),
            ("0.9", histogram.p90),
            ("0.95", histogram.p95),
            ("0.99", histogram.p99),
        ] {
            output.push_str(&format!(
                "watermark_composition_duration_seconds{{quantile=\"{}\"}} {:.3}\n",
                quantile,
                value_ms / 1000.0
            ));
        }

        output
    }
}

fn sorted<'a>(counts: &'a HashMap<&'static str, u64>) -> Vec<(&'static str, &'a u64)> {
    let mut entries: Vec<_> = counts.iter().map(|(k, v)| (*k, v)).collect();
    entries.sort_by_key(|(k, _)| *k);
    entries
}

/// Calculate percentiles from samples (in microseconds)
fn calculate_histogram(samples: &[u64]) -> Histogram {
    if samples.is_empty() {
        return Histogram {
            p50: 0.0,
            p90: 0.0,
            p95: 0.0,
            p99: 0.0,
        };
    }

    let mut sorted: Vec<u64> = samples.to_vec();
    sorted.sort_unstable();

    let at = |q: f64| -> f64 {
        let idx = (sorted.len() as f64 * q) as usize;
        // Convert from microseconds to milliseconds
        sorted.get(idx.saturating_sub(1)).copied().unwrap_or(0) as f64 / 1000.0
    };

    Histogram {
        p50: at(0.50),
        p90: at(0.90),
        p95: at(0.95),
        p99: at(0.99),
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
