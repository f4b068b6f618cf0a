//! Backend metrics
//!
//! Append-mostly counters per backend plus a rolling latency window,
//! reduced on read into a serializable snapshot for the health dashboard.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use vecthare_domain::value_objects::BackendKind;

/// Rolling latency window length
const LATENCY_WINDOW: usize = 100;

/// Last recorded error for a backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastError {
    /// Error text
    pub message: String,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

/// Per-backend counters
#[derive(Default)]
pub struct BackendMetrics {
    queries: AtomicU64,
    inserts: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
    health_checks_passed: AtomicU64,
    health_checks_failed: AtomicU64,
    last_error: Mutex<Option<LastError>>,
    last_query_time: Mutex<Option<DateTime<Utc>>>,
    last_health_check: Mutex<Option<DateTime<Utc>>>,
    latencies_ms: Mutex<VecDeque<f64>>,
}

impl BackendMetrics {
    fn record_latency(&self, latency: Duration) {
        if let Ok(mut window) = self.latencies_ms.lock() {
            if window.len() >= LATENCY_WINDOW {
                window.pop_front();
            }
            window.push_back(latency.as_secs_f64() * 1000.0);
        }
    }

    fn snapshot(&self) -> BackendMetricsSnapshot {
        let (avg, min, max) = self
            .latencies_ms
            .lock()
            .map(|window| {
                if window.is_empty() {
                    (0.0, 0.0, 0.0)
                } else {
                    let sum: f64 = window.iter().sum();
                    let min = window.iter().copied().fold(f64::INFINITY, f64::min);
                    let max = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    (sum / window.len() as f64, min, max)
                }
            })
            .unwrap_or((0.0, 0.0, 0.0));

        BackendMetricsSnapshot {
            queries: self.queries.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            health_checks_passed: self.health_checks_passed.load(Ordering::Relaxed),
            health_checks_failed: self.health_checks_failed.load(Ordering::Relaxed),
            last_error: self.last_error.lock().ok().and_then(|g| g.clone()),
            last_query_time: self.last_query_time.lock().ok().and_then(|g| *g),
            last_health_check: self.last_health_check.lock().ok().and_then(|g| *g),
            avg_latency_ms: avg,
            min_latency_ms: min,
            max_latency_ms: max,
        }
    }
}

/// Read-only view of one backend's metrics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackendMetricsSnapshot {
    /// Queries served
    pub queries: u64,
    /// Insert operations
    pub inserts: u64,
    /// Delete operations
    pub deletes: u64,
    /// Failed operations
    pub errors: u64,
    /// Health checks that passed
    pub health_checks_passed: u64,
    /// Health checks that failed
    pub health_checks_failed: u64,
    /// Most recent error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
    /// When the last query ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_query_time: Option<DateTime<Utc>>,
    /// When the last health check ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_health_check: Option<DateTime<Utc>>,
    /// Mean latency over the rolling window, milliseconds
    pub avg_latency_ms: f64,
    /// Fastest sample in the window
    pub min_latency_ms: f64,
    /// Slowest sample in the window
    pub max_latency_ms: f64,
}

/// Registry-wide metrics: per-backend counters plus global totals
pub struct RegistryMetrics {
    started: Instant,
    started_at: DateTime<Utc>,
    total_queries: AtomicU64,
    total_inserts: AtomicU64,
    total_errors: AtomicU64,
    last_error: Mutex<Option<LastError>>,
    per_backend: DashMap<BackendKind, BackendMetrics>,
}

impl RegistryMetrics {
    /// Fresh metrics starting now
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            total_queries: AtomicU64::new(0),
            total_inserts: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            last_error: Mutex::new(None),
            per_backend: DashMap::new(),
        }
    }

    /// Record a completed query with its latency
    pub fn record_query(&self, kind: BackendKind, latency: Duration) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
        let entry = self.per_backend.entry(kind).or_default();
        entry.queries.fetch_add(1, Ordering::Relaxed);
        entry.record_latency(latency);
        if let Ok(mut last) = entry.last_query_time.lock() {
            *last = Some(Utc::now());
        }
    }

    /// Record a completed insert
    pub fn record_insert(&self, kind: BackendKind) {
        self.total_inserts.fetch_add(1, Ordering::Relaxed);
        self.per_backend
            .entry(kind)
            .or_default()
            .inserts
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed delete
    pub fn record_delete(&self, kind: BackendKind) {
        self.per_backend
            .entry(kind)
            .or_default()
            .deletes
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed operation
    pub fn record_error(&self, kind: BackendKind, message: &str) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
        let last = LastError {
            message: message.to_string(),
            timestamp: Utc::now(),
        };
        if let Ok(mut global) = self.last_error.lock() {
            *global = Some(last.clone());
        }
        let entry = self.per_backend.entry(kind).or_default();
        entry.errors.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut slot) = entry.last_error.lock() {
            *slot = Some(last);
        }
    }

    /// Record a health-check outcome
    pub fn record_health_check(&self, kind: BackendKind, passed: bool) {
        let entry = self.per_backend.entry(kind).or_default();
        if passed {
            entry.health_checks_passed.fetch_add(1, Ordering::Relaxed);
        } else {
            entry.health_checks_failed.fetch_add(1, Ordering::Relaxed);
        }
        if let Ok(mut slot) = entry.last_health_check.lock() {
            *slot = Some(Utc::now());
        }
    }

    /// Reduce everything into a serializable snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let backends = self
            .per_backend
            .iter()
            .map(|entry| (entry.key().as_str().to_string(), entry.value().snapshot()))
            .collect();

        MetricsSnapshot {
            uptime_seconds: self.started.elapsed().as_secs(),
            started_at: self.started_at,
            total_queries: self.total_queries.load(Ordering::Relaxed),
            total_inserts: self.total_inserts.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            last_error: self.last_error.lock().ok().and_then(|g| g.clone()),
            backends,
        }
    }
}

impl Default for RegistryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the whole registry's metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Seconds since the registry was created
    pub uptime_seconds: u64,
    /// Wall-clock start time
    pub started_at: DateTime<Utc>,
    /// Queries across all backends
    pub total_queries: u64,
    /// Inserts across all backends
    pub total_inserts: u64,
    /// Errors across all backends
    pub total_errors: u64,
    /// Most recent error anywhere
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
    /// Per-backend detail keyed by canonical name
    pub backends: HashMap<String, BackendMetricsSnapshot>,
}
