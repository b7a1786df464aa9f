//! Gateway operation metrics
//!
//! Thread-safe counters for every gateway call, served by the HTTP transport
//! at `/api/metrics`.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant, SystemTime};

/// Default number of recent operations kept for the snapshot
pub const DEFAULT_RECENT_CAPACITY: usize = 100;

/// Gateway metrics collector
pub struct GatewayMetrics {
    start_time: Instant,
    start_system_time: SystemTime,
    total_calls: AtomicU64,
    total_errors: AtomicU64,
    /// Single lock for the per-operation table and the recent ring buffer
    data: RwLock<MetricsData>,
    max_recent: usize,
}

#[derive(Default)]
struct OperationStatsInner {
    call_count: u64,
    error_count: u64,
    total_duration_ms: u64,
    last_called: Option<SystemTime>,
}

#[derive(Default)]
struct MetricsData {
    operations: HashMap<&'static str, OperationStatsInner>,
    error_codes: HashMap<&'static str, u64>,
    recent: VecDeque<OperationRecord>,
}

/// One recorded gateway call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    pub operation: String,
    pub user_id: String,
    pub success: bool,
    pub duration_ms: u64,
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStats {
    pub name: String,
    pub call_count: u64,
    pub error_count: u64,
    pub avg_duration_ms: u64,
    pub last_called: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCodeCount {
    pub code: String,
    pub count: u64,
}

/// Point-in-time view of all metrics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub start_time: u64,
    pub total_calls: u64,
    pub total_errors: u64,
    pub calls_per_minute: f64,
    pub operations: Vec<OperationStats>,
    pub errors: Vec<ErrorCodeCount>,
    pub recent: Vec<OperationRecord>,
}

fn unix_secs(t: SystemTime) -> Option<u64> {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RECENT_CAPACITY)
    }

    /// Create a collector keeping the last `max_recent` operations
    pub fn with_capacity(max_recent: usize) -> Self {
        Self {
            start_time: Instant::now(),
            start_system_time: SystemTime::now(),
            total_calls: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            data: RwLock::new(MetricsData {
                recent: VecDeque::with_capacity(max_recent),
                ..Default::default()
            }),
            max_recent,
        }
    }

    fn write_data(&self) -> RwLockWriteGuard<'_, MetricsData> {
        self.data.write().unwrap_or_else(|poisoned| {
            tracing::warn!("metrics data lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn read_data(&self) -> RwLockReadGuard<'_, MetricsData> {
        self.data.read().unwrap_or_else(|poisoned| {
            tracing::warn!("metrics data lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Record one gateway call. `error_code` is `None` on success.
    pub fn record(
        &self,
        operation: &'static str,
        user_id: &str,
        duration: Duration,
        error_code: Option<&'static str>,
    ) {
        let duration_ms = duration.as_millis() as u64;
        let now = SystemTime::now();
        let success = error_code.is_none();

        self.total_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }

        let mut data = self.write_data();

        let entry = data.operations.entry(operation).or_default();
        entry.call_count += 1;
        if !success {
            entry.error_count += 1;
        }
        entry.total_duration_ms += duration_ms;
        entry.last_called = Some(now);

        if let Some(code) = error_code {
            *data.error_codes.entry(code).or_default() += 1;
        }

        if self.max_recent == 0 {
            return;
        }
        if data.recent.len() >= self.max_recent {
            data.recent.pop_front();
        }
        data.recent.push_back(OperationRecord {
            operation: operation.to_string(),
            user_id: user_id.to_string(),
            success,
            duration_ms,
            timestamp: unix_secs(now).unwrap_or(0),
            error_code: error_code.map(String::from),
        });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let uptime_secs = self.start_time.elapsed().as_secs();
        let total_calls = self.total_calls.load(Ordering::Relaxed);
        let calls_per_minute = if uptime_secs > 0 {
            (total_calls as f64 / uptime_secs as f64) * 60.0
        } else {
            0.0
        };

        let data = self.read_data();

        let mut operations: Vec<OperationStats> = data
            .operations
            .iter()
            .map(|(name, s)| OperationStats {
                name: name.to_string(),
                call_count: s.call_count,
                error_count: s.error_count,
                avg_duration_ms: s.total_duration_ms.checked_div(s.call_count).unwrap_or(0),
                last_called: s.last_called.and_then(unix_secs),
            })
            .collect();
        operations.sort_unstable_by(|a, b| {
            b.call_count.cmp(&a.call_count).then_with(|| a.name.cmp(&b.name))
        });

        let mut errors: Vec<ErrorCodeCount> = data
            .error_codes
            .iter()
            .map(|(code, count)| ErrorCodeCount {
                code: code.to_string(),
                count: *count,
            })
            .collect();
        errors.sort_unstable_by(|a, b| b.count.cmp(&a.count).then_with(|| a.code.cmp(&b.code)));

        let recent: Vec<_> = data.recent.iter().cloned().collect();
        drop(data);

        MetricsSnapshot {
            uptime_secs,
            start_time: unix_secs(self.start_system_time).unwrap_or(0),
            total_calls,
            total_errors: self.total_errors.load(Ordering::Relaxed),
            calls_per_minute,
            operations,
            errors,
            recent,
        }
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = GatewayMetrics::new();
        assert_eq!(metrics.total_calls(), 0);
        assert_eq!(metrics.total_errors(), 0);
    }

    #[test]
    fn test_record_success_and_failure() {
        let metrics = GatewayMetrics::new();
        metrics.record("submit_request", "u1", Duration::from_millis(10), None);
        metrics.record(
            "submit_request",
            "u1",
            Duration::from_millis(30),
            Some("DUPLICATE_REQUEST"),
        );
        metrics.record("resolve", "lib1", Duration::from_millis(5), None);

        assert_eq!(metrics.total_calls(), 3);
        assert_eq!(metrics.total_errors(), 1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.operations[0].name, "submit_request");
        assert_eq!(snapshot.operations[0].call_count, 2);
        assert_eq!(snapshot.operations[0].error_count, 1);
        assert_eq!(snapshot.operations[0].avg_duration_ms, 20);
        assert_eq!(snapshot.errors.len(), 1);
        assert_eq!(snapshot.errors[0].code, "DUPLICATE_REQUEST");
        assert_eq!(snapshot.recent[1].error_code.as_deref(), Some("DUPLICATE_REQUEST"));
    }

    #[test]
    fn test_recent_operations_circular_buffer() {
        let metrics = GatewayMetrics::with_capacity(3);
        for user in ["u0", "u1", "u2", "u3", "u4"] {
            metrics.record("has_access", user, Duration::from_millis(1), None);
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.recent.len(), 3);
        assert_eq!(snapshot.recent[0].user_id, "u2");
        assert_eq!(snapshot.recent[2].user_id, "u4");
    }
}
