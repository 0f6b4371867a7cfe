//! Health checks for the pipeline components.

use event_notify_core::delay_store::DelayStore;
use serde::Serialize;
use std::collections::BTreeMap;

/// Health check status levels
///
/// Indicates the current health state of a component or system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Component is fully operational
    Healthy,

    /// Component is operational but experiencing issues
    Degraded,

    /// Component is not operational
    Unhealthy,
}

impl HealthStatus {
    /// Check if status is healthy
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Get the worst status between two statuses
    #[must_use]
    pub const fn worst(self, other: Self) -> Self {
        match (self, other) {
            (Self::Unhealthy, _) | (_, Self::Unhealthy) => Self::Unhealthy,
            (Self::Degraded, _) | (_, Self::Degraded) => Self::Degraded,
            _ => Self::Healthy,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check result for a component
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    /// Name of the component being checked
    pub component: String,

    /// Current health status
    pub status: HealthStatus,

    /// Optional message providing details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Component figures (pending entries, open connections, ...)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl HealthCheck {
    /// Create a healthy check result
    #[must_use]
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Healthy,
            message: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Create an unhealthy check result
    #[must_use]
    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            metadata: BTreeMap::new(),
        }
    }

    /// Add metadata to the health check
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }

    /// Check the delay store by counting pending entries.
    pub async fn delay_store(store: &dyn DelayStore) -> Self {
        match store.len().await {
            Ok(pending) => Self::healthy("delay_store").with_metadata("pending", pending),
            Err(e) => Self::unhealthy("delay_store", e.to_string()),
        }
    }
}

/// Aggregated health report
///
/// Combines multiple health checks into an overall system status.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Overall system status (worst of all checks)
    pub status: HealthStatus,

    /// Individual component checks
    pub checks: Vec<HealthCheck>,

    /// Timestamp when report was generated
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HealthReport {
    /// Create a new health report from checks
    #[must_use]
    pub fn new(checks: Vec<HealthCheck>) -> Self {
        let status = checks
            .iter()
            .map(|c| c.status)
            .fold(HealthStatus::Healthy, HealthStatus::worst);

        Self {
            status,
            checks,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Check if overall system is healthy
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;
    use event_notify_testing::InMemoryDelayStore;

    #[test]
    fn test_health_status_worst() {
        assert_eq!(
            HealthStatus::Healthy.worst(HealthStatus::Degraded),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::Degraded.worst(HealthStatus::Unhealthy),
            HealthStatus::Unhealthy
        );
    }

    #[test]
    fn report_takes_worst_status() {
        let report = HealthReport::new(vec![
            HealthCheck::healthy("bus"),
            HealthCheck::unhealthy("delay_store", "down"),
        ]);
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(!report.is_healthy());
    }

    #[test]
    fn check_serializes_lowercase_status_and_metadata() {
        let check = HealthCheck::healthy("live_bridge").with_metadata("connections", 3);
        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["metadata"]["connections"], "3");
        assert!(json.get("message").is_none());
    }

    #[tokio::test]
    async fn delay_store_check_reports_pending() {
        use event_notify_core::DelayStore;

        let store = InMemoryDelayStore::new();
        store.insert("a", 1).await.unwrap();
        store.insert("b", 2).await.unwrap();

        let check = HealthCheck::delay_store(&store).await;
        assert_eq!(check.status, HealthStatus::Healthy);
        assert_eq!(check.metadata["pending"], "2");

        store.set_failure(true);
        let check = HealthCheck::delay_store(&store).await;
        assert_eq!(check.status, HealthStatus::Unhealthy);
    }
}
