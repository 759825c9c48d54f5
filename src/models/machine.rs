//! Monitored machine records as exchanged with the fleet API.
//!
//! These types mirror the JSON wire format of the dashboard backend
//! (camelCase field names). They are plain data carriers; all interesting
//! behavior lives in the session and API layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reported health of a monitored machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    Online,
    Offline,
    Warning,
}

impl MachineStatus {
    /// Display label used by list views.
    pub fn label(&self) -> &'static str {
        match self {
            MachineStatus::Online => "online",
            MachineStatus::Offline => "offline",
            MachineStatus::Warning => "warning",
        }
    }
}

/// Point-in-time resource usage, all values in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineMetrics {
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
    pub disk: Option<f64>,
}

/// A monitored client machine as returned by the fleet API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: MachineStatus,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub metrics: Option<MachineMetrics>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload for a machine record. The server owns `id`,
/// `status`, and the timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Live status probe for a single machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineStatusReport {
    pub status: MachineStatus,
    #[serde(default)]
    pub metrics: Option<MachineMetrics>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_parses_wire_format() {
        let json = r#"{
            "id": "m-1",
            "name": "Edge node 04",
            "description": "Rack B",
            "status": "warning",
            "lastSeen": "2026-08-01T12:00:00Z",
            "ipAddress": "10.0.4.17",
            "metrics": { "cpu": 78.4, "memory": 85.2, "disk": 91.5 },
            "tags": ["edge", "rack-b"],
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-08-01T12:00:00Z"
        }"#;

        let machine: Machine = serde_json::from_str(json).expect("machine JSON should parse");
        assert_eq!(machine.status, MachineStatus::Warning);
        assert_eq!(machine.metrics.unwrap().disk, Some(91.5));
        assert_eq!(machine.tags, vec!["edge", "rack-b"]);
    }

    #[test]
    fn test_machine_optional_fields_default() {
        let json = r#"{
            "id": "m-2",
            "name": "Backup host",
            "status": "offline",
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-08-01T12:00:00Z"
        }"#;

        let machine: Machine = serde_json::from_str(json).expect("minimal machine should parse");
        assert!(machine.description.is_none());
        assert!(machine.metrics.is_none());
        assert!(machine.tags.is_empty());
    }

    #[test]
    fn test_draft_skips_empty_optionals() {
        let draft = MachineDraft {
            name: "New node".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&draft).expect("draft should serialize");
        assert_eq!(json, r#"{"name":"New node"}"#);
    }
}
