use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

impl FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => anyhow::bail!("unknown severity '{other}'"),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "waiting")]
    Waiting,
    #[serde(rename = "in-treatment", alias = "inTreatment", alias = "in_treatment")]
    InTreatment,
    #[serde(rename = "completed")]
    Completed,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Waiting, Status::InTreatment, Status::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Waiting => "waiting",
            Status::InTreatment => "in-treatment",
            Status::Completed => "completed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Waiting => "Waiting",
            Status::InTreatment => "In Treatment",
            Status::Completed => "Completed",
        }
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "waiting" => Ok(Status::Waiting),
            "in-treatment" | "in_treatment" | "intreatment" => Ok(Status::InTreatment),
            "completed" => Ok(Status::Completed),
            other => anyhow::bail!("unknown status '{other}'"),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub age: u32,
    /// `None` when the stored value is missing or not one of the four levels.
    #[serde(default, deserialize_with = "lenient_severity")]
    pub severity: Option<Severity>,
    pub priority: i32,
    pub status: Status,
    pub arrival_time: DateTime<Utc>,
    #[serde(default)]
    pub treatment_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub treatment_end_time: Option<DateTime<Utc>>,
    /// Import key; rows already present under the same key are not imported twice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
}

fn lenient_severity<'de, D>(deserializer: D) -> Result<Option<Severity>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(raw.as_str().and_then(|value| value.parse().ok()))
}

/// One line of a patient import file.
#[derive(Debug, Clone, Deserialize)]
pub struct PatientCsvRow {
    pub full_name: String,
    pub age: u32,
    pub severity: Option<String>,
    pub priority: i32,
    pub status: String,
    pub arrival_time: DateTime<Utc>,
    pub treatment_start_time: Option<DateTime<Utc>>,
    pub treatment_end_time: Option<DateTime<Utc>>,
    pub source_key: Option<String>,
}

impl PatientCsvRow {
    /// Rows without a `source_key` get a fresh one, so they always import.
    pub fn into_patient(self) -> anyhow::Result<Patient> {
        let source_key = self
            .source_key
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        Ok(Patient {
            id: Uuid::new_v4(),
            status: self.status.parse()?,
            name: self.full_name,
            age: self.age,
            severity: self.severity.and_then(|value| value.parse().ok()),
            priority: self.priority,
            arrival_time: self.arrival_time,
            treatment_start_time: self.treatment_start_time,
            treatment_end_time: self.treatment_end_time,
            source_key: Some(source_key),
        })
    }
}

/// Everything the local store persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSnapshot {
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityDistribution {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityDistribution {
    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDistribution {
    pub waiting: usize,
    pub in_treatment: usize,
    pub completed: usize,
}

impl StatusDistribution {
    pub fn get(&self, status: Status) -> usize {
        match status {
            Status::Waiting => self.waiting,
            Status::InTreatment => self.in_treatment,
            Status::Completed => self.completed,
        }
    }

    pub fn total(&self) -> usize {
        self.waiting + self.in_treatment + self.completed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub severity_distribution: SeverityDistribution,
    pub status_distribution: StatusDistribution,
    pub average_age: i64,
    pub average_priority: i64,
    /// Minutes.
    pub average_wait_time: i64,
}

/// Flattened summary handed to the data-only exporter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    pub severity_distribution: SeverityDistribution,
    pub status_distribution: StatusDistribution,
    pub average_age: i64,
    pub average_priority: i64,
    pub average_wait_time: i64,
    pub total_patients: usize,
    pub completion_rate: i64,
    pub high_priority_cases: usize,
    pub waiting_patients: usize,
    pub in_treatment_patients: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExportResult {
    pub fn exported(file_name: impl Into<String>) -> Self {
        Self {
            success: true,
            file_name: Some(file_name.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            file_name: None,
            error: Some(error.into()),
        }
    }
}
