use std::fmt::Write;
use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::dashboard::{self, DashboardView};
use crate::models::{ExportPayload, ExportResult, Severity, Status};
use crate::pdf;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    #[default]
    Pdf,
    Markdown,
    Json,
}

impl ExportFormat {
    fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Report,
    Dashboard,
}

pub fn build_report(payload: &ExportPayload, generated_at: DateTime<Utc>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Triage Analytics Report");
    let _ = writeln!(
        output,
        "Generated {}",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Total patients: {}", payload.total_patients);
    let _ = writeln!(output, "- Completion rate: {}%", payload.completion_rate);
    let _ = writeln!(output, "- High priority cases: {}", payload.high_priority_cases);
    let _ = writeln!(output, "- Waiting: {}", payload.waiting_patients);
    let _ = writeln!(output, "- In treatment: {}", payload.in_treatment_patients);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Averages");
    let _ = writeln!(output, "- Age: {}", payload.average_age);
    let _ = writeln!(output, "- Priority score: {}", payload.average_priority);
    let _ = writeln!(output, "- Wait time: {} min", payload.average_wait_time);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Severity Distribution");
    if payload.severity_distribution.total() == 0 {
        let _ = writeln!(output, "No patients with a recorded severity.");
    } else {
        for severity in Severity::ALL {
            let _ = writeln!(
                output,
                "- {}: {}",
                severity.label(),
                payload.severity_distribution.get(severity)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "## Status Distribution ({} patients)",
        payload.status_distribution.total()
    );
    for status in Status::ALL {
        let _ = writeln!(
            output,
            "- {}: {}",
            status.label(),
            payload.status_distribution.get(status)
        );
    }

    output
}

pub fn report_file_name(generated_at: DateTime<Utc>, format: ExportFormat) -> String {
    format!(
        "triage-analytics-report-{}.{}",
        generated_at.format("%Y-%m-%d-%H%M%S"),
        format.extension()
    )
}

pub fn dashboard_file_name(generated_at: DateTime<Utc>, format: ExportFormat) -> String {
    format!(
        "triage-dashboard-{}.{}",
        generated_at.format("%Y-%m-%d-%H%M%S"),
        format.extension()
    )
}

/// Writes the data-only report. Failures come back inside the result.
pub async fn export_analytics(
    payload: ExportPayload,
    out_dir: PathBuf,
    format: ExportFormat,
    generated_at: DateTime<Utc>,
) -> ExportResult {
    let file_name = report_file_name(generated_at, format);
    let contents = match format {
        ExportFormat::Pdf => {
            pdf::render("Triage Analytics Report", &build_report(&payload, generated_at))
        }
        ExportFormat::Markdown => Ok(build_report(&payload, generated_at).into_bytes()),
        ExportFormat::Json => serde_json::to_vec_pretty(&payload).map_err(anyhow::Error::from),
    };

    match contents {
        Ok(contents) => finish_export(&out_dir, file_name, contents).await,
        Err(err) => failed_export(err),
    }
}

/// Writes the rendering of one dashboard region, addressed by id.
pub async fn export_region(
    region_id: String,
    view: DashboardView,
    out_dir: PathBuf,
    format: ExportFormat,
    generated_at: DateTime<Utc>,
) -> ExportResult {
    let Some(region) = view.region(&region_id) else {
        return ExportResult::failed(format!("region '{region_id}' not found on the dashboard"));
    };

    let mut capture = String::new();
    let _ = writeln!(capture, "# Triage Dashboard Export");
    let _ = writeln!(
        capture,
        "Captured {} from region '{}'",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        region.id
    );
    let _ = writeln!(capture);
    capture.push_str(&dashboard::render_region(region));

    let contents = match format {
        ExportFormat::Pdf => pdf::render("Triage Dashboard", &capture),
        ExportFormat::Markdown => Ok(capture.into_bytes()),
        ExportFormat::Json => serde_json::to_vec_pretty(region).map_err(anyhow::Error::from),
    };

    match contents {
        Ok(contents) => {
            finish_export(&out_dir, dashboard_file_name(generated_at, format), contents).await
        }
        Err(err) => failed_export(err),
    }
}

async fn finish_export(out_dir: &Path, file_name: String, contents: Vec<u8>) -> ExportResult {
    match write_document(out_dir, &file_name, &contents).await {
        Ok(()) => {
            tracing::info!(file = %file_name, "export written");
            ExportResult::exported(file_name)
        }
        Err(err) => failed_export(err),
    }
}

fn failed_export(err: anyhow::Error) -> ExportResult {
    tracing::warn!(error = %format!("{err:#}"), "export failed");
    ExportResult::failed(format!("{err:#}"))
}

async fn write_document(out_dir: &Path, file_name: &str, contents: &[u8]) -> anyhow::Result<()> {
    let path = out_dir.join(file_name);
    tokio::fs::write(&path, contents)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// A single in-flight export. Overlapping tasks are independent of each other.
pub struct ExportTask {
    kind: ExportKind,
    handle: JoinHandle<ExportResult>,
}

impl ExportTask {
    pub fn spawn<F>(kind: ExportKind, export: F) -> Self
    where
        F: Future<Output = ExportResult> + Send + 'static,
    {
        Self {
            kind,
            handle: tokio::spawn(export),
        }
    }

    pub fn kind(&self) -> ExportKind {
        self.kind
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Cancel-safe: a wait dropped mid-flight (say, on ctrl-c) can be resumed after `abort`.
    pub async fn wait(&mut self) -> ExportResult {
        match (&mut self.handle).await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => ExportResult::failed("export cancelled"),
            Err(err) => ExportResult::failed(format!("export task failed: {err}")),
        }
    }
}

pub fn notification(kind: ExportKind, result: &ExportResult) -> String {
    if result.success {
        let file_name = result.file_name.as_deref().unwrap_or("(unnamed)");
        match kind {
            ExportKind::Report => format!("✅ Report exported successfully as {file_name}"),
            ExportKind::Dashboard => format!("✅ Dashboard exported successfully as {file_name}"),
        }
    } else {
        format!(
            "❌ Export failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::{Dashboard, DASHBOARD_REGION_ID};
    use crate::models::{PatientSnapshot, SeverityDistribution, StatusDistribution};
    use chrono::TimeZone;

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 3, 9, 30, 0).unwrap()
    }

    fn payload() -> ExportPayload {
        ExportPayload {
            severity_distribution: SeverityDistribution {
                critical: 2,
                high: 1,
                medium: 0,
                low: 3,
            },
            status_distribution: StatusDistribution {
                waiting: 3,
                in_treatment: 1,
                completed: 2,
            },
            average_age: 41,
            average_priority: 72,
            average_wait_time: 18,
            total_patients: 6,
            completion_rate: 33,
            high_priority_cases: 2,
            waiting_patients: 3,
            in_treatment_patients: 1,
        }
    }

    #[test]
    fn report_lists_every_bucket() {
        let report = build_report(&payload(), generated_at());
        assert!(report.contains("Generated 2026-02-03 09:30:00 UTC"));
        assert!(report.contains("- Completion rate: 33%"));
        assert!(report.contains("- Critical: 2"));
        assert!(report.contains("- Medium: 0"));
        assert!(report.contains("- In Treatment: 1"));
        assert!(report.contains("- Wait time: 18 min"));
        assert!(report.contains("## Status Distribution (6 patients)"));
    }

    #[test]
    fn empty_report_notes_missing_severities() {
        let report = build_report(&ExportPayload::default(), generated_at());
        assert!(report.contains("No patients with a recorded severity."));
        assert!(report.contains("- Completion rate: 0%"));
    }

    #[tokio::test]
    async fn default_export_is_a_pdf() {
        let dir = tempfile::tempdir().unwrap();

        let result = export_analytics(
            payload(),
            dir.path().to_path_buf(),
            ExportFormat::default(),
            generated_at(),
        )
        .await;
        assert!(result.success);
        let file_name = result.file_name.unwrap();
        assert_eq!(file_name, "triage-analytics-report-2026-02-03-093000.pdf");
        let written = std::fs::read(dir.path().join(file_name)).unwrap();
        assert!(written.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn exports_markdown_and_json() {
        let dir = tempfile::tempdir().unwrap();

        let markdown = export_analytics(
            payload(),
            dir.path().to_path_buf(),
            ExportFormat::Markdown,
            generated_at(),
        )
        .await;
        assert!(markdown.success);
        assert_eq!(
            markdown.file_name.as_deref(),
            Some("triage-analytics-report-2026-02-03-093000.md")
        );

        let json = export_analytics(
            payload(),
            dir.path().to_path_buf(),
            ExportFormat::Json,
            generated_at(),
        )
        .await;
        let written = std::fs::read_to_string(dir.path().join(json.file_name.unwrap())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["completionRate"], 33);
        assert_eq!(value["statusDistribution"]["inTreatment"], 1);
    }

    #[tokio::test]
    async fn failed_export_surfaces_error_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");

        let result =
            export_analytics(payload(), missing, ExportFormat::Markdown, generated_at()).await;
        assert!(!result.success);
        let error = result.error.clone().unwrap();
        assert!(error.contains("failed to write"));
        assert!(notification(ExportKind::Report, &result).contains(&error));
    }

    #[test]
    fn notification_quotes_collaborator_error() {
        let message = notification(ExportKind::Dashboard, &ExportResult::failed("X"));
        assert_eq!(message, "❌ Export failed: X");

        let message = notification(
            ExportKind::Dashboard,
            &ExportResult::exported("triage-dashboard.md"),
        );
        assert_eq!(message, "✅ Dashboard exported successfully as triage-dashboard.md");
    }

    #[tokio::test]
    async fn region_export_captures_charts() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = PatientSnapshot::default();
        let mut dashboard = Dashboard::new(&snapshot);
        dashboard.mark_ready();

        let result = export_region(
            DASHBOARD_REGION_ID.to_string(),
            dashboard.view(),
            dir.path().to_path_buf(),
            ExportFormat::Markdown,
            generated_at(),
        )
        .await;
        assert!(result.success);
        let written = std::fs::read_to_string(dir.path().join(result.file_name.unwrap())).unwrap();
        assert!(written.contains("### Severity Distribution"));
        assert!(written.contains("region 'analytics-dashboard'"));
    }

    #[tokio::test]
    async fn region_export_renders_pdf_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = PatientSnapshot::default();
        let mut dashboard = Dashboard::new(&snapshot);
        dashboard.mark_ready();

        let pdf = export_region(
            DASHBOARD_REGION_ID.to_string(),
            dashboard.view(),
            dir.path().to_path_buf(),
            ExportFormat::Pdf,
            generated_at(),
        )
        .await;
        let file_name = pdf.file_name.unwrap();
        assert_eq!(file_name, "triage-dashboard-2026-02-03-093000.pdf");
        let written = std::fs::read(dir.path().join(file_name)).unwrap();
        assert!(written.starts_with(b"%PDF"));

        let json = export_region(
            DASHBOARD_REGION_ID.to_string(),
            dashboard.view(),
            dir.path().to_path_buf(),
            ExportFormat::Json,
            generated_at(),
        )
        .await;
        let written = std::fs::read_to_string(dir.path().join(json.file_name.unwrap())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["id"], DASHBOARD_REGION_ID);
        assert!(value["body"].as_str().unwrap().contains("### Patient Status"));
    }

    #[tokio::test]
    async fn unknown_region_fails() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = PatientSnapshot::default();
        let dashboard = Dashboard::new(&snapshot);

        let result = export_region(
            "missing-region".to_string(),
            dashboard.view(),
            dir.path().to_path_buf(),
            ExportFormat::Pdf,
            generated_at(),
        )
        .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("missing-region"));
    }

    #[tokio::test]
    async fn aborted_task_reports_cancellation() {
        let mut task =
            ExportTask::spawn(ExportKind::Report, std::future::pending::<ExportResult>());
        assert_eq!(task.kind(), ExportKind::Report);
        task.abort();

        let result = task.wait().await;
        assert_eq!(result.error.as_deref(), Some("export cancelled"));
    }

    #[tokio::test]
    async fn overlapping_exports_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = ExportTask::spawn(
            ExportKind::Report,
            export_analytics(
                payload(),
                dir.path().to_path_buf(),
                ExportFormat::Markdown,
                generated_at(),
            ),
        );
        let mut second = ExportTask::spawn(
            ExportKind::Report,
            export_analytics(
                payload(),
                dir.path().to_path_buf(),
                ExportFormat::Json,
                generated_at(),
            ),
        );

        assert!(first.wait().await.success);
        assert!(second.wait().await.success);
    }
}
