use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analytics::{self, StatusSubsets};
use crate::models::{AnalyticsSummary, PatientSnapshot, Severity, Status};

pub const DASHBOARD_REGION_ID: &str = "analytics-dashboard";
pub const METRICS_REGION_ID: &str = "analytics-metrics";

pub const BAR_SCALE: usize = 20;
pub const BAR_MIN_WIDTH: usize = 20;
const UNITS_PER_CELL: usize = 20;

/// Whether the backing store has finished its first load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Readiness {
    #[default]
    NotReady,
    Ready,
}

impl Readiness {
    /// Returns true only on the NotReady -> Ready transition.
    pub fn mark_ready(&mut self) -> bool {
        match self {
            Readiness::NotReady => {
                *self = Readiness::Ready;
                true
            }
            Readiness::Ready => false,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardCommand {
    ExportData,
    ExportWithVisuals,
    SyncAndRefresh,
    ConfigureAlerts,
}

impl DashboardCommand {
    pub const ALL: [DashboardCommand; 4] = [
        DashboardCommand::ExportData,
        DashboardCommand::ExportWithVisuals,
        DashboardCommand::SyncAndRefresh,
        DashboardCommand::ConfigureAlerts,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DashboardCommand::ExportData => "📄 Export Report (Data Only)",
            DashboardCommand::ExportWithVisuals => "📊 Export Dashboard (With Charts)",
            DashboardCommand::SyncAndRefresh => "🔄 Sync & Refresh Data",
            DashboardCommand::ConfigureAlerts => "⚠️ Configure Alerts",
        }
    }

    pub fn cli_name(&self) -> &'static str {
        match self {
            DashboardCommand::ExportData => "export",
            DashboardCommand::ExportWithVisuals => "export --with-visuals",
            DashboardCommand::SyncAndRefresh => "sync",
            DashboardCommand::ConfigureAlerts => "configure-alerts",
        }
    }
}

pub fn configure_alerts() -> &'static str {
    "Alert configuration coming soon!"
}

/// Linear scale with a floor so empty buckets stay visible.
pub fn bar_width(count: usize) -> usize {
    (count * BAR_SCALE).max(BAR_MIN_WIDTH)
}

pub fn bar(count: usize) -> String {
    "█".repeat(bar_width(count) / UNITS_PER_CELL)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    pub id: &'static str,
    pub title: &'static str,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub header: String,
    pub regions: Vec<Region>,
    pub footer: Option<String>,
}

impl DashboardView {
    pub fn region(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|region| region.id == id)
    }

    pub fn render(&self) -> String {
        let mut output = self.header.clone();
        for region in &self.regions {
            let _ = writeln!(output);
            output.push_str(&render_region(region));
        }
        if let Some(footer) = &self.footer {
            let _ = writeln!(output);
            output.push_str(footer);
        }
        output
    }
}

pub fn render_region(region: &Region) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## {}", region.title);
    output.push_str(&region.body);
    output
}

pub struct Dashboard<'a> {
    readiness: Readiness,
    snapshot: &'a PatientSnapshot,
}

impl<'a> Dashboard<'a> {
    pub fn new(snapshot: &'a PatientSnapshot) -> Self {
        Self {
            readiness: Readiness::NotReady,
            snapshot,
        }
    }

    pub fn mark_ready(&mut self) {
        if self.readiness.mark_ready() {
            tracing::debug!(patients = self.snapshot.patients.len(), "dashboard ready");
        }
    }

    /// `None` until the store has loaded.
    pub fn summary(&self) -> Option<AnalyticsSummary> {
        if !self.readiness.is_ready() {
            return None;
        }
        let subsets = StatusSubsets::partition(&self.snapshot.patients);
        Some(analytics::summarize(&self.snapshot.patients, &subsets))
    }

    pub fn view(&self) -> DashboardView {
        let Some(summary) = self.summary() else {
            return loading_view();
        };

        let patients = &self.snapshot.patients;
        let regions = vec![
            Region {
                id: DASHBOARD_REGION_ID,
                title: "Severity Distribution & Patient Status",
                body: charts(&summary),
            },
            Region {
                id: METRICS_REGION_ID,
                title: "Metrics",
                body: metric_cards(
                    &summary,
                    patients.len(),
                    analytics::high_priority_cases(patients),
                    self.snapshot.last_updated,
                ),
            },
        ];

        let footer = patients.is_empty().then(|| {
            let mut notice = String::new();
            let _ = writeln!(notice, "No patient data available for analytics.");
            let _ = writeln!(notice, "Add patients through the triage system to see analytics.");
            notice
        });

        DashboardView {
            header: header(self.snapshot.last_updated),
            regions,
            footer,
        }
    }
}

fn loading_view() -> DashboardView {
    let mut header = String::new();
    let _ = writeln!(header, "# Analytics Dashboard");
    let _ = writeln!(header, "Loading analytics data...");
    let _ = writeln!(header);
    let _ = writeln!(header, "📊 Hydrating data...");
    DashboardView {
        header,
        regions: Vec::new(),
        footer: None,
    }
}

fn header(last_updated: Option<DateTime<Utc>>) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Analytics Dashboard");
    let _ = writeln!(output, "Patient flow insights and system performance metrics");
    if let Some(updated) = last_updated {
        let _ = writeln!(
            output,
            "📂 Data from persistent store • Last updated: {}",
            updated.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    let _ = writeln!(output);
    let actions: Vec<String> = DashboardCommand::ALL
        .iter()
        .map(|command| format!("[{}] ({})", command.label(), command.cli_name()))
        .collect();
    let _ = writeln!(output, "{}", actions.join("  "));
    output
}

fn chart_line(output: &mut String, label: &str, count: usize) {
    let _ = writeln!(output, "{:<14} {} {}", label, bar(count), count);
}

fn charts(summary: &AnalyticsSummary) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "### Severity Distribution");
    for severity in Severity::ALL {
        chart_line(
            &mut output,
            severity.label(),
            summary.severity_distribution.get(severity),
        );
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "### Patient Status");
    for status in Status::ALL {
        chart_line(&mut output, status.label(), summary.status_distribution.get(status));
    }
    output
}

fn metric_cards(
    summary: &AnalyticsSummary,
    total_patients: usize,
    high_priority_cases: usize,
    last_updated: Option<DateTime<Utc>>,
) -> String {
    let status = &summary.status_distribution;
    let completion_rate = analytics::completion_rate(status.completed, total_patients);

    let mut output = String::new();
    let _ = writeln!(output, "### Key Metrics");
    let _ = writeln!(output, "- Total Patients: {total_patients}");
    let _ = writeln!(output, "- Average Age: {}", summary.average_age);
    let _ = writeln!(output, "- Completion Rate: {completion_rate}%");
    let _ = writeln!(output);
    let _ = writeln!(output, "### Performance Metrics");
    let _ = writeln!(output, "- Avg Priority Score: {}", summary.average_priority);
    let _ = writeln!(output, "- Avg Wait Time: {}min", summary.average_wait_time);
    let _ = writeln!(output, "- High Priority Cases: {high_priority_cases}");
    let _ = writeln!(output);
    let _ = writeln!(output, "### System Status");
    let _ = writeln!(output, "- Queue Length: {}", status.waiting);
    let _ = writeln!(output, "- In Treatment: {}", status.in_treatment);
    let _ = writeln!(output, "- Data Source: 📂 Persistent Store");
    if let Some(updated) = last_updated {
        let _ = writeln!(output, "- Last sync: {}", updated.format("%H:%M:%S"));
    }
    output
}
