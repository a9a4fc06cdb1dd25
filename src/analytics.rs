use crate::models::{
    AnalyticsSummary, ExportPayload, Patient, Severity, SeverityDistribution, Status,
    StatusDistribution,
};

pub const HIGH_PRIORITY_THRESHOLD: i32 = 100;

/// The three status subsets of a patient list.
///
/// When built by [`StatusSubsets::partition`], every patient lands in exactly one subset.
#[derive(Debug, Clone, Default)]
pub struct StatusSubsets<'a> {
    pub waiting: Vec<&'a Patient>,
    pub in_treatment: Vec<&'a Patient>,
    pub completed: Vec<&'a Patient>,
}

impl<'a> StatusSubsets<'a> {
    pub fn partition(patients: &'a [Patient]) -> Self {
        let mut subsets = StatusSubsets::default();
        for patient in patients {
            match patient.status {
                Status::Waiting => subsets.waiting.push(patient),
                Status::InTreatment => subsets.in_treatment.push(patient),
                Status::Completed => subsets.completed.push(patient),
            }
        }
        subsets
    }
}

pub fn summarize(patients: &[Patient], subsets: &StatusSubsets<'_>) -> AnalyticsSummary {
    AnalyticsSummary {
        severity_distribution: severity_distribution(patients),
        status_distribution: StatusDistribution {
            waiting: subsets.waiting.len(),
            in_treatment: subsets.in_treatment.len(),
            completed: subsets.completed.len(),
        },
        average_age: rounded_mean(patients.iter().map(|p| p.age as f64)),
        average_priority: rounded_mean(patients.iter().map(|p| p.priority as f64)),
        average_wait_time: average_wait_minutes(&subsets.completed),
    }
}

pub fn severity_distribution(patients: &[Patient]) -> SeverityDistribution {
    let mut distribution = SeverityDistribution::default();
    for severity in patients.iter().filter_map(|p| p.severity) {
        match severity {
            Severity::Critical => distribution.critical += 1,
            Severity::High => distribution.high += 1,
            Severity::Medium => distribution.medium += 1,
            Severity::Low => distribution.low += 1,
        }
    }
    distribution
}

/// Minutes from arrival to treatment start, falling back to treatment end.
/// Patients without a recorded end time are skipped.
// TODO: confirm with the triage leads whether this should run to treatment end instead.
pub fn wait_minutes(patient: &Patient) -> Option<f64> {
    let end_time = patient.treatment_end_time?;
    let until = patient.treatment_start_time.unwrap_or(end_time);
    Some((until - patient.arrival_time).num_milliseconds() as f64 / 60_000.0)
}

pub fn average_wait_minutes(completed: &[&Patient]) -> i64 {
    rounded_mean(completed.iter().filter_map(|p| wait_minutes(p)))
}

pub fn completion_rate(completed: usize, total: usize) -> i64 {
    round_half_up(completed as f64 / total.max(1) as f64 * 100.0)
}

pub fn high_priority_cases(patients: &[Patient]) -> usize {
    patients
        .iter()
        .filter(|p| p.priority >= HIGH_PRIORITY_THRESHOLD)
        .count()
}

pub fn export_payload(
    summary: &AnalyticsSummary,
    patients: &[Patient],
    subsets: &StatusSubsets<'_>,
) -> ExportPayload {
    ExportPayload {
        severity_distribution: summary.severity_distribution,
        status_distribution: summary.status_distribution,
        average_age: summary.average_age,
        average_priority: summary.average_priority,
        average_wait_time: summary.average_wait_time,
        total_patients: patients.len(),
        completion_rate: completion_rate(summary.status_distribution.completed, patients.len()),
        high_priority_cases: high_priority_cases(patients),
        waiting_patients: subsets.waiting.len(),
        in_treatment_patients: subsets.in_treatment.len(),
    }
}

fn rounded_mean(values: impl Iterator<Item = f64>) -> i64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        0
    } else {
        round_half_up(sum / count as f64)
    }
}

/// Halves round toward positive infinity, so -2.5 becomes -2.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn arrival() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 2, 8, 0, 0).unwrap()
    }

    fn patient(severity: Option<Severity>, age: u32, priority: i32, status: Status) -> Patient {
        Patient {
            id: Uuid::new_v4(),
            name: "Avery Lee".to_string(),
            age,
            severity,
            priority,
            status,
            arrival_time: arrival(),
            treatment_start_time: None,
            treatment_end_time: None,
            source_key: None,
        }
    }

    fn completed(start_after: Option<i64>, end_after: Option<i64>) -> Patient {
        let mut p = patient(Some(Severity::Medium), 50, 40, Status::Completed);
        p.treatment_start_time = start_after.map(|m| arrival() + Duration::minutes(m));
        p.treatment_end_time = end_after.map(|m| arrival() + Duration::minutes(m));
        p
    }

    #[test]
    fn summarizes_two_patient_example() {
        let patients = vec![
            patient(Some(Severity::Critical), 40, 120, Status::Waiting),
            patient(Some(Severity::Low), 20, 10, Status::InTreatment),
        ];
        let subsets = StatusSubsets::partition(&patients);
        let summary = summarize(&patients, &subsets);

        assert_eq!(
            summary.severity_distribution,
            SeverityDistribution {
                critical: 1,
                high: 0,
                medium: 0,
                low: 1
            }
        );
        assert_eq!(summary.average_age, 30);
        assert_eq!(summary.average_priority, 65);
        assert_eq!(summary.average_wait_time, 0);
    }

    #[test]
    fn wait_time_runs_to_treatment_start() {
        let patients = vec![completed(Some(15), Some(40))];
        let subsets = StatusSubsets::partition(&patients);
        assert_eq!(summarize(&patients, &subsets).average_wait_time, 15);
    }

    #[test]
    fn wait_time_falls_back_to_end_and_skips_open_treatments() {
        let patients = vec![
            completed(None, Some(30)),
            completed(Some(10), None),
            completed(Some(11), Some(60)),
        ];
        let subsets = StatusSubsets::partition(&patients);
        // (30 + 11) / 2 = 20.5
        assert_eq!(summarize(&patients, &subsets).average_wait_time, 21);
    }

    #[test]
    fn empty_list_yields_zeros() {
        let patients: Vec<Patient> = Vec::new();
        let subsets = StatusSubsets::partition(&patients);
        let summary = summarize(&patients, &subsets);

        assert_eq!(summary, AnalyticsSummary::default());
        let payload = export_payload(&summary, &patients, &subsets);
        assert_eq!(payload.completion_rate, 0);
        assert_eq!(payload.total_patients, 0);
        assert_eq!(payload.high_priority_cases, 0);
    }

    #[test]
    fn unknown_severity_is_left_out_of_every_bucket() {
        let patients = vec![
            patient(None, 30, 10, Status::Waiting),
            patient(Some(Severity::High), 30, 10, Status::Waiting),
        ];
        let subsets = StatusSubsets::partition(&patients);
        let summary = summarize(&patients, &subsets);

        assert_eq!(summary.severity_distribution.total(), 1);
        assert!(summary.severity_distribution.total() <= patients.len());
        assert_eq!(summary.status_distribution.total(), patients.len());
    }

    #[test]
    fn summarize_is_idempotent() {
        let patients = vec![
            patient(Some(Severity::High), 71, 130, Status::Waiting),
            completed(Some(22), Some(90)),
            patient(Some(Severity::Medium), 5, 55, Status::InTreatment),
        ];
        let subsets = StatusSubsets::partition(&patients);
        assert_eq!(summarize(&patients, &subsets), summarize(&patients, &subsets));
    }

    #[test]
    fn partition_covers_every_patient_once() {
        let patients = vec![
            patient(Some(Severity::High), 71, 130, Status::Waiting),
            completed(Some(22), Some(90)),
            patient(Some(Severity::Medium), 5, 55, Status::InTreatment),
            patient(Some(Severity::Low), 15, 5, Status::Waiting),
        ];
        let subsets = StatusSubsets::partition(&patients);
        assert_eq!(
            subsets.waiting.len() + subsets.in_treatment.len() + subsets.completed.len(),
            patients.len()
        );
        assert_eq!(subsets.waiting.len(), 2);
    }

    #[test]
    fn payload_counts_high_priority_and_completion() {
        let patients = vec![
            patient(Some(Severity::Critical), 60, 100, Status::Waiting),
            patient(Some(Severity::High), 60, 99, Status::Waiting),
            completed(Some(5), Some(20)),
        ];
        let subsets = StatusSubsets::partition(&patients);
        let summary = summarize(&patients, &subsets);
        let payload = export_payload(&summary, &patients, &subsets);

        assert_eq!(payload.high_priority_cases, 1);
        assert_eq!(payload.completion_rate, 33);
        assert_eq!(payload.waiting_patients, 2);
        assert_eq!(payload.in_treatment_patients, 0);
    }

    #[test]
    fn rounding_matches_half_up() {
        assert_eq!(round_half_up(64.5), 65);
        assert_eq!(round_half_up(64.49), 64);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(completion_rate(2, 3), 67);
    }
}
