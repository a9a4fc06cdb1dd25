use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{Patient, PatientCsvRow, Severity, Status};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let now = Utc::now();
    // (source_key, name, age, severity, priority, status, arrived minutes ago,
    //  treatment start minutes after arrival, treatment end minutes after arrival)
    let patients = vec![
        ("seed-001", "Avery Lee", 67, "critical", 140, Status::InTreatment, 45, Some(4), None),
        ("seed-002", "Jules Moreno", 34, "high", 105, Status::Waiting, 20, None, None),
        ("seed-003", "Kiara Patel", 8, "medium", 60, Status::Waiting, 35, None, None),
        ("seed-004", "Noah Fischer", 51, "low", 15, Status::Completed, 240, Some(55), Some(95)),
        ("seed-005", "Mara Okafor", 79, "high", 110, Status::Completed, 180, Some(12), Some(70)),
        ("seed-006", "Theo Lindqvist", 23, "low", 10, Status::Waiting, 90, None, None),
    ];

    for (source_key, name, age, severity, priority, status, arrived_ago, start_after, end_after) in
        patients
    {
        let arrival_time = now - Duration::minutes(arrived_ago);
        let offset = |minutes: Option<i64>| minutes.map(|m| arrival_time + Duration::minutes(m));

        sqlx::query(
            r#"
            INSERT INTO triage.patients
            (id, full_name, age, severity, priority, status, arrival_time,
             treatment_start_time, treatment_end_time, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(age)
        .bind(severity)
        .bind(priority)
        .bind(status.as_str())
        .bind(arrival_time)
        .bind(offset(start_after))
        .bind(offset(end_after))
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn fetch_patients(pool: &PgPool) -> anyhow::Result<Vec<Patient>> {
    let rows = sqlx::query(
        "SELECT id, full_name, age, severity, priority, status, arrival_time, \
         treatment_start_time, treatment_end_time, source_key \
         FROM triage.patients \
         ORDER BY arrival_time",
    )
    .fetch_all(pool)
    .await?;

    let mut patients = Vec::with_capacity(rows.len());

    for row in rows {
        let id: Uuid = row.get("id");
        let age: i32 = row.get("age");
        let severity: Option<String> = row.get("severity");
        let status: String = row.get("status");

        patients.push(Patient {
            id,
            name: row.get("full_name"),
            age: u32::try_from(age).with_context(|| format!("patient {id} has negative age"))?,
            severity: severity.and_then(|value| value.parse::<Severity>().ok()),
            priority: row.get("priority"),
            status: status
                .parse()
                .with_context(|| format!("patient {id} has an invalid status"))?,
            arrival_time: row.get::<DateTime<Utc>, _>("arrival_time"),
            treatment_start_time: row.get("treatment_start_time"),
            treatment_end_time: row.get("treatment_end_time"),
            source_key: row.get("source_key"),
        });
    }

    Ok(patients)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<PatientCsvRow>() {
        let row = result?;
        let severity = row.severity.clone();
        let patient = row.into_patient()?;

        let result = sqlx::query(
            r#"
            INSERT INTO triage.patients
            (id, full_name, age, severity, priority, status, arrival_time,
             treatment_start_time, treatment_end_time, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(patient.id)
        .bind(&patient.name)
        .bind(i32::try_from(patient.age).context("age out of range")?)
        .bind(severity)
        .bind(patient.priority)
        .bind(patient.status.as_str())
        .bind(patient.arrival_time)
        .bind(patient.treatment_start_time)
        .bind(patient.treatment_end_time)
        .bind(&patient.source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
