use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use sqlx::PgPool;

use crate::analytics::StatusSubsets;
use crate::db;
use crate::models::{Patient, PatientCsvRow, PatientSnapshot};

/// JSON snapshot of the patient list kept on local disk.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
    snapshot: PatientSnapshot,
}

impl LocalStore {
    /// A missing file loads as an empty snapshot.
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("failed to parse store {}", path.display()))?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no local store yet, starting empty");
                PatientSnapshot::default()
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read store {}", path.display()))
            }
        };

        tracing::debug!(
            path = %path.display(),
            patients = snapshot.patients.len(),
            "local store loaded"
        );
        Ok(Self { path, snapshot })
    }

    pub fn snapshot(&self) -> &PatientSnapshot {
        &self.snapshot
    }

    pub fn patients(&self) -> &[Patient] {
        &self.snapshot.patients
    }

    pub fn subsets(&self) -> StatusSubsets<'_> {
        StatusSubsets::partition(&self.snapshot.patients)
    }

    pub fn last_updated(&self) -> Option<chrono::DateTime<Utc>> {
        self.snapshot.last_updated
    }

    pub async fn replace(&mut self, patients: Vec<Patient>) -> anyhow::Result<()> {
        self.snapshot = PatientSnapshot {
            patients,
            last_updated: Some(Utc::now()),
        };
        self.save().await
    }

    async fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(&self.snapshot)?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("failed to write store {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "local store saved");
        Ok(())
    }

    /// Pulls the server copy and replaces the local snapshot with it.
    pub async fn sync(&mut self, pool: &PgPool) -> anyhow::Result<usize> {
        let patients = db::fetch_patients(pool).await?;
        let count = patients.len();
        self.replace(patients).await?;
        tracing::info!(
            patients = count,
            last_updated = ?self.last_updated(),
            "local store synced with server"
        );
        Ok(count)
    }

    /// Merges CSV rows into the local snapshot without touching the server.
    /// Rows whose `source_key` is already stored are skipped.
    pub async fn import_csv(&mut self, csv_path: &Path) -> anyhow::Result<usize> {
        let mut reader = csv::Reader::from_path(csv_path)
            .with_context(|| format!("failed to open {}", csv_path.display()))?;
        let mut patients = self.snapshot.patients.clone();
        let mut known: HashSet<String> = patients
            .iter()
            .filter_map(|patient| patient.source_key.clone())
            .collect();
        let mut inserted = 0usize;

        for result in reader.deserialize::<PatientCsvRow>() {
            let patient = result?.into_patient()?;
            if let Some(key) = &patient.source_key {
                if !known.insert(key.clone()) {
                    tracing::debug!(source_key = %key, "skipping already imported row");
                    continue;
                }
            }
            patients.push(patient);
            inserted += 1;
        }

        if inserted > 0 {
            self.replace(patients).await?;
        }
        Ok(inserted)
    }
}
