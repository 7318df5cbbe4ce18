use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use shared_database::supabase::SupabaseClient;

use crate::models::{Patient, PatientError};

#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn find_patient(&self, patient_id: i64) -> Result<Option<Patient>, PatientError>;
}

#[derive(Default)]
pub struct InMemoryPatientDirectory {
    patients: RwLock<HashMap<i64, Patient>>,
}

impl InMemoryPatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patients(patients: impl IntoIterator<Item = Patient>) -> Self {
        Self {
            patients: RwLock::new(patients.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    pub async fn insert(&self, patient: Patient) {
        self.patients.write().await.insert(patient.id, patient);
    }
}

#[async_trait]
impl PatientDirectory for InMemoryPatientDirectory {
    async fn find_patient(&self, patient_id: i64) -> Result<Option<Patient>, PatientError> {
        Ok(self.patients.read().await.get(&patient_id).cloned())
    }
}

pub struct SupabasePatientDirectory {
    supabase: Arc<SupabaseClient>,
    access_token: String,
}

impl SupabasePatientDirectory {
    pub fn new(supabase: Arc<SupabaseClient>, access_token: impl Into<String>) -> Self {
        Self {
            supabase,
            access_token: access_token.into(),
        }
    }
}

#[async_trait]
impl PatientDirectory for SupabasePatientDirectory {
    async fn find_patient(&self, patient_id: i64) -> Result<Option<Patient>, PatientError> {
        debug!("Fetching patient profile: {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.access_token),
            None,
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let Some(row) = result.into_iter().next() else {
            return Ok(None);
        };

        let patient: Patient = serde_json::from_value(row)
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))?;
        Ok(Some(patient))
    }
}
