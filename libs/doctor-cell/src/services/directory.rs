use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use shared_database::supabase::SupabaseClient;

use crate::models::{Doctor, DoctorError};

/// Read access to doctor records and their working hours.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn find_doctor(&self, doctor_id: i64) -> Result<Option<Doctor>, DoctorError>;
}

#[derive(Default)]
pub struct InMemoryDoctorDirectory {
    doctors: RwLock<HashMap<i64, Doctor>>,
}

impl InMemoryDoctorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doctors(doctors: impl IntoIterator<Item = Doctor>) -> Self {
        Self {
            doctors: RwLock::new(doctors.into_iter().map(|d| (d.id, d)).collect()),
        }
    }

    pub async fn insert(&self, doctor: Doctor) {
        self.doctors.write().await.insert(doctor.id, doctor);
    }

    pub async fn remove(&self, doctor_id: i64) -> Option<Doctor> {
        self.doctors.write().await.remove(&doctor_id)
    }

    pub async fn len(&self) -> usize {
        self.doctors.read().await.len()
    }
}

#[async_trait]
impl DoctorDirectory for InMemoryDoctorDirectory {
    async fn find_doctor(&self, doctor_id: i64) -> Result<Option<Doctor>, DoctorError> {
        Ok(self.doctors.read().await.get(&doctor_id).cloned())
    }
}

/// Doctors kept in the `doctors` table of a Supabase project.
pub struct SupabaseDoctorDirectory {
    supabase: Arc<SupabaseClient>,
    access_token: String,
}

impl SupabaseDoctorDirectory {
    pub fn new(supabase: Arc<SupabaseClient>, access_token: impl Into<String>) -> Self {
        Self {
            supabase,
            access_token: access_token.into(),
        }
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDoctorDirectory {
    async fn find_doctor(&self, doctor_id: i64) -> Result<Option<Doctor>, DoctorError> {
        debug!("Fetching doctor: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.access_token),
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e))),
            None => Ok(None),
        }
    }
}
