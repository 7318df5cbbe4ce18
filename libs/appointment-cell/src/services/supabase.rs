use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, NewAppointment};
use crate::services::repository::AppointmentRepository;

// `%.f` keeps sub-second precision and prints nothing for whole seconds.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// `appointments` table behind PostgREST.
pub struct SupabaseAppointmentRepository {
    supabase: Arc<SupabaseClient>,
    access_token: String,
}

impl SupabaseAppointmentRepository {
    pub fn new(supabase: Arc<SupabaseClient>, access_token: impl Into<String>) -> Self {
        Self {
            supabase,
            access_token: access_token.into(),
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Vec<Value>, AppointmentError> {
        self.supabase
            .request_with_headers(
                method,
                path,
                Some(&self.access_token),
                body,
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| AppointmentError::StorageError(e.to_string()))
    }
}

fn parse_appointments(rows: Vec<Value>) -> Result<Vec<Appointment>, AppointmentError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<Appointment>, _>>()
        .map_err(|e| AppointmentError::StorageError(format!("Failed to parse appointments: {}", e)))
}

fn first_appointment(rows: Vec<Value>) -> Result<Option<Appointment>, AppointmentError> {
    Ok(parse_appointments(rows)?.into_iter().next())
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Appointment>, AppointmentError> {
        debug!("Fetching appointment {}", id);
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        first_appointment(self.send(Method::GET, &path, None).await?)
    }

    async fn insert(
        &self,
        appointment: NewAppointment,
        status: AppointmentStatus,
    ) -> Result<i64, AppointmentError> {
        let body = json!({
            "doctor_id": appointment.doctor_id,
            "patient_id": appointment.patient_id,
            "appointment_time": appointment.appointment_time,
            "status": status,
        });

        let rows = self.send(Method::POST, "/rest/v1/appointments", Some(body)).await?;
        let created = first_appointment(rows)?.ok_or_else(|| {
            AppointmentError::StorageError("Insert returned no appointment".to_string())
        })?;

        debug!("Inserted appointment {}", created.id);
        Ok(created.id)
    }

    async fn save(&self, appointment: Appointment) -> Result<i64, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let body = json!({
            "doctor_id": appointment.doctor_id,
            "patient_id": appointment.patient_id,
            "appointment_time": appointment.appointment_time,
            "status": appointment.status,
        });

        match first_appointment(self.send(Method::PATCH, &path, Some(body)).await?)? {
            Some(saved) => Ok(saved.id),
            None => {
                warn!("Save matched no appointment row for id {}", appointment.id);
                Err(AppointmentError::NotFound)
            }
        }
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        self.send(Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn find_by_doctor_and_time_range(
        &self,
        doctor_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let query_parts = [
            format!("doctor_id=eq.{}", doctor_id),
            format!("appointment_time=gte.{}", start.format(TIMESTAMP_FORMAT)),
            format!("appointment_time=lt.{}", end.format(TIMESTAMP_FORMAT)),
        ];

        let path = format!(
            "/rest/v1/appointments?{}&order=appointment_time.asc,id.asc",
            query_parts.join("&")
        );

        parse_appointments(self.send(Method::GET, &path, None).await?)
    }

    async fn update_status_atomic(
        &self,
        id: i64,
        expected: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<bool, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&status=eq.{}", id, expected);
        let rows = self
            .send(Method::PATCH, &path, Some(json!({ "status": new_status })))
            .await?;
        Ok(!rows.is_empty())
    }
}
