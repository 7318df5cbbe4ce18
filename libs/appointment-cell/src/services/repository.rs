use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, NewAppointment};

/// Durable home of appointment records. Only the lifecycle manager writes
/// through it.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Appointment>, AppointmentError>;

    /// Stores a new record and returns the id assigned to it.
    async fn insert(
        &self,
        appointment: NewAppointment,
        status: AppointmentStatus,
    ) -> Result<i64, AppointmentError>;

    /// Overwrites an existing record.
    async fn save(&self, appointment: Appointment) -> Result<i64, AppointmentError>;

    async fn delete_by_id(&self, id: i64) -> Result<(), AppointmentError>;

    /// Appointments of `doctor_id` starting in `[start, end)`, ordered by time then id.
    async fn find_by_doctor_and_time_range(
        &self,
        doctor_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// Compare-and-set on the status column. `Ok(false)` means the record no
    /// longer holds `expected` (or is gone) and nothing was written.
    async fn update_status_atomic(
        &self,
        id: i64,
        expected: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<bool, AppointmentError>;
}

pub struct InMemoryAppointmentRepository {
    appointments: RwLock<BTreeMap<i64, Appointment>>,
    next_id: AtomicI64,
}

impl Default for InMemoryAppointmentRepository {
    fn default() -> Self {
        Self {
            appointments: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl InMemoryAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.appointments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.appointments.read().await.is_empty()
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn insert(
        &self,
        appointment: NewAppointment,
        status: AppointmentStatus,
    ) -> Result<i64, AppointmentError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = Appointment {
            id,
            doctor_id: appointment.doctor_id,
            patient_id: appointment.patient_id,
            appointment_time: appointment.appointment_time,
            status,
        };

        self.appointments.write().await.insert(id, record);
        debug!("Stored appointment {}", id);
        Ok(id)
    }

    async fn save(&self, appointment: Appointment) -> Result<i64, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        let Some(slot) = appointments.get_mut(&appointment.id) else {
            return Err(AppointmentError::NotFound);
        };

        let id = appointment.id;
        *slot = appointment;
        Ok(id)
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), AppointmentError> {
        self.appointments.write().await.remove(&id);
        Ok(())
    }

    async fn find_by_doctor_and_time_range(
        &self,
        doctor_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut found: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.doctor_id == doctor_id)
            .filter(|a| a.appointment_time >= start && a.appointment_time < end)
            .cloned()
            .collect();

        found.sort_by_key(|a| (a.appointment_time, a.id));
        Ok(found)
    }

    async fn update_status_atomic(
        &self,
        id: i64,
        expected: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<bool, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&id) {
            Some(appointment) if appointment.status == expected => {
                appointment.status = new_status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
