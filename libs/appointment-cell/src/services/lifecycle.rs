// libs/appointment-cell/src/services/lifecycle.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info, instrument, warn};

use doctor_cell::DoctorDirectory;
use patient_cell::{Patient, PatientDirectory};
use shared_models::auth::Role;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AppointmentUpdate, DailyAppointment,
    DailySchedule, NewAppointment, SchedulingRules, SlotCandidate, ValidationFailure,
};
use crate::services::availability::AvailabilityValidator;
use crate::services::identity::IdentityResolver;
use crate::services::locks::KeyedLocks;
use crate::services::repository::AppointmentRepository;

/// Sole writer of appointment records.
///
/// Booking runs under the doctor's lock. Update, cancel and status changes run
/// under the appointment's lock; update additionally takes the locks of the
/// old and new doctor, always after the appointment lock.
pub struct AppointmentLifecycleManager {
    appointments: Arc<dyn AppointmentRepository>,
    patients: Arc<dyn PatientDirectory>,
    identities: Arc<dyn IdentityResolver>,
    validator: AvailabilityValidator,
    doctor_locks: KeyedLocks<i64>,
    appointment_locks: KeyedLocks<i64>,
}

impl AppointmentLifecycleManager {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        doctors: Arc<dyn DoctorDirectory>,
        patients: Arc<dyn PatientDirectory>,
        identities: Arc<dyn IdentityResolver>,
        rules: SchedulingRules,
    ) -> Self {
        let validator = AvailabilityValidator::new(doctors, Arc::clone(&appointments), rules);
        Self {
            appointments,
            patients,
            identities,
            validator,
            doctor_locks: KeyedLocks::new(),
            appointment_locks: KeyedLocks::new(),
        }
    }

    pub fn validator(&self) -> &AvailabilityValidator {
        &self.validator
    }

    /// Creates a `Scheduled` appointment and returns its id.
    #[instrument(skip(self), fields(doctor_id = request.doctor_id))]
    pub async fn book(&self, request: NewAppointment) -> Result<i64, AppointmentError> {
        let _doctor = self.doctor_locks.acquire(request.doctor_id).await;

        self.validator
            .validate(SlotCandidate::from(&request), None)
            .await
            .map_err(|e| match e {
                AppointmentError::InvalidRequest(failure) => AppointmentError::from(failure),
                other => other,
            })?;

        let id = self
            .appointments
            .insert(request.clone(), AppointmentStatus::Scheduled)
            .await?;

        info!(
            "Booked appointment {} for patient {} with doctor {} at {}",
            id, request.patient_id, request.doctor_id, request.appointment_time
        );
        Ok(id)
    }

    /// Moves an appointment to a new doctor and/or time on behalf of its
    /// patient. Status is carried over untouched.
    #[instrument(skip(self, token), fields(appointment_id = update.id))]
    pub async fn update(
        &self,
        update: AppointmentUpdate,
        token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let requester = self.identities.resolve(token).await?;
        let _appointment = self.appointment_locks.acquire(update.id).await;

        let current = self
            .appointments
            .find_by_id(update.id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if !requester.is_patient(current.patient_id) {
            warn!("{} tried to update appointment {} it does not own", requester, update.id);
            return Err(AppointmentError::NotOwner);
        }

        if update.patient_id != current.patient_id {
            return Err(AppointmentError::InvalidRequest(ValidationFailure::PatientReassigned));
        }

        let _doctors = self
            .doctor_locks
            .acquire_all([current.doctor_id, update.doctor_id])
            .await;

        self.validator
            .validate(SlotCandidate::from(&update), Some(update.id))
            .await?;

        let updated = Appointment {
            id: current.id,
            doctor_id: update.doctor_id,
            patient_id: current.patient_id,
            appointment_time: update.appointment_time,
            status: current.status,
        };
        self.appointments.save(updated.clone()).await?;

        info!(
            "Updated appointment {}: doctor {} -> {}, {} -> {}",
            updated.id,
            current.doctor_id,
            updated.doctor_id,
            current.appointment_time,
            updated.appointment_time
        );
        Ok(updated)
    }

    /// Deletes an appointment. Only its patient may cancel it.
    #[instrument(skip(self, token))]
    pub async fn cancel(&self, appointment_id: i64, token: &str) -> Result<(), AppointmentError> {
        let requester = self.identities.resolve(token).await?;
        let _appointment = self.appointment_locks.acquire(appointment_id).await;

        let current = self
            .appointments
            .find_by_id(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if !requester.is_patient(current.patient_id) {
            warn!("{} tried to cancel appointment {} it does not own", requester, appointment_id);
            return Err(AppointmentError::NotOwner);
        }

        self.appointments.delete_by_id(appointment_id).await?;

        info!("Cancelled appointment {} for patient {}", appointment_id, current.patient_id);
        Ok(())
    }

    /// Flips `Scheduled` <-> `Completed` and returns the new status. Only the
    /// appointment's doctor may do this.
    #[instrument(skip(self, token))]
    pub async fn change_status(
        &self,
        appointment_id: i64,
        token: &str,
    ) -> Result<AppointmentStatus, AppointmentError> {
        let requester = self.identities.resolve(token).await?;
        let _appointment = self.appointment_locks.acquire(appointment_id).await;

        let current = self
            .appointments
            .find_by_id(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if !requester.is_doctor(current.doctor_id) {
            warn!("{} tried to change status of appointment {}", requester, appointment_id);
            return Err(AppointmentError::NotOwner);
        }

        let next = current.status.toggled();
        let swapped = self
            .appointments
            .update_status_atomic(appointment_id, current.status, next)
            .await?;

        if !swapped {
            // Another writer outside this process got there first.
            return match self.appointments.find_by_id(appointment_id).await? {
                None => Err(AppointmentError::NotFound),
                Some(_) => Err(AppointmentError::StorageError(format!(
                    "status of appointment {} changed concurrently",
                    appointment_id
                ))),
            };
        }

        info!("Appointment {} status {} -> {}", appointment_id, current.status, next);
        Ok(next)
    }

    /// The requesting doctor's appointments on `date`, optionally narrowed to
    /// patients whose name equals `patient_name` ignoring case.
    #[instrument(skip(self, token))]
    pub async fn query(
        &self,
        token: &str,
        date: NaiveDate,
        patient_name: Option<&str>,
    ) -> Result<DailySchedule, AppointmentError> {
        let requester = self.identities.resolve(token).await?;
        if requester.role != Role::Doctor {
            warn!("{} asked for a doctor schedule", requester);
            return Err(AppointmentError::NotOwner);
        }

        let day_start = date.and_time(NaiveTime::MIN);
        let day_end = date
            .succ_opt()
            .map(|next| next.and_time(NaiveTime::MIN))
            .ok_or(AppointmentError::InvalidRequest(ValidationFailure::DateOutOfRange))?;

        let booked = self
            .appointments
            .find_by_doctor_and_time_range(requester.id, day_start, day_end)
            .await?;

        let filter = patient_name.map(str::trim).filter(|name| !name.is_empty());
        let mut patients: HashMap<i64, Option<Patient>> = HashMap::new();
        let mut appointments = Vec::with_capacity(booked.len());

        for appointment in booked {
            if !patients.contains_key(&appointment.patient_id) {
                let patient = self.patients.find_patient(appointment.patient_id).await?;
                patients.insert(appointment.patient_id, patient);
            }

            let Some(Some(patient)) = patients.get(&appointment.patient_id) else {
                warn!(
                    "Appointment {} references missing patient {}",
                    appointment.id, appointment.patient_id
                );
                continue;
            };

            if let Some(name) = filter {
                if !patient.name_matches(name) {
                    continue;
                }
            }

            appointments.push(DailyAppointment {
                appointment_id: appointment.id,
                patient_id: patient.id,
                patient_name: patient.name.clone(),
                appointment_time: appointment.appointment_time,
                status: appointment.status,
            });
        }

        appointments.sort_by_key(|a| (a.appointment_time, a.appointment_id));
        debug!(
            "Doctor {} has {} appointments on {}",
            requester.id,
            appointments.len(),
            date
        );

        Ok(DailySchedule {
            doctor_id: requester.id,
            date,
            appointments,
        })
    }
}
