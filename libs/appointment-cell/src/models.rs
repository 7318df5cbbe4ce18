// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::fmt;

use doctor_cell::DoctorError;
use patient_cell::PatientError;
use shared_config::{AppConfig, DEFAULT_SLOT_MINUTES};

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
    /// Slot start; the slot length comes from `SchedulingRules`.
    pub appointment_time: NaiveDateTime,
    pub status: AppointmentStatus,
}

impl Appointment {
    /// `None` when the slot would run past the last representable instant.
    pub fn slot(&self, rules: &SchedulingRules) -> Option<Slot> {
        Slot::starting_at(self.appointment_time, rules)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
}

impl AppointmentStatus {
    pub fn toggled(self) -> Self {
        match self {
            AppointmentStatus::Scheduled => AppointmentStatus::Completed,
            AppointmentStatus::Completed => AppointmentStatus::Scheduled,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Half-open interval `[start, end)` occupied by an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Slot {
    pub fn starting_at(start: NaiveDateTime, rules: &SchedulingRules) -> Option<Self> {
        let end = start.checked_add_signed(rules.slot_duration())?;
        Some(Self { start, end })
    }

    /// Back-to-back slots do not overlap.
    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub doctor_id: i64,
    pub patient_id: i64,
    pub appointment_time: NaiveDateTime,
}

/// Replacement values for an existing appointment. Status is not part of an
/// update; it only moves through the status toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentUpdate {
    pub id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub appointment_time: NaiveDateTime,
}

/// What the availability validator looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCandidate {
    pub doctor_id: i64,
    pub appointment_time: NaiveDateTime,
}

impl From<&NewAppointment> for SlotCandidate {
    fn from(request: &NewAppointment) -> Self {
        Self {
            doctor_id: request.doctor_id,
            appointment_time: request.appointment_time,
        }
    }
}

impl From<&AppointmentUpdate> for SlotCandidate {
    fn from(update: &AppointmentUpdate) -> Self {
        Self {
            doctor_id: update.doctor_id,
            appointment_time: update.appointment_time,
        }
    }
}

impl From<&Appointment> for SlotCandidate {
    fn from(appointment: &Appointment) -> Self {
        Self {
            doctor_id: appointment.doctor_id,
            appointment_time: appointment.appointment_time,
        }
    }
}

// ==============================================================================
// DOCTOR DAY VIEW
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAppointment {
    pub appointment_id: i64,
    pub patient_id: i64,
    pub patient_name: String,
    pub appointment_time: NaiveDateTime,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySchedule {
    pub doctor_id: i64,
    pub date: NaiveDate,
    /// Ordered by appointment time, then id.
    pub appointments: Vec<DailyAppointment>,
}

impl DailySchedule {
    /// Legacy name-keyed view. Patients sharing a display name collapse into
    /// one entry holding the last appointment in schedule order; prefer
    /// `appointments`.
    pub fn by_patient_name(&self) -> BTreeMap<String, NaiveDateTime> {
        self.appointments
            .iter()
            .map(|a| (a.patient_name.clone(), a.appointment_time))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.appointments.is_empty()
    }
}

// ==============================================================================
// SCHEDULING RULES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulingRules {
    pub slot_duration_minutes: i64,
}

impl SchedulingRules {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            slot_duration_minutes: config.appointment_slot_minutes,
        }
    }

    pub fn slot_duration(&self) -> Duration {
        Duration::minutes(self.slot_duration_minutes)
    }
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            slot_duration_minutes: DEFAULT_SLOT_MINUTES,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// Why the availability validator turned a candidate down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum ValidationFailure {
    #[error("doctor does not exist")]
    UnknownDoctor,

    #[error("requested time is outside the doctor's working hours")]
    OutsideWorkingHours,

    #[error("slot overlaps appointment {conflicting_id}")]
    SlotConflict { conflicting_id: i64 },

    #[error("an appointment cannot be moved to another patient")]
    PatientReassigned,

    #[error("date is outside the supported calendar range")]
    DateOutOfRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Invalid appointment request: {0}")]
    InvalidRequest(ValidationFailure),

    #[error("Requester does not own this appointment")]
    NotOwner,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Doctor not found")]
    UnknownDoctor,

    #[error("Requested time is outside the doctor's working hours")]
    OutsideWorkingHours,

    #[error("Appointment conflicts with existing booking")]
    SlotConflict,

    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Flattens a validator rejection into the error a booking reports.
impl From<ValidationFailure> for AppointmentError {
    fn from(failure: ValidationFailure) -> Self {
        match failure {
            ValidationFailure::UnknownDoctor => AppointmentError::UnknownDoctor,
            ValidationFailure::OutsideWorkingHours => AppointmentError::OutsideWorkingHours,
            ValidationFailure::SlotConflict { .. } => AppointmentError::SlotConflict,
            other @ (ValidationFailure::PatientReassigned | ValidationFailure::DateOutOfRange) => {
                AppointmentError::InvalidRequest(other)
            }
        }
    }
}

impl From<DoctorError> for AppointmentError {
    fn from(error: DoctorError) -> Self {
        AppointmentError::StorageError(error.to_string())
    }
}

impl From<PatientError> for AppointmentError {
    fn from(error: PatientError) -> Self {
        AppointmentError::StorageError(error.to_string())
    }
}
