// libs/appointment-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use doctor_cell::{Doctor, DoctorDirectory};

use crate::models::{
    Appointment, AppointmentError, SchedulingRules, Slot, SlotCandidate, ValidationFailure,
};
use crate::services::repository::AppointmentRepository;

/// Decides whether a doctor can take a candidate slot. Never writes.
pub struct AvailabilityValidator {
    doctors: Arc<dyn DoctorDirectory>,
    appointments: Arc<dyn AppointmentRepository>,
    rules: SchedulingRules,
}

impl AvailabilityValidator {
    pub fn new(
        doctors: Arc<dyn DoctorDirectory>,
        appointments: Arc<dyn AppointmentRepository>,
        rules: SchedulingRules,
    ) -> Self {
        Self {
            doctors,
            appointments,
            rules,
        }
    }

    pub fn rules(&self) -> SchedulingRules {
        self.rules
    }

    /// Checks doctor existence, working hours and overlap with the doctor's
    /// other bookings, skipping the appointment `excluding` names.
    ///
    /// A rejection comes back as `AppointmentError::InvalidRequest` carrying
    /// the reason; directory and storage failures pass through unchanged.
    pub async fn validate(
        &self,
        candidate: SlotCandidate,
        excluding: Option<i64>,
    ) -> Result<(), AppointmentError> {
        debug!(
            "Validating slot for doctor {} at {} (excluding {:?})",
            candidate.doctor_id, candidate.appointment_time, excluding
        );

        let doctor = self.doctors.find_doctor(candidate.doctor_id).await?;

        // Anything starting within one slot length before the candidate may reach into it.
        let nearby = match (&doctor, Slot::starting_at(candidate.appointment_time, &self.rules)) {
            (Some(_), Some(slot)) => {
                let lookback = slot
                    .start
                    .checked_sub_signed(self.rules.slot_duration())
                    .unwrap_or(NaiveDateTime::MIN);
                self.appointments
                    .find_by_doctor_and_time_range(candidate.doctor_id, lookback, slot.end)
                    .await?
            }
            _ => Vec::new(),
        };

        check_slot(doctor.as_ref(), &candidate, &nearby, excluding, &self.rules).map_err(|failure| {
            warn!("Slot rejected for doctor {}: {}", candidate.doctor_id, failure);
            AppointmentError::InvalidRequest(failure)
        })
    }

    /// Boolean view used where only pass/fail matters. The appointment is
    /// checked against everything except itself.
    pub async fn validate_appointment(&self, appointment: &Appointment) -> bool {
        self.validate(SlotCandidate::from(appointment), Some(appointment.id))
            .await
            .is_ok()
    }
}

/// The scheduling rules on already-loaded data.
pub fn check_slot(
    doctor: Option<&Doctor>,
    candidate: &SlotCandidate,
    existing: &[Appointment],
    excluding: Option<i64>,
    rules: &SchedulingRules,
) -> Result<(), ValidationFailure> {
    let doctor = doctor.ok_or(ValidationFailure::UnknownDoctor)?;

    let slot = Slot::starting_at(candidate.appointment_time, rules)
        .ok_or(ValidationFailure::OutsideWorkingHours)?;
    if !doctor.is_available_between(slot.start, slot.end) {
        return Err(ValidationFailure::OutsideWorkingHours);
    }

    // A stored slot with no representable end runs to the end of time.
    let conflict = existing
        .iter()
        .filter(|other| other.doctor_id == candidate.doctor_id)
        .filter(|other| Some(other.id) != excluding)
        .find(|other| match other.slot(rules) {
            Some(other_slot) => other_slot.overlaps(&slot),
            None => other.appointment_time < slot.end,
        });

    match conflict {
        Some(other) => Err(ValidationFailure::SlotConflict {
            conflicting_id: other.id,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use chrono::{Duration, NaiveDate};

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn doctor() -> Doctor {
        Doctor {
            id: 7,
            name: "Dr. Quinn".to_string(),
            specialty: "General Practice".to_string(),
            email: None,
            available_times: vec!["08:00-12:00".to_string(), "13:00-18:00".to_string()],
        }
    }

    fn booked(id: i64, time: NaiveDateTime) -> Appointment {
        Appointment {
            id,
            doctor_id: 7,
            patient_id: 100 + id,
            appointment_time: time,
            status: AppointmentStatus::Scheduled,
        }
    }

    fn candidate(time: NaiveDateTime) -> SlotCandidate {
        SlotCandidate {
            doctor_id: 7,
            appointment_time: time,
        }
    }

    #[test]
    fn unknown_doctor_is_rejected_first() {
        let rules = SchedulingRules::default();
        assert_eq!(
            check_slot(None, &candidate(at(1, 0)), &[], None, &rules),
            Err(ValidationFailure::UnknownDoctor)
        );
    }

    #[test]
    fn slot_must_sit_inside_working_hours() {
        let rules = SchedulingRules::default();
        let doctor = doctor();

        assert!(check_slot(Some(&doctor), &candidate(at(8, 0)), &[], None, &rules).is_ok());
        assert!(check_slot(Some(&doctor), &candidate(at(17, 0)), &[], None, &rules).is_ok());
        assert_eq!(
            check_slot(Some(&doctor), &candidate(at(11, 30)), &[], None, &rules),
            Err(ValidationFailure::OutsideWorkingHours)
        );
        assert_eq!(
            check_slot(Some(&doctor), &candidate(at(7, 0)), &[], None, &rules),
            Err(ValidationFailure::OutsideWorkingHours)
        );
    }

    #[test]
    fn back_to_back_slots_do_not_conflict() {
        let rules = SchedulingRules::default();
        let existing = vec![booked(1, at(9, 0))];

        assert!(check_slot(Some(&doctor()), &candidate(at(10, 0)), &existing, None, &rules).is_ok());
        assert!(check_slot(Some(&doctor()), &candidate(at(8, 0)), &existing, None, &rules).is_ok());
        assert_eq!(
            check_slot(Some(&doctor()), &candidate(at(9, 59)), &existing, None, &rules),
            Err(ValidationFailure::SlotConflict { conflicting_id: 1 })
        );
    }

    #[test]
    fn excluded_appointment_is_ignored() {
        let rules = SchedulingRules::default();
        let existing = vec![booked(1, at(9, 0))];

        assert!(check_slot(Some(&doctor()), &candidate(at(9, 30)), &existing, Some(1), &rules).is_ok());
        assert!(check_slot(Some(&doctor()), &candidate(at(9, 30)), &existing, Some(2), &rules).is_err());
    }

    #[test]
    fn slot_running_off_the_calendar_is_outside_hours() {
        let rules = SchedulingRules::default();
        let late = NaiveDateTime::MAX - Duration::minutes(30);
        let late_doctor = Doctor {
            available_times: vec!["00:00-23:59".to_string()],
            ..doctor()
        };

        assert_eq!(
            check_slot(Some(&late_doctor), &candidate(late), &[], None, &rules),
            Err(ValidationFailure::OutsideWorkingHours)
        );
    }
}
